//! Bind a RESPONDENT endpoint, connect a SURVEYOR, and collect one answer
//! before the survey deadline expires.
//!
//! ```text
//! cargo run -p sp --example survey_tcp
//! ```

use std::time::Duration;

#[compio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    sp::dev_tracing::init_tracing();

    let respondent = sp::respondent_bind("tcp://127.0.0.1:0", sp::SocketOptions::default()).await?;
    println!("RESPONDENT listening on {}", respondent.local_addr);

    let opts = sp::SocketOptions::default().with_surveyor_deadline(Duration::from_millis(200));
    let (mut surveyor, _monitor) =
        sp::surveyor_connect(&format!("tcp://{}", respondent.local_addr), opts).await?;

    compio::runtime::spawn(async move {
        let mut peer = respondent
            .incoming
            .recv_async()
            .await
            .expect("SURVEYOR never connected");
        while let Ok(survey) = peer.recv().await {
            println!("RESPONDENT got {:?}", survey);
            if peer.send(&b"present"[..]).await.is_err() {
                break;
            }
        }
    })
    .detach();

    surveyor.send(&b"anyone there?"[..]).await?;
    while let Some(answer) = surveyor.recv().await? {
        println!("SURVEYOR got {:?}", answer);
    }
    println!("survey closed (deadline reached)");

    Ok(())
}
