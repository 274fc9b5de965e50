//! Bind a REP endpoint, connect a REQ to it, and run one request/reply.
//!
//! ```text
//! cargo run -p sp --example req_rep_tcp
//! ```

#[compio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    sp::dev_tracing::init_tracing();

    let rep = sp::rep_bind("tcp://127.0.0.1:0", sp::SocketOptions::default()).await?;
    println!("REP listening on {}", rep.local_addr);

    let (mut req, _monitor) =
        sp::req_connect(&format!("tcp://{}", rep.local_addr), sp::SocketOptions::default())
            .await?;

    compio::runtime::spawn(async move {
        let mut peer = rep
            .incoming
            .recv_async()
            .await
            .expect("REQ never connected");
        loop {
            match peer.recv().await {
                Ok(request) => {
                    println!("REP got {:?}", request);
                    if peer.send(request).await.is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    })
    .detach();

    req.send(&b"ping"[..]).await?;
    let reply = req.recv().await?;
    println!("REQ got {:?}", reply);
    assert_eq!(reply, bytes::Bytes::from_static(b"ping"));

    Ok(())
}
