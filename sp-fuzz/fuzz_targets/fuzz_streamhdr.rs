//! Fuzzes the StreamHdr protocol-header parser and the frame decoder —
//! the two sans-IO parsers that see bytes straight off the wire before any
//! handshake trust has been established.

#![no_main]

use bytes::Bytes;
use libfuzzer_sys::fuzz_target;
use sp_stream::framing::{FrameDecoder, FramingKind};
use sp_stream::streamhdr::{compose_protohdr, parse_protohdr};

fuzz_target!(|data: &[u8]| {
    if let Ok(hdr) = <[u8; 8]>::try_from(data) {
        if let Ok(protocol) = parse_protohdr(&hdr) {
            // A header we accepted must re-compose into exactly the same
            // bytes `parse_protohdr` was given.
            assert_eq!(compose_protohdr(protocol), hdr);
        }
    }

    // The length-prefixed framer must never panic no matter how the
    // announced length relates to the bytes actually supplied, and must
    // never report more than one message per `try_decode` call.
    let mut decoder = FrameDecoder::new(Some(1 << 20), FramingKind::Stream);
    decoder.push(Bytes::copy_from_slice(data));
    while let Ok(Some(_msg)) = decoder.try_decode() {
        // keep draining until `Ok(None)` (need more bytes) or `Err`
    }
});
