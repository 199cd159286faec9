//! MJPEG wire framing and the per-viewer stream session.
//!
//! The response body is an unbounded `multipart/x-mixed-replace` sequence:
//! each part is one JPEG, and the browser replaces the previous image as
//! parts arrive.

use std::convert::Infallible;
use std::time::Duration;

use bytes::Bytes;
use camserve_common::frame::Frame;
use futures_util::stream::{self, Stream};
use tracing::debug;

use crate::hub::{FrameCursor, FrameHub, WaitOutcome, WAIT_TIMEOUT};

/// Multipart boundary token. Committed in the response headers once; never
/// changes for the lifetime of a connection.
pub const BOUNDARY: &str = "frame";

/// Frame one encoded image as a multipart part:
/// boundary line, content-type header, blank line, payload, trailing CRLF.
pub fn encode_part(frame: &Frame) -> Bytes {
    let header = format!("--{BOUNDARY}\r\nContent-Type: image/jpeg\r\n\r\n");
    let mut buf = Vec::with_capacity(header.len() + frame.size_bytes() + 2);
    buf.extend_from_slice(header.as_bytes());
    buf.extend_from_slice(frame.data());
    buf.extend_from_slice(b"\r\n");
    Bytes::from(buf)
}

/// Per-viewer state: a hub cursor plus the wait bound. One instance per
/// connected client, dropped when the connection goes away.
pub struct StreamSession {
    cursor: FrameCursor,
    wait_timeout: Duration,
}

impl StreamSession {
    pub fn new(hub: &FrameHub) -> Self {
        Self {
            cursor: hub.subscribe(),
            wait_timeout: WAIT_TIMEOUT,
        }
    }

    /// Next framed part, or `None` once the hub has stopped. Quiet periods
    /// loop internally on the wait timeout without emitting bytes, so a
    /// silent camera never wedges the session in an unbounded block.
    pub async fn next_part(&mut self) -> Option<Bytes> {
        loop {
            match self.cursor.wait_newer(self.wait_timeout).await {
                WaitOutcome::Frame { frame, version } => {
                    debug!(version, bytes = frame.size_bytes(), "streaming frame");
                    return Some(encode_part(&frame));
                }
                WaitOutcome::TimedOut => continue,
                WaitOutcome::Stopped => return None,
            }
        }
    }

    /// Adapt the session into an HTTP body stream. A failed connection write
    /// drops the stream (and the cursor with it); nothing else is affected.
    pub fn into_byte_stream(self) -> impl Stream<Item = Result<Bytes, Infallible>> {
        stream::unfold(self, |mut session| async move {
            session.next_part().await.map(|part| (Ok(part), session))
        })
    }
}
