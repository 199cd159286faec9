use bytes::Bytes;
use chrono::{DateTime, Utc};

/// One encoded camera frame.
///
/// The image bytes are immutable once the frame is constructed; cloning a
/// `Frame` only bumps the refcount on the underlying buffer, so a frame
/// handed to a viewer stays valid no matter how many newer frames are
/// published after it.
#[derive(Debug, Clone)]
pub struct Frame {
    data: Bytes,
    /// Capture wall-clock time, Unix millis.
    pub captured_at_ms: i64,
    /// Capture-loop sequence number. Informational; the hub assigns its own
    /// version on publish.
    pub seq: u64,
}

impl Frame {
    pub fn new(data: impl Into<Bytes>, captured_at_ms: i64, seq: u64) -> Self {
        Self {
            data: data.into(),
            captured_at_ms,
            seq,
        }
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.captured_at_ms).unwrap_or_else(Utc::now)
    }

    /// Cheap sanity check on the payload: JPEG streams must start with the
    /// SOI marker.
    pub fn is_jpeg(&self) -> bool {
        self.data.len() >= 2 && self.data[0] == 0xFF && self.data[1] == 0xD8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clone_shares_payload() {
        let frame = Frame::new(vec![0xFF, 0xD8, 0xFF, 0xE0], 1_708_300_000_000, 3);
        let copy = frame.clone();
        assert_eq!(copy.data(), frame.data());
        assert_eq!(copy.seq, 3);
        // Bytes clones point at the same allocation.
        assert_eq!(copy.data().as_ptr(), frame.data().as_ptr());
    }

    #[test]
    fn jpeg_magic_detected() {
        assert!(Frame::new(vec![0xFF, 0xD8, 0xFF], 0, 0).is_jpeg());
        assert!(!Frame::new(vec![0x89, 0x50], 0, 0).is_jpeg());
        assert!(!Frame::new(Vec::new(), 0, 0).is_jpeg());
    }

    #[test]
    fn captured_at_roundtrips() {
        let frame = Frame::new(Vec::new(), 1_708_300_000_000, 0);
        assert_eq!(frame.captured_at().timestamp_millis(), 1_708_300_000_000);
    }
}
