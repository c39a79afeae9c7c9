//! Raw frames read off the feed.

use bytes::Bytes;

/// One message read from the feed, uninterpreted.
///
/// Text and binary websocket messages both become a `RawFrame`; decoding the
/// bytes is left to the consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame(Bytes);

impl RawFrame {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Lossy UTF-8 view used for log output.
    pub fn to_text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }
}

impl From<String> for RawFrame {
    fn from(text: String) -> Self {
        Self(Bytes::from(text))
    }
}

impl From<Vec<u8>> for RawFrame {
    fn from(bytes: Vec<u8>) -> Self {
        Self(Bytes::from(bytes))
    }
}

impl From<&'static str> for RawFrame {
    fn from(text: &'static str) -> Self {
        Self(Bytes::from_static(text.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_views() {
        let frame = RawFrame::from(r#"{"e":"changed"}"#);
        assert_eq!(frame.len(), 15);
        assert!(!frame.is_empty());
        assert_eq!(frame.as_bytes(), br#"{"e":"changed"}"#);
        assert_eq!(frame.to_text_lossy(), r#"{"e":"changed"}"#);
    }

    #[test]
    fn test_lossy_text_replaces_invalid_utf8() {
        let frame = RawFrame::from(vec![b'o', b'k', 0xff]);
        assert_eq!(frame.to_text_lossy(), "ok\u{fffd}");
    }
}
