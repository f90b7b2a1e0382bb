use serde::{Deserialize, Serialize};
use std::fmt;

/// Which elementary stream a variant carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariantKind {
    Video,
    Audio,
}

impl VariantKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
        }
    }
}

impl fmt::Display for VariantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One encoded rendition of a media item.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct VariantDescriptor {
    // Opaque identifier, unique within one catalog
    pub id: String,
    pub kind: VariantKind,
    // Mime type including codec parameters, e.g. `video/mp4; codecs="avc1.640028"`
    #[serde(default)]
    pub mime_type: String,
    // Frame height in pixels (video only)
    #[serde(default)]
    pub height: Option<u32>,
    // Bitrate in bits per second
    #[serde(default)]
    pub bitrate: Option<u64>,
    // Declared content length in bytes, when the source advertises one
    #[serde(default)]
    pub content_length: Option<u64>,
    // Location the stream source fetches bytes from
    #[serde(default)]
    pub url: Option<String>,
}

impl VariantDescriptor {
    pub fn video(id: impl Into<String>, height: u32) -> Self {
        Self {
            id: id.into(),
            kind: VariantKind::Video,
            mime_type: "video/mp4".to_string(),
            height: Some(height),
            bitrate: None,
            content_length: None,
            url: None,
        }
    }

    pub fn audio(id: impl Into<String>, bitrate: u64) -> Self {
        Self {
            id: id.into(),
            kind: VariantKind::Audio,
            mime_type: "audio/mp4".to_string(),
            height: None,
            bitrate: Some(bitrate),
            content_length: None,
            url: None,
        }
    }

    pub fn with_content_length(mut self, bytes: u64) -> Self {
        self.content_length = Some(bytes);
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// A variant carries video when it is tagged as such and declares a height.
    pub fn is_video(&self) -> bool {
        self.kind == VariantKind::Video && self.height.is_some_and(|h| h > 0)
    }

    pub fn is_audio(&self) -> bool {
        self.kind == VariantKind::Audio
    }
}

impl fmt::Display for VariantDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            VariantKind::Video => write!(
                f,
                "{} {}p ({})",
                self.id,
                self.height.unwrap_or_default(),
                self.mime_type
            ),
            VariantKind::Audio => write!(
                f,
                "{} {}bps ({})",
                self.id,
                self.bitrate.unwrap_or_default(),
                self.mime_type
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_requires_height() {
        let mut variant = VariantDescriptor::video("v1", 720);
        assert!(variant.is_video());

        variant.height = None;
        assert!(!variant.is_video());

        variant.height = Some(0);
        assert!(!variant.is_video());
    }

    #[test]
    fn test_audio_is_not_video() {
        let variant = VariantDescriptor::audio("a1", 128_000);
        assert!(variant.is_audio());
        assert!(!variant.is_video());
    }

    #[test]
    fn test_deserialize_minimal_variant() {
        let json = r#"{"id": "140", "kind": "audio", "bitrate": 129000}"#;
        let variant: VariantDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(variant.kind, VariantKind::Audio);
        assert_eq!(variant.bitrate, Some(129_000));
        assert!(variant.content_length.is_none());
        assert!(variant.url.is_none());
    }

    #[test]
    fn test_display() {
        let variant = VariantDescriptor::video("137", 1080);
        assert_eq!(variant.to_string(), "137 1080p (video/mp4)");
    }
}
