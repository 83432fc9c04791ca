/// How recovered content is presented, chosen from its MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreviewKind {
    Image,
    Text,
    Audio,
    Video,
    Download,
}

impl PreviewKind {
    /// First match wins: image, text-like, audio, video, then generic download.
    pub fn for_mime(mime: &str) -> Self {
        let essence = mime
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        if essence.starts_with("image/") {
            PreviewKind::Image
        } else if essence.starts_with("text/")
            || essence == "application/json"
            || essence == "application/xml"
        {
            PreviewKind::Text
        } else if essence.starts_with("audio/") {
            PreviewKind::Audio
        } else if essence.starts_with("video/") {
            PreviewKind::Video
        } else {
            PreviewKind::Download
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PreviewKind::Image => "image",
            PreviewKind::Text => "text",
            PreviewKind::Audio => "audio",
            PreviewKind::Video => "video",
            PreviewKind::Download => "download",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch() {
        assert_eq!(PreviewKind::for_mime("image/png"), PreviewKind::Image);
        assert_eq!(PreviewKind::for_mime("text/plain"), PreviewKind::Text);
        assert_eq!(PreviewKind::for_mime("application/json"), PreviewKind::Text);
        assert_eq!(PreviewKind::for_mime("application/xml"), PreviewKind::Text);
        assert_eq!(PreviewKind::for_mime("audio/ogg"), PreviewKind::Audio);
        assert_eq!(PreviewKind::for_mime("video/mp4"), PreviewKind::Video);
        assert_eq!(
            PreviewKind::for_mime("application/octet-stream"),
            PreviewKind::Download
        );
    }

    #[test]
    fn test_parameters_and_case_ignored() {
        assert_eq!(
            PreviewKind::for_mime("Text/HTML; charset=utf-8"),
            PreviewKind::Text
        );
        assert_eq!(PreviewKind::for_mime("IMAGE/JPEG"), PreviewKind::Image);
    }

    #[test]
    fn test_near_misses_are_downloads() {
        assert_eq!(
            PreviewKind::for_mime("application/xhtml+xml"),
            PreviewKind::Download
        );
        assert_eq!(PreviewKind::for_mime(""), PreviewKind::Download);
        assert_eq!(PreviewKind::for_mime("imagery"), PreviewKind::Download);
    }
}
