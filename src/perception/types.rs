/// Geometry of the captured monitor and of the image actually uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenshotMeta {
    pub physical_width: u32,
    pub physical_height: u32,
    /// Dimensions after thumbnailing.
    pub encoded_width: u32,
    pub encoded_height: u32,
}

/// A size-bounded, compressed image of the current screen.
#[derive(Debug, Clone)]
pub struct ScreenArtifact {
    pub jpeg_bytes: Vec<u8>,
    pub image_base64: String,
    pub meta: ScreenshotMeta,
}
