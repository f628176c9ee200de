use async_trait::async_trait;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;

use crate::config::PerceptionConfig;
use crate::errors::{GridPilotError, GridPilotResult};
use crate::perception::traits::ScreenSource;
use crate::perception::types::{ScreenArtifact, ScreenshotMeta};

/// Captures the primary monitor through xcap.
pub struct PrimaryMonitorSource {
    max_dimension: u32,
    jpeg_quality: u8,
}

impl PrimaryMonitorSource {
    pub fn new(config: &PerceptionConfig) -> Self {
        Self {
            max_dimension: config.max_dimension,
            jpeg_quality: config.jpeg_quality,
        }
    }
}

#[async_trait]
impl ScreenSource for PrimaryMonitorSource {
    async fn capture(&self) -> GridPilotResult<ScreenArtifact> {
        let monitors = xcap::Monitor::all()
            .map_err(|e| GridPilotError::Perception(format!("enumerate monitors: {e}")))?;
        let monitor = monitors
            .iter()
            .find(|m| m.is_primary())
            .or_else(|| monitors.first())
            .ok_or_else(|| GridPilotError::Perception("no monitor found".into()))?;

        let frame = monitor
            .capture_image()
            .map_err(|e| GridPilotError::Perception(format!("capture: {e}")))?;

        let artifact = compress(
            DynamicImage::ImageRgba8(frame),
            self.max_dimension,
            self.jpeg_quality,
        )?;
        tracing::debug!(
            phys = %format!("{}×{}", artifact.meta.physical_width, artifact.meta.physical_height),
            encoded = %format!("{}×{}", artifact.meta.encoded_width, artifact.meta.encoded_height),
            bytes = artifact.jpeg_bytes.len(),
            "screenshot captured"
        );
        Ok(artifact)
    }
}

/// Downscale so the longest edge is at most `max_dimension` (never upscale),
/// then JPEG-encode and base64 the result.
pub fn compress(
    img: DynamicImage,
    max_dimension: u32,
    jpeg_quality: u8,
) -> GridPilotResult<ScreenArtifact> {
    let (physical_width, physical_height) = (img.width(), img.height());

    let img = if physical_width > max_dimension || physical_height > max_dimension {
        img.thumbnail(max_dimension, max_dimension)
    } else {
        img
    };

    // JPEG has no alpha channel.
    let rgb = img.to_rgb8();
    let (encoded_width, encoded_height) = rgb.dimensions();

    let mut jpeg_bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg_bytes, jpeg_quality).encode_image(&rgb)?;
    let image_base64 = base64::engine::general_purpose::STANDARD.encode(&jpeg_bytes);

    Ok(ScreenArtifact {
        jpeg_bytes,
        image_base64,
        meta: ScreenshotMeta {
            physical_width,
            physical_height,
            encoded_width,
            encoded_height,
        },
    })
}
