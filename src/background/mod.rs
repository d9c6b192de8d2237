//! Background imagery: decoded images, a background loader thread, and
//! per-frame video uploads.
//!
//! Decoding happens off the render thread; only the final upload touches the
//! GPU. A texture that is not ready yet is simply left out of the uniform
//! map, so passes sample a transparent placeholder until it arrives.

mod loader;
mod video;

use std::fmt;

pub use loader::{
    decode, load_texture_from_bytes, load_texture_from_path, DecodedImage,
    LoadedTexture, TextureLoader, TextureSource,
};
pub use video::{
    create_empty_texture, load_image_sequence, update_video_texture,
    ImageSequence, VideoFrame, VideoSource,
};

use crate::gpu::texture::UploadError;

/// Errors from acquiring a background texture.
#[derive(Debug)]
pub enum TextureError {
    /// Reading the source failed.
    Io(std::io::Error),
    /// The bytes are not a supported image.
    Decode(image::ImageError),
    /// Fetching a remote image failed.
    #[cfg(feature = "remote")]
    Fetch(String),
    /// The decoded image could not be uploaded.
    Upload(UploadError),
}

impl fmt::Display for TextureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Decode(e) => write!(f, "image decode failed: {e}"),
            #[cfg(feature = "remote")]
            Self::Fetch(msg) => write!(f, "image fetch failed: {msg}"),
            Self::Upload(e) => write!(f, "texture upload failed: {e}"),
        }
    }
}

impl std::error::Error for TextureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Decode(e) => Some(e),
            Self::Upload(e) => Some(e),
            #[cfg(feature = "remote")]
            Self::Fetch(_) => None,
        }
    }
}

impl From<std::io::Error> for TextureError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<image::ImageError> for TextureError {
    fn from(e: image::ImageError) -> Self {
        Self::Decode(e)
    }
}

impl From<UploadError> for TextureError {
    fn from(e: UploadError) -> Self {
        Self::Upload(e)
    }
}

/// Width over height, or `1.0` when the ratio is undefined.
#[must_use]
pub fn frame_aspect_ratio(width: u32, height: u32) -> f32 {
    let ratio = width as f32 / height as f32;
    if ratio.is_finite() && ratio > 0.0 {
        ratio
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aspect_ratio_falls_back_to_one() {
        assert_eq!(frame_aspect_ratio(200, 100), 2.0);
        assert_eq!(frame_aspect_ratio(0, 0), 1.0);
        assert_eq!(frame_aspect_ratio(10, 0), 1.0);
        assert_eq!(frame_aspect_ratio(0, 10), 1.0);
    }
}
