use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use super::{
    decode, frame_aspect_ratio, DecodedImage, TextureError, TextureSource,
};
use crate::gpu::render_context::RenderContext;
use crate::gpu::texture::TextureHandle;

/// One RGBA8 frame borrowed from a [`VideoSource`].
#[derive(Debug, Clone, Copy)]
pub struct VideoFrame<'a> {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// `width * height * 4` bytes, rows top to bottom.
    pub rgba: &'a [u8],
}

/// Anything that can hand out the frame to show right now.
pub trait VideoSource {
    /// The current frame, or `None` while nothing is decodable yet.
    fn next_frame(&mut self) -> Option<VideoFrame<'_>>;
}

/// A 1x1 transparent texture that [`update_video_texture`] fills later.
#[must_use]
pub fn create_empty_texture(ctx: &RenderContext) -> TextureHandle {
    TextureHandle::empty(ctx, "Video Texture")
}

/// Copy the current frame of `source` into `texture`.
///
/// Returns the frame aspect ratio, or `None` when the source has no frame
/// ready or the frame could not be uploaded. The handle keeps its identity
/// when the frame size changes.
pub fn update_video_texture(
    ctx: &RenderContext,
    texture: &TextureHandle,
    source: &mut impl VideoSource,
) -> Option<f32> {
    let frame = source.next_frame()?;
    if let Err(e) =
        texture.write_rgba(ctx, frame.rgba, frame.width, frame.height)
    {
        log::warn!("video frame upload failed: {e}");
        return None;
    }
    Some(frame_aspect_ratio(frame.width, frame.height))
}

/// Decoded frames played back in a loop at a fixed rate.
pub struct ImageSequence {
    frames: Vec<DecodedImage>,
    frame_duration: Duration,
    started: Instant,
}

impl ImageSequence {
    /// Loop `frames`, showing each for `frame_duration`.
    #[must_use]
    pub fn new(frames: Vec<DecodedImage>, frame_duration: Duration) -> Self {
        Self {
            frames,
            frame_duration,
            started: Instant::now(),
        }
    }

    /// Number of frames in the loop.
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether the sequence has no frames.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Index of the frame shown `elapsed` after playback started.
    #[must_use]
    pub fn frame_at(&self, elapsed: Duration) -> Option<usize> {
        if self.frames.is_empty() {
            return None;
        }
        let nanos = self.frame_duration.as_nanos();
        if nanos == 0 {
            return Some(0);
        }
        let tick = elapsed.as_nanos() / nanos;
        Some((tick % self.frames.len() as u128) as usize)
    }

    /// Restart playback from the first frame.
    pub fn restart(&mut self) {
        self.started = Instant::now();
    }
}

/// File extensions [`load_image_sequence`] treats as frames.
const FRAME_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Image files in `dir`, sorted by file name.
fn frame_paths(dir: &Path) -> Result<Vec<PathBuf>, TextureError> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_frame = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                FRAME_EXTENSIONS
                    .iter()
                    .any(|known| ext.eq_ignore_ascii_case(known))
            });
        if is_frame && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Decode every PNG or JPEG in `dir`, in file name order, into a looping
/// sequence.
///
/// # Errors
///
/// Returns [`TextureError::Io`] if the directory cannot be read or holds no
/// frames, and [`TextureError::Decode`] if a frame is not a valid image.
pub fn load_image_sequence(
    dir: &Path,
    frame_duration: Duration,
) -> Result<ImageSequence, TextureError> {
    let paths = frame_paths(dir)?;
    if paths.is_empty() {
        return Err(TextureError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("no PNG or JPEG frames in {}", dir.display()),
        )));
    }
    let frames = paths
        .into_iter()
        .map(|path| decode(&TextureSource::Path(path)))
        .collect::<Result<Vec<_>, _>>()?;
    log::debug!("decoded {} frames from {}", frames.len(), dir.display());
    Ok(ImageSequence::new(frames, frame_duration))
}

impl VideoSource for ImageSequence {
    fn next_frame(&mut self) -> Option<VideoFrame<'_>> {
        let index = self.frame_at(self.started.elapsed())?;
        let frame = &self.frames[index];
        Some(VideoFrame {
            width: frame.width,
            height: frame.height,
            rgba: &frame.rgba,
        })
    }
}
