use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread::JoinHandle;

use super::{frame_aspect_ratio, TextureError};
use crate::gpu::render_context::RenderContext;
use crate::gpu::texture::TextureHandle;

/// Where a background image comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextureSource {
    /// A PNG or JPEG file on disk.
    Path(PathBuf),
    /// Encoded PNG or JPEG bytes.
    Bytes(Vec<u8>),
    /// An HTTP(S) URL.
    #[cfg(feature = "remote")]
    Url(String),
}

/// Tightly packed RGBA8 pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// `width * height * 4` bytes, rows top to bottom.
    pub rgba: Vec<u8>,
}

impl DecodedImage {
    /// Width over height, `1.0` when undefined.
    #[must_use]
    pub fn aspect_ratio(&self) -> f32 {
        frame_aspect_ratio(self.width, self.height)
    }

    /// Upload into a new sampled texture.
    ///
    /// # Errors
    ///
    /// Returns [`TextureError::Upload`] if the image is empty or too large.
    pub fn upload(
        &self,
        ctx: &RenderContext,
        label: &str,
    ) -> Result<TextureHandle, TextureError> {
        Ok(TextureHandle::from_rgba(
            ctx,
            label,
            &self.rgba,
            self.width,
            self.height,
        )?)
    }
}

/// Decode `source` into RGBA8 pixels on the calling thread.
///
/// # Errors
///
/// Returns [`TextureError`] if the source cannot be read, fetched, or
/// decoded.
pub fn decode(source: &TextureSource) -> Result<DecodedImage, TextureError> {
    let image = match source {
        TextureSource::Path(path) => image::open(path)?,
        TextureSource::Bytes(bytes) => image::load_from_memory(bytes)?,
        #[cfg(feature = "remote")]
        TextureSource::Url(url) => {
            let bytes = ureq::get(url)
                .call()
                .map_err(|e| TextureError::Fetch(format!("{url}: {e}")))?
                .into_body()
                .read_to_vec()
                .map_err(|e| TextureError::Fetch(format!("{url}: {e}")))?;
            image::load_from_memory(&bytes)?
        }
    };
    let rgba = image.to_rgba8();
    Ok(DecodedImage {
        width: rgba.width(),
        height: rgba.height(),
        rgba: rgba.into_raw(),
    })
}

/// A texture ready for sampling, with the aspect ratio of its image.
#[derive(Debug, Clone)]
pub struct LoadedTexture {
    /// The uploaded texture.
    pub texture: TextureHandle,
    /// Width over height of the source image.
    pub aspect_ratio: f32,
    /// Request generation this texture answers.
    pub generation: u64,
}

/// Decode and upload an image file on the calling thread.
///
/// # Errors
///
/// Returns [`TextureError`] if the file cannot be read, decoded, or
/// uploaded.
pub fn load_texture_from_path(
    ctx: &RenderContext,
    path: &Path,
) -> Result<(TextureHandle, f32), TextureError> {
    let image = decode(&TextureSource::Path(path.to_path_buf()))?;
    let label = path.display().to_string();
    Ok((image.upload(ctx, &label)?, image.aspect_ratio()))
}

/// Decode and upload encoded image bytes on the calling thread.
///
/// # Errors
///
/// Returns [`TextureError`] if the bytes cannot be decoded or uploaded.
pub fn load_texture_from_bytes(
    ctx: &RenderContext,
    bytes: &[u8],
    label: &str,
) -> Result<(TextureHandle, f32), TextureError> {
    let image = decode(&TextureSource::Bytes(bytes.to_vec()))?;
    Ok((image.upload(ctx, label)?, image.aspect_ratio()))
}

enum LoadRequest {
    Load {
        generation: u64,
        source: TextureSource,
    },
    Shutdown,
}

struct LoadResult {
    generation: u64,
    image: Result<DecodedImage, TextureError>,
}

/// Decodes background images on a worker thread.
///
/// Every [`TextureLoader::request`] starts a new generation; only the result
/// for the latest generation is ever handed out, so a slow decode finishing
/// after a newer request is dropped instead of replacing the newer image.
pub struct TextureLoader {
    request_tx: mpsc::Sender<LoadRequest>,
    result_rx: mpsc::Receiver<LoadResult>,
    generation: u64,
    thread: Option<JoinHandle<()>>,
}

impl TextureLoader {
    /// Spawn the worker thread.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the thread cannot be spawned.
    pub fn new() -> Result<Self, std::io::Error> {
        let (request_tx, request_rx) = mpsc::channel();
        let (result_tx, result_rx) = mpsc::channel();
        let thread = std::thread::Builder::new()
            .name("texture-loader".into())
            .spawn(move || Self::thread_loop(&request_rx, &result_tx))?;
        Ok(Self {
            request_tx,
            result_rx,
            generation: 0,
            thread: Some(thread),
        })
    }

    /// Queue `source` for decoding and make it the wanted image. Returns the
    /// new generation.
    pub fn request(&mut self, source: TextureSource) -> u64 {
        self.generation += 1;
        let _ = self.request_tx.send(LoadRequest::Load {
            generation: self.generation,
            source,
        });
        self.generation
    }

    /// Stop wanting any in-flight image.
    pub fn cancel(&mut self) {
        self.generation += 1;
    }

    /// Generation of the latest request or cancel.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Non-blocking check for the decoded image of the latest request.
    /// Results of older requests are discarded.
    pub fn poll_decoded(
        &mut self,
    ) -> Option<Result<DecodedImage, TextureError>> {
        let mut current = None;
        while let Ok(result) = self.result_rx.try_recv() {
            if result.generation == self.generation {
                current = Some(result.image);
            } else {
                log::debug!(
                    "dropping stale background image (generation {}, want {})",
                    result.generation,
                    self.generation
                );
            }
        }
        current
    }

    /// Non-blocking check for the latest request; uploads it when ready.
    pub fn poll(
        &mut self,
        ctx: &RenderContext,
    ) -> Option<Result<LoadedTexture, TextureError>> {
        let generation = self.generation;
        let image = self.poll_decoded()?;
        Some(image.and_then(|image| {
            Ok(LoadedTexture {
                texture: image.upload(ctx, "Background Texture")?,
                aspect_ratio: image.aspect_ratio(),
                generation,
            })
        }))
    }

    /// Shut down the worker thread and wait for it to finish.
    pub fn shutdown(&mut self) {
        let _ = self.request_tx.send(LoadRequest::Shutdown);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }

    fn thread_loop(
        request_rx: &mpsc::Receiver<LoadRequest>,
        result_tx: &mpsc::Sender<LoadResult>,
    ) {
        while let Ok(request) = request_rx.recv() {
            match drain_latest(request, request_rx) {
                LoadRequest::Shutdown => break,
                LoadRequest::Load { generation, source } => {
                    let image = decode(&source);
                    if let Err(e) = &image {
                        log::warn!("background image failed to load: {e}");
                    }
                    if result_tx.send(LoadResult { generation, image }).is_err() {
                        break;
                    }
                }
            }
        }
    }
}

impl Drop for TextureLoader {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Skip queued loads superseded by newer ones; a shutdown always wins.
fn drain_latest(
    initial: LoadRequest,
    rx: &mpsc::Receiver<LoadRequest>,
) -> LoadRequest {
    let mut latest = initial;
    while let Ok(newer) = rx.try_recv() {
        if !matches!(latest, LoadRequest::Shutdown) {
            latest = newer;
        }
    }
    latest
}
