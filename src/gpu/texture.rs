//! Shared texture handles and framework-agnostic render targets.
//!
//! A [`TextureHandle`] is the value passed around as a sampler uniform. Its
//! identity ([`TextureId`]) never changes, while the texture it points at can
//! be reallocated (framebuffer resize, new video frame size). Each
//! reallocation bumps the handle's generation so bind groups built against
//! the old allocation are rebuilt.
//!
//! Uploaded images carry a full mip chain, downsampled on the CPU, so a
//! background shown smaller than its source does not shimmer.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use wgpu::util::DeviceExt;

use super::render_context::RenderContext;
use super::resources::Tracked;

static NEXT_TEXTURE_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity of a [`TextureHandle`], preserved across resizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(u64);

impl TextureId {
    fn next() -> Self {
        Self(NEXT_TEXTURE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Errors from uploading CPU pixel data into a texture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    /// Width or height is zero.
    EmptyImage,
    /// The pixel buffer length does not match `width * height * 4`.
    SizeMismatch {
        /// Expected byte count.
        expected: usize,
        /// Provided byte count.
        actual: usize,
    },
    /// An edge exceeds the device texture limit.
    TooLarge {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
        /// Device maximum edge length.
        max: u32,
    },
}

impl fmt::Display for UploadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyImage => write!(f, "image has zero width or height"),
            Self::SizeMismatch { expected, actual } => write!(
                f,
                "pixel buffer holds {actual} bytes, expected {expected}"
            ),
            Self::TooLarge { width, height, max } => write!(
                f,
                "{width}x{height} exceeds the device texture limit of {max}"
            ),
        }
    }
}

impl std::error::Error for UploadError {}

/// A texture allocation plus the view and sampler used to bind it.
pub(crate) struct TextureContents {
    pub(crate) texture: Tracked<wgpu::Texture>,
    pub(crate) view: wgpu::TextureView,
    pub(crate) sampler: wgpu::Sampler,
}

impl TextureContents {
    pub(crate) fn new(
        texture: Tracked<wgpu::Texture>,
        sampler: wgpu::Sampler,
    ) -> Self {
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            sampler,
        }
    }

    fn size(&self) -> (u32, u32) {
        (self.texture.width(), self.texture.height())
    }
}

struct SlotState {
    contents: TextureContents,
    generation: u64,
}

struct TextureSlot {
    id: TextureId,
    label: String,
    state: RwLock<SlotState>,
}

/// Cheaply clonable reference to an engine-owned texture.
///
/// Two handles are equal when they refer to the same slot, regardless of
/// how often the slot has been reallocated.
#[derive(Clone)]
pub struct TextureHandle(Arc<TextureSlot>);

impl TextureHandle {
    pub(crate) fn new(label: &str, contents: TextureContents) -> Self {
        Self(Arc::new(TextureSlot {
            id: TextureId::next(),
            label: label.to_owned(),
            state: RwLock::new(SlotState {
                contents,
                generation: 0,
            }),
        }))
    }

    /// Upload tightly packed RGBA8 pixels into a new sampled texture with a
    /// full mip chain.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError`] if the image is empty, the buffer length is
    /// wrong, or the image exceeds the device texture limit.
    pub fn from_rgba(
        ctx: &RenderContext,
        label: &str,
        rgba: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Self, UploadError> {
        let contents = upload_rgba(ctx, label, rgba, width, height)?;
        Ok(Self::new(label, contents))
    }

    /// A 1x1 fully transparent texture.
    #[must_use]
    pub fn empty(ctx: &RenderContext, label: &str) -> Self {
        Self::new(label, transparent_pixel(ctx, label))
    }

    /// Replace the pixel contents and mip chain, reallocating when the size
    /// changes.
    ///
    /// # Errors
    ///
    /// Same conditions as [`TextureHandle::from_rgba`]; on error the current
    /// contents are kept.
    pub fn write_rgba(
        &self,
        ctx: &RenderContext,
        rgba: &[u8],
        width: u32,
        height: u32,
    ) -> Result<(), UploadError> {
        check_pixels(ctx, rgba, width, height)?;
        let same_size = {
            let state = self.read();
            let texture = &state.contents.texture;
            state.contents.size() == (width, height)
                && texture.format() == wgpu::TextureFormat::Rgba8Unorm
                && texture.mip_level_count() == mip_level_count(width, height)
        };
        if same_size {
            let state = self.read();
            write_levels(ctx, &state.contents.texture, rgba, width, height);
        } else {
            let contents =
                upload_rgba(ctx, &self.0.label, rgba, width, height)?;
            self.replace(contents);
        }
        Ok(())
    }

    /// Swap in a new allocation, keeping the handle identity.
    pub(crate) fn replace(&self, contents: TextureContents) {
        let mut state = self
            .0
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        state.contents = contents;
        state.generation += 1;
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, SlotState> {
        self.0.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stable identity of this handle.
    #[must_use]
    pub fn id(&self) -> TextureId {
        self.0.id
    }

    /// Number of reallocations since creation.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.read().generation
    }

    /// Debug label given at creation.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.0.label
    }

    /// Current size in pixels.
    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        self.read().contents.size()
    }

    /// Width divided by height of the current allocation.
    #[must_use]
    pub fn aspect_ratio(&self) -> f32 {
        let (width, height) = self.size();
        crate::background::frame_aspect_ratio(width, height)
    }

    /// Mip levels of the current allocation.
    #[must_use]
    pub fn mip_level_count(&self) -> u32 {
        self.read().contents.texture.mip_level_count()
    }

    /// Pixel format of the current allocation.
    #[must_use]
    pub fn format(&self) -> wgpu::TextureFormat {
        self.read().contents.texture.format()
    }

    /// View of the current allocation.
    #[must_use]
    pub fn view(&self) -> wgpu::TextureView {
        self.read().contents.view.clone()
    }

    /// Sampler the texture should be read with.
    #[must_use]
    pub fn sampler(&self) -> wgpu::Sampler {
        self.read().contents.sampler.clone()
    }

    /// The underlying wgpu texture of the current allocation.
    #[must_use]
    pub fn texture(&self) -> wgpu::Texture {
        (*self.read().contents.texture).clone()
    }

    /// `(id, generation)` pair used to key cached bind groups.
    pub(crate) fn binding_key(&self) -> (TextureId, u64) {
        (self.id(), self.generation())
    }
}

impl PartialEq for TextureHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for TextureHandle {}

impl fmt::Debug for TextureHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (width, height) = self.size();
        f.debug_struct("TextureHandle")
            .field("id", &self.0.id)
            .field("label", &self.0.label)
            .field("size", &(width, height))
            .field("generation", &self.generation())
            .finish()
    }
}

fn extent(width: u32, height: u32) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    }
}

/// Levels in a full mip chain for a `width` x `height` texture, down to 1x1.
#[must_use]
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    u32::BITS - width.max(height).max(1).leading_zeros()
}

/// Mip levels 1 through `levels - 1` of an RGBA8 image, each an area
/// average of the one before.
fn smaller_mips(
    rgba: &[u8],
    width: u32,
    height: u32,
    levels: u32,
) -> Vec<image::RgbaImage> {
    let mut mips: Vec<image::RgbaImage> = Vec::new();
    let Some(base) = image::RgbaImage::from_raw(width, height, rgba.to_vec())
    else {
        return mips;
    };
    for _ in 1..levels {
        let previous = mips.last().unwrap_or(&base);
        let next = image::imageops::thumbnail(
            previous,
            (previous.width() / 2).max(1),
            (previous.height() / 2).max(1),
        );
        mips.push(next);
    }
    mips
}

/// Write `rgba` into level 0 of `texture` and rebuild its other levels.
fn write_levels(
    ctx: &RenderContext,
    texture: &wgpu::Texture,
    rgba: &[u8],
    width: u32,
    height: u32,
) {
    let write = |mip_level: u32, pixels: &[u8], width: u32, height: u32| {
        ctx.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * 4),
                rows_per_image: Some(height),
            },
            extent(width, height),
        );
    };
    write(0, rgba, width, height);
    let mips = smaller_mips(rgba, width, height, texture.mip_level_count());
    for (mip_level, mip) in (1..).zip(&mips) {
        write(mip_level, mip.as_raw(), mip.width(), mip.height());
    }
}

fn check_pixels(
    ctx: &RenderContext,
    rgba: &[u8],
    width: u32,
    height: u32,
) -> Result<(), UploadError> {
    if width == 0 || height == 0 {
        return Err(UploadError::EmptyImage);
    }
    let max = ctx.max_texture_dimension();
    if width > max || height > max {
        return Err(UploadError::TooLarge { width, height, max });
    }
    let expected = width as usize * height as usize * 4;
    if rgba.len() != expected {
        return Err(UploadError::SizeMismatch {
            expected,
            actual: rgba.len(),
        });
    }
    Ok(())
}

fn upload_rgba(
    ctx: &RenderContext,
    label: &str,
    rgba: &[u8],
    width: u32,
    height: u32,
) -> Result<TextureContents, UploadError> {
    check_pixels(ctx, rgba, width, height)?;
    let texture = ctx.device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: extent(width, height),
        mip_level_count: mip_level_count(width, height),
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    write_levels(ctx, &texture, rgba, width, height);
    let sampler = super::pipeline_helpers::mipmap_sampler(
        &ctx.device,
        &format!("{label} Sampler"),
    );
    Ok(TextureContents::new(
        Tracked::new(texture, ctx.counters()),
        sampler,
    ))
}

fn transparent_pixel(ctx: &RenderContext, label: &str) -> TextureContents {
    let texture = ctx.device.create_texture_with_data(
        &ctx.queue,
        &wgpu::TextureDescriptor {
            label: Some(label),
            size: extent(1, 1),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        },
        wgpu::util::TextureDataOrder::LayerMajor,
        &[0, 0, 0, 0],
    );
    let sampler = super::pipeline_helpers::linear_sampler(
        &ctx.device,
        &format!("{label} Sampler"),
    );
    TextureContents::new(Tracked::new(texture, ctx.counters()), sampler)
}

/// Errors from copying a render target back to the CPU.
#[derive(Debug)]
pub enum ReadbackError {
    /// The format has no fixed per-pixel byte size.
    UnsupportedFormat(wgpu::TextureFormat),
    /// Waiting for the GPU failed.
    Poll(wgpu::PollError),
    /// Mapping the staging buffer failed.
    Map(wgpu::BufferAsyncError),
    /// The map callback never ran.
    Disconnected,
}

impl fmt::Display for ReadbackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedFormat(format) => {
                write!(f, "cannot read back {format:?} textures")
            }
            Self::Poll(e) => write!(f, "device poll failed: {e}"),
            Self::Map(e) => write!(f, "buffer map failed: {e}"),
            Self::Disconnected => write!(f, "buffer map callback dropped"),
        }
    }
}

impl std::error::Error for ReadbackError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Poll(e) => Some(e),
            Self::Map(e) => Some(e),
            Self::UnsupportedFormat(_) | Self::Disconnected => None,
        }
    }
}

/// A render-target texture and its default view.
///
/// Used as the "screen" when rendering without a window. The texture is
/// created with `RENDER_ATTACHMENT | TEXTURE_BINDING | COPY_SRC` usage flags,
/// making it suitable for off-screen rendering followed by read-back.
pub struct RenderTarget {
    /// The underlying GPU texture.
    pub texture: wgpu::Texture,
    /// A default full-texture view.
    pub view: wgpu::TextureView,
}

impl RenderTarget {
    /// Create a new render-target texture with the given dimensions and format.
    #[must_use]
    pub fn new(
        device: &wgpu::Device,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("RenderTarget"),
            size: extent(width.max(1), height.max(1)),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }

    /// Copy the texture contents back to the CPU as tightly packed rows.
    ///
    /// Blocks until the GPU has finished all submitted work.
    ///
    /// # Errors
    ///
    /// Returns [`ReadbackError`] if the format cannot be copied or mapping
    /// the staging buffer fails.
    pub fn read_pixels(
        &self,
        ctx: &RenderContext,
    ) -> Result<Vec<u8>, ReadbackError> {
        let format = self.texture.format();
        let bytes_per_pixel = format
            .block_copy_size(None)
            .ok_or(ReadbackError::UnsupportedFormat(format))?;
        let width = self.texture.width();
        let height = self.texture.height();
        let row_bytes = width * bytes_per_pixel;
        let padded_row = row_bytes.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)
            * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;

        let staging = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Readback Buffer"),
            size: u64::from(padded_row) * u64::from(height),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = ctx.create_encoder();
        encoder.copy_texture_to_buffer(
            self.texture.as_image_copy(),
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row),
                    rows_per_image: Some(height),
                },
            },
            extent(width, height),
        );
        ctx.submit(encoder);

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = ctx
            .device
            .poll(wgpu::PollType::Wait)
            .map_err(ReadbackError::Poll)?;
        rx.recv()
            .map_err(|_| ReadbackError::Disconnected)?
            .map_err(ReadbackError::Map)?;

        let mapped = slice.get_mapped_range();
        let mut pixels = Vec::with_capacity((row_bytes * height) as usize);
        for row in mapped.chunks(padded_row as usize) {
            pixels.extend_from_slice(&row[..row_bytes as usize]);
        }
        drop(mapped);
        staging.unmap();
        Ok(pixels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gpu() -> Option<RenderContext> {
        pollster::block_on(RenderContext::headless(4, 4)).ok()
    }

    #[test]
    fn mip_chain_runs_down_to_one_pixel() {
        assert_eq!(mip_level_count(1, 1), 1);
        assert_eq!(mip_level_count(2, 1), 2);
        assert_eq!(mip_level_count(8, 4), 4);
        assert_eq!(mip_level_count(5, 3), 3);
        assert_eq!(mip_level_count(1920, 1080), 11);
        assert_eq!(mip_level_count(0, 0), 1);
    }

    #[test]
    fn smaller_mips_halve_and_average() {
        // Left column black, right column white: every level is mid grey
        // once the columns merge.
        let mut rgba = Vec::new();
        for _ in 0..4 {
            rgba.extend_from_slice(&[0, 0, 0, 255, 0, 0, 0, 255]);
            rgba.extend_from_slice(&[255, 255, 255, 255, 255, 255, 255, 255]);
        }
        let mips = smaller_mips(&rgba, 4, 4, mip_level_count(4, 4));
        let sizes: Vec<_> =
            mips.iter().map(|m| (m.width(), m.height())).collect();
        assert_eq!(sizes, [(2, 2), (1, 1)]);

        let top = mips[1].get_pixel(0, 0).0;
        assert!((120..=135).contains(&top[0]), "{top:?}");
        assert_eq!(top[3], 255);
    }

    #[test]
    fn uploaded_images_carry_a_full_mip_chain() {
        let Some(ctx) = gpu() else {
            return;
        };
        let texture =
            TextureHandle::from_rgba(&ctx, "Mipped", &[200; 8 * 4 * 4], 8, 4)
                .unwrap();
        assert_eq!(texture.mip_level_count(), 4);

        // Same size: written in place, chain kept.
        texture.write_rgba(&ctx, &[10; 8 * 4 * 4], 8, 4).unwrap();
        assert_eq!(texture.generation(), 0);
        assert_eq!(texture.mip_level_count(), 4);

        // New size: reallocated with a chain for the new size.
        texture.write_rgba(&ctx, &[10; 2 * 2 * 4], 2, 2).unwrap();
        assert_eq!(texture.generation(), 1);
        assert_eq!(texture.mip_level_count(), 2);
    }

    #[test]
    fn empty_texture_is_a_single_level() {
        let Some(ctx) = gpu() else {
            return;
        };
        let texture = TextureHandle::empty(&ctx, "Empty");
        assert_eq!(texture.size(), (1, 1));
        assert_eq!(texture.mip_level_count(), 1);
    }
}
