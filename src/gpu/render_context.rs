use std::fmt;
use std::sync::Arc;

use super::resources::ResourceCounters;

/// Errors that can occur during GPU context initialization.
#[derive(Debug)]
pub enum RenderContextError {
    /// Failed to create a wgpu surface from the window handle.
    SurfaceCreation(wgpu::CreateSurfaceError),
    /// No compatible GPU adapter found.
    AdapterRequest(wgpu::RequestAdapterError),
    /// GPU device request failed (limits or features not met).
    DeviceRequest(wgpu::RequestDeviceError),
    /// Surface configuration not supported by the selected adapter.
    UnsupportedSurface,
}

impl fmt::Display for RenderContextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SurfaceCreation(e) => {
                write!(f, "surface creation failed: {e}")
            }
            Self::AdapterRequest(e) => {
                write!(f, "no compatible GPU adapter found: {e}")
            }
            Self::DeviceRequest(e) => write!(f, "device request failed: {e}"),
            Self::UnsupportedSurface => {
                write!(f, "surface configuration not supported by adapter")
            }
        }
    }
}

impl std::error::Error for RenderContextError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::SurfaceCreation(e) => Some(e),
            Self::AdapterRequest(e) => Some(e),
            Self::DeviceRequest(e) => Some(e),
            Self::UnsupportedSurface => None,
        }
    }
}

/// Format used for offscreen framebuffer color attachments.
pub const FLOAT_TARGET_FORMAT: wgpu::TextureFormat =
    wgpu::TextureFormat::Rgba16Float;

/// Format used for offscreen framebuffer depth attachments.
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24Plus;

/// Owns the core wgpu resources: device, queue, optional surface, and the
/// capability flags the renderer checks before building passes.
pub struct RenderContext {
    /// The wgpu logical device.
    pub device: wgpu::Device,
    /// The wgpu command queue.
    pub queue: wgpu::Queue,
    /// The window surface for presentation (`None` in headless mode).
    pub surface: Option<wgpu::Surface<'static>>,
    /// Current surface configuration (format, size, present mode).
    pub config: wgpu::SurfaceConfiguration,
    float_targets: bool,
    counters: Arc<ResourceCounters>,
}

impl RenderContext {
    /// Create a new render context from the given window surface target and
    /// initial size.
    ///
    /// The surface prefers a non-sRGB format so shader output is written
    /// without an implicit gamma conversion.
    ///
    /// # Errors
    ///
    /// Returns `RenderContextError` if surface creation, adapter request,
    /// device request, or surface configuration fails.
    pub async fn new(
        window: impl Into<wgpu::SurfaceTarget<'static>>,
        initial_size: (u32, u32),
    ) -> Result<Self, RenderContextError> {
        let instance = wgpu::Instance::default();
        let surface = instance
            .create_surface(window)
            .map_err(RenderContextError::SurfaceCreation)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                compatible_surface: Some(&surface),
                power_preference: wgpu::PowerPreference::HighPerformance,
                ..Default::default()
            })
            .await
            .map_err(RenderContextError::AdapterRequest)?;

        let (device, queue) = request_device(&adapter).await?;

        let width = initial_size.0.max(1);
        let height = initial_size.1.max(1);
        let mut config = surface
            .get_default_config(&adapter, width, height)
            .ok_or(RenderContextError::UnsupportedSurface)?;
        let caps = surface.get_capabilities(&adapter);
        if let Some(linear) = caps.formats.iter().find(|f| !f.is_srgb()) {
            config.format = *linear;
        }
        config.present_mode = wgpu::PresentMode::Fifo;

        surface.configure(&device, &config);
        log::info!(
            "render context ready: {} ({:?}), surface {:?} {width}x{height}",
            adapter.get_info().name,
            adapter.get_info().backend,
            config.format,
        );

        Ok(Self {
            float_targets: float_targets_supported(&adapter),
            device,
            queue,
            surface: Some(surface),
            config,
            counters: Arc::default(),
        })
    }

    /// Create a context without a presentation surface. The "screen" is any
    /// caller-provided [`wgpu::TextureFormat::Rgba8Unorm`] view.
    ///
    /// # Errors
    ///
    /// Returns `RenderContextError` if no adapter or device is available.
    pub async fn headless(
        width: u32,
        height: u32,
    ) -> Result<Self, RenderContextError> {
        let instance = wgpu::Instance::default();
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                compatible_surface: None,
                power_preference: wgpu::PowerPreference::default(),
                force_fallback_adapter: false,
            })
            .await
            .map_err(RenderContextError::AdapterRequest)?;
        let (device, queue) = request_device(&adapter).await?;
        log::debug!("headless render context on {}", adapter.get_info().name);
        Ok(Self::from_device(
            &adapter,
            device,
            queue,
            wgpu::TextureFormat::Rgba8Unorm,
            width,
            height,
        ))
    }

    /// Create a render context from an externally-owned device and queue
    /// (no surface, for texture-only / embedded rendering).
    #[must_use]
    pub fn from_device(
        adapter: &wgpu::Adapter,
        device: wgpu::Device,
        queue: wgpu::Queue,
        format: wgpu::TextureFormat,
        width: u32,
        height: u32,
    ) -> Self {
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: width.max(1),
            height: height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            desired_maximum_frame_latency: 2,
            alpha_mode: wgpu::CompositeAlphaMode::Auto,
            view_formats: vec![],
        };
        Self {
            float_targets: float_targets_supported(adapter),
            device,
            queue,
            surface: None,
            config,
            counters: Arc::default(),
        }
    }

    /// The screen (surface or headless target) texture format.
    pub fn format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    /// Current screen width in pixels.
    pub fn width(&self) -> u32 {
        self.config.width
    }

    /// Current screen height in pixels.
    pub fn height(&self) -> u32 {
        self.config.height
    }

    /// Whether half-float color targets can be rendered to and filtered.
    pub fn supports_float_targets(&self) -> bool {
        self.float_targets
    }

    /// Largest 2D texture edge the device accepts.
    pub fn max_texture_dimension(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }

    /// Live-object accounting shared by every resource created through this
    /// context.
    pub fn counters(&self) -> &Arc<ResourceCounters> {
        &self.counters
    }

    /// Reconfigure the surface for the new window size. Ignores zero-sized
    /// dimensions.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.config.width = width;
            self.config.height = height;
            if let Some(ref surface) = self.surface {
                surface.configure(&self.device, &self.config);
            }
        }
    }

    /// Acquire the next swapchain texture for rendering.
    ///
    /// # Errors
    ///
    /// Returns [`wgpu::SurfaceError`] if the surface is lost, outdated,
    /// or timed out, or if no surface is available (headless mode).
    pub fn get_next_frame(
        &self,
    ) -> Result<wgpu::SurfaceTexture, wgpu::SurfaceError> {
        self.surface
            .as_ref()
            .map_or(Err(wgpu::SurfaceError::Lost), |surface| {
                surface.get_current_texture()
            })
    }

    /// Returns `true` if this context has a presentation surface.
    pub fn has_surface(&self) -> bool {
        self.surface.is_some()
    }

    /// Create a new command encoder for recording GPU commands.
    pub fn create_encoder(&self) -> wgpu::CommandEncoder {
        self.device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            })
    }

    /// Finish the encoder and submit its command buffer to the GPU queue.
    pub fn submit(&self, encoder: wgpu::CommandEncoder) {
        let _ = self.queue.submit(std::iter::once(encoder.finish()));
    }

    /// Run `f` inside a validation error scope and return the first
    /// validation error it raised, if any.
    pub(crate) fn scoped<T>(
        &self,
        f: impl FnOnce(&wgpu::Device) -> T,
    ) -> (T, Option<wgpu::Error>) {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = f(&self.device);
        let error = pollster::block_on(self.device.pop_error_scope());
        (value, error)
    }
}

async fn request_device(
    adapter: &wgpu::Adapter,
) -> Result<(wgpu::Device, wgpu::Queue), RenderContextError> {
    adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some("Primary Device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default()
                .using_resolution(adapter.limits()),
            ..Default::default()
        })
        .await
        .map_err(RenderContextError::DeviceRequest)
}

fn float_targets_supported(adapter: &wgpu::Adapter) -> bool {
    let features = adapter.get_texture_format_features(FLOAT_TARGET_FORMAT);
    features
        .allowed_usages
        .contains(wgpu::TextureUsages::RENDER_ATTACHMENT)
        && features
            .flags
            .contains(wgpu::TextureFormatFeatureFlags::FILTERABLE)
}
