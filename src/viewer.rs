//! Standalone liquid glass window backed by winit.
//!
//! Runs the demo pipeline from [`crate::glass`] full-window. The glass shape
//! follows the pointer through a spring; digit keys select the debug step,
//! `B` cycles the background and `S` saves the options when a path was
//! given. A directory of numbered frames plays as a looping video
//! background.
//!
//! ```no_run
//! # use liquid_glass::Viewer;
//! Viewer::builder()
//!     .with_background_path("assets/backgrounds/photo.jpg")
//!     .build()
//!     .run()
//!     .unwrap();
//! ```

use std::{
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant},
};

use winit::{
    application::ApplicationHandler,
    event::{ElementState, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use crate::{
    background::{
        create_empty_texture, load_image_sequence, update_video_texture,
        ImageSequence, TextureLoader, TextureSource,
    },
    error::GlassError,
    glass::{self, PointerSpring},
    gpu::{render_context::RenderContext, texture::TextureHandle},
    options::{BackgroundTexture, FrameInputs, GlassOptions},
    renderer::MultiPassRenderer,
};

/// First `bg_type` that samples the background texture.
const TEXTURE_BACKGROUND: u32 = 3;

/// `bg_type` the viewer uses for a frame-sequence background.
const VIDEO_BACKGROUND: u32 = 8;

/// Playback rate for frame directories when none is given.
pub const DEFAULT_VIDEO_FPS: f32 = 30.0;

/// How long each frame of a `fps` sequence stays on screen.
fn frame_duration(fps: f32) -> Duration {
    let fps = if fps.is_finite() {
        fps.clamp(1.0, 240.0)
    } else {
        DEFAULT_VIDEO_FPS
    };
    Duration::from_secs_f64(1.0 / f64::from(fps))
}

/// The `bg_type` the `B` key moves to from `current`. Procedural types are
/// always offered; the image and video types only once they are loaded.
fn next_background_type(
    current: u32,
    has_image: bool,
    has_video: bool,
) -> u32 {
    (0..TEXTURE_BACKGROUND)
        .chain(has_image.then_some(TEXTURE_BACKGROUND))
        .chain(has_video.then_some(VIDEO_BACKGROUND))
        .find(|&t| t > current)
        .unwrap_or(0)
}

// ── Builder ──────────────────────────────────────────────────────────────

/// Fluent builder for [`Viewer`].
pub struct ViewerBuilder {
    options: Option<GlassOptions>,
    options_path: Option<PathBuf>,
    background: Option<TextureSource>,
    video: Option<(PathBuf, Duration)>,
    title: String,
}

impl ViewerBuilder {
    /// Create a builder with sensible defaults (title "Liquid Glass",
    /// procedural background, default options).
    fn new() -> Self {
        Self {
            options: None,
            options_path: None,
            background: None,
            video: None,
            title: "Liquid Glass".into(),
        }
    }

    /// Override the default options.
    #[must_use]
    pub fn with_options(mut self, options: GlassOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// File the `S` key saves the current options to.
    #[must_use]
    pub fn with_options_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.options_path = Some(path.into());
        self
    }

    /// Show an image behind the glass instead of a procedural pattern.
    #[must_use]
    pub fn with_background(mut self, source: TextureSource) -> Self {
        self.background = Some(source);
        self
    }

    /// Show the image file at `path` behind the glass.
    #[must_use]
    pub fn with_background_path(self, path: impl Into<PathBuf>) -> Self {
        self.with_background(TextureSource::Path(path.into()))
    }

    /// Play the PNG or JPEG frames in `dir`, in file name order, as a
    /// looping background at `fps` frames per second.
    #[must_use]
    pub fn with_video_frames(
        mut self,
        dir: impl Into<PathBuf>,
        fps: f32,
    ) -> Self {
        self.video = Some((dir.into(), frame_duration(fps)));
        self
    }

    /// Set the window title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Consume the builder and produce a [`Viewer`].
    #[must_use]
    pub fn build(self) -> Viewer {
        Viewer {
            options: self.options.unwrap_or_default(),
            options_path: self.options_path,
            background: self.background,
            video: self.video,
            title: self.title,
        }
    }
}

// ── Viewer ───────────────────────────────────────────────────────────────

/// A standalone window that renders the liquid glass effect.
///
/// Construct via [`Viewer::builder`], then call [`run`](Self::run) to
/// enter the event loop.
pub struct Viewer {
    options: GlassOptions,
    options_path: Option<PathBuf>,
    background: Option<TextureSource>,
    video: Option<(PathBuf, Duration)>,
    title: String,
}

impl Viewer {
    /// Start a new builder.
    #[must_use]
    pub fn builder() -> ViewerBuilder {
        ViewerBuilder::new()
    }

    /// Open the window and run the event loop. Blocks until the window is
    /// closed.
    ///
    /// # Errors
    ///
    /// Returns [`GlassError::Viewer`] if the event loop cannot be created or
    /// fails, [`GlassError::ThreadSpawn`] if the texture loader thread
    /// cannot be started, and [`GlassError::Texture`] if a video frame
    /// directory cannot be decoded.
    pub fn run(self) -> Result<(), GlassError> {
        let video = match &self.video {
            Some((dir, frame_duration)) => {
                let frames = load_image_sequence(dir, *frame_duration)
                    .map_err(GlassError::Texture)?;
                log::info!("video background: {} frames", frames.len());
                Some(frames)
            }
            None => None,
        };

        let event_loop =
            EventLoop::new().map_err(|e| GlassError::Viewer(e.to_string()))?;
        event_loop.set_control_flow(ControlFlow::Poll);

        let loader = TextureLoader::new().map_err(GlassError::ThreadSpawn)?;
        let mut app = ViewerApp {
            window: None,
            scene: None,
            loader,
            last_frame_time: Instant::now(),
            options: self.options,
            options_path: self.options_path,
            background: self.background,
            video,
            title: self.title,
        };

        event_loop
            .run_app(&mut app)
            .map_err(|e| GlassError::Viewer(e.to_string()))
    }
}

// ── Scene ────────────────────────────────────────────────────────────────

/// A frame sequence and the texture its frames are copied into.
struct VideoBackground {
    frames: ImageSequence,
    texture: TextureHandle,
    current: BackgroundTexture,
}

/// GPU state that only exists while a window is open.
struct GlassScene {
    ctx: RenderContext,
    renderer: MultiPassRenderer,
    image: BackgroundTexture,
    video: Option<VideoBackground>,
    spring: PointerSpring,
    pointer: [f32; 2],
    dpr: f32,
}

impl GlassScene {
    fn new(window: Arc<Window>) -> Result<Self, GlassError> {
        let inner = window.inner_size();
        let (width, height) = viewport_size(inner);
        let dpr = window.scale_factor() as f32;
        let ctx =
            pollster::block_on(RenderContext::new(window, (width, height)))?;
        let renderer = MultiPassRenderer::new(&ctx, glass::pipeline_configs())?;

        let center = [width as f32 * 0.5, height as f32 * 0.5];
        let mut spring = PointerSpring::default();
        spring.snap_to(center);
        Ok(Self {
            ctx,
            renderer,
            image: BackgroundTexture::default(),
            video: None,
            spring,
            pointer: center,
            dpr,
        })
    }

    fn attach_video(&mut self, mut frames: ImageSequence) {
        frames.restart();
        self.video = Some(VideoBackground {
            frames,
            texture: create_empty_texture(&self.ctx),
            current: BackgroundTexture::default(),
        });
    }

    /// Background the passes sample for `bg_type`. The video texture is
    /// refreshed with the current frame first.
    fn active_background(&mut self, bg_type: u32) -> &BackgroundTexture {
        match &mut self.video {
            Some(video) if bg_type >= VIDEO_BACKGROUND => {
                if let Some(aspect_ratio) = update_video_texture(
                    &self.ctx,
                    &video.texture,
                    &mut video.frames,
                ) {
                    video.current = BackgroundTexture {
                        texture: Some(video.texture.clone()),
                        aspect_ratio,
                        ready: true,
                    };
                }
                &video.current
            }
            _ => &self.image,
        }
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.ctx.resize(width, height);
        self.renderer.resize(&self.ctx, width, height);
    }

    fn frame_inputs(&self) -> FrameInputs {
        FrameInputs {
            resolution: [self.ctx.width() as f32, self.ctx.height() as f32],
            dpr: self.dpr,
            mouse: self.pointer,
            mouse_spring: self.spring.position(),
            spring_speed: self.spring.speed_per_ms(),
        }
    }

    fn render(
        &mut self,
        options: &GlassOptions,
        dt: Duration,
    ) -> Result<(), wgpu::SurfaceError> {
        self.spring.set_target(self.pointer);
        self.spring.step(dt);
        self.renderer
            .set_uniforms(options.global_uniforms(&self.frame_inputs()));
        let bg_type = options.background.bg_type;
        let per_pass = options.pass_uniforms(self.active_background(bg_type));
        self.renderer.render_to_surface(&self.ctx, &per_pass)
    }
}

// ── Winit app ────────────────────────────────────────────────────────────

/// Internal winit application handler.
struct ViewerApp {
    window: Option<Arc<Window>>,
    scene: Option<GlassScene>,
    loader: TextureLoader,
    last_frame_time: Instant,
    options: GlassOptions,
    options_path: Option<PathBuf>,
    background: Option<TextureSource>,
    video: Option<ImageSequence>,
    title: String,
}

/// Surface size for a window: the full inner size, at least 1x1.
fn viewport_size(inner: winit::dpi::PhysicalSize<u32>) -> (u32, u32) {
    (inner.width.max(1), inner.height.max(1))
}

impl ViewerApp {
    /// Swap in a finished background image, if one arrived.
    fn poll_background(&mut self) {
        let Some(scene) = &mut self.scene else {
            return;
        };
        match self.loader.poll(&scene.ctx) {
            Some(Ok(loaded)) => {
                log::info!(
                    "background ready ({}x{})",
                    loaded.texture.size().0,
                    loaded.texture.size().1
                );
                scene.image = BackgroundTexture {
                    texture: Some(loaded.texture),
                    aspect_ratio: loaded.aspect_ratio,
                    ready: true,
                };
            }
            Some(Err(e)) => {
                log::warn!("background unavailable: {e}");
                scene.image.ready = false;
            }
            None => {}
        }
    }

    fn handle_key(&mut self, code: KeyCode) {
        let digit = match code {
            KeyCode::Digit0 => Some(0),
            KeyCode::Digit1 => Some(1),
            KeyCode::Digit2 => Some(2),
            KeyCode::Digit3 => Some(3),
            KeyCode::Digit4 => Some(4),
            KeyCode::Digit5 => Some(5),
            KeyCode::Digit6 => Some(6),
            KeyCode::Digit7 => Some(7),
            KeyCode::Digit8 => Some(8),
            KeyCode::Digit9 => Some(9),
            _ => None,
        };
        if let Some(step) = digit {
            self.options.debug.step = step;
            return;
        }
        match code {
            KeyCode::KeyB => {
                let (has_image, has_video) = self
                    .scene
                    .as_ref()
                    .map_or((false, false), |s| {
                        (s.image.texture.is_some(), s.video.is_some())
                    });
                let bg = &mut self.options.background;
                bg.bg_type =
                    next_background_type(bg.bg_type, has_image, has_video);
                log::debug!("background type {}", bg.bg_type);
            }
            KeyCode::KeyS => {
                if let Some(path) = &self.options_path {
                    match self.options.save(path) {
                        Ok(()) => {
                            log::info!("options saved to {}", path.display());
                        }
                        Err(e) => log::error!("failed to save options: {e}"),
                    }
                }
            }
            _ => {}
        }
    }
}

impl ApplicationHandler for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let monitor = event_loop
            .primary_monitor()
            .or_else(|| event_loop.available_monitors().next());
        let attrs = if let Some(mon) = &monitor {
            let mon_size = mon.size();
            let scale = mon.scale_factor();
            let logical_w = (mon_size.width as f64 / scale * 0.75) as u32;
            let logical_h = (mon_size.height as f64 / scale * 0.75) as u32;
            Window::default_attributes()
                .with_title(&self.title)
                .with_inner_size(winit::dpi::LogicalSize::new(
                    logical_w, logical_h,
                ))
        } else {
            Window::default_attributes().with_title(&self.title)
        };

        let window = match event_loop.create_window(attrs) {
            Ok(w) => Arc::new(w),
            Err(e) => {
                log::error!("Failed to create window: {e}");
                event_loop.exit();
                return;
            }
        };

        let mut scene = match GlassScene::new(window.clone()) {
            Ok(s) => s,
            Err(e) => {
                log::error!("Failed to initialize renderer: {e}");
                event_loop.exit();
                return;
            }
        };

        if let Some(source) = self.background.take() {
            let _ = self.loader.request(source);
            let bg = &mut self.options.background;
            bg.bg_type = bg.bg_type.max(TEXTURE_BACKGROUND);
        }
        if let Some(frames) = self.video.take() {
            scene.attach_video(frames);
            self.options.background.bg_type = VIDEO_BACKGROUND;
        }

        window.request_redraw();
        self.window = Some(window);
        self.scene = Some(scene);
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _id: WindowId,
        event: WindowEvent,
    ) {
        if matches!(event, WindowEvent::CloseRequested) {
            event_loop.exit();
            return;
        }

        // Guard: both window and scene must be initialised.
        if self.window.is_none() || self.scene.is_none() {
            return;
        }

        match event {
            WindowEvent::Resized(event_size) => {
                let (vp_w, vp_h) = viewport_size(event_size);
                if let Some(scene) = &mut self.scene {
                    scene.resize(vp_w, vp_h);
                }
            }

            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                if let Some(scene) = &mut self.scene {
                    scene.dpr = scale_factor as f32;
                }
            }

            WindowEvent::RedrawRequested => {
                self.poll_background();

                let now = Instant::now();
                let dt = now.duration_since(self.last_frame_time);
                self.last_frame_time = now;

                if let Some(scene) = &mut self.scene {
                    match scene.render(&self.options, dt) {
                        Ok(()) => {}
                        Err(
                            wgpu::SurfaceError::Outdated
                            | wgpu::SurfaceError::Lost,
                        ) => {
                            if let Some(w) = &self.window {
                                let (vp_w, vp_h) =
                                    viewport_size(w.inner_size());
                                scene.resize(vp_w, vp_h);
                            }
                        }
                        Err(e) => {
                            log::error!("render error: {e:?}");
                        }
                    }
                }
                if let Some(w) = &self.window {
                    w.request_redraw();
                }
            }

            WindowEvent::CursorMoved { position, .. } => {
                if let Some(scene) = &mut self.scene {
                    scene.pointer = [
                        position.x as f32,
                        scene.ctx.height() as f32 - position.y as f32,
                    ];
                }
            }

            WindowEvent::KeyboardInput { event, .. } => {
                if event.state != ElementState::Pressed {
                    return;
                }
                let PhysicalKey::Code(code) = event.physical_key else {
                    return;
                };
                self.handle_key(code);
            }

            _ => (),
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.loader.shutdown();
        if let Some(scene) = self.scene.take() {
            scene.renderer.dispose();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn background_cycle_skips_unloaded_textures() {
        assert_eq!(next_background_type(0, false, false), 1);
        assert_eq!(next_background_type(2, false, false), 0);
        assert_eq!(next_background_type(2, true, false), 3);
        assert_eq!(next_background_type(3, true, false), 0);
        assert_eq!(next_background_type(2, false, true), VIDEO_BACKGROUND);
        assert_eq!(next_background_type(3, true, true), VIDEO_BACKGROUND);
        assert_eq!(next_background_type(VIDEO_BACKGROUND, true, true), 0);
    }

    #[test]
    fn image_types_past_the_loaded_ones_wrap_around() {
        // A saved options file may name a texture type this run never loaded.
        assert_eq!(next_background_type(5, true, false), 0);
        assert_eq!(next_background_type(5, false, true), VIDEO_BACKGROUND);
        assert_eq!(next_background_type(10, true, true), 0);
    }

    #[test]
    fn frame_rate_is_clamped_to_a_playable_range() {
        assert_eq!(frame_duration(25.0), Duration::from_millis(40));
        assert_eq!(frame_duration(0.0), Duration::from_secs(1));
        assert_eq!(frame_duration(-3.0), Duration::from_secs(1));
        assert_eq!(
            frame_duration(f32::NAN),
            frame_duration(DEFAULT_VIDEO_FPS)
        );
        assert_eq!(
            frame_duration(1.0e6),
            Duration::from_secs_f64(1.0 / 240.0)
        );
    }

    #[test]
    fn builder_records_frame_directory() {
        let viewer = Viewer::builder()
            .with_video_frames("frames", 10.0)
            .build();
        let (dir, duration) = viewer.video.unwrap();
        assert_eq!(dir, PathBuf::from("frames"));
        assert_eq!(duration, Duration::from_millis(100));
    }
}
