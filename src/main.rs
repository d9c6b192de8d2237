//! `liquid-glass [options.toml] [background image | frame directory]`: opens
//! the glass viewer.

use std::path::PathBuf;

use liquid_glass::{options::GlassOptions, Viewer, DEFAULT_VIDEO_FPS};

/// Split arguments into an options file (`*.toml`) and a background image or
/// frame directory.
fn parse_args(
    args: impl Iterator<Item = String>,
) -> Result<(Option<PathBuf>, Option<PathBuf>), String> {
    let mut options = None;
    let mut background = None;
    for arg in args {
        let path = PathBuf::from(&arg);
        let is_toml = path.extension().is_some_and(|ext| ext == "toml");
        let slot = if is_toml { &mut options } else { &mut background };
        if slot.replace(path).is_some() {
            return Err(format!("unexpected extra argument: {arg}"));
        }
    }
    Ok((options, background))
}

fn main() {
    env_logger::init();

    let (options_path, background) = match parse_args(std::env::args().skip(1))
    {
        Ok(parsed) => parsed,
        Err(e) => {
            log::error!("{e}");
            log::error!(
                "Usage: liquid-glass [options.toml] \
                 [background image | frame directory]"
            );
            std::process::exit(1);
        }
    };

    let mut builder = Viewer::builder();
    if let Some(path) = options_path {
        if path.exists() {
            match GlassOptions::load(&path) {
                Ok(options) => builder = builder.with_options(options),
                Err(e) => {
                    log::error!("{}: {e}", path.display());
                    std::process::exit(1);
                }
            }
        } else {
            log::info!("{} does not exist yet, using defaults", path.display());
        }
        builder = builder.with_options_path(path);
    }
    if let Some(path) = background {
        builder = if path.is_dir() {
            builder.with_video_frames(path, DEFAULT_VIDEO_FPS)
        } else {
            builder.with_background_path(path)
        };
    }

    if let Err(e) = builder.build().run() {
        log::error!("{e}");
        std::process::exit(1);
    }
}
