use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use stardrift::config::AppConfig;
use stardrift::lifecycle::SceneLifecycleController;
use stardrift::post_process::PostProcessSettings;
use stardrift::render::{HeadlessRenderer, RenderResource};
use stardrift::scenes;
use stardrift::time::FrameClock;
use stardrift::window::App;
use winit::event_loop::{ControlFlow, EventLoop};

/// Particle scenes with a shared renderer and scene switching.
#[derive(Parser, Debug)]
#[command(name = "stardrift", version, about, long_about = None)]
struct Args {
    /// JSON config file; defaults are used when it does not exist
    #[arg(long, default_value = "stardrift.json")]
    config: PathBuf,

    /// Run every scene on the in-memory backend instead of opening a window,
    /// optionally for the given number of frames per scene
    #[arg(long, value_name = "FRAMES", num_args = 0..=1)]
    headless: Option<Option<u32>>,
}

/// Cycle through every registered scene on the in-memory backend.
fn run_headless(config: &AppConfig, frames: u32) -> stardrift::Result<()> {
    let render = HeadlessRenderer::new();
    let post = PostProcessSettings::new(&config.post);
    let mut controller = SceneLifecycleController::new(render, post);
    scenes::register_defaults(&mut controller)?;
    controller.resize(config.window.width, config.window.height);

    let mut clock = FrameClock::new(&config.clock);
    clock.set_fixed_delta(Some(config.clock.fixed_delta.unwrap_or(1.0 / 60.0)));

    let ids = controller.scene_ids().to_vec();
    for id in &ids {
        controller.set_active_scene(id)?;
        for _ in 0..frames {
            let dt = clock.tick();
            controller.update(dt)?;
        }
        let stats = controller.render().stats();
        log::info!(
            "{}: {} frames, {} root objects, {} uploads ({} floats), {} live handles",
            id,
            frames,
            controller.render().root_children().len(),
            stats.uploads,
            stats.floats_uploaded,
            controller.render().live_handles().len(),
        );
    }

    controller.shutdown();
    let stats = controller.render().stats();
    log::info!(
        "done: {} objects created, {} released, {} frames rendered",
        stats.created,
        stats.disposed,
        controller.post().frames_rendered
    );
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let config = match AppConfig::load(&args.config) {
        Ok(config) => config,
        Err(err) => {
            log::error!("{}", err);
            return ExitCode::FAILURE;
        }
    };

    if let Some(frames) = args.headless {
        let frames = frames.unwrap_or(config.headless_frames);
        return match run_headless(&config, frames) {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                log::error!("{}", err);
                ExitCode::FAILURE
            }
        };
    }

    let event_loop = match EventLoop::new() {
        Ok(event_loop) => event_loop,
        Err(err) => {
            log::error!("failed to create event loop: {}", err);
            return ExitCode::FAILURE;
        }
    };
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config);
    if let Err(err) = event_loop.run_app(&mut app) {
        log::error!("event loop error: {}", err);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["stardrift"]).unwrap();
        assert_eq!(args.config, PathBuf::from("stardrift.json"));
        assert_eq!(args.headless, None);
    }

    #[test]
    fn test_headless_frames_are_optional() {
        let args = Args::try_parse_from(["stardrift", "--headless"]).unwrap();
        assert_eq!(args.headless, Some(None));

        let args = Args::try_parse_from(["stardrift", "--headless", "30", "--config", "x.json"]).unwrap();
        assert_eq!(args.headless, Some(Some(30)));
        assert_eq!(args.config, PathBuf::from("x.json"));
    }

    #[test]
    fn test_help_is_not_an_error() {
        let err = Args::try_parse_from(["stardrift", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
        assert_eq!(err.exit_code(), 0);
    }

    #[test]
    fn test_unknown_argument_is_rejected() {
        let err = Args::try_parse_from(["stardrift", "--fullscreen"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);
    }
}
