//! Model viewer demo
//!
//! Loads a skull, a dwarf and a skinned character into a lit scene and runs
//! the render loop on the headless device. A device loss can be simulated
//! partway through the run to exercise the lost/reset path.
//!
//! Usage: `model_viewer [config.toml|config.ron]`. Without an argument the
//! viewer looks for `model_viewer.toml`, then `model_viewer.ron`, and falls
//! back to the built-in scene.

use std::path::PathBuf;
use std::time::Duration;

use render_loop::config::{Config, ConfigError, ViewerConfig};
use render_loop::foundation::logging;
use render_loop::render::{EffectPipeline, HeadlessDevice};
use render_loop::{FrameDriver, FrameOutcome, RenderError, RenderLoopController};
use thiserror::Error;

const DEFAULT_CONFIGS: [&str; 2] = ["model_viewer.toml", "model_viewer.ron"];

#[derive(Error, Debug)]
enum AppError {
    #[error("Configuration error in {path}: {source}")]
    Config { path: PathBuf, source: ConfigError },

    #[error(transparent)]
    Render(#[from] RenderError),
}

fn load_config() -> Result<ViewerConfig, AppError> {
    let path = match std::env::args().nth(1) {
        Some(arg) => Some(PathBuf::from(arg)),
        None => DEFAULT_CONFIGS.iter().map(PathBuf::from).find(|p| p.exists()),
    };

    let config = match path {
        Some(path) => {
            log::info!("Loading configuration from {}", path.display());
            let config = ViewerConfig::load_from_file(&path).map_err(|source| AppError::Config {
                path: path.clone(),
                source,
            })?;
            config.validate().map_err(|source| AppError::Config { path, source })?;
            config
        }
        None => {
            log::info!("No configuration file found; using the built-in scene");
            ViewerConfig::default()
        }
    };
    Ok(config)
}

fn run(config: &ViewerConfig, controller: &mut RenderLoopController<HeadlessDevice>) -> Result<(), RenderError> {
    let run = &config.run;
    let mut driver = config
        .run
        .fixed_delta
        .map_or_else(FrameDriver::new, FrameDriver::with_fixed_delta);
    let mut loss_pending = run.device_loss_at_frame;

    while run.max_frames.map_or(true, |max| driver.presented() < max) {
        if loss_pending.is_some_and(|frame| driver.presented() >= frame) {
            controller.device_mut().simulate_loss(run.lost_polls);
            loss_pending = None;
        }

        if driver.tick(controller)? == FrameOutcome::Skipped {
            std::thread::sleep(Duration::from_millis(run.lost_sleep_ms));
        }
    }

    log::info!(
        "Presented {} frames ({} skipped) over {:.2}s",
        driver.presented(),
        driver.skipped(),
        driver.total_time()
    );
    if let Some(stats) = controller.stats() {
        log::info!("Final statistics:\n{}", stats.text());
    }
    Ok(())
}

fn main() {
    logging::init("info");
    log::info!("Starting model viewer");

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("model_viewer: {e}");
            std::process::exit(1);
        }
    };

    let pipeline = EffectPipeline::shared();
    let mut controller = RenderLoopController::new(config.headless_device(), pipeline.clone(), config.scene.clone());

    let result = controller
        .initialize()
        .and_then(|()| run(&config, &mut controller))
        .map_err(AppError::from);

    controller.shutdown();
    drop(controller);
    pipeline.borrow_mut().destroy_all();

    if let Err(e) = result {
        log::error!("{}", e);
        if matches!(e, AppError::Render(RenderError::UnsupportedDevice { .. })) {
            eprintln!("model_viewer: this device does not support the required shader model: {e}");
        } else {
            eprintln!("model_viewer: {e}");
        }
        std::process::exit(1);
    }

    log::info!("Model viewer finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use render_loop::config::RunConfig;
    use std::path::Path;

    fn short_run() -> ViewerConfig {
        ViewerConfig {
            run: RunConfig {
                max_frames: Some(8),
                fixed_delta: Some(0.02),
                device_loss_at_frame: Some(3),
                lost_polls: 2,
                lost_sleep_ms: 0,
            },
            ..ViewerConfig::default()
        }
    }

    #[test]
    fn test_run_survives_simulated_loss() {
        let config = short_run();
        let pipeline = EffectPipeline::shared();
        let mut controller = RenderLoopController::new(config.headless_device(), pipeline, config.scene.clone());
        controller.initialize().unwrap();

        run(&config, &mut controller).unwrap();

        let presents = controller
            .device()
            .journal()
            .count(|c| *c == render_loop::render::headless::DeviceCall::Present);
        assert_eq!(presents, 8);
    }

    #[test]
    fn test_default_paths_are_toml_then_ron() {
        assert!(Path::new(DEFAULT_CONFIGS[0]).extension().is_some_and(|e| e == "toml"));
        assert!(Path::new(DEFAULT_CONFIGS[1]).extension().is_some_and(|e| e == "ron"));
    }
}
