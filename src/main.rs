// What you SEE:
// • The live camera, run through the effect chain every refresh.
// • 1/2 brightness, 3/4 contrast, 5/6 saturation (down/up).
// • M black & white, K cinematic, G grain, R reset.
// • Space saves the current frame as a JPEG. F flips front/rear. ESC quits.
// The window title shows the camera status and the current settings.

mod camera;
mod cli;
mod draw;
mod error;
mod export;
mod filter;
mod scheduler;
mod settings;
mod types;

use camera::CameraCapture;
use clap::Parser;
use cli::Cli;
use draw::{Control, Drawer, title_for};
use error::Error;
use filter::FilterPipeline;
use scheduler::{RenderScheduler, Status};
use settings::SettingsStore;
use std::ops::ControlFlow;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Error> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    /* --- Capability check ---
       Visual: nothing opens if this host cannot capture video at all. */
    let devices = match CameraCapture::probe() {
        Ok(devices) => devices,
        Err(e) => {
            tracing::error!("{} ({e})", Status::Unsupported);
            return Err(e);
        }
    };
    tracing::info!("Cameras found: {devices:?}");

    /* --- Settings, pipeline, scheduler --- */
    let settings = SettingsStore::new(cli.effects());
    let pipeline = match cli.seed {
        Some(seed) => FilterPipeline::with_seed(seed),
        None => FilterPipeline::new(),
    };
    let source = CameraCapture::new(cli.capture_request());
    let mut scheduler = RenderScheduler::new(source, pipeline, settings.clone());

    let stop = scheduler.stop_handle();
    if let Err(e) = ctrlc::set_handler(move || stop.stop()) {
        tracing::warn!("Ctrl+C handler not installed: {e}");
    }

    /* --- Window ---
       Visual: opens at the requested size; frames scale into it. */
    let mut drawer = Drawer::new(
        "Live Filter",
        cli.width as usize,
        cli.height as usize,
        cli.refresh,
    )?;

    // A failed first open leaves the window up in ERROR so F can retry.
    let first = cli.selector(cli.facing);
    if let Err(e) = scheduler.start(first) {
        tracing::warn!("Starting on {first} failed: {e}");
    }

    /* ------------------------------ Main loop ------------------------------ */
    scheduler.run(&mut drawer, |sched, drawer| {
        for control in drawer.controls() {
            match control {
                Control::Adjust(adjust) => {
                    let cfg = settings.apply(adjust);
                    tracing::debug!("{adjust:?} -> {cfg:?}");
                }
                Control::Capture => match sched.export_current_frame() {
                    Ok(bytes) => match export::save_capture(&cli.output, &bytes) {
                        Ok(path) => tracing::info!("Saved {}", path.display()),
                        Err(e) => tracing::warn!("{e}"),
                    },
                    Err(e) => tracing::warn!("{e}"),
                },
                Control::SwitchCamera => {
                    let facing = sched.selector().map(|s| s.facing).unwrap_or(cli.facing);
                    let next = cli.selector(facing.flipped());
                    if let Err(e) = sched.switch_source(next) {
                        tracing::warn!("Switching to {next} failed: {e}");
                    }
                }
                Control::Quit => return ControlFlow::Break(()),
            }
        }
        drawer.set_title(title_for(&sched.status().to_string(), &settings.snapshot()));
        ControlFlow::Continue(())
    });

    scheduler.stop();
    let stats = scheduler.stats();
    tracing::info!(
        "{:?}: presented {} frames ({} waiting refreshes, {} present failures)",
        scheduler.state(),
        stats.presented,
        stats.waiting,
        stats.present_failures
    );
    Ok(())
}
