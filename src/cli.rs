// Command-line options: which cameras to use, how to size the stream and the
// window, where captures go, and the effect settings to start with.

use crate::camera::CaptureRequest;
use crate::settings::EffectConfig;
use crate::types::{DeviceSelector, Facing};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "live-filter")]
#[command(about = "Live camera preview with a real-time effect chain and still capture")]
#[command(version)]
pub struct Cli {
    /// Device index used as the front camera
    #[arg(long, default_value_t = 0)]
    pub front: u32,

    /// Device index used as the rear camera
    #[arg(long, default_value_t = 1)]
    pub rear: u32,

    /// Camera to open first
    #[arg(long, value_enum, default_value_t = Facing::Front)]
    pub facing: Facing,

    /// Requested capture width (the device may pick something close)
    #[arg(long, default_value_t = 640)]
    pub width: u32,

    /// Requested capture height
    #[arg(long, default_value_t = 480)]
    pub height: u32,

    /// Requested capture frame rate
    #[arg(long, default_value_t = 30)]
    pub camera_fps: u32,

    /// Display refresh rate the render loop paces itself to
    #[arg(long, default_value_t = 60)]
    pub refresh: usize,

    /// Directory captures are written to
    #[arg(short, long, default_value = ".")]
    pub output: PathBuf,

    /// Initial brightness offset
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    pub brightness: i32,

    /// Initial contrast level
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    pub contrast: i32,

    /// Initial saturation level
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    pub saturation: i32,

    /// Start in black & white
    #[arg(long)]
    pub bw: bool,

    /// Start with the cinematic color skew
    #[arg(long)]
    pub cinematic: bool,

    /// Start with film grain
    #[arg(long)]
    pub grain: bool,

    /// Fixed grain seed (reproducible noise)
    #[arg(long)]
    pub seed: Option<u32>,
}

impl Cli {
    pub fn effects(&self) -> EffectConfig {
        EffectConfig {
            brightness: self.brightness,
            contrast: self.contrast,
            saturation: self.saturation,
            bw: self.bw,
            cinematic: self.cinematic,
            grain: self.grain,
        }
    }

    pub fn selector(&self, facing: Facing) -> DeviceSelector {
        let index = match facing {
            Facing::Front => self.front,
            Facing::Rear => self.rear,
        };
        DeviceSelector { facing, index }
    }

    pub fn capture_request(&self) -> CaptureRequest {
        CaptureRequest { width: self.width, height: self.height, fps: self.camera_fps }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = Cli::parse_from(["live-filter"]);
        assert!(cli.effects().is_neutral());
        assert_eq!(cli.selector(cli.facing), DeviceSelector { facing: Facing::Front, index: 0 });
        assert_eq!(cli.refresh, 60);
    }

    #[test]
    fn initial_effects_and_rear_index() {
        let cli = Cli::parse_from([
            "live-filter", "--rear", "3", "--facing", "rear", "--brightness", "-20", "--bw",
        ]);
        let cfg = cli.effects();
        assert_eq!(cfg.brightness, -20);
        assert!(cfg.bw && !cfg.grain);
        assert_eq!(cli.selector(cli.facing), DeviceSelector { facing: Facing::Rear, index: 3 });
        assert_eq!(cli.selector(Facing::Rear.flipped()).index, 0);
    }
}
