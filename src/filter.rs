// The per-pixel effect chain, applied in place to every frame.
// Visual outcomes, in order:
// brightness lift, contrast around mid-grey, saturation around luma,
// optional black & white, optional warm/cool "cinematic" skew, optional film grain.
//
// All intermediate math is f32 on the gamma-encoded 0..255 values; a channel is
// clamped and truncated only when it is written back.

use crate::settings::EffectConfig;
use crate::types::PixelBuffer;
use std::time::{SystemTime, UNIX_EPOCH};

// Rec.601 luma weights.
const LUMA_R: f32 = 0.299;
const LUMA_G: f32 = 0.587;
const LUMA_B: f32 = 0.114;

// Cinematic skew: warm reds, cooler blues.
const CINEMATIC_R: f32 = 1.05;
const CINEMATIC_B: f32 = 0.95;

// Grain spans [-GRAIN_AMPLITUDE/2, +GRAIN_AMPLITUDE/2).
const GRAIN_AMPLITUDE: f32 = 12.0;

// ----------------------------- tiny RNG (no external crate) -----------------------------

/// xorshift32 RNG; only drives grain, so quality just has to look like noise.
#[derive(Clone, Debug)]
pub struct Rng32 { state: u32 }

impl Rng32 {
    pub fn from_seed(seed: u32) -> Self { Self { state: seed | 1 } }

    /// Seed from the wall clock so grain differs between runs.
    pub fn from_clock() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.subsec_nanos() ^ d.as_secs() as u32)
            .unwrap_or(0xC0FFEE);
        Self::from_seed(nanos)
    }

    #[inline] fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        x
    }

    /// Uniform [0,1)
    #[inline] pub fn next_f32(&mut self) -> f32 {
        (self.next_u32() >> 8) as f32 / ((1u32 << 24) as f32)
    }
}

// ----------------------------- pipeline --------------------------------

/// Anything the scheduler can run over a frame between copy-in and present.
pub trait FrameFilter {
    fn apply(&mut self, frame: &mut PixelBuffer, cfg: &EffectConfig);
}

/// Level in percent → multiplicative factor. Level 0 is exactly 1.0.
#[inline]
fn level_factor(level: i32) -> f32 {
    (level as f32 + 100.0) / 100.0
}

/// Clamp to the channel range and truncate.
#[inline]
fn to_channel(v: f32) -> u8 {
    v.clamp(0.0, 255.0) as u8
}

/// Factors derived from one config snapshot, computed once per frame.
#[derive(Clone, Copy, Debug)]
struct Plan {
    brightness: f32,
    contrast: Option<f32>,   // None = level 0, skip
    saturation: Option<f32>, // None = level 0, skip
    bw: bool,
    cinematic: bool,
    grain: bool,
}

impl Plan {
    fn from_config(cfg: &EffectConfig) -> Self {
        Self {
            brightness: cfg.brightness as f32,
            contrast: (cfg.contrast != 0).then(|| level_factor(cfg.contrast)),
            saturation: (cfg.saturation != 0).then(|| level_factor(cfg.saturation)),
            bw: cfg.bw,
            cinematic: cfg.cinematic,
            grain: cfg.grain,
        }
    }

    /// Run the full chain for one pixel. `noise` is the grain draw for this
    /// pixel (ignored unless grain is on).
    #[inline]
    fn run(&self, px: &mut [u8], noise: f32) {
        let mut r = px[0] as f32 + self.brightness;
        let mut g = px[1] as f32 + self.brightness;
        let mut b = px[2] as f32 + self.brightness;

        if let Some(k) = self.contrast {
            r = (r - 128.0) * k + 128.0;
            g = (g - 128.0) * k + 128.0;
            b = (b - 128.0) * k + 128.0;
        }

        // Luma from the post-contrast values; reused by monochrome below.
        let gray = LUMA_R * r + LUMA_G * g + LUMA_B * b;

        if let Some(k) = self.saturation {
            r = gray + (r - gray) * k;
            g = gray + (g - gray) * k;
            b = gray + (b - gray) * k;
        }

        if self.bw {
            r = gray;
            g = gray;
            b = gray;
        }

        if self.cinematic {
            r *= CINEMATIC_R;
            b *= CINEMATIC_B;
        }

        if self.grain {
            r += noise;
            g += noise;
            b += noise;
        }

        px[0] = to_channel(r);
        px[1] = to_channel(g);
        px[2] = to_channel(b);
        // px[3] (alpha) is left alone
    }
}

/// The fixed effect chain. Owns the grain RNG; everything else comes from the
/// config snapshot handed in per frame.
pub struct FilterPipeline {
    rng: Rng32,
}

impl FilterPipeline {
    pub fn new() -> Self {
        Self { rng: Rng32::from_clock() }
    }

    /// Deterministic grain, for reproducible output.
    pub fn with_seed(seed: u32) -> Self {
        Self { rng: Rng32::from_seed(seed) }
    }
}

impl Default for FilterPipeline {
    fn default() -> Self { Self::new() }
}

impl FrameFilter for FilterPipeline {
    fn apply(&mut self, frame: &mut PixelBuffer, cfg: &EffectConfig) {
        if cfg.is_neutral() {
            return;
        }
        let plan = Plan::from_config(cfg);
        for px in frame.data.chunks_exact_mut(4) {
            // One draw per pixel, shared by r, g and b.
            let noise = if plan.grain {
                (self.rng.next_f32() - 0.5) * GRAIN_AMPLITUDE
            } else {
                0.0
            };
            plan.run(px, noise);
        }
    }
}
