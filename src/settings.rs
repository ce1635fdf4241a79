// Effect settings shared between the keyboard controls and the render loop.
// Writers go through the store; the filter reads one snapshot per tick, so a
// change shows up on the next frame and never half-way through one.

use parking_lot::RwLock;
use std::sync::Arc;

/// Nominal range of the slider-style levels.
pub const LEVEL_MIN: i32 = -100;
pub const LEVEL_MAX: i32 = 100;

/// Current effect parameters. Levels outside the nominal range are accepted;
/// the filter clamps at output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EffectConfig {
    pub brightness: i32, // added to r, g, b
    pub contrast: i32,   // factor = (level + 100) / 100
    pub saturation: i32, // factor = (level + 100) / 100
    pub bw: bool,        // monochrome
    pub cinematic: bool, // warm/cool channel skew
    pub grain: bool,     // per-pixel luminance noise
}

impl EffectConfig {
    /// True when running the chain would not change any pixel.
    pub fn is_neutral(&self) -> bool {
        *self == Self::default()
    }
}

/// One step of user adjustment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Adjust {
    Brightness(i32),
    Contrast(i32),
    Saturation(i32),
    ToggleBw,
    ToggleCinematic,
    ToggleGrain,
    Reset,
}

#[inline]
fn nudge(level: i32, delta: i32) -> i32 {
    level.saturating_add(delta).clamp(LEVEL_MIN, LEVEL_MAX)
}

/// Cloneable handle to the process-wide effect settings.
#[derive(Clone, Debug, Default)]
pub struct SettingsStore {
    inner: Arc<RwLock<EffectConfig>>,
}

impl SettingsStore {
    pub fn new(initial: EffectConfig) -> Self {
        Self { inner: Arc::new(RwLock::new(initial)) }
    }

    /// Consistent copy of every field, taken under one lock.
    pub fn snapshot(&self) -> EffectConfig {
        *self.inner.read()
    }

    /// Mutate several fields atomically with respect to `snapshot`.
    /// Returns the config as it stands afterwards.
    pub fn update(&self, f: impl FnOnce(&mut EffectConfig)) -> EffectConfig {
        let mut cfg = self.inner.write();
        f(&mut cfg);
        *cfg
    }

    /// Apply a control step. Level nudges stay inside the nominal range.
    pub fn apply(&self, adjust: Adjust) -> EffectConfig {
        self.update(|cfg| match adjust {
            Adjust::Brightness(d) => cfg.brightness = nudge(cfg.brightness, d),
            Adjust::Contrast(d) => cfg.contrast = nudge(cfg.contrast, d),
            Adjust::Saturation(d) => cfg.saturation = nudge(cfg.saturation, d),
            Adjust::ToggleBw => cfg.bw = !cfg.bw,
            Adjust::ToggleCinematic => cfg.cinematic = !cfg.cinematic,
            Adjust::ToggleGrain => cfg.grain = !cfg.grain,
            Adjust::Reset => *cfg = EffectConfig::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_neutral() {
        let cfg = EffectConfig::default();
        assert!(cfg.is_neutral());
        assert_eq!((cfg.brightness, cfg.contrast, cfg.saturation), (0, 0, 0));
        assert!(!cfg.bw && !cfg.cinematic && !cfg.grain);
    }

    #[test]
    fn nudges_clamp_to_nominal_range() {
        let store = SettingsStore::default();
        for _ in 0..15 {
            store.apply(Adjust::Brightness(10));
            store.apply(Adjust::Contrast(-10));
        }
        let cfg = store.snapshot();
        assert_eq!(cfg.brightness, LEVEL_MAX);
        assert_eq!(cfg.contrast, LEVEL_MIN);
    }

    #[test]
    fn toggles_and_reset() {
        let store = SettingsStore::default();
        store.apply(Adjust::ToggleBw);
        store.apply(Adjust::ToggleGrain);
        store.apply(Adjust::Saturation(30));
        let cfg = store.snapshot();
        assert!(cfg.bw && cfg.grain && !cfg.cinematic);
        assert_eq!(cfg.saturation, 30);

        store.apply(Adjust::Reset);
        assert!(store.snapshot().is_neutral());
    }

    #[test]
    fn clones_share_state() {
        let store = SettingsStore::new(EffectConfig { brightness: 5, ..Default::default() });
        let ui = store.clone();
        ui.update(|c| {
            c.brightness = 40;
            c.cinematic = true;
        });
        let snap = store.snapshot();
        assert_eq!(snap.brightness, 40);
        assert!(snap.cinematic);

        ui.apply(Adjust::Reset);
        assert!(store.snapshot().is_neutral());
    }

    #[test]
    fn snapshot_is_never_torn_across_threads() {
        let store = SettingsStore::default();
        let writer = store.clone();
        let t = std::thread::spawn(move || {
            for i in 0..2000 {
                writer.update(|c| {
                    c.brightness = i;
                    c.contrast = i;
                    c.saturation = i;
                });
            }
        });
        for _ in 0..2000 {
            let s = store.snapshot();
            assert_eq!(s.brightness, s.contrast);
            assert_eq!(s.contrast, s.saturation);
        }
        t.join().unwrap();
    }
}
