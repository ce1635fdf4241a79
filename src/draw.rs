// Window + keyboard controls.
// Visual effects provided here:
// 1) A window that shows the filtered camera image, scaled to fit.
// 2) The window title carries the current status and effect levels.

use crate::error::Error;
use crate::scheduler::Presenter;
use crate::settings::{Adjust, EffectConfig};
use crate::types::PixelBuffer;
use minifb::{Key, KeyRepeat, ScaleMode, Window, WindowOptions};

/// Level change per key press.
pub const STEP: i32 = 10;

/// What a key press asks for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Control {
    Adjust(Adjust),
    Capture,
    SwitchCamera,
    Quit,
}

/// Key bindings. Unbound keys map to None.
pub fn control_for(key: Key) -> Option<Control> {
    let c = match key {
        Key::Key1 => Control::Adjust(Adjust::Brightness(-STEP)),
        Key::Key2 => Control::Adjust(Adjust::Brightness(STEP)),
        Key::Key3 => Control::Adjust(Adjust::Contrast(-STEP)),
        Key::Key4 => Control::Adjust(Adjust::Contrast(STEP)),
        Key::Key5 => Control::Adjust(Adjust::Saturation(-STEP)),
        Key::Key6 => Control::Adjust(Adjust::Saturation(STEP)),
        Key::M => Control::Adjust(Adjust::ToggleBw),
        Key::K => Control::Adjust(Adjust::ToggleCinematic),
        Key::G => Control::Adjust(Adjust::ToggleGrain),
        Key::R => Control::Adjust(Adjust::Reset),
        Key::Space => Control::Capture,
        Key::F => Control::SwitchCamera,
        Key::Escape => Control::Quit,
        _ => return None,
    };
    Some(c)
}

/// Title line: status plus the live settings.
pub fn title_for(status: &str, cfg: &EffectConfig) -> String {
    let flag = |on: bool, name: &str| if on { format!(" {name}") } else { String::new() };
    format!(
        "Live Filter [{status}] B:{} C:{} S:{}{}{}{}",
        cfg.brightness,
        cfg.contrast,
        cfg.saturation,
        flag(cfg.bw, "BW"),
        flag(cfg.cinematic, "CINE"),
        flag(cfg.grain, "GRAIN"),
    )
}

/// Pack RGBA bytes into minifb's 0x00RRGGBB words.
pub fn pack_rgba(src: &[u8], dst: &mut Vec<u32>) {
    dst.clear();
    dst.extend(src.chunks_exact(4).map(|p| {
        ((p[0] as u32) << 16) | ((p[1] as u32) << 8) | p[2] as u32
    }));
}

pub struct Drawer {
    window: Window, // the on-screen window you see
    packed: Vec<u32>,
    title: String,
}

impl Drawer {
    /// Create a resizable window; frames of any size are scaled into it.
    /// `fps` paces both presents and idle refreshes.
    pub fn new(title: &str, width: usize, height: usize, fps: usize) -> Result<Self, Error> {
        let opts = WindowOptions {
            resize: true,
            scale_mode: ScaleMode::AspectRatioStretch,
            ..WindowOptions::default()
        };
        let mut window = Window::new(title, width, height, opts)
            .map_err(|e| Error::WindowInit(e.to_string()))?;
        window.set_target_fps(fps);
        Ok(Self { window, packed: Vec::new(), title: title.to_string() })
    }

    /// Only touches the window when the text actually changed.
    pub fn set_title(&mut self, title: String) {
        if title != self.title {
            self.window.set_title(&title);
            self.title = title;
        }
    }

    /// Controls pressed since the last refresh, in key order.
    pub fn controls(&self) -> Vec<Control> {
        self.window
            .get_keys_pressed(KeyRepeat::No)
            .into_iter()
            .filter_map(control_for)
            .collect()
    }
}

impl Presenter for Drawer {
    /// Visual: the window immediately displays the new image.
    fn present(&mut self, frame: &PixelBuffer) -> Result<(), Error> {
        pack_rgba(&frame.data, &mut self.packed);
        self.window
            .update_with_buffer(&self.packed, frame.width, frame.height)
            .map_err(|e| Error::WindowUpdate(e.to_string()))
    }

    /// Keep input and pacing alive while there is nothing new to show.
    fn idle(&mut self) {
        self.window.update();
    }

    fn is_open(&self) -> bool {
        self.window.is_open()
    }
}
