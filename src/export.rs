// Still capture of the frame currently on screen.
// Visual: pressing the capture key drops a capture_<ms>.jpg next to the app
// that looks exactly like the filtered frame in the window.

use crate::error::Error;
use crate::types::PixelBuffer;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ExtendedColorType, RgbaImage};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

pub const JPEG_QUALITY: u8 = 95;
pub const CAPTURE_EXT: &str = "jpg";

/// Encode an RGBA frame as JPEG. Alpha is dropped (JPEG has none; ours is opaque).
pub fn encode_jpeg(frame: &PixelBuffer) -> Result<Vec<u8>, Error> {
    if frame.is_empty() {
        return Err(Error::Export("frame has no pixels".into()));
    }
    let rgba = RgbaImage::from_raw(frame.width as u32, frame.height as u32, frame.data.clone())
        .ok_or_else(|| Error::Export("frame size does not match its pixel data".into()))?;
    let rgb = DynamicImage::ImageRgba8(rgba).to_rgb8();

    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY)
        .encode(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
        .map_err(|e| Error::Export(format!("JPEG encode: {e}")))?;
    Ok(out)
}

/// `capture_<unix-epoch-milliseconds>.jpg`
pub fn capture_file_name(at: SystemTime) -> String {
    let ms = at.duration_since(UNIX_EPOCH).map(|d| d.as_millis()).unwrap_or(0);
    format!("capture_{ms}.{CAPTURE_EXT}")
}

/// Write encoded bytes into `dir` under a fresh capture name.
pub fn save_capture(dir: &Path, bytes: &[u8]) -> Result<PathBuf, Error> {
    fs::create_dir_all(dir)?;
    let path = dir.join(capture_file_name(SystemTime::now()));
    fs::write(&path, bytes)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn file_name_uses_epoch_millis() {
        let at = UNIX_EPOCH + Duration::from_millis(1_700_000_000_123);
        assert_eq!(capture_file_name(at), "capture_1700000000123.jpg");
    }

    #[test]
    fn encodes_decodable_jpeg() {
        let frame = PixelBuffer::from_rgba(8, 4, [200, 40, 40, 255].repeat(32)).unwrap();
        let bytes = encode_jpeg(&frame).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (8, 4));
        // Lossy, but a flat red should stay reddish.
        let px = decoded.to_rgb8().get_pixel(3, 2).0;
        assert!(px[0] > 150 && px[1] < 90 && px[2] < 90, "{px:?}");
    }

    #[test]
    fn empty_frame_is_an_export_error() {
        assert!(matches!(encode_jpeg(&PixelBuffer::default()), Err(Error::Export(_))));
    }

    #[test]
    fn save_writes_into_directory() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("shots");
        let path = save_capture(&target, &[0xFF, 0xD8, 0xFF, 0xD9]).unwrap();
        assert!(path.starts_with(&target));
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("capture_") && name.ends_with(".jpg"));
        assert_eq!(fs::read(&path).unwrap(), vec![0xFF, 0xD8, 0xFF, 0xD9]);
    }
}
