// Opens a camera by facing and keeps the newest decoded RGBA frame around for
// the render loop.
// Visual expectation: once `acquire` succeeds and the first frame decodes,
// `current_frame()` returns the live image the filter chain works on.
//
// The device is read on its own thread; a stalled or unplugged camera only
// stalls that thread, never a tick.

use crate::error::Error;
use crate::scheduler::FrameSource;
use crate::types::{DeviceSelector, FrameRef};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

// Bring in nokhwa types for camera control.
use nokhwa::{
    Camera,
    pixel_format::RgbAFormat,
    utils::{
        ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
        Resolution,
    },
};

// How long `release` waits for the capture thread before leaving it behind.
const RELEASE_WAIT: Duration = Duration::from_millis(500);
// Backoff after a failed read so a dead device does not spin the thread.
const READ_RETRY: Duration = Duration::from_millis(10);

/// What we ask the device for; the stream may settle on something close.
#[derive(Clone, Copy, Debug)]
pub struct CaptureRequest {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

/// Newest frame published by the capture thread.
#[derive(Default)]
struct Latest {
    seq: u64, // bumps on every published frame
    width: usize,
    height: usize,
    pixels: Vec<u8>,
}

/// State shared with one capture thread.
#[derive(Default)]
struct Shared {
    running: AtomicBool,
    latest: Mutex<Latest>,
}

impl Shared {
    /// Make `pixels` the newest frame. `pixels` comes back holding the buffer it
    /// replaced, so the next decode reuses that allocation.
    fn publish(&self, pixels: &mut Vec<u8>, width: usize, height: usize) {
        let mut latest = self.latest.lock();
        std::mem::swap(&mut latest.pixels, pixels);
        latest.width = width;
        latest.height = height;
        latest.seq += 1;
    }

    /// If a frame newer than `seen` was published, trade it into `dst` and
    /// return (seq, width, height).
    fn take_newer(&self, seen: u64, dst: &mut Vec<u8>) -> Option<(u64, usize, usize)> {
        let mut latest = self.latest.lock();
        if latest.seq == seen {
            return None;
        }
        std::mem::swap(&mut latest.pixels, dst);
        Some((latest.seq, latest.width, latest.height))
    }
}

// A small wrapper around nokhwa::Camera so the scheduler only sees FrameSource.
pub struct CameraCapture {
    request: CaptureRequest,
    shared: Option<Arc<Shared>>,
    worker: Option<JoinHandle<()>>,
    frame: Vec<u8>, // our copy of the newest frame, RGBA
    width: usize,
    height: usize,
    seen: u64,
}

impl CameraCapture {
    pub fn new(request: CaptureRequest) -> Self {
        Self {
            request,
            shared: None,
            worker: None,
            frame: Vec::new(),
            width: 0,
            height: 0,
            seen: 0,
        }
    }

    /// Check the host has a capture backend and list its device indices.
    pub fn probe() -> Result<Vec<u32>, Error> {
        let devices = nokhwa::query(ApiBackend::Auto)
            .map_err(|e| Error::Unsupported(e.to_string()))?;
        Ok(device_indices(&devices))
    }
}

fn device_indices(devices: &[nokhwa::utils::CameraInfo]) -> Vec<u32> {
    devices
        .iter()
        .filter_map(|info| info.index().as_index().ok())
        .collect()
}

/// Create the camera and start its stream (busy device / denied permission fail here).
fn open_camera(request: CaptureRequest, index: u32) -> Result<Camera, Error> {
    let fmt = CameraFormat::new(
        Resolution::new(request.width, request.height),
        FrameFormat::YUYV, // uncompressed; cheap to convert
        request.fps,
    );
    let req = RequestedFormat::new::<RgbAFormat>(RequestedFormatType::Closest(fmt));

    let mut cam = Camera::new(CameraIndex::Index(index), req)
        .map_err(|e| Error::Acquisition(format!("Create camera: {e}")))?;
    cam.open_stream()
        .map_err(|e| Error::Acquisition(format!("Open stream: {e}")))?;
    Ok(cam)
}

/// Pull one frame (blocks until the device delivers) and decode it into `out`,
/// reusing its allocation.
fn read_frame(cam: &mut Camera, out: &mut Vec<u8>) -> Result<(usize, usize), Error> {
    let raw = cam
        .frame()
        .map_err(|e| Error::CameraFrame(format!("Fetch frame: {e}")))?;
    let res = raw.resolution();
    let (w, h) = (res.width() as usize, res.height() as usize);
    out.resize(w * h * 4, 0);
    raw.decode_image_to_buffer::<RgbAFormat>(out)
        .map_err(|e| Error::CameraFrame(format!("Decode RGBA: {e}")))?;
    Ok((w, h))
}

/// Capture thread body: read, decode, publish, until told to stop.
fn capture_loop(mut cam: Camera, shared: Arc<Shared>) {
    let mut scratch = Vec::new();
    while shared.running.load(Ordering::SeqCst) {
        match read_frame(&mut cam, &mut scratch) {
            Ok((w, h)) => shared.publish(&mut scratch, w, h),
            Err(e) => {
                tracing::debug!("{e}");
                thread::sleep(READ_RETRY);
            }
        }
    }
    if let Err(e) = cam.stop_stream() {
        tracing::warn!("Stopping camera stream failed: {e}");
    }
}

impl FrameSource for CameraCapture {
    fn acquire(&mut self, selector: &DeviceSelector) -> Result<(), Error> {
        // Capability was settled at startup; a failing query now is a
        // transient acquisition problem.
        let devices = nokhwa::query(ApiBackend::Auto)
            .map_err(|e| Error::Acquisition(format!("Query cameras: {e}")))?;
        if !device_indices(&devices).contains(&selector.index) {
            return Err(Error::NoMatchingDevice(selector.to_string()));
        }

        let shared = Arc::new(Shared::default());
        shared.running.store(true, Ordering::SeqCst);

        // The camera is opened on the capture thread, which owns it for life.
        let (open_tx, open_rx) = crossbeam_channel::bounded::<Result<(u32, u32), Error>>(1);
        let request = self.request;
        let index = selector.index;
        let worker_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name(format!("camera-{index}"))
            .spawn(move || match open_camera(request, index) {
                Ok(cam) => {
                    let res = cam.resolution();
                    let _ = open_tx.send(Ok((res.width(), res.height())));
                    capture_loop(cam, worker_shared);
                }
                Err(e) => {
                    let _ = open_tx.send(Err(e));
                }
            })?;

        let (w, h) = match open_rx.recv() {
            Ok(result) => result?,
            Err(_) => return Err(Error::Acquisition("capture thread exited".into())),
        };
        tracing::info!("Opened {selector} at {w}x{h}");

        // Dimensions stay unknown until the first frame decodes.
        self.width = 0;
        self.height = 0;
        self.seen = 0;
        self.shared = Some(shared);
        self.worker = Some(handle);
        Ok(())
    }

    fn release(&mut self) {
        if let Some(shared) = self.shared.take() {
            shared.running.store(false, Ordering::SeqCst);
            if let Some(handle) = self.worker.take() {
                let deadline = Instant::now() + RELEASE_WAIT;
                while !handle.is_finished() && Instant::now() < deadline {
                    thread::sleep(Duration::from_millis(5));
                }
                if handle.is_finished() {
                    let _ = handle.join();
                } else {
                    // Stuck inside a device read; it exits after the read returns.
                    tracing::warn!("Capture thread still busy, detaching it");
                }
            }
            tracing::info!("Camera released");
        }
        self.width = 0;
        self.height = 0;
    }

    /// Never waits on the device: takes whatever the capture thread last published.
    fn current_frame(&mut self) -> Option<FrameRef<'_>> {
        let shared = self.shared.as_ref()?;
        if let Some((seq, w, h)) = shared.take_newer(self.seen, &mut self.frame) {
            self.seen = seq;
            self.width = w;
            self.height = h;
        }
        Some(FrameRef { width: self.width, height: self.height, pixels: &self.frame })
    }
}

impl Drop for CameraCapture {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capture() -> CameraCapture {
        CameraCapture::new(CaptureRequest { width: 2, height: 1, fps: 30 })
    }

    #[test]
    fn no_frame_before_acquire() {
        let mut cam = capture();
        assert!(cam.current_frame().is_none());
    }

    #[test]
    fn unknown_dimensions_until_first_frame() {
        let mut cam = capture();
        cam.shared = Some(Arc::new(Shared::default()));
        let frame = cam.current_frame().unwrap();
        assert!(!frame.has_dimensions());
    }

    #[test]
    fn current_frame_returns_latest_published() {
        let mut cam = capture();
        let shared = Arc::new(Shared::default());
        cam.shared = Some(Arc::clone(&shared));

        let mut first = vec![1u8; 8];
        shared.publish(&mut first, 2, 1);
        let mut second = vec![2u8; 8];
        shared.publish(&mut second, 2, 1);
        // The older frame's buffer came back for reuse.
        assert_eq!(second, vec![1u8; 8]);

        let frame = cam.current_frame().unwrap();
        assert!(frame.has_dimensions());
        assert_eq!(frame.pixels, &[2u8; 8]);
    }

    #[test]
    fn current_frame_does_not_wait_on_a_stalled_device() {
        let mut cam = capture();
        let shared = Arc::new(Shared::default());
        cam.shared = Some(Arc::clone(&shared));
        let mut px = vec![9u8; 8];
        shared.publish(&mut px, 2, 1);
        assert_eq!(cam.current_frame().unwrap().pixels, &[9u8; 8]);

        // Nothing new published: the same frame again, immediately.
        let started = Instant::now();
        for _ in 0..100 {
            assert_eq!(cam.current_frame().unwrap().pixels, &[9u8; 8]);
        }
        assert!(started.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn frames_from_another_thread_show_up() {
        let mut cam = capture();
        let shared = Arc::new(Shared::default());
        cam.shared = Some(Arc::clone(&shared));

        let producer = {
            let shared = Arc::clone(&shared);
            thread::spawn(move || {
                for v in 1..=5u8 {
                    let mut px = vec![v; 16];
                    shared.publish(&mut px, 2, 2);
                }
            })
        };
        producer.join().unwrap();

        let frame = cam.current_frame().unwrap();
        assert_eq!((frame.width, frame.height), (2, 2));
        assert_eq!(frame.pixels, &[5u8; 16]);
    }

    #[test]
    fn release_forgets_the_stream() {
        let mut cam = capture();
        let shared = Arc::new(Shared::default());
        shared.running.store(true, Ordering::SeqCst);
        cam.shared = Some(Arc::clone(&shared));
        cam.release();
        assert!(!shared.running.load(Ordering::SeqCst));
        assert!(cam.current_frame().is_none());
    }
}
