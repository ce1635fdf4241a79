// Drives acquire → filter → present once per display refresh.
// Visual: while Running, every tick replaces the window contents with the
// latest camera frame after the effect chain ran on it.

use crate::error::Error;
use crate::export;
use crate::filter::FrameFilter;
use crate::settings::SettingsStore;
use crate::types::{DeviceSelector, Facing, FrameRef, PixelBuffer};
use parking_lot::Mutex;
use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Provider of live frames (a camera, or a fake in tests).
pub trait FrameSource {
    /// Open the selected device. May be slow; never called from inside a tick.
    fn acquire(&mut self, selector: &DeviceSelector) -> Result<(), Error>;
    /// Close the device. Must tolerate being called when nothing is open.
    fn release(&mut self);
    /// Latest frame, or None until the first one decodes.
    fn current_frame(&mut self) -> Option<FrameRef<'_>>;
}

/// Where finished frames go (the window, or a fake in tests).
pub trait Presenter {
    fn present(&mut self, frame: &PixelBuffer) -> Result<(), Error>;

    /// Called on refreshes that had nothing to present, so the surface can
    /// keep pumping its events and pacing.
    fn idle(&mut self) {}

    fn is_open(&self) -> bool {
        true
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerState {
    Stopped,
    Acquiring,
    Running,
    Error,
}

/// What the status display shows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Acquiring,
    FrontActive,
    RearActive,
    Error,
    Unsupported,
}

impl Status {
    fn active(facing: Facing) -> Self {
        match facing {
            Facing::Front => Status::FrontActive,
            Facing::Rear => Status::RearActive,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Status::Acquiring => "ACQUIRING",
            Status::FrontActive => "FRONT_ACTIVE",
            Status::RearActive => "REAR_ACTIVE",
            Status::Error => "ERROR",
            Status::Unsupported => "UNSUPPORTED",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not started, stopped, or in error: nothing done.
    Idle,
    /// Started, but the source has no frame dimensions yet.
    Waiting,
    /// A filtered frame was handed to the presenter.
    Presented,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct TickStats {
    pub presented: u64,
    pub waiting: u64,
    pub present_failures: u64,
}

/// Cancellation tokens plus the lock a tick body runs under. Stopping takes the
/// same lock, so once `stop` returns no tick is mid-flight and none will start.
///
/// `cancelled` is per start and cleared by the next `start`; `shutdown` comes
/// from a StopHandle and is never cleared.
#[derive(Debug, Default)]
struct TickGate {
    cancelled: AtomicBool,
    shutdown: AtomicBool,
    turn: Mutex<()>,
}

impl TickGate {
    fn cancel(&self) {
        let _turn = self.turn.lock();
        self.cancelled.store(true, Ordering::SeqCst);
    }

    fn shut_down(&self) {
        let _turn = self.turn.lock();
        self.shutdown.store(true, Ordering::SeqCst);
        self.cancelled.store(true, Ordering::SeqCst);
    }

    fn reopen(&self) {
        let _turn = self.turn.lock();
        self.cancelled.store(false, Ordering::SeqCst);
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst) || self.is_shut_down()
    }

    fn is_shut_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}

/// Stops the render loop from anywhere (another thread, a signal handler).
/// Releasing the device stays with the scheduler's owner via `stop()`.
#[derive(Clone, Debug)]
pub struct StopHandle {
    gate: Arc<TickGate>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.gate.shut_down();
    }

    pub fn is_stopped(&self) -> bool {
        self.gate.is_shut_down()
    }
}

pub struct RenderScheduler<S, F> {
    source: S,
    filter: F,
    settings: SettingsStore,
    frame: PixelBuffer, // reused every tick; holds the last presented frame
    has_frame: bool,
    state: SchedulerState,
    status: Status,
    selector: Option<DeviceSelector>,
    acquired: bool,
    gate: Arc<TickGate>,
    stats: TickStats,
}

impl<S: FrameSource, F: FrameFilter> RenderScheduler<S, F> {
    pub fn new(source: S, filter: F, settings: SettingsStore) -> Self {
        Self {
            source,
            filter,
            settings,
            frame: PixelBuffer::default(),
            has_frame: false,
            state: SchedulerState::Stopped,
            status: Status::Acquiring,
            selector: None,
            acquired: false,
            gate: Arc::new(TickGate::default()),
            stats: TickStats::default(),
        }
    }

    pub fn state(&self) -> SchedulerState { self.state }
    pub fn status(&self) -> Status { self.status }
    pub fn stats(&self) -> TickStats { self.stats }
    pub fn selector(&self) -> Option<DeviceSelector> { self.selector }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle { gate: Arc::clone(&self.gate) }
    }

    /// Acquire the selected device and arm the tick. The first tick that sees
    /// a frame with real dimensions moves Acquiring → Running.
    pub fn start(&mut self, selector: DeviceSelector) -> Result<(), Error> {
        match self.state {
            SchedulerState::Acquiring | SchedulerState::Running => return Err(Error::AlreadyRunning),
            SchedulerState::Stopped | SchedulerState::Error => {}
        }
        if self.status == Status::Unsupported {
            // Nothing a retry can change. Stay in Error; the loop keeps running.
            self.state = SchedulerState::Error;
            return Err(Error::Unsupported("camera capture is not available on this host".into()));
        }

        tracing::info!("Acquiring {selector}");
        self.state = SchedulerState::Acquiring;
        self.status = Status::Acquiring;
        self.selector = Some(selector);
        self.gate.reopen();

        match self.source.acquire(&selector) {
            Ok(()) => {
                self.acquired = true;
                Ok(())
            }
            Err(e) => {
                // Ticks see Error and idle; the loop stays up for a retry.
                self.state = SchedulerState::Error;
                self.status = match e {
                    Error::Unsupported(_) => Status::Unsupported,
                    _ => Status::Error,
                };
                tracing::error!("Acquiring {selector} failed: {e}");
                Err(e)
            }
        }
    }

    /// One refresh worth of work. Never fails: presentation errors are
    /// logged and counted, the loop keeps going.
    pub fn tick<P: Presenter>(&mut self, presenter: &mut P) -> TickOutcome {
        let gate = Arc::clone(&self.gate);
        let _turn = gate.turn.lock();
        if gate.is_cancelled() {
            return TickOutcome::Idle;
        }
        let facing = match (self.state, self.selector) {
            (SchedulerState::Acquiring | SchedulerState::Running, Some(sel)) => sel.facing,
            _ => return TickOutcome::Idle,
        };

        // Startup race: the device is open but no frame has decoded yet.
        let Some(frame) = self.source.current_frame().filter(|f| f.has_dimensions()) else {
            self.stats.waiting += 1;
            return TickOutcome::Waiting;
        };

        if self.frame.ensure_size(frame.width, frame.height) {
            tracing::info!("Frame size now {}x{}", frame.width, frame.height);
        }
        self.frame.data.copy_from_slice(frame.pixels);

        if self.state == SchedulerState::Acquiring {
            self.state = SchedulerState::Running;
            self.status = Status::active(facing);
            tracing::info!("Running ({})", self.status);
        }

        let cfg = self.settings.snapshot();
        self.filter.apply(&mut self.frame, &cfg);
        self.has_frame = true;

        if let Err(e) = presenter.present(&self.frame) {
            self.stats.present_failures += 1;
            tracing::warn!("Present failed: {e}");
        }
        self.stats.presented += 1;
        TickOutcome::Presented
    }

    /// Cancel further ticks and release the device. Safe to call repeatedly;
    /// the device is released at most once per successful `start`.
    pub fn stop(&mut self) {
        self.gate.cancel();
        if self.acquired {
            self.source.release();
            self.acquired = false;
            tracing::info!("Stopped");
        }
        if self.state != SchedulerState::Error {
            self.state = SchedulerState::Stopped;
        }
    }

    /// Swap the device feeding the loop. On failure the scheduler is left in
    /// Error with nothing acquired; `start` can retry.
    pub fn switch_source(&mut self, selector: DeviceSelector) -> Result<(), Error> {
        self.stop();
        self.state = SchedulerState::Stopped;
        self.start(selector)
    }

    /// The repeating task. Ticks until the stop handle fires, the presenter
    /// closes, or `between_ticks` breaks. `between_ticks` runs before every
    /// tick with full access to the scheduler (controls, source switching).
    pub fn run<P: Presenter>(
        &mut self,
        presenter: &mut P,
        mut between_ticks: impl FnMut(&mut Self, &mut P) -> ControlFlow<()>,
    ) {
        // Only a StopHandle ends the loop; the stop inside a source switch does not.
        let shutdown = self.stop_handle();
        while !shutdown.is_stopped() && presenter.is_open() {
            if between_ticks(self, presenter).is_break() {
                break;
            }
            if self.tick(presenter) != TickOutcome::Presented {
                presenter.idle();
            }
        }
    }

    /// Encode the last fully processed frame as JPEG.
    pub fn export_current_frame(&self) -> Result<Vec<u8>, Error> {
        if !self.has_frame {
            return Err(Error::Export("no frame has been rendered yet".into()));
        }
        export::encode_jpeg(&self.frame)
    }

    #[cfg(test)]
    fn source_mut(&mut self) -> &mut S { &mut self.source }
}
