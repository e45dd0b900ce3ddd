use std::cell::RefCell;
use std::rc::Rc;

use log::debug;

use crate::error::Result;

/// Frame metadata handed to each frame callback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInfo {
    pub number: u64,
    /// Seconds on the host clock.
    pub time: f64,
    /// Seconds since the previous frame.
    pub delta: f64,
}

impl FrameInfo {
    pub fn new(number: u64, time: f64, delta: f64) -> Self {
        Self {
            number,
            time,
            delta,
        }
    }
}

/// Token for a scheduled redraw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(pub u64);

/// Host service that delivers one frame callback per display refresh.
///
/// Requests are one-shot: each delivered frame must be requested again.
pub trait FrameScheduler {
    fn request_frame(&mut self) -> Result<FrameHandle>;

    /// Withdraws a request. Cancelling a handle that already fired is a no-op.
    fn cancel_frame(&mut self, handle: FrameHandle);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    /// Terminal; reached only through [`AnimationLoop::stop`].
    Stopped,
}

/// Bookkeeping for the self-rescheduling frame chain.
#[derive(Debug)]
pub struct AnimationLoop {
    state: LoopState,
    pending: Option<FrameHandle>,
    frames: u64,
}

impl Default for AnimationLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl AnimationLoop {
    pub fn new() -> Self {
        Self {
            state: LoopState::Running,
            pending: None,
            frames: 0,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == LoopState::Running
    }

    pub fn pending(&self) -> Option<FrameHandle> {
        self.pending
    }

    /// Frames completed so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Requests the next frame unless one is already outstanding.
    pub fn schedule(&mut self, scheduler: &mut dyn FrameScheduler) -> Result<()> {
        if !self.is_running() || self.pending.is_some() {
            return Ok(());
        }
        self.pending = Some(scheduler.request_frame()?);
        Ok(())
    }

    /// Consumes the outstanding request as the frame for `handle` starts.
    ///
    /// Returns `false` once stopped or when `handle` is not the outstanding
    /// request; the caller must then skip the frame.
    pub fn begin_frame(&mut self, handle: FrameHandle) -> bool {
        if !self.is_running() {
            return false;
        }
        if self.pending != Some(handle) {
            debug!("ignoring stale frame {handle:?}; outstanding {:?}", self.pending);
            return false;
        }
        self.pending = None;
        true
    }

    pub fn end_frame(&mut self) {
        self.frames += 1;
    }

    /// Cancels the outstanding request and stops for good.
    pub fn stop(&mut self, scheduler: &mut dyn FrameScheduler) {
        if let Some(handle) = self.pending.take() {
            scheduler.cancel_frame(handle);
        }
        if self.state == LoopState::Running {
            debug!("animation loop stopped after {} frame(s)", self.frames);
        }
        self.state = LoopState::Stopped;
    }
}

#[derive(Debug, Default)]
struct ManualState {
    next_id: u64,
    pending: Option<FrameHandle>,
    requested: u64,
    cancelled: u64,
}

/// Scheduler driven explicitly by the caller, for headless runs and tests.
///
/// Clones share state, so a host can keep one clone while the renderer owns
/// another.
#[derive(Debug, Clone, Default)]
pub struct ManualScheduler {
    state: Rc<RefCell<ManualState>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> Option<FrameHandle> {
        self.state.borrow().pending
    }

    /// Removes the outstanding request, as the host does when it fires a frame.
    pub fn fire(&self) -> Option<FrameHandle> {
        self.state.borrow_mut().pending.take()
    }

    pub fn requested(&self) -> u64 {
        self.state.borrow().requested
    }

    pub fn cancelled(&self) -> u64 {
        self.state.borrow().cancelled
    }
}

impl FrameScheduler for ManualScheduler {
    fn request_frame(&mut self) -> Result<FrameHandle> {
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        state.requested += 1;
        let handle = FrameHandle(state.next_id);
        state.pending = Some(handle);
        Ok(handle)
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        let mut state = self.state.borrow_mut();
        if state.pending == Some(handle) {
            state.pending = None;
            state.cancelled += 1;
        }
    }
}
