use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::Result;

pub mod canvas;

pub use canvas::{
    Canvas, Color, ColorStop, DrawCommand, LinearGradient, Paint, Point, RecordingCanvas, Rect,
    SurfaceSize,
};

/// Opaque id of one outstanding frame request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameRequest(u64);

/// The host's animation-frame cadence.
pub trait FrameScheduler {
    fn request_frame(&mut self) -> FrameRequest;
    fn cancel_frame(&mut self, request: FrameRequest);
}

/// FIFO scheduler driven explicitly by the caller, one `poll` per frame.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    next_id: u64,
    pending: VecDeque<FrameRequest>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pops the next due frame, if any.
    pub fn poll(&mut self) -> Option<FrameRequest> {
        self.pending.pop_front()
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

impl FrameScheduler for ManualScheduler {
    fn request_frame(&mut self) -> FrameRequest {
        self.next_id += 1;
        let request = FrameRequest(self.next_id);
        self.pending.push_back(request);
        request
    }

    fn cancel_frame(&mut self, request: FrameRequest) {
        self.pending.retain(|pending| *pending != request);
    }
}

/// What happened to a fired frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameOutcome {
    Drawn,
    /// Nothing was ready to draw; the canvas kept its previous frame.
    Skipped,
    /// The draw failed; the loop kept going.
    Faulted,
    /// The frame was not the outstanding request (cancelled or superseded).
    Stale,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopStats {
    pub frames: u64,
    pub skipped: u64,
    pub faults: u64,
    pub stale: u64,
}

/// Self-sustaining per-frame loop. At most one frame request is outstanding;
/// its presence is what "running" means.
#[derive(Debug, Default)]
pub struct RenderLoop {
    handle: Option<FrameRequest>,
    stats: LoopStats,
}

impl RenderLoop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    /// Schedules the first frame. Returns `false` if the loop was already running.
    pub fn start(&mut self, scheduler: &mut dyn FrameScheduler) -> bool {
        if self.handle.is_some() {
            return false;
        }
        self.handle = Some(scheduler.request_frame());
        tracing::debug!("render loop started");
        true
    }

    /// Cancels the outstanding frame. Returns `false` if nothing was running.
    pub fn stop(&mut self, scheduler: &mut dyn FrameScheduler) -> bool {
        match self.handle.take() {
            Some(request) => {
                scheduler.cancel_frame(request);
                tracing::debug!("render loop stopped");
                true
            }
            None => false,
        }
    }

    /// Runs one fired frame: re-arms the loop first, then draws. `draw` returns
    /// `Ok(false)` when it had nothing to draw. A failed draw is logged and does
    /// not stop the loop.
    pub fn run_frame<F>(
        &mut self,
        request: FrameRequest,
        scheduler: &mut dyn FrameScheduler,
        draw: F,
    ) -> FrameOutcome
    where
        F: FnOnce() -> Result<bool>,
    {
        if self.handle != Some(request) {
            self.stats.stale += 1;
            return FrameOutcome::Stale;
        }

        self.handle = Some(scheduler.request_frame());

        match draw() {
            Ok(true) => {
                self.stats.frames += 1;
                FrameOutcome::Drawn
            }
            Ok(false) => {
                self.stats.skipped += 1;
                FrameOutcome::Skipped
            }
            Err(err) => {
                self.stats.faults += 1;
                tracing::warn!(%err, "frame draw failed, continuing");
                FrameOutcome::Faulted
            }
        }
    }
}
