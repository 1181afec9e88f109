use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::Result;

/// Fixed-rate frame counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameClock {
    fps: u32,
    frame: u64,
}

impl FrameClock {
    pub fn new(fps: u32) -> Self {
        Self {
            fps: fps.max(1),
            frame: 0,
        }
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    /// Index of the frame about to be drawn.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn elapsed_seconds(&self) -> f32 {
        self.frame as f32 / self.fps as f32
    }

    pub fn frame_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.fps as f64)
    }

    pub fn advance(&mut self) {
        self.frame += 1;
    }

    pub fn reset(&mut self) {
        self.frame = 0;
    }
}

/// Cloneable flag that ends a [`RenderLoop`] before its next frame.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Drives one callback per frame until stopped, out of frames, or failed.
#[derive(Debug)]
pub struct RenderLoop {
    clock: FrameClock,
    limit: Option<u64>,
    paced: bool,
    stop: StopHandle,
}

impl RenderLoop {
    pub fn new(fps: u32) -> Self {
        Self {
            clock: FrameClock::new(fps),
            limit: None,
            paced: false,
            stop: StopHandle::default(),
        }
    }

    /// Stops after `frames` callbacks.
    pub fn with_limit(mut self, frames: u64) -> Self {
        self.limit = Some(frames);
        self
    }

    /// Sleeps between frames to hold the frame rate in wall-clock time.
    pub fn paced(mut self, paced: bool) -> Self {
        self.paced = paced;
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    /// Runs `frame` once per tick. Returns the number of frames completed.
    pub fn run(&mut self, mut frame: impl FnMut(&FrameClock) -> Result<()>) -> Result<u64> {
        let started = Instant::now();
        let mut completed = 0;
        info!(fps = self.clock.fps(), limit = ?self.limit, "render loop started");

        while !self.stop.is_stopped() && self.limit.map_or(true, |limit| completed < limit) {
            frame(&self.clock)?;
            self.clock.advance();
            completed += 1;

            if self.paced {
                let due = self.clock.frame_duration().mul_f64(completed as f64);
                if let Some(wait) = due.checked_sub(started.elapsed()) {
                    thread::sleep(wait);
                }
            }
        }

        if self.stop.is_stopped() {
            debug!(completed, "render loop stopped");
        }
        info!(completed, elapsed = ?started.elapsed(), "render loop finished");
        Ok(completed)
    }
}
