//! Pause, resume and stop for a running scan
//!
//! Elapsed time only counts running intervals. Workers call
//! [`ScanControl::wait_if_paused`] before each request and block there
//! while the scan is paused.

use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Running,
    Paused,
    Stopped,
}

#[derive(Debug)]
struct RunState {
    state: ScanState,
    running_since: Option<Instant>,
    accumulated: Duration,
}

impl RunState {
    fn close_interval(&mut self) {
        if let Some(since) = self.running_since.take() {
            self.accumulated += since.elapsed();
        }
    }
}

#[derive(Debug)]
pub struct ScanControl {
    inner: Mutex<RunState>,
    resumed: Condvar,
}

impl Default for ScanControl {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanControl {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RunState {
                state: ScanState::Idle,
                running_since: None,
                accumulated: Duration::ZERO,
            }),
            resumed: Condvar::new(),
        }
    }

    pub fn start(&self) {
        let mut inner = self.inner.lock();
        if inner.state == ScanState::Idle {
            inner.state = ScanState::Running;
            inner.running_since = Some(Instant::now());
        }
    }

    pub fn pause(&self) {
        let mut inner = self.inner.lock();
        if inner.state == ScanState::Running {
            inner.close_interval();
            inner.state = ScanState::Paused;
            tracing::debug!("Scan paused");
        }
    }

    pub fn resume(&self) {
        let mut inner = self.inner.lock();
        if inner.state == ScanState::Paused {
            inner.state = ScanState::Running;
            inner.running_since = Some(Instant::now());
            self.resumed.notify_all();
            tracing::debug!("Scan resumed");
        }
    }

    /// Stop from any state; wakes every thread blocked in `wait_if_paused`
    pub fn stop(&self) {
        self.resume();
        let mut inner = self.inner.lock();
        if inner.state != ScanState::Stopped {
            inner.close_interval();
            inner.state = ScanState::Stopped;
        }
        self.resumed.notify_all();
    }

    /// Block the calling thread while the scan is paused
    pub fn wait_if_paused(&self) {
        let mut inner = self.inner.lock();
        while inner.state == ScanState::Paused {
            self.resumed.wait(&mut inner);
        }
    }

    pub fn state(&self) -> ScanState {
        self.inner.lock().state
    }

    pub fn is_paused(&self) -> bool {
        self.state() == ScanState::Paused
    }

    pub fn is_stopped(&self) -> bool {
        self.state() == ScanState::Stopped
    }

    /// Time spent running, pauses excluded
    pub fn elapsed(&self) -> Duration {
        let inner = self.inner.lock();
        inner.accumulated
            + inner
                .running_since
                .map(|since| since.elapsed())
                .unwrap_or(Duration::ZERO)
    }
}
