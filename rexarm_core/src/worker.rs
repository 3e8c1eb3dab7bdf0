//! Periodic background workers.
//!
//! Each `Worker` owns exactly one named thread that calls a tick closure at a
//! fixed period until stopped. The period wait doubles as the cancellation
//! point: `stop()` (or dropping the worker) wakes it immediately.
//!
//! Safety: the thread is joined on `stop()`/`Drop`, so workers never leak.
use crossbeam_channel as xch;
use eyre::WrapErr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::error::Result;

/// Returned by a tick to keep going or end the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickFlow {
    Continue,
    Stop,
}

pub struct Worker {
    name: String,
    /// Dropping the sender disconnects the channel and wakes the thread.
    stop_tx: Option<xch::Sender<()>>,
    ticks: Arc<AtomicU64>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("name", &self.name)
            .field("ticks", &self.ticks())
            .finish_non_exhaustive()
    }
}

impl Worker {
    pub fn spawn<F>(name: &str, period: Duration, mut tick: F) -> Result<Self>
    where
        F: FnMut() -> TickFlow + Send + 'static,
    {
        if period.is_zero() {
            eyre::bail!("worker {name}: period must be > 0");
        }
        let (stop_tx, stop_rx) = xch::bounded::<()>(1);
        let ticks = Arc::new(AtomicU64::new(0));
        let ticks_clone = ticks.clone();
        let thread_name = name.to_string();

        let join_handle = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                tracing::debug!(worker = %thread_name, ?period, "worker started");
                let mut next = Instant::now();
                loop {
                    if !matches!(stop_rx.try_recv(), Err(xch::TryRecvError::Empty)) {
                        break;
                    }
                    let flow = tick();
                    ticks_clone.fetch_add(1, Ordering::Relaxed);
                    if flow == TickFlow::Stop {
                        tracing::debug!(worker = %thread_name, "tick requested stop");
                        break;
                    }

                    next += period;
                    let now = Instant::now();
                    if next < now {
                        // Overran: start a fresh schedule instead of bursting to catch up.
                        tracing::trace!(worker = %thread_name, late = ?(now - next), "tick overran period");
                        next = now;
                    }
                    match stop_rx.recv_deadline(next) {
                        Err(xch::RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(xch::RecvTimeoutError::Disconnected) => break,
                    }
                }
                tracing::trace!(worker = %thread_name, "worker exiting cleanly");
            })
            .wrap_err_with(|| format!("spawn worker thread {name}"))?;

        Ok(Self {
            name: name.to_string(),
            stop_tx: Some(stop_tx),
            ticks,
            join_handle: Some(join_handle),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Completed ticks so far.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// True once the thread has returned (stopped or tick asked to stop).
    pub fn is_finished(&self) -> bool {
        self.join_handle
            .as_ref()
            .is_none_or(std::thread::JoinHandle::is_finished)
    }

    /// Signal and join. Idempotent.
    pub fn stop(&mut self) {
        self.stop_tx.take();
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => {
                    tracing::trace!(worker = %self.name, "worker joined");
                }
                Err(e) => {
                    // Thread panicked; log but don't propagate
                    tracing::warn!(worker = %self.name, ?e, "worker thread panicked");
                }
            }
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_period_is_rejected() {
        assert!(Worker::spawn("zero", Duration::ZERO, || TickFlow::Continue).is_err());
    }

    #[test]
    fn tick_can_end_the_worker() {
        let mut n = 0;
        let w = Worker::spawn("three", Duration::from_millis(1), move || {
            n += 1;
            if n == 3 { TickFlow::Stop } else { TickFlow::Continue }
        })
        .unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while !w.is_finished() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(2));
        }
        assert!(w.is_finished());
        assert_eq!(w.ticks(), 3);
    }

    #[test]
    fn stop_interrupts_a_long_period() {
        let mut w = Worker::spawn("slow", Duration::from_secs(60), || TickFlow::Continue).unwrap();
        let t0 = Instant::now();
        w.stop();
        assert!(t0.elapsed() < Duration::from_secs(5));
        assert!(w.is_finished());
        assert!(w.ticks() <= 1);
    }
}
