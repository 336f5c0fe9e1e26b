//! Cancellable fixed-period background task.
//!
//! PeriodicTask runs a closure on a dedicated thread after an initial delay,
//! then every fixed period, until cancelled. The handle carries the cancel
//! flag and is meant to be owned by the lifecycle manager only, never handed
//! to callers.
//!
//! - cancel() is non-blocking: it prevents any further tick from starting but
//!   does not abort a tick already in flight.
//! - wait(timeout) is the shutdown path: it blocks until the worker thread
//!   has fully drained or the timeout elapses (reported as a distinct error).

use anyhow::{anyhow, Context, Result};
use log::debug;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

#[derive(Default)]
struct TaskState {
    cancelled: bool,
    finished: bool,
}

pub struct PeriodicTask {
    name: String,
    state: Arc<(Mutex<TaskState>, Condvar)>,
    thread: Option<JoinHandle<()>>,
}

impl PeriodicTask {
    /// Spawn a named worker thread running `tick` after `initial_delay`, then
    /// every `period`.
    pub fn spawn<F>(name: &str, initial_delay: Duration, period: Duration, mut tick: F) -> Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let state = Arc::new((Mutex::new(TaskState::default()), Condvar::new()));
        let worker_state = Arc::clone(&state);
        let thread_name = name.to_string();

        let thread = std::thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                let (lock, cv) = &*worker_state;
                if !sleep_or_cancel(lock, cv, initial_delay) {
                    loop {
                        tick();
                        if sleep_or_cancel(lock, cv, period) {
                            break;
                        }
                    }
                }
                let mut st = lock.lock().unwrap();
                st.finished = true;
                cv.notify_all();
            })
            .with_context(|| format!("spawn task thread {}", name))?;

        Ok(Self {
            name: name.to_string(),
            state,
            thread: Some(thread),
        })
    }

    /// Request cancellation without waiting: no new tick will start.
    pub fn cancel(&self) {
        let (lock, cv) = &*self.state;
        let mut st = lock.lock().unwrap();
        if !st.cancelled {
            debug!("cancelling task {}", self.name);
            st.cancelled = true;
            cv.notify_all();
        }
    }

    /// Cancel and block until the worker thread has drained, or fail with a
    /// timeout error (distinct from cancellation).
    pub fn wait(mut self, timeout: Duration) -> Result<()> {
        self.cancel();
        let (lock, cv) = &*self.state;
        let st = lock.lock().unwrap();
        let (st, wait_res) = cv
            .wait_timeout_while(st, timeout, |st| !st.finished)
            .unwrap();
        if wait_res.timed_out() && !st.finished {
            return Err(anyhow!(
                "task {} did not finish within {:?}",
                self.name,
                timeout
            ));
        }
        drop(st);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
        Ok(())
    }
}

/// Wait out `delay` on the condvar; wakes early on cancel. Returns true when
/// the task has been cancelled.
fn sleep_or_cancel(lock: &Mutex<TaskState>, cv: &Condvar, delay: Duration) -> bool {
    let st = lock.lock().unwrap();
    let (st, _) = cv
        .wait_timeout_while(st, delay, |st| !st.cancelled)
        .unwrap();
    st.cancelled
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn ticks_repeatedly_until_cancelled() -> Result<()> {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let task = PeriodicTask::spawn(
            "test-ticker",
            Duration::from_millis(0),
            Duration::from_millis(10),
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        )?;
        std::thread::sleep(Duration::from_millis(120));
        task.wait(Duration::from_secs(5))?;
        assert!(ticks.load(Ordering::SeqCst) >= 2);
        Ok(())
    }

    #[test]
    fn cancel_before_initial_delay_skips_every_tick() -> Result<()> {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let task = PeriodicTask::spawn(
            "test-cancelled-early",
            Duration::from_secs(3600),
            Duration::from_secs(3600),
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        )?;
        task.cancel();
        task.wait(Duration::from_secs(5))?;
        assert_eq!(ticks.load(Ordering::SeqCst), 0);
        Ok(())
    }

    #[test]
    fn wait_times_out_on_a_stuck_tick() -> Result<()> {
        let task = PeriodicTask::spawn(
            "test-stuck",
            Duration::from_millis(0),
            Duration::from_millis(10),
            move || {
                std::thread::sleep(Duration::from_secs(2));
            },
        )?;
        // Give the tick time to start, then demand an impossible deadline.
        std::thread::sleep(Duration::from_millis(50));
        assert!(task.wait(Duration::from_millis(50)).is_err());
        Ok(())
    }
}
