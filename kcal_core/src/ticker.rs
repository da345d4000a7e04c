//! Cancellable repeating timer.
//!
//! A `Ticker` runs its callback on a dedicated thread at a fixed period. It
//! stops when the callback returns `ControlFlow::Break`, when `stop` is
//! called, or when the handle is dropped. Stopping signals the thread and
//! joins it, so no callback runs after `stop` returns.

use std::ops::ControlFlow;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::{Error, Result};

pub struct Ticker {
    name: String,
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Ticker {
    /// Spawn a ticker firing `callback` every `period`
    pub fn spawn<F>(name: impl Into<String>, period: Duration, mut callback: F) -> Result<Self>
    where
        F: FnMut() -> ControlFlow<()> + Send + 'static,
    {
        let name = name.into();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let thread_name = name.clone();

        let handle = thread::Builder::new()
            .name(format!("ticker-{}", name))
            .spawn(move || loop {
                match stop_rx.recv_timeout(period) {
                    Err(RecvTimeoutError::Timeout) => {
                        if callback().is_break() {
                            tracing::debug!("Ticker {} finished", thread_name);
                            break;
                        }
                    }
                    // Stop requested or handle dropped
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                        tracing::debug!("Ticker {} cancelled", thread_name);
                        break;
                    }
                }
            })
            .map_err(|e| Error::Other(format!("failed to spawn ticker {}: {}", name, e)))?;

        tracing::debug!("Ticker {} started ({:?})", name, period);
        Ok(Self {
            name,
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }

    /// True until the ticker has been stopped or its callback finished
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Cancel and wait for the thread to exit
    pub fn stop(mut self) {
        self.shutdown();
    }

    /// Wait for the callback to end the ticker on its own
    pub fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("Ticker {} panicked", self.name);
            }
        }
        self.stop_tx = None;
    }

    fn shutdown(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            // The thread may already be gone
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("Ticker {} panicked", self.name);
            }
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_break_ends_ticker() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);

        let ticker = Ticker::spawn("count", Duration::from_millis(5), move || {
            if counter.fetch_add(1, Ordering::SeqCst) + 1 >= 3 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
        .unwrap();

        ticker.join();
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_stop_is_deterministic() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);

        let ticker = Ticker::spawn("forever", Duration::from_millis(2), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            ControlFlow::Continue(())
        })
        .unwrap();
        assert!(ticker.is_running());

        thread::sleep(Duration::from_millis(20));
        ticker.stop();
        let after_stop = count.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(count.load(Ordering::SeqCst), after_stop);
    }

    #[test]
    fn test_drop_cancels_before_first_tick() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);

        {
            let _ticker = Ticker::spawn("slow", Duration::from_secs(60), move || {
                counter.fetch_add(1, Ordering::SeqCst);
                ControlFlow::Continue(())
            })
            .unwrap();
        }

        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
