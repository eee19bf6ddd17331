//! Marshalling of asynchronous callbacks back to the owning context.
//!
//! Capture completions and permission answers arrive on backend threads.
//! The controller hands every delegate-facing callback to the [`Dispatcher`]
//! chosen at construction.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

pub type Task = Box<dyn FnOnce() + Send + 'static>;

pub trait Dispatcher: Send + Sync {
    fn dispatch(&self, task: Task);
}

/// Runs tasks on whichever thread delivers them
#[derive(Debug, Default, Clone, Copy)]
pub struct ImmediateDispatcher;

impl Dispatcher for ImmediateDispatcher {
    fn dispatch(&self, task: Task) {
        task();
    }
}

/// Sends tasks over a channel to a [`MainQueue`] pumped by the owning thread
#[derive(Debug, Clone)]
pub struct ChannelDispatcher {
    sender: Sender<Task>,
}

impl Dispatcher for ChannelDispatcher {
    fn dispatch(&self, task: Task) {
        if self.sender.send(task).is_err() {
            log::warn!("Main queue is gone, dropping callback");
        }
    }
}

/// Receiving end living on the owning thread
pub struct MainQueue {
    receiver: Receiver<Task>,
}

impl MainQueue {
    /// Create a linked dispatcher/queue pair
    pub fn new() -> (ChannelDispatcher, MainQueue) {
        let (sender, receiver) = crossbeam_channel::unbounded();
        (ChannelDispatcher { sender }, MainQueue { receiver })
    }

    /// Run every task already queued; returns how many ran
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while let Ok(task) = self.receiver.try_recv() {
            task();
            ran += 1;
        }
        ran
    }

    /// Block until at least one task ran or `timeout` elapsed, then drain
    pub fn run_until(&self, timeout: Duration) -> usize {
        match self.receiver.recv_timeout(timeout) {
            Ok(task) => {
                task();
                1 + self.run_pending()
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => 0,
        }
    }

    /// Keep running tasks while `pending` holds; false if `timeout` hit first
    pub fn run_while<F: Fn() -> bool>(&self, timeout: Duration, pending: F) -> bool {
        let deadline = Instant::now() + timeout;
        while pending() {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            self.run_until(deadline - now);
        }
        true
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_channel_dispatch_runs_on_owner() {
        let (dispatcher, queue) = MainQueue::new();
        let owner = std::thread::current().id();
        let seen = Arc::new(std::sync::Mutex::new(None));

        let slot = seen.clone();
        std::thread::spawn(move || {
            dispatcher.dispatch(Box::new(move || {
                *slot.lock().unwrap() = Some(std::thread::current().id());
            }));
        })
        .join()
        .unwrap();

        assert_eq!(queue.len(), 1);
        assert_eq!(queue.run_pending(), 1);
        assert_eq!(*seen.lock().unwrap(), Some(owner));
    }

    #[test]
    fn test_run_while_times_out() {
        let (_dispatcher, queue) = MainQueue::new();
        assert!(!queue.run_while(Duration::from_millis(20), || true));
        assert!(queue.run_while(Duration::from_millis(20), || false));
    }

    #[test]
    fn test_immediate_dispatch() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        ImmediateDispatcher.dispatch(Box::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
