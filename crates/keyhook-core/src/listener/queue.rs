// Keyhook Async Queue
// Hands events from the capture thread to the async worker

use parking_lot::{Condvar, Mutex};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use crate::event::KeyEvent;

/// Unbounded event queue with a drain barrier.
///
/// `push` never blocks. Every pushed event counts as pending until the
/// consumer calls `task_done`, which lets `wait_drained` act as a join.
pub struct AsyncQueue {
    sender: Sender<KeyEvent>,
    receiver: Mutex<Receiver<KeyEvent>>,
    pending: Mutex<usize>,
    drained: Condvar,
}

impl Default for AsyncQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl AsyncQueue {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            sender,
            receiver: Mutex::new(receiver),
            pending: Mutex::new(0),
            drained: Condvar::new(),
        }
    }

    pub fn push(&self, event: KeyEvent) {
        *self.pending.lock() += 1;
        if self.sender.send(event).is_err() {
            self.task_done();
        }
    }

    /// Next event, or `None` when nothing arrives within `timeout`
    pub fn recv_timeout(&self, timeout: Duration) -> Option<KeyEvent> {
        match self.receiver.lock().recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Mark one received event as fully processed
    pub fn task_done(&self) {
        let mut pending = self.pending.lock();
        *pending = pending.saturating_sub(1);
        if *pending == 0 {
            self.drained.notify_all();
        }
    }

    /// Number of events pushed but not yet marked done
    pub fn pending(&self) -> usize {
        *self.pending.lock()
    }

    /// Block until every pushed event is done, or `timeout` passes.
    ///
    /// Returns whether the queue drained.
    pub fn wait_drained(&self, timeout: Duration) -> bool {
        let mut pending = self.pending.lock();
        if *pending > 0 {
            let _ = self
                .drained
                .wait_while_for(&mut pending, |p| *p > 0, timeout);
        }
        *pending == 0
    }

    /// Drop everything still queued
    pub fn clear(&self) {
        let receiver = self.receiver.lock();
        while receiver.try_recv().is_ok() {}
        *self.pending.lock() = 0;
        self.drained.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::ScanCode;
    use std::sync::Arc;

    #[test]
    fn test_push_and_receive() {
        let queue = AsyncQueue::new();
        queue.push(KeyEvent::down(ScanCode(30), 0.0));
        assert_eq!(queue.pending(), 1);

        let event = queue.recv_timeout(Duration::from_millis(10)).unwrap();
        assert_eq!(event.scan_code, ScanCode(30));
        assert!(!queue.wait_drained(Duration::from_millis(1)));

        queue.task_done();
        assert!(queue.wait_drained(Duration::from_millis(1)));
    }

    #[test]
    fn test_recv_timeout_empty() {
        let queue = AsyncQueue::new();
        assert!(queue.recv_timeout(Duration::from_millis(5)).is_none());
    }

    #[test]
    fn test_wait_drained_across_threads() {
        let queue = Arc::new(AsyncQueue::new());
        for i in 0..3 {
            queue.push(KeyEvent::down(ScanCode(30), i as f64));
        }

        let worker = queue.clone();
        let handle = std::thread::spawn(move || {
            while let Some(_event) = worker.recv_timeout(Duration::from_millis(50)) {
                worker.task_done();
            }
        });

        assert!(queue.wait_drained(Duration::from_secs(5)));
        handle.join().unwrap();
    }

    #[test]
    fn test_clear() {
        let queue = AsyncQueue::new();
        queue.push(KeyEvent::down(ScanCode(30), 0.0));
        queue.clear();
        assert_eq!(queue.pending(), 0);
        assert!(queue.recv_timeout(Duration::from_millis(1)).is_none());
    }
}
