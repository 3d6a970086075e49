use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError, TrySendError};
use std::time::Duration;

/// Capacity-1 hand-off that always keeps the most recent value.
///
/// A send on a full slot discards the queued value. Every clone talks to
/// the same slot, so any clone may send or receive.
#[derive(Debug)]
pub struct LatestOnlyChannel<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
}

impl<T> Clone for LatestOnlyChannel<T> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone(), rx: self.rx.clone() }
    }
}

impl<T> Default for LatestOnlyChannel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> LatestOnlyChannel<T> {
    pub fn new() -> Self {
        let (tx, rx) = bounded(1);
        Self { tx, rx }
    }

    /// Never blocks. Returns true if an older value was dropped.
    pub fn send(&self, value: T) -> bool {
        let mut value = value;
        let mut dropped = false;
        loop {
            match self.tx.try_send(value) {
                Ok(()) => return dropped,
                Err(TrySendError::Full(v)) => {
                    // Another receiver may win the race; either way the slot frees up.
                    if self.rx.try_recv().is_ok() {
                        dropped = true;
                    }
                    value = v;
                }
                // Both ends are held by `self`, so this cannot happen.
                Err(TrySendError::Disconnected(_)) => return dropped,
            }
        }
    }

    pub fn receive(&self, timeout: Duration) -> Option<T> {
        self.rx.recv_timeout(timeout).ok()
    }

    pub fn try_receive(&self) -> Option<T> {
        match self.rx.try_recv() {
            Ok(value) => Some(value),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
