//! Message delivery queue
//!
//! Decouples event producers (proxy termination, protocol activation) from a
//! UI listener that may not exist yet. Messages sent while no listener is
//! attached are buffered and flushed in arrival order on attach.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use tokio::sync::mpsc;

/// Receiving end of the queue, typically the UI surface
pub trait Listener<M>: Send {
    /// Hand one message over.
    ///
    /// Returning the message back means the listener is gone; the queue
    /// detaches it and buffers the message again.
    fn deliver(&mut self, message: M) -> Result<(), M>;
}

impl<M: Send> Listener<M> for mpsc::UnboundedSender<M> {
    fn deliver(&mut self, message: M) -> Result<(), M> {
        self.send(message).map_err(|e| e.0)
    }
}

enum Delivery<M> {
    Buffering(VecDeque<M>),
    Attached(Box<dyn Listener<M>>),
}

/// Send-or-buffer channel with a single listener.
///
/// Listener callbacks run while the queue lock is held, so a listener must
/// not call back into the queue.
pub struct DeliveryQueue<M> {
    inner: Mutex<Delivery<M>>,
}

impl<M: Send + 'static> DeliveryQueue<M> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Delivery::Buffering(VecDeque::new())),
        }
    }

    /// Deliver now if a listener is attached, otherwise buffer
    pub fn send(&self, message: M) {
        let mut inner = self.lock();
        let refused = match &mut *inner {
            Delivery::Buffering(pending) => {
                pending.push_back(message);
                tracing::debug!(pending = pending.len(), "Buffered message for UI");
                None
            }
            Delivery::Attached(listener) => listener.deliver(message).err(),
        };

        if let Some(message) = refused {
            tracing::warn!("UI listener went away, buffering messages again");
            *inner = Delivery::Buffering(VecDeque::from([message]));
        }
    }

    /// Register the listener and flush everything buffered so far.
    ///
    /// Replaces any previously attached listener. Returns how many buffered
    /// messages were flushed.
    pub fn attach(&self, listener: impl Listener<M> + 'static) -> usize {
        let mut listener: Box<dyn Listener<M>> = Box::new(listener);
        let mut inner = self.lock();

        let mut pending = match std::mem::replace(&mut *inner, Delivery::Buffering(VecDeque::new()))
        {
            Delivery::Buffering(pending) => pending,
            Delivery::Attached(_) => VecDeque::new(),
        };

        let mut flushed = 0;
        while let Some(message) = pending.pop_front() {
            if let Err(message) = listener.deliver(message) {
                tracing::warn!(flushed, "UI listener refused message during flush");
                pending.push_front(message);
                *inner = Delivery::Buffering(pending);
                return flushed;
            }
            flushed += 1;
        }

        tracing::debug!(flushed, "UI listener attached");
        *inner = Delivery::Attached(listener);
        flushed
    }

    /// Drop the listener; later messages are buffered again.
    ///
    /// Returns whether a listener was attached.
    pub fn detach(&self) -> bool {
        let mut inner = self.lock();
        match &*inner {
            Delivery::Attached(_) => {
                *inner = Delivery::Buffering(VecDeque::new());
                true
            }
            Delivery::Buffering(_) => false,
        }
    }

    pub fn is_attached(&self) -> bool {
        matches!(*self.lock(), Delivery::Attached(_))
    }

    /// Number of messages waiting for a listener
    pub fn pending(&self) -> usize {
        match &*self.lock() {
            Delivery::Buffering(pending) => pending.len(),
            Delivery::Attached(_) => 0,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Delivery<M>> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<M: Send + 'static> Default for DeliveryQueue<M> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    /// Records everything it receives
    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<&'static str>>>);

    impl Recorder {
        fn seen(&self) -> Vec<&'static str> {
            self.0.lock().unwrap().clone()
        }
    }

    impl Listener<&'static str> for Recorder {
        fn deliver(&mut self, message: &'static str) -> Result<(), &'static str> {
            self.0.lock().unwrap().push(message);
            Ok(())
        }
    }

    /// Accepts a fixed number of messages, then refuses
    struct Flaky {
        accept: usize,
        seen: Recorder,
    }

    impl Listener<&'static str> for Flaky {
        fn deliver(&mut self, message: &'static str) -> Result<(), &'static str> {
            if self.accept == 0 {
                return Err(message);
            }
            self.accept -= 1;
            self.seen.deliver(message)
        }
    }

    #[test]
    fn test_buffers_until_attached() {
        let queue = DeliveryQueue::new();
        queue.send("a");
        queue.send("b");
        assert_eq!(queue.pending(), 2);

        let recorder = Recorder::default();
        assert_eq!(queue.attach(recorder.clone()), 2);

        assert_eq!(recorder.seen(), vec!["a", "b"]);
        assert_eq!(queue.pending(), 0);
        assert!(queue.is_attached());
    }

    #[test]
    fn test_order_preserved_across_attach() {
        let queue = DeliveryQueue::new();
        queue.send("1");
        queue.send("2");

        let recorder = Recorder::default();
        queue.attach(recorder.clone());
        queue.send("3");

        assert!(queue.detach());
        queue.send("4");
        queue.send("5");
        assert_eq!(recorder.seen(), vec!["1", "2", "3"]);

        queue.attach(recorder.clone());
        queue.send("6");
        assert_eq!(recorder.seen(), vec!["1", "2", "3", "4", "5", "6"]);
    }

    #[test]
    fn test_detach_without_listener() {
        let queue: DeliveryQueue<&'static str> = DeliveryQueue::new();
        assert!(!queue.detach());
        assert!(!queue.is_attached());
    }

    #[test]
    fn test_refused_flush_keeps_remaining_messages() {
        let queue = DeliveryQueue::new();
        queue.send("a");
        queue.send("b");
        queue.send("c");

        let seen = Recorder::default();
        let flushed = queue.attach(Flaky {
            accept: 1,
            seen: seen.clone(),
        });
        assert_eq!(flushed, 1);
        assert!(!queue.is_attached());
        assert_eq!(queue.pending(), 2);

        let recorder = Recorder::default();
        queue.attach(recorder.clone());
        assert_eq!(seen.seen(), vec!["a"]);
        assert_eq!(recorder.seen(), vec!["b", "c"]);
    }

    #[test]
    fn test_refused_send_rebuffers() {
        let queue = DeliveryQueue::new();
        queue.attach(Flaky {
            accept: 0,
            seen: Recorder::default(),
        });
        queue.send("lost?");
        assert!(!queue.is_attached());

        let recorder = Recorder::default();
        queue.attach(recorder.clone());
        assert_eq!(recorder.seen(), vec!["lost?"]);
    }

    #[tokio::test]
    async fn test_channel_listener() {
        let queue = DeliveryQueue::new();
        queue.send("early");

        let (tx, mut rx) = mpsc::unbounded_channel();
        queue.attach(tx);
        queue.send("late");

        assert_eq!(rx.recv().await, Some("early"));
        assert_eq!(rx.recv().await, Some("late"));

        drop(rx);
        queue.send("after drop");
        assert!(!queue.is_attached());
        assert_eq!(queue.pending(), 1);
    }
}
