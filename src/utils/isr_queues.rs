use std::{cell::RefCell, collections::VecDeque, sync::Arc};

use critical_section::Mutex;

/// A bounded FIFO queue that can be shared between an interrupt handler and a task. Every
/// operation runs inside a critical section and never blocks, so both ends may be used from
/// interrupt context.
pub struct ISRQueue<T> {
    q: Arc<Mutex<RefCell<VecDeque<T>>>>,
    capacity: usize,
}

/// Error types related to ISR queue operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ISRQueueError {
    #[error("queue is full")]
    Full,
    #[error("queue is empty")]
    Empty,
}

impl<T> ISRQueue<T> {
    /// Creates a new empty `ISRQueue` able to hold `capacity` items.
    ///
    /// # Arguments
    ///
    /// * `capacity` - The maximum amount of items the queue holds at once.
    ///
    /// # Returns
    ///
    /// A new `ISRQueue<T>` instance.
    pub fn new(capacity: usize) -> Self {
        Self {
            q: Arc::new(Mutex::new(RefCell::new(VecDeque::with_capacity(capacity)))),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        critical_section::with(|cs| self.q.borrow_ref(cs).len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Attempts to push an item at the back of the queue without blocking.
    ///
    /// # Arguments
    ///
    /// * `item` - The item to attempt sending to the queue.
    ///
    /// # Returns
    ///
    /// A `Result` with Ok if the item was queued, or an `ISRQueueError` if it fails.
    ///
    /// # Errors
    ///
    /// - `ISRQueueError::Full`: If the queue already holds `capacity` items. The item is dropped.
    pub fn try_send(&self, item: T) -> Result<(), ISRQueueError> {
        critical_section::with(|cs| {
            let mut q = self.q.borrow_ref_mut(cs);
            if q.len() >= self.capacity {
                return Err(ISRQueueError::Full);
            }
            q.push_back(item);
            Ok(())
        })
    }

    /// Attempts to take the item at the front of the queue without blocking.
    ///
    /// # Returns
    ///
    /// The item if one was available or an `ISRQueueError` if it fails.
    ///
    /// # Errors
    ///
    /// - `ISRQueueError::Empty`: if there were no items available in the queue.
    pub fn try_recv(&self) -> Result<T, ISRQueueError> {
        critical_section::with(|cs| self.q.borrow_ref_mut(cs).pop_front())
            .ok_or(ISRQueueError::Empty)
    }
}

impl<T> Clone for ISRQueue<T> {
    fn clone(&self) -> Self {
        Self {
            q: self.q.clone(),
            capacity: self.capacity,
        }
    }
}
