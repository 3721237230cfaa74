use std::fmt;

/// Reference to a line held in the store. `length` counts the trailing marker byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LineRecord {
    pub start: u32,
    pub length: u32,
}

impl LineRecord {
    /// First address past the line.
    pub fn end(&self) -> u32 {
        self.start + self.length
    }
}

impl fmt::Display for LineRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CursorError {
    #[error("store full: {length} bytes requested at {position}, capacity {capacity}")]
    Full { position: u32, length: u32, capacity: u32 },
    #[error("store cursor corrupted: expected {expected}, reservation starts at {found}")]
    Corrupted { expected: u32, found: u32 },
}

/// Space handed out by [StoreCursor::reserve]. Dropping it without a commit gives the space back.
#[derive(Debug, PartialEq, Eq)]
#[must_use]
pub struct Reservation {
    start: u32,
    length: u32,
    epoch: u32,
}

impl Reservation {
    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn length(&self) -> u32 {
        self.length
    }
}

/// Next free address of the store. It only moves forward, except on [StoreCursor::reset_epoch].
#[derive(Debug)]
pub struct StoreCursor {
    position: u32,
    capacity: u32,
    epoch: u32,
}

impl StoreCursor {
    pub fn new(capacity: u32) -> Self {
        Self {
            position: 0,
            capacity,
            epoch: 0,
        }
    }

    pub fn position(&self) -> u32 {
        self.position
    }

    pub fn epoch(&self) -> u32 {
        self.epoch
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn remaining(&self) -> u32 {
        self.capacity - self.position
    }

    pub fn reserve(&self, length: u32) -> Result<Reservation, CursorError> {
        if length > self.remaining() {
            return Err(CursorError::Full {
                position: self.position,
                length,
                capacity: self.capacity,
            });
        }
        Ok(Reservation {
            start: self.position,
            length,
            epoch: self.epoch,
        })
    }

    /// Advances past a reserved line once it is safely stored.
    ///
    /// # Errors
    ///
    /// - `CursorError::Corrupted`: the reservation no longer starts at the cursor, because the
    ///   cursor moved or the epoch changed since it was taken. The cursor is left untouched.
    pub fn commit(&mut self, reservation: Reservation) -> Result<LineRecord, CursorError> {
        if reservation.start != self.position || reservation.epoch != self.epoch {
            return Err(CursorError::Corrupted {
                expected: self.position,
                found: reservation.start,
            });
        }
        self.position += reservation.length;
        Ok(LineRecord {
            start: reservation.start,
            length: reservation.length,
        })
    }

    /// Starts addressing the store from 0 again, e.g. after the device was erased.
    pub fn reset_epoch(&mut self) {
        self.position = 0;
        self.epoch = self.epoch.wrapping_add(1);
    }
}
