mod capture;
mod playback;
mod status;

use std::sync::mpsc::{sync_channel, Receiver, SyncSender};

use crate::storage::LineRecord;

pub use {capture::*, playback::*, status::*};

pub type RecordSender = SyncSender<LineRecord>;
pub type RecordReceiver = Receiver<LineRecord>;

/// Bounded mailbox from the capture worker to the playback worker.
pub fn record_channel(capacity: usize) -> (RecordSender, RecordReceiver) {
    sync_channel(capacity)
}
