//! This module exports a single interface for mpsc channels for
//! crossbeam- and std-based ones.

#[cfg(feature = "crossbeam-channel")]
pub use self::crossbeam_mpsc::{bounded, Receiver, RecvTimeoutError, SendError, Sender, SyncSender};
#[cfg(not(feature = "crossbeam-channel"))]
pub use self::std_mpsc::{bounded, Receiver, RecvTimeoutError, SendError, Sender, SyncSender};

#[cfg(not(feature = "crossbeam-channel"))]
mod std_mpsc {
	pub use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SendError, Sender, SyncSender};

	pub fn bounded<T>(size: usize) -> (SyncSender<T>, Receiver<T>) {
		mpsc::sync_channel(size)
	}
}

#[cfg(feature = "crossbeam-channel")]
mod crossbeam_mpsc {
	pub use crossbeam_channel::{self, Receiver, RecvTimeoutError, SendError, Sender};

	/// A sender for a bounded channel, mirroring [std::sync::mpsc::SyncSender].
	pub struct SyncSender<T>(Sender<T>);

	impl<T> SyncSender<T> {
		pub fn send(&self, t: T) -> Result<(), SendError<T>> {
			self.0.send(t)
		}
	}

	pub fn bounded<T>(size: usize) -> (SyncSender<T>, Receiver<T>) {
		let (tx, rx) = crossbeam_channel::bounded(size);
		(SyncSender(tx), rx)
	}
}
