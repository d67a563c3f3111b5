
use std::time::{UNIX_EPOCH, Duration, SystemTime};

/// Extension trait for time types.
pub(crate) trait TimeExt {
	/// Create a time from unix seconds.
	fn from_unix_secs(secs: u64) -> Self;

	/// Return the unix seconds for this time, zero for anything
	/// before the epoch.
	fn unix_secs(&self) -> u64;

	/// Returns the duration since the other time, returning the zero duration
	/// if the other time is in the future.
	fn saturating_duration_since(&self, other: SystemTime) -> Duration;
}

impl TimeExt for SystemTime {
	fn from_unix_secs(secs: u64) -> Self {
		UNIX_EPOCH + Duration::from_secs(secs)
	}

	fn unix_secs(&self) -> u64 {
		self.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
	}

	fn saturating_duration_since(&self, other: SystemTime) -> Duration {
		self.duration_since(other).unwrap_or_default()
	}
}
