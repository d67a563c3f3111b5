//! Per-address connection history and the quality scoring derived from it.

use std::time::{Duration, SystemTime};

use crate::netaddr::NetAddress;
use crate::time::TimeExt;

/// Penalize addresses attempted this recently in selection.
const RECENT_ATTEMPT_BACKOFF: Duration = Duration::from_secs(10 * 60);

/// Addresses attempted within this window are never considered bad.
const ATTEMPT_GRACE: Duration = Duration::from_secs(60);

/// Timestamps further than this in the future mark an address bad.
const FUTURE_DRIFT: Duration = Duration::from_secs(10 * 60);

/// Attempts without a single success before an address is bad.
const MAX_RETRIES: u32 = 3;

/// Failures without a recent success before an address is bad.
const MAX_FAILURES: u32 = 10;

/// How recent a success must be to count against [MAX_FAILURES].
const SUCCESS_HORIZON: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// A known network address together with the connection history used to
/// judge how viable the address is.
///
/// The address manager owns exactly one instance per unique address key.
#[derive(Debug, Clone)]
pub struct KnownAddress {
	pub(crate) na: NetAddress,
	pub(crate) src: NetAddress,
	pub(crate) attempts: u32,
	pub(crate) last_attempt: Option<SystemTime>,
	pub(crate) last_success: Option<SystemTime>,
	/// Number of new buckets referencing this address.
	pub(crate) ref_count: u32,
	pub(crate) tried: bool,
}

impl KnownAddress {
	pub(crate) fn new(na: NetAddress, src: NetAddress) -> KnownAddress {
		KnownAddress {
			na: na,
			src: src,
			attempts: 0,
			last_attempt: None,
			last_success: None,
			ref_count: 0,
			tried: false,
		}
	}

	/// The network address this entry tracks.
	pub fn net_address(&self) -> &NetAddress {
		&self.na
	}

	/// The address of the peer we first heard this address from.
	pub fn source(&self) -> &NetAddress {
		&self.src
	}

	/// Number of connection attempts since the last success.
	pub fn attempts(&self) -> u32 {
		self.attempts
	}

	/// The last time a connection to this address was attempted.
	pub fn last_attempt(&self) -> Option<SystemTime> {
		self.last_attempt
	}

	/// The last time a connection to this address succeeded.
	pub fn last_success(&self) -> Option<SystemTime> {
		self.last_success
	}

	/// Whether this address lives in the tried table.
	pub fn is_tried(&self) -> bool {
		self.tried
	}

	/// The selection weight of this address.
	///
	/// Depends on how recently the address was seen, how recently it was
	/// attempted and how often attempts at it have failed.
	pub(crate) fn chance(&self, now: SystemTime) -> f64 {
		let mut c = 1.0;

		// Very recent attempts are less likely to be retried.
		if let Some(last) = self.last_attempt {
			if now.saturating_duration_since(last) < RECENT_ATTEMPT_BACKOFF {
				c *= 0.01;
			}
		}

		// Failed attempts deprioritize.
		c /= 1.5f64.powi(self.attempts.min(32) as i32);

		// Prefer addresses seen more recently.
		let age_days =
			now.saturating_duration_since(self.na.timestamp).as_secs_f64() / 86_400.0;
		c / (1.0 + age_days)
	}

	/// Whether this address is assumed worthless: a timestamp from the
	/// future or older than `max_age`, repeated failures without a single
	/// success, or many failures without a recent one. Addresses attempted
	/// in the last minute get a grace period.
	pub(crate) fn is_bad(&self, now: SystemTime, max_age: Duration) -> bool {
		if let Some(last) = self.last_attempt {
			if now.saturating_duration_since(last) < ATTEMPT_GRACE {
				return false;
			}
		}

		// From the future?
		if self.na.timestamp.saturating_duration_since(now) > FUTURE_DRIFT {
			return true;
		}

		// Not seen in too long?
		if now.saturating_duration_since(self.na.timestamp) > max_age {
			return true;
		}

		// Tried a few times and never succeeded?
		if self.last_success.is_none() && self.attempts >= MAX_RETRIES {
			return true;
		}

		// Keeps failing without a recent success?
		if self.attempts >= MAX_FAILURES {
			match self.last_success {
				None => return true,
				Some(s) => {
					if now.saturating_duration_since(s) > SUCCESS_HORIZON {
						return true;
					}
				}
			}
		}

		false
	}

	/// The score used to pick an eviction victim from a full bucket.
	/// Bad addresses sort below everything else.
	pub(crate) fn eviction_score(&self, now: SystemTime, max_age: Duration) -> f64 {
		if self.is_bad(now, max_age) {
			0.0
		} else {
			self.chance(now)
		}
	}

	/// Whether this address, as a tried slot incumbent, wins a contest
	/// against a newly promoted address.
	pub(crate) fn defends_slot(&self, now: SystemTime, window: Duration) -> bool {
		match self.last_success {
			Some(s) => now.saturating_duration_since(s) < window,
			None => false,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::netaddr::ServiceFlags;

	const MONTH: Duration = Duration::from_secs(30 * 24 * 60 * 60);

	fn known(ip: &str) -> KnownAddress {
		let na = NetAddress::new(ip.parse().unwrap(), 8333, ServiceFlags::NONE);
		let src =
			NetAddress::new("173.144.173.111".parse().unwrap(), 8333, ServiceFlags::NONE);
		KnownAddress::new(na, src)
	}

	#[test]
	fn chance_ordering() {
		let now = SystemTime::now();
		let fresh = known("204.124.8.1");

		let mut attempted = known("204.124.8.2");
		attempted.attempts = 2;

		let mut recent = known("204.124.8.3");
		recent.last_attempt = Some(now - Duration::from_secs(60));

		let mut stale = known("204.124.8.4");
		stale.na.timestamp = now - Duration::from_secs(10 * 24 * 60 * 60);

		assert!(fresh.chance(now) > attempted.chance(now));
		assert!(fresh.chance(now) > recent.chance(now));
		assert!(fresh.chance(now) > stale.chance(now));
		// The recent-attempt penalty outweighs a couple of failures.
		assert!(attempted.chance(now) > recent.chance(now));
	}

	#[test]
	fn bad_addresses() {
		let now = SystemTime::now();

		let good = known("204.124.8.1");
		assert!(!good.is_bad(now, MONTH));
		assert!(good.eviction_score(now, MONTH) > 0.0);

		// From the future.
		let mut future = known("204.124.8.2");
		future.na.timestamp = now + Duration::from_secs(11 * 60);
		assert!(future.is_bad(now, MONTH));
		assert_eq!(future.eviction_score(now, MONTH), 0.0);

		// Not seen in over a month.
		let mut old = known("204.124.8.3");
		old.na.timestamp = now - (MONTH + Duration::from_secs(1));
		assert!(old.is_bad(now, MONTH));

		// Three failures, never a success.
		let mut failed = known("204.124.8.4");
		failed.attempts = 3;
		assert!(failed.is_bad(now, MONTH));
		failed.attempts = 2;
		assert!(!failed.is_bad(now, MONTH));

		// Many failures with only a stale success.
		let mut stale = known("204.124.8.5");
		stale.attempts = 10;
		stale.last_success = Some(now - Duration::from_secs(8 * 24 * 60 * 60));
		assert!(stale.is_bad(now, MONTH));
		stale.last_success = Some(now - Duration::from_secs(24 * 60 * 60));
		assert!(!stale.is_bad(now, MONTH));

		// A very recent attempt shields the entry.
		let mut shielded = known("204.124.8.6");
		shielded.attempts = 5;
		shielded.last_attempt = Some(now - Duration::from_secs(10));
		assert!(!shielded.is_bad(now, MONTH));
	}

	#[test]
	fn slot_defense() {
		let now = SystemTime::now();
		let window = Duration::from_secs(4 * 60 * 60);

		let mut ka = known("204.124.8.1");
		assert!(!ka.defends_slot(now, window));
		ka.last_success = Some(now - Duration::from_secs(60 * 60));
		assert!(ka.defends_slot(now, window));
		ka.last_success = Some(now - Duration::from_secs(5 * 60 * 60));
		assert!(!ka.defends_slot(now, window));
	}
}
