//! On-disk snapshots of the address tables.

use std::fs;
use std::io;
use std::path::Path;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::addrmgr::knownaddr::KnownAddress;
use crate::addrmgr::localaddr::AddressPriority;
use crate::error::Error;
use crate::netaddr::{parse_literal, NetAddress, ServiceFlags};
use crate::time::TimeExt;

/// Version of the snapshot schema we write.
pub(crate) const SNAPSHOT_VERSION: u32 = 2;

/// The persisted form of the address manager state.
///
/// Bucket contents are not part of the snapshot, but the hash key
/// steering placement is. Reloading re-buckets every record under the
/// saved key, which puts each one right back where it was, so the
/// tried table comes out of a reload exactly as it went in.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Snapshot {
	pub version: u32,
	pub key: u64,
	pub addresses: Vec<SnapshotAddress>,
	pub local_addresses: Vec<SnapshotLocalAddress>,
}

/// One known address record. Times are unix seconds, zero meaning never.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct SnapshotAddress {
	pub addr: String,
	pub src: String,
	pub services: u64,
	pub timestamp: u64,
	pub attempts: u32,
	pub last_attempt: u64,
	pub last_success: u64,
	pub tried: bool,
}

/// One local address record.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct SnapshotLocalAddress {
	pub addr: String,
	pub priority: AddressPriority,
}

impl SnapshotAddress {
	pub(crate) fn from_known(ka: &KnownAddress) -> SnapshotAddress {
		SnapshotAddress {
			addr: ka.na.key(),
			src: ka.src.key(),
			services: ka.na.services.as_u64(),
			timestamp: ka.na.timestamp.unix_secs(),
			attempts: ka.attempts,
			last_attempt: ka.last_attempt.map(|t| t.unix_secs()).unwrap_or(0),
			last_success: ka.last_success.map(|t| t.unix_secs()).unwrap_or(0),
			tried: ka.tried,
		}
	}

	/// Rebuild the in-memory record, or [None] when the stored address
	/// keys don't parse.
	pub(crate) fn into_known(self) -> Option<KnownAddress> {
		let (ip, port) = parse_literal(&self.addr).ok()?;
		let (src_ip, src_port) = parse_literal(&self.src).ok()?;

		let mut na = NetAddress::new(ip, port, ServiceFlags::from(self.services));
		na.timestamp = SystemTime::from_unix_secs(self.timestamp);

		Some(KnownAddress {
			na: na,
			src: NetAddress::new(src_ip, src_port, ServiceFlags::NONE),
			attempts: self.attempts,
			last_attempt: time_or_never(self.last_attempt),
			last_success: time_or_never(self.last_success),
			ref_count: 0,
			tried: self.tried,
		})
	}
}

fn time_or_never(secs: u64) -> Option<SystemTime> {
	if secs == 0 {
		None
	} else {
		Some(SystemTime::from_unix_secs(secs))
	}
}

/// Write the snapshot to the given path.
pub(crate) fn save(path: &Path, snapshot: &Snapshot) -> Result<(), Error> {
	let json = serde_json::to_string(snapshot)?;
	fs::write(path, json)?;
	Ok(())
}

/// Read a snapshot back from disk.
///
/// A missing, unreadable, corrupt or unknown-version file yields [None]:
/// the manager then simply starts empty.
pub(crate) fn load(path: &Path) -> Option<Snapshot> {
	let bytes = match fs::read(path) {
		Ok(b) => b,
		Err(ref e) if e.kind() == io::ErrorKind::NotFound => {
			debug!("No address snapshot at {}", path.display());
			return None;
		}
		Err(e) => {
			warn!("Failed to read address snapshot {}: {}", path.display(), e);
			return None;
		}
	};
	let snapshot: Snapshot = match serde_json::from_slice(&bytes) {
		Ok(s) => s,
		Err(e) => {
			warn!("Ignoring corrupt address snapshot {}: {}", path.display(), e);
			return None;
		}
	};
	if snapshot.version != SNAPSHOT_VERSION {
		warn!(
			"Ignoring address snapshot {} with unknown version {}",
			path.display(),
			snapshot.version
		);
		return None;
	}
	Some(snapshot)
}
