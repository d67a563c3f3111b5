//! Priority-ranked local addresses used for self-advertisement.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::netaddr::NetAddress;
use crate::network::{reachability, Reach};

/// How a local address was discovered, ranked from least to most trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AddressPriority {
	/// Learned from a network interface scan.
	Interface,
	/// An address the node explicitly binds to.
	Bound,
	/// Discovered through UPnP.
	Upnp,
	/// Manually configured, overriding routability checks.
	Manual,
}

/// A local address record: the address, how it was discovered and when it
/// was inserted relative to its siblings.
#[derive(Debug, Clone)]
pub(crate) struct LocalAddress {
	pub(crate) na: NetAddress,
	pub(crate) priority: AddressPriority,
	/// Insertion sequence, breaking ties in favor of newer records.
	pub(crate) seq: u64,
}

/// Pick the local address best suited for advertisement to the given
/// remote: highest reachability rank, then highest priority, then the
/// most recently inserted record.
pub(crate) fn best_for<'a>(
	locals: impl Iterator<Item = &'a LocalAddress>,
	remote: IpAddr,
) -> Option<&'a LocalAddress> {
	let mut best: Option<(Reach, &LocalAddress)> = None;
	for la in locals {
		let reach = reachability(la.na.ip, remote);
		if reach == Reach::Unreachable {
			continue;
		}
		let better = match best {
			None => true,
			Some((r, b)) => (reach, la.priority, la.seq) > (r, b.priority, b.seq),
		};
		if better {
			best = Some((reach, la));
		}
	}
	best.map(|(_, la)| la)
}
