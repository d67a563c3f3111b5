//! Network address values shared across the crate.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::SystemTime;
use std::{fmt, ops};

use crate::error::Error;

/// Canonical textual key of an address: "a.b.c.d:port" for IPv4,
/// "[compressed-form]:port" for IPv6.
pub type AddressKey = String;

/// Bitmask of the services a peer advertises.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ServiceFlags(u64);

impl ServiceFlags {
	/// No services.
	pub const NONE: ServiceFlags = ServiceFlags(0);
	/// Can serve the full chain.
	pub const NETWORK: ServiceFlags = ServiceFlags(1 << 0);
	/// Supports bloom-filtered connections.
	pub const BLOOM: ServiceFlags = ServiceFlags(1 << 2);
	/// Can serve witness data.
	pub const WITNESS: ServiceFlags = ServiceFlags(1 << 3);
	/// Supports compact filter queries.
	pub const COMPACT_FILTERS: ServiceFlags = ServiceFlags(1 << 6);
	/// Serves only the last couple of days of blocks.
	pub const NETWORK_LIMITED: ServiceFlags = ServiceFlags(1 << 10);

	/// Check whether all of the given flags are set.
	pub fn has(self, flags: ServiceFlags) -> bool {
		self.0 & flags.0 == flags.0
	}

	/// The raw bitmask.
	pub fn as_u64(self) -> u64 {
		self.0
	}
}

impl From<u64> for ServiceFlags {
	fn from(n: u64) -> ServiceFlags {
		ServiceFlags(n)
	}
}

impl ops::BitOr for ServiceFlags {
	type Output = ServiceFlags;
	fn bitor(self, rhs: ServiceFlags) -> ServiceFlags {
		ServiceFlags(self.0 | rhs.0)
	}
}

impl ops::BitOrAssign for ServiceFlags {
	fn bitor_assign(&mut self, rhs: ServiceFlags) {
		self.0 |= rhs.0;
	}
}

impl fmt::Display for ServiceFlags {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		if self.0 == 0 {
			return write!(f, "NONE");
		}
		let names = [
			(ServiceFlags::NETWORK, "NETWORK"),
			(ServiceFlags::BLOOM, "BLOOM"),
			(ServiceFlags::WITNESS, "WITNESS"),
			(ServiceFlags::COMPACT_FILTERS, "COMPACT_FILTERS"),
			(ServiceFlags::NETWORK_LIMITED, "NETWORK_LIMITED"),
		];
		let mut rest = self.0;
		let mut first = true;
		for (flag, name) in names.iter() {
			if self.has(*flag) {
				if !first {
					write!(f, "|")?;
				}
				write!(f, "{}", name)?;
				rest &= !flag.0;
				first = false;
			}
		}
		if rest != 0 {
			if !first {
				write!(f, "|")?;
			}
			write!(f, "0x{:x}", rest)?;
		}
		Ok(())
	}
}

impl fmt::Debug for ServiceFlags {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "ServiceFlags({})", self)
	}
}

/// A peer network address along with the services it is known to offer
/// and the last time we heard of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetAddress {
	/// The IP address.
	pub ip: IpAddr,
	/// The TCP port.
	pub port: u16,
	/// Services advertised for this address.
	pub services: ServiceFlags,
	/// Last time this address was known to be alive.
	pub timestamp: SystemTime,
}

impl NetAddress {
	/// Create a new address stamped with the current time.
	pub fn new(ip: IpAddr, port: u16, services: ServiceFlags) -> NetAddress {
		NetAddress {
			ip: canonical_ip(ip),
			port: port,
			services: services,
			timestamp: SystemTime::now(),
		}
	}

	/// Create a new address from a socket address, stamped with the
	/// current time.
	pub fn from_socket_addr(addr: SocketAddr, services: ServiceFlags) -> NetAddress {
		NetAddress::new(addr.ip(), addr.port(), services)
	}

	/// The canonical unique key of this address.
	pub fn key(&self) -> AddressKey {
		self.socket_addr().to_string()
	}

	/// The socket address to dial.
	pub fn socket_addr(&self) -> SocketAddr {
		SocketAddr::new(self.ip, self.port)
	}
}

impl fmt::Display for NetAddress {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{}", self.socket_addr())
	}
}

/// Fold IPv4-mapped IPv6 addresses onto their IPv4 form so that both
/// notations end up under a single canonical key.
pub(crate) fn canonical_ip(ip: IpAddr) -> IpAddr {
	match ip {
		IpAddr::V4(..) => ip,
		IpAddr::V6(v6) => {
			let seg = v6.segments();
			if seg[..5] == [0, 0, 0, 0, 0] && seg[5] == 0xffff {
				let o = v6.octets();
				IpAddr::V4(Ipv4Addr::new(o[12], o[13], o[14], o[15]))
			} else {
				ip
			}
		}
	}
}

/// Parse a "host:port" literal into its IP and port.
///
/// The host must be an IP literal and IPv6 literals must be bracketed,
/// so valid inputs read exactly like canonical keys.
pub(crate) fn parse_literal(s: &str) -> Result<(IpAddr, u16), Error> {
	match SocketAddr::from_str(s) {
		Ok(sa) => Ok((canonical_ip(sa.ip()), sa.port())),
		Err(..) => Err(Error::MalformedLiteral(s.to_owned())),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn addr(ip: &str, port: u16) -> NetAddress {
		NetAddress::new(ip.parse().unwrap(), port, ServiceFlags::NONE)
	}

	#[test]
	fn canonical_keys() {
		let cases = [
			("127.0.0.1", 8333, "127.0.0.1:8333"),
			("10.44.48.64", 8333, "10.44.48.64:8333"),
			("204.124.1.1", 8333, "204.124.1.1:8333"),
			("::1", 8333, "[::1]:8333"),
			("fe80::1", 8334, "[fe80::1]:8334"),
			("2620:100::1", 8333, "[2620:100::1]:8333"),
			("2001:470:1f10:a1::2", 8333, "[2001:470:1f10:a1::2]:8333"),
			("fec0::1:1:1:1", 8333, "[fec0::1:1:1:1]:8333"),
		];
		for (ip, port, want) in cases.iter() {
			assert_eq!(&addr(ip, *port).key(), want);
		}
	}

	#[test]
	fn mapped_ipv4_is_folded() {
		assert_eq!(addr("::ffff:10.1.2.3", 8333).key(), "10.1.2.3:8333");
		// The translation range (RFC 6145) is not the mapped range.
		assert_eq!(addr("::ffff:0:102:304", 8333).key(), "[::ffff:0:102:304]:8333");
	}

	#[test]
	fn literal_parsing() {
		assert!(parse_literal("173.194.115.66:8333").is_ok());
		assert!(parse_literal("[::1]:8333").is_ok());

		// No port.
		assert!(parse_literal("173.194.115.66").is_err());
		// Truncated IP.
		assert!(parse_literal("173.194.115.:8333").is_err());
		// Non-numeric port.
		assert!(parse_literal("173.194.115.66:abcd").is_err());
		// Unbracketed IPv6.
		assert!(parse_literal("::1:8333").is_err());
		assert!(parse_literal("").is_err());
	}

	#[test]
	fn service_flags() {
		let mut flags = ServiceFlags::NETWORK | ServiceFlags::WITNESS;
		assert!(flags.has(ServiceFlags::NETWORK));
		assert!(!flags.has(ServiceFlags::BLOOM));
		assert!(flags.has(ServiceFlags::NETWORK | ServiceFlags::WITNESS));
		flags |= ServiceFlags::BLOOM;
		assert!(flags.has(ServiceFlags::BLOOM));

		assert_eq!(ServiceFlags::NONE.to_string(), "NONE");
		assert_eq!(flags.to_string(), "NETWORK|BLOOM|WITNESS");
		assert_eq!(ServiceFlags::from(1 << 60).to_string(), "0x1000000000000000");
	}
}
