//! Classification of IP addresses: validity, routability, topology groups
//! and the reachability ranking used for local address selection.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Whether the address is usable at all.
fn is_valid(ip: IpAddr) -> bool {
	match ip {
		IpAddr::V4(v4) => !v4.is_unspecified() && !v4.is_broadcast(),
		IpAddr::V6(v6) => !v6.is_unspecified(),
	}
}

/// Whether the address belongs to the local machine: loopback or the
/// zero network 0.0.0.0/8.
pub(crate) fn is_local(ip: IpAddr) -> bool {
	match ip {
		IpAddr::V4(v4) => v4.is_loopback() || v4.octets()[0] == 0,
		IpAddr::V6(v6) => v6.is_loopback(),
	}
}

/// Whether the address is publicly routable.
///
/// Reserved and special-use ranges are not, with an exception for the
/// OnionCat slice of the unique-local range used to embed onion keys.
pub(crate) fn is_routable(ip: IpAddr) -> bool {
	if !is_valid(ip) || is_local(ip) {
		return false;
	}
	match ip {
		IpAddr::V4(v4) => {
			!v4.is_private()
				&& !v4.is_link_local()
				&& !is_rfc2544(v4)
				&& !is_rfc5737(v4)
				&& !is_rfc6598(v4)
		}
		IpAddr::V6(v6) => {
			!is_rfc4862(v6)
				&& !is_rfc3849(v6)
				&& !is_rfc4843(v6)
				&& !is_site_local(v6)
				&& !(is_rfc4193(v6) && !is_onion_cat(v6))
		}
	}
}

/// Whether the address lies in the OnionCat range mapping onion keys
/// onto IPv6 addresses.
pub(crate) fn is_onion_cat_tor(ip: IpAddr) -> bool {
	match ip {
		IpAddr::V4(..) => false,
		IpAddr::V6(v6) => is_onion_cat(v6),
	}
}

fn is_teredo(ip: IpAddr) -> bool {
	match ip {
		IpAddr::V4(..) => false,
		IpAddr::V6(v6) => is_rfc4380(v6),
	}
}

/// The topology group of an address.
///
/// Bucket placement is keyed by this group so that a single network
/// segment cannot dominate the tables. IPv4 groups at /16, tunneled
/// IPv6 ranges group by the IPv4 address they embed, plain IPv6 groups
/// at /32.
pub(crate) fn group_key(ip: IpAddr) -> String {
	if is_local(ip) {
		return "local".to_owned();
	}
	if !is_routable(ip) {
		return "unroutable".to_owned();
	}
	match ip {
		IpAddr::V4(v4) => ipv4_slash16(v4.octets()),
		IpAddr::V6(v6) => {
			let o = v6.octets();
			if is_rfc6145(v6) || is_rfc6052(v6) {
				// The embedded IPv4 address sits in the last four bytes.
				ipv4_slash16([o[12], o[13], o[14], o[15]])
			} else if is_rfc3964(v6) {
				ipv4_slash16([o[2], o[3], o[4], o[5]])
			} else if is_rfc4380(v6) {
				// Teredo stores the server-perspective IPv4 address
				// XOR 0xff in the last four bytes.
				ipv4_slash16([o[12] ^ 0xff, o[13] ^ 0xff, o[14] ^ 0xff, o[15] ^ 0xff])
			} else if is_onion_cat(v6) {
				// Keyed off the first four bits of the onion key.
				format!("tor:{}", o[6] & 0x0f)
			} else {
				// Hurricane Electric hands out /48s from a single /32,
				// so group their range a nibble deeper.
				let bits = if is_he_net(v6) { 36 } else { 32 };
				ipv6_prefix(v6, bits).to_string()
			}
		}
	}
}

fn ipv4_slash16(o: [u8; 4]) -> String {
	Ipv4Addr::new(o[0], o[1], 0, 0).to_string()
}

fn ipv6_prefix(ip: Ipv6Addr, bits: u32) -> Ipv6Addr {
	Ipv6Addr::from(u128::from(ip) & (u128::MAX << (128 - bits)))
}

/// How well a local address can expect to reach a remote, worst to best.
///
/// [Reach::Private] ranks above everything because it means an onion
/// route between two onion endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Reach {
	Unreachable,
	Default,
	Teredo,
	Ipv6Weak,
	Ipv4,
	Ipv6Strong,
	Private,
}

/// Rank how well the local address can expect to reach the remote one.
pub(crate) fn reachability(local: IpAddr, remote: IpAddr) -> Reach {
	if !is_routable(remote) {
		return Reach::Unreachable;
	}

	if is_onion_cat_tor(remote) {
		return if is_onion_cat_tor(local) {
			Reach::Private
		} else if is_routable(local) && local.is_ipv4() {
			Reach::Ipv4
		} else {
			Reach::Default
		};
	}

	if is_teredo(remote) {
		return if !is_routable(local) {
			Reach::Default
		} else if is_teredo(local) {
			Reach::Teredo
		} else if local.is_ipv4() {
			Reach::Ipv4
		} else {
			Reach::Ipv6Weak
		};
	}

	if remote.is_ipv4() {
		return if is_routable(local) && local.is_ipv4() {
			Reach::Ipv4
		} else {
			Reach::Unreachable
		};
	}

	// Plain IPv6 remote. Only prioritize an IPv6 local when we are not
	// tunneling it over IPv4.
	let tunneled = match local {
		IpAddr::V4(..) => false,
		IpAddr::V6(v6) => {
			is_routable(local)
				&& !is_rfc4380(v6)
				&& (is_rfc3964(v6) || is_rfc6052(v6) || is_rfc6145(v6))
		}
	};
	if !is_routable(local) {
		Reach::Default
	} else if is_teredo(local) {
		Reach::Teredo
	} else if local.is_ipv4() {
		Reach::Ipv4
	} else if tunneled {
		Reach::Ipv6Weak
	} else {
		Reach::Ipv6Strong
	}
}

fn is_rfc2544(ip: Ipv4Addr) -> bool {
	// 198.18.0.0/15: benchmarking.
	let o = ip.octets();
	o[0] == 198 && (o[1] == 18 || o[1] == 19)
}

fn is_rfc5737(ip: Ipv4Addr) -> bool {
	// 192.0.2.0/24, 198.51.100.0/24 and 203.0.113.0/24: documentation.
	let o = ip.octets();
	(o[0] == 192 && o[1] == 0 && o[2] == 2)
		|| (o[0] == 198 && o[1] == 51 && o[2] == 100)
		|| (o[0] == 203 && o[1] == 0 && o[2] == 113)
}

fn is_rfc6598(ip: Ipv4Addr) -> bool {
	// 100.64.0.0/10: carrier-grade NAT.
	let o = ip.octets();
	o[0] == 100 && o[1] >= 64 && o[1] <= 127
}

fn is_rfc3849(ip: Ipv6Addr) -> bool {
	// 2001:db8::/32: documentation.
	let s = ip.segments();
	s[0] == 0x2001 && s[1] == 0x0db8
}

fn is_rfc3964(ip: Ipv6Addr) -> bool {
	// 2002::/16: 6to4 tunnels.
	ip.segments()[0] == 0x2002
}

fn is_rfc4380(ip: Ipv6Addr) -> bool {
	// 2001::/32: Teredo tunnels.
	let s = ip.segments();
	s[0] == 0x2001 && s[1] == 0
}

fn is_rfc4843(ip: Ipv6Addr) -> bool {
	// 2001:10::/28: ORCHID.
	let s = ip.segments();
	s[0] == 0x2001 && (s[1] & 0xfff0) == 0x0010
}

fn is_rfc4862(ip: Ipv6Addr) -> bool {
	// fe80::/64: link-local.
	ip.segments()[..4] == [0xfe80, 0, 0, 0]
}

fn is_rfc4193(ip: Ipv6Addr) -> bool {
	// fc00::/7: unique local.
	(ip.segments()[0] & 0xfe00) == 0xfc00
}

fn is_rfc6052(ip: Ipv6Addr) -> bool {
	// 64:ff9b::/96: IPv4/IPv6 translation.
	ip.segments()[..6] == [0x0064, 0xff9b, 0, 0, 0, 0]
}

fn is_rfc6145(ip: Ipv6Addr) -> bool {
	// ::ffff:0:0:0/96: IPv4-translated addresses.
	let s = ip.segments();
	s[..4] == [0, 0, 0, 0] && s[4] == 0xffff && s[5] == 0
}

fn is_site_local(ip: Ipv6Addr) -> bool {
	// fec0::/10: deprecated site-local.
	(ip.segments()[0] & 0xffc0) == 0xfec0
}

fn is_he_net(ip: Ipv6Addr) -> bool {
	// 2001:470::/32: Hurricane Electric.
	let s = ip.segments();
	s[0] == 0x2001 && s[1] == 0x0470
}

fn is_onion_cat(ip: Ipv6Addr) -> bool {
	// fd87:d87e:eb43::/48: OnionCat.
	ip.segments()[..3] == [0xfd87, 0xd87e, 0xeb43]
}

#[cfg(test)]
mod tests {
	use super::*;

	fn ip(s: &str) -> IpAddr {
		s.parse().unwrap()
	}

	#[test]
	fn routability() {
		let routable = [
			"1.0.0.1",
			"173.194.115.66",
			"204.124.8.100",
			"2620:100::1",
			"2001:470::1",
			"2602:100:abcd::102",
			// Teredo and 6to4 tunnels route over IPv4.
			"2001::aabb:ccdd",
			"2002:cc7c:864::1",
			// OnionCat addresses route through the onion network.
			"fd87:d87e:eb43::100",
		];
		for s in routable.iter() {
			assert!(is_routable(ip(s)), "{} should be routable", s);
		}

		let unroutable = [
			"0.0.0.0",
			"0.1.2.3",
			"127.0.0.1",
			"255.255.255.255",
			"10.0.0.1",
			"172.16.0.254",
			"192.168.0.100",
			"169.254.1.1",
			"198.18.0.1",
			"192.0.2.1",
			"198.51.100.1",
			"203.0.113.1",
			"100.64.0.1",
			"100.127.255.255",
			"::",
			"::1",
			"fe80::1",
			"fe80::1:1",
			"2001:db8::1",
			"2001:10::1",
			"fec0::1:1",
			"fc00::5",
			"fd00::dead",
		];
		for s in unroutable.iter() {
			assert!(!is_routable(ip(s)), "{} should not be routable", s);
		}
	}

	#[test]
	fn group_keys() {
		let cases = [
			("127.0.0.1", "local"),
			("::1", "local"),
			("0.1.2.3", "local"),
			("192.168.1.1", "unroutable"),
			("fe80::1", "unroutable"),
			("173.194.115.66", "173.194.0.0"),
			("60.173.147.60", "60.173.0.0"),
			// Tunneled ranges group by the embedded IPv4 address.
			("2002:cc7c:864::1", "204.124.0.0"),
			("64:ff9b::cc7c:864", "204.124.0.0"),
			("::ffff:0:cc7c:864", "204.124.0.0"),
			("2001::3383:f79b", "204.124.0.0"),
			// OnionCat groups by the top nibble of the onion key.
			("fd87:d87e:eb43:ab12::1", "tor:11"),
			("fd87:d87e:eb43:25::1", "tor:0"),
			// Plain IPv6 at /32, Hurricane Electric at /36.
			("2602:100:abcd::102", "2602:100::"),
			("2001:470:1f10:a1::2", "2001:470:1000::"),
		];
		for (addr, want) in cases.iter() {
			assert_eq!(&group_key(ip(addr)), want, "group of {}", addr);
		}
	}

	#[test]
	fn reachability_ranking() {
		let public4 = ip("204.124.8.1");
		let private4 = ip("172.16.0.254");
		let public6 = ip("2602:100:abcd::102");
		let he6 = ip("2001:470::1");
		let teredo6 = ip("2001::3383:f79b");

		// Unroutable remotes are unreachable from everything.
		assert_eq!(reachability(he6, private4), Reach::Unreachable);
		assert_eq!(reachability(public4, private4), Reach::Unreachable);

		// IPv4 remotes need a routable IPv4 local.
		assert_eq!(reachability(ip("204.124.8.100"), public4), Reach::Ipv4);
		assert_eq!(reachability(ip("192.168.0.100"), public4), Reach::Unreachable);
		assert_eq!(reachability(he6, public4), Reach::Unreachable);

		// IPv6 remotes rank native locals above tunneled ones.
		assert_eq!(reachability(he6, public6), Reach::Ipv6Strong);
		assert_eq!(reachability(ip("::1"), public6), Reach::Default);
		assert_eq!(reachability(ip("fe80::1"), public6), Reach::Default);
		assert_eq!(reachability(ip("204.124.8.100"), public6), Reach::Ipv4);
		assert_eq!(reachability(ip("2002:cc7c:864::1"), public6), Reach::Ipv6Weak);
		assert_eq!(reachability(teredo6, public6), Reach::Teredo);

		// Teredo remotes.
		let teredo_remote = ip("2001::aabb:ccdd");
		assert_eq!(reachability(teredo6, teredo_remote), Reach::Teredo);
		assert_eq!(reachability(ip("204.124.8.100"), teredo_remote), Reach::Ipv4);
		assert_eq!(reachability(he6, teredo_remote), Reach::Ipv6Weak);
		assert_eq!(reachability(ip("::1"), teredo_remote), Reach::Default);

		// Onion remotes prefer onion locals, then routable IPv4.
		let onion = ip("fd87:d87e:eb43::100");
		assert_eq!(reachability(ip("fd87:d87e:eb43:25::1"), onion), Reach::Private);
		assert_eq!(reachability(ip("204.124.8.100"), onion), Reach::Ipv4);
		assert_eq!(reachability(he6, onion), Reach::Default);

		assert!(Reach::Private > Reach::Ipv6Strong);
		assert!(Reach::Ipv6Strong > Reach::Ipv4);
		assert!(Reach::Ipv4 > Reach::Ipv6Weak);
		assert!(Reach::Default > Reach::Unreachable);
	}
}
