//! Peer address manager for p2p nodes.

#[macro_use]
extern crate log;

pub mod addrmgr;
pub use addrmgr::{AddressManager, AddressPriority, Config, KnownAddress};

mod error;
pub use error::Error;

mod netaddr;
pub use netaddr::{AddressKey, NetAddress, ServiceFlags};

mod channel;
mod network;
mod time;

use std::time::Duration;
use std::{io, net};

/// Hooks the address manager into the host's networking facilities.
///
/// The manager itself never opens connections or resolves names. The node
/// embedding it does, through whatever stack it is built on (including
/// proxied or Tor-only setups), and lends the manager these entry points.
pub trait NetAdapter: Send + Sync {
	/// Establish an outgoing connection.
	fn dial(&self, addr: net::SocketAddr, timeout: Duration)
		-> Result<net::TcpStream, io::Error>;

	/// Resolve a hostname into IP addresses.
	fn lookup(&self, host: &str) -> Result<Vec<net::IpAddr>, io::Error>;

	/// Whether onion addresses can be dialed.
	fn supports_onion(&self) -> bool;
}
