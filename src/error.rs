
use std::{fmt, io, net};

/// Address manager error.
#[derive(Debug)]
pub enum Error {
	/// A "host:port" literal could not be parsed.
	MalformedLiteral(String),
	/// The address is not usable on the public network.
	NotRoutable(net::IpAddr),
	/// A hostname resolved to no addresses at all.
	NoAddresses(String),
	/// An I/O error.
	Io(io::Error),
	/// Failed to encode the peers file.
	Serialize(serde_json::Error),
}

impl From<io::Error> for Error {
	fn from(e: io::Error) -> Error {
		Error::Io(e)
	}
}

impl From<serde_json::Error> for Error {
	fn from(e: serde_json::Error) -> Error {
		Error::Serialize(e)
	}
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match *self {
			Error::MalformedLiteral(ref s) => write!(f, "malformed address literal: {:?}", s),
			Error::NotRoutable(ref ip) => write!(f, "address {} is not routable", ip),
			Error::NoAddresses(ref host) => write!(f, "no addresses found for host {}", host),
			Error::Io(ref e) => write!(f, "I/O error: {}", e),
			Error::Serialize(ref e) => write!(f, "error encoding peers file: {}", e),
		}
	}
}
impl std::error::Error for Error {}
