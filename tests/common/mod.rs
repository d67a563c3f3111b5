
pub mod prelude;
use prelude::*;

use std::collections::HashMap;
use std::io;
use std::sync::Once;

/// A [NetAdapter] for tests: it never dials, only resolves hostnames a
/// test registered up front, and refuses onion pseudo-hostnames the way a
/// Tor-less resolver would.
#[derive(Default)]
pub struct MockAdapter {
	pub onion: bool,
	pub hosts: HashMap<String, Vec<net::IpAddr>>,
}

impl NetAdapter for MockAdapter {
	fn dial(&self, addr: net::SocketAddr, _timeout: Duration) -> Result<net::TcpStream, io::Error> {
		Err(io::Error::new(io::ErrorKind::Other, format!("refusing to dial {} in a test", addr)))
	}

	fn lookup(&self, host: &str) -> Result<Vec<net::IpAddr>, io::Error> {
		if host.ends_with(".onion") {
			return Err(io::Error::new(io::ErrorKind::Other, "attempt to resolve a tor address"));
		}
		match self.hosts.get(host) {
			Some(ips) => Ok(ips.clone()),
			None => Err(io::Error::new(io::ErrorKind::Other, format!("unknown host {}", host))),
		}
	}

	fn supports_onion(&self) -> bool {
		self.onion
	}
}

/// Route log output of all tests through stdout.
pub fn setup_logger() {
	static INIT: Once = Once::new();
	INIT.call_once(|| {
		fern::Dispatch::new()
			.format(|out, message, record| {
				out.finish(format_args!(
					"{}[{}][{}] {}",
					chrono::Local::now().format("[%Y-%m-%d][%H:%M:%S]"),
					record.target(),
					record.level(),
					message
				))
			})
			.level(log::LevelFilter::Debug)
			.chain(std::io::stdout())
			.apply()
			.expect("applying logger config");
	});
}

pub fn test_config(dir: &Path) -> Config {
	Config {
		data_dir: dir.to_path_buf(),
		..Default::default()
	}
}

/// Set up an [AddressManager] that keeps its peers file in a fresh
/// temporary directory. The directory is removed when the returned
/// handle is dropped, so tests have to keep it around.
pub fn test_manager(id: &str) -> (AddressManager, tempfile::TempDir) {
	test_manager_with(id, MockAdapter::default())
}

pub fn test_manager_with(id: &str, adapter: MockAdapter) -> (AddressManager, tempfile::TempDir) {
	setup_logger();
	let dir = tempfile::tempdir().expect("creating tempdir");
	let mgr = AddressManager::with_config(id, Arc::new(adapter), test_config(dir.path()));
	(mgr, dir)
}
