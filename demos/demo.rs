#[macro_use]
extern crate log;

use std::io;
use std::net;
use std::sync::Arc;
use std::time::Duration;

use p2p_addrmgr::*;

fn setup_logger() {
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
		.level(log::LevelFilter::Trace)
		.chain(std::io::stdout())
		.apply()
		.expect("logger");
}

/// A [NetAdapter] on top of plain std networking: blocking dials and the
/// system resolver.
struct SystemNet;

impl NetAdapter for SystemNet {
	fn dial(&self, addr: net::SocketAddr, timeout: Duration) -> Result<net::TcpStream, io::Error> {
		net::TcpStream::connect_timeout(&addr, timeout)
	}

	fn lookup(&self, host: &str) -> Result<Vec<net::IpAddr>, io::Error> {
		use std::net::ToSocketAddrs;
		// The port plays no role in resolution.
		Ok((host, 0u16).to_socket_addrs()?.map(|sa| sa.ip()).collect())
	}

	fn supports_onion(&self) -> bool {
		false
	}
}

fn main() {
	setup_logger();

	info!("Instantiating...");
	let adapter = Arc::new(SystemNet);
	let mgr = AddressManager::with_config(
		"demo",
		adapter.clone(),
		Config {
			data_dir: std::env::temp_dir(),
			..Default::default()
		},
	);
	mgr.start();
	info!("Loaded {} addresses from the last run", mgr.num_addresses());

	info!("Feeding some known nodes...");
	let literals = [
		"34.105.33.75:8333",
		"162.120.69.182:8333",
		"[2001:470:88ff:2e::1]:8333",
	];
	for addr in literals.iter() {
		if let Err(e) = mgr.add_address_by_literal(addr) {
			warn!("Rejected {}: {}", addr, e);
		}
	}

	info!("Resolving a seed...");
	match mgr.host_to_net_address("seed.bitcoin.sipa.be", 8333, ServiceFlags::NETWORK) {
		Ok(na) => {
			info!("Seed resolved to {}", na);
			mgr.add_address(&na, &na);
		}
		Err(e) => warn!("Seed resolution failed: {}", e),
	}
	info!("Tracking {} addresses now", mgr.num_addresses());

	info!("Dialing a few candidates...");
	for _ in 0..3 {
		let ka = match mgr.get_address() {
			Some(ka) => ka,
			None => break,
		};
		let addr = ka.net_address().socket_addr();
		mgr.attempt(ka.net_address());
		match adapter.dial(addr, Duration::from_secs(5)) {
			Ok(_stream) => {
				info!("Connected to {}", addr);
				// A real caller would only do this after the protocol
				// handshake went through.
				mgr.connected(ka.net_address());
				mgr.mark_good(ka.net_address());
			}
			Err(e) => debug!("Failed to connect to {}: {}", addr, e),
		}
	}

	info!(
		"Done; {} addresses known, {} of them tried",
		mgr.num_addresses(),
		mgr.num_tried(),
	);
	mgr.stop().expect("stopping the address manager");
}
