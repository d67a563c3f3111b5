//!
//! The peer-to-peer address manager.
//!
//! Keeps a persistent registry of candidate peer addresses, spread over a
//! "new" table for addresses we merely heard about and a "tried" table for
//! addresses we successfully connected to. Both tables are fixed grids of
//! buckets keyed by a topology-derived grouping hash, so no single network
//! segment can crowd out the rest, and a flood of bogus addresses cannot
//! grow memory without bound.
//!

mod knownaddr;
mod localaddr;
mod store;

pub use self::knownaddr::KnownAddress;
pub use self::localaddr::AddressPriority;

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::channel;
use crate::error::Error;
use crate::netaddr::{self, AddressKey, NetAddress, ServiceFlags};
use crate::network;
use crate::time::TimeExt;
use crate::NetAdapter;

use self::localaddr::LocalAddress;
use self::store::{Snapshot, SnapshotAddress, SnapshotLocalAddress, SNAPSHOT_VERSION};

/// Address manager configuration.
#[derive(Clone, Debug)]
pub struct Config {
	/// Directory where the address snapshot is kept, as `<id>.json`.
	///
	/// Default value: the current directory.
	pub data_dir: PathBuf,
	/// Number of new buckets.
	///
	/// Default value: 1024.
	pub new_bucket_count: usize,
	/// Capacity of each new bucket.
	///
	/// Default value: 64.
	pub new_bucket_size: usize,
	/// Number of tried buckets.
	///
	/// Default value: 64.
	pub tried_bucket_count: usize,
	/// Number of slots in each tried bucket.
	///
	/// Default value: 64.
	pub tried_bucket_size: usize,
	/// Maximum number of new buckets referencing a single address.
	///
	/// Default value: 8.
	pub new_buckets_per_address: u32,
	/// Number of new buckets over which addresses from a single source
	/// group are spread.
	///
	/// Default value: 64.
	pub new_buckets_per_source_group: u64,
	/// Number of tried buckets over which a single address group is
	/// spread.
	///
	/// Default value: 8.
	pub tried_buckets_per_group: u64,
	/// Below this many known addresses [AddressManager::need_more_addresses]
	/// reports true.
	///
	/// Default value: 1000.
	pub low_water_mark: usize,
	/// Percentage of the known addresses returned by
	/// [AddressManager::address_cache].
	///
	/// Default value: 23.
	pub cache_percent: usize,
	/// Absolute ceiling on the size of the address cache.
	///
	/// Default value: 2500.
	pub cache_max: usize,
	/// Weight multiplier favoring tried addresses in the address cache.
	///
	/// Default value: 3.0.
	pub tried_cache_weight: f64,
	/// Probability that [AddressManager::get_address] draws from the tried
	/// table when both tables are populated.
	///
	/// Default value: 0.5.
	pub tried_bias: f64,
	/// Do not advance an address timestamp on connect more often than
	/// this.
	///
	/// Default value: 20 minutes.
	pub stale_timestamp_threshold: Duration,
	/// A tried slot incumbent with a success within this window wins the
	/// slot contest against a newly promoted address.
	///
	/// Default value: 4 hours.
	pub tried_replacement_window: Duration,
	/// Addresses not seen for this long are considered bad and are pruned
	/// on reload.
	///
	/// Default value: 30 days.
	pub max_address_age: Duration,
	/// Interval of the background snapshot job.
	///
	/// Default value: 10 minutes.
	pub persist_interval: Duration,
}

impl Default for Config {
	fn default() -> Config {
		Config {
			data_dir: PathBuf::from("."),
			new_bucket_count: 1024,
			new_bucket_size: 64,
			tried_bucket_count: 64,
			tried_bucket_size: 64,
			new_buckets_per_address: 8,
			new_buckets_per_source_group: 64,
			tried_buckets_per_group: 8,
			low_water_mark: 1000,
			cache_percent: 23,
			cache_max: 2500,
			tried_cache_weight: 3.0,
			tried_bias: 0.5,
			stale_timestamp_threshold: Duration::from_secs(20 * 60),
			tried_replacement_window: Duration::from_secs(4 * 60 * 60),
			max_address_age: Duration::from_secs(30 * 24 * 60 * 60),
			persist_interval: Duration::from_secs(10 * 60),
		}
	}
}

/// Internal state guarded by the manager's lock.
///
/// Selection and eviction both read and mutate bucket state, so a single
/// exclusive lock covers the index, both bucket tables, the local address
/// table and the RNG together.
struct State {
	cfg: Config,
	/// Every known address by key. An entry is referenced from new buckets
	/// or occupies a tried slot, never both.
	index: HashMap<AddressKey, KnownAddress>,
	new_buckets: Vec<HashSet<AddressKey>>,
	tried_buckets: Vec<Vec<Option<AddressKey>>>,
	/// Number of occupied tried slots.
	n_tried: usize,
	local: HashMap<AddressKey, LocalAddress>,
	local_seq: u64,
	/// Random key making bucket placement unpredictable. Persisted with
	/// the snapshot and adopted back on restore: placement is a pure
	/// function of this key, so a reload reproduces it slot for slot. A
	/// fresh key is drawn only when there is no snapshot to restore.
	hash_key: u64,
	rng: StdRng,
}

impl State {
	fn new(cfg: Config) -> State {
		let mut rng = StdRng::from_entropy();
		let hash_key: u64 = rng.gen();
		State {
			index: HashMap::new(),
			new_buckets: vec![HashSet::new(); cfg.new_bucket_count],
			tried_buckets: vec![vec![None; cfg.tried_bucket_size]; cfg.tried_bucket_count],
			n_tried: 0,
			local: HashMap::new(),
			local_seq: 0,
			hash_key: hash_key,
			rng: rng,
			cfg: cfg,
		}
	}

	/// Record a sighting of the address. Unknown addresses enter the new
	/// table; known ones get their timestamp advanced forward-only and
	/// their service bits merged, leaving quality history untouched.
	fn update_address(&mut self, na: &NetAddress, src: &NetAddress) {
		if !network::is_routable(na.ip) {
			trace!("Ignoring unroutable address {}", na);
			return;
		}

		let key = na.key();

		// Never track addresses we advertise ourselves.
		if self.local.contains_key(&key) {
			trace!("Ignoring our own address {}", na);
			return;
		}

		if let Some(ka) = self.index.get_mut(&key) {
			if na.timestamp > ka.na.timestamp {
				ka.na.timestamp = na.timestamp;
			}
			ka.na.services |= na.services;

			if ka.tried {
				return;
			}
			if ka.ref_count >= self.cfg.new_buckets_per_address {
				return;
			}

			// The more references an address already has, the less
			// likely it is to earn another one.
			let refs = ka.ref_count;
			if !self.rng.gen_ratio(1, 2 * refs) {
				return;
			}
		} else {
			self.index.insert(key.clone(), KnownAddress::new(na.clone(), src.clone()));
			trace!("Added new address {} (total: {})", na, self.index.len());
		}

		let bucket = self.new_bucket(na, src);
		self.add_new_ref(&key, bucket);
	}

	/// Add a reference to the address into the given new bucket, evicting
	/// the bucket's worst occupant if it is full.
	fn add_new_ref(&mut self, key: &str, bucket: usize) {
		if self.new_buckets[bucket].contains(key) {
			return;
		}

		if self.new_buckets[bucket].len() >= self.cfg.new_bucket_size {
			self.evict_new(bucket);
		}

		self.new_buckets[bucket].insert(key.to_owned());
		if let Some(ka) = self.index.get_mut(key) {
			ka.ref_count += 1;
		}
		trace!("Added {} to new bucket {}", key, bucket);
	}

	/// Evict the worst occupant of the given new bucket: lowest eviction
	/// score first, oldest timestamp among equals, smallest key as the
	/// final tie break.
	fn evict_new(&mut self, bucket: usize) {
		let now = SystemTime::now();
		let victim = {
			let index = &self.index;
			let max_age = self.cfg.max_address_age;
			self.new_buckets[bucket]
				.iter()
				.filter_map(|key| index.get(key).map(|ka| (key, ka)))
				.min_by(|(ak, a), (bk, b)| {
					a.eviction_score(now, max_age)
						.total_cmp(&b.eviction_score(now, max_age))
						.then_with(|| a.na.timestamp.cmp(&b.na.timestamp))
						.then_with(|| ak.cmp(bk))
				})
				.map(|(key, _)| key.clone())
		};
		if let Some(key) = victim {
			trace!("Expiring {} from new bucket {}", key, bucket);
			self.drop_new_ref(&key, bucket);
		}
	}

	/// Remove the address's reference from the given new bucket. The
	/// address itself is forgotten once no references remain and it never
	/// made tried.
	fn drop_new_ref(&mut self, key: &str, bucket: usize) {
		if !self.new_buckets[bucket].remove(key) {
			return;
		}
		let forget = match self.index.get_mut(key) {
			Some(ka) => {
				ka.ref_count -= 1;
				ka.ref_count == 0 && !ka.tried
			}
			None => false,
		};
		if forget {
			self.index.remove(key);
			trace!("Removed address {} (total: {})", key, self.index.len());
		}
	}

	/// Remove every new bucket reference to the address.
	fn remove_new_refs(&mut self, key: &str) {
		let refs = match self.index.get(key) {
			Some(ka) => ka.ref_count,
			None => return,
		};
		let mut remaining = refs;
		for bucket in self.new_buckets.iter_mut() {
			if remaining == 0 {
				break;
			}
			if bucket.remove(key) {
				remaining -= 1;
			}
		}
		if let Some(ka) = self.index.get_mut(key) {
			ka.ref_count = 0;
		}
	}

	/// Mark the address as having just completed a successful handshake:
	/// failure counters reset and the address moves to the tried table.
	///
	/// The stored timestamp stays as it is. It ends up in shared address
	/// dumps, which must not leak our connection times.
	fn mark_good(&mut self, na: &NetAddress) {
		let key = na.key();
		let now = SystemTime::now();

		let already_tried = match self.index.get_mut(&key) {
			Some(ka) => {
				ka.attempts = 0;
				ka.last_attempt = Some(now);
				ka.last_success = Some(now);
				ka.tried
			}
			None => return,
		};
		if already_tried {
			return;
		}

		self.promote(&key, na.ip, now);
	}

	/// Try to move the address from the new table into its tried slot.
	///
	/// An incumbent with a recent enough success defends the slot and the
	/// promotion is abandoned, leaving the address in the new table.
	/// Otherwise the incumbent, if any, is demoted back to new. Returns
	/// whether the address was placed.
	fn promote(&mut self, key: &AddressKey, ip: IpAddr, now: SystemTime) -> bool {
		let bucket = self.tried_bucket(key, ip);
		let slot = self.tried_slot(bucket, key);
		let incumbent = self.tried_buckets[bucket][slot].clone();

		if let Some(ref inc_key) = incumbent {
			let defends = self
				.index
				.get(inc_key)
				.map_or(false, |ka| ka.defends_slot(now, self.cfg.tried_replacement_window));
			if defends {
				trace!(
					"Not promoting {}: tried slot {}/{} defended by {}",
					key,
					bucket,
					slot,
					inc_key
				);
				return false;
			}
		}

		// Pull the address out of the new table before demoting the
		// incumbent; the demotion below may itself evict from a new
		// bucket.
		self.remove_new_refs(key);

		if let Some(inc_key) = incumbent {
			self.demote_tried(&inc_key, bucket, slot);
		}

		self.place_tried(key.clone(), bucket, slot);
		true
	}

	/// Push a tried slot incumbent back into the new table.
	fn demote_tried(&mut self, key: &str, bucket: usize, slot: usize) {
		if self.tried_buckets[bucket][slot].take().is_some() {
			self.n_tried -= 1;
		}

		let (na, src) = match self.index.get_mut(key) {
			Some(ka) => {
				ka.tried = false;
				(ka.na.clone(), ka.src.clone())
			}
			None => return,
		};

		let new_bucket = self.new_bucket(&na, &src);
		self.add_new_ref(key, new_bucket);
		debug!("Demoted {} from tried bucket {} back to new", key, bucket);
	}

	fn place_tried(&mut self, key: AddressKey, bucket: usize, slot: usize) {
		if let Some(ka) = self.index.get_mut(&key) {
			ka.tried = true;
		}
		trace!("Promoted {} to tried bucket {} slot {}", key, bucket, slot);
		if self.tried_buckets[bucket][slot].replace(key).is_none() {
			self.n_tried += 1;
		}
	}

	/// Record a connection attempt to the address.
	fn attempt(&mut self, na: &NetAddress) {
		if let Some(ka) = self.index.get_mut(&na.key()) {
			ka.attempts += 1;
			ka.last_attempt = Some(SystemTime::now());
		}
	}

	/// Record an established connection, refreshing the stored timestamp
	/// when it has gone stale. Quality counters are not touched.
	fn connected(&mut self, na: &NetAddress) {
		let threshold = self.cfg.stale_timestamp_threshold;
		if let Some(ka) = self.index.get_mut(&na.key()) {
			let now = SystemTime::now();
			if now.saturating_duration_since(ka.na.timestamp) > threshold {
				ka.na.timestamp = now;
			}
		}
	}

	/// Pick a random known address to connect to, drawing from the tried
	/// table with the configured bias and within a table weighting every
	/// entry by its quality.
	fn get_address(&mut self) -> Option<KnownAddress> {
		if self.index.is_empty() {
			return None;
		}

		let n_new = self.index.len() - self.n_tried;
		let use_tried =
			self.n_tried > 0 && (n_new == 0 || self.rng.gen_bool(self.cfg.tried_bias));

		let now = SystemTime::now();
		let total: f64 = self
			.index
			.values()
			.filter(|ka| ka.tried == use_tried)
			.map(|ka| ka.chance(now))
			.sum();
		if total <= 0.0 {
			return None;
		}

		let mut draw = self.rng.gen::<f64>() * total;
		let mut last = None;
		for ka in self.index.values().filter(|ka| ka.tried == use_tried) {
			draw -= ka.chance(now);
			if draw <= 0.0 {
				trace!(
					"Selected {} from the {} table",
					ka.na,
					if use_tried { "tried" } else { "new" }
				);
				return Some(ka.clone());
			}
			last = Some(ka);
		}
		// Float rounding can leave a sliver; it falls to the last
		// candidate.
		last.cloned()
	}

	/// A bounded random subset of the routable known addresses, biased
	/// towards tried entries by weighted sampling without replacement.
	fn address_cache(&mut self) -> Vec<NetAddress> {
		let tried_weight = self.cfg.tried_cache_weight;
		let rng = &mut self.rng;
		let index = &self.index;

		let mut keyed: Vec<(f64, &KnownAddress)> = index
			.values()
			.filter(|ka| network::is_routable(ka.na.ip))
			.map(|ka| {
				let weight = if ka.tried { tried_weight } else { 1.0 };
				(rng.gen::<f64>().powf(1.0 / weight), ka)
			})
			.collect();

		let target = (keyed.len() * self.cfg.cache_percent / 100).min(self.cfg.cache_max);

		keyed.sort_unstable_by(|a, b| b.0.total_cmp(&a.0));
		keyed.truncate(target);
		keyed.into_iter().map(|(_, ka)| ka.na.clone()).collect()
	}

	/// Record one of our own addresses. Only manually configured
	/// addresses may skip the routability check, and an established
	/// priority is never lowered.
	fn add_local(&mut self, na: &NetAddress, priority: AddressPriority) -> Result<(), Error> {
		if priority != AddressPriority::Manual && !network::is_routable(na.ip) {
			return Err(Error::NotRoutable(na.ip));
		}

		let key = na.key();
		match self.local.get_mut(&key) {
			Some(la) => {
				if priority > la.priority {
					la.priority = priority;
				}
			}
			None => {
				debug!("Added local address {} with priority {:?}", na, priority);
				self.local_seq += 1;
				let seq = self.local_seq;
				self.local.insert(
					key,
					LocalAddress { na: na.clone(), priority: priority, seq: seq },
				);
			}
		}
		Ok(())
	}

	/// The best local address to advertise to the given remote, falling
	/// back to the zero address of the remote's family.
	fn best_local(&self, remote: &NetAddress) -> NetAddress {
		match localaddr::best_for(self.local.values(), remote.ip) {
			Some(la) => {
				debug!("Suggesting local address {} for {}", la.na, remote);
				la.na.clone()
			}
			None => {
				debug!("No worthy local address for {}", remote);
				let ip: IpAddr =
					if remote.ip.is_ipv4() || network::is_onion_cat_tor(remote.ip) {
						Ipv4Addr::UNSPECIFIED.into()
					} else {
						Ipv6Addr::UNSPECIFIED.into()
					};
				NetAddress::new(ip, 0, ServiceFlags::NONE)
			}
		}
	}

	/// Capture the persisted form of the current state.
	fn snapshot(&self) -> Snapshot {
		let mut addresses: Vec<SnapshotAddress> =
			self.index.values().map(SnapshotAddress::from_known).collect();
		// Sorted for stable files.
		addresses.sort_unstable_by(|a, b| a.addr.cmp(&b.addr));

		let mut locals: Vec<&LocalAddress> = self.local.values().collect();
		locals.sort_unstable_by_key(|la| la.seq);
		let local_addresses = locals
			.into_iter()
			.map(|la| SnapshotLocalAddress { addr: la.na.key(), priority: la.priority })
			.collect();

		Snapshot {
			version: SNAPSHOT_VERSION,
			key: self.hash_key,
			addresses: addresses,
			local_addresses: local_addresses,
		}
	}

	/// Fill an empty state from a snapshot.
	///
	/// Buckets are assigned anew under the snapshot's hash key, which
	/// reproduces the placement of the run that wrote it: tried records
	/// reclaim the exact slots they held, keeping the new/tried split
	/// intact. Only when the tables were reconfigured smaller can slots
	/// still collide; such records contest their slot like a live
	/// promotion would and the loser lands in the new table. Entries
	/// older than the configured maximum age and unparsable records are
	/// dropped.
	fn restore(&mut self, snapshot: Snapshot) {
		self.hash_key = snapshot.key;

		let now = SystemTime::now();
		let mut n_new = 0;
		let mut n_tried = 0;
		let mut dropped = 0;

		for record in snapshot.addresses {
			let mut ka = match record.into_known() {
				Some(ka) => ka,
				None => {
					dropped += 1;
					continue;
				}
			};
			if now.saturating_duration_since(ka.na.timestamp) > self.cfg.max_address_age {
				dropped += 1;
				continue;
			}
			if !network::is_routable(ka.na.ip) {
				dropped += 1;
				continue;
			}
			let key = ka.na.key();
			if self.index.contains_key(&key) {
				continue;
			}

			let was_tried = ka.tried;
			ka.tried = false;
			let na = ka.na.clone();
			let src = ka.src.clone();
			self.index.insert(key.clone(), ka);

			if was_tried && self.promote(&key, na.ip, now) {
				n_tried += 1;
			} else {
				let bucket = self.new_bucket(&na, &src);
				self.add_new_ref(&key, bucket);
				n_new += 1;
			}
		}

		for record in snapshot.local_addresses {
			match netaddr::parse_literal(&record.addr) {
				Ok((ip, port)) => {
					let na = NetAddress::new(ip, port, ServiceFlags::NONE);
					if self.add_local(&na, record.priority).is_err() {
						dropped += 1;
					}
				}
				Err(..) => dropped += 1,
			}
		}

		debug!(
			"Restored {} new and {} tried addresses ({} dropped)",
			n_new, n_tried, dropped
		);
	}

	/// The new bucket for an address heard from the given source.
	fn new_bucket(&self, na: &NetAddress, src: &NetAddress) -> usize {
		let addr_group = network::group_key(na.ip);
		let src_group = network::group_key(src.ip);
		let spread = keyed_hash(self.hash_key, (&addr_group, &src_group))
			% self.cfg.new_buckets_per_source_group;
		(keyed_hash(self.hash_key, (&src_group, spread)) % self.cfg.new_bucket_count as u64)
			as usize
	}

	/// The tried bucket for an address.
	fn tried_bucket(&self, key: &str, ip: IpAddr) -> usize {
		let group = network::group_key(ip);
		let spread = keyed_hash(self.hash_key, key) % self.cfg.tried_buckets_per_group;
		(keyed_hash(self.hash_key, (&group, spread)) % self.cfg.tried_bucket_count as u64)
			as usize
	}

	/// The slot within a tried bucket where an address must live.
	fn tried_slot(&self, bucket: usize, key: &str) -> usize {
		(keyed_hash(self.hash_key, (bucket as u64, key)) % self.cfg.tried_bucket_size as u64)
			as usize
	}
}

/// Tracks the lifecycle of the background snapshot thread.
struct Run {
	started: bool,
	stopped: bool,
	quit_tx: Option<channel::SyncSender<()>>,
	thread: Option<thread::JoinHandle<()>>,
}

/// Manages peer network addresses.
///
/// All operations are safe to call from multiple threads; every one of
/// them acquires the manager's single state lock. None of them performs
/// network I/O: dialing the addresses handed out here is the caller's
/// business, through the [NetAdapter] it supplied.
pub struct AddressManager {
	id: String,
	cfg: Config,
	peers_file: PathBuf,
	adapter: Arc<dyn NetAdapter>,
	state: Arc<Mutex<State>>,
	run: Mutex<Run>,
}

impl AddressManager {
	/// Create a new address manager identified by `id`, with the default
	/// configuration.
	pub fn new(id: impl Into<String>, adapter: Arc<dyn NetAdapter>) -> AddressManager {
		AddressManager::with_config(id, adapter, Config::default())
	}

	/// Create a new address manager with the given configuration. The
	/// `id` scopes the snapshot file: `<data_dir>/<id>.json`.
	///
	/// No I/O happens until [AddressManager::start] or
	/// [AddressManager::stop] is called.
	pub fn with_config(
		id: impl Into<String>,
		adapter: Arc<dyn NetAdapter>,
		config: Config,
	) -> AddressManager {
		let id = id.into();
		let peers_file = config.data_dir.join(format!("{}.json", id));
		AddressManager {
			id: id,
			cfg: config.clone(),
			peers_file: peers_file,
			adapter: adapter,
			state: Arc::new(Mutex::new(State::new(config))),
			run: Mutex::new(Run {
				started: false,
				stopped: false,
				quit_tx: None,
				thread: None,
			}),
		}
	}

	/// The identifier scoping this manager's snapshot file.
	pub fn id(&self) -> &str {
		&self.id
	}

	/// The configuration used for this [AddressManager].
	pub fn config(&self) -> &Config {
		&self.cfg
	}

	/// Load the snapshot of a previous run and begin periodic
	/// persistence. Idempotent. Call [AddressManager::stop] to halt the
	/// background job and write the final snapshot.
	pub fn start(&self) {
		let mut run = self.run.lock();
		if run.started {
			return;
		}
		run.started = true;

		if let Some(snapshot) = store::load(&self.peers_file) {
			self.state.lock().restore(snapshot);
		}

		let (quit_tx, quit_rx) = channel::bounded(1);
		let state = self.state.clone();
		let peers_file = self.peers_file.clone();
		let interval = self.cfg.persist_interval;
		let thread = thread::Builder::new()
			.name("addrmgr_snapshot".to_owned())
			.spawn(move || snapshot_loop(state, peers_file, interval, quit_rx))
			.expect("failed to spawn addrmgr snapshot thread");
		run.quit_tx = Some(quit_tx);
		run.thread = Some(thread);

		info!("Address manager {} started", self.id);
	}

	/// Stop background persistence and write one final snapshot.
	///
	/// Safe to call more than once; only the first call writes. Also
	/// works without a preceding [AddressManager::start], so a manager
	/// used synchronously still persists its state.
	pub fn stop(&self) -> Result<(), Error> {
		{
			let mut run = self.run.lock();
			if run.stopped {
				return Ok(());
			}
			run.stopped = true;

			if let Some(quit_tx) = run.quit_tx.take() {
				let _ = quit_tx.send(());
			}
			if let Some(thread) = run.thread.take() {
				if thread.join().is_err() {
					warn!("addrmgr snapshot thread panicked");
				}
			}
		}

		let snapshot = self.state.lock().snapshot();
		store::save(&self.peers_file, &snapshot)?;
		info!("Address manager {} stopped", self.id);
		Ok(())
	}

	/// Add a single address candidate heard from `src`.
	pub fn add_address(&self, na: &NetAddress, src: &NetAddress) {
		self.state.lock().update_address(na, src);
	}

	/// Add address candidates heard from `src`, skipping unroutable ones
	/// and deduplicating against what we already know.
	pub fn add_addresses(&self, addrs: &[NetAddress], src: &NetAddress) {
		let mut state = self.state.lock();
		for na in addrs {
			state.update_address(na, src);
		}
	}

	/// Add an address given as an `ip:port` literal (IPv6 bracketed). The
	/// address is recorded as its own source.
	pub fn add_address_by_literal(&self, addr: &str) -> Result<(), Error> {
		let na = self.deserialize_net_address(addr, ServiceFlags::NONE)?;
		self.add_address(&na, &na);
		Ok(())
	}

	/// Parse an `ip:port` literal (IPv6 bracketed) into a [NetAddress]
	/// stamped with the current time. The result is not inserted.
	pub fn deserialize_net_address(
		&self,
		addr: &str,
		services: ServiceFlags,
	) -> Result<NetAddress, Error> {
		let (ip, port) = netaddr::parse_literal(addr)?;
		Ok(NetAddress::new(ip, port, services))
	}

	/// Resolve a host into a [NetAddress]: IP literals parse directly,
	/// anything else goes through [NetAdapter::lookup] and the first
	/// resolved IP wins.
	pub fn host_to_net_address(
		&self,
		host: &str,
		port: u16,
		services: ServiceFlags,
	) -> Result<NetAddress, Error> {
		if let Ok(ip) = host.parse::<IpAddr>() {
			return Ok(NetAddress::new(ip, port, services));
		}
		let ips = self.adapter.lookup(host)?;
		match ips.first() {
			Some(ip) => Ok(NetAddress::new(*ip, port, services)),
			None => Err(Error::NoAddresses(host.to_owned())),
		}
	}

	/// Mark the address as having just completed a successful handshake,
	/// promoting it into the tried table.
	pub fn mark_good(&self, na: &NetAddress) {
		self.state.lock().mark_good(na);
	}

	/// Record a connection attempt to the address.
	pub fn attempt(&self, na: &NetAddress) {
		self.state.lock().attempt(na);
	}

	/// Record an established connection to the address, refreshing its
	/// stored timestamp when it has gone stale.
	pub fn connected(&self, na: &NetAddress) {
		self.state.lock().connected(na);
	}

	/// Pick a random known address to connect to, biased towards tried
	/// entries and, within a table, towards quality. [None] only when no
	/// addresses are known.
	pub fn get_address(&self) -> Option<KnownAddress> {
		self.state.lock().get_address()
	}

	/// Whether we know fewer addresses than we would like.
	pub fn need_more_addresses(&self) -> bool {
		let state = self.state.lock();
		state.index.len() < state.cfg.low_water_mark
	}

	/// Number of addresses known.
	pub fn num_addresses(&self) -> usize {
		self.state.lock().index.len()
	}

	/// Number of addresses in the new table.
	pub fn num_new(&self) -> usize {
		let state = self.state.lock();
		state.index.len() - state.n_tried
	}

	/// Number of addresses in the tried table.
	pub fn num_tried(&self) -> usize {
		self.state.lock().n_tried
	}

	/// A bounded random subset of the routable known addresses, biased
	/// towards tried entries. Suitable as a response to an address
	/// request from a peer.
	pub fn address_cache(&self) -> Vec<NetAddress> {
		self.state.lock().address_cache()
	}

	/// Record one of our own addresses for advertisement. Non-routable
	/// addresses are rejected unless `priority` is
	/// [AddressPriority::Manual]; re-adding raises (never lowers) the
	/// priority.
	pub fn add_local_address(
		&self,
		na: &NetAddress,
		priority: AddressPriority,
	) -> Result<(), Error> {
		self.state.lock().add_local(na, priority)
	}

	/// The best local address to advertise to the given remote, falling
	/// back to the zero address of the remote's family when none of ours
	/// can expect to reach it.
	pub fn get_best_local_address(&self, remote: &NetAddress) -> NetAddress {
		self.state.lock().best_local(remote)
	}
}

/// Body of the background snapshot thread: write the current state every
/// `interval` until the quit channel signals or disconnects.
fn snapshot_loop(
	state: Arc<Mutex<State>>,
	peers_file: PathBuf,
	interval: Duration,
	quit_rx: channel::Receiver<()>,
) {
	loop {
		match quit_rx.recv_timeout(interval) {
			Err(channel::RecvTimeoutError::Timeout) => {
				// Snapshot under the lock, write outside of it.
				let snapshot = state.lock().snapshot();
				match store::save(&peers_file, &snapshot) {
					Ok(()) => trace!("Wrote address snapshot {}", peers_file.display()),
					Err(e) => warn!(
						"Failed to write address snapshot {}: {}",
						peers_file.display(),
						e
					),
				}
			}
			Ok(()) | Err(channel::RecvTimeoutError::Disconnected) => break,
		}
	}
}

/// Hash the given parts under the manager's random key.
///
/// The default hasher is keyed SipHash, so bucket placement is stable
/// within an instance and unpredictable across instances.
fn keyed_hash(key: u64, parts: impl Hash) -> u64 {
	let mut hasher = DefaultHasher::new();
	key.hash(&mut hasher);
	parts.hash(&mut hasher);
	hasher.finish()
}
