
pub use std::net;
pub use std::path::Path;
pub use std::sync::Arc;
pub use std::time::{Duration, SystemTime};

pub use p2p_addrmgr::{
	AddressManager, AddressPriority, Config, Error, NetAdapter, NetAddress, ServiceFlags,
};

pub use super::MockAdapter;
