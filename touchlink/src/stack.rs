//collaborators of the commissioning engine
//
//synchronous queries go through the `Stack` trait, everything that finishes
//later is emitted as a `Request` and comes back as a `Completion`

use zigbee::zll::{ self, EndpointInfo, ZllFrame };
use crate::types::{ Allocation, AllocError, ChannelMask, NetworkKey, NetworkParams, Range, Role };

pub trait Stack {
	fn ieee_address(&self) -> u64;
	fn is_factory_new(&self) -> bool;
	fn logical_type(&self) -> u8;
	fn rx_on_when_idle(&self) -> bool;
	fn primary_channels(&self) -> ChannelMask;
	fn secondary_channels(&self) -> ChannelMask;
	//None while not joined
	fn network(&self) -> Option<NetworkParams>;
	fn network_key(&self) -> Option<NetworkKey>;
	fn endpoints(&self) -> Vec<EndpointInfo>;
	fn group_id_count(&self) -> u8;

	//security
	fn key_bitmask(&self) -> u16;
	fn generate_key(&mut self) -> NetworkKey;
	fn new_transaction_id(&mut self) -> u32;
	fn new_response_id(&mut self) -> u32;

	//addressing
	fn allocate_self(&mut self, group_count: u8) -> Result<Allocation, AllocError>;
	fn allocate_for_peer(&mut self, group_count: u8, delegate_range: bool) -> Result<Allocation, AllocError>;
	fn assign_free_ranges(&mut self, free_addresses: Range, free_groups: Range);

	fn is_end_device(&self) -> bool {
		self.logical_type() == zll::LOGICAL_TYPE_END_DEVICE
	}

	fn all_channels(&self) -> ChannelMask {
		self.primary_channels().union(self.secondary_channels())
	}

	//highest key index both sides support
	fn shared_key_index(&self, peer_bitmask: u16) -> Option<u8> {
		let common = self.key_bitmask() & peer_bitmask;

		if common == 0 {
			None
		}
		else {
			Some(15 - common.leading_zeros() as u8)
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
	Broadcast,
	Ieee(u64)
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinParams {
	pub network: NetworkParams,
	pub key: NetworkKey,
	pub groups: Range,
	//join as the coordinator-less starting router of a new network
	pub start: bool
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
	//async, answered with Completed::InterPanSet
	SetInterPan { channel: u8 },
	//async, answered with Completed::InterPanCleared
	ClearInterPan,
	//async, answered with Completed::KeyEncrypted
	EncryptKey { key: NetworkKey, key_index: u8, transaction_id: u32, response_id: u32 },
	//async, answered with Completed::KeyDecrypted
	DecryptKey { encrypted: NetworkKey, key_index: u8, transaction_id: u32, response_id: u32 },
	//async, answered with Completed::FreePan
	FindFreePan,
	//async, answered with Completed::NetworkJoined
	JoinNetwork(JoinParams),
	//async, answered with Completed::NetworkUpdated
	UpdateNetwork { channel: u8, update_id: u8 },
	//fire and forget
	SendInterPan { destination: Destination, frame: ZllFrame, tx_power: Option<i8> },
	SendIeeeAddrRequest { network_address: u16, sequence_number: u8 },
	Reconnect,
	ResetToFactoryNew,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Request {
	pub origin: Role,
	pub operation: Operation
}

#[derive(Debug, Clone, PartialEq)]
pub enum Completed {
	InterPanSet,
	InterPanCleared,
	KeyEncrypted { encrypted: NetworkKey },
	KeyDecrypted { key: NetworkKey },
	FreePan { pan_id: u16, extended_pan_id: u64 },
	NetworkJoined { success: bool },
	NetworkUpdated { success: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
	pub origin: Role,
	pub result: Completed
}

impl Completion {
	pub fn new(origin: Role, result: Completed) -> Self {
		Completion { origin, result }
	}
}
