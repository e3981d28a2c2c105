use serde::{ Serialize, Deserialize };

pub const FIRST_CHANNEL: u8 = 11;
pub const LAST_CHANNEL: u8 = 26;

//touchlink primary channels 11, 15, 20, 25
pub const PRIMARY_CHANNELS: ChannelMask = ChannelMask(0x0210_8800);
pub const SECONDARY_CHANNELS: ChannelMask = ChannelMask(0x07ff_f800 & !0x0210_8800);

pub const BROADCAST_PAN_ID: u16 = 0xffff;
pub const UNASSIGNED_NETWORK_ADDRESS: u16 = 0xffff;
pub const MIN_NETWORK_ADDRESS: u16 = 0x0001;
pub const MAX_NETWORK_ADDRESS: u16 = 0xfff7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
	Initiator,
	Target
}

//terminal result reported through done callbacks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Status {
	Ok,
	Failure,
	Stopped,
	CommunicationNotEstablished
}

//802.15.4 channel page 0 bitmask, bit n = channel n
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelMask(pub u32);

impl ChannelMask {
	pub fn single(channel: u8) -> Self {
		if (FIRST_CHANNEL..=LAST_CHANNEL).contains(&channel) {
			ChannelMask(1 << channel)
		}
		else {
			ChannelMask(0)
		}
	}

	pub fn contains(&self, channel: u8) -> bool {
		(FIRST_CHANNEL..=LAST_CHANNEL).contains(&channel) && self.0 & (1 << channel) != 0
	}

	pub fn union(&self, other: ChannelMask) -> ChannelMask {
		ChannelMask(self.0 | other.0)
	}

	pub fn is_empty(&self) -> bool {
		self.channels().next().is_none()
	}

	pub fn first(&self) -> Option<u8> {
		self.channels().next()
	}

	pub fn channels(&self) -> impl Iterator<Item = u8> + '_ {
		(FIRST_CHANNEL..=LAST_CHANNEL).filter(move |c| self.contains(*c))
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct NetworkParams {
	pub extended_pan_id: u64,
	pub channel: u8,
	pub pan_id: u16,
	pub network_address: u16,
	pub update_id: u8
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Range {
	pub begin: u16,
	pub end: u16
}

impl Range {
	pub const EMPTY: Range = Range { begin: 0, end: 0 };

	pub fn is_empty(&self) -> bool {
		self.begin == 0 && self.end == 0
	}
}

//what the initiator hands over to a joining or starting peer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Allocation {
	pub network_address: u16,
	pub groups: Range,
	pub free_addresses: Range,
	pub free_groups: Range,
	//address was picked stochastically rather than from a range
	pub random: bool
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
	IllegalParameters
}

pub type NetworkKey = [u8; 16];
