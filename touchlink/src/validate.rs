//correctness rules both roles apply to negotiated network parameters

use crate::types::{ ChannelMask, BROADCAST_PAN_ID, MAX_NETWORK_ADDRESS, MIN_NETWORK_ADDRESS };

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invalid {
	Channel(u8),
	PanId(u16),
	NetworkAddress(u16),
	ExtendedPanId(u64),
}

pub fn channel(channels: ChannelMask, channel: u8) -> Result<(), Invalid> {
	if channels.contains(channel) { Ok(()) } else { Err(Invalid::Channel(channel)) }
}

pub fn pan_id(pan_id: u16) -> Result<(), Invalid> {
	if pan_id == 0 || pan_id == BROADCAST_PAN_ID { Err(Invalid::PanId(pan_id)) } else { Ok(()) }
}

pub fn network_address(address: u16) -> Result<(), Invalid> {
	if (MIN_NETWORK_ADDRESS..=MAX_NETWORK_ADDRESS).contains(&address) { Ok(()) } else { Err(Invalid::NetworkAddress(address)) }
}

pub fn extended_pan_id(extended_pan_id: u64) -> Result<(), Invalid> {
	if extended_pan_id == 0 || extended_pan_id == u64::MAX { Err(Invalid::ExtendedPanId(extended_pan_id)) } else { Ok(()) }
}

pub fn network(channels: ChannelMask, ch: u8, pan: u16, address: u16, extended: u64) -> Result<(), Invalid> {
	channel(channels, ch)?;
	pan_id(pan)?;
	network_address(address)?;
	extended_pan_id(extended)?;

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::PRIMARY_CHANNELS;

	#[test]
	fn accepts_sane_parameters() {
		assert_eq!(network(PRIMARY_CHANNELS, 20, 0x1a2b, 0x0001, 0xdead_beef), Ok(()));
	}

	#[test]
	fn rejects_each_rule() {
		assert_eq!(network(PRIMARY_CHANNELS, 12, 0x1a2b, 1, 1), Err(Invalid::Channel(12)));
		assert_eq!(network(PRIMARY_CHANNELS, 11, 0, 1, 1), Err(Invalid::PanId(0)));
		assert_eq!(network(PRIMARY_CHANNELS, 11, 0xffff, 1, 1), Err(Invalid::PanId(0xffff)));
		assert_eq!(network(PRIMARY_CHANNELS, 11, 1, 0, 1), Err(Invalid::NetworkAddress(0)));
		assert_eq!(network(PRIMARY_CHANNELS, 11, 1, 0xfff8, 1), Err(Invalid::NetworkAddress(0xfff8)));
		assert_eq!(network(PRIMARY_CHANNELS, 11, 1, 1, 0), Err(Invalid::ExtendedPanId(0)));
		assert_eq!(network(PRIMARY_CHANNELS, 11, 1, 1, u64::MAX), Err(Invalid::ExtendedPanId(u64::MAX)));
	}
}
