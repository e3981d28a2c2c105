//zigbee light link commissioning cluster - inter-pan commands

use deku::{ self, prelude::* };
use serde::{ Serialize, Deserialize };

pub const ZLL_PROFILE_ID: u16 = 0xc05e;

pub const STATUS_SUCCESS: u8 = 0x00;
pub const STATUS_FAILURE: u8 = 0x01;

//max records carried by one device information response
pub const MAX_DEVICE_INFO_RECORDS: usize = 5;

pub const LOGICAL_TYPE_COORDINATOR: u8 = 0;
pub const LOGICAL_TYPE_ROUTER: u8 = 1;
pub const LOGICAL_TYPE_END_DEVICE: u8 = 2;

#[derive(Debug)]
pub enum Error {
	Deku(deku::DekuError),
	BufferTooSmall(&'static str),
	NotClusterSpecific,
	ManufacturerSpecific(u16),
	TooManyRecords(usize)
}

impl core::fmt::Display for Error {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		match self {
			Self::Deku(e) => e.fmt(f),
			Self::BufferTooSmall(s) => write!(f, "Buffer too small: {}", s),
			Self::NotClusterSpecific => write!(f, "Not a cluster specific command"),
			Self::ManufacturerSpecific(c) => write!(f, "Unexpected manufacturer specific frame ({:#06x})", c),
			Self::TooManyRecords(n) => write!(f, "Too many device info records: {}", n)
		}
	}
}

impl From<deku::DekuError> for Error {
	fn from(e: deku::DekuError) -> Self {
		Error::Deku(e)
	}
}

//same layout as the zcl frame control, frame type is always 01 (cluster specific)
#[derive(Debug, DekuRead, DekuWrite, Clone, Copy, PartialEq, Eq)]
pub struct FrameControl {
	#[deku(bits = 1, pad_bits_before = "3")]
	pub disable_default_response: bool,
	#[deku(bits = 1)]
	pub direction: u8,
	#[deku(bits = 1)]
	pub manufacturer_specific: u8,
	#[deku(bits = 2)]
	pub frame_type: u8,
}

pub const DIRECTION_CLIENT_TO_SERVER: u8 = 0;
pub const DIRECTION_SERVER_TO_CLIENT: u8 = 1;
pub const FRAME_TYPE_CLUSTER_SPECIFIC: u8 = 1;

impl FrameControl {
	pub fn for_direction(direction: u8) -> Self {
		FrameControl {
			disable_default_response: true,
			direction,
			manufacturer_specific: 0,
			frame_type: FRAME_TYPE_CLUSTER_SPECIFIC
		}
	}
}

#[derive(Debug, DekuRead, DekuWrite, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ZigbeeInfo {
	#[deku(bits = 1, pad_bits_before = "5")]
	pub rx_on_when_idle: bool,
	#[deku(bits = 2)]
	pub logical_type: u8,
}

impl ZigbeeInfo {
	pub fn is_router(&self) -> bool {
		self.logical_type == LOGICAL_TYPE_ROUTER || self.logical_type == LOGICAL_TYPE_COORDINATOR
	}

	pub fn is_end_device(&self) -> bool {
		self.logical_type == LOGICAL_TYPE_END_DEVICE
	}
}

#[derive(Debug, DekuRead, DekuWrite, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ZllInfo {
	#[deku(bits = 1)]
	pub profile_interop: bool,
	#[deku(bits = 1, pad_bits_before = "1")]
	pub priority_request: bool,
	#[deku(bits = 1)]
	pub touchlink_initiator: bool,
	#[deku(bits = 1, pad_bits_before = "2")]
	pub address_assignment: bool,
	#[deku(bits = 1)]
	pub factory_new: bool,
}

#[derive(Debug, DekuRead, DekuWrite, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EndpointInfo {
	pub endpoint: u8,
	pub profile_id: u16,
	pub device_id: u16,
	pub version: u8,
	pub group_id_count: u8,
}

#[derive(Debug, DekuRead, DekuWrite, Clone, PartialEq, Eq)]
pub struct ScanRequest {
	pub transaction_id: u32,
	pub zigbee_info: ZigbeeInfo,
	pub zll_info: ZllInfo,
}

#[derive(Debug, DekuRead, DekuWrite, Clone, PartialEq, Eq)]
pub struct ScanResponse {
	pub transaction_id: u32,
	pub rssi_correction: u8,
	pub zigbee_info: ZigbeeInfo,
	pub zll_info: ZllInfo,
	pub key_bitmask: u16,
	pub response_id: u32,
	pub extended_pan_id: u64,
	pub network_update_id: u8,
	pub logical_channel: u8,
	pub pan_id: u16,
	pub network_address: u16,
	pub number_of_sub_devices: u8,
	pub total_group_ids: u8,
	//only present when exactly one sub device is reported
	#[deku(cond = "*number_of_sub_devices == 1")]
	pub endpoint_info: Option<EndpointInfo>,
}

#[derive(Debug, DekuRead, DekuWrite, Clone, PartialEq, Eq)]
pub struct DeviceInfoRequest {
	pub transaction_id: u32,
	pub start_index: u8,
}

#[derive(Debug, DekuRead, DekuWrite, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfoRecord {
	pub ieee_address: u64,
	pub endpoint: u8,
	pub profile_id: u16,
	pub device_id: u16,
	pub version: u8,
	pub group_id_count: u8,
	pub sort_tag: u8,
}

#[derive(Debug, DekuRead, DekuWrite, Clone, PartialEq, Eq)]
pub struct DeviceInfoResponse {
	pub transaction_id: u32,
	pub number_of_sub_devices: u8,
	pub start_index: u8,
	pub record_count: u8,
	#[deku(count = "record_count")]
	pub records: Vec<DeviceInfoRecord>,
}

#[derive(Debug, DekuRead, DekuWrite, Clone, PartialEq, Eq)]
pub struct IdentifyRequest {
	pub transaction_id: u32,
	//0x0000 - stop, 0xffff - default time of the receiver
	pub identify_duration: u16,
}

#[derive(Debug, DekuRead, DekuWrite, Clone, PartialEq, Eq)]
pub struct ResetToFactoryNewRequest {
	pub transaction_id: u32,
}

#[derive(Debug, DekuRead, DekuWrite, Clone, PartialEq, Eq)]
pub struct NetworkStartRequest {
	pub transaction_id: u32,
	pub extended_pan_id: u64,
	pub key_index: u8,
	pub encrypted_network_key: [u8; 16],
	pub logical_channel: u8,
	pub pan_id: u16,
	pub network_address: u16,
	pub group_ids_begin: u16,
	pub group_ids_end: u16,
	pub free_network_address_range_begin: u16,
	pub free_network_address_range_end: u16,
	pub free_group_id_range_begin: u16,
	pub free_group_id_range_end: u16,
	pub initiator_ieee_address: u64,
	pub initiator_network_address: u16,
}

#[derive(Debug, DekuRead, DekuWrite, Clone, PartialEq, Eq)]
pub struct NetworkStartResponse {
	pub transaction_id: u32,
	pub status: u8,
	pub extended_pan_id: u64,
	pub network_update_id: u8,
	pub logical_channel: u8,
	pub pan_id: u16,
}

//router and end device join requests share the layout
#[derive(Debug, DekuRead, DekuWrite, Clone, PartialEq, Eq)]
pub struct NetworkJoinRequest {
	pub transaction_id: u32,
	pub extended_pan_id: u64,
	pub key_index: u8,
	pub encrypted_network_key: [u8; 16],
	pub network_update_id: u8,
	pub logical_channel: u8,
	pub pan_id: u16,
	pub network_address: u16,
	pub group_ids_begin: u16,
	pub group_ids_end: u16,
	pub free_network_address_range_begin: u16,
	pub free_network_address_range_end: u16,
	pub free_group_id_range_begin: u16,
	pub free_group_id_range_end: u16,
}

#[derive(Debug, DekuRead, DekuWrite, Clone, PartialEq, Eq)]
pub struct NetworkJoinResponse {
	pub transaction_id: u32,
	pub status: u8,
}

#[derive(Debug, DekuRead, DekuWrite, Clone, PartialEq, Eq)]
pub struct NetworkUpdateRequest {
	pub transaction_id: u32,
	pub extended_pan_id: u64,
	pub network_update_id: u8,
	pub logical_channel: u8,
	pub pan_id: u16,
	pub network_address: u16,
}

#[derive(Debug, DekuRead, DekuWrite, Clone, PartialEq, Eq)]
#[deku(id_type = "u8")]
pub enum Command {
	#[deku(id = "0x00")]
	ScanRequest(ScanRequest),
	#[deku(id = "0x01")]
	ScanResponse(ScanResponse),
	#[deku(id = "0x02")]
	DeviceInfoRequest(DeviceInfoRequest),
	#[deku(id = "0x03")]
	DeviceInfoResponse(DeviceInfoResponse),
	#[deku(id = "0x06")]
	IdentifyRequest(IdentifyRequest),
	#[deku(id = "0x07")]
	ResetToFactoryNewRequest(ResetToFactoryNewRequest),
	#[deku(id = "0x10")]
	NetworkStartRequest(NetworkStartRequest),
	#[deku(id = "0x11")]
	NetworkStartResponse(NetworkStartResponse),
	#[deku(id = "0x12")]
	NetworkJoinRouterRequest(NetworkJoinRequest),
	#[deku(id = "0x13")]
	NetworkJoinRouterResponse(NetworkJoinResponse),
	#[deku(id = "0x14")]
	NetworkJoinEndDeviceRequest(NetworkJoinRequest),
	#[deku(id = "0x15")]
	NetworkJoinEndDeviceResponse(NetworkJoinResponse),
	#[deku(id = "0x16")]
	NetworkUpdateRequest(NetworkUpdateRequest),
}

impl Command {
	pub fn transaction_id(&self) -> u32 {
		match self {
			Self::ScanRequest(c) => c.transaction_id,
			Self::ScanResponse(c) => c.transaction_id,
			Self::DeviceInfoRequest(c) => c.transaction_id,
			Self::DeviceInfoResponse(c) => c.transaction_id,
			Self::IdentifyRequest(c) => c.transaction_id,
			Self::ResetToFactoryNewRequest(c) => c.transaction_id,
			Self::NetworkStartRequest(c) => c.transaction_id,
			Self::NetworkStartResponse(c) => c.transaction_id,
			Self::NetworkJoinRouterRequest(c) | Self::NetworkJoinEndDeviceRequest(c) => c.transaction_id,
			Self::NetworkJoinRouterResponse(c) | Self::NetworkJoinEndDeviceResponse(c) => c.transaction_id,
			Self::NetworkUpdateRequest(c) => c.transaction_id,
		}
	}

	pub fn command_id(&self) -> u8 {
		match self {
			Self::ScanRequest(_) => 0x00,
			Self::ScanResponse(_) => 0x01,
			Self::DeviceInfoRequest(_) => 0x02,
			Self::DeviceInfoResponse(_) => 0x03,
			Self::IdentifyRequest(_) => 0x06,
			Self::ResetToFactoryNewRequest(_) => 0x07,
			Self::NetworkStartRequest(_) => 0x10,
			Self::NetworkStartResponse(_) => 0x11,
			Self::NetworkJoinRouterRequest(_) => 0x12,
			Self::NetworkJoinRouterResponse(_) => 0x13,
			Self::NetworkJoinEndDeviceRequest(_) => 0x14,
			Self::NetworkJoinEndDeviceResponse(_) => 0x15,
			Self::NetworkUpdateRequest(_) => 0x16,
		}
	}

	//responses travel server -> client, everything else client -> server
	pub fn direction(&self) -> u8 {
		match self {
			Self::ScanResponse(_) |
			Self::DeviceInfoResponse(_) |
			Self::NetworkStartResponse(_) |
			Self::NetworkJoinRouterResponse(_) |
			Self::NetworkJoinEndDeviceResponse(_) => DIRECTION_SERVER_TO_CLIENT,
			_ => DIRECTION_CLIENT_TO_SERVER
		}
	}
}

#[derive(Debug, DekuRead, DekuWrite, Clone, PartialEq, Eq)]
pub struct ZllFrame {
	pub control: FrameControl,
	pub sequence_number: u8,
	pub command: Command,
}

impl ZllFrame {
	pub fn from_command(command: Command, sequence_number: u8) -> Self {
		ZllFrame {
			control: FrameControl::for_direction(command.direction()),
			sequence_number,
			command
		}
	}

	pub fn from_buf(buf: &[u8]) -> Result<Self, Error> {
		if buf.len() < 3 {
			return Err(Error::BufferTooSmall("No zcl header"));
		}

		let control = FrameControl::try_from(&buf[0..1])?;

		if control.frame_type != FRAME_TYPE_CLUSTER_SPECIFIC {
			return Err(Error::NotClusterSpecific);
		}

		if control.manufacturer_specific == 1 {
			let code = u16::from_le_bytes([buf[1], buf[2]]);

			return Err(Error::ManufacturerSpecific(code));
		}

		//trailing bytes are tolerated, newer revisions append fields
		let (_rest, frame) = ZllFrame::from_bytes((buf, 0))?;

		if let Command::DeviceInfoResponse(ref r) = frame.command {
			if r.records.len() > MAX_DEVICE_INFO_RECORDS {
				return Err(Error::TooManyRecords(r.records.len()));
			}
		}

		Ok(frame)
	}

	pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
		if let Command::DeviceInfoResponse(ref r) = self.command {
			if r.records.len() > MAX_DEVICE_INFO_RECORDS {
				return Err(Error::TooManyRecords(r.records.len()));
			}
		}

		Ok(DekuContainerWrite::to_bytes(self)?)
	}
}
