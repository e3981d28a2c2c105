//zigbee device profile - the subset used to probe a freshly joined node

use deku::{ self, prelude::* };
use serde::{ Serialize, Deserialize };

//zdo commands are in profile = 0, command set as cluster id

pub const IEEE_ADDR_REQ: u16 = 0x0001;
pub const IEEE_ADDR_RSP: u16 = 0x8001;

pub const ZDP_SUCCESS: u8 = 0x00;

#[derive(Debug)]
pub enum Error {
	Deku(deku::DekuError),
	NotImplemented(u16),
	BufferTooSmall
}

impl core::fmt::Display for Error {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		match self {
			Self::Deku(e) => e.fmt(f),
			Self::NotImplemented(c) => write!(f, "Not implemented zdp cluster: {:#06x}", c),
			Self::BufferTooSmall => write!(f, "Buffer too small"),
		}
	}
}

impl From<deku::DekuError> for Error {
	fn from(e: deku::DekuError) -> Self {
		Error::Deku(e)
	}
}

#[derive(Debug, Serialize, Deserialize, DekuRead, DekuWrite, Clone, PartialEq, Eq)]
pub struct ZdoIeeeAddrReq {
	pub nwk_addr_of_interest: u16,
	//0 - single device response
	pub request_type: u8,
	pub start_index: u8,
}

#[derive(Debug, Serialize, Deserialize, DekuRead, DekuWrite, Clone, PartialEq, Eq)]
pub struct ZdoIeeeAddrRsp {
	pub status: u8,
	pub ieee_addr_remote_dev: u64,
	pub nwk_addr_remote_dev: u16,
	//extended response (associated devices) is not requested
	#[deku(read_all)]
	pub rest: Vec<u8>,
}

#[derive(Debug, DekuWrite, Clone, PartialEq, Eq)]
#[deku(id_type = "u16", bytes = "0")]
pub enum ZdoCommand
{
	#[deku(id = "0x0001")]
	IeeeAddrReq(ZdoIeeeAddrReq),
	#[deku(id = "0x8001")]
	IeeeAddrRsp(ZdoIeeeAddrRsp),
}

impl ZdoCommand {
	pub fn from_buf(buf: &[u8], cluster_id: u16) -> Result<Self, Error> {
		match cluster_id {
			IEEE_ADDR_REQ => Ok(Self::IeeeAddrReq(ZdoIeeeAddrReq::try_from(buf)?)),
			IEEE_ADDR_RSP => Ok(Self::IeeeAddrRsp(ZdoIeeeAddrRsp::try_from(buf)?)),
			_ => Err(Error::NotImplemented(cluster_id))
		}
	}

	pub fn get_cluster_id(&self) -> u16 {
		match self {
			Self::IeeeAddrReq(_) => IEEE_ADDR_REQ,
			Self::IeeeAddrRsp(_) => IEEE_ADDR_RSP,
		}
	}
}

#[derive(Debug, DekuWrite, Clone, PartialEq, Eq)]
pub struct ZdpFrame {
	#[deku(skip)]
	pub command_no: u16,
	pub sequence_number: u8,
	pub command: ZdoCommand
}

impl ZdpFrame {
	pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
		Ok(DekuContainerWrite::to_bytes(self)?)
	}

	pub fn from_buf(buf: &[u8], cluster_id: u16) -> Result<Self, Error> {
		if buf.len() == 0 {
			return Err(Error::BufferTooSmall);
		}

		Ok(ZdpFrame {
			command_no: cluster_id,
			sequence_number: buf[0],
			command: ZdoCommand::from_buf(&buf[1..], cluster_id)?
		})
	}

	pub fn from_command(command: ZdoCommand, sequence_number: u8) -> Self {
		ZdpFrame{
			command_no: command.get_cluster_id(),
			sequence_number,
			command
		}
	}
}
