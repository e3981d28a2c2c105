#[derive(Debug)]
pub enum Error {
	//role is mid-action, the radio is switching or the peer role holds the handshake
	Busy,
	NoChannels,
	Json(serde_json::Error),
	Zll(zigbee::zll::Error),
	Zdp(zigbee::zdp::Error),
}

impl core::fmt::Display for Error {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		match self {
			Self::Busy => write!(f, "Commissioning role busy"),
			Self::NoChannels => write!(f, "Empty channel mask"),
			Self::Json(e) => e.fmt(f),
			Self::Zll(e) => e.fmt(f),
			Self::Zdp(e) => e.fmt(f),
		}
	}
}

impl std::error::Error for Error {}

impl From<serde_json::Error> for Error {
	fn from(e: serde_json::Error) -> Self {
		Error::Json(e)
	}
}

impl From<zigbee::zll::Error> for Error {
	fn from(e: zigbee::zll::Error) -> Self {
		Error::Zll(e)
	}
}

impl From<zigbee::zdp::Error> for Error {
	fn from(e: zigbee::zdp::Error) -> Self {
		Error::Zdp(e)
	}
}
