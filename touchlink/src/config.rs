use serde::{ Serialize, Deserialize };
use crate::error::Error;

//timing values follow the touchlink constants (aplc* / scan time base)

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
	//scan responses / requests below this corrected rssi are ignored
	pub rssi_threshold: i8,
	//vendor correction advertised by the target in its scan responses
	pub rssi_correction: u8,
	pub scan_window_ms: u64,
	//scan requests sent on the first primary channel
	pub first_channel_scans: u8,
	pub response_timeout_ms: u64,
	pub update_timeout_ms: u64,
	pub min_startup_delay_ms: u64,
	pub liveness_attempts: u8,
	pub liveness_interval_ms: u64,
	pub jitter_max_ms: u64,
	pub transaction_lifetime_ms: u64,
	pub scan_response_tx_power: i8,
	pub address_assignment_capable: bool,
	pub initiator_capable: bool,
	pub rng_seed: Option<u64>,
}

impl Default for Config {
	fn default() -> Self {
		Config {
			rssi_threshold: -70,
			rssi_correction: 0,
			scan_window_ms: 250,
			first_channel_scans: 5,
			response_timeout_ms: 5000,
			update_timeout_ms: 100,
			min_startup_delay_ms: 2000,
			liveness_attempts: 6,
			liveness_interval_ms: 500,
			jitter_max_ms: 100,
			transaction_lifetime_ms: 8000,
			scan_response_tx_power: 0,
			address_assignment_capable: true,
			initiator_capable: true,
			rng_seed: None,
		}
	}
}

impl Config {
	pub fn from_json(s: &str) -> Result<Self, Error> {
		Ok(serde_json::from_str::<Self>(s)?)
	}

	pub fn from_value(value: serde_json::Value) -> Result<Self, Error> {
		Ok(serde_json::from_value::<Self>(value)?)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn partial_json_keeps_defaults() {
		let c = Config::from_json(r#"{ "rssi_threshold": -50, "rng_seed": 7 }"#).unwrap();

		assert_eq!(c.rssi_threshold, -50);
		assert_eq!(c.rng_seed, Some(7));
		assert_eq!(c.response_timeout_ms, 5000);
		assert_eq!(c.liveness_attempts, 6);
	}

	#[test]
	fn from_value() {
		let c = Config::from_value(serde_json::json!({ "first_channel_scans": 1, "jitter_max_ms": 0 })).unwrap();

		assert_eq!(c.first_channel_scans, 1);
		assert_eq!(c.jitter_max_ms, 0);
	}

	#[test]
	fn bad_type() {
		assert!(matches!(Config::from_json(r#"{ "rssi_threshold": "loud" }"#), Err(Error::Json(_))));
	}
}
