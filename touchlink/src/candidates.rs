use serde::Serialize;
use zigbee::zll::{ EndpointInfo, ScanResponse, ZigbeeInfo, ZllInfo };

pub const MAX_CANDIDATES: usize = 8;

//initiator side cap on the target supplied rssi correction
pub const MAX_RSSI_CORRECTION: u8 = 0x20;
//added to the rank of targets asking for touchlink priority
pub const PRIORITY_BONUS: i16 = 0x20;

//a target that answered the current scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
	pub ieee_address: u64,
	pub zigbee_info: ZigbeeInfo,
	pub zll_info: ZllInfo,
	pub rssi: i8,
	pub rssi_correction: u8,
	pub channel: u8,
	pub pan_id: u16,
	pub extended_pan_id: u64,
	pub network_address: u16,
	pub network_update_id: u8,
	pub key_bitmask: u16,
	pub response_id: u32,
	pub transaction_id: u32,
	pub sub_devices: u8,
	pub group_id_count: u8,
	pub endpoint: Option<EndpointInfo>,
}

impl Candidate {
	pub fn from_scan_response(ieee_address: u64, rssi: i8, r: &ScanResponse) -> Self {
		Candidate {
			ieee_address,
			zigbee_info: r.zigbee_info,
			zll_info: r.zll_info,
			rssi,
			rssi_correction: r.rssi_correction,
			channel: r.logical_channel,
			pan_id: r.pan_id,
			extended_pan_id: r.extended_pan_id,
			network_address: r.network_address,
			network_update_id: r.network_update_id,
			key_bitmask: r.key_bitmask,
			response_id: r.response_id,
			transaction_id: r.transaction_id,
			sub_devices: r.number_of_sub_devices,
			group_id_count: r.total_group_ids,
			endpoint: r.endpoint_info
		}
	}

	pub fn corrected_rssi(&self) -> i16 {
		corrected_rssi(self.rssi, self.rssi_correction)
	}

	pub fn rank(&self) -> i16 {
		let bonus = if self.zll_info.priority_request { PRIORITY_BONUS } else { 0 };

		self.corrected_rssi() + bonus
	}
}

pub fn corrected_rssi(rssi: i8, correction: u8) -> i16 {
	rssi as i16 + correction.min(MAX_RSSI_CORRECTION) as i16
}

//candidates ordered by descending rank, lowest dropped when full
#[derive(Debug, Clone)]
pub struct CandidateList<const N: usize = MAX_CANDIDATES> {
	items: [Option<Candidate>; N]
}

impl<const N: usize> Default for CandidateList<N> {
	fn default() -> Self {
		CandidateList {
			items: core::array::from_fn(|_| None)
		}
	}
}

impl<const N: usize> CandidateList<N> {
	pub fn len(&self) -> usize {
		self.items.iter().take_while(|c| c.is_some()).count()
	}

	pub fn is_empty(&self) -> bool {
		self.items[0].is_none()
	}

	pub fn clear(&mut self) {
		for item in self.items.iter_mut() {
			*item = None;
		}
	}

	pub fn iter(&self) -> impl Iterator<Item = &Candidate> {
		self.items.iter().map_while(|c| c.as_ref())
	}

	pub fn best(&self) -> Option<&Candidate> {
		self.items[0].as_ref()
	}

	pub fn to_vec(&self) -> Vec<Candidate> {
		self.iter().cloned().collect()
	}

	//false when the candidate ranks too low to be kept
	pub fn insert(&mut self, candidate: Candidate) -> bool {
		//a repeated answer from the same target replaces the earlier one
		if let Some(i) = self.items.iter().position(|c| matches!(c, Some(c) if c.ieee_address == candidate.ieee_address)) {
			self.items[i] = None;
			self.items[i..].rotate_left(1);
		}

		let rank = candidate.rank();

		let pos = match self.items.iter().position(|c| match c {
			None => true,
			Some(c) => c.rank() < rank
		}) {
			Some(pos) => pos,
			None => {
				log::debug!("candidate {:#018x} (rank {}) dropped, list full", candidate.ieee_address, rank);
				return false;
			}
		};

		if let Some(last) = &self.items[N - 1] {
			log::debug!("candidate {:#018x} (rank {}) evicted", last.ieee_address, last.rank());
		}

		self.items[pos..].rotate_right(1);
		self.items[pos] = Some(candidate);

		true
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn candidate(ieee_address: u64, rssi: i8, correction: u8, priority: bool) -> Candidate {
		Candidate {
			ieee_address,
			zigbee_info: ZigbeeInfo::default(),
			zll_info: ZllInfo { priority_request: priority, ..Default::default() },
			rssi,
			rssi_correction: correction,
			channel: 11,
			pan_id: 0,
			extended_pan_id: 0,
			network_address: 0xffff,
			network_update_id: 0,
			key_bitmask: 0x10,
			response_id: 0,
			transaction_id: 0,
			sub_devices: 1,
			group_id_count: 0,
			endpoint: None
		}
	}

	fn is_sorted<const N: usize>(l: &CandidateList<N>) -> bool {
		let ranks: Vec<i16> = l.iter().map(|c| c.rank()).collect();

		ranks.windows(2).all(|w| w[0] >= w[1])
	}

	#[test]
	fn correction_is_clipped() {
		assert_eq!(candidate(1, -60, 0x10, false).rank(), -44);
		assert_eq!(candidate(1, -60, 0x50, false).rank(), -60 + 0x20);
	}

	#[test]
	fn priority_bonus() {
		let mut l = CandidateList::<4>::default();

		l.insert(candidate(1, -40, 0, false));
		l.insert(candidate(2, -50, 0, true));

		assert_eq!(l.best().unwrap().ieee_address, 2);
	}

	#[test]
	fn stays_sorted() {
		let mut l = CandidateList::<8>::default();
		let rssi = [-50, -80, -20, -65, -20, -90, -33, -71, -12, -55];

		for (i, r) in rssi.iter().enumerate() {
			l.insert(candidate(i as u64 + 1, *r, (i % 3) as u8 * 8, i % 4 == 0));

			assert!(is_sorted(&l));
		}

		assert_eq!(l.len(), 8);
	}

	#[test]
	fn full_list_keeps_the_best() {
		let mut l = CandidateList::<3>::default();

		l.insert(candidate(1, -10, 0, false));
		l.insert(candidate(2, -20, 0, false));
		l.insert(candidate(3, -30, 0, false));

		assert!(l.insert(candidate(4, -15, 0, false)));
		assert_eq!(l.len(), 3);
		assert_eq!(l.iter().map(|c| c.ieee_address).collect::<Vec<_>>(), vec![1, 4, 2]);

		assert!(!l.insert(candidate(5, -90, 0, false)));
		assert_eq!(l.len(), 3);
		assert_eq!(l.best().unwrap().ieee_address, 1);
	}

	#[test]
	fn equal_rank_keeps_the_older() {
		let mut l = CandidateList::<2>::default();

		l.insert(candidate(1, -30, 0, false));
		l.insert(candidate(2, -30, 0, false));

		assert!(!l.insert(candidate(3, -30, 0, false)));
		assert_eq!(l.iter().map(|c| c.ieee_address).collect::<Vec<_>>(), vec![1, 2]);
	}

	#[test]
	fn repeated_target_is_replaced() {
		let mut l = CandidateList::<4>::default();

		l.insert(candidate(1, -30, 0, false));
		l.insert(candidate(2, -40, 0, false));
		l.insert(candidate(1, -50, 0, false));

		assert_eq!(l.len(), 2);
		assert_eq!(l.iter().map(|c| c.ieee_address).collect::<Vec<_>>(), vec![2, 1]);
	}

	#[test]
	fn clear() {
		let mut l = CandidateList::<2>::default();

		l.insert(candidate(1, -30, 0, false));
		l.clear();

		assert!(l.is_empty());
		assert_eq!(l.to_vec(), vec![]);
	}
}
