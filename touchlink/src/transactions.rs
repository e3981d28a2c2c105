use zigbee::zll::{ ZigbeeInfo, ZllInfo };

pub const MAX_TRANSACTIONS: usize = 4;

//a scan request the target has answered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transaction {
	pub transaction_id: u32,
	pub response_id: u32,
	pub initiator: u64,
	pub zll_info: ZllInfo,
	pub zigbee_info: ZigbeeInfo,
	pub created_at: u64,
	pub expires_at: u64
}

#[derive(Debug)]
pub struct TransactionTable<const N: usize = MAX_TRANSACTIONS> {
	entries: [Option<Transaction>; N]
}

impl<const N: usize> Default for TransactionTable<N> {
	fn default() -> Self {
		TransactionTable {
			entries: [None; N]
		}
	}
}

impl<const N: usize> TransactionTable<N> {
	pub fn expire(&mut self, now: u64) {
		for entry in self.entries.iter_mut() {
			if matches!(entry, Some(t) if t.expires_at <= now) {
				if let Some(t) = entry.take() {
					log::debug!("transaction {:#010x} expired", t.transaction_id);
				}
			}
		}
	}

	pub fn find(&self, transaction_id: u32, now: u64) -> Option<&Transaction> {
		self.entries.iter()
			.flatten()
			.find(|t| t.transaction_id == transaction_id && t.expires_at > now)
	}

	pub fn contains(&self, transaction_id: u32, now: u64) -> bool {
		self.find(transaction_id, now).is_some()
	}

	pub fn len(&self) -> usize {
		self.entries.iter().flatten().count()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn clear(&mut self) {
		self.entries = [None; N];
	}

	//returns the entry that had to be evicted to make room
	pub fn insert(&mut self, transaction: Transaction) -> Option<Transaction> {
		if let Some(slot) = self.entries.iter_mut().find(|e| matches!(e, Some(t) if t.transaction_id == transaction.transaction_id)) {
			*slot = Some(transaction);

			return None;
		}

		if let Some(slot) = self.entries.iter_mut().find(|e| e.is_none()) {
			*slot = Some(transaction);

			return None;
		}

		let oldest = self.entries.iter_mut()
			.min_by_key(|e| e.as_ref().map_or(0, |t| t.created_at))?;

		let evicted = oldest.replace(transaction);

		if let Some(e) = &evicted {
			log::warn!("transaction table full, evicted {:#010x}", e.transaction_id);
		}

		evicted
	}
}
