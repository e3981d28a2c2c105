//resources both roles compete for, owned by the node
//
//taking a resource that is already held is a programming error: public
//operations check availability first and refuse with Error::Busy

use crate::types::Role;

//one encrypt/decrypt request may be in flight at a time
#[derive(Debug, Default)]
pub struct KeySlot {
	owner: Option<Role>
}

impl KeySlot {
	pub fn is_busy(&self) -> bool {
		self.owner.is_some()
	}

	pub fn acquire(&mut self, role: Role) {
		if let Some(owner) = self.owner {
			panic!("key slot acquired by {:?} while held by {:?}", role, owner);
		}

		self.owner = Some(role);
	}

	//called when the encrypt/decrypt completion for the slot arrives
	pub fn release(&mut self, role: Role) {
		match self.owner {
			Some(owner) if owner == role => self.owner = None,
			owner => panic!("key slot released by {:?} while held by {:?}", role, owner)
		}
	}
}

//a set/clear inter-pan request is in flight
#[derive(Debug, Default)]
pub struct RadioLock {
	owner: Option<Role>
}

impl RadioLock {
	pub fn is_busy(&self) -> bool {
		self.owner.is_some()
	}

	pub fn acquire(&mut self, role: Role) {
		if let Some(owner) = self.owner {
			panic!("radio acquired by {:?} while switching for {:?}", role, owner);
		}

		self.owner = Some(role);
	}

	pub fn release(&mut self, role: Role) {
		match self.owner {
			Some(owner) if owner == role => self.owner = None,
			owner => panic!("radio released by {:?} while held by {:?}", role, owner)
		}
	}
}

#[derive(Debug, Default)]
pub struct Shared {
	pub key_slot: KeySlot,
	pub radio: RadioLock,
	//role negotiating a start/join; the other role stays out of its handshake
	pub handshake: Option<Role>,
	//inter-pan channel the enabled target listens on, restored after initiator actions
	pub target_listen_channel: Option<u8>,
	//initiator is outside idle; the target then stays out of handshakes
	pub initiator_active: bool
}

impl Shared {
	pub fn begin_handshake(&mut self, role: Role) {
		if let Some(owner) = self.handshake {
			panic!("handshake started by {:?} while {:?} is negotiating", role, owner);
		}

		self.handshake = Some(role);
	}

	pub fn end_handshake(&mut self, role: Role) {
		if self.handshake == Some(role) {
			self.handshake = None;
		}
	}

	pub fn handshake_blocks(&self, role: Role) -> bool {
		matches!(self.handshake, Some(owner) if owner != role)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn key_slot_round() {
		let mut slot = KeySlot::default();

		slot.acquire(Role::Initiator);
		assert!(slot.is_busy());
		slot.release(Role::Initiator);
		assert!(!slot.is_busy());
	}

	#[test]
	#[should_panic(expected = "key slot acquired")]
	fn key_slot_double_acquire() {
		let mut slot = KeySlot::default();

		slot.acquire(Role::Initiator);
		slot.acquire(Role::Target);
	}

	#[test]
	#[should_panic(expected = "key slot released")]
	fn key_slot_release_by_stranger() {
		let mut slot = KeySlot::default();

		slot.acquire(Role::Target);
		slot.release(Role::Initiator);
	}

	#[test]
	#[should_panic(expected = "radio acquired")]
	fn radio_double_acquire() {
		let mut radio = RadioLock::default();

		radio.acquire(Role::Target);
		radio.acquire(Role::Target);
	}

	#[test]
	fn handshake_ownership() {
		let mut shared = Shared::default();

		shared.begin_handshake(Role::Target);
		assert!(shared.handshake_blocks(Role::Initiator));
		assert!(!shared.handshake_blocks(Role::Target));

		shared.end_handshake(Role::Initiator);
		assert_eq!(shared.handshake, Some(Role::Target));

		shared.end_handshake(Role::Target);
		assert!(!shared.handshake_blocks(Role::Initiator));
	}
}
