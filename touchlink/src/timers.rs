use crate::types::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerId {
	//scan window, response, update window, startup delay, liveness interval
	Initiator,
	//scan response jitter
	Jitter
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expired {
	pub role: Role,
	pub timer: TimerId,
	pub generation: u32
}

#[derive(Debug)]
struct Entry {
	role: Role,
	timer: TimerId,
	deadline: u64,
	generation: u32
}

//one-shot millisecond timers on the node's clock
//
//re-arming or cancelling bumps the generation, so an expiry that was already
//queued for an older generation can be recognised and dropped
#[derive(Debug, Default)]
pub struct Timers {
	armed: Vec<Entry>,
	generation: u32
}

impl Timers {
	pub fn arm(&mut self, role: Role, timer: TimerId, now: u64, after_ms: u64) {
		self.cancel(role, timer);
		self.generation = self.generation.wrapping_add(1);

		self.armed.push(Entry {
			role,
			timer,
			deadline: now.saturating_add(after_ms),
			generation: self.generation
		});
	}

	pub fn cancel(&mut self, role: Role, timer: TimerId) {
		self.armed.retain(|e| !(e.role == role && e.timer == timer));
	}

	pub fn is_armed(&self, role: Role, timer: TimerId) -> bool {
		self.armed.iter().any(|e| e.role == role && e.timer == timer)
	}

	pub fn next_deadline(&self) -> Option<u64> {
		self.armed.iter().map(|e| e.deadline).min()
	}

	//earliest timer due at `now`; it stays armed until consumed by `fire`
	pub fn due(&self, now: u64) -> Option<Expired> {
		self.armed.iter()
			.filter(|e| e.deadline <= now)
			.min_by_key(|e| (e.deadline, e.generation))
			.map(|e| Expired { role: e.role, timer: e.timer, generation: e.generation })
	}

	pub fn deadline_of(&self, expired: &Expired) -> Option<u64> {
		self.armed.iter()
			.find(|e| e.role == expired.role && e.timer == expired.timer && e.generation == expired.generation)
			.map(|e| e.deadline)
	}

	//consume the expiry; false when it was cancelled or re-armed meanwhile
	pub fn fire(&mut self, expired: &Expired) -> bool {
		let before = self.armed.len();

		self.armed.retain(|e| !(e.role == expired.role && e.timer == expired.timer && e.generation == expired.generation));

		self.armed.len() != before
	}
}
