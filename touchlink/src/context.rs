//what a role sees of its node while handling one event

use std::collections::VecDeque;
use rand::rngs::StdRng;
use zigbee::zll::{ Command, ZllFrame };
use crate::config::Config;
use crate::node::Input;
use crate::shared::Shared;
use crate::stack::{ Destination, Operation, Request, Stack };
use crate::timers::{ TimerId, Timers };
use crate::types::Role;

//a decoded inter-pan frame with its link metadata
#[derive(Debug, Clone, PartialEq)]
pub struct Inbound {
	pub source: u64,
	pub rssi: i8,
	pub frame: ZllFrame
}

pub(crate) struct Context<'a> {
	pub stack: &'a mut dyn Stack,
	pub config: &'a Config,
	pub shared: &'a mut Shared,
	pub timers: &'a mut Timers,
	pub requests: &'a mut VecDeque<Request>,
	pub queue: &'a mut VecDeque<Input>,
	pub rng: &'a mut StdRng,
	pub sequence: &'a mut u8,
	pub now: u64
}

impl Context<'_> {
	pub fn request(&mut self, origin: Role, operation: Operation) {
		log::trace!("{:?} requests {:?}", origin, operation);

		self.requests.push_back(Request { origin, operation });
	}

	pub fn send(&mut self, origin: Role, destination: Destination, command: Command, tx_power: Option<i8>) {
		*self.sequence = self.sequence.wrapping_add(1);

		let frame = ZllFrame::from_command(command, *self.sequence);

		self.request(origin, Operation::SendInterPan { destination, frame, tx_power });
	}

	//internal event, handled after the current one
	pub fn raise(&mut self, input: Input) {
		self.queue.push_back(input);
	}

	pub fn arm(&mut self, role: Role, timer: TimerId, after_ms: u64) {
		self.timers.arm(role, timer, self.now, after_ms);
	}

	pub fn cancel(&mut self, role: Role, timer: TimerId) {
		self.timers.cancel(role, timer);
	}

	pub fn enter_inter_pan(&mut self, role: Role, channel: u8) {
		self.shared.radio.acquire(role);
		self.request(role, Operation::SetInterPan { channel });
	}

	//the initiator hands the radio back to a listening target instead of dropping inter-pan
	pub fn leave_inter_pan(&mut self, role: Role) {
		self.shared.radio.acquire(role);

		match self.shared.target_listen_channel {
			Some(channel) if role == Role::Initiator => self.request(role, Operation::SetInterPan { channel }),
			_ => self.request(role, Operation::ClearInterPan)
		}
	}
}
