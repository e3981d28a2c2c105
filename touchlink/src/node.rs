//sans-io driver owning both roles
//
//the host feeds inbound frames, collaborator completions and the clock, and
//drains the requests the roles emit; everything runs through one queue

use std::collections::VecDeque;
use rand::rngs::StdRng;
use rand::SeedableRng;
use zigbee::zdp::{ ZdoCommand, ZdoIeeeAddrRsp, ZdpFrame };
use zigbee::zll::{ DeviceInfoRecord, ZllFrame };
use crate::candidates::Candidate;
use crate::config::Config;
use crate::context::{ Context, Inbound };
use crate::error::Error;
use crate::initiator::{ self, Initiator, ScanOptions };
use crate::shared::Shared;
use crate::stack::{ Completed, Completion, Request, Stack };
use crate::target::{ self, Target, TargetType };
use crate::timers::{ Expired, Timers };
use crate::types::{ Role, Status };

pub(crate) enum Input {
	Frame(Inbound),
	Probe { source: u16, response: ZdoIeeeAddrRsp },
	Completed(Completion),
	Timer(Expired),
	Initiator(initiator::Event),
}

macro_rules! context {
	($node:ident) => {
		Context {
			stack: &mut $node.stack,
			config: &$node.config,
			shared: &mut $node.shared,
			timers: &mut $node.timers,
			requests: &mut $node.requests,
			queue: &mut $node.queue,
			rng: &mut $node.rng,
			sequence: &mut $node.sequence,
			now: $node.now
		}
	};
}

pub struct Node<S: Stack> {
	stack: S,
	config: Config,
	shared: Shared,
	timers: Timers,
	queue: VecDeque<Input>,
	requests: VecDeque<Request>,
	initiator: Initiator,
	target: Target,
	rng: StdRng,
	sequence: u8,
	now: u64
}

impl<S: Stack> Node<S> {
	pub fn new(stack: S, config: Config) -> Self {
		let rng = match config.rng_seed {
			Some(seed) => StdRng::seed_from_u64(seed),
			None => StdRng::from_entropy()
		};

		Node {
			stack,
			config,
			shared: Shared::default(),
			timers: Timers::default(),
			queue: VecDeque::new(),
			requests: VecDeque::new(),
			initiator: Initiator::default(),
			target: Target::default(),
			rng,
			sequence: 0,
			now: 0
		}
	}

	pub fn stack(&self) -> &S {
		&self.stack
	}

	pub fn stack_mut(&mut self) -> &mut S {
		&mut self.stack
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	pub fn initiator(&self) -> &Initiator {
		&self.initiator
	}

	pub fn target(&self) -> &Target {
		&self.target
	}

	pub fn now(&self) -> u64 {
		self.now
	}

	pub fn next_deadline(&self) -> Option<u64> {
		self.timers.next_deadline()
	}

	pub fn poll_request(&mut self) -> Option<Request> {
		self.requests.pop_front()
	}

	//fires every timer due up to `now`, in deadline order
	pub fn advance(&mut self, now: u64) {
		while let Some(expired) = self.timers.due(now) {
			if let Some(deadline) = self.timers.deadline_of(&expired) {
				self.now = self.now.max(deadline);
			}

			self.queue.push_back(Input::Timer(expired));
			self.run();
		}

		self.now = self.now.max(now);
	}

	//inter-pan payload of the commissioning cluster, starting at the zcl header
	pub fn receive(&mut self, source: u64, rssi: i8, payload: &[u8]) -> Result<(), Error> {
		let frame = match ZllFrame::from_buf(payload) {
			Ok(frame) => frame,
			Err(e) => {
				log::debug!("dropping inter-pan frame from {:#018x}: {}", source, e);
				return Err(e.into());
			}
		};

		if source == self.stack.ieee_address() {
			return Ok(());
		}

		self.queue.push_back(Input::Frame(Inbound { source, rssi, frame }));
		self.run();

		Ok(())
	}

	pub fn receive_zdp(&mut self, source: u16, cluster_id: u16, payload: &[u8]) -> Result<(), Error> {
		let frame = ZdpFrame::from_buf(payload, cluster_id)?;

		if let ZdoCommand::IeeeAddrRsp(response) = frame.command {
			self.queue.push_back(Input::Probe { source, response });
			self.run();
		}

		Ok(())
	}

	pub fn complete(&mut self, completion: Completion) {
		self.queue.push_back(Input::Completed(completion));
		self.run();
	}

	pub fn scan<F>(&mut self, options: ScanOptions, done: F) -> Result<(), Error>
	where
		F: FnOnce(Status, Vec<Candidate>) + 'static
	{
		let mut ctx = context!(self);
		let result = self.initiator.scan(options, Box::new(done), &mut ctx);

		self.run();
		result
	}

	pub fn stop_scan(&mut self) {
		let mut ctx = context!(self);

		self.initiator.stop_scan(&mut ctx);
		self.run();
	}

	pub fn identify_start<F>(&mut self, target: &Candidate, duration: u16, done: F) -> Result<(), Error>
	where
		F: FnOnce(Status) + 'static
	{
		let mut ctx = context!(self);
		let result = self.initiator.identify(target, duration, Box::new(done), &mut ctx);

		self.run();
		result
	}

	pub fn identify_stop<F>(&mut self, target: &Candidate, done: F) -> Result<(), Error>
	where
		F: FnOnce(Status) + 'static
	{
		self.identify_start(target, 0, done)
	}

	pub fn device_info<F>(&mut self, target: &Candidate, max_records: usize, done: F) -> Result<(), Error>
	where
		F: FnOnce(Status, Vec<DeviceInfoRecord>) + 'static
	{
		let mut ctx = context!(self);
		let result = self.initiator.device_info(target, max_records, Box::new(done), &mut ctx);

		self.run();
		result
	}

	pub fn join_device<F>(&mut self, target: &Candidate, skip_liveness: bool, done: F) -> Result<(), Error>
	where
		F: FnOnce(Status) + 'static
	{
		let mut ctx = context!(self);
		let result = self.initiator.join(target, skip_liveness, Box::new(done), &mut ctx);

		self.run();
		result
	}

	pub fn reset_to_factory_new<F>(&mut self, target: &Candidate, done: F) -> Result<(), Error>
	where
		F: FnOnce(Status) + 'static
	{
		let mut ctx = context!(self);
		let result = self.initiator.reset_to_factory_new(target, Box::new(done), &mut ctx);

		self.run();
		result
	}

	pub fn subscribe_initiator<F>(&mut self, subscriber: F)
	where
		F: FnMut(&initiator::Indication) + 'static
	{
		self.initiator.subscribe(Box::new(subscriber));
	}

	pub fn set_target_type<F>(&mut self, kind: TargetType, done: F) -> Result<(), Error>
	where
		F: FnOnce(Status) + 'static
	{
		let mut ctx = context!(self);
		let result = self.target.set_target_type(kind, Box::new(done), &mut ctx);

		self.run();
		result
	}

	pub fn set_touchlink_priority(&mut self, on: bool) {
		self.target.set_touchlink_priority(on);
	}

	pub fn allow_stealing(&mut self, on: bool) {
		self.target.allow_stealing(on);
	}

	pub fn subscribe_target<F>(&mut self, subscriber: F)
	where
		F: FnMut(&target::Indication) + 'static
	{
		self.target.subscribe(Box::new(subscriber));
	}

	fn run(&mut self) {
		self.shared.initiator_active = !self.initiator.is_idle();

		while let Some(input) = self.queue.pop_front() {
			self.process(input);
			self.shared.initiator_active = !self.initiator.is_idle();
		}
	}

	fn process(&mut self, input: Input) {
		match input {
			Input::Frame(inbound) => {
				let mut ctx = context!(self);

				if inbound.frame.command.direction() == zigbee::zll::DIRECTION_SERVER_TO_CLIENT {
					self.initiator.on_frame(inbound, &mut ctx);
				}
				else {
					self.target.on_frame(inbound, &mut ctx);
				}
			},
			Input::Probe { source, response } => {
				let mut ctx = context!(self);

				self.initiator.on_probe(source, response, &mut ctx);
			},
			Input::Completed(Completion { origin, result }) => {
				//the resource goes back before the owner reacts, it may need it again
				match result {
					Completed::InterPanSet | Completed::InterPanCleared => self.shared.radio.release(origin),
					Completed::KeyEncrypted { .. } | Completed::KeyDecrypted { .. } => self.shared.key_slot.release(origin),
					_ => ()
				}

				let mut ctx = context!(self);

				match origin {
					Role::Initiator => self.initiator.on_completed(result, &mut ctx),
					Role::Target => self.target.on_completed(result, &mut ctx)
				}
			},
			Input::Timer(expired) => {
				if !self.timers.fire(&expired) {
					log::trace!("stale {:?} timer dropped", expired.timer);
					return;
				}

				let mut ctx = context!(self);

				match expired.role {
					Role::Initiator => self.initiator.on_timeout(&mut ctx),
					Role::Target => self.target.on_timeout(&mut ctx)
				}
			},
			Input::Initiator(event) => {
				let mut ctx = context!(self);

				self.initiator.on_event(event, &mut ctx);
			},
		}
	}
}
