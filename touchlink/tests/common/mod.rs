//in-memory collaborators and a simulated inter-pan air link between nodes

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;
use touchlink::types::{ Allocation, AllocError, ChannelMask, NetworkKey, NetworkParams, Range };
use touchlink::{ Completed, Completion, Config, Destination, Node, Operation, Stack };
use zigbee::zdp::{ ZdoCommand, ZdoIeeeAddrRsp, ZdpFrame, IEEE_ADDR_RSP, ZDP_SUCCESS };
use zigbee::zll::{ self, Command, EndpointInfo };

pub const FREE_PAN_ID: u16 = 0x1234;
pub const FREE_EXTENDED_PAN_ID: u64 = 0x0012_4b00_0102_0304;
pub const FRESH_KEY: NetworkKey = [0x42; 16];

pub struct MockStack {
	pub ieee: u64,
	pub factory_new: bool,
	pub logical_type: u8,
	pub primary: ChannelMask,
	pub secondary: ChannelMask,
	pub network: Option<NetworkParams>,
	pub key: Option<NetworkKey>,
	pub endpoints: Vec<EndpointInfo>,
	pub group_id_count: u8,
	pub key_bitmask: u16,
	pub next_id: u32,
	pub next_address: u16,
	pub fail_allocation: bool,
	pub assigned: Vec<(Range, Range)>
}

impl MockStack {
	pub fn router(ieee: u64) -> Self {
		MockStack {
			ieee,
			factory_new: true,
			logical_type: zll::LOGICAL_TYPE_ROUTER,
			primary: ChannelMask::single(11),
			secondary: ChannelMask(0),
			network: None,
			key: None,
			endpoints: vec![endpoint(1)],
			group_id_count: 0,
			key_bitmask: 0x0010,
			next_id: (ieee as u32) << 8,
			next_address: 0x0002,
			fail_allocation: false,
			assigned: Vec::new()
		}
	}

	pub fn end_device(ieee: u64) -> Self {
		MockStack {
			logical_type: zll::LOGICAL_TYPE_END_DEVICE,
			..MockStack::router(ieee)
		}
	}

	pub fn on_network(mut self, network: NetworkParams) -> Self {
		self.factory_new = false;
		self.network = Some(network);
		self.key = Some([0x11; 16]);
		self
	}
}

pub fn endpoint(endpoint: u8) -> EndpointInfo {
	EndpointInfo {
		endpoint,
		profile_id: zll::ZLL_PROFILE_ID,
		device_id: 0x0100,
		version: 2,
		group_id_count: 0
	}
}

pub fn network(extended_pan_id: u64, channel: u8, network_address: u16) -> NetworkParams {
	NetworkParams {
		extended_pan_id,
		channel,
		pan_id: 0x4d2e,
		network_address,
		update_id: 3
	}
}

impl Stack for MockStack {
	fn ieee_address(&self) -> u64 { self.ieee }
	fn is_factory_new(&self) -> bool { self.factory_new }
	fn logical_type(&self) -> u8 { self.logical_type }
	fn rx_on_when_idle(&self) -> bool { self.logical_type != zll::LOGICAL_TYPE_END_DEVICE }
	fn primary_channels(&self) -> ChannelMask { self.primary }
	fn secondary_channels(&self) -> ChannelMask { self.secondary }
	fn network(&self) -> Option<NetworkParams> { self.network }
	fn network_key(&self) -> Option<NetworkKey> { self.key }
	fn endpoints(&self) -> Vec<EndpointInfo> { self.endpoints.clone() }
	fn group_id_count(&self) -> u8 { self.group_id_count }
	fn key_bitmask(&self) -> u16 { self.key_bitmask }
	fn generate_key(&mut self) -> NetworkKey { FRESH_KEY }

	fn new_transaction_id(&mut self) -> u32 {
		self.next_id += 1;
		self.next_id
	}

	fn new_response_id(&mut self) -> u32 {
		self.next_id += 1;
		self.next_id
	}

	fn allocate_self(&mut self, group_count: u8) -> Result<Allocation, AllocError> {
		if self.fail_allocation {
			return Err(AllocError::IllegalParameters);
		}

		Ok(Allocation {
			network_address: 0x0001,
			groups: if group_count > 0 { Range { begin: 0x0001, end: group_count as u16 } } else { Range::EMPTY },
			..Default::default()
		})
	}

	fn allocate_for_peer(&mut self, group_count: u8, delegate_range: bool) -> Result<Allocation, AllocError> {
		if self.fail_allocation {
			return Err(AllocError::IllegalParameters);
		}

		let network_address = self.next_address;

		self.next_address += 1;

		Ok(Allocation {
			network_address,
			groups: if group_count > 0 { Range { begin: 0x0010, end: 0x0010 + group_count as u16 - 1 } } else { Range::EMPTY },
			free_addresses: if delegate_range { Range { begin: 0x0100, end: 0x01ff } } else { Range::EMPTY },
			free_groups: if delegate_range { Range { begin: 0x0100, end: 0x01ff } } else { Range::EMPTY },
			random: false
		})
	}

	fn assign_free_ranges(&mut self, free_addresses: Range, free_groups: Range) {
		self.assigned.push((free_addresses, free_groups));
	}
}

pub fn config() -> Config {
	Config {
		rng_seed: Some(7),
		..Default::default()
	}
}

fn wrap(key: NetworkKey) -> NetworkKey {
	key.map(|b| b ^ 0x5a)
}

//collects done callback results
pub struct Outcomes<T>(Rc<RefCell<Vec<T>>>);

impl<T> Clone for Outcomes<T> {
	fn clone(&self) -> Self {
		Outcomes(self.0.clone())
	}
}

impl<T: Clone + 'static> Outcomes<T> {
	pub fn new() -> Self {
		Outcomes(Rc::new(RefCell::new(Vec::new())))
	}

	pub fn push(&self, value: T) {
		self.0.borrow_mut().push(value);
	}

	pub fn all(&self) -> Vec<T> {
		self.0.borrow().clone()
	}

	pub fn len(&self) -> usize {
		self.0.borrow().len()
	}

	pub fn single(&self) -> T {
		let all = self.all();

		assert_eq!(all.len(), 1, "expected exactly one outcome");
		all[0].clone()
	}
}

pub struct Air {
	pub nodes: Vec<Node<MockStack>>,
	pub channels: Vec<Option<u8>>,
	pub log: Vec<(usize, Operation)>,
	pub rssi: i8,
	pub answer_probes: bool,
	//keep inter-pan switches pending until `release_held`
	pub hold_radio: bool,
	held: Vec<(usize, Completion)>,
	pub now: u64
}

impl Air {
	pub fn new(stacks: Vec<MockStack>) -> Self {
		let nodes: Vec<Node<MockStack>> = stacks.into_iter().map(|s| Node::new(s, config())).collect();
		let channels = vec![None; nodes.len()];

		Air {
			nodes,
			channels,
			log: Vec::new(),
			rssi: -40,
			answer_probes: true,
			hold_radio: false,
			held: Vec::new(),
			now: 0
		}
	}

	pub fn pump(&mut self) {
		loop {
			let mut progressed = false;

			for i in 0..self.nodes.len() {
				while let Some(request) = self.nodes[i].poll_request() {
					progressed = true;
					self.log.push((i, request.operation.clone()));
					self.serve(i, request.origin, request.operation);
				}
			}

			if !progressed {
				break;
			}
		}
	}

	pub fn release_held(&mut self) {
		for (i, completion) in core::mem::take(&mut self.held) {
			self.nodes[i].complete(completion);
		}

		self.pump();
	}

	pub fn run_until(&mut self, to: u64) {
		self.pump();

		loop {
			let next = self.nodes.iter().filter_map(|n| n.next_deadline()).min();

			match next {
				Some(deadline) if deadline <= to => {
					for n in self.nodes.iter_mut() {
						n.advance(deadline);
					}

					self.now = deadline;
					self.pump();
				},
				_ => break
			}
		}

		for n in self.nodes.iter_mut() {
			n.advance(to);
		}

		self.now = to;
		self.pump();
	}

	pub fn run_for(&mut self, ms: u64) {
		self.run_until(self.now + ms);
	}

	//inter-pan commands node `i` put on the air
	pub fn sent(&self, i: usize) -> Vec<Command> {
		self.log.iter()
			.filter(|(n, _)| *n == i)
			.filter_map(|(_, op)| match op {
				Operation::SendInterPan { frame, .. } => Some(frame.command.clone()),
				_ => None
			})
			.collect()
	}

	pub fn count(&self, i: usize, matches: impl Fn(&Operation) -> bool) -> usize {
		self.log.iter().filter(|(n, op)| *n == i && matches(op)).count()
	}

	fn finish(&mut self, i: usize, completion: Completion) {
		self.nodes[i].complete(completion);
	}

	fn serve(&mut self, i: usize, origin: touchlink::Role, operation: Operation) {
		match operation {
			Operation::SetInterPan { channel } => {
				self.channels[i] = Some(channel);

				let completion = Completion::new(origin, Completed::InterPanSet);

				if self.hold_radio {
					self.held.push((i, completion));
				}
				else {
					self.finish(i, completion);
				}
			},
			Operation::ClearInterPan => {
				self.channels[i] = None;

				let completion = Completion::new(origin, Completed::InterPanCleared);

				if self.hold_radio {
					self.held.push((i, completion));
				}
				else {
					self.finish(i, completion);
				}
			},
			Operation::EncryptKey { key, .. } => {
				self.finish(i, Completion::new(origin, Completed::KeyEncrypted { encrypted: wrap(key) }));
			},
			Operation::DecryptKey { encrypted, .. } => {
				self.finish(i, Completion::new(origin, Completed::KeyDecrypted { key: wrap(encrypted) }));
			},
			Operation::FindFreePan => {
				self.finish(i, Completion::new(origin, Completed::FreePan { pan_id: FREE_PAN_ID, extended_pan_id: FREE_EXTENDED_PAN_ID }));
			},
			Operation::JoinNetwork(params) => {
				let stack = self.nodes[i].stack_mut();

				stack.network = Some(params.network);
				stack.key = Some(params.key);
				stack.factory_new = false;

				self.finish(i, Completion::new(origin, Completed::NetworkJoined { success: true }));
			},
			Operation::UpdateNetwork { channel, update_id } => {
				let stack = self.nodes[i].stack_mut();

				if let Some(n) = stack.network.as_mut() {
					n.channel = channel;
					n.update_id = update_id;
				}

				self.finish(i, Completion::new(origin, Completed::NetworkUpdated { success: true }));
			},
			Operation::SendInterPan { destination, frame, .. } => {
				let channel = match self.channels[i] {
					Some(c) => c,
					None => return
				};

				let bytes = frame.to_bytes().unwrap();
				let source = self.nodes[i].stack().ieee;

				for j in 0..self.nodes.len() {
					if j == i || self.channels[j] != Some(channel) {
						continue;
					}

					let addressed = match destination {
						Destination::Broadcast => true,
						Destination::Ieee(ieee) => ieee == self.nodes[j].stack().ieee
					};

					if addressed {
						let rssi = self.rssi;

						self.nodes[j].receive(source, rssi, &bytes).unwrap();
					}
				}
			},
			Operation::SendIeeeAddrRequest { network_address, sequence_number } => {
				if !self.answer_probes {
					return;
				}

				let peer = self.nodes.iter()
					.map(|n| n.stack())
					.find(|s| s.network.map(|n| n.network_address) == Some(network_address))
					.map(|s| s.ieee);

				if let Some(ieee) = peer {
					let response = ZdpFrame::from_command(ZdoCommand::IeeeAddrRsp(ZdoIeeeAddrRsp {
						status: ZDP_SUCCESS,
						ieee_addr_remote_dev: ieee,
						nwk_addr_remote_dev: network_address,
						rest: vec![]
					}), sequence_number);

					let bytes = response.to_bytes().unwrap();

					self.nodes[i].receive_zdp(network_address, IEEE_ADDR_RSP, &bytes).unwrap();
				}
			},
			Operation::Reconnect | Operation::ResetToFactoryNew => ()
		}
	}
}
