//target role: answer scans, serve identify / device info / reset, accept start, join and update

use rand::Rng;
use serde::Deserialize;
use zigbee::zll::{
	self, Command, DeviceInfoRecord, DeviceInfoResponse, NetworkJoinResponse, NetworkStartResponse,
	ScanResponse, ZigbeeInfo, ZllInfo, MAX_DEVICE_INFO_RECORDS
};
use crate::context::{ Context, Inbound };
use crate::error::Error;
use crate::fsm::{ row, Executor, Hooks, Machine, Next, On, Source, Table, Transition };
use crate::stack::{ Completed, Destination, JoinParams, Operation };
use crate::timers::TimerId;
use crate::transactions::{ Transaction, TransactionTable };
use crate::types::{ NetworkKey, NetworkParams, Range, Role, Status, FIRST_CHANNEL, UNASSIGNED_NETWORK_ADDRESS };
use crate::validate;

const ROLE: Role = Role::Target;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
	Disabled,
	EnableRadio,
	Enabled,
	DisableRadio,
	StartFreePan,
	StartDecrypt,
	JoinDecrypt,
	LeaveInterPan,
	JoinNetwork,
	UpdateNetwork,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
	Enable,
	Disable,
	RadioDone,
	Timeout,
	ScanRequest,
	DeviceInfoRequest,
	IdentifyRequest,
	ResetRequest,
	StartRequest,
	JoinRequest,
	UpdateRequest,
	FreePan,
	KeyDecrypted,
	//arg1: 1 on success
	NetworkJoined,
	NetworkUpdated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Condition {
	AcceptScan,
	Known,
	ResetAllowed,
	StartNeedsPan,
	StartAcceptable,
	JoinIsUpdate,
	JoinAcceptable,
	UpdateAcceptable,
	IsUpdate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
	EnterListenChannel,
	Listening,
	LeaveListenChannel,
	Silent,
	StartJitter,
	SendScanResponse,
	SendDeviceInfo,
	Identify,
	Reset,
	FindPan,
	DecryptStart,
	DecryptJoin,
	RejectStart,
	RejectJoin,
	AcceptUpdateAlias,
	AcceptUpdate,
	Accept,
	ApplyUpdate,
	JoinLocally,
	Joined,
	Updated,
	Quiet,
}

use Action as A;
use Condition as C;
use Event as E;
use State as S;

const fn on(from: S, event: E, when: Option<C>, action: Option<A>, to: Next<S>) -> Transition<S, E, C, A> {
	row(Source::State(from), On::Event(event), when, action, to)
}

const fn go(to: S) -> Next<S> {
	Next::State(to)
}

const SAME: Next<S> = Next::Same;

static TABLE: Table<S, E, C, A> = Table {
	transitions: &[
		on(S::Disabled, E::Enable, None, Some(A::EnterListenChannel), go(S::EnableRadio)),
		on(S::EnableRadio, E::RadioDone, None, Some(A::Listening), go(S::Enabled)),
		on(S::Enabled, E::Disable, None, Some(A::LeaveListenChannel), go(S::DisableRadio)),
		on(S::DisableRadio, E::RadioDone, None, Some(A::Silent), go(S::Disabled)),

		on(S::Enabled, E::ScanRequest, Some(C::AcceptScan), Some(A::StartJitter), SAME),
		on(S::Enabled, E::Timeout, None, Some(A::SendScanResponse), SAME),
		on(S::Enabled, E::DeviceInfoRequest, Some(C::Known), Some(A::SendDeviceInfo), SAME),
		on(S::Enabled, E::IdentifyRequest, Some(C::Known), Some(A::Identify), SAME),
		on(S::Enabled, E::ResetRequest, Some(C::ResetAllowed), Some(A::Reset), SAME),

		on(S::Enabled, E::StartRequest, Some(C::StartNeedsPan), Some(A::FindPan), go(S::StartFreePan)),
		on(S::Enabled, E::StartRequest, Some(C::StartAcceptable), Some(A::DecryptStart), go(S::StartDecrypt)),
		on(S::Enabled, E::StartRequest, Some(C::Known), Some(A::RejectStart), SAME),
		on(S::Enabled, E::JoinRequest, Some(C::JoinIsUpdate), Some(A::AcceptUpdateAlias), go(S::LeaveInterPan)),
		on(S::Enabled, E::JoinRequest, Some(C::JoinAcceptable), Some(A::DecryptJoin), go(S::JoinDecrypt)),
		on(S::Enabled, E::JoinRequest, Some(C::Known), Some(A::RejectJoin), SAME),
		on(S::Enabled, E::UpdateRequest, Some(C::UpdateAcceptable), Some(A::AcceptUpdate), go(S::LeaveInterPan)),

		on(S::StartFreePan, E::FreePan, None, Some(A::DecryptStart), go(S::StartDecrypt)),
		on(S::StartDecrypt, E::KeyDecrypted, None, Some(A::Accept), go(S::LeaveInterPan)),
		on(S::JoinDecrypt, E::KeyDecrypted, None, Some(A::Accept), go(S::LeaveInterPan)),
		on(S::LeaveInterPan, E::RadioDone, Some(C::IsUpdate), Some(A::ApplyUpdate), go(S::UpdateNetwork)),
		on(S::LeaveInterPan, E::RadioDone, None, Some(A::JoinLocally), go(S::JoinNetwork)),
		on(S::JoinNetwork, E::NetworkJoined, None, Some(A::Joined), go(S::Disabled)),
		on(S::UpdateNetwork, E::NetworkUpdated, None, Some(A::Updated), go(S::Disabled)),
	],
	hooks: &[
		Hooks { state: S::Disabled, entry: Some(A::Quiet), exit: None },
	]
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum TargetType {
	None,
	Touchlink
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indication {
	ScanRequest { initiator: u64, transaction_id: u32 },
	Identify { initiator: u64, duration: u16 },
	Reset { initiator: u64 },
	Joined { status: Status, network: NetworkParams },
	Updated { status: Status, channel: u8, update_id: u8 },
}

pub type Done = Box<dyn FnOnce(Status)>;
pub type Subscriber = Box<dyn FnMut(&Indication)>;

#[derive(Debug, Clone, Copy)]
struct PendingScan {
	initiator: u64,
	transaction_id: u32,
	zigbee_info: ZigbeeInfo,
	zll_info: ZllInfo
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Kind {
	#[default]
	Start,
	Join,
	Update
}

//what the initiator asked for, filled while the handshake runs
#[derive(Debug, Clone, Copy, Default)]
struct Negotiation {
	kind: Kind,
	//router or end device flavour of the join request / response
	router: bool,
	initiator: u64,
	transaction_id: u32,
	response_id: u32,
	key_index: u8,
	encrypted: NetworkKey,
	key: NetworkKey,
	network: NetworkParams,
	groups: Range,
	free_addresses: Range,
	free_groups: Range
}

#[derive(Default)]
struct Session {
	pending: Option<Done>,
	listen_channel: u8,
	jitter: Option<PendingScan>,
	negotiation: Negotiation,
	inbound: Option<Inbound>,
	completed: Option<Completed>
}

pub struct Target {
	machine: Machine<State>,
	session: Session,
	transactions: TransactionTable,
	priority: bool,
	allow_stealing: bool,
	subscribers: Vec<Subscriber>
}

impl Default for Target {
	fn default() -> Self {
		Target {
			machine: Machine::new("target", State::Disabled),
			session: Session::default(),
			transactions: TransactionTable::default(),
			priority: false,
			allow_stealing: false,
			subscribers: Vec::new()
		}
	}
}

fn join_response(router: bool, transaction_id: u32, status: u8) -> Command {
	let r = NetworkJoinResponse { transaction_id, status };

	if router { Command::NetworkJoinRouterResponse(r) } else { Command::NetworkJoinEndDeviceResponse(r) }
}

//update ids wrap, newer means ahead by less than half the range
fn is_newer(update_id: u8, current: u8) -> bool {
	update_id != current && update_id.wrapping_sub(current) < 0x80
}

impl Target {
	pub fn state(&self) -> State {
		self.machine.state()
	}

	pub fn subscribe(&mut self, subscriber: Subscriber) {
		self.subscribers.push(subscriber);
	}

	pub fn set_touchlink_priority(&mut self, on: bool) {
		self.priority = on;
	}

	pub fn allow_stealing(&mut self, on: bool) {
		self.allow_stealing = on;
	}

	pub fn transactions(&self) -> &TransactionTable {
		&self.transactions
	}

	pub(crate) fn set_target_type(&mut self, kind: TargetType, done: Done, ctx: &mut Context) -> Result<(), Error> {
		let event = match (kind, self.state()) {
			(TargetType::Touchlink, State::Enabled) | (TargetType::None, State::Disabled) => {
				done(Status::Ok);
				return Ok(());
			},
			(TargetType::Touchlink, State::Disabled) => Event::Enable,
			(TargetType::None, State::Enabled) => Event::Disable,
			_ => return Err(Error::Busy)
		};

		if ctx.shared.radio.is_busy() || ctx.shared.initiator_active {
			return Err(Error::Busy);
		}

		self.session.pending = Some(done);
		self.dispatch(event, 0, ctx);

		Ok(())
	}

	pub(crate) fn on_frame(&mut self, inbound: Inbound, ctx: &mut Context) {
		let event = match inbound.frame.command {
			Command::ScanRequest(_) => Event::ScanRequest,
			Command::DeviceInfoRequest(_) => Event::DeviceInfoRequest,
			Command::IdentifyRequest(_) => Event::IdentifyRequest,
			Command::ResetToFactoryNewRequest(_) => Event::ResetRequest,
			Command::NetworkStartRequest(_) => Event::StartRequest,
			Command::NetworkJoinRouterRequest(_) | Command::NetworkJoinEndDeviceRequest(_) => Event::JoinRequest,
			Command::NetworkUpdateRequest(_) => Event::UpdateRequest,
			_ => return
		};

		self.transactions.expire(ctx.now);

		self.session.inbound = Some(inbound);

		if !self.dispatch(event, 0, ctx) {
			log::debug!("target: {:?} ignored in {:?}", event, self.state());
		}

		self.session.inbound = None;
	}

	pub(crate) fn on_completed(&mut self, result: Completed, ctx: &mut Context) {
		let (event, arg) = match &result {
			Completed::InterPanSet | Completed::InterPanCleared => (Event::RadioDone, 0),
			Completed::FreePan { .. } => (Event::FreePan, 0),
			Completed::KeyDecrypted { .. } => (Event::KeyDecrypted, 0),
			Completed::NetworkJoined { success } => (Event::NetworkJoined, *success as u32),
			Completed::NetworkUpdated { success } => (Event::NetworkUpdated, *success as u32),
			r => {
				log::debug!("target: unexpected completion {:?}", r);
				return;
			}
		};

		self.session.completed = Some(result);
		self.dispatch(event, arg, ctx);
		self.session.completed = None;
	}

	pub(crate) fn on_timeout(&mut self, ctx: &mut Context) {
		self.dispatch(Event::Timeout, 0, ctx);
	}

	fn dispatch(&mut self, event: Event, arg: u32, ctx: &mut Context) -> bool {
		let mut actor = Actor {
			session: &mut self.session,
			transactions: &mut self.transactions,
			subscribers: &mut self.subscribers,
			priority: self.priority,
			allow_stealing: self.allow_stealing,
			ctx
		};

		self.machine.dispatch(&TABLE, event, arg, 0, &mut actor)
	}
}

struct Actor<'s, 'c, 'a> {
	session: &'s mut Session,
	transactions: &'s mut TransactionTable,
	subscribers: &'s mut Vec<Subscriber>,
	priority: bool,
	allow_stealing: bool,
	ctx: &'c mut Context<'a>
}

impl Actor<'_, '_, '_> {
	fn inbound(&self) -> Option<&Inbound> {
		self.session.inbound.as_ref()
	}

	fn source(&self) -> u64 {
		self.inbound().map_or(0, |i| i.source)
	}

	fn transaction(&self) -> Option<&Transaction> {
		let inbound = self.inbound()?;
		let t = self.transactions.find(inbound.frame.command.transaction_id(), self.ctx.now)?;

		if t.initiator == inbound.source { Some(t) } else { None }
	}

	fn known(&self) -> bool {
		let known = self.transaction().is_some();

		if !known {
			if let Some(i) = self.inbound() {
				log::debug!("target: unknown transaction {:#010x} from {:#018x}", i.frame.command.transaction_id(), i.source);
			}
		}

		known
	}

	fn notify(&mut self, indication: Indication) {
		for s in self.subscribers.iter_mut() {
			s(&indication);
		}
	}

	//nothing else may hold the radio or the key while this role negotiates
	fn handshake_free(&self) -> bool {
		let shared = &self.ctx.shared;

		shared.handshake.is_none() && !shared.initiator_active && !shared.radio.is_busy() && !shared.key_slot.is_busy()
	}

	fn may_take_over(&self) -> bool {
		if self.ctx.stack.is_factory_new() || self.allow_stealing {
			return true;
		}

		log::info!("target: refusing to leave the current network, stealing not allowed");
		false
	}

	fn accept_scan(&self) -> bool {
		let (inbound, r) = match self.inbound() {
			Some(i) => match &i.frame.command {
				Command::ScanRequest(r) => (i, r),
				_ => return false
			},
			None => return false
		};

		let rssi = inbound.rssi as i16 + self.ctx.config.rssi_correction as i16;

		if rssi < self.ctx.config.rssi_threshold as i16 {
			log::debug!("scan request from {:#018x}: rssi {} below threshold", inbound.source, rssi);
			return false;
		}

		if self.session.jitter.is_some() {
			log::debug!("scan request {:#010x}: response already pending", r.transaction_id);
			return false;
		}

		if self.transactions.contains(r.transaction_id, self.ctx.now) {
			log::debug!("scan request {:#010x}: duplicate", r.transaction_id);
			return false;
		}

		true
	}

	fn start_acceptable(&self, needs_pan: bool) -> bool {
		let r = match self.inbound().map(|i| &i.frame.command) {
			Some(Command::NetworkStartRequest(r)) => r,
			_ => return false
		};

		if !self.known() || !self.handshake_free() || self.ctx.stack.is_end_device() || !self.may_take_over() {
			return false;
		}

		let missing = r.pan_id == 0 || r.extended_pan_id == 0;

		let valid = validate::channel(self.ctx.stack.all_channels(), r.logical_channel)
			.and_then(|_| validate::network_address(r.network_address))
			.and_then(|_| if r.pan_id == 0 { Ok(()) } else { validate::pan_id(r.pan_id) })
			.and_then(|_| if r.extended_pan_id == 0 { Ok(()) } else { validate::extended_pan_id(r.extended_pan_id) });

		if let Err(e) = valid {
			log::warn!("start request {:#010x} rejected: {:?}", r.transaction_id, e);
			return false;
		}

		missing == needs_pan
	}

	fn join_request(&self) -> Option<(&zll::NetworkJoinRequest, bool)> {
		match self.inbound().map(|i| &i.frame.command) {
			Some(Command::NetworkJoinRouterRequest(r)) => Some((r, true)),
			Some(Command::NetworkJoinEndDeviceRequest(r)) => Some((r, false)),
			_ => None
		}
	}

	fn join_is_update(&self) -> bool {
		let (r, _) = match self.join_request() {
			Some(r) => r,
			None => return false
		};

		match self.ctx.stack.network() {
			Some(n) if !self.ctx.stack.is_factory_new() && n.extended_pan_id == r.extended_pan_id => {
				self.known() && self.handshake_free()
			},
			_ => false
		}
	}

	fn join_acceptable(&self) -> bool {
		let (r, router) = match self.join_request() {
			Some(r) => r,
			None => return false
		};

		if !self.known() || !self.handshake_free() || !self.may_take_over() {
			return false;
		}

		if router == self.ctx.stack.is_end_device() {
			log::warn!("join request {:#010x} for the wrong device type", r.transaction_id);
			return false;
		}

		match validate::network(self.ctx.stack.all_channels(), r.logical_channel, r.pan_id, r.network_address, r.extended_pan_id) {
			Ok(()) => true,
			Err(e) => {
				log::warn!("join request {:#010x} rejected: {:?}", r.transaction_id, e);
				false
			}
		}
	}

	fn update_acceptable(&self) -> bool {
		let r = match self.inbound().map(|i| &i.frame.command) {
			Some(Command::NetworkUpdateRequest(r)) => r,
			_ => return false
		};

		let own = match self.ctx.stack.network() {
			Some(n) => n,
			None => return false
		};

		self.known()
			&& self.handshake_free()
			&& own.extended_pan_id == r.extended_pan_id
			&& is_newer(r.network_update_id, own.update_id)
			&& validate::channel(self.ctx.stack.all_channels(), r.logical_channel).is_ok()
	}

	fn enter_listen_channel(&mut self) {
		let channel = match self.ctx.stack.network() {
			Some(n) => n.channel,
			None => self.ctx.stack.primary_channels().first().unwrap_or(FIRST_CHANNEL)
		};

		self.session.listen_channel = channel;
		self.ctx.enter_inter_pan(ROLE, channel);
	}

	fn complete(&mut self, status: Status) {
		match self.session.pending.take() {
			Some(done) => done(status),
			None => panic!("target: radio switch completed with no pending request")
		}
	}

	fn start_jitter(&mut self) {
		let (initiator, r) = match self.inbound() {
			Some(Inbound { source, frame: zll::ZllFrame { command: Command::ScanRequest(r), .. }, .. }) => (*source, r.clone()),
			_ => return
		};

		self.session.jitter = Some(PendingScan {
			initiator,
			transaction_id: r.transaction_id,
			zigbee_info: r.zigbee_info,
			zll_info: r.zll_info
		});

		self.notify(Indication::ScanRequest { initiator, transaction_id: r.transaction_id });

		let delay = self.ctx.rng.gen_range(0..=self.ctx.config.jitter_max_ms);

		self.ctx.arm(ROLE, TimerId::Jitter, delay);
	}

	fn send_scan_response(&mut self) {
		let pending = match self.session.jitter.take() {
			Some(p) => p,
			None => return
		};

		let response_id = self.ctx.stack.new_response_id();
		let endpoints = self.ctx.stack.endpoints();

		let network = self.ctx.stack.network().unwrap_or(NetworkParams {
			extended_pan_id: 0,
			channel: self.session.listen_channel,
			pan_id: 0,
			network_address: UNASSIGNED_NETWORK_ADDRESS,
			update_id: 0
		});

		let response = ScanResponse {
			transaction_id: pending.transaction_id,
			rssi_correction: self.ctx.config.rssi_correction,
			zigbee_info: ZigbeeInfo {
				rx_on_when_idle: self.ctx.stack.rx_on_when_idle(),
				logical_type: self.ctx.stack.logical_type()
			},
			zll_info: ZllInfo {
				factory_new: self.ctx.stack.is_factory_new(),
				address_assignment: self.ctx.config.address_assignment_capable,
				touchlink_initiator: self.ctx.config.initiator_capable,
				priority_request: self.priority,
				profile_interop: true
			},
			key_bitmask: self.ctx.stack.key_bitmask(),
			response_id,
			extended_pan_id: network.extended_pan_id,
			network_update_id: network.update_id,
			logical_channel: network.channel,
			pan_id: network.pan_id,
			network_address: network.network_address,
			number_of_sub_devices: endpoints.len() as u8,
			total_group_ids: self.ctx.stack.group_id_count(),
			endpoint_info: if endpoints.len() == 1 { endpoints.first().copied() } else { None }
		};

		let tx_power = Some(self.ctx.config.scan_response_tx_power);

		self.ctx.send(ROLE, Destination::Ieee(pending.initiator), Command::ScanResponse(response), tx_power);

		self.transactions.insert(Transaction {
			transaction_id: pending.transaction_id,
			response_id,
			initiator: pending.initiator,
			zll_info: pending.zll_info,
			zigbee_info: pending.zigbee_info,
			created_at: self.ctx.now,
			expires_at: self.ctx.now + self.ctx.config.transaction_lifetime_ms
		});
	}

	fn send_device_info(&mut self) {
		let r = match self.inbound().map(|i| &i.frame.command) {
			Some(Command::DeviceInfoRequest(r)) => r.clone(),
			_ => return
		};

		let ieee_address = self.ctx.stack.ieee_address();
		let endpoints = self.ctx.stack.endpoints();

		let records: Vec<DeviceInfoRecord> = endpoints.iter()
			.skip(r.start_index as usize)
			.take(MAX_DEVICE_INFO_RECORDS)
			.map(|e| DeviceInfoRecord {
				ieee_address,
				endpoint: e.endpoint,
				profile_id: e.profile_id,
				device_id: e.device_id,
				version: e.version,
				group_id_count: e.group_id_count,
				sort_tag: 0
			})
			.collect();

		let response = DeviceInfoResponse {
			transaction_id: r.transaction_id,
			number_of_sub_devices: endpoints.len() as u8,
			start_index: r.start_index,
			record_count: records.len() as u8,
			records
		};

		let source = self.source();

		self.ctx.send(ROLE, Destination::Ieee(source), Command::DeviceInfoResponse(response), None);
	}

	fn identify(&mut self) {
		if let Some(Command::IdentifyRequest(r)) = self.inbound().map(|i| &i.frame.command) {
			let indication = Indication::Identify { initiator: self.source(), duration: r.identify_duration };

			self.notify(indication);
		}
	}

	fn reset(&mut self) {
		let initiator = self.source();

		log::info!("target: factory reset requested by {:#018x}", initiator);

		self.notify(Indication::Reset { initiator });
		self.transactions.clear();
		self.ctx.request(ROLE, Operation::ResetToFactoryNew);
	}

	fn begin(&mut self, kind: Kind, router: bool) {
		let (initiator, transaction_id, response_id) = match self.transaction() {
			Some(t) => (t.initiator, t.transaction_id, t.response_id),
			None => (self.source(), 0, 0)
		};

		self.session.negotiation = Negotiation {
			kind,
			router,
			initiator,
			transaction_id,
			response_id,
			..Default::default()
		};

		self.ctx.shared.begin_handshake(ROLE);
	}

	fn record_start(&mut self) {
		self.begin(Kind::Start, true);

		if let Some(Command::NetworkStartRequest(r)) = self.inbound().map(|i| &i.frame.command) {
			let n = Negotiation {
				key_index: r.key_index,
				encrypted: r.encrypted_network_key,
				network: NetworkParams {
					extended_pan_id: r.extended_pan_id,
					channel: r.logical_channel,
					pan_id: r.pan_id,
					network_address: r.network_address,
					update_id: 0
				},
				groups: Range { begin: r.group_ids_begin, end: r.group_ids_end },
				free_addresses: Range { begin: r.free_network_address_range_begin, end: r.free_network_address_range_end },
				free_groups: Range { begin: r.free_group_id_range_begin, end: r.free_group_id_range_end },
				..self.session.negotiation
			};

			self.session.negotiation = n;
		}
	}

	fn record_join(&mut self) {
		let router = self.join_request().map_or(true, |(_, router)| router);

		self.begin(Kind::Join, router);

		if let Some((r, _)) = self.join_request() {
			let n = Negotiation {
				key_index: r.key_index,
				encrypted: r.encrypted_network_key,
				network: NetworkParams {
					extended_pan_id: r.extended_pan_id,
					channel: r.logical_channel,
					pan_id: r.pan_id,
					network_address: r.network_address,
					update_id: r.network_update_id
				},
				groups: Range { begin: r.group_ids_begin, end: r.group_ids_end },
				free_addresses: Range { begin: r.free_network_address_range_begin, end: r.free_network_address_range_end },
				free_groups: Range { begin: r.free_group_id_range_begin, end: r.free_group_id_range_end },
				..self.session.negotiation
			};

			self.session.negotiation = n;
		}
	}

	fn decrypt(&mut self) {
		let n = self.session.negotiation;

		self.ctx.shared.key_slot.acquire(ROLE);
		self.ctx.request(ROLE, Operation::DecryptKey {
			encrypted: n.encrypted,
			key_index: n.key_index,
			transaction_id: n.transaction_id,
			response_id: n.response_id
		});
	}

	fn reply(&mut self, command: Command) {
		let initiator = self.session.negotiation.initiator;

		self.ctx.send(ROLE, Destination::Ieee(initiator), command, None);
	}

	fn leave(&mut self) {
		self.ctx.cancel(ROLE, TimerId::Jitter);
		self.session.jitter = None;
		self.ctx.shared.target_listen_channel = None;
		self.ctx.leave_inter_pan(ROLE);
	}

	fn accept_update(&mut self, alias: bool) {
		let (channel, update_id, router) = match (self.join_request(), self.inbound().map(|i| &i.frame.command)) {
			(Some((r, router)), _) => (r.logical_channel, r.network_update_id, router),
			(None, Some(Command::NetworkUpdateRequest(r))) => (r.logical_channel, r.network_update_id, true),
			_ => return
		};

		self.begin(Kind::Update, router);
		self.session.negotiation.network.channel = channel;
		self.session.negotiation.network.update_id = update_id;

		if alias {
			let n = self.session.negotiation;

			self.reply(join_response(n.router, n.transaction_id, zll::STATUS_SUCCESS));
		}

		self.leave();
	}

	fn accept(&mut self) {
		if let Some(Completed::KeyDecrypted { key }) = self.session.completed {
			self.session.negotiation.key = key;
		}

		let n = self.session.negotiation;

		self.ctx.stack.assign_free_ranges(n.free_addresses, n.free_groups);

		let command = match n.kind {
			Kind::Start => Command::NetworkStartResponse(NetworkStartResponse {
				transaction_id: n.transaction_id,
				status: zll::STATUS_SUCCESS,
				extended_pan_id: n.network.extended_pan_id,
				network_update_id: n.network.update_id,
				logical_channel: n.network.channel,
				pan_id: n.network.pan_id
			}),
			_ => join_response(n.router, n.transaction_id, zll::STATUS_SUCCESS)
		};

		log::info!("target: accepted {:?} from {:#018x}", n.kind, n.initiator);

		self.reply(command);
		self.leave();
	}

	fn reject(&mut self, start: bool) {
		let transaction_id = self.inbound().map_or(0, |i| i.frame.command.transaction_id());
		let source = self.source();

		let command = if start {
			Command::NetworkStartResponse(NetworkStartResponse {
				transaction_id,
				status: zll::STATUS_FAILURE,
				extended_pan_id: 0,
				network_update_id: 0,
				logical_channel: 0,
				pan_id: 0
			})
		}
		else {
			let router = self.join_request().map_or(true, |(_, router)| router);

			join_response(router, transaction_id, zll::STATUS_FAILURE)
		};

		self.ctx.send(ROLE, Destination::Ieee(source), command, None);
	}
}

impl Executor<Condition, Action> for Actor<'_, '_, '_> {
	fn check(&self, condition: Condition, _arg1: u32, _arg2: u32) -> bool {
		match condition {
			C::AcceptScan => self.accept_scan(),
			C::Known => self.known(),
			C::ResetAllowed => self.known() && !self.ctx.stack.is_factory_new(),
			C::StartNeedsPan => self.start_acceptable(true),
			C::StartAcceptable => self.start_acceptable(false),
			C::JoinIsUpdate => self.join_is_update(),
			C::JoinAcceptable => self.join_acceptable(),
			C::UpdateAcceptable => self.update_acceptable(),
			C::IsUpdate => self.session.negotiation.kind == Kind::Update,
		}
	}

	fn execute(&mut self, action: Action, arg1: u32, _arg2: u32) {
		match action {
			A::EnterListenChannel => self.enter_listen_channel(),
			A::Listening => {
				self.ctx.shared.target_listen_channel = Some(self.session.listen_channel);
				log::info!("target: listening on channel {}", self.session.listen_channel);
				self.complete(Status::Ok);
			},
			A::LeaveListenChannel => {
				self.transactions.clear();
				self.leave();
			},
			A::Silent => self.complete(Status::Ok),
			A::StartJitter => self.start_jitter(),
			A::SendScanResponse => self.send_scan_response(),
			A::SendDeviceInfo => self.send_device_info(),
			A::Identify => self.identify(),
			A::Reset => self.reset(),
			A::FindPan => {
				self.record_start();
				self.ctx.request(ROLE, Operation::FindFreePan);
			},
			A::DecryptStart => {
				match self.session.completed {
					Some(Completed::FreePan { pan_id, extended_pan_id }) => {
						let network = &mut self.session.negotiation.network;

						if network.pan_id == 0 {
							network.pan_id = pan_id;
						}

						if network.extended_pan_id == 0 {
							network.extended_pan_id = extended_pan_id;
						}
					},
					_ => self.record_start()
				}

				self.decrypt();
			},
			A::DecryptJoin => {
				self.record_join();
				self.decrypt();
			},
			A::RejectStart => self.reject(true),
			A::RejectJoin => self.reject(false),
			A::AcceptUpdateAlias => self.accept_update(true),
			A::AcceptUpdate => self.accept_update(false),
			A::Accept => self.accept(),
			A::ApplyUpdate => {
				let n = self.session.negotiation.network;

				self.ctx.request(ROLE, Operation::UpdateNetwork { channel: n.channel, update_id: n.update_id });
			},
			A::JoinLocally => {
				let n = self.session.negotiation;

				self.ctx.request(ROLE, Operation::JoinNetwork(JoinParams {
					network: n.network,
					key: n.key,
					groups: n.groups,
					start: n.kind == Kind::Start
				}));
			},
			A::Joined => {
				let status = if arg1 != 0 { Status::Ok } else { Status::Failure };
				let network = self.session.negotiation.network;

				log::info!("target: join finished: {:?}", status);

				self.notify(Indication::Joined { status, network });
			},
			A::Updated => {
				let status = if arg1 != 0 { Status::Ok } else { Status::Failure };
				let n = self.session.negotiation.network;

				self.notify(Indication::Updated { status, channel: n.channel, update_id: n.update_id });
			},
			A::Quiet => {
				*self.session = Session::default();
				self.transactions.clear();
				self.ctx.cancel(ROLE, TimerId::Jitter);
				self.ctx.shared.target_listen_channel = None;
				self.ctx.shared.end_handshake(ROLE);
			},
		}
	}
}
