//initiator role: scan, then identify / device info / reset / join the chosen target

use serde::Deserialize;
use zigbee::zdp::{ ZdoIeeeAddrRsp, ZDP_SUCCESS };
use zigbee::zll::{
	self, Command, DeviceInfoRecord, DeviceInfoRequest, IdentifyRequest, NetworkJoinRequest,
	NetworkStartRequest, NetworkUpdateRequest, ResetToFactoryNewRequest, ScanRequest, ZigbeeInfo, ZllInfo
};
use crate::candidates::{ self, Candidate, CandidateList };
use crate::context::{ Context, Inbound };
use crate::error::Error;
use crate::fsm::{ row, Executor, Hooks, Machine, Next, On, Source, Table, Transition };
use crate::node::Input;
use crate::stack::{ Completed, Destination, JoinParams, Operation };
use crate::timers::TimerId;
use crate::types::{ AllocError, ChannelMask, NetworkKey, NetworkParams, Range, Role, Status };
use crate::validate;

const ROLE: Role = Role::Initiator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
	Idle,
	//switching to the next scan channel
	ScanChannel,
	ScanWindow,
	ScanDone,
	//identify, device info, reset
	ActionChannel,
	DeviceInfoWait,
	ActionDone,
	JoinChannel,
	JoinFreePan,
	JoinEncrypt,
	JoinResponse,
	UpdateWindow,
	JoinLeave,
	JoinAbort,
	JoinNetwork,
	StartupDelay,
	Liveness,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
	Start,
	Stop,
	Abort,
	RadioDone,
	Timeout,
	ScanResponse,
	DeviceInfoResponse,
	StartResponse,
	JoinResponse,
	KeyEncrypted,
	FreePan,
	//arg1: 1 on success
	NetworkJoined,
	IeeeAddrResponse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Condition {
	IsScan,
	IsJoin,
	IsDeviceInfo,
	StopRequested,
	AcceptScanResponse,
	ScanExhausted,
	SameChannel,
	MorePages,
	FromTarget,
	Unsupported,
	SamePan,
	FindPan,
	StartAccepted,
	JoinAccepted,
	LocalJoin,
	Succeeded,
	SkipLiveness,
	ProbeAnswered,
	ProbeRejected,
	ProbesLeft,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
	EnterScanChannel,
	SendScanRequest,
	AddCandidate,
	NextScanRequest,
	NextScanChannel,
	MarkStop,
	LeaveOk,
	LeaveStopped,
	LeaveFailed,
	Finish,
	EnterTargetChannel,
	SendDeviceInfoRequest,
	SendAndLeave,
	StoreAndRequestNext,
	StoreAndLeave,
	SendUpdate,
	RequestFreePan,
	EncryptKey,
	SendJoinRequest,
	AcceptStart,
	AcceptUpdate,
	JoinLocally,
	StartupDelay,
	SendProbe,
	Succeed,
	FailAfterJoin,
	NotEstablished,
	CancelTimer,
	Reset,
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
		on(S::Idle, E::Start, Some(C::IsScan), Some(A::EnterScanChannel), go(S::ScanChannel)),
		on(S::Idle, E::Start, Some(C::IsJoin), Some(A::EnterTargetChannel), go(S::JoinChannel)),
		on(S::Idle, E::Start, None, Some(A::EnterTargetChannel), go(S::ActionChannel)),

		//scan
		on(S::ScanChannel, E::Stop, None, Some(A::MarkStop), SAME),
		on(S::ScanChannel, E::RadioDone, Some(C::StopRequested), Some(A::LeaveStopped), go(S::ScanDone)),
		on(S::ScanChannel, E::RadioDone, None, Some(A::SendScanRequest), go(S::ScanWindow)),
		on(S::ScanWindow, E::ScanResponse, Some(C::AcceptScanResponse), Some(A::AddCandidate), SAME),
		on(S::ScanWindow, E::Stop, None, Some(A::LeaveStopped), go(S::ScanDone)),
		on(S::ScanWindow, E::Timeout, Some(C::ScanExhausted), Some(A::LeaveOk), go(S::ScanDone)),
		on(S::ScanWindow, E::Timeout, Some(C::SameChannel), Some(A::NextScanRequest), SAME),
		on(S::ScanWindow, E::Timeout, None, Some(A::NextScanChannel), go(S::ScanChannel)),
		on(S::ScanDone, E::RadioDone, None, Some(A::Finish), go(S::Idle)),

		//identify, device info, reset
		on(S::ActionChannel, E::RadioDone, Some(C::IsDeviceInfo), Some(A::SendDeviceInfoRequest), go(S::DeviceInfoWait)),
		on(S::ActionChannel, E::RadioDone, None, Some(A::SendAndLeave), go(S::ActionDone)),
		on(S::DeviceInfoWait, E::DeviceInfoResponse, Some(C::MorePages), Some(A::StoreAndRequestNext), SAME),
		on(S::DeviceInfoWait, E::DeviceInfoResponse, Some(C::FromTarget), Some(A::StoreAndLeave), go(S::ActionDone)),
		on(S::DeviceInfoWait, E::Timeout, None, Some(A::LeaveFailed), go(S::ActionDone)),
		on(S::ActionDone, E::RadioDone, None, Some(A::Finish), go(S::Idle)),

		//join / start / update
		on(S::JoinChannel, E::RadioDone, Some(C::Unsupported), Some(A::LeaveFailed), go(S::JoinAbort)),
		on(S::JoinChannel, E::RadioDone, Some(C::SamePan), Some(A::SendUpdate), go(S::UpdateWindow)),
		on(S::JoinChannel, E::RadioDone, Some(C::FindPan), Some(A::RequestFreePan), go(S::JoinFreePan)),
		on(S::JoinChannel, E::RadioDone, None, Some(A::EncryptKey), go(S::JoinEncrypt)),
		on(S::JoinFreePan, E::FreePan, None, Some(A::EncryptKey), go(S::JoinEncrypt)),
		on(S::JoinEncrypt, E::KeyEncrypted, None, Some(A::SendJoinRequest), go(S::JoinResponse)),
		on(S::JoinEncrypt, E::Abort, None, Some(A::LeaveFailed), go(S::JoinAbort)),
		on(S::JoinResponse, E::Abort, None, Some(A::LeaveFailed), go(S::JoinAbort)),
		on(S::JoinResponse, E::StartResponse, Some(C::StartAccepted), Some(A::AcceptStart), go(S::JoinLeave)),
		on(S::JoinResponse, E::StartResponse, Some(C::FromTarget), Some(A::LeaveFailed), go(S::JoinAbort)),
		on(S::JoinResponse, E::JoinResponse, Some(C::JoinAccepted), Some(A::LeaveOk), go(S::JoinLeave)),
		on(S::JoinResponse, E::JoinResponse, Some(C::FromTarget), Some(A::LeaveFailed), go(S::JoinAbort)),
		on(S::JoinResponse, E::Timeout, None, Some(A::LeaveFailed), go(S::JoinAbort)),
		on(S::UpdateWindow, E::Timeout, None, Some(A::AcceptUpdate), go(S::JoinLeave)),
		on(S::UpdateWindow, E::Abort, None, Some(A::LeaveFailed), go(S::JoinAbort)),
		on(S::JoinAbort, E::RadioDone, None, Some(A::Finish), go(S::Idle)),
		on(S::JoinLeave, E::RadioDone, Some(C::LocalJoin), Some(A::JoinLocally), go(S::JoinNetwork)),
		on(S::JoinLeave, E::RadioDone, None, Some(A::StartupDelay), go(S::StartupDelay)),
		on(S::JoinNetwork, E::NetworkJoined, Some(C::Succeeded), Some(A::StartupDelay), go(S::StartupDelay)),
		on(S::JoinNetwork, E::NetworkJoined, None, Some(A::FailAfterJoin), go(S::Idle)),
		on(S::StartupDelay, E::Timeout, Some(C::SkipLiveness), Some(A::Succeed), go(S::Idle)),
		on(S::StartupDelay, E::Timeout, None, Some(A::SendProbe), go(S::Liveness)),
		on(S::Liveness, E::IeeeAddrResponse, Some(C::ProbeAnswered), Some(A::Succeed), go(S::Idle)),
		on(S::Liveness, E::IeeeAddrResponse, Some(C::ProbeRejected), Some(A::FailAfterJoin), go(S::Idle)),
		on(S::Liveness, E::Timeout, Some(C::ProbesLeft), Some(A::SendProbe), SAME),
		on(S::Liveness, E::Timeout, None, Some(A::NotEstablished), go(S::Idle)),
	],
	hooks: &[
		Hooks { state: S::Idle, entry: Some(A::Reset), exit: None },
		Hooks { state: S::ScanWindow, entry: None, exit: Some(A::CancelTimer) },
		Hooks { state: S::DeviceInfoWait, entry: None, exit: Some(A::CancelTimer) },
		Hooks { state: S::JoinResponse, entry: None, exit: Some(A::CancelTimer) },
		Hooks { state: S::UpdateWindow, entry: None, exit: Some(A::CancelTimer) },
		Hooks { state: S::StartupDelay, entry: None, exit: Some(A::CancelTimer) },
		Hooks { state: S::Liveness, entry: None, exit: Some(A::CancelTimer) },
	]
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct ScanOptions {
	pub include_secondary: bool,
	//keep only targets already on the local pan
	pub own_pan_only: bool
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indication {
	//group ids handed to this node while starting a network
	GroupsAssigned(Range)
}

pub type ScanDone = Box<dyn FnOnce(Status, Vec<Candidate>)>;
pub type DeviceInfoDone = Box<dyn FnOnce(Status, Vec<DeviceInfoRecord>)>;
pub type Done = Box<dyn FnOnce(Status)>;
pub type Subscriber = Box<dyn FnMut(&Indication)>;

enum Pending {
	Scan(ScanDone),
	DeviceInfo(DeviceInfoDone),
	Action(Done)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Task {
	#[default]
	Scan,
	Identify,
	DeviceInfo,
	Reset,
	Join
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Mode {
	#[default]
	Join,
	Start,
	Update
}

#[derive(Default)]
struct Session {
	pending: Option<Pending>,
	task: Task,
	status: Option<Status>,

	options: ScanOptions,
	plan: Vec<u8>,
	plan_index: usize,
	stop_requested: bool,
	transaction_id: u32,
	candidates: CandidateList,

	target: Option<Candidate>,
	identify_duration: u16,
	records: Vec<DeviceInfoRecord>,
	max_records: usize,
	next_index: u8,

	mode: Mode,
	skip_liveness: bool,
	key: NetworkKey,
	key_index: u8,
	encrypted: NetworkKey,
	network: NetworkParams,
	own_groups: Range,
	peer_address: u16,
	probes_sent: u8,

	inbound: Option<Inbound>,
	completed: Option<Completed>,
	probe: Option<(u16, ZdoIeeeAddrRsp)>,
}

pub struct Initiator {
	machine: Machine<State>,
	session: Session,
	subscribers: Vec<Subscriber>
}

impl Default for Initiator {
	fn default() -> Self {
		Initiator {
			machine: Machine::new("initiator", State::Idle),
			session: Session::default(),
			subscribers: Vec::new()
		}
	}
}

//first primary channel `first_repeats` times, the other primaries once, then the secondaries
pub fn scan_plan(primary: ChannelMask, secondary: ChannelMask, include_secondary: bool, first_repeats: u8) -> Vec<u8> {
	let mut plan = Vec::new();
	let mut channels = primary.channels();

	if let Some(first) = channels.next() {
		plan.extend(core::iter::repeat(first).take(first_repeats.max(1) as usize));
	}

	plan.extend(channels);

	if include_secondary {
		plan.extend(secondary.channels().filter(|c| !primary.contains(*c)));
	}

	plan
}

impl Initiator {
	pub fn state(&self) -> State {
		self.machine.state()
	}

	pub fn is_idle(&self) -> bool {
		self.machine.state() == State::Idle
	}

	pub fn subscribe(&mut self, subscriber: Subscriber) {
		self.subscribers.push(subscriber);
	}

	//a target handshake also needs the radio, so it blocks every initiator action
	fn ready(&self, ctx: &Context) -> Result<(), Error> {
		if !self.is_idle() || ctx.shared.radio.is_busy() || ctx.shared.handshake_blocks(ROLE) {
			return Err(Error::Busy);
		}

		Ok(())
	}

	pub(crate) fn scan(&mut self, options: ScanOptions, done: ScanDone, ctx: &mut Context) -> Result<(), Error> {
		self.ready(ctx)?;

		let plan = scan_plan(ctx.stack.primary_channels(), ctx.stack.secondary_channels(), options.include_secondary, ctx.config.first_channel_scans);

		if plan.is_empty() {
			return Err(Error::NoChannels);
		}

		self.session = Session {
			pending: Some(Pending::Scan(done)),
			task: Task::Scan,
			options,
			plan,
			transaction_id: ctx.stack.new_transaction_id(),
			..Default::default()
		};

		log::info!("scan {:#010x} over {} windows", self.session.transaction_id, self.session.plan.len());

		self.dispatch(Event::Start, 0, ctx);

		Ok(())
	}

	pub(crate) fn stop_scan(&mut self, ctx: &mut Context) {
		self.dispatch(Event::Stop, 0, ctx);
	}

	pub(crate) fn identify(&mut self, target: &Candidate, duration: u16, done: Done, ctx: &mut Context) -> Result<(), Error> {
		self.ready(ctx)?;

		self.session = Session {
			pending: Some(Pending::Action(done)),
			task: Task::Identify,
			target: Some(target.clone()),
			identify_duration: duration,
			..Default::default()
		};

		self.dispatch(Event::Start, 0, ctx);

		Ok(())
	}

	pub(crate) fn reset_to_factory_new(&mut self, target: &Candidate, done: Done, ctx: &mut Context) -> Result<(), Error> {
		self.ready(ctx)?;

		self.session = Session {
			pending: Some(Pending::Action(done)),
			task: Task::Reset,
			target: Some(target.clone()),
			..Default::default()
		};

		self.dispatch(Event::Start, 0, ctx);

		Ok(())
	}

	pub(crate) fn device_info(&mut self, target: &Candidate, max_records: usize, done: DeviceInfoDone, ctx: &mut Context) -> Result<(), Error> {
		self.ready(ctx)?;

		self.session = Session {
			pending: Some(Pending::DeviceInfo(done)),
			task: Task::DeviceInfo,
			target: Some(target.clone()),
			max_records,
			..Default::default()
		};

		self.dispatch(Event::Start, 0, ctx);

		Ok(())
	}

	pub(crate) fn join(&mut self, target: &Candidate, skip_liveness: bool, done: Done, ctx: &mut Context) -> Result<(), Error> {
		self.ready(ctx)?;

		let mode = match ctx.stack.network() {
			_ if ctx.stack.is_factory_new() => Mode::Start,
			Some(n) if n.extended_pan_id == target.extended_pan_id => Mode::Update,
			_ => Mode::Join
		};

		log::info!("{:?} with {:#018x}", mode, target.ieee_address);

		ctx.shared.begin_handshake(ROLE);

		self.session = Session {
			pending: Some(Pending::Action(done)),
			task: Task::Join,
			target: Some(target.clone()),
			mode,
			skip_liveness,
			..Default::default()
		};

		self.dispatch(Event::Start, 0, ctx);

		Ok(())
	}

	pub(crate) fn on_frame(&mut self, inbound: Inbound, ctx: &mut Context) {
		let event = match inbound.frame.command {
			Command::ScanResponse(_) => Event::ScanResponse,
			Command::DeviceInfoResponse(_) => Event::DeviceInfoResponse,
			Command::NetworkStartResponse(_) => Event::StartResponse,
			Command::NetworkJoinRouterResponse(_) | Command::NetworkJoinEndDeviceResponse(_) => Event::JoinResponse,
			_ => return
		};

		self.session.inbound = Some(inbound);
		self.dispatch(event, 0, ctx);
		self.session.inbound = None;
	}

	pub(crate) fn on_probe(&mut self, source: u16, response: ZdoIeeeAddrRsp, ctx: &mut Context) {
		self.session.probe = Some((source, response));
		self.dispatch(Event::IeeeAddrResponse, 0, ctx);
		self.session.probe = None;
	}

	pub(crate) fn on_completed(&mut self, result: Completed, ctx: &mut Context) {
		let (event, arg) = match &result {
			Completed::InterPanSet | Completed::InterPanCleared => (Event::RadioDone, 0),
			Completed::KeyEncrypted { .. } => (Event::KeyEncrypted, 0),
			Completed::FreePan { .. } => (Event::FreePan, 0),
			Completed::NetworkJoined { success } => (Event::NetworkJoined, *success as u32),
			r => {
				log::debug!("initiator: unexpected completion {:?}", r);
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

	pub(crate) fn on_event(&mut self, event: Event, ctx: &mut Context) {
		self.dispatch(event, 0, ctx);
	}

	fn dispatch(&mut self, event: Event, arg: u32, ctx: &mut Context) -> bool {
		let mut actor = Actor {
			session: &mut self.session,
			subscribers: &mut self.subscribers,
			ctx
		};

		self.machine.dispatch(&TABLE, event, arg, 0, &mut actor)
	}
}

struct Actor<'s, 'c, 'a> {
	session: &'s mut Session,
	subscribers: &'s mut Vec<Subscriber>,
	ctx: &'c mut Context<'a>
}

impl Actor<'_, '_, '_> {
	fn target(&self) -> Option<&Candidate> {
		self.session.target.as_ref()
	}

	fn target_ieee(&self) -> u64 {
		self.target().map_or(0, |t| t.ieee_address)
	}

	fn target_transaction(&self) -> u32 {
		self.target().map_or(0, |t| t.transaction_id)
	}

	fn command(&self) -> Option<&Command> {
		self.session.inbound.as_ref().map(|i| &i.frame.command)
	}

	fn from_target(&self) -> bool {
		match &self.session.inbound {
			Some(i) => i.source == self.target_ieee() && i.frame.command.transaction_id() == self.target_transaction(),
			None => false
		}
	}

	fn accept_scan_response(&self) -> bool {
		let inbound = match &self.session.inbound {
			Some(i) => i,
			None => return false
		};

		let r = match &inbound.frame.command {
			Command::ScanResponse(r) => r,
			_ => return false
		};

		if r.transaction_id != self.session.transaction_id {
			log::debug!("scan response {:#010x} from {:#018x}: foreign transaction", r.transaction_id, inbound.source);
			return false;
		}

		let rssi = candidates::corrected_rssi(inbound.rssi, r.rssi_correction);

		if rssi < self.ctx.config.rssi_threshold as i16 {
			log::debug!("scan response from {:#018x}: rssi {} below threshold", inbound.source, rssi);
			return false;
		}

		if self.session.options.own_pan_only {
			match self.ctx.stack.network() {
				Some(n) if n.extended_pan_id == r.extended_pan_id && n.pan_id == r.pan_id => (),
				_ => return false
			}
		}

		if r.key_bitmask & self.ctx.stack.key_bitmask() == 0 {
			log::debug!("scan response from {:#018x}: no common key", inbound.source);
			return false;
		}

		true
	}

	fn more_pages(&self) -> bool {
		match self.command() {
			Some(Command::DeviceInfoResponse(r)) if self.from_target() => {
				let next = r.start_index as usize + r.records.len();

				!r.records.is_empty()
					&& next < r.number_of_sub_devices as usize
					&& self.session.records.len() + r.records.len() < self.session.max_records
			},
			_ => false
		}
	}

	fn unsupported(&self) -> bool {
		let target = match self.target() {
			Some(t) => t,
			None => return true
		};

		match self.session.mode {
			Mode::Update => false,
			Mode::Start if !target.zigbee_info.is_router() => {
				log::warn!("{:#018x} cannot start a network", target.ieee_address);
				true
			},
			_ => match self.ctx.stack.shared_key_index(target.key_bitmask) {
				Some(_) => false,
				None => {
					log::warn!("no key index shared with {:#018x}", target.ieee_address);
					true
				}
			}
		}
	}

	fn start_accepted(&self) -> bool {
		match self.command() {
			Some(Command::NetworkStartResponse(r)) if self.from_target() => {
				if r.status != zll::STATUS_SUCCESS {
					return false;
				}

				match validate::network(self.ctx.stack.all_channels(), r.logical_channel, r.pan_id, self.session.network.network_address, r.extended_pan_id) {
					Ok(()) => true,
					Err(e) => {
						log::warn!("start response carries invalid parameters: {:?}", e);
						false
					}
				}
			},
			_ => false
		}
	}

	fn join_accepted(&self) -> bool {
		match self.command() {
			Some(Command::NetworkJoinRouterResponse(r)) | Some(Command::NetworkJoinEndDeviceResponse(r)) => {
				self.from_target() && r.status == zll::STATUS_SUCCESS
			},
			_ => false
		}
	}

	fn probe_answered(&self, success: bool) -> bool {
		match &self.session.probe {
			Some((source, r)) if *source == self.session.peer_address => {
				if success {
					r.status == ZDP_SUCCESS && r.ieee_addr_remote_dev == self.target_ieee()
				}
				else {
					r.status != ZDP_SUCCESS
				}
			},
			_ => false
		}
	}

	fn send_scan_request(&mut self) {
		let command = Command::ScanRequest(ScanRequest {
			transaction_id: self.session.transaction_id,
			zigbee_info: ZigbeeInfo {
				rx_on_when_idle: self.ctx.stack.rx_on_when_idle(),
				logical_type: self.ctx.stack.logical_type()
			},
			zll_info: ZllInfo {
				factory_new: self.ctx.stack.is_factory_new(),
				address_assignment: self.ctx.config.address_assignment_capable,
				touchlink_initiator: true,
				..Default::default()
			}
		});

		self.ctx.send(ROLE, Destination::Broadcast, command, None);
		self.ctx.arm(ROLE, TimerId::Initiator, self.ctx.config.scan_window_ms);
	}

	fn enter_scan_channel(&mut self) {
		match self.session.plan.get(self.session.plan_index) {
			Some(channel) => {
				let channel = *channel;

				self.ctx.enter_inter_pan(ROLE, channel);
			},
			None => panic!("initiator: scan plan overrun at {}", self.session.plan_index)
		}
	}

	fn add_candidate(&mut self) {
		if let Some(Inbound { source, rssi, frame: zll::ZllFrame { command: Command::ScanResponse(r), .. } }) = &self.session.inbound {
			let candidate = Candidate::from_scan_response(*source, *rssi, r);

			self.session.candidates.insert(candidate);
		}
	}

	fn leave(&mut self, status: Status) {
		self.session.status = Some(status);
		self.ctx.leave_inter_pan(ROLE);
	}

	fn finish(&mut self) {
		let status = self.session.status.unwrap_or(Status::Failure);

		log::info!("initiator {:?} finished: {:?}", self.session.task, status);

		match self.session.pending.take() {
			Some(Pending::Scan(done)) => done(status, self.session.candidates.to_vec()),
			Some(Pending::DeviceInfo(done)) => done(status, core::mem::take(&mut self.session.records)),
			Some(Pending::Action(done)) => done(status),
			None => panic!("initiator: {:?} finished with no pending request", self.session.task)
		}
	}

	fn send_to_target(&mut self, command: Command) {
		let destination = Destination::Ieee(self.target_ieee());

		self.ctx.send(ROLE, destination, command, None);
	}

	fn send_device_info_request(&mut self) {
		let command = Command::DeviceInfoRequest(DeviceInfoRequest {
			transaction_id: self.target_transaction(),
			start_index: self.session.next_index
		});

		self.send_to_target(command);
		self.ctx.arm(ROLE, TimerId::Initiator, self.ctx.config.response_timeout_ms);
	}

	fn store_records(&mut self) {
		if let Some(Command::DeviceInfoResponse(r)) = self.command() {
			let room = self.session.max_records.saturating_sub(self.session.records.len());
			let records: Vec<DeviceInfoRecord> = r.records.iter().take(room).copied().collect();
			let next = r.start_index.saturating_add(r.records.len() as u8);

			self.session.records.extend(records);
			self.session.next_index = next;
		}
	}

	fn send_and_leave(&mut self) {
		let transaction_id = self.target_transaction();

		let command = match self.session.task {
			Task::Reset => Command::ResetToFactoryNewRequest(ResetToFactoryNewRequest { transaction_id }),
			_ => Command::IdentifyRequest(IdentifyRequest { transaction_id, identify_duration: self.session.identify_duration })
		};

		self.send_to_target(command);
		self.leave(Status::Ok);
	}

	fn send_update(&mut self) {
		let network = match self.ctx.stack.network() {
			Some(n) => n,
			None => {
				self.ctx.raise(Input::Initiator(Event::Abort));
				return;
			}
		};

		let peer = self.target().map_or(0, |t| t.network_address);

		self.session.network = network;
		self.session.peer_address = peer;

		let command = Command::NetworkUpdateRequest(NetworkUpdateRequest {
			transaction_id: self.target_transaction(),
			extended_pan_id: network.extended_pan_id,
			network_update_id: network.update_id,
			logical_channel: network.channel,
			pan_id: network.pan_id,
			network_address: peer
		});

		self.send_to_target(command);
		self.ctx.arm(ROLE, TimerId::Initiator, self.ctx.config.update_timeout_ms);
	}

	fn encrypt_key(&mut self) {
		if let Some(Completed::FreePan { pan_id, extended_pan_id }) = self.session.completed {
			self.session.network.pan_id = pan_id;
			self.session.network.extended_pan_id = extended_pan_id;
		}

		let key = match self.session.mode {
			Mode::Start => Some(self.ctx.stack.generate_key()),
			_ => self.ctx.stack.network_key()
		};

		let (bitmask, transaction_id, response_id) = match self.target() {
			Some(t) => (t.key_bitmask, t.transaction_id, t.response_id),
			None => (0, 0, 0)
		};

		let (key, key_index) = match (key, self.ctx.stack.shared_key_index(bitmask)) {
			(Some(key), Some(index)) => (key, index),
			_ => {
				log::warn!("initiator: no network key to hand over");
				self.ctx.raise(Input::Initiator(Event::Abort));
				return;
			}
		};

		self.session.key = key;
		self.session.key_index = key_index;

		self.ctx.shared.key_slot.acquire(ROLE);
		self.ctx.request(ROLE, Operation::EncryptKey { key, key_index, transaction_id, response_id });
	}

	fn send_join_request(&mut self) {
		if let Some(Completed::KeyEncrypted { encrypted }) = self.session.completed {
			self.session.encrypted = encrypted;
		}

		let result = match self.session.mode {
			Mode::Start => self.start_request(),
			_ => self.join_request()
		};

		match result {
			Ok(command) => {
				self.send_to_target(command);
				self.ctx.arm(ROLE, TimerId::Initiator, self.ctx.config.response_timeout_ms);
			},
			Err(e) => {
				log::warn!("initiator: address allocation failed: {:?}", e);
				self.ctx.raise(Input::Initiator(Event::Abort));
			}
		}
	}

	fn allocate_for_target(&mut self) -> Result<(zll::NetworkJoinRequest, u16), AllocError> {
		let (group_count, delegate) = match self.target() {
			Some(t) => (t.group_id_count, t.zll_info.address_assignment),
			None => (0, false)
		};

		let peer = self.ctx.stack.allocate_for_peer(group_count, delegate)?;

		if peer.random {
			log::debug!("peer address {:#06x} picked stochastically", peer.network_address);
		}

		let request = NetworkJoinRequest {
			transaction_id: self.target_transaction(),
			extended_pan_id: self.session.network.extended_pan_id,
			key_index: self.session.key_index,
			encrypted_network_key: self.session.encrypted,
			network_update_id: self.session.network.update_id,
			logical_channel: self.session.network.channel,
			pan_id: self.session.network.pan_id,
			network_address: peer.network_address,
			group_ids_begin: peer.groups.begin,
			group_ids_end: peer.groups.end,
			free_network_address_range_begin: peer.free_addresses.begin,
			free_network_address_range_end: peer.free_addresses.end,
			free_group_id_range_begin: peer.free_groups.begin,
			free_group_id_range_end: peer.free_groups.end
		};

		Ok((request, peer.network_address))
	}

	fn start_request(&mut self) -> Result<Command, AllocError> {
		let group_count = self.ctx.stack.group_id_count();
		let own = self.ctx.stack.allocate_self(group_count)?;

		self.session.network.channel = self.target().map_or(0, |t| t.channel);
		self.session.network.network_address = own.network_address;
		self.session.own_groups = own.groups;

		let (r, peer) = self.allocate_for_target()?;

		self.session.peer_address = peer;

		if !own.groups.is_empty() {
			for s in self.subscribers.iter_mut() {
				s(&Indication::GroupsAssigned(own.groups));
			}
		}

		Ok(Command::NetworkStartRequest(NetworkStartRequest {
			transaction_id: r.transaction_id,
			extended_pan_id: r.extended_pan_id,
			key_index: r.key_index,
			encrypted_network_key: r.encrypted_network_key,
			logical_channel: r.logical_channel,
			pan_id: r.pan_id,
			network_address: r.network_address,
			group_ids_begin: r.group_ids_begin,
			group_ids_end: r.group_ids_end,
			free_network_address_range_begin: r.free_network_address_range_begin,
			free_network_address_range_end: r.free_network_address_range_end,
			free_group_id_range_begin: r.free_group_id_range_begin,
			free_group_id_range_end: r.free_group_id_range_end,
			initiator_ieee_address: self.ctx.stack.ieee_address(),
			initiator_network_address: own.network_address
		}))
	}

	fn join_request(&mut self) -> Result<Command, AllocError> {
		self.session.network = match self.ctx.stack.network() {
			Some(n) => n,
			None => return Err(AllocError::IllegalParameters)
		};

		let (r, peer) = self.allocate_for_target()?;

		self.session.peer_address = peer;

		let router = self.target().map_or(true, |t| t.zigbee_info.is_router());

		Ok(if router { Command::NetworkJoinRouterRequest(r) } else { Command::NetworkJoinEndDeviceRequest(r) })
	}

	fn accept_start(&mut self) {
		if let Some(Command::NetworkStartResponse(r)) = self.command() {
			let network = NetworkParams {
				extended_pan_id: r.extended_pan_id,
				channel: r.logical_channel,
				pan_id: r.pan_id,
				network_address: self.session.network.network_address,
				update_id: r.network_update_id
			};

			self.session.network = network;
		}

		self.leave(Status::Ok);
	}

	fn join_locally(&mut self) {
		let params = JoinParams {
			network: self.session.network,
			key: self.session.key,
			groups: self.session.own_groups,
			start: false
		};

		self.ctx.request(ROLE, Operation::JoinNetwork(params));
	}

	fn send_probe(&mut self) {
		self.session.probes_sent += 1;

		*self.ctx.sequence = self.ctx.sequence.wrapping_add(1);

		let operation = Operation::SendIeeeAddrRequest {
			network_address: self.session.peer_address,
			sequence_number: *self.ctx.sequence
		};

		log::debug!("liveness probe {} to {:#06x}", self.session.probes_sent, self.session.peer_address);

		self.ctx.request(ROLE, operation);
		self.ctx.arm(ROLE, TimerId::Initiator, self.ctx.config.liveness_interval_ms);
	}

	fn conclude(&mut self, status: Status) {
		self.ctx.request(ROLE, Operation::Reconnect);
		self.session.status = Some(status);
		self.finish();
	}
}

impl Executor<Condition, Action> for Actor<'_, '_, '_> {
	fn check(&self, condition: Condition, arg1: u32, _arg2: u32) -> bool {
		match condition {
			C::IsScan => self.session.task == Task::Scan,
			C::IsJoin => self.session.task == Task::Join,
			C::IsDeviceInfo => self.session.task == Task::DeviceInfo,
			C::StopRequested => self.session.stop_requested,
			C::AcceptScanResponse => self.accept_scan_response(),
			C::ScanExhausted => self.session.plan_index + 1 >= self.session.plan.len(),
			C::SameChannel => self.session.plan.get(self.session.plan_index + 1) == self.session.plan.get(self.session.plan_index),
			C::MorePages => self.more_pages(),
			C::FromTarget => self.from_target(),
			C::Unsupported => self.unsupported(),
			C::SamePan => self.session.mode == Mode::Update,
			C::FindPan => self.session.mode == Mode::Start && !self.ctx.stack.is_end_device(),
			C::StartAccepted => self.start_accepted(),
			C::JoinAccepted => self.join_accepted(),
			C::LocalJoin => self.session.mode == Mode::Start,
			C::Succeeded => arg1 != 0,
			C::SkipLiveness => self.session.skip_liveness,
			C::ProbeAnswered => self.probe_answered(true),
			C::ProbeRejected => self.probe_answered(false),
			C::ProbesLeft => self.session.probes_sent < self.ctx.config.liveness_attempts,
		}
	}

	fn execute(&mut self, action: Action, _arg1: u32, _arg2: u32) {
		match action {
			A::EnterScanChannel => self.enter_scan_channel(),
			A::SendScanRequest => self.send_scan_request(),
			A::AddCandidate => self.add_candidate(),
			A::NextScanRequest => {
				self.session.plan_index += 1;
				self.send_scan_request();
			},
			A::NextScanChannel => {
				self.session.plan_index += 1;
				self.enter_scan_channel();
			},
			A::MarkStop => self.session.stop_requested = true,
			A::LeaveOk => self.leave(Status::Ok),
			A::LeaveStopped => self.leave(Status::Stopped),
			A::LeaveFailed => self.leave(Status::Failure),
			A::Finish => self.finish(),
			A::EnterTargetChannel => {
				let channel = self.target().map_or(0, |t| t.channel);

				self.ctx.enter_inter_pan(ROLE, channel);
			},
			A::SendDeviceInfoRequest => self.send_device_info_request(),
			A::SendAndLeave => self.send_and_leave(),
			A::StoreAndRequestNext => {
				self.store_records();
				self.send_device_info_request();
			},
			A::StoreAndLeave => {
				self.store_records();
				self.leave(Status::Ok);
			},
			A::SendUpdate => self.send_update(),
			A::RequestFreePan => self.ctx.request(ROLE, Operation::FindFreePan),
			A::EncryptKey => self.encrypt_key(),
			A::SendJoinRequest => self.send_join_request(),
			A::AcceptStart => self.accept_start(),
			A::AcceptUpdate => self.leave(Status::Ok),
			A::JoinLocally => self.join_locally(),
			A::StartupDelay => self.ctx.arm(ROLE, TimerId::Initiator, self.ctx.config.min_startup_delay_ms),
			A::SendProbe => self.send_probe(),
			A::Succeed => self.conclude(Status::Ok),
			A::FailAfterJoin => self.conclude(Status::Failure),
			A::NotEstablished => {
				log::warn!("no answer from {:#06x} after {} probes", self.session.peer_address, self.session.probes_sent);
				self.conclude(Status::CommunicationNotEstablished);
			},
			A::CancelTimer => self.ctx.cancel(ROLE, TimerId::Initiator),
			A::Reset => {
				*self.session = Session::default();
				self.ctx.shared.end_handshake(ROLE);
			},
		}
	}
}
