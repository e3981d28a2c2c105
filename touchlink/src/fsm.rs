//table driven state machine shared by both commissioning roles
//
//a table is an ordered list of transitions plus entry/exit hooks per state.
//`Table::step` picks the first matching transition and returns what has to
//run, in order; `Machine` owns the current state and refuses to be dispatched
//while one of its own effects is still running

use core::cell::Cell;
use core::fmt::Debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source<S> {
	Any,
	State(S)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum On<E> {
	//matches every event
	Other,
	Event(E)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Next<S> {
	//stay, run the action only
	Same,
	State(S)
}

#[derive(Debug, Clone, Copy)]
pub struct Transition<S, E, C, A> {
	pub from: Source<S>,
	pub on: On<E>,
	pub when: Option<C>,
	pub action: Option<A>,
	pub to: Next<S>
}

pub const fn row<S, E, C, A>(from: Source<S>, on: On<E>, when: Option<C>, action: Option<A>, to: Next<S>) -> Transition<S, E, C, A> {
	Transition { from, on, when, action, to }
}

#[derive(Debug, Clone, Copy)]
pub struct Hooks<S, A> {
	pub state: S,
	pub entry: Option<A>,
	pub exit: Option<A>
}

pub struct Table<S: 'static, E: 'static, C: 'static, A: 'static> {
	pub transitions: &'static [Transition<S, E, C, A>],
	pub hooks: &'static [Hooks<S, A>]
}

//effects of one matched transition, in execution order: exit, (state change), action, entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step<S, A> {
	pub exit: Option<A>,
	pub to: Option<S>,
	pub action: Option<A>,
	pub entry: Option<A>
}

impl<S, E, C, A> Table<S, E, C, A>
where
	S: Copy + PartialEq,
	E: Copy + PartialEq,
	C: Copy,
	A: Copy
{
	fn hooks_of(&self, state: S) -> Option<&Hooks<S, A>> {
		self.hooks.iter().find(|h| h.state == state)
	}

	pub fn step<F>(&self, state: S, event: E, arg1: u32, arg2: u32, mut check: F) -> Option<Step<S, A>>
	where
		F: FnMut(C, u32, u32) -> bool
	{
		let t = self.transitions.iter().find(|t| {
			let from = match t.from {
				Source::Any => true,
				Source::State(s) => s == state
			};

			let on = match t.on {
				On::Other => true,
				On::Event(e) => e == event
			};

			from && on && t.when.map_or(true, |c| check(c, arg1, arg2))
		})?;

		let step = match t.to {
			Next::Same => Step {
				exit: None,
				to: None,
				action: t.action,
				entry: None
			},
			Next::State(to) => Step {
				exit: self.hooks_of(state).and_then(|h| h.exit),
				to: Some(to),
				action: t.action,
				entry: self.hooks_of(to).and_then(|h| h.entry)
			}
		};

		Some(step)
	}
}

pub trait Executor<C, A> {
	fn check(&self, condition: C, arg1: u32, arg2: u32) -> bool;
	fn execute(&mut self, action: A, arg1: u32, arg2: u32);
}

pub struct Machine<S: Copy> {
	name: &'static str,
	state: Cell<S>,
	busy: Cell<bool>
}

impl<S: Copy + PartialEq + Debug> Machine<S> {
	pub fn new(name: &'static str, initial: S) -> Self {
		Machine {
			name,
			state: Cell::new(initial),
			busy: Cell::new(false)
		}
	}

	pub fn state(&self) -> S {
		self.state.get()
	}

	pub fn is_busy(&self) -> bool {
		self.busy.get()
	}

	//returns false when no transition matched
	pub fn dispatch<E, C, A, X>(&self, table: &Table<S, E, C, A>, event: E, arg1: u32, arg2: u32, exec: &mut X) -> bool
	where
		E: Copy + PartialEq + Debug,
		C: Copy,
		A: Copy + Debug,
		X: Executor<C, A>
	{
		if self.busy.get() {
			panic!("{}: recursive dispatch of {:?} in state {:?}", self.name, event, self.state.get());
		}

		let from = self.state.get();

		let step = match table.step(from, event, arg1, arg2, |c, a, b| exec.check(c, a, b)) {
			Some(step) => step,
			None => {
				log::trace!("{}: {:?} not handled in {:?}", self.name, event, from);
				return false;
			}
		};

		self.busy.set(true);

		if let Some(a) = step.exit {
			exec.execute(a, arg1, arg2);
		}

		if let Some(to) = step.to {
			log::debug!("{}: {:?} -> {:?} on {:?}", self.name, from, to, event);
			self.state.set(to);
		}

		if let Some(a) = step.action {
			exec.execute(a, arg1, arg2);
		}

		if let Some(a) = step.entry {
			exec.execute(a, arg1, arg2);
		}

		self.busy.set(false);

		true
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use Source::{ Any, State };
	use On::{ Other, Event };

	#[derive(Debug, Clone, Copy, PartialEq, Eq)]
	enum S { Off, On, Broken }

	#[derive(Debug, Clone, Copy, PartialEq, Eq)]
	enum E { Press, Kick, Tick }

	#[derive(Debug, Clone, Copy, PartialEq, Eq)]
	enum C { Arg1IsOne, Never }

	#[derive(Debug, Clone, Copy, PartialEq, Eq)]
	enum A { Light, Dark, Count, EnterOn, LeaveOn, Shout }

	static TABLE: Table<S, E, C, A> = Table {
		transitions: &[
			row(State(S::Off), Event(E::Press), Some(C::Never), Some(A::Shout), Next::State(S::Broken)),
			row(State(S::Off), Event(E::Press), None, Some(A::Light), Next::State(S::On)),
			row(State(S::On), Event(E::Press), Some(C::Arg1IsOne), Some(A::Count), Next::Same),
			row(State(S::On), Event(E::Press), None, Some(A::Dark), Next::State(S::Off)),
			row(Any, Event(E::Kick), None, None, Next::State(S::Broken)),
			row(State(S::Broken), Other, None, Some(A::Shout), Next::Same),
		],
		hooks: &[
			Hooks { state: S::On, entry: Some(A::EnterOn), exit: Some(A::LeaveOn) },
		]
	};

	#[derive(Default)]
	struct Recorder {
		log: Vec<A>
	}

	impl Executor<C, A> for Recorder {
		fn check(&self, condition: C, arg1: u32, _arg2: u32) -> bool {
			match condition {
				C::Arg1IsOne => arg1 == 1,
				C::Never => false
			}
		}

		fn execute(&mut self, action: A, _arg1: u32, _arg2: u32) {
			self.log.push(action);
		}
	}

	#[test]
	fn step_is_pure() {
		let step = TABLE.step(S::Off, E::Press, 0, 0, |_, _, _| false).unwrap();

		assert_eq!(step, Step { exit: None, to: Some(S::On), action: Some(A::Light), entry: Some(A::EnterOn) });
	}

	#[test]
	fn failing_condition_falls_through() {
		let m = Machine::new("test", S::Off);
		let mut r = Recorder::default();

		assert!(m.dispatch(&TABLE, E::Press, 0, 0, &mut r));
		assert_eq!(m.state(), S::On);
		assert_eq!(r.log, vec![A::Light, A::EnterOn]);
	}

	#[test]
	fn same_skips_hooks() {
		let m = Machine::new("test", S::On);
		let mut r = Recorder::default();

		m.dispatch(&TABLE, E::Press, 1, 0, &mut r);

		assert_eq!(m.state(), S::On);
		assert_eq!(r.log, vec![A::Count]);
	}

	#[test]
	fn exit_runs_before_action() {
		let m = Machine::new("test", S::On);
		let mut r = Recorder::default();

		m.dispatch(&TABLE, E::Press, 2, 0, &mut r);

		assert_eq!(m.state(), S::Off);
		assert_eq!(r.log, vec![A::LeaveOn, A::Dark]);
	}

	#[test]
	fn wildcards() {
		let m = Machine::new("test", S::On);
		let mut r = Recorder::default();

		m.dispatch(&TABLE, E::Kick, 0, 0, &mut r);
		assert_eq!(m.state(), S::Broken);

		m.dispatch(&TABLE, E::Tick, 0, 0, &mut r);
		assert_eq!(r.log, vec![A::LeaveOn, A::Shout]);
	}

	#[test]
	fn unhandled_event() {
		let m = Machine::new("test", S::Off);
		let mut r = Recorder::default();

		assert!(!m.dispatch(&TABLE, E::Tick, 0, 0, &mut r));
		assert_eq!(m.state(), S::Off);
		assert!(r.log.is_empty());
	}

	struct Reentrant<'a> {
		machine: &'a Machine<S>
	}

	impl Executor<C, A> for Reentrant<'_> {
		fn check(&self, _condition: C, _arg1: u32, _arg2: u32) -> bool {
			false
		}

		fn execute(&mut self, _action: A, _arg1: u32, _arg2: u32) {
			let mut inner = Recorder::default();

			self.machine.dispatch(&TABLE, E::Press, 0, 0, &mut inner);
		}
	}

	#[test]
	#[should_panic(expected = "recursive dispatch")]
	fn recursion_is_fatal() {
		let m = Machine::new("test", S::Off);
		let mut r = Reentrant { machine: &m };

		m.dispatch(&TABLE, E::Press, 0, 0, &mut r);
	}
}
