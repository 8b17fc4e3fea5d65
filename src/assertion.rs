//! Predicates over global state, evaluated by the explorer at every state
//! plus once more, in a distinguished "cyclic" mode, whenever a transition
//! closes a cycle back to an already-visited state.
//!
//! The distilled spec's design notes suggest modelling assertions as "a
//! tagged variant with an escape-hatch predicate-function variant" for
//! extensibility. This crate reaches the same goal the more idiomatic way:
//! [`Assertion`] is a trait, the two built-ins implement it directly, and a
//! user-defined assertion is just another implementor -- no escape hatch
//! needed because the trait itself is the extensibility point.

use std::fmt;
use std::sync::Arc;

use fnv::FnvHashMap;

use crate::memory::{Memory, Reference, Value};
use crate::program::{Program, State};

/// Raised by an op or by [`Assertion::check`]. Caught by the explorer and
/// converted into a `RunFailure`; never propagates past it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionFailure(pub String);

impl fmt::Display for AssertionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for AssertionFailure {}

/// A read-only projection of `(State, programs, memory_map)`, handed to
/// assertions so they never see the explorer's internals.
pub struct StateView<'a> {
    state: &'a State,
    programs: &'a [Program],
    name_index: &'a FnvHashMap<String, usize>,
    mm: &'a crate::memory::MemoryMap,
}

impl<'a> StateView<'a> {
    pub fn new(
        state: &'a State,
        programs: &'a [Program],
        name_index: &'a FnvHashMap<String, usize>,
        mm: &'a crate::memory::MemoryMap,
    ) -> Self {
        StateView {
            state,
            programs,
            name_index,
            mm,
        }
    }

    /// The current op index of the program named `name`, or `None` if no
    /// program carries that name.
    pub fn pos(&self, name: &str) -> Option<usize> {
        let idx = *self.name_index.get(name)?;
        Some(self.state.positions[idx] as usize)
    }

    pub fn var(&self, reference: &Reference) -> Option<Value> {
        let slot = self.mm.addr(reference).ok()?;
        Some(self.state.memory.get(slot))
    }

    pub fn memory(&self) -> &Memory {
        &self.state.memory
    }

    pub fn state(&self) -> &State {
        self.state
    }
}

/// A predicate that may fail a proof. Invoked at every discovered state with
/// `cyclic = false`, and once more with `cyclic = true` against the state
/// whose successor closed a cycle (see `crate::explorer`'s cycle-detection
/// note for why it is the predecessor, not the revisited state, that gets
/// the cyclic check).
pub trait Assertion: Send + Sync {
    fn check(&self, view: &StateView<'_>, cyclic: bool) -> Result<(), AssertionFailure>;

    /// The name of the program this assertion is conceptually attached to,
    /// if any. Used only to fill in `RunFailure::program_index` with
    /// something more informative than 0 for assertions (like
    /// [`NeverCyclesAssert`]) that are not about any one program.
    fn program_hint(&self) -> Option<&str> {
        None
    }
}

/// Fires only when the named program's counter equals `pos`; otherwise a
/// no-op. `cyclic` is ignored -- this is the ordinary "assert" at a specific
/// program point.
pub struct PositionalAssert {
    pub program_name: String,
    pub pos: usize,
    pub msg: String,
    predicate: Arc<dyn Fn(&Memory) -> bool + Send + Sync>,
}

impl PositionalAssert {
    pub fn new(
        program_name: impl Into<String>,
        pos: usize,
        msg: impl Into<String>,
        predicate: impl Fn(&Memory) -> bool + Send + Sync + 'static,
    ) -> Self {
        PositionalAssert {
            program_name: program_name.into(),
            pos,
            msg: msg.into(),
            predicate: Arc::new(predicate),
        }
    }
}

impl Assertion for PositionalAssert {
    fn check(&self, view: &StateView<'_>, _cyclic: bool) -> Result<(), AssertionFailure> {
        if view.pos(&self.program_name) != Some(self.pos) {
            return Ok(());
        }
        if !(self.predicate)(view.memory()) {
            return Err(AssertionFailure(format!(
                "{}:{}: {}",
                self.program_name, self.pos, self.msg
            )));
        }
        Ok(())
    }

    fn program_hint(&self) -> Option<&str> {
        Some(&self.program_name)
    }
}

/// The sole liveness hook: fails iff invoked with `cyclic = true`. Aliased
/// as [`halts_assert`] for the common case of wanting exactly one instance.
pub struct NeverCyclesAssert;

impl Assertion for NeverCyclesAssert {
    fn check(&self, _view: &StateView<'_>, cyclic: bool) -> Result<(), AssertionFailure> {
        if cyclic {
            Err(AssertionFailure("cycle detected".to_string()))
        } else {
            Ok(())
        }
    }
}

/// Convenience constructor for the boxed form most callers want when
/// assembling an assertion list for `proof`.
pub fn halts_assert() -> Box<dyn Assertion> {
    Box::new(NeverCyclesAssert)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{DomainSpec, MemoryMap};
    use crate::program::Program;

    fn view_fixture<'a>(
        state: &'a State,
        programs: &'a [Program],
        names: &'a FnvHashMap<String, usize>,
        mm: &'a MemoryMap,
    ) -> StateView<'a> {
        StateView::new(state, programs, names, mm)
    }

    #[test]
    fn never_cycles_only_fails_when_cyclic() {
        let mm = MemoryMap::build(vec![("a", DomainSpec::Bool)]).unwrap();
        let program = Program::build("p", vec![]).unwrap();
        let programs = vec![program];
        let state = State::initial(&programs, &mm);
        let mut names = FnvHashMap::default();
        names.insert("p".to_string(), 0);
        let view = view_fixture(&state, &programs, &names, &mm);

        let assertion = NeverCyclesAssert;
        assert!(assertion.check(&view, false).is_ok());
        assert!(assertion.check(&view, true).is_err());
    }

    #[test]
    fn positional_assert_only_fires_at_its_position() {
        let mm = MemoryMap::build(vec![("a", DomainSpec::Bool)]).unwrap();
        let program = Program::build("p", vec![]).unwrap();
        let programs = vec![program];
        let mut state = State::initial(&programs, &mm);
        let mut names = FnvHashMap::default();
        names.insert("p".to_string(), 0);

        let assertion = PositionalAssert::new("p", 3, "never true", |_| false);
        let view = view_fixture(&state, &programs, &names, &mm);
        assert!(assertion.check(&view, false).is_ok());

        state.positions[0] = 3;
        let view = view_fixture(&state, &programs, &names, &mm);
        assert!(assertion.check(&view, false).is_err());
    }
}
