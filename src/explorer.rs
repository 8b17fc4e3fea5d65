//! The state-space explorer: a deterministic depth-first search over the
//! global-state graph, with atomic-region handling, cycle detection, and
//! assertion evaluation at every discovered state.
//!
//! This is the hardest and largest part of the crate, so its structure
//! follows the distilled spec's per-pop procedure almost line for line:
//! each stack frame pairs a state with the set of programs allowed to run
//! next (all of them, or a single program mid-atomic-region), assertions run
//! before any successor is computed, and the visited set doubles as the
//! closed set that drives cycle detection. `fnv`'s hasher is used for the
//! parent map the way the teacher's Nameset and ScopeResult lean on `fnv`
//! for their lookup tables -- this is the hottest path in the crate and a
//! `HashMap<State, _>` keyed the usual way pays for a much better-than-SipHash
//! hash on every insert and probe.

use fnv::FnvHashMap;
use log::trace;

use crate::assertion::{Assertion, AssertionFailure, StateView};
use crate::diag::ConfigurationError;
use crate::memory::MemoryMap;
use crate::program::{Program, State, StepOutcome};

/// Captured at the moment an op or assertion fails: the state it failed in,
/// which program's step or check produced the failure, and the failure
/// itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunFailure {
    pub state: State,
    pub program_index: usize,
    pub error: AssertionFailure,
}

/// The explorer's output. `parent` reflects the first path by which the
/// explorer reached each state (DFS discovery order, ascending program
/// index as tie-break); the initial state maps to `None`. Owned by a single
/// checking run and either rendered or discarded.
pub struct ProofContext {
    pub programs: Vec<Program>,
    pub memory_map: MemoryMap,
    pub parent: FnvHashMap<State, Option<State>>,
    pub failure: Option<RunFailure>,
}

impl ProofContext {
    /// `true` iff the search found no assertion violation: every reachable
    /// state (and every cycle-closing edge) satisfied every assertion.
    pub fn proved(&self) -> bool {
        self.failure.is_none()
    }

    pub fn reachable_state_count(&self) -> usize {
        self.parent.len()
    }
}

/// Which programs the explorer is allowed to schedule out of a given stack
/// frame. `Only` encodes "we are mid-atomic-region in this program -- do not
/// interleave others until it ends".
#[derive(Debug, Clone, Copy)]
enum Allowed {
    All,
    Only(usize),
}

impl Allowed {
    fn candidates(self, program_count: usize) -> Vec<usize> {
        match self {
            Allowed::All => (0..program_count).collect(),
            Allowed::Only(i) => vec![i],
        }
    }
}

/// Runs the exhaustive interleaving search over `programs` sharing `memory_map`,
/// checking `assertions` at every discovered state. Returns the resulting
/// `ProofContext` whether or not the search found a failure; only a fatal
/// configuration problem (an out-of-domain `mov`, or a label that resolves
/// out of bounds at run time) returns `Err` and aborts the run outright, per
/// the distilled spec's error-propagation policy.
///
/// `log_transitions` gates the per-state `trace!` below -- off by default
/// since even a small state space produces one line per discovered state.
pub fn run(
    programs: Vec<Program>,
    memory_map: MemoryMap,
    assertions: &[Box<dyn Assertion>],
    log_transitions: bool,
) -> Result<ProofContext, ConfigurationError> {
    let name_index: FnvHashMap<String, usize> = programs
        .iter()
        .enumerate()
        .map(|(i, p)| (p.name.clone(), i))
        .collect();

    let initial = State::initial(&programs, &memory_map);
    let mut parent: FnvHashMap<State, Option<State>> = FnvHashMap::default();
    parent.insert(initial.clone(), None);

    let mut stack: Vec<(State, Allowed)> = vec![(initial, Allowed::All)];
    let mut failure = None;

    'search: while let Some((state, allowed)) = stack.pop() {
        if log_transitions {
            trace!(
                "popped state positions={:?} (frontier depth {})",
                state.positions,
                stack.len()
            );
        }

        let view = StateView::new(&state, &programs, &name_index, &memory_map);
        if let Some(violation) = first_violation(assertions, &name_index, &view, false) {
            let program_index = violation.0;
            failure = Some(RunFailure {
                state: state.clone(),
                program_index,
                error: violation.1,
            });
            break 'search;
        }

        for i in allowed.candidates(programs.len()) {
            if state.is_halted(&programs, i) {
                continue;
            }
            let outcome = programs[i].step(state.positions[i] as usize, &state.memory, &memory_map)?;
            let (next_pos, next_memory, atomic_continue) = match outcome {
                StepOutcome::AssertionFailed(msg) => {
                    failure = Some(RunFailure {
                        state: state.clone(),
                        program_index: i,
                        error: AssertionFailure(msg),
                    });
                    break 'search;
                }
                StepOutcome::Transitioned {
                    next_pos,
                    memory,
                    atomic_continue,
                } => (next_pos, memory, atomic_continue),
            };

            let next_state = state.with_position_and_memory(i, next_pos, next_memory);

            if parent.contains_key(&next_state) {
                // Cycle: re-check assertions against the *current* state
                // (the one whose successor loops back), not the revisited
                // successor -- see the module doc and DESIGN.md for why this
                // asymmetry is preserved deliberately.
                let cur_view = StateView::new(&state, &programs, &name_index, &memory_map);
                if let Some(violation) = first_violation(assertions, &name_index, &cur_view, true) {
                    failure = Some(RunFailure {
                        state: state.clone(),
                        program_index: violation.0,
                        error: violation.1,
                    });
                    break 'search;
                }
                continue;
            }

            parent.insert(next_state.clone(), Some(state.clone()));
            let next_allowed = if atomic_continue {
                Allowed::Only(i)
            } else {
                Allowed::All
            };
            stack.push((next_state, next_allowed));
        }
    }

    Ok(ProofContext {
        programs,
        memory_map,
        parent,
        failure,
    })
}

/// Evaluates every assertion in order, returning the offending program index
/// and the failure for the first assertion that fails, or `None` if they all
/// held. The program index comes from [`Assertion::program_hint`] when the
/// assertion names one (as `PositionalAssert` does); assertions with no
/// natural program association (such as `NeverCyclesAssert`) fall back to
/// program 0 -- this is advisory metadata only, the traceback's own
/// consistency check relies on parent pointers and position deltas, not on
/// this field.
fn first_violation(
    assertions: &[Box<dyn Assertion>],
    name_index: &FnvHashMap<String, usize>,
    view: &StateView<'_>,
    cyclic: bool,
) -> Option<(usize, AssertionFailure)> {
    assertions.iter().find_map(|assertion| {
        assertion.check(view, cyclic).err().map(|e| {
            let index = assertion
                .program_hint()
                .and_then(|name| name_index.get(name).copied())
                .unwrap_or(0);
            (index, e)
        })
    })
}
