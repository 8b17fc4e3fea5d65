//! `blacheck`: an exhaustive interleaving model checker for small
//! concurrent programs built from a finite-domain memory model.
//!
//! [`proof`] is the single entry point: hand it the programs that make up
//! one concurrent system, the memory map they share, and the assertions to
//! check, and it runs a deterministic depth-first search over every
//! possible interleaving, returning a [`ProofContext`] that is either
//! `proved()` or carries a reproducible counter-example via
//! [`trace::traceback`].

pub mod assertion;
pub mod demos;
pub mod diag;
pub mod expr;
pub mod explorer;
pub mod lower;
pub mod memory;
pub mod program;
pub mod render;
pub mod trace;

pub use assertion::{Assertion, AssertionFailure, StateView};
pub use diag::{CheckerError, ConfigurationError, InternalInvariantViolation, SyntaxError};
pub use explorer::{ProofContext, RunFailure};
pub use memory::{DomainSpec, Memory, MemoryMap, Reference, Value, VarType};
pub use program::{Op, Program, State, StepOutcome};
pub use trace::{traceback, TraceFrame};

/// Knobs that do not change checking semantics, only how much the run tells
/// the log about itself -- mirrors how `DbOptions` is threaded through
/// `Database::new` without affecting what gets verified.
#[derive(Debug, Clone, Copy)]
pub struct CheckOptions {
    /// Emit a `log::trace!` line for every state popped off the search
    /// stack (threaded into `explorer::run`, which does the actual
    /// gating). Off by default -- even a small state space produces one
    /// line per discovered state, which floods a default-level log.
    pub log_transitions: bool,
}

impl Default for CheckOptions {
    fn default() -> Self {
        CheckOptions {
            log_transitions: false,
        }
    }
}

/// Runs the exhaustive interleaving search and returns the resulting
/// [`ProofContext`]. This is a thin wrapper over [`explorer::run`]; `options`
/// only affects logging verbosity, never the set of states explored or the
/// verdict reached.
pub fn proof(
    programs: Vec<Program>,
    memory_map: MemoryMap,
    assertions: &[Box<dyn Assertion>],
    options: CheckOptions,
) -> Result<ProofContext, ConfigurationError> {
    log::info!(
        "starting proof: {} program(s), {} memory slot(s), {} assertion(s)",
        programs.len(),
        memory_map.len(),
        assertions.len()
    );
    if options.log_transitions {
        log::debug!("transition logging enabled for this run");
    }
    let ctx = explorer::run(programs, memory_map, assertions, options.log_transitions)?;
    log::info!(
        "proof finished: {} reachable state(s), proved={}",
        ctx.reachable_state_count(),
        ctx.proved()
    );
    Ok(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assertion::halts_assert;

    #[test]
    fn proof_proves_idle_program() {
        let mm = MemoryMap::build(vec![("_", DomainSpec::Bool)]).unwrap();
        let p = Program::build("idle", vec![]).unwrap();
        let ctx = proof(vec![p], mm, &[], CheckOptions::default()).unwrap();
        assert!(ctx.proved());
    }

    #[test]
    fn proof_reports_failure_for_looping_program_under_halts_assert() {
        let mm = MemoryMap::build(vec![("_", DomainSpec::Bool)]).unwrap();
        let p = Program::build(
            "loop",
            vec![
                program::Stmt::Label("begin".into()),
                program::Stmt::Op(Op::Goto {
                    target: "begin".into(),
                }),
            ],
        )
        .unwrap();
        let assertions = vec![halts_assert()];
        let ctx = proof(vec![p], mm, &assertions, CheckOptions::default()).unwrap();
        assert!(!ctx.proved());
    }
}
