//! Counter-example reconstruction: walks `ProofContext::parent` backward
//! from a failure to the initial state, then reverses the chain into
//! chronological order.
//!
//! Each frame names the program whose step produced the *next* frame in
//! chronological order (the failing frame is the exception: it names the
//! program whose op or assertion check actually failed). This lines up with
//! how a renderer wants to draw a trace -- at every step, highlight which
//! program is about to act -- and is exactly the convention the
//! Python original's `traceback` helper used, which this module preserves.

use crate::diag::InternalInvariantViolation;
use crate::explorer::ProofContext;
use crate::program::State;

/// One step of a reconstructed counter-example: a state, plus the index of
/// the program associated with this step (see the module doc for exactly
/// what that means for the final frame versus every other one).
#[derive(Debug, Clone)]
pub struct TraceFrame {
    pub state: State,
    pub program_index: usize,
}

/// Reconstructs the witness path from the initial state to `ctx.failure`,
/// in chronological order. Returns an empty chain if the search proved the
/// property (no failure to explain).
///
/// Fails with [`InternalInvariantViolation::MalformedTraceback`] if two
/// consecutive states in the parent chain differ in anything other than
/// exactly one position component -- this can only happen if the explorer
/// itself has a bug, since every transition it records changes exactly one
/// program's counter.
pub fn traceback(ctx: &ProofContext) -> Result<Vec<TraceFrame>, InternalInvariantViolation> {
    let failure = match &ctx.failure {
        Some(f) => f,
        None => return Ok(Vec::new()),
    };

    let mut chain = vec![TraceFrame {
        state: failure.state.clone(),
        program_index: failure.program_index,
    }];

    loop {
        let current = &chain.last().expect("chain is never empty").state;
        let parent = match ctx.parent.get(current) {
            Some(Some(parent)) => parent.clone(),
            Some(None) => break,
            None => {
                // Not reachable if `current` really came from `ctx.parent`'s
                // own keys, but guards against a caller handing us a stale
                // or foreign `ProofContext`.
                break;
            }
        };
        let program_index = differing_position(&parent, current)?;
        chain.push(TraceFrame {
            state: parent,
            program_index,
        });
    }

    chain.reverse();
    Ok(chain)
}

fn differing_position(parent: &State, child: &State) -> Result<usize, InternalInvariantViolation> {
    let differences: Vec<usize> = parent
        .positions
        .iter()
        .zip(child.positions.iter())
        .enumerate()
        .filter(|(_, (a, b))| a != b)
        .map(|(i, _)| i)
        .collect();
    if differences.len() != 1 {
        return Err(InternalInvariantViolation::MalformedTraceback {
            expected: 1,
            found: differences.len(),
        });
    }
    Ok(differences[0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assertion::halts_assert;
    use crate::explorer::run;
    use crate::expr::Expr;
    use crate::memory::{DomainSpec, MemoryMap};
    use crate::program::{Op, Program, Stmt};

    #[test]
    fn no_failure_yields_empty_chain() {
        let mm = MemoryMap::build(vec![("_", DomainSpec::Bool)]).unwrap();
        let p = Program::build("idle", vec![]).unwrap();
        let ctx = run(vec![p], mm, &[], false).unwrap();
        assert!(traceback(&ctx).unwrap().is_empty());
    }

    #[test]
    fn chain_is_chronological_and_ends_on_failure() {
        // Two ops (a non-jumping `Cond` then a `Goto` back to it), the same
        // shape `while true: pass` lowers to in `demos::halting` -- a
        // single-op self-loop would close the cycle at the initial state
        // itself and yield a one-frame chain.
        let mm = MemoryMap::build(vec![("_", DomainSpec::Bool)]).unwrap();
        let p = Program::build(
            "loop",
            vec![
                Stmt::Label("begin".into()),
                Stmt::Op(Op::Cond {
                    pred: Expr::constant(true),
                    target: "end".into(),
                    negate: true,
                }),
                Stmt::Op(Op::Goto {
                    target: "begin".into(),
                }),
                Stmt::Label("end".into()),
            ],
        )
        .unwrap();
        let assertions = vec![halts_assert()];
        let ctx = run(vec![p], mm, &assertions, false).unwrap();
        let chain = traceback(&ctx).unwrap();
        assert!(chain.len() >= 2);
        // Chronological: the first frame is the initial state.
        assert!(chain[0].state.positions.iter().all(|&p| p == 0));
        // Consecutive frames differ in exactly one position component.
        for w in chain.windows(2) {
            differing_position(&w[0].state, &w[1].state).unwrap();
        }
    }
}
