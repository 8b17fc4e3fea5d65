//! Flat op list, label table, atomic mask -- the compiled unit the explorer
//! actually schedules.
//!
//! The distilled spec's design notes call for modelling an op not as a
//! closure over captured memory but as a tagged variant; [`Op`] is that
//! variant, and [`Program::build`] is the single place that turns a
//! structured statement sequence (ordinarily handed down by
//! [`crate::lower`], itself standing in for the out-of-scope front-end
//! parser) into the flat, immutable form the explorer steps through.

use fnv::FnvHashMap;
use tinyvec::TinyVec;

use crate::diag::{ConfigurationError, InternalInvariantViolation};
use crate::expr::Expr;
use crate::memory::{Memory, MemoryMap, Value};

/// A deterministic, pure step. Every variant transforms the current memory
/// into the next and optionally names a label to jump to; `Goto`/`Cond`
/// targets are label *names*, resolved against the owning `Program`'s label
/// table at build time (to validate) and at step time (to jump).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    /// `dst := expr`. Fails as a `ConfigurationError` (not an assertion) if
    /// the evaluated expression is outside `dst`'s declared domain -- see
    /// `DESIGN.md` for why this is fatal rather than a normal `RunFailure`.
    Mov { dst: usize, expr: Expr },
    /// Jump to `target` if `pred` holds (or does not hold, if `negate`).
    Cond {
        pred: Expr,
        target: String,
        negate: bool,
    },
    /// Unconditional jump to `target`.
    Goto { target: String },
    /// Fails with `msg` if `pred` does not hold. This is the embedded-assert
    /// lowering of a source-level `assert`, distinct from the assertion
    /// library in `crate::assertion`, which is invoked by the explorer
    /// between ops rather than embedded in the op list.
    Assert { pred: Expr, msg: String },
}

impl Op {
    fn step(&self, memory: &Memory, mm: &MemoryMap) -> Result<OpStep, ConfigurationError> {
        match self {
            Op::Mov { dst, expr } => {
                let value = expr.eval(memory);
                if !mm.validate_slot(*dst, value) {
                    return Err(ConfigurationError::OutOfDomain {
                        reference: format!("slot {dst}"),
                        value: value_repr(value),
                    });
                }
                Ok(OpStep::Advance(memory.with_slot(*dst, value)))
            }
            Op::Cond {
                pred,
                target,
                negate,
            } => {
                let taken = pred.eval_bool(memory) != *negate;
                if taken {
                    Ok(OpStep::Jump(target.clone(), memory.clone()))
                } else {
                    Ok(OpStep::Advance(memory.clone()))
                }
            }
            Op::Goto { target } => Ok(OpStep::Jump(target.clone(), memory.clone())),
            Op::Assert { pred, msg } => {
                if pred.eval_bool(memory) {
                    Ok(OpStep::Advance(memory.clone()))
                } else {
                    Ok(OpStep::Failed(msg.clone()))
                }
            }
        }
    }
}

fn value_repr(v: Value) -> String {
    v.to_string()
}

enum OpStep {
    Advance(Memory),
    Jump(String, Memory),
    Failed(String),
}

/// The sentinel statements that delimit a source-level `with atomic:` block.
/// Atomic regions do not nest and must alternate strictly starting outside
/// one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtomicSentinel {
    Enter,
    Exit,
}

/// One item in the ordered statement sequence [`Program::build`] consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    Op(Op),
    Label(String),
    Atomic(AtomicSentinel),
}

/// The outcome of executing one op inside a program, as seen by the
/// explorer. Distinguishes a normal transition, an embedded-assert failure
/// (becomes a `RunFailure`, non-fatal to the search), and a configuration
/// problem (fatal, propagates out of `proof`).
pub enum StepOutcome {
    Transitioned {
        next_pos: usize,
        memory: Memory,
        atomic_continue: bool,
    },
    AssertionFailed(String),
}

/// A named, immutable, flat-compiled program.
#[derive(Debug, Clone)]
pub struct Program {
    pub name: String,
    ops: Vec<Op>,
    labels: FnvHashMap<String, usize>,
    atomic_mask: Vec<bool>,
}

impl Program {
    /// Walks `statements`, recording labels as "index of next op to be
    /// appended", tracking atomic-region membership (toggled by sentinels,
    /// which must alternate strictly starting outside), and tagging each
    /// appended op with that membership into `atomic_mask`.
    pub fn build(
        name: impl Into<String>,
        statements: impl IntoIterator<Item = Stmt>,
    ) -> Result<Program, ConfigurationError> {
        let name = name.into();
        let mut ops = Vec::new();
        let mut labels = FnvHashMap::default();
        let mut atomic_mask = Vec::new();
        let mut in_atomic = false;

        for stmt in statements {
            match stmt {
                Stmt::Label(label) => {
                    labels.insert(label, ops.len());
                }
                Stmt::Atomic(AtomicSentinel::Enter) => {
                    if in_atomic {
                        return Err(ConfigurationError::NestedAtomic {
                            program: name.clone(),
                        });
                    }
                    in_atomic = true;
                }
                Stmt::Atomic(AtomicSentinel::Exit) => {
                    if !in_atomic {
                        return Err(ConfigurationError::UnbalancedAtomicSentinels {
                            program: name.clone(),
                        });
                    }
                    in_atomic = false;
                }
                Stmt::Op(op) => {
                    ops.push(op);
                    atomic_mask.push(in_atomic);
                }
            }
        }

        if in_atomic {
            return Err(ConfigurationError::UnbalancedAtomicSentinels {
                program: name.clone(),
            });
        }

        let program = Program {
            name,
            ops,
            labels,
            atomic_mask,
        };
        program.validate_labels()?;
        Ok(program)
    }

    fn validate_labels(&self) -> Result<(), ConfigurationError> {
        for op in &self.ops {
            let target = match op {
                Op::Goto { target } => Some(target),
                Op::Cond { target, .. } => Some(target),
                _ => None,
            };
            if let Some(target) = target {
                if !self.labels.contains_key(target) {
                    return Err(ConfigurationError::UnknownLabel {
                        program: self.name.clone(),
                        label: target.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn is_atomic(&self, pos: usize) -> bool {
        self.atomic_mask.get(pos).copied().unwrap_or(false)
    }

    /// A one-line rendering of `ops[pos]`, for renderers that have no real
    /// source text to print (see `crate::render`). Falls back to `Debug`
    /// since `Op` carries no pretty-printer of its own.
    pub fn debug_op(&self, pos: usize) -> String {
        format!("{:?}", self.ops[pos])
    }

    /// Executes `ops[pos]` and determines the next position, the next
    /// memory, and whether the explorer should keep scheduling this program
    /// uninterrupted (`atomic_continue`). Fatal configuration problems (an
    /// out-of-domain `mov`, or a label that passed build-time validation but
    /// somehow fails to resolve now) propagate as `Err`.
    pub fn step(
        &self,
        pos: usize,
        memory: &Memory,
        mm: &MemoryMap,
    ) -> Result<StepOutcome, ConfigurationError> {
        debug_assert!(pos < self.ops.len(), "step called on halted program");
        let outcome = self.ops[pos].step(memory, mm)?;
        match outcome {
            OpStep::Failed(msg) => Ok(StepOutcome::AssertionFailed(msg)),
            OpStep::Advance(memory) => {
                let next_pos = pos + 1;
                Ok(StepOutcome::Transitioned {
                    next_pos,
                    atomic_continue: self.atomic_continue(pos, next_pos),
                    memory,
                })
            }
            OpStep::Jump(label, memory) => {
                let next_pos = *self.labels.get(&label).ok_or_else(|| {
                    // Build-time validation should make this unreachable; keep it
                    // as a configuration error rather than panicking so a
                    // caller driving `Program` by hand (bypassing `build`)
                    // still gets a typed error instead of a crash.
                    ConfigurationError::UnknownLabel {
                        program: self.name.clone(),
                        label: label.clone(),
                    }
                })?;
                Ok(StepOutcome::Transitioned {
                    next_pos,
                    atomic_continue: self.atomic_continue(pos, next_pos),
                    memory,
                })
            }
        }
    }

    fn atomic_continue(&self, pos: usize, next_pos: usize) -> bool {
        next_pos < self.ops.len() && self.is_atomic(pos) && self.is_atomic(next_pos)
    }

    /// Surfaces an [`InternalInvariantViolation`] for a label index that a
    /// traceback or explorer bug resolved outside `ops`'s bounds. Not called
    /// from `step` itself (that path returns a typed `ConfigurationError`
    /// instead) -- this is for callers reconstructing positions out of a
    /// traceback and finding them out of range.
    pub fn out_of_bounds(&self, label: &str) -> InternalInvariantViolation {
        InternalInvariantViolation::LabelResolvedOutOfBounds {
            program: self.name.clone(),
            label: label.to_string(),
        }
    }
}

/// `(positions, memory)` -- a complete snapshot of every program's counter
/// plus shared memory. Value-typed, hashable, and totally determined by its
/// contents: two states with equal positions and equal memory are the same
/// state, by construction (`derive`d `Eq`/`Hash`).
///
/// `positions` uses a `TinyVec` sized for the common case of a handful of
/// cooperating programs; larger interleavings spill to the heap
/// transparently.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct State {
    pub positions: TinyVec<[u32; 4]>,
    pub memory: Memory,
}

impl State {
    pub fn initial(programs: &[Program], mm: &MemoryMap) -> State {
        State {
            positions: programs.iter().map(|_| 0u32).collect(),
            memory: mm.init(),
        }
    }

    /// `true` iff every program has run off the end of its op list.
    pub fn all_halted(&self, programs: &[Program]) -> bool {
        self.positions
            .iter()
            .zip(programs)
            .all(|(&pos, prog)| pos as usize >= prog.len())
    }

    pub fn is_halted(&self, programs: &[Program], index: usize) -> bool {
        self.positions[index] as usize >= programs[index].len()
    }

    pub fn with_position(&self, index: usize, next_pos: usize) -> State {
        let mut positions = self.positions.clone();
        positions[index] = next_pos as u32;
        State {
            positions,
            memory: self.memory.clone(),
        }
    }

    /// As [`State::with_position`], but also replaces memory -- the common
    /// case after executing a step, which changes both at once.
    pub fn with_position_and_memory(&self, index: usize, next_pos: usize, memory: Memory) -> State {
        let mut positions = self.positions.clone();
        positions[index] = next_pos as u32;
        State { positions, memory }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{DomainSpec, Reference};
    use assert_matches::assert_matches;

    fn mm() -> MemoryMap {
        MemoryMap::build(vec![("a", DomainSpec::Bool)]).unwrap()
    }

    #[test]
    fn empty_program_has_no_ops_and_is_immediately_halted() {
        let program = Program::build("idle", vec![]).unwrap();
        assert!(program.is_empty());
        let mm = mm();
        let state = State::initial(std::slice::from_ref(&program), &mm);
        assert!(state.all_halted(std::slice::from_ref(&program)));
    }

    #[test]
    fn unbalanced_atomic_sentinel_is_rejected() {
        let err = Program::build(
            "bad",
            vec![Stmt::Atomic(AtomicSentinel::Enter), Stmt::Op(mov_true(0))],
        )
        .unwrap_err();
        assert_matches!(err, ConfigurationError::UnbalancedAtomicSentinels { .. });
    }

    #[test]
    fn nested_atomic_is_rejected() {
        let err = Program::build(
            "bad",
            vec![
                Stmt::Atomic(AtomicSentinel::Enter),
                Stmt::Atomic(AtomicSentinel::Enter),
            ],
        )
        .unwrap_err();
        assert_matches!(err, ConfigurationError::NestedAtomic { .. });
    }

    #[test]
    fn unknown_label_rejected_at_build_time() {
        let err = Program::build(
            "bad",
            vec![Stmt::Op(Op::Goto {
                target: "nowhere".into(),
            })],
        )
        .unwrap_err();
        assert_matches!(err, ConfigurationError::UnknownLabel { .. });
    }

    #[test]
    fn atomic_continue_true_only_within_region() {
        let program = Program::build(
            "p",
            vec![
                Stmt::Atomic(AtomicSentinel::Enter),
                Stmt::Op(mov_true(0)),
                Stmt::Op(mov_true(0)),
                Stmt::Atomic(AtomicSentinel::Exit),
                Stmt::Op(mov_true(0)),
            ],
        )
        .unwrap();
        let mm = mm();
        let memory = mm.init();
        let StepOutcome::Transitioned {
            atomic_continue, ..
        } = program.step(0, &memory, &mm).unwrap()
        else {
            panic!("expected a transition")
        };
        assert!(atomic_continue);
        let StepOutcome::Transitioned {
            atomic_continue, ..
        } = program.step(1, &memory, &mm).unwrap()
        else {
            panic!("expected a transition")
        };
        assert!(!atomic_continue);
    }

    #[test]
    fn mov_out_of_domain_is_configuration_error() {
        let int_mm = MemoryMap::build(vec![("n", DomainSpec::Range(0, 2))]).unwrap();
        let slot = int_mm.addr(&Reference::from("n")).unwrap();
        let program = Program::build(
            "p",
            vec![Stmt::Op(Op::Mov {
                dst: slot,
                expr: Expr::int(9),
            })],
        )
        .unwrap();
        let memory = int_mm.init();
        let err = program.step(0, &memory, &int_mm).unwrap_err();
        assert_matches!(err, ConfigurationError::OutOfDomain { .. });
    }

    fn mov_true(dst: usize) -> Op {
        Op::Mov {
            dst,
            expr: Expr::constant(true),
        }
    }
}
