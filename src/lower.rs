//! A reference lowering from structured control flow to the flat op list
//! [`crate::program::Program`] actually runs.
//!
//! The distilled spec treats the front-end parser as an out-of-scope,
//! opaque producer of `Program` values, but it fully specifies the lowering
//! rules (its §4.5) -- which is enough to implement here, and is needed to
//! build the demo scenarios in `crate::demos` without hand-assembling flat
//! op lists by hand. `Stmt` is the structured surface (source text parsing
//! itself, turning characters into `Stmt` trees, remains out of scope); this
//! module only does the structured-to-flat compilation step.

use crate::diag::ConfigurationError;
use crate::expr::Expr;
use crate::memory::{MemoryMap, Reference};
use crate::program::{AtomicSentinel, Op, Program, Stmt as FlatStmt};

/// A structured statement, the shape a front-end parser would hand to this
/// lowering after parsing source text.
#[derive(Debug, Clone)]
pub enum Stmt {
    Assign {
        dst: Reference,
        expr: Expr,
    },
    If {
        cond: Expr,
        then_body: Vec<Stmt>,
        else_body: Vec<Stmt>,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
    /// `with atomic: ...`. Nesting is rejected by `Program::build`, not
    /// here -- this module only assembles sentinels, it does not re-check
    /// the invariant the builder already owns.
    Atomic {
        body: Vec<Stmt>,
    },
    Assert {
        cond: Expr,
        msg: String,
    },
    Break,
    Continue,
    /// No-value return; lowers to a jump to the synthesized function-end
    /// label appended after the whole body.
    Return,
}

struct Lowerer<'a> {
    mm: &'a MemoryMap,
    program_name: String,
    items: Vec<FlatStmt>,
    next_label: usize,
    /// `(begin_label, end_label)` per nested `while`, innermost last --
    /// `continue` targets `begin`, `break` targets `end`.
    loop_stack: Vec<(String, String)>,
}

impl<'a> Lowerer<'a> {
    fn fresh_label(&mut self) -> String {
        let label = format!("__L{}", self.next_label);
        self.next_label += 1;
        label
    }

    fn lower_body(&mut self, body: Vec<Stmt>) -> Result<(), ConfigurationError> {
        for stmt in body {
            self.lower_stmt(stmt)?;
        }
        Ok(())
    }

    fn lower_stmt(&mut self, stmt: Stmt) -> Result<(), ConfigurationError> {
        match stmt {
            Stmt::Assign { dst, expr } => {
                let slot = self.mm.addr(&dst)?;
                self.items.push(FlatStmt::Op(Op::Mov { dst: slot, expr }));
            }
            Stmt::Assert { cond, msg } => {
                self.items.push(FlatStmt::Op(Op::Assert { pred: cond, msg }));
            }
            Stmt::If {
                cond,
                then_body,
                else_body,
            } => self.lower_if(cond, then_body, else_body)?,
            Stmt::While { cond, body } => self.lower_while(cond, body)?,
            Stmt::Atomic { body } => {
                self.items.push(FlatStmt::Atomic(AtomicSentinel::Enter));
                self.lower_body(body)?;
                self.items.push(FlatStmt::Atomic(AtomicSentinel::Exit));
            }
            Stmt::Break => {
                let (_, end) = self.loop_stack.last().cloned().ok_or_else(|| {
                    ConfigurationError::BreakOutsideLoop {
                        program: self.program_name.clone(),
                    }
                })?;
                self.items.push(FlatStmt::Op(Op::Goto { target: end }));
            }
            Stmt::Continue => {
                let (begin, _) = self.loop_stack.last().cloned().ok_or_else(|| {
                    ConfigurationError::ContinueOutsideLoop {
                        program: self.program_name.clone(),
                    }
                })?;
                self.items.push(FlatStmt::Op(Op::Goto { target: begin }));
            }
            Stmt::Return => {
                self.items.push(FlatStmt::Op(Op::Goto {
                    target: RETURN_LABEL.to_string(),
                }));
            }
        }
        Ok(())
    }

    fn lower_if(
        &mut self,
        cond: Expr,
        then_body: Vec<Stmt>,
        else_body: Vec<Stmt>,
    ) -> Result<(), ConfigurationError> {
        if else_body.is_empty() {
            let end = self.fresh_label();
            self.items.push(FlatStmt::Op(Op::Cond {
                pred: cond,
                target: end.clone(),
                negate: true,
            }));
            self.lower_body(then_body)?;
            self.items.push(FlatStmt::Label(end));
        } else {
            let else_label = self.fresh_label();
            let end = self.fresh_label();
            self.items.push(FlatStmt::Op(Op::Cond {
                pred: cond,
                target: else_label.clone(),
                negate: true,
            }));
            self.lower_body(then_body)?;
            self.items.push(FlatStmt::Op(Op::Goto {
                target: end.clone(),
            }));
            self.items.push(FlatStmt::Label(else_label));
            self.lower_body(else_body)?;
            self.items.push(FlatStmt::Label(end));
        }
        Ok(())
    }

    fn lower_while(&mut self, cond: Expr, body: Vec<Stmt>) -> Result<(), ConfigurationError> {
        let begin = self.fresh_label();
        let end = self.fresh_label();
        self.items.push(FlatStmt::Label(begin.clone()));
        self.items.push(FlatStmt::Op(Op::Cond {
            pred: cond,
            target: end.clone(),
            negate: true,
        }));
        self.loop_stack.push((begin.clone(), end.clone()));
        self.lower_body(body)?;
        self.loop_stack.pop();
        self.items.push(FlatStmt::Op(Op::Goto { target: begin }));
        self.items.push(FlatStmt::Label(end));
        Ok(())
    }
}

const RETURN_LABEL: &str = "__return";

/// Lowers a structured statement body into a [`Program`] named `name`,
/// resolving variable references against `mm` as it goes.
pub fn lower(
    name: impl Into<String>,
    mm: &MemoryMap,
    body: Vec<Stmt>,
) -> Result<Program, ConfigurationError> {
    let name = name.into();
    let mut lowerer = Lowerer {
        mm,
        program_name: name.clone(),
        items: Vec::new(),
        next_label: 0,
        loop_stack: Vec::new(),
    };
    lowerer.lower_body(body)?;
    lowerer.items.push(FlatStmt::Label(RETURN_LABEL.to_string()));
    Program::build(name, lowerer.items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::DomainSpec;

    #[test]
    fn if_without_else_skips_body_when_false() {
        let mm = MemoryMap::build(vec![("a", DomainSpec::Bool)]).unwrap();
        let program = lower(
            "p",
            &mm,
            vec![Stmt::If {
                cond: Expr::constant(false),
                then_body: vec![Stmt::Assign {
                    dst: "a".into(),
                    expr: Expr::constant(true),
                }],
                else_body: vec![],
            }],
        )
        .unwrap();
        let memory = mm.init();
        let slot = mm.addr(&"a".into()).unwrap();
        let mut pos = 0usize;
        let mut mem = memory;
        loop {
            if pos >= program.len() {
                break;
            }
            match program.step(pos, &mem, &mm).unwrap() {
                crate::program::StepOutcome::Transitioned { next_pos, memory, .. } => {
                    pos = next_pos;
                    mem = memory;
                }
                crate::program::StepOutcome::AssertionFailed(m) => panic!("{m}"),
            }
        }
        assert_eq!(mem.get(slot), crate::memory::Value::Bool(false));
    }

    #[test]
    fn break_outside_loop_is_rejected() {
        let mm = MemoryMap::build(vec![("a", DomainSpec::Bool)]).unwrap();
        let err = lower("p", &mm, vec![Stmt::Break]).unwrap_err();
        assert!(matches!(err, ConfigurationError::BreakOutsideLoop { .. }));
    }

    #[test]
    fn while_with_break_terminates() {
        let mm = MemoryMap::build(vec![("a", DomainSpec::Bool)]).unwrap();
        let program = lower(
            "p",
            &mm,
            vec![Stmt::While {
                cond: Expr::constant(true),
                body: vec![Stmt::Break],
            }],
        )
        .unwrap();
        let mm2 = mm;
        let memory = mm2.init();
        let mut pos = 0usize;
        let mut mem = memory;
        let mut steps = 0;
        loop {
            if pos >= program.len() {
                break;
            }
            steps += 1;
            assert!(steps < 100, "loop did not terminate");
            match program.step(pos, &mem, &mm2).unwrap() {
                crate::program::StepOutcome::Transitioned { next_pos, memory, .. } => {
                    pos = next_pos;
                    mem = memory;
                }
                crate::program::StepOutcome::AssertionFailed(m) => panic!("{m}"),
            }
        }
    }
}
