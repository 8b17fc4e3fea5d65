//! Pure functions over a finished [`ProofContext`] that turn it into text.
//!
//! Two reference renderers are provided, matching the distilled spec's
//! external-interfaces section: [`LongRenderer`] (one block per step, full
//! variable dump, current op arrowed) and [`ShortRenderer`] (one row per
//! step where memory actually changed). Neither renderer touches the
//! explorer or the program representation beyond reading from them --
//! exactly the "thin boundary around Explorer" role the distilled spec
//! assigns the renderer.

use fnv::FnvHasher;
use std::hash::{Hash, Hasher};

use crate::diag::InternalInvariantViolation;
use crate::explorer::ProofContext;
use crate::trace::traceback;

/// Consumes a finished `ProofContext` and produces textual output only --
/// no side effects beyond what the caller does with the returned `String`.
pub trait Renderer {
    fn render(&self, ctx: &ProofContext) -> Result<String, InternalInvariantViolation>;
}

/// One block per step: every program's current op (arrowed) and a full
/// variable dump.
pub struct LongRenderer;

impl Renderer for LongRenderer {
    fn render(&self, ctx: &ProofContext) -> Result<String, InternalInvariantViolation> {
        if ctx.proved() {
            return Ok("OK: no assertion violated in any reachable state\n".to_string());
        }
        let chain = traceback(ctx)?;
        let mut out = String::new();
        for (i, frame) in chain.iter().enumerate() {
            out.push_str(&format!("----- step #{i} (program {})\n", frame.program_index));
            for (pi, program) in ctx.programs.iter().enumerate() {
                let pos = frame.state.positions[pi] as usize;
                let marker = if pi == frame.program_index { "->" } else { "  " };
                out.push_str(&format!(
                    "{marker} {}: {}\n",
                    program.name,
                    describe_op(program, pos)
                ));
            }
            for (reference, value) in ctx.memory_map.dump(&frame.state.memory) {
                out.push_str(&format!("    {reference}={value}\n"));
            }
            out.push('\n');
        }
        if let Some(failure) = &ctx.failure {
            out.push_str(&format!("Assertion failed: {}\n", failure.error));
        }
        Ok(out)
    }
}

/// A table with one row per step where memory changed, columns `[step,
/// program_name, source_line, memory_digest]`.
pub struct ShortRenderer;

impl Renderer for ShortRenderer {
    fn render(&self, ctx: &ProofContext) -> Result<String, InternalInvariantViolation> {
        if ctx.proved() {
            return Ok("OK\n".to_string());
        }
        let chain = traceback(ctx)?;
        let mut out = String::new();
        for (i, frame) in chain.iter().enumerate() {
            let changed = match chain.get(i + 1) {
                Some(next) => next.state.memory != frame.state.memory,
                None => true,
            };
            if !changed {
                continue;
            }
            let program = &ctx.programs[frame.program_index];
            let pos = frame.state.positions[frame.program_index] as usize;
            out.push_str(&format!(
                "{i}\t{}\t{}\t{}\n",
                program.name,
                describe_op(program, pos),
                digest(ctx, &frame.state.memory)
            ));
        }
        if let Some(failure) = &ctx.failure {
            out.push_str(&format!("FAIL: {}\n", failure.error));
        }
        Ok(out)
    }
}

/// The source-line pretty-printing the distilled spec describes as op→line
/// metadata on `Program` is the front-end parser's responsibility (out of
/// scope here); this substitutes the op's own `Debug` rendering, which is
/// always available regardless of what built the `Program`.
fn describe_op(program: &crate::program::Program, pos: usize) -> String {
    if pos >= program.len() {
        "<halted>".to_string()
    } else {
        program.debug_op(pos)
    }
}

fn digest(ctx: &ProofContext, memory: &crate::memory::Memory) -> String {
    let mut hasher = FnvHasher::default();
    for (reference, value) in ctx.memory_map.dump(memory) {
        reference.0.hash(&mut hasher);
        value.hash(&mut hasher);
    }
    format!("{:08x}", hasher.finish() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assertion::halts_assert;
    use crate::explorer::run;
    use crate::memory::{DomainSpec, MemoryMap};
    use crate::program::{Op, Program, Stmt};

    fn looping_halts_failure() -> ProofContext {
        let mm = MemoryMap::build(vec![("_", DomainSpec::Bool)]).unwrap();
        let p = Program::build(
            "loop",
            vec![
                Stmt::Label("begin".into()),
                Stmt::Op(Op::Goto {
                    target: "begin".into(),
                }),
            ],
        )
        .unwrap();
        run(vec![p], mm, &[halts_assert()], false).unwrap()
    }

    #[test]
    fn long_renderer_reports_ok_on_success() {
        let mm = MemoryMap::build(vec![("_", DomainSpec::Bool)]).unwrap();
        let p = Program::build("idle", vec![]).unwrap();
        let ctx = run(vec![p], mm, &[], false).unwrap();
        let text = LongRenderer.render(&ctx).unwrap();
        assert!(text.starts_with("OK"));
    }

    #[test]
    fn short_renderer_reports_fail_with_message() {
        let ctx = looping_halts_failure();
        let text = ShortRenderer.render(&ctx).unwrap();
        assert!(text.contains("FAIL: cycle detected"));
    }

    #[test]
    fn long_renderer_includes_assertion_message() {
        let ctx = looping_halts_failure();
        let text = LongRenderer.render(&ctx).unwrap();
        assert!(text.contains("Assertion failed: cycle detected"));
    }
}
