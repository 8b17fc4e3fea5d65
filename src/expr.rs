//! An explicit expression IR, evaluated purely against a [`Memory`].
//!
//! The Python implementation this crate was distilled from compiles source
//! expressions through its host language's `eval`; the distilled spec's
//! design notes call that out as needing re-architecture for a systems
//! language. `Expr` is that re-architecture: constants, slot reads, equality,
//! boolean connectives and bounded integer arithmetic, evaluated by a small
//! total function with no embedded interpreter.
//!
//! `Expr` is built against already-resolved slot indices -- by the time an
//! `Expr` exists, [`crate::lower`] has already turned every variable
//! reference into a [`MemoryMap`] slot, the same way metamath-knife's
//! scopeck turns names into resolved statement references before verify ever
//! runs.

use crate::memory::{Memory, Value};

/// A pure expression over the current memory snapshot. Every variant is
/// infallible to evaluate; it is the *caller's* job (ordinarily
/// [`crate::lower`]) to only ever build well-typed trees -- `Eq`/`And`/`Or`
/// on booleans, `Add`/`Sub` on integers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Const(Value),
    Slot(usize),
    Eq(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Le(Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn eval(&self, mem: &Memory) -> Value {
        match self {
            Expr::Const(v) => *v,
            Expr::Slot(slot) => mem.get(*slot),
            Expr::Eq(a, b) => Value::Bool(a.eval(mem) == b.eval(mem)),
            Expr::Not(a) => Value::Bool(!as_bool(a.eval(mem))),
            Expr::And(a, b) => Value::Bool(as_bool(a.eval(mem)) && as_bool(b.eval(mem))),
            Expr::Or(a, b) => Value::Bool(as_bool(a.eval(mem)) || as_bool(b.eval(mem))),
            Expr::Add(a, b) => Value::Int(as_int(a.eval(mem)) + as_int(b.eval(mem))),
            Expr::Sub(a, b) => Value::Int(as_int(a.eval(mem)) - as_int(b.eval(mem))),
            Expr::Le(a, b) => Value::Bool(as_int(a.eval(mem)) <= as_int(b.eval(mem))),
        }
    }

    /// Evaluates the expression and coerces it to a boolean, for use as a
    /// branch predicate. Panics if the expression was not built to produce a
    /// boolean -- a lowering bug, not a checker-user error.
    pub fn eval_bool(&self, mem: &Memory) -> bool {
        as_bool(self.eval(mem))
    }

    pub fn constant(v: bool) -> Expr {
        Expr::Const(Value::Bool(v))
    }

    pub fn int(v: i64) -> Expr {
        Expr::Const(Value::Int(v))
    }
}

fn as_bool(v: Value) -> bool {
    v.as_bool()
        .unwrap_or_else(|| panic!("expression produced non-bool value {v:?} where bool expected"))
}

fn as_int(v: Value) -> i64 {
    v.as_int()
        .unwrap_or_else(|| panic!("expression produced non-int value {v:?} where int expected"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{DomainSpec, MemoryMap};

    #[test]
    fn eq_and_not_compose() {
        let mm = MemoryMap::build(vec![("a", DomainSpec::Bool)]).unwrap();
        let mem = mm.init();
        let slot = mm.addr(&"a".into()).unwrap();
        let is_true = Expr::Eq(Box::new(Expr::Slot(slot)), Box::new(Expr::constant(true)));
        assert!(!is_true.eval_bool(&mem));
        assert!(Expr::Not(Box::new(is_true)).eval_bool(&mem));
    }

    #[test]
    fn arithmetic_on_ints() {
        let mm = MemoryMap::build(vec![("small", DomainSpec::Range(0, 4))]).unwrap();
        let mem = mm.init();
        let slot = mm.addr(&"small".into()).unwrap();
        let expr = Expr::Add(Box::new(Expr::Slot(slot)), Box::new(Expr::int(3)));
        assert_eq!(expr.eval(&mem), Value::Int(3));
    }

    #[test]
    fn le_compares_ints() {
        let mm = MemoryMap::build(vec![("n", DomainSpec::Range(0, 4))]).unwrap();
        let mem = mm.init();
        let slot = mm.addr(&"n".into()).unwrap();
        let expr = Expr::Le(Box::new(Expr::Slot(slot)), Box::new(Expr::int(0)));
        assert!(expr.eval_bool(&mem));
        let expr = Expr::Le(Box::new(Expr::int(1)), Box::new(Expr::Slot(slot)));
        assert!(!expr.eval_bool(&mem));
    }
}
