//! A handful of canonical concurrency scenarios, reimplemented from the Python
//! original's `examples/*.py` as library-level constructors built on
//! [`crate::lower`]. Each returns a ready-to-run `(programs, memory_map,
//! assertions)` triple for [`crate::proof`]; the CLI binary selects one of
//! these by name.
//!
//! These are demonstrations of known results, not tests of the explorer
//! itself (see each module's own `#[cfg(test)]` for that) -- but every
//! scenario here is still exercised by a test in this module asserting the
//! expected verdict, so a regression in the explorer or the lowering would
//! be caught here too.

use crate::assertion::{halts_assert, Assertion};
use crate::diag::ConfigurationError;
use crate::expr::Expr;
use crate::lower::{lower, Stmt};
use crate::memory::{DomainSpec, MemoryMap, Reference};
use crate::program::Program;

type Demo = (Vec<Program>, MemoryMap, Vec<Box<dyn Assertion>>);

fn slot(mm: &MemoryMap, name: &str) -> Expr {
    Expr::Slot(mm.addr(&Reference::from(name)).expect("demo references an undeclared variable"))
}

fn eq_true(mm: &MemoryMap, name: &str) -> Expr {
    Expr::Eq(Box::new(slot(mm, name)), Box::new(Expr::constant(true)))
}

fn eq_false(mm: &MemoryMap, name: &str) -> Expr {
    Expr::Eq(Box::new(slot(mm, name)), Box::new(Expr::constant(false)))
}

/// `lower::Stmt::Assign` takes a `Reference`, which `crate::lower` resolves
/// against the memory map when it lowers the body.
fn assign(name: &str, expr: Expr) -> Stmt {
    Stmt::Assign {
        dst: Reference::from(name),
        expr,
    }
}

/// The client/server eventually-consistent-DB scenario: the client expects
/// a write it just made to be immediately visible, but the server's loop
/// can interleave a stale read in between. Always fails.
pub fn inconsistency() -> Result<Demo, ConfigurationError> {
    let mm = MemoryMap::build(vec![("A_set", DomainSpec::Bool), ("A_get", DomainSpec::Bool)])?;

    let client = lower(
        "client",
        &mm,
        vec![
            assign("A_set", Expr::constant(true)),
            Stmt::Assert {
                cond: eq_true(&mm, "A_get"),
                msg: "A_get should be true".into(),
            },
        ],
    )?;

    let server = lower(
        "server",
        &mm,
        vec![Stmt::While {
            cond: Expr::constant(true),
            body: vec![assign("A_get", slot(&mm, "A_set"))],
        }],
    )?;

    Ok((vec![client, server], mm, vec![]))
}

fn setter_checker(mm: &MemoryMap, atomic: bool) -> Result<Program, ConfigurationError> {
    let body = vec![
        assign("A", Expr::constant(true)),
        Stmt::Assert {
            cond: eq_true(mm, "A"),
            msg: "A should still be true".into(),
        },
        assign("A", Expr::constant(false)),
    ];
    let name = if atomic {
        "setter_checker_atomic"
    } else {
        "setter_checker_non_atomic"
    };
    let program_body = if atomic {
        vec![Stmt::Atomic { body }]
    } else {
        body
    };
    lower(name, mm, program_body)
}

/// The setter/corrupter race from the atomic-regions scenario, without the
/// `with atomic:` fix. The corrupter can always interleave between the
/// setter's write and its own assertion, so this always fails.
pub fn atomic_race() -> Result<Demo, ConfigurationError> {
    let mm = MemoryMap::build(vec![("A", DomainSpec::Bool)])?;
    let setter = setter_checker(&mm, false)?;
    let corrupter = lower("corrupter", &mm, vec![assign("A", Expr::constant(false))])?;
    Ok((vec![setter, corrupter], mm, vec![]))
}

/// The same race with the setter's three statements wrapped in `with
/// atomic:`. The corrupter can no longer observe the setter mid-write, so
/// this always passes.
pub fn atomic_fixed() -> Result<Demo, ConfigurationError> {
    let mm = MemoryMap::build(vec![("A", DomainSpec::Bool)])?;
    let setter = setter_checker(&mm, true)?;
    let corrupter = lower("corrupter", &mm, vec![assign("A", Expr::constant(false))])?;
    Ok((vec![setter, corrupter], mm, vec![]))
}

fn dekker_side(mm: &MemoryMap, own: &str, other: &str, turn_value: bool) -> Vec<Stmt> {
    vec![
        assign(own, Expr::constant(true)),
        Stmt::While {
            cond: slot(mm, other),
            body: vec![Stmt::If {
                cond: Expr::Eq(
                    Box::new(slot(mm, "turn")),
                    Box::new(Expr::constant(turn_value)),
                ),
                then_body: vec![
                    assign(own, Expr::constant(false)),
                    Stmt::While {
                        cond: Expr::Eq(
                            Box::new(slot(mm, "turn")),
                            Box::new(Expr::constant(turn_value)),
                        ),
                        body: vec![],
                    },
                    assign(own, Expr::constant(true)),
                ],
                else_body: vec![],
            }],
        },
        Stmt::Assert {
            cond: eq_false(mm, "critical_section"),
            msg: "mutual exclusion violated".into(),
        },
        assign("critical_section", Expr::constant(true)),
        assign("critical_section", Expr::constant(false)),
        assign("turn", Expr::constant(turn_value)),
        assign(own, Expr::constant(false)),
    ]
}

fn dekker_mm() -> Result<MemoryMap, ConfigurationError> {
    MemoryMap::build(vec![
        ("wants_to_enter_0", DomainSpec::Bool),
        ("wants_to_enter_1", DomainSpec::Bool),
        ("turn", DomainSpec::Bool),
        ("critical_section", DomainSpec::Bool),
    ])
}

/// Dekker's mutual-exclusion algorithm for two processes. Each side asserts
/// it never enters its critical section while the other is already there;
/// this always passes, since the algorithm is correct.
pub fn dekker() -> Result<Demo, ConfigurationError> {
    let mm = dekker_mm()?;
    let p0 = lower(
        "p0",
        &mm,
        dekker_side(&mm, "wants_to_enter_0", "wants_to_enter_1", true),
    )?;
    let p1 = lower(
        "p1",
        &mm,
        dekker_side(&mm, "wants_to_enter_1", "wants_to_enter_0", false),
    )?;
    Ok((vec![p0, p1], mm, vec![]))
}

/// The same two processes, but `p1` replaced by a stub (`p1_brute` in the
/// Python original) that skips the wait protocol entirely: it raises its
/// flag and walks straight into the critical section. `p0` still runs the
/// real protocol, so the two sides can now both be inside the critical
/// section at once -- this always fails, with a witness showing exactly
/// that.
pub fn dekker_brute() -> Result<Demo, ConfigurationError> {
    let mm = dekker_mm()?;
    let p0 = lower(
        "p0",
        &mm,
        dekker_side(&mm, "wants_to_enter_0", "wants_to_enter_1", true),
    )?;
    let p1_brute = lower(
        "p1_brute",
        &mm,
        vec![
            assign("wants_to_enter_1", Expr::constant(true)),
            Stmt::Assert {
                cond: eq_false(&mm, "critical_section"),
                msg: "mutual exclusion violated".into(),
            },
            assign("critical_section", Expr::constant(true)),
            assign("critical_section", Expr::constant(false)),
            assign("turn", Expr::constant(false)),
            assign("wants_to_enter_1", Expr::constant(false)),
        ],
    )?;
    Ok((vec![p0, p1_brute], mm, vec![]))
}

fn jug_fill(mm: &MemoryMap, name: &str, name_slot: &str, full: i64) -> Result<Program, ConfigurationError> {
    lower(
        name,
        mm,
        vec![Stmt::While {
            cond: Expr::constant(true),
            body: vec![assign(name_slot, Expr::int(full))],
        }],
    )
}

fn jug_pour_out(mm: &MemoryMap, name: &str, name_slot: &str) -> Result<Program, ConfigurationError> {
    lower(
        name,
        mm,
        vec![Stmt::While {
            cond: Expr::constant(true),
            body: vec![assign(name_slot, Expr::int(0))],
        }],
    )
}

fn jug_pour_between(
    mm: &MemoryMap,
    name: &str,
    from: &str,
    to: &str,
    to_capacity: i64,
) -> Result<Program, ConfigurationError> {
    let total = Expr::Add(Box::new(slot(mm, from)), Box::new(slot(mm, to)));
    lower(
        name,
        mm,
        vec![Stmt::While {
            cond: Expr::constant(true),
            body: vec![Stmt::Atomic {
                body: vec![Stmt::If {
                    cond: Expr::Le(Box::new(total.clone()), Box::new(Expr::int(to_capacity))),
                    then_body: vec![
                        assign(to, total.clone()),
                        assign(from, Expr::int(0)),
                    ],
                    else_body: vec![
                        assign(
                            from,
                            Expr::Sub(
                                Box::new(slot(mm, from)),
                                Box::new(Expr::Sub(
                                    Box::new(Expr::int(to_capacity)),
                                    Box::new(slot(mm, to)),
                                )),
                            ),
                        ),
                        assign(to, Expr::int(to_capacity)),
                    ],
                }],
            }],
        }],
    )
}

/// The Die Hard 3 water-jug puzzle: a 4-unit ("small") and a 6-unit
/// ("large") jug, six concurrent actions that fill, empty, or pour between
/// them. `large`'s domain deliberately omits the value 4 -- the pouring
/// logic can and does reach a state where `large` should become 4 (e.g.
/// `large=5, small=2` poured through `large_to_small`), and because that
/// value is outside `large`'s declared domain, the `mov` that would produce
/// it fails with `ConfigurationError::OutOfDomain` instead of completing.
/// No assertion is attached -- the domain exclusion itself is the check,
/// exactly like the `large != 4` property it stands in for. This is the one
/// bundled scenario where `run` is expected to return `Err`, not a
/// `ProofContext` with `proved() == false`.
pub fn die_hard() -> Result<Demo, ConfigurationError> {
    let mm = MemoryMap::build(vec![
        ("small", DomainSpec::Range(0, 4)),
        ("large", DomainSpec::Values(vec![0, 1, 2, 3, 5])),
    ])?;
    let programs = vec![
        jug_fill(&mm, "fill_small", "small", 3)?,
        jug_fill(&mm, "fill_large", "large", 5)?,
        jug_pour_out(&mm, "pour_small", "small")?,
        jug_pour_out(&mm, "pour_large", "large")?,
        jug_pour_between(&mm, "small_to_large", "small", "large", 5)?,
        jug_pour_between(&mm, "large_to_small", "large", "small", 3)?,
    ];
    Ok((programs, mm, vec![]))
}

/// A single program that loops forever without ever touching memory. Proved
/// false only because [`halts_assert`] is attached: without it, an infinite
/// loop with a constant state is indistinguishable from "nothing left to
/// explore" and the search reports success.
pub fn halting() -> Result<Demo, ConfigurationError> {
    let mm = MemoryMap::build(vec![("_", DomainSpec::Bool)])?;
    let program = lower(
        "loop",
        &mm,
        vec![Stmt::While {
            cond: Expr::constant(true),
            body: vec![],
        }],
    )?;
    Ok((vec![program], mm, vec![halts_assert()]))
}

/// `post_wait_turn`/`release_turn` mirror an asymmetry already present in
/// the Python original: process 1 re-asserts `turn = 1` right after its
/// busy-wait (before the critical section) and does not touch `turn` again
/// afterward, while process 0 does the opposite -- no reassertion after the
/// wait, but releases with `turn = 0` at the very end.
fn peterson_side(
    mm: &MemoryMap,
    own_flag: &str,
    other_flag: &str,
    other_turn: i64,
    post_wait_turn: Option<i64>,
    release_turn: Option<i64>,
) -> Vec<Stmt> {
    let mut stmts = vec![
        assign(own_flag, Expr::constant(true)),
        assign("turn", Expr::int(other_turn)),
        Stmt::While {
            cond: Expr::And(
                Box::new(slot(mm, other_flag)),
                Box::new(Expr::Eq(
                    Box::new(slot(mm, "turn")),
                    Box::new(Expr::int(other_turn)),
                )),
            ),
            body: vec![],
        },
    ];
    if let Some(turn) = post_wait_turn {
        stmts.push(assign("turn", Expr::int(turn)));
    }
    stmts.push(Stmt::Assert {
        cond: Expr::Not(Box::new(slot(mm, "cs_used"))),
        msg: "mutual exclusion violated".into(),
    });
    stmts.push(assign("cs_used", Expr::constant(true)));
    stmts.push(assign("cs_used", Expr::constant(false)));
    if let Some(turn) = release_turn {
        stmts.push(assign("turn", Expr::int(turn)));
    }
    stmts.push(assign(own_flag, Expr::constant(false)));
    stmts
}

/// Peterson's mutual-exclusion algorithm for two processes, sharing a
/// two-valued `turn` slot instead of Dekker's boolean one. Always passes.
pub fn peterson() -> Result<Demo, ConfigurationError> {
    let mm = MemoryMap::build(vec![
        ("flag_0", DomainSpec::Bool),
        ("flag_1", DomainSpec::Bool),
        ("turn", DomainSpec::Values(vec![0, 1])),
        ("cs_used", DomainSpec::Bool),
    ])?;
    let p0 = lower("p0", &mm, peterson_side(&mm, "flag_0", "flag_1", 1, None, Some(0)))?;
    let p1 = lower("p1", &mm, peterson_side(&mm, "flag_1", "flag_0", 0, Some(1), None))?;
    Ok((vec![p0, p1], mm, vec![]))
}

/// All bundled demo names, in the order the CLI lists them.
pub const NAMES: &[&str] = &[
    "inconsistency",
    "atomic-race",
    "atomic-fixed",
    "dekker",
    "dekker-brute",
    "die-hard",
    "halting",
    "peterson",
];

/// Looks up a bundled demo by the name it appears under in [`NAMES`] and in
/// the CLI's `--demo` flag.
pub fn by_name(name: &str) -> Option<fn() -> Result<Demo, ConfigurationError>> {
    match name {
        "inconsistency" => Some(inconsistency),
        "atomic-race" => Some(atomic_race),
        "atomic-fixed" => Some(atomic_fixed),
        "dekker" => Some(dekker),
        "dekker-brute" => Some(dekker_brute),
        "die-hard" => Some(die_hard),
        "halting" => Some(halting),
        "peterson" => Some(peterson),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::explorer::run;

    #[test]
    fn inconsistency_always_fails() {
        let (programs, mm, assertions) = inconsistency().unwrap();
        let ctx = run(programs, mm, &assertions, false).unwrap();
        assert!(!ctx.proved());
    }

    #[test]
    fn atomic_race_fails_without_atomic_fix() {
        let (programs, mm, assertions) = atomic_race().unwrap();
        let ctx = run(programs, mm, &assertions, false).unwrap();
        assert!(!ctx.proved());
    }

    #[test]
    fn atomic_fixed_passes() {
        let (programs, mm, assertions) = atomic_fixed().unwrap();
        let ctx = run(programs, mm, &assertions, false).unwrap();
        assert!(ctx.proved());
    }

    #[test]
    fn dekker_mutual_exclusion_holds() {
        let (programs, mm, assertions) = dekker().unwrap();
        let ctx = run(programs, mm, &assertions, false).unwrap();
        assert!(ctx.proved());
    }

    #[test]
    fn dekker_brute_violates_mutual_exclusion() {
        let (programs, mm, assertions) = dekker_brute().unwrap();
        let ctx = run(programs, mm, &assertions, false).unwrap();
        assert!(!ctx.proved());
    }

    #[test]
    fn halting_fails_on_the_cyclic_check() {
        let (programs, mm, assertions) = halting().unwrap();
        let ctx = run(programs, mm, &assertions, false).unwrap();
        assert!(!ctx.proved());
    }

    #[test]
    fn peterson_mutual_exclusion_holds() {
        let (programs, mm, assertions) = peterson().unwrap();
        let ctx = run(programs, mm, &assertions, false).unwrap();
        assert!(ctx.proved());
    }

    #[test]
    fn die_hard_hits_the_excluded_value_as_a_configuration_error() {
        use crate::diag::ConfigurationError;
        use assert_matches::assert_matches;

        let (programs, mm, assertions) = die_hard().unwrap();
        let err = run(programs, mm, &assertions, false).unwrap_err();
        assert_matches!(err, ConfigurationError::OutOfDomain { .. });
    }

    #[test]
    fn by_name_covers_every_listed_demo() {
        for name in NAMES {
            assert!(by_name(name).is_some(), "missing demo constructor for {name}");
        }
    }
}
