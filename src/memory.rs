//! Slot-indexed, finite-domain memory.
//!
//! A [`Memory`] is the shared global state every program reads and writes.
//! Slots never change count or type across a checking run; only their
//! contents change between [`State`](crate::program::State)s. [`MemoryMap`]
//! is the bidirectional binding between the names a program's source uses
//! and the slot indices the explorer actually hashes and compares -- the
//! equivalent of metamath-knife's `nameck::Nameset`, but fixed at
//! construction time instead of incrementally recomputed.

use std::collections::BTreeMap;
use std::fmt;

use fnv::FnvHashMap;

use crate::diag::ConfigurationError;

/// One memory cell. Booleans and bounded integers are the only domains this
/// crate supports; `Int` always carries the bound-checked raw value, domain
/// membership is `VarType`'s job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Value {
    Bool(bool),
    Int(i64),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
        }
    }
}

impl Value {
    pub fn as_bool(self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(b),
            Value::Int(_) => None,
        }
    }

    pub fn as_int(self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(i),
            Value::Bool(_) => None,
        }
    }
}

/// The declared domain and initial value of a single memory slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VarType {
    Bool { initial: bool },
    /// An explicit finite set of admissible integers; `domain[0]` is the
    /// initial value. Never empty -- `MemoryMap::build` rejects that as a
    /// `ConfigurationError`.
    IntSet { domain: Vec<i64> },
}

impl VarType {
    pub fn init(&self) -> Value {
        match self {
            VarType::Bool { initial } => Value::Bool(*initial),
            VarType::IntSet { domain } => Value::Int(domain[0]),
        }
    }

    pub fn validate(&self, value: Value) -> bool {
        match (self, value) {
            (VarType::Bool { .. }, Value::Bool(_)) => true,
            (VarType::IntSet { domain }, Value::Int(i)) => domain.contains(&i),
            _ => false,
        }
    }
}

/// The domain-specification grammar consumed by [`MemoryMap::build`]: the
/// config format a caller (or, ordinarily, the front-end parser) provides
/// per variable. See the distilled spec's external-interfaces section for
/// the authoritative grammar this mirrors one-for-one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainSpec {
    /// `bool` or `False` -- boolean, initial `false`.
    Bool,
    /// `True` -- boolean, initial `true`.
    True,
    /// An ordered sequence of integers `[v0, v1, ...]` -- integer domain
    /// `{v0, ...}`, initial `v0`.
    Values(Vec<i64>),
    /// An integer range `a..b` (inclusive of `a`, exclusive of `b`) --
    /// integer domain, initial `a`.
    Range(i64, i64),
    /// A prebuilt `VarType`, used as-is.
    Prebuilt(VarType),
}

impl DomainSpec {
    fn resolve(&self, reference: &str) -> Result<VarType, ConfigurationError> {
        match self {
            DomainSpec::Bool => Ok(VarType::Bool { initial: false }),
            DomainSpec::True => Ok(VarType::Bool { initial: true }),
            DomainSpec::Values(vs) => {
                if vs.is_empty() {
                    return Err(ConfigurationError::MalformedDomain {
                        detail: format!("`{reference}` has an empty value list"),
                    });
                }
                Ok(VarType::IntSet { domain: vs.clone() })
            }
            DomainSpec::Range(a, b) => {
                if a >= b {
                    return Err(ConfigurationError::MalformedDomain {
                        detail: format!("`{reference}` has empty range {a}..{b}"),
                    });
                }
                Ok(VarType::IntSet {
                    domain: (*a..*b).collect(),
                })
            }
            DomainSpec::Prebuilt(vt) => Ok(vt.clone()),
        }
    }
}

/// A named reference into a [`MemoryMap`]. Cheap to copy around inside ops
/// and expressions; the map is consulted once, at build time, to turn it
/// into a slot index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Reference(pub String);

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Reference {
    fn from(s: &str) -> Self {
        Reference(s.to_string())
    }
}

/// A full memory snapshot: one [`Value`] per slot, in slot order.
///
/// Derives `Hash`/`Eq` over the slot vector directly; because slot count and
/// per-slot variant never change within a run, two memories compare equal
/// iff every slot does, which is exactly the canonical encoding the
/// state-space explorer's visited set relies on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Memory(Vec<Value>);

impl Memory {
    pub fn get(&self, slot: usize) -> Value {
        self.0[slot]
    }

    pub fn with_slot(&self, slot: usize, value: Value) -> Memory {
        let mut next = self.0.clone();
        next[slot] = value;
        Memory(next)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Immutable after construction: binds variable names to slot indices and
/// per-slot types, and is the sole authority for validating values against
/// their declared domain.
#[derive(Debug, Clone)]
pub struct MemoryMap {
    types: Vec<VarType>,
    addr: FnvHashMap<Reference, usize>,
    /// Preserves declaration order for `dump`, independent of hashing order.
    order: Vec<Reference>,
}

impl MemoryMap {
    /// Builds a memory map from an ordered domain specification. Ordering is
    /// preserved in `order`/`dump` but does not affect slot indices beyond
    /// assigning them in declaration order.
    pub fn build(
        vars: impl IntoIterator<Item = (impl Into<Reference>, DomainSpec)>,
    ) -> Result<MemoryMap, ConfigurationError> {
        let mut types = Vec::new();
        let mut addr = FnvHashMap::default();
        let mut order = Vec::new();
        for (name, spec) in vars {
            let reference: Reference = name.into();
            if addr.contains_key(&reference) {
                return Err(ConfigurationError::MalformedDomain {
                    detail: format!("duplicate variable `{reference}`"),
                });
            }
            let var_type = spec.resolve(&reference.0)?;
            let idx = types.len();
            types.push(var_type);
            addr.insert(reference.clone(), idx);
            order.push(reference);
        }
        Ok(MemoryMap { types, addr, order })
    }

    /// Convenience constructor taking a deterministically ordered map, the
    /// way a caller assembling a domain spec from a `BTreeMap` literal would.
    pub fn from_ordered(
        vars: BTreeMap<String, DomainSpec>,
    ) -> Result<MemoryMap, ConfigurationError> {
        Self::build(vars.into_iter())
    }

    pub fn addr(&self, reference: &Reference) -> Result<usize, ConfigurationError> {
        self.addr
            .get(reference)
            .copied()
            .ok_or_else(|| ConfigurationError::UnknownVariable {
                reference: reference.0.clone(),
            })
    }

    pub fn validate(&self, reference: &Reference, value: Value) -> Result<(), ConfigurationError> {
        let idx = self.addr(reference)?;
        if self.types[idx].validate(value) {
            Ok(())
        } else {
            Err(ConfigurationError::OutOfDomain {
                reference: reference.0.clone(),
                value: value.to_string(),
            })
        }
    }

    pub fn validate_slot(&self, slot: usize, value: Value) -> bool {
        self.types[slot].validate(value)
    }

    pub fn var_type(&self, slot: usize) -> &VarType {
        &self.types[slot]
    }

    pub fn init(&self) -> Memory {
        Memory(self.types.iter().map(VarType::init).collect())
    }

    /// Ordered `(reference, value)` pairs for a memory snapshot, the way
    /// metamath-knife's accessors return results in declaration order
    /// rather than hash order.
    pub fn dump(&self, memory: &Memory) -> Vec<(Reference, Value)> {
        self.order
            .iter()
            .map(|r| (r.clone(), memory.get(self.addr[r])))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn simple_map() -> MemoryMap {
        MemoryMap::build(vec![
            ("a", DomainSpec::Bool),
            ("b", DomainSpec::True),
            ("n", DomainSpec::Range(0, 4)),
        ])
        .unwrap()
    }

    #[test]
    fn init_uses_declared_defaults() {
        let mm = simple_map();
        let mem = mm.init();
        assert_eq!(mem.get(mm.addr(&"a".into()).unwrap()), Value::Bool(false));
        assert_eq!(mem.get(mm.addr(&"b".into()).unwrap()), Value::Bool(true));
        assert_eq!(mem.get(mm.addr(&"n".into()).unwrap()), Value::Int(0));
    }

    #[test]
    fn validate_rejects_out_of_domain() {
        let mm = simple_map();
        let err = mm.validate(&"n".into(), Value::Int(9)).unwrap_err();
        assert_matches!(err, ConfigurationError::OutOfDomain { .. });
    }

    #[test]
    fn unknown_variable_is_configuration_error() {
        let mm = simple_map();
        let err = mm.addr(&"nope".into()).unwrap_err();
        assert_matches!(err, ConfigurationError::UnknownVariable { .. });
    }

    #[test]
    fn empty_values_domain_rejected_at_build() {
        let err = MemoryMap::build(vec![("x", DomainSpec::Values(vec![]))]).unwrap_err();
        assert_matches!(err, ConfigurationError::MalformedDomain { .. });
    }

    #[test]
    fn dump_preserves_declaration_order() {
        let mm = simple_map();
        let mem = mm.init();
        let dumped = mm.dump(&mem);
        let names: Vec<_> = dumped.iter().map(|(r, _)| r.0.clone()).collect();
        assert_eq!(names, vec!["a", "b", "n"]);
    }

    #[test]
    fn with_slot_does_not_mutate_original() {
        let mm = simple_map();
        let mem = mm.init();
        let idx = mm.addr(&"a".into()).unwrap();
        let next = mem.with_slot(idx, Value::Bool(true));
        assert_eq!(mem.get(idx), Value::Bool(false));
        assert_eq!(next.get(idx), Value::Bool(true));
    }
}
