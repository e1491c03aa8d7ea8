//! The tagged runtime value variant (spec §3 "Value") and its structural
//! equality/hashing.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use indexmap::IndexMap;

use crate::errors::VentureError;
use crate::expr::Expression;
use crate::ids::{EnvId, RequestId, SpId};

/// A runtime value. Immutable and freely shared; no variant holds mutable
/// state (spec §3).
#[derive(Debug, Clone)]
pub enum Value {
    /// IEEE-754 double.
    Number(f64),
    /// Boolean.
    Bool(bool),
    /// Opaque integer tag, used for CRP/categorical outcomes and the like.
    Atom(u32),
    /// Interned-by-content symbol name.
    Symbol(Rc<str>),
    /// The empty list.
    Nil,
    /// Cons cell.
    Pair(Rc<Value>, Rc<Value>),
    /// Fixed-length vector.
    Array(Rc<[Value]>),
    /// Ordered map keyed by structural value equality.
    Map(Rc<IndexMap<ValueKey, Value>>),
    /// A reference to a lexical environment frame.
    Env(EnvId),
    /// A reference to a stochastic procedure instance.
    Procedure(SpId),
    /// Emitted by a request-PSP: either reuses an existing family (carried
    /// by the matching `FamilyId` inside `expression`'s provenance) or
    /// instantiates a fresh one by expression.
    Request(RequestId, Rc<Expression>, EnvId),
}

impl Value {
    /// Human readable type name, used in type-mismatch error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Bool(_) => "bool",
            Value::Atom(_) => "atom",
            Value::Symbol(_) => "symbol",
            Value::Nil => "nil",
            Value::Pair(..) => "pair",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
            Value::Env(_) => "env",
            Value::Procedure(_) => "procedure",
            Value::Request(..) => "request",
        }
    }

    /// Coerces this value to a number, or reports a typed error.
    pub fn as_number(&self, operator: &str) -> Result<f64, VentureError> {
        match self {
            Value::Number(x) => Ok(*x),
            other => Err(VentureError::type_error(operator, "number", other.kind_name())),
        }
    }

    /// Coerces this value to a bool, or reports a typed error.
    pub fn as_bool(&self, operator: &str) -> Result<bool, VentureError> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(VentureError::type_error(operator, "bool", other.kind_name())),
        }
    }

    /// Coerces this value to an atom, or reports a typed error.
    pub fn as_atom(&self, operator: &str) -> Result<u32, VentureError> {
        match self {
            Value::Atom(a) => Ok(*a),
            other => Err(VentureError::type_error(operator, "atom", other.kind_name())),
        }
    }

    /// Coerces this value to a symbol, or reports a typed error.
    pub fn as_symbol(&self, operator: &str) -> Result<&Rc<str>, VentureError> {
        match self {
            Value::Symbol(s) => Ok(s),
            other => Err(VentureError::type_error(operator, "symbol", other.kind_name())),
        }
    }

    /// Coerces this value to an array slice, or reports a typed error.
    pub fn as_array(&self, operator: &str) -> Result<&[Value], VentureError> {
        match self {
            Value::Array(xs) => Ok(xs),
            other => Err(VentureError::type_error(operator, "array", other.kind_name())),
        }
    }

    /// Returns true iff this value is `Nil` or a `Pair` (a proper list cell).
    pub fn is_pair_or_nil(&self) -> bool {
        matches!(self, Value::Nil | Value::Pair(..))
    }

    /// Builds a `Value` list from a slice, outermost-first.
    pub fn list_from(values: &[Value]) -> Value {
        let mut acc = Value::Nil;
        for value in values.iter().rev() {
            acc = Value::Pair(Rc::new(value.clone()), Rc::new(acc));
        }
        acc
    }

    /// Collects a proper list into a `Vec`, erroring on improper lists.
    pub fn list_to_vec(&self, operator: &str) -> Result<Vec<Value>, VentureError> {
        let mut out = Vec::new();
        let mut cur = self;
        loop {
            match cur {
                Value::Nil => return Ok(out),
                Value::Pair(head, tail) => {
                    out.push((**head).clone());
                    cur = tail;
                }
                other => {
                    return Err(VentureError::type_error(operator, "list", other.kind_name()))
                }
            }
        }
    }
}

/// Bitwise-consistent structural equality: `Number`s compare by IEEE bit
/// pattern (so `NaN == NaN` and `+0.0 != -0.0` is actually not an issue
/// since we never need float total order, only a relation consistent with
/// hashing) rather than IEEE `==`, matching spec §3's "hashing is consistent
/// with equality" requirement.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a.to_bits() == b.to_bits(),
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Atom(a), Value::Atom(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Nil, Value::Nil) => true,
            (Value::Pair(a0, a1), Value::Pair(b0, b1)) => a0 == b0 && a1 == b1,
            (Value::Array(a), Value::Array(b)) => a.as_ref() == b.as_ref(),
            (Value::Map(a), Value::Map(b)) => {
                a.len() == b.len() && a.iter().all(|(k, v)| b.get(k) == Some(v))
            }
            (Value::Env(a), Value::Env(b)) => a == b,
            (Value::Procedure(a), Value::Procedure(b)) => a == b,
            (Value::Request(a_id, ..), Value::Request(b_id, ..)) => a_id == b_id,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Number(x) => x.to_bits().hash(state),
            Value::Bool(b) => b.hash(state),
            Value::Atom(a) => a.hash(state),
            Value::Symbol(s) => s.hash(state),
            Value::Nil => {}
            Value::Pair(a, b) => {
                a.hash(state);
                b.hash(state);
            }
            Value::Array(xs) => {
                for x in xs.iter() {
                    x.hash(state);
                }
            }
            Value::Map(m) => {
                // Order-independent so equal maps with different internal
                // insertion order still hash equal.
                let mut acc: u64 = 0;
                for (k, v) in m.iter() {
                    let mut sub = std::collections::hash_map::DefaultHasher::new();
                    k.hash(&mut sub);
                    v.hash(&mut sub);
                    acc ^= sub.finish();
                }
                acc.hash(state);
            }
            Value::Env(id) => id.hash(state),
            Value::Procedure(id) => id.hash(state),
            Value::Request(id, ..) => id.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(x) => write!(f, "{x}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Atom(a) => write!(f, "#{a}"),
            Value::Symbol(s) => write!(f, "{s}"),
            Value::Nil => write!(f, "()"),
            Value::Pair(..) => {
                write!(f, "(")?;
                let mut cur = self;
                let mut first = true;
                loop {
                    match cur {
                        Value::Pair(head, tail) => {
                            if !first {
                                write!(f, " ")?;
                            }
                            write!(f, "{head}")?;
                            first = false;
                            cur = tail;
                        }
                        Value::Nil => break,
                        other => {
                            write!(f, " . {other}")?;
                            break;
                        }
                    }
                }
                write!(f, ")")
            }
            Value::Array(xs) => {
                write!(f, "[")?;
                for (i, x) in xs.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{x}")?;
                }
                write!(f, "]")
            }
            Value::Map(_) => write!(f, "<map>"),
            Value::Env(id) => write!(f, "<env {}>", id.as_raw()),
            Value::Procedure(id) => write!(f, "<procedure {}>", id.as_raw()),
            Value::Request(id, ..) => write!(f, "<request {}>", id.as_raw()),
        }
    }
}

/// A `Value` projected for use as a map/set key. `Value` itself already has
/// a structural `Eq`/`Hash` impl; `ValueKey` exists as a distinct newtype so
/// call sites that build `Map` keys read clearly, and so `IndexMap`'s
/// `Borrow` requirements never accidentally let a non-key-shaped comparison
/// slip in (see SPEC_FULL.md's Open Question on map keys).
#[derive(Debug, Clone)]
pub struct ValueKey(pub Value);

impl PartialEq for ValueKey {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for ValueKey {}

impl Hash for ValueKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state)
    }
}

impl From<Value> for ValueKey {
    fn from(value: Value) -> Self {
        ValueKey(value)
    }
}
