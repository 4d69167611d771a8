#![forbid(unsafe_code)]

//! Dynamic values flowing between a store, its projections, and views.
//!
//! # Identity vs structure
//!
//! Two relations are defined on [`Value`]:
//!
//! - [`Value::identical`] is the *identity* relation used by shallow
//!   equality. Scalars and strings compare by value; lists, maps, callbacks
//!   and opaque payloads compare by `Rc` pointer.
//! - `PartialEq` is *structural* and recurses into containers. It exists for
//!   assertions and is never consulted by the connection engine.
//!
//! Mutating something reachable through an [`Opaque`] payload without
//! replacing the payload is invisible to identity comparison.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use crate::props::Props;

/// A dynamically typed value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    List(Rc<[Value]>),
    Map(Props),
    Func(Callback),
    Opaque(Opaque),
}

/// Exact integer/float equality; no rounding of either side.
fn int_equals_float(int: i64, float: f64) -> bool {
    // 2^63, the first float past i64::MAX.
    const BOUND: f64 = 9_223_372_036_854_775_808.0;
    float.fract() == 0.0 && (-BOUND..BOUND).contains(&float) && float as i64 == int
}

impl Value {
    /// Identity comparison used everywhere "did this change" is decided.
    #[must_use]
    pub fn identical(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            // NaN is never identical to itself.
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Int(a), Self::Float(b)) | (Self::Float(b), Self::Int(a)) => int_equals_float(*a, *b),
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::List(a), Self::List(b)) => Rc::ptr_eq(a, b),
            (Self::Map(a), Self::Map(b)) => a.ptr_eq(b),
            (Self::Func(a), Self::Func(b)) => a.ptr_eq(b),
            (Self::Opaque(a), Self::Opaque(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Short type label for diagnostics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Func(_) => "function",
            Self::Opaque(_) => "opaque",
        }
    }

    /// Human-readable description including the value for scalars.
    ///
    /// Used in `ProjectionType` errors, e.g. `integer 1` or
    /// `opaque demo::AwesomeMap`.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Null => "null".to_string(),
            Self::Bool(b) => format!("boolean {b}"),
            Self::Int(i) => format!("integer {i}"),
            Self::Float(x) => format!("float {x}"),
            Self::Str(s) => format!("string {s:?}"),
            Self::List(items) => format!("list of {} items", items.len()),
            Self::Map(props) => format!("map of {} entries", props.len()),
            Self::Func(_) => "function".to_string(),
            Self::Opaque(o) => format!("opaque {}", o.type_name()),
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(x) => Some(*x),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_map(&self) -> Option<&Props> {
        match self {
            Self::Map(props) => Some(props),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_func(&self) -> Option<&Callback> {
        match self {
            Self::Func(f) => Some(f),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_opaque(&self) -> Option<&Opaque> {
        match self {
            Self::Opaque(o) => Some(o),
            _ => None,
        }
    }

    /// Look up `key` when this value is a map.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map().and_then(|props| props.get(key))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::List(a), Self::List(b)) => Rc::ptr_eq(a, b) || a[..] == b[..],
            (Self::Map(a), Self::Map(b)) => a == b,
            _ => self.identical(other),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x:?}"),
            Self::Str(s) => write!(f, "{:?}", &**s),
            Self::List(items) => f.debug_list().entries(items.iter()).finish(),
            Self::Map(props) => fmt::Debug::fmt(props, f),
            Self::Func(cb) => fmt::Debug::fmt(cb, f),
            Self::Opaque(o) => fmt::Debug::fmt(o, f),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(Rc::from(s))
    }
}

impl From<Rc<str>> for Value {
    fn from(s: Rc<str>) -> Self {
        Self::Str(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::List(Rc::from(items))
    }
}

impl From<Props> for Value {
    fn from(props: Props) -> Self {
        Self::Map(props)
    }
}

impl From<Callback> for Value {
    fn from(cb: Callback) -> Self {
        Self::Func(cb)
    }
}

impl From<Opaque> for Value {
    fn from(o: Opaque) -> Self {
        Self::Opaque(o)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

// ---------------------------------------------------------------------------
// Callback
// ---------------------------------------------------------------------------

/// A shared function value with pointer identity.
///
/// A store's dispatch function is a `Callback`; so are bound action
/// creators. Cloning shares the same function, so clones stay identical.
#[derive(Clone)]
pub struct Callback(Rc<dyn Fn(Value) -> Value>);

impl Callback {
    pub fn new(f: impl Fn(Value) -> Value + 'static) -> Self {
        Self(Rc::new(f))
    }

    /// Invoke the function.
    pub fn call(&self, arg: Value) -> Value {
        (self.0)(arg)
    }

    /// Whether both handles point at the same function.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callback({:p})", Rc::as_ptr(&self.0).cast::<()>())
    }
}

// ---------------------------------------------------------------------------
// Opaque
// ---------------------------------------------------------------------------

/// An arbitrary payload that is not a plain mapping.
///
/// Compared by pointer only. Interior mutability inside the payload is
/// never observed by shallow equality.
#[derive(Clone)]
pub struct Opaque {
    inner: Rc<dyn Any>,
    type_name: &'static str,
}

impl Opaque {
    pub fn new<T: Any>(value: T) -> Self {
        Self {
            inner: Rc::new(value),
            type_name: std::any::type_name::<T>(),
        }
    }

    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// Fully qualified Rust type name of the payload.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Opaque<{}>", self.type_name)
    }
}
