//! Runtime values of the script dialect.
//!
//! Containers share structure through `Rc` so that a list handed to a
//! function and mutated there is visible to the caller, as scripts expect.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use super::ast::FunctionDef;
use super::error::ScriptError;
use super::interp::{Env, Interpreter};
use crate::script_err;

/// Signature shared by every natively implemented callable.
pub type NativeFn = dyn Fn(&mut Interpreter<'_>, Args) -> Result<Value, ScriptError>;

/// Represents a value produced or consumed by a script.
///
/// # Examples
///
/// ```rust
/// use docrun::script::Value;
/// let v = Value::from("hello");
/// assert_eq!(v.type_name(), "string");
/// assert_eq!(v.repr(), "\"hello\"");
/// assert_eq!(Value::Float(2.0).to_string(), "2.0");
/// ```
#[derive(Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Rc<RefCell<Vec<Value>>>),
    Tuple(Rc<Vec<Value>>),
    Dict(Rc<RefCell<IndexMap<DictKey, Value>>>),
    Function(Rc<Function>),
    Builtin(Rc<Builtin>),
    Struct(Rc<Struct>),
}

/// The hashable subset of values usable as dictionary keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DictKey {
    None,
    Bool(bool),
    Int(i64),
    Str(String),
    Tuple(Vec<DictKey>),
}

/// Local variables of one function activation, shared with the functions it defines.
pub type Locals = Rc<RefCell<HashMap<String, Value>>>;

/// A function defined by a `def` statement or a `lambda` expression.
pub struct Function {
    pub def: Rc<FunctionDef>,
    pub defaults: Vec<Option<Value>>,
    pub globals: Rc<RefCell<Env>>,
    /// Locals of the enclosing activations, innermost last.
    pub enclosing: Vec<Locals>,
}

/// A natively implemented function or bound method.
pub struct Builtin {
    pub name: String,
    pub func: Rc<NativeFn>,
}

/// An immutable record with named fields, used for modules and handles.
pub struct Struct {
    pub type_name: String,
    pub fields: IndexMap<String, Value>,
}

/// Arguments of a call after evaluation.
#[derive(Clone, Default)]
pub struct Args {
    pub positional: Vec<Value>,
    pub named: Vec<(String, Value)>,
}

// ============================================================================
// CONSTRUCTORS
// ============================================================================

impl Value {
    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn tuple(items: Vec<Value>) -> Value {
        Value::Tuple(Rc::new(items))
    }

    pub fn dict(entries: IndexMap<DictKey, Value>) -> Value {
        Value::Dict(Rc::new(RefCell::new(entries)))
    }

    pub fn builtin<F>(name: impl Into<String>, func: F) -> Value
    where
        F: Fn(&mut Interpreter<'_>, Args) -> Result<Value, ScriptError> + 'static,
    {
        Value::Builtin(Rc::new(Builtin {
            name: name.into(),
            func: Rc::new(func),
        }))
    }

    pub fn structure(type_name: impl Into<String>, fields: IndexMap<String, Value>) -> Value {
        Value::Struct(Rc::new(Struct {
            type_name: type_name.into(),
            fields,
        }))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

// ============================================================================
// INSPECTION
// ============================================================================

impl Value {
    pub fn type_name(&self) -> &str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Dict(_) => "dict",
            Value::Function(_) => "function",
            Value::Builtin(_) => "builtin_function_or_method",
            Value::Struct(s) => &s.type_name,
        }
    }

    pub fn truth(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(x) => *x != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.borrow().is_empty(),
            Value::Tuple(items) => !items.is_empty(),
            Value::Dict(entries) => !entries.borrow().is_empty(),
            Value::Function(_) | Value::Builtin(_) | Value::Struct(_) => true,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Elements of an iterable value, snapshotted so the source may be
    /// mutated while iterating.
    pub fn iterate(&self) -> Result<Vec<Value>, ScriptError> {
        match self {
            Value::List(items) => Ok(items.borrow().clone()),
            Value::Tuple(items) => Ok(items.as_ref().clone()),
            Value::Dict(entries) => Ok(entries.borrow().keys().map(DictKey::to_value).collect()),
            other => script_err!("{} value is not iterable", other.type_name()),
        }
    }

    pub fn is_iterable(&self) -> bool {
        matches!(self, Value::List(_) | Value::Tuple(_) | Value::Dict(_))
    }

    /// Quoted representation, as produced by `repr()`.
    pub fn repr(&self) -> String {
        match self {
            Value::Str(s) => format!("{:?}", s),
            other => other.to_string(),
        }
    }

    /// Identity of a mutable container, used to detect cycles.
    fn container_id(&self) -> Option<usize> {
        match self {
            Value::List(items) => Some(Rc::as_ptr(items) as *const () as usize),
            Value::Dict(entries) => Some(Rc::as_ptr(entries) as *const () as usize),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_value(f, self, &mut Vec::new())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.repr())
    }
}

/// Writes `value`; `open` holds the containers currently being written, so a
/// container that contains itself prints as `[...]` or `{...}`.
fn write_value(f: &mut fmt::Formatter<'_>, value: &Value, open: &mut Vec<usize>) -> fmt::Result {
    if let Some(id) = value.container_id() {
        if open.contains(&id) {
            return match value {
                Value::Dict(_) => write!(f, "{{...}}"),
                _ => write!(f, "[...]"),
            };
        }
        open.push(id);
    }
    let result = match value {
        Value::None => write!(f, "None"),
        Value::Bool(true) => write!(f, "True"),
        Value::Bool(false) => write!(f, "False"),
        Value::Int(n) => write!(f, "{}", n),
        Value::Float(x) => write!(f, "{}", format_float(*x)),
        Value::Str(s) => write!(f, "{}", s),
        Value::List(items) => write_seq(f, "[", "]", &items.borrow(), false, open),
        Value::Tuple(items) => write_seq(f, "(", ")", items, items.len() == 1, open),
        Value::Dict(entries) => write_dict(f, &entries.borrow(), open),
        Value::Function(func) => write!(f, "<function {}>", func.def.name),
        Value::Builtin(b) => write!(f, "<built-in function {}>", b.name),
        Value::Struct(s) => {
            write!(f, "{}(", s.type_name)?;
            for (i, (k, v)) in s.fields.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{} = ", k)?;
                write_repr(f, v, open)?;
            }
            write!(f, ")")
        }
    };
    if value.container_id().is_some() {
        open.pop();
    }
    result
}

fn write_repr(f: &mut fmt::Formatter<'_>, value: &Value, open: &mut Vec<usize>) -> fmt::Result {
    match value {
        Value::Str(s) => write!(f, "{:?}", s),
        other => write_value(f, other, open),
    }
}

fn write_seq(
    f: &mut fmt::Formatter<'_>,
    open_delim: &str,
    close_delim: &str,
    items: &[Value],
    trailing_comma: bool,
    open: &mut Vec<usize>,
) -> fmt::Result {
    write!(f, "{}", open_delim)?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write_repr(f, item, open)?;
    }
    if trailing_comma {
        write!(f, ",")?;
    }
    write!(f, "{}", close_delim)
}

fn write_dict(
    f: &mut fmt::Formatter<'_>,
    entries: &IndexMap<DictKey, Value>,
    open: &mut Vec<usize>,
) -> fmt::Result {
    write!(f, "{{")?;
    for (i, (k, v)) in entries.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}: ", k.to_value().repr())?;
        write_repr(f, v, open)?;
    }
    write!(f, "}}")
}

fn format_float(x: f64) -> String {
    if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e16 {
        format!("{:.1}", x)
    } else {
        format!("{}", x)
    }
}

// ============================================================================
// EQUALITY AND ORDERING
// ============================================================================

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => *a as f64 == *b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::Dict(a), Value::Dict(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len() && a.iter().all(|(k, v)| b.get(k) == Some(v))
            }
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => Rc::ptr_eq(a, b),
            (Value::Struct(a), Value::Struct(b)) => {
                Rc::ptr_eq(a, b) || (a.type_name == b.type_name && a.fields == b.fields)
            }
            _ => false,
        }
    }
}

/// Orders two values, failing for types without a defined order.
pub fn compare(a: &Value, b: &Value) -> Result<Ordering, ScriptError> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Ok(x.cmp(y)),
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            let (x, y) = (as_f64(a), as_f64(b));
            x.partial_cmp(&y)
                .ok_or_else(|| ScriptError::new("comparison of NaN"))
        }
        (Value::Str(x), Value::Str(y)) => Ok(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Ok(x.cmp(y)),
        (Value::List(x), Value::List(y)) => compare_seq(&x.borrow(), &y.borrow()),
        (Value::Tuple(x), Value::Tuple(y)) => compare_seq(x, y),
        _ => script_err!("{} < {} not implemented", a.type_name(), b.type_name()),
    }
}

fn compare_seq(a: &[Value], b: &[Value]) -> Result<Ordering, ScriptError> {
    for (x, y) in a.iter().zip(b) {
        let ord = compare(x, y)?;
        if ord != Ordering::Equal {
            return Ok(ord);
        }
    }
    Ok(a.len().cmp(&b.len()))
}

/// Truncates `x` towards zero, or `None` when the result does not fit an int.
pub(crate) fn float_to_int(x: f64) -> Option<i64> {
    let t = x.trunc();
    // 2^63 is exactly representable, so the upper bound is exclusive.
    if t.is_finite() && t >= i64::MIN as f64 && t < i64::MAX as f64 {
        Some(t as i64)
    } else {
        None
    }
}

pub(crate) fn as_f64(v: &Value) -> f64 {
    match v {
        Value::Int(n) => *n as f64,
        Value::Float(x) => *x,
        _ => f64::NAN,
    }
}

// ============================================================================
// DICTIONARY KEYS
// ============================================================================

impl DictKey {
    pub fn from_value(value: &Value) -> Result<DictKey, ScriptError> {
        match value {
            Value::None => Ok(DictKey::None),
            Value::Bool(b) => Ok(DictKey::Bool(*b)),
            Value::Int(n) => Ok(DictKey::Int(*n)),
            Value::Float(x) if x.fract() == 0.0 && x.abs() < 9.0e15 => Ok(DictKey::Int(*x as i64)),
            Value::Str(s) => Ok(DictKey::Str(s.clone())),
            Value::Tuple(items) => Ok(DictKey::Tuple(
                items
                    .iter()
                    .map(DictKey::from_value)
                    .collect::<Result<_, _>>()?,
            )),
            other => script_err!("unhashable type: {}", other.type_name()),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            DictKey::None => Value::None,
            DictKey::Bool(b) => Value::Bool(*b),
            DictKey::Int(n) => Value::Int(*n),
            DictKey::Str(s) => Value::Str(s.clone()),
            DictKey::Tuple(items) => Value::tuple(items.iter().map(DictKey::to_value).collect()),
        }
    }
}

impl From<&str> for DictKey {
    fn from(s: &str) -> Self {
        DictKey::Str(s.to_string())
    }
}

// ============================================================================
// DATA CONVERSION
// ============================================================================

impl Value {
    /// Converts a data value into JSON; callables, structs and containers
    /// that contain themselves have no data form.
    pub fn to_json(&self) -> Result<serde_json::Value, ScriptError> {
        self.to_json_within(&mut Vec::new())
    }

    fn to_json_within(&self, open: &mut Vec<usize>) -> Result<serde_json::Value, ScriptError> {
        if let Some(id) = self.container_id() {
            if open.contains(&id) {
                return script_err!("cannot convert cyclic {} to data", self.type_name());
            }
            open.push(id);
        }
        let json = match self {
            Value::None => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(n) => serde_json::Value::from(*n),
            Value::Float(x) => serde_json::Number::from_f64(*x)
                .map(serde_json::Value::Number)
                .ok_or_else(|| ScriptError::new(format!("cannot convert float {} to data", x)))?,
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::List(items) => serde_json::Value::Array(
                items
                    .borrow()
                    .iter()
                    .map(|v| v.to_json_within(open))
                    .collect::<Result<_, _>>()?,
            ),
            Value::Tuple(items) => serde_json::Value::Array(
                items
                    .iter()
                    .map(|v| v.to_json_within(open))
                    .collect::<Result<_, _>>()?,
            ),
            Value::Dict(entries) => {
                let mut object = serde_json::Map::new();
                for (k, v) in entries.borrow().iter() {
                    let key = match k {
                        DictKey::Str(s) => s.clone(),
                        other => other.to_value().to_string(),
                    };
                    object.insert(key, v.to_json_within(open)?);
                }
                serde_json::Value::Object(object)
            }
            other => return script_err!("cannot convert {} to data", other.type_name()),
        };
        if self.container_id().is_some() {
            open.pop();
        }
        Ok(json)
    }

    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::None,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Str(s.clone()),
            serde_json::Value::Array(items) => {
                Value::list(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(object) => Value::dict(
                object
                    .iter()
                    .map(|(k, v)| (DictKey::Str(k.clone()), Value::from_json(v)))
                    .collect(),
            ),
        }
    }
}

// ============================================================================
// ARGUMENT HELPERS
// ============================================================================

impl Args {
    pub fn positional(values: Vec<Value>) -> Self {
        Self {
            positional: values,
            named: Vec::new(),
        }
    }

    /// Requires between `min` and `max` positional arguments and no keywords.
    pub fn check(&self, name: &str, min: usize, max: usize) -> Result<(), ScriptError> {
        if let Some((key, _)) = self.named.first() {
            return script_err!("{}: unexpected keyword argument {}", name, key);
        }
        let given = self.positional.len();
        if given < min || given > max {
            let want = if min == max {
                min.to_string()
            } else if given < min {
                format!("at least {}", min)
            } else {
                format!("at most {}", max)
            };
            return script_err!("{}: got {} arguments, want {}", name, given, want);
        }
        Ok(())
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.positional.get(index)
    }

    pub fn take_named(&mut self, key: &str) -> Option<Value> {
        let index = self.named.iter().position(|(k, _)| k == key)?;
        Some(self.named.remove(index).1)
    }

    pub fn str_at(&self, name: &str, index: usize) -> Result<String, ScriptError> {
        match self.positional.get(index) {
            Some(Value::Str(s)) => Ok(s.clone()),
            Some(other) => script_err!(
                "{}: for parameter {}: got {}, want string",
                name,
                index + 1,
                other.type_name()
            ),
            None => script_err!("{}: missing argument {}", name, index + 1),
        }
    }

    pub fn int_at(&self, name: &str, index: usize) -> Result<i64, ScriptError> {
        match self.positional.get(index) {
            Some(Value::Int(n)) => Ok(*n),
            Some(other) => script_err!(
                "{}: for parameter {}: got {}, want int",
                name,
                index + 1,
                other.type_name()
            ),
            None => script_err!("{}: missing argument {}", name, index + 1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_script_conventions() {
        let v = Value::list(vec![Value::from("a"), Value::Int(1), Value::Float(2.5), Value::None]);
        assert_eq!(v.to_string(), "[\"a\", 1, 2.5, None]");
        assert_eq!(Value::tuple(vec![Value::Int(1)]).to_string(), "(1,)");
        assert_eq!(Value::Bool(true).to_string(), "True");
    }

    #[test]
    fn test_int_float_equality() {
        assert_eq!(Value::Int(3), Value::Float(3.0));
        assert_ne!(Value::Int(3), Value::from("3"));
    }

    #[test]
    fn test_lists_share_storage() {
        let a = Value::list(vec![Value::Int(1)]);
        let b = a.clone();
        if let Value::List(items) = &b {
            items.borrow_mut().push(Value::Int(2));
        }
        assert_eq!(a.to_string(), "[1, 2]");
    }

    #[test]
    fn test_json_conversion_preserves_shape() {
        let json = serde_json::json!({"a": [1, 2.5, "x", null, true]});
        let value = Value::from_json(&json);
        assert_eq!(value.to_json().unwrap(), json);
    }

    #[test]
    fn test_callables_have_no_data_form() {
        let f = Value::builtin("noop", |_, _| Ok(Value::None));
        assert!(f.to_json().unwrap_err().message.contains("cannot convert"));
    }

    #[test]
    fn test_unhashable_keys_rejected() {
        let err = DictKey::from_value(&Value::list(vec![])).unwrap_err();
        assert_eq!(err.message, "unhashable type: list");
    }

    #[test]
    fn test_self_containing_list() {
        let list = Value::list(vec![Value::Int(1)]);
        if let Value::List(items) = &list {
            items.borrow_mut().push(list.clone());
        }
        assert_eq!(list.to_string(), "[1, [...]]");
        let err = list.to_json().unwrap_err();
        assert_eq!(err.message, "cannot convert cyclic list to data");

        let shared = Value::list(vec![Value::Int(2)]);
        let twice = Value::list(vec![shared.clone(), shared]);
        assert_eq!(twice.to_string(), "[[2], [2]]");
        assert_eq!(twice.to_json().unwrap(), serde_json::json!([[2], [2]]));
    }

    #[test]
    fn test_float_to_int_bounds() {
        assert_eq!(float_to_int(-2.7), Some(-2));
        assert_eq!(float_to_int(1e300), None);
        assert_eq!(float_to_int(f64::NAN), None);
        assert_eq!(float_to_int(9.223372036854775807e18), None);
    }

    #[test]
    fn test_compare_mixed_numbers() {
        assert_eq!(compare(&Value::Int(1), &Value::Float(1.5)).unwrap(), Ordering::Less);
        assert!(compare(&Value::Int(1), &Value::from("a")).is_err());
    }
}
