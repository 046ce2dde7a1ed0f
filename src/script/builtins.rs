//! Universe of predeclared functions available to every script.

use std::cmp::Ordering;

use indexmap::IndexMap;

use super::error::ScriptError;
use super::interp::{get_attr, Interpreter, MAX_SEQUENCE_LEN};
use super::value::{compare, float_to_int, Args, DictKey, Value};
use crate::script_err;

type BuiltinFn = fn(&mut Interpreter<'_>, Args) -> Result<Value, ScriptError>;

/// Returns the predeclared function bound to `name`, if any.
pub fn lookup(name: &str) -> Option<Value> {
    let func: BuiltinFn = match name {
        "print" => print,
        "len" => len,
        "str" => str_,
        "repr" => repr,
        "int" => int,
        "float" => float,
        "bool" => bool_,
        "range" => range,
        "list" => list,
        "tuple" => tuple,
        "dict" => dict,
        "type" => type_,
        "sorted" => sorted,
        "reversed" => reversed,
        "enumerate" => enumerate,
        "zip" => zip,
        "min" => min,
        "max" => max,
        "abs" => abs,
        "any" => any,
        "all" => all,
        "hasattr" => hasattr,
        "getattr" => getattr,
        "fail" => fail,
        _ => return None,
    };
    Some(Value::builtin(name, func))
}

fn print(interp: &mut Interpreter<'_>, mut args: Args) -> Result<Value, ScriptError> {
    let sep = match args.take_named("sep") {
        Some(Value::Str(s)) => s,
        Some(other) => return script_err!("print: for parameter sep: got {}, want string", other.type_name()),
        None => " ".to_string(),
    };
    args.check("print", 0, usize::MAX)?;
    let line = args
        .positional
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join(&sep);
    interp.print(&line);
    Ok(Value::None)
}

fn len(_: &mut Interpreter<'_>, args: Args) -> Result<Value, ScriptError> {
    args.check("len", 1, 1)?;
    let n = match &args.positional[0] {
        Value::Str(s) => s.chars().count(),
        Value::List(items) => items.borrow().len(),
        Value::Tuple(items) => items.len(),
        Value::Dict(entries) => entries.borrow().len(),
        other => return script_err!("len: value of type {} has no len", other.type_name()),
    };
    Ok(Value::Int(n as i64))
}

fn str_(_: &mut Interpreter<'_>, args: Args) -> Result<Value, ScriptError> {
    args.check("str", 1, 1)?;
    Ok(Value::Str(args.positional[0].to_string()))
}

fn repr(_: &mut Interpreter<'_>, args: Args) -> Result<Value, ScriptError> {
    args.check("repr", 1, 1)?;
    Ok(Value::Str(args.positional[0].repr()))
}

fn int(_: &mut Interpreter<'_>, args: Args) -> Result<Value, ScriptError> {
    args.check("int", 0, 1)?;
    match args.get(0) {
        None => Ok(Value::Int(0)),
        Some(Value::Int(n)) => Ok(Value::Int(*n)),
        Some(Value::Bool(b)) => Ok(Value::Int(*b as i64)),
        Some(Value::Float(x)) => float_to_int(*x)
            .map(Value::Int)
            .ok_or_else(|| ScriptError::new("int: float out of range")),
        Some(Value::Str(s)) => s
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| ScriptError::new(format!("int: invalid literal with base 10: {:?}", s))),
        Some(other) => script_err!("int: cannot convert {} to int", other.type_name()),
    }
}

fn float(_: &mut Interpreter<'_>, args: Args) -> Result<Value, ScriptError> {
    args.check("float", 0, 1)?;
    match args.get(0) {
        None => Ok(Value::Float(0.0)),
        Some(Value::Int(n)) => Ok(Value::Float(*n as f64)),
        Some(Value::Float(x)) => Ok(Value::Float(*x)),
        Some(Value::Bool(b)) => Ok(Value::Float(if *b { 1.0 } else { 0.0 })),
        Some(Value::Str(s)) => s
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| ScriptError::new(format!("float: invalid float literal: {:?}", s))),
        Some(other) => script_err!("float: cannot convert {} to float", other.type_name()),
    }
}

fn bool_(_: &mut Interpreter<'_>, args: Args) -> Result<Value, ScriptError> {
    args.check("bool", 0, 1)?;
    Ok(Value::Bool(args.get(0).map(Value::truth).unwrap_or(false)))
}

fn range(_: &mut Interpreter<'_>, args: Args) -> Result<Value, ScriptError> {
    args.check("range", 1, 3)?;
    let (start, stop) = match args.positional.len() {
        1 => (0, args.int_at("range", 0)?),
        _ => (args.int_at("range", 0)?, args.int_at("range", 1)?),
    };
    let step = if args.positional.len() == 3 {
        args.int_at("range", 2)?
    } else {
        1
    };
    if step == 0 {
        return script_err!("range: step argument must not be zero");
    }
    let (start, stop, step) = (start as i128, stop as i128, step as i128);
    let span = if step > 0 { stop - start } else { start - stop };
    let len = if span > 0 { (span - 1) / step.abs() + 1 } else { 0 };
    if len > MAX_SEQUENCE_LEN as i128 {
        return script_err!("range: {} elements exceed the limit of {}", len, MAX_SEQUENCE_LEN);
    }
    // Every element lies between start and stop, so it fits an i64.
    Ok(Value::list(
        (0..len).map(|k| Value::Int((start + k * step) as i64)).collect(),
    ))
}

fn list(_: &mut Interpreter<'_>, args: Args) -> Result<Value, ScriptError> {
    args.check("list", 0, 1)?;
    match args.get(0) {
        None => Ok(Value::list(Vec::new())),
        Some(v) => Ok(Value::list(v.iterate()?)),
    }
}

fn tuple(_: &mut Interpreter<'_>, args: Args) -> Result<Value, ScriptError> {
    args.check("tuple", 0, 1)?;
    match args.get(0) {
        None => Ok(Value::tuple(Vec::new())),
        Some(v) => Ok(Value::tuple(v.iterate()?)),
    }
}

fn dict(_: &mut Interpreter<'_>, args: Args) -> Result<Value, ScriptError> {
    if args.positional.len() > 1 {
        return script_err!("dict: got {} arguments, want at most 1", args.positional.len());
    }
    let mut entries = IndexMap::new();
    if let Some(source) = args.get(0) {
        insert_pairs(&mut entries, source, "dict")?;
    }
    for (key, value) in args.named {
        entries.insert(DictKey::Str(key), value);
    }
    Ok(Value::dict(entries))
}

/// Adds the entries of a dict, or of an iterable of pairs, to `entries`.
pub(crate) fn insert_pairs(
    entries: &mut IndexMap<DictKey, Value>,
    source: &Value,
    name: &str,
) -> Result<(), ScriptError> {
    if let Value::Dict(other) = source {
        for (k, v) in other.borrow().iter() {
            entries.insert(k.clone(), v.clone());
        }
        return Ok(());
    }
    for (i, pair) in source.iterate()?.into_iter().enumerate() {
        let items = pair.iterate()?;
        if items.len() != 2 {
            return script_err!(
                "{}: element #{} has length {}, want 2",
                name,
                i,
                items.len()
            );
        }
        entries.insert(DictKey::from_value(&items[0])?, items[1].clone());
    }
    Ok(())
}

fn type_(_: &mut Interpreter<'_>, args: Args) -> Result<Value, ScriptError> {
    args.check("type", 1, 1)?;
    Ok(Value::from(args.positional[0].type_name()))
}

fn sorted(interp: &mut Interpreter<'_>, mut args: Args) -> Result<Value, ScriptError> {
    let key = args.take_named("key").filter(|k| !matches!(k, Value::None));
    let reverse = args.take_named("reverse").map(|r| r.truth()).unwrap_or(false);
    args.check("sorted", 1, 1)?;
    let items = args.positional[0].iterate()?;
    let keys = match &key {
        Some(func) => items
            .iter()
            .map(|item| interp.call(func, Args::positional(vec![item.clone()])))
            .collect::<Result<Vec<_>, _>>()?,
        None => items.clone(),
    };
    let mut order: Vec<usize> = (0..items.len()).collect();
    let mut failure = None;
    order.sort_by(|&a, &b| match compare(&keys[a], &keys[b]) {
        Ok(ord) => ord,
        Err(e) => {
            failure.get_or_insert(e);
            Ordering::Equal
        }
    });
    if let Some(e) = failure {
        return Err(e);
    }
    if reverse {
        order.reverse();
    }
    Ok(Value::list(order.into_iter().map(|i| items[i].clone()).collect()))
}

fn reversed(_: &mut Interpreter<'_>, args: Args) -> Result<Value, ScriptError> {
    args.check("reversed", 1, 1)?;
    let mut items = args.positional[0].iterate()?;
    items.reverse();
    Ok(Value::list(items))
}

fn enumerate(_: &mut Interpreter<'_>, mut args: Args) -> Result<Value, ScriptError> {
    let start = match args.take_named("start") {
        Some(Value::Int(n)) => n,
        Some(other) => return script_err!("enumerate: for parameter start: got {}, want int", other.type_name()),
        None => 0,
    };
    args.check("enumerate", 1, 2)?;
    let start = if args.positional.len() == 2 {
        args.int_at("enumerate", 1)?
    } else {
        start
    };
    let items = args.positional[0].iterate()?;
    Ok(Value::list(
        items
            .into_iter()
            .enumerate()
            .map(|(i, v)| Value::tuple(vec![Value::Int(start + i as i64), v]))
            .collect(),
    ))
}

fn zip(_: &mut Interpreter<'_>, args: Args) -> Result<Value, ScriptError> {
    args.check("zip", 0, usize::MAX)?;
    let columns = args
        .positional
        .iter()
        .map(Value::iterate)
        .collect::<Result<Vec<_>, _>>()?;
    let rows = columns.iter().map(Vec::len).min().unwrap_or(0);
    Ok(Value::list(
        (0..rows)
            .map(|r| Value::tuple(columns.iter().map(|c| c[r].clone()).collect()))
            .collect(),
    ))
}

fn extremum(
    interp: &mut Interpreter<'_>,
    mut args: Args,
    name: &str,
    want: Ordering,
) -> Result<Value, ScriptError> {
    let key = args.take_named("key");
    args.check(name, 1, usize::MAX)?;
    let items = if args.positional.len() == 1 {
        args.positional[0].iterate()?
    } else {
        args.positional
    };
    let mut best: Option<(Value, Value)> = None;
    for item in items {
        let k = match &key {
            Some(func) => interp.call(func, Args::positional(vec![item.clone()]))?,
            None => item.clone(),
        };
        let replace = match &best {
            None => true,
            Some((best_key, _)) => compare(&k, best_key)? == want,
        };
        if replace {
            best = Some((k, item));
        }
    }
    best.map(|(_, v)| v)
        .ok_or_else(|| ScriptError::new(format!("{}: argument is an empty sequence", name)))
}

fn min(interp: &mut Interpreter<'_>, args: Args) -> Result<Value, ScriptError> {
    extremum(interp, args, "min", Ordering::Less)
}

fn max(interp: &mut Interpreter<'_>, args: Args) -> Result<Value, ScriptError> {
    extremum(interp, args, "max", Ordering::Greater)
}

fn abs(_: &mut Interpreter<'_>, args: Args) -> Result<Value, ScriptError> {
    args.check("abs", 1, 1)?;
    match &args.positional[0] {
        Value::Int(n) => n
            .checked_abs()
            .map(Value::Int)
            .ok_or_else(|| ScriptError::new("integer overflow")),
        Value::Float(x) => Ok(Value::Float(x.abs())),
        other => script_err!("abs: got {}, want int or float", other.type_name()),
    }
}

fn any(_: &mut Interpreter<'_>, args: Args) -> Result<Value, ScriptError> {
    args.check("any", 1, 1)?;
    Ok(Value::Bool(args.positional[0].iterate()?.iter().any(Value::truth)))
}

fn all(_: &mut Interpreter<'_>, args: Args) -> Result<Value, ScriptError> {
    args.check("all", 1, 1)?;
    Ok(Value::Bool(args.positional[0].iterate()?.iter().all(Value::truth)))
}

fn hasattr(_: &mut Interpreter<'_>, args: Args) -> Result<Value, ScriptError> {
    args.check("hasattr", 2, 2)?;
    let name = args.str_at("hasattr", 1)?;
    Ok(Value::Bool(get_attr(&args.positional[0], &name).is_ok()))
}

fn getattr(_: &mut Interpreter<'_>, args: Args) -> Result<Value, ScriptError> {
    args.check("getattr", 2, 3)?;
    let name = args.str_at("getattr", 1)?;
    match (get_attr(&args.positional[0], &name), args.get(2)) {
        (Ok(value), _) => Ok(value),
        (Err(_), Some(default)) => Ok(default.clone()),
        (Err(e), None) => Err(e),
    }
}

fn fail(_: &mut Interpreter<'_>, args: Args) -> Result<Value, ScriptError> {
    let message = args
        .positional
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    script_err!("fail: {}", message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::interp::{Env, NoModules};

    fn eval(source: &str) -> Result<String, ScriptError> {
        let mut out = Vec::new();
        let env = Interpreter::new(&NoModules, &mut out)
            .exec_file(&format!("result = {}", source), Env::new())?;
        Ok(env.get("result").map(Value::repr).unwrap_or_default())
    }

    #[test]
    fn test_conversions() {
        assert_eq!(eval("int('42')").unwrap(), "42");
        assert_eq!(eval("int(3.9)").unwrap(), "3");
        assert_eq!(eval("float(2)").unwrap(), "2.0");
        assert_eq!(eval("str(1.5)").unwrap(), "\"1.5\"");
        assert_eq!(eval("repr('a')").unwrap(), "\"\\\"a\\\"\"");
        assert!(eval("int('x')").is_err());
    }

    #[test]
    fn test_int_of_huge_float_is_an_error() {
        assert_eq!(eval("int(-2.5)").unwrap(), "-2");
        let err = eval("int(1e300)").unwrap_err();
        assert_eq!(err.message, "int: float out of range");
    }

    #[test]
    fn test_sequences() {
        assert_eq!(eval("range(3)").unwrap(), "[0, 1, 2]");
        assert_eq!(eval("range(5, 0, -2)").unwrap(), "[5, 3, 1]");
        assert_eq!(eval("range(3, 3)").unwrap(), "[]");
        assert_eq!(
            eval("range(9223372036854775805, 9223372036854775807)").unwrap(),
            "[9223372036854775805, 9223372036854775806]"
        );
        let err = eval("range(100000000000)").unwrap_err();
        assert!(err.message.contains("exceed the limit"));
        assert_eq!(eval("list(enumerate(['a', 'b'], 1))").unwrap(), "[(1, \"a\"), (2, \"b\")]");
        assert_eq!(eval("zip([1, 2, 3], 'ab'.split('a'))").unwrap(), "[(1, \"\"), (2, \"b\")]");
        assert_eq!(eval("sorted([3, 1, 2], reverse=True)").unwrap(), "[3, 2, 1]");
        assert_eq!(eval("sorted(['bb', 'a'], key=len)").unwrap(), "[\"a\", \"bb\"]");
    }

    #[test]
    fn test_dict_builtin() {
        assert_eq!(eval("dict([('a', 1)], b=2)").unwrap(), "{\"a\": 1, \"b\": 2}");
    }

    #[test]
    fn test_min_max() {
        assert_eq!(eval("min([4, 2, 8])").unwrap(), "2");
        assert_eq!(eval("max(1, 5, 3)").unwrap(), "5");
        assert!(eval("max([])").unwrap_err().message.contains("empty sequence"));
    }

    #[test]
    fn test_fail_reports_message() {
        let err = eval("fail('bad', 1)").unwrap_err();
        assert_eq!(err.message, "fail: bad 1");
    }

    #[test]
    fn test_type_and_len() {
        assert_eq!(eval("type({})").unwrap(), "\"dict\"");
        assert_eq!(eval("len('héllo')").unwrap(), "5");
    }
}
