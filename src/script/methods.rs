//! Methods of the built-in string, list and dict types.

use indexmap::IndexMap;

use super::builtins::insert_pairs;
use super::error::ScriptError;
use super::interp::Interpreter;
use super::value::{Args, DictKey, Value};
use crate::script_err;

type Method = fn(&mut Interpreter<'_>, &Value, Args) -> Result<Value, ScriptError>;

/// Binds method `name` to `receiver`, producing a callable value.
pub(crate) fn bind(receiver: &Value, name: &str) -> Option<Value> {
    let method = match receiver {
        Value::Str(_) => string_method(name)?,
        Value::List(_) => list_method(name)?,
        Value::Dict(_) => dict_method(name)?,
        _ => return None,
    };
    let recv = receiver.clone();
    Some(Value::builtin(name, move |interp, args| {
        method(interp, &recv, args)
    }))
}

// ============================================================================
// STRING METHODS
// ============================================================================

fn string_method(name: &str) -> Option<Method> {
    let method: Method = match name {
        "upper" => |_, s, a| {
            a.check("upper", 0, 0)?;
            Ok(Value::Str(text(s).to_uppercase()))
        },
        "lower" => |_, s, a| {
            a.check("lower", 0, 0)?;
            Ok(Value::Str(text(s).to_lowercase()))
        },
        "capitalize" => |_, s, a| {
            a.check("capitalize", 0, 0)?;
            let mut chars = text(s).chars();
            let out = match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            };
            Ok(Value::Str(out))
        },
        "strip" => |_, s, a| strip(s, a, "strip", true, true),
        "lstrip" => |_, s, a| strip(s, a, "lstrip", true, false),
        "rstrip" => |_, s, a| strip(s, a, "rstrip", false, true),
        "split" => split,
        "splitlines" => |_, s, a| {
            a.check("splitlines", 0, 0)?;
            Ok(Value::list(text(s).lines().map(Value::from).collect()))
        },
        "join" => |_, s, a| {
            a.check("join", 1, 1)?;
            let parts = a.positional[0]
                .iterate()?
                .into_iter()
                .map(|v| match v {
                    Value::Str(part) => Ok(part),
                    other => script_err!("join: in list, want string, got {}", other.type_name()),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::Str(parts.join(text(s))))
        },
        "replace" => |_, s, a| {
            a.check("replace", 2, 3)?;
            let old = a.str_at("replace", 0)?;
            let new = a.str_at("replace", 1)?;
            let out = match a.get(2) {
                Some(Value::Int(n)) if *n >= 0 => text(s).replacen(&old, &new, *n as usize),
                _ => text(s).replace(&old, &new),
            };
            Ok(Value::Str(out))
        },
        "startswith" => |_, s, a| {
            a.check("startswith", 1, 1)?;
            Ok(Value::Bool(text(s).starts_with(a.str_at("startswith", 0)?.as_str())))
        },
        "endswith" => |_, s, a| {
            a.check("endswith", 1, 1)?;
            Ok(Value::Bool(text(s).ends_with(a.str_at("endswith", 0)?.as_str())))
        },
        "find" => |_, s, a| {
            a.check("find", 1, 1)?;
            let haystack = text(s);
            let needle = a.str_at("find", 0)?;
            Ok(Value::Int(match haystack.find(needle.as_str()) {
                Some(byte) => haystack[..byte].chars().count() as i64,
                None => -1,
            }))
        },
        "count" => |_, s, a| {
            a.check("count", 1, 1)?;
            let needle = a.str_at("count", 0)?;
            if needle.is_empty() {
                return Ok(Value::Int(text(s).chars().count() as i64 + 1));
            }
            Ok(Value::Int(text(s).matches(needle.as_str()).count() as i64))
        },
        "isdigit" => |_, s, a| {
            a.check("isdigit", 0, 0)?;
            let t = text(s);
            Ok(Value::Bool(!t.is_empty() && t.chars().all(|c| c.is_ascii_digit())))
        },
        "format" => format,
        _ => return None,
    };
    Some(method)
}

fn text(value: &Value) -> &str {
    value.as_str().unwrap_or_default()
}

fn strip(s: &Value, args: Args, name: &str, left: bool, right: bool) -> Result<Value, ScriptError> {
    args.check(name, 0, 1)?;
    let chars: Option<Vec<char>> = match args.get(0) {
        None | Some(Value::None) => None,
        Some(Value::Str(set)) => Some(set.chars().collect()),
        Some(other) => return script_err!("{}: got {}, want string", name, other.type_name()),
    };
    let matches = |c: char| match &chars {
        Some(set) => set.contains(&c),
        None => c.is_whitespace(),
    };
    let mut out = text(s);
    if left {
        out = out.trim_start_matches(matches);
    }
    if right {
        out = out.trim_end_matches(matches);
    }
    Ok(Value::from(out))
}

fn split(_: &mut Interpreter<'_>, s: &Value, mut args: Args) -> Result<Value, ScriptError> {
    let maxsplit = match args.take_named("maxsplit") {
        Some(Value::Int(n)) => Some(n),
        _ => None,
    };
    args.check("split", 0, 2)?;
    let maxsplit = match args.get(1) {
        Some(Value::Int(n)) => Some(*n),
        _ => maxsplit,
    }
    .filter(|n| *n >= 0)
    .map(|n| n as usize);
    let t = text(s);
    let parts: Vec<Value> = match args.get(0) {
        None | Some(Value::None) => {
            let mut parts = Vec::new();
            let mut rest = t.trim_start();
            while !rest.is_empty() {
                if maxsplit.is_some_and(|m| parts.len() == m) {
                    parts.push(Value::from(rest));
                    break;
                }
                let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
                parts.push(Value::from(&rest[..end]));
                rest = rest[end..].trim_start();
            }
            parts
        }
        Some(Value::Str(sep)) if sep.is_empty() => return script_err!("split: empty separator"),
        Some(Value::Str(sep)) => match maxsplit {
            Some(m) => t.splitn(m + 1, sep.as_str()).map(Value::from).collect(),
            None => t.split(sep.as_str()).map(Value::from).collect(),
        },
        Some(other) => return script_err!("split: got {}, want string", other.type_name()),
    };
    Ok(Value::list(parts))
}

/// `str.format` with `{}`, `{0}` and `{name}` fields.
fn format(_: &mut Interpreter<'_>, s: &Value, args: Args) -> Result<Value, ScriptError> {
    let template = text(s);
    let mut out = String::new();
    let mut chars = template.chars().peekable();
    let mut auto = 0usize;
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut field = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(ch) => field.push(ch),
                        None => return script_err!("format: unmatched '{{' in format spec"),
                    }
                }
                let value = if field.is_empty() {
                    auto += 1;
                    args.get(auto - 1)
                } else if let Ok(index) = field.parse::<usize>() {
                    args.get(index)
                } else {
                    args.named.iter().find(|(k, _)| *k == field).map(|(_, v)| v)
                };
                match value {
                    Some(v) => out.push_str(&v.to_string()),
                    None => return script_err!("format: no replacement for field {{{}}}", field),
                }
            }
            '}' => return script_err!("format: single '}}' in format"),
            other => out.push(other),
        }
    }
    Ok(Value::Str(out))
}

// ============================================================================
// LIST METHODS
// ============================================================================

fn list_method(name: &str) -> Option<Method> {
    let method: Method = match name {
        "append" => |_, l, a| {
            a.check("append", 1, 1)?;
            with_list(l, |items| items.push(a.positional[0].clone()));
            Ok(Value::None)
        },
        "extend" => |_, l, a| {
            a.check("extend", 1, 1)?;
            let extra = a.positional[0].iterate()?;
            with_list(l, |items| items.extend(extra));
            Ok(Value::None)
        },
        "insert" => |_, l, a| {
            a.check("insert", 2, 2)?;
            let index = a.int_at("insert", 0)?;
            let value = a.positional[1].clone();
            with_list(l, |items| {
                let n = items.len() as i64;
                let at = if index < 0 { index + n } else { index }.clamp(0, n);
                items.insert(at as usize, value);
            });
            Ok(Value::None)
        },
        "pop" => |_, l, a| {
            a.check("pop", 0, 1)?;
            let index = match a.get(0) {
                Some(_) => Some(a.int_at("pop", 0)?),
                None => None,
            };
            with_list(l, |items| {
                let n = items.len() as i64;
                let i = index.map(|i| if i < 0 { i + n } else { i }).unwrap_or(n - 1);
                if i < 0 || i >= n {
                    return script_err!("pop: index {} out of range (length {})", i, n);
                }
                Ok(items.remove(i as usize))
            })
        },
        "remove" => |_, l, a| {
            a.check("remove", 1, 1)?;
            let target = &a.positional[0];
            with_list(l, |items| match items.iter().position(|v| v == target) {
                Some(i) => {
                    items.remove(i);
                    Ok(Value::None)
                }
                None => script_err!("remove: element {} not found", target.repr()),
            })
        },
        "index" => |_, l, a| {
            a.check("index", 1, 1)?;
            let target = &a.positional[0];
            with_list(l, |items| match items.iter().position(|v| v == target) {
                Some(i) => Ok(Value::Int(i as i64)),
                None => script_err!("index: value {} not in list", target.repr()),
            })
        },
        "clear" => |_, l, a| {
            a.check("clear", 0, 0)?;
            with_list(l, Vec::clear);
            Ok(Value::None)
        },
        _ => return None,
    };
    Some(method)
}

fn with_list<R>(list: &Value, f: impl FnOnce(&mut Vec<Value>) -> R) -> R {
    match list {
        Value::List(items) => f(&mut items.borrow_mut()),
        _ => f(&mut Vec::new()),
    }
}

// ============================================================================
// DICT METHODS
// ============================================================================

fn dict_method(name: &str) -> Option<Method> {
    let method: Method = match name {
        "get" => |_, d, a| {
            a.check("get", 1, 2)?;
            let key = DictKey::from_value(&a.positional[0])?;
            let found = with_dict(d, |entries| entries.get(&key).cloned());
            Ok(found.or_else(|| a.get(1).cloned()).unwrap_or(Value::None))
        },
        "keys" => |_, d, a| {
            a.check("keys", 0, 0)?;
            Ok(Value::list(with_dict(d, |e| e.keys().map(DictKey::to_value).collect())))
        },
        "values" => |_, d, a| {
            a.check("values", 0, 0)?;
            Ok(Value::list(with_dict(d, |e| e.values().cloned().collect())))
        },
        "items" => |_, d, a| {
            a.check("items", 0, 0)?;
            Ok(Value::list(with_dict(d, |e| {
                e.iter()
                    .map(|(k, v)| Value::tuple(vec![k.to_value(), v.clone()]))
                    .collect()
            })))
        },
        "pop" => |_, d, a| {
            a.check("pop", 1, 2)?;
            let key = DictKey::from_value(&a.positional[0])?;
            match (with_dict(d, |e| e.shift_remove(&key)), a.get(1)) {
                (Some(v), _) => Ok(v),
                (None, Some(default)) => Ok(default.clone()),
                (None, None) => script_err!("pop: missing key {}", a.positional[0].repr()),
            }
        },
        "setdefault" => |_, d, a| {
            a.check("setdefault", 1, 2)?;
            let key = DictKey::from_value(&a.positional[0])?;
            let default = a.get(1).cloned().unwrap_or(Value::None);
            Ok(with_dict(d, |e| e.entry(key).or_insert(default).clone()))
        },
        "update" => |_, d, a| {
            if a.positional.len() > 1 {
                return script_err!("update: got {} arguments, want at most 1", a.positional.len());
            }
            let mut incoming = IndexMap::new();
            if let Some(source) = a.get(0) {
                insert_pairs(&mut incoming, source, "update")?;
            }
            for (k, v) in &a.named {
                incoming.insert(DictKey::Str(k.clone()), v.clone());
            }
            with_dict(d, |e| e.extend(incoming));
            Ok(Value::None)
        },
        "clear" => |_, d, a| {
            a.check("clear", 0, 0)?;
            with_dict(d, IndexMap::clear);
            Ok(Value::None)
        },
        _ => return None,
    };
    Some(method)
}

fn with_dict<R>(dict: &Value, f: impl FnOnce(&mut IndexMap<DictKey, Value>) -> R) -> R {
    match dict {
        Value::Dict(entries) => f(&mut entries.borrow_mut()),
        _ => f(&mut IndexMap::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::interp::{Env, NoModules};

    fn run(source: &str) -> Env {
        let mut out = Vec::new();
        Interpreter::new(&NoModules, &mut out)
            .exec_file(source, Env::new())
            .unwrap()
    }

    fn get(env: &Env, name: &str) -> String {
        env.get(name).map(Value::repr).unwrap_or_default()
    }

    #[test]
    fn test_string_methods() {
        let env = run("a = ' Hi There '.strip().lower()\nb = 'a,b,,c'.split(',')\nc = '-'.join(['x', 'y'])\nd = 'x y  z'.split()\ne = '{} and {name}'.format(1, name='two')");
        assert_eq!(get(&env, "a"), "\"hi there\"");
        assert_eq!(get(&env, "b"), "[\"a\", \"b\", \"\", \"c\"]");
        assert_eq!(get(&env, "c"), "\"x-y\"");
        assert_eq!(get(&env, "d"), "[\"x\", \"y\", \"z\"]");
        assert_eq!(get(&env, "e"), "\"1 and two\"");
    }

    #[test]
    fn test_list_methods_mutate_shared_list() {
        let env = run("xs = [3]\nys = xs\nys.append(4)\nxs.extend([5, 6])\nxs.insert(0, 1)\np = xs.pop()\nxs.remove(3)");
        assert_eq!(get(&env, "xs"), "[1, 4, 5]");
        assert_eq!(get(&env, "ys"), "[1, 4, 5]");
        assert_eq!(get(&env, "p"), "6");
    }

    #[test]
    fn test_dict_methods() {
        let env = run("d = {'a': 1}\nd.update(b=2)\nk = d.keys()\ng = d.get('z', 0)\nd.setdefault('c', 3)\np = d.pop('a')\ni = d.items()");
        assert_eq!(get(&env, "k"), "[\"a\", \"b\"]");
        assert_eq!(get(&env, "g"), "0");
        assert_eq!(get(&env, "p"), "1");
        assert_eq!(get(&env, "i"), "[(\"b\", 2), (\"c\", 3)]");
    }

    #[test]
    fn test_unknown_method_names_type() {
        let mut out = Vec::new();
        let err = Interpreter::new(&NoModules, &mut out)
            .exec_file("'x'.nope()", Env::new())
            .unwrap_err();
        assert!(err.message.contains("string has no .nope field or method"));
    }
}
