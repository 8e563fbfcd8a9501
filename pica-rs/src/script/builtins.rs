//! Core built-in functions.
//!
//! Each function receives the interpreter and a slice of already-evaluated
//! arguments and returns `Result<Value, ErrorKind>`.  [`CORE`] is installed
//! into every new [`Interpreter`]; hosts add their own through
//! [`Interpreter::register_function`].

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use md5::{Digest, Md5};

use super::ast::BinOp;
use super::error::ErrorKind;
use super::interp::Interpreter;
use super::value::Value;

pub type BuiltinFn = fn(&mut Interpreter, &[Value]) -> Result<Value, ErrorKind>;

pub const CORE: &[(&str, BuiltinFn)] = &[
    ("echo", echo),
    ("echoln", echoln),
    ("now", now),
    ("base64encode", base64encode),
    ("base64decode", base64decode),
    ("assert", assert),
    ("len", len),
    ("hash", hash),
    ("max", max),
    ("typeof", type_of),
    ("uuid", uuid),
];

// ── Argument helpers ──────────────────────────────────────────────────────────

fn want(name: &str, args: &[Value], n: usize) -> Result<(), ErrorKind> {
    if args.len() == n {
        Ok(())
    } else {
        Err(ErrorKind::arity(name, n.to_string(), args.len()))
    }
}

fn want_some(name: &str, args: &[Value]) -> Result<(), ErrorKind> {
    if args.is_empty() {
        Err(ErrorKind::arity(name, "at least 1", 0))
    } else {
        Ok(())
    }
}

fn get_str<'a>(name: &str, v: &'a Value) -> Result<&'a str, ErrorKind> {
    v.as_str().ok_or_else(|| {
        ErrorKind::type_mismatch(format!("{name} expects string, got {}", v.type_name()))
    })
}

/// Apply `f` to one string argument, or to each of several.
fn map_strings(
    name: &str,
    args: &[Value],
    f: impl Fn(&str) -> Result<String, ErrorKind>,
) -> Result<Value, ErrorKind> {
    want_some(name, args)?;
    if let [single] = args {
        return Ok(Value::Str(f(get_str(name, single)?)?));
    }
    args.iter()
        .map(|a| f(get_str(name, a)?).map(Value::Str))
        .collect::<Result<Vec<_>, _>>()
        .map(Value::List)
}

// ── Output ────────────────────────────────────────────────────────────────────

fn joined(args: &[Value]) -> String {
    args.iter().map(ToString::to_string).collect()
}

fn echo(interp: &mut Interpreter, args: &[Value]) -> Result<Value, ErrorKind> {
    interp.write_output(&joined(args), false);
    Ok(Value::Nil)
}

fn echoln(interp: &mut Interpreter, args: &[Value]) -> Result<Value, ErrorKind> {
    interp.write_output(&joined(args), true);
    Ok(Value::Nil)
}

// ── Values ────────────────────────────────────────────────────────────────────

/// Seconds since the Unix epoch.
fn now(_: &mut Interpreter, args: &[Value]) -> Result<Value, ErrorKind> {
    want("now", args, 0)?;
    let secs = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    Ok(Value::Int(secs))
}

fn base64encode(_: &mut Interpreter, args: &[Value]) -> Result<Value, ErrorKind> {
    map_strings("base64encode", args, |s| Ok(BASE64.encode(s)))
}

fn base64decode(_: &mut Interpreter, args: &[Value]) -> Result<Value, ErrorKind> {
    map_strings("base64decode", args, |s| {
        let bytes = BASE64
            .decode(s)
            .map_err(|e| ErrorKind::InvalidArgument(format!("base64decode: {e}")))?;
        String::from_utf8(bytes)
            .map_err(|_| ErrorKind::InvalidArgument("base64decode: not UTF-8".into()))
    })
}

fn assert(_: &mut Interpreter, args: &[Value]) -> Result<Value, ErrorKind> {
    want("assert", args, 1)?;
    match &args[0] {
        Value::Bool(true) => Ok(Value::Bool(true)),
        Value::Bool(false) => Err(ErrorKind::AssertionFailed),
        other => Err(ErrorKind::type_mismatch(format!(
            "assert expects bool, got {}",
            other.type_name()
        ))),
    }
}

fn len(_: &mut Interpreter, args: &[Value]) -> Result<Value, ErrorKind> {
    want("len", args, 1)?;
    match &args[0] {
        Value::List(items) => Ok(Value::Int(items.len() as i64)),
        other => Err(ErrorKind::type_mismatch(format!(
            "len expects list, got {}",
            other.type_name()
        ))),
    }
}

/// Hex MD5 digest of a string.
fn hash(_: &mut Interpreter, args: &[Value]) -> Result<Value, ErrorKind> {
    want("hash", args, 1)?;
    let s = get_str("hash", &args[0])?;
    Ok(Value::Str(format!("{:x}", Md5::digest(s.as_bytes()))))
}

/// `max(a, b, …)` or `max(list)`.
fn max(_: &mut Interpreter, args: &[Value]) -> Result<Value, ErrorKind> {
    want_some("max", args)?;
    let items = match args {
        [Value::List(items)] => items.as_slice(),
        _ => args,
    };
    let mut best: Option<&Value> = None;
    for item in items {
        if !matches!(item, Value::Int(_) | Value::Float(_)) {
            return Err(ErrorKind::type_mismatch(format!(
                "max expects numbers, got {}",
                item.type_name()
            )));
        }
        best = match best {
            Some(b) if b.binary(BinOp::Ge, item)? == Value::Bool(true) => Some(b),
            _ => Some(item),
        };
    }
    best.cloned()
        .ok_or_else(|| ErrorKind::InvalidArgument("max of an empty list".into()))
}

fn type_of(_: &mut Interpreter, args: &[Value]) -> Result<Value, ErrorKind> {
    want("typeof", args, 1)?;
    Ok(Value::from(args[0].type_name()))
}

fn uuid(_: &mut Interpreter, args: &[Value]) -> Result<Value, ErrorKind> {
    want("uuid", args, 0)?;
    Ok(Value::Str(uuid::Uuid::new_v4().to_string()))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: &[Value]) -> Result<Value, ErrorKind> {
        let mut interp = Interpreter::new();
        let f = CORE.iter().find(|(n, _)| *n == name).unwrap().1;
        f(&mut interp, args)
    }

    fn s(v: &str) -> Value {
        Value::from(v)
    }

    #[test]
    fn base64_single_and_batch() {
        assert_eq!(call("base64encode", &[s("user:pass")]), Ok(s("dXNlcjpwYXNz")));
        assert_eq!(
            call("base64encode", &[s("a"), s("b")]),
            Ok(Value::List(vec![s("YQ=="), s("Yg==")]))
        );
        assert_eq!(call("base64decode", &[s("dXNlcjpwYXNz")]), Ok(s("user:pass")));
    }

    #[test]
    fn base64_rejects_bad_input() {
        assert!(matches!(
            call("base64decode", &[s("***")]),
            Err(ErrorKind::InvalidArgument(_))
        ));
        assert!(matches!(
            call("base64encode", &[Value::Int(1)]),
            Err(ErrorKind::TypeMismatch(_))
        ));
        assert!(matches!(
            call("base64encode", &[]),
            Err(ErrorKind::ArityMismatch { .. })
        ));
    }

    #[test]
    fn assert_semantics() {
        assert_eq!(call("assert", &[Value::Bool(true)]), Ok(Value::Bool(true)));
        assert_eq!(
            call("assert", &[Value::Bool(false)]),
            Err(ErrorKind::AssertionFailed)
        );
        assert!(matches!(
            call("assert", &[Value::Int(1)]),
            Err(ErrorKind::TypeMismatch(_))
        ));
    }

    #[test]
    fn len_is_list_only() {
        assert_eq!(
            call("len", &[Value::List(vec![Value::Nil, Value::Nil])]),
            Ok(Value::Int(2))
        );
        assert!(matches!(
            call("len", &[s("abc")]),
            Err(ErrorKind::TypeMismatch(_))
        ));
    }

    #[test]
    fn hash_is_md5_hex() {
        assert_eq!(
            call("hash", &[s("hello")]),
            Ok(s("5d41402abc4b2a76b9719d911017c592"))
        );
    }

    #[test]
    fn max_over_args_and_list() {
        assert_eq!(
            call("max", &[Value::Int(3), Value::Int(9), Value::Int(4)]),
            Ok(Value::Int(9))
        );
        assert_eq!(
            call(
                "max",
                &[Value::List(vec![Value::Int(-1), Value::Float(2.5)])]
            ),
            Ok(Value::Float(2.5))
        );
        assert!(matches!(
            call("max", &[Value::List(vec![])]),
            Err(ErrorKind::InvalidArgument(_))
        ));
    }

    #[test]
    fn typeof_and_uuid() {
        assert_eq!(call("typeof", &[Value::Int(1)]), Ok(s("int")));
        let Ok(Value::Str(id)) = call("uuid", &[]) else {
            panic!("uuid did not return a string");
        };
        assert_eq!(id.len(), 36);
        assert_eq!(id.chars().nth(14), Some('4'));
    }

    #[test]
    fn now_is_recent() {
        let Ok(Value::Int(t)) = call("now", &[]) else {
            panic!("now did not return an int");
        };
        assert!(t > 1_600_000_000);
    }
}
