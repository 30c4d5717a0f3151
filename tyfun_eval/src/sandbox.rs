//! The sandboxed global environment.
//!
//! Each reduction gets a fresh set of globals holding only the enumerated
//! allowlist: the base primitives, small `math`/`string`/`table` subsets,
//! the `types` namespace and the declared type functions themselves. There
//! is no I/O, no `require`, no access to the host.

use std::rc::Rc;
use std::cell::RefCell;
use std::collections::HashMap;

use tyfun_syntax::Name;

use value::{Value, Table, TableRef, Function, Builtin, BuiltinFn};
use interp::{Exec, rt_error};
use driver::Session;
use tylib;

pub fn fresh_globals(session: &Session)
        -> (Rc<RefCell<HashMap<Name, Value>>>, Value) {
    let mut globals = HashMap::new();
    let string_lib;
    {
        let mut set = |name: &str, value: Value| {
            globals.insert(Name::from(name), value);
        };

        set("error", builtin("error", base::error));
        set("assert", builtin("assert", base::assert));
        set("print", builtin("print", base::print));
        set("type", builtin("type", base::type_));
        set("tostring", builtin("tostring", base::tostring));
        set("tonumber", builtin("tonumber", base::tonumber));
        set("next", builtin("next", base::next));
        set("pairs", builtin("pairs", base::pairs));
        set("ipairs", builtin("ipairs", base::ipairs));
        set("select", builtin("select", base::select));
        set("unpack", builtin("unpack", base::unpack));
        set("pcall", builtin("pcall", base::pcall));

        string_lib = lib(vec![
            ("len", builtin("len", string::len)),
            ("sub", builtin("sub", string::sub)),
            ("upper", builtin("upper", string::upper)),
            ("lower", builtin("lower", string::lower)),
            ("rep", builtin("rep", string::rep)),
            ("reverse", builtin("reverse", string::reverse)),
            ("byte", builtin("byte", string::byte)),
            ("char", builtin("char", string::char_)),
        ]);
        set("string", string_lib.clone());

        set("math", lib(vec![
            ("floor", builtin("floor", math::floor)),
            ("ceil", builtin("ceil", math::ceil)),
            ("abs", builtin("abs", math::abs)),
            ("sqrt", builtin("sqrt", math::sqrt)),
            ("max", builtin("max", math::max)),
            ("min", builtin("min", math::min)),
            ("fmod", builtin("fmod", math::fmod)),
            ("random", builtin("random", math::random)),
            ("randomseed", builtin("randomseed", math::randomseed)),
            ("huge", Value::Number(::std::f64::INFINITY)),
            ("pi", Value::Number(::std::f64::consts::PI)),
        ]));

        set("table", lib(vec![
            ("insert", builtin("insert", table::insert)),
            ("remove", builtin("remove", table::remove)),
            ("concat", builtin("concat", table::concat)),
        ]));

        set("types", tylib::make_types_lib());

        // type functions call each other through ordinary call syntax;
        // each such call is a nested reduction
        for (name, def) in session.funcs() {
            set(name.as_str(), Value::Func(Function::TypeFunc(def.clone())));
        }
    }

    (Rc::new(RefCell::new(globals)), string_lib)
}

pub fn builtin(name: &'static str, call: BuiltinFn) -> Value {
    Value::Func(Function::Builtin(Builtin { name: name, call: call }))
}

fn lib(entries: Vec<(&'static str, Value)>) -> Value {
    let mut t = Table::new();
    for (key, value) in entries {
        t.set(Value::str(key), value);
    }
    Value::Table(Rc::new(RefCell::new(t)))
}

pub fn arg(args: &[Value], idx: usize) -> Value {
    args.get(idx).cloned().unwrap_or(Value::Nil)
}

pub fn bad_arg<T>(func: &str, idx: usize, expected: &str, got: &Value) -> Exec<T> {
    rt_error(format!("bad argument #{} to `{}` ({} expected, got {})",
                     idx + 1, func, expected, got.type_name()))
}

pub fn check_table(func: &str, args: &[Value], idx: usize) -> Exec<TableRef> {
    match args.get(idx) {
        Some(&Value::Table(ref t)) => Ok(t.clone()),
        other => bad_arg(func, idx, "table", other.unwrap_or(&Value::Nil)),
    }
}

pub fn check_number(func: &str, args: &[Value], idx: usize) -> Exec<f64> {
    let v = arg(args, idx);
    match v.as_number() {
        Some(n) => Ok(n),
        None => bad_arg(func, idx, "number", &v),
    }
}

pub fn check_str(func: &str, args: &[Value], idx: usize) -> Exec<Rc<String>> {
    match args.get(idx) {
        Some(&Value::Str(ref s)) => Ok(s.clone()),
        other => bad_arg(func, idx, "string", other.unwrap_or(&Value::Nil)),
    }
}

fn opt_number(func: &str, args: &[Value], idx: usize, default: f64) -> Exec<f64> {
    match args.get(idx) {
        None | Some(&Value::Nil) => Ok(default),
        _ => check_number(func, args, idx),
    }
}

mod base {
    use tyfun_env::Span;
    use tyfun_diag::Reporter;
    use value::Value;
    use value::tostring as tostr;
    use interp::{Interp, Exec, Abort, rt_error};
    use message as m;
    use super::{arg, builtin, check_table, check_number, opt_number};

    pub fn error(_it: &mut Interp, _span: Span, args: Vec<Value>) -> Exec<Vec<Value>> {
        Err(Abort::Error(arg(&args, 0)))
    }

    pub fn assert(_it: &mut Interp, _span: Span, args: Vec<Value>) -> Exec<Vec<Value>> {
        if arg(&args, 0).truthy() {
            return Ok(args);
        }
        match arg(&args, 1) {
            Value::Nil => Err(Abort::Error(Value::str("assertion failed!"))),
            msg => Err(Abort::Error(msg)),
        }
    }

    /// `print` surfaces as a note diagnostic at the call site. Since
    /// memoized calls skip the body, a given reduction prints at most once
    /// per session.
    pub fn print(it: &mut Interp, span: Span, args: Vec<Value>) -> Exec<Vec<Value>> {
        let msg = args.iter().map(tostr).collect::<Vec<_>>().join("\t");
        it.report.note(span, m::PrintNote { msg: &msg }).done()?;
        Ok(Vec::new())
    }

    pub fn type_(_it: &mut Interp, _span: Span, args: Vec<Value>) -> Exec<Vec<Value>> {
        Ok(vec![Value::str(arg(&args, 0).type_name())])
    }

    pub fn tostring(_it: &mut Interp, _span: Span, args: Vec<Value>) -> Exec<Vec<Value>> {
        Ok(vec![Value::str(tostr(&arg(&args, 0)))])
    }

    pub fn tonumber(_it: &mut Interp, _span: Span, args: Vec<Value>) -> Exec<Vec<Value>> {
        Ok(vec![arg(&args, 0).as_number().map_or(Value::Nil, Value::Number)])
    }

    pub fn next(_it: &mut Interp, _span: Span, args: Vec<Value>) -> Exec<Vec<Value>> {
        let t = check_table("next", &args, 0)?;
        let key = arg(&args, 1);
        let entry = t.borrow().next_entry(&key);
        Ok(match entry {
            Some((k, v)) => vec![k, v],
            None => vec![Value::Nil],
        })
    }

    pub fn pairs(_it: &mut Interp, _span: Span, args: Vec<Value>) -> Exec<Vec<Value>> {
        check_table("pairs", &args, 0)?;
        Ok(vec![builtin("next", next), arg(&args, 0), Value::Nil])
    }

    fn inext(_it: &mut Interp, _span: Span, args: Vec<Value>) -> Exec<Vec<Value>> {
        let t = check_table("ipairs", &args, 0)?;
        let idx = check_number("ipairs", &args, 1)? + 1.0;
        let v = t.borrow().get(&Value::Number(idx));
        Ok(match v {
            Value::Nil => vec![Value::Nil],
            v => vec![Value::Number(idx), v],
        })
    }

    pub fn ipairs(_it: &mut Interp, _span: Span, args: Vec<Value>) -> Exec<Vec<Value>> {
        check_table("ipairs", &args, 0)?;
        Ok(vec![builtin("inext", inext), arg(&args, 0), Value::Number(0.0)])
    }

    pub fn select(_it: &mut Interp, _span: Span, args: Vec<Value>) -> Exec<Vec<Value>> {
        match arg(&args, 0) {
            Value::Str(ref s) if &s[..] == "#" => {
                Ok(vec![Value::Number((args.len() - 1) as f64)])
            }
            v => {
                let n = match v.as_number() {
                    Some(n) if n >= 1.0 => n as usize,
                    _ => return super::bad_arg("select", 0, "index", &v),
                };
                Ok(args.into_iter().skip(n).collect())
            }
        }
    }

    pub fn unpack(_it: &mut Interp, _span: Span, args: Vec<Value>) -> Exec<Vec<Value>> {
        let t = check_table("unpack", &args, 0)?;
        let i = opt_number("unpack", &args, 1, 1.0)? as i64;
        let j = opt_number("unpack", &args, 2, t.borrow().length() as f64)? as i64;
        let mut vals = Vec::new();
        let mut idx = i;
        while idx <= j {
            vals.push(t.borrow().get(&Value::Number(idx as f64)));
            idx += 1;
        }
        Ok(vals)
    }

    /// Catches ordinary runtime errors, but not governor aborts: a timeout
    /// cannot be swallowed by the body it interrupted.
    pub fn pcall(it: &mut Interp, span: Span, mut args: Vec<Value>) -> Exec<Vec<Value>> {
        if args.is_empty() {
            return rt_error("bad argument #1 to `pcall` (value expected)".into());
        }
        let func = args.remove(0);
        match it.call_function(&func, args, span) {
            Ok(mut vals) => {
                vals.insert(0, Value::Bool(true));
                Ok(vals)
            }
            Err(Abort::Error(payload)) => Ok(vec![Value::Bool(false), payload]),
            Err(abort) => Err(abort),
        }
    }
}

mod math {
    use tyfun_env::Span;
    use value::Value;
    use interp::{Interp, Exec, rt_error};
    use super::{check_number, opt_number};

    pub fn floor(_it: &mut Interp, _span: Span, args: Vec<Value>) -> Exec<Vec<Value>> {
        Ok(vec![Value::Number(check_number("floor", &args, 0)?.floor())])
    }

    pub fn ceil(_it: &mut Interp, _span: Span, args: Vec<Value>) -> Exec<Vec<Value>> {
        Ok(vec![Value::Number(check_number("ceil", &args, 0)?.ceil())])
    }

    pub fn abs(_it: &mut Interp, _span: Span, args: Vec<Value>) -> Exec<Vec<Value>> {
        Ok(vec![Value::Number(check_number("abs", &args, 0)?.abs())])
    }

    pub fn sqrt(_it: &mut Interp, _span: Span, args: Vec<Value>) -> Exec<Vec<Value>> {
        Ok(vec![Value::Number(check_number("sqrt", &args, 0)?.sqrt())])
    }

    pub fn max(_it: &mut Interp, _span: Span, args: Vec<Value>) -> Exec<Vec<Value>> {
        fold("max", args, |a, b| a.max(b))
    }

    pub fn min(_it: &mut Interp, _span: Span, args: Vec<Value>) -> Exec<Vec<Value>> {
        fold("min", args, |a, b| a.min(b))
    }

    fn fold(func: &str, args: Vec<Value>, f: fn(f64, f64) -> f64) -> Exec<Vec<Value>> {
        if args.is_empty() {
            return rt_error(format!("bad argument #1 to `{}` (number expected, got no value)",
                                    func));
        }
        let mut acc = check_number(func, &args, 0)?;
        for idx in 1..args.len() {
            acc = f(acc, check_number(func, &args, idx)?);
        }
        Ok(vec![Value::Number(acc)])
    }

    pub fn fmod(_it: &mut Interp, _span: Span, args: Vec<Value>) -> Exec<Vec<Value>> {
        let a = check_number("fmod", &args, 0)?;
        let b = check_number("fmod", &args, 1)?;
        Ok(vec![Value::Number(a % b)])
    }

    pub fn random(it: &mut Interp, _span: Span, args: Vec<Value>) -> Exec<Vec<Value>> {
        let v = match args.len() {
            0 => it.rng.next_f64(),
            1 => {
                let m = check_number("random", &args, 0)?.floor();
                if m < 1.0 {
                    return rt_error("bad argument #1 to `random` (interval is empty)".into());
                }
                (it.rng.next_f64() * m).floor() + 1.0
            }
            _ => {
                let m = check_number("random", &args, 0)?.floor();
                let n = check_number("random", &args, 1)?.floor();
                if m > n {
                    return rt_error("bad argument #2 to `random` (interval is empty)".into());
                }
                m + (it.rng.next_f64() * (n - m + 1.0)).floor()
            }
        };
        Ok(vec![Value::Number(v)])
    }

    pub fn randomseed(it: &mut Interp, _span: Span, args: Vec<Value>) -> Exec<Vec<Value>> {
        let seed = opt_number("randomseed", &args, 0, 0.0)?;
        it.rng.reseed(seed as i64 as u64);
        Ok(Vec::new())
    }
}

mod string {
    use tyfun_env::Span;
    use value::Value;
    use interp::{Interp, Exec, rt_error};
    use super::{check_str, check_number, opt_number};

    pub fn len(_it: &mut Interp, _span: Span, args: Vec<Value>) -> Exec<Vec<Value>> {
        Ok(vec![Value::Number(check_str("len", &args, 0)?.len() as f64)])
    }

    // Lua string positions: 1-based, negatives count from the end
    fn start_pos(pos: i64, len: usize) -> usize {
        if pos > 0 {
            (pos - 1) as usize
        } else if pos == 0 {
            0
        } else {
            let back = (-pos) as usize;
            if back >= len { 0 } else { len - back }
        }
    }

    fn end_pos(pos: i64, len: usize) -> usize {
        if pos >= 0 {
            ::std::cmp::min(pos as usize, len)
        } else {
            let back = (-pos) as usize;
            if back > len { 0 } else { len - back + 1 }
        }
    }

    pub fn sub(_it: &mut Interp, _span: Span, args: Vec<Value>) -> Exec<Vec<Value>> {
        let s = check_str("sub", &args, 0)?;
        let i = check_number("sub", &args, 1)? as i64;
        let j = opt_number("sub", &args, 2, -1.0)? as i64;

        let bytes = s.as_bytes();
        let begin = start_pos(i, bytes.len());
        let end = end_pos(j, bytes.len());
        let sliced = if begin < end { &bytes[begin..end] } else { &[][..] };
        Ok(vec![Value::str(String::from_utf8_lossy(sliced).into_owned())])
    }

    pub fn upper(_it: &mut Interp, _span: Span, args: Vec<Value>) -> Exec<Vec<Value>> {
        Ok(vec![Value::str(check_str("upper", &args, 0)?.to_uppercase())])
    }

    pub fn lower(_it: &mut Interp, _span: Span, args: Vec<Value>) -> Exec<Vec<Value>> {
        Ok(vec![Value::str(check_str("lower", &args, 0)?.to_lowercase())])
    }

    pub fn rep(_it: &mut Interp, _span: Span, args: Vec<Value>) -> Exec<Vec<Value>> {
        let s = check_str("rep", &args, 0)?;
        let n = check_number("rep", &args, 1)?;
        let n = if n < 0.0 { 0 } else { n as usize };
        Ok(vec![Value::str(s.repeat(n))])
    }

    pub fn reverse(_it: &mut Interp, _span: Span, args: Vec<Value>) -> Exec<Vec<Value>> {
        let s = check_str("reverse", &args, 0)?;
        Ok(vec![Value::str(s.chars().rev().collect::<String>())])
    }

    pub fn byte(_it: &mut Interp, _span: Span, args: Vec<Value>) -> Exec<Vec<Value>> {
        let s = check_str("byte", &args, 0)?;
        let i = opt_number("byte", &args, 1, 1.0)? as i64;
        let idx = start_pos(i, s.len());
        Ok(match s.as_bytes().get(idx) {
            Some(&b) => vec![Value::Number(b as f64)],
            None => vec![Value::Nil],
        })
    }

    pub fn char_(_it: &mut Interp, _span: Span, args: Vec<Value>) -> Exec<Vec<Value>> {
        let mut out = String::new();
        for idx in 0..args.len() {
            let code = check_number("char", &args, idx)? as u32;
            match ::std::char::from_u32(code).filter(|c| (*c as u32) < 0x100) {
                Some(c) => out.push(c),
                None => return rt_error(format!(
                    "bad argument #{} to `char` (value out of range)", idx + 1)),
            }
        }
        Ok(vec![Value::str(out)])
    }
}

mod table {
    use tyfun_env::Span;
    use value::{Value, tostring};
    use interp::{Interp, Exec, rt_error};
    use super::{arg, check_table, check_str, opt_number};

    pub fn insert(_it: &mut Interp, _span: Span, args: Vec<Value>) -> Exec<Vec<Value>> {
        let t = check_table("insert", &args, 0)?;
        let len = t.borrow().length();
        if args.len() >= 3 {
            let pos = match arg(&args, 1).as_number() {
                Some(n) if n >= 1.0 && n as usize <= len + 1 => n as usize,
                _ => return rt_error("bad argument #2 to `insert` (position out of bounds)"
                                         .into()),
            };
            let mut t = t.borrow_mut();
            let mut idx = len;
            while idx >= pos {
                let v = t.get(&Value::Number(idx as f64));
                t.set(Value::Number((idx + 1) as f64), v);
                idx -= 1;
            }
            t.set(Value::Number(pos as f64), arg(&args, 2));
        } else {
            t.borrow_mut().set(Value::Number((len + 1) as f64), arg(&args, 1));
        }
        Ok(Vec::new())
    }

    pub fn remove(_it: &mut Interp, _span: Span, args: Vec<Value>) -> Exec<Vec<Value>> {
        let t = check_table("remove", &args, 0)?;
        let len = t.borrow().length();
        let pos = opt_number("remove", &args, 1, len as f64)? as usize;
        if len == 0 {
            return Ok(vec![Value::Nil]);
        }
        if pos < 1 || pos > len {
            return rt_error("bad argument #2 to `remove` (position out of bounds)".into());
        }

        let mut t = t.borrow_mut();
        let removed = t.get(&Value::Number(pos as f64));
        for idx in pos..len {
            let v = t.get(&Value::Number((idx + 1) as f64));
            t.set(Value::Number(idx as f64), v);
        }
        t.set(Value::Number(len as f64), Value::Nil);
        Ok(vec![removed])
    }

    pub fn concat(_it: &mut Interp, _span: Span, args: Vec<Value>) -> Exec<Vec<Value>> {
        let t = check_table("concat", &args, 0)?;
        let sep = match args.get(1) {
            None | Some(&Value::Nil) => String::new(),
            _ => (*check_str("concat", &args, 1)?).clone(),
        };

        let len = t.borrow().length();
        let mut parts = Vec::with_capacity(len);
        for idx in 1..len + 1 {
            let v = t.borrow().get(&Value::Number(idx as f64));
            match v {
                Value::Str(..) | Value::Number(..) => parts.push(tostring(&v)),
                v => return rt_error(format!(
                    "invalid value (at index {}) in table for `concat` (got {})",
                    idx, v.type_name())),
            }
        }
        Ok(vec![Value::str(parts.join(&sep))])
    }
}
