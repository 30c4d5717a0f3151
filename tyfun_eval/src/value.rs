//! Runtime values for the sandboxed evaluator.

use std::fmt;
use std::rc::Rc;
use std::cell::RefCell;
use std::collections::HashMap;

use tyfun_env::{Span, Spanned};
use tyfun_syntax::{Name, Block, FuncBody};
use tyfun_types::ty::TypeValue;

use interp::{Interp, Abort};
use driver::TypeFuncDef;

pub type TableRef = Rc<RefCell<Table>>;

/// A runtime table.
///
/// Entries are kept in insertion order, which `pairs` exposes directly;
/// lookup is linear, which is fine for the small tables type functions build.
pub struct Table {
    entries: Vec<(Value, Value)>,
}

impl Table {
    pub fn new() -> Table {
        Table { entries: Vec::new() }
    }

    pub fn get(&self, key: &Value) -> Value {
        self.entries.iter()
                    .find(|&&(ref k, _)| k == key)
                    .map_or(Value::Nil, |&(_, ref v)| v.clone())
    }

    /// Sets a value; a nil value removes the entry.
    pub fn set(&mut self, key: Value, value: Value) {
        let idx = self.entries.iter().position(|&(ref k, _)| *k == key);
        match (idx, value) {
            (Some(idx), Value::Nil) => { self.entries.remove(idx); }
            (Some(idx), value) => { self.entries[idx].1 = value; }
            (None, Value::Nil) => {}
            (None, value) => { self.entries.push((key, value)); }
        }
    }

    /// The entry following `key` in iteration order; a nil `key` starts over.
    pub fn next_entry(&self, key: &Value) -> Option<(Value, Value)> {
        let idx = match *key {
            Value::Nil => 0,
            ref key => {
                match self.entries.iter().position(|&(ref k, _)| k == key) {
                    Some(idx) => idx + 1,
                    None => return None,
                }
            }
        };
        self.entries.get(idx).cloned()
    }

    /// The border used by `#`: the largest `n` such that `1..=n` are all present.
    pub fn length(&self) -> usize {
        let mut n = 0;
        while self.get(&Value::Number((n + 1) as f64)) != Value::Nil {
            n += 1;
        }
        n
    }

    pub fn entries(&self) -> &[(Value, Value)] {
        &self.entries
    }
}

/// A lexical scope frame. Closures keep their defining frame alive.
pub struct Frame {
    pub vars: RefCell<HashMap<Name, Rc<RefCell<Value>>>>,
    pub parent: Option<Env>,
    pub varargs: Option<Rc<Vec<Value>>>,
}

pub type Env = Rc<Frame>;

impl Frame {
    /// A frame for a function call. The parent is the closure's defining
    /// frame, not the caller's, and the varargs are set anew.
    pub fn new_call(parent: Option<Env>, varargs: Option<Rc<Vec<Value>>>) -> Env {
        Rc::new(Frame { vars: RefCell::new(HashMap::new()), parent: parent, varargs: varargs })
    }

    /// A frame for a nested block, inheriting the enclosing function's varargs.
    pub fn new_block(parent: &Env) -> Env {
        Rc::new(Frame {
            vars: RefCell::new(HashMap::new()),
            parent: Some(parent.clone()),
            varargs: parent.varargs.clone(),
        })
    }

    /// Finds the slot for a local, walking the scope chain outwards.
    pub fn find(env: &Env, name: &Name) -> Option<Rc<RefCell<Value>>> {
        let mut frame = env.clone();
        loop {
            if let Some(slot) = frame.vars.borrow().get(name) {
                return Some(slot.clone());
            }
            let parent = match frame.parent {
                Some(ref parent) => parent.clone(),
                None => return None,
            };
            frame = parent;
        }
    }

    pub fn declare(&self, name: Name, value: Value) {
        self.vars.borrow_mut().insert(name, Rc::new(RefCell::new(value)));
    }
}

/// A user function value: parameters, body and the captured scope.
/// The top-level body of a type function has no captured scope.
pub struct Closure {
    pub name: Option<Name>,
    pub params: Vec<Name>,
    pub varargs: bool,
    pub block: Rc<Spanned<Block>>,
    pub env: Option<Env>,
}

impl Closure {
    pub fn from_body(name: Option<Name>, body: &FuncBody, env: Option<Env>) -> Closure {
        Closure {
            name: name,
            params: body.params.base.head.iter().map(|p| p.base.clone()).collect(),
            varargs: body.params.base.tail.is_some(),
            block: Rc::new(body.block.clone()),
            env: env,
        }
    }

    pub fn from_def(def: &TypeFuncDef) -> Closure {
        Closure {
            name: Some(def.name.base.clone()),
            params: def.params.clone(),
            varargs: def.varargs,
            block: def.block.clone(),
            env: None,
        }
    }
}

pub type BuiltinFn = fn(&mut Interp, Span, Vec<Value>) -> Result<Vec<Value>, Abort>;

/// A built-in function, carrying its name for error messages.
#[derive(Copy, Clone)]
pub struct Builtin {
    pub name: &'static str,
    pub call: BuiltinFn,
}

#[derive(Clone)]
pub enum Function {
    Lua(Rc<Closure>),
    Builtin(Builtin),
    /// Calling this triggers a nested reduction through the driver.
    TypeFunc(Rc<TypeFuncDef>),
}

#[derive(Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Number(f64),
    Str(Rc<String>),
    Table(TableRef),
    Func(Function),
    Ty(TypeValue),
}

impl Value {
    pub fn str<S: Into<String>>(s: S) -> Value {
        Value::Str(Rc::new(s.into()))
    }

    pub fn truthy(&self) -> bool {
        match *self {
            Value::Nil | Value::Bool(false) => false,
            _ => true,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match *self {
            Value::Nil => "nil",
            Value::Bool(..) => "boolean",
            Value::Number(..) => "number",
            Value::Str(..) => "string",
            Value::Table(..) => "table",
            Value::Func(..) => "function",
            Value::Ty(..) => "type",
        }
    }

    /// A number, or a string convertible to one.
    pub fn as_number(&self) -> Option<f64> {
        match *self {
            Value::Number(v) => Some(v),
            Value::Str(ref s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match *self {
            Value::Str(ref s) => Some(&s[..]),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&TableRef> {
        match *self {
            Value::Table(ref t) => Some(t),
            _ => None,
        }
    }

    pub fn as_ty(&self) -> Option<&TypeValue> {
        match *self {
            Value::Ty(ref tv) => Some(tv),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (&Value::Nil, &Value::Nil) => true,
            (&Value::Bool(a), &Value::Bool(b)) => a == b,
            (&Value::Number(a), &Value::Number(b)) => a == b,
            (&Value::Str(ref a), &Value::Str(ref b)) => a == b,
            // reference semantics
            (&Value::Table(ref a), &Value::Table(ref b)) => Rc::ptr_eq(a, b),
            (&Value::Func(Function::Lua(ref a)), &Value::Func(Function::Lua(ref b))) =>
                Rc::ptr_eq(a, b),
            (&Value::Func(Function::Builtin(ref a)), &Value::Func(Function::Builtin(ref b))) =>
                a.call as usize == b.call as usize,
            (&Value::Func(Function::TypeFunc(ref a)), &Value::Func(Function::TypeFunc(ref b))) =>
                Rc::ptr_eq(a, b),
            // type values compare syntactically
            (&Value::Ty(ref a), &Value::Ty(ref b)) => a == b,
            (_, _) => false,
        }
    }
}

/// Formats a number the way `tostring` and `..` do: integral values print
/// without a fractional part.
pub fn number_to_string(v: f64) -> String {
    if v.is_finite() && v.floor() == v && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

/// The `tostring` conversion.
pub fn tostring(v: &Value) -> String {
    match *v {
        Value::Nil => String::from("nil"),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => number_to_string(n),
        Value::Str(ref s) => (**s).clone(),
        Value::Table(ref t) => format!("table: {:p}", Rc::as_ptr(t)),
        Value::Func(Function::Lua(ref f)) => format!("function: {:p}", Rc::as_ptr(f)),
        Value::Func(Function::Builtin(ref b)) => format!("function: builtin {}", b.name),
        Value::Func(Function::TypeFunc(ref def)) =>
            format!("function: type function {:-?}", def.name.base),
        Value::Ty(ref tv) => format!("type<{}>", tv.tag().name()),
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Value::Str(ref s) => write!(f, "{:?}", s),
            Value::Ty(ref tv) => write!(f, "type<{:?}>", tv),
            ref v => write!(f, "{}", tostring(v)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Table, Value};

    #[test]
    fn test_table_entries() {
        let mut t = Table::new();
        t.set(Value::str("a"), Value::Number(1.0));
        t.set(Value::Number(1.0), Value::str("one"));
        t.set(Value::str("a"), Value::Number(2.0));
        assert_eq!(t.get(&Value::str("a")), Value::Number(2.0));
        assert_eq!(t.entries().len(), 2);

        t.set(Value::str("a"), Value::Nil);
        assert_eq!(t.get(&Value::str("a")), Value::Nil);
        assert_eq!(t.entries().len(), 1);
    }

    #[test]
    fn test_table_length() {
        let mut t = Table::new();
        for i in 1..4 {
            t.set(Value::Number(i as f64), Value::Bool(true));
        }
        t.set(Value::str("x"), Value::Bool(true));
        assert_eq!(t.length(), 3);
        t.set(Value::Number(2.0), Value::Nil);
        assert_eq!(t.length(), 1);
    }

    #[test]
    fn test_next_entry() {
        let mut t = Table::new();
        t.set(Value::str("a"), Value::Number(1.0));
        t.set(Value::str("b"), Value::Number(2.0));
        let (k1, _) = t.next_entry(&Value::Nil).unwrap();
        assert_eq!(k1, Value::str("a"));
        let (k2, v2) = t.next_entry(&k1).unwrap();
        assert_eq!((k2.clone(), v2), (Value::str("b"), Value::Number(2.0)));
        assert!(t.next_entry(&k2).is_none());
    }
}
