//! The `types` namespace and the methods of type values.
//!
//! Construction errors surface as ordinary runtime errors, so a body can
//! `pcall` a constructor and produce its own diagnostics.

use std::rc::Rc;
use std::cell::RefCell;

use tyfun_env::Span;
use tyfun_types::ty::{Tag, Key, Property, Indexer, TypeSeq, TypeValue, ConstructionError};
use tyfun_types::ty::{TableRef as TyTableRef, FuncRef};

use value::{Value, Table, Builtin};
use interp::{Interp, Exec, rt_error};
use sandbox::{builtin, arg, bad_arg, check_str};

pub fn make_types_lib() -> Value {
    let mut t = Table::new();

    // the built-in type constants; `types.singleton(nil)` is the nil type
    t.set(Value::str("unknown"), Value::Ty(TypeValue::Unknown));
    t.set(Value::str("never"), Value::Ty(TypeValue::Never));
    t.set(Value::str("any"), Value::Ty(TypeValue::Any));
    t.set(Value::str("boolean"), Value::Ty(TypeValue::Boolean));
    t.set(Value::str("number"), Value::Ty(TypeValue::Number));
    t.set(Value::str("string"), Value::Ty(TypeValue::String));

    t.set(Value::str("singleton"), builtin("singleton", singleton));
    t.set(Value::str("negationof"), builtin("negationof", negationof));
    t.set(Value::str("unionof"), builtin("unionof", unionof));
    t.set(Value::str("intersectionof"), builtin("intersectionof", intersectionof));
    t.set(Value::str("newtable"), builtin("newtable", newtable));
    t.set(Value::str("newfunction"), builtin("newfunction", newfunction));
    t.set(Value::str("copy"), builtin("copy", copy));

    Value::Table(Rc::new(RefCell::new(t)))
}

/// Resolves a method of a type value by name. Methods are unbound,
/// receiving the type value itself as the first argument.
pub fn ty_method(name: &str) -> Option<Builtin> {
    let call = match name {
        "is" => m_is,
        "tag" => m_tag,
        "copy" => m_copy,
        "value" => m_value,
        "components" => m_components,
        "inner" => m_inner,
        "properties" => m_properties,
        "readproperty" => m_readproperty,
        "writeproperty" => m_writeproperty,
        "setproperty" => m_setproperty,
        "indexer" => m_indexer,
        "setindexer" => m_setindexer,
        "metatable" => m_metatable,
        "setmetatable" => m_setmetatable,
        "parent" => m_parent,
        "name" => m_name,
        "parameters" => m_parameters,
        "setparameters" => m_setparameters,
        "returns" => m_returns,
        "setreturns" => m_setreturns,
        "hassubtype" => m_hassubtype,
        "hasonlysubtype" => m_hasonlysubtype,
        "hassubtypeof" => m_hassubtypeof,
        "hasonlysubtypeof" => m_hasonlysubtypeof,
        _ => return None,
    };
    Some(Builtin { name: "type value method", call: call })
}

fn check_ty(func: &str, args: &[Value], idx: usize) -> Exec<TypeValue> {
    match args.get(idx) {
        Some(&Value::Ty(ref tv)) => Ok(tv.clone()),
        other => bad_arg(func, idx, "type", other.unwrap_or(&Value::Nil)),
    }
}

fn cerror<T>(e: ConstructionError) -> Exec<T> {
    rt_error(e.to_string())
}

fn check_tag(func: &str, args: &[Value], idx: usize) -> Exec<Tag> {
    let name = check_str(func, args, idx)?;
    match Tag::from_name(&name) {
        Some(tag) => Ok(tag),
        None => rt_error(format!("unknown type tag `{}`", name)),
    }
}

// ---------------------------------------------------------------------------
// constructors

fn singleton(_it: &mut Interp, _span: Span, args: Vec<Value>) -> Exec<Vec<Value>> {
    let tv = match arg(&args, 0) {
        Value::Nil => TypeValue::singleton(None),
        Value::Bool(b) => TypeValue::bool_singleton(b),
        Value::Str(ref s) => TypeValue::str_singleton(&s[..]),
        v => return bad_arg("singleton", 0, "nil, boolean or string", &v),
    };
    Ok(vec![Value::Ty(tv)])
}

fn negationof(_it: &mut Interp, _span: Span, args: Vec<Value>) -> Exec<Vec<Value>> {
    let inner = check_ty("negationof", &args, 0)?;
    match TypeValue::negation_of(inner) {
        Ok(tv) => Ok(vec![Value::Ty(tv)]),
        Err(e) => cerror(e),
    }
}

fn components_of(func: &str, args: &[Value]) -> Exec<Vec<TypeValue>> {
    let mut components = Vec::with_capacity(args.len());
    for idx in 0..args.len() {
        components.push(check_ty(func, args, idx)?);
    }
    Ok(components)
}

fn unionof(_it: &mut Interp, _span: Span, args: Vec<Value>) -> Exec<Vec<Value>> {
    match TypeValue::union_of(components_of("unionof", &args)?) {
        Ok(tv) => Ok(vec![Value::Ty(tv)]),
        Err(e) => cerror(e),
    }
}

fn intersectionof(_it: &mut Interp, _span: Span, args: Vec<Value>) -> Exec<Vec<Value>> {
    match TypeValue::intersection_of(components_of("intersectionof", &args)?) {
        Ok(tv) => Ok(vec![Value::Ty(tv)]),
        Err(e) => cerror(e),
    }
}

fn newtable(_it: &mut Interp, _span: Span, args: Vec<Value>) -> Exec<Vec<Value>> {
    let tv = TypeValue::new_table();
    {
        let tref = tv.table().expect("new_table did not make a table");
        let mut data = tref.borrow_mut();

        match arg(&args, 0) {
            Value::Nil => {}
            Value::Table(ref props) => {
                for &(ref key, ref value) in props.borrow().entries() {
                    let key = match *key {
                        Value::Ty(ref tv) => match Key::from_type_value(tv) {
                            Ok(key) => key,
                            Err(e) => return cerror(e),
                        },
                        ref key => return bad_arg("newtable", 0, "singleton type key", key),
                    };
                    data.props.insert(key, prop_from_value("newtable", value)?);
                }
            }
            v => return bad_arg("newtable", 0, "table", &v),
        }

        data.indexer = match arg(&args, 1) {
            Value::Nil => None,
            v => Some(indexer_from_value("newtable", &v)?),
        };

        data.metatable = match arg(&args, 2) {
            Value::Nil => None,
            v => Some(check_meta_ty("newtable", &v)?),
        };
    }
    Ok(vec![Value::Ty(tv)])
}

fn newfunction(_it: &mut Interp, _span: Span, args: Vec<Value>) -> Exec<Vec<Value>> {
    let params = seq_from_value("newfunction", &arg(&args, 0))?;
    let returns = seq_from_value("newfunction", &arg(&args, 1))?;
    Ok(vec![Value::Ty(TypeValue::new_function(params, returns))])
}

fn copy(_it: &mut Interp, _span: Span, args: Vec<Value>) -> Exec<Vec<Value>> {
    let tv = check_ty("copy", &args, 0)?;
    Ok(vec![Value::Ty(tv.copy())])
}

// ---------------------------------------------------------------------------
// value conversions

fn prop_from_value(func: &str, v: &Value) -> Exec<Property> {
    match *v {
        Value::Ty(ref tv) => Ok(Property { read: Some(tv.clone()), write: Some(tv.clone()) }),
        Value::Table(ref t) => {
            let t = t.borrow();
            let field = |name: &str| -> Exec<Option<TypeValue>> {
                match t.get(&Value::str(name)) {
                    Value::Nil => Ok(None),
                    Value::Ty(ref tv) => Ok(Some(tv.clone())),
                    ref v => bad_arg(func, 0, "type", v),
                }
            };
            Ok(Property { read: field("read")?, write: field("write")? })
        }
        ref v => bad_arg(func, 0, "type or property table", v),
    }
}

fn prop_to_value(prop: &Property) -> Value {
    let mut t = Table::new();
    if let Some(ref read) = prop.read {
        t.set(Value::str("read"), Value::Ty(read.clone()));
    }
    if let Some(ref write) = prop.write {
        t.set(Value::str("write"), Value::Ty(write.clone()));
    }
    Value::Table(Rc::new(RefCell::new(t)))
}

fn indexer_from_value(func: &str, v: &Value) -> Exec<Indexer> {
    let t = match *v {
        Value::Table(ref t) => t.borrow(),
        ref v => return bad_arg(func, 1, "indexer table", v),
    };
    let field = |name: &str| -> Exec<TypeValue> {
        match t.get(&Value::str(name)) {
            Value::Ty(ref tv) => Ok(tv.clone()),
            ref v => bad_arg(func, 1, "type", v),
        }
    };
    let key = field("index")?;
    let read = field("readresult")?;
    let write = match t.get(&Value::str("writeresult")) {
        Value::Nil => read.clone(),
        Value::Ty(ref tv) => tv.clone(),
        ref v => return bad_arg(func, 1, "type", v),
    };
    Ok(Indexer { key: key, read: read, write: write })
}

fn indexer_to_value(ix: &Indexer) -> Value {
    let mut t = Table::new();
    t.set(Value::str("index"), Value::Ty(ix.key.clone()));
    t.set(Value::str("readresult"), Value::Ty(ix.read.clone()));
    t.set(Value::str("writeresult"), Value::Ty(ix.write.clone()));
    Value::Table(Rc::new(RefCell::new(t)))
}

fn check_meta_ty(func: &str, v: &Value) -> Exec<TypeValue> {
    match *v {
        Value::Ty(ref tv) if tv.is(Tag::Table) => Ok(tv.clone()),
        ref v => bad_arg(func, 2, "table type", v),
    }
}

fn seq_from_value(func: &str, v: &Value) -> Exec<TypeSeq> {
    let t = match *v {
        Value::Nil => return Ok(TypeSeq::empty()),
        Value::Table(ref t) => t.borrow(),
        ref v => return bad_arg(func, 0, "table", v),
    };
    let mut head = Vec::new();
    let mut idx = 1;
    loop {
        match t.get(&Value::Number(idx as f64)) {
            Value::Nil => break,
            Value::Ty(ref tv) => head.push(tv.clone()),
            ref v => return bad_arg(func, 0, "type", v),
        }
        idx += 1;
    }
    let tail = match t.get(&Value::str("tail")) {
        Value::Nil => None,
        Value::Ty(ref tv) => Some(Box::new(tv.clone())),
        ref v => return bad_arg(func, 0, "type", v),
    };
    Ok(TypeSeq { head: head, tail: tail })
}

fn seq_to_value(seq: &TypeSeq) -> Value {
    let mut t = Table::new();
    for (idx, tv) in seq.head.iter().enumerate() {
        t.set(Value::Number((idx + 1) as f64), Value::Ty(tv.clone()));
    }
    if let Some(ref tail) = seq.tail {
        t.set(Value::str("tail"), Value::Ty((**tail).clone()));
    }
    Value::Table(Rc::new(RefCell::new(t)))
}

// ---------------------------------------------------------------------------
// methods

fn m_is(_it: &mut Interp, _span: Span, args: Vec<Value>) -> Exec<Vec<Value>> {
    let tv = check_ty("is", &args, 0)?;
    let tag = check_tag("is", &args, 1)?;
    Ok(vec![Value::Bool(tv.is(tag))])
}

fn m_tag(_it: &mut Interp, _span: Span, args: Vec<Value>) -> Exec<Vec<Value>> {
    let tv = check_ty("tag", &args, 0)?;
    Ok(vec![Value::str(tv.tag().name())])
}

fn m_copy(_it: &mut Interp, _span: Span, args: Vec<Value>) -> Exec<Vec<Value>> {
    let tv = check_ty("copy", &args, 0)?;
    Ok(vec![Value::Ty(tv.copy())])
}

fn m_value(_it: &mut Interp, _span: Span, args: Vec<Value>) -> Exec<Vec<Value>> {
    match check_ty("value", &args, 0)? {
        TypeValue::Nil => Ok(vec![Value::Nil]),
        TypeValue::Singleton(Key::Bool(b)) => Ok(vec![Value::Bool(b)]),
        TypeValue::Singleton(Key::Str(ref s)) => Ok(vec![Value::str(&s[..])]),
        tv => rt_error(format!("`value` requires a singleton type, got {}", tv.tag())),
    }
}

fn m_components(_it: &mut Interp, _span: Span, args: Vec<Value>) -> Exec<Vec<Value>> {
    match check_ty("components", &args, 0)? {
        TypeValue::Union(ref cs) | TypeValue::Intersection(ref cs) => {
            let mut t = Table::new();
            for (idx, c) in cs.iter().enumerate() {
                t.set(Value::Number((idx + 1) as f64), Value::Ty(c.clone()));
            }
            Ok(vec![Value::Table(Rc::new(RefCell::new(t)))])
        }
        tv => rt_error(format!("`components` requires a union or intersection type, got {}",
                               tv.tag())),
    }
}

fn m_inner(_it: &mut Interp, _span: Span, args: Vec<Value>) -> Exec<Vec<Value>> {
    match check_ty("inner", &args, 0)? {
        TypeValue::Negation(ref inner) => Ok(vec![Value::Ty((**inner).clone())]),
        tv => rt_error(format!("`inner` requires a negation type, got {}", tv.tag())),
    }
}

fn m_properties(_it: &mut Interp, _span: Span, args: Vec<Value>) -> Exec<Vec<Value>> {
    let tv = check_ty("properties", &args, 0)?;
    let mut t = Table::new();
    match tv {
        TypeValue::Table(ref tab) => {
            for (key, prop) in &tab.borrow().props {
                t.set(Value::Ty(TypeValue::Singleton(key.clone())), prop_to_value(prop));
            }
        }
        TypeValue::Class(ref class) => {
            for (key, prop) in &class.props {
                t.set(Value::Ty(TypeValue::Singleton(key.clone())), prop_to_value(prop));
            }
        }
        tv => return rt_error(format!("`properties` requires a table or class type, got {}",
                                      tv.tag())),
    }
    Ok(vec![Value::Table(Rc::new(RefCell::new(t)))])
}

fn prop_key(func: &str, args: &[Value]) -> Exec<Key> {
    let key = check_ty(func, args, 1)?;
    match Key::from_type_value(&key) {
        Ok(key) => Ok(key),
        Err(e) => cerror(e),
    }
}

fn m_readproperty(_it: &mut Interp, _span: Span, args: Vec<Value>) -> Exec<Vec<Value>> {
    let tv = check_ty("readproperty", &args, 0)?;
    let key = prop_key("readproperty", &args)?;
    let prop = match tv {
        TypeValue::Table(ref tab) => tab.borrow().props.get(&key).cloned(),
        TypeValue::Class(ref class) => class.props.get(&key).cloned(),
        tv => return rt_error(format!(
            "`readproperty` requires a table or class type, got {}", tv.tag())),
    };
    Ok(vec![prop.and_then(|p| p.read).map_or(Value::Nil, Value::Ty)])
}

fn m_writeproperty(_it: &mut Interp, _span: Span, args: Vec<Value>) -> Exec<Vec<Value>> {
    let tv = check_ty("writeproperty", &args, 0)?;
    let key = prop_key("writeproperty", &args)?;
    let prop = match tv {
        TypeValue::Table(ref tab) => tab.borrow().props.get(&key).cloned(),
        TypeValue::Class(ref class) => class.props.get(&key).cloned(),
        tv => return rt_error(format!(
            "`writeproperty` requires a table or class type, got {}", tv.tag())),
    };
    Ok(vec![prop.and_then(|p| p.write).map_or(Value::Nil, Value::Ty)])
}

/// The mutating methods require an actual table handle;
/// classes are host-constructed and read-only.
fn mutable_table(func: &str, tv: &TypeValue) -> Exec<TyTableRef> {
    match *tv {
        TypeValue::Table(ref tab) => Ok(tab.clone()),
        TypeValue::Class(..) => rt_error(format!("`{}`: class types are read-only", func)),
        ref tv => rt_error(format!("`{}` requires a table type, got {}", func, tv.tag())),
    }
}

fn m_setproperty(_it: &mut Interp, _span: Span, args: Vec<Value>) -> Exec<Vec<Value>> {
    let tv = check_ty("setproperty", &args, 0)?;
    let tab = mutable_table("setproperty", &tv)?;
    let key = prop_key("setproperty", &args)?;
    match arg(&args, 2) {
        Value::Nil => {
            tab.borrow_mut().props.remove(&key);
        }
        ref v => {
            let prop = prop_from_value("setproperty", v)?;
            tab.borrow_mut().props.insert(key, prop);
        }
    }
    Ok(Vec::new())
}

fn m_indexer(_it: &mut Interp, _span: Span, args: Vec<Value>) -> Exec<Vec<Value>> {
    let tv = check_ty("indexer", &args, 0)?;
    let indexer = match tv {
        TypeValue::Table(ref tab) => tab.borrow().indexer.clone(),
        TypeValue::Class(ref class) => class.indexer.clone(),
        tv => return rt_error(format!(
            "`indexer` requires a table or class type, got {}", tv.tag())),
    };
    Ok(vec![indexer.as_ref().map_or(Value::Nil, indexer_to_value)])
}

fn m_setindexer(_it: &mut Interp, _span: Span, args: Vec<Value>) -> Exec<Vec<Value>> {
    let tv = check_ty("setindexer", &args, 0)?;
    let tab = mutable_table("setindexer", &tv)?;
    tab.borrow_mut().indexer = match arg(&args, 1) {
        Value::Nil => None,
        v => Some(indexer_from_value("setindexer", &v)?),
    };
    Ok(Vec::new())
}

fn m_metatable(_it: &mut Interp, _span: Span, args: Vec<Value>) -> Exec<Vec<Value>> {
    let tv = check_ty("metatable", &args, 0)?;
    let meta = match tv {
        TypeValue::Table(ref tab) => tab.borrow().metatable.clone(),
        TypeValue::Class(ref class) => class.metatable.clone(),
        tv => return rt_error(format!(
            "`metatable` requires a table or class type, got {}", tv.tag())),
    };
    Ok(vec![meta.map_or(Value::Nil, Value::Ty)])
}

fn m_setmetatable(_it: &mut Interp, _span: Span, args: Vec<Value>) -> Exec<Vec<Value>> {
    let tv = check_ty("setmetatable", &args, 0)?;
    let tab = mutable_table("setmetatable", &tv)?;
    tab.borrow_mut().metatable = match arg(&args, 1) {
        Value::Nil => None,
        Value::Ty(ref meta) if meta.is(Tag::Table) => Some(meta.clone()),
        ref v => return bad_arg("setmetatable", 1, "table type", v),
    };
    Ok(Vec::new())
}

fn m_parent(_it: &mut Interp, _span: Span, args: Vec<Value>) -> Exec<Vec<Value>> {
    match check_ty("parent", &args, 0)? {
        TypeValue::Class(ref class) =>
            Ok(vec![class.parent.clone().map_or(Value::Nil, Value::Ty)]),
        tv => rt_error(format!("`parent` requires a class type, got {}", tv.tag())),
    }
}

fn m_name(_it: &mut Interp, _span: Span, args: Vec<Value>) -> Exec<Vec<Value>> {
    match check_ty("name", &args, 0)? {
        TypeValue::Class(ref class) => Ok(vec![Value::str(&class.name[..])]),
        tv => rt_error(format!("`name` requires a class type, got {}", tv.tag())),
    }
}

fn func_data(func: &str, tv: &TypeValue) -> Exec<FuncRef> {
    match *tv {
        TypeValue::Function(ref f) => Ok(f.clone()),
        ref tv => rt_error(format!("`{}` requires a function type, got {}", func, tv.tag())),
    }
}

fn m_parameters(_it: &mut Interp, _span: Span, args: Vec<Value>) -> Exec<Vec<Value>> {
    let tv = check_ty("parameters", &args, 0)?;
    let f = func_data("parameters", &tv)?;
    let seq = f.borrow().params.clone();
    Ok(vec![seq_to_value(&seq)])
}

fn m_setparameters(_it: &mut Interp, _span: Span, args: Vec<Value>) -> Exec<Vec<Value>> {
    let tv = check_ty("setparameters", &args, 0)?;
    let f = func_data("setparameters", &tv)?;
    f.borrow_mut().params = seq_from_value("setparameters", &arg(&args, 1))?;
    Ok(Vec::new())
}

fn m_returns(_it: &mut Interp, _span: Span, args: Vec<Value>) -> Exec<Vec<Value>> {
    let tv = check_ty("returns", &args, 0)?;
    let f = func_data("returns", &tv)?;
    let seq = f.borrow().returns.clone();
    Ok(vec![seq_to_value(&seq)])
}

fn m_setreturns(_it: &mut Interp, _span: Span, args: Vec<Value>) -> Exec<Vec<Value>> {
    let tv = check_ty("setreturns", &args, 0)?;
    let f = func_data("setreturns", &tv)?;
    f.borrow_mut().returns = seq_from_value("setreturns", &arg(&args, 1))?;
    Ok(Vec::new())
}

fn m_hassubtype(_it: &mut Interp, _span: Span, args: Vec<Value>) -> Exec<Vec<Value>> {
    let tv = check_ty("hassubtype", &args, 0)?;
    let tag = check_tag("hassubtype", &args, 1)?;
    Ok(vec![Value::Bool(tv.has_subtype(tag))])
}

fn m_hasonlysubtype(_it: &mut Interp, _span: Span, args: Vec<Value>) -> Exec<Vec<Value>> {
    let tv = check_ty("hasonlysubtype", &args, 0)?;
    let tag = check_tag("hasonlysubtype", &args, 1)?;
    Ok(vec![Value::Bool(tv.has_only_subtype(tag))])
}

fn m_hassubtypeof(_it: &mut Interp, _span: Span, args: Vec<Value>) -> Exec<Vec<Value>> {
    let tv = check_ty("hassubtypeof", &args, 0)?;
    let other = check_ty("hassubtypeof", &args, 1)?;
    Ok(vec![Value::Bool(tv.has_subtype_of(&other))])
}

fn m_hasonlysubtypeof(_it: &mut Interp, _span: Span, args: Vec<Value>) -> Exec<Vec<Value>> {
    let tv = check_ty("hasonlysubtypeof", &args, 0)?;
    let other = check_ty("hasonlysubtypeof", &args, 1)?;
    Ok(vec![Value::Bool(tv.has_only_subtype_of(&other))])
}
