//! The reduction driver.
//!
//! A `Session` holds the class registry, the defined type functions and the
//! memoization table, and lives for the whole analysis. Each reduction gets
//! a fresh sandbox; its outcome is keyed by the function identity and the
//! structural argument tuple, so re-invoking a function with equal arguments
//! replays the recorded outcome without rerunning the body.

use std::rc::Rc;
use std::cell::{Cell, RefCell};
use std::hash::{Hash, Hasher};
use std::time::Duration;
use std::collections::HashMap;
use std::collections::hash_map;

use tyfun_env::{Span, Spanned};
use tyfun_diag::{Report, Reporter, Result, Stop};
use tyfun_syntax::{Name, Ex, Exp, Chunk, St, Block, FuncBody};
use tyfun_types::ty::{self, Key, HostTy, HostTable, HostProp, HostIndexer,
                      HostSeq, HostFunc, SerdeError};
use tyfun_types::env::ClassRegistry;

use message as m;
use value::{Value, Function, Closure, tostring};
use governor::{Governor, CancelToken, Exhausted};
use interp::{Interp, Abort};

/// A defined type function, shared between the session and any closures
/// referring to it from inside other reductions.
pub struct TypeFuncDef {
    pub name: Spanned<Name>,
    pub params: Vec<Name>,
    pub varargs: bool,
    pub block: Rc<Spanned<Block>>,
}

impl TypeFuncDef {
    pub fn from_decl(name: &Spanned<Name>, body: &FuncBody) -> TypeFuncDef {
        TypeFuncDef {
            name: name.clone(),
            params: body.params.base.head.iter().map(|p| p.base.clone()).collect(),
            varargs: body.params.base.tail.is_some(),
            block: Rc::new(body.block.clone()),
        }
    }
}

/// How a single reduction ended.
#[derive(Clone, Debug)]
pub enum Outcome {
    Resolved(HostTy),

    /// The body raised a runtime error; the payload is its `tostring`.
    Failed(String),

    /// The body returned a single value which did not deserialize.
    Malformed(String),

    /// The body returned zero or multiple values.
    WrongReturnArity(usize),

    TimedOut,
    Canceled,
}

// nested reductions re-enter the driver, so runaway mutual recursion has to
// stop before the host stack does
const MAX_REDUCTION_DEPTH: usize = 32;

// the key holds the defining `Rc` itself, keeping the allocation alive for
// the life of the cache; a dropped definition can therefore never share an
// address with a later one
struct DefId(Rc<TypeFuncDef>);

impl PartialEq for DefId {
    fn eq(&self, other: &DefId) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for DefId {}

impl Hash for DefId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Rc::as_ptr(&self.0) as usize).hash(state);
    }
}

type MemoKey = (DefId, Vec<HostTy>);

pub struct Session {
    classes: ClassRegistry,
    funcs: HashMap<Name, Rc<TypeFuncDef>>,
    memo: RefCell<HashMap<MemoKey, Outcome>>,
    depth: Cell<usize>,
}

impl Session {
    pub fn new(classes: ClassRegistry) -> Session {
        Session {
            classes: classes,
            funcs: HashMap::new(),
            memo: RefCell::new(HashMap::new()),
            depth: Cell::new(0),
        }
    }

    pub fn classes(&self) -> &ClassRegistry {
        &self.classes
    }

    pub fn funcs(&self) -> hash_map::Iter<Name, Rc<TypeFuncDef>> {
        self.funcs.iter()
    }

    pub fn get(&self, name: &Name) -> Option<Rc<TypeFuncDef>> {
        self.funcs.get(name).cloned()
    }

    /// Defines or redefines a type function. Memoized outcomes are keyed by
    /// the definition identity, so a redefinition never replays stale ones.
    pub fn define(&mut self, def: TypeFuncDef) -> Rc<TypeFuncDef> {
        let def = Rc::new(def);
        debug!("defining type function {:?}", def.name);
        self.funcs.insert(def.name.base.clone(), def.clone());
        def
    }

    /// Runs one reduction to completion under the given governor, or replays
    /// a memoized outcome. All outcomes are memoized except cancellation,
    /// which says nothing about the function itself.
    pub fn reduce(&self, def: &Rc<TypeFuncDef>, args: &[HostTy],
                  governor: &Governor, report: &Report) -> Result<Outcome> {
        let key = (DefId(def.clone()), args.to_vec());
        if let Some(outcome) = self.memo.borrow().get(&key) {
            debug!("replaying memoized outcome of {:?}: {:?}", def.name.base, outcome);
            return Ok(outcome.clone());
        }

        if self.depth.get() >= MAX_REDUCTION_DEPTH {
            // context-dependent, not memoized
            return Ok(Outcome::Failed("type function reductions are nested too deeply".into()));
        }

        self.depth.set(self.depth.get() + 1);
        let outcome = self.reduce_uncached(def, args, governor, report);
        self.depth.set(self.depth.get() - 1);
        let outcome = outcome?;

        match outcome {
            Outcome::Canceled => {}
            ref outcome => {
                self.memo.borrow_mut().insert(key, outcome.clone());
            }
        }
        Ok(outcome)
    }

    fn reduce_uncached(&self, def: &Rc<TypeFuncDef>, args: &[HostTy],
                       governor: &Governor, report: &Report) -> Result<Outcome> {
        debug!("reducing {:?} with {} argument(s)", def.name.base, args.len());

        let mut interp = Interp::new(self, governor, report);

        let mut argvs = Vec::with_capacity(args.len());
        for arg in args {
            match interp.serialize(arg) {
                Ok(tv) => argvs.push(Value::Ty(tv)),
                // an unresolved error in an argument resolves the call
                // without a second diagnostic
                Err(SerdeError::ErrorType) => return Ok(Outcome::Resolved(HostTy::Error)),
                Err(e) => return Ok(Outcome::Failed(format!("bad argument: {}", e))),
            }
        }

        let body = Closure::from_def(def);
        let func = Value::Func(Function::Lua(Rc::new(body)));
        match interp.call_function(&func, argvs, def.name.span) {
            Ok(rets) => {
                let mut tvs = Vec::with_capacity(rets.len());
                for ret in &rets {
                    match *ret {
                        Value::Ty(ref tv) => tvs.push(tv.clone()),
                        ref v => return Ok(Outcome::Malformed(
                            format!("expected a type, got {}", v.type_name()))),
                    }
                }
                match ty::deserialize_result(&tvs) {
                    Ok(host) => Ok(Outcome::Resolved(host)),
                    Err(SerdeError::Arity { given }) => Ok(Outcome::WrongReturnArity(given)),
                    Err(e) => Ok(Outcome::Malformed(e.to_string())),
                }
            }
            Err(Abort::Error(v)) => Ok(Outcome::Failed(tostring(&v))),
            Err(Abort::Exhausted(Exhausted::Timeout)) => Ok(Outcome::TimedOut),
            Err(Abort::Exhausted(Exhausted::Canceled)) => Ok(Outcome::Canceled),
            Err(Abort::Stop) => Err(Stop),
        }
    }

    /// Reduces a type function named at a call site and resolves the site,
    /// reporting a diagnostic and degrading to the error placeholder on any
    /// failure. A memoized failure is re-reported at every new call site.
    pub fn invoke(&self, name: &Spanned<Name>, args: &[HostTy],
                  governor: &Governor, report: &Report) -> Result<HostTy> {
        let def = match self.get(&name.base) {
            Some(def) => def,
            None => {
                report.error(name.span, m::UndefinedTypeFunc { name: &name.base }).done()?;
                return Ok(HostTy::Error);
            }
        };

        match self.reduce(&def, args, governor, report)? {
            Outcome::Resolved(host) => Ok(host),
            Outcome::Failed(msg) => {
                report.error(name.span,
                             m::ReductionFailure { name: &name.base, msg: &msg }).done()?;
                Ok(HostTy::Error)
            }
            Outcome::Malformed(detail) => {
                report.error(name.span,
                             m::MalformedResult { name: &name.base, detail: &detail }).done()?;
                Ok(HostTy::Error)
            }
            Outcome::WrongReturnArity(given) => {
                report.error(name.span,
                             m::ReturnArity { name: &name.base, given: given }).done()?;
                Ok(HostTy::Error)
            }
            Outcome::TimedOut => {
                report.error(name.span, m::ReductionTimeout { name: &name.base }).done()?;
                Ok(HostTy::Error)
            }
            Outcome::Canceled => {
                report.error(name.span, m::ReductionCanceled { name: &name.base }).done()?;
                Ok(HostTy::Error)
            }
        }
    }
}

/// Runs a parsed script: type function declarations are collected into the
/// session, and every top-level call statement is a query reduced under a
/// fresh governor. Returns the resolved type for each query in order.
pub fn run_script(session: &mut Session, chunk: &Chunk,
                  limit: Option<Duration>, token: Option<CancelToken>,
                  report: &Report) -> Result<Vec<(Span, Name, HostTy)>> {
    let mut resolved = Vec::new();

    for stmt in &chunk.block.base {
        match *stmt.base {
            St::TypeFunc(ref name, ref body) => {
                session.define(TypeFuncDef::from_decl(name, body));
            }

            St::Void(ref exp) => {
                let (name, argexps) = match *exp.base {
                    Ex::FuncCall(ref callee, ref args) => match *callee.base {
                        Ex::Var(ref name) => (name, args),
                        _ => {
                            report.error(exp.span, m::NotAQuery {}).done()?;
                            continue;
                        }
                    },
                    _ => {
                        report.error(exp.span, m::NotAQuery {}).done()?;
                        continue;
                    }
                };

                let mut args = Vec::with_capacity(argexps.base.len());
                for argexp in &argexps.base {
                    args.push(resolve_ty(argexp, report)?);
                }

                // each query gets its own deadline; nested reductions
                // made from inside the body share it
                let governor = Governor::new(limit, token.clone());
                let host = session.invoke(name, &args, &governor, report)?;
                info!("query {:?} resolved to {:?}", name.base, host);
                resolved.push((exp.span, name.base.clone(), host));
            }

            _ => {
                report.error(stmt.span, m::NotAQuery {}).done()?;
            }
        }
    }

    Ok(resolved)
}

/// Resolves a type expression at a query site into a host type.
/// Errors are reported and resolve to the error placeholder.
pub fn resolve_ty(exp: &Spanned<Exp>, report: &Report) -> Result<HostTy> {
    match *exp.base {
        Ex::Nil => Ok(HostTy::Nil),
        Ex::False => Ok(HostTy::BoolSingleton(false)),
        Ex::True => Ok(HostTy::BoolSingleton(true)),
        Ex::Str(ref s) => Ok(HostTy::str_singleton(s.as_str())),

        Ex::Var(ref name) => match name.base.as_str() {
            "unknown" => Ok(HostTy::Unknown),
            "never" => Ok(HostTy::Never),
            "any" => Ok(HostTy::Any),
            "boolean" => Ok(HostTy::Boolean),
            "number" => Ok(HostTy::Number),
            "string" => Ok(HostTy::String),
            _ => {
                report.error(name.span, m::UnknownTypeName { name: &name.base }).done()?;
                Ok(HostTy::Error)
            }
        },

        Ex::FuncCall(ref callee, ref args) => {
            let builder = match *callee.base {
                Ex::Var(ref name) => name,
                _ => {
                    report.error(exp.span, m::NotATypeExp {}).done()?;
                    return Ok(HostTy::Error);
                }
            };
            match builder.base.as_str() {
                "union" | "intersect" => {
                    let mut components = Vec::with_capacity(args.base.len());
                    for arg in &args.base {
                        components.push(resolve_ty(arg, report)?);
                    }
                    if components.len() < 2 {
                        report.error(exp.span, m::NotATypeExp {}).done()?;
                        return Ok(HostTy::Error);
                    }
                    if builder.base.as_str() == "union" {
                        Ok(HostTy::Union(components))
                    } else {
                        Ok(HostTy::Intersection(components))
                    }
                }

                "negate" if args.base.len() == 1 => {
                    let inner = resolve_ty(&args.base[0], report)?;
                    Ok(HostTy::Negation(Box::new(inner)))
                }

                "func" if args.base.len() <= 2 => {
                    let params = match args.base.get(0) {
                        Some(arg) => resolve_seq(arg, report)?,
                        None => HostSeq::empty(),
                    };
                    let returns = match args.base.get(1) {
                        Some(arg) => resolve_seq(arg, report)?,
                        None => HostSeq::empty(),
                    };
                    Ok(HostTy::Function(Box::new(HostFunc { params: params,
                                                            returns: returns })))
                }

                _ => {
                    report.error(exp.span, m::NotATypeExp {}).done()?;
                    Ok(HostTy::Error)
                }
            }
        }

        Ex::Table(ref fields) => {
            let mut table = HostTable::new();
            for &(ref key, ref value) in fields {
                let key = match *key {
                    Some(ref key) => key,
                    None => {
                        report.error(value.span, m::NotATypeExp {}).done()?;
                        return Ok(HostTy::Error);
                    }
                };
                match *key.base {
                    // `{name = T}` and `[true] = T` declare properties
                    Ex::Str(ref s) => {
                        let value = resolve_ty(value, report)?;
                        table.set_prop(Key::Str(s.as_str().into()),
                                       HostProp { read: Some(value.clone()),
                                                  write: Some(value) });
                    }
                    Ex::True | Ex::False => {
                        let b = *key.base == Ex::True;
                        let value = resolve_ty(value, report)?;
                        table.set_prop(Key::Bool(b),
                                       HostProp { read: Some(value.clone()),
                                                  write: Some(value) });
                    }
                    // `[number] = T` declares an indexer
                    Ex::Var(..) => {
                        let keyty = resolve_ty(key, report)?;
                        let value = resolve_ty(value, report)?;
                        table.indexer = Some(Box::new(HostIndexer {
                            key: keyty,
                            read: value.clone(),
                            write: value,
                        }));
                    }
                    _ => {
                        report.error(key.span, m::NotATypeExp {}).done()?;
                        return Ok(HostTy::Error);
                    }
                }
            }
            Ok(HostTy::Table(Box::new(table)))
        }

        _ => {
            report.error(exp.span, m::NotATypeExp {}).done()?;
            Ok(HostTy::Error)
        }
    }
}

// a type sequence in a query: positional fields are the head,
// a `tail = T` field is the variadic tail
fn resolve_seq(exp: &Spanned<Exp>, report: &Report) -> Result<HostSeq> {
    let fields = match *exp.base {
        Ex::Table(ref fields) => fields,
        _ => {
            report.error(exp.span, m::NotATypeExp {}).done()?;
            return Ok(HostSeq::empty());
        }
    };

    let mut seq = HostSeq::empty();
    for &(ref key, ref value) in fields {
        match *key {
            None => {
                seq.head.push(resolve_ty(value, report)?);
            }
            Some(ref key) => match *key.base {
                Ex::Str(ref s) if s.as_str() == "tail" => {
                    seq.tail = Some(Box::new(resolve_ty(value, report)?));
                }
                _ => {
                    report.error(key.span, m::NotATypeExp {}).done()?;
                }
            },
        }
    }
    Ok(seq)
}
