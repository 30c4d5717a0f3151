//! The type function evaluator.
//!
//! Type functions are small Lua programs running at type checking time.
//! This crate reduces them: a [`Session`](./driver/struct.Session.html)
//! collects the declared functions and memoizes their outcomes, and each
//! reduction runs the body in a fresh deterministic sandbox under a
//! [`Governor`](./governor/struct.Governor.html) enforcing a deadline
//! and cooperative cancellation.

#[macro_use] extern crate log;
extern crate tyfun_env;
#[macro_use] extern crate tyfun_diag;
extern crate tyfun_syntax;
extern crate tyfun_types;

pub use governor::{Governor, CancelToken, Exhausted};
pub use driver::{Session, TypeFuncDef, Outcome, run_script, resolve_ty};
pub use value::{Value, Table, Function};
pub use interp::Interp;

mod message;
pub mod value;
pub mod governor;
pub mod interp;
pub mod sandbox;
pub mod tylib;
pub mod driver;
