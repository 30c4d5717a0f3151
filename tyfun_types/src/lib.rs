//! Type values for Tyfun.
//!
//! This crate defines the two representations a static type takes:
//! the *host* tree (`HostTy`), an acyclic value owned by the type checker,
//! and the *type value* (`TypeValue`), the mutable reference-semantics
//! representation handed to a running type function. The serializer in
//! `ty::serde` converts between the two at the reduction boundary.

#[macro_use] extern crate bitflags;
#[macro_use] extern crate log;
extern crate vec_map;

pub mod ty;
pub mod env;
