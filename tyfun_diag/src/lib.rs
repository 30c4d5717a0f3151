//! Diagnostics and message localization for Tyfun.
//!
//! All user-facing reports go through the `Report` trait,
//! and all report messages are localizable via the `Localize` trait
//! (normally with the `define_msg!` macro).

#[macro_use] extern crate log;
extern crate term;
extern crate tyfun_env;

pub use message::{Locale, Localize, Localized, get_message_locale};
pub use report::{Kind, Stop, Result, Report, Reporter, ReportMore};
pub use report::{ConsoleReport, CollectedReport, NoReport, TrackMaxKind};

mod dummy_term;
#[macro_use] pub mod message;
pub mod report;
