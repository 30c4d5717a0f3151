//! Reduces type function queries from the command line.

extern crate env_logger;
#[macro_use] extern crate clap;
extern crate tyfun_env;
extern crate tyfun_diag;
extern crate tyfun_syntax;
extern crate tyfun_types;
extern crate tyfun_eval;

use std::rc::Rc;
use std::cell::RefCell;
use std::path::Path;
use std::time::Duration;

use clap::{App, Error, ErrorKind};
use tyfun_env::{Span, Source, SourceFile};
use tyfun_diag::{Locale, Localize, Kind, Report, ConsoleReport, TrackMaxKind};
use tyfun_syntax::parse_chunk;
use tyfun_types::env::ClassRegistry;
use tyfun_eval::{Session, run_script};

struct OptionalConsoleReport {
    quiet: bool,
    report: ConsoleReport,
}

impl Report for OptionalConsoleReport {
    fn message_locale(&self) -> Locale {
        self.report.message_locale()
    }

    fn add_span(&self, kind: Kind, span: Span, msg: &Localize) -> tyfun_diag::Result<()> {
        if self.quiet {
            Ok(())
        } else {
            self.report.add_span(kind, span, msg)
        }
    }
}

fn run(path: &str, limit: Option<Duration>, locale: Locale,
       quiet: bool) -> Result<(), String> {
    let source = Rc::new(RefCell::new(Source::new()));
    let file = SourceFile::from_file(Path::new(path))
        .map_err(|e| format!("Couldn't open `{}`: {}", path, e))?;
    let span = source.borrow_mut().add(file);

    let report = TrackMaxKind::new(OptionalConsoleReport {
        quiet: quiet,
        report: ConsoleReport::with_locale(source.clone(), locale),
    });

    let chunk = match parse_chunk(&source.borrow(), span, &report as &Report) {
        Ok(chunk) => chunk,
        Err(_) => return Err(format!("Stopped due to prior errors")),
    };

    let mut session = Session::new(ClassRegistry::new());
    let resolved = match run_script(&mut session, &chunk, limit, None, &report as &Report) {
        Ok(resolved) => resolved,
        Err(_) => return Err(format!("Stopped due to prior errors")),
    };

    for &(_span, ref name, ref ty) in &resolved {
        println!("{:-?} = {}", name, ty.display(session.classes()));
    }

    if report.can_continue() {
        Ok(())
    } else {
        Err(format!("Stopped due to prior errors"))
    }
}

fn build_app() -> App<'static, 'static> {
    clap_app!(tyfun =>
        (@setting UnifiedHelpMessage)
        (@setting NextLineHelp)
        (version: option_env!("CARGO_PKG_VERSION").unwrap_or("(version unknown)"))
        (about:
            "Sandboxed evaluation of user-defined type functions.\n\
             Runs a script of declarations and queries, \
             printing the resolved type of each query.")
        (max_term_width: 100)
        (@arg time_limit: -t --("time-limit") [SECONDS]
            "Sets the deadline for each query, in seconds (fractions are allowed).\n\
             Nested reductions made by a query share its deadline. \
             Defaults to no deadline.")
        (@arg quiet: -q --quiet
            "Suppresses all reports.")
        (@arg message_locale: -l --("message-locale") [LOCALE]
            "Sets the message locale. Defaults to the system language.")
        (@arg path: +required
            "A script with type function declarations and queries.")
    )
}

fn invalid_value(s: &str) -> ! {
    Error::with_description(s, ErrorKind::InvalidValue).exit();
}

fn io_error(s: &str) -> ! {
    Error::with_description(s, ErrorKind::Io).exit();
}

pub fn main() {
    use tyfun_diag::get_message_locale;

    env_logger::init();

    let matches = build_app().get_matches();

    let locale = if let Some(locale) = matches.value_of("message_locale") {
        match Locale::new(locale) {
            Some(locale) => locale,
            None => invalid_value(&format!("`{}` is not a valid message locale", locale)),
        }
    } else {
        get_message_locale().unwrap_or_else(|| Locale::from("en"))
    };

    let limit = match matches.value_of("time_limit") {
        Some(secs) => match secs.parse::<f64>() {
            Ok(secs) if secs > 0.0 => Some(Duration::from_millis((secs * 1000.0) as u64)),
            _ => invalid_value(&format!("`{}` is not a valid time limit", secs)),
        },
        None => None,
    };

    let quiet = matches.is_present("quiet");
    let path = match matches.value_of("path") {
        Some(path) => path,
        None => invalid_value("no script given"),
    };

    if let Err(e) = run(path, limit, locale, quiet) {
        io_error(&e);
    }
}
