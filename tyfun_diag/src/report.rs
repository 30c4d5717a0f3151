//! Diagnostic reports.
//!
//! A report is a single message at a single span, of a given `Kind`.
//! Reporting a fatal message yields `Err(Stop)`, which the caller should propagate,
//! so that the reporting site doubles as an early exit.

use std::cmp;
use std::result;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use term::{color, StderrTerminal};

use tyfun_env::{Source, Span, Pos};
use dummy_term::stderr_or_dummy;
use message::{Locale, Localize, Localized, get_message_locale};

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Kind {
    Note,
    Warning,
    Error,
    Fatal,
}

impl Kind {
    pub fn colors(&self) -> (/*dim*/ color::Color, /*bright*/ color::Color) {
        match *self {
            Kind::Fatal => (color::RED, color::BRIGHT_RED),
            Kind::Error => (color::RED, color::BRIGHT_RED),
            Kind::Warning => (color::YELLOW, color::BRIGHT_YELLOW),
            Kind::Note => (color::CYAN, color::BRIGHT_CYAN),
        }
    }
}

/// Used to stop further processing after a fatal report.
#[must_use]
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Stop;

pub type Result<T> = result::Result<T, Stop>;

pub trait Report {
    fn message_locale(&self) -> Locale;
    fn add_span(&self, kind: Kind, span: Span, msg: &Localize) -> Result<()>;
}

impl<'a, R: Report> Report for &'a R {
    fn message_locale(&self) -> Locale { (**self).message_locale() }
    fn add_span(&self, k: Kind, s: Span, m: &Localize) -> Result<()> { (**self).add_span(k, s, m) }
}

impl<'a> Report for &'a Report {
    fn message_locale(&self) -> Locale { (**self).message_locale() }
    fn add_span(&self, k: Kind, s: Span, m: &Localize) -> Result<()> { (**self).add_span(k, s, m) }
}

impl Report for Rc<Report> {
    fn message_locale(&self) -> Locale { (**self).message_locale() }
    fn add_span(&self, k: Kind, s: Span, m: &Localize) -> Result<()> { (**self).add_span(k, s, m) }
}

impl<R: Report> Report for Rc<R> {
    fn message_locale(&self) -> Locale { (**self).message_locale() }
    fn add_span(&self, k: Kind, s: Span, m: &Localize) -> Result<()> { (**self).add_span(k, s, m) }
}

/// The extension trait doing the actual reporting.
pub trait Reporter: Report + Sized {
    fn fatal<Loc: Into<Span>, Msg: Localize, T>(&self, loc: Loc, msg: Msg) -> ReportMore<T> {
        info!("reporting fatal error: {:?}", msg);
        let ret = self.add_span(Kind::Fatal, loc.into(), &msg);
        match ret {
            Err(Stop) => ReportMore::new(self, Err(Stop)),
            Ok(()) => panic!("Report::fatal should always return Err(Stop)"),
        }
    }

    fn error<Loc: Into<Span>, Msg: Localize>(&self, loc: Loc, msg: Msg) -> ReportMore<()> {
        info!("reporting error: {:?}", msg);
        let ret = self.add_span(Kind::Error, loc.into(), &msg);
        ReportMore::new(self, ret)
    }

    fn warn<Loc: Into<Span>, Msg: Localize>(&self, loc: Loc, msg: Msg) -> ReportMore<()> {
        info!("reporting warning: {:?}", msg);
        let ret = self.add_span(Kind::Warning, loc.into(), &msg);
        ReportMore::new(self, ret)
    }

    fn note<Loc: Into<Span>, Msg: Localize>(&self, loc: Loc, msg: Msg) -> ReportMore<()> {
        info!("reporting note: {:?}", msg);
        let ret = self.add_span(Kind::Note, loc.into(), &msg);
        ReportMore::new(self, ret)
    }
}

impl<T: Report> Reporter for T {}

/// Allows chaining notes after a primary report.
#[must_use]
pub struct ReportMore<'a, T> {
    report: &'a Report,
    result: Result<T>,
}

impl<'a, T> ReportMore<'a, T> {
    fn new(report: &'a Report, result: Result<T>) -> ReportMore<'a, T> {
        ReportMore { report: report, result: result }
    }

    pub fn note<Loc: Into<Span>, Msg: Localize>(self, loc: Loc, msg: Msg) -> ReportMore<'a, T> {
        let ret = self.report.note(loc, msg).result;
        ReportMore::new(self.report, if let Err(e) = ret { Err(e) } else { self.result })
    }

    pub fn done(self) -> Result<T> { self.result }
}

/// A report that prints to the standard error, with colors if possible.
pub struct ConsoleReport {
    source: Rc<RefCell<Source>>,
    term: RefCell<Box<StderrTerminal>>,
    locale: Locale,
}

impl ConsoleReport {
    pub fn new(source: Rc<RefCell<Source>>) -> ConsoleReport {
        let locale = get_message_locale().unwrap_or_else(Locale::dummy);
        ConsoleReport::with_locale(source, locale)
    }

    pub fn with_locale(source: Rc<RefCell<Source>>, locale: Locale) -> ConsoleReport {
        ConsoleReport {
            source: source,
            term: RefCell::new(stderr_or_dummy()),
            locale: locale,
        }
    }

    // column number starts from 0 and counts characters, not bytes;
    // the final newline is not counted towards columns
    fn calculate_column(&self, linespan: Span, pos: Pos) -> usize {
        assert!(linespan.contains_or_end(pos));
        let off = pos.to_usize() - linespan.begin().to_usize();

        let source = self.source.borrow();
        let line = source.slice_from_span(linespan).unwrap_or("");
        let line = line.trim_end_matches(|c| c == '\r' || c == '\n');
        line.get(..cmp::min(off, line.len())).map_or(off, |s| s.chars().count())
    }
}

impl Report for ConsoleReport {
    fn message_locale(&self) -> Locale {
        self.locale
    }

    fn add_span(&self, kind: Kind, span: Span, msg: &Localize) -> Result<()> {
        let mut term = self.term.borrow_mut();
        let term = &mut *term;
        let source = self.source.borrow();

        let mut excerpt = None;
        if let Some(f) = source.get_file(span.unit()) {
            if let Some((beginline, mut spans, _endline)) = f.lines_from_span(span) {
                let beginspan = spans.next().unwrap();
                let begincol = self.calculate_column(beginspan, span.begin());
                let endspan = spans.next_back().unwrap_or(beginspan);
                let endcol = self.calculate_column(endspan, span.end());
                let _ = write!(term, "{}:{}:{}: ", f.path(), beginline + 1, begincol + 1);
                if beginspan == endspan {
                    excerpt = Some((beginline, beginspan, begincol, endcol));
                }
            }
        }

        let (dim, bright) = kind.colors();
        let _ = term.fg(dim);
        let _ = write!(term, "[");
        let _ = term.fg(bright);
        let _ = write!(term, "{:?}", kind);
        let _ = term.fg(dim);
        let _ = write!(term, "] ");
        let _ = term.fg(color::BRIGHT_WHITE);
        let _ = write!(term, "{}", Localized::new(msg, self.locale));
        let _ = term.reset();
        let _ = writeln!(term, "");

        // if the span fits in a single line, print that line as well:
        //
        // 123 | aaaabbbbbb     begincol = endcol
        //     |     *
        //
        // 123 | aaaaXXXXXbbb   begincol < endcol
        //     |     ^^^^^
        if let Some((lineno, linespan, begincol, endcol)) = excerpt {
            let line = source.slice_from_span(linespan).unwrap_or("");
            let line = line.trim_end_matches(|c| c == '\r' || c == '\n');

            let _ = term.fg(color::BRIGHT_BLACK);
            let _ = write!(term, "{} | ", lineno + 1);
            let _ = term.reset();
            let _ = writeln!(term, "{}", line);

            let _ = term.fg(color::BRIGHT_BLACK);
            let ndigits = (lineno + 1).to_string().len();
            let _ = write!(term, "{:1$} | ", "", ndigits);
            let _ = term.fg(bright);
            if begincol == endcol {
                let _ = write!(term, "{:1$}*", "", begincol);
            } else {
                let _ = write!(term, "{:2$}{:^>3$}", "", "", begincol, endcol - begincol);
            }
            let _ = term.reset();
            let _ = writeln!(term, "");
        }

        if kind == Kind::Fatal { Err(Stop) } else { Ok(()) }
    }
}

/// A report that collects reported messages, already localized into strings.
pub struct CollectedReport {
    collected: RefCell<Vec<(Kind, Span, String)>>,
    locale: Locale,
}

impl CollectedReport {
    pub fn new(locale: Locale) -> CollectedReport {
        CollectedReport { collected: RefCell::new(Vec::new()), locale: locale }
    }

    pub fn into_reports(self) -> Vec<(Kind, Span, String)> {
        self.collected.into_inner()
    }
}

impl Report for CollectedReport {
    fn message_locale(&self) -> Locale {
        self.locale
    }

    fn add_span(&self, kind: Kind, span: Span, msg: &Localize) -> Result<()> {
        let msg = Localized::new(msg, self.locale).to_string();
        self.collected.borrow_mut().push((kind, span, msg));
        if kind == Kind::Fatal { Err(Stop) } else { Ok(()) }
    }
}

/// A report that discards all messages and immediately stops.
pub struct NoReport;

impl Report for NoReport {
    fn message_locale(&self) -> Locale {
        Locale::dummy()
    }

    fn add_span(&self, _kind: Kind, _span: Span, _msg: &Localize) -> Result<()> {
        Err(Stop)
    }
}

/// A report wrapper that tracks the maximum kind of reported messages.
pub struct TrackMaxKind<R: Report> {
    report: R,
    maxkind: Cell<Option<Kind>>,
}

impl<R: Report> TrackMaxKind<R> {
    pub fn new(report: R) -> TrackMaxKind<R> {
        TrackMaxKind { report: report, maxkind: Cell::new(None) }
    }

    pub fn can_continue(&self) -> bool {
        self.maxkind.get() < Some(Kind::Error)
    }

    pub fn into_inner(self) -> R {
        self.report
    }
}

impl<R: Report> Report for TrackMaxKind<R> {
    fn message_locale(&self) -> Locale {
        self.report.message_locale()
    }

    fn add_span(&self, kind: Kind, span: Span, msg: &Localize) -> Result<()> {
        if let Some(maxkind) = self.maxkind.get() {
            self.maxkind.set(Some(cmp::max(maxkind, kind)));
        } else {
            self.maxkind.set(Some(kind));
        }
        self.report.add_span(kind, span, msg)
    }
}
