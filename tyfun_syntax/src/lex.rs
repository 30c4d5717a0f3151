//! Lexical analysis for the sandbox dialect.
//!
//! The token stream is a plain Lua 5.1 one; there is no meta-comment layer.
//! All inputs are UTF-8 and the lexer works directly over the byte slice.

use std::fmt;
use std::char;

use tyfun_env::{Pos, Span, Spanned, WithLoc};
use tyfun_diag::{Locale, Localize, Localized, Report, Reporter};
use message as m;

/// A token.
#[derive(Clone, Debug, PartialEq)]
pub enum Tok {
    /// A token which is distinct from all other tokens.
    ///
    /// The lexer emits this token on an error.
    Error,

    /// A punctuation.
    Punct(Punct),

    /// A keyword.
    Keyword(Keyword),

    /// A number.
    Num(f64),

    /// A name.
    Name(String),

    /// A string (either `"string"` or `[[string]]`).
    Str(String),

    /// The end of file.
    ///
    /// A valid stream of tokens is expected to have only one EOF token at the end.
    EOF,
}

impl Localize for Tok {
    fn fmt_localized(&self, f: &mut fmt::Formatter, locale: Locale) -> fmt::Result {
        match (&locale[..], self) {
            ("ko", &Tok::Error)      => write!(f, "잘못된 문자"),
            (_,    &Tok::Error)      => write!(f, "an invalid character"),
            (_,    &Tok::Punct(p))   => write!(f, "{}", Localized::new(&p, locale)),
            (_,    &Tok::Keyword(w)) => write!(f, "{}", Localized::new(&w, locale)),
            ("ko", &Tok::Num(_))     => write!(f, "숫자"),
            (_,    &Tok::Num(_))     => write!(f, "a number"),
            ("ko", &Tok::Name(_))    => write!(f, "이름"),
            (_,    &Tok::Name(_))    => write!(f, "a name"),
            ("ko", &Tok::Str(_))     => write!(f, "문자열 리터럴"),
            (_,    &Tok::Str(_))     => write!(f, "a string literal"),
            ("ko", &Tok::EOF)        => write!(f, "파일의 끝"),
            (_,    &Tok::EOF)        => write!(f, "the end of file"),
        }
    }
}

impl<'a> Localize for &'a Tok {
    fn fmt_localized(&self, f: &mut fmt::Formatter, locale: Locale) -> fmt::Result {
        (**self).fmt_localized(f, locale)
    }
}

macro_rules! define_puncts {
    ($ty:ident |$locale:ident|: $($i:ident $t:expr,)*) => (
        /// A punctuation.
        #[derive(Copy, Clone, Debug, PartialEq, Eq)]
        pub enum $ty { $($i,)* }

        impl Localize for $ty {
            fn fmt_localized(&self, f: &mut fmt::Formatter, $locale: Locale) -> fmt::Result {
                let text = match *self { $($ty::$i => $t,)* };
                fmt::Display::fmt(text, f)
            }
        }
    );
}

define_puncts! { Punct |locale|:
    Plus        "`+`",
    Dash        "`-`",
    Star        "`*`",
    Slash       "`/`",
    Percent     "`%`",
    Caret       "`^`",
    Hash        "`#`",
    EqEq        "`==`",
    TildeEq     "`~=`",
    LtEq        "`<=`",
    GtEq        "`>=`",
    Lt          "`<`",
    Gt          "`>`",
    Eq          "`=`",
    LParen      "`(`",
    RParen      "`)`",
    LBrace      "`{`",
    RBrace      "`}`",
    LBracket    "`[`",
    RBracket    "`]`",
    Semicolon   "`;`",
    Colon       "`:`",
    Comma       "`,`",
    Dot         "`.`",
    DotDot      "`..`",
    DotDotDot   "`...`",
}

macro_rules! define_keywords {
    ($ty:ident: $($i:ident $t:expr,)*) => (
        /// A keyword.
        #[derive(Copy, Clone, Debug, PartialEq, Eq)]
        pub enum $ty { $($i,)* }

        impl $ty {
            pub fn from(s: &str) -> Option<$ty> {
                match s {
                    $($t => Some($ty::$i),)*
                    _ => None,
                }
            }

            pub fn name(&self) -> &'static str {
                match *self { $($ty::$i => $t,)* }
            }
        }

        impl Localize for $ty {
            fn fmt_localized(&self, f: &mut fmt::Formatter, locale: Locale) -> fmt::Result {
                match &locale[..] {
                    "ko" => write!(f, "키워드 `{}`", self.name()),
                    _ => write!(f, "a keyword `{}`", self.name()),
                }
            }
        }
    );
}

define_keywords! { Keyword:
    And         "and",
    Break       "break",
    Do          "do",
    Else        "else",
    Elseif      "elseif",
    End         "end",
    False       "false",
    For         "for",
    Function    "function",
    If          "if",
    In          "in",
    Local       "local",
    Nil         "nil",
    Not         "not",
    Or          "or",
    Repeat      "repeat",
    Return      "return",
    Then        "then",
    True        "true",
    Until       "until",
    While       "while",
}

fn is_name_start(c: u8) -> bool {
    match c { b'A'..=b'Z' | b'a'..=b'z' | b'_' => true, _ => false }
}

fn is_name_cont(c: u8) -> bool {
    match c { b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'_' => true, _ => false }
}

fn is_digit(c: u8) -> bool {
    match c { b'0'..=b'9' => true, _ => false }
}

/// The lexer. Iterates over spanned tokens, ending with a single `Tok::EOF`.
pub struct Lexer<'a> {
    data: &'a [u8],
    base: Pos,
    off: usize,
    eof: bool,
    report: &'a Report,
}

impl<'a> Lexer<'a> {
    /// `data` should be the slice of the source corresponding to the span starting at `base`.
    pub fn new(data: &'a str, base: Pos, report: &'a Report) -> Lexer<'a> {
        Lexer { data: data.as_bytes(), base: base, off: 0, eof: false, report: report }
    }

    fn pos(&self) -> Pos {
        self.base + self.off
    }

    fn peek(&self) -> Option<u8> {
        self.data.get(self.off).cloned()
    }

    fn peek2(&self) -> Option<u8> {
        self.data.get(self.off + 1).cloned()
    }

    fn bump(&mut self) -> Option<u8> {
        let c = self.peek();
        if c.is_some() { self.off += 1; }
        c
    }

    fn try_eat(&mut self, c: u8) -> bool {
        if self.peek() == Some(c) {
            self.off += 1;
            true
        } else {
            false
        }
    }

    fn scan_while<Cond>(&mut self, mut cond: Cond) -> &'a [u8]
        where Cond: FnMut(u8) -> bool
    {
        let begin = self.off;
        while let Some(c) = self.peek() {
            if !cond(c) { break; }
            self.off += 1;
        }
        &self.data[begin..self.off]
    }

    fn count_equals(&mut self) -> usize {
        let mut level = 0;
        while self.try_eat(b'=') { level += 1; }
        level
    }

    // assumes that `[` is already read and the next character is `=` or `[`.
    // returns the contents if the long bracket was successfully scanned.
    fn scan_long_bracket(&mut self, begin: Pos,
                         premature_eof: &Localize) -> Option<String> {
        let opening_level = self.count_equals();
        if !self.try_eat(b'[') {
            let _ = self.report.error(begin..self.pos(), m::UnclosedOpeningLongBracket {})
                               .done();
            return None;
        }

        // the first newline immediately following the opening bracket is skipped
        if self.try_eat(b'\r') { self.try_eat(b'\n'); } else { self.try_eat(b'\n'); }

        let mut contents = Vec::new();
        loop {
            match self.bump() {
                Some(b']') => {
                    let closing_level = self.count_equals();
                    if closing_level == opening_level && self.try_eat(b']') {
                        break;
                    }
                    contents.push(b']');
                    for _ in 0..closing_level { contents.push(b'='); }
                }
                Some(c) => contents.push(c),
                None => {
                    let _ = self.report.error(self.pos(), premature_eof)
                                       .note(begin, m::LongBracketStart {})
                                       .done();
                    return None;
                }
            }
        }

        // the input is UTF-8 and the bracket delimiters are ASCII
        Some(String::from_utf8(contents).expect("long bracket contents should be UTF-8"))
    }

    fn scan_string(&mut self, quote: u8, begin: Pos) -> Option<String> {
        let mut contents = Vec::new();
        loop {
            match self.bump() {
                Some(c) if c == quote => break,
                Some(b'\\') => {
                    match self.bump() {
                        Some(b'a') => contents.push(7),
                        Some(b'b') => contents.push(8),
                        Some(b'f') => contents.push(12),
                        Some(b'n') => contents.push(b'\n'),
                        Some(b'r') => contents.push(b'\r'),
                        Some(b't') => contents.push(b'\t'),
                        Some(b'v') => contents.push(11),
                        Some(c @ b'\\') | Some(c @ b'\'') | Some(c @ b'"') => contents.push(c),
                        Some(b'\n') => contents.push(b'\n'),
                        Some(c @ b'0'..=b'9') => {
                            // up to three decimal digits
                            let mut v = (c - b'0') as u32;
                            for _ in 0..2 {
                                match self.peek() {
                                    Some(c @ b'0'..=b'9') => {
                                        self.off += 1;
                                        v = v * 10 + (c - b'0') as u32;
                                    }
                                    _ => break,
                                }
                            }
                            match char::from_u32(v).filter(|c| (*c as u32) < 0x100) {
                                Some(c) => {
                                    let mut buf = [0; 4];
                                    contents.extend_from_slice(c.encode_utf8(&mut buf)
                                                                .as_bytes());
                                }
                                None => {
                                    let _ = self.report.error(
                                        begin..self.pos(), m::UnrecognizedEscapeInString {}
                                    ).done();
                                }
                            }
                        }
                        Some(_) => {
                            let _ = self.report.error(begin..self.pos(),
                                                      m::UnrecognizedEscapeInString {})
                                               .done();
                        }
                        None => {
                            let _ = self.report.error(self.pos(), m::PrematureEofInString {})
                                               .note(begin, m::StringStart {})
                                               .done();
                            return None;
                        }
                    }
                }
                Some(b'\n') | Some(b'\r') | None => {
                    let _ = self.report.error(self.pos(), m::PrematureEofInString {})
                                       .note(begin, m::StringStart {})
                                       .done();
                    return None;
                }
                Some(c) => contents.push(c),
            }
        }

        match String::from_utf8(contents) {
            Ok(s) => Some(s),
            Err(_) => {
                // can only happen when an escape produced a stray continuation byte
                let _ = self.report.error(begin..self.pos(),
                                          m::UnrecognizedEscapeInString {}).done();
                None
            }
        }
    }

    fn scan_number(&mut self, first: u8) -> Option<f64> {
        let begin = self.off - 1;
        if first == b'0' && (self.peek() == Some(b'x') || self.peek() == Some(b'X')) {
            self.off += 1;
            let digits = self.scan_while(|c| c.is_ascii_hexdigit());
            let digits = ::std::str::from_utf8(digits).expect("hex digits are ASCII");
            return u64::from_str_radix(digits, 16).ok().map(|v| v as f64);
        }

        self.scan_while(is_digit);
        if self.try_eat(b'.') {
            self.scan_while(is_digit);
        }
        if self.peek() == Some(b'e') || self.peek() == Some(b'E') {
            self.off += 1;
            if !self.try_eat(b'-') { self.try_eat(b'+'); }
            self.scan_while(is_digit);
        }

        let text = ::std::str::from_utf8(&self.data[begin..self.off])
                              .expect("number literals are ASCII");
        text.parse().ok()
    }

    fn next_token(&mut self) -> Spanned<Tok> {
        loop {
            // skip whitespace
            self.scan_while(|c| c == b' ' || c == b'\t' || c == b'\r' || c == b'\n');

            let begin = self.pos();
            let c = match self.bump() {
                Some(c) => c,
                None => {
                    self.eof = true;
                    return Tok::EOF.with_loc(begin);
                }
            };

            macro_rules! tok {
                ($tok:expr) => (return $tok.with_loc(begin..self.pos()))
            }

            match c {
                // a comment: `--` followed by either a long bracket or a line
                b'-' if self.peek() == Some(b'-') => {
                    self.off += 1;
                    if self.peek() == Some(b'[') &&
                       (self.peek2() == Some(b'[') || self.peek2() == Some(b'=')) {
                        self.off += 1;
                        let _ = self.scan_long_bracket(begin, &m::PrematureEofInLongComment {});
                    } else {
                        self.scan_while(|c| c != b'\r' && c != b'\n');
                    }
                    continue;
                }

                b'+' => tok!(Tok::Punct(Punct::Plus)),
                b'-' => tok!(Tok::Punct(Punct::Dash)),
                b'*' => tok!(Tok::Punct(Punct::Star)),
                b'/' => tok!(Tok::Punct(Punct::Slash)),
                b'%' => tok!(Tok::Punct(Punct::Percent)),
                b'^' => tok!(Tok::Punct(Punct::Caret)),
                b'#' => tok!(Tok::Punct(Punct::Hash)),
                b'(' => tok!(Tok::Punct(Punct::LParen)),
                b')' => tok!(Tok::Punct(Punct::RParen)),
                b'{' => tok!(Tok::Punct(Punct::LBrace)),
                b'}' => tok!(Tok::Punct(Punct::RBrace)),
                b']' => tok!(Tok::Punct(Punct::RBracket)),
                b';' => tok!(Tok::Punct(Punct::Semicolon)),
                b':' => tok!(Tok::Punct(Punct::Colon)),
                b',' => tok!(Tok::Punct(Punct::Comma)),

                b'=' => {
                    if self.try_eat(b'=') { tok!(Tok::Punct(Punct::EqEq)); }
                    tok!(Tok::Punct(Punct::Eq));
                }
                b'~' => {
                    if self.try_eat(b'=') { tok!(Tok::Punct(Punct::TildeEq)); }
                    let _ = self.report.error(begin..self.pos(), m::UnexpectedChar {}).done();
                    tok!(Tok::Error);
                }
                b'<' => {
                    if self.try_eat(b'=') { tok!(Tok::Punct(Punct::LtEq)); }
                    tok!(Tok::Punct(Punct::Lt));
                }
                b'>' => {
                    if self.try_eat(b'=') { tok!(Tok::Punct(Punct::GtEq)); }
                    tok!(Tok::Punct(Punct::Gt));
                }

                b'.' => {
                    if self.try_eat(b'.') {
                        if self.try_eat(b'.') { tok!(Tok::Punct(Punct::DotDotDot)); }
                        tok!(Tok::Punct(Punct::DotDot));
                    }
                    if self.peek().map_or(false, is_digit) {
                        // a fraction without the integral part, e.g. `.25`
                        match self.scan_number(b'.') {
                            Some(v) => tok!(Tok::Num(v)),
                            None => {
                                let _ = self.report.error(begin..self.pos(),
                                                          m::InvalidNumber {}).done();
                                tok!(Tok::Error);
                            }
                        }
                    }
                    tok!(Tok::Punct(Punct::Dot));
                }

                b'[' => {
                    if self.peek() == Some(b'[') || self.peek() == Some(b'=') {
                        match self.scan_long_bracket(begin, &m::PrematureEofInLongString {}) {
                            Some(s) => tok!(Tok::Str(s)),
                            None => tok!(Tok::Error),
                        }
                    }
                    tok!(Tok::Punct(Punct::LBracket));
                }

                q @ b'"' | q @ b'\'' => {
                    match self.scan_string(q, begin) {
                        Some(s) => tok!(Tok::Str(s)),
                        None => tok!(Tok::Error),
                    }
                }

                c if is_digit(c) => {
                    match self.scan_number(c) {
                        Some(v) => tok!(Tok::Num(v)),
                        None => {
                            let _ = self.report.error(begin..self.pos(),
                                                      m::InvalidNumber {}).done();
                            tok!(Tok::Error);
                        }
                    }
                }

                c if is_name_start(c) => {
                    let nameoff = self.off - 1;
                    self.scan_while(is_name_cont);
                    let name = ::std::str::from_utf8(&self.data[nameoff..self.off])
                                          .expect("names are ASCII");
                    if let Some(keyword) = Keyword::from(name) {
                        tok!(Tok::Keyword(keyword));
                    }
                    tok!(Tok::Name(name.to_owned()));
                }

                _ => {
                    let _ = self.report.error(begin..self.pos(), m::UnexpectedChar {}).done();
                    tok!(Tok::Error);
                }
            }
        }
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Spanned<Tok>;

    fn next(&mut self) -> Option<Spanned<Tok>> {
        if self.eof {
            return None;
        }
        Some(self.next_token())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tyfun_env::{Source, SourceFile};
    use tyfun_diag::{CollectedReport, Locale};

    fn lex(s: &str) -> Vec<Tok> {
        let mut source = Source::new();
        let span = source.add(SourceFile::from_string("<test>".into(), s.into()));
        let data = source.slice_from_span(span).unwrap();
        let report = CollectedReport::new(Locale::dummy());
        Lexer::new(data, span.begin(), &report).map(|tok| tok.base).collect()
    }

    #[test]
    fn test_tokens() {
        assert_eq!(lex("local x = 42"),
                   vec![Tok::Keyword(Keyword::Local), Tok::Name("x".into()),
                        Tok::Punct(Punct::Eq), Tok::Num(42.0), Tok::EOF]);
        assert_eq!(lex("a .. b ... 0x10 .5"),
                   vec![Tok::Name("a".into()), Tok::Punct(Punct::DotDot),
                        Tok::Name("b".into()), Tok::Punct(Punct::DotDotDot),
                        Tok::Num(16.0), Tok::Num(0.5), Tok::EOF]);
        assert_eq!(lex("t:is('table') ~= true"),
                   vec![Tok::Name("t".into()), Tok::Punct(Punct::Colon),
                        Tok::Name("is".into()), Tok::Punct(Punct::LParen),
                        Tok::Str("table".into()), Tok::Punct(Punct::RParen),
                        Tok::Punct(Punct::TildeEq), Tok::Keyword(Keyword::True), Tok::EOF]);
    }

    #[test]
    fn test_strings() {
        assert_eq!(lex(r#""a\nb""#), vec![Tok::Str("a\nb".into()), Tok::EOF]);
        assert_eq!(lex(r#"'\65\66\67'"#), vec![Tok::Str("ABC".into()), Tok::EOF]);
        assert_eq!(lex("[[long\nstring]]"), vec![Tok::Str("long\nstring".into()), Tok::EOF]);
        assert_eq!(lex("[==[a]=]b]==]"), vec![Tok::Str("a]=]b".into()), Tok::EOF]);
        assert_eq!(lex("[[\nskipped]]"), vec![Tok::Str("skipped".into()), Tok::EOF]);
    }

    #[test]
    fn test_comments() {
        assert_eq!(lex("a -- comment\nb"),
                   vec![Tok::Name("a".into()), Tok::Name("b".into()), Tok::EOF]);
        assert_eq!(lex("a --[[ long\ncomment ]] b"),
                   vec![Tok::Name("a".into()), Tok::Name("b".into()), Tok::EOF]);
    }
}
