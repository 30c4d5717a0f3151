//! Message localization support.
//!
//! Every message is a struct implementing `Localize`,
//! normally generated with the `define_msg!` macro below.
//! The support is rudimentary but enough to carry messages in two languages.

use std::fmt;
use std::ops;
use std::str;
use std::env;

/// The message locale.
///
/// This is equivalent to a small (up to 8 byte) ASCII string, but normalizes appropriately.
/// It can be derefed to a string slice for matching:
///
/// ```rust
/// # let locale = tyfun_diag::Locale::new("en").unwrap();
/// match &locale[..] {
///     "en" => println!("Hello"),
///     // the locale is always stored in the normalized form, `ko-KR` or `ko_kr` won't match
///     "ko-kr" => println!("안녕하세요"),
///     _ => println!("*unintelligible gibberish*"),
/// }
/// ```
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Locale {
    lang: [u8; 8],
}

impl Locale {
    /// Parses and creates a new message locale.
    ///
    /// The locale identifier should be an IETF language tag restricted to 8 letters,
    /// and gets normalized to lowercased letters separated by `-`.
    pub fn new(locale: &str) -> Option<Locale> {
        // should be 2--8 bytes long
        if locale.len() < 2 || locale.len() > 8 {
            return None;
        }

        // should be letters (normalized to lowercase), `-` or `_` (normalized to `-`)
        let mut lang = [0u8; 8];
        lang[..locale.len()].copy_from_slice(locale.as_bytes());
        for c in &mut lang[..locale.len()] {
            match *c {
                b'a'..=b'z' | b'-' => {}
                b'A'..=b'Z' => *c += 32,
                b'_' => *c = b'-',
                _ => return None,
            }
        }

        // first two letters should be letters
        if !(lang[0].is_ascii_lowercase() && lang[1].is_ascii_lowercase()) {
            return None;
        }

        Some(Locale { lang: lang })
    }

    /// A dummy locale (`xx`) used when no appropriate locale information is available.
    pub fn dummy() -> Locale {
        Locale { lang: *b"xx\0\0\0\0\0\0" }
    }
}

impl<'a> From<&'a str> for Locale {
    fn from(s: &'a str) -> Locale {
        Locale::new(s).expect("invalid locale")
    }
}

impl ops::Deref for Locale {
    type Target = str;

    fn deref(&self) -> &str {
        str::from_utf8(&self.lang).expect("locale is not UTF-8").trim_end_matches('\0')
    }
}

impl fmt::Debug for Locale {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<Locale {}>", &self[..])
    }
}

#[test]
fn test_locale_names() {
    assert!(Locale::new("").is_none());
    assert!(Locale::new("e").is_none());
    assert!(Locale::new("en").is_some());
    assert!(Locale::new("ko").is_some());
    assert!(Locale::new("ko-KR").is_some());
    assert_eq!(Locale::from("ko-KR"), Locale::from("ko_kr"));
    assert_ne!(Locale::from("ko-KR"), Locale::from("ko"));
    assert_ne!(Locale::from("kor"), Locale::from("ko"));
    assert_eq!(Locale::from("KO"), Locale::from("ko"));
    assert!(Locale::new("ko-KR-x-qqq").is_none());
}

/// Any type that can be formatted into a localized text.
pub trait Localize: fmt::Debug {
    fn fmt_localized(&self, f: &mut fmt::Formatter, locale: Locale) -> fmt::Result;
}

impl<'a> Localize for &'a Localize {
    fn fmt_localized(&self, f: &mut fmt::Formatter, locale: Locale) -> fmt::Result {
        (**self).fmt_localized(f, locale)
    }
}

impl<T: fmt::Display + fmt::Debug> Localize for T {
    fn fmt_localized(&self, f: &mut fmt::Formatter, _locale: Locale) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// A helper type for formatting the localized text.
///
/// For example, `format!("{}", Localized::new(&v, locale))` gives a localized string for `v`.
pub struct Localized<'b, T: Localize + ?Sized + 'b> {
    base: &'b T,
    locale: Locale,
}

impl<'b, T: Localize + ?Sized + 'b> Localized<'b, T> {
    pub fn new(base: &'b T, locale: Locale) -> Localized<'b, T> {
        Localized { base: base, locale: locale }
    }
}

impl<'b, T: Localize + ?Sized + 'b> fmt::Display for Localized<'b, T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.base.fmt_localized(f, self.locale)
    }
}

#[macro_export]
#[doc(hidden)]
macro_rules! define_msg_internal {
    // the named-argument list has to be expanded into a single token tree
    // before entering the per-locale repetition, since the locale and field
    // repetitions have different counts;
    // "tt bundling" as in http://stackoverflow.com/a/37754096
    (@gen_match $f:ident, $l:ident; $($locale:pat => $format:tt),*; $tail:tt) => (
        match &$l[..] {
            $($locale => define_msg_internal!(@gen_arm $f; $format; $tail),)*
        }
    );

    (@gen_arm $f:ident; $format:tt; ($($tail:tt)*)) => (
        write!($f, $format $($tail)*)
    );
}

/// A helper macro for defining a localizable message.
///
/// ```rust,ignore
/// define_msg! { pub StructName { param: OtherLocalizableType }:
///     "lang1" => "Some localized string with a parameter {param}",
///     _       => "The default string with a parameter {param}, normally in English",
/// }
/// ```
///
/// Each parameter should be localizable.
/// The parameters can be omitted, and a single lifetime parameter can be given
/// (which covers every message in this codebase).
/// Note that the constructor itself is a struct, so `StructName {}` is required
/// even when there are no message parameters.
#[macro_export]
macro_rules! define_msg {
    ($(#[$meta:meta])* pub $name:ident<$lt:lifetime> { $($fname:ident: $ftype:ty),* $(,)* }:
     $($locale:pat => $format:tt),* $(,)*) => (
        $(#[$meta])*
        #[derive(Debug)]
        pub struct $name<$lt> {
            $(pub $fname: $ftype,)*
        }

        impl<$lt> $crate::Localize for $name<$lt> {
            fn fmt_localized(&self, f: &mut ::std::fmt::Formatter,
                             locale: $crate::Locale) -> ::std::fmt::Result {
                define_msg_internal!(@gen_match f, locale;
                    $($locale => $format),*;
                    ($(, $fname = $crate::Localized::new(&self.$fname, locale))*))
            }
        }
    );

    ($(#[$meta:meta])* pub $name:ident { $($fname:ident: $ftype:ty),* $(,)* }:
     $($locale:pat => $format:tt),* $(,)*) => (
        $(#[$meta])*
        #[derive(Debug)]
        pub struct $name {
            $(pub $fname: $ftype,)*
        }

        impl $crate::Localize for $name {
            fn fmt_localized(&self, f: &mut ::std::fmt::Formatter,
                             locale: $crate::Locale) -> ::std::fmt::Result {
                define_msg_internal!(@gen_match f, locale;
                    $($locale => $format),*;
                    ($(, $fname = $crate::Localized::new(&self.$fname, locale))*))
            }
        }
    );

    ($(#[$meta:meta])* pub $name:ident:
     $($locale:pat => $format:tt),* $(,)*) => (
        define_msg! { $(#[$meta])* pub $name {}: $($locale => $format),* }
    );
}

#[cfg(test)]
mod tests {
    use {Locale, Localize, Localized};

    define_msg! { pub Hello:
        "ko" => "안녕하세요",
        _    => "hello",
    }

    define_msg! { pub Missing<'a> { name: &'a str }:
        "ko" => "`{name}`이 없습니다",
        _    => "`{name}` is missing",
    }

    define_msg! { pub Got { given: usize }:
        "ko" => "{given}개를 받았습니다",
        _    => "got {given} value(s)",
    }

    fn fmt<M: Localize>(msg: M, locale: &str) -> String {
        format!("{}", Localized::new(&msg, Locale::from(locale)))
    }

    #[test]
    fn test_messages_format_per_locale() {
        assert_eq!(fmt(Hello {}, "en"), "hello");
        assert_eq!(fmt(Hello {}, "ko"), "안녕하세요");
        assert_eq!(fmt(Missing { name: "pi" }, "en"), "`pi` is missing");
        assert_eq!(fmt(Missing { name: "pi" }, "ko"), "`pi`이 없습니다");
        assert_eq!(fmt(Got { given: 3 }, "en"), "got 3 value(s)");
        // unlisted locales fall back to the default arm
        assert_eq!(fmt(Got { given: 3 }, "de"), "got 3 value(s)");
    }
}

// XXX won't work well in Windows
fn get_locale_string_from_env() -> Option<String> {
    if let Ok(s) = env::var("LC_ALL") {
        if !s.is_empty() { return Some(s); }
    }
    if let Ok(s) = env::var("LC_MESSAGES") {
        if !s.is_empty() { return Some(s); }
    }
    env::var("LANG").ok()
}

/// Returns a default locale for the current environment, if any.
pub fn get_message_locale() -> Option<Locale> {
    // allow things like `ko_KR.UTF-8`
    get_locale_string_from_env().and_then(|locale| {
        let locale = locale.split('.').next().unwrap_or("");
        Locale::new(locale)
    })
}
