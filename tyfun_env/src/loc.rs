use std::ops;
use std::cmp;
use std::fmt;
use std::borrow::Borrow;

/// A unit of a source, typically a single file registered to `Source`.
///
/// The unit 0 is reserved as a dummy and the maximal unit is reserved for
/// host-generated ("builtin") locations.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Unit {
    unit: u32,
}

// internal use only, not exposed outside
pub fn unit_from_u32(unit: u32) -> Unit {
    Unit { unit: unit }
}

const BUILTIN_UNIT: u32 = 0xffffffff;

impl Unit {
    pub fn dummy() -> Unit {
        Unit { unit: 0 }
    }

    pub fn builtin() -> Unit {
        Unit { unit: BUILTIN_UNIT }
    }

    pub fn is_dummy(&self) -> bool {
        self.unit == 0
    }

    pub fn is_source_dependent(&self) -> bool {
        self.unit > 0 && self.unit < BUILTIN_UNIT
    }

    pub fn to_usize(&self) -> usize {
        self.unit as usize
    }
}

impl fmt::Debug for Unit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if f.alternate() {
            match self.unit {
                0 => write!(f, "@_"),
                BUILTIN_UNIT => write!(f, "@<builtin>"),
                u => write!(f, "@{}", u),
            }
        } else {
            Ok(())
        }
    }
}

/// A position in a unit, as a byte offset into its data.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Pos {
    unit: u32,
    pos: u32,
}

// internal use only, not exposed outside
pub fn pos_from_u32(unit: Unit, pos: u32) -> Pos {
    Pos { unit: unit.unit, pos: pos }
}

impl Pos {
    pub fn dummy() -> Pos {
        Pos { unit: 0, pos: 0 }
    }

    pub fn builtin() -> Pos {
        Pos { unit: BUILTIN_UNIT, pos: 0 }
    }

    pub fn is_dummy(&self) -> bool {
        self.unit().is_dummy()
    }

    pub fn unit(&self) -> Unit {
        Unit { unit: self.unit }
    }

    pub fn to_usize(&self) -> usize {
        self.pos as usize
    }
}

// offsetting a dummy position gives a dummy position again
impl ops::Add<usize> for Pos {
    type Output = Pos;
    fn add(self, rhs: usize) -> Pos {
        if self.is_dummy() {
            self
        } else {
            Pos { unit: self.unit, pos: self.pos + rhs as u32 }
        }
    }
}

impl fmt::Debug for Pos {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if f.alternate() {
            match self.unit {
                0 => write!(f, "@_"),
                BUILTIN_UNIT => write!(f, "@<builtin>"),
                u => write!(f, "@{}/{}", u, self.pos),
            }
        } else {
            Ok(())
        }
    }
}

/// A span of positions in a single unit, with the end exclusive.
///
/// The span (0, 0, 0) is a dummy and indicates the absence of span infos.
/// A span with equal endpoints denotes a point and can be lifted from `Pos`.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Span {
    unit: u32,
    begin: u32,
    end: u32,
}

// internal use only, not exposed outside
pub fn span_from_u32(unit: Unit, begin: u32, end: u32) -> Span {
    Span { unit: unit.unit, begin: begin, end: end }
}

impl Span {
    pub fn new(begin: Pos, end: Pos) -> Span {
        if begin.is_dummy() || end.is_dummy() {
            Span::dummy()
        } else {
            assert!(begin.unit == end.unit, "Span::new with positions from different units");
            if begin.pos <= end.pos {
                Span { unit: begin.unit, begin: begin.pos, end: end.pos }
            } else {
                // an empty range gets swapped endpoints when the span is built from
                // the first and last token of a possibly empty sequence
                Span { unit: begin.unit, begin: end.pos, end: begin.pos }
            }
        }
    }

    pub fn dummy() -> Span {
        Span { unit: 0, begin: 0, end: 0 }
    }

    pub fn builtin() -> Span {
        Span { unit: BUILTIN_UNIT, begin: 0, end: 0 }
    }

    pub fn is_dummy(&self) -> bool {
        self.unit().is_dummy()
    }

    pub fn unit(&self) -> Unit {
        Unit { unit: self.unit }
    }

    pub fn begin(&self) -> Pos {
        Pos { unit: self.unit, pos: self.begin }
    }

    pub fn end(&self) -> Pos {
        Pos { unit: self.unit, pos: self.end }
    }

    pub fn len(&self) -> usize {
        (self.end - self.begin) as usize
    }

    pub fn contains_or_end(&self, pos: Pos) -> bool {
        self.unit > 0 && self.unit == pos.unit && self.begin <= pos.pos && pos.pos <= self.end
    }
}

impl ops::BitOr for Span {
    type Output = Span;
    fn bitor(self, other: Span) -> Span {
        if self.is_dummy() { return other; }
        if other.is_dummy() { return self; }
        if self.unit == other.unit {
            Span {
                unit: self.unit,
                begin: cmp::min(self.begin, other.begin),
                end: cmp::max(self.end, other.end),
            }
        } else {
            Span::dummy()
        }
    }
}

impl ops::BitOrAssign for Span {
    fn bitor_assign(&mut self, other: Span) { *self = *self | other; }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if f.alternate() {
            match (self.unit, self.begin == self.end) {
                (0, _) => write!(f, "@_"),
                (BUILTIN_UNIT, _) => write!(f, "@<builtin>"),
                (u, true) => write!(f, "@{}/{}", u, self.begin),
                (u, false) => write!(f, "@{}/{}-{}", u, self.begin, self.end),
            }
        } else {
            Ok(())
        }
    }
}

impl From<Pos> for Span {
    fn from(pos: Pos) -> Span {
        Span { unit: pos.unit, begin: pos.pos, end: pos.pos }
    }
}

impl From<ops::Range<Pos>> for Span {
    fn from(range: ops::Range<Pos>) -> Span {
        Span::new(range.start, range.end)
    }
}

/// A value paired with a span.
///
/// Derefs to the base value, so most code can ignore the span.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Spanned<T> {
    pub span: Span,
    pub base: T,
}

impl<T> Spanned<T> {
    pub fn as_ref(&self) -> Spanned<&T> {
        Spanned { span: self.span, base: &self.base }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Spanned<U> {
        Spanned { span: self.span, base: f(self.base) }
    }
}

impl<T> From<Spanned<T>> for Span {
    fn from(spanned: Spanned<T>) -> Span { spanned.span }
}

impl<'a, T> From<&'a Spanned<T>> for Span {
    fn from(spanned: &'a Spanned<T>) -> Span { spanned.span }
}

impl<T> ops::Deref for Spanned<T> {
    type Target = T;
    fn deref(&self) -> &T { &self.base }
}

impl<T> ops::DerefMut for Spanned<T> {
    fn deref_mut(&mut self) -> &mut T { &mut self.base }
}

impl<T> Borrow<T> for Spanned<T> {
    fn borrow(&self) -> &T { &self.base }
}

impl<T: fmt::Display> fmt::Display for Spanned<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.base, f)
    }
}

impl<T: fmt::Debug> fmt::Debug for Spanned<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(&self.base, f)?;
        fmt::Debug::fmt(&self.span, f)?;
        Ok(())
    }
}

/// Attaches a span to any value.
pub trait WithLoc: Sized {
    fn with_loc<Loc: Into<Span>>(self, loc: Loc) -> Spanned<Self> {
        Spanned { span: loc.into(), base: self }
    }

    fn without_loc(self) -> Spanned<Self> {
        Spanned { span: Span::dummy(), base: self }
    }
}

impl<T> WithLoc for T {}

#[test]
fn test_span_union() {
    let unit = unit_from_u32(4);
    let span = |b, e| span_from_u32(unit, b, e);
    assert_eq!(span(1, 3) | span(2, 8), span(1, 8));
    assert_eq!(span(1, 3) | Span::dummy(), span(1, 3));
    assert_eq!(Span::dummy() | span(1, 3), span(1, 3));
    assert_eq!(span(1, 3) | span_from_u32(unit_from_u32(5), 2, 8), Span::dummy());
}
