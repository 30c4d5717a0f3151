//! Coarse per-type flags.
//!
//! The flags of a type value summarize which base kinds of values can appear
//! anywhere in it, looking through unions, intersections and negations
//! (but not into table or function internals). They drive the testability
//! check for negation.

bitflags! {
    pub struct Flags: u16 {
        const T_NONE     = 0b000_0000_0000;
        const T_NIL      = 0b000_0000_0001;
        const T_BOOLEAN  = 0b000_0000_0010;
        const T_NUMBER   = 0b000_0000_0100;
        const T_STRING   = 0b000_0000_1000;
        const T_TABLE    = 0b000_0001_0000;
        const T_FUNCTION = 0b000_0010_0000;
        const T_CLASS    = 0b000_0100_0000;
        const T_ANY      = 0b000_1000_0000;
        const T_UNKNOWN  = 0b001_0000_0000;
        const T_NEVER    = 0b010_0000_0000;
        const T_NEGATION = 0b100_0000_0000;

        /// Kinds with a runtime test operator, so their negation is checkable.
        const T_TESTABLE = Self::T_NIL.bits | Self::T_BOOLEAN.bits |
                           Self::T_NUMBER.bits | Self::T_STRING.bits;

        /// Kinds without a runtime test; negating these is rejected.
        const T_STRUCTURAL = Self::T_TABLE.bits | Self::T_FUNCTION.bits |
                             Self::T_CLASS.bits;
    }
}

impl Flags {
    pub fn is_testable(&self) -> bool {
        !self.intersects(Flags::T_STRUCTURAL)
    }
}

#[test]
fn test_flags() {
    assert!(Flags::T_NIL.is_testable());
    assert!((Flags::T_STRING | Flags::T_NUMBER).is_testable());
    assert!(!(Flags::T_STRING | Flags::T_TABLE).is_testable());
    assert!(!Flags::T_CLASS.is_testable());
}
