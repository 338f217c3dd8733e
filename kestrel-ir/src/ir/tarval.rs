//! Target values: exact arithmetic on abstract values of a given mode.
//!
//! A `Tarval` is the value of a `Const` node and the currency of constant
//! folding: a bit pattern together with the mode that says how to interpret
//! it. All operations are exact for the mode's arithmetic; integer modes
//! wrap in two's complement, float modes follow IEEE 754. `Tarval` is a
//! small `Copy` value and derives `Eq`/`Hash` from its bits, so equality of
//! tarvals is identity of the abstract value.
//!
//! Operations that receive operands of different modes, or that are not
//! defined for the mode (dividing memory tokens, say), return the `BAD`
//! tarval instead of panicking; the optimizer treats `BAD` as "don't fold".

use crate::ir::modes::{self, Arithmetic, Mode};
use core::fmt;

bitflags! {
    /// The relation of two values, as a set of the four elementary outcomes.
    ///
    /// A comparison evaluates to exactly one of `EQUAL`, `LESS`, `GREATER`
    /// or `UNORDERED`; a `Cmp` node's relation attribute is a *set* of those
    /// outcomes, and the comparison holds when the actual outcome is in the
    /// set. Composing the four bits yields the 16 canonical relations.
    pub struct Relation: u8 {
        /// The values are equal.
        const EQUAL = 0b0001;
        /// The first value is less than the second.
        const LESS = 0b0010;
        /// The first value is greater than the second.
        const GREATER = 0b0100;
        /// The values are unordered (float NaN operands).
        const UNORDERED = 0b1000;

        /// Never true.
        const FALSE = 0;
        /// Less or equal.
        const LESS_EQUAL = Self::LESS.bits | Self::EQUAL.bits;
        /// Greater or equal.
        const GREATER_EQUAL = Self::GREATER.bits | Self::EQUAL.bits;
        /// Less or greater: ordered and not equal.
        const LESS_GREATER = Self::LESS.bits | Self::GREATER.bits;
        /// Less, equal or greater: ordered.
        const LESS_EQUAL_GREATER = Self::LESS.bits | Self::EQUAL.bits | Self::GREATER.bits;
        /// Unordered or equal.
        const UNORDERED_EQUAL = Self::UNORDERED.bits | Self::EQUAL.bits;
        /// Unordered or less.
        const UNORDERED_LESS = Self::UNORDERED.bits | Self::LESS.bits;
        /// Unordered, less or equal.
        const UNORDERED_LESS_EQUAL =
            Self::UNORDERED.bits | Self::LESS.bits | Self::EQUAL.bits;
        /// Unordered or greater.
        const UNORDERED_GREATER = Self::UNORDERED.bits | Self::GREATER.bits;
        /// Unordered, greater or equal.
        const UNORDERED_GREATER_EQUAL =
            Self::UNORDERED.bits | Self::GREATER.bits | Self::EQUAL.bits;
        /// Not equal (unordered, less or greater).
        const NOT_EQUAL = Self::UNORDERED.bits | Self::LESS.bits | Self::GREATER.bits;
        /// Always true.
        const TRUE = 0b1111;
    }
}

impl Relation {
    /// The relation that holds with swapped operands: `a R b` iff
    /// `b R.inversed() a`.
    pub fn inversed(self) -> Relation {
        let mut r = self & (Relation::EQUAL | Relation::UNORDERED);
        if self.contains(Relation::LESS) {
            r |= Relation::GREATER;
        }
        if self.contains(Relation::GREATER) {
            r |= Relation::LESS;
        }
        r
    }

    /// The complementary relation: holds exactly when `self` does not.
    pub fn negated(self) -> Relation {
        self ^ Relation::TRUE
    }
}

/// An abstract target value.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct Tarval {
    mode: Mode,
    bits: u64,
}

/// The tarval returned by operations that are undefined for their operands.
pub const BAD: Tarval = Tarval {
    mode: modes::BAD,
    bits: 0,
};

/// The boolean tarval `true`.
pub const TRUE: Tarval = Tarval {
    mode: modes::B,
    bits: 1,
};

/// The boolean tarval `false`.
pub const FALSE: Tarval = Tarval {
    mode: modes::B,
    bits: 0,
};

fn mask(mode: Mode) -> u64 {
    let bits = mode.bits();
    if bits >= 64 {
        u64::max_value()
    } else {
        (1u64 << bits) - 1
    }
}

impl Tarval {
    /// Create a tarval of an integer, boolean or reference mode from a
    /// signed value, wrapping to the mode's width.
    pub fn new_int(mode: Mode, value: i64) -> Tarval {
        debug_assert!(
            mode.is_int() || mode.is_reference() || mode == modes::B,
            "new_int on mode {}",
            mode
        );
        Tarval {
            mode,
            bits: (value as u64) & mask(mode),
        }
    }

    /// Create a tarval from an unsigned value, wrapping to the mode's width.
    pub fn new_uint(mode: Mode, value: u64) -> Tarval {
        debug_assert!(mode.is_int() || mode.is_reference() || mode == modes::B);
        Tarval {
            mode,
            bits: value & mask(mode),
        }
    }

    /// Create an `F64` tarval.
    pub fn new_f64(value: f64) -> Tarval {
        Tarval {
            mode: modes::F64,
            bits: value.to_bits(),
        }
    }

    /// Create an `F32` tarval.
    pub fn new_f32(value: f32) -> Tarval {
        Tarval {
            mode: modes::F32,
            bits: u64::from(value.to_bits()),
        }
    }

    /// Create a boolean tarval.
    pub fn new_bool(value: bool) -> Tarval {
        if value {
            TRUE
        } else {
            FALSE
        }
    }

    /// Create a tarval from a raw bit pattern, masked to the mode width.
    pub fn from_bits(mode: Mode, bits: u64) -> Tarval {
        Tarval {
            mode,
            bits: bits & mask(mode),
        }
    }

    /// The mode of this tarval.
    pub fn mode(self) -> Mode {
        self.mode
    }

    /// The raw bit pattern.
    pub fn bits(self) -> u64 {
        self.bits
    }

    /// Is this the `BAD` sentinel?
    pub fn is_bad(self) -> bool {
        self.mode == modes::BAD
    }

    /// The value interpreted as a signed integer, sign-extended from the
    /// mode width.
    pub fn as_i64(self) -> i64 {
        let bits = self.mode.bits();
        if bits == 0 || bits >= 64 {
            self.bits as i64
        } else {
            let shift = 64 - bits;
            ((self.bits << shift) as i64) >> shift
        }
    }

    /// The value interpreted as an unsigned integer.
    pub fn as_u64(self) -> u64 {
        self.bits
    }

    /// The value as `f64`, for float modes.
    pub fn as_f64(self) -> f64 {
        match self.mode {
            modes::F64 => f64::from_bits(self.bits),
            modes::F32 => f64::from(f32::from_bits(self.bits as u32)),
            _ => f64::NAN,
        }
    }

    /// Is this the zero/null value of its mode?
    pub fn is_null(self) -> bool {
        match self.mode.arithmetic() {
            Arithmetic::TwosComplement => self.bits == 0,
            Arithmetic::Ieee754 => self.as_f64() == 0.0,
            Arithmetic::None => self.mode == modes::B && self.bits == 0,
        }
    }

    /// Is this the one value of its mode?
    pub fn is_one(self) -> bool {
        match self.mode.arithmetic() {
            Arithmetic::TwosComplement => self.bits == 1,
            Arithmetic::Ieee754 => self.as_f64() == 1.0,
            Arithmetic::None => self.mode == modes::B && self.bits == 1,
        }
    }

    /// Is every bit of the mode set?
    pub fn is_all_one(self) -> bool {
        self.mode.arithmetic() == Arithmetic::TwosComplement && self.bits == mask(self.mode)
    }

    fn binop_modes_ok(self, other: Tarval) -> bool {
        self.mode == other.mode && self.mode.arithmetic() != Arithmetic::None
    }

    fn from_float(mode: Mode, value: f64) -> Tarval {
        match mode {
            modes::F64 => Tarval::new_f64(value),
            modes::F32 => Tarval::new_f32(value as f32),
            _ => BAD,
        }
    }

    fn int_binop<F: FnOnce(u64, u64) -> u64>(self, other: Tarval, f: F) -> Tarval {
        Tarval {
            mode: self.mode,
            bits: f(self.bits, other.bits) & mask(self.mode),
        }
    }

    /// Addition, wrapping for integers.
    pub fn add(self, other: Tarval) -> Tarval {
        if !self.binop_modes_ok(other) {
            return BAD;
        }
        match self.mode.arithmetic() {
            Arithmetic::TwosComplement => self.int_binop(other, u64::wrapping_add),
            Arithmetic::Ieee754 => Tarval::from_float(self.mode, self.as_f64() + other.as_f64()),
            Arithmetic::None => BAD,
        }
    }

    /// Addition with a carry-out probe. The carry is the unsigned overflow
    /// of the mode-width addition.
    pub fn carrying_add(self, other: Tarval) -> (Tarval, bool) {
        if !self.binop_modes_ok(other) || !self.mode.is_int() {
            return (BAD, false);
        }
        let wide = u128::from(self.bits) + u128::from(other.bits);
        let carry = wide > u128::from(mask(self.mode));
        (self.int_binop(other, u64::wrapping_add), carry)
    }

    /// Subtraction, wrapping for integers.
    pub fn sub(self, other: Tarval) -> Tarval {
        if !self.binop_modes_ok(other) {
            return BAD;
        }
        match self.mode.arithmetic() {
            Arithmetic::TwosComplement => self.int_binop(other, u64::wrapping_sub),
            Arithmetic::Ieee754 => Tarval::from_float(self.mode, self.as_f64() - other.as_f64()),
            Arithmetic::None => BAD,
        }
    }

    /// Subtraction with a borrow-out probe.
    pub fn borrowing_sub(self, other: Tarval) -> (Tarval, bool) {
        if !self.binop_modes_ok(other) || !self.mode.is_int() {
            return (BAD, false);
        }
        let borrow = self.bits < other.bits;
        (self.int_binop(other, u64::wrapping_sub), borrow)
    }

    /// Multiplication, wrapping for integers.
    pub fn mul(self, other: Tarval) -> Tarval {
        if !self.binop_modes_ok(other) {
            return BAD;
        }
        match self.mode.arithmetic() {
            Arithmetic::TwosComplement => self.int_binop(other, u64::wrapping_mul),
            Arithmetic::Ieee754 => Tarval::from_float(self.mode, self.as_f64() * other.as_f64()),
            Arithmetic::None => BAD,
        }
    }

    /// The high half of the double-width product.
    pub fn mulh(self, other: Tarval) -> Tarval {
        if !self.binop_modes_ok(other) || !self.mode.is_int() {
            return BAD;
        }
        let bits = self.mode.bits();
        let hi = if self.mode.is_signed() {
            let prod = i128::from(self.as_i64()) * i128::from(other.as_i64());
            (prod >> bits) as u64
        } else {
            let prod = u128::from(self.bits) * u128::from(other.bits);
            (prod >> bits) as u64
        };
        Tarval::from_bits(self.mode, hi)
    }

    /// Division. Integer division by zero yields `BAD`.
    pub fn div(self, other: Tarval) -> Tarval {
        if !self.binop_modes_ok(other) {
            return BAD;
        }
        match self.mode.arithmetic() {
            Arithmetic::TwosComplement => {
                if other.bits == 0 {
                    return BAD;
                }
                let q = if self.mode.is_signed() {
                    self.as_i64().wrapping_div(other.as_i64()) as u64
                } else {
                    self.bits / other.bits
                };
                Tarval::from_bits(self.mode, q)
            }
            Arithmetic::Ieee754 => Tarval::from_float(self.mode, self.as_f64() / other.as_f64()),
            Arithmetic::None => BAD,
        }
    }

    /// Remainder. Integer remainder by zero yields `BAD`.
    pub fn rem(self, other: Tarval) -> Tarval {
        if !self.binop_modes_ok(other) {
            return BAD;
        }
        match self.mode.arithmetic() {
            Arithmetic::TwosComplement => {
                if other.bits == 0 {
                    return BAD;
                }
                let r = if self.mode.is_signed() {
                    self.as_i64().wrapping_rem(other.as_i64()) as u64
                } else {
                    self.bits % other.bits
                };
                Tarval::from_bits(self.mode, r)
            }
            Arithmetic::Ieee754 => Tarval::from_float(self.mode, self.as_f64() % other.as_f64()),
            Arithmetic::None => BAD,
        }
    }

    /// Arithmetic negation.
    pub fn neg(self) -> Tarval {
        match self.mode.arithmetic() {
            Arithmetic::TwosComplement => Tarval::from_bits(self.mode, self.bits.wrapping_neg()),
            Arithmetic::Ieee754 => Tarval::from_float(self.mode, -self.as_f64()),
            Arithmetic::None => BAD,
        }
    }

    /// Absolute value.
    pub fn abs(self) -> Tarval {
        match self.mode.arithmetic() {
            Arithmetic::TwosComplement => {
                if self.mode.is_signed() && self.as_i64() < 0 {
                    self.neg()
                } else {
                    self
                }
            }
            Arithmetic::Ieee754 => Tarval::from_float(self.mode, self.as_f64().abs()),
            Arithmetic::None => BAD,
        }
    }

    fn bit_modes_ok(self, other: Tarval) -> bool {
        self.mode == other.mode && (self.mode.is_int() || self.mode == modes::B)
    }

    /// Bitwise and.
    pub fn and(self, other: Tarval) -> Tarval {
        if !self.bit_modes_ok(other) {
            return BAD;
        }
        self.int_binop(other, |a, b| a & b)
    }

    /// Bitwise or.
    pub fn or(self, other: Tarval) -> Tarval {
        if !self.bit_modes_ok(other) {
            return BAD;
        }
        self.int_binop(other, |a, b| a | b)
    }

    /// Bitwise exclusive or.
    pub fn eor(self, other: Tarval) -> Tarval {
        if !self.bit_modes_ok(other) {
            return BAD;
        }
        self.int_binop(other, |a, b| a ^ b)
    }

    /// Bitwise complement.
    pub fn not(self) -> Tarval {
        if !(self.mode.is_int() || self.mode == modes::B) {
            return BAD;
        }
        Tarval::from_bits(self.mode, !self.bits)
    }

    fn shift_amount(self, amount: Tarval) -> Option<u32> {
        if !amount.mode.is_int() {
            return None;
        }
        let modulo = self.mode.modulo_shift();
        if modulo == 0 {
            return None;
        }
        Some((amount.bits % u64::from(modulo)) as u32)
    }

    /// Shift left. The amount is taken modulo the mode's modulo-shift.
    pub fn shl(self, amount: Tarval) -> Tarval {
        match self.shift_amount(amount) {
            Some(n) => Tarval::from_bits(self.mode, self.bits.wrapping_shl(n)),
            None => BAD,
        }
    }

    /// Logical shift right.
    pub fn shr(self, amount: Tarval) -> Tarval {
        match self.shift_amount(amount) {
            Some(n) => Tarval::from_bits(self.mode, self.bits.wrapping_shr(n)),
            None => BAD,
        }
    }

    /// Arithmetic shift right: the sign bit of the mode is replicated.
    pub fn shrs(self, amount: Tarval) -> Tarval {
        match self.shift_amount(amount) {
            Some(n) => {
                let v = self.as_i64() >> n;
                Tarval::from_bits(self.mode, v as u64)
            }
            None => BAD,
        }
    }

    /// Rotate left within the mode width.
    pub fn rotl(self, amount: Tarval) -> Tarval {
        match self.shift_amount(amount) {
            Some(0) => self,
            Some(n) => {
                let bits = self.mode.bits();
                let v = (self.bits << n | self.bits >> (bits - n)) & mask(self.mode);
                Tarval::from_bits(self.mode, v)
            }
            None => BAD,
        }
    }

    /// Compare two tarvals. Returns exactly one of `EQUAL`, `LESS`,
    /// `GREATER` or `UNORDERED`, or `FALSE` when the operands can't be
    /// compared (different or non-data modes).
    pub fn compare(self, other: Tarval) -> Relation {
        if self.mode != other.mode {
            return Relation::FALSE;
        }
        match self.mode.arithmetic() {
            Arithmetic::TwosComplement => {
                let ord = if self.mode.is_signed() {
                    self.as_i64().cmp(&other.as_i64())
                } else {
                    self.bits.cmp(&other.bits)
                };
                match ord {
                    core::cmp::Ordering::Less => Relation::LESS,
                    core::cmp::Ordering::Equal => Relation::EQUAL,
                    core::cmp::Ordering::Greater => Relation::GREATER,
                }
            }
            Arithmetic::Ieee754 => {
                let (a, b) = (self.as_f64(), other.as_f64());
                if a < b {
                    Relation::LESS
                } else if a > b {
                    Relation::GREATER
                } else if a == b {
                    Relation::EQUAL
                } else {
                    Relation::UNORDERED
                }
            }
            Arithmetic::None => {
                if self.mode == modes::B {
                    if self.bits == other.bits {
                        Relation::EQUAL
                    } else {
                        Relation::LESS_GREATER
                    }
                } else {
                    Relation::FALSE
                }
            }
        }
    }

    /// Convert this tarval to another mode.
    ///
    /// Value preserved when the destination range contains the source value;
    /// otherwise truncated/sign-extended per the modes. Undefined pairs
    /// yield `BAD`.
    pub fn convert_to(self, dest: Mode) -> Tarval {
        if dest == self.mode {
            return self;
        }
        match (self.mode.arithmetic(), dest.arithmetic()) {
            (Arithmetic::TwosComplement, Arithmetic::TwosComplement) => {
                // Extend from the source width using the source signedness,
                // then re-mask to the destination.
                let wide = if self.mode.is_signed() {
                    self.as_i64() as u64
                } else {
                    self.bits
                };
                Tarval::from_bits(dest, wide)
            }
            (Arithmetic::TwosComplement, Arithmetic::Ieee754) => {
                let v = if self.mode.is_signed() {
                    self.as_i64() as f64
                } else {
                    self.bits as f64
                };
                Tarval::from_float(dest, v)
            }
            (Arithmetic::Ieee754, Arithmetic::TwosComplement) => {
                // Truncation toward zero, saturating at the mode bounds.
                let v = self.as_f64();
                if dest.is_signed() {
                    Tarval::new_int(dest, v as i64)
                } else {
                    Tarval::new_uint(dest, v as u64)
                }
            }
            (Arithmetic::Ieee754, Arithmetic::Ieee754) => Tarval::from_float(dest, self.as_f64()),
            _ => {
                if self.mode == modes::B && dest.is_int() {
                    Tarval::from_bits(dest, self.bits)
                } else {
                    BAD
                }
            }
        }
    }
}

impl Mode {
    /// The null (zero) tarval of this mode.
    pub fn null(self) -> Tarval {
        match self.arithmetic() {
            Arithmetic::Ieee754 => Tarval::from_float(self, 0.0),
            _ => Tarval::from_bits(self, 0),
        }
    }

    /// The one tarval of this mode.
    pub fn one(self) -> Tarval {
        match self.arithmetic() {
            Arithmetic::Ieee754 => Tarval::from_float(self, 1.0),
            _ => Tarval::from_bits(self, 1),
        }
    }

    /// The smallest value of this mode.
    pub fn min(self) -> Tarval {
        match self.arithmetic() {
            Arithmetic::TwosComplement => {
                if self.is_signed() {
                    Tarval::from_bits(self, 1u64 << (self.bits() - 1))
                } else {
                    Tarval::from_bits(self, 0)
                }
            }
            Arithmetic::Ieee754 => Tarval::from_float(self, f64::NEG_INFINITY),
            Arithmetic::None => BAD,
        }
    }

    /// The largest value of this mode.
    pub fn max(self) -> Tarval {
        match self.arithmetic() {
            Arithmetic::TwosComplement => {
                if self.is_signed() {
                    Tarval::from_bits(self, mask(self) >> 1)
                } else {
                    Tarval::from_bits(self, mask(self))
                }
            }
            Arithmetic::Ieee754 => Tarval::from_float(self, f64::INFINITY),
            Arithmetic::None => BAD,
        }
    }

    /// The all-bits-set tarval of an integer mode.
    pub fn all_one(self) -> Tarval {
        if self.is_int() || self == modes::B {
            Tarval::from_bits(self, u64::max_value())
        } else {
            BAD
        }
    }
}

impl fmt::Display for Tarval {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.mode.arithmetic() {
            Arithmetic::TwosComplement => {
                if self.mode.is_signed() {
                    write!(f, "{}:{}", self.as_i64(), self.mode)
                } else {
                    write!(f, "{}:{}", self.bits, self.mode)
                }
            }
            Arithmetic::Ieee754 => write!(f, "{}:{}", self.as_f64(), self.mode),
            Arithmetic::None => {
                if self.mode == modes::B {
                    write!(f, "{}", self.bits != 0)
                } else {
                    write!(f, "<{}>", self.mode)
                }
            }
        }
    }
}

impl fmt::Debug for Tarval {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        (self as &dyn fmt::Display).fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::modes;

    #[test]
    fn int_wrap() {
        let a = Tarval::new_int(modes::IS8, 120);
        let b = Tarval::new_int(modes::IS8, 10);
        let s = a.add(b);
        // 130 wraps to -126 in Is8.
        assert_eq!(s.as_i64(), -126);
        assert_eq!(s.mode(), modes::IS8);
    }

    #[test]
    fn mode_mismatch_is_bad() {
        let a = Tarval::new_int(modes::IS32, 1);
        let b = Tarval::new_int(modes::IS64, 1);
        assert!(a.add(b).is_bad());
        assert!(a.mul(b).is_bad());
    }

    #[test]
    fn carry_probe() {
        let a = Tarval::new_uint(modes::IU8, 200);
        let b = Tarval::new_uint(modes::IU8, 100);
        let (sum, carry) = a.carrying_add(b);
        assert_eq!(sum.as_u64(), 44);
        assert!(carry);

        let (_, carry) = a.carrying_add(Tarval::new_uint(modes::IU8, 3));
        assert!(!carry);
    }

    #[test]
    fn division() {
        let a = Tarval::new_int(modes::IS32, -7);
        let b = Tarval::new_int(modes::IS32, 2);
        assert_eq!(a.div(b).as_i64(), -3);
        assert_eq!(a.rem(b).as_i64(), -1);
        assert!(a.div(modes::IS32.null()).is_bad());

        let u = Tarval::new_uint(modes::IU32, 0xffff_fff9);
        assert_eq!(u.div(Tarval::new_uint(modes::IU32, 2)).as_u64(), 0x7fff_fffc);
    }

    #[test]
    fn shifts() {
        let v = Tarval::new_uint(modes::IU8, 0b1000_0001);
        let one = Tarval::new_uint(modes::IU8, 1);
        assert_eq!(v.shl(one).as_u64(), 0b0000_0010);
        assert_eq!(v.shr(one).as_u64(), 0b0100_0000);
        assert_eq!(v.rotl(one).as_u64(), 0b0000_0011);

        let s = Tarval::new_int(modes::IS8, -128);
        assert_eq!(s.shrs(one).as_i64(), -64);

        // Modulo shift: shifting an 8-bit value by 9 shifts by 1.
        let nine = Tarval::new_uint(modes::IU8, 9);
        assert_eq!(v.shl(nine).as_u64(), 0b0000_0010);
    }

    #[test]
    fn mulh() {
        let a = Tarval::new_uint(modes::IU32, 0x8000_0000);
        let b = Tarval::new_uint(modes::IU32, 4);
        assert_eq!(a.mulh(b).as_u64(), 2);

        let a = Tarval::new_int(modes::IS32, -1);
        let b = Tarval::new_int(modes::IS32, 2);
        assert_eq!(a.mulh(b).as_i64(), -1);
    }

    #[test]
    fn compare_ints() {
        let a = Tarval::new_int(modes::IS32, -1);
        let b = Tarval::new_int(modes::IS32, 1);
        assert_eq!(a.compare(b), Relation::LESS);
        assert_eq!(b.compare(a), Relation::GREATER);
        assert_eq!(a.compare(a), Relation::EQUAL);

        // -1 unsigned is the maximum.
        let ua = a.convert_to(modes::IU32);
        let ub = b.convert_to(modes::IU32);
        assert_eq!(ua.compare(ub), Relation::GREATER);
    }

    #[test]
    fn compare_floats() {
        let a = Tarval::new_f64(1.5);
        let b = Tarval::new_f64(2.5);
        let nan = Tarval::new_f64(f64::NAN);
        assert_eq!(a.compare(b), Relation::LESS);
        assert_eq!(a.compare(nan), Relation::UNORDERED);
        assert_eq!(nan.compare(nan), Relation::UNORDERED);
    }

    #[test]
    fn conversions() {
        let v = Tarval::new_int(modes::IS8, -1);
        assert_eq!(v.convert_to(modes::IS32).as_i64(), -1);
        assert_eq!(v.convert_to(modes::IU32).as_u64(), 0xffff_ffff);

        let u = Tarval::new_uint(modes::IU8, 0xff);
        assert_eq!(u.convert_to(modes::IS32).as_i64(), 255);

        let f = Tarval::new_f64(-3.7);
        assert_eq!(f.convert_to(modes::IS32).as_i64(), -3);
        assert_eq!(Tarval::new_int(modes::IS32, 2).convert_to(modes::F64).as_f64(), 2.0);

        assert!(Tarval::new_f64(1.0).convert_to(modes::M).is_bad());
    }

    #[test]
    fn relations() {
        assert_eq!(Relation::LESS.inversed(), Relation::GREATER);
        assert_eq!(Relation::LESS_EQUAL.inversed(), Relation::GREATER_EQUAL);
        assert_eq!(Relation::LESS_EQUAL.negated(), Relation::UNORDERED_GREATER);
        assert_eq!(Relation::TRUE.negated(), Relation::FALSE);
        assert!(Relation::LESS_EQUAL.contains(Relation::EQUAL));
    }

    #[test]
    fn mode_extremes() {
        assert_eq!(modes::IS8.min().as_i64(), -128);
        assert_eq!(modes::IS8.max().as_i64(), 127);
        assert_eq!(modes::IU8.max().as_u64(), 255);
        assert_eq!(modes::IU8.min().as_u64(), 0);
        assert!(modes::IS32.null().is_null());
        assert!(modes::F64.one().is_one());
    }
}
