//! Exact rational arithmetic.
//!
//! [`Rational`] wraps an arbitrary-precision [`BigRational`], so sums,
//! products, and quotients of prices and inventories are exact and
//! reproducible across machines. The single inexact operation is
//! [`Rational::exp`], computed with an integer Taylor series and truncated
//! to [`EXP_DECIMALS`] decimal places.
//!
//! Conversions from vendor floats and chain decimal strings happen at the
//! boundary through [`FromStr`]; nothing inside the core touches `f64`.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use std::str::FromStr;

use num_bigint::BigInt;
use num_integer::Integer;
use num_rational::BigRational;
use num_traits::{One, Signed, ToPrimitive, Zero};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::constants::{DISPLAY_DECIMALS, EXP_DECIMALS, EXP_UNDERFLOW, EXP_WORK_DECIMALS};
use crate::error::ParseRationalError;

/// Largest decimal exponent accepted by the parser (`1e±400`).
const MAX_PARSE_EXPONENT: i64 = 400;

/// An exact signed rational number.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Rational(BigRational);

fn pow10(exp: u32) -> BigInt {
    num_traits::pow(BigInt::from(10u32), exp as usize)
}

impl Rational {
    pub fn zero() -> Self {
        Self(BigRational::zero())
    }

    pub fn one() -> Self {
        Self(BigRational::one())
    }

    /// `numer / denom`, or `None` when `denom` is zero.
    pub fn from_ratio(numer: i128, denom: i128) -> Option<Self> {
        if denom == 0 {
            return None;
        }
        Some(Self(BigRational::new(BigInt::from(numer), BigInt::from(denom))))
    }

    /// `p / 100`.
    pub fn percent(p: i64) -> Self {
        Self(BigRational::new(BigInt::from(p), BigInt::from(100)))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_negative()
    }

    pub fn is_positive(&self) -> bool {
        self.0.is_positive()
    }

    pub fn abs(&self) -> Self {
        Self(self.0.abs())
    }

    pub fn numer(&self) -> &BigInt {
        self.0.numer()
    }

    pub fn denom(&self) -> &BigInt {
        self.0.denom()
    }

    /// `self / rhs`, or `None` when `rhs` is zero.
    pub fn checked_div(&self, rhs: &Rational) -> Option<Self> {
        if rhs.is_zero() {
            return None;
        }
        Some(Self(&self.0 / &rhs.0))
    }

    /// `1 / self`, or `None` when `self` is zero.
    pub fn recip(&self) -> Option<Self> {
        Rational::one().checked_div(self)
    }

    /// Largest integer `≤ self`.
    pub fn floor_int(&self) -> BigInt {
        self.0.floor().to_integer()
    }

    /// Smallest integer `≥ self`.
    pub fn ceil_int(&self) -> BigInt {
        self.0.ceil().to_integer()
    }

    /// `⌊self⌋` as a `u128`, or `None` if negative or out of range.
    pub fn floor_u128(&self) -> Option<u128> {
        self.floor_int().to_u128()
    }

    /// `⌈self⌉` as a `u128`, or `None` if negative or out of range.
    pub fn ceil_u128(&self) -> Option<u128> {
        self.ceil_int().to_u128()
    }

    /// Round toward negative infinity to `decimals` decimal places.
    pub fn truncate(&self, decimals: u32) -> Self {
        let scale = pow10(decimals);
        let scaled = (&self.0 * BigRational::from_integer(scale.clone())).floor().to_integer();
        Self(BigRational::new(scaled, scale))
    }

    /// `e^self`, truncated to [`EXP_DECIMALS`] decimal places.
    ///
    /// The series runs on integers scaled by `10^EXP_WORK_DECIMALS`, so the
    /// result depends only on the input. Negative arguments are evaluated as
    /// `1 / e^|x|`; anything below `-EXP_UNDERFLOW` is exactly zero.
    pub fn exp(&self) -> Self {
        if self.is_zero() {
            return Self::one();
        }
        let negative = self.is_negative();
        let magnitude = self.abs();
        if negative && magnitude > Rational::from(EXP_UNDERFLOW) {
            return Self::zero();
        }

        let scale = pow10(EXP_WORK_DECIMALS);
        let x = (&magnitude.0 * BigRational::from_integer(scale.clone()))
            .floor()
            .to_integer();

        let mut term = scale.clone();
        let mut sum = scale.clone();
        let mut k: u64 = 1;
        loop {
            term = term * &x / &scale / BigInt::from(k);
            if term.is_zero() {
                break;
            }
            sum += &term;
            k += 1;
        }

        let value = if negative {
            BigRational::new(scale, sum)
        } else {
            BigRational::new(sum, scale)
        };
        Self(value).truncate(EXP_DECIMALS)
    }
}

impl Default for Rational {
    fn default() -> Self {
        Self::zero()
    }
}

impl fmt::Debug for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rational({self})")
    }
}

/// Decimal rendering, exact when the expansion terminates within
/// [`DISPLAY_DECIMALS`] places and truncated toward zero otherwise.
impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let denom = self.0.denom();
        let magnitude = self.0.numer().abs();
        let (int_part, mut rem) = magnitude.div_rem(denom);

        let mut frac = String::new();
        for _ in 0..DISPLAY_DECIMALS {
            if rem.is_zero() {
                break;
            }
            rem *= 10u32;
            let (digit, next) = rem.div_rem(denom);
            frac.push_str(&digit.to_string());
            rem = next;
        }
        let frac = frac.trim_end_matches('0');

        if self.is_negative() && !(int_part.is_zero() && frac.is_empty()) {
            f.write_str("-")?;
        }
        write!(f, "{int_part}")?;
        if !frac.is_empty() {
            write!(f, ".{frac}")?;
        }
        Ok(())
    }
}

fn parse_digits(s: &str) -> Result<BigInt, ParseRationalError> {
    let unsigned = s.strip_prefix(['-', '+']).unwrap_or(s);
    if unsigned.is_empty() || !unsigned.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseRationalError::Invalid(s.to_string()));
    }
    BigInt::from_str(s).map_err(|_| ParseRationalError::Invalid(s.to_string()))
}

/// Accepts integers (`12`), decimals (`-0.5`), scientific notation
/// (`1.5e-3`), and fractions (`3/4`).
impl FromStr for Rational {
    type Err = ParseRationalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ParseRationalError::Empty);
        }

        if let Some((n, d)) = s.split_once('/') {
            let numer = parse_digits(n.trim())?;
            let denom = parse_digits(d.trim())?;
            if denom.is_zero() {
                return Err(ParseRationalError::ZeroDenominator);
            }
            return Ok(Self(BigRational::new(numer, denom)));
        }

        let (mantissa, exponent) = match s.find(['e', 'E']) {
            Some(idx) => {
                let exp: i64 = s[idx + 1..]
                    .parse()
                    .map_err(|_| ParseRationalError::Invalid(s.to_string()))?;
                (&s[..idx], exp)
            }
            None => (s, 0),
        };
        if exponent.abs() > MAX_PARSE_EXPONENT {
            return Err(ParseRationalError::Invalid(s.to_string()));
        }

        let (negative, unsigned) = match mantissa.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, mantissa.strip_prefix('+').unwrap_or(mantissa)),
        };
        let (int_part, frac_part) = unsigned.split_once('.').unwrap_or((unsigned, ""));
        let joined = format!("{int_part}{frac_part}");
        if joined.is_empty() || !joined.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseRationalError::Invalid(s.to_string()));
        }
        let mut numer = parse_digits(&joined)?;
        if negative {
            numer = -numer;
        }

        let shift = exponent - frac_part.len() as i64;
        let value = if shift >= 0 {
            BigRational::from_integer(numer * pow10(shift as u32))
        } else {
            BigRational::new(numer, pow10((-shift) as u32))
        };
        Ok(Self(value))
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for Rational {
            fn from(v: $t) -> Self {
                Self(BigRational::from_integer(BigInt::from(v)))
            }
        })*
    };
}

impl_from_int!(u32, u64, u128, i32, i64, i128);

impl From<BigInt> for Rational {
    fn from(v: BigInt) -> Self {
        Self(BigRational::from_integer(v))
    }
}

macro_rules! forward_binop {
    ($imp:ident, $method:ident) => {
        impl $imp for Rational {
            type Output = Rational;
            fn $method(self, rhs: Rational) -> Rational {
                Rational(self.0.$method(rhs.0))
            }
        }
        impl $imp<&Rational> for Rational {
            type Output = Rational;
            fn $method(self, rhs: &Rational) -> Rational {
                Rational(self.0.$method(&rhs.0))
            }
        }
        impl $imp<Rational> for &Rational {
            type Output = Rational;
            fn $method(self, rhs: Rational) -> Rational {
                Rational((&self.0).$method(rhs.0))
            }
        }
        impl $imp<&Rational> for &Rational {
            type Output = Rational;
            fn $method(self, rhs: &Rational) -> Rational {
                Rational((&self.0).$method(&rhs.0))
            }
        }
    };
}

forward_binop!(Add, add);
forward_binop!(Sub, sub);
forward_binop!(Mul, mul);

impl AddAssign<&Rational> for Rational {
    fn add_assign(&mut self, rhs: &Rational) {
        self.0 += &rhs.0;
    }
}

impl SubAssign<&Rational> for Rational {
    fn sub_assign(&mut self, rhs: &Rational) {
        self.0 -= &rhs.0;
    }
}

impl Neg for Rational {
    type Output = Rational;
    fn neg(self) -> Rational {
        Rational(-self.0)
    }
}

impl Neg for &Rational {
    type Output = Rational;
    fn neg(self) -> Rational {
        Rational(-&self.0)
    }
}

impl Sum for Rational {
    fn sum<I: Iterator<Item = Rational>>(iter: I) -> Self {
        iter.fold(Rational::zero(), |acc, x| acc + x)
    }
}

impl<'a> Sum<&'a Rational> for Rational {
    fn sum<I: Iterator<Item = &'a Rational>>(iter: I) -> Self {
        iter.fold(Rational::zero(), |acc, x| acc + x)
    }
}

/// Serialized through `Display`: 18 decimal places, the resolution of an
/// on-chain `Decimal`.
impl Serialize for Rational {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

struct RationalVisitor;

impl Visitor<'_> for RationalVisitor {
    type Value = Rational;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a decimal string or number")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Rational, E> {
        v.parse().map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Rational, E> {
        Ok(Rational::from(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Rational, E> {
        Ok(Rational::from(v))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Rational, E> {
        if !v.is_finite() {
            return Err(E::custom("non-finite number"));
        }
        // Shortest round-trip rendering, so 0.1 becomes exactly 1/10.
        format!("{v}").parse().map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for Rational {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(RationalVisitor)
    }
}
