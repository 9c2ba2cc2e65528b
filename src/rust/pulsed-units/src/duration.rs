// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use num_traits::{AsPrimitive, Float};
use std::fmt::{self, Debug, Display, Formatter};
use std::iter::Sum;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// A duration tagged with its unit.
///
/// # Type Parameter
/// - `U`: The unit of the value (a zero-sized marker type)
/// - `T`: The underlying value (typically `f64`)
///
/// # Examples
/// ```rust
/// use pulsed_units::duration::seconds;
///
/// let tau = seconds(500e-9);
/// assert_eq!((tau * 2.0).value(), 1e-6);
/// ```
#[derive(Clone, Copy, Default)]
pub struct Duration<U, T = f64> {
    value: T,
    unit: U,
}

impl<U, T: Copy> Duration<U, T> {
    pub fn value(&self) -> T {
        self.value
    }
}

impl<U: Default, T: Float> Duration<U, T> {
    pub fn zero() -> Self {
        Duration {
            value: T::zero(),
            unit: U::default(),
        }
    }

    pub fn is_negative(&self) -> bool {
        self.value < T::zero()
    }

    pub fn max(self, other: Self) -> Self {
        if other.value > self.value { other } else { self }
    }
}

impl<U, T: Float> PartialEq for Duration<U, T> {
    fn eq(&self, other: &Self) -> bool {
        // +0.0 and -0.0 are the same duration
        (self.value.is_zero() && other.value.is_zero()) || self.value == other.value
    }
}

impl<U, T: Float> PartialOrd for Duration<U, T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        if self == other {
            return Some(std::cmp::Ordering::Equal);
        }
        self.value.partial_cmp(&other.value)
    }
}

impl<U, T: Debug> Debug for Duration<U, T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Duration")
            .field("value", &self.value)
            .field("unit", &std::any::type_name::<U>())
            .finish()
    }
}

impl<U: Copy, T: Add<Output = T> + Copy> Add for Duration<U, T> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Duration {
            value: self.value + rhs.value,
            unit: self.unit,
        }
    }
}

impl<U: Copy, T: Sub<Output = T> + Copy> Sub for Duration<U, T> {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Duration {
            value: self.value - rhs.value,
            unit: self.unit,
        }
    }
}

impl<U: Copy, T: Mul<Output = T> + Copy> Mul<T> for Duration<U, T> {
    type Output = Self;

    fn mul(self, rhs: T) -> Self::Output {
        Duration {
            value: self.value * rhs,
            unit: self.unit,
        }
    }
}

impl<U: Copy, T: Div<Output = T> + Copy> Div<T> for Duration<U, T> {
    type Output = Self;

    fn div(self, rhs: T) -> Self::Output {
        Duration {
            value: self.value / rhs,
            unit: self.unit,
        }
    }
}

impl<U: Copy, T: Neg<Output = T> + Copy> Neg for Duration<U, T> {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Duration {
            value: -self.value,
            unit: self.unit,
        }
    }
}

impl<U: Copy + Default, T: Float> Sum for Duration<U, T> {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), |acc, d| acc + d)
    }
}

fn round_to_significant_digits(x: f64, n: u32) -> f64 {
    if x == 0.0 {
        0.0
    } else {
        let order = x.abs().log10().floor();
        let scale = 10f64.powf((n as f64) - 1.0 - order);
        (x * scale).round() / scale
    }
}

impl<U, T> Display for Duration<U, T>
where
    T: Display + Debug + AsPrimitive<f64> + Float,
    U: Display,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            Display::fmt(&self.value, f)?;
        } else {
            // Debug formatting picks scientific notation for lab-scale values
            // (ns, us); rounding hides accumulated floating point noise.
            let significand_digits = (-T::epsilon().log10() - T::one()).as_() as u32;
            let value = round_to_significant_digits(self.value.as_(), significand_digits);
            Debug::fmt(&value, f)?;
        }
        write!(f, " ")?;
        self.unit.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Seconds;

impl Display for Seconds {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "s")
    }
}

impl<U: Default, T: Float> From<T> for Duration<U, T> {
    fn from(value: T) -> Self {
        Duration {
            value,
            unit: U::default(),
        }
    }
}

impl<U> From<Duration<U, f64>> for f64 {
    fn from(duration: Duration<U, f64>) -> Self {
        duration.value
    }
}

pub const fn seconds<T>(value: T) -> Duration<Seconds, T> {
    Duration {
        value,
        unit: Seconds,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", seconds(500e-9)), "5e-7 s");
        assert_eq!(format!("{}", seconds(1.1500000000000002e-6)), "1.15e-6 s");
        assert_eq!(format!("{:#}", seconds(2.0)), "2 s");
    }

    #[test]
    fn test_signed_zero_is_equal() {
        assert_eq!(seconds(0.0), seconds(-0.0));
        assert!(!seconds(-0.0).is_negative());
        assert!(seconds(-1e-9).is_negative());
    }

    #[test]
    fn test_arithmetic() {
        let rabi = seconds(100e-9);
        assert_eq!(rabi / 2.0, seconds(50e-9));
        assert_eq!(rabi - rabi / 2.0, seconds(50e-9));
        assert_eq!(-rabi + rabi, Duration::zero());
        let total: Duration<Seconds> = [seconds(1e-6), seconds(2e-6)].into_iter().sum();
        assert_eq!(total, seconds(3e-6));
    }

    #[test]
    fn test_max_and_ordering() {
        assert!(seconds(1e-6) < seconds(2e-6));
        assert_eq!(seconds(-1.0).max(Duration::zero()), seconds(0.0));
        assert_eq!(seconds(3.0).max(seconds(1.0)), seconds(3.0));
    }
}
