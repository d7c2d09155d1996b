//! Compile-time unit safety for the electrical quantities in the bus table.
//!
//! The engine moves constantly between MW/Mvar (table side) and per-unit
//! (solver side), and between degrees (table side) and radians (math side).
//! Raw `f64` everywhere makes it far too easy to hand a Mvar column to a MW
//! slot or to call `sin` on degrees. These newtype wrappers catch that class
//! of mistake at compile time; inside the numerical kernels everything is
//! unwrapped to plain `f64` once, at a single boundary.
//!
//! All types are `#[repr(transparent)]`, so the wrappers cost nothing at
//! runtime.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Implements the shared arithmetic surface for a unit newtype.
macro_rules! impl_unit_ops {
    ($type:ty, $unit_name:literal) => {
        impl Add for $type {
            type Output = Self;
            fn add(self, rhs: Self) -> Self::Output {
                Self(self.0 + rhs.0)
            }
        }

        impl Sub for $type {
            type Output = Self;
            fn sub(self, rhs: Self) -> Self::Output {
                Self(self.0 - rhs.0)
            }
        }

        impl Neg for $type {
            type Output = Self;
            fn neg(self) -> Self::Output {
                Self(-self.0)
            }
        }

        impl Mul<f64> for $type {
            type Output = Self;
            fn mul(self, rhs: f64) -> Self::Output {
                Self(self.0 * rhs)
            }
        }

        impl Mul<$type> for f64 {
            type Output = $type;
            fn mul(self, rhs: $type) -> Self::Output {
                <$type>::new(self * rhs.0)
            }
        }

        impl Div<f64> for $type {
            type Output = Self;
            fn div(self, rhs: f64) -> Self::Output {
                Self(self.0 / rhs)
            }
        }

        impl Div<$type> for $type {
            type Output = f64;
            fn div(self, rhs: $type) -> Self::Output {
                self.0 / rhs.0
            }
        }

        impl std::fmt::Display for $type {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{:.4} {}", self.0, $unit_name)
            }
        }

        impl $type {
            /// Create a new value
            #[inline]
            pub const fn new(value: f64) -> Self {
                Self(value)
            }

            /// Get the raw numeric value
            #[inline]
            pub const fn value(self) -> f64 {
                self.0
            }

            /// Absolute value
            #[inline]
            pub fn abs(self) -> Self {
                Self(self.0.abs())
            }

            /// Check if value is finite
            #[inline]
            pub fn is_finite(self) -> bool {
                self.0.is_finite()
            }

            /// Minimum of two values
            #[inline]
            pub fn min(self, other: Self) -> Self {
                Self(self.0.min(other.0))
            }

            /// Maximum of two values
            #[inline]
            pub fn max(self, other: Self) -> Self {
                Self(self.0.max(other.0))
            }

            /// Clamp value to range
            #[inline]
            pub fn clamp(self, min: Self, max: Self) -> Self {
                Self(self.0.clamp(min.0, max.0))
            }
        }

        impl std::iter::Sum for $type {
            fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
                Self(iter.map(|x| x.0).sum())
            }
        }

        impl<'a> std::iter::Sum<&'a $type> for $type {
            fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
                Self(iter.map(|x| x.0).sum())
            }
        }
    };
}

/// Active power in megawatts (MW)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Megawatts(pub f64);

impl_unit_ops!(Megawatts, "MW");

/// Reactive power in megavolt-amperes reactive (Mvar)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Megavars(pub f64);

impl_unit_ops!(Megavars, "Mvar");

/// Apparent power in megavolt-amperes (MVA)
///
/// Magnitude of complex power: S = √(P² + Q²).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct MegavoltAmperes(pub f64);

impl_unit_ops!(MegavoltAmperes, "MVA");

impl Megawatts {
    /// Compute apparent power given reactive power: S = √(P² + Q²)
    #[inline]
    pub fn apparent_power(self, q: Megavars) -> MegavoltAmperes {
        MegavoltAmperes((self.0.powi(2) + q.0.powi(2)).sqrt())
    }
}

/// Voltage magnitude in per-unit (pu)
///
/// Normalized to the system base; normal operating range is roughly
/// 0.95 - 1.05 pu.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct PerUnit(pub f64);

impl_unit_ops!(PerUnit, "pu");

impl PerUnit {
    /// One per-unit (nominal voltage)
    pub const ONE: Self = Self(1.0);

    /// Zero per-unit
    pub const ZERO: Self = Self(0.0);
}

/// Angle in radians
///
/// The natural unit for the trigonometric work inside the solver.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Radians(pub f64);

impl_unit_ops!(Radians, "rad");

/// Angle in degrees
///
/// The unit used in input tables and human-facing output.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Degrees(pub f64);

impl_unit_ops!(Degrees, "°");

impl Radians {
    /// Convert to degrees
    #[inline]
    pub fn to_degrees(self) -> Degrees {
        Degrees(self.0 * 180.0 / std::f64::consts::PI)
    }

    /// Sine of the angle
    #[inline]
    pub fn sin(self) -> f64 {
        self.0.sin()
    }

    /// Cosine of the angle
    #[inline]
    pub fn cos(self) -> f64 {
        self.0.cos()
    }

    /// Zero radians
    pub const ZERO: Self = Self(0.0);
}

impl Degrees {
    /// Convert to radians
    #[inline]
    pub fn to_radians(self) -> Radians {
        Radians(self.0 * std::f64::consts::PI / 180.0)
    }

    /// Zero degrees
    pub const ZERO: Self = Self(0.0);
}
