//! Time coordinates used throughout the song model.
//!
//! [`Tick`] is the raw integer chart unit. The real-valued coordinates
//! ([`Beat`], [`Second`], [`Measure`], [`Fretbar`], [`OdBeat`]) are distinct
//! newtypes that never convert implicitly; crossing between them goes
//! through a [`crate::tempomap::TempoMap`]. Each real coordinate supports
//! same-type addition and subtraction, scaling by an `f64`, and division by
//! its own type yielding a plain ratio.

use std::fmt;
use std::ops::{Add, AddAssign, Div, Mul, MulAssign, Sub, SubAssign};

const MS_PER_MINUTE: f64 = 60_000.0;

/// A position in ticks, the raw chart unit.
///
/// A chart is quantised at `resolution` ticks per quarter note.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tick(pub i32);

impl Tick {
    /// Returns the contained tick count.
    #[must_use]
    pub const fn value(self) -> i32 {
        self.0
    }
}

impl Add for Tick {
    type Output = Tick;

    fn add(self, rhs: Tick) -> Tick {
        Tick(self.0 + rhs.0)
    }
}

impl AddAssign for Tick {
    fn add_assign(&mut self, rhs: Tick) {
        self.0 += rhs.0;
    }
}

impl Sub for Tick {
    type Output = Tick;

    fn sub(self, rhs: Tick) -> Tick {
        Tick(self.0 - rhs.0)
    }
}

impl SubAssign for Tick {
    fn sub_assign(&mut self, rhs: Tick) {
        self.0 -= rhs.0;
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

macro_rules! real_coordinate {
    ($(#[$attr:meta])* $name:ident) => {
        $(#[$attr])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        pub struct $name(pub f64);

        impl $name {
            /// Returns the contained coordinate value.
            #[must_use]
            pub const fn value(self) -> f64 {
                self.0
            }
        }

        impl Add for $name {
            type Output = $name;

            fn add(self, rhs: $name) -> $name {
                $name(self.0 + rhs.0)
            }
        }

        impl AddAssign for $name {
            fn add_assign(&mut self, rhs: $name) {
                self.0 += rhs.0;
            }
        }

        impl Sub for $name {
            type Output = $name;

            fn sub(self, rhs: $name) -> $name {
                $name(self.0 - rhs.0)
            }
        }

        impl SubAssign for $name {
            fn sub_assign(&mut self, rhs: $name) {
                self.0 -= rhs.0;
            }
        }

        impl Mul<f64> for $name {
            type Output = $name;

            fn mul(self, rhs: f64) -> $name {
                $name(self.0 * rhs)
            }
        }

        impl MulAssign<f64> for $name {
            fn mul_assign(&mut self, rhs: f64) {
                self.0 *= rhs;
            }
        }

        impl Div for $name {
            type Output = f64;

            fn div(self, rhs: $name) -> f64 {
                self.0 / rhs.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

real_coordinate! {
    /// A position in beats: ticks divided by the resolution.
    Beat
}

real_coordinate! {
    /// Wall-clock time in seconds from the start of the song.
    Second
}

real_coordinate! {
    /// A position in measures, accumulated over time-signature regions.
    ///
    /// One measure spans `numerator * (4 / denominator)` beats.
    Measure
}

real_coordinate! {
    /// A position in fretbars, accumulated at `denominator / 4` per beat.
    Fretbar
}

real_coordinate! {
    /// A position in overdrive beats.
    ///
    /// When explicit overdrive-beat ticks exist, coordinate `i` lies at
    /// `i / 4`; otherwise the coordinate scales like a measure.
    OdBeat
}

impl Beat {
    /// Converts at a fixed tempo given in millibeats per minute.
    #[must_use]
    pub fn to_second(self, millibeats_per_minute: i64) -> Second {
        Second(self.0 * MS_PER_MINUTE / millibeats_per_minute as f64)
    }

    /// Converts at `rate` fretbars per beat.
    #[must_use]
    pub fn to_fretbar(self, rate: f64) -> Fretbar {
        Fretbar(self.0 * rate)
    }

    /// Converts at `beats_per_measure` beats per measure.
    #[must_use]
    pub fn to_measure(self, beats_per_measure: f64) -> Measure {
        Measure(self.0 / beats_per_measure)
    }
}

impl Second {
    /// Converts at a fixed tempo given in millibeats per minute.
    #[must_use]
    pub fn to_beat(self, millibeats_per_minute: i64) -> Beat {
        Beat(self.0 * millibeats_per_minute as f64 / MS_PER_MINUTE)
    }
}

impl Fretbar {
    /// Converts at `rate` fretbars per beat.
    #[must_use]
    pub fn to_beat(self, rate: f64) -> Beat {
        Beat(self.0 / rate)
    }
}

impl Measure {
    /// Converts at `beats_per_measure` beats per measure.
    #[must_use]
    pub fn to_beat(self, beats_per_measure: f64) -> Beat {
        Beat(self.0 * beats_per_measure)
    }
}

impl OdBeat {
    /// Converts at `rate` beats per overdrive-beat unit.
    #[must_use]
    pub fn to_beat(self, rate: f64) -> Beat {
        Beat(self.0 * rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_arithmetic() {
        assert_eq!(Tick(768) - Tick(384), Tick(384));
        assert_eq!(Tick(100) + Tick(28), Tick(128));
    }

    #[test]
    fn beat_second_round_trip_at_fixed_tempo() {
        let beat = Beat(3.5);
        let second = beat.to_second(120_000);
        assert!((second.value() - 1.75).abs() < 1e-9);
        assert!((second.to_beat(120_000).value() - 3.5).abs() < 1e-9);
    }

    #[test]
    fn ratio_division() {
        assert!((Measure(1.5) / Measure(0.5) - 3.0).abs() < 1e-9);
    }
}
