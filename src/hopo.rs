//! HOPO threshold policies.

use crate::time::Tick;

/// How the maximum gap between automatic hammer-on/pull-off notes is
/// chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum HopoThresholdType {
    /// Derive the gap from the chart resolution.
    Resolution,
    /// Use the explicit frequency carried alongside.
    HopoFrequency,
    /// An eighth note, rounded up.
    EighthNote,
}

/// A HOPO threshold policy plus its explicit frequency, when used.
///
/// The resolution policy intentionally differs between the two text and
/// binary formats for compatibility with existing charts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HopoThreshold {
    /// The active policy.
    pub threshold_type: HopoThresholdType,
    /// The gap used by [`HopoThresholdType::HopoFrequency`].
    pub hopo_frequency: Tick,
}

impl Default for HopoThreshold {
    fn default() -> Self {
        Self {
            threshold_type: HopoThresholdType::Resolution,
            hopo_frequency: Tick(0),
        }
    }
}

impl HopoThreshold {
    const DEFAULT_HOPO_GAP: i32 = 65;
    const DEFAULT_RESOLUTION: i32 = 192;

    /// The maximum HOPO gap for a chart file at `resolution`.
    #[must_use]
    pub fn chart_max_hopo_gap(&self, resolution: i32) -> Tick {
        match self.threshold_type {
            HopoThresholdType::HopoFrequency => self.hopo_frequency,
            HopoThresholdType::EighthNote => Tick((resolution + 3) / 2),
            HopoThresholdType::Resolution => {
                Tick((Self::DEFAULT_HOPO_GAP * resolution) / Self::DEFAULT_RESOLUTION)
            }
        }
    }

    /// The maximum HOPO gap for a MIDI file at `resolution`.
    #[must_use]
    pub fn midi_max_hopo_gap(&self, resolution: i32) -> Tick {
        match self.threshold_type {
            HopoThresholdType::HopoFrequency => self.hopo_frequency,
            HopoThresholdType::EighthNote => Tick((resolution + 3) / 2),
            HopoThresholdType::Resolution => Tick(resolution / 3 + 1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_policy_differs_between_formats() {
        let threshold = HopoThreshold::default();

        assert_eq!(threshold.chart_max_hopo_gap(192), Tick(65));
        assert_eq!(threshold.midi_max_hopo_gap(192), Tick(65));
        assert_eq!(threshold.chart_max_hopo_gap(480), Tick(162));
        assert_eq!(threshold.midi_max_hopo_gap(480), Tick(161));
    }

    #[test]
    fn explicit_frequency_wins() {
        let threshold = HopoThreshold {
            threshold_type: HopoThresholdType::HopoFrequency,
            hopo_frequency: Tick(170),
        };

        assert_eq!(threshold.chart_max_hopo_gap(192), Tick(170));
        assert_eq!(threshold.midi_max_hopo_gap(480), Tick(170));
    }
}
