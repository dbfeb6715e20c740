//! The tempo map: a piecewise-linear conversion engine between time
//! coordinates.
//!
//! A [`TempoMap`] is built once from BPM changes, time signatures, optional
//! explicit overdrive-beat ticks and the chart resolution, and is purely
//! functional afterwards. Construction precomputes one table per derived
//! coordinate; every query is a binary search over the relevant table
//! followed by linear interpolation, with rate-based extrapolation past
//! either end.

use crate::error::ParseError;
use crate::time::{Beat, Fretbar, Measure, OdBeat, Second, Tick};

const DEFAULT_BEAT_RATE: f64 = 4.0;
const DEFAULT_MILLIBEATS_PER_MINUTE: i64 = 120_000;
const DEFAULT_FRETBAR_RATE: f64 = 1.0;
const DEFAULT_RESOLUTION: i32 = 192;
const DEFAULT_TIMESIG_DENOMINATOR: f64 = 4.0;
const MS_PER_MINUTE: f64 = 60_000.0;

/// A tempo change.
///
/// Tempi are stored in millibeats per minute so that integer speedup
/// arithmetic stays exact; the wider type leaves room for speedups of
/// already-fast songs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Bpm {
    /// Where the tempo takes effect.
    pub position: Tick,
    /// The tempo in millibeats per minute.
    pub millibeats_per_minute: i64,
}

impl Bpm {
    /// The tempo in beats per minute.
    #[must_use]
    pub fn bpm(&self) -> f64 {
        self.millibeats_per_minute as f64 / 1000.0
    }
}

/// A time-signature change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimeSignature {
    /// Where the signature takes effect.
    pub position: Tick,
    /// Beats per measure numerator.
    pub numerator: i32,
    /// Beat-unit denominator.
    pub denominator: i32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct BeatTimestamp {
    beat: Beat,
    time: Second,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct FretbarTimestamp {
    fretbar: Fretbar,
    beat: Beat,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct MeasureTimestamp {
    measure: Measure,
    beat: Beat,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct OdBeatTimestamp {
    od_beat: OdBeat,
    beat: Beat,
}

/// The conversion engine between ticks, beats, seconds, measures, fretbars
/// and overdrive beats.
///
/// Invariants, established at construction:
/// - `bpms()` is sorted by position, has no duplicate positions, is never
///   empty and always has an entry at tick 0 (synthetic 120 BPM if needed);
/// - `time_sigs()` likewise, with a synthetic 4/4 at tick 0;
/// - all BPM values and time-signature components are positive;
/// - the resolution is positive.
#[derive(Debug, Clone, PartialEq)]
pub struct TempoMap {
    time_sigs: Vec<TimeSignature>,
    bpms: Vec<Bpm>,
    od_beats: Vec<Tick>,
    resolution: i32,

    beat_timestamps: Vec<BeatTimestamp>,
    last_bpm: i64,
    fretbar_timestamps: Vec<FretbarTimestamp>,
    last_fretbar_rate: f64,
    measure_timestamps: Vec<MeasureTimestamp>,
    last_beat_rate: f64,
    od_beat_timestamps: Vec<OdBeatTimestamp>,
    last_od_beat_rate: f64,
}

impl Default for TempoMap {
    fn default() -> Self {
        Self::build(vec![], vec![], vec![], DEFAULT_RESOLUTION)
    }
}

impl TempoMap {
    /// Builds a tempo map, validating and normalising the change lists.
    ///
    /// # Errors
    ///
    /// Fails with a [`ParseError`] on a non-positive resolution, BPM, or
    /// time-signature component.
    pub fn new(
        time_sigs: Vec<TimeSignature>,
        bpms: Vec<Bpm>,
        od_beats: Vec<Tick>,
        resolution: i32,
    ) -> Result<Self, ParseError> {
        if resolution <= 0 {
            return Err(ParseError::NonPositiveResolution);
        }
        if bpms.iter().any(|bpm| bpm.millibeats_per_minute <= 0) {
            return Err(ParseError::NonPositiveBpm);
        }
        if time_sigs
            .iter()
            .any(|ts| ts.numerator <= 0 || ts.denominator <= 0)
        {
            return Err(ParseError::NonPositiveTimeSignature);
        }

        Ok(Self::build(time_sigs, bpms, od_beats, resolution))
    }

    fn build(
        mut time_sigs: Vec<TimeSignature>,
        mut bpms: Vec<Bpm>,
        od_beats: Vec<Tick>,
        resolution: i32,
    ) -> Self {
        bpms.sort_by_key(|bpm| bpm.position);
        let bpms = dedup_changes(
            bpms,
            Bpm {
                position: Tick(0),
                millibeats_per_minute: DEFAULT_MILLIBEATS_PER_MINUTE,
            },
            |bpm| bpm.position,
        );

        time_sigs.sort_by_key(|ts| ts.position);
        let time_sigs = dedup_changes(
            time_sigs,
            TimeSignature {
                position: Tick(0),
                numerator: 4,
                denominator: 4,
            },
            |ts| ts.position,
        );

        let to_beats = |ticks: Tick| Beat(ticks.value() as f64 / resolution as f64);

        let mut beat_timestamps = Vec::with_capacity(bpms.len());
        let mut last_tick = Tick(0);
        let mut last_bpm = DEFAULT_MILLIBEATS_PER_MINUTE;
        let mut last_time = 0.0;
        for bpm in &bpms {
            last_time +=
                to_beats(bpm.position - last_tick).value() * (MS_PER_MINUTE / last_bpm as f64);
            beat_timestamps.push(BeatTimestamp {
                beat: to_beats(bpm.position),
                time: Second(last_time),
            });
            last_bpm = bpm.millibeats_per_minute;
            last_tick = bpm.position;
        }

        let mut fretbar_timestamps = Vec::with_capacity(time_sigs.len());
        let mut measure_timestamps = Vec::with_capacity(time_sigs.len());
        let mut last_tick = Tick(0);
        let mut last_beat_rate = DEFAULT_BEAT_RATE;
        let mut last_fretbar_rate = DEFAULT_FRETBAR_RATE;
        let mut last_fretbar = 0.0;
        let mut last_measure = 0.0;
        for ts in &time_sigs {
            let beat_increment = to_beats(ts.position - last_tick).value();
            last_fretbar += beat_increment * last_fretbar_rate;
            last_measure += beat_increment / last_beat_rate;
            let beat = to_beats(ts.position);
            fretbar_timestamps.push(FretbarTimestamp {
                fretbar: Fretbar(last_fretbar),
                beat,
            });
            measure_timestamps.push(MeasureTimestamp {
                measure: Measure(last_measure),
                beat,
            });
            last_beat_rate = (ts.numerator as f64 * DEFAULT_BEAT_RATE) / ts.denominator as f64;
            last_fretbar_rate = ts.denominator as f64 / DEFAULT_TIMESIG_DENOMINATOR;
            last_tick = ts.position;
        }

        let od_beat_timestamps = if od_beats.is_empty() {
            vec![OdBeatTimestamp {
                od_beat: OdBeat(0.0),
                beat: Beat(0.0),
            }]
        } else {
            od_beats
                .iter()
                .enumerate()
                .map(|(i, &tick)| OdBeatTimestamp {
                    od_beat: OdBeat(i as f64 / DEFAULT_BEAT_RATE),
                    beat: to_beats(tick),
                })
                .collect()
        };

        Self {
            time_sigs,
            bpms,
            od_beats,
            resolution,
            beat_timestamps,
            last_bpm,
            fretbar_timestamps,
            last_fretbar_rate,
            measure_timestamps,
            last_beat_rate,
            od_beat_timestamps,
            last_od_beat_rate: DEFAULT_BEAT_RATE,
        }
    }

    /// The time-signature changes, sorted and deduplicated.
    #[must_use]
    pub fn time_sigs(&self) -> &[TimeSignature] {
        &self.time_sigs
    }

    /// The tempo changes, sorted and deduplicated.
    #[must_use]
    pub fn bpms(&self) -> &[Bpm] {
        &self.bpms
    }

    /// The chart resolution in ticks per quarter note.
    #[must_use]
    pub fn resolution(&self) -> i32 {
        self.resolution
    }

    /// Returns the tempo map for a speedup of `speed`% (normal speed is
    /// 100).
    ///
    /// BPMs are scaled by `speed / 100` with integer arithmetic and the
    /// second-axis timestamps divided by the same factor; time signatures
    /// and the measure and fretbar tables are unaffected. `speed` must be
    /// positive; `speedup(100)` returns an equivalent map.
    #[must_use]
    pub fn speedup(&self, speed: i32) -> TempoMap {
        const DEFAULT_SPEED: i64 = 100;

        let mut speedup = self.clone();
        for bpm in &mut speedup.bpms {
            bpm.millibeats_per_minute = (bpm.millibeats_per_minute * i64::from(speed)) / DEFAULT_SPEED;
        }

        let timestamp_factor = DEFAULT_SPEED as f64 / f64::from(speed);
        for timestamp in &mut speedup.beat_timestamps {
            timestamp.time *= timestamp_factor;
        }
        speedup.last_bpm = (speedup.last_bpm * i64::from(speed)) / DEFAULT_SPEED;

        speedup
    }

    /// Converts ticks to beats: exact division by the resolution.
    #[must_use]
    pub fn ticks_to_beats(&self, ticks: Tick) -> Beat {
        Beat(ticks.value() as f64 / self.resolution as f64)
    }

    /// Converts beats to ticks, truncating to the resolution grid.
    #[must_use]
    pub fn beats_to_ticks(&self, beats: Beat) -> Tick {
        Tick((beats.value() * self.resolution as f64) as i32)
    }

    /// Converts fretbars to beats.
    #[must_use]
    pub fn fretbars_to_beats(&self, fretbars: Fretbar) -> Beat {
        let table = &self.fretbar_timestamps;
        let index = table.partition_point(|ts| ts.fretbar < fretbars);
        if index == table.len() {
            let back = &table[table.len() - 1];
            return back.beat + (fretbars - back.fretbar).to_beat(self.last_fretbar_rate);
        }
        if index == 0 {
            let front = &table[0];
            return front.beat - (front.fretbar - fretbars).to_beat(DEFAULT_FRETBAR_RATE);
        }
        let prev = &table[index - 1];
        let next = &table[index];
        prev.beat
            + (next.beat - prev.beat) * ((fretbars - prev.fretbar) / (next.fretbar - prev.fretbar))
    }

    /// Converts measures to beats.
    #[must_use]
    pub fn measures_to_beats(&self, measures: Measure) -> Beat {
        let table = &self.measure_timestamps;
        let index = table.partition_point(|ts| ts.measure < measures);
        if index == table.len() {
            let back = &table[table.len() - 1];
            return back.beat + (measures - back.measure).to_beat(self.last_beat_rate);
        }
        if index == 0 {
            let front = &table[0];
            return front.beat - (front.measure - measures).to_beat(DEFAULT_BEAT_RATE);
        }
        let prev = &table[index - 1];
        let next = &table[index];
        prev.beat
            + (next.beat - prev.beat) * ((measures - prev.measure) / (next.measure - prev.measure))
    }

    /// Converts overdrive beats to beats.
    #[must_use]
    pub fn od_beats_to_beats(&self, od_beats: OdBeat) -> Beat {
        let table = &self.od_beat_timestamps;
        let index = table.partition_point(|ts| ts.od_beat < od_beats);
        if index == table.len() {
            let back = &table[table.len() - 1];
            return back.beat + (od_beats - back.od_beat).to_beat(self.last_od_beat_rate);
        }
        if index == 0 {
            let front = &table[0];
            return front.beat - (front.od_beat - od_beats).to_beat(DEFAULT_BEAT_RATE);
        }
        let prev = &table[index - 1];
        let next = &table[index];
        prev.beat
            + (next.beat - prev.beat) * ((od_beats - prev.od_beat) / (next.od_beat - prev.od_beat))
    }

    /// Converts seconds to beats.
    #[must_use]
    pub fn seconds_to_beats(&self, seconds: Second) -> Beat {
        let table = &self.beat_timestamps;
        let index = table.partition_point(|ts| ts.time < seconds);
        if index == table.len() {
            let back = &table[table.len() - 1];
            return back.beat + (seconds - back.time).to_beat(self.last_bpm);
        }
        if index == 0 {
            let front = &table[0];
            return front.beat - (front.time - seconds).to_beat(DEFAULT_MILLIBEATS_PER_MINUTE);
        }
        let prev = &table[index - 1];
        let next = &table[index];
        prev.beat + (next.beat - prev.beat) * ((seconds - prev.time) / (next.time - prev.time))
    }

    /// Converts beats to fretbars.
    #[must_use]
    pub fn beats_to_fretbars(&self, beats: Beat) -> Fretbar {
        let table = &self.fretbar_timestamps;
        let index = table.partition_point(|ts| ts.beat < beats);
        if index == table.len() {
            let back = &table[table.len() - 1];
            return back.fretbar + (beats - back.beat).to_fretbar(self.last_fretbar_rate);
        }
        if index == 0 {
            let front = &table[0];
            return front.fretbar - (front.beat - beats).to_fretbar(DEFAULT_FRETBAR_RATE);
        }
        let prev = &table[index - 1];
        let next = &table[index];
        prev.fretbar
            + (next.fretbar - prev.fretbar) * ((beats - prev.beat) / (next.beat - prev.beat))
    }

    /// Converts ticks to fretbars.
    #[must_use]
    pub fn ticks_to_fretbars(&self, ticks: Tick) -> Fretbar {
        self.beats_to_fretbars(self.ticks_to_beats(ticks))
    }

    /// Converts beats to measures.
    #[must_use]
    pub fn beats_to_measures(&self, beats: Beat) -> Measure {
        let table = &self.measure_timestamps;
        let index = table.partition_point(|ts| ts.beat < beats);
        if index == table.len() {
            let back = &table[table.len() - 1];
            return back.measure + (beats - back.beat).to_measure(self.last_beat_rate);
        }
        if index == 0 {
            let front = &table[0];
            return front.measure - (front.beat - beats).to_measure(DEFAULT_BEAT_RATE);
        }
        let prev = &table[index - 1];
        let next = &table[index];
        prev.measure
            + (next.measure - prev.measure) * ((beats - prev.beat) / (next.beat - prev.beat))
    }

    /// Converts seconds to measures.
    #[must_use]
    pub fn seconds_to_measures(&self, seconds: Second) -> Measure {
        self.beats_to_measures(self.seconds_to_beats(seconds))
    }

    /// Converts beats to overdrive beats.
    #[must_use]
    pub fn beats_to_od_beats(&self, beats: Beat) -> OdBeat {
        let table = &self.od_beat_timestamps;
        let index = table.partition_point(|ts| ts.beat < beats);
        if index == table.len() {
            let back = &table[table.len() - 1];
            return back.od_beat
                + OdBeat((beats - back.beat).to_measure(self.last_od_beat_rate).value());
        }
        if index == 0 {
            let front = &table[0];
            return front.od_beat
                - OdBeat((front.beat - beats).to_measure(DEFAULT_BEAT_RATE).value());
        }
        let prev = &table[index - 1];
        let next = &table[index];
        prev.od_beat
            + (next.od_beat - prev.od_beat) * ((beats - prev.beat) / (next.beat - prev.beat))
    }

    /// Converts beats to seconds.
    #[must_use]
    pub fn beats_to_seconds(&self, beats: Beat) -> Second {
        let table = &self.beat_timestamps;
        let index = table.partition_point(|ts| ts.beat < beats);
        if index == table.len() {
            let back = &table[table.len() - 1];
            return back.time + (beats - back.beat).to_second(self.last_bpm);
        }
        if index == 0 {
            let front = &table[0];
            return front.time - (front.beat - beats).to_second(DEFAULT_MILLIBEATS_PER_MINUTE);
        }
        let prev = &table[index - 1];
        let next = &table[index];
        prev.time + (next.time - prev.time) * ((beats - prev.beat) / (next.beat - prev.beat))
    }

    /// Converts measures to seconds.
    #[must_use]
    pub fn measures_to_seconds(&self, measures: Measure) -> Second {
        self.beats_to_seconds(self.measures_to_beats(measures))
    }

    /// Converts ticks to seconds.
    #[must_use]
    pub fn ticks_to_seconds(&self, ticks: Tick) -> Second {
        self.beats_to_seconds(self.ticks_to_beats(ticks))
    }

    /// Converts seconds to ticks.
    #[must_use]
    pub fn seconds_to_ticks(&self, seconds: Second) -> Tick {
        self.beats_to_ticks(self.seconds_to_beats(seconds))
    }

    /// The explicit overdrive-beat ticks this map was built with.
    #[must_use]
    pub fn od_beats(&self) -> &[Tick] {
        &self.od_beats
    }
}

/// Collapses sorted changes so each position appears once (last wins), with
/// `default` standing in at tick 0 when the list does not start there.
fn dedup_changes<T: Copy>(changes: Vec<T>, default: T, position: impl Fn(&T) -> Tick) -> Vec<T> {
    let mut result = Vec::with_capacity(changes.len() + 1);
    let mut prev = default;
    for change in changes {
        if position(&change) != position(&prev) {
            result.push(prev);
        }
        prev = change;
    }
    result.push(prev);
    result
}
