//! Notes, note tracks and the small structures that annotate them.
//!
//! A [`NoteTrack`] owns the notes of one `(instrument, difficulty)` pair
//! together with its star-power phrases, solos and drum-specific extras. It
//! is created in one shot by a converter; afterwards only the named
//! refinements (`trim_sustains`, `snap_chords`, `disable_dynamics`,
//! `generate_drum_fills`) touch it.

use std::collections::BTreeSet;
use std::sync::Arc;

use bitflags::bitflags;

use crate::song::SongGlobalData;
use crate::tempomap::TempoMap;
use crate::time::{Measure, Second, Tick};

/// Number of lanes a [`Note`] can carry; six-fret tracks use all seven.
pub const MAX_LANES: usize = 7;

/// Five-fret green lane.
pub const FIVE_FRET_GREEN: usize = 0;
/// Five-fret red lane.
pub const FIVE_FRET_RED: usize = 1;
/// Five-fret yellow lane.
pub const FIVE_FRET_YELLOW: usize = 2;
/// Five-fret blue lane.
pub const FIVE_FRET_BLUE: usize = 3;
/// Five-fret orange lane.
pub const FIVE_FRET_ORANGE: usize = 4;
/// Five-fret open-strum lane.
pub const FIVE_FRET_OPEN: usize = 5;

/// Six-fret open-strum lane.
pub const SIX_FRET_OPEN: usize = 0;
/// Six-fret low white lane.
pub const SIX_FRET_WHITE_LOW: usize = 1;
/// Six-fret middle white lane.
pub const SIX_FRET_WHITE_MID: usize = 2;
/// Six-fret high white lane.
pub const SIX_FRET_WHITE_HIGH: usize = 3;
/// Six-fret low black lane.
pub const SIX_FRET_BLACK_LOW: usize = 4;
/// Six-fret middle black lane.
pub const SIX_FRET_BLACK_MID: usize = 5;
/// Six-fret high black lane.
pub const SIX_FRET_BLACK_HIGH: usize = 6;

/// Drum red pad.
pub const DRUM_RED: usize = 0;
/// Drum yellow pad.
pub const DRUM_YELLOW: usize = 1;
/// Drum blue pad.
pub const DRUM_BLUE: usize = 2;
/// Drum green pad.
pub const DRUM_GREEN: usize = 3;
/// Drum kick lane.
pub const DRUM_KICK: usize = 4;
/// Drum expansion kick lane.
pub const DRUM_DOUBLE_KICK: usize = 5;

bitflags! {
    /// Per-note annotations.
    ///
    /// The high bits identify the instrument family the note belongs to.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct NoteFlags: u32 {
        /// The pad is hit as a cymbal under pro-drum rules.
        const CYMBAL = 1 << 0;
        /// A low-velocity (ghost) drum hit.
        const GHOST = 1 << 1;
        /// A max-velocity (accented) drum hit.
        const ACCENT = 1 << 2;
        /// Explicitly forced to be a hammer-on/pull-off.
        const FORCE_HOPO = 1 << 3;
        /// Explicitly forced to be strummed.
        const FORCE_STRUM = 1 << 4;
        /// The natural HOPO state of the note is inverted.
        const FORCE_FLIP = 1 << 5;
        /// A tapped note.
        const TAP = 1 << 6;
        /// The note belongs to a drum track.
        const DRUMS = 1 << 29;
        /// The note belongs to a six-fret guitar track.
        const SIX_FRET_GUITAR = 1 << 30;
        /// The note belongs to a five-fret guitar track.
        const FIVE_FRET_GUITAR = 1 << 31;
    }
}

/// The family of lanes and rules a track follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TrackType {
    /// Standard five-fret guitar-style tracks.
    FiveFret,
    /// Guitar Hero Live six-fret tracks.
    SixFret,
    /// Drum tracks.
    Drums,
    /// Fortnite Festival tracks (five-fret lanes, festival rules).
    FortniteFestival,
}

/// A chart difficulty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Difficulty {
    /// Easy.
    Easy,
    /// Medium.
    Medium,
    /// Hard.
    Hard,
    /// Expert.
    Expert,
}

impl Difficulty {
    /// All difficulties, in ascending order.
    pub const ALL: [Difficulty; 4] = [
        Difficulty::Easy,
        Difficulty::Medium,
        Difficulty::Hard,
        Difficulty::Expert,
    ];
}

/// An instrument a track can be charted for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Instrument {
    /// Lead guitar.
    Guitar,
    /// Co-op guitar.
    GuitarCoop,
    /// Bass guitar.
    Bass,
    /// Rhythm guitar.
    Rhythm,
    /// Keys.
    Keys,
    /// Guitar Hero Live guitar.
    GhlGuitar,
    /// Guitar Hero Live bass.
    GhlBass,
    /// Guitar Hero Live rhythm guitar.
    GhlRhythm,
    /// Guitar Hero Live co-op guitar.
    GhlGuitarCoop,
    /// Drums.
    Drums,
    /// Fortnite Festival guitar.
    FortniteGuitar,
    /// Fortnite Festival bass.
    FortniteBass,
    /// Fortnite Festival drums.
    FortniteDrums,
    /// Fortnite Festival vocals.
    FortniteVocals,
    /// Fortnite Festival pro guitar.
    FortniteProGuitar,
    /// Fortnite Festival pro bass.
    FortniteProBass,
}

/// The set of every chartable instrument.
#[must_use]
pub fn all_instruments() -> BTreeSet<Instrument> {
    [
        Instrument::Guitar,
        Instrument::GuitarCoop,
        Instrument::Bass,
        Instrument::Rhythm,
        Instrument::Keys,
        Instrument::GhlGuitar,
        Instrument::GhlBass,
        Instrument::GhlRhythm,
        Instrument::GhlGuitarCoop,
        Instrument::Drums,
        Instrument::FortniteGuitar,
        Instrument::FortniteBass,
        Instrument::FortniteDrums,
        Instrument::FortniteVocals,
        Instrument::FortniteProGuitar,
        Instrument::FortniteProBass,
    ]
    .into()
}

pub(crate) fn is_six_fret_instrument(instrument: Instrument) -> bool {
    matches!(
        instrument,
        Instrument::GhlGuitar
            | Instrument::GhlBass
            | Instrument::GhlRhythm
            | Instrument::GhlGuitarCoop
    )
}

pub(crate) fn is_fortnite_instrument(instrument: Instrument) -> bool {
    matches!(
        instrument,
        Instrument::FortniteGuitar
            | Instrument::FortniteBass
            | Instrument::FortniteDrums
            | Instrument::FortniteVocals
            | Instrument::FortniteProGuitar
            | Instrument::FortniteProBass
    )
}

/// A single note or chord.
///
/// `lengths[lane]` is `Tick(-1)` when the lane is absent; otherwise the lane
/// is present with that sustain length (possibly zero).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Note {
    /// The note position.
    pub position: Tick,
    /// Per-lane sustain lengths, `Tick(-1)` marking an absent lane.
    pub lengths: [Tick; MAX_LANES],
    /// Annotations on this note.
    pub flags: NoteFlags,
}

impl Default for Note {
    fn default() -> Self {
        Self {
            position: Tick(0),
            lengths: [Tick(-1); MAX_LANES],
            flags: NoteFlags::empty(),
        }
    }
}

impl Note {
    /// The bitmask of lanes present on this note.
    #[must_use]
    pub fn colours(&self) -> u32 {
        let mut mask = 0;
        for (lane, length) in self.lengths.iter().enumerate() {
            if length.value() != -1 {
                mask |= 1 << lane;
            }
        }
        mask
    }
}

/// A star-power phrase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StarPower {
    /// Where the phrase starts.
    pub position: Tick,
    /// How long the phrase lasts.
    pub length: Tick,
}

/// A solo region with its bonus value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Solo {
    /// Where the solo starts.
    pub start: Tick,
    /// Where the solo ends.
    pub end: Tick,
    /// The bonus score for completing the solo.
    pub value: i32,
}

/// A drum-fill (activation) region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DrumFill {
    /// Where the fill starts.
    pub position: Tick,
    /// How long the fill lasts.
    pub length: Tick,
}

/// A disco-flip region on a drum track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DiscoFlip {
    /// Where the flip starts.
    pub position: Tick,
    /// How long the flip lasts.
    pub length: Tick,
}

/// A Big Rock Ending marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BigRockEnding {
    /// Where the ending starts.
    pub start: Tick,
    /// Where the ending ends.
    pub end: Tick,
}

/// A named practice section.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PracticeSection {
    /// The section name as written in the chart.
    pub name: String,
    /// Where the section starts.
    pub start: Tick,
}

/// Player-side drum options that affect which lanes count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DrumSettings {
    /// Whether the expansion double kick lane is played.
    pub enable_double_kick: bool,
    /// Whether the normal kick lane is skipped.
    pub disable_kick: bool,
    /// Whether cymbals are distinguished from toms.
    pub pro_drums: bool,
    /// Whether ghost and accent dynamics are in play.
    pub enable_dynamics: bool,
}

impl DrumSettings {
    /// The defaults: every lane counted, pro cymbals and dynamics on.
    #[must_use]
    pub fn default_settings() -> Self {
        Self {
            enable_double_kick: true,
            disable_kick: false,
            pro_drums: true,
            enable_dynamics: true,
        }
    }

    fn counts_lane(&self, lane: usize) -> bool {
        match lane {
            DRUM_DOUBLE_KICK => self.enable_double_kick,
            DRUM_KICK => !self.disable_kick,
            _ => true,
        }
    }
}

/// The notes of one instrument at one difficulty, with their phrase
/// annotations.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteTrack {
    notes: Vec<Note>,
    sp_phrases: Vec<StarPower>,
    solos: Vec<Solo>,
    drum_fills: Vec<DrumFill>,
    disco_flips: Vec<DiscoFlip>,
    bre: Option<BigRockEnding>,
    track_type: TrackType,
    global_data: Arc<SongGlobalData>,
    max_hopo_gap: Tick,
}

impl NoteTrack {
    const BASE_NOTE_VALUE: i64 = 50;
    const BASE_SUSTAIN_DENSITY: i64 = 25;
    const SOLO_NOTE_VALUE: i32 = 100;

    /// Creates a track with the default HOPO gap for the stored resolution.
    #[must_use]
    pub fn new(
        notes: Vec<Note>,
        sp_phrases: &[StarPower],
        track_type: TrackType,
        global_data: Arc<SongGlobalData>,
    ) -> Self {
        const DEFAULT_HOPO_GAP: i32 = 65;
        const DEFAULT_RESOLUTION: i32 = 192;

        let max_hopo_gap = Tick((DEFAULT_HOPO_GAP * global_data.resolution()) / DEFAULT_RESOLUTION);
        Self::with_max_hopo_gap(notes, sp_phrases, track_type, global_data, max_hopo_gap)
    }

    /// Creates a track with an explicit maximum HOPO gap.
    #[must_use]
    pub fn with_max_hopo_gap(
        mut notes: Vec<Note>,
        sp_phrases: &[StarPower],
        track_type: TrackType,
        global_data: Arc<SongGlobalData>,
        max_hopo_gap: Tick,
    ) -> Self {
        notes.sort_by_key(|note| note.position);

        let mut merged: Vec<Note> = Vec::with_capacity(notes.len());
        for note in notes {
            match merged.last_mut() {
                Some(prev) if prev.position == note.position => {
                    for (lane, &length) in note.lengths.iter().enumerate() {
                        if length.value() != -1 {
                            prev.lengths[lane] = length;
                        }
                    }
                    prev.flags |= note.flags;
                }
                _ => merged.push(note),
            }
        }

        if track_type == TrackType::FiveFret {
            for note in &mut merged {
                let open_length = note.lengths[FIVE_FRET_OPEN];
                if open_length.value() == -1 {
                    continue;
                }
                for lane in 0..FIVE_FRET_OPEN {
                    if note.lengths[lane] == open_length {
                        note.lengths[lane] = Tick(-1);
                    }
                }
            }
        }

        let sp_phrases = normalise_sp_phrases(sp_phrases, &merged);

        Self {
            notes: merged,
            sp_phrases,
            solos: Vec::new(),
            drum_fills: Vec::new(),
            disco_flips: Vec::new(),
            bre: None,
            track_type,
            global_data,
            max_hopo_gap,
        }
    }

    /// The deduplicated, position-sorted notes.
    #[must_use]
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    /// The sorted, non-overlapping star-power phrases.
    #[must_use]
    pub fn sp_phrases(&self) -> &[StarPower] {
        &self.sp_phrases
    }

    /// Stores the solo regions, sorted by start.
    pub fn set_solos(&mut self, mut solos: Vec<Solo>) {
        solos.sort_by_key(|solo| solo.start);
        self.solos = solos;
    }

    /// The solo regions under the given drum settings.
    ///
    /// Non-drum tracks return the stored solos. Drum tracks re-count every
    /// solo against the lanes the settings leave enabled and drop solos
    /// with no notes left.
    #[must_use]
    pub fn solos(&self, drum_settings: &DrumSettings) -> Vec<Solo> {
        if self.track_type != TrackType::Drums {
            return self.solos.clone();
        }
        self.solos
            .iter()
            .filter_map(|solo| {
                let note_count = self
                    .notes
                    .iter()
                    .filter(|note| note.position >= solo.start && note.position < solo.end)
                    .filter(|note| self.note_counts_under(note, drum_settings))
                    .count();
                (note_count > 0).then_some(Solo {
                    start: solo.start,
                    end: solo.end,
                    value: Self::SOLO_NOTE_VALUE * note_count as i32,
                })
            })
            .collect()
    }

    /// The drum-fill regions.
    #[must_use]
    pub fn drum_fills(&self) -> &[DrumFill] {
        &self.drum_fills
    }

    /// Stores the drum-fill regions.
    pub fn set_drum_fills(&mut self, drum_fills: Vec<DrumFill>) {
        self.drum_fills = drum_fills;
    }

    /// The disco-flip regions.
    #[must_use]
    pub fn disco_flips(&self) -> &[DiscoFlip] {
        &self.disco_flips
    }

    /// Stores the disco-flip regions.
    pub fn set_disco_flips(&mut self, disco_flips: Vec<DiscoFlip>) {
        self.disco_flips = disco_flips;
    }

    /// The Big Rock Ending, if the track has one.
    #[must_use]
    pub fn bre(&self) -> Option<&BigRockEnding> {
        self.bre.as_ref()
    }

    /// Stores the Big Rock Ending marker.
    pub fn set_bre(&mut self, bre: Option<BigRockEnding>) {
        self.bre = bre;
    }

    /// Which family of lanes this track uses.
    #[must_use]
    pub fn track_type(&self) -> TrackType {
        self.track_type
    }

    /// The shared song-wide data.
    #[must_use]
    pub fn global_data(&self) -> &SongGlobalData {
        &self.global_data
    }

    /// The maximum tick gap for automatic HOPOs on this track.
    #[must_use]
    pub fn max_hopo_gap(&self) -> Tick {
        self.max_hopo_gap
    }

    pub(crate) fn set_global_data(&mut self, global_data: Arc<SongGlobalData>) {
        self.global_data = global_data;
    }

    fn note_counts_under(&self, note: &Note, settings: &DrumSettings) -> bool {
        note.lengths
            .iter()
            .enumerate()
            .any(|(lane, length)| length.value() != -1 && settings.counts_lane(lane))
    }

    /// The base score with default drum settings.
    #[must_use]
    pub fn base_score(&self) -> i32 {
        self.base_score_with(&DrumSettings::default_settings())
    }

    /// The base score: 50 points per counted lane plus sustain points.
    ///
    /// Sustains score 25 points per beat; a chord whose lanes all share one
    /// length counts it once, a disjoint chord counts each lane. The grand
    /// total is rounded up once at the end.
    #[must_use]
    pub fn base_score_with(&self, drum_settings: &DrumSettings) -> i32 {
        let mut lane_count: i64 = 0;
        let mut sustain_ticks: i64 = 0;

        for note in &self.notes {
            let lengths: Vec<i64> = note
                .lengths
                .iter()
                .enumerate()
                .filter(|&(lane, length)| {
                    length.value() != -1
                        && (self.track_type != TrackType::Drums
                            || drum_settings.counts_lane(lane))
                })
                .map(|(_, length)| i64::from(length.value()))
                .collect();
            if lengths.is_empty() {
                continue;
            }
            lane_count += lengths.len() as i64;
            if lengths.iter().all(|&length| length == lengths[0]) {
                sustain_ticks += lengths[0];
            } else {
                sustain_ticks += lengths.iter().sum::<i64>();
            }
        }

        let resolution = i64::from(self.global_data.resolution());
        let sustain_raw = Self::BASE_SUSTAIN_DENSITY * sustain_ticks;
        let sustain_quot = sustain_raw / resolution;
        let sustain_rem = sustain_raw % resolution;
        let sustain_score = if sustain_rem != 0 && (sustain_rem > 0) == (resolution > 0) {
            sustain_quot + 1
        } else {
            sustain_quot
        };
        (Self::BASE_NOTE_VALUE * lane_count + sustain_score) as i32
    }

    /// Returns a copy with sustains shorter than the resolution-dependent
    /// minimum dropped to zero.
    #[must_use]
    pub fn trim_sustains(&self) -> NoteTrack {
        const SUSTAIN_CUTOFF: i32 = 64;
        const DEFAULT_RESOLUTION: i32 = 192;

        let mut trimmed = self.clone();
        let cutoff = (SUSTAIN_CUTOFF * self.global_data.resolution()) / DEFAULT_RESOLUTION;
        for note in &mut trimmed.notes {
            for length in &mut note.lengths {
                if length.value() != -1 && length.value() < cutoff {
                    *length = Tick(0);
                }
            }
        }
        trimmed
    }

    /// Returns a copy where runs of notes within `snap_gap` of the run head
    /// collapse into a single chord at the earliest position.
    #[must_use]
    pub fn snap_chords(&self, snap_gap: Tick) -> NoteTrack {
        let mut snapped = self.clone();
        let mut notes: Vec<Note> = Vec::with_capacity(self.notes.len());
        for note in &self.notes {
            match notes.last_mut() {
                Some(head) if note.position - head.position <= snap_gap => {
                    for (lane, &length) in note.lengths.iter().enumerate() {
                        if length.value() != -1 {
                            head.lengths[lane] = length;
                        }
                    }
                    head.flags |= note.flags;
                }
                _ => notes.push(*note),
            }
        }
        snapped.notes = notes;
        snapped
    }

    /// Strips ghost and accent dynamics from every note.
    pub fn disable_dynamics(&mut self) {
        for note in &mut self.notes {
            note.flags -= NoteFlags::GHOST | NoteFlags::ACCENT;
        }
    }

    /// Generates one drum fill per note sitting on the four-measure
    /// activation cadence.
    ///
    /// A note produces a fill when a measure boundary lies within 250 ms of
    /// it and the boundary has not been consumed by an earlier fill; the
    /// fill spans the half measure (in seconds) leading up to that
    /// boundary.
    pub fn generate_drum_fills(&mut self, tempo_map: &TempoMap) {
        const FILL_LENIENCY: f64 = 0.25;
        const MEASURES_PER_FILL: f64 = 4.0;

        let mut fills = Vec::new();
        let mut next_fill_measure = 1.0;

        for note in &self.notes {
            let note_seconds = tempo_map.ticks_to_seconds(note.position);
            let note_measures = tempo_map.seconds_to_measures(note_seconds).value();

            let boundary = [note_measures.floor(), note_measures.ceil()]
                .into_iter()
                .filter_map(|candidate| {
                    let candidate_seconds = tempo_map.measures_to_seconds(Measure(candidate));
                    let distance = (candidate_seconds.value() - note_seconds.value()).abs();
                    (distance <= FILL_LENIENCY).then_some((candidate, distance))
                })
                .min_by(|(_, a), (_, b)| a.total_cmp(b));
            let Some((boundary, _)) = boundary else {
                continue;
            };
            if boundary < next_fill_measure {
                continue;
            }

            let end_seconds = tempo_map.measures_to_seconds(Measure(boundary));
            let measure_start_seconds = tempo_map.measures_to_seconds(Measure(boundary - 1.0));
            let half_measure = (end_seconds - measure_start_seconds) * 0.5;
            let start = tempo_map.seconds_to_ticks(Second(
                end_seconds.value() - half_measure.value(),
            ));
            let end = tempo_map.beats_to_ticks(tempo_map.measures_to_beats(Measure(boundary)));
            fills.push(DrumFill {
                position: start,
                length: end - start,
            });
            next_fill_measure = boundary + MEASURES_PER_FILL;
        }

        self.drum_fills = fills;
    }
}

/// Culls noteless phrases, sorts, and splits overlapping neighbours so each
/// phrase ends exactly where the next begins.
fn normalise_sp_phrases(sp_phrases: &[StarPower], notes: &[Note]) -> Vec<StarPower> {
    let mut phrases: Vec<StarPower> = sp_phrases
        .iter()
        .filter(|phrase| {
            let end = phrase.position + phrase.length;
            notes
                .iter()
                .any(|note| note.position >= phrase.position && note.position < end)
        })
        .copied()
        .collect();
    phrases.sort_by_key(|phrase| phrase.position);

    let mut result = Vec::with_capacity(phrases.len());
    let mut iter = phrases.into_iter();
    let Some(mut current) = iter.next() else {
        return result;
    };
    for phrase in iter {
        let current_end = current.position + current.length;
        let phrase_end = phrase.position + phrase.length;
        if phrase.position < current_end {
            let cut = current_end.min(phrase_end);
            let rest_end = current_end.max(phrase_end);
            current.length = cut - current.position;
            if current.length > Tick(0) {
                result.push(current);
            }
            current = StarPower {
                position: cut,
                length: rest_end - cut,
            };
        } else {
            result.push(current);
            current = phrase;
        }
    }
    if current.length > Tick(0) {
        result.push(current);
    }
    result
}

/// Forms solo regions from on/off marker positions, valuing each at 100 per
/// note inside.
///
/// Chart solos include a note exactly on the end marker; MIDI solos do not.
/// On markers inside an open region are folded into it.
pub(crate) fn form_solo_vector(
    solo_ons: &[i32],
    solo_offs: &[i32],
    notes: &[Note],
    track_type: TrackType,
    is_midi: bool,
) -> Vec<Solo> {
    const SOLO_NOTE_VALUE: i32 = 100;

    let mut solos = Vec::new();
    for (start, end) in combine_solo_events(solo_ons, solo_offs) {
        let mut note_count = 0usize;
        let mut positions = BTreeSet::new();
        for note in notes {
            let position = note.position.value();
            if (position >= start && position < end) || (!is_midi && position == end) {
                positions.insert(position);
                note_count += 1;
            }
        }
        let count = if track_type == TrackType::Drums {
            note_count
        } else {
            positions.len()
        };
        if count > 0 {
            solos.push(Solo {
                start: Tick(start),
                end: Tick(end),
                value: SOLO_NOTE_VALUE * count as i32,
            });
        }
    }
    solos
}

/// Pairs solo on/off markers into regions, skipping redundant on markers
/// and off markers with no preceding on.
fn combine_solo_events(ons: &[i32], offs: &[i32]) -> Vec<(i32, i32)> {
    let mut ranges = Vec::new();
    let mut on_index = 0;
    let mut off_index = 0;
    while on_index < ons.len() && off_index < offs.len() {
        if ons[on_index] >= offs[off_index] {
            off_index += 1;
            continue;
        }
        let start = ons[on_index];
        let end = offs[off_index];
        ranges.push((start, end));
        while on_index < ons.len() && ons[on_index] < end {
            on_index += 1;
        }
        off_index += 1;
    }
    ranges
}
