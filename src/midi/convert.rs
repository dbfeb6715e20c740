//! Assigns meaning to decoded MIDI events and assembles a song.
//!
//! The first track supplies the tempo map. Every further track is routed by
//! its name: `BEAT` contributes overdrive-beat ticks, `EVENTS` contributes
//! practice sections, and the `PART ...` names select an instrument family
//! whose note-on/note-off pairs become notes, star-power phrases, solos,
//! drum fills, disco flips and forcing intervals.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::error::ParseError;
use crate::hopo::HopoThreshold;
use crate::interval::IntervalSet;
use crate::midi::decode::{Event, MetaEvent, Midi, MidiTrack, SysexEvent, TimedEvent};
use crate::song::{Metadata, Song, SongGlobalData};
use crate::songparts::{
    BigRockEnding, Difficulty, DiscoFlip, DrumFill, DRUM_BLUE, DRUM_DOUBLE_KICK, DRUM_GREEN,
    DRUM_KICK, DRUM_RED, DRUM_YELLOW, FIVE_FRET_BLUE, FIVE_FRET_GREEN, FIVE_FRET_OPEN,
    FIVE_FRET_ORANGE, FIVE_FRET_RED, FIVE_FRET_YELLOW, Instrument, Note, NoteFlags, NoteTrack,
    PracticeSection, SIX_FRET_BLACK_HIGH, SIX_FRET_BLACK_LOW, SIX_FRET_BLACK_MID, SIX_FRET_OPEN,
    SIX_FRET_WHITE_HIGH, SIX_FRET_WHITE_LOW, SIX_FRET_WHITE_MID, StarPower, TrackType,
    all_instruments, form_solo_vector, is_fortnite_instrument, is_six_fret_instrument,
};
use crate::tempomap::{Bpm, TempoMap, TimeSignature};
use crate::time::Tick;

const NOTE_OFF_ID: u8 = 0x80;
const NOTE_ON_ID: u8 = 0x90;
const UPPER_NIBBLE_MASK: u8 = 0xF0;
const TEXT_EVENT_ID: u8 = 1;
const TRACK_NAME_ID: u8 = 3;

const YELLOW_TOM_ID: u8 = 110;
const BLUE_TOM_ID: u8 = 111;
const GREEN_TOM_ID: u8 = 112;
const SOLO_NOTE_ID: u8 = 103;
const TAP_NOTE_ID: u8 = 104;
const SP_NOTE_ID: u8 = 116;
const DRUM_FILL_ID: u8 = 120;
const BRE_KEY: u8 = 120;

/// An event position paired with its rank in the file.
///
/// Pairing on-events with off-events orders by `(tick, rank)` so an
/// off-event earlier in the stream than an on-event at the same tick is not
/// paired with it.
type RankedTick = (i32, i32);

/// Converts decoded MIDI into a [`Song`] under a set of parse options.
#[derive(Debug, Clone)]
pub struct MidiConverter {
    song_name: String,
    artist: String,
    charter: String,
    hopo_threshold: HopoThreshold,
    permitted_instruments: BTreeSet<Instrument>,
    permit_solos: bool,
}

impl MidiConverter {
    /// Creates a converter carrying the given metadata.
    #[must_use]
    pub fn new(metadata: Metadata) -> Self {
        Self {
            song_name: metadata.name,
            artist: metadata.artist,
            charter: metadata.charter,
            hopo_threshold: HopoThreshold::default(),
            permitted_instruments: all_instruments(),
            permit_solos: true,
        }
    }

    /// Sets the HOPO threshold policy.
    #[must_use]
    pub fn hopo_threshold(mut self, hopo_threshold: HopoThreshold) -> Self {
        self.hopo_threshold = hopo_threshold;
        self
    }

    /// Restricts conversion to the given instruments.
    #[must_use]
    pub fn permit_instruments(mut self, permitted_instruments: BTreeSet<Instrument>) -> Self {
        self.permitted_instruments = permitted_instruments;
        self
    }

    /// Whether solo regions are kept.
    #[must_use]
    pub fn parse_solos(mut self, permit_solos: bool) -> Self {
        self.permit_solos = permit_solos;
        self
    }

    /// Runs the conversion.
    ///
    /// # Errors
    ///
    /// Fails with a [`ParseError`] on a zero resolution, malformed tempo
    /// events, or unmatched note-on events.
    pub fn convert(&self, midi: &Midi) -> Result<Song, ParseError> {
        let resolution = midi.ticks_per_quarter_note;
        if resolution <= 0 {
            return Err(ParseError::NonPositiveResolution);
        }

        let mut global = SongGlobalData::default();
        global.set_is_from_midi(true);
        global.set_resolution(resolution)?;
        global.set_name(self.song_name.clone());
        global.set_artist(self.artist.clone());
        global.set_charter(self.charter.clone());

        let Some(first_track) = midi.tracks.first() else {
            return Ok(Song::with_global_data(Arc::new(global)));
        };
        let mut tempo_map = read_first_midi_track(first_track, resolution)?;

        for track in &midi.tracks {
            match midi_track_name(track).as_deref() {
                Some("BEAT") => global.set_od_beats(od_beats_from_track(track)),
                Some("EVENTS") => {
                    global.set_practice_sections(practice_sections_from_track(track));
                }
                _ => {}
            }
        }
        if !global.od_beats().is_empty() {
            tempo_map = TempoMap::new(
                tempo_map.time_sigs().to_vec(),
                tempo_map.bpms().to_vec(),
                global.od_beats().to_vec(),
                resolution,
            )?;
        }
        global.set_tempo_map(tempo_map);

        let global = Arc::new(global);
        let mut song = Song::with_global_data(Arc::clone(&global));
        for track in &midi.tracks {
            let Some(track_name) = midi_track_name(track) else {
                continue;
            };
            if track_name == "BEAT" || track_name == "EVENTS" {
                continue;
            }
            self.process_instrument_track(&track_name, track, &mut song, &global)?;
        }

        Ok(song)
    }

    fn midi_section_instrument(&self, track_name: &str) -> Option<Instrument> {
        let candidates: &[Instrument] = match track_name {
            "PART GUITAR" => &[Instrument::Guitar, Instrument::FortniteGuitar],
            "T1 GEMS" => &[Instrument::Guitar],
            "PART GUITAR COOP" => &[Instrument::GuitarCoop],
            "PART BASS" => &[Instrument::Bass, Instrument::FortniteBass],
            "PART RHYTHM" => &[Instrument::Rhythm],
            "PART KEYS" => &[Instrument::Keys],
            "PART GUITAR GHL" => &[Instrument::GhlGuitar],
            "PART BASS GHL" => &[Instrument::GhlBass],
            "PART RHYTHM GHL" => &[Instrument::GhlRhythm],
            "PART GUITAR COOP GHL" => &[Instrument::GhlGuitarCoop],
            "PART DRUMS" => &[Instrument::Drums, Instrument::FortniteDrums],
            "PART VOCALS" => &[Instrument::FortniteVocals],
            "PLASTIC GUITAR" => &[Instrument::FortniteProGuitar],
            "PLASTIC BASS" => &[Instrument::FortniteProBass],
            _ => &[],
        };
        candidates
            .iter()
            .copied()
            .find(|instrument| self.permitted_instruments.contains(instrument))
    }

    fn process_instrument_track(
        &self,
        track_name: &str,
        track: &MidiTrack,
        song: &mut Song,
        global: &Arc<SongGlobalData>,
    ) -> Result<(), ParseError> {
        let Some(instrument) = self.midi_section_instrument(track_name) else {
            return Ok(());
        };
        let tracks = if is_fortnite_instrument(instrument) {
            fortnite_note_tracks_from_midi(track, global, self.permit_solos)?
        } else if is_six_fret_instrument(instrument) {
            ghl_note_tracks_from_midi(track, global, &self.hopo_threshold, self.permit_solos)?
        } else if instrument == Instrument::Drums {
            drum_note_tracks_from_midi(track, global, self.permit_solos)?
        } else {
            five_fret_note_tracks_from_midi(track, global, &self.hopo_threshold, self.permit_solos)?
        };
        for (difficulty, note_track) in tracks {
            song.add_note_track(instrument, difficulty, note_track);
        }
        Ok(())
    }
}

fn read_first_midi_track(track: &MidiTrack, resolution: i32) -> Result<TempoMap, ParseError> {
    const SET_TEMPO_ID: u8 = 0x51;
    const TIME_SIG_ID: u8 = 0x58;
    const US_PER_MINUTE: f64 = 60_000_000_000.0;

    let mut tempos = Vec::new();
    let mut time_sigs = Vec::new();
    for event in &track.events {
        let Event::Meta(meta_event) = &event.event else {
            continue;
        };
        match meta_event.kind {
            SET_TEMPO_ID => {
                let [b0, b1, b2, ..] = meta_event.data[..] else {
                    return Err(ParseError::TempoEventTooShort);
                };
                let us_per_quarter =
                    (u32::from(b0) << 16) | (u32::from(b1) << 8) | u32::from(b2);
                tempos.push(Bpm {
                    position: Tick(event.time),
                    millibeats_per_minute: (US_PER_MINUTE / f64::from(us_per_quarter)) as i64,
                });
            }
            TIME_SIG_ID => {
                let [numerator, denominator_power, ..] = meta_event.data[..] else {
                    return Err(ParseError::TimeSigEventTooShort);
                };
                if denominator_power >= 32 {
                    return Err(ParseError::TimeSigDenominatorTooLarge);
                }
                time_sigs.push(TimeSignature {
                    position: Tick(event.time),
                    numerator: i32::from(numerator),
                    denominator: 1 << denominator_power,
                });
            }
            _ => {}
        }
    }

    TempoMap::new(time_sigs, tempos, vec![], resolution)
}

fn midi_track_name(track: &MidiTrack) -> Option<String> {
    track.events.iter().find_map(|event| match &event.event {
        Event::Meta(meta_event) if meta_event.kind == TRACK_NAME_ID => {
            Some(String::from_utf8_lossy(&meta_event.data).into_owned())
        }
        _ => None,
    })
}

fn od_beats_from_track(track: &MidiTrack) -> Vec<Tick> {
    const BEAT_LOW_KEY: u8 = 12;
    const BEAT_HIGH_KEY: u8 = 13;

    let mut od_beats = Vec::new();
    for event in &track.events {
        let Event::Midi(midi_event) = &event.event else {
            continue;
        };
        if midi_event.status & UPPER_NIBBLE_MASK != NOTE_ON_ID || midi_event.data[1] == 0 {
            continue;
        }
        if matches!(midi_event.data[0], BEAT_LOW_KEY | BEAT_HIGH_KEY) {
            od_beats.push(Tick(event.time));
        }
    }
    od_beats
}

fn practice_sections_from_track(track: &MidiTrack) -> Vec<PracticeSection> {
    const PREFIXES: [&[u8]; 3] = [b"[section ", b"[section_", b"[prc_"];

    let mut sections = Vec::new();
    for event in &track.events {
        let Event::Meta(meta_event) = &event.event else {
            continue;
        };
        if meta_event.kind != TEXT_EVENT_ID {
            continue;
        }
        let Some(body) = meta_event.data.strip_suffix(b"]") else {
            continue;
        };
        for prefix in PREFIXES {
            if let Some(name) = body.strip_prefix(prefix) {
                sections.push(PracticeSection {
                    name: String::from_utf8_lossy(name).into_owned(),
                    start: Tick(event.time),
                });
                break;
            }
        }
    }
    sections
}

fn is_five_lane_green_note(event: &TimedEvent) -> bool {
    const GREEN_LANE_KEYS: [u8; 4] = [65, 77, 89, 101];

    let Event::Midi(midi_event) = &event.event else {
        return false;
    };
    let event_type = midi_event.status & UPPER_NIBBLE_MASK;
    if event_type != NOTE_ON_ID && event_type != NOTE_OFF_ID {
        return false;
    }
    GREEN_LANE_KEYS.contains(&midi_event.data[0])
}

fn has_five_lane_green_notes(track: &MidiTrack) -> bool {
    track.events.iter().any(is_five_lane_green_note)
}

fn is_enable_chart_dynamics(event: &TimedEvent) -> bool {
    const ENABLE_DYNAMICS: &[u8] = b"[ENABLE_CHART_DYNAMICS]";

    matches!(
        &event.event,
        Event::Meta(meta_event) if meta_event.kind == TEXT_EVENT_ID && meta_event.data == ENABLE_DYNAMICS
    )
}

fn has_enable_chart_dynamics(track: &MidiTrack) -> bool {
    track.events.iter().any(is_enable_chart_dynamics)
}

const SYSEX_DATA_SIZE: usize = 8;
const SYSEX_DIFF_INDEX: usize = 4;
const SYSEX_ON_INDEX: usize = 6;
const SYSEX_ALL_DIFFICULTIES: u8 = 0xFF;

fn is_open_sysex_event(event: &SysexEvent) -> bool {
    const OPEN_KIND: u8 = 1;

    event.data.len() == SYSEX_DATA_SIZE
        && event.data[0] == 0x50
        && event.data[1] == 0x53
        && event.data[2] == 0
        && event.data[3] == 0
        && event.data[SYSEX_DIFF_INDEX] <= 3
        && event.data[5] == OPEN_KIND
        && event.data[SYSEX_ON_INDEX] <= 1
        && event.data[7] == 0xF7
}

fn is_tap_sysex_event(event: &SysexEvent) -> bool {
    const TAP_KIND: u8 = 4;

    event.data.len() == SYSEX_DATA_SIZE
        && event.data[0] == 0x50
        && event.data[1] == 0x53
        && event.data[2] == 0
        && event.data[3] == 0
        && (event.data[SYSEX_DIFF_INDEX] <= 3
            || event.data[SYSEX_DIFF_INDEX] == SYSEX_ALL_DIFFICULTIES)
        && event.data[5] == TAP_KIND
        && event.data[SYSEX_ON_INDEX] <= 1
        && event.data[7] == 0xF7
}

fn difficulties_from_sysex_diff(diff: u8) -> &'static [Difficulty] {
    match diff {
        0 => &[Difficulty::Easy],
        1 => &[Difficulty::Medium],
        2 => &[Difficulty::Hard],
        3 => &[Difficulty::Expert],
        SYSEX_ALL_DIFFICULTIES => &Difficulty::ALL,
        _ => &[],
    }
}

/// Raw per-channel events of one instrument track, bucketed by meaning.
#[derive(Debug, Default)]
struct InstrumentMidiTrack {
    note_on_events: BTreeMap<(Difficulty, usize, NoteFlags), Vec<RankedTick>>,
    note_off_events: BTreeMap<(Difficulty, usize), Vec<RankedTick>>,
    open_on_events: BTreeMap<Difficulty, Vec<RankedTick>>,
    open_off_events: BTreeMap<Difficulty, Vec<RankedTick>>,
    tap_on_sysex_events: BTreeMap<Difficulty, Vec<RankedTick>>,
    tap_off_sysex_events: BTreeMap<Difficulty, Vec<RankedTick>>,
    yellow_tom_on_events: Vec<RankedTick>,
    yellow_tom_off_events: Vec<RankedTick>,
    blue_tom_on_events: Vec<RankedTick>,
    blue_tom_off_events: Vec<RankedTick>,
    green_tom_on_events: Vec<RankedTick>,
    green_tom_off_events: Vec<RankedTick>,
    solo_on_events: Vec<RankedTick>,
    solo_off_events: Vec<RankedTick>,
    sp_on_events: Vec<RankedTick>,
    sp_off_events: Vec<RankedTick>,
    tap_on_events: Vec<RankedTick>,
    tap_off_events: Vec<RankedTick>,
    fill_on_events: Vec<RankedTick>,
    fill_off_events: Vec<RankedTick>,
    force_hopo_on_events: BTreeMap<Difficulty, Vec<RankedTick>>,
    force_hopo_off_events: BTreeMap<Difficulty, Vec<RankedTick>>,
    force_strum_on_events: BTreeMap<Difficulty, Vec<RankedTick>>,
    force_strum_off_events: BTreeMap<Difficulty, Vec<RankedTick>>,
    disco_flip_on_events: BTreeMap<Difficulty, Vec<RankedTick>>,
    disco_flip_off_events: BTreeMap<Difficulty, Vec<RankedTick>>,
}

fn add_sysex_event(track: &mut InstrumentMidiTrack, event: &SysexEvent, time: i32, rank: i32) {
    if event.data.len() != SYSEX_DATA_SIZE {
        return;
    }
    for &diff in difficulties_from_sysex_diff(event.data[SYSEX_DIFF_INDEX]) {
        if is_open_sysex_event(event) {
            let bucket = if event.data[SYSEX_ON_INDEX] == 0 {
                &mut track.open_off_events
            } else {
                &mut track.open_on_events
            };
            bucket.entry(diff).or_default().push((time, rank));
        } else if is_tap_sysex_event(event) {
            let bucket = if event.data[SYSEX_ON_INDEX] == 0 {
                &mut track.tap_off_sysex_events
            } else {
                &mut track.tap_on_sysex_events
            };
            bucket.entry(diff).or_default().push((time, rank));
        }
    }
}

/// Reads a `[mix <d> drums<n>]` / `[mix <d> drums<n>d]` text meta into the
/// disco-flip buckets.
fn append_disco_flip(
    track: &mut InstrumentMidiTrack,
    meta_event: &MetaEvent,
    time: i32,
    rank: i32,
) {
    const FLIP_START_SIZE: usize = 15;
    const FLIP_END_SIZE: usize = 14;
    const MIX: &[u8] = b"[mix ";
    const DRUMS: &[u8] = b" drums";

    if meta_event.kind != TEXT_EVENT_ID {
        return;
    }
    let data = &meta_event.data;
    if data.len() != FLIP_START_SIZE && data.len() != FLIP_END_SIZE {
        return;
    }
    if !data.starts_with(MIX) || &data[MIX.len() + 1..MIX.len() + 1 + DRUMS.len()] != DRUMS {
        return;
    }
    let Some(difficulty) = data[MIX.len()]
        .checked_sub(b'0')
        .and_then(|index| Difficulty::ALL.get(usize::from(index)).copied())
    else {
        return;
    };
    if data.len() == FLIP_END_SIZE && data[FLIP_END_SIZE - 1] == b']' {
        track
            .disco_flip_off_events
            .entry(difficulty)
            .or_default()
            .push((time, rank));
    } else if data.len() == FLIP_START_SIZE
        && data[FLIP_START_SIZE - 2] == b'd'
        && data[FLIP_START_SIZE - 1] == b']'
    {
        track
            .disco_flip_on_events
            .entry(difficulty)
            .or_default()
            .push((time, rank));
    }
}

fn force_hopo_key(key: u8, track_type: TrackType) -> bool {
    const FORCE_HOPO_KEYS: [u8; 4] = [65, 77, 89, 101];

    track_type != TrackType::Drums && FORCE_HOPO_KEYS.contains(&key)
}

fn force_strum_key(key: u8, track_type: TrackType) -> bool {
    const FORCE_STRUM_KEYS: [u8; 4] = [66, 78, 90, 102];

    track_type != TrackType::Drums && FORCE_STRUM_KEYS.contains(&key)
}

fn difficulty_from_key(key: u8, track_type: TrackType) -> Option<Difficulty> {
    let ranges: [(u8, u8, Difficulty); 4] = match track_type {
        TrackType::FiveFret | TrackType::FortniteFestival => [
            (96, 102, Difficulty::Expert),
            (84, 90, Difficulty::Hard),
            (72, 78, Difficulty::Medium),
            (60, 66, Difficulty::Easy),
        ],
        TrackType::SixFret => [
            (94, 102, Difficulty::Expert),
            (82, 90, Difficulty::Hard),
            (70, 78, Difficulty::Medium),
            (58, 66, Difficulty::Easy),
        ],
        TrackType::Drums => [
            (95, 101, Difficulty::Expert),
            (83, 89, Difficulty::Hard),
            (71, 77, Difficulty::Medium),
            (59, 65, Difficulty::Easy),
        ],
    };
    ranges
        .iter()
        .find(|&&(min, max, _)| key >= min && key <= max)
        .map(|&(_, _, difficulty)| difficulty)
}

fn colour_from_key_and_bounds(
    key: u8,
    diff_mins: [u8; 4],
    colours: &[usize],
) -> Result<usize, ParseError> {
    for min in diff_mins {
        if key >= min && usize::from(key - min) < colours.len() {
            return Ok(colours[usize::from(key - min)]);
        }
    }
    Err(ParseError::InvalidNoteKey { key })
}

fn colour_from_key(
    key: u8,
    track_type: TrackType,
    from_five_lane: bool,
) -> Result<usize, ParseError> {
    match track_type {
        TrackType::FiveFret | TrackType::FortniteFestival => {
            const NOTE_COLOURS: [usize; 5] = [
                FIVE_FRET_GREEN,
                FIVE_FRET_RED,
                FIVE_FRET_YELLOW,
                FIVE_FRET_BLUE,
                FIVE_FRET_ORANGE,
            ];
            colour_from_key_and_bounds(key, [96, 84, 72, 60], &NOTE_COLOURS)
        }
        TrackType::SixFret => {
            const GHL_NOTE_COLOURS: [usize; 7] = [
                SIX_FRET_OPEN,
                SIX_FRET_WHITE_LOW,
                SIX_FRET_WHITE_MID,
                SIX_FRET_WHITE_HIGH,
                SIX_FRET_BLACK_LOW,
                SIX_FRET_BLACK_MID,
                SIX_FRET_BLACK_HIGH,
            ];
            colour_from_key_and_bounds(key, [94, 82, 70, 58], &GHL_NOTE_COLOURS)
        }
        TrackType::Drums => {
            const DRUM_NOTE_COLOURS: [usize; 6] = [
                DRUM_DOUBLE_KICK,
                DRUM_KICK,
                DRUM_RED,
                DRUM_YELLOW,
                DRUM_BLUE,
                DRUM_GREEN,
            ];
            const FIVE_LANE_COLOURS: [usize; 7] = [
                DRUM_DOUBLE_KICK,
                DRUM_KICK,
                DRUM_RED,
                DRUM_YELLOW,
                DRUM_BLUE,
                DRUM_GREEN,
                DRUM_GREEN,
            ];
            if from_five_lane {
                colour_from_key_and_bounds(key, [95, 83, 71, 59], &FIVE_LANE_COLOURS)
            } else {
                colour_from_key_and_bounds(key, [95, 83, 71, 59], &DRUM_NOTE_COLOURS)
            }
        }
    }
}

fn flags_from_track_type(track_type: TrackType) -> NoteFlags {
    match track_type {
        TrackType::FiveFret | TrackType::FortniteFestival => NoteFlags::FIVE_FRET_GUITAR,
        TrackType::SixFret => NoteFlags::SIX_FRET_GUITAR,
        TrackType::Drums => NoteFlags::DRUMS,
    }
}

fn is_cymbal_key(key: u8, from_five_lane: bool) -> bool {
    let index = (u32::from(key) + 1) % 12;
    if from_five_lane {
        index == 3 || index == 5
    } else {
        index == 3 || index == 4 || index == 5
    }
}

fn dynamics_flags_from_velocity(velocity: u8) -> NoteFlags {
    const MIN_ACCENT_VELOCITY: u8 = 127;

    if velocity == 1 {
        NoteFlags::GHOST
    } else if velocity >= MIN_ACCENT_VELOCITY {
        NoteFlags::ACCENT
    } else {
        NoteFlags::empty()
    }
}

/// Pairs on-events with off-events by a monotonic merge on `(tick, rank)`.
///
/// Unlike solo pairing this never skips on-events, and an on-event with no
/// matching off-event is a parse error.
fn combine_note_on_off_events(
    on_events: &[RankedTick],
    off_events: &[RankedTick],
) -> Result<Vec<(i32, i32)>, ParseError> {
    let mut ranges = Vec::new();
    let mut on_iter = on_events.iter();
    let mut off_iter = off_events.iter().peekable();

    let mut next_on = on_iter.next();
    while let (Some(on), Some(&&off)) = (next_on, off_iter.peek()) {
        if *on >= off {
            off_iter.next();
            continue;
        }
        ranges.push((on.0, off.0));
        next_on = on_iter.next();
        off_iter.next();
    }

    if next_on.is_some() {
        return Err(ParseError::UnmatchedNoteOn);
    }
    Ok(ranges)
}

fn add_note_off_event(
    track: &mut InstrumentMidiTrack,
    data: [u8; 2],
    time: i32,
    rank: i32,
    from_five_lane: bool,
    track_type: TrackType,
) -> Result<(), ParseError> {
    let key = data[0];
    if let Some(difficulty) = difficulty_from_key(key, track_type) {
        if force_hopo_key(key, track_type) {
            track
                .force_hopo_off_events
                .entry(difficulty)
                .or_default()
                .push((time, rank));
        } else if force_strum_key(key, track_type) {
            track
                .force_strum_off_events
                .entry(difficulty)
                .or_default()
                .push((time, rank));
        } else {
            let colour = colour_from_key(key, track_type, from_five_lane)?;
            track
                .note_off_events
                .entry((difficulty, colour))
                .or_default()
                .push((time, rank));
        }
        return Ok(());
    }
    let bucket = match key {
        YELLOW_TOM_ID => &mut track.yellow_tom_off_events,
        BLUE_TOM_ID => &mut track.blue_tom_off_events,
        GREEN_TOM_ID => &mut track.green_tom_off_events,
        SOLO_NOTE_ID => &mut track.solo_off_events,
        SP_NOTE_ID => &mut track.sp_off_events,
        TAP_NOTE_ID => &mut track.tap_off_events,
        DRUM_FILL_ID => &mut track.fill_off_events,
        _ => return Ok(()),
    };
    bucket.push((time, rank));
    Ok(())
}

fn add_note_on_event(
    track: &mut InstrumentMidiTrack,
    data: [u8; 2],
    time: i32,
    rank: i32,
    from_five_lane: bool,
    parse_dynamics: bool,
    track_type: TrackType,
) -> Result<(), ParseError> {
    // Velocity 0 note-on events count as note-off events.
    if data[1] == 0 {
        return add_note_off_event(track, data, time, rank, from_five_lane, track_type);
    }

    let key = data[0];
    if let Some(difficulty) = difficulty_from_key(key, track_type) {
        if force_hopo_key(key, track_type) {
            track
                .force_hopo_on_events
                .entry(difficulty)
                .or_default()
                .push((time, rank));
        } else if force_strum_key(key, track_type) {
            track
                .force_strum_on_events
                .entry(difficulty)
                .or_default()
                .push((time, rank));
        } else {
            let colour = colour_from_key(key, track_type, from_five_lane)?;
            let mut flags = flags_from_track_type(track_type);
            if track_type == TrackType::Drums {
                if is_cymbal_key(key, from_five_lane) {
                    flags |= NoteFlags::CYMBAL;
                }
                if parse_dynamics {
                    flags |= dynamics_flags_from_velocity(data[1]);
                }
            }
            track
                .note_on_events
                .entry((difficulty, colour, flags))
                .or_default()
                .push((time, rank));
        }
        return Ok(());
    }
    let bucket = match key {
        YELLOW_TOM_ID => &mut track.yellow_tom_on_events,
        BLUE_TOM_ID => &mut track.blue_tom_on_events,
        GREEN_TOM_ID => &mut track.green_tom_on_events,
        SOLO_NOTE_ID => &mut track.solo_on_events,
        SP_NOTE_ID => &mut track.sp_on_events,
        TAP_NOTE_ID => &mut track.tap_on_events,
        DRUM_FILL_ID => &mut track.fill_on_events,
        _ => return Ok(()),
    };
    bucket.push((time, rank));
    Ok(())
}

fn read_instrument_midi_track(
    midi_track: &MidiTrack,
    track_type: TrackType,
) -> Result<InstrumentMidiTrack, ParseError> {
    let from_five_lane =
        track_type == TrackType::Drums && has_five_lane_green_notes(midi_track);
    let parse_dynamics =
        track_type == TrackType::Drums && has_enable_chart_dynamics(midi_track);

    let mut event_track = InstrumentMidiTrack::default();
    for difficulty in Difficulty::ALL {
        event_track.disco_flip_on_events.insert(difficulty, vec![]);
        event_track.disco_flip_off_events.insert(difficulty, vec![]);
        event_track.force_hopo_on_events.insert(difficulty, vec![]);
        event_track.force_hopo_off_events.insert(difficulty, vec![]);
        event_track.force_strum_on_events.insert(difficulty, vec![]);
        event_track
            .force_strum_off_events
            .insert(difficulty, vec![]);
    }

    let mut rank = 0;
    for event in &midi_track.events {
        rank += 1;
        match &event.event {
            Event::Sysex(sysex_event) => {
                add_sysex_event(&mut event_track, sysex_event, event.time, rank);
            }
            Event::Meta(meta_event) => {
                if track_type == TrackType::Drums {
                    append_disco_flip(&mut event_track, meta_event, event.time, rank);
                }
            }
            Event::Midi(midi_event) => match midi_event.status & UPPER_NIBBLE_MASK {
                NOTE_OFF_ID => add_note_off_event(
                    &mut event_track,
                    midi_event.data,
                    event.time,
                    rank,
                    from_five_lane,
                    track_type,
                )?,
                NOTE_ON_ID => add_note_on_event(
                    &mut event_track,
                    midi_event.data,
                    event.time,
                    rank,
                    from_five_lane,
                    parse_dynamics,
                    track_type,
                )?,
                _ => {}
            },
        }
    }

    // An unterminated disco flip runs to the end of the track.
    for difficulty in Difficulty::ALL {
        rank += 1;
        event_track
            .disco_flip_off_events
            .entry(difficulty)
            .or_default()
            .push((i32::MAX, rank));
    }

    // Legacy authoring convention: without explicit star-power phrases,
    // multiple solo regions are star-power phrases.
    if event_track.sp_on_events.is_empty() && event_track.solo_on_events.len() > 1 {
        std::mem::swap(
            &mut event_track.sp_on_events,
            &mut event_track.solo_on_events,
        );
        std::mem::swap(
            &mut event_track.sp_off_events,
            &mut event_track.solo_off_events,
        );
    }

    Ok(event_track)
}

fn apply_forcing(
    notes: &mut BTreeMap<Difficulty, Vec<Note>>,
    event_track: &InstrumentMidiTrack,
    tap_events: &BTreeMap<Difficulty, IntervalSet>,
) -> Result<(), ParseError> {
    let tap_note_events = IntervalSet::new(combine_note_on_off_events(
        &event_track.tap_on_events,
        &event_track.tap_off_events,
    )?);

    let mut force_hopo_events = BTreeMap::new();
    let mut force_strum_events = BTreeMap::new();
    for difficulty in Difficulty::ALL {
        let empty = vec![];
        let hopo_ons = event_track
            .force_hopo_on_events
            .get(&difficulty)
            .unwrap_or(&empty);
        let hopo_offs = event_track
            .force_hopo_off_events
            .get(&difficulty)
            .unwrap_or(&empty);
        force_hopo_events.insert(
            difficulty,
            IntervalSet::new(combine_note_on_off_events(hopo_ons, hopo_offs)?),
        );
        let strum_ons = event_track
            .force_strum_on_events
            .get(&difficulty)
            .unwrap_or(&empty);
        let strum_offs = event_track
            .force_strum_off_events
            .get(&difficulty)
            .unwrap_or(&empty);
        force_strum_events.insert(
            difficulty,
            IntervalSet::new(combine_note_on_off_events(strum_ons, strum_offs)?),
        );
    }

    for (difficulty, note_array) in notes.iter_mut() {
        for note in note_array {
            let position = note.position.value();
            if tap_note_events.contains(position) {
                note.flags |= NoteFlags::TAP;
            }
            if tap_events
                .get(difficulty)
                .is_some_and(|events| events.contains(position))
            {
                note.flags |= NoteFlags::TAP;
            }
            if force_hopo_events
                .get(difficulty)
                .is_some_and(|events| events.contains(position))
            {
                note.flags |= NoteFlags::FORCE_HOPO;
            }
            if force_strum_events
                .get(difficulty)
                .is_some_and(|events| events.contains(position))
            {
                note.flags |= NoteFlags::FORCE_STRUM;
            }
        }
    }
    Ok(())
}

fn notes_from_event_track(
    event_track: &InstrumentMidiTrack,
    open_events: &BTreeMap<Difficulty, IntervalSet>,
    tap_events: &BTreeMap<Difficulty, IntervalSet>,
    track_type: TrackType,
) -> Result<BTreeMap<Difficulty, Vec<Note>>, ParseError> {
    let mut notes: BTreeMap<Difficulty, Vec<Note>> = BTreeMap::new();
    for (&(difficulty, colour, _), note_ons) in &event_track.note_on_events {
        let note_offs = event_track
            .note_off_events
            .get(&(difficulty, colour))
            .ok_or(ParseError::UnmatchedNoteOn)?;
        for (position, end) in combine_note_on_off_events(note_ons, note_offs)? {
            let note_length = end - position;
            let mut note_colour = colour;
            if track_type == TrackType::FiveFret
                && open_events
                    .get(&difficulty)
                    .is_some_and(|events| events.contains(position))
            {
                note_colour = FIVE_FRET_OPEN;
            }
            let mut note = Note {
                position: Tick(position),
                ..Note::default()
            };
            note.lengths[note_colour] = Tick(note_length);
            note.flags = flags_from_track_type(track_type);
            notes.entry(difficulty).or_default().push(note);
        }
    }

    if track_type != TrackType::Drums {
        apply_forcing(&mut notes, event_track, tap_events)?;
    }

    Ok(notes)
}

fn sp_phrases_from_event_track(
    event_track: &InstrumentMidiTrack,
) -> Result<Vec<StarPower>, ParseError> {
    let mut sp_phrases = Vec::new();
    for (start, end) in
        combine_note_on_off_events(&event_track.sp_on_events, &event_track.sp_off_events)?
    {
        sp_phrases.push(StarPower {
            position: Tick(start),
            length: Tick(end - start),
        });
    }
    Ok(sp_phrases)
}

fn solo_positions(events: &[RankedTick]) -> Vec<i32> {
    events.iter().map(|&(position, _)| position).collect()
}

fn read_bre(midi_track: &MidiTrack) -> Option<BigRockEnding> {
    let mut bre_start = Tick(0);
    for event in &midi_track.events {
        let Event::Midi(midi_event) = &event.event else {
            continue;
        };
        if midi_event.data[0] != BRE_KEY {
            continue;
        }
        let event_type = midi_event.status & UPPER_NIBBLE_MASK;
        if event_type == NOTE_OFF_ID || (event_type == NOTE_ON_ID && midi_event.data[1] == 0) {
            return Some(BigRockEnding {
                start: bre_start,
                end: Tick(event.time),
            });
        }
        if event_type == NOTE_ON_ID {
            bre_start = Tick(event.time);
        }
    }
    None
}

fn five_fret_note_tracks_from_midi(
    midi_track: &MidiTrack,
    global_data: &Arc<SongGlobalData>,
    hopo_threshold: &HopoThreshold,
    permit_solos: bool,
) -> Result<BTreeMap<Difficulty, NoteTrack>, ParseError> {
    let event_track = read_instrument_midi_track(midi_track, TrackType::FiveFret)?;
    let bre = read_bre(midi_track);

    let mut open_events = BTreeMap::new();
    for (&difficulty, open_ons) in &event_track.open_on_events {
        let open_offs = event_track
            .open_off_events
            .get(&difficulty)
            .ok_or(ParseError::UnmatchedNoteOn)?;
        open_events.insert(
            difficulty,
            IntervalSet::new(combine_note_on_off_events(open_ons, open_offs)?),
        );
    }

    let mut tap_events = BTreeMap::new();
    for (&difficulty, tap_ons) in &event_track.tap_on_sysex_events {
        let tap_offs = event_track
            .tap_off_sysex_events
            .get(&difficulty)
            .ok_or(ParseError::UnmatchedNoteOn)?;
        tap_events.insert(
            difficulty,
            IntervalSet::new(combine_note_on_off_events(tap_ons, tap_offs)?),
        );
    }

    let notes = notes_from_event_track(&event_track, &open_events, &tap_events, TrackType::FiveFret)?;
    let sp_phrases = sp_phrases_from_event_track(&event_track)?;

    let solo_ons = solo_positions(&event_track.solo_on_events);
    let solo_offs = solo_positions(&event_track.solo_off_events);

    let mut note_tracks = BTreeMap::new();
    for (difficulty, note_set) in notes {
        let mut solos =
            form_solo_vector(&solo_ons, &solo_offs, &note_set, TrackType::FiveFret, true);
        if !permit_solos {
            solos.clear();
        }
        let mut note_track = NoteTrack::with_max_hopo_gap(
            note_set,
            &sp_phrases,
            TrackType::FiveFret,
            Arc::clone(global_data),
            hopo_threshold.midi_max_hopo_gap(global_data.resolution()),
        );
        note_track.set_solos(solos);
        note_track.set_bre(bre);
        note_tracks.insert(difficulty, note_track);
    }
    Ok(note_tracks)
}

fn ghl_note_tracks_from_midi(
    midi_track: &MidiTrack,
    global_data: &Arc<SongGlobalData>,
    hopo_threshold: &HopoThreshold,
    permit_solos: bool,
) -> Result<BTreeMap<Difficulty, NoteTrack>, ParseError> {
    let event_track = read_instrument_midi_track(midi_track, TrackType::SixFret)?;

    let notes = notes_from_event_track(
        &event_track,
        &BTreeMap::new(),
        &BTreeMap::new(),
        TrackType::SixFret,
    )?;
    let sp_phrases = sp_phrases_from_event_track(&event_track)?;

    let solo_ons = solo_positions(&event_track.solo_on_events);
    let solo_offs = solo_positions(&event_track.solo_off_events);

    let mut note_tracks = BTreeMap::new();
    for (difficulty, note_set) in notes {
        let mut solos =
            form_solo_vector(&solo_ons, &solo_offs, &note_set, TrackType::SixFret, true);
        if !permit_solos {
            solos.clear();
        }
        let mut note_track = NoteTrack::with_max_hopo_gap(
            note_set,
            &sp_phrases,
            TrackType::SixFret,
            Arc::clone(global_data),
            hopo_threshold.midi_max_hopo_gap(global_data.resolution()),
        );
        note_track.set_solos(solos);
        note_tracks.insert(difficulty, note_track);
    }
    Ok(note_tracks)
}

/// The merged tom-override regions of a drum track.
struct TomEvents {
    yellow: Vec<(i32, i32)>,
    blue: Vec<(i32, i32)>,
    green: Vec<(i32, i32)>,
}

impl TomEvents {
    fn new(events: &InstrumentMidiTrack) -> Result<Self, ParseError> {
        Ok(Self {
            yellow: combine_note_on_off_events(
                &events.yellow_tom_on_events,
                &events.yellow_tom_off_events,
            )?,
            blue: combine_note_on_off_events(
                &events.blue_tom_on_events,
                &events.blue_tom_off_events,
            )?,
            green: combine_note_on_off_events(
                &events.green_tom_on_events,
                &events.green_tom_off_events,
            )?,
        })
    }

    fn force_tom(&self, colour: usize, position: i32) -> bool {
        let regions = match colour {
            DRUM_YELLOW => &self.yellow,
            DRUM_BLUE => &self.blue,
            DRUM_GREEN => &self.green,
            _ => return false,
        };
        regions
            .iter()
            .any(|&(start, end)| position >= start && position < end)
    }
}

/// Repairs the illegal green cymbal + blue tom chord a five-lane fold can
/// produce. Four-lane sources cannot contain that pair.
fn fix_double_greens(notes: &mut [Note]) {
    let green_cymbal_positions: BTreeSet<Tick> = notes
        .iter()
        .filter(|note| {
            note.lengths[DRUM_GREEN].value() != -1 && note.flags.contains(NoteFlags::CYMBAL)
        })
        .map(|note| note.position)
        .collect();

    for note in notes {
        if note.lengths[DRUM_GREEN].value() == -1 || note.flags.contains(NoteFlags::CYMBAL) {
            continue;
        }
        if green_cymbal_positions.contains(&note.position) {
            note.lengths.swap(DRUM_BLUE, DRUM_GREEN);
        }
    }
}

fn drum_note_tracks_from_midi(
    midi_track: &MidiTrack,
    global_data: &Arc<SongGlobalData>,
    permit_solos: bool,
) -> Result<BTreeMap<Difficulty, NoteTrack>, ParseError> {
    let event_track = read_instrument_midi_track(midi_track, TrackType::Drums)?;
    let tom_events = TomEvents::new(&event_track)?;

    let mut notes: BTreeMap<Difficulty, Vec<Note>> = BTreeMap::new();
    for (&(difficulty, colour, flags), note_ons) in &event_track.note_on_events {
        let note_offs = event_track
            .note_off_events
            .get(&(difficulty, colour))
            .ok_or(ParseError::UnmatchedNoteOn)?;
        for (position, _) in combine_note_on_off_events(note_ons, note_offs)? {
            let mut note = Note {
                position: Tick(position),
                ..Note::default()
            };
            note.lengths[colour] = Tick(0);
            note.flags = flags;
            if tom_events.force_tom(colour, position) {
                note.flags -= NoteFlags::CYMBAL;
            }
            notes.entry(difficulty).or_default().push(note);
        }
    }
    for note_set in notes.values_mut() {
        fix_double_greens(note_set);
    }

    let sp_phrases = sp_phrases_from_event_track(&event_track)?;

    let mut drum_fills = Vec::new();
    for (start, end) in
        combine_note_on_off_events(&event_track.fill_on_events, &event_track.fill_off_events)?
    {
        drum_fills.push(DrumFill {
            position: Tick(start),
            length: Tick(end - start),
        });
    }

    let solo_ons = solo_positions(&event_track.solo_on_events);
    let solo_offs = solo_positions(&event_track.solo_off_events);

    let mut note_tracks = BTreeMap::new();
    for (difficulty, note_set) in notes {
        let empty = vec![];
        let flip_ons = event_track
            .disco_flip_on_events
            .get(&difficulty)
            .unwrap_or(&empty);
        let flip_offs = event_track
            .disco_flip_off_events
            .get(&difficulty)
            .unwrap_or(&empty);
        let mut disco_flips = Vec::new();
        for (start, end) in combine_note_on_off_events(flip_ons, flip_offs)? {
            disco_flips.push(DiscoFlip {
                position: Tick(start),
                length: Tick(end - start),
            });
        }

        let mut solos = form_solo_vector(&solo_ons, &solo_offs, &note_set, TrackType::Drums, true);
        if !permit_solos {
            solos.clear();
        }
        let mut note_track = NoteTrack::new(
            note_set,
            &sp_phrases,
            TrackType::Drums,
            Arc::clone(global_data),
        );
        note_track.set_solos(solos);
        note_track.set_drum_fills(drum_fills.clone());
        note_track.set_disco_flips(disco_flips);
        note_tracks.insert(difficulty, note_track);
    }
    Ok(note_tracks)
}

fn fortnite_note_tracks_from_midi(
    midi_track: &MidiTrack,
    global_data: &Arc<SongGlobalData>,
    permit_solos: bool,
) -> Result<BTreeMap<Difficulty, NoteTrack>, ParseError> {
    let event_track = read_instrument_midi_track(midi_track, TrackType::FortniteFestival)?;
    let bre = read_bre(midi_track);

    let notes = notes_from_event_track(
        &event_track,
        &BTreeMap::new(),
        &BTreeMap::new(),
        TrackType::FortniteFestival,
    )?;
    let sp_phrases = sp_phrases_from_event_track(&event_track)?;

    let solo_ons = solo_positions(&event_track.solo_on_events);
    let solo_offs = solo_positions(&event_track.solo_off_events);

    let mut note_tracks = BTreeMap::new();
    for (difficulty, note_set) in notes {
        let mut solos = form_solo_vector(
            &solo_ons,
            &solo_offs,
            &note_set,
            TrackType::FortniteFestival,
            true,
        );
        if !permit_solos {
            solos.clear();
        }
        let mut note_track = NoteTrack::new(
            note_set,
            &sp_phrases,
            TrackType::FortniteFestival,
            Arc::clone(global_data),
        );
        note_track.set_solos(solos);
        note_track.set_bre(bre);
        note_tracks.insert(difficulty, note_track);
    }
    Ok(note_tracks)
}
