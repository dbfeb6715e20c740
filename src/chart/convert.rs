//! Assigns meaning to lexed chart sections and assembles a song.
//!
//! `[Song]` supplies the resolution, `[SyncTrack]` the tempo map and
//! `[Events]` the practice sections. Every other recognised section name
//! encodes a difficulty and an instrument whose note events become one
//! note track.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use itertools::Itertools;

use crate::chart::lex::{Chart, ChartSection};
use crate::error::ParseError;
use crate::hopo::HopoThreshold;
use crate::song::{Metadata, Song, SongGlobalData};
use crate::songparts::{
    DRUM_BLUE, DRUM_DOUBLE_KICK, DRUM_GREEN, DRUM_KICK, DRUM_RED, DRUM_YELLOW, Difficulty,
    DrumFill, FIVE_FRET_OPEN, Instrument, Note, NoteFlags, NoteTrack, PracticeSection,
    SIX_FRET_BLACK_HIGH, SIX_FRET_BLACK_LOW, SIX_FRET_BLACK_MID, SIX_FRET_OPEN,
    SIX_FRET_WHITE_HIGH, SIX_FRET_WHITE_LOW, SIX_FRET_WHITE_MID, StarPower, TrackType,
    all_instruments, form_solo_vector, is_six_fret_instrument,
};
use crate::tempomap::{Bpm, TempoMap, TimeSignature};
use crate::time::Tick;

const SP_PHRASE_KEY: i32 = 2;
const DRUM_FILL_KEY: i32 = 64;
const YELLOW_CYMBAL_FRET: i32 = 66;
const BLUE_CYMBAL_FRET: i32 = 67;
const GREEN_CYMBAL_FRET: i32 = 68;

/// Converts a lexed chart into a [`Song`] under a set of parse options.
#[derive(Debug, Clone)]
pub struct ChartConverter {
    song_name: String,
    artist: String,
    charter: String,
    hopo_threshold: HopoThreshold,
    permitted_instruments: BTreeSet<Instrument>,
    permit_solos: bool,
}

impl ChartConverter {
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
    /// Fails with a [`ParseError`] on a malformed resolution, an oversized
    /// time-signature denominator, or invalid tempo data.
    pub fn convert(&self, chart: &Chart) -> Result<Song, ParseError> {
        let resolution = song_resolution(chart)?;

        let mut bpms = Vec::new();
        let mut time_sigs = Vec::new();
        if let Some(sync_track) = find_section(chart, "SyncTrack") {
            for event in &sync_track.bpm_events {
                bpms.push(Bpm {
                    position: Tick(event.position),
                    millibeats_per_minute: event.bpm,
                });
            }
            for event in &sync_track.ts_events {
                if event.denominator_exponent >= 31 || event.denominator_exponent < 0 {
                    return Err(ParseError::TimeSigDenominatorTooLarge);
                }
                time_sigs.push(TimeSignature {
                    position: Tick(event.position),
                    numerator: event.numerator,
                    denominator: 1 << event.denominator_exponent,
                });
            }
        }
        let tempo_map = TempoMap::new(time_sigs, bpms, vec![], resolution)?;

        let mut global = SongGlobalData::default();
        global.set_resolution(resolution)?;
        global.set_name(self.song_name.clone());
        global.set_artist(self.artist.clone());
        global.set_charter(self.charter.clone());
        global.set_tempo_map(tempo_map);
        if let Some(events_section) = find_section(chart, "Events") {
            global.set_practice_sections(practice_sections(events_section));
        }

        let global = Arc::new(global);
        let mut song = Song::with_global_data(Arc::clone(&global));
        for section in &chart.sections {
            let Some((difficulty, instrument)) = instrument_section(&section.name) else {
                continue;
            };
            if !self.permitted_instruments.contains(&instrument) {
                continue;
            }
            let note_track = self.convert_section(section, instrument, &global);
            if let Some(note_track) = note_track {
                song.add_note_track(instrument, difficulty, note_track);
            }
        }
        Ok(song)
    }

    fn convert_section(
        &self,
        section: &ChartSection,
        instrument: Instrument,
        global: &Arc<SongGlobalData>,
    ) -> Option<NoteTrack> {
        let track_type = if instrument == Instrument::Drums {
            TrackType::Drums
        } else if is_six_fret_instrument(instrument) {
            TrackType::SixFret
        } else {
            TrackType::FiveFret
        };

        let notes = match track_type {
            TrackType::Drums => drum_notes(section),
            _ => guitar_notes(section, track_type),
        };
        if notes.is_empty() {
            return None;
        }

        let mut sp_phrases = Vec::new();
        let mut drum_fills = Vec::new();
        for event in &section.special_events {
            match event.key {
                SP_PHRASE_KEY => sp_phrases.push(StarPower {
                    position: Tick(event.position),
                    length: Tick(event.length),
                }),
                DRUM_FILL_KEY => drum_fills.push(DrumFill {
                    position: Tick(event.position),
                    length: Tick(event.length),
                }),
                _ => {}
            }
        }

        let solo_ons: Vec<i32> = section
            .events
            .iter()
            .filter(|event| event.data == "solo")
            .map(|event| event.position)
            .sorted()
            .collect();
        let solo_offs: Vec<i32> = section
            .events
            .iter()
            .filter(|event| event.data == "soloend")
            .map(|event| event.position)
            .sorted()
            .collect();
        let mut solos = form_solo_vector(&solo_ons, &solo_offs, &notes, track_type, false);
        if !self.permit_solos {
            solos.clear();
        }

        let mut note_track = NoteTrack::with_max_hopo_gap(
            notes,
            &sp_phrases,
            track_type,
            Arc::clone(global),
            self.hopo_threshold.chart_max_hopo_gap(global.resolution()),
        );
        note_track.set_solos(solos);
        if track_type == TrackType::Drums {
            note_track.set_drum_fills(drum_fills);
        }
        Some(note_track)
    }
}

fn song_resolution(chart: &Chart) -> Result<i32, ParseError> {
    const DEFAULT_RESOLUTION: i32 = 192;

    let Some(value) = find_section(chart, "Song")
        .and_then(|section| section.key_value_pairs.get("Resolution"))
    else {
        return Ok(DEFAULT_RESOLUTION);
    };
    value
        .parse()
        .map_err(|_| ParseError::InvalidFieldValue {
            field: "Resolution",
            value: value.clone(),
        })
}

fn find_section<'a>(chart: &'a Chart, name: &str) -> Option<&'a ChartSection> {
    chart.sections.iter().find(|section| section.name == name)
}

fn practice_sections(events_section: &ChartSection) -> Vec<PracticeSection> {
    let mut sections = Vec::new();
    for event in &events_section.events {
        let data = event.data.trim_matches('"');
        if let Some(name) = data.strip_prefix("section ") {
            sections.push(PracticeSection {
                name: name.to_owned(),
                start: Tick(event.position),
            });
        }
    }
    sections
}

fn instrument_section(name: &str) -> Option<(Difficulty, Instrument)> {
    const DIFFICULTIES: [(&str, Difficulty); 4] = [
        ("Easy", Difficulty::Easy),
        ("Medium", Difficulty::Medium),
        ("Hard", Difficulty::Hard),
        ("Expert", Difficulty::Expert),
    ];

    let (difficulty, suffix) = DIFFICULTIES.iter().find_map(|&(prefix, difficulty)| {
        name.strip_prefix(prefix)
            .map(|suffix| (difficulty, suffix))
    })?;
    let instrument = match suffix {
        "Single" => Instrument::Guitar,
        "DoubleGuitar" => Instrument::GuitarCoop,
        "DoubleBass" => Instrument::Bass,
        "DoubleRhythm" => Instrument::Rhythm,
        "Keyboard" => Instrument::Keys,
        "Drums" => Instrument::Drums,
        "GHLGuitar" => Instrument::GhlGuitar,
        "GHLBass" => Instrument::GhlBass,
        "GHLRhythm" => Instrument::GhlRhythm,
        "GHLCoop" => Instrument::GhlGuitarCoop,
        _ => return None,
    };
    Some((difficulty, instrument))
}

enum FretMeaning {
    Lane(usize),
    ForceFlip,
    Tap,
    Ignored,
}

fn fret_meaning(fret: i32, track_type: TrackType) -> FretMeaning {
    match track_type {
        TrackType::FiveFret => match fret {
            0..=4 => FretMeaning::Lane(fret as usize),
            5 => FretMeaning::ForceFlip,
            6 => FretMeaning::Tap,
            7 => FretMeaning::Lane(FIVE_FRET_OPEN),
            _ => FretMeaning::Ignored,
        },
        TrackType::SixFret => match fret {
            0 => FretMeaning::Lane(SIX_FRET_WHITE_LOW),
            1 => FretMeaning::Lane(SIX_FRET_WHITE_MID),
            2 => FretMeaning::Lane(SIX_FRET_WHITE_HIGH),
            3 => FretMeaning::Lane(SIX_FRET_BLACK_LOW),
            4 => FretMeaning::Lane(SIX_FRET_BLACK_MID),
            5 => FretMeaning::ForceFlip,
            6 => FretMeaning::Tap,
            7 => FretMeaning::Lane(SIX_FRET_OPEN),
            8 => FretMeaning::Lane(SIX_FRET_BLACK_HIGH),
            _ => FretMeaning::Ignored,
        },
        TrackType::Drums | TrackType::FortniteFestival => FretMeaning::Ignored,
    }
}

fn guitar_notes(section: &ChartSection, track_type: TrackType) -> Vec<Note> {
    let mut notes = Vec::new();
    let mut flip_positions = BTreeSet::new();
    let mut tap_positions = BTreeSet::new();
    for event in &section.note_events {
        match fret_meaning(event.fret, track_type) {
            FretMeaning::Lane(lane) => {
                let mut note = Note {
                    position: Tick(event.position),
                    ..Note::default()
                };
                note.lengths[lane] = Tick(event.length);
                note.flags = match track_type {
                    TrackType::SixFret => NoteFlags::SIX_FRET_GUITAR,
                    _ => NoteFlags::FIVE_FRET_GUITAR,
                };
                notes.push(note);
            }
            FretMeaning::ForceFlip => {
                flip_positions.insert(event.position);
            }
            FretMeaning::Tap => {
                tap_positions.insert(event.position);
            }
            FretMeaning::Ignored => {}
        }
    }
    for note in &mut notes {
        if flip_positions.contains(&note.position.value()) {
            note.flags |= NoteFlags::FORCE_FLIP;
        }
        if tap_positions.contains(&note.position.value()) {
            note.flags |= NoteFlags::TAP;
        }
    }
    notes
}

fn drum_notes(section: &ChartSection) -> Vec<Note> {
    const FIVE_LANE_GREEN_FRET: i32 = 5;
    const DOUBLE_KICK_FRET: i32 = 32;

    let cymbal_positions: BTreeMap<usize, BTreeSet<i32>> = section
        .note_events
        .iter()
        .filter_map(|event| match event.fret {
            YELLOW_CYMBAL_FRET => Some((DRUM_YELLOW, event.position)),
            BLUE_CYMBAL_FRET => Some((DRUM_BLUE, event.position)),
            GREEN_CYMBAL_FRET => Some((DRUM_GREEN, event.position)),
            _ => None,
        })
        .into_group_map()
        .into_iter()
        .map(|(lane, positions)| (lane, positions.into_iter().collect()))
        .collect();

    let mut notes = Vec::new();
    for event in &section.note_events {
        let lane = match event.fret {
            0 => DRUM_KICK,
            1 => DRUM_RED,
            2 => DRUM_YELLOW,
            3 => DRUM_BLUE,
            4 | FIVE_LANE_GREEN_FRET => DRUM_GREEN,
            DOUBLE_KICK_FRET => DRUM_DOUBLE_KICK,
            _ => continue,
        };
        let mut note = Note {
            position: Tick(event.position),
            ..Note::default()
        };
        note.lengths[lane] = Tick(0);
        note.flags = NoteFlags::DRUMS;
        if cymbal_positions
            .get(&lane)
            .is_some_and(|positions| positions.contains(&event.position))
        {
            note.flags |= NoteFlags::CYMBAL;
        }
        notes.push(note);
    }
    notes
}
