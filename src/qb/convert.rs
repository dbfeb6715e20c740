//! Assigns meaning to decoded QB items and assembles a song.
//!
//! Content is located by checksum: each needed sub-object has the id
//! `crc(short_name ++ suffix)`. Positions and lengths in a QB file are
//! millisecond timestamps; the fretbar array anchors a reconstruction of
//! the tempo map, and every timestamp is reprojected onto the tick grid
//! through it.

use std::sync::Arc;

use itertools::Itertools;

use crate::error::ParseError;
use crate::qb::crc::{qb_crc, qb_crc_with};
use crate::qb::decode::{QbItem, QbMidi, QbValue};
use crate::song::{Song, SongGlobalData};
use crate::songparts::{Difficulty, Instrument, Note, NoteFlags, NoteTrack, StarPower, TrackType};
use crate::tempomap::{Bpm, TempoMap, TimeSignature};
use crate::time::Tick;

/// QB charts are fixed at 1920 ticks per quarter note.
const RESOLUTION: i32 = 1920;

/// Converts decoded QB items into a [`Song`].
#[derive(Debug, Clone)]
pub struct QbMidiConverter {
    short_name_crc: u32,
}

/// A `(position ms, length ms, lane flags)` note triple.
#[derive(Debug, Clone, Copy)]
struct QbNoteEvent {
    position: u32,
    length: u32,
    flags: u32,
}

/// A `(time ms, numerator, denominator)` time-signature triple.
#[derive(Debug, Clone, Copy)]
struct QbTimeSignature {
    time_ms: u32,
    numerator: u32,
    denominator: u32,
}

/// A `(position ms, length ms, note count)` star-power triple.
#[derive(Debug, Clone, Copy)]
struct QbSpEvent {
    position: u32,
    length: u32,
}

fn find_item_by_id<'a>(
    items: &'a [QbItem],
    suffix: &str,
    prefix_crc: u32,
) -> Result<&'a QbItem, ParseError> {
    let crc = qb_crc_with(suffix.as_bytes(), prefix_crc);
    items
        .iter()
        .find(|item| item.id == crc)
        .ok_or(ParseError::QbItemNotFound { id: crc })
}

fn as_u32_array(value: &QbValue) -> Result<Vec<u32>, ParseError> {
    let QbValue::Array(elements) = value else {
        return Err(ParseError::MalformedQbItem);
    };
    elements
        .iter()
        .map(|element| match element {
            QbValue::Int(int) => Ok(*int as u32),
            _ => Err(ParseError::MalformedQbItem),
        })
        .collect()
}

fn as_u32_triples(value: &QbValue) -> Result<Vec<(u32, u32, u32)>, ParseError> {
    let QbValue::Array(elements) = value else {
        return Err(ParseError::MalformedQbItem);
    };
    elements
        .iter()
        .map(|element| {
            as_u32_array(element)?
                .into_iter()
                .collect_tuple()
                .ok_or(ParseError::MalformedQbItem)
        })
        .collect()
}

fn fretbars_ms(midi: &QbMidi, short_name_crc: u32) -> Result<Vec<u32>, ParseError> {
    let fretbars_item = find_item_by_id(&midi.items, "_fretbars", short_name_crc)?;
    as_u32_array(&fretbars_item.data)
}

fn qb_timesigs(midi: &QbMidi, short_name_crc: u32) -> Result<Vec<QbTimeSignature>, ParseError> {
    let timesigs_item = find_item_by_id(&midi.items, "_timesig", short_name_crc)?;
    Ok(as_u32_triples(&timesigs_item.data)?
        .into_iter()
        .map(|(time_ms, numerator, denominator)| QbTimeSignature {
            time_ms,
            numerator,
            denominator,
        })
        .collect())
}

fn difficulty_name(difficulty: Difficulty) -> &'static str {
    match difficulty {
        Difficulty::Easy => "easy",
        Difficulty::Medium => "medium",
        Difficulty::Hard => "hard",
        Difficulty::Expert => "expert",
    }
}

fn note_events(
    midi: &QbMidi,
    short_name_crc: u32,
    difficulty: Difficulty,
) -> Result<Vec<QbNoteEvent>, ParseError> {
    let suffix = format!("_song_{}", difficulty_name(difficulty));
    let notes_item = find_item_by_id(&midi.items, &suffix, short_name_crc)?;
    let raw_notes = as_u32_array(&notes_item.data)?;
    if raw_notes.len() % 3 != 0 {
        return Err(ParseError::MalformedQbItem);
    }
    Ok(raw_notes
        .into_iter()
        .tuples()
        .map(|(position, length, flags)| QbNoteEvent {
            position,
            length,
            flags,
        })
        .collect())
}

fn sp_events(
    midi: &QbMidi,
    short_name_crc: u32,
    difficulty: Difficulty,
) -> Result<Vec<QbSpEvent>, ParseError> {
    let suffix = format!("_{}_star", difficulty_name(difficulty));
    let sps_item = find_item_by_id(&midi.items, &suffix, short_name_crc)?;
    Ok(as_u32_triples(&sps_item.data)?
        .into_iter()
        .map(|(position, length, _note_count)| QbSpEvent { position, length })
        .collect())
}

/// The fretbar/time-signature scaffolding every millisecond value is
/// reprojected through.
struct QbTimeData {
    fretbars_beats: Vec<f64>,
    fretbars_ms: Vec<u32>,
    timesigs: Vec<QbTimeSignature>,
}

impl QbTimeData {
    fn new(fretbars_ms: Vec<u32>, timesigs: Vec<QbTimeSignature>) -> Result<Self, ParseError> {
        const DEFAULT_TIME_SIG_DENOMINATOR: f64 = 4.0;

        if fretbars_ms.len() < 2 || !fretbars_ms.is_sorted() {
            return Err(ParseError::MalformedQbItem);
        }
        if fretbars_ms.windows(2).any(|pair| pair[0] == pair[1]) {
            return Err(ParseError::MalformedQbItem);
        }

        let mut fretbars_beats = Vec::with_capacity(fretbars_ms.len());
        fretbars_beats.push(0.0);

        let mut beat_position = 0.0;
        let mut timesig_denominator = 4u32;
        let mut timesig_iter = timesigs.iter().peekable();
        let mut fretbar_index = 0;

        // Walk fretbar gaps, injecting time-signature changes in order
        // against the fretbar positions; each gap advances the beat cursor
        // by a whole beat unit of the active signature.
        while fretbar_index + 1 < fretbars_ms.len() {
            if let Some(timesig) = timesig_iter.peek() {
                if timesig.time_ms <= fretbars_ms[fretbar_index] {
                    timesig_denominator = timesig.denominator;
                    timesig_iter.next();
                    continue;
                }
            }
            beat_position += DEFAULT_TIME_SIG_DENOMINATOR / f64::from(timesig_denominator);
            fretbars_beats.push(beat_position);
            fretbar_index += 1;
        }

        Ok(Self {
            fretbars_beats,
            fretbars_ms,
            timesigs,
        })
    }

    fn ms_to_beats(&self, ms: u32) -> f64 {
        let mut index = self.fretbars_ms.partition_point(|&fretbar| fretbar <= ms);
        index = index.clamp(1, self.fretbars_ms.len() - 1);
        let ms_before = self.fretbars_ms[index - 1];
        let ms_after = self.fretbars_ms[index];
        let beat_before = self.fretbars_beats[index - 1];
        let beat_after = self.fretbars_beats[index];
        beat_after
            - (f64::from(ms_after) - f64::from(ms)) * (beat_after - beat_before)
                / (f64::from(ms_after) - f64::from(ms_before))
    }

    fn ms_to_ticks(&self, ms: u32) -> Tick {
        Tick((f64::from(RESOLUTION) * self.ms_to_beats(ms)) as i32)
    }

    /// Sustains at or below half the first fretbar gap are dropped.
    fn sustain_threshold(&self) -> u32 {
        self.fretbars_ms[1] / 2
    }

    /// Emits one BPM per fretbar gap.
    fn bpms(&self) -> Vec<Bpm> {
        const MICROS_IN_MINUTE: f64 = 60_000_000.0;

        let mut bpms = Vec::with_capacity(self.fretbars_ms.len() - 1);
        for i in 0..self.fretbars_ms.len() - 1 {
            let time_diff = f64::from(self.fretbars_ms[i + 1] - self.fretbars_ms[i]);
            let beat_diff = self.fretbars_beats[i + 1] - self.fretbars_beats[i];
            let tick_position = (f64::from(RESOLUTION) * self.fretbars_beats[i]) as i32;
            bpms.push(Bpm {
                position: Tick(tick_position),
                millibeats_per_minute: (MICROS_IN_MINUTE * beat_diff / time_diff) as i64,
            });
        }
        bpms
    }

    fn time_sigs(&self) -> Vec<TimeSignature> {
        self.timesigs
            .iter()
            .map(|timesig| TimeSignature {
                position: self.ms_to_ticks(timesig.time_ms),
                numerator: timesig.numerator as i32,
                denominator: timesig.denominator as i32,
            })
            .collect()
    }
}

fn note_track(
    midi: &QbMidi,
    short_name_crc: u32,
    difficulty: Difficulty,
    global_data: Arc<SongGlobalData>,
    time_data: &QbTimeData,
) -> Result<Option<NoteTrack>, ParseError> {
    const NUMBER_OF_FRETS: u32 = 5;
    const FLIP_BIT: u32 = 1 << NUMBER_OF_FRETS;

    let events = note_events(midi, short_name_crc, difficulty)?;
    if events.is_empty() {
        return Ok(None);
    }

    let phrase_events = sp_events(midi, short_name_crc, difficulty)?;

    let sustain_threshold = time_data.sustain_threshold();
    let mut notes = Vec::with_capacity(events.len());
    for event in &events {
        let mut ms_length = event.length;
        if ms_length <= sustain_threshold {
            ms_length = 0;
        }
        let position = time_data.ms_to_ticks(event.position);
        let end_position = time_data.ms_to_ticks(event.position + ms_length);
        let length = end_position - position;

        let mut note = Note {
            position,
            ..Note::default()
        };
        for fret in 0..NUMBER_OF_FRETS {
            if event.flags & (1 << fret) != 0 {
                note.lengths[fret as usize] = length;
            }
        }
        if event.flags & FLIP_BIT != 0 {
            note.flags = NoteFlags::FORCE_FLIP;
        }
        notes.push(note);
    }

    let mut sp_phrases = Vec::with_capacity(phrase_events.len());
    for event in &phrase_events {
        let position = time_data.ms_to_ticks(event.position);
        let end_position = time_data.ms_to_ticks(event.position + event.length);
        sp_phrases.push(StarPower {
            position,
            length: end_position - position,
        });
    }

    Ok(Some(NoteTrack::new(
        notes,
        &sp_phrases,
        TrackType::FiveFret,
        global_data,
    )))
}

impl QbMidiConverter {
    /// Creates a converter for the song with the given short name.
    #[must_use]
    pub fn new(short_name: &str) -> Self {
        Self {
            short_name_crc: qb_crc(short_name.as_bytes()),
        }
    }

    /// Runs the conversion.
    ///
    /// # Errors
    ///
    /// Fails with a [`ParseError`] when a required item is missing or has
    /// an unexpected shape.
    pub fn convert(&self, midi: &QbMidi) -> Result<Song, ParseError> {
        let time_data = QbTimeData::new(
            fretbars_ms(midi, self.short_name_crc)?,
            qb_timesigs(midi, self.short_name_crc)?,
        )?;

        let mut global = SongGlobalData::default();
        global.set_resolution(RESOLUTION)?;
        global.set_tempo_map(TempoMap::new(
            time_data.time_sigs(),
            time_data.bpms(),
            vec![],
            RESOLUTION,
        )?);

        let global = Arc::new(global);
        let mut song = Song::with_global_data(Arc::clone(&global));
        for difficulty in Difficulty::ALL {
            let track = note_track(
                midi,
                self.short_name_crc,
                difficulty,
                Arc::clone(&global),
                &time_data,
            )?;
            if let Some(track) = track {
                song.add_note_track(Instrument::Guitar, difficulty, track);
            }
        }
        Ok(song)
    }
}
