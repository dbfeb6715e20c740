//! The assembled song: shared global data plus one note track per
//! `(instrument, difficulty)` pair.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::error::{InvalidArgument, ParseError};
use crate::songparts::{
    Difficulty, Instrument, NoteTrack, PracticeSection, is_six_fret_instrument,
};
use crate::tempomap::TempoMap;
use crate::time::Tick;

/// Song metadata supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Metadata {
    /// The song name.
    pub name: String,
    /// The recording artist.
    pub artist: String,
    /// Who authored the chart.
    pub charter: String,
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            name: "Unknown Song".to_owned(),
            artist: "Unknown Artist".to_owned(),
            charter: "Unknown Charter".to_owned(),
        }
    }
}

/// Data shared by a [`Song`] and every one of its
/// [`NoteTrack`]s.
///
/// Converters fill this in completely before any track is built; after a
/// parse returns it is immutable behind its `Arc`.
#[derive(Debug, Clone, PartialEq)]
pub struct SongGlobalData {
    is_from_midi: bool,
    resolution: i32,
    name: String,
    artist: String,
    charter: String,
    tempo_map: TempoMap,
    od_beats: Vec<Tick>,
    practice_sections: Vec<PracticeSection>,
}

impl Default for SongGlobalData {
    fn default() -> Self {
        const DEFAULT_RESOLUTION: i32 = 192;

        Self {
            is_from_midi: false,
            resolution: DEFAULT_RESOLUTION,
            name: "Unknown Song".to_owned(),
            artist: "Unknown Artist".to_owned(),
            charter: "Unknown Charter".to_owned(),
            tempo_map: TempoMap::default(),
            od_beats: Vec::new(),
            practice_sections: Vec::new(),
        }
    }
}

impl SongGlobalData {
    /// Whether the song came from a MIDI file.
    #[must_use]
    pub fn is_from_midi(&self) -> bool {
        self.is_from_midi
    }

    /// Records whether the song came from a MIDI file.
    pub fn set_is_from_midi(&mut self, is_from_midi: bool) {
        self.is_from_midi = is_from_midi;
    }

    /// The chart resolution in ticks per quarter note.
    #[must_use]
    pub fn resolution(&self) -> i32 {
        self.resolution
    }

    /// Sets the resolution.
    ///
    /// # Errors
    ///
    /// Fails with [`ParseError::NonPositiveResolution`] when `resolution`
    /// is zero or below.
    pub fn set_resolution(&mut self, resolution: i32) -> Result<(), ParseError> {
        if resolution <= 0 {
            return Err(ParseError::NonPositiveResolution);
        }
        self.resolution = resolution;
        Ok(())
    }

    /// The song name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sets the song name.
    pub fn set_name(&mut self, name: String) {
        self.name = name;
    }

    /// The recording artist.
    #[must_use]
    pub fn artist(&self) -> &str {
        &self.artist
    }

    /// Sets the recording artist.
    pub fn set_artist(&mut self, artist: String) {
        self.artist = artist;
    }

    /// Who authored the chart.
    #[must_use]
    pub fn charter(&self) -> &str {
        &self.charter
    }

    /// Sets who authored the chart.
    pub fn set_charter(&mut self, charter: String) {
        self.charter = charter;
    }

    /// The tempo map.
    #[must_use]
    pub fn tempo_map(&self) -> &TempoMap {
        &self.tempo_map
    }

    /// Sets the tempo map.
    pub fn set_tempo_map(&mut self, tempo_map: TempoMap) {
        self.tempo_map = tempo_map;
    }

    /// The explicit overdrive-beat ticks, when the chart has them.
    #[must_use]
    pub fn od_beats(&self) -> &[Tick] {
        &self.od_beats
    }

    /// Sets the explicit overdrive-beat ticks.
    pub fn set_od_beats(&mut self, od_beats: Vec<Tick>) {
        self.od_beats = od_beats;
    }

    /// The named practice sections.
    #[must_use]
    pub fn practice_sections(&self) -> &[PracticeSection] {
        &self.practice_sections
    }

    /// Sets the named practice sections.
    pub fn set_practice_sections(&mut self, practice_sections: Vec<PracticeSection>) {
        self.practice_sections = practice_sections;
    }
}

/// A parsed song: shared global data plus its note tracks.
#[derive(Debug, Clone, PartialEq)]
pub struct Song {
    global_data: Arc<SongGlobalData>,
    tracks: BTreeMap<(Instrument, Difficulty), NoteTrack>,
}

impl Song {
    pub(crate) fn with_global_data(global_data: Arc<SongGlobalData>) -> Self {
        Self {
            global_data,
            tracks: BTreeMap::new(),
        }
    }

    /// The song-wide shared data.
    #[must_use]
    pub fn global_data(&self) -> &SongGlobalData {
        &self.global_data
    }

    /// A handle on the shared data that can outlive the song.
    #[must_use]
    pub fn global_data_handle(&self) -> Arc<SongGlobalData> {
        Arc::clone(&self.global_data)
    }

    /// Records a track for `(instrument, difficulty)`; tracks with no notes
    /// are ignored.
    pub fn add_note_track(
        &mut self,
        instrument: Instrument,
        difficulty: Difficulty,
        note_track: NoteTrack,
    ) {
        if !note_track.notes().is_empty() {
            self.tracks.insert((instrument, difficulty), note_track);
        }
    }

    /// The sorted, deduplicated instruments present in the song.
    #[must_use]
    pub fn instruments(&self) -> Vec<Instrument> {
        let set: BTreeSet<Instrument> = self
            .tracks
            .keys()
            .map(|&(instrument, _)| instrument)
            .collect();
        set.into_iter().collect()
    }

    /// The sorted difficulties available for `instrument`.
    #[must_use]
    pub fn difficulties(&self, instrument: Instrument) -> Vec<Difficulty> {
        self.tracks
            .keys()
            .filter(|&&(track_instrument, _)| track_instrument == instrument)
            .map(|&(_, difficulty)| difficulty)
            .collect()
    }

    /// The track for `(instrument, difficulty)`.
    ///
    /// # Errors
    ///
    /// Fails with a descriptive [`InvalidArgument`] when the instrument is
    /// absent or the difficulty is unavailable for it.
    pub fn track(
        &self,
        instrument: Instrument,
        difficulty: Difficulty,
    ) -> Result<&NoteTrack, InvalidArgument> {
        match self.tracks.get(&(instrument, difficulty)) {
            Some(track) => Ok(track),
            None if self.difficulties(instrument).is_empty() => {
                Err(InvalidArgument::InstrumentNotPresent)
            }
            None => Err(InvalidArgument::DifficultyNotAvailable),
        }
    }

    /// The sorted ticks at which star-power phrases start simultaneously on
    /// more than one non-six-fret instrument.
    #[must_use]
    pub fn unison_phrase_positions(&self) -> Vec<Tick> {
        let mut phrases_by_position: BTreeMap<Tick, BTreeSet<Instrument>> = BTreeMap::new();
        for (&(instrument, _), track) in &self.tracks {
            if is_six_fret_instrument(instrument) {
                continue;
            }
            for phrase in track.sp_phrases() {
                phrases_by_position
                    .entry(phrase.position)
                    .or_default()
                    .insert(instrument);
            }
        }

        phrases_by_position
            .into_iter()
            .filter(|(_, instruments)| instruments.len() > 1)
            .map(|(position, _)| position)
            .collect()
    }

    /// Speeds the song up to `speed`% of its normal tempo.
    ///
    /// 100 is a no-op; any other value rebuilds the tempo map and appends
    /// ` (<speed>%)` to the song name.
    ///
    /// # Errors
    ///
    /// Fails with [`InvalidArgument::NonPositiveSpeed`] when `speed` is
    /// zero or below.
    pub fn speedup(&mut self, speed: i32) -> Result<(), InvalidArgument> {
        const DEFAULT_SPEED: i32 = 100;

        if speed == DEFAULT_SPEED {
            return Ok(());
        }
        if speed <= 0 {
            return Err(InvalidArgument::NonPositiveSpeed);
        }

        let mut data = (*self.global_data).clone();
        data.name = format!("{} ({speed}%)", data.name);
        data.tempo_map = data.tempo_map.speedup(speed);
        let data = Arc::new(data);
        self.global_data = Arc::clone(&data);
        for track in self.tracks.values_mut() {
            track.set_global_data(Arc::clone(&data));
        }
        Ok(())
    }
}
