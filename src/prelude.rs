//! A flat re-export of the public surface, for glob imports in
//! applications and tests.

pub use crate::chart::ChartParser;
pub use crate::chart::lex::{
    BpmEvent, Chart, ChartSection, NoteEvent, SpecialEvent, TextEvent, TimeSigEvent, parse_chart,
};
pub use crate::error::{InvalidArgument, ParseError};
pub use crate::hopo::{HopoThreshold, HopoThresholdType};
pub use crate::midi::MidiParser;
pub use crate::midi::decode::{
    Event, MetaEvent, Midi, MidiEvent, MidiTrack, SysexEvent, TimedEvent, parse_midi,
};
pub use crate::qb::decode::{
    Endianness, QbHeader, QbItem, QbItemInfo, QbItemType, QbMidi, QbStructData, QbStructItem,
    QbValue, parse_qb,
};
pub use crate::qb::{Console, QbMidiParser};
pub use crate::song::{Metadata, Song, SongGlobalData};
pub use crate::songparts::{
    BigRockEnding, Difficulty, DiscoFlip, DrumFill, DrumSettings, Instrument, Note, NoteFlags,
    NoteTrack, PracticeSection, Solo, StarPower, TrackType, all_instruments,
};
pub use crate::songparts::{
    DRUM_BLUE, DRUM_DOUBLE_KICK, DRUM_GREEN, DRUM_KICK, DRUM_RED, DRUM_YELLOW, FIVE_FRET_BLUE,
    FIVE_FRET_GREEN, FIVE_FRET_OPEN, FIVE_FRET_ORANGE, FIVE_FRET_RED, FIVE_FRET_YELLOW, MAX_LANES,
    SIX_FRET_BLACK_HIGH, SIX_FRET_BLACK_LOW, SIX_FRET_BLACK_MID, SIX_FRET_OPEN,
    SIX_FRET_WHITE_HIGH, SIX_FRET_WHITE_LOW, SIX_FRET_WHITE_MID,
};
pub use crate::tempomap::{Bpm, TempoMap, TimeSignature};
pub use crate::time::{Beat, Fretbar, Measure, OdBeat, Second, Tick};
