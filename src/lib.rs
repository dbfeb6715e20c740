//! Parsers for rhythm-game chart formats.
//!
//! Three input formats are supported and all produce the same in-memory
//! [`song::Song`] model:
//!
//! - the text-based `.chart` format, via [`chart::ChartParser`];
//! - the Standard MIDI File variant used by rhythm games, via
//!   [`midi::MidiParser`];
//! - the binary QB MIDI container used by certain console releases, via
//!   [`qb::QbMidiParser`].
//!
//! A song carries a tempo map, per-instrument and per-difficulty note
//! tracks, star-power phrases, solos, drum fills, disco-flip regions,
//! practice sections, a Big Rock Ending marker and optional overdrive
//! beats. Parsing is all-or-nothing: a call either returns a complete
//! [`song::Song`] or fails with a [`ParseError`].
//!
//! # Usage
//!
//! ```
//! use fretwork::{ChartParser, Metadata};
//!
//! let text = "[Song]\n{\nResolution = 192\n}\n\
//!             [SyncTrack]\n{\n0 = B 120000\n}\n\
//!             [ExpertSingle]\n{\n768 = N 0 0\n}\n";
//! let song = ChartParser::new(Metadata::default()).parse(text).unwrap();
//! assert_eq!(song.instruments(), vec![fretwork::Instrument::Guitar]);
//! ```
//!
//! The library performs no I/O: callers hand it bytes or text already in
//! memory. There is no global state, so independent inputs may be parsed
//! from separate threads freely.

#![warn(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod chart;
pub mod error;
pub mod hopo;
pub mod midi;
pub mod prelude;
pub mod qb;
pub mod song;
pub mod songparts;
pub mod tempomap;
pub mod time;

mod bytes;
mod interval;

pub use chart::ChartParser;
pub use error::{InvalidArgument, ParseError};
pub use hopo::{HopoThreshold, HopoThresholdType};
pub use midi::MidiParser;
pub use qb::{Console, QbMidiParser};
pub use song::{Metadata, Song, SongGlobalData};
pub use songparts::{Difficulty, Instrument, Note, NoteFlags, NoteTrack, TrackType};
pub use tempomap::TempoMap;
pub use time::Tick;
