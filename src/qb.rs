//! The QB MIDI binary format used by certain console releases.
//!
//! [`decode`] recovers the offset-indexed item tree, [`crc`] derives the
//! checksums content is located by, and [`convert`] rebuilds notes and the
//! tempo map from millisecond timestamps. [`QbMidiParser`] packages the
//! three behind a small configurator.

pub mod convert;
pub mod crc;
pub mod decode;

use log::debug;

use crate::error::ParseError;
use crate::song::Song;

use self::convert::QbMidiConverter;
use self::decode::{Endianness, parse_qb};

/// The console a QB file was authored for; this fixes its byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Console {
    /// PC releases.
    Pc,
    /// PlayStation 2 releases (little-endian).
    Ps2,
    /// PlayStation 3 releases.
    Ps3,
    /// Wii releases.
    Wii,
    /// Xbox 360 releases.
    Xbox360,
}

fn endianness(console: Console) -> Endianness {
    if console == Console::Ps2 {
        Endianness::LittleEndian
    } else {
        Endianness::BigEndian
    }
}

/// Parses QB MIDI files into [`Song`]s.
#[derive(Debug, Clone)]
pub struct QbMidiParser {
    console: Console,
    short_name: String,
}

impl QbMidiParser {
    /// Creates a parser for the song with the given short name.
    ///
    /// The short name prefixes every checksum the converter looks up.
    #[must_use]
    pub fn new(short_name: &str, console: Console) -> Self {
        Self {
            console,
            short_name: short_name.to_owned(),
        }
    }

    /// Parses a QB file into a [`Song`].
    ///
    /// # Errors
    ///
    /// Fails with a [`ParseError`] when decoding or conversion rejects the
    /// input; no partial song is ever returned.
    pub fn parse(&self, data: &[u8]) -> Result<Song, ParseError> {
        debug!(
            "parsing QB midi of {} bytes for `{}`",
            data.len(),
            self.short_name
        );
        let qb_midi = parse_qb(data, endianness(self.console))?;

        QbMidiConverter::new(&self.short_name).convert(&qb_midi)
    }
}
