//! The MIDI chart format.
//!
//! Parsing runs in two stages: [`decode`] recovers the raw event structure
//! of a Standard MIDI File, and [`convert`] assigns rhythm-game meaning to
//! the events. [`MidiParser`] packages both behind a builder-style
//! configurator.

pub mod convert;
pub mod decode;

use std::collections::BTreeSet;

use log::debug;

use crate::error::ParseError;
use crate::hopo::HopoThreshold;
use crate::song::{Metadata, Song};
use crate::songparts::{Instrument, all_instruments};

use self::convert::MidiConverter;
use self::decode::parse_midi;

/// Parses MIDI chart files into [`Song`]s.
///
/// Configurator calls are chainable; `parse` may be called any number of
/// times.
#[derive(Debug, Clone)]
pub struct MidiParser {
    metadata: Metadata,
    hopo_threshold: HopoThreshold,
    permitted_instruments: BTreeSet<Instrument>,
    permit_solos: bool,
}

impl MidiParser {
    /// Creates a parser carrying the given metadata.
    #[must_use]
    pub fn new(metadata: Metadata) -> Self {
        Self {
            metadata,
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

    /// Restricts parsing to the given instruments.
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

    /// Parses a MIDI file into a [`Song`].
    ///
    /// # Errors
    ///
    /// Fails with a [`ParseError`] when decoding or conversion rejects the
    /// input; no partial song is ever returned.
    pub fn parse(&self, data: &[u8]) -> Result<Song, ParseError> {
        debug!("parsing MIDI chart of {} bytes", data.len());
        let midi = parse_midi(data)?;

        MidiConverter::new(self.metadata.clone())
            .hopo_threshold(self.hopo_threshold)
            .permit_instruments(self.permitted_instruments.clone())
            .parse_solos(self.permit_solos)
            .convert(&midi)
    }
}
