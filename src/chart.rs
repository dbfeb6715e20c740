//! The text `.chart` format.
//!
//! [`lex`] extracts sections and typed events from the text, [`convert`]
//! turns them into the song model, and [`ChartParser`] packages both
//! behind a builder-style configurator.

pub mod convert;
pub mod lex;

use std::collections::BTreeSet;

use log::debug;

use crate::error::ParseError;
use crate::hopo::HopoThreshold;
use crate::song::{Metadata, Song};
use crate::songparts::{Instrument, all_instruments};

use self::convert::ChartConverter;
use self::lex::parse_chart;

/// Parses `.chart` files into [`Song`]s.
///
/// Configurator calls are chainable; `parse` may be called any number of
/// times.
#[derive(Debug, Clone)]
pub struct ChartParser {
    metadata: Metadata,
    hopo_threshold: HopoThreshold,
    permitted_instruments: BTreeSet<Instrument>,
    permit_solos: bool,
}

impl ChartParser {
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

    /// Parses chart text into a [`Song`].
    ///
    /// # Errors
    ///
    /// Fails with a [`ParseError`] when lexing or conversion rejects the
    /// input; no partial song is ever returned.
    pub fn parse(&self, data: &str) -> Result<Song, ParseError> {
        debug!("parsing chart text of {} bytes", data.len());
        let chart = parse_chart(data)?;

        ChartConverter::new(self.metadata.clone())
            .hopo_threshold(self.hopo_threshold)
            .permit_instruments(self.permitted_instruments.clone())
            .parse_solos(self.permit_solos)
            .convert(&chart)
    }
}
