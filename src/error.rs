//! Error types shared by every parser in the crate.
//!
//! All decode failures surface as [`ParseError`]: either the whole input is
//! accepted and a [`crate::song::Song`] is returned, or the call fails. Logic
//! errors at the song API (asking for an absent track, a non-positive speed)
//! are [`InvalidArgument`] and never overlap with parse failures.

use thiserror::Error;

/// An error occurred while decoding or converting a chart file.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
pub enum ParseError {
    /// A read ran past the end of the input.
    #[error("insufficient bytes")]
    InsufficientBytes,
    /// The file does not start with the `MThd` chunk.
    #[error("invalid MIDI header")]
    InvalidMidiHeader,
    /// A track chunk does not start with `MTrk`.
    #[error("invalid MIDI track magic")]
    InvalidMidiTrack,
    /// The division word of the header uses SMPTE timing.
    #[error("SMPTE format not supported")]
    SmpteNotSupported,
    /// A variable-length quantity ran over four bytes.
    #[error("variable-length quantity too long")]
    VlqTooLong,
    /// A status byte outside the supported event set.
    #[error("unexpected status byte {status:#04x}")]
    UnexpectedStatusByte {
        /// The offending status byte.
        status: u8,
    },
    /// A data byte appeared before any status byte was seen.
    #[error("running status without a preceding status byte")]
    MissingRunningStatus,
    /// A set-tempo meta event with fewer than three data bytes.
    #[error("tempo meta event too short")]
    TempoEventTooShort,
    /// A time-signature meta event with fewer than two data bytes.
    #[error("time signature meta event too short")]
    TimeSigEventTooShort,
    /// A time-signature denominator that cannot be represented.
    #[error("time signature denominator too large")]
    TimeSigDenominatorTooLarge,
    /// A BPM of zero or below.
    #[error("BPMs must be positive")]
    NonPositiveBpm,
    /// A time signature with a zero or negative component.
    #[error("time signatures must be positive/positive")]
    NonPositiveTimeSignature,
    /// A resolution of zero or below.
    #[error("resolution must be positive")]
    NonPositiveResolution,
    /// A note-on event without a matching note-off event.
    #[error("note on event has no corresponding note off event")]
    UnmatchedNoteOn,
    /// A note key outside the per-track colour tables.
    #[error("invalid key for note: {key}")]
    InvalidNoteKey {
        /// The offending MIDI key.
        key: u8,
    },
    /// A section header line that is not of the form `[Name]`.
    #[error("invalid section header: `{line}`")]
    InvalidSectionHeader {
        /// The offending line.
        line: String,
    },
    /// A section body that is never closed by `}`.
    #[error("unterminated section")]
    UnterminatedSection,
    /// A section body line with a recognised verb but the wrong shape.
    #[error("invalid chart line: `{line}`")]
    InvalidChartLine {
        /// The offending line.
        line: String,
    },
    /// A key-value entry whose value does not parse.
    #[error("invalid {field} value: `{value}`")]
    InvalidFieldValue {
        /// Which field was malformed.
        field: &'static str,
        /// The value as written in the file.
        value: String,
    },
    /// A top-level QB item type outside the closed alphabet.
    #[error("unexpected QB item type {code}")]
    UnexpectedQbItemType {
        /// The raw type code.
        code: u8,
    },
    /// A QB struct information byte outside the dialect's translation table.
    #[error("unexpected QB struct item type {code}")]
    UnexpectedQbStructItemType {
        /// The raw type code.
        code: u8,
    },
    /// A QB item kind that cannot head a top-level item.
    #[error("unexpected type for QB item, {code}")]
    UnexpectedQbTopLevelItem {
        /// The raw type code.
        code: u8,
    },
    /// A QB array whose element type cannot be stored in an array.
    #[error("unexpected type for QB array element, {code}")]
    UnexpectedQbArrayElement {
        /// The raw type code.
        code: u8,
    },
    /// A QB value read requested for a kind with no in-place payload.
    #[error("unexpected type for QB value, {code}")]
    UnexpectedQbValue {
        /// The raw type code.
        code: u8,
    },
    /// No QB item with the derived checksum exists.
    #[error("unable to find item by id {id:#010x}")]
    QbItemNotFound {
        /// The checksum that was looked up.
        id: u32,
    },
    /// A QB item whose payload does not have the expected shape.
    #[error("QB item has unexpected shape")]
    MalformedQbItem,
}

/// A logic error at the [`crate::song::Song`] API, distinct from parse
/// failures.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum InvalidArgument {
    /// The chosen instrument has no tracks in this song.
    #[error("chosen instrument not present in song")]
    InstrumentNotPresent,
    /// The instrument exists but not at the chosen difficulty.
    #[error("difficulty not available for chosen instrument")]
    DifficultyNotAvailable,
    /// A speedup percentage of zero or below.
    #[error("speed must be positive")]
    NonPositiveSpeed,
}
