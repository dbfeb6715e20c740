//! Standard MIDI File decoding.
//!
//! This stage only recovers structure: each track becomes a list of
//! `(absolute tick, event)` pairs with meta, channel and sysex events kept
//! verbatim. Assigning meaning to the events is the converter's job.

use log::trace;

use crate::bytes::ByteCursor;
use crate::error::ParseError;

/// A decoded MIDI file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Midi {
    /// Ticks per quarter note from the header division word.
    pub ticks_per_quarter_note: i32,
    /// The decoded tracks, in file order.
    pub tracks: Vec<MidiTrack>,
}

/// One decoded `MTrk` chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MidiTrack {
    /// The track's events with absolute tick times.
    pub events: Vec<TimedEvent>,
}

/// An event at an absolute tick position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedEvent {
    /// The absolute tick of the event.
    pub time: i32,
    /// The event payload.
    pub event: Event,
}

/// A decoded track event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A meta event.
    Meta(MetaEvent),
    /// A channel voice message.
    Midi(MidiEvent),
    /// A system-exclusive message.
    Sysex(SysexEvent),
}

/// A meta event: type byte plus raw payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaEvent {
    /// The meta event type.
    pub kind: u8,
    /// The raw payload bytes.
    pub data: Vec<u8>,
}

/// A channel voice message.
///
/// Messages with a single data byte have the second byte zero-padded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MidiEvent {
    /// The status byte, including the channel nibble.
    pub status: u8,
    /// The data bytes.
    pub data: [u8; 2],
}

/// A system-exclusive message.
///
/// The captured data is the length-prefixed payload as written, so a
/// terminating `0xF7` stays in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SysexEvent {
    /// The raw payload bytes.
    pub data: Vec<u8>,
}

const HEADER_MAGIC: &[u8] = b"MThd";
const TRACK_MAGIC: &[u8] = b"MTrk";
const HEADER_LENGTH: u32 = 6;
const SMPTE_BIT: u16 = 0x8000;

/// Decodes a Standard MIDI File.
///
/// The track count in the header is advisory: extra declared tracks are
/// truncated to the tracks actually present. SMPTE division is rejected.
///
/// # Errors
///
/// Fails with a [`ParseError`] on truncated input, bad magic numbers,
/// SMPTE division, over-long variable-length quantities, or status bytes
/// outside the supported set.
pub fn parse_midi(data: &[u8]) -> Result<Midi, ParseError> {
    let mut cursor = ByteCursor::new(data);
    if cursor.take(4)? != HEADER_MAGIC {
        return Err(ParseError::InvalidMidiHeader);
    }
    if cursor.read_u32_be()? != HEADER_LENGTH {
        return Err(ParseError::InvalidMidiHeader);
    }
    let _format = cursor.read_u16_be()?;
    let track_count = cursor.read_u16_be()?;
    let division = cursor.read_u16_be()?;
    if division & SMPTE_BIT != 0 {
        return Err(ParseError::SmpteNotSupported);
    }

    let mut tracks = Vec::with_capacity(usize::from(track_count));
    while !cursor.is_at_end() && tracks.len() < usize::from(track_count) {
        tracks.push(read_track(&mut cursor)?);
    }
    trace!(
        "decoded {} MIDI tracks at {} ticks per quarter note",
        tracks.len(),
        division
    );

    Ok(Midi {
        ticks_per_quarter_note: i32::from(division),
        tracks,
    })
}

fn read_track(cursor: &mut ByteCursor<'_>) -> Result<MidiTrack, ParseError> {
    if cursor.take(4)? != TRACK_MAGIC {
        return Err(ParseError::InvalidMidiTrack);
    }
    let length = cursor.read_u32_be()? as usize;
    let window = cursor.take(length)?;

    let mut track_cursor = ByteCursor::new(window);
    let mut events = Vec::new();
    let mut time = 0;
    let mut running_status = None;
    while !track_cursor.is_at_end() {
        time += read_vlq(&mut track_cursor)? as i32;
        events.push(TimedEvent {
            time,
            event: read_event(&mut track_cursor, &mut running_status)?,
        });
    }

    Ok(MidiTrack { events })
}

fn read_event(
    cursor: &mut ByteCursor<'_>,
    running_status: &mut Option<u8>,
) -> Result<Event, ParseError> {
    const META_STATUS: u8 = 0xFF;
    const SYSEX_STATUS: u8 = 0xF0;

    let first_byte = cursor.pop()?;
    match first_byte {
        META_STATUS => {
            let kind = cursor.pop()?;
            let length = read_vlq(cursor)? as usize;
            let data = cursor.take(length)?.to_vec();
            Ok(Event::Meta(MetaEvent { kind, data }))
        }
        SYSEX_STATUS => {
            let length = read_vlq(cursor)? as usize;
            let data = cursor.take(length)?.to_vec();
            Ok(Event::Sysex(SysexEvent { data }))
        }
        0xF1..=0xFE => Err(ParseError::UnexpectedStatusByte { status: first_byte }),
        0x80..=0xEF => {
            *running_status = Some(first_byte);
            let data = read_channel_data(cursor, first_byte, None)?;
            Ok(Event::Midi(MidiEvent {
                status: first_byte,
                data,
            }))
        }
        _ => {
            let status = running_status.ok_or(ParseError::MissingRunningStatus)?;
            let data = read_channel_data(cursor, status, Some(first_byte))?;
            Ok(Event::Midi(MidiEvent { status, data }))
        }
    }
}

fn read_channel_data(
    cursor: &mut ByteCursor<'_>,
    status: u8,
    first_data_byte: Option<u8>,
) -> Result<[u8; 2], ParseError> {
    let first = match first_data_byte {
        Some(byte) => byte,
        None => cursor.pop()?,
    };
    // Program change and channel pressure carry a single data byte.
    let second = match status >> 4 {
        0xC | 0xD => 0,
        _ => cursor.pop()?,
    };
    Ok([first, second])
}

/// Decodes a MIDI variable-length quantity of at most four bytes.
fn read_vlq(cursor: &mut ByteCursor<'_>) -> Result<u32, ParseError> {
    const MAX_VLQ_BYTES: usize = 4;
    const CONTINUATION_BIT: u8 = 0x80;

    let mut value = 0u32;
    for _ in 0..MAX_VLQ_BYTES {
        let byte = cursor.pop()?;
        value = (value << 7) | u32::from(byte & !CONTINUATION_BIT);
        if byte & CONTINUATION_BIT == 0 {
            return Ok(value);
        }
    }
    Err(ParseError::VlqTooLong)
}
