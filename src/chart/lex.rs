//! The `.chart` section lexer.
//!
//! A chart file is a sequence of sections: a `[Name]` header, an opening
//! `{`, body lines, and a closing `}`. Body lines are either `Key = Value`
//! pairs or timed events of the form `<position> = <verb> <args...>`. Only
//! the `N`, `B`, `TS`, `S` and `E` verbs carry meaning; lines with other
//! verbs are ignored, while a known verb with the wrong argument count
//! fails the parse.

use std::collections::HashMap;

use crate::error::ParseError;

/// A lexed chart file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chart {
    /// The sections in file order.
    pub sections: Vec<ChartSection>,
}

/// One lexed section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChartSection {
    /// The name between the header brackets.
    pub name: String,
    /// `Key = Value` pairs.
    pub key_value_pairs: HashMap<String, String>,
    /// `N` events.
    pub note_events: Vec<NoteEvent>,
    /// `B` events.
    pub bpm_events: Vec<BpmEvent>,
    /// `TS` events.
    pub ts_events: Vec<TimeSigEvent>,
    /// `S` events.
    pub special_events: Vec<SpecialEvent>,
    /// `E` events.
    pub events: Vec<TextEvent>,
}

/// An `N <fret> <length>` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteEvent {
    /// The tick position.
    pub position: i32,
    /// The fret number.
    pub fret: i32,
    /// The sustain length in ticks.
    pub length: i32,
}

/// A `B <milliBPM>` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BpmEvent {
    /// The tick position.
    pub position: i32,
    /// The tempo in millibeats per minute.
    pub bpm: i64,
}

/// A `TS <numerator> [<denominator exponent>]` event.
///
/// The denominator is stored as its base-two exponent, defaulting to 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSigEvent {
    /// The tick position.
    pub position: i32,
    /// Beats per measure.
    pub numerator: i32,
    /// The base-two exponent of the denominator.
    pub denominator_exponent: i32,
}

/// An `S <key> <length>` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecialEvent {
    /// The tick position.
    pub position: i32,
    /// What the region marks.
    pub key: i32,
    /// The region length in ticks.
    pub length: i32,
}

/// An `E <text>` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEvent {
    /// The tick position.
    pub position: i32,
    /// The rest of the line.
    pub data: String,
}

/// Splits the text into lines on `\n` / `\r\n`; a lone `\r` stays in the
/// line.
fn chart_lines(text: &str) -> Vec<&str> {
    let mut lines: Vec<&str> = text
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect();
    if text.ends_with('\n') {
        lines.pop();
    }
    lines
}

/// Lexes chart text into sections.
///
/// # Errors
///
/// Fails with a [`ParseError`] on malformed section headers, unterminated
/// sections, or body lines with a recognised verb but the wrong shape.
pub fn parse_chart(text: &str) -> Result<Chart, ParseError> {
    let lines = chart_lines(text);
    let mut sections = Vec::new();

    let mut line_iter = lines.into_iter();
    while let Some(header) = line_iter.next() {
        let header = header.trim();
        let name = header
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
            .ok_or_else(|| ParseError::InvalidSectionHeader {
                line: header.to_owned(),
            })?;
        let opener = line_iter.next().ok_or(ParseError::UnterminatedSection)?;
        if opener.trim() != "{" {
            return Err(ParseError::InvalidChartLine {
                line: opener.to_owned(),
            });
        }

        let mut section = ChartSection {
            name: name.to_owned(),
            ..ChartSection::default()
        };
        loop {
            let line = line_iter
                .next()
                .ok_or(ParseError::UnterminatedSection)?
                .trim();
            if line == "}" {
                break;
            }
            if line.is_empty() {
                continue;
            }
            parse_section_line(&mut section, line)?;
        }
        sections.push(section);
    }

    Ok(Chart { sections })
}

fn parse_section_line(section: &mut ChartSection, line: &str) -> Result<(), ParseError> {
    let invalid_line = || ParseError::InvalidChartLine {
        line: line.to_owned(),
    };

    let tokens: Vec<&str> = line.split(' ').collect();
    let Ok(position) = tokens[0].parse::<i32>() else {
        // Not a timed event, so it must be a key-value pair.
        if tokens.len() < 3 || tokens[1] != "=" {
            return Err(invalid_line());
        }
        section
            .key_value_pairs
            .insert(tokens[0].to_owned(), tokens[2..].join(" "));
        return Ok(());
    };

    if tokens.len() < 3 || tokens[1] != "=" {
        return Err(invalid_line());
    }
    let args = &tokens[3..];
    match tokens[2] {
        "N" => {
            let [fret, length] = args else {
                return Err(invalid_line());
            };
            let fret = fret.parse().map_err(|_| invalid_line())?;
            let length = length.parse().map_err(|_| invalid_line())?;
            section.note_events.push(NoteEvent {
                position,
                fret,
                length,
            });
        }
        "B" => {
            let [bpm] = args else {
                return Err(invalid_line());
            };
            let bpm = bpm.parse().map_err(|_| invalid_line())?;
            section.bpm_events.push(BpmEvent { position, bpm });
        }
        "TS" => {
            const DEFAULT_DENOMINATOR_EXPONENT: i32 = 2;

            let (numerator, denominator_exponent) = match args {
                [numerator] => (numerator, None),
                [numerator, exponent] => (numerator, Some(exponent)),
                _ => return Err(invalid_line()),
            };
            let numerator = numerator.parse().map_err(|_| invalid_line())?;
            let denominator_exponent = match denominator_exponent {
                Some(exponent) => exponent.parse().map_err(|_| invalid_line())?,
                None => DEFAULT_DENOMINATOR_EXPONENT,
            };
            section.ts_events.push(TimeSigEvent {
                position,
                numerator,
                denominator_exponent,
            });
        }
        "S" => {
            let [key, length] = args else {
                return Err(invalid_line());
            };
            let key = key.parse().map_err(|_| invalid_line())?;
            let length = length.parse().map_err(|_| invalid_line())?;
            section.special_events.push(SpecialEvent {
                position,
                key,
                length,
            });
        }
        "E" => {
            section.events.push(TextEvent {
                position,
                data: args.join(" "),
            });
        }
        _ => {}
    }
    Ok(())
}
