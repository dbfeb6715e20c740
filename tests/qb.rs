use fretwork::prelude::*;
use fretwork::qb::crc::qb_crc;

const ARRAY_TYPE: u32 = 12;
const INTEGER_TYPE: u32 = 1;
const STRUCT_TYPE: u32 = 10;

/// Builds little-endian QB fixtures, laying array data inline after each
/// item header the way the games do.
struct QbBuilder {
    bytes: Vec<u8>,
}

impl QbBuilder {
    fn new() -> Self {
        let mut bytes = vec![0; 28];
        bytes[4..8].copy_from_slice(&0u32.to_le_bytes());
        Self { bytes }
    }

    fn push_u32(&mut self, value: u32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    fn push_item_header(&mut self, id: u32) {
        self.push_u32(ARRAY_TYPE << 16);
        self.push_u32(id);
        self.push_u32(0);
        self.push_u32(0);
        self.push_u32(0);
    }

    fn int_array_item(mut self, id: u32, values: &[u32]) -> Self {
        self.push_item_header(id);
        self.push_u32(INTEGER_TYPE << 16);
        self.push_u32(values.len() as u32);
        if values.len() > 1 {
            let data_offset = self.bytes.len() as u32 + 4;
            self.push_u32(data_offset);
        }
        for &value in values {
            self.push_u32(value);
        }
        self
    }

    fn tuple_array_item(mut self, id: u32, tuples: &[[u32; 3]]) -> Self {
        const INNER_NODE_SIZE: u32 = 24;

        self.push_item_header(id);
        self.push_u32(ARRAY_TYPE << 16);
        self.push_u32(tuples.len() as u32);
        if tuples.len() == 1 {
            let body_offset = self.bytes.len() as u32 + 4;
            self.push_u32(body_offset);
        } else {
            let list_offset = self.bytes.len() as u32 + 4;
            self.push_u32(list_offset);
            let elements_start = list_offset + 4 * tuples.len() as u32;
            for index in 0..tuples.len() as u32 {
                self.push_u32(elements_start + index * INNER_NODE_SIZE);
            }
        }
        for tuple in tuples {
            self.push_u32(INTEGER_TYPE << 16);
            self.push_u32(3);
            let data_offset = self.bytes.len() as u32 + 4;
            self.push_u32(data_offset);
            for &value in tuple {
                self.push_u32(value);
            }
        }
        self
    }

    fn build(mut self) -> Vec<u8> {
        let size = self.bytes.len() as u32;
        self.bytes[4..8].copy_from_slice(&size.to_le_bytes());
        self.bytes
    }
}

/// A song whose fretbars tick along at 120 BPM in 4/4.
fn test_song_bytes(expert_notes: &[[u32; 3]], expert_star: &[[u32; 3]]) -> Vec<u8> {
    let name = |suffix: &str| qb_crc(format!("testsong{suffix}").as_bytes());

    let flat_notes: Vec<u32> = expert_notes.iter().flatten().copied().collect();
    QbBuilder::new()
        .int_array_item(name("_fretbars"), &[0, 500, 1000, 1500, 2000, 2500, 3000])
        .tuple_array_item(name("_timesig"), &[[0, 4, 4]])
        .int_array_item(name("_song_easy"), &[])
        .int_array_item(name("_song_medium"), &[])
        .int_array_item(name("_song_hard"), &[])
        .int_array_item(name("_song_expert"), &flat_notes)
        .tuple_array_item(name("_expert_star"), expert_star)
        .build()
}

mod decoding {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn integer_array_items_are_decoded() {
        let data = QbBuilder::new()
            .int_array_item(0x1234_5678, &[3, 1, 4, 1, 5])
            .build();

        let qb_midi = parse_qb(&data, Endianness::LittleEndian).unwrap();

        assert_eq!(qb_midi.items.len(), 1);
        assert_eq!(qb_midi.items[0].id, 0x1234_5678);
        assert_eq!(
            qb_midi.items[0].data,
            QbValue::Array(vec![
                QbValue::Int(3),
                QbValue::Int(1),
                QbValue::Int(4),
                QbValue::Int(1),
                QbValue::Int(5),
            ])
        );
    }

    #[test]
    fn single_element_integer_arrays_are_stored_inline() {
        let data = QbBuilder::new().int_array_item(1, &[42]).build();

        let qb_midi = parse_qb(&data, Endianness::LittleEndian).unwrap();

        assert_eq!(qb_midi.items[0].data, QbValue::Array(vec![QbValue::Int(42)]));
    }

    #[test]
    fn arrays_of_arrays_follow_their_pointer_lists() {
        let data = QbBuilder::new()
            .tuple_array_item(7, &[[1, 2, 3], [4, 5, 6]])
            .build();

        let qb_midi = parse_qb(&data, Endianness::LittleEndian).unwrap();

        assert_eq!(
            qb_midi.items[0].data,
            QbValue::Array(vec![
                QbValue::Array(vec![QbValue::Int(1), QbValue::Int(2), QbValue::Int(3)]),
                QbValue::Array(vec![QbValue::Int(4), QbValue::Int(5), QbValue::Int(6)]),
            ])
        );
    }

    #[test]
    fn struct_array_elements_are_decoded() {
        // One top-level array of a single struct holding an integer item.
        let mut bytes = vec![0; 28];
        let push = |value: u32, bytes: &mut Vec<u8>| {
            bytes.extend_from_slice(&value.to_le_bytes());
        };
        push(ARRAY_TYPE << 16, &mut bytes); // item info
        push(99, &mut bytes); // id
        push(0, &mut bytes); // qb name
        push(0, &mut bytes); // array pointer
        push(0, &mut bytes); // padding
        push(STRUCT_TYPE << 16, &mut bytes); // array node: struct elements
        push(1, &mut bytes); // one element
        push(60, &mut bytes); // its body offset
        push(0x0001_0000, &mut bytes); // struct header marker
        push(68, &mut bytes); // first item offset
        push(3 << 8, &mut bytes); // struct item info: LE integer
        push(0xABCD, &mut bytes); // item id
        push(42, &mut bytes); // value
        push(0, &mut bytes); // end of chain

        let qb_midi = parse_qb(&bytes, Endianness::LittleEndian).unwrap();

        let QbValue::Array(elements) = &qb_midi.items[0].data else {
            panic!("expected an array item");
        };
        let QbValue::Struct(struct_data) = &elements[0] else {
            panic!("expected a struct element");
        };
        assert_eq!(struct_data.header_marker, 0x0001_0000);
        assert_eq!(struct_data.items.len(), 1);
        assert_eq!(struct_data.items[0].id, 0xABCD);
        assert_eq!(struct_data.items[0].data, QbValue::Int(42));
    }

    #[test]
    fn unknown_item_types_are_rejected() {
        let mut data = QbBuilder::new().int_array_item(1, &[1]).build();
        // Overwrite the item's type code with one outside the alphabet.
        data[28..32].copy_from_slice(&(7u32 << 16).to_le_bytes());

        assert_eq!(
            parse_qb(&data, Endianness::LittleEndian),
            Err(ParseError::UnexpectedQbItemType { code: 7 })
        );
    }

    #[test]
    fn non_array_top_level_items_are_rejected() {
        let mut data = QbBuilder::new().int_array_item(1, &[1]).build();
        data[28..32].copy_from_slice(&(INTEGER_TYPE << 16).to_le_bytes());

        assert_eq!(
            parse_qb(&data, Endianness::LittleEndian),
            Err(ParseError::UnexpectedQbTopLevelItem { code: 1 })
        );
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut data = QbBuilder::new().int_array_item(1, &[1]).build();
        data.extend_from_slice(&[0, 0]);

        assert_eq!(
            parse_qb(&data, Endianness::LittleEndian),
            Err(ParseError::InsufficientBytes)
        );
    }

    #[test]
    fn truncated_headers_are_rejected() {
        assert_eq!(
            parse_qb(&[0; 10], Endianness::LittleEndian),
            Err(ParseError::InsufficientBytes)
        );
    }

    #[test]
    fn big_endian_scalars_are_byte_swapped() {
        let mut bytes = vec![0; 28];
        bytes.extend_from_slice(&(ARRAY_TYPE << 16).to_le_bytes()); // info stays LE
        bytes.extend_from_slice(&0x0000_0009u32.to_be_bytes()); // id
        bytes.extend_from_slice(&0u32.to_be_bytes()); // qb name
        bytes.extend_from_slice(&0u32.to_be_bytes()); // pointer
        bytes.extend_from_slice(&0u32.to_be_bytes()); // padding
        bytes.extend_from_slice(&(INTEGER_TYPE << 16).to_le_bytes()); // node info
        bytes.extend_from_slice(&1u32.to_be_bytes()); // count
        bytes.extend_from_slice(&42u32.to_be_bytes()); // the value

        let qb_midi = parse_qb(&bytes, Endianness::BigEndian).unwrap();

        assert_eq!(qb_midi.items[0].id, 9);
        assert_eq!(qb_midi.items[0].data, QbValue::Array(vec![QbValue::Int(42)]));
    }
}

mod conversion {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(data: &[u8]) -> Song {
        QbMidiParser::new("testsong", Console::Ps2)
            .parse(data)
            .unwrap()
    }

    #[test]
    fn notes_are_reprojected_onto_the_tick_grid() {
        // Fretbars every 500 ms at 4/4 mean one beat per fretbar, so one
        // beat is 1920 ticks and the tempo is a steady 120 BPM.
        let data = test_song_bytes(
            &[[0, 0, 1], [500, 100, 2], [1000, 500, 1], [1500, 0, 33]],
            &[[500, 1000, 2]],
        );

        let song = parse(&data);

        assert_eq!(song.global_data().resolution(), 1920);
        assert_eq!(song.instruments(), vec![Instrument::Guitar]);
        assert_eq!(
            song.difficulties(Instrument::Guitar),
            vec![Difficulty::Expert]
        );

        let track = song.track(Instrument::Guitar, Difficulty::Expert).unwrap();
        let notes = track.notes();
        assert_eq!(notes.len(), 4);
        assert_eq!(notes[0].position, Tick(0));
        assert_eq!(notes[0].lengths[FIVE_FRET_GREEN], Tick(0));
        assert_eq!(notes[1].position, Tick(1920));
        // A 100 ms sustain is under half a fretbar and is dropped.
        assert_eq!(notes[1].lengths[FIVE_FRET_RED], Tick(0));
        assert_eq!(notes[2].position, Tick(3840));
        assert_eq!(notes[2].lengths[FIVE_FRET_GREEN], Tick(1920));
        assert_eq!(notes[3].position, Tick(5760));
        assert!(notes[3].flags.contains(NoteFlags::FORCE_FLIP));
    }

    #[test]
    fn star_power_phrases_are_reprojected() {
        let data = test_song_bytes(
            &[[500, 0, 1], [1000, 0, 2]],
            &[[500, 1000, 2]],
        );

        let song = parse(&data);
        let track = song.track(Instrument::Guitar, Difficulty::Expert).unwrap();

        assert_eq!(
            track.sp_phrases(),
            &[StarPower {
                position: Tick(1920),
                length: Tick(3840),
            }]
        );
    }

    #[test]
    fn the_tempo_map_is_rebuilt_from_fretbars() {
        let data = test_song_bytes(&[[0, 0, 1]], &[]);

        let song = parse(&data);
        let bpms = song.global_data().tempo_map().bpms();

        assert_eq!(bpms.len(), 6);
        assert!(
            bpms.iter()
                .all(|bpm| bpm.millibeats_per_minute == 120_000)
        );
        assert_eq!(bpms[1].position, Tick(1920));
    }

    #[test]
    fn empty_difficulties_are_omitted() {
        let data = test_song_bytes(&[[0, 0, 1]], &[]);

        let song = parse(&data);

        assert_eq!(
            song.track(Instrument::Guitar, Difficulty::Easy).unwrap_err(),
            InvalidArgument::DifficultyNotAvailable
        );
    }

    #[test]
    fn missing_items_fail_the_parse() {
        let data = test_song_bytes(&[[0, 0, 1]], &[]);

        let result = QbMidiParser::new("some_other_song", Console::Ps2).parse(&data);

        assert!(matches!(result, Err(ParseError::QbItemNotFound { .. })));
    }

    #[test]
    fn wrongly_shaped_items_fail_the_parse() {
        // A note array whose length is not a multiple of three.
        let name = qb_crc(b"testsong_song_expert");
        let broken = QbBuilder::new()
            .int_array_item(qb_crc(b"testsong_fretbars"), &[0, 500, 1000])
            .tuple_array_item(qb_crc(b"testsong_timesig"), &[[0, 4, 4]])
            .int_array_item(qb_crc(b"testsong_song_easy"), &[])
            .int_array_item(qb_crc(b"testsong_song_medium"), &[])
            .int_array_item(qb_crc(b"testsong_song_hard"), &[])
            .int_array_item(name, &[1, 2])
            .build();

        assert_eq!(
            QbMidiParser::new("testsong", Console::Ps2)
                .parse(&broken)
                .unwrap_err(),
            ParseError::MalformedQbItem
        );
    }
}
