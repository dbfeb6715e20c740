use std::sync::Arc;

use pretty_assertions::assert_eq;

use fretwork::prelude::*;

fn make_note(position: i32, length: i32, colour: usize) -> Note {
    let mut note = Note {
        position: Tick(position),
        ..Note::default()
    };
    note.flags = NoteFlags::FIVE_FRET_GUITAR;
    note.lengths[colour] = Tick(length);
    note
}

fn make_green_note(position: i32) -> Note {
    make_note(position, 0, FIVE_FRET_GREEN)
}

fn make_chord(position: i32, lengths: &[(usize, i32)]) -> Note {
    let mut note = Note {
        position: Tick(position),
        ..Note::default()
    };
    note.flags = NoteFlags::FIVE_FRET_GUITAR;
    for &(lane, length) in lengths {
        note.lengths[lane] = Tick(length);
    }
    note
}

fn make_drum_note(position: i32, colour: usize, flags: NoteFlags) -> Note {
    let mut note = Note {
        position: Tick(position),
        ..Note::default()
    };
    note.flags = flags | NoteFlags::DRUMS;
    note.lengths[colour] = Tick(0);
    note
}

fn default_global_data() -> Arc<SongGlobalData> {
    Arc::new(SongGlobalData::default())
}

fn make_resolution(resolution: i32) -> Arc<SongGlobalData> {
    let mut data = SongGlobalData::default();
    data.set_resolution(resolution).unwrap();
    data.set_tempo_map(TempoMap::new(vec![], vec![], vec![], resolution).unwrap());
    Arc::new(data)
}

mod note_track_ctor_maintains_invariants {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn notes_are_sorted() {
        let notes = vec![make_green_note(768), make_green_note(384)];
        let track = NoteTrack::new(notes, &[], TrackType::FiveFret, default_global_data());

        assert_eq!(
            track.notes(),
            &[make_green_note(384), make_green_note(768)]
        );
    }

    #[test]
    fn notes_of_the_same_colour_and_position_are_merged() {
        let notes = vec![
            make_note(768, 0, FIVE_FRET_GREEN),
            make_note(768, 768, FIVE_FRET_GREEN),
        ];
        let track = NoteTrack::new(notes, &[], TrackType::FiveFret, default_global_data());

        assert_eq!(track.notes(), &[make_note(768, 768, FIVE_FRET_GREEN)]);

        let second_notes = vec![
            make_note(768, 768, FIVE_FRET_GREEN),
            make_note(768, 0, FIVE_FRET_GREEN),
        ];
        let second_track =
            NoteTrack::new(second_notes, &[], TrackType::FiveFret, default_global_data());

        assert_eq!(second_track.notes(), &[make_note(768, 0, FIVE_FRET_GREEN)]);
    }

    #[test]
    fn notes_of_different_colours_are_dealt_with_separately() {
        let notes = vec![
            make_note(768, 0, FIVE_FRET_GREEN),
            make_note(768, 0, FIVE_FRET_RED),
            make_note(768, 768, FIVE_FRET_GREEN),
        ];
        let track = NoteTrack::new(notes, &[], TrackType::FiveFret, default_global_data());

        assert_eq!(
            track.notes(),
            &[make_chord(
                768,
                &[(FIVE_FRET_GREEN, 768), (FIVE_FRET_RED, 0)]
            )]
        );
    }

    #[test]
    fn open_and_non_open_notes_of_same_pos_and_length_are_merged() {
        let notes = vec![
            make_note(768, 0, FIVE_FRET_GREEN),
            make_note(768, 1, FIVE_FRET_RED),
            make_note(768, 0, FIVE_FRET_OPEN),
        ];
        let track = NoteTrack::new(notes, &[], TrackType::FiveFret, default_global_data());

        assert_eq!(
            track.notes(),
            &[make_chord(768, &[(FIVE_FRET_RED, 1), (FIVE_FRET_OPEN, 0)])]
        );
    }

    #[test]
    fn resolution_must_be_positive() {
        let mut data = SongGlobalData::default();

        assert_eq!(
            data.set_resolution(0),
            Err(ParseError::NonPositiveResolution)
        );
    }

    #[test]
    fn empty_sp_phrases_are_culled() {
        let notes = vec![make_green_note(768)];
        let phrases = [
            StarPower {
                position: Tick(0),
                length: Tick(100),
            },
            StarPower {
                position: Tick(700),
                length: Tick(100),
            },
            StarPower {
                position: Tick(1000),
                length: Tick(100),
            },
        ];
        let track = NoteTrack::new(notes, &phrases, TrackType::FiveFret, default_global_data());

        assert_eq!(
            track.sp_phrases(),
            &[StarPower {
                position: Tick(700),
                length: Tick(100),
            }]
        );
    }

    #[test]
    fn sp_phrases_are_sorted() {
        let notes = vec![make_green_note(768), make_green_note(1000)];
        let phrases = [
            StarPower {
                position: Tick(1000),
                length: Tick(1),
            },
            StarPower {
                position: Tick(768),
                length: Tick(1),
            },
        ];
        let track = NoteTrack::new(notes, &phrases, TrackType::FiveFret, default_global_data());

        assert_eq!(
            track.sp_phrases(),
            &[
                StarPower {
                    position: Tick(768),
                    length: Tick(1),
                },
                StarPower {
                    position: Tick(1000),
                    length: Tick(1),
                },
            ]
        );
    }

    #[test]
    fn sp_phrases_do_not_overlap() {
        let notes = vec![
            make_green_note(768),
            make_green_note(1000),
            make_green_note(1500),
        ];
        let phrases = [
            StarPower {
                position: Tick(768),
                length: Tick(1000),
            },
            StarPower {
                position: Tick(900),
                length: Tick(150),
            },
        ];
        let track = NoteTrack::new(notes, &phrases, TrackType::FiveFret, default_global_data());

        assert_eq!(
            track.sp_phrases(),
            &[
                StarPower {
                    position: Tick(768),
                    length: Tick(282),
                },
                StarPower {
                    position: Tick(1050),
                    length: Tick(718),
                },
            ]
        );
    }

    #[test]
    fn solos_are_sorted() {
        let notes = vec![make_green_note(0), make_green_note(768)];
        let mut track = NoteTrack::new(notes, &[], TrackType::FiveFret, default_global_data());
        track.set_solos(vec![
            Solo {
                start: Tick(768),
                end: Tick(868),
                value: 100,
            },
            Solo {
                start: Tick(0),
                end: Tick(100),
                value: 100,
            },
        ]);

        assert_eq!(
            track.solos(&DrumSettings::default_settings()),
            vec![
                Solo {
                    start: Tick(0),
                    end: Tick(100),
                    value: 100,
                },
                Solo {
                    start: Tick(768),
                    end: Tick(868),
                    value: 100,
                },
            ]
        );
    }
}

#[test]
fn solos_do_take_into_account_drum_settings() {
    let notes = vec![
        make_drum_note(0, DRUM_RED, NoteFlags::empty()),
        make_drum_note(0, DRUM_DOUBLE_KICK, NoteFlags::empty()),
        make_drum_note(192, DRUM_DOUBLE_KICK, NoteFlags::empty()),
    ];
    let mut track = NoteTrack::new(notes, &[], TrackType::Drums, default_global_data());
    track.set_solos(vec![
        Solo {
            start: Tick(0),
            end: Tick(1),
            value: 200,
        },
        Solo {
            start: Tick(192),
            end: Tick(193),
            value: 100,
        },
    ]);
    let settings = DrumSettings {
        enable_double_kick: false,
        disable_kick: false,
        pro_drums: true,
        enable_dynamics: false,
    };

    assert_eq!(
        track.solos(&settings),
        vec![Solo {
            start: Tick(0),
            end: Tick(1),
            value: 100,
        }]
    );
}

mod automatic_drum_activation_zone_generation_is_correct {
    use super::*;
    use pretty_assertions::assert_eq;

    fn drum_track(positions: &[i32]) -> NoteTrack {
        let notes = positions
            .iter()
            .map(|&position| make_drum_note(position, DRUM_RED, NoteFlags::empty()))
            .collect();
        NoteTrack::new(notes, &[], TrackType::Drums, default_global_data())
    }

    #[test]
    fn automatic_zones_are_created() {
        let mut track = drum_track(&[768, 1536, 2304, 3072, 3840]);

        track.generate_drum_fills(&TempoMap::default());

        assert_eq!(
            track.drum_fills(),
            &[
                DrumFill {
                    position: Tick(384),
                    length: Tick(384),
                },
                DrumFill {
                    position: Tick(3456),
                    length: Tick(384),
                },
            ]
        );
    }

    #[test]
    fn automatic_zones_have_250ms_of_leniency() {
        let mut track = drum_track(&[672, 3936, 6815, 10081]);

        track.generate_drum_fills(&TempoMap::default());

        assert_eq!(
            track.drum_fills(),
            &[
                DrumFill {
                    position: Tick(384),
                    length: Tick(384),
                },
                DrumFill {
                    position: Tick(3456),
                    length: Tick(384),
                },
            ]
        );
    }

    #[test]
    fn automatic_zones_handle_skipped_measures_correctly() {
        let mut track = drum_track(&[768, 4608]);

        track.generate_drum_fills(&TempoMap::default());

        assert_eq!(
            track.drum_fills(),
            &[
                DrumFill {
                    position: Tick(384),
                    length: Tick(384),
                },
                DrumFill {
                    position: Tick(4224),
                    length: Tick(384),
                },
            ]
        );
    }

    #[test]
    fn the_last_automatic_zone_exists_even_if_the_note_is_early() {
        let mut track = drum_track(&[760]);

        track.generate_drum_fills(&TempoMap::default());

        assert_eq!(
            track.drum_fills(),
            &[DrumFill {
                position: Tick(384),
                length: Tick(384),
            }]
        );
    }

    #[test]
    fn automatic_zones_are_half_a_measure_according_to_seconds() {
        let tempo_map = TempoMap::new(
            vec![],
            vec![Bpm {
                position: Tick(576),
                millibeats_per_minute: 40_000,
            }],
            vec![],
            192,
        )
        .unwrap();
        let mut data = SongGlobalData::default();
        data.set_tempo_map(tempo_map.clone());
        let notes = vec![make_drum_note(768, DRUM_RED, NoteFlags::empty())];
        let mut track = NoteTrack::new(notes, &[], TrackType::Drums, Arc::new(data));

        track.generate_drum_fills(&tempo_map);

        assert_eq!(
            track.drum_fills(),
            &[DrumFill {
                position: Tick(576),
                length: Tick(192),
            }]
        );
    }

    #[test]
    fn fill_ends_remain_snapped_to_measure() {
        let mut track = drum_track(&[758, 770, 3830, 3860, 6900, 6924]);

        track.generate_drum_fills(&TempoMap::default());

        assert_eq!(
            track.drum_fills(),
            &[
                DrumFill {
                    position: Tick(384),
                    length: Tick(384),
                },
                DrumFill {
                    position: Tick(3456),
                    length: Tick(384),
                },
                DrumFill {
                    position: Tick(6528),
                    length: Tick(384),
                },
            ]
        );
    }
}

mod base_score_for_average_multiplier_is_correct {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn base_score_is_correct_for_songs_without_sustains() {
        let notes = vec![
            make_green_note(192),
            make_chord(384, &[(FIVE_FRET_GREEN, 0), (FIVE_FRET_RED, 0)]),
        ];
        let track = NoteTrack::new(notes, &[], TrackType::FiveFret, default_global_data());

        assert_eq!(track.base_score(), 150);
    }

    #[test]
    fn base_score_is_correct_for_songs_with_sustains() {
        for (length, score) in [(192, 75), (92, 62), (93, 63)] {
            let notes = vec![make_note(192, length, FIVE_FRET_GREEN)];
            let track = NoteTrack::new(notes, &[], TrackType::FiveFret, default_global_data());

            assert_eq!(track.base_score(), score);
        }
    }

    #[test]
    fn base_score_is_correct_for_songs_with_chord_sustains() {
        let notes = vec![
            make_note(192, 192, FIVE_FRET_GREEN),
            make_note(192, 192, FIVE_FRET_RED),
        ];
        let track = NoteTrack::new(notes, &[], TrackType::FiveFret, default_global_data());

        assert_eq!(track.base_score(), 125);
    }

    #[test]
    fn base_score_is_correct_for_other_resolutions() {
        let notes = vec![make_note(192, 192, FIVE_FRET_GREEN)];
        let track = NoteTrack::new(notes, &[], TrackType::FiveFret, make_resolution(480));

        assert_eq!(track.base_score(), 60);
    }

    #[test]
    fn fractional_ticks_from_multiple_holds_are_added_correctly() {
        let notes = vec![
            make_note(0, 100, FIVE_FRET_GREEN),
            make_note(192, 100, FIVE_FRET_GREEN),
        ];
        let track = NoteTrack::new(notes, &[], TrackType::FiveFret, default_global_data());

        assert_eq!(track.base_score(), 127);
    }

    #[test]
    fn disjoint_chords_are_handled_correctly() {
        let notes = vec![
            make_note(0, 384, FIVE_FRET_GREEN),
            make_note(0, 384, FIVE_FRET_RED),
            make_note(0, 192, FIVE_FRET_YELLOW),
        ];
        let track = NoteTrack::new(notes, &[], TrackType::FiveFret, default_global_data());

        assert_eq!(track.base_score(), 275);
    }

    #[test]
    fn base_score_is_correctly_handled_with_open_note_merging() {
        let notes = vec![
            make_note(0, 0, FIVE_FRET_GREEN),
            make_note(0, 0, FIVE_FRET_OPEN),
        ];
        let track = NoteTrack::new(notes, &[], TrackType::FiveFret, default_global_data());

        assert_eq!(track.base_score(), 50);
    }
}

mod base_score_is_correct_for_drums {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kick_track() -> NoteTrack {
        let notes = vec![
            make_drum_note(0, DRUM_RED, NoteFlags::empty()),
            make_drum_note(192, DRUM_KICK, NoteFlags::empty()),
            make_drum_note(384, DRUM_DOUBLE_KICK, NoteFlags::empty()),
        ];
        NoteTrack::new(notes, &[], TrackType::Drums, default_global_data())
    }

    #[test]
    fn all_kicks_gives_correct_answer() {
        let settings = DrumSettings {
            enable_double_kick: true,
            disable_kick: false,
            pro_drums: true,
            enable_dynamics: false,
        };

        assert_eq!(kick_track().base_score_with(&settings), 150);
    }

    #[test]
    fn only_single_kicks_gives_correct_answer() {
        let settings = DrumSettings {
            enable_double_kick: false,
            disable_kick: false,
            pro_drums: true,
            enable_dynamics: false,
        };

        assert_eq!(kick_track().base_score_with(&settings), 100);
    }

    #[test]
    fn no_kicks_gives_correct_answer() {
        let settings = DrumSettings {
            enable_double_kick: false,
            disable_kick: true,
            pro_drums: true,
            enable_dynamics: false,
        };

        assert_eq!(kick_track().base_score_with(&settings), 50);
    }
}

#[test]
fn trim_sustains_is_correct() {
    let notes = vec![
        make_note(0, 65, FIVE_FRET_GREEN),
        make_note(200, 70, FIVE_FRET_GREEN),
        make_note(400, 140, FIVE_FRET_GREEN),
    ];
    let track = NoteTrack::new(notes, &[], TrackType::FiveFret, make_resolution(200));

    let new_track = track.trim_sustains();
    let new_notes = new_track.notes();

    assert_eq!(new_notes[0].lengths[0], Tick(0));
    assert_eq!(new_notes[1].lengths[0], Tick(70));
    assert_eq!(new_notes[2].lengths[0], Tick(140));
    assert_eq!(new_track.base_score(), 177);
}

mod snap_chords_is_correct {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn no_snapping() {
        let notes = vec![
            make_note(0, 0, FIVE_FRET_GREEN),
            make_note(5, 0, FIVE_FRET_RED),
        ];
        let track = NoteTrack::new(notes, &[], TrackType::FiveFret, make_resolution(480));

        let new_track = track.snap_chords(Tick(0));
        let new_notes = new_track.notes();

        assert_eq!(new_notes[0].position, Tick(0));
        assert_eq!(new_notes[1].position, Tick(5));
    }

    #[test]
    fn hmx_gh_snapping() {
        let notes = vec![
            make_note(0, 0, FIVE_FRET_GREEN),
            make_note(5, 0, FIVE_FRET_RED),
        ];
        let track = NoteTrack::new(notes, &[], TrackType::FiveFret, make_resolution(480));

        let new_track = track.snap_chords(Tick(10));
        let new_notes = new_track.notes();

        assert_eq!(new_notes.len(), 1);
        assert_eq!(new_notes[0].position, Tick(0));
        assert_eq!(new_notes[0].colours(), 1 | 2);
    }
}

#[test]
fn disable_dynamics_is_correct() {
    let notes = vec![
        make_drum_note(0, DRUM_RED, NoteFlags::empty()),
        make_drum_note(192, DRUM_RED, NoteFlags::GHOST),
        make_drum_note(384, DRUM_RED, NoteFlags::ACCENT),
    ];
    let mut track = NoteTrack::new(notes, &[], TrackType::Drums, default_global_data());

    track.disable_dynamics();

    assert_eq!(
        track.notes(),
        &[
            make_drum_note(0, DRUM_RED, NoteFlags::empty()),
            make_drum_note(192, DRUM_RED, NoteFlags::empty()),
            make_drum_note(384, DRUM_RED, NoteFlags::empty()),
        ]
    );
}
