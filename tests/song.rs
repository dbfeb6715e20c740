use pretty_assertions::assert_eq;

use fretwork::prelude::*;

fn two_instrument_song() -> Song {
    let text = "[ExpertSingle]\n{\n768 = S 2 100\n768 = N 0 0\n}\n\
                [HardSingle]\n{\n768 = N 0 0\n}\n\
                [ExpertDoubleBass]\n{\n768 = S 2 100\n768 = N 0 0\n1000 = S 2 50\n1000 = N 1 0\n}\n";
    ChartParser::new(Metadata::default()).parse(text).unwrap()
}

#[test]
fn instruments_and_difficulties_are_sorted_and_deduplicated() {
    let song = two_instrument_song();

    assert_eq!(
        song.instruments(),
        vec![Instrument::Guitar, Instrument::Bass]
    );
    assert_eq!(
        song.difficulties(Instrument::Guitar),
        vec![Difficulty::Hard, Difficulty::Expert]
    );
    assert_eq!(
        song.difficulties(Instrument::Bass),
        vec![Difficulty::Expert]
    );
}

#[test]
fn track_lookup_distinguishes_failure_modes() {
    let song = two_instrument_song();

    assert!(song.track(Instrument::Guitar, Difficulty::Expert).is_ok());
    assert_eq!(
        song.track(Instrument::Drums, Difficulty::Expert).unwrap_err(),
        InvalidArgument::InstrumentNotPresent
    );
    assert_eq!(
        song.track(Instrument::Bass, Difficulty::Easy).unwrap_err(),
        InvalidArgument::DifficultyNotAvailable
    );
}

#[test]
fn unison_phrase_positions_need_multiple_instruments() {
    let song = two_instrument_song();

    // 768 starts a phrase on both guitar and bass; 1000 only on bass.
    assert_eq!(song.unison_phrase_positions(), vec![Tick(768)]);
}

#[test]
fn unison_phrases_ignore_six_fret_instruments() {
    let text = "[ExpertSingle]\n{\n768 = S 2 100\n768 = N 0 0\n}\n\
                [ExpertGHLGuitar]\n{\n768 = S 2 100\n768 = N 0 0\n}\n";
    let song = ChartParser::new(Metadata::default()).parse(text).unwrap();

    assert_eq!(song.unison_phrase_positions(), vec![]);
}

#[test]
fn speedup_renames_the_song_and_scales_the_tempo_map() {
    let mut song = two_instrument_song();

    song.speedup(150).unwrap();

    assert_eq!(song.global_data().name(), "Unknown Song (150%)");
    assert_eq!(
        song.global_data().tempo_map().bpms(),
        &[Bpm {
            position: Tick(0),
            millibeats_per_minute: 180_000,
        }]
    );
    // Tracks share the updated global data.
    let track = song.track(Instrument::Guitar, Difficulty::Expert).unwrap();
    assert_eq!(track.global_data().name(), "Unknown Song (150%)");
}

#[test]
fn speedup_of_100_is_a_no_op() {
    let mut song = two_instrument_song();

    song.speedup(100).unwrap();

    assert_eq!(song.global_data().name(), "Unknown Song");
}

#[test]
fn speedup_rejects_non_positive_speeds() {
    let mut song = two_instrument_song();

    assert_eq!(song.speedup(0), Err(InvalidArgument::NonPositiveSpeed));
    assert_eq!(song.speedup(-20), Err(InvalidArgument::NonPositiveSpeed));
}

#[test]
fn global_data_handle_outlives_the_song() {
    let song = two_instrument_song();
    let handle = song.global_data_handle();
    drop(song);

    assert_eq!(handle.resolution(), 192);
}
