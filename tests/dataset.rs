use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use flate2::Compression;
use flate2::write::GzEncoder;

use pitchseq_terminal::dataset::{
    DataSource, Dataset, DatasetCache, LoadFilter, load_csv_reader, load_dataset, resolve_files,
};
use pitchseq_terminal::pitches::{Hand, PitchType};

const HEADER: &str =
    "pitch_type,game_date,game_pk,at_bat_number,pitch_number,p_throws,stand,events,description,launch_speed,year\n";

fn fixture_path(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    path
}

#[test]
fn fixture_loads_with_drop_reasons_counted() {
    let source = DataSource::new(vec![fixture_path("statcast_sample.csv")]);
    let data = load_dataset(&source).expect("fixture should load");

    assert_eq!(data.stats.files, 1);
    assert_eq!(data.stats.rows_read, 13);
    assert_eq!(data.stats.dropped_unknown_pitch, 1);
    assert_eq!(data.stats.dropped_out_of_range, 1);
    assert_eq!(data.stats.dropped_missing_field, 1);
    assert_eq!(data.stats.duplicates, 1);
    assert_eq!(data.stats.rows_kept, 9);
    assert_eq!(data.len(), 9);

    let order = data
        .events
        .iter()
        .map(|e| e.pitch_type.code())
        .collect::<Vec<_>>();
    assert_eq!(order, ["FF", "SL", "FF", "SL", "FF", "CH", "SI", "SL", "SL"]);
    assert_eq!(
        data.pitch_type_options(),
        vec![
            PitchType::FourSeamFastball,
            PitchType::Slider,
            PitchType::Changeup,
            PitchType::Sinker
        ]
    );
    assert_eq!(data.pitcher_hand_options(), vec![Hand::R, Hand::L]);
    assert_eq!(data.batter_hand_options(), vec![Hand::R, Hand::L]);
    assert_eq!(data.year_span(), Some((2023, 2023)));
}

#[test]
fn optional_columns_stay_empty() {
    let source = DataSource::new(vec![fixture_path("statcast_sample.csv")]);
    let data = load_dataset(&source).expect("fixture should load");

    let first = &data.events[0];
    assert_eq!(first.events, None);
    assert_eq!(first.launch_speed, None);
    assert_eq!(first.description.as_deref(), Some("called_strike"));
    assert_eq!(first.identity(), Some((717_001, 1, 1)));

    let null_speed_out = &data.events[7];
    assert_eq!(null_speed_out.events.as_deref(), Some("field_out"));
    assert_eq!(null_speed_out.launch_speed, None);
}

#[test]
fn unknown_codes_never_load() {
    let source = DataSource::new(vec![fixture_path("statcast_sample.csv")]);
    let data = load_dataset(&source).expect("fixture should load");
    assert!(data.events.iter().all(|e| e.pitch_type.code() != "EP"));
}

#[test]
fn selectors_limited_to_values_in_the_data() {
    let source = DataSource::new(vec![fixture_path("statcast_sample.csv")]);
    let data = load_dataset(&source).expect("fixture should load");

    let first = data
        .selector_from_labels(None, None, None)
        .expect("defaults resolve");
    assert_eq!(first.prev_pitch_type, PitchType::FourSeamFastball);
    assert_eq!(first.pitcher_hand, Hand::R);
    assert_eq!(first.batter_hand, Hand::R);

    let named = data
        .selector_from_labels(Some("changeup"), Some("L"), Some("l"))
        .expect("present values resolve");
    assert_eq!(named.prev_pitch_type, PitchType::Changeup);
    assert_eq!(named.pitcher_hand, Hand::L);
    assert_eq!(named.batter_hand, Hand::L);

    // A valid code the fixture never uses.
    let err = data
        .selector_from_labels(Some("KN"), None, None)
        .expect_err("absent pitch type rejected");
    let msg = format!("{err:#}");
    assert!(msg.contains("valid: FF, SL, CH, SI"), "{msg}");
    assert!(data.selector_from_labels(Some("EP"), None, None).is_err());

    let body = format!("{HEADER}FF,2023-04-01,1,1,1,R,R,,ball,,2023\n");
    let (events, _) = load_csv_reader(body.as_bytes(), &LoadFilter::default(), 10, "righties")
        .expect("inline csv loads");
    let righties = Dataset::from_events(events);
    let err = righties
        .selector_from_labels(None, Some("L"), None)
        .expect_err("absent hand rejected");
    assert!(format!("{err:#}").contains("valid: R"));
}

#[test]
fn year_falls_back_to_game_date_and_filters_apply() {
    let body = format!(
        "{HEADER}FF,2022-06-01,1,1,1,R,R,,ball,,\n\
         SL,2023-07-04,2,1,1,R,R,,ball,,\n\
         CH,,3,1,1,R,R,,ball,,\n"
    );
    let filter = LoadFilter {
        min_year: 2023,
        ..LoadFilter::default()
    };
    let (events, stats) =
        load_csv_reader(body.as_bytes(), &filter, 2, "inline").expect("inline csv loads");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].year, 2023);
    assert_eq!(stats.dropped_out_of_range, 1);
    assert_eq!(stats.dropped_missing_field, 1);

    let window = LoadFilter {
        min_year: 2021,
        max_year: None,
        date_from: NaiveDate::from_ymd_opt(2022, 1, 1),
        date_to: NaiveDate::from_ymd_opt(2022, 12, 31),
    };
    let (events, stats) =
        load_csv_reader(body.as_bytes(), &window, 500_000, "inline").expect("inline csv loads");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].pitch_type, PitchType::FourSeamFastball);
    assert_eq!(stats.dropped_out_of_range, 1);
}

#[test]
fn small_chunks_match_single_chunk() {
    let raw = fs::read_to_string(fixture_path("statcast_sample.csv")).expect("fixture readable");
    let filter = LoadFilter::default();
    let (a, _) = load_csv_reader(raw.as_bytes(), &filter, 1, "a").expect("chunked");
    let (b, _) = load_csv_reader(raw.as_bytes(), &filter, 500_000, "b").expect("whole");
    assert_eq!(a, b);
}

#[test]
fn malformed_numbers_become_missing() {
    let body = format!("{HEADER}FF,2023-04-01,abc,1,1,R,R,,ball,fast,2023\n");
    let (events, stats) = load_csv_reader(body.as_bytes(), &LoadFilter::default(), 10, "bad")
        .expect("row still loads");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].game_pk, None);
    assert_eq!(events[0].launch_speed, None);
    assert_eq!(stats.malformed, 0);
}

#[test]
fn gzip_csv_loads_like_plain() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("2023.csv.gz");
    let raw = fs::read(fixture_path("statcast_sample.csv")).expect("fixture readable");
    let mut enc = GzEncoder::new(Vec::new(), Compression::default());
    enc.write_all(&raw).expect("compress");
    fs::write(&path, enc.finish().expect("finish gzip")).expect("write gz");

    let gz = load_dataset(&DataSource::new(vec![path])).expect("gz loads");
    let plain =
        load_dataset(&DataSource::new(vec![fixture_path("statcast_sample.csv")])).expect("csv");
    assert_eq!(gz.events, plain.events);
}

#[test]
fn directory_files_load_in_name_order() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(
        dir.path().join("b_month.csv"),
        format!("{HEADER}SL,2023-05-01,2,1,1,R,R,,ball,,2023\n"),
    )
    .expect("write b");
    fs::write(
        dir.path().join("a_month.csv"),
        format!("{HEADER}FF,2023-04-01,1,1,1,R,R,,ball,,2023\n"),
    )
    .expect("write a");
    fs::write(dir.path().join("notes.txt"), "ignored").expect("write txt");

    let files = resolve_files(&[dir.path().to_path_buf()]).expect("resolve");
    assert_eq!(files.len(), 2);

    let data = load_dataset(&DataSource::new(vec![dir.path().to_path_buf()])).expect("dir loads");
    assert_eq!(data.stats.files, 2);
    assert_eq!(data.events[0].pitch_type, PitchType::FourSeamFastball);
    assert_eq!(data.events[1].pitch_type, PitchType::Slider);
}

#[test]
fn duplicates_across_files_keep_first() {
    let dir = tempfile::tempdir().expect("tempdir");
    let row = "FF,2023-04-01,1,1,1,R,R,,ball,,2023\n";
    fs::write(dir.path().join("a.csv"), format!("{HEADER}{row}")).expect("write a");
    fs::write(
        dir.path().join("b.csv"),
        format!("{HEADER}{row}FF,2023-04-01,1,1,2,R,R,,foul,,2023\n"),
    )
    .expect("write b");

    let data = load_dataset(&DataSource::new(vec![dir.path().to_path_buf()])).expect("loads");
    assert_eq!(data.len(), 2);
    assert_eq!(data.stats.duplicates, 1);
    assert_eq!(data.events[1].pitch_number, Some(2));
}

#[test]
fn missing_source_is_an_error() {
    let err = load_dataset(&DataSource::new(vec![PathBuf::from("does/not/exist.csv")]))
        .expect_err("missing file should fail");
    assert!(format!("{err:#}").contains("not found"));
}

#[test]
fn header_only_file_gives_empty_dataset() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("empty.csv");
    fs::write(&path, HEADER).expect("write");
    let data = load_dataset(&DataSource::new(vec![path])).expect("empty file loads");
    assert!(data.is_empty());
    assert_eq!(data.year_span(), None);
}

#[test]
fn cache_reuses_until_source_changes() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("pitches.csv");
    fs::copy(fixture_path("statcast_sample.csv"), &path).expect("copy fixture");
    let source = DataSource::new(vec![path.clone()]);

    let mut cache = DatasetCache::new();
    let first = cache.get_or_load(&source).expect("first load");
    let second = cache.get_or_load(&source).expect("cached load");
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(cache.loads(), 1);
    assert_eq!(cache.hits(), 1);

    let mut file = fs::OpenOptions::new()
        .append(true)
        .open(&path)
        .expect("open for append");
    file.write_all(b"FC,2023-04-03,717003,1,1,R,R,,ball,,2023\n")
        .expect("append row");
    drop(file);

    let third = cache.get_or_load(&source).expect("reload");
    assert!(!Arc::ptr_eq(&first, &third));
    assert_eq!(third.len(), first.len() + 1);
    assert_eq!(cache.loads(), 2);

    let filtered = DataSource {
        filter: LoadFilter {
            min_year: 2024,
            ..LoadFilter::default()
        },
        ..source.clone()
    };
    let other = cache.get_or_load(&filtered).expect("filter change reloads");
    assert!(other.is_empty());
    assert_eq!(cache.loads(), 3);

    cache.invalidate();
    cache.get_or_load(&filtered).expect("load after invalidate");
    assert_eq!(cache.loads(), 4);
}

#[test]
fn parquet_rows_load() {
    use parquet::data_type::{ByteArray, ByteArrayType, Int32Type};
    use parquet::file::properties::WriterProperties;
    use parquet::file::writer::SerializedFileWriter;
    use parquet::schema::parser::parse_message_type;

    const SCHEMA: &str = "
        message pitches {
            REQUIRED BYTE_ARRAY pitch_type (UTF8);
            REQUIRED BYTE_ARRAY p_throws (UTF8);
            REQUIRED BYTE_ARRAY stand (UTF8);
            OPTIONAL BYTE_ARRAY description (UTF8);
            REQUIRED INT32 year;
        }
    ";

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("pitches.parquet");
    let schema = Arc::new(parse_message_type(SCHEMA).expect("schema parses"));
    let props = Arc::new(WriterProperties::builder().build());
    let file = fs::File::create(&path).expect("create parquet");
    let mut writer = SerializedFileWriter::new(file, schema, props).expect("writer");
    let mut row_group = writer.next_row_group().expect("row group");

    let text_columns: [[&str; 3]; 3] = [["FF", "SL", "EP"], ["R", "R", "R"], ["L", "L", "L"]];
    for values in text_columns {
        let mut col = row_group
            .next_column()
            .expect("next column")
            .expect("column exists");
        let data = values.iter().map(|v| ByteArray::from(*v)).collect::<Vec<_>>();
        col.typed::<ByteArrayType>()
            .write_batch(&data, None, None)
            .expect("write text column");
        col.close().expect("close column");
    }

    let mut desc = row_group
        .next_column()
        .expect("next column")
        .expect("description column");
    desc.typed::<ByteArrayType>()
        .write_batch(
            &[ByteArray::from("called_strike"), ByteArray::from("ball")],
            Some(&[1i16, 0, 1][..]),
            None,
        )
        .expect("write description");
    desc.close().expect("close description");

    let mut year = row_group
        .next_column()
        .expect("next column")
        .expect("year column");
    year.typed::<Int32Type>()
        .write_batch(&[2023, 2023, 2023], None, None)
        .expect("write year");
    year.close().expect("close year");

    row_group.close().expect("close row group");
    writer.close().expect("close writer");

    let data = load_dataset(&DataSource::new(vec![path])).expect("parquet loads");
    assert_eq!(data.stats.rows_read, 3);
    assert_eq!(data.stats.dropped_unknown_pitch, 1);
    assert_eq!(data.len(), 2);
    assert_eq!(data.events[0].pitch_type, PitchType::FourSeamFastball);
    assert_eq!(data.events[0].description.as_deref(), Some("called_strike"));
    assert_eq!(data.events[1].stand, Hand::L);
    assert_eq!(data.events[1].description, None);
}
