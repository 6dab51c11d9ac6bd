use std::{
    fs,
    io::{Read, Seek, SeekFrom},
    path::Path,
};

use gcdisc::{
    build::{DiscBuilder, DiscOverrides, FileInfo},
    disc::MINI_DVD_SIZE,
    read::DiscReader,
    Error,
};

fn sample_builder() -> DiscBuilder {
    let mut overrides = DiscOverrides::default();
    overrides.game_id = Some(*b"GTST01");
    overrides.game_title = Some("Round Trip Test".to_string());
    overrides.audio_streaming = Some(true);
    DiscBuilder::new(overrides)
}

fn write_sample_tree(dir: &Path) {
    fs::write(dir.join("a.txt"), b"hello").unwrap();
    fs::write(dir.join("b.txt"), b"12345").unwrap();
    fs::create_dir(dir.join("d")).unwrap();
    fs::write(dir.join("d/nested.txt"), b"abcdef").unwrap();
}

fn build_sample(dir: &Path, image: &Path) {
    write_sample_tree(dir);
    sample_builder()
        .build_from_directory(dir, image, &mut |_: u64, _: &str, _: u64| true)
        .expect("Failed to build disc image");
}

#[test]
fn test_build_and_check() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("root");
    fs::create_dir(&root).unwrap();
    let image = tmp.path().join("game.iso");
    build_sample(&root, &image);

    let disc = DiscReader::new(&image).expect("Failed to open disc image");
    assert!(!disc.is_wii());
    let partition = disc.data_partition().expect("Failed to open data partition");
    assert!(!partition.is_wii());
    assert!(!partition.is_encrypted());

    let files = partition.file_paths().collect::<Vec<_>>();
    assert_eq!(files, ["a.txt", "b.txt", "d/nested.txt"]);

    let mut stream = partition.open_file("d/nested.txt").unwrap();
    let mut buf = [0u8; 3];
    stream.read_exact(&mut buf).unwrap();
    assert_eq!(&buf, b"abc");

    let mut stream = partition.open_file("b.txt").unwrap();
    assert_eq!(stream.len().unwrap(), 5);
    stream.seek(SeekFrom::Current(2)).unwrap();
    let mut buf = [0u8; 2];
    stream.read_exact(&mut buf[..1]).unwrap();
    assert_eq!(&buf[..1], b"3");
    stream.seek(SeekFrom::Start(1)).unwrap();
    stream.read_exact(&mut buf).unwrap();
    assert_eq!(&buf, b"23");

    // Closed streams fail definitively
    stream.close();
    assert!(stream.is_closed());
    let err = stream.read(&mut buf).unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::BrokenPipe);
    assert!(stream.seek(SeekFrom::Start(0)).is_err());

    assert!(matches!(partition.open_file("missing.txt"), Err(Error::NotFound(_))));
    // Lookups are case-sensitive
    assert!(matches!(partition.open_file("A.TXT"), Err(Error::NotFound(_))));
}

#[test]
fn test_header_fidelity() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("root");
    fs::create_dir(&root).unwrap();
    let image = tmp.path().join("game.iso");
    build_sample(&root, &image);

    let disc = DiscReader::new(&image).unwrap();
    assert_eq!(disc.disc_size(), 0x10000);
    let partition = disc.data_partition().unwrap();

    let header = partition.header();
    assert_eq!(&header.game_id, b"GTST01");
    assert_eq!(header.game_title_str(), "Round Trip Test");
    assert_eq!(header.disc_num, 0);
    assert_eq!(header.audio_streaming, 1);

    let partition_header = partition.partition_header();
    assert_eq!(partition_header.dol_offset(false), 0);
    // boot (0x440) + bi2 (0x2000) + apploader placeholder (0x20), aligned to 128
    assert_eq!(partition_header.fst_offset(false), 0x2480);
    // 5 nodes (root, a.txt, b.txt, d, nested.txt) + 26 bytes of names
    assert_eq!(partition_header.fst_size(false), 86);
    assert_eq!(partition_header.fst_max_size(false), 86);
    assert_eq!(partition_header.user_offset.get(), 0x8000);
    assert_eq!(partition_header.user_size.get(), 0x8000);
}

#[test]
fn test_round_trip_extract() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("root");
    fs::create_dir(&root).unwrap();
    let image = tmp.path().join("game.iso");
    build_sample(&root, &image);

    let disc = DiscReader::new(&image).unwrap();
    let mut partition = disc.data_partition().unwrap();

    let out = tmp.path().join("extracted");
    let mut fractions = Vec::new();
    partition
        .extract_to(&out, &mut |_path: &str, fraction: f32| {
            fractions.push(fraction);
            true
        })
        .expect("Extraction failed");

    for name in ["a.txt", "b.txt", "d/nested.txt"] {
        assert_eq!(
            fs::read(out.join(name)).unwrap(),
            fs::read(root.join(name)).unwrap(),
            "Mismatched content for {name}"
        );
    }
    assert!(fractions.windows(2).all(|w| w[0] <= w[1]), "Progress went backwards");
    assert_eq!(*fractions.last().unwrap(), 1.0);
}

#[test]
fn test_extract_cancellation() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("root");
    fs::create_dir(&root).unwrap();
    let image = tmp.path().join("game.iso");
    build_sample(&root, &image);

    let mut partition = DiscReader::new(&image).unwrap().data_partition().unwrap();
    let result =
        partition.extract_to(tmp.path().join("cancelled"), &mut |_: &str, _: f32| false);
    match result {
        Err(Error::Io(_, source)) => {
            assert_eq!(source.kind(), std::io::ErrorKind::Interrupted)
        }
        other => panic!("Expected cancellation error, got {other:?}"),
    }
}

#[test]
fn test_determinism() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("root");
    fs::create_dir(&root).unwrap();
    write_sample_tree(&root);

    let image1 = tmp.path().join("game1.iso");
    let image2 = tmp.path().join("game2.iso");
    let mut noop = |_: u64, _: &str, _: u64| true;
    sample_builder().build_from_directory(&root, &image1, &mut noop).unwrap();
    sample_builder().build_from_directory(&root, &image2, &mut noop).unwrap();
    assert_eq!(fs::read(&image1).unwrap(), fs::read(&image2).unwrap());
}

#[test]
fn test_zero_length_files_and_empty_dirs() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("root");
    fs::create_dir(&root).unwrap();
    fs::write(root.join("zero.bin"), b"").unwrap();
    fs::create_dir(root.join("empty")).unwrap();
    fs::write(root.join("data.bin"), b"payload").unwrap();
    let image = tmp.path().join("game.iso");
    sample_builder()
        .build_from_directory(&root, &image, &mut |_: u64, _: &str, _: u64| true)
        .unwrap();

    let disc = DiscReader::new(&image).unwrap();
    let mut partition = disc.data_partition().unwrap();
    let files = partition.file_paths().collect::<Vec<_>>();
    assert_eq!(files, ["data.bin", "zero.bin"]);
    assert!(partition.find("empty").is_some_and(|(_, node)| node.is_dir()));

    let mut stream = partition.open_file("zero.bin").unwrap();
    assert_eq!(stream.len().unwrap(), 0);
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).unwrap();
    assert!(buf.is_empty());

    let out = tmp.path().join("extracted");
    partition.extract_to(&out, &mut |_: &str, _: f32| true).unwrap();
    assert!(out.join("empty").is_dir());
    assert_eq!(fs::read(out.join("zero.bin")).unwrap(), b"");
    assert_eq!(fs::read(out.join("data.bin")).unwrap(), b"payload");
}

#[test]
fn test_unrecognized_format() {
    let tmp = tempfile::tempdir().unwrap();
    let bogus = tmp.path().join("bogus.iso");
    fs::write(&bogus, vec![0xFFu8; 0x500]).unwrap();
    assert!(matches!(DiscReader::new(&bogus), Err(Error::UnrecognizedFormat)));

    let short = tmp.path().join("short.iso");
    fs::write(&short, b"tiny").unwrap();
    assert!(matches!(DiscReader::new(&short), Err(Error::UnrecognizedFormat)));

    let missing = tmp.path().join("does_not_exist.iso");
    assert!(matches!(DiscReader::new(&missing), Err(Error::NotFound(_))));
}

#[test]
fn test_capacity_enforced_before_output() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("root");
    fs::create_dir(&root).unwrap();
    // Sparse file: user data starts one sector in, so this is exactly one
    // byte past the largest layout that still fits.
    let big = fs::File::create(root.join("big.bin")).unwrap();
    big.set_len(MINI_DVD_SIZE - 0x8000 + 1).unwrap();
    drop(big);

    let builder = sample_builder();
    assert_eq!(builder.calculate_size_required(&root).unwrap(), None);

    let image = tmp.path().join("game.iso");
    let result =
        builder.build_from_directory(&root, &image, &mut |_: u64, _: &str, _: u64| true);
    assert!(matches!(result, Err(Error::CapacityExceeded { .. })));
    assert!(!image.exists(), "No output file may be produced for an oversized input");

    // Shrinking by one byte puts the layout exactly at the limit
    let big = fs::OpenOptions::new().write(true).open(root.join("big.bin")).unwrap();
    big.set_len(MINI_DVD_SIZE - 0x8000).unwrap();
    drop(big);
    assert_eq!(builder.calculate_size_required(&root).unwrap(), Some(MINI_DVD_SIZE));
}

#[test]
fn test_size_matches_build() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("root");
    fs::create_dir(&root).unwrap();
    write_sample_tree(&root);
    let builder = sample_builder();
    let planned = builder.calculate_size_required(&root).unwrap().unwrap();

    let image = tmp.path().join("game.iso");
    builder.build_from_directory(&root, &image, &mut |_: u64, _: &str, _: u64| true).unwrap();
    assert_eq!(fs::metadata(&image).unwrap().len(), planned);
}

#[test]
fn test_build_progress_reports() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("root");
    fs::create_dir(&root).unwrap();
    write_sample_tree(&root);
    let image = tmp.path().join("game.iso");

    let mut names = Vec::new();
    let mut last_written = 0u64;
    sample_builder()
        .build_from_directory(&root, &image, &mut |written: u64, name: &str, _len: u64| {
            assert!(written >= last_written, "Write position went backwards");
            last_written = written;
            names.push(name.to_string());
            true
        })
        .unwrap();
    for name in ["[BOOT]", "[BI2]", "[APPLOADER]", "[FST]", "a.txt", "b.txt", "d/nested.txt"] {
        assert!(names.iter().any(|n| n == name), "Missing progress report for {name}");
    }
}
