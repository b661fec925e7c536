//! Split archive tests.

mod common;

use std::fs;
use std::sync::{Arc, Mutex};

use common::{random_data, stored};
use tempfile::TempDir;
use zipvault::format::signature;
use zipvault::format::span::{SpanKind, SpanLog};
use zipvault::volume::{MIN_VOLUME_SIZE, VolumeConfig};
use zipvault::{Error, ReadOptions, WriteOptions, ZipArchive, ZipWriter};

fn payloads() -> Vec<(String, Vec<u8>)> {
    (0..12)
        .map(|i| (format!("part{:02}.bin", i), random_data(150 + i * 37, i as u64)))
        .collect()
}

fn write_split(config: VolumeConfig, options: WriteOptions) -> zipvault::WriteResult {
    let mut writer = ZipWriter::create_split(config).unwrap().options(options);
    for (name, data) in payloads() {
        writer.write_entry_whole(name, &stored(), &data).unwrap();
    }
    writer.finish().unwrap()
}

#[test]
fn entries_span_disks_and_read_back() {
    let dir = TempDir::new().unwrap();
    let config = VolumeConfig::new(dir.path().join("backup.zip"), 512).unwrap();
    let result = write_split(config.clone(), WriteOptions::new());

    assert!(result.volume_count > 2);
    assert_eq!(result.volume_sizes.len(), result.volume_count as usize);
    for disk in 0..result.volume_count - 1 {
        let path = config.path_for(disk, result.volume_count);
        assert!(path.exists(), "{} missing", path.display());
        assert_eq!(fs::metadata(&path).unwrap().len(), result.volume_sizes[disk as usize]);
        assert!(result.volume_sizes[disk as usize] <= 512);
    }
    let first = fs::read(config.disk_path(0)).unwrap();
    assert_eq!(first[..4], signature::SPLIT_ARCHIVE.to_le_bytes());

    let mut archive = ZipArchive::open_split(config.archive_path()).unwrap();
    assert_eq!(
        archive.directory_location().disk_number,
        result.volume_count - 1
    );
    assert!(archive.entries().iter().any(|e| e.disk_number > 0));
    for (index, (name, data)) in payloads().into_iter().enumerate() {
        assert_eq!(archive.entries()[index].name, name);
        assert_eq!(archive.read_to_vec(index, &()).unwrap(), data);
    }
}

#[test]
fn streamed_entries_in_split_archive() {
    use std::io::Write;

    let dir = TempDir::new().unwrap();
    let config = VolumeConfig::new(dir.path().join("stream.zip"), 300).unwrap();
    let data = random_data(2_000, 9);
    let mut writer = ZipWriter::create_split(config.clone()).unwrap();
    let mut entry = writer.start_entry("long.bin", &stored()).unwrap();
    for chunk in data.chunks(64) {
        entry.write_all(chunk).unwrap();
    }
    entry.close().unwrap();
    drop(entry);
    let result = writer.finish().unwrap();
    assert!(result.volume_count >= 7);

    let mut archive = ZipArchive::open_split(config.archive_path()).unwrap();
    assert!(archive.entries()[0].has_data_descriptor());
    assert_eq!(archive.read_to_vec(0, &()).unwrap(), data);
}

#[test]
fn forced_zip64_split_archive() {
    let dir = TempDir::new().unwrap();
    let config = VolumeConfig::new(dir.path().join("wide.zip"), 400).unwrap();
    let result = write_split(config.clone(), WriteOptions::new().force_zip64(true));
    assert!(result.zip64);

    let mut archive = ZipArchive::open_split(config.archive_path()).unwrap();
    assert!(archive.is_zip64());
    let last = archive.len() - 1;
    assert_eq!(archive.read_to_vec(last, &()).unwrap(), payloads()[last].1);
}

#[test]
fn missing_disk_is_reported() {
    let dir = TempDir::new().unwrap();
    let config = VolumeConfig::new(dir.path().join("gap.zip"), 512).unwrap();
    let result = write_split(config.clone(), WriteOptions::new());
    assert!(result.volume_count > 2);
    fs::remove_file(config.disk_path(1)).unwrap();

    match ZipArchive::open_split(config.archive_path()) {
        Err(Error::VolumeMissing { disk, path, .. }) => {
            assert_eq!(disk, 1);
            assert!(path.ends_with("gap.z02"));
        }
        other => panic!("expected VolumeMissing, got {:?}", other),
    }
}

#[test]
fn last_disk_alone_is_not_a_single_file_archive() {
    let dir = TempDir::new().unwrap();
    let config = VolumeConfig::new(dir.path().join("alone.zip"), 512).unwrap();
    write_split(config.clone(), WriteOptions::new());

    match ZipArchive::open_path(config.archive_path()) {
        Err(Error::InvalidFormat(message)) => assert!(message.contains("split")),
        other => panic!("expected InvalidFormat, got {:?}", other),
    }
}

#[test]
fn archive_fitting_one_disk_gets_single_disk_marker() {
    let dir = TempDir::new().unwrap();
    let config = VolumeConfig::new(dir.path().join("small.zip"), 1 << 20).unwrap();
    let result = write_split(config.clone(), WriteOptions::new());
    assert_eq!(result.volume_count, 1);
    assert!(!config.disk_path(0).exists());

    let bytes = fs::read(config.archive_path()).unwrap();
    assert_eq!(bytes[..4], signature::SINGLE_DISK_ARCHIVE.to_le_bytes());

    let log = Arc::new(Mutex::new(SpanLog::new()));
    let mut archive = ZipArchive::with_recorder(
        std::io::BufReader::new(fs::File::open(config.archive_path()).unwrap()),
        ReadOptions::new(),
        log.clone(),
    )
    .unwrap();
    assert_eq!(archive.read_to_vec(3, &()).unwrap(), payloads()[3].1);
    let log = log.lock().unwrap();
    let marker = log.of_kind(SpanKind::SplitMarker).next().unwrap();
    assert_eq!((marker.start, marker.end), (0, 4));
}

#[test]
fn volume_size_below_minimum_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tiny.zip");
    assert!(VolumeConfig::new(&path, MIN_VOLUME_SIZE - 1).is_err());
    assert!(VolumeConfig::new(&path, MIN_VOLUME_SIZE).is_ok());
}
