//! Property-based tests using proptest.
//!
//! Arbitrary payloads go through every compression method and encryption
//! scheme, whole and streamed, and must come back unchanged. Header parsers
//! are fed arbitrary bytes and must return errors rather than panic.

mod common;

use std::io::Cursor;

use proptest::prelude::*;
use zipvault::format::bytes::ByteReader;
use zipvault::format::central::CentralDirectoryHeader;
use zipvault::format::extra::{ExtraField, Zip64Fields};
use zipvault::{CompressionMethod, DosDateTime, EncryptionMethod, Password, ZipArchive};

fn methods() -> Vec<CompressionMethod> {
    let mut methods = vec![CompressionMethod::Stored];
    #[cfg(feature = "deflate")]
    methods.push(CompressionMethod::Deflate);
    #[cfg(feature = "bzip2")]
    methods.push(CompressionMethod::Bzip2);
    #[cfg(feature = "zstd")]
    methods.push(CompressionMethod::Zstd);
    methods
}

fn schemes() -> Vec<EncryptionMethod> {
    #[allow(unused_mut)]
    let mut schemes = vec![EncryptionMethod::None, EncryptionMethod::Pkware];
    #[cfg(feature = "aes")]
    {
        use zipvault::crypto::{AesStrength, StrongAlgorithm};
        schemes.push(EncryptionMethod::Aes(AesStrength::Aes128));
        schemes.push(EncryptionMethod::Aes(AesStrength::Aes256));
        schemes.push(EncryptionMethod::Strong(StrongAlgorithm::TripleDes168));
        schemes.push(EncryptionMethod::Strong(StrongAlgorithm::Aes192));
    }
    schemes
}

fn data_strategy(max: usize) -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![
        proptest::collection::vec(any::<u8>(), 0..max),
        // Runs compress, so the compressed stream differs in shape.
        (any::<u8>(), 0..max).prop_map(|(byte, len)| vec![byte; len]),
    ]
}

proptest! {
    // Each case writes and reads two archives; keep the count low.
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn entries_roundtrip(
        data in data_strategy(4096),
        method_index in any::<prop::sample::Index>(),
        scheme_index in any::<prop::sample::Index>(),
        chunk in 1usize..700,
        force_zip64 in any::<bool>(),
    ) {
        let method = *method_index.get(&methods());
        let scheme = *scheme_index.get(&schemes());
        let mut options = common::stored().compression(method).encryption(scheme);
        if scheme.is_encrypted() {
            options = options.password("prop");
        }
        let write_options = common::deterministic().force_zip64(force_zip64);
        let entries = [("p.bin", options, &data[..])];

        let (whole, _) = common::create_archive(write_options.clone(), &entries).unwrap();
        let streamed = common::create_streamed_archive(write_options, &entries, chunk).unwrap();

        for bytes in [whole, streamed] {
            let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
            let entry = archive.entries()[0].clone();
            prop_assert_eq!(entry.compression, method);
            prop_assert_eq!(entry.encryption, scheme);
            prop_assert_eq!(entry.uncompressed_size, data.len() as u64);
            prop_assert_eq!(entry.zip64, force_zip64);
            let read = archive.read_to_vec(0, &Password::new("prop")).unwrap();
            prop_assert_eq!(&read, &data);
        }
    }
}

proptest! {
    #[test]
    fn opening_garbage_never_panics(data in proptest::collection::vec(any::<u8>(), 0..512)) {
        let _ = ZipArchive::new(Cursor::new(data));
    }

    #[test]
    fn central_header_parse_never_panics(data in proptest::collection::vec(any::<u8>(), 0..256)) {
        let mut r = ByteReader::new(&data, 0);
        if let Ok(header) = CentralDirectoryHeader::parse(&mut r) {
            let _ = header.to_entry();
        }
    }

    #[test]
    fn extra_field_parse_never_panics(
        data in proptest::collection::vec(any::<u8>(), 0..128),
        uncompressed_size in any::<bool>(),
        compressed_size in any::<bool>(),
        header_offset in any::<bool>(),
        disk_number in any::<bool>(),
    ) {
        let expected = Zip64Fields { uncompressed_size, compressed_size, header_offset, disk_number };
        let _ = ExtraField::parse_all(&data, expected, 0);
    }

    #[test]
    fn dos_time_keeps_calendar_fields(
        year in 1980u16..=2107,
        month in 1u8..=12,
        day in 1u8..=28,
        hour in 0u8..24,
        minute in 0u8..60,
        second in 0u8..60,
    ) {
        let time = DosDateTime::from_parts(year, month, day, hour, minute, second).unwrap();
        prop_assert_eq!(time.year(), year);
        prop_assert_eq!(time.month(), month);
        prop_assert_eq!(time.day(), day);
        prop_assert_eq!(time.hour(), hour);
        prop_assert_eq!(time.minute(), minute);
        prop_assert_eq!(time.second(), second & !1);
    }
}
