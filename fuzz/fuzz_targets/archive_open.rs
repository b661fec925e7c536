//! Fuzz target for ZipArchive::new with arbitrary byte input.
//!
//! Exercises the end record search, the Zip64 locator and the central
//! directory parser, then reads every entry that opens.
//!
//! Run with: cargo +nightly fuzz run archive_open

#![no_main]

use libfuzzer_sys::fuzz_target;
use std::io::Cursor;
use zipvault::{Password, ZipArchive};

fuzz_target!(|data: &[u8]| {
    let Ok(mut archive) = ZipArchive::new(Cursor::new(data)) else {
        return;
    };
    let password = Password::new("fuzz");
    for index in 0..archive.len() {
        // Size fields are attacker controlled; skip entries that would
        // make the fuzzer run out of memory rather than find a bug.
        if archive.entries()[index].uncompressed_size > 1 << 24 {
            continue;
        }
        let _ = archive.encryption_header(index);
        let _ = archive.read_to_vec(index, &password);
    }
});
