//! Fuzz target for the strong encryption decryption header parser.
//!
//! A header that parses must account for exactly the bytes it consumed.
//!
//! Run with: cargo +nightly fuzz run decryption_header

#![no_main]

use libfuzzer_sys::fuzz_target;
use zipvault::crypto::strong::DecryptionHeader;

fuzz_target!(|data: &[u8]| {
    if let Ok((header, consumed)) = DecryptionHeader::from_bytes(data) {
        assert_eq!(header.encoded_len(), consumed);
    }
});
