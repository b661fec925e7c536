//! Byte-range diagnostics for archive structures.
//!
//! Writers and readers accept an optional [`SpanRecorder`] and report the
//! region every structure occupies. The codecs themselves stay free of
//! bookkeeping; a recorder is a side channel that can be omitted.
//!
//! ```rust
//! use zipvault::format::span::{Span, SpanKind, SpanLog, SpanRecorder};
//!
//! let mut log = SpanLog::new();
//! log.record(Span::new(SpanKind::LocalHeader, Some(0), 0, 42));
//! assert_eq!(log.of_kind(SpanKind::LocalHeader).count(), 1);
//! ```

/// The structure a [`Span`] covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpanKind {
    /// `PK\x07\x08` marker at the start of a split archive.
    SplitMarker,
    /// Local file header including name and extra field.
    LocalHeader,
    /// PKWARE 12-byte header, AES salt and verifier, or strong decryption header.
    EncryptionHeader,
    /// Encrypted and/or compressed entry data.
    Payload,
    /// WinZip AES authentication code.
    AuthenticationCode,
    /// Data descriptor following the payload.
    DataDescriptor,
    /// One central directory file header.
    CentralHeader,
    /// Zip64 end of central directory record.
    Zip64EndRecord,
    /// Zip64 end of central directory locator.
    Zip64Locator,
    /// End of central directory record.
    EndOfCentralDirectory,
}

/// A recorded byte range `[start, end)`.
///
/// Offsets are logical archive offsets; for split archives they count from
/// the start of disk 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    /// What the range contains.
    pub kind: SpanKind,
    /// Index of the entry the range belongs to, if any.
    pub entry: Option<usize>,
    /// First byte.
    pub start: u64,
    /// One past the last byte.
    pub end: u64,
}

impl Span {
    /// Creates a span.
    pub fn new(kind: SpanKind, entry: Option<usize>, start: u64, end: u64) -> Self {
        Self {
            kind,
            entry,
            start,
            end,
        }
    }

    /// Length of the span in bytes.
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    /// Returns `true` for a zero-length span.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Receives spans as structures are read or written.
pub trait SpanRecorder {
    /// Records one span.
    fn record(&mut self, span: Span);
}

/// A flat, append-only list of spans.
#[derive(Debug, Clone, Default)]
pub struct SpanLog {
    spans: Vec<Span>,
}

impl SpanLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// All spans in recording order.
    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    /// Spans of one kind.
    pub fn of_kind(&self, kind: SpanKind) -> impl Iterator<Item = &Span> {
        self.spans.iter().filter(move |s| s.kind == kind)
    }

    /// Spans belonging to one entry.
    pub fn for_entry(&self, entry: usize) -> impl Iterator<Item = &Span> {
        self.spans.iter().filter(move |s| s.entry == Some(entry))
    }
}

impl SpanRecorder for SpanLog {
    fn record(&mut self, span: Span) {
        self.spans.push(span);
    }
}

impl<T: SpanRecorder + ?Sized> SpanRecorder for std::sync::Arc<std::sync::Mutex<T>> {
    fn record(&mut self, span: Span) {
        if let Ok(mut inner) = self.lock() {
            inner.record(span);
        }
    }
}

/// Spans of an entry's data region `[start, end)`.
///
/// The region holds the encryption header, the payload and the scheme
/// trailer; empty header and trailer spans are left out.
pub(crate) fn data_region(
    entry: usize,
    start: u64,
    end: u64,
    header_len: u64,
    trailer_len: u64,
) -> Vec<Span> {
    let payload_start = (start + header_len).min(end);
    let payload_end = end.saturating_sub(trailer_len).max(payload_start);
    let mut spans = Vec::with_capacity(3);
    if header_len > 0 {
        spans.push(Span::new(SpanKind::EncryptionHeader, Some(entry), start, payload_start));
    }
    spans.push(Span::new(SpanKind::Payload, Some(entry), payload_start, payload_end));
    if trailer_len > 0 {
        spans.push(Span::new(SpanKind::AuthenticationCode, Some(entry), payload_end, end));
    }
    spans
}
