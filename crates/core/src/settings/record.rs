//! On-flash entry format
//!
//! Every stored value is an entry appended to the active region:
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │ Info: u32 = key (bits 0-15) | length (16-31) │  Offset: 0
//! ├───────────────────────────────────────────────┤
//! │ Successor: u32 (0xFFFFFFFF until replaced)   │  Offset: 4
//! ├───────────────────────────────────────────────┤
//! │ Payload: ceil(length / 4) words              │  Offset: 8
//! │   little-endian, final word zero-padded      │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! An info word with either half set to `0xFFFF` marks blank flash (end of
//! written data). The successor word is the only field ever programmed after
//! the entry is complete; it receives the address of the next version of the
//! same key.

use super::layout::{ERASED_WORD, WORD_SIZE};

/// Number of header words (info + successor)
pub const HEADER_WORDS: u32 = 2;

/// Header size in bytes
pub const HEADER_SIZE: u32 = HEADER_WORDS * WORD_SIZE;

/// Reserved key value (erased flash)
pub const BLANK_KEY: u16 = 0xFFFF;

/// Reserved length value (erased flash)
pub const BLANK_LENGTH: u16 = 0xFFFF;

/// Successor value of an entry that has not been replaced
pub const NO_SUCCESSOR: u32 = ERASED_WORD;

/// Largest payload an entry header can describe
pub const MAX_PAYLOAD_LEN: usize = BLANK_LENGTH as usize - 1;

/// Number of payload words for `length` bytes
pub fn payload_words(length: u16) -> u32 {
    u32::from(length).div_ceil(WORD_SIZE)
}

/// Total entry size in words, header included
pub fn entry_words(length: u16) -> u32 {
    HEADER_WORDS + payload_words(length)
}

/// Total entry size in bytes, header included
pub fn entry_size(length: u16) -> u32 {
    entry_words(length) * WORD_SIZE
}

/// Decoded entry header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryHeader {
    /// Setting identifier
    pub key: u16,
    /// Payload length in bytes
    pub length: u16,
    /// Address of the next version, or `NO_SUCCESSOR`
    pub successor: u32,
}

impl EntryHeader {
    /// Create a header for a fresh entry (no successor yet)
    pub fn new(key: u16, length: u16) -> Self {
        Self {
            key,
            length,
            successor: NO_SUCCESSOR,
        }
    }

    /// Pack key and length into the info word
    pub fn info_word(&self) -> u32 {
        u32::from(self.key) | (u32::from(self.length) << 16)
    }

    /// Decode a header from its two words
    ///
    /// Returns `None` if the info word marks blank flash.
    pub fn decode(info: u32, successor: u32) -> Option<Self> {
        if is_blank_info(info) {
            return None;
        }

        Some(Self {
            key: info as u16,
            length: (info >> 16) as u16,
            successor,
        })
    }

    /// Whether a newer version of this key has been linked
    pub fn has_successor(&self) -> bool {
        self.successor != NO_SUCCESSOR
    }

    /// Entry size in bytes
    pub fn size(&self) -> u32 {
        entry_size(self.length)
    }
}

/// Whether an info word describes blank flash rather than an entry
pub fn is_blank_info(info: u32) -> bool {
    info as u16 == BLANK_KEY || (info >> 16) as u16 == BLANK_LENGTH
}

/// Encode up to one word of payload, zero-padding the unused bytes
pub fn encode_chunk(chunk: &[u8]) -> u32 {
    let mut bytes = [0u8; WORD_SIZE as usize];
    let len = chunk.len().min(bytes.len());
    bytes[..len].copy_from_slice(&chunk[..len]);
    u32::from_le_bytes(bytes)
}

/// Copy the leading bytes of a stored payload word into `out`
///
/// At most one word worth of bytes is copied; returns the number written.
pub fn decode_chunk(word: u32, out: &mut [u8]) -> usize {
    let bytes = word.to_le_bytes();
    let len = out.len().min(bytes.len());
    out[..len].copy_from_slice(&bytes[..len]);
    len
}

/// Clear the padding bytes of the final payload word
///
/// `valid` is the number of meaningful bytes in the word (1..=4).
pub fn mask_padding(word: u32, valid: usize) -> u32 {
    match valid {
        0 => 0,
        1..=3 => word & ((1u32 << (valid * 8)) - 1),
        _ => word,
    }
}

/// Iterator over the payload words of a value, in program order
pub struct PayloadWords<'a> {
    chunks: core::slice::Chunks<'a, u8>,
}

impl<'a> PayloadWords<'a> {
    /// Split `payload` into zero-padded words
    pub fn new(payload: &'a [u8]) -> Self {
        Self {
            chunks: payload.chunks(WORD_SIZE as usize),
        }
    }
}

impl Iterator for PayloadWords<'_> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        self.chunks.next().map(encode_chunk)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.chunks.size_hint()
    }
}

impl ExactSizeIterator for PayloadWords<'_> {}
