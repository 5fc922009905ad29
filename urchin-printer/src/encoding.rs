//! Character encoding utilities for thermal printers
//!
//! Chinese thermal printers expect GBK-encoded text; most western ones
//! take plain UTF-8 (or at least pass high bytes through untouched).
//! This module provides:
//! - Calculating GBK cell widths for column layout
//! - Truncating/padding strings to GBK widths
//! - Converting UTF-8 payloads to GBK while preserving ESC/POS commands

use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Printer character encoding, persisted as part of the print policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptEncoding {
    /// GBK code page (Chinese thermal printers)
    #[default]
    Gbk,
    /// UTF-8 passthrough
    Utf8,
}

/// Encode a rendered ESC/POS payload for the wire.
///
/// GBK mode rewrites multi-byte text while keeping control bytes intact;
/// UTF-8 mode sends the payload as is.
pub fn encode_payload(bytes: &[u8], encoding: ReceiptEncoding) -> Vec<u8> {
    match encoding {
        ReceiptEncoding::Gbk => convert_to_gbk(bytes),
        ReceiptEncoding::Utf8 => bytes.to_vec(),
    }
}

/// Get the GBK byte width of a string
///
/// Chinese characters are typically 2 bytes in GBK, ASCII is 1 byte.
pub fn gbk_width(s: &str) -> usize {
    let (cow, _, _) = encoding_rs::GBK.encode(s);
    cow.len()
}

/// Truncate a string to fit within a GBK byte width
pub fn truncate_gbk(s: &str, max_width: usize) -> String {
    let mut width = 0;
    let mut result = String::new();
    for c in s.chars() {
        let s_char = c.to_string();
        let (cow, _, _) = encoding_rs::GBK.encode(&s_char);
        let char_len = cow.len();

        if width + char_len > max_width {
            break;
        }
        result.push(c);
        width += char_len;
    }
    result
}

/// Pad a string to a specific GBK byte width
///
/// If the string is longer than the width, it will be truncated.
pub fn pad_gbk(s: &str, width: usize, align_right: bool) -> String {
    let current_width = gbk_width(s);
    if current_width >= width {
        return truncate_gbk(s, width);
    }
    let spaces = width - current_width;
    if align_right {
        format!("{}{}", " ".repeat(spaces), s)
    } else {
        format!("{}{}", s, " ".repeat(spaces))
    }
}

/// Convert mixed UTF-8 content (with ESC/POS commands) to GBK
///
/// ASCII bytes (0x00-0x7F) are preserved exactly as is, which protects
/// ESC/POS commands from being corrupted. Only bytes >= 0x80 are treated
/// as UTF-8 sequences and converted to GBK.
///
/// Also handles:
/// - Re-enabling Chinese mode after INIT command (ESC @)
/// - Euro symbol (€) special handling
#[instrument(skip(bytes))]
pub fn convert_to_gbk(bytes: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(bytes.len() * 2);

    // Enable Chinese mode at the start
    // FS & (0x1C 0x26) - Enable Chinese mode
    // FS C 1 (0x1C 0x43 0x01) - Select GBK code page
    result.extend_from_slice(&[0x1C, 0x26, 0x1C, 0x43, 0x01]);

    let mut buffer = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];

        // INIT (ESC @ = 0x1B 0x40) resets the code page, so Chinese mode
        // must be re-enabled right after it
        if b == 0x1B && i + 1 < bytes.len() && bytes[i + 1] == 0x40 {
            flush_buffer(&mut buffer, &mut result);

            result.push(0x1B);
            result.push(0x40);
            result.extend_from_slice(&[0x1C, 0x26]);

            i += 2;
            continue;
        }

        if b < 128 {
            // ASCII byte (command or ASCII text)
            flush_buffer(&mut buffer, &mut result);
            result.push(b);
        } else {
            // Part of a UTF-8 multi-byte sequence
            buffer.push(b);
        }
        i += 1;
    }

    flush_buffer(&mut buffer, &mut result);

    // Exit Chinese mode at the end
    // FS . (0x1C 0x2E)
    result.extend_from_slice(&[0x1C, 0x2E]);

    result
}

/// Flush the non-ASCII buffer, converting UTF-8 to GBK
fn flush_buffer(buffer: &mut Vec<u8>, result: &mut Vec<u8>) {
    if buffer.is_empty() {
        return;
    }

    let s = String::from_utf8_lossy(buffer);
    let parts: Vec<&str> = s.split('€').collect();

    for (idx, part) in parts.iter().enumerate() {
        if !part.is_empty() {
            let (gbk, _, _) = encoding_rs::GBK.encode(part);
            result.extend_from_slice(&gbk);
        }
        if idx < parts.len() - 1 {
            // Inject Euro sequence: exit Chinese -> PC858 -> Euro -> enter Chinese
            result.extend_from_slice(&[0x1C, 0x2E, 0x1B, 0x74, 19, 0xD5, 0x1C, 0x26]);
        }
    }
    buffer.clear();
}
