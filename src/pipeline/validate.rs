//! File-type validation by magic bytes.
//!
//! The fetcher's retrieval strategies regularly "succeed" with the wrong
//! bytes: share hosts answer a video request with an HTML interstitial, or
//! an error page served as a tiny PNG. Trusting the claimed extension would
//! let those mis-downloads into the deck. This module inspects a small
//! prefix of the actual bytes and classifies the file independently of its
//! name — the final gate before any downloaded file is accepted.
//!
//! Pure inspection, no side effects; deletion of rejected files is the
//! caller's job.

use crate::slides::MediaKind;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Files smaller than this cannot hold any of the signatures we recognize
/// and are rejected outright (fail closed).
const MIN_VALID_BYTES: usize = 16;

/// How much of the file prefix is read for classification. Enough for every
/// signature below, including the `ftyp` box at offset 4 and an HTML doctype
/// behind leading whitespace or a BOM.
const PREFIX_LEN: usize = 256;

/// Classify the file at `path` as a valid instance of `kind`.
///
/// Reads only a small prefix. Any I/O error counts as invalid.
pub fn validate(path: &Path, kind: MediaKind) -> bool {
    let mut prefix = [0u8; PREFIX_LEN];
    let n = match File::open(path).and_then(|mut f| read_up_to(&mut f, &mut prefix)) {
        Ok(n) => n,
        Err(e) => {
            debug!("validate: cannot read {}: {}", path.display(), e);
            return false;
        }
    };
    let ok = matches_kind(&prefix[..n], kind);
    if !ok {
        debug!(
            "validate: {} rejected as {} (first bytes: {:02x?})",
            path.display(),
            kind.as_str(),
            &prefix[..n.min(8)]
        );
    }
    ok
}

/// Pure prefix classifier, split out so signatures are testable on byte
/// slices without touching the filesystem.
pub fn matches_kind(prefix: &[u8], kind: MediaKind) -> bool {
    if prefix.len() < MIN_VALID_BYTES {
        return false;
    }
    match kind {
        MediaKind::Image => is_png(prefix) || is_jpeg(prefix) || is_gif(prefix),
        MediaKind::Video => {
            // A PNG or an HTML document in place of a video means the fetch
            // got an error/interstitial page, not the file.
            if is_png(prefix) || looks_like_html(prefix) {
                return false;
            }
            is_mp4_family(prefix)
        }
    }
}

fn is_png(prefix: &[u8]) -> bool {
    prefix.starts_with(b"\x89PNG\r\n\x1a\n")
}

fn is_jpeg(prefix: &[u8]) -> bool {
    prefix.starts_with(&[0xFF, 0xD8, 0xFF])
}

fn is_gif(prefix: &[u8]) -> bool {
    prefix.starts_with(b"GIF8")
}

/// ISO base-media containers (MP4, MOV, M4V, 3GP) carry the `ftyp` box
/// marker at byte offset 4, after the 4-byte box-size field.
fn is_mp4_family(prefix: &[u8]) -> bool {
    prefix.len() >= 8 && &prefix[4..8] == b"ftyp"
}

/// Recognizable markup text: the prefix, after optional UTF-8 BOM and
/// whitespace, opens an HTML document. Also used by the fetcher to spot
/// interstitial pages served in place of binary content.
pub(crate) fn looks_like_html(prefix: &[u8]) -> bool {
    let body = prefix.strip_prefix(&[0xEF, 0xBB, 0xBF][..]).unwrap_or(prefix);
    let start = body
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(body.len());
    let body = &body[start..];
    let lowered: Vec<u8> = body.iter().take(16).map(u8::to_ascii_lowercase).collect();
    lowered.starts_with(b"<!doctype") || lowered.starts_with(b"<html")
}

/// `Read::read` may return short; loop until the buffer is full or EOF.
fn read_up_to(f: &mut File, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut total = 0;
    loop {
        match f.read(&mut buf[total..]) {
            Ok(0) => return Ok(total),
            Ok(n) => {
                total += n;
                if total == buf.len() {
                    return Ok(total);
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}
