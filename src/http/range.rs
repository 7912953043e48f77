//! HTTP Range request parsing module
//!
//! Single-range `bytes` parsing for seekable video playback (RFC 7233).
//! A range that cannot be honored exactly is reported as unsatisfiable
//! rather than silently clamped to something the client did not ask for.

/// Outcome of parsing a `Range` header against a known file size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeOutcome {
    /// No Range header: serve the whole file
    Whole,
    /// Inclusive byte interval, `start <= end < total_size`
    Partial { start: u64, end: u64 },
    /// Respond 416 with `Content-Range: bytes */{total_size}`
    Unsatisfiable,
}

impl RangeOutcome {
    /// Number of body bytes for a partial response
    pub const fn len(self) -> Option<u64> {
        match self {
            Self::Partial { start, end } => Some(end - start + 1),
            _ => None,
        }
    }
}

/// Parsing options
#[derive(Debug, Clone, Copy, Default)]
pub struct RangeOptions {
    /// Read `bytes=N-0` as "no end given" instead of the literal byte 0
    pub legacy_zero_end: bool,
}

/// Parse a `Range` header value
///
/// Supported forms:
/// - `bytes=start-end` - specific range, `end` clamped to the last byte
/// - `bytes=start-` and `bytes=start` - from start to end of file
/// - `bytes=-suffix` - last `suffix` bytes
///
/// Only the first range of a multi-range request is honored.
///
/// # Examples
/// ```
/// use vidstream::http::range::{parse_range, RangeOptions, RangeOutcome};
///
/// let opts = RangeOptions::default();
/// assert_eq!(
///     parse_range(Some("bytes=0-99"), 1000, opts),
///     RangeOutcome::Partial { start: 0, end: 99 }
/// );
/// assert_eq!(parse_range(None, 1000, opts), RangeOutcome::Whole);
/// ```
pub fn parse_range(header: Option<&str>, total_size: u64, opts: RangeOptions) -> RangeOutcome {
    let Some(header) = header else {
        return RangeOutcome::Whole;
    };
    if total_size == 0 {
        return RangeOutcome::Unsatisfiable;
    }
    let last = total_size - 1;

    let spec = header.trim();
    let spec = spec.strip_prefix("bytes=").unwrap_or(spec);
    let spec = spec.split(',').next().unwrap_or_default().trim();

    let (start, end) = match spec.split_once('-') {
        None => match parse_pos(spec) {
            Some(start) => (start, last),
            None => return RangeOutcome::Unsatisfiable,
        },
        Some((first, second)) => {
            let (first, second) = (first.trim(), second.trim());
            if first.is_empty() {
                return suffix_range(second, total_size);
            }
            let Some(start) = parse_pos(first) else {
                return RangeOutcome::Unsatisfiable;
            };
            let end = if second.is_empty() {
                last
            } else {
                match parse_pos(second) {
                    Some(0) if opts.legacy_zero_end => last,
                    Some(end) => end.min(last),
                    None => return RangeOutcome::Unsatisfiable,
                }
            };
            (start, end)
        }
    };

    if start > end || end >= total_size {
        return RangeOutcome::Unsatisfiable;
    }
    RangeOutcome::Partial { start, end }
}

/// Suffix range (e.g. `-500`), zero-length suffixes are unsatisfiable
fn suffix_range(suffix: &str, total_size: u64) -> RangeOutcome {
    match parse_pos(suffix) {
        Some(0) | None => RangeOutcome::Unsatisfiable,
        Some(n) => RangeOutcome::Partial {
            start: total_size.saturating_sub(n),
            end: total_size - 1,
        },
    }
}

/// Digits only; `u64::from_str` would also accept a leading `+`
fn parse_pos(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}
