//! SteamCMD output parsing.
//!
//! SteamCMD has no structured progress output; this module extracts a
//! progress signal from the raw text it prints. The parser is
//! intentionally lossy: chunks matching none of the known shapes produce
//! no signal at all (they remain visible on the log stream).

use regex::Regex;
use std::sync::LazyLock;

/// Explicit percentage token, e.g. `" 37%"`.
static PERCENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)(\d{1,3})%").unwrap());

/// `progress: 28.72` as printed by `app_update` state lines.
static PROGRESS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)progress:\s*(\d+(?:\.\d+)?)").unwrap());

/// `(bytesDone / bytesTotal)` fraction.
static FRACTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\((\d+)\s*/\s*(\d+)\)").unwrap());

/// Lifecycle keywords worth surfacing even without a percentage.
static KEYWORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Update state|Downloading|Validating|verifying update").unwrap());

/// One extracted progress signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressUpdate {
    /// A percentage was found. `message` is the most recent
    /// human-readable status line of the chunk.
    Percent { percent: u8, message: String },
    /// No percentage, but the chunk mentions a lifecycle phase.
    Status { message: String },
}

/// Parse a raw output chunk into zero or one progress signal.
///
/// Three extraction patterns are tried in order: an explicit `NN%`
/// token, a `progress: N.N` token, and a `(done / total)` fraction.
/// The first match wins. Percentages are clamped to `[0, 100]` and
/// rounded to the nearest integer.
pub fn parse_chunk(chunk: &str) -> Option<ProgressUpdate> {
    if chunk.is_empty() {
        return None;
    }
    let message = last_non_empty_line(chunk);
    if let Some(percent) = extract_percent(chunk) {
        Some(ProgressUpdate::Percent { percent, message })
    } else if KEYWORD_RE.is_match(chunk) {
        Some(ProgressUpdate::Status { message })
    } else {
        None
    }
}

fn extract_percent(text: &str) -> Option<u8> {
    let raw = if let Some(caps) = PERCENT_RE.captures(text) {
        caps[1].parse::<f64>().ok()?
    } else if let Some(caps) = PROGRESS_RE.captures(text) {
        caps[1].parse::<f64>().ok()?
    } else if let Some(caps) = FRACTION_RE.captures(text) {
        let done = caps[1].parse::<f64>().ok()?;
        let total = caps[2].parse::<f64>().ok()?;
        if total > 0.0 {
            done / total * 100.0
        } else {
            return None;
        }
    } else {
        return None;
    };

    if !raw.is_finite() {
        return None;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let percent = raw.clamp(0.0, 100.0).round() as u8;
    Some(percent)
}

/// The single most recent human-readable status line in a chunk.
///
/// SteamCMD redraws progress lines with carriage returns, so CRs are
/// normalized to newlines before taking the final non-empty segment.
fn last_non_empty_line(text: &str) -> String {
    text.replace('\r', "\n")
        .split('\n')
        .rev()
        .map(str::trim)
        .find(|segment| !segment.is_empty())
        .unwrap_or("")
        .to_string()
}
