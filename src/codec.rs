//! Line protocol spoken with the completion service.
//!
//! Every record of a batch goes out as one line prefixed with its timestamp
//! range in square brackets:
//!
//! ```text
//! [00:00:01,000 --> 00:00:02,500] Where were you last night?
//! ```
//!
//! The start timestamp is the anchor. Replies are matched back to records by
//! that anchor alone, so the service may drop, reorder or repeat lines without
//! a translation landing on the wrong subtitle.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::batch::Batch;
use crate::reflow::{reflow, split_dialog};
use crate::subtitle::SubtitleStore;

static MARKUP_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<[^<>\n]*>").expect("markup regex is valid"));

static RANGE_LINE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[\s*([^\]]*?)\s*-->\s*[^\]]*\]\s*(.*)$").expect("range line regex is valid")
});

static BARE_LINE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[\s*([^\]]+?)\s*\]\s*(.*)$").expect("bare line regex is valid"));

const ENTITIES: [(&str, &str); 6] = [
    ("&nbsp;", " "),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&#39;", "'"),
    ("&amp;", "&"),
];

/// Request text for one batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedBatch {
    pub text: String,
    pub line_count: usize,
}

/// Outcome of writing one reply back into the store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeReport {
    /// Distinct records whose translation was written
    pub updated: usize,
    /// Non-empty lines without a recognizable anchor
    pub unmatched: usize,
    /// Anchored lines whose anchor is not in the store
    pub unknown_anchor: usize,
    /// Non-empty lines in the reply
    pub lines: usize,
}

/// Remove HTML-ish tags and decode the few entities subtitles use
pub fn strip_markup(text: &str) -> String {
    let mut plain = MARKUP_REGEX.replace_all(text, "").into_owned();
    for (entity, replacement) in ENTITIES {
        if plain.contains(entity) {
            plain = plain.replace(entity, replacement);
        }
    }
    plain
}

/// Serialize the sendable records of a batch, one anchored line each
pub fn encode(batch: &Batch<'_>) -> EncodedBatch {
    let lines: Vec<String> = batch
        .records
        .iter()
        .map(|record| {
            let flattened = record
                .original_text
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            format!("[{}] {}", record.timestamps, flattened)
        })
        .collect();

    EncodedBatch {
        line_count: lines.len(),
        text: strip_markup(&lines.join("\n")),
    }
}

/// Split one reply line into its anchor and text
fn parse_line(line: &str) -> Option<(&str, &str)> {
    let caps = RANGE_LINE_REGEX
        .captures(line)
        .or_else(|| BARE_LINE_REGEX.captures(line))?;
    let anchor = caps.get(1)?.as_str();
    let text = caps.get(2)?.as_str().trim();
    Some((anchor, text))
}

/// Lay out one translated line: dialog split, or reflow to `max_width`
pub fn format_translation(text: &str, max_width: usize) -> String {
    split_dialog(text).unwrap_or_else(|| reflow(text, max_width))
}

/// Write every recognizable line of `response` into the record its anchor
/// names. Lines are handled independently of each other and of their
/// position; a later line for the same anchor replaces an earlier one.
pub fn decode(response: &str, store: &mut SubtitleStore, max_width: usize) -> DecodeReport {
    let mut report = DecodeReport::default();
    let mut updated = HashSet::new();

    for line in response.lines().map(str::trim).filter(|l| !l.is_empty()) {
        report.lines += 1;

        let Some((anchor, text)) = parse_line(line).filter(|(_, text)| !text.is_empty()) else {
            warn!("Ignoring reply line without anchor: {}", line);
            report.unmatched += 1;
            continue;
        };

        let Some(id) = store.id_for_anchor(anchor) else {
            warn!("Ignoring reply line with unknown anchor [{}]: {}", anchor, text);
            report.unknown_anchor += 1;
            continue;
        };

        let translated = format_translation(text, max_width);
        debug!("Record {} <- {}", id, translated.replace('\n', " | "));
        store.set_translation(id, translated);
        updated.insert(id);
    }

    report.updated = updated.len();
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::Batcher;
    use crate::config::{BatchConfig, FilterConfig};
    use crate::subtitle::{Timestamp, TimestampRange};

    fn store_of(texts: &[&str]) -> SubtitleStore {
        let mut store = SubtitleStore::new();
        for (i, text) in texts.iter().enumerate() {
            let start = 1_000 + i as u64 * 3_000;
            store.push(
                TimestampRange {
                    start: Timestamp::from_millis(start),
                    end: Timestamp::from_millis(start + 2_000),
                },
                *text,
            );
        }
        store
    }

    fn whole_store_batch(store: &SubtitleStore) -> Batch<'_> {
        let batcher = Batcher::new(
            BatchConfig {
                size: store.len(),
                buffer: 0,
            },
            &FilterConfig::default(),
        );
        batcher.next_batch(store, 1)
    }

    #[test]
    fn test_encode_flattens_and_strips_markup() {
        let store = store_of(&["<i>Hello</i>\nthere", "Tom &amp; Jerry", "♪ la la ♪"]);
        let encoded = encode(&whole_store_batch(&store));
        assert_eq!(encoded.line_count, 2);
        assert_eq!(
            encoded.text,
            "[00:00:01,000 --> 00:00:03,000] Hello there\n[00:00:04,000 --> 00:00:06,000] Tom & Jerry"
        );
    }

    #[test]
    fn test_decode_is_order_independent() {
        let mut store = store_of(&["one", "two"]);
        let response = "[00:00:04,000 --> 00:00:06,000] kettő\n[00:00:01,000 --> 00:00:03,000] egy";
        let report = decode(response, &mut store, 40);
        assert_eq!(report.updated, 2);
        assert_eq!(store.get(1).unwrap().translated_text, "egy");
        assert_eq!(store.get(2).unwrap().translated_text, "kettő");
    }

    #[test]
    fn test_decode_missing_lines_leave_records_untouched() {
        let texts: Vec<String> = (1..=10).map(|i| format!("line {}", i)).collect();
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let mut store = store_of(&refs);
        store.set_translation(4, "previous");

        let response: String = store
            .records()
            .iter()
            .filter(|r| r.id != 4 && r.id != 9)
            .map(|r| format!("[{}] fordítás {}\n", r.timestamps, r.id))
            .collect();

        let report = decode(&response, &mut store, 40);
        assert_eq!(report.updated, 8);
        assert_eq!(store.get(4).unwrap().translated_text, "previous");
        assert_eq!(store.get(9).unwrap().translated_text, "");
        assert_eq!(store.get(10).unwrap().translated_text, "fordítás 10");
    }

    #[test]
    fn test_decode_counts_noise() {
        let mut store = store_of(&["one"]);
        let response = "Sure! Here is the translation:\n\
                        [00:00:01,000 --> 00:00:03,000] egy\n\
                        [00:09:09,000 --> 00:09:10,000] ghost\n\
                        [00:00:01,000 --> 00:00:03,000] egy újra";
        let report = decode(response, &mut store, 40);
        assert_eq!(
            report,
            DecodeReport {
                updated: 1,
                unmatched: 1,
                unknown_anchor: 1,
                lines: 4
            }
        );
        assert_eq!(store.get(1).unwrap().translated_text, "egy újra");
    }

    #[test]
    fn test_decode_accepts_bare_anchor() {
        let mut store = store_of(&["one"]);
        let report = decode("[00:00:01,000] egy", &mut store, 40);
        assert_eq!(report.updated, 1);
    }

    #[test]
    fn test_decode_splits_dialog_and_reflows() {
        let mut store = store_of(&["a", "b"]);
        let response = "[00:00:01,000 --> 00:00:03,000] -Hello there. -Goodbye now.\n\
                        [00:00:04,000 --> 00:00:06,000] this translated line is rather long";
        decode(response, &mut store, 20);
        assert_eq!(store.get(1).unwrap().translated_text, "-Hello there.\n-Goodbye now.");
        assert_eq!(
            store.get(2).unwrap().translated_text,
            "this translated line\nis rather long"
        );
    }
}
