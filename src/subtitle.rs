use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use tokio::fs;
use tracing::{debug, warn};

use crate::config::Untranslated;
use crate::error::{Result, LingoError};

static TIMESTAMP_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{2}):(\d{2}):(\d{2}),(\d{3})$").expect("timestamp regex is valid")
});

/// A presentation time in SRT notation (HH:MM:SS,mmm).
///
/// The fields are kept exactly as read, so formatting a parsed timestamp gives
/// back the original text. Anchors rely on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Timestamp {
    hours: u32,
    minutes: u32,
    seconds: u32,
    millis: u32,
}

impl Timestamp {
    pub fn from_millis(total_milliseconds: u64) -> Self {
        Self {
            hours: (total_milliseconds / 3_600_000) as u32,
            minutes: ((total_milliseconds % 3_600_000) / 60_000) as u32,
            seconds: ((total_milliseconds % 60_000) / 1_000) as u32,
            millis: (total_milliseconds % 1_000) as u32,
        }
    }
}

impl FromStr for Timestamp {
    type Err = LingoError;

    fn from_str(s: &str) -> Result<Self> {
        let caps = TIMESTAMP_REGEX
            .captures(s.trim())
            .ok_or_else(|| LingoError::Parse(format!("Invalid timestamp: {}", s)))?;

        // Each group is two or three ASCII digits, so these cannot overflow.
        let field = |i: usize| caps[i].parse::<u32>().unwrap_or(0);
        Ok(Self {
            hours: field(1),
            minutes: field(2),
            seconds: field(3),
            millis: field(4),
        })
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02},{:03}",
            self.hours, self.minutes, self.seconds, self.millis
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimestampRange {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl fmt::Display for TimestampRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} --> {}", self.start, self.end)
    }
}

/// One subtitle entry.
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleRecord {
    /// Dense id assigned at parse time, starting at 1
    pub id: u32,
    pub timestamps: TimestampRange,
    pub original_text: String,
    /// Empty until a batch reconciliation writes it
    pub translated_text: String,
}

impl SubtitleRecord {
    /// Key used to match a translated line back to this record
    pub fn anchor(&self) -> String {
        self.timestamps.start.to_string()
    }

    pub fn is_translated(&self) -> bool {
        !self.translated_text.is_empty()
    }
}

/// Ordered subtitle records plus the anchor index used for reconciliation.
#[derive(Debug, Default, Clone)]
pub struct SubtitleStore {
    records: Vec<SubtitleRecord>,
    anchors: HashMap<String, u32>,
}

impl SubtitleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record and return its id.
    ///
    /// A repeated start timestamp re-points the anchor to the newest record.
    pub fn push(&mut self, timestamps: TimestampRange, text: impl Into<String>) -> u32 {
        let id = self.records.len() as u32 + 1;
        let record = SubtitleRecord {
            id,
            timestamps,
            original_text: text.into(),
            translated_text: String::new(),
        };

        if let Some(previous) = self.anchors.insert(record.anchor(), id) {
            warn!(
                "Duplicate start timestamp {}: record {} shadows record {} for anchor lookups",
                record.anchor(),
                id,
                previous
            );
        }

        self.records.push(record);
        id
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Id of the last record, 0 for an empty store
    pub fn last_id(&self) -> u32 {
        self.records.len() as u32
    }

    pub fn get(&self, id: u32) -> Option<&SubtitleRecord> {
        id.checked_sub(1).and_then(|i| self.records.get(i as usize))
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut SubtitleRecord> {
        id.checked_sub(1).and_then(move |i| self.records.get_mut(i as usize))
    }

    pub fn records(&self) -> &[SubtitleRecord] {
        &self.records
    }

    pub fn id_for_anchor(&self, anchor: &str) -> Option<u32> {
        self.anchors.get(anchor).copied()
    }

    /// Replace the whole translation of one record
    pub fn set_translation(&mut self, id: u32, text: impl Into<String>) -> bool {
        match self.get_mut(id) {
            Some(record) => {
                record.translated_text = text.into();
                true
            }
            None => false,
        }
    }

    pub fn translated_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_translated()).count()
    }

    /// Render the store as SRT text, numbering records by id
    pub fn to_srt(&self, untranslated: Untranslated) -> String {
        let mut srt_content = String::new();

        for record in &self.records {
            let body = match (record.is_translated(), untranslated) {
                (true, _) => record.translated_text.as_str(),
                (false, Untranslated::Original) => record.original_text.as_str(),
                (false, Untranslated::Empty) => "",
            };

            srt_content.push_str(&format!(
                "{}\n{}\n{}\n\n",
                record.id,
                record.timestamps,
                body.trim()
            ));
        }

        srt_content
    }

    /// Rewrite the output file with the current state of the store.
    ///
    /// The content goes to a sibling temp file first and is renamed into place,
    /// so an interrupted run leaves the previous checkpoint intact.
    pub async fn write_srt<P: AsRef<Path>>(
        &self,
        output_path: P,
        untranslated: Untranslated,
    ) -> Result<()> {
        let output_path = output_path.as_ref();
        debug!("Writing SRT checkpoint: {}", output_path.display());

        let temp_path = output_path.with_extension("srt.tmp");
        fs::write(&temp_path, self.to_srt(untranslated)).await?;
        fs::rename(&temp_path, output_path).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(start: &str, end: &str) -> TimestampRange {
        TimestampRange {
            start: start.parse().unwrap(),
            end: end.parse().unwrap(),
        }
    }

    #[test]
    fn test_timestamp_roundtrip_text() {
        let ts: Timestamp = "01:01:01,500".parse().unwrap();
        assert_eq!(ts.to_string(), "01:01:01,500");
        assert_eq!(Timestamp::from_millis(65_123).to_string(), "00:01:05,123");
        assert_eq!(Timestamp::from_millis(0).to_string(), "00:00:00,000");
    }

    #[test]
    fn test_timestamp_rejects_garbage() {
        assert!("1:02:03,004".parse::<Timestamp>().is_err());
        assert!("00:00:01.000".parse::<Timestamp>().is_err());
    }

    #[test]
    fn test_push_assigns_dense_ids_and_anchors() {
        let mut store = SubtitleStore::new();
        let a = store.push(range("00:00:01,000", "00:00:02,000"), "Hello");
        let b = store.push(range("00:00:03,000", "00:00:04,000"), "World");
        assert_eq!((a, b), (1, 2));
        assert_eq!(store.last_id(), 2);
        assert_eq!(store.id_for_anchor("00:00:03,000"), Some(2));
        assert_eq!(store.id_for_anchor("00:00:05,000"), None);
        assert!(store.get(0).is_none());
        assert_eq!(store.get(1).unwrap().original_text, "Hello");
    }

    #[test]
    fn test_duplicate_anchor_latest_wins() {
        let mut store = SubtitleStore::new();
        store.push(range("00:00:01,000", "00:00:02,000"), "first");
        store.push(range("00:00:01,000", "00:00:02,500"), "second");
        assert_eq!(store.id_for_anchor("00:00:01,000"), Some(2));
    }

    #[test]
    fn test_to_srt_fallbacks() {
        let mut store = SubtitleStore::new();
        store.push(range("00:00:01,000", "00:00:02,000"), "Hello");
        store.push(range("00:00:03,000", "00:00:04,000"), "World");
        store.set_translation(1, "Szia");

        assert_eq!(
            store.to_srt(Untranslated::Empty),
            "1\n00:00:01,000 --> 00:00:02,000\nSzia\n\n2\n00:00:03,000 --> 00:00:04,000\n\n\n"
        );
        assert!(store.to_srt(Untranslated::Original).contains("World"));
        assert_eq!(store.translated_count(), 1);
    }

    #[tokio::test]
    async fn test_write_srt_replaces_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.srt");
        std::fs::write(&path, "stale").unwrap();

        let mut store = SubtitleStore::new();
        store.push(range("00:00:01,000", "00:00:02,000"), "Hello");
        store.write_srt(&path, Untranslated::Original).await.unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "1\n00:00:01,000 --> 00:00:02,000\nHello\n\n");
        assert!(!dir.path().join("out.srt.tmp").exists());
    }
}
