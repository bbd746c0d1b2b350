//! Grouping of consecutive records into translation requests.
//!
//! A batch is at least `size` records long and may grow by up to `buffer`
//! records while looking for the end of a sentence, so a sentence is not cut in
//! half between two requests.

use tracing::debug;

use crate::codec::strip_markup;
use crate::config::{BatchConfig, FilterConfig};
use crate::subtitle::{SubtitleRecord, SubtitleStore};

const SENTENCE_ENDINGS: [char; 6] = ['.', '?', '!', ':', '"', '\''];

/// Records selected for one request. Borrowed from the store and dropped
/// before the response is written back.
#[derive(Debug, Clone)]
pub struct Batch<'a> {
    pub start_id: u32,
    /// Records that go into the request, in order
    pub records: Vec<&'a SubtitleRecord>,
    /// Ids inside the batch range held back by the skip rules
    pub skipped: Vec<u32>,
    /// First id after this batch
    pub next_id: u32,
}

impl Batch<'_> {
    /// Nothing to send (every record was held back)
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of records covered, sent or held back
    pub fn span(&self) -> u32 {
        self.next_id - self.start_id
    }
}

/// Summary of one batch, used for dry runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSpan {
    pub start_id: u32,
    pub end_id: u32,
    pub sent: usize,
    pub skipped: usize,
}

pub struct Batcher {
    config: BatchConfig,
    ignore_asterisks: bool,
    ignore_music_notes: bool,
}

impl Batcher {
    pub fn new(config: BatchConfig, filter: &FilterConfig) -> Self {
        Self {
            config,
            ignore_asterisks: filter.ignore_asterisks,
            ignore_music_notes: filter.ignore_music_notes,
        }
    }

    /// Select the batch starting at `start_id`
    pub fn next_batch<'a>(&self, store: &'a SubtitleStore, start_id: u32) -> Batch<'a> {
        let size = self.config.size.max(1);
        let limit = size + self.config.buffer;

        let mut id = start_id.max(1);
        let mut scanned = 0usize;
        let mut records = Vec::new();
        let mut skipped = Vec::new();
        let mut accumulated = String::new();

        while let Some(record) = store.get(id) {
            if self.is_held_back(record) {
                skipped.push(id);
            } else {
                records.push(record);
                accumulated.push(' ');
                accumulated.push_str(&strip_markup(&record.original_text));
            }
            scanned += 1;
            id += 1;

            if scanned < size {
                continue;
            }
            if scanned >= limit || at_sentence_boundary(&accumulated, store.get(id)) {
                break;
            }
        }

        debug!(
            "Batch {}..{}: {} to send, {} held back",
            start_id,
            id.saturating_sub(1),
            records.len(),
            skipped.len()
        );

        Batch {
            start_id,
            records,
            skipped,
            next_id: id,
        }
    }

    /// Walk the whole store the way the orchestrator would
    pub fn plan(&self, store: &SubtitleStore) -> Vec<BatchSpan> {
        let mut spans = Vec::new();
        let mut next_id = 1;

        while next_id <= store.last_id() {
            let batch = self.next_batch(store, next_id);
            spans.push(BatchSpan {
                start_id: batch.start_id,
                end_id: batch.next_id - 1,
                sent: batch.records.len(),
                skipped: batch.skipped.len(),
            });
            next_id = batch.next_id;
        }

        spans
    }

    /// Song lyrics and empty records stay in the store but are not sent
    fn is_held_back(&self, record: &SubtitleRecord) -> bool {
        let text = record.original_text.trim();
        text.is_empty()
            || (self.ignore_asterisks && text.starts_with('*'))
            || (self.ignore_music_notes && text.contains('♪'))
    }
}

/// True when the text collected so far ends a sentence, or the next record
/// starts a new one.
fn at_sentence_boundary(accumulated: &str, next: Option<&SubtitleRecord>) -> bool {
    let Some(next) = next else {
        return true;
    };

    if accumulated
        .trim_end()
        .chars()
        .last()
        .is_some_and(|c| SENTENCE_ENDINGS.contains(&c))
    {
        return true;
    }

    strip_markup(&next.original_text)
        .trim_start_matches(|c: char| c == '-' || c.is_whitespace())
        .chars()
        .next()
        .is_some_and(char::is_uppercase)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subtitle::{Timestamp, TimestampRange};

    fn store_of(texts: &[&str]) -> SubtitleStore {
        let mut store = SubtitleStore::new();
        for (i, text) in texts.iter().enumerate() {
            let start = i as u64 * 2_000;
            store.push(
                TimestampRange {
                    start: Timestamp::from_millis(start),
                    end: Timestamp::from_millis(start + 1_500),
                },
                *text,
            );
        }
        store
    }

    fn batcher(size: usize, buffer: usize) -> Batcher {
        Batcher::new(BatchConfig { size, buffer }, &FilterConfig::default())
    }

    fn ids(batch: &Batch<'_>) -> Vec<u32> {
        batch.records.iter().map(|r| r.id).collect()
    }

    #[test]
    fn test_extends_to_sentence_end_within_buffer() {
        let store = store_of(&[
            "one", "two", "three", "four", "five", "six", "seven ends here.", "Then more", "nine",
            "ten",
        ]);
        let batch = batcher(5, 3).next_batch(&store, 1);
        assert_eq!(ids(&batch), vec![1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(batch.next_id, 8);
    }

    #[test]
    fn test_buffer_caps_lookahead() {
        let store = store_of(&["a", "b", "c", "d", "e", "f", "g", "h", "i", "j"]);
        let batch = batcher(5, 3).next_batch(&store, 1);
        assert_eq!(batch.next_id, 9);
        assert_eq!(batch.span(), 8);
    }

    #[test]
    fn test_uppercase_next_record_is_boundary() {
        let store = store_of(&["a", "b", "c", "Dialog starts", "e"]);
        let batch = batcher(3, 3).next_batch(&store, 1);
        assert_eq!(ids(&batch), vec![1, 2, 3]);
    }

    #[test]
    fn test_dash_before_capital_still_boundary() {
        let store = store_of(&["a", "b", "-Who is it?", "d"]);
        let batch = batcher(2, 3).next_batch(&store, 1);
        assert_eq!(batch.next_id, 3);
    }

    #[test]
    fn test_markup_does_not_hide_sentence_end() {
        let store = store_of(&["a", "<i>done.</i>", "c", "d"]);
        let batch = batcher(2, 3).next_batch(&store, 1);
        assert_eq!(batch.next_id, 3);
    }

    #[test]
    fn test_music_is_held_back_but_spanned() {
        let store = store_of(&["a", "♪ la la ♪", "* sung *", "d."]);
        let batch = batcher(4, 0).next_batch(&store, 1);
        assert_eq!(ids(&batch), vec![1, 4]);
        assert_eq!(batch.skipped, vec![2, 3]);
        assert_eq!(batch.next_id, 5);
    }

    #[test]
    fn test_stops_at_end_of_store() {
        let store = store_of(&["a", "b"]);
        let batch = batcher(5, 3).next_batch(&store, 1);
        assert_eq!(batch.next_id, 3);
        let empty = batcher(5, 3).next_batch(&store, 3);
        assert!(empty.is_empty());
        assert_eq!(empty.next_id, 3);
    }

    #[test]
    fn test_plan_covers_every_record_once() {
        let store = store_of(&[
            "a", "b.", "c", "d", "E", "f", "g", "h", "i", "j", "k", "l.",
        ]);
        let spans = batcher(3, 2).plan(&store);
        assert_eq!(spans.first().unwrap().start_id, 1);
        assert_eq!(spans.last().unwrap().end_id, 12);
        for pair in spans.windows(2) {
            assert_eq!(pair[0].end_id + 1, pair[1].start_id);
        }
        let total: usize = spans.iter().map(|s| s.sent + s.skipped).sum();
        assert_eq!(total, 12);
    }
}
