//! SRT text to [`SubtitleStore`], dropping non-dialog cues on the way.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

use crate::config::FilterConfig;
use crate::error::{Result, LingoError};
use crate::subtitle::{SubtitleStore, TimestampRange};

/// Sequence number line followed by a timestamp range line. Anything after the
/// end timestamp (position hints) is ignored.
static BLOCK_HEADER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*\d+[ \t]*\n(\d{2}:\d{2}:\d{2},\d{3}) --> (\d{2}:\d{2}:\d{2},\d{3})[^\n]*$")
        .expect("block header regex is valid")
});

static BRACKET_SPAN_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[[^\]\n]*\]").expect("bracket regex is valid"));

static SPACE_RUN_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t]{2,}").expect("space regex is valid"));

/// Why a block did not make it into the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    AllCaps,
    Bracketed,
    EmptyAfterStripping,
}

pub struct SrtParser {
    config: FilterConfig,
    all_caps: Regex,
}

impl SrtParser {
    pub fn new(config: FilterConfig) -> Result<Self> {
        let all_caps = Regex::new(&config.all_caps_pattern)
            .map_err(|e| LingoError::Config(format!("Invalid all-caps pattern: {}", e)))?;
        Ok(Self { config, all_caps })
    }

    /// Parse raw SRT text. Fails when no block survives.
    pub fn parse(&self, raw_text: &str) -> Result<SubtitleStore> {
        let normalized = raw_text.replace("\r\n", "\n");
        let text = normalized.trim_start_matches('\u{FEFF}');

        let headers: Vec<_> = BLOCK_HEADER_REGEX.captures_iter(text).collect();
        if headers.is_empty() {
            return Err(LingoError::Parse("no subtitle blocks found".to_string()));
        }

        let mut store = SubtitleStore::new();
        let mut skipped = 0usize;

        for (i, caps) in headers.iter().enumerate() {
            let header = caps.get(0).map(|m| m.end()).unwrap_or(0);
            let body_end = headers
                .get(i + 1)
                .and_then(|next| next.get(0))
                .map(|m| m.start())
                .unwrap_or(text.len());
            let body = text[header..body_end].trim();

            let timestamps = TimestampRange {
                start: caps[1].parse()?,
                end: caps[2].parse()?,
            };

            match self.filter_body(body) {
                Ok(kept) => {
                    store.push(timestamps, kept);
                }
                Err(reason) => {
                    debug!("Skipping {:?} cue at {}: {}", reason, timestamps.start, body);
                    skipped += 1;
                }
            }
        }

        if store.is_empty() {
            return Err(LingoError::Parse(format!(
                "all {} subtitle blocks were filtered out",
                headers.len()
            )));
        }

        info!(
            "Parsed {} subtitle records ({} non-dialog cues skipped)",
            store.len(),
            skipped
        );
        Ok(store)
    }

    fn filter_body(&self, body: &str) -> std::result::Result<String, Rejection> {
        if self.config.skip_all_caps && self.all_caps.is_match(body) {
            return Err(Rejection::AllCaps);
        }

        if self.config.skip_square_brackets && body.starts_with('[') && body.ends_with(']') {
            return Err(Rejection::Bracketed);
        }

        if self.config.strip_partial_brackets && BRACKET_SPAN_REGEX.is_match(body) {
            let stripped = strip_bracket_spans(body);
            if stripped.is_empty() {
                return Err(Rejection::EmptyAfterStripping);
            }
            return Ok(stripped);
        }

        Ok(body.to_string())
    }
}

/// Remove `[...]` spans and tidy the whitespace left behind
fn strip_bracket_spans(body: &str) -> String {
    let without = BRACKET_SPAN_REGEX.replace_all(body, "");
    SPACE_RUN_REGEX
        .replace_all(&without, " ")
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse with a one-off parser
pub fn parse(raw_text: &str, config: &FilterConfig) -> Result<SubtitleStore> {
    SrtParser::new(config.clone())?.parse(raw_text)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\u{FEFF}1\n\
00:00:01,000 --> 00:00:02,000\n\
Hello there.\n\
\n\
2\n\
00:00:03,000 --> 00:00:04,000\n\
LAUGHING\n\
\n\
3\n\
00:00:05,000 --> 00:00:06,000\n\
[Cheering]\n\
\n\
4\n\
00:00:07,000 --> 00:00:08,500\n\
Hello [sound] world\n\
\n\
5\n\
00:00:09,000 --> 00:00:10,000\n\
Two lines\n\
of dialog\n";

    #[test]
    fn test_parse_filters_cues() {
        let store = parse(SAMPLE, &FilterConfig::default()).unwrap();
        let texts: Vec<_> = store.records().iter().map(|r| r.original_text.as_str()).collect();
        assert_eq!(texts, vec!["Hello there.", "Hello world", "Two lines\nof dialog"]);

        let ids: Vec<_> = store.records().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(store.get(2).unwrap().timestamps.to_string(), "00:00:07,000 --> 00:00:08,500");
    }

    #[test]
    fn test_bom_does_not_hide_first_block() {
        let store = parse(SAMPLE, &FilterConfig::default()).unwrap();
        assert_eq!(store.id_for_anchor("00:00:01,000"), Some(1));
    }

    #[test]
    fn test_filters_can_be_disabled() {
        let config = FilterConfig {
            skip_all_caps: false,
            skip_square_brackets: false,
            strip_partial_brackets: false,
            ..FilterConfig::default()
        };
        let store = parse(SAMPLE, &config).unwrap();
        assert_eq!(store.len(), 5);
        assert_eq!(store.get(2).unwrap().original_text, "LAUGHING");
        assert_eq!(store.get(4).unwrap().original_text, "Hello [sound] world");
    }

    #[test]
    fn test_accented_all_caps_is_a_cue() {
        let raw = "1\n00:00:01,000 --> 00:00:02,000\nÉNEKEL!\n\n2\n00:00:03,000 --> 00:00:04,000\nOK\n";
        let store = parse(raw, &FilterConfig::default()).unwrap();
        // Two letters are below the detector's minimum length
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(1).unwrap().original_text, "OK");
    }

    #[test]
    fn test_crlf_input() {
        let raw = "1\r\n00:00:01,000 --> 00:00:02,000\r\nHi\r\nthere\r\n\r\n";
        let store = parse(raw, &FilterConfig::default()).unwrap();
        assert_eq!(store.get(1).unwrap().original_text, "Hi\nthere");
    }

    #[test]
    fn test_no_blocks_is_parse_error() {
        let err = parse("just some text\n", &FilterConfig::default()).unwrap_err();
        assert!(matches!(err, LingoError::Parse(_)));
    }

    #[test]
    fn test_everything_filtered_is_parse_error() {
        let raw = "1\n00:00:01,000 --> 00:00:02,000\n[Music]\n";
        assert!(matches!(
            parse(raw, &FilterConfig::default()),
            Err(LingoError::Parse(_))
        ));
    }

    #[test]
    fn test_bracket_only_spans_empty_record_skipped() {
        let raw = "1\n00:00:01,000 --> 00:00:02,000\n[door] [bang]\n\n2\n00:00:03,000 --> 00:00:04,000\nFine.\n";
        let store = parse(raw, &FilterConfig::default()).unwrap();
        assert_eq!(store.len(), 1);
    }
}
