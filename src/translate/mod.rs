// Batch translation loop
//
// One batch is in flight at a time. Each batch moves through
//
//   Pending -> Batched -> Sent -> Reconciled -> Pending(next) ... -> Done
//                          |  ^
//                          v  | backoff
//                         Failed -> Pending(next) once retries run out
//
// The store is written to the output file after every reconciled batch and
// once more at the end.

pub mod prompt;
pub mod retry;

use indicatif::{ProgressBar, ProgressStyle};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::batch::Batcher;
use crate::codec::{decode, encode, DecodeReport};
use crate::completion::CompletionClient;
use crate::config::{Config, Untranslated};
use crate::error::{Result, LingoError};
use crate::subtitle::SubtitleStore;

pub use prompt::build_translation_prompt;
pub use retry::{RetryPolicy, Sleeper, TokioSleeper};

static EPISODE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)s\d+e\d+").expect("episode regex is valid"));

const DEFAULT_LABEL: &str = "video";

/// Progress bar label for an input file: its episode tag ("S01E02") if the
/// file name carries one.
pub fn progress_label(input_path: &Path) -> String {
    input_path
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| EPISODE_REGEX.find(name))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| DEFAULT_LABEL.to_string())
}

/// Both sides of a reply whose line count differs from the request, one
/// `>` (sent) or `<` (received) line each
fn mismatch_details(sent: &str, received: &str) -> String {
    let sent = sent.lines().map(|l| format!("│ > {}", l));
    let received = received
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| format!("│ < {}", l.trim()));
    sent.chain(received).collect::<Vec<_>>().join("\n")
}

/// One encoded batch, ready to be (re)sent
#[derive(Debug, Clone)]
struct Request {
    first_id: u32,
    last_id: u32,
    next_id: u32,
    line_count: usize,
    /// Encoded lines, kept for mismatch reports
    sent: String,
    prompt: String,
}

impl Request {
    fn span(&self) -> u64 {
        (self.next_id - self.first_id) as u64
    }
}

#[derive(Debug)]
enum State {
    Pending { next_id: u32 },
    Batched { request: Request },
    Sent { request: Request, failures: u32, outcome: Result<String> },
    Failed { request: Request, failures: u32 },
    Reconciled { request: Request, decoded: DecodeReport },
    Done,
}

/// Counters for a finished run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrchestratorReport {
    /// Batches that needed a request
    pub batches: usize,
    pub reconciled: usize,
    /// Batches given up after the retry budget ran out
    pub failed: usize,
    /// Batches with nothing to send
    pub skipped: usize,
    /// Completion calls made, retries included
    pub attempts: usize,
    pub records_updated: usize,
}

pub struct Orchestrator {
    client: Box<dyn CompletionClient>,
    sleeper: Box<dyn Sleeper>,
    batcher: Batcher,
    retry: RetryPolicy,
    pacing: Duration,
    source_language: String,
    target_language: String,
    max_line_width: usize,
    untranslated: Untranslated,
    output_path: Option<PathBuf>,
    show_progress: bool,
    label: String,
}

impl Orchestrator {
    pub fn new(config: &Config, client: Box<dyn CompletionClient>, sleeper: Box<dyn Sleeper>) -> Self {
        Self {
            client,
            sleeper,
            batcher: Batcher::new(config.batch.clone(), &config.filter),
            retry: RetryPolicy::from_config(&config.retry),
            pacing: Duration::from_millis(config.retry.pacing_ms),
            source_language: config.completion.source_language.clone(),
            target_language: config.completion.target_language.clone(),
            max_line_width: config.output.max_line_width,
            untranslated: config.output.untranslated,
            output_path: None,
            show_progress: false,
            label: DEFAULT_LABEL.to_string(),
        }
    }

    /// Checkpoint the store to this file after every batch
    pub fn with_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(path.into());
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Translate the whole store, batch by batch
    pub async fn run(&self, store: &mut SubtitleStore) -> Result<OrchestratorReport> {
        info!(
            "Starting translation {} -> {} ({} records)",
            self.source_language,
            self.target_language,
            store.len()
        );

        let progress = self.progress_bar(store.len() as u64);
        let mut report = OrchestratorReport::default();
        let mut state = State::Pending { next_id: 1 };

        loop {
            state = match state {
                State::Pending { next_id } if next_id > store.last_id() => State::Done,
                State::Pending { next_id } => {
                    let batch = self.batcher.next_batch(store, next_id);
                    if batch.is_empty() {
                        report.skipped += 1;
                        progress.inc(batch.span() as u64);
                        State::Pending { next_id: batch.next_id }
                    } else {
                        let encoded = encode(&batch);
                        State::Batched {
                            request: Request {
                                first_id: batch.start_id,
                                last_id: batch.next_id - 1,
                                next_id: batch.next_id,
                                line_count: encoded.line_count,
                                prompt: build_translation_prompt(
                                    &self.source_language,
                                    &self.target_language,
                                    &encoded,
                                ),
                                sent: encoded.text,
                            },
                        }
                    }
                }
                State::Batched { request } => {
                    report.batches += 1;
                    info!(
                        "┌─ Batch {} (records {}-{}, {} lines) ────────",
                        report.batches, request.first_id, request.last_id, request.line_count
                    );
                    report.attempts += 1;
                    let outcome = self.client.complete(&request.prompt).await;
                    State::Sent { request, failures: 0, outcome }
                }
                State::Sent { request, failures, outcome } => {
                    match outcome.and_then(|text| self.reconcile(store, &request, &text)) {
                        Ok(decoded) => State::Reconciled { request, decoded },
                        Err(e) => {
                            warn!("│ Attempt {} failed: {}", failures + 1, e);
                            State::Failed { request, failures: failures + 1 }
                        }
                    }
                }
                State::Failed { request, failures } => {
                    if self.retry.should_retry(failures) {
                        let delay = self.retry.delay_for(failures);
                        warn!("│ Waiting {:?} before retrying", delay);
                        self.sleeper.sleep(delay).await;

                        report.attempts += 1;
                        let outcome = self.client.complete(&request.prompt).await;
                        State::Sent { request, failures, outcome }
                    } else {
                        warn!(
                            "└─ Giving up on records {}-{} after {} attempts",
                            request.first_id, request.last_id, failures
                        );
                        report.failed += 1;
                        progress.inc(request.span());
                        State::Pending { next_id: request.next_id }
                    }
                }
                State::Reconciled { request, decoded } => {
                    info!("└─ {} of {} lines reconciled", decoded.updated, request.line_count);
                    report.reconciled += 1;
                    report.records_updated += decoded.updated;

                    self.checkpoint(store).await?;
                    if !self.pacing.is_zero() {
                        self.sleeper.sleep(self.pacing).await;
                    }
                    progress.inc(request.span());
                    State::Pending { next_id: request.next_id }
                }
                State::Done => break,
            };
        }

        self.checkpoint(store).await?;
        progress.finish_with_message("done");

        info!(
            "Translation finished: {} batches, {} reconciled, {} failed, {} records translated",
            report.batches,
            report.reconciled,
            report.failed,
            store.translated_count()
        );
        Ok(report)
    }

    /// Judge a reply and write it into the store. Nothing is written unless
    /// the reply is usable.
    fn reconcile(&self, store: &mut SubtitleStore, request: &Request, text: &str) -> Result<DecodeReport> {
        let lines = text.lines().filter(|l| !l.trim().is_empty()).count();

        if lines == 0 {
            return Err(LingoError::Transport("no usable text in response".to_string()));
        }
        if lines < request.line_count.min(2) {
            return Err(LingoError::DegenerateResponse(format!(
                "{} line(s) returned for {} sent",
                lines, request.line_count
            )));
        }
        if lines != request.line_count {
            warn!(
                "│ Line count mismatch: sent {}, received {}\n{}",
                request.line_count,
                lines,
                mismatch_details(&request.sent, text)
            );
        }

        let decoded = decode(text, store, self.max_line_width);
        if decoded.updated == 0 {
            return Err(LingoError::DegenerateResponse(
                "no response line matched a known anchor".to_string(),
            ));
        }
        Ok(decoded)
    }

    async fn checkpoint(&self, store: &SubtitleStore) -> Result<()> {
        match &self.output_path {
            Some(path) => store.write_srt(path, self.untranslated).await,
            None => Ok(()),
        }
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len);
        let style = ProgressStyle::default_bar()
            .template("{prefix:<10} {spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} records ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        pb.set_style(style);
        pb.set_prefix(self.label.clone());
        pb
    }
}
