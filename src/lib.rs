//! srtlingo - SRT subtitle translation through LLM completion services
//!
//! Subtitles are parsed into a store, grouped into sentence-aware batches,
//! sent to a completion service as anchored lines and matched back by
//! timestamp, then re-wrapped to fit the screen.

pub mod cli;
pub mod config;
pub mod error;
pub mod subtitle;
pub mod parser;
pub mod batch;
pub mod codec;
pub mod reflow;
pub mod completion;
pub mod translate;
pub mod workflow;
