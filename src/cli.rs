use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::{Config, Provider};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Translate an SRT file through the completion service
    Translate {
        /// Input SRT file
        #[arg(short, long)]
        input: PathBuf,

        /// Output SRT file, rewritten after every batch
        #[arg(short, long, default_value = "output.srt")]
        output: PathBuf,

        /// Language of the input file
        #[arg(short = 's', long)]
        source_lang: Option<String>,

        /// Language to translate into
        #[arg(short = 't', long)]
        target_lang: Option<String>,

        /// API key for the completion service
        #[arg(short = 'k', long, env = "SRTLINGO_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        /// Break translated lines longer than this
        #[arg(short = 'w', long)]
        max_width: Option<usize>,

        /// Nominal number of subtitles sent together
        #[arg(short = 'b', long)]
        batch_size: Option<usize>,

        /// Extra subtitles a batch may take to reach the end of a sentence
        #[arg(long)]
        buffer: Option<usize>,

        /// Completion service
        #[arg(long, value_enum)]
        provider: Option<ProviderArg>,

        /// Model name
        #[arg(short, long)]
        model: Option<String>,

        /// Service base URL
        #[arg(long)]
        endpoint: Option<String>,
    },

    /// Parse an SRT file and print the batches it would be sent in
    Plan {
        /// Input SRT file
        #[arg(short, long)]
        input: PathBuf,

        /// Nominal number of subtitles sent together
        #[arg(short = 'b', long)]
        batch_size: Option<usize>,

        /// Extra subtitles a batch may take to reach the end of a sentence
        #[arg(long)]
        buffer: Option<usize>,
    },

    /// Write the default configuration to a file
    InitConfig {
        /// Destination file
        #[arg(short, long, default_value = "srtlingo.toml")]
        output: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ProviderArg {
    Ollama,
    Openai,
}

impl From<ProviderArg> for Provider {
    fn from(arg: ProviderArg) -> Self {
        match arg {
            ProviderArg::Ollama => Provider::Ollama,
            ProviderArg::Openai => Provider::OpenAi,
        }
    }
}

/// Command line values that override the configuration file
#[derive(Debug, Default)]
pub struct Overrides {
    pub source_lang: Option<String>,
    pub target_lang: Option<String>,
    pub api_key: Option<String>,
    pub max_width: Option<usize>,
    pub batch_size: Option<usize>,
    pub buffer: Option<usize>,
    pub provider: Option<ProviderArg>,
    pub model: Option<String>,
    pub endpoint: Option<String>,
}

impl Overrides {
    pub fn apply(self, config: &mut Config) {
        if let Some(lang) = self.source_lang {
            config.completion.source_language = lang;
        }
        if let Some(lang) = self.target_lang {
            config.completion.target_language = lang;
        }
        if let Some(key) = self.api_key {
            config.completion.api_key = Some(key);
        }
        if let Some(width) = self.max_width {
            config.output.max_line_width = width;
        }
        if let Some(size) = self.batch_size {
            config.batch.size = size;
        }
        if let Some(buffer) = self.buffer {
            config.batch.buffer = buffer;
        }
        if let Some(provider) = self.provider {
            config.completion.provider = provider.into();
        }
        if let Some(model) = self.model {
            config.completion.model = Some(model);
        }
        if let Some(endpoint) = self.endpoint {
            config.completion.endpoint = Some(endpoint);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translate_arguments() {
        let args = Args::try_parse_from([
            "srtlingo", "translate", "-i", "in.srt", "-o", "out.srt", "-s", "norwegian", "-t",
            "english", "-w", "42", "-b", "30", "--provider", "openai", "-k", "sk-test",
        ])
        .unwrap();

        let Commands::Translate { input, max_width, batch_size, provider, api_key, .. } = args.command
        else {
            panic!("expected translate");
        };
        assert_eq!(input, PathBuf::from("in.srt"));
        assert_eq!(max_width, Some(42));
        assert_eq!(batch_size, Some(30));
        assert!(matches!(provider, Some(ProviderArg::Openai)));
        assert_eq!(api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn test_overrides_apply() {
        let mut config = Config::default();
        Overrides {
            target_lang: Some("german".to_string()),
            batch_size: Some(7),
            provider: Some(ProviderArg::Openai),
            ..Overrides::default()
        }
        .apply(&mut config);

        assert_eq!(config.completion.target_language, "german");
        assert_eq!(config.completion.source_language, "english");
        assert_eq!(config.batch.size, 7);
        assert_eq!(config.completion.provider, Provider::OpenAi);
    }
}
