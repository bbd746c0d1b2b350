use std::path::Path;
use tokio::fs;
use tracing::{info, warn};

use crate::batch::{BatchSpan, Batcher};
use crate::completion::{CompletionClient, CompletionClientFactory};
use crate::config::Config;
use crate::error::{Result, LingoError};
use crate::parser::SrtParser;
use crate::subtitle::SubtitleStore;
use crate::translate::{progress_label, Orchestrator, OrchestratorReport, Sleeper, TokioSleeper};

pub struct Workflow {
    config: Config,
    parser: SrtParser,
}

impl Workflow {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let parser = SrtParser::new(config.filter.clone())?;
        Ok(Self { config, parser })
    }

    /// Read and parse an SRT file
    pub async fn load<P: AsRef<Path>>(&self, input_path: P) -> Result<SubtitleStore> {
        let input_path = input_path.as_ref();
        info!("Loading subtitles: {}", input_path.display());

        if !input_path.exists() {
            return Err(LingoError::FileNotFound(input_path.display().to_string()));
        }

        let raw = fs::read_to_string(input_path).await?;
        self.parser.parse(&raw).map_err(|e| match e {
            LingoError::Parse(reason) => {
                LingoError::Parse(format!("{}: {}", input_path.display(), reason))
            }
            other => other,
        })
    }

    /// Translate `input_path` into `output_path` with the configured service
    pub async fn translate_file<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        input_path: P,
        output_path: Q,
    ) -> Result<OrchestratorReport> {
        let client = CompletionClientFactory::create_client(&self.config.completion)?;

        // A failed probe is not fatal: each batch retries on its own.
        if let Err(e) = client.check_availability().await {
            warn!("Completion service check failed: {}", e);
        }

        self.translate_file_with(input_path, output_path, client, Box::new(TokioSleeper), true)
            .await
    }

    /// Translate with an explicit client and sleeper
    pub async fn translate_file_with<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        input_path: P,
        output_path: Q,
        client: Box<dyn CompletionClient>,
        sleeper: Box<dyn Sleeper>,
        show_progress: bool,
    ) -> Result<OrchestratorReport> {
        let (input_path, output_path) = (input_path.as_ref(), output_path.as_ref());
        let mut store = self.load(input_path).await?;

        if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let orchestrator = Orchestrator::new(&self.config, client, sleeper)
            .with_output(output_path)
            .with_progress(show_progress)
            .with_label(progress_label(input_path));
        let report = orchestrator.run(&mut store).await?;

        info!("Translated subtitles written to {}", output_path.display());
        Ok(report)
    }

    /// Parse a file and show how it would be batched, without calling any service
    pub async fn plan_file<P: AsRef<Path>>(&self, input_path: P) -> Result<Vec<BatchSpan>> {
        let store = self.load(input_path).await?;
        let batcher = Batcher::new(self.config.batch.clone(), &self.config.filter);
        Ok(batcher.plan(&store))
    }
}
