use anyhow::{Context, Result, bail};
use clap::Parser;
use std::{fs, path::PathBuf};

use notelink::{
    ExtractionOptions,
    ai::AiOptions,
    config::{Config, environment::RuntimeEnvironment},
    extractor::AiEnhancedContent,
    formatter::OutputFormat,
    logging, pipeline,
    share_text::{ShareTextError, find_share_url},
};

/// Extract a shared link into note content.
#[derive(Debug, Parser)]
#[command(name = "notelink", version)]
struct Cli {
    /// A URL, or share text pasted from an app.
    input: String,

    /// Parse this saved HTML instead of fetching the page.
    #[arg(long, value_name = "FILE")]
    html: Option<PathBuf>,

    /// flomo, notes or raw.
    #[arg(long, default_value = "raw")]
    format: OutputFormat,

    /// Add a summary, a better title and tags.
    #[arg(long)]
    ai: bool,

    /// Let the model read allow-listed platforms first.
    #[arg(long)]
    smart: bool,

    /// Render in the headless browser even when HTTP would do.
    #[arg(long)]
    headless: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_for_cli();
    let cli = Cli::parse();

    let url = match find_share_url(&cli.input) {
        Ok(url) | Err(ShareTextError::Unsupported(url)) => url,
        Err(ShareTextError::NoUrl) => bail!("no URL found in input"),
    };

    let config = Config::from_env().context("Failed to load configuration")?;
    let orchestrator = pipeline::from_config(&config, &RuntimeEnvironment::detect())?;

    let mut options = ExtractionOptions {
        timeout_ms: Some(config.request_timeout().as_millis() as u64),
        force_headless_browser: cli.headless,
        ..ExtractionOptions::default()
    };
    if let Some(path) = &cli.html {
        let html = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        options.preloaded_html = Some(html);
    }

    let ai_options = AiOptions::all();
    let result = if cli.smart {
        orchestrator.smart_extract(&url, &options, &ai_options).await
    } else if cli.ai {
        orchestrator.extract_with_ai(&url, &options, &ai_options).await
    } else {
        orchestrator
            .extract(&url, &options)
            .await
            .map(AiEnhancedContent::unenhanced)
    };
    orchestrator.close();

    let content = match result {
        Ok(content) => content,
        Err(e) => {
            for attempt in e.failures() {
                eprintln!("  {attempt}");
            }
            bail!(e.user_message());
        }
    };

    match cli.format.deep_link(&content) {
        Some(link) => println!("{link}"),
        None => println!("{}", serde_json::to_string_pretty(&content)?),
    }
    Ok(())
}
