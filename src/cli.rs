//! Command-line entry point
//!
//! `crawl` runs the full pipeline, `replay` re-emits a saved archive through
//! an output sink, `diff` compares two archives and `init-config` writes the
//! default configuration.

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

use crate::application::{
    Collaborators, CrawlPipeline, PipelineSettings, compare, load_archive, open_sink, output_path, persist, replay,
};
use crate::domain::{CrawlError, RendererFactory};
use crate::infrastructure::{
    AppConfig, CrawlMode, DetailPageParser, HttpClient, HttpDetailFetcher, ListingParser, OutputFormat,
    Reconciliation, RendererKind, StaticRendererFactory, init_logging, log_system_info,
};

#[derive(Debug, Parser)]
#[command(name = "directory-crawler", version, about = "Multi-locale directory crawler")]
pub struct Cli {
    /// Configuration file; defaults to the per-user config if it exists
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Crawl every locale listing and write the entity list
    Crawl(CrawlArgs),
    /// Re-emit a saved JSON archive through an output sink
    Replay {
        #[arg(long)]
        archive: PathBuf,
        #[arg(long, value_enum)]
        format: Option<OutputFormat>,
    },
    /// Compare two saved JSON archives by identifier
    Diff {
        #[arg(long)]
        old: PathBuf,
        #[arg(long)]
        new: PathBuf,
    },
    /// Write the default configuration file
    InitConfig {
        path: Option<PathBuf>,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Args)]
pub struct CrawlArgs {
    #[arg(long, value_enum)]
    pub mode: Option<CrawlMode>,
    #[arg(long, value_enum)]
    pub reconciliation: Option<Reconciliation>,
    #[arg(long, value_enum)]
    pub renderer: Option<RendererKind>,
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,
    #[arg(long)]
    pub base_url: Option<String>,
    /// Continue from the latest checkpoint
    #[arg(long)]
    pub resume: bool,
}

impl CrawlArgs {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(mode) = self.mode {
            config.pipeline.mode = mode;
        }
        if let Some(reconciliation) = self.reconciliation {
            config.pipeline.reconciliation = reconciliation;
        }
        if let Some(renderer) = self.renderer {
            config.pipeline.renderer = renderer;
        }
        if let Some(format) = self.format {
            config.pipeline.output_format = format;
        }
        if let Some(base_url) = &self.base_url {
            config.site.base_url = base_url.clone();
        }
    }
}

/// Run the parsed command and map the outcome to a process exit code
pub async fn run(cli: Cli) -> ExitCode {
    let command = match cli.command {
        Command::InitConfig { path, force } => {
            return match init_config(path, force).await {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    eprintln!("{e:#}");
                    ExitCode::FAILURE
                }
            };
        }
        command => command,
    };

    let mut config = match AppConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    if let Command::Crawl(args) = &command {
        args.apply(&mut config);
        if let Err(e) = config.validate() {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    }

    let _guards = match init_logging(&config.logging) {
        Ok(guards) => guards,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e:#}");
            return ExitCode::FAILURE;
        }
    };
    log_system_info();

    let started = Instant::now();
    let result = match command {
        Command::Crawl(args) => crawl(&config, args.resume).await,
        Command::Replay { archive, format } => {
            replay_archive(&config, &archive, format.unwrap_or(config.pipeline.output_format)).await
        }
        Command::Diff { old, new } => diff_archives(&old, &new).await,
        Command::InitConfig { .. } => Ok(()),
    };
    info!("Process executed in {:?}", started.elapsed());

    match result {
        Ok(()) => {
            info!("=> Process finished successfully!");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}: {:#}. Process stopped.", error_kind(&e), e);
            ExitCode::from(exit_code(&e))
        }
    }
}

fn error_kind(e: &anyhow::Error) -> &'static str {
    match e.downcast_ref::<CrawlError>() {
        Some(crawl) if crawl.is_fatal() => "Fatal crawl error",
        Some(_) => "Crawl error",
        None => "Error",
    }
}

fn exit_code(e: &anyhow::Error) -> u8 {
    e.downcast_ref::<CrawlError>().map_or(1, CrawlError::exit_code)
}

async fn crawl(config: &AppConfig, resume: bool) -> Result<()> {
    info!(
        "Crawling {} ({:?} mode, {:?} renderer)",
        config.site.base_url, config.pipeline.mode, config.pipeline.renderer
    );
    let collaborators = build_collaborators(config).await?;
    let pipeline = CrawlPipeline::new(collaborators, PipelineSettings::from_config(config, resume));
    let entities = pipeline.run().await?;

    let path = output_path(
        &config.pipeline.output_dir,
        &config.pipeline.output_prefix,
        config.pipeline.output_format,
        Local::now(),
    );
    let mut sink = open_sink(config.pipeline.output_format, path).await?;
    persist(entities, sink.as_mut()).await?;
    Ok(())
}

async fn replay_archive(config: &AppConfig, archive: &Path, format: OutputFormat) -> Result<()> {
    let records = load_archive(archive).await?;
    let prefix = format!("{}_replay", config.pipeline.output_prefix);
    let path = output_path(&config.pipeline.output_dir, &prefix, format, Local::now());
    let mut sink = open_sink(format, path).await?;
    persist(replay(records), sink.as_mut()).await?;
    Ok(())
}

async fn diff_archives(old: &Path, new: &Path) -> Result<()> {
    let old_records = load_archive(old).await?;
    let new_records = load_archive(new).await?;
    let diff = compare(&old_records, &new_records);

    if diff.is_empty() {
        info!("Archives list the same {} entities", diff.unchanged);
        return Ok(());
    }
    for identifier in &diff.added {
        info!("+ {}", identifier);
    }
    for identifier in &diff.removed {
        info!("- {}", identifier);
    }
    info!(
        "{} added, {} removed, {} unchanged",
        diff.added.len(),
        diff.removed.len(),
        diff.unchanged
    );
    Ok(())
}

async fn init_config(path: Option<PathBuf>, force: bool) -> Result<()> {
    let path = path
        .or_else(AppConfig::default_path)
        .context("No config path given and no per-user config directory available")?;
    if path.exists() && !force {
        anyhow::bail!("{} already exists; pass --force to overwrite", path.display());
    }
    AppConfig::default().save(&path).await?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

async fn build_collaborators(config: &AppConfig) -> Result<Collaborators> {
    let client = Arc::new(HttpClient::new(config.http.clone())?);
    let extractor = ListingParser::new(&config.selectors, &config.site)?;
    let details = Arc::new(HttpDetailFetcher::new(
        Arc::clone(&client),
        DetailPageParser::new(&config.selectors)?,
        config.site.entity_path.clone(),
    ));

    let renderers: Arc<dyn RendererFactory> = match config.pipeline.renderer {
        RendererKind::Static => Arc::new(StaticRendererFactory::new(client, config.site.base_url.clone())),
        RendererKind::Chromium => chromium_renderers(client, config).await?,
    };

    Ok(Collaborators {
        renderers,
        extractor: Arc::new(extractor),
        titles: details.clone(),
        sub_records: details,
    })
}

#[cfg(feature = "browser")]
async fn chromium_renderers(client: Arc<HttpClient>, config: &AppConfig) -> Result<Arc<dyn RendererFactory>> {
    use crate::infrastructure::rendering::ChromiumRendererFactory;

    let factory = ChromiumRendererFactory::launch(client, config.site.base_url.clone(), &config.scroll).await?;
    Ok(Arc::new(factory))
}

#[cfg(not(feature = "browser"))]
async fn chromium_renderers(_client: Arc<HttpClient>, _config: &AppConfig) -> Result<Arc<dyn RendererFactory>> {
    anyhow::bail!("Chromium rendering requires building with the `browser` feature")
}
