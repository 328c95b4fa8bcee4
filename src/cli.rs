use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{ArgAction, Parser};
use tracing::info;

use crate::{
    ChartPipeline, RenderRequest,
    config::{BackendKind, InputFormat, Settings, WindowPolicy, default_config_path},
    ingest::Report,
    logging,
    orchestrator::{ChartFilter, RenderOutcome},
};

#[derive(Parser, Debug)]
#[command(name = "suitechart", version, about = "Chart performance test suites from captured logs", long_about = None)]
pub struct Cli {
    /// CSV or line-delimited JSON log to load.
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Figure title (defaults to the suite name).
    #[arg(long)]
    pub title: Option<String>,

    /// Only draw charts matching NAME (can be repeated).
    #[arg(long = "fields", value_name = "NAME")]
    pub fields: Vec<String>,

    /// Never draw charts matching NAME (can be repeated).
    #[arg(long = "skip", value_name = "NAME")]
    pub skip: Vec<String>,

    /// Only process suites whose name contains SUBSTR.
    #[arg(long, value_name = "SUBSTR")]
    pub suite: Option<String>,

    /// Input format (detected from extension or content when omitted).
    #[arg(long, value_enum)]
    pub format: Option<InputFormat>,

    /// Output backend (svg or text).
    #[arg(long, value_enum)]
    pub backend: Option<BackendKind>,

    /// Directory receiving rendered figures.
    #[arg(long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Charts that define the shared time window (all or filtered).
    #[arg(long, value_enum)]
    pub window: Option<WindowPolicy>,

    /// Run each bound handler's analysis.
    #[arg(long, action = ArgAction::SetTrue)]
    pub analyze: bool,

    /// Print cross-suite summaries.
    #[arg(long, action = ArgAction::SetTrue)]
    pub summary: bool,

    /// List suites, handlers and topics without rendering.
    #[arg(long, action = ArgAction::SetTrue)]
    pub list: bool,

    /// Custom config path.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Increase logging verbosity.
    #[arg(long, action = ArgAction::SetTrue)]
    pub verbose: bool,
}

impl Cli {
    /// Apply command-line overrides on top of file settings.
    pub fn apply_overrides(&self, settings: &mut Settings) {
        if let Some(backend) = self.backend {
            settings.plot.backend = backend;
        }
        if let Some(output) = &self.output {
            settings.plot.output_dir = Some(output.clone());
        }
        if let Some(window) = self.window {
            settings.window = window;
        }
    }

    pub fn render_request(&self) -> RenderRequest {
        RenderRequest {
            title: self.title.clone(),
            suite: self.suite.clone(),
            filter: ChartFilter::new(self.fields.clone(), self.skip.clone()),
        }
    }
}

fn print_listing(report: &Report, request: &RenderRequest) {
    println!("{} ({})", report.source.display(), report.format);
    if let Some(build) = &report.build {
        println!("  build: {}", build.describe());
    }
    for suite in report.suites.iter().filter(|suite| request.selects(suite)) {
        println!(
            "  {} [{}] {} entries, {} charts",
            suite.name(),
            suite.handler_name().unwrap_or("no handler"),
            suite.entries().len(),
            suite.charts().len()
        );
        for (topic, records) in suite.topics().iter() {
            println!("    {topic}: {} samples", records.len());
        }
    }
}

fn print_analysis(report: &Report, request: &RenderRequest) {
    for suite in report.handled_suites().filter(|suite| request.selects(suite)) {
        let verdict = suite.analyze(&mut |suite, _, message| {
            println!("Suite[{}]::analyze msg: {message}", suite.name());
        });
        if let Some(verdict) = verdict {
            println!("Suite[{}]: {verdict}", suite.name());
        }
    }
}

fn print_summaries(pipeline: &ChartPipeline, report: &Report) {
    let summaries = pipeline.handlers().summaries(&report.suites);
    if summaries.is_empty() {
        println!("No handler offers a summary for {}", report.source.display());
    }
    for (handler, summary) in summaries {
        println!("[{handler}]");
        print!("{summary}");
    }
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => default_config_path()?,
    };
    let mut settings = Settings::load_or_default(&config_path)?;
    cli.apply_overrides(&mut settings);
    logging::init_tracing(cli.verbose, &settings.logging, &cli.file)?;
    if let Some(trace) = logging::current_trace_file() {
        info!(path = %trace.display(), "writing trace file");
    }

    if !cli.file.exists() {
        bail!("log file {} does not exist", cli.file.display());
    }

    let pipeline = ChartPipeline::from_settings(settings);
    let report = pipeline.load(&cli.file, cli.format)?;
    let request = cli.render_request();

    if cli.list {
        print_listing(&report, &request);
        return Ok(());
    }
    if cli.analyze {
        print_analysis(&report, &request);
    }
    if cli.summary {
        print_summaries(&pipeline, &report);
    }
    if cli.analyze || cli.summary {
        return Ok(());
    }

    let rendered = pipeline.render_report(&report, &request)?;
    for item in &rendered {
        match &item.outcome {
            RenderOutcome::Drawn {
                panels,
                path: Some(path),
            } => println!("{}: {panels} charts -> {}", item.suite, path.display()),
            RenderOutcome::Drawn { .. } => {}
            RenderOutcome::Skipped(diagnostic) => {
                println!("{}: {}", item.suite, diagnostic.message)
            }
        }
    }
    info!(
        rendered = rendered.len(),
        diagnostics = report.diagnostics.len(),
        "done"
    );
    Ok(())
}
