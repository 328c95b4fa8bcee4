use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use once_cell::sync::OnceCell;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt};

use crate::config::LogSettings;

const TRACE_SUFFIX: &str = "trace.jsonl";

static TRACE_GUARD: OnceCell<WorkerGuard> = OnceCell::new();
static ACTIVE_TRACE_FILE: OnceCell<PathBuf> = OnceCell::new();

/// Install the console subscriber. With `trace_file` enabled, every event at
/// debug or above is also appended as JSON to a trace named after `input`.
pub fn init_tracing(verbose: bool, settings: &LogSettings, input: &Path) -> Result<()> {
    let default_level = if verbose {
        "suitechart=debug"
    } else {
        "suitechart=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let trace_layer = if settings.trace_file {
        let directory = resolve_trace_directory(settings)?;
        let (appender, path) = open_trace_appender(&directory, input)?;
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = TRACE_GUARD.set(guard);
        let _ = ACTIVE_TRACE_FILE.set(path);
        Some(
            fmt::layer()
                .json()
                .with_current_span(true)
                .with_file(true)
                .with_line_number(true)
                .with_writer(writer)
                .with_filter(LevelFilter::DEBUG),
        )
    } else {
        None
    };

    // A second call keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(trace_layer)
        .try_init();
    Ok(())
}

/// Trace file written by the current process, if any.
pub fn current_trace_file() -> Option<&'static PathBuf> {
    ACTIVE_TRACE_FILE.get()
}

pub fn resolve_trace_directory(settings: &LogSettings) -> Result<PathBuf> {
    if let Some(dir) = &settings.directory {
        return Ok(dir.clone());
    }
    let dirs = ProjectDirs::from("dev", "suitechart", "SuiteChart")
        .context("Unable to resolve platform trace directory")?;
    Ok(dirs.cache_dir().join("traces"))
}

fn open_trace_appender(directory: &Path, input: &Path) -> Result<(RollingFileAppender, PathBuf)> {
    let stem = trace_stem(input);
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(stem)
        .filename_suffix(TRACE_SUFFIX)
        .build(directory)
        .with_context(|| format!("Failed to open trace file in {}", directory.display()))?;
    Ok((appender, directory.join(format!("{stem}.{TRACE_SUFFIX}"))))
}

/// `memory_run.csv` traces to `memory_run.trace.jsonl`; repeated runs append.
fn trace_stem(input: &Path) -> &str {
    input
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .unwrap_or("suitechart")
}
