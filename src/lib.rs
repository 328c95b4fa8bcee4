pub mod chart;
pub mod cli;
pub mod config;
pub mod handler;
pub mod ingest;
pub mod logging;
pub mod orchestrator;
pub mod record;
pub mod render;
pub mod suite;

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{info, info_span, warn};

use crate::config::{InputFormat, Settings, default_config_path};
use crate::handler::HandlerRegistry;
use crate::ingest::{Diagnostic, Report};
use crate::orchestrator::{ChartFilter, RenderOrchestrator, RenderOutcome};
use crate::render::{PlotBackend, backend_for};
use crate::suite::Suite;

pub use crate::chart::Chart;
pub use crate::record::{BuildInfo, CanonicalRecord, Value};

/// Which suites of a report to draw, and how.
#[derive(Debug, Clone, Default)]
pub struct RenderRequest {
    /// Figure title; defaults to each suite's name.
    pub title: Option<String>,
    /// Only suites whose name contains this substring.
    pub suite: Option<String>,
    pub filter: ChartFilter,
}

impl RenderRequest {
    /// Whether `suite` is named by the request's suite substring.
    pub fn selects(&self, suite: &Suite) -> bool {
        self.suite
            .as_deref()
            .is_none_or(|needle| suite.name().contains(needle))
    }
}

/// One rendered (or skipped) suite.
#[derive(Debug, Clone, PartialEq)]
pub struct SuiteRender {
    pub suite: String,
    pub outcome: RenderOutcome,
}

impl SuiteRender {
    pub fn diagnostic(&self) -> Option<&Diagnostic> {
        match &self.outcome {
            RenderOutcome::Skipped(diagnostic) => Some(diagnostic),
            RenderOutcome::Drawn { .. } => None,
        }
    }
}

/// Load, dispatch and render pipeline configured from [`Settings`].
pub struct ChartPipeline {
    settings: Settings,
    handlers: HandlerRegistry,
    orchestrator: RenderOrchestrator,
}

impl ChartPipeline {
    /// Construct a pipeline with the built-in handlers.
    pub fn from_settings(settings: Settings) -> Self {
        let orchestrator =
            RenderOrchestrator::new(settings.plot.clone()).with_window_policy(settings.window);
        Self {
            settings,
            handlers: HandlerRegistry::builtin(),
            orchestrator,
        }
    }

    /// Load settings from `config_path` (or the platform default) and build
    /// a pipeline from them.
    pub fn bootstrap(config_path: Option<PathBuf>) -> Result<Self> {
        let path = match config_path {
            Some(path) => path,
            None => default_config_path()?,
        };
        let settings = Settings::load_or_default(&path)?;
        Ok(Self::from_settings(settings))
    }

    pub fn with_handlers(mut self, handlers: HandlerRegistry) -> Self {
        self.handlers = handlers;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    pub fn orchestrator(&self) -> &RenderOrchestrator {
        &self.orchestrator
    }

    pub fn load(&self, path: &Path, format: Option<InputFormat>) -> Result<Report> {
        let span = info_span!("load", path = %path.display());
        let _guard = span.enter();
        let report = ingest::load_report(path, format, &self.handlers)?;
        info!(
            suites = report.suites.len(),
            handled = report.handled_suites().count(),
            diagnostics = report.diagnostics.len(),
            "report loaded"
        );
        Ok(report)
    }

    /// Filter from the request, falling back to the configured defaults when
    /// the request names no charts.
    pub fn effective_filter(&self, request: &RenderRequest) -> ChartFilter {
        let mut filter = request.filter.clone();
        if filter.restrict_to.is_empty() {
            filter.restrict_to = self.settings.filter.fields.clone();
        }
        if filter.skip.is_empty() {
            filter.skip = self.settings.filter.skip.clone();
        }
        filter
    }

    /// Render every selected suite with the configured backend.
    pub fn render_report(
        &self,
        report: &Report,
        request: &RenderRequest,
    ) -> Result<Vec<SuiteRender>> {
        let backend = backend_for(self.settings.plot.backend);
        self.render_with(report, request, backend.as_ref())
    }

    pub fn render_with(
        &self,
        report: &Report,
        request: &RenderRequest,
        backend: &dyn PlotBackend,
    ) -> Result<Vec<SuiteRender>> {
        let filter = self.effective_filter(request);
        let selected: Vec<&Suite> = report
            .handled_suites()
            .filter(|suite| request.selects(suite))
            .collect();
        if selected.is_empty() {
            warn!(source = %report.source.display(), "no handled suite matches the request");
        }

        let mut rendered = Vec::with_capacity(selected.len());
        for suite in &selected {
            let title = match (&request.title, selected.len()) {
                (Some(title), 1) => Some(title.clone()),
                (Some(title), _) => Some(format!("{title} - {}", suite.name())),
                (None, _) => None,
            };
            let outcome = self
                .orchestrator
                .render(suite, title.as_deref(), &filter, backend)?;
            rendered.push(SuiteRender {
                suite: suite.name().to_string(),
                outcome,
            });
        }
        Ok(rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    use crate::config::BackendKind;
    use crate::ingest::DiagnosticKind;

    const LOG: &str = "\
suite_id,timestamp,operation_id,token,value
Memory allocation,0,MemoryAllocOperation,total_allocation_bytes,1048576
Memory allocation,1000000000,MemoryAllocOperation,sys_mem_info.available_memory,2097152
Memory allocation,2000000000,MemoryAllocOperation,total_allocation_bytes,3145728
Thermal soak,0,ThermalOperation,fan_rpm,1200
";

    fn pipeline(output: &Path) -> ChartPipeline {
        let mut settings = Settings::default();
        settings.plot.backend = BackendKind::Svg;
        settings.plot.output_dir = Some(output.to_path_buf());
        ChartPipeline::from_settings(settings)
    }

    #[test]
    fn renders_handled_suites_to_svg() {
        let temp = tempdir().unwrap();
        let log = temp.path().join("run.csv");
        fs::write(&log, LOG).unwrap();

        let pipeline = pipeline(&temp.path().join("charts"));
        let report = pipeline.load(&log, None).unwrap();
        let rendered = pipeline
            .render_report(&report, &RenderRequest::default())
            .unwrap();

        assert_eq!(rendered.len(), 2);
        match &rendered[0].outcome {
            RenderOutcome::Drawn { panels, path } => {
                assert_eq!(*panels, 2);
                assert!(path.as_ref().unwrap().exists());
            }
            other => panic!("unexpected {other:?}"),
        }
        // The thermal suite has no chartable topic.
        assert_eq!(
            rendered[1].diagnostic().map(|d| d.kind),
            Some(DiagnosticKind::EmptySuite)
        );
    }

    #[test]
    fn configured_filters_apply_when_request_names_none() {
        let mut settings = Settings::default();
        settings.filter.skip = vec!["sys_mem_info".into()];
        let pipeline = ChartPipeline::from_settings(settings);

        let defaulted = pipeline.effective_filter(&RenderRequest::default());
        assert_eq!(defaulted.skip, vec!["sys_mem_info".to_string()]);

        let explicit = RenderRequest {
            filter: ChartFilter::new(Vec::new(), vec!["total".into()]),
            ..RenderRequest::default()
        };
        assert_eq!(
            pipeline.effective_filter(&explicit).skip,
            vec!["total".to_string()]
        );
    }

    #[test]
    fn suite_selection_narrows_rendering() {
        let temp = tempdir().unwrap();
        let log = temp.path().join("run.csv");
        fs::write(&log, LOG).unwrap();

        let pipeline = pipeline(&temp.path().join("charts"));
        let report = pipeline.load(&log, None).unwrap();
        let request = RenderRequest {
            title: Some("Nightly".into()),
            suite: Some("Memory".into()),
            ..RenderRequest::default()
        };
        let rendered = pipeline.render_report(&report, &request).unwrap();
        assert_eq!(rendered.len(), 1);
        let RenderOutcome::Drawn { path: Some(path), .. } = &rendered[0].outcome else {
            panic!("expected a drawn figure");
        };
        assert_eq!(path.file_name().unwrap(), "nightly.svg");
    }
}
