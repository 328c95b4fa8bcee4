use std::path::PathBuf;

use anyhow::Result;
use tracing::{debug, info};

use crate::chart::Chart;
use crate::config::{PlotSettings, WindowPolicy};
use crate::ingest::{Diagnostic, DiagnosticKind};
use crate::record::NS_PER_S;
use crate::render::{Figure, Panel, PanelContext, PlotBackend};
use crate::suite::Suite;

pub const X_LABEL: &str = "time (seconds since start of test)";

/// Name lists selecting which charts are drawn.
///
/// A name matches a chart when the chart's field starts with it or it is a
/// substring of the chart's operation id. A chart is kept when `restrict_to`
/// is empty or any name matches, and `skip` is empty or no name matches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChartFilter {
    pub restrict_to: Vec<String>,
    pub skip: Vec<String>,
}

impl ChartFilter {
    pub fn new(restrict_to: Vec<String>, skip: Vec<String>) -> Self {
        Self { restrict_to, skip }
    }

    fn name_matches(name: &str, chart: &Chart) -> bool {
        chart.field.starts_with(name) || chart.operation_id.contains(name)
    }

    pub fn includes(&self, chart: &Chart) -> bool {
        let restricted = self.restrict_to.is_empty()
            || self
                .restrict_to
                .iter()
                .any(|name| Self::name_matches(name, chart));
        let skipped = self.skip.iter().any(|name| Self::name_matches(name, chart));
        restricted && !skipped
    }

    /// Charts to draw, in their original order.
    pub fn apply<'a>(&self, charts: &'a [Chart]) -> Vec<&'a Chart> {
        charts.iter().filter(|chart| self.includes(chart)).collect()
    }
}

/// Earliest start and latest end over `charts`, in seconds.
pub fn outer_window_seconds<'a>(charts: impl IntoIterator<Item = &'a Chart>) -> Option<(f64, f64)> {
    let (start, end) = charts
        .into_iter()
        .filter_map(Chart::time_frame)
        .reduce(|(lo, hi), (start, end)| (lo.min(start), hi.max(end)))?;
    Some((start as f64 / NS_PER_S, end as f64 / NS_PER_S))
}

/// Result of composing one suite.
#[derive(Debug, Clone, PartialEq)]
pub enum Composition {
    Figure(Figure),
    /// Nothing to draw; the diagnostic says why.
    Skipped(Diagnostic),
}

/// Result of rendering one suite through a backend.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderOutcome {
    Drawn {
        panels: usize,
        path: Option<PathBuf>,
    },
    Skipped(Diagnostic),
}

/// Filters a suite's charts, aligns them on one time window and stacks them
/// into a [`Figure`].
#[derive(Debug, Clone)]
pub struct RenderOrchestrator {
    settings: PlotSettings,
    window: WindowPolicy,
}

impl RenderOrchestrator {
    pub fn new(settings: PlotSettings) -> Self {
        Self {
            settings,
            window: WindowPolicy::default(),
        }
    }

    pub fn with_window_policy(mut self, window: WindowPolicy) -> Self {
        self.window = window;
        self
    }

    pub fn settings(&self) -> &PlotSettings {
        &self.settings
    }

    pub fn window_policy(&self) -> WindowPolicy {
        self.window
    }

    /// Filter `charts`, align them on a shared window and stack one panel per
    /// remaining chart. Renderers are invoked in chart order.
    pub fn compose(
        &self,
        title: &str,
        subtitle: Option<String>,
        charts: &[Chart],
        filter: &ChartFilter,
    ) -> Composition {
        let renderable: Vec<&Chart> = charts.iter().filter(|chart| chart.is_renderable()).collect();
        if renderable.is_empty() {
            info!(title, "No charts to render for {title}");
            return Composition::Skipped(Diagnostic::new(
                DiagnosticKind::EmptySuite,
                format!("No charts to render for {title}"),
            ));
        }

        let selected: Vec<&Chart> = renderable
            .iter()
            .copied()
            .filter(|chart| filter.includes(chart))
            .collect();
        if selected.is_empty() {
            info!(title, charts = renderable.len(), "every chart was filtered out");
            return Composition::Skipped(Diagnostic::new(
                DiagnosticKind::NoRenderableCharts,
                format!("All {} charts of {title} were filtered out", renderable.len()),
            ));
        }

        let window = match self.window {
            WindowPolicy::AllCharts => outer_window_seconds(renderable.iter().copied()),
            WindowPolicy::FilteredCharts => outer_window_seconds(selected.iter().copied()),
        };
        let Some((start, end)) = window else {
            return Composition::Skipped(Diagnostic::new(
                DiagnosticKind::NoRenderableCharts,
                format!("Charts of {title} carry no samples"),
            ));
        };
        debug!(title, start, end, panels = selected.len(), "composing figure");

        let count = selected.len();
        let mut panels = Vec::with_capacity(count);
        for (index, chart) in selected.into_iter().enumerate() {
            let ctx = PanelContext {
                index,
                count,
                window_start: start,
                window_end: end,
            };
            let mut panel = Panel::new(chart.field.clone(), (0.0, ctx.span()), ctx.is_last());
            if let Some(renderer) = chart.renderer() {
                renderer.render(chart, &mut panel, &ctx);
            }
            panels.push(panel);
        }

        Composition::Figure(Figure {
            title: title.to_string(),
            subtitle,
            x_label: X_LABEL.to_string(),
            window: (start, end),
            panels,
        })
    }

    /// Compose a bound suite's charts. The title defaults to the suite name.
    pub fn compose_suite(
        &self,
        suite: &Suite,
        title: Option<&str>,
        filter: &ChartFilter,
    ) -> Composition {
        let title = title.unwrap_or(suite.name());
        let subtitle = suite.build().map(|build| build.describe());
        self.compose(title, subtitle, suite.charts(), filter)
    }

    pub fn render(
        &self,
        suite: &Suite,
        title: Option<&str>,
        filter: &ChartFilter,
        backend: &dyn PlotBackend,
    ) -> Result<RenderOutcome> {
        match self.compose_suite(suite, title, filter) {
            Composition::Skipped(diagnostic) => Ok(RenderOutcome::Skipped(diagnostic)),
            Composition::Figure(figure) => {
                let panels = figure.panels.len();
                let path = backend.draw(&figure, &self.settings)?;
                if let Some(path) = &path {
                    info!(
                        suite = %suite.name(),
                        backend = backend.name(),
                        path = %path.display(),
                        "figure written"
                    );
                }
                Ok(RenderOutcome::Drawn { panels, path })
            }
        }
    }
}
