pub mod panel;
pub mod plots;
pub mod svg;
pub mod text;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;

use crate::chart::Chart;
use crate::config::{BackendKind, PlotSettings};

pub use panel::{Figure, Mark, Panel, Rgb};

/// Signature shared by every table-dispatched drawing routine.
pub type RenderFn = fn(&Chart, &mut Panel, &PanelContext);

/// Placement of one panel within a stacked figure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanelContext {
    pub index: usize,
    pub count: usize,
    /// Seconds; the shared window start all panels are aligned on.
    pub window_start: f64,
    pub window_end: f64,
}

impl PanelContext {
    pub fn is_last(&self) -> bool {
        self.index + 1 == self.count
    }

    pub fn span(&self) -> f64 {
        self.window_end - self.window_start
    }
}

/// Per-chart-type drawing strategy.
///
/// Renderers never talk to a plotting backend. They draw onto a recorded
/// [`Panel`], and a [`PlotBackend`] later turns the stacked panels of a
/// [`Figure`] into output.
pub trait ChartRenderer: Send + Sync {
    fn name(&self) -> &'static str;
    /// Capability predicate over a chart's topic. Must be pure.
    fn matches(&self, operation_id: &str, field: &str) -> bool;
    /// Event charts depict discrete occurrences drawn as overlays.
    fn is_event_chart(&self, _chart: &Chart) -> bool {
        false
    }
    /// Draw `chart` onto `panel`. Must not mutate the chart.
    fn render(&self, chart: &Chart, panel: &mut Panel, ctx: &PanelContext);
}

/// Exact-match key for a render table entry. `None` matches any operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopicPattern {
    pub operation_id: Option<&'static str>,
    pub field: &'static str,
}

impl TopicPattern {
    fn matches(&self, operation_id: &str, field: &str) -> bool {
        self.field == field
            && self
                .operation_id
                .is_none_or(|expected| expected == operation_id)
    }
}

/// Maps topics to drawing routines, falling back to a blank panel for
/// fields the table does not know.
#[derive(Clone)]
pub struct RendererTable {
    entries: Vec<(TopicPattern, RenderFn)>,
    fallback: RenderFn,
}

impl Default for RendererTable {
    fn default() -> Self {
        Self::new()
    }
}

impl RendererTable {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            fallback: plots::render_ignore,
        }
    }

    /// Shared entries for system memory fields most operations report.
    pub fn system_defaults() -> Self {
        Self::new()
            .with("sys_mem_info.available_memory", plots::render_memory_as_mb)
            .with("sys_mem_info.native_allocated", plots::render_memory_as_mb)
            .with("sys_mem_info.low_memory", plots::render_boolean)
            .with("sys_mem_info.oom_score", plots::render_oom_score)
    }

    /// Register `render` for `field` under any operation. Later entries for
    /// the same key replace earlier ones.
    pub fn with(self, field: &'static str, render: RenderFn) -> Self {
        self.insert(
            TopicPattern {
                operation_id: None,
                field,
            },
            render,
        )
    }

    pub fn with_topic(
        self,
        operation_id: &'static str,
        field: &'static str,
        render: RenderFn,
    ) -> Self {
        self.insert(
            TopicPattern {
                operation_id: Some(operation_id),
                field,
            },
            render,
        )
    }

    pub fn with_fallback(mut self, fallback: RenderFn) -> Self {
        self.fallback = fallback;
        self
    }

    fn insert(mut self, pattern: TopicPattern, render: RenderFn) -> Self {
        self.entries.retain(|(existing, _)| *existing != pattern);
        self.entries.push((pattern, render));
        self
    }

    pub fn contains(&self, operation_id: &str, field: &str) -> bool {
        self.entries
            .iter()
            .any(|(pattern, _)| pattern.matches(operation_id, field))
    }

    pub fn lookup(&self, operation_id: &str, field: &str) -> RenderFn {
        self.entries
            .iter()
            .find(|(pattern, _)| pattern.matches(operation_id, field))
            .map(|(_, render)| *render)
            .unwrap_or(self.fallback)
    }
}

/// Renderer driven by a continuous-series table and an event table.
#[derive(Clone)]
pub struct TableRenderer {
    name: &'static str,
    operation_id: Option<&'static str>,
    series: RendererTable,
    events: RendererTable,
    event_fields: &'static [&'static str],
}

impl TableRenderer {
    pub fn new(
        name: &'static str,
        operation_id: Option<&'static str>,
        series: RendererTable,
    ) -> Self {
        Self {
            name,
            operation_id,
            series,
            events: RendererTable::new(),
            event_fields: &[],
        }
    }

    pub fn with_events(
        mut self,
        event_fields: &'static [&'static str],
        events: RendererTable,
    ) -> Self {
        self.event_fields = event_fields;
        self.events = events;
        self
    }
}

impl ChartRenderer for TableRenderer {
    fn name(&self) -> &'static str {
        self.name
    }

    fn matches(&self, operation_id: &str, field: &str) -> bool {
        let operation_ok = self
            .operation_id
            .is_none_or(|expected| expected == operation_id);
        operation_ok
            && (self.series.contains(operation_id, field)
                || self.events.contains(operation_id, field))
    }

    fn is_event_chart(&self, chart: &Chart) -> bool {
        self.event_fields.contains(&chart.field.as_str())
    }

    fn render(&self, chart: &Chart, panel: &mut Panel, ctx: &PanelContext) {
        let table = if self.is_event_chart(chart) {
            &self.events
        } else {
            &self.series
        };
        table.lookup(&chart.operation_id, &chart.field)(chart, panel, ctx);
    }
}

/// No-op renderer; the chart still occupies a (blank) panel.
#[derive(Debug, Clone, Copy, Default)]
pub struct IgnoreRenderer;

impl ChartRenderer for IgnoreRenderer {
    fn name(&self) -> &'static str {
        "ignore"
    }

    fn matches(&self, _operation_id: &str, _field: &str) -> bool {
        true
    }

    fn render(&self, _chart: &Chart, _panel: &mut Panel, _ctx: &PanelContext) {}
}

/// Ordered renderer capabilities; the first renderer whose predicate accepts
/// a topic is bound.
#[derive(Clone, Default)]
pub struct RendererRegistry {
    renderers: Vec<Arc<dyn ChartRenderer>>,
}

impl RendererRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, renderer: impl ChartRenderer + 'static) -> Self {
        self.renderers.push(Arc::new(renderer));
        self
    }

    pub fn resolve(&self, operation_id: &str, field: &str) -> Option<Arc<dyn ChartRenderer>> {
        self.renderers
            .iter()
            .find(|renderer| renderer.matches(operation_id, field))
            .cloned()
    }

    /// Bind the first matching renderer to `chart`.
    pub fn assign(&self, chart: &mut Chart) -> bool {
        match self.resolve(&chart.operation_id, &chart.field) {
            Some(renderer) => {
                chart.set_renderer(renderer);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.renderers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.renderers.is_empty()
    }
}

/// Materialises a composed figure.
pub trait PlotBackend {
    fn name(&self) -> &'static str;
    /// Returns the written file, if the backend produces one.
    fn draw(&self, figure: &Figure, settings: &PlotSettings) -> Result<Option<PathBuf>>;
}

pub fn backend_for(kind: BackendKind) -> Box<dyn PlotBackend> {
    match kind {
        BackendKind::Svg => Box::new(svg::SvgBackend),
        BackendKind::Text => Box::new(text::TextBackend),
    }
}
