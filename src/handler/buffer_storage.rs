use std::fmt::Write as _;

use crate::chart::Chart;
use crate::handler::{AnalysisCallback, SuiteHandler};
use crate::record::CanonicalRecord;
use crate::render::{ChartRenderer, Panel, PanelContext, RendererRegistry, Rgb};
use crate::suite::{Suite, Topic};

pub const NAME: &str = "buffer-storage";
pub const OPERATION: &str = "BufferStorageGLES3Operation";
pub const STATUS_FIELD: &str = "buffer_storage.status";
const VERDICT_AXIS: &str = "0 UNAVAILABLE / 1 UNDETERMINED / 2 PASSED";

/// Outcome of a buffer storage compliance run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Passed,
    Unavailable,
    Undetermined,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Passed => write!(f, "PASSED"),
            Verdict::Unavailable => write!(f, "UNAVAILABLE"),
            Verdict::Undetermined => write!(f, "UNDETERMINED"),
        }
    }
}

impl Verdict {
    /// Row on the verdict panel's y axis.
    pub fn row(self) -> f64 {
        match self {
            Verdict::Unavailable => 0.0,
            Verdict::Undetermined => 1.0,
            Verdict::Passed => 2.0,
        }
    }

    fn color(self) -> Rgb {
        match self {
            Verdict::Unavailable => Rgb(214, 39, 40),
            Verdict::Undetermined => Rgb(127, 127, 127),
            Verdict::Passed => Rgb(44, 160, 44),
        }
    }
}

/// Map a reported status code to a verdict and a human readable reason.
pub fn describe_status(status: Option<i64>) -> (Verdict, String) {
    let (verdict, message) = match status {
        None => (Verdict::Undetermined, "Test result status not found."),
        Some(0) => (Verdict::Passed, ""),
        Some(1) => (Verdict::Unavailable, "Feature not found as OpenGL ES extension."),
        Some(2) => (
            Verdict::Unavailable,
            "Feature not found in OpenGL ES driver library.",
        ),
        Some(3) => (Verdict::Unavailable, "Issues allocating a mutable buffer store."),
        Some(4) => (
            Verdict::Unavailable,
            "Issues deallocating a mutable buffer store.",
        ),
        Some(5) => (
            Verdict::Unavailable,
            "Issues allocating an immutable buffer store.",
        ),
        Some(6) => (
            Verdict::Unavailable,
            "Unexpected success deallocating an immutable buffer store.",
        ),
        Some(other) => {
            return (Verdict::Undetermined, format!("Unexpected result: ({other})"));
        }
    };
    (verdict, message.to_string())
}

/// Last record that reports a status, with its code.
fn status_record(records: &[CanonicalRecord]) -> Option<(&CanonicalRecord, i64)> {
    records.iter().rev().find_map(|record| {
        let value = if record.field == STATUS_FIELD {
            Some(&record.value)
        } else {
            record.custom_field(STATUS_FIELD)
        };
        value.and_then(|value| value.as_i64()).map(|code| (record, code))
    })
}

/// Draws the run's verdict as one flat line across the window.
#[derive(Debug, Clone, Copy, Default)]
pub struct VerdictRenderer;

impl ChartRenderer for VerdictRenderer {
    fn name(&self) -> &'static str {
        "buffer-storage-verdict"
    }

    fn matches(&self, _operation_id: &str, field: &str) -> bool {
        field == STATUS_FIELD
    }

    fn render(&self, chart: &Chart, panel: &mut Panel, ctx: &PanelContext) {
        let (verdict, _) = describe_status(status_record(&chart.data).map(|(_, code)| code));
        let row = verdict.row();
        panel.set_y_label(VERDICT_AXIS);
        panel.line(
            verdict.to_string(),
            vec![(0.0, row), (ctx.span().max(1.0), row)],
            verdict.color(),
        );
    }
}

/// Handles the GLES3 buffer storage compliance suite. The suite reports a
/// single verdict, charted as one panel over the whole run.
pub struct BufferStorageHandler {
    status: Option<i64>,
    renderers: RendererRegistry,
}

impl BufferStorageHandler {
    pub fn verdict(&self) -> (Verdict, String) {
        describe_status(self.status)
    }
}

impl SuiteHandler for BufferStorageHandler {
    fn matches(suite: &Suite) -> bool {
        suite.name().contains("GLES3 Buffer Storage")
    }

    fn create(suite: &Suite) -> Self {
        Self {
            status: status_record(suite.entries()).map(|(_, code)| code),
            renderers: RendererRegistry::new().register(VerdictRenderer),
        }
    }

    fn summarize(suites: &[&Suite]) -> Option<String> {
        let mut out = String::from("GLES3 buffer storage results:\n");
        for suite in suites {
            let status = status_record(suite.entries()).map(|(_, code)| code);
            let (verdict, message) = describe_status(status);
            let _ = write!(out, "  {} [{}]: {verdict}", suite.name(), suite.source().display());
            if !message.is_empty() {
                let _ = write!(out, " ({message})");
            }
            out.push('\n');
        }
        Some(out)
    }

    fn name(&self) -> &'static str {
        NAME
    }

    fn assign_renderer(&self, chart: &mut Chart) -> bool {
        self.renderers.assign(chart)
    }

    /// One verdict chart over every entry, so the panel spans the run.
    fn build_charts(&self, suite: &Suite) -> Vec<Chart> {
        let operation_id = status_record(suite.entries())
            .map_or(OPERATION, |(record, _)| record.operation_id.as_str());
        let topic = Topic::new(operation_id, STATUS_FIELD);
        let mut chart = Chart::new(suite.name(), &topic, suite.entries().to_vec());
        if self.assign_renderer(&mut chart) {
            vec![chart]
        } else {
            Vec::new()
        }
    }

    fn analyze(&self, suite: &Suite, report: &mut AnalysisCallback<'_>) -> Option<String> {
        let datum = status_record(suite.entries()).map(|(record, _)| record);
        let (verdict, message) = self.verdict();
        if !message.is_empty() {
            report(suite, datum, &message);
        }
        Some(verdict.to_string())
    }
}
