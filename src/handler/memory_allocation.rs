use std::sync::Arc;

use crate::chart::Chart;
use crate::handler::{AnalysisCallback, SuiteHandler};
use crate::render::{
    ChartRenderer, IgnoreRenderer, RendererRegistry, RendererTable, TableRenderer, plots,
};
use crate::suite::Suite;

pub const NAME: &str = "memory-allocation";
pub const OPERATION: &str = "MemoryAllocOperation";

const EVENT_FIELDS: &[&str] = &["on_trim_level", "is_free", "is_malloc_fail"];
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Renderer for the memory allocation stress operation.
pub fn memory_renderer() -> TableRenderer {
    let series = RendererTable::system_defaults()
        .with("total_allocation_bytes", plots::render_memory_as_mb);
    let events = RendererTable::new()
        .with("on_trim_level", plots::render_trim_events)
        .with("is_free", plots::render_free_events)
        .with("is_malloc_fail", plots::render_ignore);
    TableRenderer::new("memory", Some(OPERATION), series).with_events(EVENT_FIELDS, events)
}

/// Handles memory allocation stress suites. Every topic is charted; fields
/// the memory renderer does not know render as blank panels.
pub struct MemoryAllocationHandler {
    renderers: RendererRegistry,
}

impl SuiteHandler for MemoryAllocationHandler {
    fn matches(suite: &Suite) -> bool {
        suite.name().contains("Memory allocation")
    }

    fn create(_suite: &Suite) -> Self {
        Self {
            renderers: RendererRegistry::new()
                .register(memory_renderer())
                .register(IgnoreRenderer),
        }
    }

    fn name(&self) -> &'static str {
        NAME
    }

    fn assign_renderer(&self, chart: &mut Chart) -> bool {
        let renderer: Arc<dyn ChartRenderer> = self
            .renderers
            .resolve(&chart.operation_id, &chart.field)
            .unwrap_or_else(|| Arc::new(IgnoreRenderer));
        chart.set_renderer(renderer);
        true
    }

    fn analyze(&self, suite: &Suite, report: &mut AnalysisCallback<'_>) -> Option<String> {
        let mut peak: Option<f64> = None;
        let mut failures = 0usize;
        let mut low_memory = 0usize;

        for datum in suite.entries() {
            if datum.operation_id != OPERATION {
                continue;
            }
            match datum.field.as_str() {
                "total_allocation_bytes" => {
                    if let Some(bytes) = datum.value.as_f64() {
                        peak = Some(peak.map_or(bytes, |current| current.max(bytes)));
                    }
                }
                "is_malloc_fail" => {
                    failures += 1;
                    report(
                        suite,
                        Some(datum),
                        &format!("allocation failed at {:.3} s", datum.seconds()),
                    );
                }
                "sys_mem_info.low_memory" => {
                    if datum.value.as_f64().unwrap_or(0.0) != 0.0 {
                        low_memory += 1;
                    }
                }
                _ => {}
            }
        }

        let peak = peak?;
        Some(format!(
            "peak allocation {:.1} MB, {failures} allocation failure(s), {low_memory} low-memory sample(s)",
            peak / BYTES_PER_MB
        ))
    }
}
