use std::fmt::Write as _;

use crate::chart::Chart;
use crate::handler::{AnalysisCallback, SuiteHandler};
use crate::render::{
    Panel, PanelContext, RendererRegistry, RendererTable, Rgb, TableRenderer, plots,
};
use crate::suite::Suite;

pub const NAME: &str = "temperature";
pub const TEMPERATURE_FIELD: &str = "temperature_celsius";

/// Readings above this are reported by analysis.
pub const THROTTLE_CELSIUS: f64 = 45.0;

const HEAT: Rgb = Rgb(230, 85, 13);

fn render_temperature(chart: &Chart, panel: &mut Panel, ctx: &PanelContext) {
    panel.set_y_label("°C");
    panel.line(chart.field.clone(), chart.points(ctx.window_start), HEAT);
}

fn render_thermal_status(chart: &Chart, panel: &mut Panel, ctx: &PanelContext) {
    panel.set_y_label("status");
    panel.step(chart.field.clone(), &chart.points(ctx.window_start), HEAT);
}

pub fn thermal_renderer() -> TableRenderer {
    let series = RendererTable::system_defaults()
        .with(TEMPERATURE_FIELD, render_temperature)
        .with("skin_temperature_celsius", render_temperature)
        .with("thermal_status", render_thermal_status)
        .with("cpu_frequency_hz", plots::render_series);
    TableRenderer::new("thermal", None, series)
}

/// Handles thermal soak suites. Topics without a renderer are omitted.
pub struct TemperatureHandler {
    renderers: RendererRegistry,
}

impl SuiteHandler for TemperatureHandler {
    fn matches(suite: &Suite) -> bool {
        let name = suite.name().to_ascii_lowercase();
        name.contains("temperature") || name.contains("thermal")
    }

    fn create(_suite: &Suite) -> Self {
        Self {
            renderers: RendererRegistry::new().register(thermal_renderer()),
        }
    }

    fn summarize(suites: &[&Suite]) -> Option<String> {
        let mut out = String::from("Peak temperatures:\n");
        for suite in suites {
            match peak_temperature(suite) {
                Some(peak) => {
                    let _ = writeln!(out, "  {}: {peak:.1} °C", suite.name());
                }
                None => {
                    let _ = writeln!(out, "  {}: no readings", suite.name());
                }
            }
        }
        Some(out)
    }

    fn name(&self) -> &'static str {
        NAME
    }

    fn assign_renderer(&self, chart: &mut Chart) -> bool {
        self.renderers.assign(chart)
    }

    fn analyze(&self, suite: &Suite, report: &mut AnalysisCallback<'_>) -> Option<String> {
        let readings = suite
            .entries()
            .iter()
            .filter(|record| record.field == TEMPERATURE_FIELD);

        let mut above = false;
        for record in readings {
            let Some(celsius) = record.value.as_f64() else {
                continue;
            };
            // Report each excursion once, on the reading that crosses the limit.
            if celsius > THROTTLE_CELSIUS && !above {
                report(
                    suite,
                    Some(record),
                    &format!(
                        "temperature {celsius:.1} °C exceeds {THROTTLE_CELSIUS:.1} °C at {:.3} s",
                        record.seconds()
                    ),
                );
            }
            above = celsius > THROTTLE_CELSIUS;
        }

        peak_temperature(suite).map(|peak| format!("peak temperature {peak:.1} °C"))
    }
}

fn peak_temperature(suite: &Suite) -> Option<f64> {
    suite
        .entries()
        .iter()
        .filter(|record| record.field == TEMPERATURE_FIELD)
        .filter_map(|record| record.value.as_f64())
        .reduce(f64::max)
}
