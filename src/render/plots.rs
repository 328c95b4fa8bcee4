use crate::chart::Chart;
use crate::render::{PanelContext, panel::Panel, panel::Rgb};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

pub fn render_ignore(_chart: &Chart, _panel: &mut Panel, _ctx: &PanelContext) {}

pub fn render_series(chart: &Chart, panel: &mut Panel, ctx: &PanelContext) {
    panel.line(chart.field.clone(), chart.points(ctx.window_start), Rgb::SERIES);
}

pub fn render_memory_as_mb(chart: &Chart, panel: &mut Panel, ctx: &PanelContext) {
    let points = chart
        .points(ctx.window_start)
        .into_iter()
        .map(|(x, bytes)| (x, bytes / BYTES_PER_MB))
        .collect();
    panel.set_y_label("MB");
    panel.line(chart.field.clone(), points, Rgb::SERIES);
}

pub fn render_boolean(chart: &Chart, panel: &mut Panel, ctx: &PanelContext) {
    let points: Vec<(f64, f64)> = chart
        .points(ctx.window_start)
        .into_iter()
        .map(|(x, value)| (x, if value != 0.0 { 1.0 } else { 0.0 }))
        .collect();
    panel.set_y_label("true / false");
    panel.step(chart.field.clone(), &points, Rgb::SERIES);
}

pub fn render_oom_score(chart: &Chart, panel: &mut Panel, ctx: &PanelContext) {
    panel.set_y_label("oom score");
    panel.line(chart.field.clone(), chart.points(ctx.window_start), Rgb(214, 39, 40));
}

/// One coloured rule per trim notification, labelled with its level.
pub fn render_trim_events(chart: &Chart, panel: &mut Panel, ctx: &PanelContext) {
    let count = chart.data.len();
    for (index, datum) in chart.data.iter().enumerate() {
        let color = Rgb::from_hsv(index as f64 / count as f64, 0.7, 0.7);
        panel.vertical_rule(
            datum.seconds() - ctx.window_start,
            Some(format!("on_trim: level {}", datum.value)),
            color,
        );
    }
}

pub fn render_free_events(chart: &Chart, panel: &mut Panel, ctx: &PanelContext) {
    panel.midline_dots(chart.offsets(ctx.window_start), Rgb::FREE_EVENT);
}
