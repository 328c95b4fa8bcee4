use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::Result;

use crate::config::PlotSettings;
use crate::render::{Figure, Mark, PlotBackend};

/// Prints a per-panel summary instead of drawing; useful on headless hosts.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextBackend;

impl TextBackend {
    pub fn format(figure: &Figure) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "== {} ==", figure.title);
        if let Some(subtitle) = &figure.subtitle {
            let _ = writeln!(out, "   {subtitle}");
        }
        let _ = writeln!(
            out,
            "   window: {:.3} s .. {:.3} s ({:.3} s)",
            figure.window.0,
            figure.window.1,
            figure.span()
        );
        for (index, panel) in figure.panels.iter().enumerate() {
            let _ = write!(out, "  [{index}] {}", panel.title);
            if let Some(label) = &panel.y_label {
                let _ = write!(out, " ({label})");
            }
            if panel.is_blank() {
                let _ = writeln!(out, ": blank");
                continue;
            }
            let _ = writeln!(out);
            for mark in &panel.marks {
                match mark {
                    Mark::Line { label, points, .. } => {
                        let values = points.iter().map(|(_, y)| *y);
                        let min = values.clone().fold(f64::INFINITY, f64::min);
                        let max = values.fold(f64::NEG_INFINITY, f64::max);
                        let _ = writeln!(
                            out,
                            "      line {label}: {} samples, min {min:.3}, max {max:.3}",
                            points.len()
                        );
                    }
                    Mark::VerticalRule { x, label, .. } => {
                        let _ = writeln!(
                            out,
                            "      event at {x:.3} s{}",
                            label
                                .as_ref()
                                .map(|label| format!(" ({label})"))
                                .unwrap_or_default()
                        );
                    }
                    Mark::MidlineDots { xs, .. } => {
                        let _ = writeln!(out, "      {} occurrences", xs.len());
                    }
                }
            }
        }
        if let Some(last) = figure.panels.last() {
            if last.show_x_axis {
                let _ = writeln!(out, "   x: {}", figure.x_label);
            }
        }
        out
    }
}

impl PlotBackend for TextBackend {
    fn name(&self) -> &'static str {
        "text"
    }

    fn draw(&self, figure: &Figure, _settings: &PlotSettings) -> Result<Option<PathBuf>> {
        print!("{}", Self::format(figure));
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{Panel, Rgb};

    #[test]
    fn summarises_marks_per_panel() {
        let mut series = Panel::new("temperature_celsius", (0.0, 2.0), false);
        series.line("temperature_celsius", vec![(0.0, 30.0), (2.0, 45.5)], Rgb::SERIES);
        let blank = Panel::new("unknown_field", (0.0, 2.0), true);
        let figure = Figure {
            title: "Thermal".into(),
            subtitle: Some("Google Pixel 5".into()),
            x_label: "time (seconds since start of test)".into(),
            window: (1.0, 3.0),
            panels: vec![series, blank],
        };

        let text = TextBackend::format(&figure);
        assert!(text.starts_with("== Thermal =="));
        assert!(text.contains("window: 1.000 s .. 3.000 s (2.000 s)"));
        assert!(text.contains("line temperature_celsius: 2 samples, min 30.000, max 45.500"));
        assert!(text.contains("[1] unknown_field: blank"));
        assert!(text.contains("x: time (seconds since start of test)"));
    }
}
