use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use plotters::prelude::*;
use tracing::debug;

use crate::config::PlotSettings;
use crate::render::{Figure, Mark, PlotBackend, Rgb};

const FONT_FAMILY: &str = "sans-serif";
const LEGEND_SWATCH: i32 = 16;

/// Writes each figure as `<output_dir>/<title-slug>.svg`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SvgBackend;

impl PlotBackend for SvgBackend {
    fn name(&self) -> &'static str {
        "svg"
    }

    fn draw(&self, figure: &Figure, settings: &PlotSettings) -> Result<Option<PathBuf>> {
        let directory = settings.resolve_output_dir()?;
        fs::create_dir_all(&directory).with_context(|| {
            format!("Failed to create chart directory {}", directory.display())
        })?;
        let path = directory.join(format!("{}.svg", slugify(&figure.title)));
        draw_svg(figure, settings, &path)
            .with_context(|| format!("Failed to render chart to {}", path.display()))?;
        debug!(path = %path.display(), panels = figure.panels.len(), "wrote svg figure");
        Ok(Some(path))
    }
}

fn to_color(color: Rgb) -> RGBColor {
    RGBColor(color.0, color.1, color.2)
}

/// Lower-case, dash-separated file stem derived from a figure title.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_matches('-').to_string();
    if slug.is_empty() { "figure".into() } else { slug }
}

fn draw_svg(figure: &Figure, settings: &PlotSettings, path: &Path) -> Result<()> {
    let count = figure.panels.len().max(1);
    let height = settings.panel_height * count as u32 + settings.large_font * 4;
    let root = SVGBackend::new(path, (settings.width, height)).into_drawing_area();
    root.fill(&WHITE)?;

    let title = match &figure.subtitle {
        Some(subtitle) => format!("{} | {}", figure.title, subtitle),
        None => figure.title.clone(),
    };
    let body = root.titled(&title, (FONT_FAMILY, settings.large_font as f64))?;
    let areas = body.split_evenly((count, 1));

    let small = settings.small_font as f64;
    let medium = settings.medium_font as f64;
    let x_formatter = |seconds: &f64| format!("{seconds:.0} s");

    for (panel, area) in figure.panels.iter().zip(areas.iter()) {
        let (x0, mut x1) = panel.x_range;
        if x1 <= x0 {
            x1 = x0 + 1.0;
        }
        let (y0, y1) = panel.y_bounds();

        let mut chart = ChartBuilder::on(area)
            .caption(&panel.title, (FONT_FAMILY, medium))
            .margin(6)
            .y_label_area_size(60)
            .x_label_area_size(if panel.show_x_axis { 40 } else { 0 })
            .build_cartesian_2d(x0..x1, y0..y1)?;

        let mut mesh = chart.configure_mesh();
        mesh.x_label_formatter(&x_formatter)
            .label_style((FONT_FAMILY, small));
        if panel.show_x_axis {
            mesh.x_desc(figure.x_label.as_str());
        } else {
            mesh.disable_x_axis();
        }
        if let Some(label) = &panel.y_label {
            mesh.y_desc(label.as_str());
        }
        mesh.draw()?;

        let mut labelled = false;
        for mark in &panel.marks {
            match mark {
                Mark::Line {
                    label,
                    points,
                    color,
                } => {
                    let color = to_color(*color);
                    chart
                        .draw_series(LineSeries::new(points.iter().copied(), &color))?
                        .label(label.as_str())
                        .legend(move |(x, y)| {
                            PathElement::new(vec![(x, y), (x + LEGEND_SWATCH, y)], color)
                        });
                    labelled = true;
                }
                Mark::VerticalRule { x, label, color } => {
                    let color = to_color(*color);
                    let rule = PathElement::new(vec![(*x, y0), (*x, y1)], color);
                    let series = chart.draw_series(std::iter::once(rule))?;
                    if let Some(label) = label {
                        series.label(label.as_str()).legend(move |(lx, ly)| {
                            PathElement::new(vec![(lx, ly), (lx + LEGEND_SWATCH, ly)], color)
                        });
                        labelled = true;
                    }
                }
                Mark::MidlineDots { xs, color } => {
                    let style = to_color(*color).filled();
                    let mid = (y0 + y1) / 2.0;
                    chart.draw_series(xs.iter().map(|x| Circle::new((*x, mid), 3, style)))?;
                }
            }
        }

        if labelled {
            chart
                .configure_series_labels()
                .position(SeriesLabelPosition::UpperRight)
                .label_font((FONT_FAMILY, small))
                .background_style(WHITE.mix(0.8))
                .border_style(BLACK)
                .draw()?;
        }
    }

    root.present()?;
    Ok(())
}
