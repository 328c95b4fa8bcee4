/// Plain 8-bit RGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const SERIES: Rgb = Rgb(31, 119, 180);
    pub const FREE_EVENT: Rgb = Rgb(51, 255, 51);

    /// Convert HSV components in `[0, 1]` to RGB.
    pub fn from_hsv(hue: f64, saturation: f64, value: f64) -> Self {
        let hue = hue.rem_euclid(1.0) * 6.0;
        let sector = hue.floor();
        let fraction = hue - sector;
        let p = value * (1.0 - saturation);
        let q = value * (1.0 - saturation * fraction);
        let t = value * (1.0 - saturation * (1.0 - fraction));
        let (r, g, b) = match sector as u8 {
            0 => (value, t, p),
            1 => (q, value, p),
            2 => (p, value, t),
            3 => (p, q, value),
            4 => (t, p, value),
            _ => (value, p, q),
        };
        let scale = |component: f64| (component.clamp(0.0, 1.0) * 255.0).round() as u8;
        Rgb(scale(r), scale(g), scale(b))
    }
}

/// A recorded drawing primitive. X coordinates are seconds since the
/// figure's window start.
#[derive(Debug, Clone, PartialEq)]
pub enum Mark {
    Line {
        label: String,
        points: Vec<(f64, f64)>,
        color: Rgb,
    },
    /// Full-height marker at one instant.
    VerticalRule {
        x: f64,
        label: Option<String>,
        color: Rgb,
    },
    /// Dots placed at the panel's vertical midpoint.
    MidlineDots { xs: Vec<f64>, color: Rgb },
}

/// Drawing surface handed to a renderer. It records marks; a backend draws
/// them once the whole figure is composed.
#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    pub title: String,
    pub y_label: Option<String>,
    pub x_range: (f64, f64),
    pub show_x_axis: bool,
    pub marks: Vec<Mark>,
}

impl Panel {
    pub fn new(title: impl Into<String>, x_range: (f64, f64), show_x_axis: bool) -> Self {
        Self {
            title: title.into(),
            y_label: None,
            x_range,
            show_x_axis,
            marks: Vec::new(),
        }
    }

    pub fn set_y_label(&mut self, label: impl Into<String>) {
        self.y_label = Some(label.into());
    }

    pub fn line(&mut self, label: impl Into<String>, points: Vec<(f64, f64)>, color: Rgb) {
        self.marks.push(Mark::Line {
            label: label.into(),
            points,
            color,
        });
    }

    /// Line that holds each value until the next sample.
    pub fn step(&mut self, label: impl Into<String>, points: &[(f64, f64)], color: Rgb) {
        let mut stepped = Vec::with_capacity(points.len() * 2);
        for pair in points.windows(2) {
            let (x0, y0) = pair[0];
            let (x1, _) = pair[1];
            stepped.push((x0, y0));
            stepped.push((x1, y0));
        }
        if let Some(last) = points.last() {
            stepped.push(*last);
        }
        self.line(label, stepped, color);
    }

    pub fn vertical_rule(&mut self, x: f64, label: Option<String>, color: Rgb) {
        self.marks.push(Mark::VerticalRule { x, label, color });
    }

    pub fn midline_dots(&mut self, xs: Vec<f64>, color: Rgb) {
        self.marks.push(Mark::MidlineDots { xs, color });
    }

    pub fn is_blank(&self) -> bool {
        self.marks.is_empty()
    }

    /// Y extent of all line marks, padded when flat; `(0, 1)` without lines.
    pub fn y_bounds(&self) -> (f64, f64) {
        let mut bounds: Option<(f64, f64)> = None;
        for mark in &self.marks {
            if let Mark::Line { points, .. } = mark {
                for (_, y) in points.iter().filter(|(_, y)| y.is_finite()) {
                    bounds = Some(match bounds {
                        Some((lo, hi)) => (lo.min(*y), hi.max(*y)),
                        None => (*y, *y),
                    });
                }
            }
        }
        match bounds {
            None => (0.0, 1.0),
            Some((lo, hi)) if (hi - lo).abs() < f64::EPSILON => (lo - 0.5, hi + 0.5),
            Some((lo, hi)) => {
                let pad = (hi - lo) * 0.05;
                (lo - pad, hi + pad)
            }
        }
    }
}

/// Vertically stacked panels sharing one time axis.
#[derive(Debug, Clone, PartialEq)]
pub struct Figure {
    pub title: String,
    pub subtitle: Option<String>,
    pub x_label: String,
    /// Window in seconds, before shifting to start at zero.
    pub window: (f64, f64),
    pub panels: Vec<Panel>,
}

impl Figure {
    pub fn span(&self) -> f64 {
        self.window.1 - self.window.0
    }
}
