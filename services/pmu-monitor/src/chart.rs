//! SVG line charts and the P-Q scatter for the graphs view

use std::collections::BTreeSet;
use std::fmt::Write as _;

use crate::model::{Phase, PowerPoint};

pub const SERIES_COLORS: [&str; 6] = [
    "#8884d8", "#82ca9d", "#ffc658", "#ff7300", "#e6194b", "#3cb44b",
];

/// Fields to plot for `base`: the total if present, then each selected phase present.
/// Presence is judged on the first point only.
pub fn select_fields(points: &[PowerPoint], base: &str, phases: &BTreeSet<Phase>) -> Vec<String> {
    let Some(first) = points.first() else {
        return Vec::new();
    };
    let mut fields = Vec::new();
    if first.has_field(base) {
        fields.push(base.to_string());
    }
    for phase in phases {
        let field = format!("{}_{}", base, phase.suffix());
        if first.has_field(&field) {
            fields.push(field);
        }
    }
    fields
}

/// Min/max over the finite values, padded when the range is flat
pub fn value_range(values: impl IntoIterator<Item = f64>) -> Option<(f64, f64)> {
    let (min, max) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold(None, |acc: Option<(f64, f64)>, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })?;
    if max - min < f64::EPSILON {
        Some((min - 1.0, max + 1.0))
    } else {
        Some((min, max))
    }
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    width: f64,
    height: f64,
    left: f64,
    right: f64,
    top: f64,
    bottom: f64,
}

impl Frame {
    const DEFAULT: Frame = Frame {
        width: 900.0,
        height: 360.0,
        left: 70.0,
        right: 20.0,
        top: 40.0,
        bottom: 50.0,
    };

    fn plot_width(&self) -> f64 {
        self.width - self.left - self.right
    }

    fn plot_height(&self) -> f64 {
        self.height - self.top - self.bottom
    }

    fn scale_x(&self, v: f64, (lo, hi): (f64, f64)) -> f64 {
        self.left + (v - lo) / (hi - lo) * self.plot_width()
    }

    fn scale_y(&self, v: f64, (lo, hi): (f64, f64)) -> f64 {
        self.top + self.plot_height() - (v - lo) / (hi - lo) * self.plot_height()
    }

    fn open(&self, svg: &mut String, class: &str, title: &str) {
        let _ = write!(
            svg,
            r##"<svg class="{class}" width="100%" viewBox="0 0 {w} {h}" xmlns="http://www.w3.org/2000/svg"><rect x="0" y="0" width="{w}" height="{h}" fill="#FFFFFF"/><text x="{l}" y="24" font-size="16" font-weight="600" fill="#111827">{title}</text>"##,
            w = self.width,
            h = self.height,
            l = self.left,
        );
    }

    fn axes(&self, svg: &mut String, x_label: &str, y_label: &str) {
        let x0 = self.left;
        let y0 = self.top + self.plot_height();
        let _ = write!(
            svg,
            r##"<line x1="{x0}" y1="{y0}" x2="{x1}" y2="{y0}" stroke="#6B7280"/><line x1="{x0}" y1="{t}" x2="{x0}" y2="{y0}" stroke="#6B7280"/><text x="{cx}" y="{by}" text-anchor="middle" font-size="12" fill="#374151">{x_label}</text><text x="16" y="{cy}" text-anchor="middle" font-size="12" fill="#374151" transform="rotate(-90 16 {cy})">{y_label}</text>"##,
            x1 = x0 + self.plot_width(),
            t = self.top,
            cx = x0 + self.plot_width() / 2.0,
            by = self.height - 8.0,
            cy = self.top + self.plot_height() / 2.0,
        );
    }

    fn y_ticks(&self, svg: &mut String, range: (f64, f64)) {
        for i in 0..=4 {
            let v = range.0 + (range.1 - range.0) * f64::from(i) / 4.0;
            let y = self.scale_y(v, range);
            let _ = write!(
                svg,
                r##"<line x1="{x0}" y1="{y:.2}" x2="{x1}" y2="{y:.2}" stroke="#E5E7EB"/><text x="{tx}" y="{ty:.2}" text-anchor="end" font-size="10" fill="#6B7280">{v:.2}</text>"##,
                x0 = self.left,
                x1 = self.left + self.plot_width(),
                tx = self.left - 6.0,
                ty = y + 3.0,
            );
        }
    }

    fn no_data(&self, svg: &mut String) {
        let _ = write!(
            svg,
            r##"<text x="{}" y="{}" text-anchor="middle" font-size="14" fill="#9CA3AF">No data</text>"##,
            self.width / 2.0,
            self.height / 2.0
        );
    }
}

/// A titled time-series line chart
#[derive(Debug, Clone)]
pub struct LineChart {
    pub title: String,
    pub y_label: String,
}

impl LineChart {
    pub fn new(title: impl Into<String>, y_label: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            y_label: y_label.into(),
        }
    }

    pub fn render(&self, points: &[PowerPoint], fields: &[String]) -> String {
        let frame = Frame::DEFAULT;
        let mut svg = String::new();
        frame.open(&mut svg, "line-chart", &self.title);
        frame.axes(&mut svg, "Time", &self.y_label);

        let range = value_range(
            fields
                .iter()
                .flat_map(|f| points.iter().filter_map(move |p| p.value(f))),
        );
        let Some(y_range) = range else {
            frame.no_data(&mut svg);
            svg.push_str("</svg>");
            return svg;
        };
        frame.y_ticks(&mut svg, y_range);

        let x_range = (0.0, (points.len().max(2) - 1) as f64);
        let label_every = (points.len() / 6).max(1);
        for (i, point) in points.iter().enumerate().step_by(label_every) {
            let x = frame.scale_x(i as f64, x_range);
            let _ = write!(
                svg,
                r##"<text x="{x:.2}" y="{y}" text-anchor="middle" font-size="10" fill="#6B7280">{}</text>"##,
                point.clock_label(),
                y = frame.top + frame.plot_height() + 16.0,
            );
        }

        for (n, field) in fields.iter().enumerate() {
            let color = SERIES_COLORS[n % SERIES_COLORS.len()];
            // Gaps in a series split the polyline
            let mut segments: Vec<Vec<(f64, f64)>> = vec![Vec::new()];
            for (i, point) in points.iter().enumerate() {
                match point.value(field) {
                    Some(v) => {
                        if let Some(segment) = segments.last_mut() {
                            segment.push((frame.scale_x(i as f64, x_range), frame.scale_y(v, y_range)));
                        }
                    }
                    None => segments.push(Vec::new()),
                }
            }
            for segment in segments.iter().filter(|s| !s.is_empty()) {
                let coords: Vec<String> = segment
                    .iter()
                    .map(|(x, y)| format!("{:.2},{:.2}", x, y))
                    .collect();
                let _ = write!(
                    svg,
                    r#"<polyline fill="none" stroke="{color}" stroke-width="2" points="{}"><title>{field}</title></polyline>"#,
                    coords.join(" ")
                );
            }
            let _ = write!(
                svg,
                r##"<rect x="{x}" y="30" width="10" height="10" fill="{color}"/><text x="{tx}" y="39" font-size="11" fill="#374151">{field}</text>"##,
                x = frame.width - frame.right - 80.0 * (fields.len() - n) as f64,
                tx = frame.width - frame.right - 80.0 * (fields.len() - n) as f64 + 14.0,
            );
        }

        svg.push_str("</svg>");
        svg
    }
}

/// P against Q, one dot per point with a P/Q/PF tooltip
pub fn render_pq_scatter(points: &[PowerPoint]) -> String {
    let frame = Frame::DEFAULT;
    let mut svg = String::new();
    frame.open(&mut svg, "pq-scatter", "P-Q Scatter");
    frame.axes(&mut svg, "Active Power (P)", "Reactive Power (Q)");

    let pairs: Vec<(f64, f64, Option<f64>)> = points
        .iter()
        .filter_map(|p| Some((p.value("P")?, p.value("Q")?, p.value("PF"))))
        .collect();

    let (Some(x_range), Some(y_range)) = (
        value_range(pairs.iter().map(|(p, _, _)| *p)),
        value_range(pairs.iter().map(|(_, q, _)| *q)),
    ) else {
        frame.no_data(&mut svg);
        svg.push_str("</svg>");
        return svg;
    };
    frame.y_ticks(&mut svg, y_range);

    for (p, q, pf) in &pairs {
        let pf = pf.map_or_else(|| "N/A".to_string(), |v| format!("{:.3}", v));
        let _ = write!(
            svg,
            r##"<circle cx="{:.2}" cy="{:.2}" r="4" fill="#8884d8"><title>P: {:.2} W&#10;Q: {:.2} VAR&#10;PF: {}</title></circle>"##,
            frame.scale_x(*p, x_range),
            frame.scale_y(*q, y_range),
            p,
            q,
            pf
        );
    }

    svg.push_str("</svg>");
    svg
}

/// Toggle a displayed phase; removing the last one is refused.
/// Returns whether the set changed.
pub fn toggle_phase(phases: &mut BTreeSet<Phase>, phase: Phase) -> bool {
    if phases.contains(&phase) {
        if phases.len() == 1 {
            return false;
        }
        phases.remove(&phase);
    } else {
        phases.insert(phase);
    }
    true
}
