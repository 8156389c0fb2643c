//! Polar projection of phasors and the SVG phasor diagram

use std::fmt::Write as _;

use crate::model::{Phase, PhasorSample};

/// A point in SVG space (Y grows downward)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn offset(self, by: Point) -> Point {
        Point::new(self.x + by.x, self.y + by.y)
    }

    pub fn distance(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Project magnitude `V` at `angle_deg` to `V·(cos θ, −sin θ)`
pub fn project(magnitude: f64, angle_deg: f64) -> Point {
    let theta = angle_deg.to_radians();
    Point::new(magnitude * theta.cos(), -magnitude * theta.sin())
}

/// Like [`project`], but rejects non-finite or negative input
pub fn project_checked(magnitude: f64, angle_deg: f64) -> Option<Point> {
    if !magnitude.is_finite() || !angle_deg.is_finite() || magnitude < 0.0 {
        return None;
    }
    Some(project(magnitude, angle_deg))
}

const ARROW_LENGTH: f64 = 12.0;
const ARROW_SPREAD_DEG: f64 = 30.0;

/// Arrowhead triangle at `to`: the tip plus two barbs rotated ±30° off the shaft
pub fn arrowhead(from: Point, to: Point) -> [Point; 3] {
    let direction = (to.y - from.y).atan2(to.x - from.x);
    let spread = ARROW_SPREAD_DEG.to_radians();
    let barb = |rotation: f64| {
        Point::new(
            to.x - ARROW_LENGTH * (direction + rotation).cos(),
            to.y - ARROW_LENGTH * (direction + rotation).sin(),
        )
    };
    [to, barb(-spread), barb(spread)]
}

const PHASE_COLORS: [&str; 3] = ["#EF4444", "#3B82F6", "#10B981"];

/// A phasor positioned on the diagram
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedPhasor {
    pub phase: Phase,
    pub name: String,
    pub color: &'static str,
    pub magnitude: f64,
    pub angle: f64,
    pub tip: Point,
}

/// Geometry of a square polar plot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhasorDiagram {
    pub origin: Point,
    pub radius: f64,
    pub size: f64,
}

impl Default for PhasorDiagram {
    fn default() -> Self {
        Self {
            origin: Point::new(350.0, 350.0),
            radius: 250.0,
            size: 700.0,
        }
    }
}

impl PhasorDiagram {
    /// Concentric reference circles at 25/50/75/100% of the radius
    pub fn grid_radii(&self) -> [f64; 4] {
        [0.25, 0.5, 0.75, 1.0].map(|f| self.radius * f)
    }

    /// Twelve radial gridlines, one every 30°
    pub fn radial_lines(&self) -> Vec<(Point, Point)> {
        (0..12)
            .map(|i| {
                let end = self.origin.offset(project(self.radius, f64::from(i) * 30.0));
                (self.origin, end)
            })
            .collect()
    }

    /// Cardinal labels placed just outside the outer circle
    pub fn angle_labels(&self) -> Vec<(&'static str, Point)> {
        [(0.0, "0°"), (90.0, "90°"), (180.0, "180°"), (270.0, "270°")]
            .into_iter()
            .map(|(angle, label)| (label, self.origin.offset(project(self.radius + 20.0, angle))))
            .collect()
    }

    /// Place the three phasors, scaled so the magnitude lands on the outer circle.
    /// Malformed magnitudes place nothing; a malformed angle drops just that phase.
    pub fn place(&self, sample: &PhasorSample, names: [&str; 3]) -> Vec<PlacedPhasor> {
        let Some(magnitude) = sample.magnitude.filter(|m| m.is_finite() && *m > 0.0) else {
            return Vec::new();
        };
        let scale = self.radius / magnitude;

        Phase::ALL
            .iter()
            .zip(sample.angles)
            .zip(names)
            .zip(PHASE_COLORS)
            .filter_map(|(((phase, angle), name), color)| {
                let angle = angle?;
                let offset = project_checked(magnitude * scale, angle)?;
                Some(PlacedPhasor {
                    phase: *phase,
                    name: name.to_string(),
                    color,
                    magnitude,
                    angle,
                    tip: self.origin.offset(offset),
                })
            })
            .collect()
    }

    /// Render the full diagram. Missing data renders the grid alone.
    pub fn render_svg(&self, sample: &PhasorSample, names: [&str; 3]) -> String {
        let mut svg = String::new();
        let o = self.origin;
        let _ = write!(
            svg,
            r#"<svg class="phasor" width="{s}" height="{s}" viewBox="0 0 {s} {s}" xmlns="http://www.w3.org/2000/svg">"#,
            s = self.size
        );

        svg.push_str(r#"<g opacity="0.3">"#);
        for r in self.grid_radii() {
            let dash = if r == self.radius { "none" } else { "4,4" };
            let _ = write!(
                svg,
                r##"<circle cx="{:.2}" cy="{:.2}" r="{:.2}" stroke="#9CA3AF" stroke-width="1" fill="none" stroke-dasharray="{}"/>"##,
                o.x, o.y, r, dash
            );
        }
        for (start, end) in self.radial_lines() {
            let _ = write!(
                svg,
                r##"<line x1="{:.2}" y1="{:.2}" x2="{:.2}" y2="{:.2}" stroke="#9CA3AF" stroke-width="1" stroke-dasharray="2,3"/>"##,
                start.x, start.y, end.x, end.y
            );
        }
        svg.push_str("</g>");

        for (label, at) in self.angle_labels() {
            let _ = write!(
                svg,
                r##"<text x="{:.2}" y="{:.2}" text-anchor="middle" fill="#6B7280" font-size="12">{}</text>"##,
                at.x,
                at.y + 5.0,
                label
            );
        }
        let _ = write!(
            svg,
            r##"<circle cx="{:.2}" cy="{:.2}" r="{:.2}" stroke="#1F2937" stroke-width="2" fill="none" opacity="0.8"/>"##,
            o.x, o.y, self.radius
        );

        for phasor in self.place(sample, names) {
            let [tip, left, right] = arrowhead(o, phasor.tip);
            let _ = write!(
                svg,
                r#"<g class="phasor-{phase}"><title>{name}&#10;Mag: {mag:.2}&#10;Ang: {ang:.1}°</title><line x1="{ox:.2}" y1="{oy:.2}" x2="{tx:.2}" y2="{ty:.2}" stroke="{color}" stroke-width="4"/><polygon points="{tx:.2},{ty:.2} {lx:.2},{ly:.2} {rx:.2},{ry:.2}" fill="{color}"/><text x="{nx:.2}" y="{ny:.2}" text-anchor="middle" fill="{color}" font-size="14" font-weight="700">{name}</text></g>"#,
                phase = phasor.phase.as_str(),
                name = phasor.name,
                mag = phasor.magnitude,
                ang = phasor.angle,
                ox = o.x,
                oy = o.y,
                tx = tip.x,
                ty = tip.y,
                lx = left.x,
                ly = left.y,
                rx = right.x,
                ry = right.y,
                color = phasor.color,
                nx = tip.x + 15.0,
                ny = tip.y + 5.0,
            );
        }

        let _ = write!(
            svg,
            r##"<circle cx="{:.2}" cy="{:.2}" r="6" fill="#1F2937"/><circle cx="{:.2}" cy="{:.2}" r="3" fill="#FFFFFF"/></svg>"##,
            o.x, o.y, o.x, o.y
        );
        svg
    }

    /// Legend rows: `name  mag ∠ ang°`
    pub fn legend(&self, sample: &PhasorSample, names: [&str; 3]) -> Vec<(String, &'static str, String)> {
        self.place(sample, names)
            .into_iter()
            .map(|p| {
                let text = format!("{:.2} ∠ {:.1}°", p.magnitude, p.angle);
                (p.name, p.color, text)
            })
            .collect()
    }
}
