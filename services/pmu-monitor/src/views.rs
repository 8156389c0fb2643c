//! Server-rendered HTML for the console pages

use std::collections::{BTreeSet, HashSet};
use std::time::Duration;

use crate::alert_channel::ChannelState;
use crate::chart::{self, LineChart};
use crate::error::ErrorKind;
use crate::model::{Alert, MeasurementRow, Phase, Protocol, Selection, Timeline};
use crate::phasor::PhasorDiagram;
use crate::poller::ViewSlot;
use crate::shell::View;

/// Chrome shared by every protected page
#[derive(Debug, Clone)]
pub struct PageContext {
    pub view: View,
    pub refresh: Option<Duration>,
    pub channel: ChannelState,
    pub protocol: Protocol,
}

pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Power factor to 3 decimals
pub fn format_pf(pf: Option<f64>) -> String {
    pf.filter(|v| v.is_finite())
        .map_or_else(|| "N/A".to_string(), |v| format!("{:.3}", v))
}

/// Active power in watts to 2 decimals
pub fn format_watts(p: Option<f64>) -> String {
    p.filter(|v| v.is_finite())
        .map_or_else(|| "N/A".to_string(), |v| format!("{:.2} W", v))
}

/// Scale a base-unit value by 1/1000 and print 5 decimals (`kVAR`, `kVA`)
pub fn format_kilo(value: Option<f64>, unit: &str) -> String {
    value
        .filter(|v| v.is_finite())
        .map_or_else(|| "N/A".to_string(), |v| format!("{:.5} {}", v / 1000.0, unit))
}

/// Table cell: 2 decimals, blank when missing
pub fn format_cell(value: Option<f64>) -> String {
    value
        .filter(|v| v.is_finite())
        .map(|v| format!("{:.2}", v))
        .unwrap_or_default()
}

pub fn distinct_pmus(rows: &[MeasurementRow]) -> usize {
    rows.iter().map(MeasurementRow::pmu_ref).collect::<HashSet<_>>().len()
}

pub fn alert_line(alert: &Alert) -> String {
    format!(
        "PMU {} has abnormal {} — {:.2}",
        alert.pmu, alert.kind, alert.value
    )
}

fn layout(title: &str, body: &str, refresh: Option<Duration>) -> String {
    let reload = refresh
        .map(|d| {
            format!(
                "<script>setTimeout(() => location.reload(), {});</script>",
                d.as_millis().max(250)
            )
        })
        .unwrap_or_default();
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>{title} - PMU Monitor</title>
    {reload}
</head>
<body style="font-family: system-ui, sans-serif; background-color: #f3f4f6; margin: 0;">
{body}
</body>
</html>"#,
        title = escape(title),
    )
}

fn nav(ctx: &PageContext) -> String {
    let links: String = View::PROTECTED
        .iter()
        .map(|v| {
            let border = if *v == ctx.view { "#1e3a8a" } else { "transparent" };
            format!(
                r#"<a href="{}" style="padding: 0.5rem 1rem; color: #1e3a8a; font-weight: 600; text-decoration: none; border-bottom: 2px solid {};">{}</a>"#,
                v.path(),
                border,
                v.title()
            )
        })
        .collect();

    let protocols: String = Protocol::ALL
        .iter()
        .map(|p| {
            let selected = if *p == ctx.protocol { " selected" } else { "" };
            format!(r#"<option value="{}"{}>{}</option>"#, p.as_str(), selected, p)
        })
        .collect();

    let banner = if ctx.channel.is_live() || ctx.channel == ChannelState::Disabled {
        String::new()
    } else {
        format!(
            r#"<div id="alert-banner" style="background-color: #fff3cd; color: #856404; padding: 0.5rem 1rem; text-align: center;">{}</div>"#,
            escape(&ctx.channel.describe())
        )
    };

    format!(
        r#"<header style="background-color: #e0e7ff; box-shadow: 0 1px 3px rgba(0,0,0,0.1);">
    <nav style="display: flex; justify-content: space-around; align-items: center; padding: 0.75rem; font-size: 1.1rem;">
        {links}
        <form method="post" action="/protocol" style="margin: 0;">
            <select name="protocol" onchange="this.form.submit()" style="padding: 0.3rem; border-radius: 0.4rem; background-color: #1d4ed8; color: white;">{protocols}</select>
        </form>
        <form method="post" action="/logout" style="margin: 0;"><button type="submit" style="padding: 0.3rem 0.8rem;">Logout</button></form>
    </nav>
</header>
{banner}"#
    )
}

fn error_note(error: Option<ErrorKind>) -> String {
    match error {
        Some(kind) => format!(
            r#"<div class="fetch-error" style="color: #721c24; background-color: #f8d7da; padding: 0.4rem 0.8rem; border-radius: 0.25rem; margin: 0.5rem 0;">Backend unavailable ({}); showing last known data</div>"#,
            kind
        ),
        None => String::new(),
    }
}

fn select_box(name: &str, options: &[(String, String)], selected: &str) -> String {
    let options: String = options
        .iter()
        .map(|(value, label)| {
            let mark = if value == selected { " selected" } else { "" };
            format!(
                r#"<option value="{}"{}>{}</option>"#,
                escape(value),
                mark,
                escape(label)
            )
        })
        .collect();
    format!(
        r#"<select name="{name}" onchange="this.form.submit()" style="padding: 0.5rem; border-radius: 0.5rem; background-color: #1d4ed8; color: white;">{options}</select>"#
    )
}

/// PMU, timeline and (optionally) phase pickers posting to `/{view}/select`
fn selectors(view: View, pmus: &[String], selection: &Selection, with_phase: bool) -> String {
    let timelines: Vec<(String, String)> = Timeline::ALL
        .iter()
        .map(|t| (t.value().to_string(), t.label().to_string()))
        .collect();
    let pmu_options: Vec<(String, String)> = pmus.iter().map(|p| (p.clone(), p.clone())).collect();
    let phase = if with_phase {
        let phases: Vec<(String, String)> = Phase::ALL
            .iter()
            .map(|p| (p.as_str().to_string(), p.to_string()))
            .collect();
        select_box("phase", &phases, selection.phase.as_str())
    } else {
        String::new()
    };
    format!(
        r#"<form method="post" action="{path}/select" style="display: flex; justify-content: flex-end; gap: 1.5rem; padding: 1rem;">
    {timeline}
    {pmu}
    {phase}
</form>"#,
        path = view.path(),
        timeline = select_box("timeline", &timelines, selection.timeline.value()),
        pmu = select_box("pmu", &pmu_options, selection.pmu.as_deref().unwrap_or("")),
    )
}

fn stat_card(title: &str, label: &str, value: &str) -> String {
    format!(
        r#"<div class="stat-card" style="background-color: white; border-radius: 0.75rem; padding: 1.25rem; box-shadow: 0 1px 3px rgba(0,0,0,0.1);">
    <div style="font-size: 1.5rem; font-weight: 700; color: #1e3a8a;">{title}</div>
    <div style="color: #6b7280;">{label}</div>
    <div style="font-size: 1.4rem; margin-top: 0.5rem;">{value}</div>
</div>"#
    )
}

pub fn login_page(error: Option<&str>) -> String {
    let error = error
        .map(|e| {
            format!(
                r#"<p style="color: #721c24; background-color: #f8d7da; padding: 0.5rem; border-radius: 0.25rem;">{}</p>"#,
                escape(e)
            )
        })
        .unwrap_or_default();
    let body = format!(
        r#"<main style="max-width: 360px; margin: 6rem auto; background-color: white; padding: 2rem; border-radius: 1rem; box-shadow: 0 4px 12px rgba(0,0,0,0.1);">
    <h1 style="text-align: center;">PMU Monitor</h1>
    {error}
    <form method="post" action="/login" style="display: flex; flex-direction: column; gap: 1rem;">
        <input name="username" placeholder="Username" autocomplete="username" style="padding: 0.6rem;">
        <input name="password" type="password" placeholder="Password" autocomplete="current-password" style="padding: 0.6rem;">
        <button type="submit" style="padding: 0.6rem; background-color: #1d4ed8; color: white; border: none; border-radius: 0.5rem;">Login</button>
    </form>
</main>"#
    );
    layout("Login", &body, None)
}

pub fn dashboard_page(ctx: &PageContext, slot: &ViewSlot) -> String {
    let snapshot = slot.snapshot().cloned().unwrap_or_default();
    let cards = [
        stat_card("PF", "Power Factor", &format_pf(snapshot.pf)),
        stat_card("P", "Active Power", &format_watts(snapshot.p)),
        stat_card("Q", "Reactive Power", &format_kilo(snapshot.q, "kVAR")),
        stat_card("S", "Apparent Power", &format_kilo(snapshot.s, "kVA")),
    ]
    .concat();

    let diagram = PhasorDiagram::default();
    let phasor_panel = |title: &str, svg: String, legend: Vec<(String, &'static str, String)>| {
        let legend: String = legend
            .into_iter()
            .map(|(name, color, text)| {
                format!(
                    r#"<li><span style="color: {color}; font-weight: 700;">{name}</span> {text}</li>"#
                )
            })
            .collect();
        format!(
            r#"<div style="flex: 1; background-color: white; padding: 1rem; box-shadow: 0 1px 3px rgba(0,0,0,0.1); text-align: center;">
    <h2 style="font-weight: 600;">{title}</h2>
    {svg}
    <ul style="list-style: none; padding: 0;">{legend}</ul>
</div>"#
        )
    };
    let voltage_names = ["Va", "Vb", "Vc"];
    let current_names = ["Ia", "Ib", "Ic"];
    let voltage = snapshot.voltage_phasors();
    let current = snapshot.current_phasors();
    let panels = [
        phasor_panel(
            "Voltage Phasors",
            diagram.render_svg(&voltage, voltage_names),
            diagram.legend(&voltage, voltage_names),
        ),
        phasor_panel(
            "Current Phasors",
            diagram.render_svg(&current, current_names),
            diagram.legend(&current, current_names),
        ),
    ]
    .concat();

    let body = format!(
        r#"{nav}
<main style="padding: 1rem 2rem;">
    {selectors}
    {error}
    <section style="display: grid; grid-template-columns: repeat(4, 1fr); gap: 1.5rem; margin-bottom: 1.5rem;">{cards}</section>
    <section style="display: flex; gap: 3rem;">{panels}</section>
</main>"#,
        nav = nav(ctx),
        selectors = selectors(View::Dashboard, &slot.pmus, &slot.selection, true),
        error = error_note(slot.last_error),
    );
    layout(View::Dashboard.title(), &body, ctx.refresh)
}

pub fn events_page(ctx: &PageContext, slot: &ViewSlot) -> String {
    let rows = slot.rows();
    let table_rows: String = rows
        .iter()
        .map(|row| {
            let cells: String = row
                .magnitudes()
                .iter()
                .map(|v| format!(r#"<td style="padding: 0.5rem;">{}</td>"#, format_cell(*v)))
                .collect();
            format!(
                r#"<tr style="border-bottom: 1px solid #dee2e6;">
                    <td style="padding: 0.5rem;">{}</td>{}<td style="padding: 0.5rem;">{}</td>
                </tr>"#,
                escape(row.time.as_deref().unwrap_or("")),
                cells,
                escape(row.pmu_ref())
            )
        })
        .collect();

    let body = format!(
        r#"{nav}
<main style="padding: 1.5rem;">
    {selectors}
    {error}
    <div id="pmu-count" style="margin-bottom: 1rem; font-weight: bold;">Number of PMUs: {count}</div>
    <h2>InfluxDB Events</h2>
    <table style="width: 100%; border-collapse: collapse; background-color: white;">
        <thead>
            <tr style="border-bottom: 2px solid #dee2e6;">
                <th style="padding: 0.5rem; text-align: left;">Time</th>
                <th style="padding: 0.5rem; text-align: left;">Vₐ</th>
                <th style="padding: 0.5rem; text-align: left;">Vᵦ</th>
                <th style="padding: 0.5rem; text-align: left;">V𝒸</th>
                <th style="padding: 0.5rem; text-align: left;">Iₐ</th>
                <th style="padding: 0.5rem; text-align: left;">Iᵦ</th>
                <th style="padding: 0.5rem; text-align: left;">I𝒸</th>
                <th style="padding: 0.5rem; text-align: left;">PMURef</th>
            </tr>
        </thead>
        <tbody>{table_rows}</tbody>
    </table>
</main>"#,
        nav = nav(ctx),
        selectors = selectors(View::Events, &slot.pmus, &slot.selection, false),
        error = error_note(slot.last_error),
        count = distinct_pmus(rows),
    );
    layout(View::Events.title(), &body, ctx.refresh)
}

pub fn graphs_page(ctx: &PageContext, slot: &ViewSlot, phases: &BTreeSet<Phase>) -> String {
    let points = slot.points();
    let power_fields: Vec<String> = ["P", "Q", "PF"]
        .iter()
        .flat_map(|base| chart::select_fields(points, base, phases))
        .collect();
    let current_fields = chart::select_fields(points, "I", phases);
    let voltage_fields = chart::select_fields(points, "V", phases);

    let checkboxes: String = Phase::ALL
        .iter()
        .map(|p| {
            let checked = if phases.contains(p) { " checked" } else { "" };
            format!(
                r#"<form method="post" action="/graphs/phases" style="display: inline; margin: 0;"><input type="hidden" name="phase" value="{}"><label style="display: inline-flex; align-items: center; gap: 0.25rem; cursor: pointer;"><input type="checkbox"{} onchange="this.form.submit()">{}</label></form>"#,
                p.as_str(),
                checked,
                p
            )
        })
        .collect();
    let pmu_options: Vec<(String, String)> =
        slot.pmus.iter().map(|p| (p.clone(), p.clone())).collect();

    let panel = |svg: String| {
        format!(
            r#"<div style="background-color: white; border-radius: 0.5rem; box-shadow: 0 1px 3px rgba(0,0,0,0.1); padding: 1rem;">{svg}</div>"#
        )
    };

    let body = format!(
        r#"{nav}
<main style="max-width: 1800px; margin: 2rem auto; background-color: white; border-radius: 1rem; padding: 2rem;">
    <h2 style="text-align: center;">⚡ PMU Power Dashboard</h2>
    <div style="display: flex; justify-content: center; gap: 1.5rem; margin-bottom: 2rem;">
        <form method="post" action="/graphs/select" style="margin: 0;">
            <label style="font-weight: 600;">PMU: </label>{pmu}
            <input type="hidden" name="timeline" value="{timeline}">
        </form>
        <div style="background-color: #f3f4f6; padding: 0.5rem 0.75rem; border-radius: 0.25rem;">
            <label style="font-weight: 600;">Phasors: </label>{checkboxes}
        </div>
    </div>
    {error}
    <div style="display: flex; flex-direction: column; gap: 2.5rem;">
        {scatter}
        {power}
        {current}
        {voltage}
    </div>
</main>"#,
        nav = nav(ctx),
        pmu = select_box("pmu", &pmu_options, slot.selection.pmu.as_deref().unwrap_or("")),
        timeline = slot.selection.timeline.value(),
        error = error_note(slot.last_error),
        scatter = panel(chart::render_pq_scatter(points)),
        power = panel(LineChart::new("Power (P, Q, PF) Over Time", "Power (W / VAR)").render(points, &power_fields)),
        current = panel(LineChart::new("Current Over Time", "Current (A)").render(points, &current_fields)),
        voltage = panel(LineChart::new("Voltage Over Time", "Voltage (V)").render(points, &voltage_fields)),
    );
    layout(View::Graphs.title(), &body, ctx.refresh)
}

pub fn notifications_page(ctx: &PageContext, alerts: &[Alert]) -> String {
    let list = if alerts.is_empty() {
        r#"<div style="color: #6b7280;">No alerts yet.</div>"#.to_string()
    } else {
        let items: String = alerts
            .iter()
            .map(|a| {
                format!(
                    r#"<li class="alert" style="padding: 0.5rem 0; border-bottom: 1px solid #e5e7eb;">{}</li>"#,
                    escape(&alert_line(a))
                )
            })
            .collect();
        format!(r#"<ul style="list-style: none; padding: 0; margin: 0;">{items}</ul>"#)
    };

    let body = format!(
        r#"{nav}
<main style="padding: 2rem;">
    <h2>⚠️ PMU Notifications</h2>
    <div style="background-color: white; border-radius: 0.5rem; box-shadow: 0 1px 3px rgba(0,0,0,0.1); padding: 1rem;">{list}</div>
</main>"#,
        nav = nav(ctx),
    );
    layout(View::Notifications.title(), &body, ctx.refresh)
}

pub fn not_found_page() -> String {
    layout(
        "Not Found",
        r#"<div style="padding: 2rem;">404 - Page Not Found</div>"#,
        None,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PowerSnapshot;
    use crate::poller::ViewData;

    fn ctx(view: View) -> PageContext {
        PageContext {
            view,
            refresh: Some(Duration::from_secs(1)),
            channel: ChannelState::Open,
            protocol: Protocol::Udp,
        }
    }

    #[test]
    fn stat_formatting_matches_units() {
        assert_eq!(format_pf(Some(0.96789)), "0.968");
        assert_eq!(format_pf(None), "N/A");
        assert_eq!(format_pf(Some(f64::NAN)), "N/A");
        assert_eq!(format_watts(Some(1200.456)), "1200.46 W");
        assert_eq!(format_kilo(Some(310.25), "kVAR"), "0.31025 kVAR");
        assert_eq!(format_kilo(Some(1240.0), "kVA"), "1.24000 kVA");
        assert_eq!(format_kilo(None, "kVA"), "N/A");
    }

    #[test]
    fn cells_are_blank_when_missing() {
        assert_eq!(format_cell(Some(230.126)), "230.13");
        assert_eq!(format_cell(None), "");
    }

    #[test]
    fn alert_line_matches_notification_format() {
        let alert = Alert {
            pmu: "P1".to_string(),
            kind: "overvoltage".to_string(),
            value: 255.4,
        };
        assert_eq!(alert_line(&alert), "PMU P1 has abnormal overvoltage — 255.40");
    }

    #[test]
    fn distinct_pmus_counts_refs() {
        let rows = vec![
            MeasurementRow {
                pmu_id: Some("1".to_string()),
                ..Default::default()
            },
            MeasurementRow {
                pmu_id: Some("1".to_string()),
                ..Default::default()
            },
            MeasurementRow::default(),
        ];
        assert_eq!(distinct_pmus(&rows), 2);
    }

    #[test]
    fn escape_handles_markup() {
        assert_eq!(escape("<b>\"x\" & 'y'</b>"), "&lt;b&gt;&quot;x&quot; &amp; &#39;y&#39;&lt;/b&gt;");
    }

    #[test]
    fn dashboard_without_data_shows_na_and_grid() {
        let html = dashboard_page(&ctx(View::Dashboard), &ViewSlot::default());
        assert!(html.contains("N/A"));
        assert!(html.contains("Voltage Phasors"));
        assert!(html.contains("Current Phasors"));
        assert!(!html.contains("<polygon"));
        assert!(html.contains("location.reload(), 1000"));
        assert!(!html.contains("alert-banner"));
    }

    #[test]
    fn dashboard_renders_cards_and_phasors() {
        let slot = ViewSlot {
            pmus: vec!["pmu1".to_string(), "pmu2".to_string()],
            selection: Selection {
                pmu: Some("pmu2".to_string()),
                ..Default::default()
            },
            data: Some(ViewData::Dashboard(PowerSnapshot {
                p: Some(1200.5),
                q: Some(310.25),
                s: Some(1240.0),
                pf: Some(0.968),
                v: Some(230.0),
                v_a_ang: Some(0.0),
                v_b_ang: Some(-120.0),
                v_c_ang: Some(120.0),
                ..Default::default()
            })),
            ..Default::default()
        };
        let html = dashboard_page(&ctx(View::Dashboard), &slot);
        assert!(html.contains("0.968"));
        assert!(html.contains("1200.50 W"));
        assert!(html.contains("0.31025 kVAR"));
        assert!(html.contains("1.24000 kVA"));
        assert!(html.contains(r#"<option value="pmu2" selected>pmu2</option>"#));
        assert_eq!(html.matches("<polygon").count(), 3);
        for name in ["Va", "Vb", "Vc"] {
            assert!(html.contains(&format!("{name}&#10;Mag: 230.00")), "{name}");
        }
        assert!(!html.contains("va&#10;"));
    }

    #[test]
    fn banner_shows_when_channel_not_live() {
        let mut context = ctx(View::Notifications);
        context.channel = ChannelState::Reconnecting {
            attempt: 3,
            delay_ms: 2000,
        };
        let html = notifications_page(&context, &[]);
        assert!(html.contains("alert-banner"));
        assert!(html.contains("reconnecting in 2000 ms"));
        assert!(html.contains("No alerts yet."));
    }

    #[test]
    fn stale_data_is_flagged() {
        let slot = ViewSlot {
            last_error: Some(ErrorKind::Timeout),
            ..Default::default()
        };
        let html = events_page(&ctx(View::Events), &slot);
        assert!(html.contains("Backend unavailable (timeout)"));
        assert!(html.contains("Number of PMUs: 0"));
    }

    #[test]
    fn graphs_page_has_all_charts() {
        let phases: BTreeSet<Phase> = [Phase::A].into_iter().collect();
        let html = graphs_page(&ctx(View::Graphs), &ViewSlot::default(), &phases);
        assert!(html.contains("P-Q Scatter"));
        assert!(html.contains("Power (P, Q, PF) Over Time"));
        assert!(html.contains("Current Over Time"));
        assert!(html.contains("Voltage Over Time"));
        assert_eq!(html.matches(r#"action="/graphs/phases""#).count(), 3);
        assert_eq!(html.matches(r#"type="checkbox" checked"#).count(), 1);
        assert!(html.contains(r#"name="phase" value="b""#));
    }

    #[test]
    fn not_found_page_text() {
        assert!(not_found_page().contains("404 - Page Not Found"));
    }
}
