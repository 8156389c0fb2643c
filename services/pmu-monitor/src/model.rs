//! PMU data model: wire types from the backend and the console's selection state

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::PmuMonitorError;

/// One of the three phases of a PMU
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    A,
    B,
    C,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::A, Phase::B, Phase::C];

    /// Query-string form (`a`, `b`, `c`)
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::A => "a",
            Phase::B => "b",
            Phase::C => "c",
        }
    }

    /// Field-suffix form (`A`, `B`, `C`)
    pub fn suffix(&self) -> &'static str {
        match self {
            Phase::A => "A",
            Phase::B => "B",
            Phase::C => "C",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Phase {}", self.suffix())
    }
}

impl FromStr for Phase {
    type Err = PmuMonitorError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a" => Ok(Phase::A),
            "b" => Ok(Phase::B),
            "c" => Ok(Phase::C),
            _ => Err(PmuMonitorError::InvalidValue(format!("Unknown phase: {}", s))),
        }
    }
}

/// Look-back window passed to the backend as a relative start time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Timeline {
    #[default]
    LastSecond,
    Last5Seconds,
    Last15Seconds,
    Last30Seconds,
    LastMinute,
    Last5Minutes,
    Last10Minutes,
    Last30Minutes,
}

impl Timeline {
    pub const ALL: [Timeline; 8] = [
        Timeline::LastSecond,
        Timeline::Last5Seconds,
        Timeline::Last15Seconds,
        Timeline::Last30Seconds,
        Timeline::LastMinute,
        Timeline::Last5Minutes,
        Timeline::Last10Minutes,
        Timeline::Last30Minutes,
    ];

    /// Relative start understood by the backend (e.g. `-15s`)
    pub fn value(&self) -> &'static str {
        match self {
            Timeline::LastSecond => "-1s",
            Timeline::Last5Seconds => "-5s",
            Timeline::Last15Seconds => "-15s",
            Timeline::Last30Seconds => "-30s",
            Timeline::LastMinute => "-1m",
            Timeline::Last5Minutes => "-5m",
            Timeline::Last10Minutes => "-10m",
            Timeline::Last30Minutes => "-30m",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Timeline::LastSecond => "Last 1 second",
            Timeline::Last5Seconds => "Last 5 seconds",
            Timeline::Last15Seconds => "Last 15 seconds",
            Timeline::Last30Seconds => "Last 30 seconds",
            Timeline::LastMinute => "Last 1 minute",
            Timeline::Last5Minutes => "Last 5 minutes",
            Timeline::Last10Minutes => "Last 10 minutes",
            Timeline::Last30Minutes => "Last 30 minutes",
        }
    }
}

impl FromStr for Timeline {
    type Err = PmuMonitorError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Timeline::ALL
            .iter()
            .find(|t| t.value() == s.trim())
            .copied()
            .ok_or_else(|| PmuMonitorError::InvalidValue(format!("Unknown timeline: {}", s)))
    }
}

impl From<Timeline> for String {
    fn from(timeline: Timeline) -> Self {
        timeline.value().to_string()
    }
}

impl TryFrom<String> for Timeline {
    type Error = PmuMonitorError;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

/// Transport the backend uses to talk to the PMUs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Udp,
    Tcp,
}

impl Protocol {
    pub const ALL: [Protocol; 2] = [Protocol::Udp, Protocol::Tcp];

    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Udp => "udp",
            Protocol::Tcp => "tcp",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Udp => write!(f, "UDP"),
            Protocol::Tcp => write!(f, "TCP"),
        }
    }
}

impl FromStr for Protocol {
    type Err = PmuMonitorError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "udp" => Ok(Protocol::Udp),
            "tcp" => Ok(Protocol::Tcp),
            _ => Err(PmuMonitorError::InvalidValue(format!(
                "Unknown protocol: {}",
                s
            ))),
        }
    }
}

/// What a view is currently looking at
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub pmu: Option<String>,
    pub timeline: Timeline,
    pub phase: Phase,
}

/// A live alert pushed by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    #[serde(deserialize_with = "string_or_number")]
    pub pmu: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub value: f64,
}

/// Identity used to recognise an alert replayed after a reconnect
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AlertKey {
    pmu: String,
    kind: String,
    value_bits: u64,
}

impl Alert {
    pub fn key(&self) -> AlertKey {
        AlertKey {
            pmu: self.pmu.clone(),
            kind: self.kind.clone(),
            value_bits: self.value.to_bits(),
        }
    }
}

/// Response of `GET /api/getpmus`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PmuList {
    #[serde(default)]
    pub pmus: Vec<String>,
}

/// Response of `GET /api/power_a`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PowerSnapshot {
    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub pmu_id: Option<String>,
    #[serde(rename = "P", default)]
    pub p: Option<f64>,
    #[serde(rename = "Q", default)]
    pub q: Option<f64>,
    #[serde(rename = "S", default)]
    pub s: Option<f64>,
    #[serde(rename = "PF", default)]
    pub pf: Option<f64>,
    #[serde(rename = "V", default)]
    pub v: Option<f64>,
    #[serde(rename = "I", default)]
    pub i: Option<f64>,
    #[serde(default)]
    pub phi_deg: Option<f64>,
    #[serde(default)]
    pub v_a_ang: Option<f64>,
    #[serde(default)]
    pub v_b_ang: Option<f64>,
    #[serde(default)]
    pub v_c_ang: Option<f64>,
    #[serde(default)]
    pub i_a_ang: Option<f64>,
    #[serde(default)]
    pub i_b_ang: Option<f64>,
    #[serde(default)]
    pub i_c_ang: Option<f64>,
}

/// Magnitude shared by three phases plus one angle per phase, in degrees
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PhasorSample {
    pub magnitude: Option<f64>,
    pub angles: [Option<f64>; 3],
}

impl PowerSnapshot {
    pub fn voltage_phasors(&self) -> PhasorSample {
        PhasorSample {
            magnitude: self.v,
            angles: [self.v_a_ang, self.v_b_ang, self.v_c_ang],
        }
    }

    /// Current phasors; the magnitude falls back to `V` when `I` is absent
    pub fn current_phasors(&self) -> PhasorSample {
        PhasorSample {
            magnitude: self.i.or(self.v),
            angles: [self.i_a_ang, self.i_b_ang, self.i_c_ang],
        }
    }
}

/// One row of `GET /api/data`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRow {
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub v_a: Option<f64>,
    #[serde(default)]
    pub v_b: Option<f64>,
    #[serde(default)]
    pub v_c: Option<f64>,
    #[serde(default)]
    pub i_a: Option<f64>,
    #[serde(default)]
    pub i_b: Option<f64>,
    #[serde(default)]
    pub i_c: Option<f64>,
    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub pmu_id: Option<String>,
}

impl MeasurementRow {
    /// PMU the row belongs to; rows without a tag are attributed to `pmu1`
    pub fn pmu_ref(&self) -> &str {
        self.pmu_id.as_deref().unwrap_or("pmu1")
    }

    /// Magnitudes in table order: Va, Vb, Vc, Ia, Ib, Ic
    pub fn magnitudes(&self) -> [Option<f64>; 6] {
        [self.v_a, self.v_b, self.v_c, self.i_a, self.i_b, self.i_c]
    }
}

/// One aggregated point of `GET /api/power_timeseries`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PowerPoint {
    #[serde(default)]
    pub time: Option<String>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, serde_json::Value>,
}

impl PowerPoint {
    /// Numeric value of a field such as `P`, `Q_B` or `V_C`
    pub fn value(&self, field: &str) -> Option<f64> {
        self.fields
            .get(field)
            .and_then(|v| v.as_f64())
            .filter(|v| v.is_finite())
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// `HH:MM:SS` slice of the ISO timestamp
    pub fn clock_label(&self) -> String {
        self.time
            .as_deref()
            .and_then(|t| t.get(11..19))
            .unwrap_or("")
            .to_string()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Number(serde_json::Number),
}

impl From<StringOrNumber> for String {
    fn from(value: StringOrNumber) -> Self {
        match value {
            StringOrNumber::String(s) => s,
            StringOrNumber::Number(n) => n.to_string(),
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    StringOrNumber::deserialize(deserializer).map(String::from)
}

fn optional_string_or_number<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<StringOrNumber>::deserialize(deserializer).map(|v| v.map(String::from))
}
