use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type Watts = f64;
pub type WattHours = u64;

/// One telemetry reading as handed over by a source, before any interpretation.
#[derive(Debug, Clone)]
pub enum RawReading {
    /// Typed reading decoded by a transport (`pv_data` entries with named fields).
    Structured(RealData),
    /// Raw JSON document, any key convention.
    Json(Value),
}

/// Attribute-style reading: the shape a decoded DTU frame takes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RealData {
    pub pv_data: Vec<PvData>,
}

/// Raw per-port values, in the device's units (tenths for power, voltage and current).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PvData {
    pub port_number: Option<u32>,
    pub power: Option<u64>,
    pub voltage: Option<u64>,
    pub current: Option<u64>,
    pub energy_total: Option<u64>,
    pub energy_daily: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelReading {
    pub channel_id: u32,
    pub power_watts: Watts,
    pub energy_total_wh: WattHours,
    pub energy_daily_wh: WattHours,
    pub current_amps: Option<f64>,
    pub voltage_volts: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregateSnapshot {
    pub total_power_watts: Watts,
    pub total_energy_total_wh: WattHours,
    pub total_energy_daily_wh: WattHours,
    pub observed_at: DateTime<Utc>,
}

impl AggregateSnapshot {
    pub fn zero(observed_at: DateTime<Utc>) -> Self {
        AggregateSnapshot {
            total_power_watts: 0.0,
            total_energy_total_wh: 0,
            total_energy_daily_wh: 0,
            observed_at,
        }
    }
}

/// Persisted watermark entry. Field names on disk are camelCase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatermarkRecord {
    pub max_power_watts: Watts,
    pub total_energy_total_wh: WattHours,
    pub total_energy_daily_wh: WattHours,
    pub recorded_at: DateTime<Utc>,
}

/// The only value handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresentationSnapshot {
    pub total_power_watts: Watts,
    pub total_energy_total_wh: WattHours,
    pub total_energy_daily_wh: WattHours,
    pub max_power_watts: Watts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    Live,
    Fixture,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatermarkPolicy {
    /// Append one record per successful fetch cycle.
    Append,
    /// Keep a single record, rewritten on every cycle.
    Upsert,
}
