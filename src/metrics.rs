use hoymiles_rs::{Error, FetchCycle};
use prometheus::{Encoder, Gauge, GaugeVec, TextEncoder};
use std::sync::{Mutex, MutexGuard};

lazy_static! {
    /// Serializes updates with exposition, so a scrape never sees a half-updated channel set.
    static ref EXPOSITION: Mutex<()> = Mutex::new(());
    static ref TOTAL_POWER_GAUGE: Gauge = register_gauge!(opts!(
        "hoymiles_total_power_watts",
        "current power summed over all inverter inputs (in W)",
    ))
    .unwrap();
    static ref ENERGY_TOTAL_GAUGE: Gauge = register_gauge!(opts!(
        "hoymiles_energy_total_wh",
        "lifetime energy summed over all inverter inputs (in Wh)",
    ))
    .unwrap();
    static ref ENERGY_DAILY_GAUGE: Gauge = register_gauge!(opts!(
        "hoymiles_energy_daily_wh",
        "energy generated in current day (in Wh)",
    ))
    .unwrap();
    static ref MAX_POWER_GAUGE: Gauge = register_gauge!(opts!(
        "hoymiles_max_power_watts",
        "highest total power ever recorded, 0 if unknown (in W)",
    ))
    .unwrap();
    static ref CHANNEL_POWER_GAUGE: GaugeVec = register_gauge_vec!(
        opts!(
            "hoymiles_channel_power_watts",
            "current power reported by a single inverter input (in W)",
        ),
        &["channel"],
    )
    .unwrap();
}

fn exposition() -> MutexGuard<'static, ()> {
    /* the guarded data is `()`, a panicked holder leaves nothing inconsistent */
    EXPOSITION.lock().unwrap_or_else(|e| e.into_inner())
}

/// Feed the result of one fetch cycle to the Prometheus registry.
pub fn observe(cycle: &FetchCycle) {
    let _exposition = exposition();
    let snapshot = &cycle.snapshot;
    TOTAL_POWER_GAUGE.set(snapshot.total_power_watts);
    ENERGY_TOTAL_GAUGE.set(snapshot.total_energy_total_wh as f64);
    ENERGY_DAILY_GAUGE.set(snapshot.total_energy_daily_wh as f64);
    MAX_POWER_GAUGE.set(snapshot.max_power_watts);

    /* drop channels that were not reported in this cycle */
    CHANNEL_POWER_GAUGE.reset();
    for channel in &cycle.channels {
        CHANNEL_POWER_GAUGE
            .with_label_values(&[&channel.channel_id.to_string()])
            .set(channel.power_watts);
    }
}

/// Read metrics from Prometheus exporter registry.
pub fn read() -> Result<String, Error> {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    let metric_families = {
        let _exposition = exposition();
        prometheus::gather()
    };

    encoder
        .encode(&metric_families, &mut buffer)
        .or(Err(Error::FormatError))?;
    String::from_utf8(buffer).or(Err(Error::FormatError))
}
