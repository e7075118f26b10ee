use crate::model::{AggregateSnapshot, PresentationSnapshot, WatermarkRecord};

/// Join cycle totals with the watermark. Without a watermark the maximum is reported as 0.
pub fn assemble(
    aggregate: &AggregateSnapshot,
    watermark: Option<&WatermarkRecord>,
) -> PresentationSnapshot {
    PresentationSnapshot {
        total_power_watts: aggregate.total_power_watts,
        total_energy_total_wh: aggregate.total_energy_total_wh,
        total_energy_daily_wh: aggregate.total_energy_daily_wh,
        max_power_watts: watermark.map(|w| w.max_power_watts).unwrap_or(0.0),
    }
}
