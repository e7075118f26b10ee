use crate::model::{AggregateSnapshot, ChannelReading};
use chrono::{DateTime, Utc};

/// Sum all channels into system-wide totals. No channels gives an all-zero snapshot.
pub fn aggregate(channels: &[ChannelReading], observed_at: DateTime<Utc>) -> AggregateSnapshot {
    channels.iter().fold(
        AggregateSnapshot::zero(observed_at),
        |mut acc, channel| {
            acc.total_power_watts += channel.power_watts;
            acc.total_energy_total_wh = acc
                .total_energy_total_wh
                .saturating_add(channel.energy_total_wh);
            acc.total_energy_daily_wh = acc
                .total_energy_daily_wh
                .saturating_add(channel.energy_daily_wh);
            acc
        },
    )
}
