use hoymiles_rs::model::PresentationSnapshot;

/// Render the snapshot as a self-contained HTML page with a power gauge scaled to `max_power`.
pub fn render(snapshot: &PresentationSnapshot, max_power: f64) -> String {
    let fill = if max_power > 0.0 {
        (snapshot.total_power_watts / max_power * 100.0).clamp(0.0, 100.0)
    } else {
        0.0
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>DTU Data</title>
    <style>
        body {{ background: black; color: white; font-family: sans-serif; }}
        .gauge {{ width: 100%; height: 24px; border: 2px solid white; }}
        .bar {{ height: 100%; background: blue; }}
    </style>
</head>
<body>
    <h1>{power:.1} W</h1>
    <div class="gauge"><div class="bar" style="width: {fill:.1}%"></div></div>
    <p>0 W &ndash; {max_power:.0} W</p>
    <p>Heute: {daily} Wh</p>
    <p>Gesamt: {total} Wh</p>
    <p>Maximum: {peak:.1} W</p>
</body>
</html>
"#,
        power = snapshot.total_power_watts,
        fill = fill,
        max_power = max_power,
        daily = snapshot.total_energy_daily_wh,
        total = snapshot.total_energy_total_wh,
        peak = snapshot.max_power_watts,
    )
}
