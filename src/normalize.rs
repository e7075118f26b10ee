//! Turns any supported telemetry shape into an ordered list of [`ChannelReading`]s.
//!
//! Keys are compared after lowercasing and dropping underscores, so `pv_data`,
//! `pvData` and `PVDATA` are the same key.

use crate::error::Error;
use crate::model::{ChannelReading, PvData, RawReading, RealData};
use serde_json::{Map, Value};

const CHANNELS_KEY: &str = "pvdata";
const POWER_KEYS: &[&str] = &["power", "powerwatts"];
const ENERGY_TOTAL_KEYS: &[&str] = &["energytotal"];
const ENERGY_DAILY_KEYS: &[&str] = &["energydaily"];
const CURRENT_KEYS: &[&str] = &["current"];
const VOLTAGE_KEYS: &[&str] = &["voltage"];
const PORT_KEYS: &[&str] = &["portnumber", "port"];

/// Structural classification of a reading, in detection priority order.
#[derive(Debug)]
enum Shape<'a> {
    Attributes(&'a RealData),
    MultiChannel(&'a [Value]),
    ImplicitSingle(&'a Map<String, Value>),
    FlatLegacy(&'a Map<String, Value>),
    Unrecognized(String),
}

fn canonical(key: &str) -> String {
    key.chars()
        .filter(|c| *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

fn lookup<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    map.iter()
        .find(|(k, _)| keys.contains(&canonical(k).as_str()))
        .map(|(_, v)| v)
}

fn is_channel_entry(map: &Map<String, Value>) -> bool {
    [
        POWER_KEYS,
        ENERGY_TOTAL_KEYS,
        ENERGY_DAILY_KEYS,
        CURRENT_KEYS,
        VOLTAGE_KEYS,
        PORT_KEYS,
    ]
    .iter()
    .any(|keys| lookup(map, keys).is_some())
}

fn detect(raw: &RawReading) -> Shape<'_> {
    let value = match raw {
        RawReading::Structured(data) => return Shape::Attributes(data),
        RawReading::Json(value) => value,
    };

    let map = match value.as_object() {
        Some(map) => map,
        None => return Shape::Unrecognized(format!("top level is not an object: {}", value)),
    };

    match lookup(map, &[CHANNELS_KEY]) {
        Some(Value::Array(entries)) => Shape::MultiChannel(entries),
        Some(Value::Object(entry)) => Shape::ImplicitSingle(entry),
        Some(other) => Shape::Unrecognized(format!("channel list has unexpected type: {}", other)),
        None if is_channel_entry(map) => Shape::FlatLegacy(map),
        None => Shape::Unrecognized(format!(
            "no channel data among keys {:?}",
            map.keys().collect::<Vec<_>>()
        )),
    }
}

/// Non-negative number from an integer, float or numeric string; anything else is absent.
fn number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;

    if n.is_finite() && n >= 0.0 {
        Some(n)
    } else {
        None
    }
}

fn field(map: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    lookup(map, keys).and_then(number)
}

/// Integer fields keep full `u64` precision; floats and strings are truncated.
fn integer_field(map: &Map<String, Value>, keys: &[&str]) -> Option<u64> {
    lookup(map, keys).and_then(|value| {
        value
            .as_u64()
            .or_else(|| value.as_str().and_then(|s| s.trim().parse::<u64>().ok()))
            .or_else(|| number(value).map(|n| n as u64))
    })
}

fn tenths(raw: f64) -> f64 {
    raw / 10.0
}

fn channel_from_map(position: usize, map: &Map<String, Value>) -> ChannelReading {
    ChannelReading {
        channel_id: integer_field(map, PORT_KEYS)
            .and_then(|p| u32::try_from(p).ok())
            .unwrap_or(position as u32),
        power_watts: field(map, POWER_KEYS).map(tenths).unwrap_or(0.0),
        energy_total_wh: integer_field(map, ENERGY_TOTAL_KEYS).unwrap_or(0),
        energy_daily_wh: integer_field(map, ENERGY_DAILY_KEYS).unwrap_or(0),
        current_amps: field(map, CURRENT_KEYS).map(tenths),
        voltage_volts: field(map, VOLTAGE_KEYS).map(tenths),
    }
}

fn channel_from_attributes(position: usize, pv: &PvData) -> ChannelReading {
    ChannelReading {
        channel_id: pv.port_number.unwrap_or(position as u32),
        power_watts: pv.power.map(|p| tenths(p as f64)).unwrap_or(0.0),
        energy_total_wh: pv.energy_total.unwrap_or(0),
        energy_daily_wh: pv.energy_daily.unwrap_or(0),
        current_amps: pv.current.map(|c| tenths(c as f64)),
        voltage_volts: pv.voltage.map(|v| tenths(v as f64)),
    }
}

/// Like [`normalize`], but reports an unrecognized shape as `MalformedSchema`.
pub fn try_normalize(raw: &RawReading) -> Result<Vec<ChannelReading>, Error> {
    match detect(raw) {
        Shape::Attributes(data) => Ok(data
            .pv_data
            .iter()
            .enumerate()
            .map(|(i, pv)| channel_from_attributes(i, pv))
            .collect()),
        Shape::MultiChannel(entries) => Ok(entries
            .iter()
            .enumerate()
            .filter_map(|(i, entry)| match entry.as_object() {
                Some(map) => Some(channel_from_map(i, map)),
                None => {
                    log::warn!("Skipping channel entry {} which is not an object: {}", i, entry);
                    None
                }
            })
            .collect()),
        Shape::ImplicitSingle(map) | Shape::FlatLegacy(map) => Ok(vec![channel_from_map(0, map)]),
        Shape::Unrecognized(reason) => Err(Error::MalformedSchema(reason)),
    }
}

/// Normalize a reading. Never fails: an unrecognized shape yields no channels and a warning.
pub fn normalize(raw: &RawReading) -> Vec<ChannelReading> {
    try_normalize(raw).unwrap_or_else(|e| {
        log::warn!("{}", e);
        Vec::new()
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;
    use std::fs;
    use std::path::PathBuf;

    fn read_resource(filename: &str) -> RawReading {
        let mut d = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        d.push(format!("resources/test/{}", filename));
        RawReading::Json(serde_json::from_str(&fs::read_to_string(d.as_path()).unwrap()).unwrap())
    }

    fn channel(id: u32, power: f64, total: u64, daily: u64) -> ChannelReading {
        ChannelReading {
            channel_id: id,
            power_watts: power,
            energy_total_wh: total,
            energy_daily_wh: daily,
            current_amps: None,
            voltage_volts: None,
        }
    }

    #[test]
    fn camel_case_multi_channel() {
        let channels = normalize(&read_resource("pvDataCamelCase.json"));
        assert_eq!(
            vec![channel(0, 123.4, 500, 20), channel(1, 80.0, 100, 5)],
            channels
        );
    }

    #[test]
    fn snake_case_matches_camel_case() {
        assert_eq!(
            normalize(&read_resource("pvDataCamelCase.json")),
            normalize(&read_resource("pv_data_snake_case.json"))
        );
    }

    #[test]
    fn attribute_style_matches_json() {
        let structured = RawReading::Structured(RealData {
            pv_data: vec![
                PvData {
                    power: Some(1234),
                    energy_total: Some(500),
                    energy_daily: Some(20),
                    ..PvData::default()
                },
                PvData {
                    power: Some(800),
                    energy_total: Some(100),
                    energy_daily: Some(5),
                    ..PvData::default()
                },
            ],
        });
        assert_eq!(
            normalize(&read_resource("pvDataCamelCase.json")),
            normalize(&structured)
        );
    }

    #[test]
    fn attribute_style_uses_port_number_and_tenths() {
        let structured = RawReading::Structured(RealData {
            pv_data: vec![PvData {
                port_number: Some(3),
                power: Some(55),
                current: Some(17),
                voltage: Some(321),
                ..PvData::default()
            }],
        });
        let channels = normalize(&structured);
        assert_eq!(3, channels[0].channel_id);
        assert_eq!(5.5, channels[0].power_watts);
        assert_eq!(Some(1.7), channels[0].current_amps);
        assert_eq!(Some(32.1), channels[0].voltage_volts);
    }

    #[test]
    fn implicit_single_channel() {
        let raw = RawReading::Json(json!({"PV_DATA": {"power": 500, "energy_daily": 7}}));
        assert_eq!(vec![channel(0, 50.0, 0, 7)], normalize(&raw));
    }

    #[test]
    fn flat_legacy_mapping() {
        let raw = RawReading::Json(json!({"power": 500}));
        assert_eq!(vec![channel(0, 50.0, 0, 0)], normalize(&raw));
    }

    #[test]
    fn flat_legacy_power_watts_alias() {
        let raw = RawReading::Json(json!({"powerWatts": 500, "energyTotal": 9}));
        assert_eq!(vec![channel(0, 50.0, 9, 0)], normalize(&raw));
    }

    #[test]
    fn missing_fields_default_to_zero() {
        let raw = RawReading::Json(json!({"pvData": [{}, {"current": 12}]}));
        let channels = normalize(&raw);
        assert_eq!(channel(0, 0.0, 0, 0), channels[0]);
        assert_eq!(Some(1.2), channels[1].current_amps);
        assert_eq!(0.0, channels[1].power_watts);
    }

    #[test]
    fn large_energy_counters_keep_precision() {
        let raw = RawReading::Json(json!({
            "energyTotal": 9_007_199_254_740_993u64,
            "energyDaily": "9007199254740995",
        }));
        let channels = normalize(&raw);
        assert_eq!(9_007_199_254_740_993, channels[0].energy_total_wh);
        assert_eq!(9_007_199_254_740_995, channels[0].energy_daily_wh);
    }

    #[test]
    fn implicit_single_matches_flat_legacy() {
        let implicit = RawReading::Json(json!({
            "pvData": {"power": 731, "energyTotal": 88412, "energyDaily": 964, "current": 23}
        }));
        let flat = RawReading::Json(json!({
            "power": 731, "energy_total": 88412, "energy_daily": 964, "current": 23
        }));
        let structured = RawReading::Structured(RealData {
            pv_data: vec![PvData {
                power: Some(731),
                energy_total: Some(88412),
                energy_daily: Some(964),
                current: Some(23),
                ..PvData::default()
            }],
        });

        let expected = normalize(&implicit);
        assert_eq!(1, expected.len());
        assert_eq!(expected, normalize(&flat));
        assert_eq!(expected, normalize(&structured));
    }

    #[test]
    fn explicit_port_overrides_position() {
        let raw = RawReading::Json(json!({"pvData": [{"portNumber": 2, "power": 10}]}));
        assert_eq!(2, normalize(&raw)[0].channel_id);
    }

    #[test]
    fn numeric_strings_and_negatives() {
        let raw = RawReading::Json(json!({"pv_data": [{"power": "250", "energy_total": -4}]}));
        assert_eq!(vec![channel(0, 25.0, 0, 0)], normalize(&raw));
    }

    #[test]
    fn non_object_entries_are_skipped() {
        let raw = RawReading::Json(json!({"pvData": [1, {"power": 10}]}));
        assert_eq!(vec![channel(1, 1.0, 0, 0)], normalize(&raw));
    }

    #[test]
    fn unrecognized_shapes_yield_nothing() {
        for value in [
            json!([1, 2, 3]),
            json!("power"),
            json!({"serial": "1161"}),
            json!({"pvData": 12}),
        ] {
            let raw = RawReading::Json(value);
            assert!(normalize(&raw).is_empty());
            assert!(matches!(try_normalize(&raw), Err(Error::MalformedSchema(_))));
        }
    }

    #[test]
    fn empty_channel_list_is_recognized() {
        let raw = RawReading::Json(json!({"pvData": []}));
        assert_eq!(Ok(vec![]), try_normalize(&raw));
    }
}
