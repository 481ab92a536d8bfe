use serde_json::{Map, Value};
use thiserror::Error;

use crate::domain::session_meter::MeterReading;

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("payload must be a JSON object")]
    InvalidPayloadType,
    #[error("missing required field: {0}")]
    MissingField(&'static str),
}

const STATE_ID_KEYS: &[&str] = &["eo_charger_state_id", "charger_state_id"];
const NESTED_STATE_KEY: &str = "eo_charger_state";
const VOLTAGE_KEYS: &[&str] = &["eo_live_voltage", "live_voltage", "voltage"];
const VEHICLE_CURRENT_KEYS: &[&str] = &["eo_current_vehicle", "current_vehicle"];
const AMPS_REQUESTED_KEYS: &[&str] = &["eo_amps_requested", "amps_requested"];

/// Reads the charger state and live electrical values out of a `/getstatus` payload.
///
/// The state id is either a top-level number or the `id` of an
/// `{"eo_charger_state": {"id": .., "status": ..}}` object. Electrical values that are
/// missing count as zero so a partially populated status still drives the meter.
pub fn parse_status(payload: &Value) -> Result<MeterReading, ParseError> {
    let object = payload.as_object().ok_or(ParseError::InvalidPayloadType)?;

    let charger_state_id = find_number(object, STATE_ID_KEYS)
        .or_else(|| {
            object
                .get(NESTED_STATE_KEY)
                .and_then(Value::as_object)
                .and_then(|nested| find_number(nested, &["id"]))
        })
        .map(|value| value.trunc() as i64)
        .ok_or(ParseError::MissingField("eo_charger_state_id"))?;

    Ok(MeterReading {
        charger_state_id,
        voltage: find_number(object, VOLTAGE_KEYS).unwrap_or(0.0),
        vehicle_current: find_number(object, VEHICLE_CURRENT_KEYS).unwrap_or(0.0),
        amps_requested: find_number(object, AMPS_REQUESTED_KEYS).unwrap_or(0.0),
    })
}

/// Numeric view of a JSON value: numbers as-is, numeric strings parsed, booleans as 0/1.
pub(crate) fn parse_f64(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        Value::Bool(flag) => Some(if *flag { 1.0 } else { 0.0 }),
        _ => None,
    }?;

    number.is_finite().then_some(number)
}

fn find_number(object: &Map<String, Value>, aliases: &[&str]) -> Option<f64> {
    find_value(object, aliases).and_then(parse_f64)
}

fn find_value<'a>(object: &'a Map<String, Value>, aliases: &[&str]) -> Option<&'a Value> {
    if let Some(value) = aliases.iter().find_map(|alias| object.get(*alias)) {
        return Some(value);
    }

    let normalized_aliases: Vec<String> =
        aliases.iter().map(|alias| normalize_key(alias)).collect();

    object.iter().find_map(|(key, value)| {
        let normalized_key = normalize_key(key);
        normalized_aliases
            .iter()
            .any(|alias| alias == &normalized_key)
            .then_some(value)
    })
}

fn normalize_key(value: &str) -> String {
    value
        .chars()
        .filter(|char| char.is_ascii_alphanumeric())
        .flat_map(|char| char.to_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ParseError, parse_f64, parse_status};
    use crate::domain::session_meter::MeterReading;

    #[test]
    fn parses_flat_status_payload() {
        let payload = json!({
            "eo_charger_state_id": 11,
            "eo_live_voltage": 240.5,
            "eo_current_vehicle": 16,
            "eo_amps_requested": 32
        });

        let reading = parse_status(&payload).expect("status must parse");

        assert_eq!(
            reading,
            MeterReading {
                charger_state_id: 11,
                voltage: 240.5,
                vehicle_current: 16.0,
                amps_requested: 32.0,
            }
        );
    }

    #[test]
    fn reads_state_id_from_nested_state_object() {
        let payload = json!({
            "eo_charger_state": {"id": 10, "status": "Charging"},
            "eo_live_voltage": "230"
        });

        let reading = parse_status(&payload).expect("status must parse");

        assert_eq!(reading.charger_state_id, 10);
        assert_eq!(reading.voltage, 230.0);
        assert_eq!(reading.vehicle_current, 0.0);
    }

    #[test]
    fn matches_keys_case_and_punctuation_insensitively() {
        let payload = json!({"EO Charger State ID": 9, "EO-Live-Voltage": 229});

        let reading = parse_status(&payload).expect("status must parse");

        assert_eq!(reading.charger_state_id, 9);
        assert_eq!(reading.voltage, 229.0);
    }

    #[test]
    fn requires_state_id() {
        let payload = json!({"eo_live_voltage": 230});

        assert_eq!(
            parse_status(&payload),
            Err(ParseError::MissingField("eo_charger_state_id"))
        );
    }

    #[test]
    fn rejects_non_object_payload() {
        assert_eq!(
            parse_status(&json!([1, 2])),
            Err(ParseError::InvalidPayloadType)
        );
    }

    #[test]
    fn lenient_numbers_reject_garbage() {
        assert_eq!(parse_f64(&json!("12.5")), Some(12.5));
        assert_eq!(parse_f64(&json!(" 7 ")), Some(7.0));
        assert_eq!(parse_f64(&json!("n/a")), None);
        assert_eq!(parse_f64(&json!(null)), None);
    }
}
