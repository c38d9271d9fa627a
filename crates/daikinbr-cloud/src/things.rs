//! Parsing of the manage-thing response

use daikinbr_core::Thing;
use serde_json::Value;

/// Feature flag marking a heat pump unit
const HEAT_PUMP_FEATURE: &str = "HEAT_PUMP";

/// Extract the things from a manage-thing response
///
/// Things live under `json_response.things`; missing fields become empty
/// strings. A response without that array yields no things.
pub fn parse_things(response: &Value) -> Vec<Thing> {
    let Some(things) = response
        .pointer("/json_response/things")
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };

    things.iter().map(parse_thing).collect()
}

fn parse_thing(raw: &Value) -> Thing {
    let text = |pointer: &str| match raw.pointer(pointer) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };

    let secret_key = text("/thing_metadata/thing_secret_key");
    let secret_key = secret_key
        .strip_suffix('\n')
        .map(str::to_string)
        .unwrap_or(secret_key);

    Thing {
        id: text("/thing_id"),
        name: text("/thing_metadata/thing_name"),
        apn: text("/thing_metadata/thing_apn"),
        secret_key,
        heat: text("/thing_metadata/thing_feature_data").contains(HEAT_PUMP_FEATURE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_things() {
        let response = json!({
            "json_response": {
                "things": [
                    {
                        "thing_id": "th-1",
                        "thing_metadata": {
                            "thing_name": "Bedroom",
                            "thing_apn": "DAIKIN797BA0",
                            "thing_secret_key": "c2VjcmV0\n",
                            "thing_feature_data": "[\"COOL\",\"HEAT_PUMP\"]"
                        }
                    },
                    {
                        "thing_id": 42,
                        "thing_metadata": {
                            "thing_name": "Office",
                            "thing_apn": "DAIKIN000001",
                            "thing_secret_key": "a2V5",
                            "thing_feature_data": {"features": ["COOL"]}
                        }
                    }
                ]
            }
        });

        let things = parse_things(&response);
        assert_eq!(things.len(), 2);

        assert_eq!(things[0].id, "th-1");
        assert_eq!(things[0].name, "Bedroom");
        assert_eq!(things[0].apn, "DAIKIN797BA0");
        assert_eq!(things[0].secret_key, "c2VjcmV0");
        assert!(things[0].heat);

        assert_eq!(things[1].id, "42");
        assert_eq!(things[1].secret_key, "a2V5");
        assert!(!things[1].heat);
    }

    #[test]
    fn test_feature_data_object_with_heat_pump() {
        let response = json!({
            "json_response": {"things": [{
                "thing_id": "1",
                "thing_metadata": {"thing_feature_data": {"type": "HEAT_PUMP"}}
            }]}
        });
        assert!(parse_things(&response)[0].heat);
    }

    #[test]
    fn test_missing_fields_are_empty() {
        let response = json!({"json_response": {"things": [{"thing_id": "1"}]}});
        let things = parse_things(&response);
        assert_eq!(things[0].name, "");
        assert_eq!(things[0].apn, "");
        assert_eq!(things[0].secret_key, "");
        assert!(!things[0].heat);
    }

    #[test]
    fn test_response_without_things() {
        assert!(parse_things(&json!({"json_response": {}})).is_empty());
        assert!(parse_things(&json!(null)).is_empty());
    }

    #[test]
    fn test_only_one_trailing_newline_is_trimmed() {
        let response = json!({"json_response": {"things": [{
            "thing_id": "1",
            "thing_metadata": {"thing_secret_key": "a2V5\n\n"}
        }]}});
        assert_eq!(parse_things(&response)[0].secret_key, "a2V5\n");
    }
}
