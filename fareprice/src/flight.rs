use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, de};

pub const N_FEATURES: usize = 14;

/// Feature names in the column order the price model was trained on.
///
/// The departure-time block is alphabetical (Evening before Morning) because
/// that is how the categories were dummy-encoded at training time.
pub const FEATURE_NAMES: [&str; N_FEATURES] = [
    "stops",
    "duration",
    "days_left",
    "airline_Air_India",
    "airline_GO_FIRST",
    "airline_Indigo",
    "airline_SpiceJet",
    "airline_Vistara",
    "class_Economy",
    "departure_time_Early_Morning",
    "departure_time_Evening",
    "departure_time_Late_Night",
    "departure_time_Morning",
    "departure_time_Night",
];

pub const MAX_STOPS: i64 = 3;

/// Attributes of a single flight, as posted to `/predict`.
///
/// One-hot groups (airline, departure time) are passed through untouched:
/// all-zero or multi-hot combinations reach the model as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightInput {
    #[serde(deserialize_with = "integral")]
    pub stops: i64,
    pub duration: f64,
    #[serde(deserialize_with = "integral")]
    pub days_left: i64,

    #[serde(rename = "airline_Air_India", deserialize_with = "integral")]
    pub airline_air_india: i64,
    #[serde(rename = "airline_GO_FIRST", deserialize_with = "integral")]
    pub airline_go_first: i64,
    #[serde(rename = "airline_Indigo", deserialize_with = "integral")]
    pub airline_indigo: i64,
    #[serde(rename = "airline_SpiceJet", deserialize_with = "integral")]
    pub airline_spicejet: i64,
    #[serde(rename = "airline_Vistara", deserialize_with = "integral")]
    pub airline_vistara: i64,

    #[serde(rename = "class_Economy", deserialize_with = "integral")]
    pub class_economy: i64,

    #[serde(rename = "departure_time_Early_Morning", deserialize_with = "integral")]
    pub departure_time_early_morning: i64,
    #[serde(rename = "departure_time_Morning", deserialize_with = "integral")]
    pub departure_time_morning: i64,
    #[serde(rename = "departure_time_Evening", deserialize_with = "integral")]
    pub departure_time_evening: i64,
    #[serde(rename = "departure_time_Late_Night", deserialize_with = "integral")]
    pub departure_time_late_night: i64,
    #[serde(rename = "departure_time_Night", deserialize_with = "integral")]
    pub departure_time_night: i64,
}

impl FlightInput {
    /// Checks the numeric bounds of `stops`, `duration` and `days_left`.
    /// Every violated field is reported.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut violations = Vec::new();
        if !(0..=MAX_STOPS).contains(&self.stops) {
            violations.push(Violation {
                field: "stops",
                constraint: "must be between 0 and 3",
                value: self.stops.to_string(),
            });
        }
        if self.duration.is_nan() || self.duration <= 0.0 {
            violations.push(Violation {
                field: "duration",
                constraint: "must be greater than 0",
                value: self.duration.to_string(),
            });
        }
        if self.days_left < 0 {
            violations.push(Violation {
                field: "days_left",
                constraint: "must be greater than or equal to 0",
                value: self.days_left.to_string(),
            });
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { violations })
        }
    }

    pub fn to_feature_vector(&self) -> FeatureVector {
        FeatureVector([
            self.stops as f64,
            self.duration,
            self.days_left as f64,
            self.airline_air_india as f64,
            self.airline_go_first as f64,
            self.airline_indigo as f64,
            self.airline_spicejet as f64,
            self.airline_vistara as f64,
            self.class_economy as f64,
            self.departure_time_early_morning as f64,
            self.departure_time_evening as f64,
            self.departure_time_late_night as f64,
            self.departure_time_morning as f64,
            self.departure_time_night as f64,
        ])
    }
}

/// Accepts a JSON integer or an integral float such as `1.0`.
fn integral<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    struct IntegralVisitor;

    impl de::Visitor<'_> for IntegralVisitor {
        type Value = i64;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("an integer")
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<i64, E> {
            Ok(v)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<i64, E> {
            i64::try_from(v).map_err(|_| E::invalid_value(de::Unexpected::Unsigned(v), &self))
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<i64, E> {
            // Bounds are exact powers of two, so the comparisons are lossless.
            if v.fract() == 0.0 && v >= i64::MIN as f64 && v < -(i64::MIN as f64) {
                Ok(v as i64)
            } else {
                Err(E::invalid_value(de::Unexpected::Float(v), &self))
            }
        }
    }

    deserializer.deserialize_any(IntegralVisitor)
}

/// Model input laid out as [`FEATURE_NAMES`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector([f64; N_FEATURES]);

impl FeatureVector {
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Looks up a feature by its canonical name.
    pub fn get(&self, name: &str) -> Option<f64> {
        FEATURE_NAMES
            .iter()
            .position(|n| *n == name)
            .map(|i| self.0[i])
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub field: &'static str,
    pub constraint: &'static str,
    pub value: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} (got {})", self.field, self.constraint, self.value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid flight input: {}", display_violations(.violations))]
pub struct ValidationError {
    pub violations: Vec<Violation>,
}

fn display_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(Violation::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_input() -> FlightInput {
        FlightInput {
            stops: 1,
            duration: 2.5,
            days_left: 10,
            airline_air_india: 1,
            airline_go_first: 0,
            airline_indigo: 0,
            airline_spicejet: 0,
            airline_vistara: 0,
            class_economy: 1,
            departure_time_early_morning: 0,
            departure_time_morning: 1,
            departure_time_evening: 0,
            departure_time_late_night: 0,
            departure_time_night: 0,
        }
    }

    #[test]
    fn feature_names_follow_training_order() {
        assert_eq!(
            FEATURE_NAMES,
            [
                "stops",
                "duration",
                "days_left",
                "airline_Air_India",
                "airline_GO_FIRST",
                "airline_Indigo",
                "airline_SpiceJet",
                "airline_Vistara",
                "class_Economy",
                "departure_time_Early_Morning",
                "departure_time_Evening",
                "departure_time_Late_Night",
                "departure_time_Morning",
                "departure_time_Night",
            ]
        );
    }

    #[test]
    fn each_field_lands_at_its_named_index() {
        // Give every field a distinct value so a swapped slot is detected.
        let input = FlightInput {
            stops: 2,
            duration: 3.25,
            days_left: 4,
            airline_air_india: 5,
            airline_go_first: 6,
            airline_indigo: 7,
            airline_spicejet: 8,
            airline_vistara: 9,
            class_economy: 10,
            departure_time_early_morning: 11,
            departure_time_morning: 12,
            departure_time_evening: 13,
            departure_time_late_night: 14,
            departure_time_night: 15,
        };
        let json = serde_json::to_value(&input).unwrap();
        let vector = input.to_feature_vector();

        for (i, name) in FEATURE_NAMES.iter().enumerate() {
            let expected = json[name].as_f64().unwrap();
            assert_eq!(vector.as_slice()[i], expected, "feature {name}");
            assert_eq!(vector.get(name), Some(expected));
        }
        assert_eq!(vector.get("departure_time_Morning"), Some(12.0));
        assert_eq!(vector.as_slice()[12], 12.0);
        assert_eq!(vector.get("unknown"), None);
    }

    #[test]
    fn mapping_is_deterministic() {
        let input = sample_input();
        assert_eq!(input.to_feature_vector(), input.clone().to_feature_vector());
    }

    #[test]
    fn deserialize_request_body() {
        let data = r#"{"stops":1,"duration":2.5,"days_left":10,"airline_Air_India":1,"airline_GO_FIRST":0,"airline_Indigo":0,"airline_SpiceJet":0,"airline_Vistara":0,"class_Economy":1,"departure_time_Early_Morning":0,"departure_time_Morning":1,"departure_time_Evening":0,"departure_time_Late_Night":0,"departure_time_Night":0,"extra":"ignored"}"#;
        let input: FlightInput = serde_json::from_str(data).unwrap();
        assert_eq!(input, sample_input());
    }

    #[test]
    fn deserialize_rejects_missing_field() {
        let data = r#"{"stops":1,"days_left":10,"airline_Air_India":1,"airline_GO_FIRST":0,"airline_Indigo":0,"airline_SpiceJet":0,"airline_Vistara":0,"class_Economy":1,"departure_time_Early_Morning":0,"departure_time_Morning":1,"departure_time_Evening":0,"departure_time_Late_Night":0,"departure_time_Night":0}"#;
        let err = serde_json::from_str::<FlightInput>(data).unwrap_err();
        assert!(err.to_string().contains("duration"));
    }

    #[test]
    fn deserialize_accepts_integral_floats() {
        let mut body = serde_json::to_value(sample_input()).unwrap();
        body["stops"] = serde_json::json!(1.0);
        body["days_left"] = serde_json::json!(10.0);
        body["class_Economy"] = serde_json::json!(1.0);
        let input: FlightInput = serde_json::from_value(body).unwrap();
        assert_eq!(input, sample_input());
    }

    #[test]
    fn deserialize_rejects_fractional_integers() {
        let mut body = serde_json::to_value(sample_input()).unwrap();
        body["stops"] = serde_json::json!(1.5);
        let err = serde_json::from_value::<FlightInput>(body).unwrap_err();
        assert!(err.to_string().contains("1.5"));
    }

    #[test]
    fn validate_accepts_bounds() {
        for stops in 0..=MAX_STOPS {
            let input = FlightInput {
                stops,
                days_left: 0,
                ..sample_input()
            };
            input.validate().unwrap();
        }
    }

    #[test]
    fn validate_rejects_out_of_range() {
        let input = FlightInput {
            stops: 5,
            ..sample_input()
        };
        let err = input.validate().unwrap_err();
        assert_eq!(err.violations.len(), 1);
        assert_eq!(err.violations[0].field, "stops");

        let input = FlightInput {
            stops: -1,
            duration: 0.0,
            days_left: -3,
            ..sample_input()
        };
        let err = input.validate().unwrap_err();
        let fields = err.violations.iter().map(|v| v.field).collect::<Vec<_>>();
        assert_eq!(fields, ["stops", "duration", "days_left"]);
        assert!(err.to_string().contains("days_left must be greater than or equal to 0"));
    }

    #[test]
    fn validate_rejects_nan_duration() {
        let input = FlightInput {
            duration: f64::NAN,
            ..sample_input()
        };
        assert!(input.validate().is_err());
    }

    #[test]
    fn one_hot_groups_are_not_checked() {
        let input = FlightInput {
            airline_air_india: 1,
            airline_vistara: 1,
            departure_time_morning: 0,
            ..sample_input()
        };
        input.validate().unwrap();
    }
}
