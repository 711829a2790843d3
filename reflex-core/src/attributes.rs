use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::AttributeError;

/// Stable attribute names shared by session files and exported reports.
pub mod names {
    pub const GUESS_TIME_LIMIT: &str = "guessTimeLimit";
    pub const RESPONSE_TIME_LIMIT: &str = "responseTimeLimit";
    /// Session scope: generated duration. Trial scope: explicit duration.
    pub const DURATION: &str = "duration";
    pub const RANDOM_POSITIONS: &str = "randomPositions";
    pub const INCLUDE_DISTRACTOR: &str = "includeRed";
    pub const POSITION_RANGE_MIN: &str = "positionRangeMin";
    pub const POSITION_RANGE_MAX: &str = "positionRangeMax";
    pub const POSITION_RANGE_MIN_X: &str = "positionRangeMinX";
    pub const POSITION_RANGE_MAX_X: &str = "positionRangeMaxX";
    pub const POSITION_RANGE_MIN_Y: &str = "positionRangeMinY";
    pub const POSITION_RANGE_MAX_Y: &str = "positionRangeMaxY";

    pub const DELAY: &str = "delay";
    pub const POSITION_X: &str = "positionX";
    pub const POSITION_Y: &str = "positionY";
    pub const IS_DISTRACTOR: &str = "isRed";

    pub const RESPONSE_TIME: &str = "responseTime";
    pub const SUCCESS: &str = "success";
    pub const ACCURACY: &str = "accuracy";
    pub const OUTCOME: &str = "outcome";
}

/// A single declarative attribute value.
///
/// Session files written by older tooling store every attribute as a
/// string, so textual numbers and booleans are accepted wherever a typed
/// value is expected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl AttributeValue {
    pub fn as_number(&self) -> Option<f64> {
        let value = match self {
            AttributeValue::Number(n) => *n,
            AttributeValue::Text(s) => s.trim().parse::<f64>().ok()?,
            AttributeValue::Bool(_) => return None,
        };
        value.is_finite().then_some(value)
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(b) => Some(*b),
            AttributeValue::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            },
            AttributeValue::Number(_) => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Bool(b) => write!(f, "{}", b),
            AttributeValue::Number(n) => write!(f, "{}", n),
            AttributeValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Number(value)
    }
}

impl From<f32> for AttributeValue {
    fn from(value: f32) -> Self {
        AttributeValue::Number(value as f64)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Text(value)
    }
}

/// Named attributes of one session or trial element, kept in name order so
/// exported records are stable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes(BTreeMap<String, AttributeValue>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn set(&mut self, name: &str, value: impl Into<AttributeValue>) {
        self.0.insert(name.to_string(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<AttributeValue> {
        self.0.remove(name)
    }

    /// Extends `self` with every attribute of `other`, overwriting duplicates.
    pub fn merge(&mut self, other: Attributes) {
        self.0.extend(other.0);
    }

    /// Reads a numeric attribute. `Ok(None)` when absent.
    pub fn number(&self, name: &str) -> Result<Option<f64>, AttributeError> {
        match self.get(name) {
            None => Ok(None),
            Some(value) => value
                .as_number()
                .map(Some)
                .ok_or_else(|| AttributeError::new(name, "a number", value)),
        }
    }

    /// Reads a boolean attribute. `Ok(None)` when absent.
    pub fn flag(&self, name: &str) -> Result<Option<bool>, AttributeError> {
        match self.get(name) {
            None => Ok(None),
            Some(value) => value
                .as_flag()
                .map(Some)
                .ok_or_else(|| AttributeError::new(name, "a boolean", value)),
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K, V> FromIterator<(K, V)> for Attributes
where
    K: Into<String>,
    V: Into<AttributeValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn textual_values_parse() {
        let attrs: Attributes = [
            ("duration", AttributeValue::from("0.75")),
            ("randomPositions", AttributeValue::from("True")),
        ]
        .into_iter()
        .collect();

        assert_eq!(attrs.number("duration").unwrap(), Some(0.75));
        assert_eq!(attrs.flag("randomPositions").unwrap(), Some(true));
        assert_eq!(attrs.number("delay").unwrap(), None);
    }

    #[test]
    fn malformed_values_are_reported() {
        let attrs: Attributes = [("guessTimeLimit", "soon")].into_iter().collect();
        let err = attrs.number("guessTimeLimit").unwrap_err();
        assert_eq!(err.name, "guessTimeLimit");
        assert_eq!(err.found, "soon");

        let attrs: Attributes = [("includeRed", 2.0)].into_iter().collect();
        assert!(attrs.flag("includeRed").is_err());
    }

    #[test]
    fn non_finite_numbers_are_rejected() {
        let attrs: Attributes = [("duration", "NaN")].into_iter().collect();
        assert!(attrs.number("duration").is_err());
    }

    #[test]
    fn json_shape_is_a_flat_object() {
        let attrs: Attributes =
            serde_json::from_str(r#"{"duration": 1.5, "isRed": true, "delay": "0.2"}"#).unwrap();
        assert_eq!(attrs.number("duration").unwrap(), Some(1.5));
        assert_eq!(attrs.flag("isRed").unwrap(), Some(true));
        assert_eq!(attrs.number("delay").unwrap(), Some(0.2));

        let back = serde_json::to_value(&attrs).unwrap();
        assert_eq!(back["isRed"], serde_json::Value::Bool(true));
    }
}
