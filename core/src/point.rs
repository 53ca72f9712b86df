//! Timestamped vector points and their validation rules.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Nanoseconds since the Unix epoch.
pub type Timestamp = u64;
pub type Labels = BTreeMap<String, String>;

/// One stored observation. Immutable once accepted by a series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub timestamp: Timestamp,
    #[serde(with = "values_codec")]
    pub values: Vec<f32>,
    #[serde(default)]
    pub labels: Labels,
}

impl DataPoint {
    pub fn new(timestamp: Timestamp, values: Vec<f32>) -> Self {
        Self {
            timestamp,
            values,
            labels: Labels::new(),
        }
    }

    pub fn with_labels(timestamp: Timestamp, values: Vec<f32>, labels: Labels) -> Self {
        Self {
            timestamp,
            values,
            labels,
        }
    }

    pub fn view(&self) -> PointRef<'_> {
        PointRef {
            timestamp: self.timestamp,
            values: &self.values,
            labels: &self.labels,
        }
    }
}

/// Borrowed view of a stored point, independent of where the series keeps it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PointRef<'a> {
    pub timestamp: Timestamp,
    #[serde(serialize_with = "values_codec::serialize")]
    pub values: &'a [f32],
    pub labels: &'a Labels,
}

impl PointRef<'_> {
    pub fn to_point(&self) -> DataPoint {
        DataPoint {
            timestamp: self.timestamp,
            values: self.values.to_vec(),
            labels: self.labels.clone(),
        }
    }
}

/// JSON has no NaN or infinity. Finite values are plain numbers; the others
/// are written as the strings `"NaN"`, `"inf"` and `"-inf"` so that series
/// created with `strict_finite` off still round-trip through snapshots.
pub(crate) mod values_codec {
    use serde::de::Error as _;
    use serde::ser::SerializeSeq;
    use serde::{Deserialize, Deserializer, Serializer};

    pub(crate) fn serialize<S: Serializer>(
        values: &[f32],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(values.len()))?;
        for value in values {
            if value.is_finite() {
                seq.serialize_element(value)?;
            } else if value.is_nan() {
                seq.serialize_element("NaN")?;
            } else if value.is_sign_positive() {
                seq.serialize_element("inf")?;
            } else {
                seq.serialize_element("-inf")?;
            }
        }
        seq.end()
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Encoded {
        Number(f32),
        Text(String),
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<f32>, D::Error> {
        Vec::<Encoded>::deserialize(deserializer)?
            .into_iter()
            .map(|encoded| match encoded {
                Encoded::Number(value) => Ok(value),
                Encoded::Text(text) => match text.as_str() {
                    "NaN" => Ok(f32::NAN),
                    "inf" => Ok(f32::INFINITY),
                    "-inf" => Ok(f32::NEG_INFINITY),
                    other => Err(D::Error::custom(format!("invalid vector value '{other}'"))),
                },
            })
            .collect()
    }
}

/// Current wall-clock time in nanoseconds. Clamps to 0 before the epoch.
pub fn now_nanos() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos().min(u128::from(u64::MAX)) as u64)
        .unwrap_or(0)
}

pub(crate) fn validate_values(
    values: &[f32],
    dimension: usize,
    strict_finite: bool,
) -> Result<(), EngineError> {
    if values.len() != dimension {
        return Err(EngineError::DimensionMismatch {
            expected: dimension,
            got: values.len(),
        });
    }

    if strict_finite {
        if let Some(index) = values.iter().position(|value| !value.is_finite()) {
            return Err(EngineError::invalid_argument(format!(
                "vector contains non-finite value at index {index}"
            )));
        }
    }

    Ok(())
}

pub(crate) fn validate_labels(labels: &Labels) -> Result<(), EngineError> {
    if labels.keys().any(|key| key.trim().is_empty()) {
        return Err(EngineError::invalid_argument("label keys must not be empty"));
    }
    Ok(())
}
