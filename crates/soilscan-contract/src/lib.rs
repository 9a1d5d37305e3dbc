#![warn(missing_docs)]
//! # soilscan-contract
//!
//! ## Purpose
//! Defines the analysis service's response contract and client-side parsing.
//!
//! ## Responsibilities
//! - Parse success bodies into [`AnalysisResult`].
//! - Tolerate heterogeneous field shapes (strings or numbers) and degrade
//!   malformed fields to "absent" instead of rejecting the whole body.
//! - Extract the optional `detail` string from failure bodies.
//!
//! ## Data flow
//! Raw JSON body -> [`parse_analysis_result`] -> result renderer.
//! Raw failure body -> [`failure_message`] -> user-facing error text.
//!
//! ## Ownership and lifetimes
//! Parsed values are owned so they outlive the transport's response buffer.
//!
//! ## Error model
//! Invalid JSON or a non-object top level return [`ContractError`]. Individual
//! fields never fail parsing.
//!
//! ## Security and privacy notes
//! This crate handles model outputs only; it never sees credentials.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Number, Value};
use thiserror::Error;

/// Message used when a failure carries no usable server detail.
pub const GENERIC_FAILURE: &str = "Analysis failed";

/// One scalar display value as sent by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    /// JSON string.
    Text(String),
    /// JSON number.
    Number(Number),
    /// JSON boolean.
    Flag(bool),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Text(text) => f.write_str(text),
            Scalar::Number(number) => f.write_str(&format_number(number)),
            Scalar::Flag(flag) => write!(f, "{flag}"),
        }
    }
}

/// Formats a JSON number the way a browser prints it (`7.0` -> `7`).
fn format_number(number: &Number) -> String {
    if let Some(integer) = number.as_i64() {
        return integer.to_string();
    }
    if let Some(integer) = number.as_u64() {
        return integer.to_string();
    }
    match number.as_f64() {
        Some(float) if float.is_finite() && float.fract() == 0.0 && float.abs() < 1e15 => {
            format!("{}", float as i64)
        }
        Some(float) => float.to_string(),
        None => number.to_string(),
    }
}

/// One micronutrient entry, in the order the service sent it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Micronutrient {
    /// Nutrient name (for example `Zinc`).
    pub name: String,
    /// Reported level; `None` when the value was not a scalar.
    pub value: Option<Scalar>,
}

/// Structured agronomic result for one submission.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AnalysisResult {
    /// Soil classification label.
    #[serde(default, deserialize_with = "lenient")]
    pub soil_type: Option<Scalar>,
    /// Classifier confidence (for example `"92.4%"`).
    #[serde(default, deserialize_with = "lenient")]
    pub confidence: Option<Scalar>,
    /// Health score on a 0-100 scale (for example `"87/100"`).
    #[serde(default, deserialize_with = "lenient")]
    pub health_score: Option<Scalar>,
    /// Texture label.
    #[serde(default, deserialize_with = "lenient")]
    pub texture: Option<Scalar>,
    /// Lower bound of the pH range.
    #[serde(default, deserialize_with = "lenient")]
    pub ph_min: Option<Scalar>,
    /// Upper bound of the pH range.
    #[serde(default, deserialize_with = "lenient")]
    pub ph_max: Option<Scalar>,
    /// Nitrogen level.
    #[serde(default, deserialize_with = "lenient")]
    pub nitrogen: Option<Scalar>,
    /// Phosphorus level.
    #[serde(default, deserialize_with = "lenient")]
    pub phosphorus: Option<Scalar>,
    /// Potassium level.
    #[serde(default, deserialize_with = "lenient")]
    pub potassium: Option<Scalar>,
    /// Organic matter share.
    #[serde(default, deserialize_with = "lenient")]
    pub organic_matter: Option<Scalar>,
    /// Moisture share.
    #[serde(default, deserialize_with = "lenient")]
    pub moisture: Option<Scalar>,
    /// Water retention label.
    #[serde(default, deserialize_with = "lenient")]
    pub water_retention: Option<Scalar>,
    /// Salinity as electrical conductivity.
    #[serde(default, deserialize_with = "lenient")]
    pub salinity_ec: Option<Scalar>,
    /// Cation exchange capacity.
    #[serde(default, deserialize_with = "lenient")]
    pub cec: Option<Scalar>,
    /// Recommended planting season.
    #[serde(default, deserialize_with = "lenient")]
    pub planting_season: Option<Scalar>,
    /// Optimal temperature range.
    #[serde(default, deserialize_with = "lenient")]
    pub optimal_temp: Option<Scalar>,
    /// Drainage type.
    #[serde(default, deserialize_with = "lenient")]
    pub drainage_type: Option<Scalar>,
    /// Compaction level.
    #[serde(default, deserialize_with = "lenient")]
    pub compaction_level: Option<Scalar>,
    /// Climate zone the soil is typical of.
    #[serde(default, deserialize_with = "lenient")]
    pub climate_zone: Option<Scalar>,
    /// Likely nutrient deficiencies.
    #[serde(default, deserialize_with = "lenient_list")]
    pub possible_deficiencies: Vec<Scalar>,
    /// Recommended fertilizer.
    #[serde(default, deserialize_with = "lenient")]
    pub recommended_fertilizer: Option<Scalar>,
    /// Micronutrient levels in service order.
    #[serde(default, deserialize_with = "lenient_entries")]
    pub micro_nutrients: Vec<Micronutrient>,
    /// Recommended crops in service order.
    #[serde(default, deserialize_with = "lenient_list")]
    pub recommended_crops: Vec<Scalar>,
}

fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

fn lenient_list<'de, D>(deserializer: D) -> Result<Vec<Scalar>, D::Error>
where
    D: Deserializer<'de>,
{
    let items = match Value::deserialize(deserializer)? {
        Value::Array(items) => items,
        _ => return Ok(Vec::new()),
    };

    Ok(items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect())
}

fn lenient_entries<'de, D>(deserializer: D) -> Result<Vec<Micronutrient>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries = match Value::deserialize(deserializer)? {
        Value::Object(entries) => entries,
        _ => return Ok(Vec::new()),
    };

    Ok(entries
        .into_iter()
        .map(|(name, value)| Micronutrient {
            name,
            value: serde_json::from_value(value).ok(),
        })
        .collect())
}

/// Parses a success body into an [`AnalysisResult`].
///
/// # Errors
/// Returns [`ContractError::Decode`] for invalid JSON and
/// [`ContractError::NotAnObject`] when the top level is not a JSON object.
pub fn parse_analysis_result(raw: &str) -> Result<AnalysisResult, ContractError> {
    let value: Value = serde_json::from_str(raw)?;
    if !value.is_object() {
        return Err(ContractError::NotAnObject);
    }

    Ok(serde_json::from_value(value)?)
}

/// Returns the non-empty `detail` string of a failure body, if present.
pub fn failure_detail(raw: &str) -> Option<String> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let detail = value.get("detail")?.as_str()?.trim();
    (!detail.is_empty()).then(|| detail.to_string())
}

/// Returns the user-facing message for a failure body.
pub fn failure_message(raw: &str) -> String {
    failure_detail(raw).unwrap_or_else(|| GENERIC_FAILURE.to_string())
}

/// Analysis contract errors.
#[derive(Debug, Error)]
pub enum ContractError {
    /// JSON decode failure.
    #[error("analysis decode failure: {0}")]
    Decode(#[from] serde_json::Error),
    /// Top-level JSON value is not an object.
    #[error("analysis response is not a JSON object")]
    NotAnObject,
}
