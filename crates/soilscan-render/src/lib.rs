#![warn(missing_docs)]
//! # soilscan-render
//!
//! ## Purpose
//! Projects analysis results and submission progress onto a fixed,
//! toolkit-independent display contract.
//!
//! ## Responsibilities
//! - Map every [`AnalysisResult`] field onto a named display slot.
//! - Format composite slots (pH range, soil type with confidence).
//! - Rebuild micronutrient rows and crop tags on every render.
//! - Project the submit control's label and enabled state.
//!
//! ## Data flow
//! Orchestrator success -> [`ResultView::render`] -> shell prints
//! [`ResultView::rows`] or serializes the view.
//!
//! ## Ownership and lifetimes
//! [`ResultView`] owns all slot strings; it never borrows from the result.
//!
//! ## Error model
//! Rendering cannot fail. Missing or malformed fields surface as empty slots.

use serde::Serialize;
use soilscan_contract::{AnalysisResult, Scalar};

/// One micronutrient row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MicronutrientRow {
    /// Nutrient name.
    pub name: String,
    /// Formatted level.
    pub value: String,
}

/// Display slots for one analysis result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResultView {
    /// Whether the result region is shown.
    pub visible: bool,
    /// `"label (confidence)"`.
    pub soil_type: String,
    /// Health score.
    pub health_score: String,
    /// Texture label.
    pub texture: String,
    /// `"min - max"`.
    pub ph_range: String,
    /// Nitrogen level.
    pub nitrogen: String,
    /// Phosphorus level.
    pub phosphorus: String,
    /// Potassium level.
    pub potassium: String,
    /// Organic matter.
    pub organic_matter: String,
    /// Moisture.
    pub moisture: String,
    /// Water retention.
    pub water_retention: String,
    /// Salinity (EC).
    pub salinity: String,
    /// Cation exchange capacity.
    pub cec: String,
    /// Planting season.
    pub planting_season: String,
    /// Optimal temperature.
    pub optimal_temp: String,
    /// Drainage type.
    pub drainage: String,
    /// Compaction level.
    pub compaction: String,
    /// Climate zone.
    pub climate_zone: String,
    /// Deficiencies joined with `", "`.
    pub deficiencies: String,
    /// Recommended fertilizer.
    pub fertilizer: String,
    /// Micronutrient rows in service order.
    pub micronutrients: Vec<MicronutrientRow>,
    /// Crop tags in service order.
    pub crops: Vec<String>,
}

impl ResultView {
    /// Creates an empty, hidden view.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces every slot with values from `result` and shows the region.
    pub fn render(&mut self, result: &AnalysisResult) {
        self.visible = true;
        self.soil_type = match (&result.soil_type, &result.confidence) {
            (Some(label), Some(confidence)) => format!("{label} ({confidence})"),
            (Some(label), None) => label.to_string(),
            (None, _) => String::new(),
        };
        self.health_score = slot(&result.health_score);
        self.texture = slot(&result.texture);
        self.ph_range = match (&result.ph_min, &result.ph_max) {
            (Some(min), Some(max)) => format!("{min} - {max}"),
            _ => String::new(),
        };
        self.nitrogen = slot(&result.nitrogen);
        self.phosphorus = slot(&result.phosphorus);
        self.potassium = slot(&result.potassium);
        self.organic_matter = slot(&result.organic_matter);
        self.moisture = slot(&result.moisture);
        self.water_retention = slot(&result.water_retention);
        self.salinity = slot(&result.salinity_ec);
        self.cec = slot(&result.cec);
        self.planting_season = slot(&result.planting_season);
        self.optimal_temp = slot(&result.optimal_temp);
        self.drainage = slot(&result.drainage_type);
        self.compaction = slot(&result.compaction_level);
        self.climate_zone = slot(&result.climate_zone);
        self.deficiencies = join(&result.possible_deficiencies);
        self.fertilizer = slot(&result.recommended_fertilizer);

        self.micronutrients.clear();
        self.micronutrients
            .extend(result.micro_nutrients.iter().map(|entry| MicronutrientRow {
                name: entry.name.clone(),
                value: slot(&entry.value),
            }));

        self.crops.clear();
        self.crops
            .extend(result.recommended_crops.iter().map(ToString::to_string));
    }

    /// Hides the region and empties every slot.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Labelled scalar slots in display order.
    pub fn rows(&self) -> Vec<(&'static str, &str)> {
        vec![
            ("Soil type", self.soil_type.as_str()),
            ("Health score", self.health_score.as_str()),
            ("Texture", self.texture.as_str()),
            ("pH", self.ph_range.as_str()),
            ("Nitrogen", self.nitrogen.as_str()),
            ("Phosphorus", self.phosphorus.as_str()),
            ("Potassium", self.potassium.as_str()),
            ("Organic matter", self.organic_matter.as_str()),
            ("Moisture", self.moisture.as_str()),
            ("Water retention", self.water_retention.as_str()),
            ("Salinity (EC)", self.salinity.as_str()),
            ("CEC", self.cec.as_str()),
            ("Planting season", self.planting_season.as_str()),
            ("Optimal temperature", self.optimal_temp.as_str()),
            ("Drainage", self.drainage.as_str()),
            ("Compaction", self.compaction.as_str()),
            ("Climate zone", self.climate_zone.as_str()),
            ("Deficiencies", self.deficiencies.as_str()),
            ("Fertilizer", self.fertilizer.as_str()),
        ]
    }
}

fn slot(value: &Option<Scalar>) -> String {
    value.as_ref().map(ToString::to_string).unwrap_or_default()
}

fn join(values: &[Scalar]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Submission progress as seen by the submit control.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum SubmitPhase {
    /// Nothing in flight; last attempt (if any) succeeded.
    #[default]
    Idle,
    /// A submission or its anonymous fallback is in flight.
    Submitting,
    /// Last attempt failed and may be retried.
    Failed,
}

/// Projected state of the submit control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmitControl {
    /// Whether the control accepts clicks.
    pub enabled: bool,
    /// Button label.
    pub label: &'static str,
}

/// Projects the submit control from staging and progress state.
pub fn submit_control(has_image: bool, phase: SubmitPhase) -> SubmitControl {
    let label = match phase {
        SubmitPhase::Idle => "Analyze Soil Sample",
        SubmitPhase::Submitting => "Analyzing...",
        SubmitPhase::Failed => "Retry Analysis",
    };

    SubmitControl {
        enabled: has_image && phase != SubmitPhase::Submitting,
        label,
    }
}
