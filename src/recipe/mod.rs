//! Recipe model and the measurements recorded against it during a brew day.

pub mod status;

pub use status::{RecipeState, RecipeStatus};

use serde::{Deserialize, Serialize};

/// A recipe being brewed.
///
/// The instructions are immutable once stored; only `state` changes as the
/// brew day progresses. `state` is not part of the serialized form, stores
/// persist it separately.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Recipe {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub style: String,
    /// Batch size in liters
    #[serde(default)]
    pub batch_size: f32,
    #[serde(default)]
    pub initial_sg: f32,
    /// Bitterness in IBU
    #[serde(default)]
    pub bitterness: f32,
    #[serde(default)]
    pub color_ebc: f32,
    #[serde(default)]
    pub mashing: MashInstructions,
    #[serde(default)]
    pub hopping: HopInstructions,
    #[serde(default)]
    pub fermentation: FermentationInstructions,
    #[serde(skip)]
    pub state: RecipeState,
}

impl Recipe {
    pub fn get_status(&self) -> (RecipeStatus, Vec<String>) {
        self.state.get_status()
    }

    pub fn set_status<I, S>(&self, status: RecipeStatus, params: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state.set_status(status, params);
    }

    /// Human readable status, e.g. `mashing (rast 2)`.
    pub fn status_string(&self) -> String {
        let (status, params) = self.get_status();
        if params.is_empty() {
            status.to_string()
        } else {
            format!("{} ({})", status, params.join(" "))
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MashInstructions {
    #[serde(default)]
    pub malts: Vec<Malt>,
    /// Main water volume in liters
    #[serde(default)]
    pub main_water_volume: f32,
    /// Sparge water volume in liters
    #[serde(default)]
    pub nachguss: f32,
    #[serde(default)]
    pub mash_temperature: f32,
    #[serde(default)]
    pub mash_out_temperature: f32,
    #[serde(default)]
    pub rasts: Vec<Rast>,
}

/// A held temperature plateau during mashing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rast {
    pub temperature: f32,
    /// Duration in minutes
    pub duration: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Malt {
    pub name: String,
    /// Amount in grams
    pub amount: f32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HopInstructions {
    #[serde(default)]
    pub total_cooking_time: f32,
    #[serde(default)]
    pub hops: Vec<Hop>,
    #[serde(default)]
    pub additional_ingredients: Vec<AdditionalIngredient>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Hop {
    pub name: String,
    pub alpha: f32,
    /// Amount in grams
    pub amount: f32,
    /// Boil duration in minutes (days for dry hops)
    pub duration: f32,
    #[serde(default)]
    pub dry_hop: bool,
    #[serde(default)]
    pub vorderwuerze: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdditionalIngredient {
    pub name: String,
    pub amount: f32,
    #[serde(default)]
    pub duration: f32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FermentationInstructions {
    #[serde(default)]
    pub yeast: Yeast,
    /// Free text because recipes give ranges such as `18-20`
    #[serde(default)]
    pub temperature: String,
    #[serde(default)]
    pub additional_ingredients: Vec<AdditionalIngredient>,
    /// Target carbonation in g/L CO2
    #[serde(default)]
    pub carbonation: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Yeast {
    pub name: String,
    pub amount: f32,
}

/// Measured values of a brew, filled in as the day goes on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RecipeResults {
    pub hot_wort_volume: f32,
    pub original_gravity: f32,
    pub final_gravity: f32,
    pub alcohol: f32,
    pub main_fermentation_volume: f32,
    pub volume_before_boil: f32,
}

/// Addresses a single field of [`RecipeResults`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultType {
    HotWortVolume,
    OriginalGravity,
    FinalGravity,
    Alcohol,
    MainFermentationVolume,
    VolumeBeforeBoil,
}

impl ResultType {
    /// Column holding this result in the SQL schema.
    pub fn column(&self) -> &'static str {
        match self {
            ResultType::HotWortVolume => "hot_wort_vol",
            ResultType::OriginalGravity => "original_sg",
            ResultType::FinalGravity => "final_sg",
            ResultType::Alcohol => "alcohol",
            ResultType::MainFermentationVolume => "main_ferm_vol",
            ResultType::VolumeBeforeBoil => "vol_bb",
        }
    }
}

impl RecipeResults {
    pub fn get(&self, result: ResultType) -> f32 {
        match result {
            ResultType::HotWortVolume => self.hot_wort_volume,
            ResultType::OriginalGravity => self.original_gravity,
            ResultType::FinalGravity => self.final_gravity,
            ResultType::Alcohol => self.alcohol,
            ResultType::MainFermentationVolume => self.main_fermentation_volume,
            ResultType::VolumeBeforeBoil => self.volume_before_boil,
        }
    }

    pub fn set(&mut self, result: ResultType, value: f32) {
        let slot = match result {
            ResultType::HotWortVolume => &mut self.hot_wort_volume,
            ResultType::OriginalGravity => &mut self.original_gravity,
            ResultType::FinalGravity => &mut self.final_gravity,
            ResultType::Alcohol => &mut self.alcohol,
            ResultType::MainFermentationVolume => &mut self.main_fermentation_volume,
            ResultType::VolumeBeforeBoil => &mut self.volume_before_boil,
        };
        *slot = value;
    }
}

/// A gravity reading taken during main fermentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SgMeasurement {
    pub value: f32,
    pub date: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    pub is_final: bool,
    #[serde(default)]
    pub notes: String,
}

/// Priming sugar needed for a given amount of dissolving water.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PrimingSugarResult {
    pub water: f32,
    pub amount: f32,
    pub alcohol: f32,
}
