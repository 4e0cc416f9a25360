//! Core nutrition types for nutrisnap.
//!
//! These types are shared by the local store, the tracker and the backend
//! wire format, so they serialize with camelCase field names.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default daily calorie goal.
pub const DEFAULT_CALORIES: f64 = 2000.0;

/// Default daily protein goal in grams.
pub const DEFAULT_PROTEIN: f64 = 120.0;

/// Daily calorie and protein targets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NutritionGoals {
    /// Calories per day.
    pub calories: f64,
    /// Protein per day in grams.
    pub protein: f64,
}

impl Default for NutritionGoals {
    fn default() -> Self {
        Self {
            calories: DEFAULT_CALORIES,
            protein: DEFAULT_PROTEIN,
        }
    }
}

impl NutritionGoals {
    /// Create goals from explicit values.
    #[must_use]
    pub fn new(calories: f64, protein: f64) -> Self {
        Self { calories, protein }
    }

    /// Check that both targets are finite and non-negative.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidGoals`] naming the offending field.
    pub fn validate(&self) -> Result<()> {
        if !self.calories.is_finite() || self.calories < 0.0 {
            return Err(Error::invalid_goals(format!(
                "calories must be a non-negative number, got {}",
                self.calories
            )));
        }
        if !self.protein.is_finite() || self.protein < 0.0 {
            return Err(Error::invalid_goals(format!(
                "protein must be a non-negative number, got {}",
                self.protein
            )));
        }
        Ok(())
    }
}

/// Goals as they may appear in storage or on the wire, with either field
/// missing. Missing fields fall back to a base set of goals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialGoals {
    /// Calories per day, if present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calories: Option<f64>,
    /// Protein per day, if present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protein: Option<f64>,
}

impl PartialGoals {
    /// Fill missing fields from `base`.
    #[must_use]
    pub fn merged_over(self, base: NutritionGoals) -> NutritionGoals {
        NutritionGoals {
            calories: self.calories.unwrap_or(base.calories),
            protein: self.protein.unwrap_or(base.protein),
        }
    }
}

/// A single logged food.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodItem {
    /// Unique id within the log (e.g. `quick-1700000000000`).
    pub id: String,
    /// Display name.
    pub name: String,
    /// Calories for the logged portion.
    pub calories: f64,
    /// Protein in grams for the logged portion.
    pub protein: f64,
    /// When the food was logged, in milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// Portion size in grams, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<f64>,
}

impl FoodItem {
    /// Create a quick-add entry with an id derived from `now_ms`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFood`] if the entry fails validation.
    pub fn quick(name: &str, calories: f64, protein: f64, now_ms: i64) -> Result<Self> {
        let food = Self {
            id: format!("quick-{now_ms}"),
            name: name.trim().to_string(),
            calories,
            protein,
            timestamp: now_ms,
            quantity: None,
        };
        food.validate()?;
        Ok(food)
    }

    /// Check that the entry is well-formed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFood`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::invalid_food("id must not be empty"));
        }
        if self.name.trim().is_empty() {
            return Err(Error::invalid_food("name must not be empty"));
        }
        check_amount("calories", self.calories)?;
        check_amount("protein", self.protein)?;
        if let Some(quantity) = self.quantity {
            check_amount("quantity", quantity)?;
        }
        Ok(())
    }
}

fn check_amount(field: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(Error::invalid_food(format!(
            "{field} must be a non-negative number, got {value}"
        )))
    }
}

/// A partial update to a logged food. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FoodPatch {
    /// New name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New calories.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calories: Option<f64>,
    /// New protein.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protein: Option<f64>,
    /// New quantity in grams.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<f64>,
}

impl FoodPatch {
    /// Check if the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.calories.is_none()
            && self.protein.is_none()
            && self.quantity.is_none()
    }

    /// Apply the patch to a copy of `food`. The id and timestamp never change.
    #[must_use]
    pub fn applied_to(&self, food: &FoodItem) -> FoodItem {
        let mut updated = food.clone();
        if let Some(name) = &self.name {
            updated.name = name.trim().to_string();
        }
        if let Some(calories) = self.calories {
            updated.calories = calories;
        }
        if let Some(protein) = self.protein {
            updated.protein = protein;
        }
        if let Some(quantity) = self.quantity {
            updated.quantity = Some(quantity);
        }
        updated
    }
}

/// Calorie and protein sums.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    /// Summed calories.
    pub calories: f64,
    /// Summed protein in grams.
    pub protein: f64,
}

impl Totals {
    /// Sum the calories and protein of `foods`.
    #[must_use]
    pub fn of(foods: &[FoodItem]) -> Self {
        foods.iter().fold(Self::default(), |acc, food| Self {
            calories: acc.calories + food.calories,
            protein: acc.protein + food.protein,
        })
    }

    /// Progress of these totals toward `goals`.
    #[must_use]
    pub fn progress(&self, goals: &NutritionGoals) -> Progress {
        Progress {
            calories: fraction(self.calories, goals.calories),
            protein: fraction(self.protein, goals.protein),
        }
    }
}

fn fraction(value: f64, goal: f64) -> f64 {
    if goal > 0.0 {
        value / goal
    } else {
        0.0
    }
}

/// Fraction of each goal reached. Values above 1.0 mean the goal was exceeded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    /// Fraction of the calorie goal.
    pub calories: f64,
    /// Fraction of the protein goal.
    pub protein: f64,
}

impl Progress {
    /// Progress clamped to `0.0..=1.0` for display.
    #[must_use]
    pub fn clamped(&self) -> Self {
        Self {
            calories: self.calories.clamp(0.0, 1.0),
            protein: self.protein.clamp(0.0, 1.0),
        }
    }
}

/// Everything eaten on one day, with precomputed totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyLog {
    /// The day, formatted `YYYY-MM-DD`.
    pub date: String,
    /// Sum of calories over `foods`.
    pub total_calories: f64,
    /// Sum of protein over `foods`.
    pub total_protein: f64,
    /// The logged foods in insertion order.
    pub foods: Vec<FoodItem>,
}

impl DailyLog {
    /// Build a log for `date`, computing totals from `foods`.
    #[must_use]
    pub fn from_foods(date: impl Into<String>, foods: Vec<FoodItem>) -> Self {
        let totals = Totals::of(&foods);
        Self {
            date: date.into(),
            total_calories: totals.calories,
            total_protein: totals.protein,
            foods,
        }
    }

    /// The recorded totals.
    #[must_use]
    pub fn totals(&self) -> Totals {
        Totals {
            calories: self.total_calories,
            protein: self.total_protein,
        }
    }
}

/// Daily logs keyed by `YYYY-MM-DD`. Keys sort chronologically.
pub type HistoryData = BTreeMap<String, DailyLog>;

/// Rounds to one decimal place.
#[must_use]
pub fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// An entry in the built-in food database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodDatabaseItem {
    /// Database id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Calories per 100 g.
    pub calories_per_100g: f64,
    /// Protein per 100 g.
    pub protein_per_100g: f64,
}

impl FoodDatabaseItem {
    /// Log `quantity_g` grams of this food.
    #[must_use]
    pub fn portion(&self, quantity_g: u32, now_ms: i64) -> FoodItem {
        portion_of(
            &self.id,
            &self.name,
            self.calories_per_100g,
            self.protein_per_100g,
            quantity_g,
            now_ms,
        )
    }
}

/// A food returned by the online food database, reduced to per-100 g values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimplifiedFoodItem {
    /// Database id.
    pub id: String,
    /// Description.
    pub name: String,
    /// Brand owner, for branded foods.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    /// Calories per 100 g, rounded to a whole number.
    pub calories_per_100g: f64,
    /// Protein per 100 g, one decimal.
    pub protein_per_100g: f64,
    /// Fat per 100 g, one decimal.
    pub fat_per_100g: f64,
    /// Carbohydrates per 100 g, one decimal.
    pub carbs_per_100g: f64,
}

impl SimplifiedFoodItem {
    /// Log `quantity_g` grams of this food.
    #[must_use]
    pub fn portion(&self, quantity_g: u32, now_ms: i64) -> FoodItem {
        portion_of(
            &self.id,
            &self.name,
            self.calories_per_100g,
            self.protein_per_100g,
            quantity_g,
            now_ms,
        )
    }

    /// Fat in a `quantity_g` gram portion, one decimal.
    #[must_use]
    pub fn fat_for(&self, quantity_g: u32) -> f64 {
        round_one_decimal(f64::from(quantity_g) * self.fat_per_100g / 100.0)
    }

    /// Carbohydrates in a `quantity_g` gram portion, one decimal.
    #[must_use]
    pub fn carbs_for(&self, quantity_g: u32) -> f64 {
        round_one_decimal(f64::from(quantity_g) * self.carbs_per_100g / 100.0)
    }
}

fn portion_of(
    id: &str,
    name: &str,
    calories_per_100g: f64,
    protein_per_100g: f64,
    quantity_g: u32,
    now_ms: i64,
) -> FoodItem {
    let grams = f64::from(quantity_g);
    FoodItem {
        id: format!("{id}-{now_ms}"),
        name: name.to_string(),
        calories: (grams * calories_per_100g / 100.0).round(),
        protein: round_one_decimal(grams * protein_per_100g / 100.0),
        timestamp: now_ms,
        quantity: Some(grams),
    }
}
