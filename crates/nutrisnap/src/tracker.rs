//! The food log: today's foods, goals and per-day history.
//!
//! Every mutation rewrites today's entry in the history with fresh totals and
//! persists goals, today's foods, history and the current date to the local
//! store in one transaction. The tracker also remembers whether anything
//! changed since the last successful push.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::api::{NutritionSnapshot, RemoteNutrition};
use crate::dates::{format_date, format_for_display, Period};
use crate::error::{Error, Result};
use crate::model::{
    DailyLog, FoodItem, FoodPatch, HistoryData, NutritionGoals, PartialGoals, Progress, Totals,
};
use crate::storage::{keys, Storage};

/// Which total a chart plots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// Calories.
    #[default]
    Calories,
    /// Protein.
    Protein,
}

impl Metric {
    fn of(self, totals: Totals) -> f64 {
        match self {
            Self::Calories => totals.calories,
            Self::Protein => totals.protein,
        }
    }
}

/// One bar of a history chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartBar {
    /// The day, `YYYY-MM-DD`.
    pub date: String,
    /// Short label such as `Mar 4`.
    pub label: String,
    /// The plotted total.
    pub value: f64,
    /// Bar height relative to the tallest bar (at least 1 unit), in `0.0..=1.0`.
    pub height: f64,
}

/// Food log state backed by the local store.
#[derive(Debug)]
pub struct Tracker {
    storage: Arc<Storage>,
    default_goals: NutritionGoals,
    goals: NutritionGoals,
    today_foods: Vec<FoodItem>,
    history: HistoryData,
    current_date: String,
    dirty: bool,
}

impl Tracker {
    /// Load the food log from `storage` for the day `today`.
    ///
    /// Stored values that fail to decode fall back to defaults. If the stored
    /// foods belong to an earlier day, they are archived into the history
    /// first.
    ///
    /// # Errors
    ///
    /// Returns an error if the local store cannot be read or written.
    pub fn load(
        storage: Arc<Storage>,
        default_goals: NutritionGoals,
        today: NaiveDate,
    ) -> Result<Self> {
        let goals = storage
            .get_json::<PartialGoals>(keys::GOALS)?
            .map_or(default_goals, |stored| stored.merged_over(default_goals));
        let today_foods = storage
            .get_json::<Vec<FoodItem>>(keys::TODAY_FOODS)?
            .unwrap_or_default();
        let history = storage
            .get_json::<HistoryData>(keys::HISTORY)?
            .unwrap_or_default();
        let stored_date = storage.get_item(keys::CURRENT_DATE)?;

        let current_date = format_date(today);
        let mut tracker = Self {
            storage,
            default_goals,
            goals,
            today_foods,
            history,
            current_date: stored_date.unwrap_or_else(|| current_date.clone()),
            dirty: false,
        };

        if !tracker.check_day_change(today)? {
            tracker.refresh_today();
        }

        debug!(
            "Loaded food log for {} ({} foods, {} days of history)",
            tracker.current_date,
            tracker.today_foods.len(),
            tracker.history.len()
        );
        Ok(tracker)
    }

    /// The shared local store.
    #[must_use]
    pub fn storage(&self) -> &Arc<Storage> {
        &self.storage
    }

    /// Current goals.
    #[must_use]
    pub fn goals(&self) -> NutritionGoals {
        self.goals
    }

    /// Foods logged today, in insertion order.
    #[must_use]
    pub fn today_foods(&self) -> &[FoodItem] {
        &self.today_foods
    }

    /// All daily logs, including today's.
    #[must_use]
    pub fn history(&self) -> &HistoryData {
        &self.history
    }

    /// The day today's foods belong to, `YYYY-MM-DD`.
    #[must_use]
    pub fn current_date(&self) -> &str {
        &self.current_date
    }

    /// Whether anything changed since the last push.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Record that the current state reached the backend.
    pub fn mark_synced(&mut self) {
        self.dirty = false;
    }

    /// Log a food for today.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFood`] if the food fails validation or its id
    /// is already logged today, or a storage error if persisting fails.
    pub fn add_food(&mut self, food: FoodItem) -> Result<()> {
        food.validate()?;
        if self.position(&food.id).is_some() {
            return Err(Error::invalid_food(format!(
                "a food with id '{}' is already logged today",
                food.id
            )));
        }
        info!("Logged {} ({} kcal)", food.name, food.calories);
        self.today_foods.push(food);
        self.commit()
    }

    /// Apply `patch` to one of today's foods and return the updated entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FoodNotFound`] if `id` is not logged today, or
    /// [`Error::InvalidFood`] if the result fails validation.
    pub fn edit_food(&mut self, id: &str, patch: &FoodPatch) -> Result<FoodItem> {
        let index = self.position(id).ok_or_else(|| Error::FoodNotFound {
            id: id.to_string(),
        })?;
        let updated = patch.applied_to(&self.today_foods[index]);
        updated.validate()?;
        self.today_foods[index] = updated.clone();
        debug!("Edited food {}", id);
        self.commit()?;
        Ok(updated)
    }

    /// Remove one of today's foods and return it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FoodNotFound`] if `id` is not logged today.
    pub fn delete_food(&mut self, id: &str) -> Result<FoodItem> {
        let index = self.position(id).ok_or_else(|| Error::FoodNotFound {
            id: id.to_string(),
        })?;
        let removed = self.today_foods.remove(index);
        debug!("Deleted food {}", id);
        self.commit()?;
        Ok(removed)
    }

    /// Replace the goals.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidGoals`] if either value is negative or not finite.
    pub fn update_goals(&mut self, goals: NutritionGoals) -> Result<()> {
        goals.validate()?;
        self.goals = goals;
        info!(
            "Goals set to {} kcal, {} g protein",
            goals.calories, goals.protein
        );
        self.commit()
    }

    /// Sums over today's foods.
    #[must_use]
    pub fn today_totals(&self) -> Totals {
        Totals::of(&self.today_foods)
    }

    /// Today's progress toward the goals.
    #[must_use]
    pub fn progress(&self) -> Progress {
        self.today_totals().progress(&self.goals)
    }

    /// Advance to `today` if the calendar day changed.
    ///
    /// The previous day's foods are archived into the history and today's
    /// foods are taken from any log already stored for the new day.
    /// Returns `true` if the day changed.
    ///
    /// # Errors
    ///
    /// Returns an error if persisting the new state fails.
    pub fn check_day_change(&mut self, today: NaiveDate) -> Result<bool> {
        let new_date = format_date(today);
        if new_date == self.current_date {
            return Ok(false);
        }

        let previous = std::mem::replace(&mut self.current_date, new_date);
        let archived = std::mem::take(&mut self.today_foods);
        info!(
            "Day changed from {} to {}, archiving {} foods",
            previous,
            self.current_date,
            archived.len()
        );
        self.history
            .insert(previous.clone(), DailyLog::from_foods(previous, archived));
        self.today_foods = self
            .history
            .get(&self.current_date)
            .map(|log| log.foods.clone())
            .unwrap_or_default();

        self.commit()?;
        Ok(true)
    }

    /// Stored logs for the days of `period` ending at `today`, oldest first.
    /// Days without a log are skipped.
    #[must_use]
    pub fn history_for(&self, period: Period, today: NaiveDate) -> Vec<&DailyLog> {
        period
            .dates(today)
            .iter()
            .filter_map(|date| self.history.get(date))
            .collect()
    }

    /// Chart bars for `metric` over `period`.
    #[must_use]
    pub fn chart_series(&self, period: Period, today: NaiveDate, metric: Metric) -> Vec<ChartBar> {
        let logs = self.history_for(period, today);
        let max = logs
            .iter()
            .map(|log| metric.of(log.totals()))
            .fold(1.0_f64, f64::max);
        logs.into_iter()
            .map(|log| {
                let value = metric.of(log.totals());
                ChartBar {
                    date: log.date.clone(),
                    label: format_for_display(&log.date),
                    value,
                    height: value / max,
                }
            })
            .collect()
    }

    /// Goals and history as pushed to the backend.
    #[must_use]
    pub fn snapshot(&self) -> NutritionSnapshot {
        NutritionSnapshot {
            goals: self.goals,
            history: self.history.clone(),
        }
    }

    /// Replace local state with what the backend returned.
    ///
    /// Goals are merged over the defaults and the history is replaced
    /// wholesale. Today's foods come from the remote log for today when it
    /// has one; otherwise the local foods are kept and the tracker stays
    /// dirty so they get pushed.
    ///
    /// # Errors
    ///
    /// Returns an error if persisting the new state fails.
    pub fn apply_remote(&mut self, remote: RemoteNutrition) -> Result<()> {
        self.goals = remote.goals.merged_over(self.default_goals);
        self.history = remote.history;

        let remote_has_today = match self.history.get(&self.current_date) {
            Some(log) => {
                self.today_foods = log.foods.clone();
                true
            }
            None => false,
        };

        self.refresh_today();
        self.persist()?;
        self.dirty = !remote_has_today && !self.today_foods.is_empty();
        info!(
            "Applied remote state ({} days of history)",
            self.history.len()
        );
        Ok(())
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.today_foods.iter().position(|food| food.id == id)
    }

    /// Mirror today's foods into the history entry for the current date.
    fn refresh_today(&mut self) {
        let log = DailyLog::from_foods(self.current_date.clone(), self.today_foods.clone());
        self.history.insert(self.current_date.clone(), log);
    }

    fn commit(&mut self) -> Result<()> {
        self.refresh_today();
        self.dirty = true;
        self.persist()
    }

    fn persist(&self) -> Result<()> {
        self.storage.set_items(&[
            (keys::GOALS, serde_json::to_string(&self.goals)?),
            (keys::TODAY_FOODS, serde_json::to_string(&self.today_foods)?),
            (keys::HISTORY, serde_json::to_string(&self.history)?),
            (keys::CURRENT_DATE, self.current_date.clone()),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn storage() -> Arc<Storage> {
        Arc::new(Storage::open_in_memory().unwrap())
    }

    fn tracker_on(storage: Arc<Storage>, d: u32) -> Tracker {
        Tracker::load(storage, NutritionGoals::default(), day(d)).unwrap()
    }

    fn food(id: &str, calories: f64, protein: f64) -> FoodItem {
        FoodItem {
            id: id.to_string(),
            name: format!("Food {id}"),
            calories,
            protein,
            timestamp: 1,
            quantity: None,
        }
    }

    #[test]
    fn test_load_fresh() {
        let tracker = tracker_on(storage(), 10);
        assert_eq!(tracker.goals(), NutritionGoals::default());
        assert!(tracker.today_foods().is_empty());
        assert_eq!(tracker.current_date(), "2024-03-10");
        assert!(tracker.history().contains_key("2024-03-10"));
        assert!(!tracker.is_dirty());
    }

    #[test]
    fn test_add_food_updates_history_and_totals() {
        let mut tracker = tracker_on(storage(), 10);
        tracker.add_food(food("a", 300.0, 20.0)).unwrap();
        tracker.add_food(food("b", 200.0, 5.0)).unwrap();

        let totals = tracker.today_totals();
        assert!((totals.calories - 500.0).abs() < f64::EPSILON);
        assert!((totals.protein - 25.0).abs() < f64::EPSILON);

        let log = &tracker.history()["2024-03-10"];
        assert_eq!(log.foods.len(), 2);
        assert!((log.total_calories - 500.0).abs() < f64::EPSILON);
        assert!(tracker.is_dirty());
    }

    #[test]
    fn test_add_duplicate_id_rejected() {
        let mut tracker = tracker_on(storage(), 10);
        tracker.add_food(food("a", 300.0, 20.0)).unwrap();
        let err = tracker.add_food(food("a", 1.0, 1.0)).unwrap_err();
        assert!(matches!(err, Error::InvalidFood { .. }));
        assert_eq!(tracker.today_foods().len(), 1);
    }

    #[test]
    fn test_add_invalid_food_rejected() {
        let mut tracker = tracker_on(storage(), 10);
        assert!(tracker.add_food(food("a", -1.0, 0.0)).is_err());
        assert!(tracker.today_foods().is_empty());
        assert!(!tracker.is_dirty());
    }

    #[test]
    fn test_edit_food() {
        let mut tracker = tracker_on(storage(), 10);
        tracker.add_food(food("a", 300.0, 20.0)).unwrap();

        let patch = FoodPatch {
            calories: Some(350.0),
            ..FoodPatch::default()
        };
        let updated = tracker.edit_food("a", &patch).unwrap();
        assert!((updated.calories - 350.0).abs() < f64::EPSILON);
        assert!((tracker.history()["2024-03-10"].total_calories - 350.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_edit_missing_food() {
        let mut tracker = tracker_on(storage(), 10);
        let err = tracker.edit_food("nope", &FoodPatch::default()).unwrap_err();
        assert!(matches!(err, Error::FoodNotFound { .. }));
    }

    #[test]
    fn test_edit_rejects_invalid_result() {
        let mut tracker = tracker_on(storage(), 10);
        tracker.add_food(food("a", 300.0, 20.0)).unwrap();
        let patch = FoodPatch {
            name: Some("  ".to_string()),
            ..FoodPatch::default()
        };
        assert!(tracker.edit_food("a", &patch).is_err());
        assert_eq!(tracker.today_foods()[0].name, "Food a");
    }

    #[test]
    fn test_delete_food() {
        let mut tracker = tracker_on(storage(), 10);
        tracker.add_food(food("a", 300.0, 20.0)).unwrap();
        tracker.add_food(food("b", 100.0, 2.0)).unwrap();

        let removed = tracker.delete_food("a").unwrap();
        assert_eq!(removed.id, "a");
        assert_eq!(tracker.today_foods().len(), 1);
        assert!((tracker.today_totals().calories - 100.0).abs() < f64::EPSILON);
        assert!(matches!(
            tracker.delete_food("a"),
            Err(Error::FoodNotFound { .. })
        ));
    }

    #[test]
    fn test_update_goals() {
        let mut tracker = tracker_on(storage(), 10);
        tracker
            .update_goals(NutritionGoals::new(1800.0, 100.0))
            .unwrap();
        assert_eq!(tracker.goals(), NutritionGoals::new(1800.0, 100.0));
        assert!(tracker.update_goals(NutritionGoals::new(-5.0, 1.0)).is_err());
        assert_eq!(tracker.goals(), NutritionGoals::new(1800.0, 100.0));
    }

    #[test]
    fn test_progress() {
        let mut tracker = tracker_on(storage(), 10);
        tracker.add_food(food("a", 1000.0, 60.0)).unwrap();
        let progress = tracker.progress();
        assert!((progress.calories - 0.5).abs() < f64::EPSILON);
        assert!((progress.protein - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_state_persists_across_loads() {
        let storage = storage();
        {
            let mut tracker = tracker_on(storage.clone(), 10);
            tracker.add_food(food("a", 300.0, 20.0)).unwrap();
            tracker
                .update_goals(NutritionGoals::new(2200.0, 150.0))
                .unwrap();
        }

        let tracker = tracker_on(storage, 10);
        assert_eq!(tracker.today_foods().len(), 1);
        assert_eq!(tracker.goals(), NutritionGoals::new(2200.0, 150.0));
    }

    #[test]
    fn test_load_archives_previous_day() {
        let storage = storage();
        {
            let mut tracker = tracker_on(storage.clone(), 10);
            tracker.add_food(food("a", 300.0, 20.0)).unwrap();
        }

        let tracker = tracker_on(storage, 11);
        assert_eq!(tracker.current_date(), "2024-03-11");
        assert!(tracker.today_foods().is_empty());
        let archived = &tracker.history()["2024-03-10"];
        assert_eq!(archived.foods.len(), 1);
        assert!((archived.total_calories - 300.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_load_tolerates_corrupt_values() {
        let storage = storage();
        storage.set_item(keys::GOALS, "not json").unwrap();
        storage.set_item(keys::TODAY_FOODS, r#"{"not": "an array"}"#).unwrap();
        storage.set_item(keys::HISTORY, "[]").unwrap();

        let tracker = tracker_on(storage, 10);
        assert_eq!(tracker.goals(), NutritionGoals::default());
        assert!(tracker.today_foods().is_empty());
    }

    #[test]
    fn test_load_merges_partial_goals() {
        let storage = storage();
        storage.set_item(keys::GOALS, r#"{"protein": 80}"#).unwrap();

        let tracker = tracker_on(storage, 10);
        assert_eq!(tracker.goals(), NutritionGoals::new(2000.0, 80.0));
    }

    #[test]
    fn test_check_day_change() {
        let mut tracker = tracker_on(storage(), 10);
        tracker.add_food(food("a", 300.0, 20.0)).unwrap();
        tracker.mark_synced();

        assert!(!tracker.check_day_change(day(10)).unwrap());
        assert!(tracker.check_day_change(day(11)).unwrap());

        assert_eq!(tracker.current_date(), "2024-03-11");
        assert!(tracker.today_foods().is_empty());
        assert_eq!(tracker.history()["2024-03-10"].foods.len(), 1);
        assert!(tracker.history().contains_key("2024-03-11"));
        assert!(tracker.is_dirty());
    }

    #[test]
    fn test_day_change_back_to_logged_day_keeps_its_foods() {
        let mut tracker = tracker_on(storage(), 10);
        tracker.add_food(food("a", 300.0, 20.0)).unwrap();
        tracker.check_day_change(day(11)).unwrap();
        tracker.check_day_change(day(10)).unwrap();

        assert_eq!(tracker.today_foods().len(), 1);
        assert_eq!(tracker.history()["2024-03-10"].foods.len(), 1);
    }

    #[test]
    fn test_history_for_period() {
        let mut tracker = tracker_on(storage(), 1);
        tracker.add_food(food("a", 100.0, 1.0)).unwrap();
        tracker.check_day_change(day(3)).unwrap();
        tracker.add_food(food("b", 200.0, 2.0)).unwrap();
        tracker.check_day_change(day(12)).unwrap();

        let weekly = tracker.history_for(Period::Weekly, day(12));
        assert_eq!(weekly.len(), 1);
        assert_eq!(weekly[0].date, "2024-03-12");

        let monthly = tracker.history_for(Period::Monthly, day(12));
        let dates: Vec<&str> = monthly.iter().map(|log| log.date.as_str()).collect();
        assert_eq!(dates, vec!["2024-03-01", "2024-03-03", "2024-03-12"]);

        let daily = tracker.history_for(Period::Daily, day(12));
        assert_eq!(daily.len(), 1);
    }

    #[test]
    fn test_chart_series() {
        let mut tracker = tracker_on(storage(), 1);
        tracker.add_food(food("a", 400.0, 10.0)).unwrap();
        tracker.check_day_change(day(2)).unwrap();
        tracker.add_food(food("b", 200.0, 40.0)).unwrap();

        let bars = tracker.chart_series(Period::Weekly, day(2), Metric::Calories);
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].label, "Mar 1");
        assert!((bars[0].height - 1.0).abs() < f64::EPSILON);
        assert!((bars[1].height - 0.5).abs() < f64::EPSILON);

        let protein = tracker.chart_series(Period::Weekly, day(2), Metric::Protein);
        assert!((protein[1].value - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_chart_series_all_zero() {
        let tracker = tracker_on(storage(), 1);
        let bars = tracker.chart_series(Period::Daily, day(1), Metric::Calories);
        assert_eq!(bars.len(), 1);
        assert!(bars[0].height.abs() < f64::EPSILON);
    }

    #[test]
    fn test_chart_series_uses_recorded_totals() {
        let mut tracker = tracker_on(storage(), 10);
        let mut history = HistoryData::new();
        history.insert(
            "2024-03-09".to_string(),
            DailyLog {
                date: "2024-03-09".to_string(),
                total_calories: 900.0,
                total_protein: 45.0,
                foods: Vec::new(),
            },
        );
        tracker
            .apply_remote(RemoteNutrition {
                goals: PartialGoals::default(),
                history,
            })
            .unwrap();

        let bars = tracker.chart_series(Period::Weekly, day(10), Metric::Protein);
        assert_eq!(bars[0].date, "2024-03-09");
        assert!((bars[0].value - 45.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_snapshot() {
        let mut tracker = tracker_on(storage(), 10);
        tracker.add_food(food("a", 300.0, 20.0)).unwrap();
        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.goals, tracker.goals());
        assert_eq!(snapshot.history["2024-03-10"].foods.len(), 1);
    }

    #[test]
    fn test_apply_remote_replaces_state() {
        let mut tracker = tracker_on(storage(), 10);
        tracker.add_food(food("local", 50.0, 1.0)).unwrap();

        let mut history = HistoryData::new();
        history.insert(
            "2024-03-10".to_string(),
            DailyLog::from_foods("2024-03-10", vec![food("remote", 700.0, 30.0)]),
        );
        history.insert(
            "2024-03-09".to_string(),
            DailyLog::from_foods("2024-03-09", vec![food("old", 1.0, 1.0)]),
        );
        let remote = RemoteNutrition {
            goals: PartialGoals {
                calories: Some(1500.0),
                protein: None,
            },
            history,
        };

        tracker.apply_remote(remote).unwrap();
        assert_eq!(tracker.goals(), NutritionGoals::new(1500.0, 120.0));
        assert_eq!(tracker.today_foods()[0].id, "remote");
        assert_eq!(tracker.history().len(), 2);
        assert!(!tracker.is_dirty());
    }

    #[test]
    fn test_apply_remote_without_today_keeps_local_foods() {
        let mut tracker = tracker_on(storage(), 10);
        tracker.add_food(food("local", 50.0, 1.0)).unwrap();

        tracker.apply_remote(RemoteNutrition::default()).unwrap();
        assert_eq!(tracker.today_foods()[0].id, "local");
        assert_eq!(tracker.history()["2024-03-10"].foods.len(), 1);
        assert!(tracker.is_dirty());
    }
}
