use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDateTime;

use crate::aggregate::{publish_if_today, recompute_total};
use crate::container::{Container, StoreKind, StoreLocation};
use crate::db::Database;
use crate::day::StartOfDay;
use crate::error::{Error, Result};
use crate::export::{self, ExportSummary};
use crate::models::{
    Category, DayDetail, DayRun, NewServing, NewServingRun, RecordStatus, Serving, ServingRun,
    SortOrder, Visibility,
};
use crate::progress::{ProgressSink, ProgressSnapshot, notify};
use crate::removal::{self, ClearMode, ClearSummary, ServingRunKey, StoreTotal};
use crate::settings::{AppSettings, validate_target_calories};
use crate::transfer::{TransferReport, transfer_to_archive};

/// Entry point for hosts: owns the store container and the registered
/// progress sink, and passes both explicitly into each operation.
pub struct TrackerService {
    container: Container,
    sink: Option<Arc<dyn ProgressSink>>,
}

impl TrackerService {
    #[must_use]
    pub fn new(container: Container) -> Self {
        Self {
            container,
            sink: None,
        }
    }

    #[must_use]
    pub fn open(main_path: &Path, archive_path: &Path) -> Self {
        Self::new(Container::open(
            StoreLocation::File(main_path.to_path_buf()),
            StoreLocation::File(archive_path.to_path_buf()),
        ))
    }

    #[must_use]
    pub fn new_in_memory() -> Self {
        Self::new(Container::open_in_memory())
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    #[must_use]
    pub fn container(&self) -> &Container {
        &self.container
    }

    fn main(&self) -> Result<&Database> {
        self.container.resolve_store(StoreKind::Main)
    }

    fn sink(&self) -> Option<&dyn ProgressSink> {
        self.sink.as_deref()
    }

    // --- Settings ---

    #[must_use]
    pub fn settings(&self) -> AppSettings {
        AppSettings::load_or_default(&self.container)
    }

    pub fn set_start_of_day(&self, start_of_day: StartOfDay) -> Result<AppSettings> {
        let settings = AppSettings {
            start_of_day,
            ..self.settings()
        };
        settings.save(self.main()?)?;
        Ok(settings)
    }

    pub fn set_target_calories(&self, calories: i16) -> Result<AppSettings> {
        let settings = AppSettings {
            target_calories: validate_target_calories(calories)?,
            ..self.settings()
        };
        settings.save(self.main()?)?;
        Ok(settings)
    }

    // --- Catalog ---

    pub fn create_category(&self, name: &str) -> Result<Category> {
        self.main()?.create_category(name)
    }

    pub fn list_categories(&self) -> Result<Vec<Category>> {
        self.main()?.list_categories()
    }

    /// Find a main-store category by archive id, then by case-insensitive name.
    pub fn resolve_category(&self, query: &str) -> Result<Category> {
        let db = self.main()?;
        if let Some(category) = db.get_category_by_archive_id(query)? {
            return Ok(category);
        }
        db.list_categories()?
            .into_iter()
            .find(|c| c.name.eq_ignore_ascii_case(query.trim()))
            .ok_or_else(|| Error::RecordNotFound(format!("category '{query}'")))
    }

    pub fn rename_category(&self, archive_id: &str, name: &str) -> Result<Category> {
        self.main()?.rename_category(archive_id, name)
    }

    /// Deletes the category and its servings from the main store only.
    pub fn delete_category(&self, archive_id: &str) -> Result<bool> {
        self.main()?.delete_category(archive_id)
    }

    pub fn create_serving(&self, serving: &NewServing) -> Result<Serving> {
        self.main()?.create_serving(serving)
    }

    pub fn list_servings(&self, category_archive_id: Option<&str>) -> Result<Vec<Serving>> {
        self.main()?.list_servings(category_archive_id)
    }

    /// Find a main-store serving by archive id, then by case-insensitive name.
    pub fn resolve_serving(&self, query: &str) -> Result<Serving> {
        let db = self.main()?;
        if let Some(serving) = db.get_serving_by_archive_id(query)? {
            return Ok(serving);
        }
        db.list_servings(None)?
            .into_iter()
            .find(|s| s.name.eq_ignore_ascii_case(query.trim()))
            .ok_or_else(|| Error::RecordNotFound(format!("serving '{query}'")))
    }

    pub fn set_serving_calories(&self, archive_id: &str, calories: i16) -> Result<Serving> {
        self.main()?.set_serving_calories(archive_id, calories)
    }

    pub fn move_serving(&self, archive_id: &str, category_archive_id: &str) -> Result<Serving> {
        self.main()?.move_serving(archive_id, category_archive_id)
    }

    pub fn delete_serving(&self, archive_id: &str) -> Result<bool> {
        self.main()?.delete_serving(archive_id)
    }

    // --- Log ---

    /// Record one eating event of `serving_archive_id` at wall-clock `at`.
    ///
    /// The serving's current calories are copied onto the new run. A removed
    /// day run for the same subjective day is reactivated.
    pub fn log_serving(&self, serving_archive_id: &str, at: NaiveDateTime) -> Result<ServingRun> {
        let settings = self.settings();
        let (consumed_day, consumed_time) = settings.start_of_day.split(at);
        let db = self.main()?;

        let (run, total) = db.in_transaction("log serving", |db| {
            let serving = db
                .get_serving_by_archive_id(serving_archive_id)?
                .ok_or_else(|| Error::RecordNotFound(format!("serving {serving_archive_id}")))?;
            let day_run = db.find_or_create_day_run(&consumed_day, RecordStatus::Active)?;
            if day_run.status.is_removed() {
                db.set_day_run_status(day_run.id, RecordStatus::Active)?;
            }
            let run = db.insert_serving_run(&NewServingRun {
                day_run_id: day_run.id,
                serving_archive_id: serving.archive_id,
                consumed_time: consumed_time.clone(),
                calories: serving.calories,
                status: RecordStatus::Active,
            })?;
            let total = recompute_total(db, day_run.id)?;
            Ok((run, total))
        })?;

        tracing::info!(
            consumed_day = %consumed_day,
            consumed_time = %run.consumed_time,
            calories = run.calories,
            total,
            "Logged serving"
        );
        publish_if_today(self.sink(), &settings, StoreKind::Main, &consumed_day, total, at);
        Ok(run)
    }

    /// The main store's day run for the subjective day containing `now`.
    pub fn today(&self, now: NaiveDateTime) -> Result<Option<DayDetail>> {
        let (consumed_day, _) = self.settings().start_of_day.split(now);
        self.day_detail(StoreKind::Main, &consumed_day)
    }

    /// Archived days, newest first.
    pub fn history(&self) -> Result<Vec<DayRun>> {
        self.container
            .resolve_store(StoreKind::Archive)?
            .list_day_runs(Visibility::ActiveOnly, SortOrder::Descending)
    }

    pub fn day_detail(&self, kind: StoreKind, consumed_day: &str) -> Result<Option<DayDetail>> {
        let db = self.container.resolve_store(kind)?;
        let Some(day_run) = db.find_day_run(consumed_day, Visibility::ActiveOnly)? else {
            return Ok(None);
        };
        let serving_runs = db.serving_runs_for_day(day_run.id, Visibility::ActiveOnly)?;
        Ok(Some(DayDetail {
            day_run,
            serving_runs,
        }))
    }

    // --- Archival ---

    pub fn transfer(&self, now: NaiveDateTime) -> Result<TransferReport> {
        let today = self.settings().start_of_day.consumed_day(now);
        transfer_to_archive(&self.container, today)
    }

    /// Run the archival transfer on a background container.
    pub async fn transfer_in_background(&self, now: NaiveDateTime) -> Result<TransferReport> {
        let today = self.settings().start_of_day.consumed_day(now);
        self.container
            .perform_background_task(move |background| transfer_to_archive(background, today))
            .await
    }

    // --- Removal ---

    /// Soft-remove one eating event from every store holding it.
    pub fn remove_serving_run(&self, key: &ServingRunKey, now: NaiveDateTime) -> Result<Vec<StoreTotal>> {
        let totals = removal::soft_remove_serving_run(&self.container, key)?;
        let settings = self.settings();
        for total in &totals {
            publish_if_today(
                self.sink(),
                &settings,
                total.store,
                &key.consumed_day,
                total.calories,
                now,
            );
        }
        Ok(totals)
    }

    pub fn remove_day(&self, consumed_day: &str, now: NaiveDateTime) -> Result<Vec<StoreKind>> {
        let stores = removal::soft_remove_day(&self.container, consumed_day)?;
        if stores.contains(&StoreKind::Main) {
            publish_if_today(self.sink(), &self.settings(), StoreKind::Main, consumed_day, 0, now);
        }
        Ok(stores)
    }

    /// Delete all log records from both stores.
    pub fn clear_history(&self, mode: ClearMode) -> Result<ClearSummary> {
        let summary = removal::hard_clear(&self.container, mode)?;
        let settings = self.settings();
        notify(
            self.sink(),
            ProgressSnapshot {
                target_calories: settings.target_calories,
                current_calories: 0,
                reload_timeline: true,
            },
        );
        Ok(summary)
    }

    pub fn export_csv(&self, dir: &Path) -> Result<ExportSummary> {
        export::export_csv(&self.container, dir)
    }
}
