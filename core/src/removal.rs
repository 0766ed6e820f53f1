use serde::Serialize;

use crate::aggregate::recompute_day;
use crate::container::{Container, StoreKind};
use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{RecordStatus, Visibility};

/// Identifies one eating event independently of the store holding it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServingRunKey {
    pub serving_archive_id: String,
    pub consumed_day: String,
    pub consumed_time: String,
}

/// A day total after a mutation in one store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreTotal {
    pub store: StoreKind,
    pub calories: i16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearMode {
    /// Day runs and serving runs in both stores.
    LogOnly,
    /// Also the category and serving mirrors held by the archive.
    WithArchiveCatalog,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClearSummary {
    pub day_runs: usize,
    pub serving_runs: usize,
    pub categories: usize,
    pub servings: usize,
}

fn mounted_or_unavailable(container: &Container) -> Result<Vec<(StoreKind, &Database)>> {
    let stores: Vec<_> = container.mounted().collect();
    if stores.is_empty() {
        return Err(Error::StoreUnavailable(StoreKind::Main));
    }
    for kind in StoreKind::ALL {
        if !container.is_mounted(kind) {
            tracing::warn!(store = %kind, "Store not mounted; skipping");
        }
    }
    Ok(stores)
}

/// Mark the serving run matching `key` removed in every store that holds it,
/// re-totalling its day in the same transaction.
///
/// Returns the new day totals of the stores that were touched. Removing an
/// already removed run is a no-op that still reports the total.
pub fn soft_remove_serving_run(container: &Container, key: &ServingRunKey) -> Result<Vec<StoreTotal>> {
    let mut totals = Vec::new();
    let mut first_error = None;

    for (kind, db) in mounted_or_unavailable(container)? {
        let outcome = db.in_transaction("remove serving run", |db| {
            let Some(day_run) = db.find_day_run(&key.consumed_day, Visibility::IncludeRemoved)? else {
                return Ok(None);
            };
            let find = |visibility: Visibility| {
                db.find_serving_run(
                    day_run.id,
                    &key.serving_archive_id,
                    &key.consumed_time,
                    visibility,
                )
            };
            let run = match find(Visibility::ActiveOnly)? {
                Some(run) => Some(run),
                None => find(Visibility::IncludeRemoved)?,
            };
            let Some(run) = run else {
                return Ok(None);
            };
            if !run.status.is_removed() {
                db.set_serving_run_status(run.id, RecordStatus::Removed)?;
            }
            recompute_day(db, &key.consumed_day)
        });

        match outcome {
            Ok(Some(calories)) => totals.push(StoreTotal {
                store: kind,
                calories,
            }),
            Ok(None) => {}
            Err(e) => {
                tracing::error!(store = %kind, error = %e, "Failed to remove serving run");
                first_error = first_error.or(Some(e));
            }
        }
    }

    if let Some(e) = first_error {
        return Err(e);
    }
    if totals.is_empty() {
        return Err(Error::RecordNotFound(format!(
            "serving run {} at {} {}",
            key.serving_archive_id, key.consumed_day, key.consumed_time
        )));
    }
    Ok(totals)
}

/// Mark the day run for `consumed_day` removed in every store that holds it.
/// Its serving runs are left as they are.
pub fn soft_remove_day(container: &Container, consumed_day: &str) -> Result<Vec<StoreKind>> {
    let mut touched = Vec::new();
    let mut first_error = None;

    for (kind, db) in mounted_or_unavailable(container)? {
        let outcome = db.in_transaction("remove day run", |db| {
            match db.find_day_run(consumed_day, Visibility::IncludeRemoved)? {
                Some(day_run) => {
                    db.set_day_run_status(day_run.id, RecordStatus::Removed)?;
                    Ok(true)
                }
                None => Ok(false),
            }
        });
        match outcome {
            Ok(true) => touched.push(kind),
            Ok(false) => {}
            Err(e) => {
                tracing::error!(store = %kind, error = %e, "Failed to remove day run");
                first_error = first_error.or(Some(e));
            }
        }
    }

    if let Some(e) = first_error {
        return Err(e);
    }
    if touched.is_empty() {
        return Err(Error::RecordNotFound(format!("day run {consumed_day}")));
    }
    Ok(touched)
}

/// Physically delete all log records from both stores, regardless of date
/// or status.
///
/// Every mounted store is cleared in its own transaction. A store that fails
/// is logged and left as it was; the first failure is returned once the
/// other stores have been attempted.
pub fn hard_clear(container: &Container, mode: ClearMode) -> Result<ClearSummary> {
    let mut summary = ClearSummary::default();
    let mut first_error = None;

    for (kind, db) in mounted_or_unavailable(container)? {
        let outcome = db.in_transaction("clear history", |db| {
            let (day_runs, serving_runs) = db.clear_log()?;
            let (categories, servings) =
                if kind == StoreKind::Archive && mode == ClearMode::WithArchiveCatalog {
                    db.clear_catalog()?
                } else {
                    (0, 0)
                };
            Ok(ClearSummary {
                day_runs,
                serving_runs,
                categories,
                servings,
            })
        });
        let cleared = match outcome {
            Ok(cleared) => cleared,
            Err(e) => {
                tracing::error!(store = %kind, error = %e, "Failed to clear store");
                first_error = first_error.or(Some(e));
                continue;
            }
        };
        tracing::info!(
            store = %kind,
            day_runs = cleared.day_runs,
            serving_runs = cleared.serving_runs,
            "Cleared log records"
        );
        summary.day_runs += cleared.day_runs;
        summary.serving_runs += cleared.serving_runs;
        summary.categories += cleared.categories;
        summary.servings += cleared.servings;
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(summary),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::recompute_total;
    use crate::container::StoreLocation;
    use crate::models::{NewServing, NewServingRun, Serving, SortOrder};

    fn seed(db: &Database, serving_name: &str, calories: &[(i16, &str)]) -> Serving {
        let category = match db.list_categories().unwrap().into_iter().next() {
            Some(c) => c,
            None => db.create_category("Food").unwrap(),
        };
        let serving = db
            .create_serving(&NewServing {
                category_archive_id: category.archive_id,
                name: serving_name.to_string(),
                calories: calories.first().map_or(0, |c| c.0),
            })
            .unwrap();
        let day = db
            .find_or_create_day_run("2023-02-01", RecordStatus::Active)
            .unwrap();
        for (cal, time) in calories {
            db.insert_serving_run(&NewServingRun {
                day_run_id: day.id,
                serving_archive_id: serving.archive_id.clone(),
                consumed_time: (*time).to_string(),
                calories: *cal,
                status: RecordStatus::Active,
            })
            .unwrap();
        }
        recompute_total(db, day.id).unwrap();
        serving
    }

    fn key(serving: &Serving, time: &str) -> ServingRunKey {
        ServingRunKey {
            serving_archive_id: serving.archive_id.clone(),
            consumed_day: "2023-02-01".to_string(),
            consumed_time: time.to_string(),
        }
    }

    #[test]
    fn test_removal_recompute() {
        let container = Container::open_in_memory();
        let main = container.resolve_store(StoreKind::Main).unwrap();
        seed(main, "Banana", &[(120, "08:00:00")]);
        let steak = seed(main, "Steak", &[(450, "19:00:00")]);
        assert_eq!(
            main.find_day_run("2023-02-01", Visibility::ActiveOnly)
                .unwrap()
                .unwrap()
                .calories,
            570
        );

        let totals = soft_remove_serving_run(&container, &key(&steak, "19:00:00")).unwrap();
        assert_eq!(
            totals,
            vec![StoreTotal {
                store: StoreKind::Main,
                calories: 120
            }]
        );
        let day = main
            .find_day_run("2023-02-01", Visibility::ActiveOnly)
            .unwrap()
            .unwrap();
        assert_eq!(day.calories, 120);
    }

    #[test]
    fn test_removal_mirrors_both_stores() {
        let container = Container::open_in_memory();
        let main = container.resolve_store(StoreKind::Main).unwrap();
        let archive = container.resolve_store(StoreKind::Archive).unwrap();
        let banana = seed(main, "Banana", &[(120, "08:00:00")]);

        // same eating event already present in the archive
        let category = archive
            .insert_category("cat-archive", "Fruit", 0)
            .unwrap();
        archive
            .insert_serving(&banana.archive_id, category.id, "Banana", 120, 0)
            .unwrap();
        let archived_day = archive
            .find_or_create_day_run("2023-02-01", RecordStatus::Active)
            .unwrap();
        archive
            .insert_serving_run(&NewServingRun {
                day_run_id: archived_day.id,
                serving_archive_id: banana.archive_id.clone(),
                consumed_time: "08:00:00".to_string(),
                calories: 120,
                status: RecordStatus::Active,
            })
            .unwrap();
        recompute_total(archive, archived_day.id).unwrap();

        let totals = soft_remove_serving_run(&container, &key(&banana, "08:00:00")).unwrap();
        assert_eq!(totals.len(), 2);
        assert!(totals.iter().all(|t| t.calories == 0));

        for (_, db) in container.mounted() {
            let day = db
                .find_day_run("2023-02-01", Visibility::IncludeRemoved)
                .unwrap()
                .unwrap();
            assert!(db.serving_runs_for_day(day.id, Visibility::ActiveOnly).unwrap().is_empty());
            let hidden = db
                .serving_runs_for_day(day.id, Visibility::IncludeRemoved)
                .unwrap();
            assert_eq!(hidden.len(), 1);
            assert_eq!(hidden[0].status, RecordStatus::Removed);
        }
    }

    #[test]
    fn test_removal_is_repeatable() {
        let container = Container::open_in_memory();
        let main = container.resolve_store(StoreKind::Main).unwrap();
        let banana = seed(main, "Banana", &[(120, "08:00:00")]);
        soft_remove_serving_run(&container, &key(&banana, "08:00:00")).unwrap();
        let totals = soft_remove_serving_run(&container, &key(&banana, "08:00:00")).unwrap();
        assert_eq!(totals[0].calories, 0);
    }

    #[test]
    fn test_removal_of_unknown_run_is_not_found() {
        let container = Container::open_in_memory();
        let main = container.resolve_store(StoreKind::Main).unwrap();
        let banana = seed(main, "Banana", &[(120, "08:00:00")]);
        let err = soft_remove_serving_run(&container, &key(&banana, "09:00:00")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_removal_skips_unmounted_store() {
        let dir = tempfile::tempdir().unwrap();
        let container = Container::open(
            StoreLocation::File(dir.path().join("main.db")),
            StoreLocation::File(dir.path().join("missing").join("archive.db")),
        );
        let main = container.resolve_store(StoreKind::Main).unwrap();
        let banana = seed(main, "Banana", &[(120, "08:00:00"), (120, "12:00:00")]);
        let totals = soft_remove_serving_run(&container, &key(&banana, "08:00:00")).unwrap();
        assert_eq!(
            totals,
            vec![StoreTotal {
                store: StoreKind::Main,
                calories: 120
            }]
        );
    }

    #[test]
    fn test_soft_remove_day_keeps_children() {
        let container = Container::open_in_memory();
        let main = container.resolve_store(StoreKind::Main).unwrap();
        seed(main, "Banana", &[(120, "08:00:00")]);

        let touched = soft_remove_day(&container, "2023-02-01").unwrap();
        assert_eq!(touched, vec![StoreKind::Main]);
        assert!(main
            .list_day_runs(Visibility::ActiveOnly, SortOrder::Descending)
            .unwrap()
            .is_empty());
        let day = main
            .find_day_run("2023-02-01", Visibility::IncludeRemoved)
            .unwrap()
            .unwrap();
        assert_eq!(day.status, RecordStatus::Removed);
        assert_eq!(
            main.serving_runs_for_day(day.id, Visibility::ActiveOnly)
                .unwrap()
                .len(),
            1
        );

        assert!(soft_remove_day(&container, "1999-01-01").unwrap_err().is_not_found());
    }

    #[test]
    fn test_hard_clear_log_only() {
        let container = Container::open_in_memory();
        let main = container.resolve_store(StoreKind::Main).unwrap();
        let archive = container.resolve_store(StoreKind::Archive).unwrap();
        seed(main, "Banana", &[(120, "08:00:00"), (120, "09:00:00")]);
        seed(archive, "Steak", &[(450, "19:00:00")]);

        let summary = hard_clear(&container, ClearMode::LogOnly).unwrap();
        assert_eq!(summary.day_runs, 2);
        assert_eq!(summary.serving_runs, 3);
        assert_eq!(summary.categories, 0);

        for (_, db) in container.mounted() {
            assert!(db
                .list_day_runs(Visibility::IncludeRemoved, SortOrder::Ascending)
                .unwrap()
                .is_empty());
            assert!(db.list_serving_runs(Visibility::IncludeRemoved).unwrap().is_empty());
        }
        assert_eq!(main.list_servings(None).unwrap().len(), 1);
        assert_eq!(archive.list_servings(None).unwrap().len(), 1);
    }

    #[test]
    fn test_hard_clear_with_archive_catalog_keeps_main_catalog() {
        let container = Container::open_in_memory();
        let main = container.resolve_store(StoreKind::Main).unwrap();
        let archive = container.resolve_store(StoreKind::Archive).unwrap();
        seed(main, "Banana", &[(120, "08:00:00")]);
        seed(archive, "Steak", &[(450, "19:00:00")]);

        let summary = hard_clear(&container, ClearMode::WithArchiveCatalog).unwrap();
        assert_eq!(summary.categories, 1);
        assert_eq!(summary.servings, 1);
        assert_eq!(main.list_servings(None).unwrap().len(), 1);
        assert!(archive.list_categories().unwrap().is_empty());
    }

    #[test]
    fn test_hard_clear_continues_past_failing_store() {
        let container = Container::open_in_memory();
        let main = container.resolve_store(StoreKind::Main).unwrap();
        let archive = container.resolve_store(StoreKind::Archive).unwrap();
        seed(main, "Banana", &[(120, "08:00:00")]);
        seed(archive, "Steak", &[(450, "19:00:00")]);
        main.conn()
            .execute_batch(
                "CREATE TRIGGER keep_runs BEFORE DELETE ON serving_runs
                 BEGIN SELECT RAISE(ABORT, 'disk I/O error'); END;",
            )
            .unwrap();

        assert!(hard_clear(&container, ClearMode::LogOnly).is_err());

        // the failing store rolled back, the other one was still cleared
        assert_eq!(main.list_serving_runs(Visibility::IncludeRemoved).unwrap().len(), 1);
        assert!(archive
            .list_day_runs(Visibility::IncludeRemoved, SortOrder::Ascending)
            .unwrap()
            .is_empty());
        assert!(archive.list_serving_runs(Visibility::IncludeRemoved).unwrap().is_empty());
    }
}
