use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::container::{Container, StoreKind};
use crate::db::Database;
use crate::error::Result;
use crate::models::{RecordStatus, SortOrder, Visibility};

#[derive(Debug, Serialize)]
struct CategoryRow<'a> {
    archive_id: &'a str,
    name: &'a str,
    user_order: i64,
    created_at: &'a str,
}

#[derive(Debug, Serialize)]
struct ServingRow<'a> {
    archive_id: &'a str,
    category_archive_id: &'a str,
    name: &'a str,
    calories: i16,
    user_order: i64,
    created_at: &'a str,
}

#[derive(Debug, Serialize)]
struct DayRunRow<'a> {
    uuid: &'a str,
    consumed_day: &'a str,
    calories: i16,
    status: RecordStatus,
}

#[derive(Debug, Serialize)]
struct ServingRunRow<'a> {
    uuid: &'a str,
    consumed_day: &'a str,
    consumed_time: &'a str,
    serving_archive_id: &'a str,
    serving_name: &'a str,
    calories: i16,
    status: RecordStatus,
}

/// Row counts written for one store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreExport {
    pub store: StoreKind,
    pub categories: usize,
    pub servings: usize,
    pub day_runs: usize,
    pub serving_runs: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ExportSummary {
    pub directory: PathBuf,
    pub stores: Vec<StoreExport>,
}

/// Write every mounted store's records, removed ones included, as CSV files
/// named `<store>-<table>.csv` under `dir`.
pub fn export_csv(container: &Container, dir: &Path) -> Result<ExportSummary> {
    std::fs::create_dir_all(dir)?;
    let mut summary = ExportSummary {
        directory: dir.to_path_buf(),
        stores: Vec::new(),
    };
    for (kind, db) in container.mounted() {
        let counts = export_store(kind, db, dir)?;
        tracing::info!(
            store = %kind,
            day_runs = counts.day_runs,
            serving_runs = counts.serving_runs,
            "Exported store"
        );
        summary.stores.push(counts);
    }
    Ok(summary)
}

fn export_store(kind: StoreKind, db: &Database, dir: &Path) -> Result<StoreExport> {
    let path = |table: &str| dir.join(format!("{kind}-{table}.csv"));

    let categories = db.list_categories()?;
    let mut wtr = csv::Writer::from_path(path("categories"))?;
    for c in &categories {
        wtr.serialize(CategoryRow {
            archive_id: &c.archive_id,
            name: &c.name,
            user_order: c.user_order,
            created_at: &c.created_at,
        })?;
    }
    wtr.flush()?;

    let servings = db.list_servings(None)?;
    let mut wtr = csv::Writer::from_path(path("servings"))?;
    for s in &servings {
        wtr.serialize(ServingRow {
            archive_id: &s.archive_id,
            category_archive_id: &s.category_archive_id,
            name: &s.name,
            calories: s.calories,
            user_order: s.user_order,
            created_at: &s.created_at,
        })?;
    }
    wtr.flush()?;

    let day_runs = db.list_day_runs(Visibility::IncludeRemoved, SortOrder::Ascending)?;
    let mut wtr = csv::Writer::from_path(path("dayruns"))?;
    for d in &day_runs {
        wtr.serialize(DayRunRow {
            uuid: &d.uuid,
            consumed_day: &d.consumed_day,
            calories: d.calories,
            status: d.status,
        })?;
    }
    wtr.flush()?;

    let days: HashMap<i64, &str> = day_runs
        .iter()
        .map(|d| (d.id, d.consumed_day.as_str()))
        .collect();
    let serving_runs = db.list_serving_runs(Visibility::IncludeRemoved)?;
    let mut wtr = csv::Writer::from_path(path("servingruns"))?;
    for r in &serving_runs {
        wtr.serialize(ServingRunRow {
            uuid: &r.uuid,
            consumed_day: days.get(&r.day_run_id).copied().unwrap_or_default(),
            consumed_time: &r.consumed_time,
            serving_archive_id: &r.serving_archive_id,
            serving_name: r.serving_name.as_deref().unwrap_or_default(),
            calories: r.calories,
            status: r.status,
        })?;
    }
    wtr.flush()?;

    Ok(StoreExport {
        store: kind,
        categories: categories.len(),
        servings: servings.len(),
        day_runs: day_runs.len(),
        serving_runs: serving_runs.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewServing, NewServingRun};

    #[test]
    fn test_export_writes_all_tables_with_status() {
        let container = Container::open_in_memory();
        let main = container.resolve_store(StoreKind::Main).unwrap();
        let category = main.create_category("Fruit").unwrap();
        let serving = main
            .create_serving(&NewServing {
                category_archive_id: category.archive_id,
                name: "Banana".to_string(),
                calories: 120,
            })
            .unwrap();
        let day = main
            .find_or_create_day_run("2023-02-01", RecordStatus::Active)
            .unwrap();
        for (time, status) in [("08:00:00", RecordStatus::Active), ("09:00:00", RecordStatus::Removed)] {
            main.insert_serving_run(&NewServingRun {
                day_run_id: day.id,
                serving_archive_id: serving.archive_id.clone(),
                consumed_time: time.to_string(),
                calories: 120,
                status,
            })
            .unwrap();
        }

        let dir = tempfile::tempdir().unwrap();
        let summary = export_csv(&container, dir.path()).unwrap();
        assert_eq!(summary.stores.len(), 2);
        assert_eq!(
            summary.stores[0],
            StoreExport {
                store: StoreKind::Main,
                categories: 1,
                servings: 1,
                day_runs: 1,
                serving_runs: 2,
            }
        );
        assert_eq!(summary.stores[1].serving_runs, 0);

        let runs = std::fs::read_to_string(dir.path().join("main-servingruns.csv")).unwrap();
        let mut lines = runs.lines();
        assert_eq!(
            lines.next().unwrap(),
            "uuid,consumed_day,consumed_time,serving_archive_id,serving_name,calories,status"
        );
        let rows: Vec<&str> = lines.collect();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].contains(",2023-02-01,08:00:00,"));
        assert!(rows[0].ends_with(",Banana,120,active"));
        assert!(rows[1].ends_with(",Banana,120,removed"));

        assert!(dir.path().join("archive-categories.csv").exists());
        assert!(dir.path().join("archive-dayruns.csv").exists());
    }

    #[test]
    fn test_export_creates_missing_directory() {
        let container = Container::open_in_memory();
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested").join("out");
        let summary = export_csv(&container, &target).unwrap();
        assert_eq!(summary.directory, target);
        assert!(target.join("main-servings.csv").exists());
    }
}
