//! Moves elapsed days from the main store into the archive.
//!
//! Each day is merged into the archive in one archive transaction and only
//! then released from main, so an interrupted run leaves main intact for that
//! day. Only the rows that were merged are deleted from main. Serving runs are matched by `(day, serving, consumed_time)`, which
//! makes repeated or concurrent runs converge on the same archive content.

use chrono::NaiveDate;
use serde::Serialize;

use crate::aggregate::recompute_total;
use crate::container::{Container, StoreKind};
use crate::db::Database;
use crate::day::DAY_FORMAT;
use crate::error::Result;
use crate::models::{DayRun, NewServingRun, RecordStatus, ServingRun, Visibility};

#[derive(Debug, Clone, Default, Serialize)]
pub struct TransferReport {
    pub days_transferred: Vec<DayTransfer>,
    pub days_failed: Vec<DayFailure>,
}

impl TransferReport {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.days_transferred.is_empty() && self.days_failed.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayTransfer {
    pub consumed_day: String,
    pub serving_runs_created: usize,
    pub serving_runs_merged: usize,
    /// Serving runs written to main while the day was being archived.
    pub serving_runs_left: usize,
    pub archive_calories: i16,
}

#[derive(Debug, Clone, Serialize)]
pub struct DayFailure {
    pub consumed_day: String,
    pub error: String,
}

/// Transfer every main-store day before `today` into the archive.
///
/// Fails only when a store is unavailable; per-day failures are logged,
/// recorded in the report and skipped.
pub fn transfer_to_archive(container: &Container, today: NaiveDate) -> Result<TransferReport> {
    let main = container.resolve_store(StoreKind::Main)?;
    let archive = container.resolve_store(StoreKind::Archive)?;
    let today_key = today.format(DAY_FORMAT).to_string();

    let elapsed = main.list_day_runs_before(&today_key, Visibility::IncludeRemoved)?;
    let mut report = TransferReport::default();
    if elapsed.is_empty() {
        tracing::debug!(today = %today_key, "Nothing to transfer");
        return Ok(report);
    }

    tracing::info!(days = elapsed.len(), today = %today_key, "Transferring days to archive");
    for day_run in elapsed {
        match transfer_day(main, archive, &day_run) {
            Ok(done) => report.days_transferred.push(done),
            Err(e) => {
                tracing::error!(
                    consumed_day = %day_run.consumed_day,
                    error = %e,
                    "Failed to transfer day; will retry on next run"
                );
                report.days_failed.push(DayFailure {
                    consumed_day: day_run.consumed_day,
                    error: e.to_string(),
                });
            }
        }
    }
    tracing::info!(
        transferred = report.days_transferred.len(),
        failed = report.days_failed.len(),
        "Transfer finished"
    );
    Ok(report)
}

fn transfer_day(main: &Database, archive: &Database, day_run: &DayRun) -> Result<DayTransfer> {
    let serving_runs = main.serving_runs_for_day(day_run.id, Visibility::IncludeRemoved)?;
    let mut done = merge_into_archive(main, archive, day_run, &serving_runs)?;
    done.serving_runs_left = release_from_main(main, day_run, &serving_runs)?;
    tracing::debug!(
        consumed_day = %done.consumed_day,
        created = done.serving_runs_created,
        merged = done.serving_runs_merged,
        left = done.serving_runs_left,
        "Transferred day"
    );
    Ok(done)
}

fn merge_into_archive(
    main: &Database,
    archive: &Database,
    day_run: &DayRun,
    serving_runs: &[ServingRun],
) -> Result<DayTransfer> {
    archive.in_transaction("archive day", |archive| {
        let target = archive.find_or_create_day_run(&day_run.consumed_day, day_run.status)?;
        if day_run.status.is_removed() && !target.status.is_removed() {
            archive.set_day_run_status(target.id, RecordStatus::Removed)?;
        }

        let mut created = 0;
        let mut merged = 0;
        for run in serving_runs {
            mirror_catalog(main, archive, &run.serving_archive_id)?;
            if merge_serving_run(archive, target.id, run)? {
                created += 1;
            } else {
                merged += 1;
            }
        }

        let archive_calories = recompute_total(archive, target.id)?;
        Ok(DayTransfer {
            consumed_day: day_run.consumed_day.clone(),
            serving_runs_created: created,
            serving_runs_merged: merged,
            serving_runs_left: 0,
            archive_calories,
        })
    })
}

/// Delete from main exactly what was merged into the archive.
///
/// A run logged or changed after the snapshot was read stays in main, and so
/// does its day, for the next transfer to pick up. Returns how many serving
/// runs the day still holds.
fn release_from_main(main: &Database, day_run: &DayRun, merged: &[ServingRun]) -> Result<usize> {
    main.in_transaction("remove transferred day", |main| {
        for run in merged {
            match main.get_serving_run(run.id) {
                Ok(current) if current.status == run.status => {
                    main.delete_serving_run(run.id)?;
                }
                Ok(_) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }

        let current = match main.get_day_run(day_run.id) {
            Ok(current) => current,
            Err(e) if e.is_not_found() => return Ok(0),
            Err(e) => return Err(e),
        };
        let left = main
            .serving_runs_for_day(day_run.id, Visibility::IncludeRemoved)?
            .len();
        if left == 0 && current.status == day_run.status {
            main.delete_day_run(day_run.id)?;
        } else {
            recompute_total(main, day_run.id)?;
        }
        Ok(left)
    })
}

/// Copy `run` under `target_day_id` unless the archive already holds it.
/// Returns whether a row was created.
fn merge_serving_run(archive: &Database, target_day_id: i64, run: &ServingRun) -> Result<bool> {
    let existing = archive.find_serving_run(
        target_day_id,
        &run.serving_archive_id,
        &run.consumed_time,
        Visibility::IncludeRemoved,
    )?;
    match existing {
        Some(existing) => {
            if run.status.is_removed() && !existing.status.is_removed() {
                archive.set_serving_run_status(existing.id, RecordStatus::Removed)?;
            }
            Ok(false)
        }
        None => {
            archive.insert_serving_run(&NewServingRun {
                day_run_id: target_day_id,
                serving_archive_id: run.serving_archive_id.clone(),
                consumed_time: run.consumed_time.clone(),
                calories: run.calories,
                status: run.status,
            })?;
            Ok(true)
        }
    }
}

/// Ensure the archive has the serving (and its category) a run refers to,
/// copying them from main by stable id.
fn mirror_catalog(main: &Database, archive: &Database, serving_archive_id: &str) -> Result<()> {
    if archive.get_serving_by_archive_id(serving_archive_id)?.is_some() {
        return Ok(());
    }
    let Some(serving) = main.get_serving_by_archive_id(serving_archive_id)? else {
        tracing::warn!(
            serving = serving_archive_id,
            "Serving missing from both catalogs; transferring run without it"
        );
        return Ok(());
    };

    let category = match archive.get_category_by_archive_id(&serving.category_archive_id)? {
        Some(category) => category,
        None => {
            let source = main.get_category(serving.category_id)?;
            archive.insert_category(&source.archive_id, &source.name, source.user_order)?
        }
    };
    archive.insert_serving(
        &serving.archive_id,
        category.id,
        &serving.name,
        serving.calories,
        serving.user_order,
    )?;
    Ok(())
}
