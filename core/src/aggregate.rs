use chrono::NaiveDateTime;

use crate::container::StoreKind;
use crate::db::Database;
use crate::error::Result;
use crate::models::Visibility;
use crate::progress::{ProgressSink, ProgressSnapshot, notify};
use crate::settings::AppSettings;

/// Recompute a day run's total from its active serving runs in the same store
/// and write it back. Writes nothing when the stored total is already correct.
pub fn recompute_total(db: &Database, day_run_id: i64) -> Result<i16> {
    let day_run = db.get_day_run(day_run_id)?;
    let total = db.serving_run_calories(day_run_id, Visibility::ActiveOnly)?;
    if day_run.calories != total {
        db.set_day_run_calories(day_run_id, total)?;
    }
    tracing::debug!(
        consumed_day = %day_run.consumed_day,
        previous = day_run.calories,
        total,
        "Recomputed day total"
    );
    Ok(total)
}

/// Recompute the total of the store's day run for `consumed_day`, if one exists.
pub fn recompute_day(db: &Database, consumed_day: &str) -> Result<Option<i16>> {
    match db.find_day_run(consumed_day, Visibility::IncludeRemoved)? {
        Some(day_run) => recompute_total(db, day_run.id).map(Some),
        None => Ok(None),
    }
}

/// Push a progress snapshot when a main-store total for the subjective
/// today changed. Delivery failures are logged by `notify`.
pub fn publish_if_today(
    sink: Option<&dyn ProgressSink>,
    settings: &AppSettings,
    kind: StoreKind,
    consumed_day: &str,
    current_calories: i16,
    now: NaiveDateTime,
) -> bool {
    if kind != StoreKind::Main {
        return false;
    }
    let (today, _) = settings.start_of_day.split(now);
    if consumed_day != today {
        return false;
    }
    notify(
        sink,
        ProgressSnapshot {
            target_calories: settings.target_calories,
            current_calories,
            reload_timeline: true,
        },
    );
    true
}
