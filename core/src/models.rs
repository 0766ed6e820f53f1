use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

/// Whether a log record is visible to the user.
///
/// Removed records stay in their store until an explicit clear, so the
/// removal survives transfer between stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    #[default]
    Active,
    Removed,
}

impl RecordStatus {
    #[must_use]
    pub fn is_removed(self) -> bool {
        self == RecordStatus::Removed
    }
}

impl ToSql for RecordStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(i64::from(self.is_removed())))
    }
}

impl FromSql for RecordStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        i64::column_result(value).map(|v| {
            if v == 0 {
                RecordStatus::Active
            } else {
                RecordStatus::Removed
            }
        })
    }
}

// --- Query scoping ---

/// Which records a listing or lookup may return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    ActiveOnly,
    IncludeRemoved,
}

impl Visibility {
    /// SQL predicate on the `user_removed` column of `alias`.
    ///
    /// Every query over day runs and serving runs goes through here.
    #[must_use]
    pub fn clause(self, alias: &str) -> String {
        match self {
            Visibility::ActiveOnly => format!("{alias}.user_removed = 0"),
            Visibility::IncludeRemoved => "1 = 1".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    #[must_use]
    pub fn sql(self) -> &'static str {
        match self {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        }
    }
}

// --- Catalog ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub archive_id: String,
    pub name: String,
    pub user_order: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Serving {
    pub id: i64,
    pub archive_id: String,
    pub category_id: i64,
    pub category_archive_id: String,
    pub name: String,
    /// Calories for one unit of this serving.
    pub calories: i16,
    pub user_order: i64,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewServing {
    pub category_archive_id: String,
    pub name: String,
    pub calories: i16,
}

// --- Log ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayRun {
    pub id: i64,
    pub uuid: String,
    /// Subjective day key, `YYYY-MM-DD`.
    pub consumed_day: String,
    pub calories: i16,
    pub status: RecordStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServingRun {
    pub id: i64,
    pub uuid: String,
    pub day_run_id: i64,
    pub serving_archive_id: String,
    /// Wall-clock time of logging, `HH:MM:SS`.
    pub consumed_time: String,
    /// Snapshot of the serving's calories when logged.
    pub calories: i16,
    pub status: RecordStatus,
    // Joined fields for display
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serving_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewServingRun {
    pub day_run_id: i64,
    pub serving_archive_id: String,
    pub consumed_time: String,
    pub calories: i16,
    pub status: RecordStatus,
}

/// A day run together with its visible serving runs.
#[derive(Debug, Clone, Serialize)]
pub struct DayDetail {
    pub day_run: DayRun,
    pub serving_runs: Vec<ServingRun>,
}

/// Sum calories in i32 and saturate into the stored i16 range.
#[must_use]
pub fn saturating_total<I: IntoIterator<Item = i16>>(calories: I) -> i16 {
    let sum: i32 = calories.into_iter().map(i32::from).sum();
    i16::try_from(sum).unwrap_or(if sum < 0 { i16::MIN } else { i16::MAX })
}

pub fn validate_name(name: &str) -> crate::error::Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(crate::error::Error::InvalidInput(
            "Name must not be empty".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

pub fn validate_calories(calories: i16) -> crate::error::Result<i16> {
    if calories < 0 {
        return Err(crate::error::Error::InvalidInput(format!(
            "Calories must be non-negative (got {calories})"
        )));
    }
    Ok(calories)
}
