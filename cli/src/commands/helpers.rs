use anyhow::{Context, Result, bail};
use chrono::{Duration, Local, NaiveDateTime, NaiveTime};
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use dcalt_core::day::{DAY_FORMAT, StartOfDay, parse_day as parse_date};
use dcalt_core::models::{DayRun, ServingRun};

pub(crate) fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Parse a logging time. Accepts "HH:MM" or "HH:MM:SS" within the current
/// logging day, or a full "YYYY-MM-DD HH:MM[:SS]" / "YYYY-MM-DDTHH:MM[:SS]".
pub(crate) fn parse_at(
    at: Option<&str>,
    start_of_day: StartOfDay,
    now: NaiveDateTime,
) -> Result<NaiveDateTime> {
    let Some(s) = at.map(str::trim) else {
        return Ok(now);
    };
    if s == "now" {
        return Ok(now);
    }
    if let Some(time) = parse_time(s) {
        return Ok(start_of_day.consumed_at(start_of_day.consumed_day(now), time));
    }
    for fmt in [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
    ] {
        if let Ok(at) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(at);
        }
    }
    bail!("Invalid time '{s}'. Use HH:MM, HH:MM:SS or YYYY-MM-DD HH:MM")
}

pub(crate) fn parse_time(s: &str) -> Option<NaiveTime> {
    ["%H:%M:%S", "%H:%M"]
        .into_iter()
        .find_map(|fmt| NaiveTime::parse_from_str(s.trim(), fmt).ok())
}

/// Resolve "today" and "yesterday" against the logging day containing `now`.
pub(crate) fn parse_day(day: &str, start_of_day: StartOfDay, now: NaiveDateTime) -> Result<String> {
    let date = match day {
        "today" => start_of_day.consumed_day(now),
        "yesterday" => start_of_day.consumed_day(now) - Duration::days(1),
        _ => parse_date(day)
            .with_context(|| format!("Use YYYY-MM-DD, today or yesterday instead of '{day}'"))?,
    };
    Ok(date.format(DAY_FORMAT).to_string())
}

pub(crate) fn print_serving_runs(runs: &[ServingRun]) {
    #[derive(Tabled)]
    struct RunRow {
        #[tabled(rename = "Time")]
        time: String,
        #[tabled(rename = "Serving")]
        serving: String,
        #[tabled(rename = "Category")]
        category: String,
        #[tabled(rename = "Calories")]
        calories: i16,
        #[tabled(rename = "Serving ID")]
        serving_id: String,
    }

    let rows: Vec<RunRow> = runs
        .iter()
        .map(|r| RunRow {
            time: r.consumed_time.clone(),
            serving: truncate(r.serving_name.as_deref().unwrap_or("?"), 30),
            category: truncate(r.category_name.as_deref().unwrap_or("-"), 20),
            calories: r.calories,
            serving_id: r.serving_archive_id.clone(),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::single(3)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn print_day_runs(days: &[DayRun], target_calories: i16) {
    #[derive(Tabled)]
    struct DayRow {
        #[tabled(rename = "Day")]
        day: String,
        #[tabled(rename = "Calories")]
        calories: i16,
        #[tabled(rename = "Remaining")]
        remaining: i32,
    }

    let rows: Vec<DayRow> = days
        .iter()
        .map(|d| DayRow {
            day: d.consumed_day.clone(),
            calories: d.calories,
            remaining: i32::from(target_calories) - i32::from(d.calories),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max.saturating_sub(3)).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}
