use anyhow::{Result, bail};
use std::process;

use dcalt_core::TrackerService;
use dcalt_core::day::TIME_FORMAT;
use dcalt_core::progress::SnapshotFile;
use dcalt_core::removal::ServingRunKey;

use super::helpers::{now, parse_at, parse_day, parse_time, print_serving_runs};

pub(crate) fn cmd_log(
    svc: &TrackerService,
    serving: &str,
    at: Option<&str>,
    json: bool,
) -> Result<()> {
    let serving = svc.resolve_serving(serving)?;
    let at = parse_at(at, svc.settings().start_of_day, now())?;
    let run = svc.log_serving(&serving.archive_id, at)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&run)?);
    } else {
        let (day, _) = svc.settings().start_of_day.split(at);
        println!(
            "Logged {} ({} kcal) at {} on {day}",
            serving.name, run.calories, run.consumed_time
        );
    }
    Ok(())
}

pub(crate) fn cmd_today(svc: &TrackerService, widget: &SnapshotFile, json: bool) -> Result<()> {
    let settings = svc.settings();
    let today = svc.today(now())?;
    let last_snapshot = widget.read().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Could not read progress snapshot");
        None
    });

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "target_calories": settings.target_calories,
                "today": today,
                "last_snapshot": last_snapshot,
            }))?
        );
        return Ok(());
    }

    let Some(today) = today else {
        eprintln!("Nothing logged today");
        process::exit(2);
    };

    println!("=== {} ===\n", today.day_run.consumed_day);
    print_serving_runs(&today.serving_runs);
    let total = today.day_run.calories;
    let target = settings.target_calories;
    let remaining = i32::from(target) - i32::from(total);
    println!("\n  TOTAL: {total} kcal");
    println!("  TARGET: {target} kcal");
    println!("  REMAINING: {remaining} kcal");
    if let Some(snapshot) = last_snapshot {
        println!(
            "  WIDGET: {} / {} kcal",
            snapshot.current_calories, snapshot.target_calories
        );
    }
    Ok(())
}

pub(crate) fn cmd_remove(
    svc: &TrackerService,
    serving: &str,
    day: &str,
    time: &str,
    json: bool,
) -> Result<()> {
    // Archived entries may point at servings no longer in the catalog.
    let serving_archive_id = svc
        .resolve_serving(serving)
        .map_or_else(|_| serving.to_string(), |s| s.archive_id);
    let key = ServingRunKey {
        serving_archive_id,
        consumed_day: parse_day(day, svc.settings().start_of_day, now())?,
        consumed_time: normalize_time(time)?,
    };
    let totals = svc.remove_serving_run(&key, now())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&totals)?);
    } else {
        for total in &totals {
            println!(
                "Removed from {} store; {} total is now {} kcal",
                total.store, key.consumed_day, total.calories
            );
        }
    }
    Ok(())
}

pub(crate) fn cmd_remove_day(svc: &TrackerService, day: &str, json: bool) -> Result<()> {
    let day = parse_day(day, svc.settings().start_of_day, now())?;
    let stores = svc.remove_day(&day, now())?;
    if json {
        println!("{}", serde_json::json!({ "day": day, "stores": stores }));
    } else {
        let names: Vec<&str> = stores.iter().map(|s| s.as_str()).collect();
        println!("Removed {day} from {}", names.join(" and "));
    }
    Ok(())
}

/// Accepts "HH:MM" or "HH:MM:SS" and returns the stored "HH:MM:SS" key.
fn normalize_time(time: &str) -> Result<String> {
    let Some(parsed) = parse_time(time) else {
        bail!("Invalid time '{}'. Use HH:MM or HH:MM:SS", time.trim());
    };
    Ok(parsed.format(TIME_FORMAT).to_string())
}
