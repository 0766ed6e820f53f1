use anyhow::{Result, bail};
use std::process;

use dcalt_core::TrackerService;
use dcalt_core::StoreKind;
use dcalt_core::removal::ClearMode;
use dcalt_core::transfer::TransferReport;

use super::helpers::{now, parse_day, print_day_runs, print_serving_runs};

pub(crate) async fn cmd_history(svc: &TrackerService, json: bool) -> Result<()> {
    // Elapsed days move to the archive before the archive is read.
    match svc.transfer_in_background(now()).await {
        Ok(report) => log_failures(&report),
        Err(e) => tracing::warn!(error = %e, "Archival transfer skipped"),
    }

    let days = svc.history()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&days)?);
        return Ok(());
    }
    if days.is_empty() {
        eprintln!("No archived days yet");
        process::exit(2);
    }
    print_day_runs(&days, svc.settings().target_calories);
    Ok(())
}

pub(crate) fn cmd_day(svc: &TrackerService, day: &str, store: StoreKind, json: bool) -> Result<()> {
    let day = parse_day(day, svc.settings().start_of_day, now())?;
    let detail = svc.day_detail(store, &day)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&detail)?);
        return Ok(());
    }
    let Some(detail) = detail else {
        eprintln!("No entries for {day} in the {store} store");
        process::exit(2);
    };

    println!("=== {day} ({store}) ===\n");
    print_serving_runs(&detail.serving_runs);
    println!("\n  TOTAL: {} kcal", detail.day_run.calories);
    Ok(())
}

pub(crate) fn cmd_transfer(svc: &TrackerService, json: bool) -> Result<()> {
    let report = svc.transfer(now())?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    if report.is_empty() {
        println!("Nothing to archive");
        return Ok(());
    }
    for day in &report.days_transferred {
        println!(
            "Archived {}: {} new, {} merged, {} kcal",
            day.consumed_day, day.serving_runs_created, day.serving_runs_merged, day.archive_calories
        );
        if day.serving_runs_left > 0 {
            println!(
                "  {} serving(s) changed while archiving; kept in main for the next transfer",
                day.serving_runs_left
            );
        }
    }
    log_failures(&report);
    if !report.days_failed.is_empty() {
        bail!(
            "{} day(s) could not be archived and were left in the main store",
            report.days_failed.len()
        );
    }
    Ok(())
}

fn log_failures(report: &TransferReport) {
    for failure in &report.days_failed {
        tracing::error!(day = %failure.consumed_day, error = %failure.error, "Day not archived");
    }
}

pub(crate) fn cmd_clear(svc: &TrackerService, yes: bool, catalog: bool, json: bool) -> Result<()> {
    if !yes {
        bail!("This deletes every logged day in both stores. Re-run with --yes to confirm");
    }
    let mode = if catalog {
        ClearMode::WithArchiveCatalog
    } else {
        ClearMode::LogOnly
    };
    let summary = svc.clear_history(mode)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "Deleted {} day(s) and {} logged serving(s)",
            summary.day_runs, summary.serving_runs
        );
        if catalog {
            println!(
                "Deleted {} archived category(ies) and {} archived serving(s)",
                summary.categories, summary.servings
            );
        }
    }
    Ok(())
}
