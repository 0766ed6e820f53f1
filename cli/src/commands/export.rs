use anyhow::Result;
use std::path::Path;

use dcalt_core::TrackerService;

pub(crate) fn cmd_export(svc: &TrackerService, dir: &Path, json: bool) -> Result<()> {
    let summary = svc.export_csv(dir)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }
    for store in &summary.stores {
        println!(
            "{}: {} categories, {} servings, {} days, {} logged servings",
            store.store, store.categories, store.servings, store.day_runs, store.serving_runs
        );
    }
    println!("Wrote CSV files to {}", summary.directory.display());
    Ok(())
}
