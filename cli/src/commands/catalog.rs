use anyhow::{Result, bail};
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use dcalt_core::TrackerService;
use dcalt_core::models::{NewServing, Serving};

use super::helpers::truncate;

pub(crate) fn cmd_category_add(svc: &TrackerService, name: &str, json: bool) -> Result<()> {
    let category = svc.create_category(name)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&category)?);
    } else {
        println!("Created category '{}' ({})", category.name, category.archive_id);
    }
    Ok(())
}

pub(crate) fn cmd_category_list(svc: &TrackerService, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct CategoryRow {
        #[tabled(rename = "#")]
        order: i64,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Servings")]
        servings: usize,
        #[tabled(rename = "ID")]
        id: String,
    }

    let categories = svc.list_categories()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&categories)?);
        return Ok(());
    }
    if categories.is_empty() {
        eprintln!("No categories yet. Add one with: dcalt category add <name>");
        process::exit(2);
    }

    let servings = svc.list_servings(None)?;
    let rows: Vec<CategoryRow> = categories
        .iter()
        .map(|c| CategoryRow {
            order: c.user_order + 1,
            name: truncate(&c.name, 30),
            servings: servings
                .iter()
                .filter(|s| s.category_archive_id == c.archive_id)
                .count(),
            id: c.archive_id.clone(),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::single(2)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    Ok(())
}

pub(crate) fn cmd_category_rename(
    svc: &TrackerService,
    category: &str,
    name: &str,
    json: bool,
) -> Result<()> {
    let existing = svc.resolve_category(category)?;
    let renamed = svc.rename_category(&existing.archive_id, name)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&renamed)?);
    } else {
        println!("Renamed '{}' to '{}'", existing.name, renamed.name);
    }
    Ok(())
}

pub(crate) fn cmd_category_delete(svc: &TrackerService, category: &str, json: bool) -> Result<()> {
    let existing = svc.resolve_category(category)?;
    let servings = svc.list_servings(Some(&existing.archive_id))?.len();
    let deleted = svc.delete_category(&existing.archive_id)?;
    if !deleted {
        bail!("Category '{category}' not found");
    }
    if json {
        println!(
            "{}",
            serde_json::json!({ "deleted": existing.archive_id, "servings": servings })
        );
    } else {
        println!("Deleted category '{}' and {servings} serving(s)", existing.name);
    }
    Ok(())
}

pub(crate) fn cmd_serving_add(
    svc: &TrackerService,
    category: &str,
    name: &str,
    calories: i16,
    json: bool,
) -> Result<()> {
    let category = svc.resolve_category(category)?;
    let serving = svc.create_serving(&NewServing {
        category_archive_id: category.archive_id,
        name: name.to_string(),
        calories,
    })?;
    if json {
        println!("{}", serde_json::to_string_pretty(&serving)?);
    } else {
        println!(
            "Created serving '{}' ({} kcal) in '{}'",
            serving.name, serving.calories, category.name
        );
    }
    Ok(())
}

pub(crate) fn cmd_serving_list(
    svc: &TrackerService,
    category: Option<&str>,
    json: bool,
) -> Result<()> {
    let filter = category.map(|c| svc.resolve_category(c)).transpose()?;
    let servings = svc.list_servings(filter.as_ref().map(|c| c.archive_id.as_str()))?;
    if json {
        println!("{}", serde_json::to_string_pretty(&servings)?);
        return Ok(());
    }
    if servings.is_empty() {
        eprintln!("No servings found");
        process::exit(2);
    }
    let categories = svc.list_categories()?;
    print_serving_table(&servings, |s| {
        categories
            .iter()
            .find(|c| c.archive_id == s.category_archive_id)
            .map(|c| c.name.clone())
            .unwrap_or_default()
    });
    Ok(())
}

fn print_serving_table(servings: &[Serving], category_name: impl Fn(&Serving) -> String) {
    #[derive(Tabled)]
    struct ServingRow {
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Category")]
        category: String,
        #[tabled(rename = "Calories")]
        calories: i16,
        #[tabled(rename = "ID")]
        id: String,
    }

    let rows: Vec<ServingRow> = servings
        .iter()
        .map(|s| ServingRow {
            name: truncate(&s.name, 30),
            category: truncate(&category_name(s), 20),
            calories: s.calories,
            id: s.archive_id.clone(),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::single(2)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn cmd_serving_set_calories(
    svc: &TrackerService,
    serving: &str,
    calories: i16,
    json: bool,
) -> Result<()> {
    let existing = svc.resolve_serving(serving)?;
    let updated = svc.set_serving_calories(&existing.archive_id, calories)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&updated)?);
    } else {
        println!(
            "'{}': {} -> {} kcal (logged entries keep their calories)",
            updated.name, existing.calories, updated.calories
        );
    }
    Ok(())
}

pub(crate) fn cmd_serving_move(
    svc: &TrackerService,
    serving: &str,
    category: &str,
    json: bool,
) -> Result<()> {
    let existing = svc.resolve_serving(serving)?;
    let target = svc.resolve_category(category)?;
    let moved = svc.move_serving(&existing.archive_id, &target.archive_id)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&moved)?);
    } else {
        println!("Moved '{}' to '{}'", moved.name, target.name);
    }
    Ok(())
}

pub(crate) fn cmd_serving_delete(svc: &TrackerService, serving: &str, json: bool) -> Result<()> {
    let existing = svc.resolve_serving(serving)?;
    if !svc.delete_serving(&existing.archive_id)? {
        bail!("Serving '{serving}' not found");
    }
    if json {
        println!("{}", serde_json::json!({ "deleted": existing.archive_id }));
    } else {
        println!("Deleted serving '{}'", existing.name);
    }
    Ok(())
}
