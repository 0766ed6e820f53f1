use anyhow::Result;

use dcalt_core::TrackerService;
use dcalt_core::day::StartOfDay;
use dcalt_core::settings::AppSettings;

fn print_settings(settings: &AppSettings, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(settings)?);
    } else {
        println!("Start of day:    {}", settings.start_of_day);
        println!("Target calories: {} kcal", settings.target_calories);
    }
    Ok(())
}

pub(crate) fn cmd_settings_show(svc: &TrackerService, json: bool) -> Result<()> {
    print_settings(&svc.settings(), json)
}

pub(crate) fn cmd_settings_set_start_of_day(
    svc: &TrackerService,
    time: &str,
    json: bool,
) -> Result<()> {
    let start_of_day: StartOfDay = time.parse()?;
    let settings = svc.set_start_of_day(start_of_day)?;
    print_settings(&settings, json)
}

pub(crate) fn cmd_settings_set_target(svc: &TrackerService, calories: i16, json: bool) -> Result<()> {
    let settings = svc.set_target_calories(calories)?;
    print_settings(&settings, json)
}
