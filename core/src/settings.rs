use serde::Serialize;

use crate::container::{Container, StoreKind};
use crate::db::Database;
use crate::day::StartOfDay;
use crate::error::{Error, Result};

pub const START_OF_DAY_KEY: &str = "start_of_day";
pub const TARGET_CALORIES_KEY: &str = "target_calories";

pub const DEFAULT_TARGET_CALORIES: i16 = 2000;

/// User settings consumed by the day-boundary rule and progress snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AppSettings {
    pub start_of_day: StartOfDay,
    pub target_calories: i16,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            start_of_day: StartOfDay::MIDNIGHT,
            target_calories: DEFAULT_TARGET_CALORIES,
        }
    }
}

impl AppSettings {
    /// Read both settings from `db`. Fails with `ConfigurationMissing` when
    /// either is absent or unreadable.
    pub fn load(db: &Database) -> Result<Self> {
        let start_of_day = db
            .get_setting(START_OF_DAY_KEY)?
            .ok_or_else(|| Error::ConfigurationMissing(START_OF_DAY_KEY.to_string()))?
            .parse::<StartOfDay>()
            .map_err(|e| Error::ConfigurationMissing(format!("{START_OF_DAY_KEY}: {e}")))?;
        let target_calories = db
            .get_setting(TARGET_CALORIES_KEY)?
            .ok_or_else(|| Error::ConfigurationMissing(TARGET_CALORIES_KEY.to_string()))?
            .trim()
            .parse::<i16>()
            .map_err(|e| Error::ConfigurationMissing(format!("{TARGET_CALORIES_KEY}: {e}")))?;
        Ok(Self {
            start_of_day,
            target_calories,
        })
    }

    /// Settings from the main store, or defaults when they cannot be read.
    #[must_use]
    pub fn load_or_default(container: &Container) -> Self {
        let loaded = container
            .resolve_store(StoreKind::Main)
            .and_then(Self::load);
        match loaded {
            Ok(settings) => settings,
            Err(e) => {
                let defaults = Self::default();
                tracing::warn!(
                    error = %e,
                    start_of_day = %defaults.start_of_day,
                    target_calories = defaults.target_calories,
                    "Using default settings"
                );
                defaults
            }
        }
    }

    /// Persist both values, so later loads do not fall back.
    pub fn save(&self, db: &Database) -> Result<()> {
        db.in_transaction("save settings", |db| {
            db.set_setting(START_OF_DAY_KEY, &self.start_of_day.to_string())?;
            db.set_setting(TARGET_CALORIES_KEY, &self.target_calories.to_string())
        })
    }
}

pub fn validate_target_calories(calories: i16) -> Result<i16> {
    if calories <= 0 {
        return Err(Error::InvalidInput(format!(
            "Target calories must be positive (got {calories})"
        )));
    }
    Ok(calories)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_is_configuration_missing() {
        let db = Database::open_in_memory().unwrap();
        let err = AppSettings::load(&db).unwrap_err();
        assert!(matches!(err, Error::ConfigurationMissing(_)));
    }

    #[test]
    fn test_save_then_load() {
        let db = Database::open_in_memory().unwrap();
        let settings = AppSettings {
            start_of_day: StartOfDay::new(3, 0).unwrap(),
            target_calories: 1800,
        };
        settings.save(&db).unwrap();
        assert_eq!(AppSettings::load(&db).unwrap(), settings);
    }

    #[test]
    fn test_unparseable_value_is_configuration_missing() {
        let db = Database::open_in_memory().unwrap();
        db.set_setting(START_OF_DAY_KEY, "later").unwrap();
        db.set_setting(TARGET_CALORIES_KEY, "2000").unwrap();
        let err = AppSettings::load(&db).unwrap_err();
        assert!(matches!(err, Error::ConfigurationMissing(_)));
    }

    #[test]
    fn test_load_or_default_falls_back() {
        let container = Container::open_in_memory();
        assert_eq!(AppSettings::load_or_default(&container), AppSettings::default());

        let main = container.resolve_store(StoreKind::Main).unwrap();
        main.set_setting(START_OF_DAY_KEY, "04:15").unwrap();
        main.set_setting(TARGET_CALORIES_KEY, "2200").unwrap();
        let loaded = AppSettings::load_or_default(&container);
        assert_eq!(loaded.start_of_day.to_string(), "04:15");
        assert_eq!(loaded.target_calories, 2200);
    }

    #[test]
    fn test_validate_target_calories() {
        assert!(validate_target_calories(0).is_err());
        assert_eq!(validate_target_calories(2000).unwrap(), 2000);
    }
}
