use std::path::Path;
use std::time::Duration;

use chrono::Local;
use rusqlite::{Connection, OptionalExtension, Params, Transaction, TransactionBehavior, params};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{
    Category, DayRun, NewServing, NewServingRun, RecordStatus, Serving, ServingRun, SortOrder,
    Visibility, saturating_total, validate_calories, validate_name,
};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// One physical store. Main and archive share this schema.
pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Open a named in-memory store that other connections in this process
    /// can attach to while at least one connection stays open.
    pub fn open_shared_memory(name: &str) -> Result<Self> {
        let conn = Connection::open(format!("file:{name}?mode=memory&cache=shared"))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::open_shared_memory(&format!("dcalt-{}", Uuid::new_v4()))
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.pragma_update(None, "foreign_keys", true)?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS categories (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    archive_id TEXT NOT NULL UNIQUE,
                    name TEXT NOT NULL,
                    user_order INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS servings (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    archive_id TEXT NOT NULL UNIQUE,
                    category_id INTEGER NOT NULL REFERENCES categories(id) ON DELETE CASCADE,
                    name TEXT NOT NULL,
                    calories INTEGER NOT NULL DEFAULT 0,
                    user_order INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS day_runs (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT NOT NULL UNIQUE,
                    consumed_day TEXT NOT NULL UNIQUE,
                    calories INTEGER NOT NULL DEFAULT 0,
                    user_removed INTEGER NOT NULL DEFAULT 0
                );

                CREATE TABLE IF NOT EXISTS serving_runs (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT NOT NULL UNIQUE,
                    day_run_id INTEGER NOT NULL REFERENCES day_runs(id) ON DELETE CASCADE,
                    serving_archive_id TEXT NOT NULL,
                    consumed_time TEXT NOT NULL,
                    calories INTEGER NOT NULL DEFAULT 0,
                    user_removed INTEGER NOT NULL DEFAULT 0
                );

                CREATE INDEX IF NOT EXISTS idx_servings_category ON servings(category_id);
                CREATE INDEX IF NOT EXISTS idx_serving_runs_day ON serving_runs(day_run_id);
                CREATE INDEX IF NOT EXISTS idx_serving_runs_key
                    ON serving_runs(day_run_id, serving_archive_id, consumed_time);

                CREATE TABLE IF NOT EXISTS user_settings (
                    key TEXT PRIMARY KEY NOT NULL,
                    value TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                PRAGMA user_version = 1;",
            )?;
        }

        Ok(())
    }

    /// Run `f` inside one store-local transaction.
    ///
    /// Takes the write lock up front, waiting out the busy timeout if another
    /// connection holds it. Rolls back when `f` fails; a failed commit is
    /// reported as a persistence write failure for `operation`.
    pub fn in_transaction<T>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&Self) -> Result<T>,
    ) -> Result<T> {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)
            .map_err(|e| Error::write(operation, e))?;
        let out = f(self)?;
        tx.commit().map_err(|e| Error::write(operation, e))?;
        Ok(out)
    }

    #[cfg(test)]
    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    fn write<P: Params>(&self, operation: &'static str, sql: &str, params: P) -> Result<usize> {
        self.conn
            .execute(sql, params)
            .map_err(|e| Error::write(operation, e))
    }

    // --- Row mapping helpers ---

    fn category_from_row(row: &rusqlite::Row) -> rusqlite::Result<Category> {
        Ok(Category {
            id: row.get(0)?,
            archive_id: row.get(1)?,
            name: row.get(2)?,
            user_order: row.get(3)?,
            created_at: row.get(4)?,
        })
    }

    // Expects columns:
    // 0: s.id, 1: s.archive_id, 2: s.category_id, 3: c.archive_id, 4: s.name,
    // 5: s.calories, 6: s.user_order, 7: s.created_at
    fn serving_from_row(row: &rusqlite::Row) -> rusqlite::Result<Serving> {
        Ok(Serving {
            id: row.get(0)?,
            archive_id: row.get(1)?,
            category_id: row.get(2)?,
            category_archive_id: row.get(3)?,
            name: row.get(4)?,
            calories: row.get(5)?,
            user_order: row.get(6)?,
            created_at: row.get(7)?,
        })
    }

    fn day_run_from_row(row: &rusqlite::Row) -> rusqlite::Result<DayRun> {
        Ok(DayRun {
            id: row.get(0)?,
            uuid: row.get(1)?,
            consumed_day: row.get(2)?,
            calories: row.get(3)?,
            status: row.get(4)?,
        })
    }

    // Expects columns:
    // 0: sr.id, 1: sr.uuid, 2: sr.day_run_id, 3: sr.serving_archive_id,
    // 4: sr.consumed_time, 5: sr.calories, 6: sr.user_removed,
    // 7: s.name, 8: c.name
    fn serving_run_from_row(row: &rusqlite::Row) -> rusqlite::Result<ServingRun> {
        Ok(ServingRun {
            id: row.get(0)?,
            uuid: row.get(1)?,
            day_run_id: row.get(2)?,
            serving_archive_id: row.get(3)?,
            consumed_time: row.get(4)?,
            calories: row.get(5)?,
            status: row.get(6)?,
            serving_name: row.get(7)?,
            category_name: row.get(8)?,
        })
    }

    // --- Categories ---

    pub fn insert_category(&self, archive_id: &str, name: &str, user_order: i64) -> Result<Category> {
        let now = Local::now().to_rfc3339();
        self.write(
            "insert category",
            "INSERT INTO categories (archive_id, name, user_order, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![archive_id, name, user_order, now],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_category(id)
    }

    pub fn create_category(&self, name: &str) -> Result<Category> {
        let name = validate_name(name)?;
        let next_order: i64 = self.conn.query_row(
            "SELECT COALESCE(MAX(user_order), -1) + 1 FROM categories",
            [],
            |row| row.get(0),
        )?;
        self.insert_category(&Uuid::new_v4().to_string(), &name, next_order)
    }

    pub fn get_category(&self, id: i64) -> Result<Category> {
        self.conn
            .query_row(
                "SELECT id, archive_id, name, user_order, created_at FROM categories WHERE id = ?1",
                params![id],
                Self::category_from_row,
            )
            .optional()?
            .ok_or_else(|| Error::RecordNotFound(format!("category {id}")))
    }

    pub fn get_category_by_archive_id(&self, archive_id: &str) -> Result<Option<Category>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, archive_id, name, user_order, created_at FROM categories
                 WHERE archive_id = ?1",
                params![archive_id],
                Self::category_from_row,
            )
            .optional()?)
    }

    pub fn list_categories(&self) -> Result<Vec<Category>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, archive_id, name, user_order, created_at FROM categories
             ORDER BY user_order, name",
        )?;
        let categories = stmt
            .query_map([], Self::category_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(categories)
    }

    pub fn rename_category(&self, archive_id: &str, name: &str) -> Result<Category> {
        let name = validate_name(name)?;
        let rows = self.write(
            "rename category",
            "UPDATE categories SET name = ?1 WHERE archive_id = ?2",
            params![name, archive_id],
        )?;
        if rows == 0 {
            return Err(Error::RecordNotFound(format!("category {archive_id}")));
        }
        self.get_category_by_archive_id(archive_id)?
            .ok_or_else(|| Error::RecordNotFound(format!("category {archive_id}")))
    }

    /// Deletes the category and, through the foreign key, its servings.
    pub fn delete_category(&self, archive_id: &str) -> Result<bool> {
        let rows = self.write(
            "delete category",
            "DELETE FROM categories WHERE archive_id = ?1",
            params![archive_id],
        )?;
        Ok(rows > 0)
    }

    // --- Servings ---

    const SERVING_COLUMNS: &'static str = "s.id, s.archive_id, s.category_id, c.archive_id, s.name,
         s.calories, s.user_order, s.created_at
         FROM servings s
         JOIN categories c ON s.category_id = c.id";

    pub fn insert_serving(
        &self,
        archive_id: &str,
        category_id: i64,
        name: &str,
        calories: i16,
        user_order: i64,
    ) -> Result<Serving> {
        let now = Local::now().to_rfc3339();
        self.write(
            "insert serving",
            "INSERT INTO servings (archive_id, category_id, name, calories, user_order, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![archive_id, category_id, name, calories, user_order, now],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_serving(id)
    }

    pub fn create_serving(&self, serving: &NewServing) -> Result<Serving> {
        let name = validate_name(&serving.name)?;
        let calories = validate_calories(serving.calories)?;
        let category = self
            .get_category_by_archive_id(&serving.category_archive_id)?
            .ok_or_else(|| {
                Error::RecordNotFound(format!("category {}", serving.category_archive_id))
            })?;
        let next_order: i64 = self.conn.query_row(
            "SELECT COALESCE(MAX(user_order), -1) + 1 FROM servings WHERE category_id = ?1",
            params![category.id],
            |row| row.get(0),
        )?;
        self.insert_serving(
            &Uuid::new_v4().to_string(),
            category.id,
            &name,
            calories,
            next_order,
        )
    }

    pub fn get_serving(&self, id: i64) -> Result<Serving> {
        self.conn
            .query_row(
                &format!("SELECT {} WHERE s.id = ?1", Self::SERVING_COLUMNS),
                params![id],
                Self::serving_from_row,
            )
            .optional()?
            .ok_or_else(|| Error::RecordNotFound(format!("serving {id}")))
    }

    pub fn get_serving_by_archive_id(&self, archive_id: &str) -> Result<Option<Serving>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {} WHERE s.archive_id = ?1", Self::SERVING_COLUMNS),
                params![archive_id],
                Self::serving_from_row,
            )
            .optional()?)
    }

    pub fn list_servings(&self, category_archive_id: Option<&str>) -> Result<Vec<Serving>> {
        let servings = if let Some(category) = category_archive_id {
            let mut stmt = self.conn.prepare(&format!(
                "SELECT {} WHERE c.archive_id = ?1 ORDER BY s.user_order, s.name",
                Self::SERVING_COLUMNS
            ))?;
            stmt.query_map(params![category], Self::serving_from_row)?
                .collect::<Result<Vec<_>, _>>()?
        } else {
            let mut stmt = self.conn.prepare(&format!(
                "SELECT {} ORDER BY c.user_order, s.user_order, s.name",
                Self::SERVING_COLUMNS
            ))?;
            stmt.query_map([], Self::serving_from_row)?
                .collect::<Result<Vec<_>, _>>()?
        };
        Ok(servings)
    }

    /// Changes calories for future logs only; serving runs keep their snapshot.
    pub fn set_serving_calories(&self, archive_id: &str, calories: i16) -> Result<Serving> {
        let calories = validate_calories(calories)?;
        let rows = self.write(
            "update serving calories",
            "UPDATE servings SET calories = ?1 WHERE archive_id = ?2",
            params![calories, archive_id],
        )?;
        if rows == 0 {
            return Err(Error::RecordNotFound(format!("serving {archive_id}")));
        }
        self.get_serving_by_archive_id(archive_id)?
            .ok_or_else(|| Error::RecordNotFound(format!("serving {archive_id}")))
    }

    pub fn move_serving(&self, archive_id: &str, category_archive_id: &str) -> Result<Serving> {
        let category = self
            .get_category_by_archive_id(category_archive_id)?
            .ok_or_else(|| Error::RecordNotFound(format!("category {category_archive_id}")))?;
        let rows = self.write(
            "move serving",
            "UPDATE servings SET category_id = ?1 WHERE archive_id = ?2",
            params![category.id, archive_id],
        )?;
        if rows == 0 {
            return Err(Error::RecordNotFound(format!("serving {archive_id}")));
        }
        self.get_serving_by_archive_id(archive_id)?
            .ok_or_else(|| Error::RecordNotFound(format!("serving {archive_id}")))
    }

    pub fn delete_serving(&self, archive_id: &str) -> Result<bool> {
        let rows = self.write(
            "delete serving",
            "DELETE FROM servings WHERE archive_id = ?1",
            params![archive_id],
        )?;
        Ok(rows > 0)
    }

    // --- Day runs ---

    pub fn get_day_run(&self, id: i64) -> Result<DayRun> {
        self.conn
            .query_row(
                "SELECT id, uuid, consumed_day, calories, user_removed FROM day_runs WHERE id = ?1",
                params![id],
                Self::day_run_from_row,
            )
            .optional()?
            .ok_or_else(|| Error::RecordNotFound(format!("day run {id}")))
    }

    pub fn find_day_run(&self, consumed_day: &str, visibility: Visibility) -> Result<Option<DayRun>> {
        Ok(self
            .conn
            .query_row(
                &format!(
                    "SELECT dr.id, dr.uuid, dr.consumed_day, dr.calories, dr.user_removed
                     FROM day_runs dr
                     WHERE dr.consumed_day = ?1 AND {}",
                    visibility.clause("dr")
                ),
                params![consumed_day],
                Self::day_run_from_row,
            )
            .optional()?)
    }

    /// Returns the store's single day run for `consumed_day`, creating it with
    /// `status` if absent. An existing row is returned as-is, removed or not.
    pub fn find_or_create_day_run(&self, consumed_day: &str, status: RecordStatus) -> Result<DayRun> {
        if let Some(existing) = self.find_day_run(consumed_day, Visibility::IncludeRemoved)? {
            return Ok(existing);
        }
        self.write(
            "insert day run",
            "INSERT INTO day_runs (uuid, consumed_day, calories, user_removed)
             VALUES (?1, ?2, 0, ?3)",
            params![Uuid::new_v4().to_string(), consumed_day, status],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_day_run(id)
    }

    pub fn list_day_runs(&self, visibility: Visibility, order: SortOrder) -> Result<Vec<DayRun>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT dr.id, dr.uuid, dr.consumed_day, dr.calories, dr.user_removed
             FROM day_runs dr
             WHERE {}
             ORDER BY dr.consumed_day {}",
            visibility.clause("dr"),
            order.sql()
        ))?;
        let day_runs = stmt
            .query_map([], Self::day_run_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(day_runs)
    }

    /// Day runs strictly before `consumed_day`, oldest first.
    pub fn list_day_runs_before(&self, consumed_day: &str, visibility: Visibility) -> Result<Vec<DayRun>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT dr.id, dr.uuid, dr.consumed_day, dr.calories, dr.user_removed
             FROM day_runs dr
             WHERE dr.consumed_day < ?1 AND {}
             ORDER BY dr.consumed_day ASC",
            visibility.clause("dr")
        ))?;
        let day_runs = stmt
            .query_map(params![consumed_day], Self::day_run_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(day_runs)
    }

    pub fn set_day_run_status(&self, id: i64, status: RecordStatus) -> Result<()> {
        self.write(
            "update day run status",
            "UPDATE day_runs SET user_removed = ?1 WHERE id = ?2",
            params![status, id],
        )?;
        Ok(())
    }

    pub fn set_day_run_calories(&self, id: i64, calories: i16) -> Result<()> {
        self.write(
            "update day run calories",
            "UPDATE day_runs SET calories = ?1 WHERE id = ?2",
            params![calories, id],
        )?;
        Ok(())
    }

    /// Hard delete; serving runs go with it through the foreign key.
    pub fn delete_day_run(&self, id: i64) -> Result<bool> {
        let rows = self.write(
            "delete day run",
            "DELETE FROM day_runs WHERE id = ?1",
            params![id],
        )?;
        Ok(rows > 0)
    }

    /// Calories of the day's serving runs matching `visibility`.
    pub fn serving_run_calories(&self, day_run_id: i64, visibility: Visibility) -> Result<i16> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT sr.calories FROM serving_runs sr WHERE sr.day_run_id = ?1 AND {}",
            visibility.clause("sr")
        ))?;
        let calories = stmt
            .query_map(params![day_run_id], |row| row.get::<_, i16>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(saturating_total(calories))
    }

    // --- Serving runs ---

    const SERVING_RUN_COLUMNS: &'static str = "sr.id, sr.uuid, sr.day_run_id, sr.serving_archive_id,
         sr.consumed_time, sr.calories, sr.user_removed, s.name, c.name
         FROM serving_runs sr
         LEFT JOIN servings s ON s.archive_id = sr.serving_archive_id
         LEFT JOIN categories c ON c.id = s.category_id";

    pub fn insert_serving_run(&self, run: &NewServingRun) -> Result<ServingRun> {
        self.write(
            "insert serving run",
            "INSERT INTO serving_runs
                 (uuid, day_run_id, serving_archive_id, consumed_time, calories, user_removed)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                Uuid::new_v4().to_string(),
                run.day_run_id,
                run.serving_archive_id,
                run.consumed_time,
                run.calories,
                run.status,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_serving_run(id)
    }

    pub fn get_serving_run(&self, id: i64) -> Result<ServingRun> {
        self.conn
            .query_row(
                &format!("SELECT {} WHERE sr.id = ?1", Self::SERVING_RUN_COLUMNS),
                params![id],
                Self::serving_run_from_row,
            )
            .optional()?
            .ok_or_else(|| Error::RecordNotFound(format!("serving run {id}")))
    }

    pub fn delete_serving_run(&self, id: i64) -> Result<bool> {
        let rows = self.write(
            "delete serving run",
            "DELETE FROM serving_runs WHERE id = ?1",
            params![id],
        )?;
        Ok(rows > 0)
    }

    pub fn serving_runs_for_day(&self, day_run_id: i64, visibility: Visibility) -> Result<Vec<ServingRun>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} WHERE sr.day_run_id = ?1 AND {} ORDER BY sr.consumed_time ASC, sr.id ASC",
            Self::SERVING_RUN_COLUMNS,
            visibility.clause("sr")
        ))?;
        let runs = stmt
            .query_map(params![day_run_id], Self::serving_run_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(runs)
    }

    /// Lookup by the cross-store de-duplication key.
    pub fn find_serving_run(
        &self,
        day_run_id: i64,
        serving_archive_id: &str,
        consumed_time: &str,
        visibility: Visibility,
    ) -> Result<Option<ServingRun>> {
        Ok(self
            .conn
            .query_row(
                &format!(
                    "SELECT {} WHERE sr.day_run_id = ?1 AND sr.serving_archive_id = ?2
                     AND sr.consumed_time = ?3 AND {} ORDER BY sr.id LIMIT 1",
                    Self::SERVING_RUN_COLUMNS,
                    visibility.clause("sr")
                ),
                params![day_run_id, serving_archive_id, consumed_time],
                Self::serving_run_from_row,
            )
            .optional()?)
    }

    pub fn list_serving_runs(&self, visibility: Visibility) -> Result<Vec<ServingRun>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} WHERE {} ORDER BY sr.day_run_id, sr.consumed_time, sr.id",
            Self::SERVING_RUN_COLUMNS,
            visibility.clause("sr")
        ))?;
        let runs = stmt
            .query_map([], Self::serving_run_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(runs)
    }

    pub fn set_serving_run_status(&self, id: i64, status: RecordStatus) -> Result<()> {
        self.write(
            "update serving run status",
            "UPDATE serving_runs SET user_removed = ?1 WHERE id = ?2",
            params![status, id],
        )?;
        Ok(())
    }

    // --- Purge ---

    /// Deletes every day run and serving run. Returns `(day_runs, serving_runs)`.
    pub fn clear_log(&self) -> Result<(usize, usize)> {
        let serving_runs = self.write("clear serving runs", "DELETE FROM serving_runs", [])?;
        let day_runs = self.write("clear day runs", "DELETE FROM day_runs", [])?;
        Ok((day_runs, serving_runs))
    }

    /// Deletes every category and serving. Returns `(categories, servings)`.
    pub fn clear_catalog(&self) -> Result<(usize, usize)> {
        let servings = self.write("clear servings", "DELETE FROM servings", [])?;
        let categories = self.write("clear categories", "DELETE FROM categories", [])?;
        Ok((categories, servings))
    }

    // --- User Settings ---

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let now = Local::now().to_rfc3339();
        self.write(
            "save setting",
            "INSERT INTO user_settings (key, value, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, now],
        )?;
        Ok(())
    }

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .conn
            .query_row(
                "SELECT value FROM user_settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_serving(db: &Database) -> Serving {
        let category = db.create_category("Fruit").unwrap();
        db.create_serving(&NewServing {
            category_archive_id: category.archive_id,
            name: "Banana".to_string(),
            calories: 120,
        })
        .unwrap()
    }

    fn log_run(db: &Database, day: &DayRun, serving: &Serving, time: &str) -> ServingRun {
        db.insert_serving_run(&NewServingRun {
            day_run_id: day.id,
            serving_archive_id: serving.archive_id.clone(),
            consumed_time: time.to_string(),
            calories: serving.calories,
            status: RecordStatus::Active,
        })
        .unwrap()
    }

    #[test]
    fn test_create_and_list_categories() {
        let db = Database::open_in_memory().unwrap();
        let fruit = db.create_category("Fruit").unwrap();
        let meat = db.create_category("Meat").unwrap();

        assert_eq!(fruit.user_order, 0);
        assert_eq!(meat.user_order, 1);
        assert_ne!(fruit.archive_id, meat.archive_id);

        let all = db.list_categories().unwrap();
        let names: Vec<&str> = all.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Fruit", "Meat"]);
    }

    #[test]
    fn test_rename_category() {
        let db = Database::open_in_memory().unwrap();
        let fruit = db.create_category("Fruit").unwrap();
        let renamed = db.rename_category(&fruit.archive_id, "Fruits").unwrap();
        assert_eq!(renamed.name, "Fruits");
        assert_eq!(renamed.archive_id, fruit.archive_id);

        let err = db.rename_category("missing", "x").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_delete_category_cascades_to_servings() {
        let db = Database::open_in_memory().unwrap();
        let serving = sample_serving(&db);

        assert!(db.delete_category(&serving.category_archive_id).unwrap());
        assert!(db.get_serving_by_archive_id(&serving.archive_id).unwrap().is_none());
        assert!(!db.delete_category(&serving.category_archive_id).unwrap());
    }

    #[test]
    fn test_create_serving_requires_category() {
        let db = Database::open_in_memory().unwrap();
        let err = db
            .create_serving(&NewServing {
                category_archive_id: "nope".to_string(),
                name: "Banana".to_string(),
                calories: 120,
            })
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_move_serving() {
        let db = Database::open_in_memory().unwrap();
        let serving = sample_serving(&db);
        let snacks = db.create_category("Snacks").unwrap();

        let moved = db.move_serving(&serving.archive_id, &snacks.archive_id).unwrap();
        assert_eq!(moved.category_archive_id, snacks.archive_id);
        assert_eq!(db.list_servings(Some(&snacks.archive_id)).unwrap().len(), 1);
    }

    #[test]
    fn test_serving_calorie_change_keeps_run_snapshot() {
        let db = Database::open_in_memory().unwrap();
        let serving = sample_serving(&db);
        let day = db
            .find_or_create_day_run("2023-02-01", RecordStatus::Active)
            .unwrap();
        let run = log_run(&db, &day, &serving, "08:00:00");

        db.set_serving_calories(&serving.archive_id, 200).unwrap();
        let fetched = db.get_serving_run(run.id).unwrap();
        assert_eq!(fetched.calories, 120);
        assert_eq!(fetched.serving_name.as_deref(), Some("Banana"));
        assert_eq!(fetched.category_name.as_deref(), Some("Fruit"));
    }

    #[test]
    fn test_find_or_create_day_run_is_unique_per_day() {
        let db = Database::open_in_memory().unwrap();
        let first = db
            .find_or_create_day_run("2023-02-01", RecordStatus::Active)
            .unwrap();
        let second = db
            .find_or_create_day_run("2023-02-01", RecordStatus::Active)
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(
            db.list_day_runs(Visibility::IncludeRemoved, SortOrder::Ascending)
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn test_find_or_create_returns_removed_day() {
        let db = Database::open_in_memory().unwrap();
        let day = db
            .find_or_create_day_run("2023-02-01", RecordStatus::Removed)
            .unwrap();
        assert_eq!(day.status, RecordStatus::Removed);

        assert!(db.find_day_run("2023-02-01", Visibility::ActiveOnly).unwrap().is_none());
        let again = db
            .find_or_create_day_run("2023-02-01", RecordStatus::Active)
            .unwrap();
        assert_eq!(again.id, day.id);
        assert_eq!(again.status, RecordStatus::Removed);
    }

    #[test]
    fn test_list_day_runs_filters_and_sorts() {
        let db = Database::open_in_memory().unwrap();
        db.find_or_create_day_run("2023-02-01", RecordStatus::Active).unwrap();
        db.find_or_create_day_run("2023-02-03", RecordStatus::Active).unwrap();
        db.find_or_create_day_run("2023-02-02", RecordStatus::Removed).unwrap();

        let active = db
            .list_day_runs(Visibility::ActiveOnly, SortOrder::Descending)
            .unwrap();
        let days: Vec<&str> = active.iter().map(|d| d.consumed_day.as_str()).collect();
        assert_eq!(days, vec!["2023-02-03", "2023-02-01"]);

        let before = db
            .list_day_runs_before("2023-02-03", Visibility::IncludeRemoved)
            .unwrap();
        let days: Vec<&str> = before.iter().map(|d| d.consumed_day.as_str()).collect();
        assert_eq!(days, vec!["2023-02-01", "2023-02-02"]);
    }

    #[test]
    fn test_serving_runs_filtered_by_status() {
        let db = Database::open_in_memory().unwrap();
        let serving = sample_serving(&db);
        let day = db
            .find_or_create_day_run("2023-02-01", RecordStatus::Active)
            .unwrap();
        let late = log_run(&db, &day, &serving, "18:00:00");
        let early = log_run(&db, &day, &serving, "08:00:00");
        db.set_serving_run_status(late.id, RecordStatus::Removed).unwrap();

        let active = db.serving_runs_for_day(day.id, Visibility::ActiveOnly).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, early.id);

        let all = db
            .serving_runs_for_day(day.id, Visibility::IncludeRemoved)
            .unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].consumed_time, "08:00:00");
        assert_eq!(all[1].status, RecordStatus::Removed);

        assert_eq!(db.serving_run_calories(day.id, Visibility::ActiveOnly).unwrap(), 120);
        assert_eq!(
            db.serving_run_calories(day.id, Visibility::IncludeRemoved).unwrap(),
            240
        );
    }

    #[test]
    fn test_find_serving_run_by_key() {
        let db = Database::open_in_memory().unwrap();
        let serving = sample_serving(&db);
        let day = db
            .find_or_create_day_run("2023-02-01", RecordStatus::Active)
            .unwrap();
        let run = log_run(&db, &day, &serving, "08:00:00");

        let found = db
            .find_serving_run(day.id, &serving.archive_id, "08:00:00", Visibility::ActiveOnly)
            .unwrap()
            .unwrap();
        assert_eq!(found.id, run.id);
        assert!(db
            .find_serving_run(day.id, &serving.archive_id, "09:00:00", Visibility::ActiveOnly)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_delete_day_run_cascades() {
        let db = Database::open_in_memory().unwrap();
        let serving = sample_serving(&db);
        let day = db
            .find_or_create_day_run("2023-02-01", RecordStatus::Active)
            .unwrap();
        log_run(&db, &day, &serving, "08:00:00");

        assert!(db.delete_day_run(day.id).unwrap());
        assert!(db.list_serving_runs(Visibility::IncludeRemoved).unwrap().is_empty());
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let db = Database::open_in_memory().unwrap();
        let result: Result<()> = db.in_transaction("test", |db| {
            db.find_or_create_day_run("2023-02-01", RecordStatus::Active)?;
            Err(Error::InvalidInput("boom".to_string()))
        });
        assert!(result.is_err());
        assert!(db.find_day_run("2023-02-01", Visibility::IncludeRemoved).unwrap().is_none());
    }

    #[test]
    fn test_clear_log_and_catalog() {
        let db = Database::open_in_memory().unwrap();
        let serving = sample_serving(&db);
        let day = db
            .find_or_create_day_run("2023-02-01", RecordStatus::Active)
            .unwrap();
        log_run(&db, &day, &serving, "08:00:00");
        log_run(&db, &day, &serving, "09:00:00");

        assert_eq!(db.clear_log().unwrap(), (1, 2));
        assert_eq!(db.list_categories().unwrap().len(), 1);
        assert_eq!(db.clear_catalog().unwrap(), (1, 1));
        assert!(db.list_servings(None).unwrap().is_empty());
    }

    #[test]
    fn test_shared_memory_visible_to_second_connection() {
        let name = format!("dcalt-test-{}", Uuid::new_v4());
        let first = Database::open_shared_memory(&name).unwrap();
        first.create_category("Fruit").unwrap();

        let second = Database::open_shared_memory(&name).unwrap();
        assert_eq!(second.list_categories().unwrap().len(), 1);
    }

    #[test]
    fn test_user_settings_upsert() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.get_setting("target_calories").unwrap().is_none());
        db.set_setting("target_calories", "1800").unwrap();
        db.set_setting("target_calories", "2100").unwrap();
        assert_eq!(db.get_setting("target_calories").unwrap().as_deref(), Some("2100"));
    }
}
