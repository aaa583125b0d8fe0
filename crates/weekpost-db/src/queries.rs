use crate::Database;
use crate::models::{
    CategoryCountRow, EntryRow, WeeklyMessageRow, fold_category_counts, format_date,
};
use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::{Connection, Row};

use weekpost_types::models::{Category, ChangeEntry, WeeklyCategoryStats, WeeklyMessageRecord};

const ENTRY_COLUMNS: &str = "id, week_start, category, content, author, created_at, updated_at";

impl Database {
    // -- Entries --

    pub fn create_entry(
        &self,
        week_start: NaiveDate,
        category: Category,
        content: &str,
        author: &str,
    ) -> Result<ChangeEntry> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO entries (week_start, category, content, author) VALUES (?1, ?2, ?3, ?4)",
                (format_date(week_start), category.key(), content, author),
            )?;
            let id = conn.last_insert_rowid();
            query_entry(conn, id)?.ok_or_else(|| anyhow::anyhow!("Entry {} vanished after insert", id))
        })
    }

    pub fn get_entry(&self, id: i64) -> Result<Option<ChangeEntry>> {
        self.with_conn(|conn| query_entry(conn, id))
    }

    pub fn get_entry_in_week(&self, id: i64, week_start: NaiveDate) -> Result<Option<ChangeEntry>> {
        Ok(self
            .get_entry(id)?
            .filter(|entry| entry.week_start == week_start))
    }

    /// Entries of one week in creation order.
    pub fn entries_for_week(&self, week_start: NaiveDate) -> Result<Vec<ChangeEntry>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM entries WHERE week_start = ?1 ORDER BY id ASC",
                ENTRY_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([format_date(week_start)], entry_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter().map(ChangeEntry::try_from).collect()
        })
    }

    pub fn all_entries(&self) -> Result<Vec<ChangeEntry>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM entries ORDER BY week_start ASC, id ASC",
                ENTRY_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], entry_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter().map(ChangeEntry::try_from).collect()
        })
    }

    pub fn count_for_week(&self, week_start: NaiveDate) -> Result<usize> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM entries WHERE week_start = ?1",
                [format_date(week_start)],
                |row| row.get(0),
            )?;
            Ok(usize::try_from(count).unwrap_or(0))
        })
    }

    /// Rewrite the mutable fields of an entry. Returns false when no entry
    /// with that id exists in the given week.
    pub fn update_entry_in_week(
        &self,
        id: i64,
        week_start: NaiveDate,
        category: Category,
        content: &str,
        author: &str,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE entries
                 SET category = ?1, content = ?2, author = ?3, updated_at = datetime('now')
                 WHERE id = ?4 AND week_start = ?5",
                rusqlite::params![category.key(), content, author, id, format_date(week_start)],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn delete_entry_in_week(&self, id: i64, week_start: NaiveDate) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "DELETE FROM entries WHERE id = ?1 AND week_start = ?2",
                rusqlite::params![id, format_date(week_start)],
            )?;
            Ok(changed > 0)
        })
    }

    /// Per-week category counts for the `weeks` most recent weeks that have
    /// entries, newest first.
    pub fn weekly_category_stats(&self, weeks: u32) -> Result<Vec<WeeklyCategoryStats>> {
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT week_start, category, COUNT(*)
                 FROM entries
                 WHERE week_start IN (
                     SELECT DISTINCT week_start FROM entries ORDER BY week_start DESC LIMIT ?1
                 )
                 GROUP BY week_start, category
                 ORDER BY week_start DESC, category ASC",
            )?;
            let rows = stmt
                .query_map([weeks], |row| {
                    Ok(CategoryCountRow {
                        week_start: row.get(0)?,
                        category: row.get(1)?,
                        count: row.get(2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;
        fold_category_counts(rows)
    }

    // -- Weekly message records --

    pub fn find_weekly_message(&self, week_start: NaiveDate) -> Result<Option<WeeklyMessageRecord>> {
        let row = self.with_conn(|conn| {
            conn.query_row(
                "SELECT week_start, channel_id, message_id, created_at
                 FROM weekly_messages WHERE week_start = ?1",
                [format_date(week_start)],
                weekly_message_row,
            )
            .optional()
        })?;
        row.map(WeeklyMessageRecord::try_from).transpose()
    }

    /// Insert or replace the record for a week. Only called after the remote
    /// send was confirmed.
    pub fn upsert_weekly_message(
        &self,
        week_start: NaiveDate,
        channel_id: &str,
        message_id: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO weekly_messages (week_start, channel_id, message_id)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(week_start) DO UPDATE SET
                     channel_id = excluded.channel_id,
                     message_id = excluded.message_id,
                     created_at = datetime('now')",
                (format_date(week_start), channel_id, message_id),
            )?;
            Ok(())
        })
    }

    pub fn all_weekly_messages(&self) -> Result<Vec<WeeklyMessageRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT week_start, channel_id, message_id, created_at
                 FROM weekly_messages ORDER BY week_start ASC",
            )?;
            let rows = stmt
                .query_map([], weekly_message_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter().map(WeeklyMessageRecord::try_from).collect()
        })
    }
}

fn query_entry(conn: &Connection, id: i64) -> Result<Option<ChangeEntry>> {
    let sql = format!("SELECT {} FROM entries WHERE id = ?1", ENTRY_COLUMNS);
    let row = conn.query_row(&sql, [id], entry_row).optional()?;
    row.map(ChangeEntry::try_from).transpose()
}

fn entry_row(row: &Row<'_>) -> rusqlite::Result<EntryRow> {
    Ok(EntryRow {
        id: row.get(0)?,
        week_start: row.get(1)?,
        category: row.get(2)?,
        content: row.get(3)?,
        author: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn weekly_message_row(row: &Row<'_>) -> rusqlite::Result<WeeklyMessageRow> {
    Ok(WeeklyMessageRow {
        week_start: row.get(0)?,
        channel_id: row.get(1)?,
        message_id: row.get(2)?,
        created_at: row.get(3)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn week(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn entries_come_back_in_creation_order() {
        let db = Database::open_in_memory().unwrap();
        db.create_entry(week(1), Category::Removed, "Y", "bob").unwrap();
        db.create_entry(week(1), Category::Added, "X", "alice").unwrap();
        db.create_entry(week(8), Category::Added, "other week", "alice").unwrap();

        let entries = db.entries_for_week(week(1)).unwrap();
        let contents: Vec<_> = entries.iter().map(|e| e.content.as_str()).collect();
        assert_eq!(contents, ["Y", "X"]);
        assert!(entries[0].id < entries[1].id);
        assert_eq!(db.count_for_week(week(1)).unwrap(), 2);
        assert_eq!(db.all_entries().unwrap().len(), 3);
    }

    #[test]
    fn edit_keeps_id_and_week() {
        let db = Database::open_in_memory().unwrap();
        let created = db.create_entry(week(1), Category::Added, "X", "alice").unwrap();

        assert!(db
            .update_entry_in_week(created.id, week(1), Category::Changed, "X2", "bob")
            .unwrap());
        let edited = db.get_entry(created.id).unwrap().unwrap();
        assert_eq!(edited.id, created.id);
        assert_eq!(edited.week_start, created.week_start);
        assert_eq!(edited.category, Category::Changed);
        assert_eq!(edited.content, "X2");
        assert_eq!(edited.author, "bob");

        // Wrong week matches nothing.
        assert!(!db
            .update_entry_in_week(created.id, week(8), Category::Removed, "Z", "eve")
            .unwrap());
        assert!(db.get_entry_in_week(created.id, week(8)).unwrap().is_none());
    }

    #[test]
    fn delete_is_permanent_and_week_scoped() {
        let db = Database::open_in_memory().unwrap();
        let created = db.create_entry(week(1), Category::Added, "X", "alice").unwrap();

        assert!(!db.delete_entry_in_week(created.id, week(8)).unwrap());
        assert!(db.delete_entry_in_week(created.id, week(1)).unwrap());
        assert!(db.get_entry(created.id).unwrap().is_none());
        assert!(!db.delete_entry_in_week(created.id, week(1)).unwrap());
    }

    #[test]
    fn weekly_message_upsert_replaces() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.find_weekly_message(week(1)).unwrap().is_none());

        db.upsert_weekly_message(week(1), "chan", "m1").unwrap();
        db.upsert_weekly_message(week(1), "chan", "m2").unwrap();

        let record = db.find_weekly_message(week(1)).unwrap().unwrap();
        assert_eq!(record.message_id, "m2");
        assert_eq!(db.all_weekly_messages().unwrap().len(), 1);
    }

    #[test]
    fn stats_cover_most_recent_weeks() {
        let db = Database::open_in_memory().unwrap();
        db.create_entry(week(1), Category::Added, "a", "x").unwrap();
        db.create_entry(week(8), Category::Added, "b", "x").unwrap();
        db.create_entry(week(8), Category::Removed, "c", "x").unwrap();
        db.create_entry(week(15), Category::Changed, "d", "x").unwrap();

        let stats = db.weekly_category_stats(2).unwrap();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].week_start, Some(week(15)));
        assert_eq!(stats[0].changed, 1);
        assert_eq!(stats[1].week_start, Some(week(8)));
        assert_eq!((stats[1].added, stats[1].removed), (1, 1));
    }
}
