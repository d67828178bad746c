//! Ledger reads and writes on top of [`Database`], and the [`LedgerStore`]
//! trait the service depends on.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use coral_shared::{Category, ContributionEvent, ContributionId, NewContribution, UserId};
use rusqlite::{params, ErrorCode, OptionalExtension, Row};
use uuid::Uuid;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::Appended;

/// Append-only contribution ledger.
pub trait LedgerStore: Send + Sync {
    /// Durably append an event. A repeated `(user_id, idempotency_key)` pair
    /// returns the originally stored event without writing anything.
    fn append(&self, new: NewContribution) -> Result<Appended>;

    /// Events for one user, newest first. `before` is an exclusive sequence
    /// cursor for paging.
    fn events_for_user(
        &self,
        user_id: &UserId,
        limit: u32,
        before: Option<u64>,
    ) -> Result<Vec<ContributionEvent>>;

    /// The whole ledger in insertion order.
    fn replay(&self) -> Result<Vec<ContributionEvent>>;
}

const SELECT_COLUMNS: &str = "SELECT sequence, id, user_id, amount, reason, category, \
     project_id, created_at, idempotency_key FROM contributions";

impl Database {
    pub fn append_contribution(&mut self, new: NewContribution) -> Result<Appended> {
        new.validate()?;

        let tx = self.conn_mut().transaction()?;

        if let Some(key) = new.idempotency_key.as_deref() {
            let existing = tx
                .query_row(
                    &format!("{SELECT_COLUMNS} WHERE user_id = ?1 AND idempotency_key = ?2"),
                    params![new.user_id.as_str(), key],
                    row_to_event,
                )
                .optional()
                .map_err(decode_error)?;
            if let Some(event) = existing {
                tracing::debug!(
                    user = %new.user_id,
                    key,
                    sequence = event.sequence,
                    "idempotent replay, ledger unchanged"
                );
                return Ok(Appended::Replayed(event));
            }
        }

        tx.execute(
            "INSERT INTO contributions
                 (id, user_id, amount, reason, category, project_id, created_at, idempotency_key)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                new.id.to_string(),
                new.user_id.as_str(),
                new.amount,
                new.reason,
                new.category.as_str(),
                new.project_id,
                new.created_at.to_rfc3339(),
                new.idempotency_key,
            ],
        )
        .map_err(|e| {
            if let rusqlite::Error::SqliteFailure(err, _) = &e {
                if err.code == ErrorCode::ConstraintViolation {
                    return StoreError::Conflict(e.to_string());
                }
            }
            StoreError::Sqlite(e)
        })?;

        let sequence = tx.last_insert_rowid() as u64;
        tx.commit()?;

        tracing::debug!(
            user = %new.user_id,
            sequence,
            amount = new.amount,
            category = %new.category,
            "contribution appended"
        );

        Ok(Appended::Stored(new.into_event(sequence)))
    }

    pub fn get_contributions_for_user(
        &self,
        user_id: &UserId,
        limit: u32,
        before: Option<u64>,
    ) -> Result<Vec<ContributionEvent>> {
        let before = before.map_or(i64::MAX, |seq| seq.min(i64::MAX as u64) as i64);
        let mut stmt = self.conn().prepare(&format!(
            "{SELECT_COLUMNS}
             WHERE user_id = ?1 AND sequence < ?2
             ORDER BY sequence DESC
             LIMIT ?3"
        ))?;

        let rows = stmt.query_map(params![user_id.as_str(), before, limit], row_to_event)?;

        let mut events = Vec::new();
        for row in rows {
            events.push(row.map_err(decode_error)?);
        }
        Ok(events)
    }

    pub fn get_all_contributions(&self) -> Result<Vec<ContributionEvent>> {
        let mut stmt = self
            .conn()
            .prepare(&format!("{SELECT_COLUMNS} ORDER BY sequence ASC"))?;

        let rows = stmt.query_map([], row_to_event)?;

        let mut events = Vec::new();
        for row in rows {
            events.push(row.map_err(decode_error)?);
        }
        Ok(events)
    }

    pub fn count_contributions(&self) -> Result<u64> {
        let count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM contributions", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

fn decode_error(err: rusqlite::Error) -> StoreError {
    match err {
        rusqlite::Error::FromSqlConversionFailure(..) => StoreError::Corrupt(err.to_string()),
        other => StoreError::Sqlite(other),
    }
}

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
}

fn row_to_event(row: &Row<'_>) -> rusqlite::Result<ContributionEvent> {
    let sequence: i64 = row.get(0)?;
    let id_str: String = row.get(1)?;
    let user_str: String = row.get(2)?;
    let amount: i64 = row.get(3)?;
    let reason: String = row.get(4)?;
    let category_str: String = row.get(5)?;
    let project_id: Option<String> = row.get(6)?;
    let ts_str: String = row.get(7)?;
    let idempotency_key: Option<String> = row.get(8)?;

    let id = Uuid::parse_str(&id_str).map_err(|e| conversion_error(1, e))?;
    let user_id = UserId::parse(&user_str).map_err(|e| conversion_error(2, e))?;
    let category: Category = category_str
        .parse()
        .map_err(|e| conversion_error(5, e))?;
    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&ts_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(7, e))?;

    Ok(ContributionEvent {
        id: ContributionId(id),
        user_id,
        amount,
        reason,
        category,
        project_id,
        created_at,
        idempotency_key,
        sequence: sequence as u64,
    })
}

/// [`LedgerStore`] over a single SQLite connection.
pub struct SqliteLedger {
    db: Mutex<Database>,
}

impl SqliteLedger {
    pub fn new(db: Database) -> Self {
        Self { db: Mutex::new(db) }
    }

    pub fn open_at(path: &Path) -> Result<Self> {
        Ok(Self::new(Database::open_at(path)?))
    }

    pub fn len(&self) -> Result<u64> {
        self.lock()?.count_contributions()
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Database>> {
        self.db.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl LedgerStore for SqliteLedger {
    fn append(&self, new: NewContribution) -> Result<Appended> {
        self.lock()?.append_contribution(new)
    }

    fn events_for_user(
        &self,
        user_id: &UserId,
        limit: u32,
        before: Option<u64>,
    ) -> Result<Vec<ContributionEvent>> {
        self.lock()?.get_contributions_for_user(user_id, limit, before)
    }

    fn replay(&self) -> Result<Vec<ContributionEvent>> {
        self.lock()?.get_all_contributions()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use coral_shared::ValidationError;

    use super::*;

    fn new_event(user: &str, amount: i64, key: Option<&str>) -> NewContribution {
        NewContribution {
            id: ContributionId::new(),
            user_id: UserId::parse(user).unwrap(),
            amount,
            reason: "test".into(),
            category: Category::Documentation,
            project_id: None,
            created_at: Utc::now(),
            idempotency_key: key.map(str::to_string),
        }
    }

    fn open() -> (tempfile::TempDir, SqliteLedger) {
        let dir = tempfile::tempdir().unwrap();
        let ledger = SqliteLedger::open_at(&dir.path().join("ledger.db")).unwrap();
        (dir, ledger)
    }

    #[test]
    fn test_append_assigns_increasing_sequence() {
        let (_dir, ledger) = open();
        let a = ledger.append(new_event("alice", 10, None)).unwrap();
        let b = ledger.append(new_event("bob", 20, None)).unwrap();
        assert!(!a.is_replay());
        assert!(b.event().sequence > a.event().sequence);
        assert_eq!(ledger.len().unwrap(), 2);
    }

    #[test]
    fn test_append_preserves_fields() {
        let (_dir, ledger) = open();
        let mut new = new_event("alice", 42, Some("k1"));
        new.project_id = Some("reef-app".into());
        new.category = Category::CodeReview;
        let stored = ledger.append(new.clone()).unwrap().into_event();

        let read = ledger
            .events_for_user(&new.user_id, 10, None)
            .unwrap()
            .pop()
            .unwrap();
        assert_eq!(read, stored);
        assert_eq!(read.project_id.as_deref(), Some("reef-app"));
        assert_eq!(read.category, Category::CodeReview);
        assert_eq!(read.created_at, new.created_at);
    }

    #[test]
    fn test_idempotency_key_returns_original() {
        let (_dir, ledger) = open();
        let first = ledger.append(new_event("alice", 10, Some("vote-1"))).unwrap();
        let second = ledger.append(new_event("alice", 99, Some("vote-1"))).unwrap();

        assert!(second.is_replay());
        assert_eq!(second.event(), first.event());
        assert_eq!(ledger.len().unwrap(), 1);
    }

    #[test]
    fn test_idempotency_key_is_per_user() {
        let (_dir, ledger) = open();
        ledger.append(new_event("alice", 10, Some("vote-1"))).unwrap();
        let other = ledger.append(new_event("bob", 10, Some("vote-1"))).unwrap();
        assert!(!other.is_replay());
        assert_eq!(ledger.len().unwrap(), 2);
    }

    #[test]
    fn test_zero_amount_rejected() {
        let (_dir, ledger) = open();
        let err = ledger.append(new_event("alice", 0, None)).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Validation(ValidationError::ZeroAmount)
        ));
        assert!(ledger.is_empty().unwrap());
    }

    #[test]
    fn test_duplicate_id_is_conflict() {
        let (_dir, ledger) = open();
        let new = new_event("alice", 10, None);
        ledger.append(new.clone()).unwrap();
        let err = ledger.append(new).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn test_events_for_user_newest_first_with_cursor() {
        let (_dir, ledger) = open();
        let start = Utc::now();
        for i in 0..5 {
            let mut new = new_event("alice", i + 1, None);
            new.created_at = start + Duration::seconds(i);
            ledger.append(new).unwrap();
        }
        ledger.append(new_event("bob", 7, None)).unwrap();

        let alice = UserId::parse("alice").unwrap();
        let page = ledger.events_for_user(&alice, 2, None).unwrap();
        let amounts: Vec<i64> = page.iter().map(|e| e.amount).collect();
        assert_eq!(amounts, vec![5, 4]);

        let cursor = page.last().map(|e| e.sequence);
        let next = ledger.events_for_user(&alice, 10, cursor).unwrap();
        let amounts: Vec<i64> = next.iter().map(|e| e.amount).collect();
        assert_eq!(amounts, vec![3, 2, 1]);
    }

    #[test]
    fn test_replay_in_insertion_order() {
        let (_dir, ledger) = open();
        ledger.append(new_event("alice", 1, None)).unwrap();
        ledger.append(new_event("bob", 2, None)).unwrap();
        ledger.append(new_event("alice", 3, None)).unwrap();

        let all = ledger.replay().unwrap();
        let amounts: Vec<i64> = all.iter().map(|e| e.amount).collect();
        assert_eq!(amounts, vec![1, 2, 3]);
    }

    #[test]
    fn test_history_is_immutable() {
        let (_dir, ledger) = open();
        ledger.append(new_event("alice", 10, None)).unwrap();

        let db = ledger.lock().unwrap();
        assert!(db
            .conn()
            .execute("UPDATE contributions SET amount = 1000", [])
            .is_err());
        assert!(db.conn().execute("DELETE FROM contributions", []).is_err());
    }

    #[test]
    fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");
        {
            let ledger = SqliteLedger::open_at(&path).unwrap();
            ledger.append(new_event("alice", 10, Some("k"))).unwrap();
        }
        let ledger = SqliteLedger::open_at(&path).unwrap();
        assert_eq!(ledger.replay().unwrap().len(), 1);
        assert!(ledger
            .append(new_event("alice", 10, Some("k")))
            .unwrap()
            .is_replay());
    }
}
