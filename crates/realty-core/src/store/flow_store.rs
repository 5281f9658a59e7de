use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{OptionalExtension, Row};

use crate::db::Database;
use crate::error::RealtyError;
use crate::models::flow::{FlowPhase, FlowRecord, FlowState};

/// Persists flow state after every transition so a flow waiting for
/// approval can be resumed later.
#[derive(Clone)]
pub struct FlowStore {
    db: Database,
}

impl FlowStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn save(&self, id: &str, state: &FlowState) -> Result<(), RealtyError> {
        let id = id.to_string();
        let phase = state.phase.as_str();
        let state_json = serde_json::to_string(state)?;
        let now = Utc::now().timestamp_millis();
        self.db
            .with_conn_async(move |conn| {
                conn.execute(
                    "INSERT INTO flows (id, phase, state, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?4)
                     ON CONFLICT(id) DO UPDATE SET
                       phase = excluded.phase,
                       state = excluded.state,
                       updated_at = excluded.updated_at",
                    rusqlite::params![id, phase, state_json, now],
                )?;
                Ok(())
            })
            .await
    }

    pub async fn get(&self, id: &str) -> Result<Option<FlowRecord>, RealtyError> {
        let id = id.to_string();
        self.db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, phase, state, created_at, updated_at FROM flows WHERE id = ?1",
                )?;
                stmt.query_row(rusqlite::params![id], row_to_record)
                    .optional()
            })
            .await
    }

    /// All flows, most recently updated first.
    pub async fn list(&self) -> Result<Vec<FlowRecord>, RealtyError> {
        self.db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, phase, state, created_at, updated_at
                     FROM flows ORDER BY updated_at DESC, id",
                )?;
                let rows = stmt
                    .query_map([], row_to_record)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
    }

    pub async fn list_by_phase(&self, phase: FlowPhase) -> Result<Vec<FlowRecord>, RealtyError> {
        let phase = phase.as_str();
        self.db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, phase, state, created_at, updated_at
                     FROM flows WHERE phase = ?1 ORDER BY updated_at DESC, id",
                )?;
                let rows = stmt
                    .query_map(rusqlite::params![phase], row_to_record)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
    }

    /// Delete a flow, returning whether it existed.
    pub async fn delete(&self, id: &str) -> Result<bool, RealtyError> {
        let id = id.to_string();
        self.db
            .with_conn_async(move |conn| {
                let removed = conn.execute("DELETE FROM flows WHERE id = ?1", rusqlite::params![id])?;
                Ok(removed > 0)
            })
            .await
    }
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<FlowRecord> {
    let phase_str: String = row.get(1)?;
    let state_str: String = row.get(2)?;
    let state: FlowState = serde_json::from_str(&state_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(FlowRecord {
        id: row.get(0)?,
        phase: FlowPhase::from_str(&phase_str).unwrap_or(state.phase),
        state,
        created_at: from_millis(row.get(3)?),
        updated_at: from_millis(row.get(4)?),
    })
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_else(Utc::now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SearchCriteria;

    fn store() -> FlowStore {
        FlowStore::new(Database::open_in_memory().unwrap())
    }

    #[tokio::test]
    async fn test_state_round_trips() {
        let store = store();
        let mut state = FlowState::new();
        state.phase = FlowPhase::AwaitingApproval;
        state.search_criteria = Some(SearchCriteria::new("Lekki, Lagos"));
        state.research_results = Some("{\"properties\": []}".to_string());
        state.retry_count = 2;

        store.save("flow-1", &state).await.unwrap();
        let record = store.get("flow-1").await.unwrap().unwrap();
        assert_eq!(record.id, "flow-1");
        assert_eq!(record.phase, FlowPhase::AwaitingApproval);
        assert_eq!(record.state, state);
        assert!(store.get("flow-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_updates_existing_row() {
        let store = store();
        let mut state = FlowState::new();
        store.save("flow-1", &state).await.unwrap();
        let created = store.get("flow-1").await.unwrap().unwrap().created_at;

        state.phase = FlowPhase::Completed;
        store.save("flow-1", &state).await.unwrap();

        let all = store.list().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].phase, FlowPhase::Completed);
        assert_eq!(all[0].created_at, created);
    }

    #[tokio::test]
    async fn test_list_by_phase_and_delete() {
        let store = store();
        let mut waiting = FlowState::new();
        waiting.phase = FlowPhase::AwaitingApproval;
        let mut done = FlowState::new();
        done.phase = FlowPhase::Completed;
        store.save("a", &waiting).await.unwrap();
        store.save("b", &done).await.unwrap();

        let pending = store.list_by_phase(FlowPhase::AwaitingApproval).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, "a");

        assert!(store.delete("a").await.unwrap());
        assert!(!store.delete("a").await.unwrap());
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_state_is_database_error() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO flows (id, phase, state, created_at, updated_at)
                 VALUES ('x', 'pending', 'not json', 0, 0)",
                [],
            )
        })
        .unwrap();
        let err = FlowStore::new(db).get("x").await.unwrap_err();
        assert!(matches!(err, RealtyError::Database(_)));
    }
}
