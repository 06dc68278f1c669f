//! Persistence collaborator for the agenda aggregate.
//!
//! One row per user in `agendas`, weeks stored as jsonb. The merge engine
//! runs in memory; `write` brackets it with an optimistic compare-and-swap on
//! the row's `version` so two concurrent check-ins for the same user cannot
//! silently discard each other's contribution. Each retry re-reads the fresh
//! row and re-runs the same pure merge, so the field-level upsert semantics
//! are unchanged by the concurrency strategy.

use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use pacer_core::agenda::{Agenda, AgendaPatch, Week};
use pacer_core::merge::merge_patch;

use crate::error::AppError;

/// Attempts before a write gives up on winning the version race.
const MAX_WRITE_ATTEMPTS: u32 = 3;

/// An agenda as stored: the aggregate plus its row identity and CAS version.
#[derive(Debug, Clone)]
pub struct StoredAgenda {
    pub id: Uuid,
    pub version: i64,
    pub agenda: Agenda,
}

/// Result of a reset: both halves of the logical unit that was removed.
#[derive(Debug, Clone)]
pub struct DeletedAgenda {
    pub agenda_id: Uuid,
    pub chat_id: Option<Uuid>,
}

/// Explicitly constructed, passed-in persistence handle. No module-level
/// client exists; every operation goes through an instance of this.
pub struct AgendaStore {
    pool: PgPool,
}

impl AgendaStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Load the user's agenda, if one exists.
    pub async fn load(&self, user_id: Uuid) -> Result<Option<StoredAgenda>, AppError> {
        let row = sqlx::query_as::<_, AgendaRow>(
            r#"
            SELECT id, user_id, goal, start_date, current_week, total_weeks,
                   training_frequency, injuries, work_type, user_data, weeks, version
            FROM agendas
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(AgendaRow::into_stored).transpose()
    }

    /// Insert a new agenda. Fails with `AlreadyExists` if the user has one —
    /// the unique index on `user_id` enforces the at-most-one-live-agenda
    /// invariant even across concurrent creates. A conversation row is seeded
    /// alongside so the later reset can remove both as one unit.
    pub async fn create(&self, user_id: Uuid, agenda: Agenda) -> Result<StoredAgenda, AppError> {
        let weeks_json = serde_json::to_value(&agenda.weeks)
            .map_err(|e| AppError::Internal(format!("Failed to serialize weeks: {e}")))?;

        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, AgendaRow>(
            r#"
            INSERT INTO agendas (id, user_id, goal, start_date, current_week, total_weeks,
                                 training_frequency, injuries, work_type, user_data, weeks, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 1)
            RETURNING id, user_id, goal, start_date, current_week, total_weeks,
                      training_frequency, injuries, work_type, user_data, weeks, version
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(user_id)
        .bind(&agenda.goal)
        .bind(agenda.start_date)
        .bind(agenda.current_week as i32)
        .bind(agenda.total_weeks as i32)
        .bind(&agenda.training_frequency)
        .bind(&agenda.injuries)
        .bind(&agenda.work_type)
        .bind(&agenda.user_data)
        .bind(&weeks_json)
        .fetch_one(&mut *tx)
        .await
        .map_err(translate_insert_conflict)?;

        sqlx::query(
            r#"
            INSERT INTO conversations (id, user_id, messages)
            VALUES ($1, $2, '[]'::jsonb)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        row.into_stored()
    }

    /// The merge-then-persist entry point: read the current agenda, merge the
    /// patch in memory, write the result back guarded by a version
    /// compare-and-swap. A lost race re-reads and re-merges.
    pub async fn write(&self, user_id: Uuid, patch: AgendaPatch) -> Result<StoredAgenda, AppError> {
        for _ in 0..MAX_WRITE_ATTEMPTS {
            let stored = self
                .load(user_id)
                .await?
                .ok_or(AppError::NotFound { resource: "agenda" })?;

            let mut agenda = stored.agenda;
            merge_patch(&mut agenda, patch.clone());

            let weeks_json = serde_json::to_value(&agenda.weeks)
                .map_err(|e| AppError::Internal(format!("Failed to serialize weeks: {e}")))?;

            let row = sqlx::query_as::<_, AgendaRow>(
                r#"
                UPDATE agendas
                SET current_week = $1, weeks = $2, version = version + 1, updated_at = now()
                WHERE user_id = $3 AND version = $4
                RETURNING id, user_id, goal, start_date, current_week, total_weeks,
                          training_frequency, injuries, work_type, user_data, weeks, version
                "#,
            )
            .bind(agenda.current_week as i32)
            .bind(&weeks_json)
            .bind(user_id)
            .bind(stored.version)
            .fetch_optional(&self.pool)
            .await?;

            match row {
                Some(row) => return row.into_stored(),
                None => {
                    tracing::debug!(%user_id, "agenda version moved during merge, retrying");
                }
            }
        }

        Err(AppError::Internal(format!(
            "Agenda write for user {user_id} lost the version race {MAX_WRITE_ATTEMPTS} times"
        )))
    }

    /// Delete the agenda and the user's conversation transcript as one
    /// logical unit.
    pub async fn delete(&self, user_id: Uuid) -> Result<DeletedAgenda, AppError> {
        let mut tx = self.pool.begin().await?;

        let agenda_id: Option<Uuid> =
            sqlx::query_scalar("DELETE FROM agendas WHERE user_id = $1 RETURNING id")
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await?;

        let Some(agenda_id) = agenda_id else {
            return Err(AppError::NotFound { resource: "agenda" });
        };

        let chat_id: Option<Uuid> =
            sqlx::query_scalar("DELETE FROM conversations WHERE user_id = $1 RETURNING id")
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await?;

        tx.commit().await?;

        Ok(DeletedAgenda { agenda_id, chat_id })
    }
}

/// Map a unique-violation on the per-user agenda index to `AlreadyExists`.
/// The index is what makes the at-most-one-live-agenda invariant hold under
/// concurrent creates; everything else stays a generic database failure.
fn translate_insert_conflict(err: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.code().as_deref() == Some("23505") {
            return AppError::AlreadyExists { resource: "agenda" };
        }
    }
    AppError::Database(err)
}

/// Internal row type for sqlx mapping
#[derive(sqlx::FromRow)]
struct AgendaRow {
    id: Uuid,
    #[allow(dead_code)]
    user_id: Uuid,
    goal: String,
    start_date: NaiveDate,
    current_week: i32,
    total_weeks: i32,
    training_frequency: Option<String>,
    injuries: Option<String>,
    work_type: Option<String>,
    user_data: serde_json::Value,
    weeks: serde_json::Value,
    version: i64,
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;

    use super::translate_insert_conflict;
    use crate::error::AppError;

    #[derive(Debug)]
    struct StubDbError(&'static str);

    impl std::fmt::Display for StubDbError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "duplicate key value violates unique constraint")
        }
    }

    impl std::error::Error for StubDbError {}

    impl sqlx::error::DatabaseError for StubDbError {
        fn message(&self) -> &str {
            "duplicate key value violates unique constraint \"agendas_user_id_key\""
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            Some(Cow::Borrowed(self.0))
        }

        fn kind(&self) -> sqlx::error::ErrorKind {
            if self.0 == "23505" {
                sqlx::error::ErrorKind::UniqueViolation
            } else {
                sqlx::error::ErrorKind::Other
            }
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }
    }

    #[test]
    fn second_create_for_a_user_maps_to_already_exists() {
        let err = sqlx::Error::Database(Box::new(StubDbError("23505")));
        assert!(matches!(
            translate_insert_conflict(err),
            AppError::AlreadyExists { resource: "agenda" }
        ));
    }

    #[test]
    fn unrelated_database_errors_pass_through() {
        let err = sqlx::Error::Database(Box::new(StubDbError("42P01")));
        assert!(matches!(
            translate_insert_conflict(err),
            AppError::Database(_)
        ));
    }
}

impl AgendaRow {
    fn into_stored(self) -> Result<StoredAgenda, AppError> {
        let weeks: Vec<Week> = serde_json::from_value(self.weeks)
            .map_err(|e| AppError::Internal(format!("Stored weeks failed to deserialize: {e}")))?;

        Ok(StoredAgenda {
            id: self.id,
            version: self.version,
            agenda: Agenda {
                goal: self.goal,
                start_date: self.start_date,
                current_week: self.current_week.max(1) as u32,
                total_weeks: self.total_weeks.max(1) as u32,
                training_frequency: self.training_frequency,
                injuries: self.injuries,
                work_type: self.work_type,
                user_data: self.user_data,
                weeks,
            },
        })
    }
}
