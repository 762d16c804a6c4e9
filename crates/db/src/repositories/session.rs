use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite};

use cargolink_core::domain::calculation::CalculationId;
use cargolink_core::domain::order::{DealId, OrderId};
use cargolink_core::domain::session::{
    BotRole, ChatProfile, ChatSession, ConversationState, Patch, SessionKey, SessionPatch,
    StateGuard,
};

use super::{parse_timestamp, timestamp, RepositoryError, SessionRepository};
use crate::DbPool;

const SESSION_COLUMNS: &str = "chat_id, bot_role, state, active_order_id, active_calc_id, \
     active_deal_id, username, first_name, last_name, created_at, updated_at";

pub struct SqlSessionRepository {
    pool: DbPool,
}

impl SqlSessionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn decode<T: for<'r> sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite>>(
    row: &SqliteRow,
    column: &str,
) -> Result<T, RepositoryError> {
    row.try_get(column).map_err(|e| RepositoryError::Decode(e.to_string()))
}

fn row_to_session(row: &SqliteRow) -> Result<ChatSession, RepositoryError> {
    let role: String = decode(row, "bot_role")?;
    let role = role.parse::<BotRole>().map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let state: Option<String> = decode(row, "state")?;
    let state = state
        .map(|value| value.parse::<ConversationState>())
        .transpose()
        .map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at: String = decode(row, "created_at")?;
    let updated_at: String = decode(row, "updated_at")?;

    Ok(ChatSession {
        key: SessionKey::new(decode(row, "chat_id")?, role),
        profile: ChatProfile {
            username: decode(row, "username")?,
            first_name: decode(row, "first_name")?,
            last_name: decode(row, "last_name")?,
        },
        state,
        active_order: decode::<Option<String>>(row, "active_order_id")?.map(OrderId),
        active_calculation: decode::<Option<String>>(row, "active_calc_id")?.map(CalculationId),
        active_deal: decode::<Option<String>>(row, "active_deal_id")?.map(DealId),
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

fn push_column(builder: &mut QueryBuilder<'_, Sqlite>, column: &str, patch: Patch<String>) {
    match patch {
        Patch::Keep => {}
        Patch::Set(value) => {
            builder.push(format!(", {column} = "));
            builder.push_bind(value);
        }
        Patch::Clear => {
            builder.push(format!(", {column} = NULL"));
        }
    }
}

#[async_trait::async_trait]
impl SessionRepository for SqlSessionRepository {
    async fn find(&self, key: &SessionKey) -> Result<Option<ChatSession>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {SESSION_COLUMNS} FROM chat_sessions WHERE chat_id = ? AND bot_role = ?"
        ))
        .bind(key.chat_id)
        .bind(key.role.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_session).transpose()
    }

    async fn register(
        &self,
        key: &SessionKey,
        profile: &ChatProfile,
        now: DateTime<Utc>,
    ) -> Result<ChatSession, RepositoryError> {
        let now = timestamp(now);
        let row = sqlx::query(&format!(
            "INSERT INTO chat_sessions (chat_id, bot_role, username, first_name, last_name,
                                        created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(chat_id, bot_role) DO UPDATE SET
                 username = COALESCE(excluded.username, chat_sessions.username),
                 first_name = COALESCE(excluded.first_name, chat_sessions.first_name),
                 last_name = COALESCE(excluded.last_name, chat_sessions.last_name),
                 updated_at = excluded.updated_at
             RETURNING {SESSION_COLUMNS}"
        ))
        .bind(key.chat_id)
        .bind(key.role.as_str())
        .bind(&profile.username)
        .bind(&profile.first_name)
        .bind(&profile.last_name)
        .bind(&now)
        .bind(&now)
        .fetch_one(&self.pool)
        .await?;

        row_to_session(&row)
    }

    async fn update(
        &self,
        key: &SessionKey,
        guard: StateGuard,
        patch: &SessionPatch,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE chat_sessions SET updated_at = ");
        builder.push_bind(timestamp(now));
        push_column(&mut builder, "state", patch.state.map(|s| s.as_str().to_owned()));
        push_column(&mut builder, "active_order_id", patch.active_order.map(|id| id.0.clone()));
        push_column(
            &mut builder,
            "active_calc_id",
            patch.active_calculation.map(|id| id.0.clone()),
        );
        push_column(&mut builder, "active_deal_id", patch.active_deal.map(|id| id.0.clone()));

        builder.push(" WHERE chat_id = ");
        builder.push_bind(key.chat_id);
        builder.push(" AND bot_role = ");
        builder.push_bind(key.role.as_str());
        match guard {
            StateGuard::Any => {}
            StateGuard::Is(Some(state)) => {
                builder.push(" AND state = ");
                builder.push_bind(state.as_str());
            }
            StateGuard::Is(None) => {
                builder.push(" AND state IS NULL");
            }
        }

        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_by_username(
        &self,
        role: BotRole,
        username: &str,
    ) -> Result<Option<ChatSession>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {SESSION_COLUMNS} FROM chat_sessions
             WHERE bot_role = ? AND username = ? COLLATE NOCASE
             ORDER BY updated_at DESC
             LIMIT 1"
        ))
        .bind(role.as_str())
        .bind(username.trim_start_matches('@'))
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_session).transpose()
    }
}
