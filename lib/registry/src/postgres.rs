//! Postgres-backed registry.
//!
//! The registry owns its connection pool: [`PgRegistry::connect`] creates it,
//! [`Registry::shutdown`] closes it. Every operation draws one connection
//! from the pool for its duration; transactions roll back when dropped, so
//! the connection is returned on error paths too.

use crate::config::DatabaseConfig;
use crate::error::RegistryError;
use crate::registry::Registry;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use notiteams_core::{
    ConversationKey, ConversationReference, ConversationReferenceId, ConversationToken,
    ConversationTokenId, DEFAULT_TOKEN_DESCRIPTION, DeletionEntry, DeletionEntryId,
    IdentityMapping, IssuanceState, ParseIdError, Result, TokenRequest,
};
use sqlx::migrate::Migrator;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{FromRow, PgConnection, PgPool};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Embedded schema migrations.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Registry backed by a bounded Postgres connection pool.
#[derive(Debug, Clone)]
pub struct PgRegistry {
    pool: PgPool,
}

impl PgRegistry {
    /// Creates the connection pool.
    ///
    /// # Errors
    ///
    /// Returns a connectivity error if the URL is invalid or the database
    /// cannot be reached.
    pub async fn connect(database_url: &str, config: &DatabaseConfig) -> Result<Self, RegistryError> {
        let options = PgConnectOptions::from_str(database_url)
            .map_err(db_err("connect"))?
            .application_name(&config.application_name);

        info!(
            max_connections = config.max_connections,
            "creating database connection pool"
        );
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .connect_with(options)
            .await
            .map_err(db_err("connect"))?;

        Ok(Self { pool })
    }

    /// Wraps an existing pool.
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the embedded migrations.
    pub async fn migrate(&self) -> Result<(), RegistryError> {
        info!("running database migrations");
        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| RegistryError::Query {
                operation: "migrate",
                details: e.to_string(),
            })?;
        Ok(())
    }

    /// Returns the underlying pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn db_err(operation: &'static str) -> impl Fn(sqlx::Error) -> RegistryError {
    move |e| RegistryError::from_sqlx(operation, &e)
}

fn decode_id<T>(raw: &str) -> std::result::Result<T, sqlx::Error>
where
    T: FromStr<Err = ParseIdError>,
{
    T::from_str(raw).map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

/// Row type for identity mapping queries.
#[derive(FromRow)]
struct IdentityRow {
    external_id: String,
    tenant_id: String,
    platform_user_id: String,
    name: Option<String>,
}

impl From<IdentityRow> for IdentityMapping {
    fn from(row: IdentityRow) -> Self {
        IdentityMapping {
            external_id: row.external_id,
            tenant_id: row.tenant_id,
            platform_user_id: row.platform_user_id,
            name: row.name,
        }
    }
}

/// A reference joined with its earliest token, if any.
#[derive(FromRow)]
struct IssuanceRow {
    reference_id: String,
    token: Option<String>,
}

/// Row type for conversation reference queries.
#[derive(FromRow)]
struct ReferenceRow {
    id: String,
    tenant_id: String,
    conversation_id: String,
    requester_id: String,
    serialized_reference: String,
    serialized_activity: String,
    created_at: DateTime<Utc>,
}

impl ReferenceRow {
    fn try_into_reference(self) -> std::result::Result<ConversationReference, sqlx::Error> {
        Ok(ConversationReference {
            id: decode_id(&self.id)?,
            key: ConversationKey::new(self.tenant_id, self.conversation_id, self.requester_id),
            serialized_reference: self.serialized_reference,
            serialized_activity: self.serialized_activity,
            created_at: self.created_at,
        })
    }
}

/// Row type for deferred deletion queries.
#[derive(FromRow)]
struct DeletionRow {
    id: String,
    conversation_id: String,
    message_id: String,
    created_at: DateTime<Utc>,
}

impl DeletionRow {
    fn try_into_entry(self) -> std::result::Result<DeletionEntry, sqlx::Error> {
        Ok(DeletionEntry {
            id: decode_id(&self.id)?,
            conversation_id: self.conversation_id,
            message_id: self.message_id,
            created_at: self.created_at,
        })
    }
}

/// Reads the reference for `key` and its earliest token.
async fn lookup_issuance_state(
    conn: &mut PgConnection,
    key: &ConversationKey,
) -> std::result::Result<IssuanceState, sqlx::Error> {
    let row: Option<IssuanceRow> = sqlx::query_as(
        r#"
        SELECT cr.id AS reference_id, ct.token
        FROM conversation_reference cr
        LEFT JOIN conversation_token ct ON ct.conversation_reference_id = cr.id
        WHERE cr.tenant_id = $1 AND cr.conversation_id = $2 AND cr.requester_id = $3
        ORDER BY ct.created_at ASC NULLS LAST, ct.id ASC
        LIMIT 1
        "#,
    )
    .bind(&key.tenant_id)
    .bind(&key.conversation_id)
    .bind(&key.requester_id)
    .fetch_optional(&mut *conn)
    .await?;

    let lookup = match row {
        Some(r) => Some((
            decode_id::<ConversationReferenceId>(&r.reference_id)?,
            r.token.map(ConversationToken::from),
        )),
        None => None,
    };
    Ok(IssuanceState::from_lookup(lookup))
}

/// Inserts a reference under the triple's uniqueness constraint.
///
/// Returns `None` when a concurrent caller already holds the triple.
async fn insert_reference(
    conn: &mut PgConnection,
    request: &TokenRequest,
) -> std::result::Result<Option<ConversationReferenceId>, sqlx::Error> {
    let id = ConversationReferenceId::new();
    let inserted: Option<(String,)> = sqlx::query_as(
        r#"
        INSERT INTO conversation_reference
            (id, tenant_id, conversation_id, requester_id,
             serialized_reference, serialized_activity)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (tenant_id, conversation_id, requester_id) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(id.to_string())
    .bind(&request.key.tenant_id)
    .bind(&request.key.conversation_id)
    .bind(&request.key.requester_id)
    .bind(&request.serialized_reference)
    .bind(&request.serialized_activity)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(inserted.map(|_| id))
}

async fn insert_token(
    conn: &mut PgConnection,
    reference_id: ConversationReferenceId,
) -> std::result::Result<Option<ConversationToken>, sqlx::Error> {
    let token_id = ConversationTokenId::new();
    let row: Option<(String,)> = sqlx::query_as(
        r#"
        INSERT INTO conversation_token (id, conversation_reference_id, token, description)
        VALUES ($1, $2, $3, $4)
        RETURNING token
        "#,
    )
    .bind(token_id.to_string())
    .bind(reference_id.to_string())
    .bind(ConversationToken::generate().as_str())
    .bind(DEFAULT_TOKEN_DESCRIPTION)
    .fetch_optional(&mut *conn)
    .await?;

    if row.is_some() {
        debug!(%token_id, %reference_id, "attached new token");
    }
    Ok(row.map(|(token,)| ConversationToken::from(token)))
}

#[async_trait]
impl Registry for PgRegistry {
    #[instrument(skip(self, mapping), fields(external_id = %mapping.external_id))]
    async fn upsert_identity(&self, mapping: &IdentityMapping) -> Result<(), RegistryError> {
        sqlx::query(
            r#"
            INSERT INTO identity_mapping (external_id, tenant_id, platform_user_id, name, updated_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (external_id) DO UPDATE
            SET tenant_id = EXCLUDED.tenant_id,
                platform_user_id = EXCLUDED.platform_user_id,
                name = COALESCE(EXCLUDED.name, identity_mapping.name),
                updated_at = NOW()
            "#,
        )
        .bind(&mapping.external_id)
        .bind(&mapping.tenant_id)
        .bind(&mapping.platform_user_id)
        .bind(&mapping.name)
        .execute(&self.pool)
        .await
        .map_err(db_err("upsert_identity"))?;

        debug!("identity saved");
        Ok(())
    }

    async fn find_identity(
        &self,
        external_id: &str,
    ) -> Result<Option<IdentityMapping>, RegistryError> {
        let row: Option<IdentityRow> = sqlx::query_as(
            r#"
            SELECT external_id, tenant_id, platform_user_id, name
            FROM identity_mapping
            WHERE external_id = $1
            "#,
        )
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err("find_identity"))?;

        Ok(row.map(IdentityMapping::from))
    }

    #[instrument(skip(self, request), fields(key = %request.key))]
    async fn get_or_create_token(
        &self,
        request: &TokenRequest,
    ) -> Result<ConversationToken, RegistryError> {
        const OP: &str = "get_or_create_token";

        let mut tx = self.pool.begin().await.map_err(db_err(OP))?;

        let state = lookup_issuance_state(&mut tx, &request.key)
            .await
            .map_err(db_err(OP))?;
        debug!(state = state.as_str(), "resolved issuance state");

        let reference_id = match state {
            IssuanceState::HasToken { token, .. } => {
                tx.commit().await.map_err(db_err(OP))?;
                return Ok(token);
            }
            IssuanceState::ReferenceNoToken { reference_id } => reference_id,
            IssuanceState::NoReference => {
                match insert_reference(&mut tx, request).await.map_err(db_err(OP))? {
                    Some(reference_id) => reference_id,
                    None => {
                        // Lost the insert race. Under READ COMMITTED the next
                        // statement sees the winner's committed row.
                        debug!("reference created concurrently, re-selecting");
                        match lookup_issuance_state(&mut tx, &request.key)
                            .await
                            .map_err(db_err(OP))?
                        {
                            IssuanceState::HasToken { token, .. } => {
                                tx.commit().await.map_err(db_err(OP))?;
                                return Ok(token);
                            }
                            IssuanceState::ReferenceNoToken { reference_id } => reference_id,
                            IssuanceState::NoReference => {
                                return Err(RegistryError::InvariantViolation {
                                    details: format!(
                                        "conversation reference for {} conflicted but is not visible",
                                        request.key
                                    ),
                                }
                                .into());
                            }
                        }
                    }
                }
            }
        };

        let token = insert_token(&mut tx, reference_id)
            .await
            .map_err(db_err(OP))?
            .ok_or_else(|| RegistryError::InvariantViolation {
                details: format!("token row for reference {reference_id} was not returned"),
            })?;

        tx.commit().await.map_err(db_err(OP))?;
        Ok(token)
    }

    async fn resolve_token(
        &self,
        token: &str,
    ) -> Result<Option<ConversationReference>, RegistryError> {
        let row: Option<ReferenceRow> = sqlx::query_as(
            r#"
            SELECT cr.id, cr.tenant_id, cr.conversation_id, cr.requester_id,
                   cr.serialized_reference, cr.serialized_activity, cr.created_at
            FROM conversation_token ct
            JOIN conversation_reference cr ON cr.id = ct.conversation_reference_id
            WHERE ct.token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err("resolve_token"))?;

        match row {
            Some(r) => Ok(Some(
                r.try_into_reference().map_err(db_err("resolve_token"))?,
            )),
            None => Ok(None),
        }
    }

    #[instrument(skip(self))]
    async fn schedule_deletion(
        &self,
        conversation_id: &str,
        message_id: &str,
    ) -> Result<DeletionEntryId, RegistryError> {
        let id = DeletionEntryId::new();
        sqlx::query(
            r#"
            INSERT INTO deferred_deletion (id, conversation_id, message_id)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(id.to_string())
        .bind(conversation_id)
        .bind(message_id)
        .execute(&self.pool)
        .await
        .map_err(db_err("schedule_deletion"))?;

        Ok(id)
    }

    async fn sweep_expired(&self, max_age: Duration) -> Result<Vec<DeletionEntry>, RegistryError> {
        let rows: Vec<DeletionRow> = sqlx::query_as(
            r#"
            SELECT id, conversation_id, message_id, created_at
            FROM deferred_deletion
            WHERE created_at < NOW() - make_interval(secs => $1)
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(max_age.as_secs_f64())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err("sweep_expired"))?;

        rows.into_iter()
            .map(|r| r.try_into_entry().map_err(db_err("sweep_expired")))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    async fn delete_entry(&self, id: DeletionEntryId) -> Result<(), RegistryError> {
        sqlx::query(
            r#"
            DELETE FROM deferred_deletion
            WHERE id = $1
            "#,
        )
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(db_err("delete_entry"))?;

        Ok(())
    }

    async fn health_check(&self) -> bool {
        let result: std::result::Result<Option<i32>, sqlx::Error> =
            sqlx::query_scalar("SELECT 1 FROM conversation_reference LIMIT 1")
                .fetch_optional(&self.pool)
                .await;

        match result {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "health check failed");
                false
            }
        }
    }

    async fn shutdown(&self) {
        info!("closing database connection pool");
        self.pool.close().await;
    }
}
