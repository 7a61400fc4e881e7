use anyhow::{Context, Result};
use sqlx::{postgres::PgPoolOptions, types::Json, PgPool, Row};

use crate::logic::error::ArbitrationError;
use crate::model::{
    CapacityPot, ConflictDocument, ConflictGroup, ConflictKind, ConflictTrigger, Id, Request, Slot,
};
use crate::store::traits::{CatalogStore, ConflictStore, GroupStore, RequestStore};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS requests (
        id TEXT PRIMARY KEY,
        operator TEXT NOT NULL,
        status TEXT NOT NULL,
        data JSONB NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS capacity_pots (
        id TEXT PRIMARY KEY,
        data JSONB NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS slots (
        id TEXT PRIMARY KEY,
        pot_id TEXT REFERENCES capacity_pots(id),
        data JSONB NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS conflicts (
        id TEXT PRIMARY KEY,
        conflict_kind TEXT NOT NULL,
        triggering_pot TEXT,
        triggering_slot TEXT,
        status TEXT NOT NULL,
        data JSONB NOT NULL,
        created_at TIMESTAMPTZ NOT NULL,
        CONSTRAINT conflicts_single_trigger CHECK (
            (triggering_pot IS NULL) <> (triggering_slot IS NULL)
        )
    )
    "#,
    "CREATE INDEX IF NOT EXISTS conflicts_kind_idx ON conflicts (conflict_kind, created_at)",
    r#"
    CREATE TABLE IF NOT EXISTS conflict_groups (
        id TEXT PRIMARY KEY,
        key TEXT NOT NULL UNIQUE,
        conflict_kind TEXT NOT NULL,
        status TEXT NOT NULL,
        data JSONB NOT NULL
    )
    "#,
];

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new PostgreSQL store with the given database URL
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("Failed to create PostgreSQL connection pool")?;

        Ok(Self { pool })
    }

    /// Create tables and indexes if they do not exist yet
    pub async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .context("Failed to apply schema")?;
        }
        Ok(())
    }
}

/// Rebuild a conflict from its row; the trigger columns are authoritative
fn conflict_from_row(row: &sqlx::postgres::PgRow) -> Result<ConflictDocument> {
    let id: String = row.get("id");
    let kind: String = row.get("conflict_kind");
    let pot: Option<String> = row.get("triggering_pot");
    let slot: Option<String> = row.get("triggering_slot");

    let kind: ConflictKind = kind
        .parse()
        .map_err(|e: String| ArbitrationError::DataIntegrity(format!("conflict {}: {}", id, e)))?;
    let trigger = match (kind, pot, slot) {
        (ConflictKind::Pot, Some(triggering_pot), None) => ConflictTrigger::Pot { triggering_pot },
        (ConflictKind::Slot, None, Some(triggering_slot)) => ConflictTrigger::Slot { triggering_slot },
        (kind, _, _) => {
            return Err(ArbitrationError::DataIntegrity(format!(
                "conflict {} of kind {} has no matching triggering resource",
                id, kind
            ))
            .into())
        }
    };

    let Json(mut conflict): Json<ConflictDocument> = row
        .try_get("data")
        .with_context(|| format!("Failed to decode conflict {}", id))?;
    conflict.trigger = trigger;
    Ok(conflict)
}

#[async_trait::async_trait]
impl RequestStore for PostgresStore {
    async fn get_request(&self, id: &Id) -> Result<Option<Request>> {
        let row = sqlx::query("SELECT data FROM requests WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch request")?;

        let Some(row) = row else {
            return Ok(None);
        };
        let Json(request): Json<Request> = row.try_get("data")?;
        Ok(Some(request))
    }

    async fn get_requests(&self, ids: &[Id]) -> Result<Vec<Request>> {
        let rows = sqlx::query("SELECT data FROM requests WHERE id = ANY($1) ORDER BY id")
            .bind(ids)
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch requests")?;

        rows.iter()
            .map(|row| {
                let Json(request): Json<Request> = row.try_get("data")?;
                Ok(request)
            })
            .collect()
    }

    async fn upsert_request(&self, request: Request) -> Result<()> {
        let status = serde_json::to_value(request.status)?
            .as_str()
            .unwrap_or_default()
            .to_string();

        sqlx::query(
            r#"
            INSERT INTO requests (id, operator, status, data, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET
                operator = EXCLUDED.operator,
                status = EXCLUDED.status,
                data = EXCLUDED.data,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&request.id)
        .bind(&request.operator)
        .bind(status)
        .bind(Json(&request))
        .bind(request.updated_at)
        .execute(&self.pool)
        .await
        .context("Failed to upsert request")?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl CatalogStore for PostgresStore {
    async fn get_slot(&self, id: &Id) -> Result<Option<Slot>> {
        let row = sqlx::query("SELECT data FROM slots WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch slot")?;

        let Some(row) = row else {
            return Ok(None);
        };
        let Json(slot): Json<Slot> = row.try_get("data")?;
        Ok(Some(slot))
    }

    async fn list_slots(&self) -> Result<Vec<Slot>> {
        let rows = sqlx::query("SELECT data FROM slots ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list slots")?;

        rows.iter()
            .map(|row| {
                let Json(slot): Json<Slot> = row.try_get("data")?;
                Ok(slot)
            })
            .collect()
    }

    async fn upsert_slot(&self, slot: Slot) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO slots (id, pot_id, data)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET
                pot_id = EXCLUDED.pot_id,
                data = EXCLUDED.data
            "#,
        )
        .bind(&slot.id)
        .bind(&slot.pot_id)
        .bind(Json(&slot))
        .execute(&self.pool)
        .await
        .context("Failed to upsert slot")?;

        Ok(())
    }

    async fn get_pot(&self, id: &Id) -> Result<Option<CapacityPot>> {
        let row = sqlx::query("SELECT data FROM capacity_pots WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch capacity pot")?;

        let Some(row) = row else {
            return Ok(None);
        };
        let Json(pot): Json<CapacityPot> = row.try_get("data")?;
        Ok(Some(pot))
    }

    async fn list_pots(&self) -> Result<Vec<CapacityPot>> {
        let rows = sqlx::query("SELECT data FROM capacity_pots ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list capacity pots")?;

        rows.iter()
            .map(|row| {
                let Json(pot): Json<CapacityPot> = row.try_get("data")?;
                Ok(pot)
            })
            .collect()
    }

    async fn upsert_pot(&self, pot: CapacityPot) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO capacity_pots (id, data)
            VALUES ($1, $2)
            ON CONFLICT (id) DO UPDATE SET data = EXCLUDED.data
            "#,
        )
        .bind(&pot.id)
        .bind(Json(&pot))
        .execute(&self.pool)
        .await
        .context("Failed to upsert capacity pot")?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl ConflictStore for PostgresStore {
    async fn get_conflict(&self, id: &Id) -> Result<Option<ConflictDocument>> {
        let row = sqlx::query(
            "SELECT id, conflict_kind, triggering_pot, triggering_slot, data FROM conflicts WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch conflict")?;

        row.as_ref().map(conflict_from_row).transpose()
    }

    async fn list_conflicts(&self, kind: Option<ConflictKind>) -> Result<Vec<ConflictDocument>> {
        let rows = sqlx::query(
            r#"
            SELECT id, conflict_kind, triggering_pot, triggering_slot, data
            FROM conflicts
            WHERE $1::TEXT IS NULL OR conflict_kind = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(kind.map(|k| k.to_string()))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list conflicts")?;

        rows.iter().map(conflict_from_row).collect()
    }

    async fn upsert_conflict(&self, conflict: ConflictDocument) -> Result<()> {
        let (pot, slot) = match &conflict.trigger {
            ConflictTrigger::Pot { triggering_pot } => (Some(triggering_pot), None),
            ConflictTrigger::Slot { triggering_slot } => (None, Some(triggering_slot)),
        };

        sqlx::query(
            r#"
            INSERT INTO conflicts (id, conflict_kind, triggering_pot, triggering_slot, status, data, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET
                status = EXCLUDED.status,
                data = EXCLUDED.data
            "#,
        )
        .bind(&conflict.id)
        .bind(conflict.kind().to_string())
        .bind(pot)
        .bind(slot)
        .bind(conflict.status.as_str())
        .bind(Json(&conflict))
        .bind(conflict.created_at)
        .execute(&self.pool)
        .await
        .context("Failed to upsert conflict")?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl GroupStore for PostgresStore {
    async fn get_group(&self, id: &Id) -> Result<Option<ConflictGroup>> {
        let row = sqlx::query("SELECT data FROM conflict_groups WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch conflict group")?;

        let Some(row) = row else {
            return Ok(None);
        };
        let Json(group): Json<ConflictGroup> = row.try_get("data")?;
        Ok(Some(group))
    }

    async fn list_groups(&self) -> Result<Vec<ConflictGroup>> {
        let rows = sqlx::query("SELECT data FROM conflict_groups ORDER BY key")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list conflict groups")?;

        rows.iter()
            .map(|row| {
                let Json(group): Json<ConflictGroup> = row.try_get("data")?;
                Ok(group)
            })
            .collect()
    }

    async fn upsert_group(&self, group: ConflictGroup) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO conflict_groups (id, key, conflict_kind, status, data)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET
                status = EXCLUDED.status,
                data = EXCLUDED.data
            "#,
        )
        .bind(&group.id)
        .bind(&group.key)
        .bind(group.conflict_kind.to_string())
        .bind(group.status.as_str())
        .bind(Json(&group))
        .execute(&self.pool)
        .await
        .context("Failed to upsert conflict group")?;

        Ok(())
    }

    async fn delete_group(&self, id: &Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM conflict_groups WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete conflict group")?;

        Ok(result.rows_affected() > 0)
    }
}
