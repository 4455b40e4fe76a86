// src/store/mod.rs
// SQLite persistence for conversations, utterances and quality rows.

pub mod vector;

pub use vector::{QdrantIndex, ScoredMessage, VectorIndex};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;
use tracing::{debug, info};

/// Schema bootstrap, applied at startup and in tests. All timestamps UTC.
const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS conversations (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        topic TEXT NOT NULL,
        current_health_score REAL NOT NULL DEFAULT 100.0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS messages (
        id TEXT PRIMARY KEY,
        conversation_id TEXT NOT NULL,
        sequence_number INTEGER NOT NULL,
        round_number INTEGER NOT NULL,
        turn_index INTEGER NOT NULL,
        agent_name TEXT NOT NULL,
        agent_model TEXT NOT NULL,
        content TEXT NOT NULL,
        tokens_used INTEGER NOT NULL DEFAULT 0,
        response_time_ms REAL NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages(conversation_id, sequence_number)",
    r#"
    CREATE TABLE IF NOT EXISTS message_embeddings (
        id TEXT PRIMARY KEY,
        message_id TEXT NOT NULL UNIQUE,
        embedding_model TEXT NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS contradictions (
        id TEXT PRIMARY KEY,
        conversation_id TEXT NOT NULL,
        message_id_a TEXT NOT NULL,
        message_id_b TEXT NOT NULL,
        similarity REAL NOT NULL,
        severity TEXT NOT NULL,
        explanation TEXT NOT NULL,
        detected_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_contradictions_conversation ON contradictions(conversation_id)",
    r#"
    CREATE TABLE IF NOT EXISTS conversation_loops (
        id TEXT PRIMARY KEY,
        conversation_id TEXT NOT NULL,
        pattern TEXT NOT NULL,
        fingerprint TEXT NOT NULL,
        message_ids TEXT NOT NULL,
        repetition_count INTEGER NOT NULL,
        agents_involved TEXT NOT NULL,
        intervention_text TEXT NOT NULL,
        detected_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_loops_fingerprint ON conversation_loops(conversation_id, fingerprint)",
    r#"
    CREATE TABLE IF NOT EXISTS conversation_quality (
        id TEXT PRIMARY KEY,
        conversation_id TEXT NOT NULL,
        health_score REAL NOT NULL,
        coherence_score REAL NOT NULL,
        contradiction_score REAL NOT NULL,
        loop_score REAL NOT NULL,
        citation_score REAL NOT NULL,
        message_count INTEGER NOT NULL,
        analysis_metadata TEXT NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_quality_conversation ON conversation_quality(conversation_id, created_at)",
    r#"
    CREATE TABLE IF NOT EXISTS message_citations (
        id TEXT PRIMARY KEY,
        message_id TEXT NOT NULL,
        citation_text TEXT NOT NULL,
        source_url TEXT,
        confidence REAL NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    )
    "#,
];

// ============================================================================
// Row types
// ============================================================================

#[derive(Debug, Clone)]
pub struct ConversationRow {
    pub id: String,
    pub title: String,
    pub topic: String,
    pub current_health_score: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A persisted utterance. One-to-one with an in-memory `Response`.
#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: String,
    pub conversation_id: String,
    pub sequence_number: i64,
    pub round_number: i64,
    pub turn_index: i64,
    pub agent_name: String,
    pub agent_model: String,
    pub content: String,
    pub tokens_used: i64,
    pub response_time_ms: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ContradictionRow {
    pub id: String,
    pub conversation_id: String,
    pub message_id_a: String,
    pub message_id_b: String,
    pub similarity: f64,
    pub severity: String,
    pub explanation: String,
    pub detected_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct LoopRow {
    pub id: String,
    pub conversation_id: String,
    pub pattern: String,
    pub fingerprint: String,
    pub message_ids: Vec<String>,
    pub repetition_count: i64,
    pub agents_involved: Vec<String>,
    pub intervention_text: String,
    pub detected_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct HealthSampleRow {
    pub id: String,
    pub conversation_id: String,
    pub health_score: f64,
    pub coherence_score: f64,
    pub contradiction_score: f64,
    pub loop_score: f64,
    pub citation_score: f64,
    pub message_count: i64,
    pub analysis_metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Store
// ============================================================================

/// SQLite-backed store for the quality pipeline and quality read endpoints.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect and run migrations.
    pub async fn connect(database_url: &str) -> Result<Self> {
        info!("Connecting to database: {}", database_url);
        let options = SqliteConnectOptions::from_str(database_url)
            .context("Invalid SQLite database URL")?
            .create_if_missing(true);

        // An in-memory SQLite database is private to its connection; a
        // multi-connection pool would hand out empty databases.
        let mut pool_options = SqlitePoolOptions::new();
        if database_url.contains(":memory:") {
            pool_options = pool_options.max_connections(1);
        }

        let pool = pool_options
            .connect_with(options)
            .await
            .context("Failed to connect to SQLite")?;
        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> Result<()> {
        for statement in MIGRATIONS {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        debug!("Schema migrations applied");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ------------------------------------------------------------------
    // Conversations
    // ------------------------------------------------------------------

    /// Insert the conversation row if it does not exist yet (lazy creation
    /// on the first turn of a debate).
    pub async fn ensure_conversation(&self, id: &str, title: &str, topic: &str) -> Result<()> {
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO conversations (id, title, topic, current_health_score, created_at, updated_at)
            VALUES (?, ?, ?, 100.0, ?, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(title)
        .bind(topic)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn conversation(&self, id: &str) -> Result<Option<ConversationRow>> {
        let row = sqlx::query(
            "SELECT id, title, topic, current_health_score, created_at, updated_at FROM conversations WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| ConversationRow {
            id: r.get("id"),
            title: r.get("title"),
            topic: r.get("topic"),
            current_health_score: r.get("current_health_score"),
            created_at: r.get("created_at"),
            updated_at: r.get("updated_at"),
        }))
    }

    pub async fn update_conversation_health(&self, id: &str, health_score: f64) -> Result<()> {
        sqlx::query("UPDATE conversations SET current_health_score = ?, updated_at = ? WHERE id = ?")
            .bind(health_score)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Messages
    // ------------------------------------------------------------------

    pub async fn insert_message(&self, message: &MessageRow) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO messages (
                id, conversation_id, sequence_number, round_number, turn_index,
                agent_name, agent_model, content, tokens_used, response_time_ms, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&message.id)
        .bind(&message.conversation_id)
        .bind(message.sequence_number)
        .bind(message.round_number)
        .bind(message.turn_index)
        .bind(&message.agent_name)
        .bind(&message.agent_model)
        .bind(&message.content)
        .bind(message.tokens_used)
        .bind(message.response_time_ms)
        .bind(message.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Last `limit` messages of a conversation in sequence order.
    pub async fn recent_messages(&self, conversation_id: &str, limit: i64) -> Result<Vec<MessageRow>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM (
                SELECT id, conversation_id, sequence_number, round_number, turn_index,
                       agent_name, agent_model, content, tokens_used, response_time_ms, created_at
                FROM messages
                WHERE conversation_id = ?
                ORDER BY sequence_number DESC
                LIMIT ?
            ) ORDER BY sequence_number ASC
            "#,
        )
        .bind(conversation_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Self::map_message).collect())
    }

    pub async fn messages_by_ids(&self, ids: &[String]) -> Result<Vec<MessageRow>> {
        // SQLite has no array binds; build the placeholder list by hand.
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT id, conversation_id, sequence_number, round_number, turn_index, \
             agent_name, agent_model, content, tokens_used, response_time_ms, created_at \
             FROM messages WHERE id IN ({placeholders}) ORDER BY sequence_number ASC"
        );
        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(id);
        }
        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Self::map_message).collect())
    }

    pub async fn message_count(&self, conversation_id: &str) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM messages WHERE conversation_id = ?")
            .bind(conversation_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("n"))
    }

    fn map_message(r: sqlx::sqlite::SqliteRow) -> MessageRow {
        MessageRow {
            id: r.get("id"),
            conversation_id: r.get("conversation_id"),
            sequence_number: r.get("sequence_number"),
            round_number: r.get("round_number"),
            turn_index: r.get("turn_index"),
            agent_name: r.get("agent_name"),
            agent_model: r.get("agent_model"),
            content: r.get("content"),
            tokens_used: r.get("tokens_used"),
            response_time_ms: r.get("response_time_ms"),
            created_at: r.get("created_at"),
        }
    }

    // ------------------------------------------------------------------
    // Embedding bookkeeping
    // ------------------------------------------------------------------

    /// Record that a message has a stored embedding. Returns false when the
    /// row already existed (idempotent insert).
    pub async fn record_embedding(&self, message_id: &str, model: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO message_embeddings (id, message_id, embedding_model, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(message_id) DO NOTHING
            "#,
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(message_id)
        .bind(model)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn embedding_count(&self, conversation_id: &str) -> Result<i64> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS n
            FROM message_embeddings me
            JOIN messages m ON me.message_id = m.id
            WHERE m.conversation_id = ?
            "#,
        )
        .bind(conversation_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get("n"))
    }

    // ------------------------------------------------------------------
    // Contradictions
    // ------------------------------------------------------------------

    pub async fn insert_contradiction(&self, row: &ContradictionRow) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO contradictions (
                id, conversation_id, message_id_a, message_id_b,
                similarity, severity, explanation, detected_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&row.id)
        .bind(&row.conversation_id)
        .bind(&row.message_id_a)
        .bind(&row.message_id_b)
        .bind(row.similarity)
        .bind(&row.severity)
        .bind(&row.explanation)
        .bind(row.detected_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_contradictions(
        &self,
        conversation_id: &str,
        severity: Option<&str>,
        limit: i64,
    ) -> Result<Vec<ContradictionRow>> {
        let rows = match severity {
            Some(severity) => {
                sqlx::query(
                    r#"
                    SELECT id, conversation_id, message_id_a, message_id_b,
                           similarity, severity, explanation, detected_at
                    FROM contradictions
                    WHERE conversation_id = ? AND severity = ?
                    ORDER BY detected_at DESC
                    LIMIT ?
                    "#,
                )
                .bind(conversation_id)
                .bind(severity)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT id, conversation_id, message_id_a, message_id_b,
                           similarity, severity, explanation, detected_at
                    FROM contradictions
                    WHERE conversation_id = ?
                    ORDER BY detected_at DESC
                    LIMIT ?
                    "#,
                )
                .bind(conversation_id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows
            .into_iter()
            .map(|r| ContradictionRow {
                id: r.get("id"),
                conversation_id: r.get("conversation_id"),
                message_id_a: r.get("message_id_a"),
                message_id_b: r.get("message_id_b"),
                similarity: r.get("similarity"),
                severity: r.get("severity"),
                explanation: r.get("explanation"),
                detected_at: r.get("detected_at"),
            })
            .collect())
    }

    pub async fn contradiction_count(&self, conversation_id: &str) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM contradictions WHERE conversation_id = ?")
            .bind(conversation_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("n"))
    }

    // ------------------------------------------------------------------
    // Loops
    // ------------------------------------------------------------------

    pub async fn insert_loop(&self, row: &LoopRow) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO conversation_loops (
                id, conversation_id, pattern, fingerprint, message_ids,
                repetition_count, agents_involved, intervention_text, detected_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&row.id)
        .bind(&row.conversation_id)
        .bind(&row.pattern)
        .bind(&row.fingerprint)
        .bind(serde_json::to_string(&row.message_ids)?)
        .bind(row.repetition_count)
        .bind(serde_json::to_string(&row.agents_involved)?)
        .bind(&row.intervention_text)
        .bind(row.detected_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn loop_exists(&self, conversation_id: &str, fingerprint: &str) -> Result<bool> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM conversation_loops WHERE conversation_id = ? AND fingerprint = ?",
        )
        .bind(conversation_id)
        .bind(fingerprint)
        .fetch_one(&self.pool)
        .await?;
        let n: i64 = row.get("n");
        Ok(n > 0)
    }

    pub async fn list_loops(&self, conversation_id: &str, limit: i64) -> Result<Vec<LoopRow>> {
        let rows = sqlx::query(
            r#"
            SELECT id, conversation_id, pattern, fingerprint, message_ids,
                   repetition_count, agents_involved, intervention_text, detected_at
            FROM conversation_loops
            WHERE conversation_id = ?
            ORDER BY detected_at DESC
            LIMIT ?
            "#,
        )
        .bind(conversation_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| {
                let message_ids: String = r.get("message_ids");
                let agents_involved: String = r.get("agents_involved");
                LoopRow {
                    id: r.get("id"),
                    conversation_id: r.get("conversation_id"),
                    pattern: r.get("pattern"),
                    fingerprint: r.get("fingerprint"),
                    message_ids: serde_json::from_str(&message_ids).unwrap_or_default(),
                    repetition_count: r.get("repetition_count"),
                    agents_involved: serde_json::from_str(&agents_involved).unwrap_or_default(),
                    intervention_text: r.get("intervention_text"),
                    detected_at: r.get("detected_at"),
                }
            })
            .collect())
    }

    pub async fn loop_count(&self, conversation_id: &str) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM conversation_loops WHERE conversation_id = ?")
            .bind(conversation_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("n"))
    }

    // ------------------------------------------------------------------
    // Health samples
    // ------------------------------------------------------------------

    pub async fn insert_health_sample(&self, row: &HealthSampleRow) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO conversation_quality (
                id, conversation_id, health_score, coherence_score, contradiction_score,
                loop_score, citation_score, message_count, analysis_metadata, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&row.id)
        .bind(&row.conversation_id)
        .bind(row.health_score)
        .bind(row.coherence_score)
        .bind(row.contradiction_score)
        .bind(row.loop_score)
        .bind(row.citation_score)
        .bind(row.message_count)
        .bind(row.analysis_metadata.to_string())
        .bind(row.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn health_history(&self, conversation_id: &str, limit: i64) -> Result<Vec<HealthSampleRow>> {
        let rows = sqlx::query(
            r#"
            SELECT id, conversation_id, health_score, coherence_score, contradiction_score,
                   loop_score, citation_score, message_count, analysis_metadata, created_at
            FROM conversation_quality
            WHERE conversation_id = ?
            ORDER BY created_at DESC
            LIMIT ?
            "#,
        )
        .bind(conversation_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| {
                let metadata: String = r.get("analysis_metadata");
                HealthSampleRow {
                    id: r.get("id"),
                    conversation_id: r.get("conversation_id"),
                    health_score: r.get("health_score"),
                    coherence_score: r.get("coherence_score"),
                    contradiction_score: r.get("contradiction_score"),
                    loop_score: r.get("loop_score"),
                    citation_score: r.get("citation_score"),
                    message_count: r.get("message_count"),
                    analysis_metadata: serde_json::from_str(&metadata)
                        .unwrap_or(serde_json::Value::Null),
                    created_at: r.get("created_at"),
                }
            })
            .collect())
    }

    pub async fn latest_health_sample(&self, conversation_id: &str) -> Result<Option<HealthSampleRow>> {
        Ok(self.health_history(conversation_id, 1).await?.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> SqliteStore {
        SqliteStore::connect("sqlite::memory:").await.unwrap()
    }

    fn message(conversation_id: &str, seq: i64, agent: &str) -> MessageRow {
        MessageRow {
            id: format!("msg_{seq:08x}"),
            conversation_id: conversation_id.to_string(),
            sequence_number: seq,
            round_number: 1,
            turn_index: seq,
            agent_name: agent.to_string(),
            agent_model: "gpt-4o".to_string(),
            content: format!("message {seq}"),
            tokens_used: 10,
            response_time_ms: 12.5,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn conversation_creation_is_idempotent() {
        let store = test_store().await;
        store.ensure_conversation("c1", "Topic", "Topic").await.unwrap();
        store.ensure_conversation("c1", "Other", "Other").await.unwrap();

        let row = store.conversation("c1").await.unwrap().unwrap();
        assert_eq!(row.title, "Topic");
        assert_eq!(row.current_health_score, 100.0);
    }

    #[tokio::test]
    async fn recent_messages_returns_tail_in_order() {
        let store = test_store().await;
        store.ensure_conversation("c1", "T", "T").await.unwrap();
        for seq in 0..5 {
            store.insert_message(&message("c1", seq, "A")).await.unwrap();
        }

        let tail = store.recent_messages("c1", 3).await.unwrap();
        let sequences: Vec<i64> = tail.iter().map(|m| m.sequence_number).collect();
        assert_eq!(sequences, vec![2, 3, 4]);
    }

    #[tokio::test]
    async fn embedding_record_is_idempotent() {
        let store = test_store().await;
        store.ensure_conversation("c1", "T", "T").await.unwrap();
        store.insert_message(&message("c1", 0, "A")).await.unwrap();

        assert!(store.record_embedding("msg_00000000", "text-embedding-3-small").await.unwrap());
        assert!(!store.record_embedding("msg_00000000", "text-embedding-3-small").await.unwrap());
        assert_eq!(store.embedding_count("c1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn loop_round_trip_preserves_message_ids() {
        let store = test_store().await;
        let row = LoopRow {
            id: "loop_1".to_string(),
            conversation_id: "c1".to_string(),
            pattern: "A -> B".to_string(),
            fingerprint: "abc123".to_string(),
            message_ids: vec!["m1".to_string(), "m2".to_string()],
            repetition_count: 2,
            agents_involved: vec!["A".to_string(), "B".to_string()],
            intervention_text: "Try a new angle.".to_string(),
            detected_at: Utc::now(),
        };
        store.insert_loop(&row).await.unwrap();

        assert!(store.loop_exists("c1", "abc123").await.unwrap());
        assert!(!store.loop_exists("c1", "other").await.unwrap());

        let loops = store.list_loops("c1", 10).await.unwrap();
        assert_eq!(loops.len(), 1);
        assert_eq!(loops[0].message_ids, vec!["m1", "m2"]);
        assert_eq!(loops[0].repetition_count, 2);
    }

    #[tokio::test]
    async fn health_history_is_newest_first() {
        let store = test_store().await;
        for (i, score) in [80.0, 90.0].iter().enumerate() {
            store
                .insert_health_sample(&HealthSampleRow {
                    id: format!("hs_{i}"),
                    conversation_id: "c1".to_string(),
                    health_score: *score,
                    coherence_score: *score,
                    contradiction_score: 100.0,
                    loop_score: 100.0,
                    citation_score: 100.0,
                    message_count: i as i64 + 1,
                    analysis_metadata: serde_json::json!({"status": "good"}),
                    created_at: Utc::now() + chrono::Duration::seconds(i as i64),
                })
                .await
                .unwrap();
        }

        let latest = store.latest_health_sample("c1").await.unwrap().unwrap();
        assert_eq!(latest.health_score, 90.0);
        assert_eq!(store.health_history("c1", 10).await.unwrap().len(), 2);
    }
}
