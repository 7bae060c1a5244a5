//! Store queries
//!
//! The query surface the pipelines use: population enumerations (always
//! in stable id order, so batch generation is deterministic), parent
//! lookup, child-id preloads, and the write operations. One `Store`
//! wraps the shared pool; writer calls run sequentially on the task that
//! consumes the fan-out stream.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

use super::models::Subreddit;
use super::DbResult;
use crate::reddit::{PostMetrics, SnapshotMetrics, SubredditMetaFields};

/// Query handle over the shared connection pool.
#[derive(Clone)]
pub struct Store {
    pool: PgPool,
}

impl Store {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // ========================================================================
    // Population enumerations
    // ========================================================================

    /// Every subreddit name, in stable id order.
    pub async fn all_subreddit_names(&self) -> DbResult<Vec<String>> {
        let rows = sqlx::query("SELECT name FROM subreddits ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|row| row.get("name")).collect())
    }

    /// Names of subreddits assessed as marketable, in stable id order.
    pub async fn marketable_subreddit_names(&self) -> DbResult<Vec<String>> {
        let rows = sqlx::query(
            r#"
            SELECT s.name
            FROM subreddits s
            JOIN subreddit_assessments a ON a.subreddit_id = s.id
            WHERE a.is_marketable = 'yes'
            GROUP BY s.id, s.name
            ORDER BY s.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|row| row.get("name")).collect())
    }

    /// Subreddits that have no metadata row yet, bounded by `limit`.
    pub async fn subreddits_missing_meta(&self, limit: i64) -> DbResult<Vec<Subreddit>> {
        let rows = sqlx::query_as::<_, Subreddit>(
            r#"
            SELECT id, name, title, created_utc, is_nsfw, subreddit_type, lang
            FROM subreddits
            WHERE id NOT IN (SELECT subreddit_id FROM subreddit_meta)
            ORDER BY id
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    // ========================================================================
    // Parent lookup
    // ========================================================================

    pub async fn subreddit_by_name(&self, name: &str) -> DbResult<Option<Subreddit>> {
        let row = sqlx::query_as::<_, Subreddit>(
            r#"
            SELECT id, name, title, created_utc, is_nsfw, subreddit_type, lang
            FROM subreddits
            WHERE name = $1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    // ========================================================================
    // Posts (duplicate-safe children)
    // ========================================================================

    /// Preload the stored post ids for one parent — a single query per
    /// outcome, never one per child.
    pub async fn existing_post_ids(&self, subreddit_id: i64) -> DbResult<HashSet<String>> {
        let rows = sqlx::query("SELECT post_id FROM subreddit_posts WHERE subreddit_id = $1")
            .bind(subreddit_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|row| row.get("post_id")).collect())
    }

    /// Insert one post, returning `false` when the natural key already
    /// exists. A conflicting concurrent insert is a no-op, identical to
    /// "skipped as duplicate".
    pub async fn insert_post(
        &self,
        subreddit_id: i64,
        post: &PostMetrics,
        fetched_at: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO subreddit_posts
                (subreddit_id, post_id, title, score, num_comments, created_utc, fetched_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (subreddit_id, post_id) DO NOTHING
            "#,
        )
        .bind(subreddit_id)
        .bind(&post.post_id)
        .bind(&post.title)
        .bind(post.score)
        .bind(post.num_comments)
        .bind(post.created_utc)
        .bind(fetched_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    // ========================================================================
    // Meta (one row per parent, upsert)
    // ========================================================================

    /// Upsert the metadata row for one subreddit inside a transaction;
    /// any failure rolls the whole record back.
    pub async fn upsert_meta(
        &self,
        subreddit_id: i64,
        meta: &SubredditMetaFields,
    ) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO subreddit_meta
                (subreddit_id, description, rules_json, flairs_json,
                 allow_videos, allow_images, allow_links, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, now())
            ON CONFLICT (subreddit_id) DO UPDATE SET
                description  = EXCLUDED.description,
                rules_json   = EXCLUDED.rules_json,
                flairs_json  = EXCLUDED.flairs_json,
                allow_videos = EXCLUDED.allow_videos,
                allow_images = EXCLUDED.allow_images,
                allow_links  = EXCLUDED.allow_links,
                updated_at   = now()
            "#,
        )
        .bind(subreddit_id)
        .bind(&meta.description)
        .bind(&meta.rules_json)
        .bind(&meta.flairs_json)
        .bind(meta.allow_videos)
        .bind(meta.allow_images)
        .bind(meta.allow_links)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    // ========================================================================
    // Snapshots (append-only)
    // ========================================================================

    pub async fn insert_snapshot(
        &self,
        subreddit_id: i64,
        captured_at: DateTime<Utc>,
        metrics: &SnapshotMetrics,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO subreddit_snapshots
                (subreddit_id, captured_at, subscribers, posts_in_window,
                 comments_in_window, avg_score_in_window, top_score_in_window)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(subreddit_id)
        .bind(captured_at)
        .bind(metrics.subscribers)
        .bind(metrics.posts_in_window)
        .bind(metrics.comments_in_window)
        .bind(metrics.avg_score_in_window)
        .bind(metrics.top_score_in_window)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
