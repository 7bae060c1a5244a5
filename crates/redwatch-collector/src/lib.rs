//! Redwatch Collector Library
//!
//! Batched, rate-limited, resumable collection of per-subreddit metrics
//! from the Reddit API into PostgreSQL.
//!
//! # Architecture
//!
//! - **engine**: the generic collection machinery — token-bucket rate
//!   limiter, bounded fan-out with completion-order results, durable batch
//!   store with a rotating cursor, exclusive run lock, run summaries.
//! - **reddit**: the Reddit API client and per-subreddit collector.
//! - **db**: PostgreSQL pool, row models, store queries, and the
//!   duplicate-safe post writer.
//! - **pipelines**: the concrete hot-posts / snapshot / meta-update runs
//!   built by parameterizing the engine.
//!
//! # Example
//!
//! ```no_run
//! use redwatch_collector::config::Config;
//! use redwatch_collector::pipelines::hot_posts::HotPostsPipeline;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let pool = redwatch_collector::db::connect(&config.database).await?;
//!     let summary = HotPostsPipeline::new(config, pool).run().await?;
//!     println!("{}", summary.render("hot posts"));
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod db;
pub mod engine;
pub mod notify;
pub mod pipelines;
pub mod reddit;
