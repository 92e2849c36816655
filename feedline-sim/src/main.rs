//! Feedline workload simulator.
//!
//! Seeds the in-memory stores, walks a feed page by page, publishes new
//! items, exercises counter reconciliation and prints a JSON report.

mod telemetry;

use std::sync::Arc;

use chrono::{Duration, Utc};
use feedline_core::{
    ConfigError, CounterKey, CounterName, FeedConfig, FeedItem, FeedResult, PageRequest,
    PartitionKey,
};
use feedline_storage::{
    CacheStats, CounterCache, InMemoryFeedStore, InMemoryRemoteStore, ListCache,
    ListCacheBackend, PageSource, Timeline,
};
use serde::Serialize;
use uuid::Uuid;

use crate::telemetry::{init_tracing, TelemetryConfig};

type Item = FeedItem<serde_json::Value>;

/// Outcome of one simulator run.
#[derive(Debug, Serialize)]
struct SimReport {
    items_seeded: usize,
    pages_read: usize,
    pages_from_cache: usize,
    pages_from_store: usize,
    items_walked: usize,
    caught_up: usize,
    counter_reads: usize,
    counter_final: i64,
    cache_stats: CacheStatsReport,
}

#[derive(Debug, Serialize)]
struct CacheStatsReport {
    hits: u64,
    misses: u64,
    pushes: u64,
    populations: u64,
    hit_rate: f64,
}

impl From<CacheStats> for CacheStatsReport {
    fn from(stats: CacheStats) -> Self {
        Self {
            hit_rate: stats.hit_rate(),
            hits: stats.hits,
            misses: stats.misses,
            pushes: stats.pushes,
            populations: stats.populations,
        }
    }
}

#[tokio::main]
async fn main() -> FeedResult<()> {
    init_tracing(&TelemetryConfig::default())?;

    let config = FeedConfig::from_env()?;
    let items_seeded = env_usize(
        "FEEDLINE_SIM_ITEMS",
        config.trust_cap + config.default_page_size * 3,
    )?;
    let counter_reads = env_usize("FEEDLINE_SIM_COUNTER_READS", 5_000)?;
    tracing::info!(?config, items_seeded, "starting feed simulation");

    let remote = Arc::new(InMemoryRemoteStore::new());
    let store = Arc::new(InMemoryFeedStore::<Item>::new());
    let partition = PartitionKey::new("sim-owner");

    let now = Utc::now();
    for i in (0..items_seeded).rev() {
        let at = now - Duration::seconds(i as i64);
        store.insert(FeedItem::new(
            partition.clone(),
            at,
            serde_json::json!({ "seq": i, "text": format!("post #{i}") }),
        ))?;
    }

    let timeline: Timeline<_, _, Item> = Timeline::new(
        ListCache::new(Arc::clone(&remote), config.clone()),
        Arc::clone(&store),
    );

    // Walk the whole feed.
    let mut report = SimReport {
        items_seeded,
        pages_read: 0,
        pages_from_cache: 0,
        pages_from_store: 0,
        items_walked: 0,
        caught_up: 0,
        counter_reads,
        counter_final: 0,
        cache_stats: CacheStats::default().into(),
    };
    let mut request = PageRequest::first(config.default_page_size);
    loop {
        let page = timeline.read_page(&partition, &request).await?;
        report.pages_read += 1;
        report.items_walked += page.page.len();
        match page.served_from {
            PageSource::Cache => report.pages_from_cache += 1,
            PageSource::Authoritative => report.pages_from_store += 1,
        }
        let last = match page.page.items.last() {
            Some(last) if page.page.has_next_page => last.created_at,
            _ => break,
        };
        request = PageRequest::before(last, config.default_page_size);
    }
    tracing::info!(
        pages = report.pages_read,
        from_store = report.pages_from_store,
        "walked feed"
    );

    // Publish a burst and catch up on it.
    let newest = now;
    for i in 0..5 {
        let item = FeedItem::new(
            partition.clone(),
            newest + Duration::seconds(i + 1),
            serde_json::json!({ "seq": -(i + 1), "text": "fresh" }),
        );
        store.insert(item.clone())?;
        timeline.publish(&item).await?;
    }
    let catch_up = timeline
        .read_page(&partition, &PageRequest::after(newest, config.default_page_size))
        .await?;
    report.caught_up = catch_up.page.len();
    tracing::info!(new_items = report.caught_up, "caught up");

    // Drifted counter, repaired by sampled reads.
    let counters = CounterCache::new(Arc::clone(&remote), Arc::clone(&store), &config);
    let likes = CounterKey::new("post", Uuid::now_v7(), CounterName::Likes);
    store.set_children(&likes, 42)?;
    store.set_denormalized(&likes, 45)?;
    for _ in 0..counter_reads {
        report.counter_final = counters.get_count(&likes).await?;
    }
    tracing::info!(counter = %likes, value = report.counter_final, "counter after reads");

    report.cache_stats = remote.stats().await?.into();
    let rendered = serde_json::to_string_pretty(&report).map_err(|e| ConfigError::InvalidValue {
        field: "report".to_string(),
        value: String::new(),
        reason: e.to_string(),
    })?;
    println!("{rendered}");
    Ok(())
}

fn env_usize(name: &str, default: usize) -> FeedResult<usize> {
    match std::env::var(name) {
        Err(_) => Ok(default),
        Ok(raw) => raw.trim().parse().map_err(|e: std::num::ParseIntError| {
            ConfigError::InvalidValue {
                field: name.to_string(),
                value: raw.clone(),
                reason: e.to_string(),
            }
            .into()
        }),
    }
}
