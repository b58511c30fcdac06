//! Chart history service
//!
//! Serves per-sensor history series, fetched on demand from the gateway
//! and held in a TTL cache. Entries expire lazily; a burst of new alarms
//! flushes the whole cache so charts pick up fresh data immediately.

use std::sync::Arc;

use chrono::Utc;
use gridwatch_cache::{CacheStats, TtlCache};
use gridwatch_model::{ChartSeries, SeriesKey};
use tracing::{debug, warn};

use crate::error::Result;
use crate::payload;
use crate::remote::QueryClient;

pub struct ChartService {
    client: Arc<dyn QueryClient>,
    cache: TtlCache<SeriesKey, Arc<ChartSeries>>,
    history_template: String,
    window: chrono::Duration,
}

impl ChartService {
    pub fn new(
        client: Arc<dyn QueryClient>,
        ttl: std::time::Duration,
        history_template: String,
        window_hours: i64,
    ) -> Self {
        Self {
            client,
            cache: TtlCache::new(ttl),
            history_template,
            window: chrono::Duration::hours(window_hours),
        }
    }

    /// Returns the series for `key`, from cache when fresh, otherwise
    /// fetched from the gateway. A fetched series is cached even when
    /// empty.
    pub async fn series(&self, key: SeriesKey) -> Result<Arc<ChartSeries>> {
        if let Some(series) = self.cache.get(&key) {
            debug!("chart {key} served from cache ({} points)", series.len());
            return Ok(series);
        }

        let query = self.render_query(key);
        let body = self.client.execute(&query).await?;
        let rows = payload::parse_rows(&body)?;
        let batch = payload::parse_chart_samples(&rows);
        if batch.dropped > 0 {
            warn!("chart {key}: {} rows dropped while decoding", batch.dropped);
        }

        let series = Arc::new(ChartSeries::from_samples(
            key,
            batch.records,
            self.window,
            Utc::now(),
        ));
        self.cache.put(key, series.clone());
        debug!("chart {key} fetched, {} points in window", series.len());
        Ok(series)
    }

    fn render_query(&self, key: SeriesKey) -> String {
        self.history_template
            .replace("{station_id}", &key.station_id.to_string())
            .replace("{board_id}", &key.board_id.to_string())
            .replace("{sensor_id}", &key.sensor_id.to_string())
    }

    pub fn invalidate(&self, key: &SeriesKey) -> bool {
        self.cache.invalidate(key)
    }

    pub fn invalidate_all(&self) -> usize {
        self.cache.invalidate_all()
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}
