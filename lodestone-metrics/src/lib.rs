use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Counters for everything the world core does with chunks.
///
/// All updates use relaxed atomics, so the struct can be shared behind an
/// `Arc` by every task of a bulk operation.
#[derive(Debug, Default)]
pub struct WorldMetrics {
    // Generation Stats
    pub total_chunks_generated: AtomicUsize,
    pub total_generation_time_us: AtomicU64,
    pub max_generation_time_us: AtomicU64,

    // Provider Stats
    pub total_chunks_loaded: AtomicUsize,
    pub total_load_time_us: AtomicU64,
    pub total_chunks_synced: AtomicUsize,
    pub total_sync_time_us: AtomicU64,
    pub total_chunks_persisted: AtomicUsize,
    pub total_persist_time_us: AtomicU64,

    // Streaming
    pub total_chunks_sent: AtomicUsize,
    pub total_send_time_us: AtomicU64,

    // Cache (checked by region loads)
    pub total_cache_hits: AtomicUsize,
    pub total_cache_misses: AtomicUsize,

    // Failures
    pub total_task_failures: AtomicUsize,
    pub total_timeouts: AtomicUsize,

    // Session
    pub start_time: Option<Instant>,
}

impl WorldMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    pub fn record_generation(&self, duration: Duration) {
        self.total_chunks_generated.fetch_add(1, Ordering::Relaxed);
        let us = duration.as_micros() as u64;
        self.total_generation_time_us.fetch_add(us, Ordering::Relaxed);
        self.max_generation_time_us.fetch_max(us, Ordering::Relaxed);
    }

    pub fn record_load(&self, duration: Duration) {
        self.total_chunks_loaded.fetch_add(1, Ordering::Relaxed);
        self.total_load_time_us.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn record_sync(&self, duration: Duration) {
        self.total_chunks_synced.fetch_add(1, Ordering::Relaxed);
        self.total_sync_time_us.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn record_persist(&self, duration: Duration) {
        self.total_chunks_persisted.fetch_add(1, Ordering::Relaxed);
        self.total_persist_time_us.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn record_send(&self, duration: Duration) {
        self.total_chunks_sent.fetch_add(1, Ordering::Relaxed);
        self.total_send_time_us.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.total_cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.total_cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_task_failure(&self) {
        self.total_task_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_timeout(&self) {
        self.total_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn chunks_generated(&self) -> usize {
        self.total_chunks_generated.load(Ordering::Relaxed)
    }

    pub fn chunks_loaded(&self) -> usize {
        self.total_chunks_loaded.load(Ordering::Relaxed)
    }

    pub fn chunks_sent(&self) -> usize {
        self.total_chunks_sent.load(Ordering::Relaxed)
    }

    pub fn task_failures(&self) -> usize {
        self.total_task_failures.load(Ordering::Relaxed)
    }

    pub fn timeouts(&self) -> usize {
        self.total_timeouts.load(Ordering::Relaxed)
    }

    pub fn generate_report(&self) -> String {
        let uptime = self.start_time.unwrap_or_else(Instant::now).elapsed();
        let generated = self.total_chunks_generated.load(Ordering::Relaxed);
        let gen_time_total = self.total_generation_time_us.load(Ordering::Relaxed) as f64 / 1000.0; // ms
        let gen_max = self.max_generation_time_us.load(Ordering::Relaxed) as f64 / 1000.0; // ms
        let gen_avg = average(gen_time_total, generated);

        let loaded = self.total_chunks_loaded.load(Ordering::Relaxed);
        let load_avg = average(self.total_load_time_us.load(Ordering::Relaxed) as f64 / 1000.0, loaded);

        let synced = self.total_chunks_synced.load(Ordering::Relaxed);
        let sync_avg = average(self.total_sync_time_us.load(Ordering::Relaxed) as f64 / 1000.0, synced);

        let persisted = self.total_chunks_persisted.load(Ordering::Relaxed);
        let persist_avg = average(self.total_persist_time_us.load(Ordering::Relaxed) as f64 / 1000.0, persisted);

        let sent = self.total_chunks_sent.load(Ordering::Relaxed);
        let send_avg = average(self.total_send_time_us.load(Ordering::Relaxed) as f64 / 1000.0, sent);

        // Cache stats
        let hits = self.total_cache_hits.load(Ordering::Relaxed);
        let misses = self.total_cache_misses.load(Ordering::Relaxed);
        let total_requests = hits + misses;
        let hit_rate = if total_requests > 0 { (hits as f64 / total_requests as f64) * 100.0 } else { 0.0 };

        let failures = self.total_task_failures.load(Ordering::Relaxed);
        let timeouts = self.total_timeouts.load(Ordering::Relaxed);

        format!(
            "Lodestone World Report\n\
             ======================\n\
             Session Duration: {:.2?}\n\n\
             [Generation]\n\
             Chunks Generated: {}\n\
             Total Time: {:.2} ms\n\
             Avg Time: {:.2} ms/chunk\n\
             Max Time: {:.2} ms\n\n\
             [Provider Read]\n\
             Chunks Loaded: {}\n\
             Avg Time: {:.2} ms/chunk\n\n\
             [Provider Write]\n\
             Chunks Synced: {}\n\
             Avg Sync Time: {:.2} ms/chunk\n\
             Chunks Persisted: {}\n\
             Avg Persist Time: {:.2} ms/chunk\n\n\
             [Streaming]\n\
             Chunks Sent: {}\n\
             Avg Time: {:.2} ms/chunk\n\n\
             [Cache]\n\
             Hits: {}\n\
             Misses: {}\n\
             Hit Rate: {:.1}%\n\n\
             [Failures]\n\
             Task Failures: {}\n\
             Timeouts: {}\n",
            uptime,
            generated, gen_time_total, gen_avg, gen_max,
            loaded, load_avg,
            synced, sync_avg, persisted, persist_avg,
            sent, send_avg,
            hits, misses, hit_rate,
            failures, timeouts
        )
    }
}

fn average(total_ms: f64, count: usize) -> f64 {
    if count > 0 { total_ms / count as f64 } else { 0.0 }
}
