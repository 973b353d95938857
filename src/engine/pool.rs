// src/engine/pool.rs
//
// Global thread pool for per-cell parallelism.
//
// One pool is built lazily on first use and reused by every batch. The
// thread count follows available_parallelism() unless STAMPCUT_THREADS is
// set. Changes to the variable after initialization have no effect.

use rayon::ThreadPool;
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Environment variable overriding the worker count.
pub const THREADS_ENV: &str = "STAMPCUT_THREADS";

/// Upper bound accepted from the environment.
pub const MAX_THREADS: usize = 256;

const MIN_THREADS: usize = 1;

static GLOBAL_THREAD_POOL: OnceLock<Option<ThreadPool>> = OnceLock::new();

fn parse_thread_override(raw: &str) -> Option<usize> {
    match raw.trim().parse::<usize>() {
        Ok(n) if (MIN_THREADS..=MAX_THREADS).contains(&n) => Some(n),
        _ => None,
    }
}

/// Worker count the pool is (or would be) built with.
pub fn configured_threads() -> usize {
    if let Ok(raw) = std::env::var(THREADS_ENV) {
        match parse_thread_override(&raw) {
            Some(n) => return n,
            None => warn!(value = %raw, "ignoring invalid {}", THREADS_ENV),
        }
    }
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(MIN_THREADS)
}

/// The shared pool, or `None` when no pool could be built and callers
/// should run sequentially.
pub fn get_pool() -> Option<&'static ThreadPool> {
    GLOBAL_THREAD_POOL
        .get_or_init(|| {
            let num_threads = configured_threads();
            match rayon::ThreadPoolBuilder::new()
                .num_threads(num_threads)
                .thread_name(|i| format!("stampcut-{i}"))
                .build()
            {
                Ok(pool) => {
                    debug!(num_threads, "thread pool ready");
                    Some(pool)
                }
                Err(e) => {
                    warn!(error = %e, num_threads, "thread pool unavailable, running sequentially");
                    None
                }
            }
        })
        .as_ref()
}
