//! Shared application state handed to every handler.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::config::{LimitsConfig, ServiceConfig};
use crate::imaging::DynCodec;
use crate::process::ProcessSettings;

use super::limits::RateLimiter;

/// Fixed window for the per-client request counter.
pub const RATE_WINDOW: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct AppState {
    pub codec: Arc<DynCodec>,
    pub settings: Arc<ProcessSettings>,
    pub limits: LimitsConfig,
    /// Permits for requests doing codec work.
    pub jobs: Arc<Semaphore>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(codec: DynCodec, config: &ServiceConfig) -> Self {
        Self {
            codec: Arc::new(codec),
            settings: Arc::new(ProcessSettings::from_service_config(config)),
            limits: config.limits.clone(),
            jobs: Arc::new(Semaphore::new(config.limits.max_concurrent_jobs)),
            rate_limiter: Arc::new(RateLimiter::new(
                config.limits.requests_per_minute,
                RATE_WINDOW,
            )),
        }
    }
}
