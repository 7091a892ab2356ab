//! Throttle demo
//!
//! Throttles a slow, rate-limited lookup and shows which calls reach it.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use throttle::{throttle_async, Options, ThrottleConfig, ThrottleError};

/// Failure of the simulated lookup.
#[derive(Error, Debug, Clone)]
enum LookupError {
    #[error(transparent)]
    Throttle(#[from] ThrottleError),

    #[error("Rate source unavailable for {0}")]
    Unavailable(String),
}

/// Simulated upstream: slow, and fails every fifth request.
async fn fetch_rate(requests: Arc<AtomicU32>, currency: String) -> Result<f64, LookupError> {
    let n = requests.fetch_add(1, Ordering::SeqCst) + 1;
    tokio::time::sleep(Duration::from_millis(50)).await;

    if n % 5 == 0 {
        return Err(LookupError::Unavailable(currency));
    }
    Ok(1.0 + f64::from(currency.len() as u32) / 10.0)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "throttle=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ThrottleConfig::from_env();
    info!(
        "Configuration loaded: delay={}ms, max_age={}ms, max_size={}, on_error={}",
        config.delay_ms, config.max_age_ms, config.max_size, config.on_error
    );

    let requests = Arc::new(AtomicU32::new(0));
    let upstream = requests.clone();
    let rates = throttle_async(
        move |currency: String| fetch_rate(upstream.clone(), currency),
        config.apply(Options::new())?,
    )?;

    for round in 0..3 {
        for currency in ["EUR", "USD", "EUR", "GBP", "USD"] {
            match rates.call(currency.to_string())?.resolve().await {
                Ok(rate) => info!(round, currency, rate, "Rate served"),
                Err(e) => warn!(round, currency, error = %e, "Rate lookup failed"),
            }
        }
        tokio::time::sleep(config.delay()).await;
    }

    let stats = rates.stats();
    info!(
        "Upstream requests: {}, stats: {}",
        requests.load(Ordering::SeqCst),
        serde_json::to_string(&stats)?
    );
    info!("Hit rate: {:.1}%", stats.hit_rate() * 100.0);

    Ok(())
}
