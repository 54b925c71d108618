#![allow(clippy::module_name_repetitions)]

use std::env;

use thiserror::Error;
use tracing::subscriber::{set_global_default, SetGlobalDefaultError};
use tracing_subscriber::filter::{EnvFilter, ParseError};
use tracing_subscriber::fmt::time::SystemTime;
use tracing_subscriber::layer::SubscriberExt;

/// Telemetri kurulumu sırasında oluşabilecek hatalar.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Log filtresi geçersizdir.
    #[error("log filtresi geçersiz: {0}")]
    InvalidFilter(#[from] ParseError),
    /// Global abonelik kurulamadı.
    #[error("tracing aboneliği kurulamadı: {0}")]
    Subscriber(#[from] SetGlobalDefaultError),
}

/// Telemetri yaşam döngüsünü temsil eden koruma değeri.
#[must_use]
#[derive(Debug)]
pub struct TelemetryGuard {
    _private: (),
}

/// Ortam değişkenlerinden tracing aboneliğini başlatır.
///
/// `AUNSORM_LOG` veya `RUST_LOG` log filtresini belirler; ikisi de yoksa
/// `info` kullanılır.
///
/// # Errors
///
/// Geçersiz log filtresi ya da abonelik kurulumu başarısız olursa hata döner.
pub fn init_tracing() -> Result<TelemetryGuard, TelemetryError> {
    let filter = env::var("AUNSORM_LOG")
        .or_else(|_| env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());

    let subscriber = tracing_subscriber::registry()
        .with(EnvFilter::try_new(filter)?)
        .with(
            tracing_subscriber::fmt::layer()
                .with_timer(SystemTime)
                .with_target(true),
        );
    set_global_default(subscriber).map_err(TelemetryError::Subscriber)?;

    Ok(TelemetryGuard { _private: () })
}
