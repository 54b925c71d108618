#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::needless_pass_by_value)]

//! Aunsorm CA: ACME (RFC 8555) istek-doğrulama boru hattı ve HTTP yüzeyi.
//!
//! Gelen her ACME isteği `middleware` içindeki aşamalardan sırayla geçer;
//! kaynak işleyicileri yalnızca doğrulanmış bağlam değerlerini görür.

mod config;
mod context;
mod error;
mod linker;
mod middleware;
mod routes;
mod state;
mod telemetry;

pub use config::ServerConfig;
pub use error::ServerError;
pub use linker::{BaseUrl, Linker};
pub use routes::{build_router, serve};
pub use state::{Provisioner, ServerState};
pub use telemetry::{init_tracing, TelemetryError, TelemetryGuard};

#[cfg(test)]
mod tests;
