// src/telemetry.rs

use tracing_subscriber::EnvFilter;

/// Inicializa o subscriber de logs (formato compacto, sem target).
///
/// Chamadas repetidas são ignoradas.
pub fn init(filter: &str) {
    let env_filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .try_init();
}
