//! Pulse Portal — Binary Entrypoint
//! Boots the Axum HTTP server hosting search sessions, access gate and derived views.

use shuttle_axum::ShuttleAxum;

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    pulse_portal::telemetry::init_tracing();

    let router = pulse_portal::app()
        .await
        .map_err(shuttle_runtime::Error::Custom)?;

    Ok(router.into())
}
