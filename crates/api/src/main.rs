use std::sync::Arc;

use bailbook_api::{build_router, state::AppState, telemetry};
use bailbook_config::Settings;
use bailbook_db::{connect, indexes::ensure_indexes, ping};
use bailbook_services::{OutboundQueue, SystemClock, sweeper};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file (silently ignore if missing)
    dotenvy::dotenv().ok();

    telemetry::init_tracing(
        "bailbook_api=debug,bailbook_services=debug,bailbook_db=debug,tower_http=debug",
    );

    let settings = Settings::load()?;
    info!("Starting bailbook API on {}:{}", settings.app.host, settings.app.port);

    // A missing or unreachable datastore degrades routes instead of
    // stopping the service.
    let db = connect(&settings).await?;
    if let Some(db) = &db {
        match ping(db).await {
            Ok(()) => {
                if let Err(e) = ensure_indexes(db).await {
                    warn!(error = %e, "Failed to ensure indexes");
                }
            }
            Err(e) => warn!(error = %e, "MongoDB ping failed at startup"),
        }
    }

    let outbound = match OutboundQueue::connect(&settings.redis).await {
        Ok(queue) => queue,
        Err(e) => {
            warn!(error = %e, "Redis unavailable, outbound SMS stay queued in MongoDB");
            None
        }
    };

    let clock = Arc::new(SystemClock);
    let app_state = AppState::new(db, settings.clone(), clock.clone(), outbound);

    // Held for the lifetime of the server so the job keeps firing.
    let _sweeper = match app_state.store() {
        Ok(store) if settings.checkins.sweep_enabled => {
            match sweeper::start_overdue_sweep(
                &settings.checkins.sweep_cron,
                store.checkins.clone(),
                clock,
            )
            .await
            {
                Ok(scheduler) => Some(scheduler),
                Err(e) => {
                    warn!(error = %e, "Failed to schedule check-in sweep");
                    None
                }
            }
        }
        _ => None,
    };

    let app = build_router(app_state);

    let addr = format!("{}:{}", settings.app.host, settings.app.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
