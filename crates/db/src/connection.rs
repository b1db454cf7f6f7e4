use std::time::Duration;

use bailbook_config::Settings;
use mongodb::{Client, Database, options::ClientOptions};
use tracing::{info, warn};

/// Builds a database handle, or `None` when no connection string is set.
///
/// The driver connects lazily, so an unreachable server does not fail here;
/// callers probe it with [`ping`] and degrade instead of refusing to start.
pub async fn connect(settings: &Settings) -> Result<Option<Database>, mongodb::error::Error> {
    let Some(url) = settings.database.url.as_deref().filter(|u| !u.trim().is_empty()) else {
        warn!("No MongoDB connection string configured, running without a datastore");
        return Ok(None);
    };

    let mut client_options = ClientOptions::parse(url).await?;

    if let Some(max_pool) = settings.database.max_pool_size {
        client_options.max_pool_size = Some(max_pool);
    }
    if let Some(min_pool) = settings.database.min_pool_size {
        client_options.min_pool_size = Some(min_pool);
    }
    client_options.server_selection_timeout = Some(Duration::from_millis(
        settings.database.server_selection_timeout_ms,
    ));
    client_options.app_name = Some("bailbook-api".to_string());

    let client = Client::with_options(client_options)?;
    info!(db = %settings.database.name, "MongoDB client ready");

    Ok(Some(client.database(&settings.database.name)))
}

pub async fn ping(db: &Database) -> Result<(), mongodb::error::Error> {
    db.run_command(bson::doc! { "ping": 1 }).await?;
    Ok(())
}
