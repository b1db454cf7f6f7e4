use mongodb::Database;
use bailbook_config::Settings;
use bailbook_services::{
    AuthService, Clock, DashboardService, DocumentStore, HealthService, OutboundQueue,
    dao::{case::CaseDao, checkin::CheckInDao, message::MessageDao, user::UserDao},
};
use std::sync::Arc;

use crate::error::ApiError;

/// Handles that only exist when a datastore is configured.
pub struct Store {
    pub db: Database,
    pub users: UserDao,
    pub cases: CaseDao,
    pub messages: MessageDao,
    pub checkins: Arc<CheckInDao>,
}

impl Store {
    pub fn new(db: Database) -> Self {
        Self {
            users: UserDao::new(&db),
            cases: CaseDao::new(&db),
            messages: MessageDao::new(&db),
            checkins: Arc::new(CheckInDao::new(&db)),
            db,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub settings: Settings,
    pub clock: Arc<dyn Clock>,
    pub auth: Arc<AuthService>,
    pub dashboard: Arc<DashboardService>,
    pub health: Arc<HealthService>,
    pub documents: DocumentStore,
    pub outbound: Option<OutboundQueue>,
    store: Option<Arc<Store>>,
}

impl AppState {
    pub fn new(
        db: Option<Database>,
        settings: Settings,
        clock: Arc<dyn Clock>,
        outbound: Option<OutboundQueue>,
    ) -> Self {
        let auth = Arc::new(AuthService::new(settings.session.clone()));
        let dashboard = Arc::new(DashboardService::new(
            db.clone(),
            &settings.dashboard,
            clock.clone(),
        ));
        let health = Arc::new(HealthService::new(
            db.clone(),
            &settings.health,
            &settings.dashboard,
            clock.clone(),
        ));
        let documents = DocumentStore::new(&settings.app.upload_dir);
        let store = db.map(|db| Arc::new(Store::new(db)));

        Self {
            settings,
            clock,
            auth,
            dashboard,
            health,
            documents,
            outbound,
            store,
        }
    }

    /// The datastore-backed handles, or 503 when none is configured.
    pub fn store(&self) -> Result<&Store, ApiError> {
        self.store.as_deref().ok_or(ApiError::Unavailable)
    }

    pub fn now(&self) -> bson::DateTime {
        bson::DateTime::from_chrono(self.clock.now())
    }
}
