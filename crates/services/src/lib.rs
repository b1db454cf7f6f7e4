pub mod auth;
pub mod bonds;
pub mod bounded;
pub mod clock;
pub mod dao;
pub mod dashboard;
pub mod documents;
pub mod filter;
pub mod health;
pub mod queue;
pub mod sweeper;
pub mod twilio;
pub mod union;
pub mod windows;

pub use auth::AuthService;
pub use clock::{Clock, FixedClock, SystemClock};
pub use dao::*;
pub use dashboard::DashboardService;
pub use documents::DocumentStore;
pub use health::HealthService;
pub use queue::OutboundQueue;
