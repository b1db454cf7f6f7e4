pub mod base;
pub mod case;
pub mod checkin;
pub mod job;
pub mod message;
pub mod user;

pub use base::BaseDao;
