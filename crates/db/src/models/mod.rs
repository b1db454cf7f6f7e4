pub mod booking;
pub mod checkin;
pub mod job;
pub mod message;
pub mod user;

pub use booking::*;
pub use checkin::*;
pub use job::*;
pub use message::*;
pub use user::*;
