pub mod case;
pub mod checkin;
pub mod dashboard;
pub mod document;
pub mod health;
pub mod message;
pub mod twilio;
pub mod user;
