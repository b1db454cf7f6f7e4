pub mod connection;
pub mod indexes;
pub mod models;

pub use connection::{connect, ping};
