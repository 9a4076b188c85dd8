pub mod badges;
pub mod blob;
pub mod contacts;
pub mod conversations;
pub mod db;
pub mod jobs;
pub mod media;
pub mod messages;
pub mod models;
pub mod notices;
pub mod ratings;
pub mod retention;
pub mod schema;
pub mod sla;
pub mod templates;
pub mod tenants;
pub mod webhook_events;

mod error;

pub use error::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;
