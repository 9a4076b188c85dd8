pub mod backoff;
pub mod badges;
pub mod job;
pub mod message_status;
pub mod queue;
pub mod rating;
pub mod redact;
pub mod sla;
pub mod timeouts;
