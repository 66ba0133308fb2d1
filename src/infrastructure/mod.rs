//! Infrastructure: persistence and the event bus

pub mod database;
pub mod events;
