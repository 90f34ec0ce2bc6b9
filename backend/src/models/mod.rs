//! Data models for the quiz bank persistence layer.
//!
//! Field names serialize in camelCase to match the records the web client already
//! stores, so local collections written by older clients still deserialize.

mod connection;
mod log;
mod quiz;
mod settings;
mod user;

pub use connection::*;
pub use log::*;
pub use quiz::*;
pub use settings::*;
pub use user::*;
