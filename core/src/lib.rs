//! Calorie log kept in two stores: a main store for recent days and an
//! archive that elapsed days are merged into.

pub mod aggregate;
pub mod container;
pub mod day;
pub mod db;
pub mod error;
pub mod export;
pub mod models;
pub mod progress;
pub mod removal;
pub mod service;
pub mod settings;
pub mod transfer;

pub use container::{Container, StoreKind, StoreLocation};
pub use error::{Error, Result};
pub use service::TrackerService;
