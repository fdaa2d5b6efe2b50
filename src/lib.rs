//! Concurrent player history for Steam apps.
//!
//! Each app's samples live in their own SQLite file under the data
//! directory, see [`history::registry::StoreRegistry`].

pub mod cli;
pub mod config;
pub mod history;
pub mod sampler;
pub mod steam;
