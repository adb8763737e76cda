//! Harvests flashcards and quizzes from the Oxford Learning Link portal into
//! header-less CSV files (identifier, question, answer), caching every page
//! and spreadsheet on disk so repeated runs never touch the network.

pub mod browser;
pub mod cache;
pub mod config;
pub mod dom;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod harvest;
pub mod output;

pub use config::Config;
pub use error::{HarvestError, Result};
pub use harvest::{CourseReport, Harvester};
