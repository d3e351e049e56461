//! Data models for the ResQ backend.
//!
//! Field names serialize in camelCase to match the frontend TypeScript types.

mod donation;
mod field_mission;
mod incident;
mod mission;
mod statistics;
mod update;

pub use donation::*;
pub use field_mission::*;
pub use incident::*;
pub use mission::*;
pub use statistics::*;
pub use update::*;

#[cfg(test)]
pub(crate) use mission::sample_mission;
