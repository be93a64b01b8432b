//! Database models and DTOs.

pub mod occurrence;
pub mod pagination;
pub mod restriction;
pub mod visitor;
pub mod weekday;
