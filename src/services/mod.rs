//! Business logic services.

pub mod auth;
pub mod credential;
pub mod occurrence;
pub mod restriction;
pub mod restriction_matcher;
pub mod storage;
pub mod template;
pub mod weekday;
pub mod wildcard;
