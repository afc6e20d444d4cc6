//! Data models for the member registry.
//!
//! Wire types use camelCase field names; stored entities are plain structs
//! converted from rows in the `db` module.

mod member;
mod notification;

pub use member::*;
pub use notification::*;
