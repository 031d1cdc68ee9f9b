//! Shared identifier types used across the commerce workspace.

mod types;

pub use types::{OrderId, UserId};
