//! HTTP surface: the router and its handlers.

pub mod handlers;
pub mod router;
