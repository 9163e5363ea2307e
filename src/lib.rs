//! Huddle server: HTTP API over the `huddle-core` domain services.

pub mod api;
