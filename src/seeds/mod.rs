//! Database seeding
//!
//! Reference data that must exist before the API serves requests.

pub mod platform;

pub use platform::seed_platforms;
