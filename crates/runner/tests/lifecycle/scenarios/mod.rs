//! Lifecycle scenarios grouped by concern.

mod environment;
mod failures;
mod phases;
mod teardown;
