// Library interface for the kevin client (used by the binary and the tests)
pub mod api;
pub mod config;
pub mod echo;
pub mod identity_store;
pub mod logging;
