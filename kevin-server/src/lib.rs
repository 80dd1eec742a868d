// Library exports for kevin-server
// The binary and the integration tests build the router from here

pub mod api;
pub mod config;
pub mod db;
pub mod feed;
pub mod feed_cache;
pub mod routes;
pub mod state;
pub mod storage;

pub use routes::build_router;
pub use state::AppState;
