//! HTTP surface: submission, job status, health, and result streaming.

pub mod router;
pub mod stream;

pub use router::{api_routes, build_router, run_server, with_service_layers, AppState};
