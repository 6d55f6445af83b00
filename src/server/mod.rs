//! HTTP server layer.
//!
//! Serves the deferred-render endpoint that resolves signed thumbnail URLs.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │                  GET {base_path}hash/{token}                    │
//! │                                                                 │
//! │  ┌──────────────────────────┐  ┌─────────────────────────────┐  │
//! │  │        handlers          │  │           routes            │  │
//! │  │ (verify, render, 302)    │  │  (router config, CORS)      │  │
//! │  └──────────────────────────┘  └─────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod handlers;
pub mod routes;

pub use handlers::{
    health_handler, render_handler, AppState, ErrorResponse, HealthResponse,
    DEFAULT_CACHE_MAX_AGE,
};
pub use routes::{create_router, RouterConfig};
