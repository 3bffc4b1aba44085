//! HTTP surface: one identification endpoint plus a liveness check.
//!
//! | Route | Methods | Purpose |
//! |-------|---------|---------|
//! | `/`, `/detect_vehicle` | POST (others → 405) | identify a vehicle by image URL |
//! | `/health` | GET (others → 405) | liveness |
//! | anything else | any | 404 |
//!
//! Every response is JSON with `Access-Control-Allow-Origin: *`.
//!
//! [`handle`] carries all endpoint semantics and knows nothing about axum;
//! [`router`] adapts it. Tests and other transports call [`handle`] directly.

pub mod handler;
pub mod request;
pub mod response;
pub mod server;

pub use handler::{detect_vehicle_handler, handle, health_handler};
pub use request::IdentifyRequest;
pub use response::{ApiResponse, ErrorBody, SuccessBody, VehicleData};
pub use server::{router, serve, AppState};
