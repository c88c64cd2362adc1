//! Client HTTP API.
//!
//! | Method | Path          | Handler                  |
//! |--------|---------------|--------------------------|
//! | GET    | `/ping`       | [`handlers::health`]     |
//! | POST   | `/keys`       | [`handlers::keys::set`]  |
//! | GET    | `/keys/{key}` | [`handlers::keys::get`]  |
//! | DELETE | `/keys/{key}` | [`handlers::keys::delete`] |
//! | POST   | `/join`       | [`handlers::join`]       |
//!
//! Built on Hyper 1.x directly:
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │                  ApiServer                    │
//! │  ┌──────────┐  ┌────────────┐  ┌──────────┐   │
//! │  │  router  │──│  handlers  │──│  state   │   │
//! │  └──────────┘  └────────────┘  └────┬─────┘   │
//! │                                     ▼         │
//! │               Store · MembershipManager       │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use replikv::api::ApiServer;
//! use tokio::net::TcpListener;
//! use tokio::sync::oneshot;
//!
//! let server = ApiServer::new(node.store(), node.membership());
//! let listener = TcpListener::bind("0.0.0.0:8000").await?;
//! let (_tx, rx) = oneshot::channel();
//! server.serve(listener, rx).await?;
//! ```

mod error;
pub mod handlers;
mod request;
mod response;
mod router;
mod server;
mod state;

pub use error::ApiError;
pub use router::route;
pub use server::ApiServer;
pub use state::AppState;
