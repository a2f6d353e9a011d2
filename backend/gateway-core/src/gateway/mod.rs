//! Authenticating HTTP + WebSocket gateway in front of the embedded server.
//!
//! | Route | Auth |
//! |---|---|
//! | `GET /health` | none |
//! | `POST /start` | required |
//! | `POST /refreshKubeconfig` | required |
//! | `POST /fetchKubeconfig` | required |
//! | anything else (proxied) | required unless on the static allow-list |

pub mod auth;
pub mod headers;
pub mod proxy;
pub mod router;
pub mod routes;
pub mod server;
pub mod state;
pub mod websocket;

pub use auth::{StaticAllowList, auth_middleware};
pub use proxy::UpstreamProxy;
pub use router::build_router;
pub use server::{GatewayHandle, start_gateway};
pub use state::GatewayState;
