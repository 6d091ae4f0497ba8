//! HTTP surface of the proxy
//!
//! - [`server`] - listener, accept loop, background sweeps, shutdown
//! - [`routes`] - `/proxy/{token}`, `/health`, `/api/*` dispatch
//! - [`error`] - JSON error responses

pub mod error;
pub mod routes;
pub mod server;

use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::Response;
use std::convert::Infallible;

pub type RespBody = BoxBody<Bytes, Infallible>;
pub type Resp = Response<RespBody>;

#[inline]
pub(crate) fn body_from<T: Into<Bytes>>(data: T) -> RespBody {
    Full::new(data.into()).boxed()
}

pub use error::{json_error, json_response, proxy_error_response};
pub use routes::{format_uptime, route, AppState};
pub use server::PassageServer;
