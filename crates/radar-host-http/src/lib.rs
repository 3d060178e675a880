//! Radar HTTP Host
//!
//! The outbound HTTP capability available to flow nodes. Requests pass
//! through an [`HttpPolicy`] (scheme and host allow-lists) before anything
//! leaves the process. [`HttpClient`] is the seam the runtime depends on;
//! [`ReqwestHttpClient`] is the production implementation.

mod client;
mod error;
mod policy;

pub use client::{HttpClient, HttpRequest, HttpResponse, ReqwestHttpClient};
pub use error::HttpError;
pub use policy::HttpPolicy;
