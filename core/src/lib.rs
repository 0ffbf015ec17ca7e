//! Client core for the Ubersmith billing and provisioning API.
//!
//! # Overview
//! Every vendor method is a POST to `<base_url>?method=<namespace.action>`
//! carrying PHP-style form fields, answered by a JSON envelope whose fields
//! are nearly all strings. This crate validates arguments, encodes them,
//! drives the vendor's token refresh retry protocol, and cleans the string
//! fields of each response into native types.
//!
//! # Design
//! - The core never does I/O itself. `RequestHandler` builds `HttpRequest`
//!   values and classifies `HttpResponse` values; a `Transport` performs the
//!   round-trip (`UreqTransport` with the default `ureq` feature).
//! - Each method is described by a static `CallSpec`. Methods with bespoke
//!   cleaning live in `calls::<namespace>` with a typed helper; the rest of
//!   the catalog in `registry` is reachable through `calls::call`.
//! - Calls take `Option<&RequestHandler>` and fall back to a process-wide
//!   default installed with `init` or `set_default_handler`.

pub mod call;
pub mod calls;
pub mod clean;
pub mod config;
pub mod encode;
pub mod error;
pub mod handler;
pub mod http;
pub mod php;
pub mod registry;
pub mod response;
pub mod testing;
#[cfg(feature = "ureq")]
pub mod transport;
pub mod value;

pub use call::{Call, CallSpec};
pub use clean::{Cleaner, Converter, FieldRules};
pub use config::{HandlerConfig, RetryPolicy};
pub use encode::{Arg, Args, FilePayload};
pub use error::ApiError;
pub use handler::{clear_default_handler, default_handler, set_default_handler, RequestHandler, ResponseMode};
pub use http::{HttpRequest, HttpResponse, Transport, TransportError};
pub use registry::MethodId;
pub use response::{Cleaned, DictResponse, IntResponse, VendorFile};
#[cfg(feature = "ureq")]
pub use transport::UreqTransport;
pub use value::{Key, Value};

/// Build a handler over `UreqTransport` from `config` and install it as the
/// process-wide default. Returns the handler that was replaced, if any.
#[cfg(feature = "ureq")]
pub fn init(config: HandlerConfig) -> Result<Option<std::sync::Arc<RequestHandler>>, ApiError> {
    let transport = UreqTransport::new(config.timeout);
    let handler = RequestHandler::new(config, transport)?;
    Ok(set_default_handler(handler))
}
