pub mod metrics;
pub mod tracing;

pub use self::metrics::metrics_middleware;
pub use self::tracing::{make_request_span, request_id_middleware, REQUEST_ID_HEADER};
