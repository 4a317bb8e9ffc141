pub mod security_headers;
pub mod timeout;

pub use security_headers::add_security_headers;
pub use timeout::with_request_timeout;
