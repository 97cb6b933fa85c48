//! Mail transport abstractions and implementations

mod capture;
mod http;
mod traits;

#[cfg(test)]
pub mod mock;

pub use capture::CaptureTransport;
pub use http::{HttpTransport, HttpTransportConfig};
pub use traits::*;

#[cfg(test)]
pub use mock::{MockOutcome, MockTransport};
