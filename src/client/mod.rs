//! Client side of the session protocol, for Rust consumers of the API.

pub mod coordinator;
pub mod session;
pub mod transport;

pub use coordinator::{RefreshCoordinator, RefreshOutcome};
pub use session::{ClientError, SessionClient, SessionListener};
pub use transport::{ApiRequest, ApiResponse, ReqwestTransport, Transport};
