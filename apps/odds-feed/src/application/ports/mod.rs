//! Port Interfaces
//!
//! Contracts the pipeline stages depend on. Infrastructure adapters
//! implement them; tests substitute mocks.
//!
//! ## Driven Ports (Outbound)
//!
//! - `RecoveryPort`: submit recovery requests to the API
//! - `ReferenceData`: read market descriptions, fixtures and players
//! - `ReferenceCache`: lookup-or-insert storage for reference records

mod cache_port;
mod recovery_port;
mod reference_port;

pub use cache_port::{ReferenceCache, SharedCache};
pub use recovery_port::{ApiError, RecoveryPort};
pub use reference_port::ReferenceData;

#[cfg(test)]
pub use recovery_port::MockRecoveryPort;
#[cfg(test)]
pub use reference_port::MockReferenceData;
