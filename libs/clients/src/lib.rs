//! Client records and the repository seam the email pipeline runs against.
//!
//! The pipeline only ever talks to [`ClientRepository`]; the in-memory
//! implementation backs the worker binary and the test suites.

pub mod error;
pub mod model;
pub mod repository;

pub use error::ClientStoreError;
pub use model::{ClientRecord, EmailStatus};
pub use repository::{ClientRepository, InMemoryClientRepository};
