//! State store: SlateDB key/value storage, the watch event log, and the
//! versioned object registry the controllers read and write through.

pub mod client;
pub mod error;
pub mod registry;
pub mod watch;

pub use error::StoreError;
pub use registry::{ObjectStore, Registry};
