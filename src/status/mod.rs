//! Host status publisher
//!
//! A background refresher rebuilds the host snapshot on a timer; HTTP
//! handlers only ever read the cached copy.

pub mod refresher;
pub mod snapshot;

pub use refresher::SnapshotRefresher;
pub use snapshot::{HostSampler, HostSnapshot, SnapshotCache};
