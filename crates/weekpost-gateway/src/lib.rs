pub mod client;
pub mod correlation;
pub mod discord;
pub mod error;
pub mod reconciler;
pub mod scheduler;
pub mod worker;

pub use client::{ChannelRef, MessagingClient, RemoteError};
pub use error::SyncError;
pub use reconciler::{Reconciler, SyncOutcome};
pub use scheduler::{Scheduler, TickOutcome};
pub use worker::{SyncHandle, SyncWorker};
