//! The archival server: RPC service, crawl job queue, public-feed
//! ring and the periodic maintenance loops.

mod format;
mod index;
mod jobs;
mod media;
mod server;
mod service;

pub use index::{FeedIndex, IndexError, IndexResult, PUBLIC_FEED_ID, RING_CAPACITY};
pub use jobs::AdminCommand;
pub use media::{LocalStorage, MediaConfig, MediaStorage, NullStorage};
pub use server::{ApiServer, ServerError, ServerResult};
pub use service::{ServiceError, ServiceResult};

pub(crate) const LOG_TARGET: &str = "feedvault::server";

#[cfg(test)]
mod tests;
