pub mod client;
pub mod error;
pub mod rate_limit;
pub mod types;

pub use client::{RawResponse, XClient};
pub use error::ApiError;
pub use types::{Deleted, Envelope, TimelineOptions, TimelinePage, Tweet};
