//! undis: a RESP proxy that decodes every command and reply it relays.
//!
//! Each client connection is paired with its own backend connection. Client
//! commands are decoded, re-encoded as multi-bulk and sent on; backend
//! replies are decoded and re-encoded unchanged.

pub mod config;
pub mod error;
pub mod logo;
pub mod pipeline;
pub mod server;

pub use error::ProxyError;
pub use pipeline::Pipeline;
pub use pipeline::PipelineOptions;
pub use pipeline::PipelineStats;
pub use server::Server;
