mod handler;
pub mod rewrite;

pub use handler::{InboundRequest, ProxyHandler};
