pub mod assets;
pub mod config;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod proxy;
pub mod router;
pub mod runtime;
pub mod server;
pub mod store;

pub use config::Settings;
pub use error::RouteError;
pub use server::{RequestHandler, Server};
