pub mod config;
pub mod error;
pub mod random;

mod log;

pub use config::{CacheConfig, HostConfig};
pub use log::logging_stdout;
pub use random::{random_namespace, random_string};
