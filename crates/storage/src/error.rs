use faststr::FastStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("memcache error: {0}")]
    MemcacheError(#[from] memcache::MemcacheError),
    #[error("blocking store task failed: {0}")]
    JoinError(#[from] tokio::task::JoinError),

    #[error("serde error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid tag generation: {0}")]
    InvalidGeneration(FastStr),

    #[error("error: {0}")]
    MsgError(FastStr),
}

pub type Result<T> = std::result::Result<T, Error>;
