use faststr::FastStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid port in host entry: {0}")]
    InvalidPort(FastStr),

    #[error("invalid boolean for {0}: {1}")]
    InvalidBool(&'static str, FastStr),
}

pub type Result<T> = std::result::Result<T, Error>;
