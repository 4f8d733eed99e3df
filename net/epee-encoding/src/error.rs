use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("buffer truncated")]
    Truncated,
    #[error("format error: {0}")]
    Format(&'static str),
}
