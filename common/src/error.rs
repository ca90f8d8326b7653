use thiserror::Error;

#[derive(Error, Debug)]
pub enum CommonError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Transport channel closed")]
    ChannelClosed,
}

pub type Result<T> = std::result::Result<T, CommonError>;
