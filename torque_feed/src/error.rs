use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported baud rate {0}")]
    UnsupportedBaud(u32),
    #[error("termios: {0}")]
    Termios(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FeedError>;
