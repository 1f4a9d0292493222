use compact_str::CompactString;
use thiserror::Error;

/// The peer sent bytes that cannot be framed as an HTTP/1.1 request. The
/// connection is closed without a response.
#[derive(Debug, Error)]
pub enum FramingError {
    #[error("malformed request head: {0}")]
    Parse(#[from] httparse::Error),

    #[error("request line is incomplete")]
    IncompleteRequestLine,

    #[error("unsupported method `{0}`")]
    UnsupportedMethod(CompactString),

    #[error("invalid content-length")]
    InvalidContentLength,

    #[error("unsupported transfer-encoding `{0}`")]
    UnsupportedTransferEncoding(CompactString),

    #[error("malformed chunked body")]
    InvalidChunk,

    #[error("request head exceeds {limit} bytes")]
    HeadTooLarge { limit: usize },

    #[error("request body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },

    #[error("{0} received without a request head")]
    UnexpectedPart(&'static str),
}

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("framing error: {0}")]
    Framing(#[from] FramingError),

    #[error("connection idle for longer than the configured timeout")]
    IdleTimeout,

    #[error("connection closed in the middle of a request")]
    UnexpectedEof,
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("transport already started")]
    AlreadyStarted,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
