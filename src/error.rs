#[derive(Debug, thiserror::Error)]
pub enum LedisError {
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    #[error("ERR value is not an integer or out of range")]
    NotInteger,

    #[error("ERR value is not a string")]
    NotString,

    #[error("ERR no such key")]
    NoSuchKey,

    #[error("ERR index out of range")]
    IndexOutOfRange,

    #[error("ERR timeout")]
    Timeout,

    #[error("ERR syntax error")]
    Syntax,

    #[error("ERR wrong number of arguments for '{0}' command")]
    WrongArgCount(String),

    #[error("ERR unknown command '{0}'")]
    UnknownCommand(String),

    #[error("ERR The ID specified in XADD is equal or smaller than the target stream top item")]
    StreamIdInvalid,

    #[error("ERR {0}")]
    Tx(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type LedisResult<T> = Result<T, LedisError>;
