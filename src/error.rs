use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum KvError {
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    #[error("ERR value is not an integer or out of range")]
    NotInteger,

    #[error("ERR value is not a valid float")]
    NotFloat,

    #[error("ERR syntax error")]
    SyntaxError,

    #[error("ERR index out of range")]
    OutOfRange,

    #[error("ERR no such key")]
    NoSuchKey,

    #[error("ERR invalid cursor")]
    InvalidCursor,

    #[error("ERR wrong number of arguments for '{0}' command")]
    Arity(String),

    #[error("NOGROUP No such key '{key}' or consumer group '{group}' in XREADGROUP with GROUP option")]
    NoGroup { key: String, group: String },

    #[error("BUSYGROUP Consumer Group name already exists")]
    BusyGroup,

    #[error("ERR The XGROUP subcommand requires the key to exist. Note that for CREATE you may want to use the MKSTREAM option to create an empty stream automatically.")]
    NoStream,

    #[error("ERR The ID specified in XADD is equal or smaller than the target stream top item")]
    StreamIdTooSmall,

    #[error("EXECABORT Transaction discarded because of previous errors.")]
    ExecAbort,

    #[error("ERR {0}")]
    Generic(String),
}

impl KvError {
    pub fn arity(cmd: &str) -> Self {
        KvError::Arity(cmd.to_lowercase())
    }

    pub fn generic(msg: impl Into<String>) -> Self {
        KvError::Generic(msg.into())
    }

    /// Render as the uppercase-tag RESP error body (without the leading '-').
    pub fn to_resp_string(&self) -> String {
        self.to_string()
    }
}

pub type Result<T> = std::result::Result<T, KvError>;
