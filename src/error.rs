use thiserror::Error;

/// Errors surfaced by the FAT32 engine.
///
/// Every variant renders as the single-line diagnostic the shell prints
/// after `error: `. The fatal variants terminate the session instead.
#[derive(Error, Debug)]
pub enum FatError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid FAT32 image: {0}")]
    Parse(String),

    #[error("{0} not found.")]
    NotFound(String),

    #[error("{0} is not a file.")]
    NotAFile(String),

    #[error("{0} is not a directory.")]
    NotADirectory(String),

    #[error("{0} already exists.")]
    AlreadyExists(String),

    #[error("{0} is already open.")]
    AlreadyOpen(String),

    #[error("{0} is not open.")]
    NotOpen(String),

    #[error("{0} is not open for reading.")]
    NotOpenForRead(String),

    #[error("{0} is not open for writing.")]
    NotOpenForWrite(String),

    #[error("mode must be one of r, w or rw.")]
    InvalidMode,

    #[error("names may not contain /.")]
    SlashInName,

    #[error("{0} is not a legal name.")]
    IllegalName(String),

    #[error("{0} is too long.")]
    NameTooLong(String),

    #[error("path to {0} is too long.")]
    PathTooLong(String),

    #[error("{0} is not empty.")]
    NotEmpty(String),

    #[error("Not enough space left.")]
    NoSpace,

    #[error("start position is past the end of {0}.")]
    ReadPastEnd(String),

    #[error("cluster {0} has no allocated chain")]
    EmptyChain(u32),
}

impl FatError {
    /// Fatal errors terminate the session; everything else aborts the
    /// current command and returns to the prompt.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            FatError::Io(_) | FatError::Parse(_) | FatError::EmptyChain(_)
        )
    }
}
