use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum MirrorError {
    #[error("invalid network id: {0:?}")]
    InvalidNetworkId(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(Utf8PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to read manifest at {path}: {message}")]
    ManifestRead { path: Utf8PathBuf, message: String },

    #[error("malformed manifest at {path}: {message}")]
    ManifestParse { path: Utf8PathBuf, message: String },

    #[error("failed to write manifest at {path}: {message}")]
    ManifestWrite { path: Utf8PathBuf, message: String },

    #[error(
        "search reported {reported} networks but the response listed {actual}; manifest not written"
    )]
    #[diagnostic(help("raise `search_size` if the catalog outgrew the result-size ceiling"))]
    ManifestCountMismatch { reported: u64, actual: usize },

    #[error("NDEx request failed: {0}")]
    NdexHttp(String),

    #[error("NDEx returned status {status}: {message}")]
    NdexStatus { status: u16, message: String },

    #[error("failed to decode NDEx response: {0}")]
    NdexDecode(String),

    #[error("S3 upload of {key} failed: {message}")]
    S3Upload { key: String, message: String },

    #[error("S3 client setup failed: {0}")]
    S3Setup(String),

    #[error("{failed} of {total} transfers failed ({skipped} not attempted)")]
    TransferFailed {
        failed: usize,
        skipped: usize,
        total: usize,
    },

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
