use thiserror::Error;

#[derive(Error, Debug)]
pub enum InstallError {
    #[error("This installer must run as root (try sudo)")]
    NotRoot,

    #[error("Unsupported platform: {os} {arch}")]
    UnsupportedPlatform { os: String, arch: String },

    #[error("Invalid version string: {0}")]
    InvalidVersion(String),

    #[error("Failed to download from {url}: {source}")]
    DownloadFailed {
        url: String,
        source: reqwest::Error,
    },

    #[error("Unexpected HTTP status {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("No published releases found for {0}")]
    ReleaseNotFound(String),

    #[error("Malformed release metadata from {repo}: {message}")]
    MalformedRelease { repo: String, message: String },

    #[error("No release asset matched for {dependency}; available assets: {available:?}")]
    NoMatchingAsset {
        dependency: String,
        available: Vec<String>,
    },

    #[error("Checksum verification failed for {file}")]
    ChecksumMismatch { file: String },

    #[error("Failed to extract archive: {0}")]
    ExtractionFailed(String),

    #[error("Failed to install {dependency}: {message}")]
    InstallFailed { dependency: String, message: String },

    #[error("Failed to run {command}: {message}")]
    CommandFailed { command: String, message: String },

    #[error("Service {service} failed to start; last log lines:\n{journal}")]
    ServiceStartFailed { service: String, journal: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    RequestError(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, InstallError>;
