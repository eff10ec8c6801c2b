use crate::error::{InstallError, Result};
use std::fmt;

/// Architectures the release channels publish binaries for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Architecture {
    Amd64,
    Arm64,
}

impl Architecture {
    pub fn detect() -> Result<Self> {
        Self::from_raw(std::env::consts::ARCH)
    }

    /// Map the raw machine identifier to the label used in artifact names.
    pub fn from_raw(raw: &str) -> Result<Self> {
        match raw {
            "x86_64" | "amd64" => Ok(Architecture::Amd64),
            "aarch64" | "arm64" => Ok(Architecture::Arm64),
            arch => Err(InstallError::UnsupportedPlatform {
                os: std::env::consts::OS.to_string(),
                arch: arch.to_string(),
            }),
        }
    }

    /// Label used by both the Go download site and GitHub release assets.
    pub fn as_str(&self) -> &str {
        match self {
            Architecture::Amd64 => "amd64",
            Architecture::Arm64 => "arm64",
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Abort before any mutation when the host is not Linux.
pub fn ensure_linux() -> Result<()> {
    if std::env::consts::OS != "linux" {
        return Err(InstallError::UnsupportedPlatform {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
        });
    }
    Ok(())
}

/// Abort before any mutation when not running as root. Installing binaries
/// under /usr/local and writing systemd units both need euid 0.
pub fn ensure_root() -> Result<()> {
    let euid = unsafe { libc::geteuid() };
    if euid != 0 {
        return Err(InstallError::NotRoot);
    }
    Ok(())
}
