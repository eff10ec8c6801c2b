use crate::download::{ArtifactFetcher, Downloader};
use crate::error::{InstallError, Result};
use crate::runner::CommandRunner;
use crate::version::{extract_version, Version};
use chrono::{DateTime, Utc};
use colored::*;
use flate2::read::GzDecoder;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tar::Archive;
use tracing::{info, warn};

/// A binary that has been swapped into place.
#[derive(Debug, Clone)]
pub struct InstalledBinary {
    pub path: PathBuf,
    pub version: Option<Version>,
    pub installed_at: DateTime<Utc>,
}

pub struct ArtifactInstaller {
    fetcher: Arc<dyn ArtifactFetcher>,
    runner: Arc<dyn CommandRunner>,
}

impl ArtifactInstaller {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            fetcher: Arc::new(Downloader::new()),
            runner,
        }
    }

    pub fn with_fetcher(fetcher: Arc<dyn ArtifactFetcher>, runner: Arc<dyn CommandRunner>) -> Self {
        Self { fetcher, runner }
    }

    /// Download a single-file binary and atomically swap it into `target`.
    ///
    /// The download lands in a scratch file beside the target; the previous
    /// binary is removed only after the scratch file is fully written, and
    /// the rename is the last step. A failure anywhere earlier leaves the
    /// previous installation untouched.
    pub async fn install_binary(
        &self,
        url: &str,
        target: &Path,
        checksum: Option<&str>,
    ) -> Result<InstalledBinary> {
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let scratch = scratch_path(target);

        info!("Downloading {} to {}", url, scratch.display());
        if let Err(e) = self.fetcher.fetch(url, &scratch).await {
            let _ = std::fs::remove_file(&scratch);
            return Err(e);
        }

        if let Some(expected) = checksum {
            if !Downloader::verify_checksum(&scratch, expected).await? {
                let _ = std::fs::remove_file(&scratch);
                return Err(InstallError::ChecksumMismatch {
                    file: scratch.display().to_string(),
                });
            }
        }

        mark_executable(&scratch)?;

        if target.exists() {
            std::fs::remove_file(target)?;
        }
        std::fs::rename(&scratch, target)?;

        println!(
            "{} {} installed",
            "✓".green().bold(),
            target.display().to_string().cyan()
        );

        let version = self.probe(target);
        Ok(InstalledBinary {
            path: target.to_path_buf(),
            version,
            installed_at: Utc::now(),
        })
    }

    /// Download a gzipped tarball and replace the directory tree at `dest`.
    ///
    /// Same ordering guarantee as `install_binary`: the archive is fully
    /// downloaded and unpacked to the side before the previous tree is
    /// removed. Used for the Go toolchain, whose tarball carries a single
    /// `go/` root directory.
    pub async fn install_tree(&self, url: &str, dest: &Path) -> Result<()> {
        let parent = dest.parent().ok_or_else(|| {
            InstallError::ExtractionFailed(format!("{} has no parent directory", dest.display()))
        })?;
        std::fs::create_dir_all(parent)?;

        let scratch = scratch_path(dest).with_extension("tar.gz.partial");
        info!("Downloading {} to {}", url, scratch.display());
        if let Err(e) = self.fetcher.fetch(url, &scratch).await {
            let _ = std::fs::remove_file(&scratch);
            return Err(e);
        }

        let unpack_dir = parent.join(format!(
            ".tmp_{}",
            dest.file_name().and_then(|n| n.to_str()).unwrap_or("tree")
        ));
        if unpack_dir.exists() {
            std::fs::remove_dir_all(&unpack_dir)?;
        }
        std::fs::create_dir_all(&unpack_dir)?;

        let result = extract_tar_gz(&scratch, &unpack_dir);
        let _ = std::fs::remove_file(&scratch);
        result?;

        // Single root directory (go/) becomes the new tree; otherwise the
        // unpack directory itself does.
        let entries: Vec<_> = std::fs::read_dir(&unpack_dir)?
            .filter_map(|e| e.ok())
            .collect();
        let source = if entries.len() == 1 && entries[0].path().is_dir() {
            entries[0].path()
        } else {
            unpack_dir.clone()
        };

        if dest.exists() {
            std::fs::remove_dir_all(dest)?;
        }
        std::fs::rename(&source, dest)?;
        if unpack_dir.exists() {
            let _ = std::fs::remove_dir_all(&unpack_dir);
        }

        println!(
            "{} {} installed",
            "✓".green().bold(),
            dest.display().to_string().cyan()
        );
        Ok(())
    }

    /// Liveness probe after the swap. Some binaries need a subcommand to
    /// produce any output, so a failed probe is a warning, not an error.
    fn probe(&self, target: &Path) -> Option<Version> {
        let program = target.display().to_string();
        match self.runner.run(&program, &["--version"]) {
            Ok(output) if output.success() => extract_version(&output.text()),
            Ok(output) => {
                warn!(
                    "Probe of {} exited with status {}; continuing",
                    program, output.status
                );
                None
            }
            Err(e) => {
                warn!("Probe of {} failed: {}; continuing", program, e);
                None
            }
        }
    }
}

fn scratch_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("artifact");
    target.with_file_name(format!(".{}.partial", name))
}

fn mark_executable(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))?;
    }
    Ok(())
}

fn extract_tar_gz(archive_path: &Path, dest_dir: &Path) -> Result<()> {
    let tar_gz = File::open(archive_path)?;
    let tar = GzDecoder::new(tar_gz);
    let mut archive = Archive::new(tar);
    archive
        .unpack(dest_dir)
        .map_err(|e| InstallError::ExtractionFailed(e.to_string()))?;
    Ok(())
}
