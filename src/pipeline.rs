use crate::dependency::{Action, Dependency, DependencyState, InstallDecision, InstallStrategy, Probe};
use crate::error::Result;
use crate::install::ArtifactInstaller;
use crate::pkg;
use crate::platform::Architecture;
use crate::release::{asset_candidates, select_asset, ReleaseSource};
use crate::runner::CommandRunner;
use crate::version::{extract_version, Version};
use colored::*;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Drives each dependency through probe → compare → resolve → install →
/// verify. Strictly sequential: installs mutate shared host state (binaries
/// at well-known paths, one systemd config, one proxy config), so one
/// dependency completes before the next begins.
pub struct DependencyPipeline {
    runner: Arc<dyn CommandRunner>,
    releases: Arc<dyn ReleaseSource>,
    installer: ArtifactInstaller,
    arch: Architecture,
}

impl DependencyPipeline {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        releases: Arc<dyn ReleaseSource>,
        installer: ArtifactInstaller,
        arch: Architecture,
    ) -> Self {
        Self {
            runner,
            releases,
            installer,
            arch,
        }
    }

    pub async fn run(&self, dependencies: &[Dependency]) -> Result<()> {
        for dependency in dependencies {
            self.process(dependency).await?;
        }
        Ok(())
    }

    /// Walk one dependency through its state machine. Returns the terminal
    /// state; a fatal error for a required dependency aborts the run.
    pub async fn process(&self, dependency: &Dependency) -> Result<DependencyState> {
        info!("Checking {}", dependency.name);

        let probed = self.probe_version(&dependency.probe);
        let state = DependencyState::Probed;
        let decision = decide(dependency, probed.as_ref());
        info!(
            "{}: {} ({})",
            dependency.name,
            state,
            decision.reason
        );

        match decision.action {
            Action::Skip => {
                println!(
                    "{} {} {}",
                    "✓".green().bold(),
                    dependency.name.cyan(),
                    decision.reason.dimmed()
                );
                return Ok(DependencyState::Satisfied);
            }
            Action::Install | Action::Upgrade => {
                info!("{}: {}", dependency.name, DependencyState::NeedsInstall);
            }
        }

        if let Err(e) = self.install(dependency).await {
            if dependency.required {
                error!("Failed to install required dependency {}: {}", dependency.name, e);
                return Err(e);
            }
            warn!(
                "Failed to install optional dependency {}: {}; continuing",
                dependency.name, e
            );
            return Ok(DependencyState::NeedsInstall);
        }
        info!("{}: {}", dependency.name, DependencyState::Installed);

        // Re-probe; a verification failure is logged but never rolled back.
        match self.probe_version(dependency.verify_probe()) {
            Some(version) => {
                println!(
                    "{} {} {} installed",
                    "✓".green().bold(),
                    dependency.name.cyan(),
                    version.to_string().yellow()
                );
                info!("{}: {}", dependency.name, DependencyState::Verified);
                Ok(DependencyState::Verified)
            }
            None => {
                warn!(
                    "Could not verify {} after installation; the installed artifact is kept",
                    dependency.name
                );
                Ok(DependencyState::Installed)
            }
        }
    }

    /// Invoke the probe command and parse a version out of its output.
    /// Command absence, a failing exit status, or unparseable output all
    /// read as "not installed".
    fn probe_version(&self, probe: &Probe) -> Option<Version> {
        let args: Vec<&str> = probe.args.iter().map(String::as_str).collect();
        match self.runner.run(&probe.program, &args) {
            Ok(output) if output.success() => extract_version(&output.text()),
            _ => None,
        }
    }

    async fn install(&self, dependency: &Dependency) -> Result<()> {
        match &dependency.strategy {
            InstallStrategy::Package { package } => {
                pkg::ensure_package(self.runner.as_ref(), package)
            }
            InstallStrategy::DirectDownload {
                url,
                dest,
                checksum,
                unpack,
            } => {
                if *unpack {
                    self.installer.install_tree(url, dest).await
                } else {
                    self.installer
                        .install_binary(url, dest, checksum.as_deref())
                        .await
                        .map(|_| ())
                }
            }
            InstallStrategy::ReleaseArtifact {
                repo,
                asset_base,
                target,
            } => {
                let release = self.releases.latest_release(repo).await?;
                info!("Latest release of {} is {}", repo, release.tag);

                let patterns = asset_candidates(asset_base, &release.tag, self.arch);
                let asset = select_asset(&release, &patterns, &dependency.name)?;
                info!("Selected asset {}", asset.name);

                self.installer
                    .install_binary(&asset.download_url, target, None)
                    .await
                    .map(|_| ())
            }
        }
    }
}

/// Pure comparison step: installed state plus declared minimum in,
/// skip/install/upgrade decision out.
pub fn decide(dependency: &Dependency, probed: Option<&Version>) -> InstallDecision {
    match (probed, dependency.minimum.as_ref()) {
        (None, _) => InstallDecision {
            action: Action::Install,
            reason: "not found or version unreadable".to_string(),
        },
        (Some(version), None) => InstallDecision {
            action: Action::Skip,
            reason: format!("already installed ({version})"),
        },
        (Some(version), Some(minimum)) => {
            if version.satisfies(minimum) {
                InstallDecision {
                    action: Action::Skip,
                    reason: format!("{version} satisfies minimum {minimum}"),
                }
            } else {
                InstallDecision {
                    action: Action::Upgrade,
                    reason: format!("{version} is below minimum {minimum}"),
                }
            }
        }
    }
}
