use crate::config::Config;
use crate::platform::Architecture;
use crate::version::Version;
use std::fmt;
use std::path::PathBuf;

/// Pinned Go toolchain installed when the host's Go is absent or too old.
pub const GO_VERSION: &str = "1.21.6";
/// Minimum Go the application is built against.
pub const GO_MINIMUM: &str = "1.18";

/// Command invoked to discover an installed dependency's version.
#[derive(Debug, Clone)]
pub struct Probe {
    pub program: String,
    pub args: Vec<String>,
}

impl Probe {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// How a dependency gets onto the host when missing or outdated.
#[derive(Debug, Clone)]
pub enum InstallStrategy {
    /// apt-get install; auxiliary tools only.
    Package { package: String },
    /// Fixed-URL download; `unpack` trees are replaced wholesale (Go
    /// toolchain tarball), plain files are swapped atomically.
    DirectDownload {
        url: String,
        dest: PathBuf,
        checksum: Option<String>,
        unpack: bool,
    },
    /// Latest GitHub release, asset chosen by naming convention.
    ReleaseArtifact {
        repo: String,
        asset_base: String,
        target: PathBuf,
    },
}

/// One external tool or runtime the application needs. Declared statically
/// per run; evaluated once; no state persisted between runs beyond what is
/// already on disk.
#[derive(Debug, Clone)]
pub struct Dependency {
    pub name: String,
    pub probe: Probe,
    /// Probe used after installation, when the freshly installed binary may
    /// live at a path the detection probe does not cover.
    pub verify_probe: Option<Probe>,
    pub minimum: Option<Version>,
    pub strategy: InstallStrategy,
    /// Required dependencies abort the run on install failure; optional
    /// ones degrade to a warning.
    pub required: bool,
}

impl Dependency {
    pub fn verify_probe(&self) -> &Probe {
        self.verify_probe.as_ref().unwrap_or(&self.probe)
    }
}

/// Per-dependency lifecycle: Unchecked → Probed → {Satisfied | NeedsInstall}
/// → Installed → Verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyState {
    Unchecked,
    Probed,
    Satisfied,
    NeedsInstall,
    Installed,
    Verified,
}

impl fmt::Display for DependencyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DependencyState::Unchecked => "unchecked",
            DependencyState::Probed => "probed",
            DependencyState::Satisfied => "satisfied",
            DependencyState::NeedsInstall => "needs-install",
            DependencyState::Installed => "installed",
            DependencyState::Verified => "verified",
        };
        write!(f, "{label}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Skip,
    Install,
    Upgrade,
}

/// Derived per run to drive the installer; never stored.
#[derive(Debug, Clone)]
pub struct InstallDecision {
    pub action: Action,
    pub reason: String,
}

/// The dependencies a CaptainCore host needs, leaf tools first and the
/// application binary last so provisioning can assume its runtime exists.
pub fn catalog(config: &Config, arch: Architecture) -> Vec<Dependency> {
    let go_dest = config.paths.go_root.join("go");
    let go_binary = go_dest.join("bin/go").display().to_string();
    let captaincore_target = config.paths.bin_dir.join("captaincore");

    vec![
        Dependency {
            name: "go".to_string(),
            probe: Probe::new("go", &["version"]),
            verify_probe: Some(Probe::new(go_binary, &["version"])),
            minimum: Some(GO_MINIMUM.parse().expect("static version")),
            strategy: InstallStrategy::DirectDownload {
                url: format!("https://go.dev/dl/go{}.linux-{}.tar.gz", GO_VERSION, arch),
                dest: go_dest,
                checksum: None,
                unpack: true,
            },
            required: true,
        },
        Dependency {
            name: "jq".to_string(),
            probe: Probe::new("jq", &["--version"]),
            verify_probe: None,
            minimum: None,
            strategy: InstallStrategy::Package {
                package: "jq".to_string(),
            },
            required: false,
        },
        Dependency {
            name: "git".to_string(),
            probe: Probe::new("git", &["--version"]),
            verify_probe: None,
            minimum: None,
            strategy: InstallStrategy::Package {
                package: "git".to_string(),
            },
            required: false,
        },
        Dependency {
            name: "captaincore".to_string(),
            probe: Probe::new(captaincore_target.display().to_string(), &["--version"]),
            verify_probe: None,
            minimum: None,
            strategy: InstallStrategy::ReleaseArtifact {
                repo: config.repo.clone(),
                asset_base: "captaincore".to_string(),
                target: captaincore_target,
            },
            required: true,
        },
    ]
}
