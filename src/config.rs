use crate::error::Result;
use crate::runner::CommandRunner;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Single default timeout for every bounded wait: release-metadata queries,
/// artifact downloads, and the service start health check.
pub const NETWORK_TIMEOUT: Duration = Duration::from_secs(30);

const CONFIG_FILE: &str = "/etc/captaincore-install.toml";

/// Every host path the installer mutates, gathered in one place so tests can
/// point the whole run at a sandbox root instead of the live filesystem.
#[derive(Debug, Clone)]
pub struct InstallPaths {
    /// Where single-binary dependencies land (captaincore, jq fallbacks).
    pub bin_dir: PathBuf,
    /// Parent of the `go/` toolchain tree.
    pub go_root: PathBuf,
    /// systemd unit directory.
    pub unit_dir: PathBuf,
    /// Reverse-proxy routing file, overwritten whole on each run.
    pub caddyfile: PathBuf,
}

impl Default for InstallPaths {
    fn default() -> Self {
        Self {
            bin_dir: PathBuf::from("/usr/local/bin"),
            go_root: PathBuf::from("/usr/local"),
            unit_dir: PathBuf::from("/etc/systemd/system"),
            caddyfile: PathBuf::from("/etc/caddy/Caddyfile"),
        }
    }
}

impl InstallPaths {
    /// Relocate every path under `root`. Test harness use.
    pub fn under_root(root: &Path) -> Self {
        Self {
            bin_dir: root.join("usr/local/bin"),
            go_root: root.join("usr/local"),
            unit_dir: root.join("etc/systemd/system"),
            caddyfile: root.join("etc/caddy/Caddyfile"),
        }
    }
}

/// Optional on-disk overrides; anything absent falls back to defaults or an
/// interactive prompt.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    domain: Option<String>,
    port: Option<u16>,
    repo: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Public hostname the reverse proxy routes to the service.
    pub domain: String,
    /// Local port the service binds.
    pub port: u16,
    /// GitHub repository the application binary is released from.
    pub repo: String,
    /// Service run-as identity, derived from the invoking user.
    pub user: String,
    pub group: String,
    pub paths: InstallPaths,
}

impl Config {
    pub fn load(runner: &dyn CommandRunner) -> Result<Self> {
        let file = Self::read_config_file()?;

        let user = invoking_user();
        let group = primary_group(runner, &user);

        let domain = match file.domain {
            Some(domain) => domain,
            None => prompt_domain(runner)?,
        };

        let config = Self {
            domain,
            port: file.port.unwrap_or(8080),
            repo: file.repo.unwrap_or_else(|| "CaptainCore/captaincore".to_string()),
            user,
            group,
            paths: InstallPaths::default(),
        };
        info!(
            "Provisioning {} as {}:{} behind {}",
            config.repo, config.user, config.group, config.domain
        );
        Ok(config)
    }

    fn read_config_file() -> Result<ConfigFile> {
        let path = Path::new(CONFIG_FILE);
        if !path.exists() {
            return Ok(ConfigFile::default());
        }
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }
}

/// The service should run as the user who invoked sudo, not as root.
fn invoking_user() -> String {
    std::env::var("SUDO_USER")
        .ok()
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| "root".to_string())
}

fn primary_group(runner: &dyn CommandRunner, user: &str) -> String {
    runner
        .run("id", &["-gn", user])
        .ok()
        .filter(|out| out.success())
        .map(|out| out.stdout.trim().to_string())
        .filter(|g| !g.is_empty())
        .unwrap_or_else(|| user.to_string())
}

fn prompt_domain(runner: &dyn CommandRunner) -> Result<String> {
    let fallback = runner
        .run("hostname", &["-f"])
        .ok()
        .filter(|out| out.success())
        .map(|out| out.stdout.trim().to_string())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "localhost".to_string());

    let domain: String = dialoguer::Input::new()
        .with_prompt("Domain name for CaptainCore")
        .default(fallback)
        .interact_text()
        .map_err(|e| crate::error::InstallError::ConfigError(e.to_string()))?;

    Ok(domain.trim().to_string())
}
