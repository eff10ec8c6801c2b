use crate::config::{InstallPaths, NETWORK_TIMEOUT};
use crate::error::{InstallError, Result};
use crate::runner::CommandRunner;
use colored::*;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Everything needed to render the supervision unit. Same inputs always
/// render the same bytes, so re-provisioning is idempotent by construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSpec {
    pub name: String,
    pub description: String,
    pub binary: PathBuf,
    pub args: Vec<String>,
    pub user: String,
    pub group: String,
    pub restart: String,
    pub ambient_capabilities: Vec<String>,
    pub environment: Vec<(String, String)>,
}

/// One public hostname routed to one local backend. The generated Caddyfile
/// is overwritten whole on each run, so unrelated pre-existing routes are
/// not preserved (documented caveat).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyRoute {
    pub domain: String,
    pub backend: String,
}

pub fn render_unit(spec: &ServiceSpec) -> String {
    let mut exec_start = spec.binary.display().to_string();
    for arg in &spec.args {
        exec_start.push(' ');
        exec_start.push_str(arg);
    }

    let mut unit = String::new();
    unit.push_str("[Unit]\n");
    unit.push_str(&format!("Description={}\n", spec.description));
    unit.push_str("After=network.target\n");
    unit.push_str("\n[Service]\n");
    unit.push_str("Type=simple\n");
    unit.push_str(&format!("User={}\n", spec.user));
    unit.push_str(&format!("Group={}\n", spec.group));
    for (key, value) in &spec.environment {
        unit.push_str(&format!("Environment={}={}\n", key, value));
    }
    unit.push_str(&format!("ExecStart={}\n", exec_start));
    unit.push_str(&format!("Restart={}\n", spec.restart));
    unit.push_str("RestartSec=5\n");
    if !spec.ambient_capabilities.is_empty() {
        unit.push_str(&format!(
            "AmbientCapabilities={}\n",
            spec.ambient_capabilities.join(" ")
        ));
    }
    unit.push_str("\n[Install]\nWantedBy=multi-user.target\n");
    unit
}

pub fn render_caddyfile(route: &ProxyRoute) -> String {
    format!(
        "{} {{\n    reverse_proxy {}\n}}\n",
        route.domain, route.backend
    )
}

pub struct ServiceProvisioner {
    runner: Arc<dyn CommandRunner>,
    paths: InstallPaths,
    wait_attempts: u32,
    wait_interval: Duration,
}

impl ServiceProvisioner {
    pub fn new(runner: Arc<dyn CommandRunner>, paths: InstallPaths) -> Self {
        Self {
            runner,
            paths,
            wait_attempts: NETWORK_TIMEOUT.as_secs() as u32,
            wait_interval: Duration::from_secs(1),
        }
    }

    /// Shorten the start health-check wait. Test use.
    pub fn with_wait(mut self, attempts: u32, interval: Duration) -> Self {
        self.wait_attempts = attempts;
        self.wait_interval = interval;
        self
    }

    /// Write the unit and the proxy route, reload systemd, enable the
    /// service at boot, (re)start it, and health-check it. Failure to reach
    /// a running state is reported with the journal tail, not retried.
    pub async fn provision(&self, spec: &ServiceSpec, route: &ProxyRoute) -> Result<()> {
        let unit_path = self.paths.unit_dir.join(format!("{}.service", spec.name));
        info!("Writing systemd unit to {}", unit_path.display());
        if let Some(parent) = unit_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&unit_path, render_unit(spec))?;

        info!(
            "Writing proxy route {} -> {} to {}",
            route.domain,
            route.backend,
            self.paths.caddyfile.display()
        );
        if self.paths.caddyfile.exists() {
            warn!("Overwriting existing Caddyfile; unrelated routes are not preserved");
        }
        if let Some(parent) = self.paths.caddyfile.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.paths.caddyfile, render_caddyfile(route))?;

        self.systemctl(&["daemon-reload"])?;
        self.systemctl(&["enable", &spec.name])?;
        self.systemctl(&["restart", &spec.name])?;
        self.wait_until_active(&spec.name).await?;

        // Reload picks up the new route; start covers the proxy not yet
        // running at all.
        let reload = self.runner.run("systemctl", &["reload", "caddy"])?;
        if !reload.success() {
            info!("Caddy reload failed (not running yet?); starting it");
            let start = self.runner.run("systemctl", &["start", "caddy"])?;
            if !start.success() {
                return Err(InstallError::CommandFailed {
                    command: "systemctl start caddy".to_string(),
                    message: start.stderr.trim().to_string(),
                });
            }
        }

        println!(
            "{} {} running behind {}",
            "✓".green().bold(),
            spec.name.cyan(),
            route.domain.yellow()
        );
        Ok(())
    }

    fn systemctl(&self, args: &[&str]) -> Result<()> {
        info!("systemctl {}", args.join(" "));
        let output = self.runner.run("systemctl", args)?;
        if !output.success() {
            return Err(InstallError::CommandFailed {
                command: format!("systemctl {}", args.join(" ")),
                message: output.stderr.trim().to_string(),
            });
        }
        Ok(())
    }

    /// Poll `systemctl is-active` for a bounded time. On expiry, surface
    /// the service's recent journal lines for operator inspection.
    async fn wait_until_active(&self, service: &str) -> Result<()> {
        for _ in 0..self.wait_attempts {
            if let Ok(output) = self.runner.run("systemctl", &["is-active", service]) {
                if output.success() && output.stdout.trim() == "active" {
                    return Ok(());
                }
            }
            tokio::time::sleep(self.wait_interval).await;
        }

        let journal = self
            .runner
            .run("journalctl", &["-u", service, "-n", "20", "--no-pager"])
            .map(|out| out.stdout)
            .unwrap_or_else(|e| format!("(journal unavailable: {e})"));

        Err(InstallError::ServiceStartFailed {
            service: service.to_string(),
            journal: journal.trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::testing::RecordingRunner;

    fn spec() -> ServiceSpec {
        ServiceSpec {
            name: "captaincore".to_string(),
            description: "CaptainCore server".to_string(),
            binary: PathBuf::from("/usr/local/bin/captaincore"),
            args: vec!["server".to_string()],
            user: "deploy".to_string(),
            group: "deploy".to_string(),
            restart: "always".to_string(),
            ambient_capabilities: vec!["CAP_NET_BIND_SERVICE".to_string()],
            environment: vec![(
                "PATH".to_string(),
                "/usr/local/go/bin:/usr/local/bin:/usr/bin:/bin".to_string(),
            )],
        }
    }

    fn route() -> ProxyRoute {
        ProxyRoute {
            domain: "core.example.com".to_string(),
            backend: "localhost:8080".to_string(),
        }
    }

    #[test]
    fn test_render_unit_is_deterministic() {
        assert_eq!(render_unit(&spec()), render_unit(&spec()));
    }

    #[test]
    fn test_render_unit_contents() {
        let unit = render_unit(&spec());
        assert!(unit.contains("ExecStart=/usr/local/bin/captaincore server\n"));
        assert!(unit.contains("User=deploy\n"));
        assert!(unit.contains("Group=deploy\n"));
        assert!(unit.contains("Restart=always\n"));
        assert!(unit.contains("AmbientCapabilities=CAP_NET_BIND_SERVICE\n"));
        assert!(unit.contains("WantedBy=multi-user.target\n"));
    }

    #[test]
    fn test_render_caddyfile_single_route() {
        let caddyfile = render_caddyfile(&route());
        assert_eq!(
            caddyfile,
            "core.example.com {\n    reverse_proxy localhost:8080\n}\n"
        );
        // One route per hostname: the whole file is exactly one block.
        assert_eq!(caddyfile.matches("reverse_proxy").count(), 1);
    }

    fn scripted_runner() -> Arc<RecordingRunner> {
        let runner = Arc::new(RecordingRunner::new());
        runner.respond("systemctl", 0, ""); // daemon-reload
        runner.respond("systemctl", 0, ""); // enable
        runner.respond("systemctl", 0, ""); // restart
        runner.respond("systemctl", 0, "active\n"); // is-active
        runner
    }

    #[tokio::test]
    async fn test_provision_writes_files_and_starts_service() {
        let dir = tempfile::tempdir().unwrap();
        let paths = InstallPaths::under_root(dir.path());
        let runner = scripted_runner();
        runner.respond("systemctl", 0, ""); // reload caddy

        let provisioner = ServiceProvisioner::new(runner.clone(), paths.clone())
            .with_wait(3, Duration::ZERO);
        provisioner.provision(&spec(), &route()).await.unwrap();

        let unit_path = paths.unit_dir.join("captaincore.service");
        assert_eq!(std::fs::read_to_string(&unit_path).unwrap(), render_unit(&spec()));
        assert_eq!(
            std::fs::read_to_string(&paths.caddyfile).unwrap(),
            render_caddyfile(&route())
        );

        let calls = runner.calls_to("systemctl");
        assert!(calls.contains(&"systemctl daemon-reload".to_string()));
        assert!(calls.contains(&"systemctl enable captaincore".to_string()));
        assert!(calls.contains(&"systemctl restart captaincore".to_string()));
        assert!(calls.contains(&"systemctl reload caddy".to_string()));
    }

    #[tokio::test]
    async fn test_provision_twice_produces_identical_unit_file() {
        let dir = tempfile::tempdir().unwrap();
        let paths = InstallPaths::under_root(dir.path());

        let mut first_bytes = None;
        for _ in 0..2 {
            let runner = scripted_runner();
            runner.respond("systemctl", 0, ""); // reload caddy
            let provisioner = ServiceProvisioner::new(runner, paths.clone())
                .with_wait(3, Duration::ZERO);
            provisioner.provision(&spec(), &route()).await.unwrap();

            let bytes = std::fs::read(paths.unit_dir.join("captaincore.service")).unwrap();
            match &first_bytes {
                None => first_bytes = Some(bytes),
                Some(previous) => assert_eq!(previous, &bytes),
            }
        }
    }

    #[tokio::test]
    async fn test_start_failure_surfaces_journal_tail() {
        let dir = tempfile::tempdir().unwrap();
        let paths = InstallPaths::under_root(dir.path());
        let runner = Arc::new(RecordingRunner::new());
        runner.respond("systemctl", 0, ""); // daemon-reload
        runner.respond("systemctl", 0, ""); // enable
        runner.respond("systemctl", 0, ""); // restart
        runner.respond("systemctl", 3, "failed\n"); // is-active, repeats
        runner.respond("journalctl", 0, "panic: cannot bind :443\n");

        let provisioner = ServiceProvisioner::new(runner, paths)
            .with_wait(2, Duration::ZERO);
        let err = provisioner.provision(&spec(), &route()).await.unwrap_err();

        match err {
            InstallError::ServiceStartFailed { service, journal } => {
                assert_eq!(service, "captaincore");
                assert!(journal.contains("cannot bind"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_caddy_reload_falls_back_to_start() {
        let dir = tempfile::tempdir().unwrap();
        let paths = InstallPaths::under_root(dir.path());
        let runner = scripted_runner();
        runner.respond("systemctl", 1, ""); // reload caddy fails
        runner.respond("systemctl", 0, ""); // start caddy succeeds

        let provisioner = ServiceProvisioner::new(runner.clone(), paths)
            .with_wait(3, Duration::ZERO);
        provisioner.provision(&spec(), &route()).await.unwrap();

        let calls = runner.calls_to("systemctl");
        assert!(calls.contains(&"systemctl start caddy".to_string()));
    }
}
