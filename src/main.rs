mod config;
mod dependency;
mod download;
mod error;
mod install;
mod pipeline;
mod pkg;
mod platform;
mod release;
mod runner;
mod service;
mod version;

use anyhow::Result;
use config::Config;
use install::ArtifactInstaller;
use pipeline::DependencyPipeline;
use release::GitHubReleases;
use runner::SystemRunner;
use service::{ProxyRoute, ServiceProvisioner, ServiceSpec};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    if let Err(e) = run().await {
        error!("Provisioning failed: {e}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> error::Result<()> {
    // Fatal gates before any host mutation.
    platform::ensure_linux()?;
    platform::ensure_root()?;
    let arch = platform::Architecture::detect()?;
    info!("Host architecture: {arch}");

    let runner: Arc<dyn runner::CommandRunner> = Arc::new(SystemRunner);
    let config = Config::load(runner.as_ref())?;

    let dependencies = dependency::catalog(&config, arch);
    let pipeline = DependencyPipeline::new(
        runner.clone(),
        Arc::new(GitHubReleases::new()),
        ArtifactInstaller::new(runner.clone()),
        arch,
    );
    pipeline.run(&dependencies).await?;

    let go_bin = config.paths.go_root.join("go/bin");
    let spec = ServiceSpec {
        name: "captaincore".to_string(),
        description: "CaptainCore server".to_string(),
        binary: config.paths.bin_dir.join("captaincore"),
        args: vec!["server".to_string()],
        user: config.user.clone(),
        group: config.group.clone(),
        restart: "always".to_string(),
        ambient_capabilities: vec!["CAP_NET_BIND_SERVICE".to_string()],
        environment: vec![(
            "PATH".to_string(),
            format!("{}:/usr/local/bin:/usr/bin:/bin", go_bin.display()),
        )],
    };
    let route = ProxyRoute {
        domain: config.domain.clone(),
        backend: format!("localhost:{}", config.port),
    };

    ServiceProvisioner::new(runner, config.paths.clone())
        .provision(&spec, &route)
        .await?;

    info!("Provisioning complete: {} is live at {}", spec.name, config.domain);
    Ok(())
}
