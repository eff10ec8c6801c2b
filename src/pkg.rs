use crate::error::{InstallError, Result};
use crate::runner::CommandRunner;
use tracing::info;

/// Ensure an apt package is present. The package manager is treated as an
/// opaque collaborator: install is idempotent on its side, so no separate
/// "is it installed" query is needed.
pub fn ensure_package(runner: &dyn CommandRunner, package: &str) -> Result<()> {
    info!("Installing package {} via apt-get", package);
    let output = runner.run("apt-get", &["install", "-y", package])?;
    if !output.success() {
        return Err(InstallError::InstallFailed {
            dependency: package.to_string(),
            message: format!(
                "apt-get exited with status {}: {}",
                output.status,
                output.stderr.trim()
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::testing::RecordingRunner;

    #[test]
    fn test_ensure_package_invokes_apt() {
        let runner = RecordingRunner::new();
        runner.respond("apt-get", 0, "");

        ensure_package(&runner, "jq").unwrap();
        assert_eq!(runner.calls_to("apt-get"), vec!["apt-get install -y jq"]);
    }

    #[test]
    fn test_ensure_package_surfaces_failure() {
        let runner = RecordingRunner::new();
        runner.respond("apt-get", 100, "");

        let err = ensure_package(&runner, "jq").unwrap_err();
        assert!(matches!(err, InstallError::InstallFailed { dependency, .. } if dependency == "jq"));
    }
}
