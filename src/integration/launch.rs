use anyhow::{Context, Result};
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::info;

/// Start `binary` with `args`, detached from the installer.
///
/// The child gets its own process group and no inherited standard streams, so
/// it keeps running after the installer exits and is not hit by signals sent
/// to the installer's terminal. Returns the child's pid.
pub fn launch(binary: &Path, args: &[String]) -> Result<u32> {
    let mut command = Command::new(binary);
    command.args(args).stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::null());

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }

    let child =
        command.spawn().with_context(|| format!("Failed to launch {}", binary.display()))?;
    let pid = child.id();
    info!(pid, "Launched {}", binary.display());
    Ok(pid)
}
