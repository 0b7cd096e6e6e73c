use crate::core::AiupError;
use tracing::warn;

/// Architectures the managed AppImage is built for.
const SUPPORTED_ARCHES: &[&str] = &["x86_64"];

/// Fail unless running on Linux; warn on untested architectures.
pub fn check_platform() -> Result<(), AiupError> {
    if let Some(warning) = check(std::env::consts::OS, std::env::consts::ARCH)? {
        warn!("{warning}");
    }
    Ok(())
}

fn check(os: &str, arch: &str) -> Result<Option<String>, AiupError> {
    if os != "linux" {
        return Err(AiupError::Other {
            message: format!("AppImages only run on Linux, this system is {os}"),
        });
    }
    if !SUPPORTED_ARCHES.contains(&arch) {
        return Ok(Some(format!("Architecture {arch} may not be supported by this release")));
    }
    Ok(None)
}
