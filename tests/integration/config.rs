use aiup_cli::config::{CONFIG_PATH_ENV, InstallerConfig};
use serial_test::serial;
use tempfile::TempDir;

struct EnvGuard;

impl EnvGuard {
    fn set(value: &std::path::Path) -> Self {
        // SAFETY: tests touching the environment are serialized with #[serial]
        unsafe { std::env::set_var(CONFIG_PATH_ENV, value) };
        Self
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        // SAFETY: see EnvGuard::set
        unsafe { std::env::remove_var(CONFIG_PATH_ENV) };
    }
}

#[tokio::test]
#[serial]
async fn env_var_selects_config_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("aiup.toml");
    std::fs::write(&path, "app_name = \"FromEnv\"\nbinary_name = \"env.AppImage\"\n").unwrap();
    let _env = EnvGuard::set(&path);

    let config = InstallerConfig::load(None).await.unwrap();

    assert_eq!(config.app_name, "FromEnv");
    assert_eq!(config.binary_name, "env.AppImage");
}

#[tokio::test]
#[serial]
async fn explicit_path_beats_env_var() {
    let temp = TempDir::new().unwrap();
    let env_path = temp.path().join("env.toml");
    let explicit = temp.path().join("explicit.toml");
    std::fs::write(&env_path, "app_name = \"FromEnv\"\n").unwrap();
    std::fs::write(&explicit, "app_name = \"Explicit\"\n").unwrap();
    let _env = EnvGuard::set(&env_path);

    let config = InstallerConfig::load(Some(&explicit)).await.unwrap();

    assert_eq!(config.app_name, "Explicit");
}

#[tokio::test]
#[serial]
async fn env_var_pointing_nowhere_is_an_error() {
    let temp = TempDir::new().unwrap();
    let _env = EnvGuard::set(&temp.path().join("missing.toml"));

    assert!(InstallerConfig::load(None).await.is_err());
}
