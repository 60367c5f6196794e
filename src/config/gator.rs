// src/config/gator.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = ".gatorconfig.json";
const ENV_CONFIG_PATH: &str = "GATOR_CONFIG_PATH";
const ENV_DATABASE_URL: &str = "DATABASE_URL";

/// Contents of `~/.gatorconfig.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatorConfig {
    #[serde(default)]
    pub db_url: String,
    #[serde(rename = "current_user_name", default)]
    pub current_user: String,
    #[serde(skip)]
    path: PathBuf,
}

impl GatorConfig {
    /// Config path: `$GATOR_CONFIG_PATH`, else `$HOME/.gatorconfig.json`.
    pub fn default_path() -> Result<PathBuf> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            if !p.trim().is_empty() {
                return Ok(PathBuf::from(p));
            }
        }
        let home = std::env::var_os("HOME")
            .filter(|h| !h.is_empty())
            .ok_or_else(|| anyhow!("HOME is not set; cannot locate {CONFIG_FILE_NAME}"))?;
        Ok(PathBuf::from(home).join(CONFIG_FILE_NAME))
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let mut cfg: GatorConfig = serde_json::from_str(&data)
            .with_context(|| format!("parsing config {}", path.display()))?;
        cfg.current_user = cfg.current_user.trim().to_string();
        cfg.path = path.to_path_buf();
        Ok(cfg)
    }

    /// Connection string, with `$DATABASE_URL` taking precedence over the file.
    pub fn database_url(&self) -> Result<String> {
        if let Ok(url) = std::env::var(ENV_DATABASE_URL) {
            if !url.trim().is_empty() {
                return Ok(url);
            }
        }
        if self.db_url.trim().is_empty() {
            return Err(anyhow!(
                "no database URL: set db_url in {} or DATABASE_URL",
                self.path.display()
            ));
        }
        Ok(self.db_url.clone())
    }

    pub fn current_user(&self) -> Option<&str> {
        Some(self.current_user.as_str()).filter(|u| !u.is_empty())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Switch the current user and persist the file.
    pub fn set_user(&mut self, name: &str) -> Result<()> {
        self.current_user = name.to_string();
        self.write()
    }

    fn write(&self) -> Result<()> {
        let data = serde_json::to_string_pretty(self)?;
        fs::write(&self.path, data)
            .with_context(|| format!("writing config to {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn reads_current_user_name_field() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join(CONFIG_FILE_NAME);
        fs::write(
            &p,
            r#"{"db_url":"postgres://localhost/gator","current_user_name":" kahya "}"#,
        )
        .unwrap();
        let cfg = GatorConfig::load_from(&p).unwrap();
        assert_eq!(cfg.db_url, "postgres://localhost/gator");
        assert_eq!(cfg.current_user(), Some("kahya"));
        assert_eq!(cfg.path(), p.as_path());
    }

    #[test]
    fn set_user_round_trips_through_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&p, r#"{"db_url":"postgres://x"}"#).unwrap();

        let mut cfg = GatorConfig::load_from(&p).unwrap();
        assert_eq!(cfg.current_user(), None);
        cfg.set_user("holgith").unwrap();

        let again = GatorConfig::load_from(&p).unwrap();
        assert_eq!(again.current_user(), Some("holgith"));
        assert_eq!(again.db_url, "postgres://x");
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(GatorConfig::load_from(&dir.path().join("nope.json")).is_err());
    }

    #[serial_test::serial]
    #[test]
    fn env_overrides_path_and_database_url() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("custom.json");
        fs::write(&p, r#"{"db_url":"postgres://file"}"#).unwrap();

        env::set_var(ENV_CONFIG_PATH, p.display().to_string());
        env::remove_var(ENV_DATABASE_URL);
        let cfg = GatorConfig::load().unwrap();
        assert_eq!(cfg.database_url().unwrap(), "postgres://file");

        env::set_var(ENV_DATABASE_URL, "postgres://env");
        assert_eq!(cfg.database_url().unwrap(), "postgres://env");

        env::remove_var(ENV_DATABASE_URL);
        env::remove_var(ENV_CONFIG_PATH);
    }
}
