use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub listen: String,
    pub store_path: String,
    pub uploads_dir: String,
    /// Base used for links shown after upload, e.g. `https://drop.example.org`.
    pub public_url: Option<String>,
    pub session_secret: Option<String>,
    pub session_ttl_secs: i64,
    pub admin_username: String,
    pub admin_password: Option<String>,
    /// argon2 PHC string; takes precedence over `admin_password`.
    pub admin_password_hash: Option<String>,
    pub max_upload_size: usize,
    /// Random bytes in a storage name (two hex chars each).
    pub name_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:3000".to_string(),
            store_path: "./data.json".to_string(),
            uploads_dir: "./uploads".to_string(),
            public_url: None,
            session_secret: None,
            session_ttl_secs: 3600,
            admin_username: "admin".to_string(),
            admin_password: None,
            admin_password_hash: None,
            max_upload_size: 500 * 1024 * 1024,
            name_bytes: 3,
        }
    }
}

impl Config {
    /// Reads `path`, writing the defaults there first when it does not exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            toml::from_str(&contents).with_context(|| format!("failed to parse {}", path.display()))
        } else {
            let default_config = Config::default();
            let toml_string = toml::to_string_pretty(&default_config)?;
            std::fs::write(path, toml_string)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(default_config)
        }
    }

    /// Config file from the first CLI argument, `DROPLINK_CONFIG`, or
    /// `config.toml`, then `PORT` and `SESSION_SECRET` from the environment.
    pub fn from_args_env() -> anyhow::Result<Self> {
        let path = std::env::args()
            .nth(1)
            .or_else(|| std::env::var("DROPLINK_CONFIG").ok())
            .unwrap_or_else(|| "config.toml".to_string());
        let mut cfg = Self::load(Path::new(&path))?;
        cfg.apply_env(|key| std::env::var(key).ok());
        cfg.prepare_dirs()?;
        Ok(cfg)
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(port) = var("PORT").filter(|p| !p.trim().is_empty()) {
            self.listen = format!("0.0.0.0:{}", port.trim());
        }
        if let Some(secret) = var("SESSION_SECRET").filter(|s| !s.is_empty()) {
            self.session_secret = Some(secret);
        }
        if self.session_secret.is_none() {
            self.session_secret = Some(uuid::Uuid::new_v4().to_string());
        }
    }

    /// Creates the uploads directory and makes its path absolute, so stored
    /// records always point at absolute paths.
    pub fn prepare_dirs(&mut self) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.uploads_dir)
            .with_context(|| format!("failed to create {}", self.uploads_dir))?;
        let abs = std::fs::canonicalize(&self.uploads_dir)?;
        self.uploads_dir = abs.to_string_lossy().into_owned();
        Ok(())
    }

    pub fn uploads_path(&self) -> PathBuf {
        PathBuf::from(&self.uploads_dir)
    }

    pub fn session_secret_bytes(&self) -> &[u8] {
        self.session_secret.as_deref().unwrap_or_default().as_bytes()
    }
}
