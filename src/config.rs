use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::extract::ExtractContext;
use crate::linker::LinkOptions;
use crate::script::TeamInfo;
use crate::source::DumpDirSource;

pub const DEFAULT_DATABASE: &str = "ninox_schema.db";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NinoxConfig {
    pub database: Option<String>,
    #[serde(default)]
    pub environments: BTreeMap<String, Environment>,
    #[serde(default)]
    pub extract: LinkOptions,
}

/// One Ninox team and where its schema dumps live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Environment {
    pub team_id: String,
    pub team_name: Option<String>,
    /// Dump directory
    pub source: PathBuf,
    /// Database IDs or names to extract; all when empty
    #[serde(default)]
    pub databases: Vec<String>,
}

impl NinoxConfig {
    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(self.database.as_deref().unwrap_or(DEFAULT_DATABASE))
    }

    pub fn environment(&self, name: &str) -> anyhow::Result<&Environment> {
        self.environments.get(name).ok_or_else(|| {
            let known: Vec<_> = self.environments.keys().map(String::as_str).collect();
            anyhow::anyhow!("unknown environment '{}' (configured: {})", name, known.join(", "))
        })
    }
}

impl Environment {
    /// Source and run context for this environment; relative source paths resolve
    /// against `base`.
    pub fn extraction(&self, base: &Path, options: LinkOptions) -> (DumpDirSource, ExtractContext) {
        let source = DumpDirSource::new(base.join(&self.source));
        let ctx = ExtractContext::new(TeamInfo::new(self.team_id.clone(), self.team_name.clone()))
            .with_options(options)
            .only(self.databases.iter().cloned());
        (source, ctx)
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("ninox-schema.toml")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<NinoxConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: NinoxConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

pub fn ensure_db_dir(db_path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linker::ScanMode;

    #[test]
    fn test_missing_config() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(Some(&dir.path().join("none.toml"))).unwrap().is_none());
    }

    #[test]
    fn test_load_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ninox-schema.toml");
        std::fs::write(
            &path,
            r#"
database = "out/index.db"

[environments.dev]
team_id = "t1"
team_name = "Acme"
source = "dumps/dev"
databases = ["abc"]

[extract]
scan_mode = "code-only"
"#,
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap().unwrap();
        assert_eq!(config.database_path(), PathBuf::from("out/index.db"));
        assert_eq!(config.extract.scan_mode, ScanMode::CodeOnly);
        assert_eq!(config.extract.snippet_chars, LinkOptions::default().snippet_chars);

        let env = config.environment("dev").unwrap();
        let (source, ctx) = env.extraction(dir.path(), config.extract);
        assert_eq!(source.dir(), dir.path().join("dumps/dev"));
        assert_eq!(ctx.team.name, "Acme");
        assert_eq!(ctx.databases, vec!["abc"]);

        assert!(config.environment("prod").is_err());
    }

    #[test]
    fn test_defaults() {
        let config: NinoxConfig = toml::from_str("").unwrap();
        assert_eq!(config.database_path(), PathBuf::from(DEFAULT_DATABASE));
        assert_eq!(config.extract, LinkOptions::default());
    }

    #[test]
    fn test_ensure_db_dir() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("a").join("b").join("x.db");
        ensure_db_dir(&db).unwrap();
        assert!(db.parent().unwrap().is_dir());
    }
}
