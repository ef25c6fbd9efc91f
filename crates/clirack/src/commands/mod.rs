pub mod cache;
pub mod load;
pub mod schemes;

use clirack_core::{LoaderConfig, LoaderRegistry};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum Command {
    Load {
        locator: String,
        require_dir: Option<String>,
        force: bool,
    },
    Schemes,
    CacheList,
}

/// Options shared by every command.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub target_dir: Option<PathBuf>,
    /// Seconds; `0` disables the deadline
    pub timeout: Option<u64>,
    pub json: bool,
}

impl GlobalOptions {
    /// Loader settings: flags over `CLIRACK_*` environment over defaults.
    pub fn loader_config(&self, force: bool) -> clirack_core::Result<LoaderConfig> {
        let mut config = LoaderConfig::from_env()?.with_force_reload(force);
        if let Some(dir) = &self.target_dir {
            config = config.with_target_dir(dir);
        }
        if let Some(secs) = self.timeout {
            config = config.with_timeout((secs > 0).then(|| Duration::from_secs(secs)));
        }
        Ok(config)
    }
}

/// Registry with every loader this binary ships.
pub fn build_registry(config: LoaderConfig) -> clirack_core::Result<LoaderRegistry> {
    let mut registry = LoaderRegistry::with_builtin_loaders(config);
    clirack_loader_github::register(&mut registry)?;
    clirack_loader_url::register(&mut registry)?;
    Ok(registry)
}

pub async fn execute(
    command: Command,
    options: &GlobalOptions,
    out: &mut impl Write,
) -> miette::Result<()> {
    match command {
        Command::Load {
            locator,
            require_dir,
            force,
        } => {
            let registry = build_registry(options.loader_config(force)?)?;
            load::execute(&registry, &locator, require_dir.as_deref(), options.json, out).await
        }
        Command::Schemes => {
            let registry = build_registry(options.loader_config(false)?)?;
            schemes::execute(&registry, options.json, out)
        }
        Command::CacheList => {
            let registry = build_registry(options.loader_config(false)?)?;
            cache::list(&registry, options.json, out).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_defaults() {
        let options = GlobalOptions {
            target_dir: Some(PathBuf::from("/srv/external")),
            timeout: Some(0),
            json: false,
        };
        let config = options.loader_config(true).unwrap();

        assert_eq!(config.target_dir, PathBuf::from("/srv/external"));
        assert!(config.timeout.is_none());
        assert!(config.force_reload);
    }

    #[test]
    fn test_registry_has_all_schemes() {
        let registry = build_registry(LoaderConfig::default()).unwrap();
        assert_eq!(registry.schemes(), vec!["github", "http", "https", "local"]);
    }
}
