//! `libradmin config` handlers.
//!
//! These run before the config is loaded, so a broken `config.toml` can
//! still be located and regenerated.

use std::env;
use std::path::Path;

use anyhow::{Context, Result};
use libradmin_core::config::{API_URL_ENV, Config, paths};

/// Prints every file libradmin keeps under `LIBRADMIN_HOME` and the API
/// base URL a command would use right now.
pub fn path() {
    let config_path = paths::config_path();
    println!("config         {}", config_path.display());
    println!("cookies        {}", paths::cookies_path().display());
    println!("local storage  {}", paths::local_storage_path().display());
    println!("logs           {}", paths::logs_dir().display());
    println!("api            {}", api_line(&config_path));
}

fn api_line(config_path: &Path) -> String {
    let resolved = Config::load_from(config_path).and_then(|cfg| cfg.resolve_api_url());
    match resolved {
        Ok(url) if env::var_os(API_URL_ENV).is_some() => format!("{url} (from {API_URL_ENV})"),
        Ok(url) => url,
        Err(err) => format!("unavailable: {err:#}"),
    }
}

pub fn init() -> Result<()> {
    let config_path = paths::config_path();
    Config::init(&config_path)
        .with_context(|| format!("init config at {}", config_path.display()))?;
    println!("Wrote default config to {}", config_path.display());
    if env::var_os(API_URL_ENV).is_some() {
        println!("Note: {API_URL_ENV} is set and overrides api_url");
    }
    Ok(())
}

pub fn generate() -> Result<()> {
    print!("{}", Config::generate()?);
    Ok(())
}
