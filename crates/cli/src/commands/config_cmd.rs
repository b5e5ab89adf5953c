//! `postclaw config`: Show the effective configuration.

use postclaw_config::AppConfig;

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    let mut warnings = Vec::new();
    if !config.has_api_key() {
        warnings.push("No generation API key set (GEMINI_API_KEY or POSTCLAW_API_KEY)");
    }
    if config.social.bearer_token.is_none() {
        warnings.push("No posting token set (TWITTER_BEARER_TOKEN or POSTCLAW_SOCIAL_TOKEN)");
    }

    let toml_str = toml::to_string_pretty(&config.redacted())?;
    println!("# {}", AppConfig::config_dir().join("config.toml").display());
    println!("{toml_str}");

    for w in &warnings {
        eprintln!("warning: {w}");
    }
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_dir().join("config.toml");
    println!("{}", config_path.display());
    Ok(())
}
