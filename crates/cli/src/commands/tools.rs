//! `postclaw tools`: List the tools offered to the model.

use postclaw_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let registry = postclaw_tools::default_registry(&config.social);

    println!("Available tools ({}):", registry.len());
    println!();
    for schema in registry.schemas() {
        let marker = if schema.name == config.social.posting_tool {
            " [posting, rate-limited]"
        } else {
            ""
        };
        println!("  {}{marker}", schema.name);
        println!("    {}", schema.description);
        println!("    required: {}", schema.required().join(", "));
        println!("    schema:   {}", serde_json::to_string(&schema.parameters)?);
        println!();
    }

    Ok(())
}
