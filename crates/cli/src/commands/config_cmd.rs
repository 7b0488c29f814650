//! `roadclaim config`: configuration management commands.

use roadclaim_config::AppConfig;

pub fn show() {
    println!("{}", AppConfig::default_toml());
}

pub fn path() {
    println!("{}", AppConfig::config_dir().join("config.toml").display());
}

pub fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("Validating configuration...");

    let config = AppConfig::load().map_err(|e| {
        println!("   Config error: {e}");
        e
    })?;
    println!("   Config parsed and validated");

    if !config.has_api_key() {
        println!("   Warning: no API key set (ROADCLAIM_API_KEY or OPENAI_API_KEY)");
    }

    println!();
    println!("   Provider:  {} ({})", config.provider.name, config.provider.model);
    println!("   Gateway:   {}:{}", config.gateway.host, config.gateway.port);
    println!(
        "   Agent:     {} steps/stage, {}s per call, {} retries",
        config.agent.max_steps, config.agent.call_timeout_secs, config.agent.max_retries
    );
    println!(
        "   Intake:    min {} entries, duplicates {:?}",
        config.intake.min_transcript_entries, config.intake.on_duplicate
    );
    Ok(())
}
