use anyhow::Context;
use cmdforge_cli::config::DriversConfig;
use cmdforge_cli::exit_codes::EXIT_ERROR;
use cmdforge_cli::logging::configure_logging;
use std::process;

fn load_configuration() -> anyhow::Result<DriversConfig> {
    DriversConfig::load().with_context(|| {
        format!(
            "failed to load {} or {}* environment variables",
            cmdforge_cli::config::CONFIG_FILE,
            cmdforge_cli::config::ENV_PREFIX
        )
    })
}

fn main() {
    let config = match load_configuration() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e:#}");
            process::exit(EXIT_ERROR);
        }
    };

    configure_logging(&config.log_level);
    tracing::debug!(trim = %config.trim, "starting drivers");

    process::exit(cmdforge_cli::run(&config, std::env::args_os()));
}
