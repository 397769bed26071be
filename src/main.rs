//! LibTools - LibApps availability and hours proxy

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use libtools::{
    cli::{Cli, Command},
    config::Config,
    gateway::Gateway,
    setup_tracing,
    upstream::UpstreamClient,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    let mut config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Failed to load configuration");
            return ExitCode::FAILURE;
        }
    };
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    match cli.command {
        Some(Command::Check) => run_check(&config),
        Some(Command::Token) => run_token(&config).await,
        Some(Command::Serve) | None => run_server(config).await,
    }
}

/// Print the validated configuration summary
fn run_check(config: &Config) -> ExitCode {
    println!("Configuration OK");
    println!("  Upstream: {}", config.libapps.base_url);
    println!(
        "  Listen:   {}:{}{}",
        config.server.host, config.server.port, config.server.mount_path
    );
    println!("  Sites:");
    for site in config.sites.iter() {
        println!(
            "    {:<12} hours lid {:<6} search {}",
            site.slug,
            site.hours_location_id,
            site.search_name.as_deref().unwrap_or("-")
        );
    }
    ExitCode::SUCCESS
}

/// Perform one token exchange without printing the token
async fn run_token(config: &Config) -> ExitCode {
    let client = match UpstreamClient::from_config(&config.libapps) {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, "Failed to build upstream client");
            return ExitCode::FAILURE;
        }
    };

    match client.tokens().refresh().await {
        Ok(token) => {
            println!(
                "Token obtained; reused for {}s",
                token.time_until_expiry().as_secs()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Token exchange failed: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run_server(config: Config) -> ExitCode {
    let gateway = match Gateway::new(config) {
        Ok(gateway) => gateway,
        Err(e) => {
            error!(error = %e, "Failed to create server");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = gateway.run().await {
        error!(error = %e, "Server error");
        return ExitCode::FAILURE;
    }

    info!("Goodbye");
    ExitCode::SUCCESS
}
