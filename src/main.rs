// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use std::sync::Arc;

use acacert::{
    acme::AcmeClient,
    arm::{build_http_client, ArmClient},
    config::{Cli, RunConfig, RunMode},
    credentials::ClientSecretCredential,
    dns::{AzureDnsClient, DnsPropagationChecker, PublicResolver},
    platform::ContainerAppsStore,
    renewal::RenewalOrchestrator,
    runner::{run_bootstrap, run_scan},
    scanner::ExpiryScanner,
};
use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use tracing::{debug, error, info};

fn main() -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("acacert-worker")
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

fn init_tracing() {
    // RUST_LOG selects the level (default INFO), RUST_LOG_FORMAT=json the format
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }
}

async fn async_main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = match RunConfig::from_cli(cli) {
        Ok(config) => config,
        Err(e) => {
            error!(reason = "ConfigurationError", error = %e, "Invalid configuration");
            std::process::exit(2);
        }
    };

    info!(
        environment = %config.acme_environment,
        resource_group = %config.resource_group,
        managed_environment = %config.environment_name,
        mode = ?config.mode,
        "Starting acacert"
    );

    let http = build_http_client()?;
    let credential = Arc::new(ClientSecretCredential::new(
        http.clone(),
        &config.authority_host,
        &config.identity,
    ));
    let arm = Arc::new(ArmClient::new(http, &config.arm_endpoint, credential));
    debug!(endpoint = %config.arm_endpoint, "Resource Manager client initialized");

    let subscription_id = config.identity.subscription_id.as_str();
    let store = Arc::new(ContainerAppsStore::new(arm.clone(), subscription_id));
    let dns = Arc::new(AzureDnsClient::new(arm, subscription_id));
    let propagation = DnsPropagationChecker::new(Arc::new(PublicResolver::new(config.resolver)));
    let environment_id = config.managed_environment_id();

    let orchestrator = RenewalOrchestrator::new(
        Arc::new(AcmeClient::new()),
        dns,
        propagation,
        store.clone(),
        &environment_id,
    );

    match &config.mode {
        RunMode::Scan { threshold_days } => {
            let scanner = ExpiryScanner::new(store, &environment_id);
            run_scan(&config, &scanner, &orchestrator, *threshold_days, Utc::now()).await?;
        }
        RunMode::Bootstrap { domain } => {
            run_bootstrap(&config, &orchestrator, domain).await;
        }
    }

    info!("acacert finished");
    Ok(())
}
