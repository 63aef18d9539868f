use std::{collections::BTreeMap, process};

use rollout_store::{
    config::{self, Command, LoadError},
    infra::{error::InfraError, telemetry},
    keys,
    manager::StoreManager,
    store::StoreError,
};
use thiserror::Error;
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] LoadError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("failed to encode output: {0}")]
    Output(#[from] serde_json::Error),
}

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    // Configuration failures happen before telemetry is installed.
    let subscriber = tracing_fmt()
        .with_max_level(Level::ERROR)
        .with_writer(std::io::stderr)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;
    telemetry::init(&settings.logging)?;

    let manager = StoreManager::connect(settings.redis.as_ref()).await?;

    match cli_args.command {
        Command::Health => {
            manager.check_health().await?;
            println!("ok");
        }
        Command::Metrics(args) => {
            let counters: BTreeMap<String, i64> = manager
                .ledger()
                .read_metrics(&args.deployment_key)
                .await?
                .into_iter()
                .collect();
            println!("{}", serde_json::to_string_pretty(&counters)?);
        }
        Command::ClearMetrics(args) => {
            manager.ledger().clear_metrics(&args.deployment_key).await?;
            info!(deployment_key = %args.deployment_key, "rollout counters cleared");
        }
        Command::Invalidate(args) => {
            manager
                .cache()
                .invalidate(&keys::scope_key(&args.deployment_key))
                .await?;
            info!(deployment_key = %args.deployment_key, "cached responses dropped");
        }
        Command::Ttl(args) => {
            let remaining = manager
                .cache()
                .remaining_ttl(&keys::scope_key(&args.deployment_key))
                .await?;
            match remaining {
                Some(ttl) => println!("{}", ttl.as_secs()),
                None => println!("none"),
            }
        }
    }

    Ok(())
}
