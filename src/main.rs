//! PubSub Source Operator
//!
//! Runs the source controllers against the cluster in the current kubeconfig.
//!
//! ## Usage
//!
//! ```bash
//! # Watch every namespace
//! pubsub-source-operator
//!
//! # Watch one namespace with a different default credential
//! pubsub-source-operator --namespace events --default-secret-name gcp-creds
//!
//! # Run with custom log level
//! RUST_LOG=debug pubsub-source-operator
//! ```

use clap::Parser;
use kube::Client;
use pubsub_source_operator::crd::defaults::{DEFAULT_SECRET_KEY, DEFAULT_SECRET_NAME};
use pubsub_source_operator::{ControllerConfig, SourceDefaults, StorageController};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// PubSub Source Operator
#[derive(Parser, Debug)]
#[command(name = "pubsub-source-operator")]
#[command(version, about = "Kubernetes operator for Pub/Sub backed event sources")]
struct Args {
    /// Namespace to watch (empty for all namespaces)
    #[arg(long, env = "WATCH_NAMESPACE", default_value = "")]
    namespace: String,

    /// Secret holding the Google service account key, used when a source names none
    #[arg(long, env = "DEFAULT_SECRET_NAME", default_value = DEFAULT_SECRET_NAME)]
    default_secret_name: String,

    /// Key within the default secret
    #[arg(long, env = "DEFAULT_SECRET_KEY", default_value = DEFAULT_SECRET_KEY)]
    default_secret_key: String,

    /// Seconds between resyncs of a healthy source
    #[arg(long, env = "REQUEUE_SECONDS", default_value_t = 300)]
    requeue_seconds: u64,

    /// Seconds before retrying a source whose dependents failed
    #[arg(long, env = "ERROR_REQUEUE_SECONDS", default_value_t = 30)]
    error_requeue_seconds: u64,
}

impl Args {
    fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            namespace: (!self.namespace.is_empty()).then(|| self.namespace.clone()),
            defaults: SourceDefaults::new(&self.default_secret_name, &self.default_secret_key),
            requeue_interval: Duration::from_secs(self.requeue_seconds),
            error_requeue_interval: Duration::from_secs(self.error_requeue_seconds),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let args = Args::parse();
    let config = args.controller_config();

    info!("Starting PubSub Source Operator");
    info!(
        "Watching namespace: {}",
        config.namespace.as_deref().unwrap_or("all")
    );
    info!(
        "Default secret: {}/{}",
        config.defaults.secret.name, config.defaults.secret.key
    );

    let client = Client::try_default().await?;
    info!("Connected to Kubernetes API server");

    let storage_controller = Arc::new(StorageController::new(client, config));

    let storage_handle = {
        let controller = Arc::clone(&storage_controller);
        tokio::spawn(async move {
            if let Err(e) = controller.run().await {
                error!("Storage controller error: {}", e);
            }
        })
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        result = storage_handle => {
            if let Err(e) = result {
                error!("Storage controller task failed: {}", e);
            }
        }
    }

    info!("PubSub Source Operator shutting down");
    Ok(())
}
