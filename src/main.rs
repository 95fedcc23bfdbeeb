//! Fraud Risk Engine - Main Entry Point
//!
//! Ingests transaction submissions and flag commands from NATS, runs batch
//! analysis over the full history and publishes raised alerts.

use anyhow::{Context, Result};
use fraud_risk_engine::{
    config::{AppConfig, LoggingConfig},
    consumer::{decode, SubjectConsumer},
    metrics::MetricsReporter,
    AlertProducer, FlagCommand, FraudEngine, MemoryRepository, NewTransaction,
};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const CONFIG_PATH_ENV: &str = "FRAUD_ENGINE_CONFIG";

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(format!("fraud_risk_engine={}", logging.level))
            .context("Invalid logging.level")?,
    };

    if logging.format == "json" {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}

/// Run one analysis off the async runtime and publish what it raised.
async fn run_analysis(engine: &Arc<FraudEngine>, producer: &AlertProducer) {
    let worker = engine.clone();
    match tokio::task::spawn_blocking(move || worker.analyze_all()).await {
        Ok(Ok(outcome)) => {
            let published = producer.publish_batch(&outcome.alerts).await;
            info!(
                total = outcome.report.total_analyzed,
                suspicious = outcome.report.suspicious_count,
                high_risk = outcome.report.high_risk_count,
                skipped = outcome.report.skipped,
                alerts_published = published,
                "Analysis cycle complete"
            );
        }
        Ok(Err(e)) => error!(kind = ?e.kind(), error = %e, "Batch analysis failed"),
        Err(e) => error!(error = %e, "Analysis task aborted"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config_path =
        std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| "config/config.toml".to_string());
    let config = AppConfig::load_from_path(&config_path)?;
    init_tracing(&config.logging)?;

    info!("Starting Fraud Risk Engine");
    info!(
        path = %config_path,
        scan_strategy = ?config.detection.scan_strategy,
        high_risk_above = config.detection.high_risk_above,
        critical_above = config.alerts.critical_above,
        "Configuration loaded"
    );

    let engine = Arc::new(FraudEngine::new(Arc::new(MemoryRepository::new()), &config));

    let client = async_nats::connect(&config.nats.url)
        .await
        .with_context(|| format!("Failed to connect to NATS at {}", config.nats.url))?;
    info!("Connected to NATS at {}", config.nats.url);

    let mut submissions = SubjectConsumer::new(client.clone(), &config.nats.transaction_subject)
        .subscribe()
        .await?;
    let mut flag_commands = SubjectConsumer::new(client.clone(), &config.nats.flag_subject)
        .subscribe()
        .await?;
    let producer = AlertProducer::new(client.clone(), &config.nats.alert_subject);
    info!("Publishing alerts to: {}", producer.subject());

    let reporter = MetricsReporter::new(engine.metrics(), config.pipeline.metrics_interval_secs);
    tokio::spawn(reporter.start());

    let mut analysis_tick =
        tokio::time::interval(Duration::from_secs(config.pipeline.analyze_interval_secs.max(1)));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut unanalyzed = 0usize;

    loop {
        tokio::select! {
            Some(message) = submissions.next() => {
                let accepted = decode::<NewTransaction>(&message.subject, &message.payload)
                    .and_then(|submission| engine.submit(submission).map_err(Into::into));
                match accepted {
                    Ok(_) => unanalyzed += 1,
                    Err(e) => warn!(error = %format!("{:#}", e), "Submission rejected"),
                }
                if unanalyzed >= config.pipeline.analyze_every {
                    run_analysis(&engine, &producer).await;
                    unanalyzed = 0;
                }
            }
            Some(message) = flag_commands.next() => {
                let flagged = decode::<FlagCommand>(&message.subject, &message.payload)
                    .and_then(|command| {
                        engine.flag_account_with_alert(command).map_err(Into::into)
                    });
                match flagged {
                    Ok((_, alert)) => {
                        if let Err(e) = producer.publish(&alert).await {
                            error!(alert_id = alert.id, error = %e, "Failed to publish alert");
                        }
                    }
                    Err(e) => warn!(error = %format!("{:#}", e), "Flag command rejected"),
                }
            }
            _ = analysis_tick.tick() => {
                if unanalyzed > 0 {
                    run_analysis(&engine, &producer).await;
                    unanalyzed = 0;
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    if unanalyzed > 0 {
        run_analysis(&engine, &producer).await;
    }
    if let Err(e) = client.flush().await {
        warn!(error = %e, "Failed to flush NATS client");
    }

    info!("Fraud Risk Engine shutting down...");
    engine.metrics().print_summary();

    Ok(())
}
