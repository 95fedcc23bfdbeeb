//! Test Transaction Producer
//!
//! Generates normal traffic mixed with smurfing, flash-laundering and
//! mule-network bursts and publishes the submissions to NATS.

use chrono::{Duration as ChronoDuration, Utc};
use fraud_risk_engine::NewTransaction;
use rand::Rng;
use rust_decimal::Decimal;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scenario {
    Normal,
    Smurfing,
    FlashLaundering,
    MuleNetwork,
}

impl Scenario {
    fn name(&self) -> &'static str {
        match self {
            Scenario::Normal => "normal",
            Scenario::Smurfing => "smurfing",
            Scenario::FlashLaundering => "flash-laundering",
            Scenario::MuleNetwork => "mule-network",
        }
    }
}

/// Submission generator for exercising the engine
struct ScenarioGenerator {
    rng: rand::rngs::ThreadRng,
    account_counter: u64,
}

impl ScenarioGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
            account_counter: 0,
        }
    }

    fn next_account(&mut self, prefix: &str) -> String {
        self.account_counter += 1;
        format!("{}_{:06}", prefix, self.account_counter)
    }

    /// Random amount in whole cents within `[low, high)` currency units
    fn amount(&mut self, low: i64, high: i64) -> Decimal {
        Decimal::new(self.rng.gen_range(low * 100..high * 100), 2)
    }

    fn geo_ip(&mut self) -> String {
        format!(
            "{}.{}.{}.{}",
            self.rng.gen_range(1..255),
            self.rng.gen_range(0..255),
            self.rng.gen_range(0..255),
            self.rng.gen_range(1..255)
        )
    }

    fn pick(&mut self, fraud_rate: f64) -> Scenario {
        if !self.rng.gen_bool(fraud_rate) {
            return Scenario::Normal;
        }
        match self.rng.gen_range(0..3) {
            0 => Scenario::Smurfing,
            1 => Scenario::FlashLaundering,
            _ => Scenario::MuleNetwork,
        }
    }

    fn generate(&mut self, scenario: Scenario) -> Vec<NewTransaction> {
        match scenario {
            Scenario::Normal => vec![self.generate_normal()],
            Scenario::Smurfing => self.generate_smurfing(),
            Scenario::FlashLaundering => self.generate_flash_laundering(),
            Scenario::MuleNetwork => self.generate_mule_network(),
        }
    }

    fn generate_normal(&mut self) -> NewTransaction {
        let sender = self.next_account("acct");
        let receiver = self.next_account("merchant");
        let amount = self.amount(10, 500);
        let geo_ip = self.geo_ip();
        NewTransaction::new(sender, receiver, amount)
            .with_device(format!("fp_{:016x}", self.rng.gen::<u64>()))
            .with_geo_ip(geo_ip)
    }

    /// One sender splitting a sum into many payments under the reporting limit
    fn generate_smurfing(&mut self) -> Vec<NewTransaction> {
        let sender = self.next_account("smurf");
        let start = Utc::now();
        let count = self.rng.gen_range(11..16);
        (0..count)
            .map(|i| {
                let receiver = self.next_account("drop");
                let amount = Decimal::from(self.rng.gen_range(5i64..10) * 1000 - 1);
                NewTransaction::new(sender.clone(), receiver, amount)
                    .at(start + ChronoDuration::minutes(i * 4))
            })
            .collect()
    }

    /// A large transfer followed by fast onward transfers from the receiver
    fn generate_flash_laundering(&mut self) -> Vec<NewTransaction> {
        let source = self.next_account("src");
        let hop = self.next_account("hop");
        let start = Utc::now();
        let large = Decimal::from(self.rng.gen_range(3i64..7) * 10_000);

        let mut batch = vec![NewTransaction::new(source, hop.clone(), large).at(start)];
        for i in 0..self.rng.gen_range(4..7) {
            let receiver = self.next_account("exit");
            let amount = self.amount(2_000, 9_000);
            batch.push(
                NewTransaction::new(hop.clone(), receiver, amount)
                    .at(start + ChronoDuration::minutes(2 + i * 3)),
            );
        }
        batch
    }

    /// Several sender accounts driven from one device into a collector
    fn generate_mule_network(&mut self) -> Vec<NewTransaction> {
        let device = format!("fp_{:016x}", self.rng.gen::<u64>());
        let collector = self.next_account("collector");
        let geo_ip = self.geo_ip();
        (0..self.rng.gen_range(7..10))
            .map(|_| {
                let mule = self.next_account("mule");
                let amount = self.amount(300, 3_000);
                NewTransaction::new(mule, collector.clone(), amount)
                    .with_device(device.clone())
                    .with_geo_ip(geo_ip.clone())
            })
            .collect()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("test_producer=info".parse()?),
        )
        .init();

    info!("Starting Test Transaction Producer");

    let args: Vec<String> = std::env::args().collect();
    let nats_url = args.get(1).map(|s| s.as_str()).unwrap_or("nats://localhost:4222");
    let subject = args.get(2).map(|s| s.as_str()).unwrap_or("transactions");
    let rounds: u64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(100);
    let fraud_rate = parse_fraud_rate(args.get(4).map(|s| s.as_str()));
    let delay_ms: u64 = args.get(5).and_then(|s| s.parse().ok()).unwrap_or(100);

    info!(
        nats_url = %nats_url,
        subject = %subject,
        rounds = rounds,
        fraud_rate = fraud_rate,
        delay_ms = delay_ms,
        "Configuration loaded"
    );

    let client = match async_nats::connect(nats_url).await {
        Ok(c) => {
            info!("Connected to NATS");
            c
        }
        Err(e) => {
            warn!(error = %e, "Failed to connect to NATS. Running in dry-run mode.");
            return run_dry_mode(rounds, fraud_rate, delay_ms).await;
        }
    };

    let mut generator = ScenarioGenerator::new();
    let mut published = 0u64;
    let mut bursts = 0u64;

    for round in 0..rounds {
        let scenario = generator.pick(fraud_rate);
        let batch = generator.generate(scenario);
        if scenario != Scenario::Normal {
            bursts += 1;
            info!(scenario = scenario.name(), size = batch.len(), "Publishing fraud burst");
        }

        for submission in &batch {
            let payload = serde_json::to_vec(submission)?;
            client.publish(subject.to_string(), payload.into()).await?;
            published += 1;
        }

        if (round + 1) % 10 == 0 {
            info!(
                "Published {}/{} rounds ({} submissions, {} fraud bursts)",
                round + 1,
                rounds,
                published,
                bursts
            );
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    client.flush().await?;
    info!(
        "Completed! Published {} submissions over {} rounds ({} fraud bursts)",
        published, rounds, bursts
    );

    Ok(())
}

/// Share of rounds that publish a fraud burst, defaulting to 10%
fn parse_fraud_rate(arg: Option<&str>) -> f64 {
    arg.and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.1)
        .clamp(0.0, 1.0)
}

async fn run_dry_mode(rounds: u64, fraud_rate: f64, delay_ms: u64) -> anyhow::Result<()> {
    info!("Running in dry-run mode (no NATS connection)");

    let mut generator = ScenarioGenerator::new();

    for round in 0..rounds {
        let scenario = generator.pick(fraud_rate);
        let batch = generator.generate(scenario);

        if scenario != Scenario::Normal || round == 0 {
            let json = serde_json::to_string_pretty(&batch)?;
            info!("Sample {} batch {}:\n{}", scenario.name(), round + 1, json);
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    Ok(())
}
