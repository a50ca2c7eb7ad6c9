//! Load Client
//!
//! Generates random pending-transaction records and posts them to a running
//! confirmation-time service.

use anyhow::Context;
use clap::Parser;
use futures::stream::{self, StreamExt};
use rand::Rng;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "load-client", about = "Send generated transactions to /predict")]
struct Args {
    /// Service base URL
    #[arg(long, default_value = "http://localhost:8000")]
    url: String,

    /// Number of requests to send
    #[arg(long, default_value_t = 100)]
    count: u64,

    /// Share of requests carrying a tx_type outside 0..=4
    #[arg(long, default_value_t = 0.05)]
    out_of_range_rate: f64,

    /// Requests in flight at once
    #[arg(long, default_value_t = 8)]
    concurrency: usize,

    /// Delay between requests, in milliseconds
    #[arg(long, default_value_t = 0)]
    delay_ms: u64,

    /// Print sample bodies instead of sending them
    #[arg(long)]
    dry_run: bool,
}

/// Request body matching the service's `/predict` schema
#[derive(Debug, Clone, Serialize)]
struct TransactionBody {
    gas_price: f64,
    gas_fee_cap: f64,
    gas_tip_cap: f64,
    gas: i64,
    value: f64,
    tx_type: i64,
    nonce: i64,
    data_size: i64,
}

/// Pending transaction generator
struct TransactionGenerator {
    rng: rand::rngs::ThreadRng,
    out_of_range_rate: f64,
}

impl TransactionGenerator {
    fn new(out_of_range_rate: f64) -> Self {
        Self {
            rng: rand::thread_rng(),
            out_of_range_rate: out_of_range_rate.clamp(0.0, 1.0),
        }
    }

    /// Generate a plausible pending transaction (fees in gwei)
    fn generate(&mut self) -> TransactionBody {
        let tx_type = if self.rng.gen_bool(self.out_of_range_rate) {
            *self.random_choice(&[-1, 5, 126])
        } else {
            *self.random_choice(&[0, 2, 2, 2, 3, 4])
        };

        let gas_price = self.rng.gen_range(5.0..200.0);
        let gas_tip_cap = self.rng.gen_range(0.01..5.0_f64).min(gas_price);
        let gas_fee_cap = gas_price + self.rng.gen_range(0.0..50.0);

        // Plain transfers carry no calldata
        let is_transfer = self.rng.gen_bool(0.4);
        let (gas, data_size) = if is_transfer {
            (21_000, 0)
        } else {
            (
                self.rng.gen_range(40_000..1_500_000),
                self.rng.gen_range(4..20_000),
            )
        };

        TransactionBody {
            gas_price,
            gas_fee_cap,
            gas_tip_cap,
            gas,
            value: if is_transfer {
                self.rng.gen_range(0.001..10.0)
            } else {
                0.0
            },
            tx_type,
            nonce: self.rng.gen_range(0..5_000),
            data_size,
        }
    }

    fn random_choice<'a, T>(&mut self, choices: &'a [T]) -> &'a T {
        &choices[self.rng.gen_range(0..choices.len())]
    }
}

/// Successful `/predict` response
#[derive(Debug, Deserialize)]
struct PredictionBody {
    predicted_confirmation_time_ms: f64,
}

enum Reply {
    Prediction(PredictionBody),
    Error(String),
}

impl Reply {
    /// Error bodies may be empty or plain text (e.g. a 408 from the timeout
    /// layer), so only successful responses are parsed.
    fn from_response(status: StatusCode, body: &str) -> Self {
        if !status.is_success() {
            return Reply::Error(body.to_string());
        }
        match serde_json::from_str::<PredictionBody>(body) {
            Ok(prediction) => Reply::Prediction(prediction),
            Err(e) => Reply::Error(format!("unexpected body ({}): {}", e, body)),
        }
    }
}

#[derive(Debug, Default)]
struct Outcome {
    ok: u64,
    client_errors: u64,
    server_errors: u64,
    transport_errors: u64,
    predictions: Vec<f64>,
}

impl Outcome {
    fn record(&mut self, status: StatusCode, reply: Reply) {
        match reply {
            Reply::Prediction(prediction) => {
                self.ok += 1;
                self.predictions.push(prediction.predicted_confirmation_time_ms);
            }
            Reply::Error(body) if status.is_client_error() => {
                self.client_errors += 1;
                warn!(status = %status, body = %body, "Request rejected");
            }
            Reply::Error(body) => {
                self.server_errors += 1;
                warn!(status = %status, body = %body, "Server error");
            }
        }
    }

    fn mean_prediction_ms(&self) -> f64 {
        if self.predictions.is_empty() {
            0.0
        } else {
            self.predictions.iter().sum::<f64>() / self.predictions.len() as f64
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("load_client=info".parse()?),
        )
        .init();

    let args = Args::parse();
    info!(
        url = %args.url,
        count = args.count,
        out_of_range_rate = args.out_of_range_rate,
        concurrency = args.concurrency,
        "Starting load client"
    );

    let mut generator = TransactionGenerator::new(args.out_of_range_rate);
    let bodies: Vec<TransactionBody> = (0..args.count).map(|_| generator.generate()).collect();

    if args.dry_run {
        return run_dry_mode(&bodies);
    }

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .context("Failed to build HTTP client")?;
    let endpoint = format!("{}/predict", args.url.trim_end_matches('/'));

    let started = Instant::now();
    let delay = Duration::from_millis(args.delay_ms);
    let mut outcome = Outcome::default();

    let mut responses = stream::iter(bodies)
        .map(|body| {
            let client = client.clone();
            let endpoint = endpoint.clone();
            async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                let response = client.post(&endpoint).json(&body).send().await?;
                let status = response.status();
                let body = response.text().await?;
                Ok::<_, reqwest::Error>((status, Reply::from_response(status, &body)))
            }
        })
        .buffer_unordered(args.concurrency.max(1));

    let mut sent = 0u64;
    while let Some(result) = responses.next().await {
        sent += 1;
        match result {
            Ok((status, reply)) => outcome.record(status, reply),
            Err(e) => {
                outcome.transport_errors += 1;
                warn!(error = %e, "Request failed");
            }
        }

        if sent % 50 == 0 {
            info!("Sent {}/{} requests ({} ok)", sent, args.count, outcome.ok);
        }
    }

    let elapsed = started.elapsed().as_secs_f64();

    info!(
        ok = outcome.ok,
        client_errors = outcome.client_errors,
        server_errors = outcome.server_errors,
        transport_errors = outcome.transport_errors,
        throughput = format!("{:.1} req/s", sent as f64 / elapsed.max(f64::EPSILON)),
        mean_predicted_ms = format!("{:.0}", outcome.mean_prediction_ms()),
        "Completed"
    );

    Ok(())
}

fn run_dry_mode(bodies: &[TransactionBody]) -> anyhow::Result<()> {
    info!("Running in dry-run mode (nothing sent)");

    for (i, body) in bodies.iter().enumerate() {
        if i == 0 || (i + 1) % 10 == 0 {
            let json = serde_json::to_string_pretty(body)?;
            info!("Sample transaction {}:\n{}", i + 1, json);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_timeout_response_is_a_client_error() {
        let mut outcome = Outcome::default();
        let status = StatusCode::REQUEST_TIMEOUT;
        outcome.record(status, Reply::from_response(status, ""));

        assert_eq!(outcome.client_errors, 1);
        assert_eq!(outcome.transport_errors, 0);
    }

    #[test]
    fn test_replies_are_classified_by_status() {
        let mut outcome = Outcome::default();

        let ok = StatusCode::OK;
        outcome.record(
            ok,
            Reply::from_response(ok, r#"{"predicted_confirmation_time_ms": 1500.0}"#),
        );
        let unprocessable = StatusCode::UNPROCESSABLE_ENTITY;
        outcome.record(
            unprocessable,
            Reply::from_response(unprocessable, r#"{"detail":[]}"#),
        );
        let internal = StatusCode::INTERNAL_SERVER_ERROR;
        outcome.record(internal, Reply::from_response(internal, "oops"));
        // 200 with a body that is not a prediction
        outcome.record(ok, Reply::from_response(ok, "<html></html>"));

        assert_eq!(outcome.ok, 1);
        assert_eq!(outcome.client_errors, 1);
        assert_eq!(outcome.server_errors, 2);
        assert_eq!(outcome.mean_prediction_ms(), 1500.0);
    }

    #[test]
    fn test_generator_respects_out_of_range_share() {
        let mut generator = TransactionGenerator::new(1.0);
        for _ in 0..20 {
            assert!(!(0..=4).contains(&generator.generate().tx_type));
        }

        let mut generator = TransactionGenerator::new(0.0);
        for _ in 0..20 {
            assert!((0..=4).contains(&generator.generate().tx_type));
        }
    }
}
