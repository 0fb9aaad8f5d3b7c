use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::ensure;
use clap::Parser;
use dotenvy::dotenv;
use log::{error, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use reqwest::ClientBuilder;
use serde_json::json;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(
    name = "loadgen",
    about = "Simulates a device fleet posting stream envelopes to the relay"
)]
struct Args {
    /// Base URL of a running gateway
    #[arg(long, env = "RELAY_URL", default_value = "http://localhost:8080")]
    url: String,

    /// Number of simulated devices, each posting independently
    #[arg(short, long, default_value_t = 4)]
    devices: usize,

    /// Messages per second per device
    #[arg(short, long, default_value_t = 5.0)]
    rate: f64,

    /// Messages per device; runs until Ctrl-C if omitted
    #[arg(short, long)]
    count: Option<u64>,

    /// Base seed for deterministic device ids and readings
    #[arg(short, long, default_value_t = 7)]
    seed: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();
    ensure!(args.devices > 0, "devices must be > 0");
    ensure!(args.rate > 0.0, "rate must be > 0");

    info!(
        "starting loadgen: url={}, devices={}, rate={} msg/s per device, count={:?}, seed={}",
        args.url, args.devices, args.rate, args.count, args.seed
    );

    let client = ClientBuilder::new()
        .timeout(Duration::from_secs(10))
        .build()?;
    let endpoint = format!("{}/api/v1/streamdata", args.url.trim_end_matches('/'));
    let pause = Duration::from_secs_f64(1.0 / args.rate);

    let mut workers = Vec::with_capacity(args.devices);
    for i in 0..args.devices {
        let client = client.clone();
        let endpoint = endpoint.clone();
        let count = args.count;
        let seed = args.seed + i as u64;

        workers.push(tokio::spawn(async move {
            let mut rng = StdRng::seed_from_u64(seed);
            let device_id = deterministic_device_id(&mut rng);
            info!("device {device_id} started");

            let mut sent: u64 = 0;
            loop {
                if let Some(limit) = count {
                    if sent >= limit {
                        break;
                    }
                }

                let envelope = json!({
                    "Id": device_id.to_string(),
                    "reading": rng.gen_range(-40.0..85.0),
                    "recorded_at": unix_millis(),
                });
                match client.post(&endpoint).json(&envelope).send().await {
                    Ok(resp) if !resp.status().is_success() => {
                        error!("device {device_id}: relay answered {}", resp.status())
                    }
                    Err(e) => error!("device {device_id}: send failed: {e}"),
                    Ok(_) => {}
                }

                sent += 1;
                tokio::time::sleep(pause).await;
            }
            info!("device {device_id} finished, sent={sent}");
        }));
    }

    if args.count.is_none() {
        tokio::signal::ctrl_c().await?;
        info!("ctrl-c received, stopping");
        return Ok(());
    }

    for worker in workers {
        let _ = worker.await;
    }
    info!("loadgen finished");
    Ok(())
}

// Deterministic per-seed device id shaped like a v4 UUID.
fn deterministic_device_id(rng: &mut StdRng) -> Uuid {
    uuid::Builder::from_random_bytes(rng.gen()).into_uuid()
}

fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}
