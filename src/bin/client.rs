use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use meterlink::client::{ClientSession, ConsolePrompt, Outcome};
use meterlink::protocol::error_code::ErrorCode;
use meterlink::transport::UdpTransport;

/// UDP measurement client: queries the measurement ids listed in the data file, strictly
/// one at a time, and prints the result of each lookup.
#[derive(Debug, Parser)]
struct Args {
    /// server address to send requests to
    #[arg(long, default_value = "127.0.0.1:12000")]
    server: SocketAddr,

    /// file with one measurement id per line
    #[arg(long)]
    data: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().init();
    let args = Args::parse();

    let measurement_ids = read_measurement_ids(&args.data)?;
    let transport = UdpTransport::connect(args.server).await?;
    let mut session = ClientSession::new(Arc::new(transport), Arc::new(ConsolePrompt {}));

    for (measurement_id, outcome) in session.run(measurement_ids).await {
        match outcome {
            Outcome::Value { measurement_id, value } => {
                println!("Measurement ID:{}\nMeasurement Value: {} degree Fahrenheit.", measurement_id, value);
            }
            Outcome::MalformedRequest => println!("{}", ErrorCode::MalformedRequest.message()),
            Outcome::MeasurementNotFound => println!("{}", ErrorCode::MeasurementNotFound.message()),
            Outcome::DeclinedAfterIntegrityFailure => {
                println!("Request {} not resent.", measurement_id);
            }
            Outcome::ConnectionFailure => println!("Connection Failure!Try again later."),
            Outcome::MalformedResponse => println!("Received an undecodable response."),
        }
    }
    Ok(())
}

/// The first integer on each line is a measurement id; empty lines are skipped.
fn read_measurement_ids(path: &Path) -> anyhow::Result<Vec<u32>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read measurement id file {:?}", path))?;

    let mut measurement_ids = Vec::new();
    for line in content.lines() {
        if let Some(token) = line.split_whitespace().next() {
            let id = token
                .parse::<u32>()
                .with_context(|| format!("not a measurement id: {:?}", token))?;
            measurement_ids.push(id);
        }
    }
    Ok(measurement_ids)
}
