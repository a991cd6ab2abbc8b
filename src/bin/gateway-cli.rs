use clap::{Parser, Subcommand};
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use std::path::PathBuf;

use media_gateway::gateway::OperationKind;

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Management CLI for the media gateway", long_about = None)]
struct Cli {
    #[arg(short, long, env = "GATEWAY_URL", default_value = "http://localhost:8080")]
    url: String,

    /// Correlation id to send as X-Request-ID.
    #[arg(long)]
    request_id: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Service status and uptime
    Status,
    /// Readiness, including upstream health
    Ready,
    /// Circuit breaker state per group
    Breakers,
    /// Send a file through one operation
    Invoke {
        /// license-plate, detect, transcribe, remove-background or caption
        operation: OperationKind,
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let request = match &cli.command {
        Commands::Status => client.get(format!("{}/api/health", base)),
        Commands::Ready => client.get(format!("{}/api/health/ready", base)),
        Commands::Breakers => client.get(format!("{}/api/ai/breakers", base)),
        Commands::Invoke { operation, file } => {
            let bytes = tokio::fs::read(file).await?;
            let file_name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "upload".to_string());
            let form = Form::new().part("file", Part::bytes(bytes).file_name(file_name));
            client
                .post(format!("{}{}", base, route(*operation)))
                .multipart(form)
        }
    };
    let request = match &cli.request_id {
        Some(id) => request.header("x-request-id", id),
        None => request,
    };

    print_response(request.send().await?).await
}

fn route(operation: OperationKind) -> &'static str {
    match operation {
        OperationKind::LicensePlate => "/api/ai/license-plate/detect",
        OperationKind::Detect => "/api/ai/detect",
        OperationKind::Transcribe => "/api/ai/transcribe",
        OperationKind::RemoveBackground => "/api/ai/remove-background",
        OperationKind::Caption => "/api/ai/caption",
    }
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let request_id = res
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let degraded = res.headers().contains_key("x-gateway-degraded");

    if let Some(id) = request_id {
        eprintln!("request id: {}", id);
    }
    if degraded {
        eprintln!("warning: degraded response (fallback)");
    }
    if !status.is_success() {
        eprintln!("Error: gateway returned status {}", status);
    }

    let text = res.text().await?;
    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }
    Ok(())
}
