use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;

const PIXELS: usize = 784;

#[derive(Parser)]
#[command(name = "digit-cli")]
#[command(about = "Client for the Digit Relay service", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// Request timeout in seconds.
    #[arg(short, long, default_value_t = 15)]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show model and heap status
    Status,
    /// Classify an image read from a file
    Predict {
        /// JSON body `{"pixels": [...]}` or a bare comma-separated list of 784 values
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Classify an all-black image
    Blank,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(cli.timeout))
        .build()?;

    match cli.command {
        Commands::Status => {
            let res = client.get(format!("{}/status", cli.url)).send().await?;
            print_response(res).await?;
        }
        Commands::Predict { file } => {
            let body = read_pixel_file(&file)?;
            let res = client
                .post(format!("{}/predict", cli.url))
                .header(CONTENT_TYPE, "application/json")
                .body(body)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Blank => {
            let body = pixel_body(&[0u8; PIXELS]);
            let res = client
                .post(format!("{}/predict", cli.url))
                .header(CONTENT_TYPE, "application/json")
                .body(body)
                .send()
                .await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

fn pixel_body(pixels: &[u8]) -> String {
    serde_json::json!({ "pixels": pixels }).to_string()
}

/// Accept either a ready JSON body or a bare value list.
fn read_pixel_file(path: &Path) -> Result<String, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path)?;
    let trimmed = text.trim();

    if trimmed.starts_with('{') {
        return Ok(trimmed.to_string());
    }

    let values = trimmed
        .trim_start_matches('[')
        .trim_end_matches(']')
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| token.parse::<u8>())
        .collect::<Result<Vec<u8>, _>>()?;

    if values.len() != PIXELS {
        return Err(format!("expected {} values in {}, found {}", PIXELS, path.display(), values.len()).into());
    }
    Ok(pixel_body(&values))
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;

    if !status.is_success() {
        eprintln!("Error: service returned status {}", status);
        eprintln!("Response: {}", text);
        return Ok(());
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }
    Ok(())
}
