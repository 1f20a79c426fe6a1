use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "registry-cli")]
#[command(about = "Management CLI for the endpoint routing engine", long_about = None)]
struct Cli {
    /// Admin API base URL.
    #[arg(short, long, env = "ROUTER_ADMIN_URL", default_value = "http://localhost:8081")]
    url: String,

    /// Admin API key.
    #[arg(short, long, env = "ROUTER_ADMIN_KEY")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Snapshot version, halt state and contexts
    Status,
    /// Dump the current snapshot
    Snapshot,
    /// Submit a batch from a JSON file
    Submit {
        file: PathBuf,
        /// Wait until the backend has been reconciled
        #[arg(long)]
        wait: bool,
    },
    /// Show which endpoint a request URI resolves to
    Resolve { uri: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", cli.key))?);

    let res = match cli.command {
        Commands::Status => client.get(format!("{}/admin/status", cli.url)).headers(headers).send().await?,
        Commands::Snapshot => client.get(format!("{}/admin/snapshot", cli.url)).headers(headers).send().await?,
        Commands::Submit { file, wait } => {
            let body: Value = serde_json::from_str(&std::fs::read_to_string(&file)?)?;
            client
                .post(format!("{}/admin/batches", cli.url))
                .query(&[("wait", wait)])
                .headers(headers)
                .json(&body)
                .send()
                .await?
        }
        Commands::Resolve { uri } => {
            client
                .get(format!("{}/admin/resolve", cli.url))
                .query(&[("uri", uri)])
                .headers(headers)
                .send()
                .await?
        }
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    if !status.is_success() {
        eprintln!("Error: admin API returned status {}", status);
        if !text.is_empty() {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }
    Ok(())
}
