use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Method;
use serde_json::Value;

#[derive(Parser)]
#[command(name = "fault-cli")]
#[command(about = "Management CLI for the fault injector admin API", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://127.0.0.1:8081")]
    url: String,

    #[arg(short, long, env = "FAULT_ADMIN_KEY", default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show service status
    Status,
    /// List registered faults
    Faults,
    /// Show one fault
    Fault { name: String },
    /// Start a fault
    Start { name: String },
    /// Stop a fault
    Stop { name: String },
    /// List injection rules
    Rules,
    /// Delete an injection rule
    RemoveRule { id: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let (method, path) = match &cli.command {
        Commands::Status => (Method::GET, "/admin/status".to_string()),
        Commands::Faults => (Method::GET, "/admin/faults".to_string()),
        Commands::Fault { name } => (Method::GET, format!("/admin/faults/{}", name)),
        Commands::Start { name } => (Method::POST, format!("/admin/faults/{}/start", name)),
        Commands::Stop { name } => (Method::POST, format!("/admin/faults/{}/stop", name)),
        Commands::Rules => (Method::GET, "/admin/rules".to_string()),
        Commands::RemoveRule { id } => (Method::DELETE, format!("/admin/rules/{}", id)),
    };

    let res = client
        .request(method, format!("{}{}", cli.url.trim_end_matches('/'), path))
        .headers(headers)
        .send()
        .await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;

    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if !text.is_empty() {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    if text.is_empty() {
        println!("{}", status);
        return Ok(());
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }
    Ok(())
}
