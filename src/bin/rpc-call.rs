use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::Value;

use rpc_courier::observability::init_tracing;
use rpc_courier::{CallOptions, CallSpec, RpcClient, Token, TransportKind};

#[derive(Parser)]
#[command(name = "rpc-call")]
#[command(about = "Issue RPC calls through the configured routing table", long_about = None)]
struct Cli {
    /// TOML config file
    #[arg(short, long, default_value = "rpc.toml")]
    config: PathBuf,

    /// `http` or `binary-rpc`
    #[arg(short, long, default_value = "http")]
    transport: String,

    /// Caller token; JSON objects are sent as structured tokens
    #[arg(long)]
    token: Option<String>,

    /// Total timeout override in milliseconds for this invocation
    #[arg(long)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Make a single call
    Call {
        /// Service reference (`/user/info/get`) or URL with --external
        service_ref: String,

        #[arg(short, long, default_value = "GET")]
        method: String,

        /// JSON parameters
        #[arg(short, long)]
        params: Option<String>,

        /// Treat the reference as an external URL
        #[arg(long)]
        external: bool,
    },
    /// Run a JSON array of calls from a file
    Batch {
        file: PathBuf,

        /// Fan out instead of chaining
        #[arg(long)]
        parallel: bool,
    },
}

fn parse_token(raw: Option<String>) -> Token {
    match raw {
        None => Token::None,
        Some(text) => match serde_json::from_str::<Value>(&text) {
            Ok(value @ Value::Object(_)) => Token::Structured(value),
            _ => Token::Raw(text),
        },
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing("rpc_courier=info");

    let cli = Cli::parse();
    let kind: TransportKind = cli.transport.parse()?;
    let client = RpcClient::from_file(kind, &cli.config)?;
    let token = parse_token(cli.token);

    let (calls, parallel) = match cli.command {
        Commands::Call { service_ref, method, params, external } => {
            let mut spec = CallSpec::new(service_ref, method);
            if let Some(raw) = params {
                spec = spec.params(serde_json::from_str(&raw)?);
            }
            if external {
                spec = spec.external();
            }
            (vec![spec], false)
        }
        Commands::Batch { file, parallel } => {
            let text = std::fs::read_to_string(&file)?;
            let calls: Vec<CallSpec> = serde_json::from_str(&text)?;
            (calls, parallel)
        }
    };

    let mut request = client.build_request(calls, token, parallel);
    if let Some(ms) = cli.timeout {
        request.set_custom_options(CallOptions::default().timeout_ms(ms));
    }

    tracing::debug!(request_id = %request.request_id(), "Running request");

    let result = request.get().await?;
    println!("{}", serde_json::to_string_pretty(&result)?);

    Ok(())
}
