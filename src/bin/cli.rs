use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use agrilink_kestra::{
    AgriLinkClient, CrisisRequest, ExecutionResult, ExecutionState, MarketMonitorRequest,
    SaleRequest,
};

#[derive(Parser)]
#[command(name = "agrilink", about = "Agri-Link Kestra client", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy all flow definitions from a directory
    Deploy {
        #[arg(short, long, default_value = "./kestra/flows")]
        directory: PathBuf,
    },

    /// Start a new sale workflow
    Sale {
        #[arg(long)]
        farmer_id: String,
        #[arg(long, default_value = "Tomato")]
        commodity: String,
        #[arg(long, default_value_t = 100)]
        quantity: u32,
        #[arg(long, default_value = "Maharashtra")]
        state: String,
        /// Ask the server to block until the execution completes
        #[arg(long)]
        wait: bool,
    },

    /// Directly activate the crisis-shield workflow
    Crisis {
        #[arg(long)]
        farmer_id: String,
        #[arg(long)]
        commodity: String,
        #[arg(long)]
        quantity: u32,
        #[arg(long, default_value = "Maharashtra")]
        state: String,
        #[arg(long, default_value = "Nashik")]
        district: String,
        #[arg(long, default_value = r#"{"grade": "B"}"#)]
        quality_grade: String,
        #[arg(long)]
        wait: bool,
    },

    /// Start the market monitoring workflow
    Monitor {
        #[arg(long, default_value = "Tomato,Potato,Onion")]
        commodities: String,
        #[arg(long, default_value = "Maharashtra")]
        state: String,
    },

    /// Get the current status of an execution
    Status { execution_id: String },

    /// Follow an execution until it reaches a terminal state
    Follow {
        execution_id: String,
        /// Give up after this many seconds
        #[arg(long, default_value_t = 300)]
        timeout: u64,
    },
}

fn state_icon(state: &ExecutionState) -> &'static str {
    match state {
        ExecutionState::Created => "○",
        ExecutionState::Running => "●",
        ExecutionState::Success => "✓",
        ExecutionState::Failed | ExecutionState::Killed => "✗",
        ExecutionState::Other(_) => "?",
    }
}

fn print_execution(result: &ExecutionResult) {
    println!("Execution: {}", result.execution_id);
    println!("State: {} {}", state_icon(&result.state), result.state);
    println!("Flow: {}/{}", result.namespace, result.flow_id);
    if let Some(outputs) = &result.outputs {
        match serde_json::to_string_pretty(outputs) {
            Ok(json) => println!("Outputs: {}", json),
            Err(_) => println!("Outputs: <unprintable>"),
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<bool> {
    let client = AgriLinkClient::from_env()?;

    match cli.command {
        Commands::Deploy { directory } => {
            println!("Deploying flows from {}...", directory.display());
            println!("Host: {}", client.config().host);
            println!("Namespace: {}", client.config().namespace);

            let results = client.deploy_all_flows(&directory).await?;
            let mut deployed = 0;
            for (file, outcome) in &results {
                if outcome.success {
                    deployed += 1;
                    let status = outcome
                        .status
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| "deployed".to_string());
                    println!("  ✓ {}: {}", file, status);
                } else {
                    println!(
                        "  ✗ {}: {}",
                        file,
                        outcome.error.as_deref().unwrap_or("failed")
                    );
                }
            }
            println!("Deployed: {}/{} flows", deployed, results.len());
            Ok(deployed == results.len())
        }

        Commands::Sale {
            farmer_id,
            commodity,
            quantity,
            state,
            wait,
        } => {
            println!("Starting sale for farmer {}...", farmer_id);
            let mut request = SaleRequest::new(farmer_id);
            request.commodity = commodity;
            request.quantity_kg = quantity;
            request.state = state;
            request.wait = wait;

            let result = client.start_sale(request).await?;
            print_execution(&result);
            Ok(true)
        }

        Commands::Crisis {
            farmer_id,
            commodity,
            quantity,
            state,
            district,
            quality_grade,
            wait,
        } => {
            println!("Activating crisis shield for farmer {}...", farmer_id);
            let result = client
                .start_crisis_shield(CrisisRequest {
                    farmer_id,
                    commodity,
                    quantity_kg: quantity,
                    state,
                    district,
                    quality_grade,
                    wait,
                })
                .await?;
            print_execution(&result);
            Ok(!result.is_failed())
        }

        Commands::Monitor { commodities, state } => {
            println!("Starting market monitor for {} in {}...", commodities, state);
            let result = client
                .start_market_monitor(MarketMonitorRequest {
                    commodities,
                    state,
                    wait: false,
                })
                .await?;
            println!("Execution ID: {}", result.execution_id);
            Ok(true)
        }

        Commands::Status { execution_id } => {
            let result = client.get_execution(&execution_id).await?;
            print_execution(&result);
            Ok(true)
        }

        Commands::Follow {
            execution_id,
            timeout,
        } => {
            println!("Following execution {}...", execution_id);
            let mut feed = client.follow(&execution_id).await?;
            let deadline = tokio::time::Instant::now() + Duration::from_secs(timeout);

            let terminal = loop {
                let next = tokio::time::timeout_at(deadline, feed.next()).await;
                match next {
                    Ok(observed) => match observed? {
                        Some(snapshot) => {
                            println!("  {} {}", state_icon(&snapshot.state), snapshot.state);
                            if snapshot.is_terminal() {
                                break snapshot;
                            }
                        }
                        None => {
                            // Stream closed; fetch the last known status.
                            break client.get_execution(&execution_id).await?;
                        }
                    },
                    Err(_) => {
                        anyhow::bail!(
                            "execution {} did not finish within {}s",
                            execution_id,
                            timeout
                        );
                    }
                }
            };

            println!("Execution completed.");
            print_execution(&terminal);
            Ok(!terminal.is_failed())
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(error) => {
            eprintln!("Error: {:#}", error);
            ExitCode::FAILURE
        }
    }
}
