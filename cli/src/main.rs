use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;

use rwatch_config::{WatchConfig, DEFAULT_ADDRESS};
use rwatch_rewards::display::{format_micro, format_micro_f64};
use rwatch_rewards::{estimate, AccountSnapshot, AccountStatus};
use rwatch_rpc::{Address, AlgodClient, LedgerClient};
use rwatch_watcher::{RetryPolicy, RewardTracker, TrackerState, WatchHandle};

/// Participation rewards watcher
#[derive(Parser)]
#[command(name = "rwatch", version, about = "Watch participation rewards for an account")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Follow the chain and print reward figures every round
    ///
    /// Each line typed on stdin replaces the watched address.
    Watch {
        #[command(flatten)]
        node: NodeArgs,

        /// Print states as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Print reward figures for the latest round and exit
    Snapshot {
        #[command(flatten)]
        node: NodeArgs,

        /// Print the state as JSON
        #[arg(long)]
        json: bool,
    },

    /// Estimate rewards from given figures without contacting a node
    Estimate {
        /// Total supply in micro-units
        #[arg(long)]
        total_money: u64,

        /// Reward rate of the round
        #[arg(long)]
        rate: u64,

        /// Reward residue of the round
        #[arg(long)]
        residue: u64,

        /// Account balance without pending rewards, in micro-units
        #[arg(long)]
        balance: Option<u64>,

        /// Rewards the node reports as pending, in micro-units
        #[arg(long, default_value = "0")]
        pending: u64,

        /// Participation status
        #[arg(long, value_enum, default_value_t = StatusArg::Online)]
        status: StatusArg,

        #[arg(long, default_value = "0")]
        round: u64,

        #[arg(long, default_value = DEFAULT_ADDRESS)]
        address: String,
    },

    /// Validate an address and print its public key
    Address {
        address: String,
    },

    /// Configuration file commands
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Print version information
    Version,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Write the default configuration file
    Init {
        #[arg(long, default_value = "rwatch.toml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Participation status as typed on the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum StatusArg {
    Online,
    Offline,
    NotParticipating,
}

impl From<StatusArg> for AccountStatus {
    fn from(status: StatusArg) -> Self {
        match status {
            StatusArg::Online => AccountStatus::Online,
            StatusArg::Offline => AccountStatus::Offline,
            StatusArg::NotParticipating => AccountStatus::NotParticipating,
        }
    }
}

/// Where to read from and which account to follow.
#[derive(Args)]
struct NodeArgs {
    /// Path to a TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Account address (overrides the config file)
    #[arg(long)]
    address: Option<String>,

    /// Node REST endpoint (overrides the config file)
    #[arg(long)]
    node_url: Option<String>,

    /// Node API token (overrides the config file)
    #[arg(long)]
    api_token: Option<String>,
}

#[tokio::main]
async fn main() {
    // Logs go to stderr so stdout carries only reward output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Watch { node, json } => cmd_watch(load_config(node), json).await,
        Commands::Snapshot { node, json } => cmd_snapshot(load_config(node), json).await,
        Commands::Estimate {
            total_money,
            rate,
            residue,
            balance,
            pending,
            status,
            round,
            address,
        } => cmd_estimate(
            total_money,
            rate,
            residue,
            balance,
            pending,
            status.into(),
            round,
            &address,
        ),
        Commands::Address { address } => cmd_address(&address),
        Commands::Config { command } => match command {
            ConfigCommands::Init { output, force } => cmd_config_init(output, force),
        },
        Commands::Version => cmd_version(),
    }
}

fn load_config(args: NodeArgs) -> WatchConfig {
    let config = match &args.config {
        Some(path) => WatchConfig::from_file(path).unwrap_or_else(|e| {
            eprintln!("Error reading config file {}: {e}", path.display());
            std::process::exit(1);
        }),
        None => WatchConfig::default(),
    };
    let config = config.with_overrides(args.address, args.node_url, args.api_token);

    config.validate().unwrap_or_else(|e| {
        eprintln!("Config validation failed: {e}");
        std::process::exit(1);
    });
    if !config.has_valid_address() {
        tracing::warn!(
            address = %config.address,
            "address is malformed, account figures will be zero"
        );
    }
    config
}

fn connect(config: &WatchConfig) -> Arc<dyn LedgerClient> {
    let client = AlgodClient::new(config.node.to_algod_config()).unwrap_or_else(|e| {
        eprintln!("Error creating node client: {e}");
        std::process::exit(1);
    });
    tracing::info!(node = %client.base_url(), "using node");
    Arc::new(client)
}

fn start_watch(
    client: &Arc<dyn LedgerClient>,
    address: &str,
    retry: RetryPolicy,
) -> (WatchHandle, watch::Receiver<TrackerState>) {
    tracing::info!(address, "starting watch");
    RewardTracker::new(client.clone(), address)
        .with_retry(retry)
        .spawn()
}

async fn cmd_watch(config: WatchConfig, json: bool) {
    let client = connect(&config);
    let retry = config.retry.to_policy();
    let mut address = config.address.clone();

    let (mut handle, mut states) = start_watch(&client, &address, retry);
    print_state(&states.borrow_and_update(), json);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            changed = states.changed() => {
                if changed.is_err() {
                    tracing::error!("watch ended unexpectedly");
                    break;
                }
                let state = states.borrow_and_update().clone();
                print_state(&state, json);
            }

            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    let next = line.trim();
                    if next.is_empty() || next == address {
                        continue;
                    }
                    if let Err(e) = handle.shutdown().await {
                        tracing::warn!(error = %e, "previous watch did not stop cleanly");
                    }
                    address = next.to_string();
                    (handle, states) = start_watch(&client, &address, retry);
                    print_state(&states.borrow_and_update(), json);
                }
                Ok(None) => stdin_open = false,
                Err(e) => {
                    tracing::warn!(error = %e, "stopped reading addresses from stdin");
                    stdin_open = false;
                }
            },

            _ = tokio::signal::ctrl_c() => {
                tracing::info!("received shutdown signal");
                break;
            }
        }
    }

    if let Err(e) = handle.shutdown().await {
        eprintln!("Error stopping watch: {e}");
        std::process::exit(1);
    }
}

async fn cmd_snapshot(config: WatchConfig, json: bool) {
    let client = connect(&config);
    let retry = config.retry.to_policy();

    let status = retry
        .run("fetch node status", || client.status())
        .await
        .unwrap_or_else(|e| {
            eprintln!("Error reading node status: {e}");
            std::process::exit(1);
        });

    let tracker = RewardTracker::new(client, config.address).with_retry(retry);
    let state = tracker.tick(status.last_round).await;
    print_state(&state, json);

    if matches!(state, TrackerState::Degraded { .. }) {
        std::process::exit(1);
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_estimate(
    total_money: u64,
    rate: u64,
    residue: u64,
    balance: Option<u64>,
    pending: u64,
    status: AccountStatus,
    round: u64,
    address: &str,
) {
    let account = balance.map(|balance| AccountSnapshot {
        balance_without_rewards: balance,
        pending_rewards_field: pending,
        status,
    });

    let est = estimate(round, total_money, rate, residue, address, account.as_ref());

    println!("Round {}", est.round.round);
    println!("  Total money: {}", format_micro(est.round.total_money));
    println!("  Reward rate: {}", est.round.reward_rate);
    println!("  Reward residue: {}", est.round.reward_residue);
    println!("  Next payout: {}", payout_text(est.round.estimated_rounds_until_payout));

    match est.account {
        Ok(info) => {
            println!("Account {}", info.address);
            println!("  Balance: {}", format_micro(info.balance_without_rewards));
            println!("  Earned rewards: {}", format_micro(info.earned_rewards));
            println!("  Pending rewards: {}", format_micro_f64(info.pending_rewards));
            println!("  Next reward amount: {}", info.next_reward_amount);
        }
        Err(e) => println!("Account {address}: {e}"),
    }
}

fn cmd_address(address: &str) {
    let parsed: Address = address.parse().unwrap_or_else(|e| {
        eprintln!("Invalid address: {e}");
        std::process::exit(1);
    });
    println!("Address is valid");
    println!("  Public key: {}", hex::encode(parsed.public_key()));
}

fn cmd_config_init(output: PathBuf, force: bool) {
    if output.exists() && !force {
        eprintln!(
            "{} already exists, pass --force to overwrite",
            output.display()
        );
        std::process::exit(1);
    }

    let config = WatchConfig::default();
    config.to_file(&output).unwrap_or_else(|e| {
        eprintln!("Error writing config file: {e}");
        std::process::exit(1);
    });

    println!("Config file created: {}", output.display());
    println!("  Address: {}", config.address);
    println!("  Node: {}", config.node.url);
}

fn cmd_version() {
    println!(
        "rwatch {} (participation rewards watcher)",
        env!("CARGO_PKG_VERSION")
    );
}

fn print_state(state: &TrackerState, json: bool) {
    if json {
        match serde_json::to_string(state) {
            Ok(line) => println!("{line}"),
            Err(e) => tracing::error!(error = %e, "could not encode state"),
        }
    } else {
        println!("{}", render_state(state));
    }
}

fn payout_text(rounds: Option<i64>) -> String {
    match rounds {
        Some(rounds) => format!("in {rounds} rounds"),
        None => "never (reward rate is zero)".to_string(),
    }
}

/// One human-readable line per state.
fn render_state(state: &TrackerState) -> String {
    match state {
        TrackerState::Starting { address } => format!("watching {address}"),
        TrackerState::Ready(snapshot) => {
            let account = &snapshot.account;
            format!(
                "round {} | payout {} | balance {} | earned {} | pending {} | next reward amount {}",
                snapshot.round.round,
                payout_text(snapshot.round.estimated_rounds_until_payout),
                format_micro(account.balance_without_rewards),
                format_micro(account.earned_rewards),
                format_micro_f64(account.pending_rewards),
                account.next_reward_amount,
            )
        }
        TrackerState::Ineligible { round, reason, .. } => format!(
            "round {} | payout {} | {reason}",
            round.round,
            payout_text(round.estimated_rounds_until_payout),
        ),
        TrackerState::Degraded { round, error, last } => match last {
            Some(last) => format!(
                "round {round} | node unavailable: {error} (showing round {})",
                last.round.round
            ),
            None => format!("round {round} | node unavailable: {error}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rwatch_rewards::{AccountInfo, RoundInfo};
    use rwatch_watcher::RewardSnapshot;

    fn snapshot() -> RewardSnapshot {
        RewardSnapshot {
            round: RoundInfo {
                round: 1_000,
                reward_rate: 10,
                reward_residue: 3,
                total_money: 10_000_000_000_000,
                estimated_rounds_until_payout: Some(999_999),
            },
            account: AccountInfo {
                address: DEFAULT_ADDRESS.to_string(),
                balance_without_rewards: 5_000_000,
                earned_rewards: 250,
                pending_rewards: 65.0,
                next_reward_amount: 5,
            },
            observed_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn render_ready_state() {
        let line = render_state(&TrackerState::Ready(snapshot()));
        assert_eq!(
            line,
            "round 1000 | payout in 999999 rounds | balance 5.000000 | earned 0.000250 | pending 0.000065 | next reward amount 5"
        );
    }

    #[test]
    fn render_zero_rate_has_no_payout() {
        let mut snapshot = snapshot();
        snapshot.round.estimated_rounds_until_payout = None;
        let line = render_state(&TrackerState::Ready(snapshot));
        assert!(line.contains("payout never (reward rate is zero)"));
    }

    #[test]
    fn render_degraded_mentions_last_round() {
        let line = render_state(&TrackerState::Degraded {
            round: 1_001,
            error: "node down".to_string(),
            last: Some(snapshot()),
        });
        assert_eq!(line, "round 1001 | node unavailable: node down (showing round 1000)");
    }

    #[test]
    fn parse_watch_overrides() {
        let cli = Cli::try_parse_from([
            "rwatch",
            "watch",
            "--address",
            "ABC",
            "--node-url",
            "http://localhost:4001",
            "--json",
        ])
        .unwrap();
        let Commands::Watch { node, json } = cli.command else {
            panic!("expected watch command");
        };
        assert!(json);
        assert_eq!(node.address.as_deref(), Some("ABC"));
        assert_eq!(node.node_url.as_deref(), Some("http://localhost:4001"));
        assert!(node.config.is_none());
    }

    #[test]
    fn parse_estimate_status() {
        let cli = Cli::try_parse_from([
            "rwatch",
            "estimate",
            "--total-money",
            "10000000000000",
            "--rate",
            "10",
            "--residue",
            "3",
            "--status",
            "not-participating",
        ])
        .unwrap();
        let Commands::Estimate { status, balance, .. } = cli.command else {
            panic!("expected estimate command");
        };
        assert_eq!(AccountStatus::from(status), AccountStatus::NotParticipating);
        assert_eq!(balance, None);

        let unknown = Cli::try_parse_from([
            "rwatch", "estimate", "--total-money", "1", "--rate", "1", "--residue", "0",
            "--status", "Retired",
        ]);
        assert!(unknown.is_err());
    }
}
