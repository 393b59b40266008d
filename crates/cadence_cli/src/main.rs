use clap::Parser;
use cadence_core::{CadenceConfig, Entropy, InboundMessage, SeededEntropy, ThreadEntropy};
use cadence_gateway::GatewayServer;
use cadence_scheduler::OutboundDirective;
use std::io::{self, Write};
use tokio::sync::broadcast;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, default_value = "cadence.toml")]
    config: String,

    /// Username attributed to messages typed at this terminal
    #[arg(short, long, default_value = "operator")]
    user: String,

    /// Seed the decision RNG for a reproducible session
    #[arg(long)]
    seed: Option<u64>,

    /// Start the HTTP gateway on this port (127.0.0.1)
    #[arg(long)]
    gateway_port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut config = CadenceConfig::load_or_default(&args.config);

    // The terminal is a stream too, so typed messages flow the same path.
    if !config.streams.platforms.iter().any(|p| p == "terminal") {
        config.streams.platforms.push("terminal".to_string());
    }
    if let Some(port) = args.gateway_port {
        config.gateway = Some(cadence_core::config::GatewayConfig {
            host: "127.0.0.1".to_string(),
            port,
        });
    }

    let entropy: Box<dyn Entropy> = match args.seed {
        Some(seed) => {
            info!("seeded entropy ({})", seed);
            Box::new(SeededEntropy::new(seed))
        }
        None => Box::new(ThreadEntropy),
    };

    info!("starting scheduler ({} streams)", config.streams.platforms.len());
    let gateway_config = config.gateway.clone();
    let (scheduler, mut out_rx, _scheduler_task) =
        cadence_scheduler::spawn(config, entropy);

    // Fan directives out: print locally, forward to WebSocket subscribers.
    let (directives_tx, _) = broadcast::channel::<OutboundDirective>(64);
    let fanout = directives_tx.clone();
    tokio::spawn(async move {
        while let Some(directive) = out_rx.recv().await {
            println!(
                "\n[turn {}] respond on {} to {} (priority {}, {} systems{}, waited {}ms)",
                directive.turn_id,
                directive.platform,
                directive.username,
                directive.priority,
                directive.active_systems.len(),
                if directive.brief { ", brief" } else { "" },
                directive.delay_ms,
            );
            print!("> ");
            let _ = io::stdout().flush();
            let _ = fanout.send(directive);
        }
    });

    if let Some(gw) = gateway_config {
        let server = GatewayServer::new(scheduler.clone(), directives_tx.clone(), &gw.host, gw.port);
        server.start().await?;
    }

    println!("Cadence scheduler online. Type a message, or 'stats', 'focus <stream|off>', 'cancel <turn-id>', 'quit'.");
    print!("> ");
    io::stdout().flush()?;

    let stdin = io::stdin();
    let mut input = String::new();

    loop {
        input.clear();
        if stdin.read_line(&mut input)? == 0 {
            break;
        }
        let trimmed = input.trim();

        if trimmed == "quit" || trimmed == "exit" {
            break;
        }

        if trimmed.is_empty() {
            print!("> ");
            io::stdout().flush()?;
            continue;
        }

        if trimmed == "stats" {
            match scheduler.stats().await {
                Ok(snapshot) => println!("{}", serde_json::to_string_pretty(&snapshot)?),
                Err(e) => error!("stats query failed: {}", e),
            }
            print!("> ");
            io::stdout().flush()?;
            continue;
        }

        if let Some(target) = trimmed.strip_prefix("focus ") {
            let focus = match target.trim() {
                "off" => None,
                platform => Some(platform.to_string()),
            };
            scheduler.set_focus(focus.clone()).await?;
            println!("focus: {}", focus.as_deref().unwrap_or("off"));
            print!("> ");
            io::stdout().flush()?;
            continue;
        }

        if let Some(id) = trimmed.strip_prefix("cancel ") {
            match id.trim().parse::<uuid::Uuid>() {
                Ok(turn_id) => {
                    scheduler.cancel_turn(turn_id).await?;
                    println!("cancelled {}", turn_id);
                }
                Err(e) => println!("not a turn id: {}", e),
            }
            print!("> ");
            io::stdout().flush()?;
            continue;
        }

        let msg = InboundMessage {
            platform: "terminal".to_string(),
            username: args.user.clone(),
            text: trimmed.to_string(),
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            is_mentioned: false,
            is_mod: false,
            is_vip: false,
        };

        match scheduler.submit(msg).await {
            Ok(receipt) if receipt.scheduled => {
                println!(
                    "scheduled in {}ms (turn {})",
                    receipt.delay_ms.unwrap_or(0),
                    receipt.turn_id.map(|id| id.to_string()).unwrap_or_default(),
                );
            }
            Ok(receipt) => {
                println!("no response: {} ({})", receipt.reason, receipt.stage);
            }
            Err(e) => error!("submit failed: {}", e),
        }

        print!("> ");
        io::stdout().flush()?;
    }

    info!("shutting down");
    Ok(())
}
