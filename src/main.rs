use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pigeonhole::core::client::RelayClient;
use pigeonhole::core::server::Server;
use pigeonhole::core::shell::Shell;
use pigeonhole::utils::config::{Config, ServeArgs};
use pigeonhole::utils::logger;
use tokio::io::{stdin, stdout, BufReader};
use tokio::signal;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Store-and-forward text relay", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Run the relay server
    Serve(ServeArgs),
    /// Connect to a relay with the interactive menu
    Chat { host: String, port: u16 },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Cmd::Serve(args) => serve(args).await,
        Cmd::Chat { host, port } => chat(host, port).await,
    }
}

async fn serve(args: ServeArgs) -> Result<()> {
    let config = Config::from_args(&args).context("Error loading configuration")?;
    //Keeps the file writer alive until main returns
    let _guard = logger::init_server_tracing(args.log_level.as_deref(), config.log_dir.as_deref());

    let server = Server::bind(&config)
        .await
        .with_context(|| format!("Error binding {}:{}", config.bind, config.port))?;
    server.run_until(shutdown_signal()).await?;
    info!("Server stopped");
    Ok(())
}

async fn chat(host: String, port: u16) -> Result<()> {
    println!("Connecting to {}: {}\n", host, port);
    let client = RelayClient::connect((host.as_str(), port))
        .await
        .context("Error on connect call")?;
    Shell::new(BufReader::new(stdin()), stdout()).run(client).await
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = signal::ctrl_c() => info!("Received Ctrl+C"),
                    _ = sigterm.recv() => info!("Received SIGTERM"),
                }
            }
            Err(_) => {
                let _ = signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = signal::ctrl_c().await;
        info!("Received Ctrl+C");
    }
}
