// Command-line entry point for the Arcade broker.
//
// Usage:
//   arcade [OPTIONS]
//     --config <PATH>     JSON config file (default: $ARCADE_CONFIG, else built-in defaults)
//     --bind <ADDR>       Listen address, overrides the config (default: 0.0.0.0:8888)
//     --data-dir <DIR>    Storage and staging root, overrides the config (default: ./data)
//
// Logging follows RUST_LOG (default: info).

use std::path::PathBuf;

use arcade::prelude::*;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    let server = match ArcadeServer::builder()
        .config(config)
        .build(InMemoryAccounts::new())
        .await
    {
        Ok(server) => server,
        Err(e) => {
            eprintln!("Failed to start server: {e}");
            std::process::exit(1);
        }
    };

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };
    if let Err(e) = server.run_until(shutdown).await {
        eprintln!("Server error: {e}");
        std::process::exit(1);
    }
}

/// Builds the config from `--config`/`ARCADE_CONFIG` plus flag overrides.
/// Uses plain `std::env::args()` matching.
fn load_config() -> Result<ServerConfig, ArcadeError> {
    let args: Vec<String> = std::env::args().collect();
    let mut config_path = std::env::var_os("ARCADE_CONFIG").map(PathBuf::from);
    let mut bind = None;
    let mut data_dir = None;
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                i += 1;
                config_path = Some(PathBuf::from(flag_value(&args, i, "--config")?));
            }
            "--bind" => {
                i += 1;
                bind = Some(flag_value(&args, i, "--bind")?);
            }
            "--data-dir" => {
                i += 1;
                data_dir = Some(PathBuf::from(flag_value(&args, i, "--data-dir")?));
            }
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            other => {
                print_usage();
                return Err(ArcadeError::Config(format!("unknown argument: {other}")));
            }
        }
        i += 1;
    }

    let mut config = match config_path {
        Some(path) => ServerConfig::from_file(&path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = bind {
        config.bind_addr = bind;
    }
    if let Some(dir) = data_dir {
        config.data_dir = dir;
    }
    Ok(config)
}

fn flag_value(args: &[String], i: usize, flag: &str) -> Result<String, ArcadeError> {
    args.get(i)
        .cloned()
        .ok_or_else(|| ArcadeError::Config(format!("{flag} requires a value")))
}

fn print_usage() {
    println!("Usage: arcade [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --config <PATH>     JSON config file (or set ARCADE_CONFIG)");
    println!("  --bind <ADDR>       Listen address (default: 0.0.0.0:8888)");
    println!("  --data-dir <DIR>    Storage and staging root (default: ./data)");
    println!("  --help, -h          Show this help");
}
