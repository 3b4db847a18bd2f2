use std::io::Write;
use std::sync::Arc;

use anyhow::Context;
use colored::Colorize;
use tokio::net::TcpListener;

use hole::{Block, Hole, HoleConfig, ImmutableBlock, MutableBlock, Version};
use hole_protocol::Server;
use hole_store::{Holeable, LocalBackend};

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;
    match cli.command {
        Command::Serve(args) => cmd_serve(config, args).await,
        Command::Push(args) => cmd_push(config, args).await,
        Command::Pull(args) => cmd_pull(config, args).await,
        Command::Wipe(args) => cmd_wipe(config, args).await,
        Command::Origin => cmd_origin(config),
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<HoleConfig> {
    if cli.config.exists() {
        HoleConfig::load(&cli.config).with_context(|| format!("loading {}", cli.config.display()))
    } else {
        tracing::debug!(path = %cli.config.display(), "no config file, using defaults");
        Ok(HoleConfig::default())
    }
}

/// Bring a store online the way a node does at startup.
async fn open(config: HoleConfig) -> anyhow::Result<Hole> {
    let mut hole = Hole::new(config);
    hole.initialize().context("initializing store")?;
    hole.join().await.context("joining network")?;
    hole.ready()?;
    Ok(hole)
}

async fn cmd_serve(config: HoleConfig, args: ServeArgs) -> anyhow::Result<()> {
    let network = config.network()?;
    let backend = Arc::new(LocalBackend::new(&config.store_root, &network));
    backend.join().await?;
    let listener = TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("binding {}", args.bind))?;
    println!(
        "Serving {} on {} (root: {})",
        network.to_string().bold(),
        args.bind.to_string().bold(),
        backend.root().display()
    );
    Server::new(network, backend)
        .serve_with_shutdown(listener, async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}

async fn cmd_push(config: HoleConfig, args: PushArgs) -> anyhow::Result<()> {
    let content = std::fs::read(&args.file)
        .with_context(|| format!("reading {}", args.file.display()))?;
    let mut hole = open(config).await?;

    let (address, block): (_, Block) = match (args.family, args.seed) {
        (Some(family), Some(seed)) => {
            let address = MutableBlock::derive_address(family, args.component, seed.as_bytes())?;
            let version = match args.version {
                Some(version) => version,
                None => match hole.pull(&address, None).await {
                    Ok(latest) => latest.version().map_or(Version::FIRST, |v| v.next()),
                    Err(err) if err.is_not_found() => Version::FIRST,
                    Err(err) => return Err(err.into()),
                },
            };
            let block = MutableBlock::new(family, args.component, version, content)?;
            (address, block.into())
        }
        _ => {
            let block = ImmutableBlock::new(args.component, content);
            (block.address(), block.into())
        }
    };

    hole.push(&address, &block).await?;
    match block.version() {
        Some(version) => println!("{} {} (version {})", "✓".green().bold(), address.to_string().yellow(), version),
        None => println!("{} {}", "✓".green().bold(), address.to_string().yellow()),
    }
    hole.clean().await?;
    Ok(())
}

async fn cmd_pull(config: HoleConfig, args: PullArgs) -> anyhow::Result<()> {
    let mut hole = open(config).await?;
    let block = hole.pull(&args.address, args.version).await?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, block.content())
                .with_context(|| format!("writing {}", path.display()))?;
            eprintln!("{} {} bytes to {}", "✓".green(), block.content().len(), path.display());
        }
        None => std::io::stdout().write_all(block.content())?,
    }
    hole.clean().await?;
    Ok(())
}

async fn cmd_wipe(config: HoleConfig, args: WipeArgs) -> anyhow::Result<()> {
    let mut hole = open(config).await?;
    hole.wipe(&args.address).await?;
    println!("{} Wiped {}", "✓".green().bold(), args.address.to_string().yellow());
    hole.clean().await?;
    Ok(())
}

fn cmd_origin(config: HoleConfig) -> anyhow::Result<()> {
    let mut hole = Hole::new(config);
    hole.initialize().context("initializing store")?;
    println!("{}", hole.origin()?);
    Ok(())
}
