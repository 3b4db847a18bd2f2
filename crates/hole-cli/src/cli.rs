use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use hole::{Address, Component, Family, Version};

#[derive(Parser)]
#[command(
    name = "hole",
    about = "Hole: content-addressed, versioned block store",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file; defaults apply if it does not exist
    #[arg(short, long, global = true, default_value = "hole.toml")]
    pub config: PathBuf,

    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Serve this node's local blocks to remote peers
    Serve(ServeArgs),
    /// Store a file as a block
    Push(PushArgs),
    /// Fetch a block's content
    Pull(PullArgs),
    /// Remove a block and all its versions
    Wipe(WipeArgs),
    /// Print the network's root block address
    Origin,
}

#[derive(Args)]
pub struct ServeArgs {
    #[arg(long, default_value = "127.0.0.1:4070")]
    pub bind: SocketAddr,
}

#[derive(Args)]
pub struct PushArgs {
    /// File whose content becomes the block
    pub file: PathBuf,
    #[arg(long, default_value = "data", value_parser = parse_component)]
    pub component: Component,
    /// Store a mutable block of this family (pkb, okb or imb)
    #[arg(long, value_parser = parse_mutable_family, requires = "seed")]
    pub family: Option<Family>,
    /// Identifying seed the mutable address is derived from
    #[arg(long)]
    pub seed: Option<String>,
    /// Version to write; defaults to one past the latest
    #[arg(long, requires = "family", value_parser = parse_version)]
    pub version: Option<Version>,
}

#[derive(Args)]
pub struct PullArgs {
    pub address: Address,
    #[arg(long, value_parser = parse_version)]
    pub version: Option<Version>,
    /// Write the content here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct WipeArgs {
    pub address: Address,
}

fn parse_component(s: &str) -> Result<Component, String> {
    Component::from_tag(s).ok_or_else(|| format!("unknown component '{s}'"))
}

fn parse_mutable_family(s: &str) -> Result<Family, String> {
    match Family::from_tag(s) {
        Some(family) if family.is_mutable() => Ok(family),
        _ => Err(format!("'{s}' is not a mutable family (pkb, okb, imb)")),
    }
}

fn parse_version(s: &str) -> Result<Version, String> {
    match s.parse::<u64>() {
        Ok(0) | Err(_) => Err(format!("'{s}' is not a version (1, 2, ...)")),
        Ok(n) => Ok(Version::new(n)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_origin() {
        let cli = Cli::try_parse_from(["hole", "origin"]).unwrap();
        assert!(matches!(cli.command, Command::Origin));
        assert_eq!(cli.config, PathBuf::from("hole.toml"));
    }

    #[test]
    fn parse_serve() {
        let cli = Cli::try_parse_from(["hole", "serve", "--bind", "0.0.0.0:9000", "-c", "n.toml"])
            .unwrap();
        if let Command::Serve(args) = cli.command {
            assert_eq!(args.bind, "0.0.0.0:9000".parse::<SocketAddr>().unwrap());
        } else { panic!("wrong command"); }
        assert_eq!(cli.config, PathBuf::from("n.toml"));
    }

    #[test]
    fn parse_push_immutable() {
        let cli = Cli::try_parse_from(["hole", "push", "notes.txt"]).unwrap();
        if let Command::Push(args) = cli.command {
            assert_eq!(args.component, Component::Data);
            assert!(args.family.is_none());
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_push_mutable() {
        let cli = Cli::try_parse_from([
            "hole", "push", "f", "--family", "okb", "--seed", "me", "--version", "3",
        ])
        .unwrap();
        if let Command::Push(args) = cli.command {
            assert_eq!(args.family, Some(Family::OwnerKey));
            assert_eq!(args.version, Some(Version::new(3)));
        } else { panic!("wrong command"); }
    }

    #[test]
    fn push_rejects_immutable_family_and_orphan_seed() {
        assert!(Cli::try_parse_from(["hole", "push", "f", "--family", "chb", "--seed", "x"]).is_err());
        assert!(Cli::try_parse_from(["hole", "push", "f", "--family", "okb"]).is_err());
        assert!(Cli::try_parse_from(["hole", "push", "f", "--version", "2"]).is_err());
    }

    #[test]
    fn parse_pull_and_wipe() {
        let address = hole::ImmutableBlock::new(Component::Data, b"x".to_vec()).address();
        let text = address.to_string();
        let cli = Cli::try_parse_from(["hole", "pull", &text, "--version", "2"]).unwrap();
        if let Command::Pull(args) = cli.command {
            assert_eq!(args.address, address);
            assert_eq!(args.version, Some(Version::new(2)));
        } else { panic!("wrong command"); }

        let cli = Cli::try_parse_from(["hole", "wipe", &text]).unwrap();
        assert!(matches!(cli.command, Command::Wipe(args) if args.address == address));
        assert!(Cli::try_parse_from(["hole", "wipe", "not-an-address"]).is_err());
        assert!(Cli::try_parse_from(["hole", "pull", &text, "--version", "0"]).is_err());
    }
}
