use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use relrev_engine::ItemType;

#[derive(Parser)]
#[command(name = "relrev", about = "Review state, issues and activity for property releases", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Engine configuration file (TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Data directory; overrides the configured backend
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Write the whole dataset as one JSON document
    Export(ExportArgs),
    /// Replace the whole dataset with an exported document
    Import(ImportArgs),
    /// List releases, newest first
    Releases,
    /// Show review progress for one release
    Status(StatusArgs),
    /// Show the activity history of a release
    History(HistoryArgs),
    /// Rank users by activity
    Contributors(ContributorsArgs),
    /// Toggle an item's reviewed state
    Approve(ItemArgs),
    /// Raise an issue against an item
    Flag(FlagArgs),
    /// Clear an item's issues and mark it reviewed
    Resolve(ResolveArgs),
    /// List users or select the current one
    Users(UsersArgs),
}

#[derive(Args)]
pub struct ExportArgs {
    /// Output file; stdout if omitted
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

#[derive(Args)]
pub struct ImportArgs {
    pub file: PathBuf,
}

#[derive(Args)]
pub struct StatusArgs {
    pub release: String,
}

#[derive(Args)]
pub struct HistoryArgs {
    pub release: String,
    /// Only this user's entries
    #[arg(long)]
    pub user: Option<String>,
    #[arg(short = 'n', long, default_value = "50")]
    pub limit: usize,
}

#[derive(Args)]
pub struct ContributorsArgs {
    pub release: Option<String>,
}

#[derive(Args)]
pub struct ItemArgs {
    pub release: String,
    /// payment-plan or unit-design
    pub item_type: ItemType,
    pub item_id: String,
    /// Acting user id; defaults to the current user
    #[arg(long)]
    pub user: Option<String>,
}

#[derive(Args)]
pub struct FlagArgs {
    #[command(flatten)]
    pub item: ItemArgs,
    pub text: String,
    #[arg(long, requires = "file_size")]
    pub file_name: Option<String>,
    #[arg(long, requires = "file_name")]
    pub file_size: Option<u64>,
}

#[derive(Args)]
pub struct ResolveArgs {
    #[command(flatten)]
    pub item: ItemArgs,
    /// Discard the issues without marking the item reviewed
    #[arg(long)]
    pub discard: bool,
}

#[derive(Args)]
pub struct UsersArgs {
    /// Make this user id the current user
    #[arg(long)]
    pub set_current: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_flag_with_attachment() {
        let cli = Cli::try_parse_from([
            "relrev", "flag", "R1", "unit-design", "U1", "cracked tile", "--file-name", "tile.jpg",
            "--file-size", "20480", "--user", "user-2",
        ])
        .unwrap();
        let Command::Flag(args) = cli.command else {
            panic!("expected flag");
        };
        assert_eq!(args.item.item_type, ItemType::UnitDesign);
        assert_eq!(args.text, "cracked tile");
        assert_eq!(args.file_name.as_deref(), Some("tile.jpg"));
        assert_eq!(args.file_size, Some(20_480));
        assert_eq!(args.item.user.as_deref(), Some("user-2"));
    }

    #[test]
    fn rejects_unknown_item_type() {
        assert!(Cli::try_parse_from(["relrev", "approve", "R1", "villa", "U1"]).is_err());
    }

    #[test]
    fn attachment_needs_both_fields() {
        assert!(Cli::try_parse_from(["relrev", "flag", "R1", "unit-design", "U1", "x", "--file-name", "a.png"]).is_err());
        assert!(Cli::try_parse_from(["relrev", "flag", "R1", "unit-design", "U1", "x", "--file-size", "10"]).is_err());
    }

    #[test]
    fn global_options_after_subcommand() {
        let cli = Cli::try_parse_from(["relrev", "releases", "--format", "json", "-v"]).unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(cli.verbose);
    }
}
