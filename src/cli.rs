use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "stackform")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Declarative stack reconciliation", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Preview what apply would change
    Plan(PlanArgs),

    /// Converge stacks to their spec files
    Apply(ApplyArgs),

    /// Show current status and outputs of stacks
    Describe(DescribeArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Options shared by every command that talks to a provider
#[derive(Args, Clone)]
pub struct ProviderArgs {
    /// Sandbox state directory [default: ~/.local/state/stackform]
    #[arg(long, env = "STACKFORM_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// Attempts per provider call when throttled
    #[arg(long, default_value = "3")]
    pub retries: u32,

    /// Print results as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct PlanArgs {
    /// Spec files (TOML or JSON)
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Number of stacks checked in parallel
    #[arg(short, long, default_value = "4")]
    pub jobs: u16,

    #[command(flatten)]
    pub provider: ProviderArgs,
}

#[derive(Args)]
pub struct ApplyArgs {
    /// Spec files (TOML or JSON)
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Show what would change without changing it
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Number of stacks applied in parallel
    #[arg(short, long, default_value = "4")]
    pub jobs: u16,

    /// Seconds between status polls
    #[arg(long, default_value = "5")]
    pub poll_interval: u64,

    /// Give up waiting after this many seconds (0 waits forever)
    #[arg(long, default_value = "3600")]
    pub max_wait: u64,

    #[command(flatten)]
    pub provider: ProviderArgs,
}

#[derive(Args)]
pub struct DescribeArgs {
    /// Stack names
    #[arg(required = true)]
    pub names: Vec<String>,

    /// Number of stacks described in parallel
    #[arg(short, long, default_value = "4")]
    pub jobs: u16,

    #[command(flatten)]
    pub provider: ProviderArgs,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_apply() {
        let cli = Cli::parse_from([
            "stackform",
            "-v",
            "apply",
            "stacks.toml",
            "--dry-run",
            "-j",
            "2",
            "--max-wait",
            "0",
            "--json",
        ]);
        assert_eq!(cli.verbose, 1);
        let Command::Apply(args) = cli.command else {
            panic!("expected apply");
        };
        assert_eq!(args.files, vec![PathBuf::from("stacks.toml")]);
        assert!(args.dry_run);
        assert_eq!(args.jobs, 2);
        assert_eq!(args.max_wait, 0);
        assert_eq!(args.poll_interval, 5);
        assert!(args.provider.json);
        assert_eq!(args.provider.retries, 3);
    }

    #[test]
    fn test_parse_describe() {
        let cli = Cli::parse_from(["stackform", "describe", "web", "db"]);
        let Command::Describe(args) = cli.command else {
            panic!("expected describe");
        };
        assert_eq!(args.names, vec!["web", "db"]);
        assert_eq!(args.jobs, 4);

        let cli = Cli::parse_from(["stackform", "describe", "web", "--jobs", "1"]);
        let Command::Describe(args) = cli.command else {
            panic!("expected describe");
        };
        assert_eq!(args.jobs, 1);
    }

    #[test]
    fn test_plan_requires_files() {
        assert!(Cli::try_parse_from(["stackform", "plan"]).is_err());
    }
}
