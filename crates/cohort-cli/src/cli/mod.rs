use clap::Parser;

pub mod global;
pub mod root_commands;
pub mod subcommands;

pub use global::{GlobalFlags, OutputFormat};
pub use root_commands::Commands;

/// Top-level CLI parser for the `cohort` binary.
#[derive(Debug, Parser)]
#[command(name = "cohort", version, about = "Cohort - study runs and group allocation")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format: json, raw
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Max results to return
    #[arg(short, long, global = true)]
    pub limit: Option<u32>,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose mode (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Database path (overrides configuration)
    #[arg(long, global = true)]
    pub db: Option<String>,
}

impl Cli {
    /// Extract ergonomic global flags struct for command handlers.
    #[must_use]
    pub fn global_flags(&self) -> GlobalFlags {
        GlobalFlags {
            format: self.format,
            limit: self.limit,
            quiet: self.quiet,
            verbose: self.verbose,
            db: self.db.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};
    use pretty_assertions::assert_eq;

    use super::subcommands::{BatchCommands, RunCommands, WorkerCommands};
    use super::{Cli, Commands, OutputFormat};

    #[test]
    fn clap_command_tree_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_parse_before_subcommand() {
        let cli = Cli::try_parse_from([
            "cohort", "--format", "raw", "--db", "/tmp/c.db", "--verbose", "init",
        ])
        .expect("cli should parse");

        assert_eq!(cli.format, OutputFormat::Raw);
        assert_eq!(cli.db.as_deref(), Some("/tmp/c.db"));
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Init));
    }

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::try_parse_from([
            "cohort", "batch", "results", "bat-1", "--limit", "5", "--format", "raw", "--quiet",
        ])
        .expect("cli should parse");

        assert_eq!(cli.global_flags().format, OutputFormat::Raw);
        assert!(cli.quiet);
        match cli.command {
            Commands::Batch {
                action: BatchCommands::Results { batch, limit },
            } => {
                assert_eq!(batch, "bat-1");
                assert_eq!(limit, Some(5));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn global_limit_applies_before_subcommand() {
        let cli = Cli::try_parse_from(["cohort", "--limit", "7", "batch", "groups", "bat-1"])
            .expect("cli should parse");
        assert_eq!(cli.global_flags().limit, Some(7));
    }

    #[test]
    fn output_format_rejects_invalid_value() {
        assert!(Cli::try_parse_from(["cohort", "--format", "table", "init"]).is_err());
    }

    #[test]
    fn run_start_requires_all_references() {
        let parsed = Cli::try_parse_from(["cohort", "run", "start", "--study", "stu-1", "--batch", "bat-1"]);
        assert!(parsed.is_err());

        let cli = Cli::try_parse_from([
            "cohort", "run", "start", "--study", "stu-1", "--batch", "bat-1", "--token", "abc",
        ])
        .expect("cli should parse");
        match cli.command {
            Commands::Run {
                action: RunCommands::Start { study, batch, token },
            } => assert_eq!((study.as_str(), batch.as_str(), token.as_str()), ("stu-1", "bat-1", "abc")),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn run_submit_takes_positional_ids_and_data() {
        let cli = Cli::try_parse_from([
            "cohort", "run", "submit", "srs-1", "cmp-1", "--data", "{\"rt\":412}",
        ])
        .expect("cli should parse");
        assert!(matches!(
            cli.command,
            Commands::Run {
                action: RunCommands::Submit { .. }
            }
        ));
    }

    #[test]
    fn worker_create_accepts_optional_labels() {
        let cli = Cli::try_parse_from([
            "cohort", "worker", "create", "--kind", "one-time", "--label", "mailing list",
        ])
        .expect("cli should parse");
        match cli.command {
            Commands::Worker {
                action: WorkerCommands::Create { kind, label, platform_id },
            } => {
                assert_eq!(kind, "one-time");
                assert_eq!(label.as_deref(), Some("mailing list"));
                assert!(platform_id.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
