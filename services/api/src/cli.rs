use crate::demo::{run_classify, run_demo, run_sweep, ClassifyArgs, DemoArgs, SweepArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use renay::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "AVS Compliance Tracker",
    about = "Track subcontractor AVS documents, expiry alerts, and project compliance",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Classify a single expiry date against the warning window
    Classify(ClassifyArgs),
    /// Seed the demo store, then re-evaluate it on a later day
    Sweep(SweepArgs),
    /// Seed subcontractors, projects, and documents and print the dashboard
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Classify(args) => {
            run_classify(args);
            Ok(())
        }
        Command::Sweep(args) => run_sweep(args),
        Command::Demo(args) => run_demo(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_is_the_default_command() {
        let cli = Cli::try_parse_from(["renay-api"]).expect("parses");
        assert!(cli.command.is_none());
    }

    #[test]
    fn classify_parses_dates_and_window() {
        let cli = Cli::try_parse_from([
            "renay-api",
            "classify",
            "--valid-until",
            "2026-03-05",
            "--today",
            "2026-02-13",
            "--warning-days",
            "19",
        ])
        .expect("parses");

        match cli.command {
            Some(Command::Classify(args)) => {
                assert_eq!(
                    args.valid_until.map(|date| date.to_string()).as_deref(),
                    Some("2026-03-05")
                );
                assert_eq!(args.warning_days, Some(19));
            }
            other => panic!("expected classify, got {other:?}"),
        }
    }

    #[test]
    fn classify_rejects_malformed_dates() {
        let parsed = Cli::try_parse_from(["renay-api", "classify", "--valid-until", "March 5"]);
        assert!(parsed.is_err());
    }
}
