use crate::demo::{check_policy, run_demo, DemoArgs, PolicyCheckArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use outreach_engine::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Outreach Engagement Engine",
    about = "Score prospect engagement and run the decay scheduler from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service and decay scheduler (default command)
    Serve(ServeArgs),
    /// Inspect scoring policies
    Policy {
        #[command(subcommand)]
        command: PolicyCommand,
    },
    /// Walk sample prospects through scoring, bounce, and decay
    Demo(DemoArgs),
}

#[derive(Subcommand, Debug)]
enum PolicyCommand {
    /// Validate a policy file and print its group table
    Check(PolicyCheckArgs),
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
        Command::Policy {
            command: PolicyCommand::Check(args),
        } => check_policy(args),
        Command::Demo(args) => run_demo(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_is_the_default_command() {
        let cli = Cli::try_parse_from(["outreach-engine-api"]).expect("parses");
        assert!(cli.command.is_none());
    }

    #[test]
    fn parses_policy_check_path() {
        let cli = Cli::try_parse_from([
            "outreach-engine-api",
            "policy",
            "check",
            "--path",
            "policies/tenant.json",
        ])
        .expect("parses");

        match cli.command {
            Some(Command::Policy {
                command: PolicyCommand::Check(args),
            }) => assert_eq!(
                args.path.as_deref().and_then(|path| path.to_str()),
                Some("policies/tenant.json")
            ),
            other => panic!("unexpected command {other:?}"),
        }
    }
}
