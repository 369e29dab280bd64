use anyhow::Result;
use clap::Command;

mod cmd;
mod config;

fn make_cli() -> Command {
    Command::new("fsg")
        .about("Static site generator driven by directives embedded in HTML comments")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(cmd::build::make_subcommand())
        .subcommand(cmd::serve::make_subcommand())
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = make_cli().get_matches();

    match matches.subcommand() {
        Some(("build", args)) => cmd::build::execute(args),
        Some(("serve", args)) => cmd::serve::execute(args).await,
        _ => unreachable!("subcommand is required"),
    }
}
