use crate::config::FsgConfig;
use anyhow::Result;
use clap::{Arg, ArgMatches, Command};
use fsg_core::build_site;
use std::path::Path;

pub fn add_build_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("source")
                .short('s')
                .long("source")
                .value_name("DIR")
                .help("Source directory containing the site tree")
                .default_value("./site"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("DIR")
                .help("Output directory for the generated site")
                .default_value("./out"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file")
                .default_value("./fsg.toml"),
        )
        .arg(
            Arg::new("drafts")
                .short('d')
                .long("drafts")
                .help("Include draft posts in the output")
                .action(clap::ArgAction::SetTrue),
        )
}

pub fn make_subcommand() -> Command {
    add_build_args(Command::new("build")).about("Build the site into the output directory")
}

pub fn execute(args: &ArgMatches) -> Result<()> {
    // Load cascading configuration
    let config = FsgConfig::load(args)?;
    let build_config = config.build_config();

    let source_dir = Path::new(&build_config.source);
    let output_dir = Path::new(&build_config.output);

    let summary = build_site(
        config.site_config(),
        source_dir,
        output_dir,
        build_config.drafts,
    )?;

    println!(
        "Site built in {}: {} posts, {} pages, {} tags",
        output_dir.display(),
        summary.posts,
        summary.pages,
        summary.tags
    );

    Ok(())
}
