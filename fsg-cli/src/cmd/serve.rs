use crate::config::FsgConfig;
use anyhow::Result;
use clap::{Arg, ArgMatches, Command};
use fsg_core::build_site;
use fsg_dev_server::{BuildCoordinator, LiveServer, LiveServerConfig};
use notify_debouncer_mini::{DebounceEventResult, new_debouncer};
use std::{path::PathBuf, sync::Arc, time::Duration};

pub fn make_subcommand() -> Command {
    crate::cmd::build::add_build_args(Command::new("serve"))
        .about("Start the preview server with live reload")
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_name("PORT")
                .help("Port to serve on")
                .default_value("8080"),
        )
        .arg(
            Arg::new("host")
                .long("host")
                .value_name("HOST")
                .help("Host to bind to")
                .default_value("127.0.0.1"),
        )
        .arg(
            Arg::new("open")
                .long("open")
                .help("Open browser automatically")
                .action(clap::ArgAction::SetTrue),
        )
}

pub async fn execute(args: &ArgMatches) -> Result<()> {
    // Load cascading configuration
    let config = FsgConfig::load(args)?;
    let build_config = config.build_config();

    let source_dir = PathBuf::from(&build_config.source);
    let output_dir = PathBuf::from(&build_config.output);
    let host = build_config.host.clone();
    let port = build_config.port;
    let open = build_config.open;

    let summary = build_site(&config.site, &source_dir, &output_dir, build_config.drafts)?;
    println!(
        "Site built: {} posts, {} pages, {} tags",
        summary.posts, summary.pages, summary.tags
    );

    let coordinator = Arc::new(BuildCoordinator::new());

    let server_config = LiveServerConfig {
        host,
        port,
        root: output_dir.clone(),
        open,
    };

    let server = LiveServer::new(server_config, coordinator.clone());
    let server_handle = tokio::spawn(async move {
        if let Err(e) = server.run().await {
            eprintln!("Dev server error: {}", e);
        }
    });

    // Watch source files and rebuild on changes
    let watcher_handle = tokio::spawn(async move {
        if let Err(e) = watch_source_files(config, coordinator).await {
            eprintln!("Source watcher error: {}", e);
        }
    });

    // Wait for both tasks
    let _ = tokio::try_join!(server_handle, watcher_handle)?;

    Ok(())
}

async fn watch_source_files(config: FsgConfig, coordinator: Arc<BuildCoordinator>) -> Result<()> {
    let build_config = config.build_config();
    let source_dir = PathBuf::from(&build_config.source);
    let output_dir = PathBuf::from(&build_config.output);
    let config_file = PathBuf::from(&build_config.config);
    let include_drafts = build_config.drafts;

    let (tx, mut rx) = tokio::sync::mpsc::channel(100);

    let mut debouncer = new_debouncer(
        Duration::from_millis(500),
        move |res: DebounceEventResult| {
            if let Ok(events) = res {
                for event in events {
                    let _ = tx.blocking_send(event.path);
                }
            }
        },
    )?;

    debouncer
        .watcher()
        .watch(&source_dir, notify::RecursiveMode::Recursive)?;
    println!("Watching source directory: {}", source_dir.display());

    if config_file.exists() {
        debouncer
            .watcher()
            .watch(&config_file, notify::RecursiveMode::NonRecursive)?;
        println!("Watching config file: {}", config_file.display());
    }

    while let Some(path) = rx.recv().await {
        println!("Source file changed: {}", path.display());

        // The server holds the same lock while reading files, so it never
        // observes a half-written output tree.
        {
            let _guard = coordinator.lock().await;
            match build_site(&config.site, &source_dir, &output_dir, include_drafts) {
                Ok(summary) => {
                    println!(
                        "Site rebuilt: {} posts, {} pages, {} tags",
                        summary.posts, summary.pages, summary.tags
                    );
                }
                Err(e) => {
                    eprintln!("Build error: {}", e);
                    continue;
                }
            }
        }

        coordinator.mark_stale();
    }

    Ok(())
}
