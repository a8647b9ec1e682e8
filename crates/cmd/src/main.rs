// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use cmd::cluster::{Cluster, load_config, parse_storage_arg};
use cmd::commands;
use tinydfs::{DfsPath, StorageConfig};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(name = "dfs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Cluster configuration (YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Storage server over a host directory, as name=dir; may be repeated
    #[arg(short, long, global = true, value_parser = parse_storage_arg)]
    storage: Vec<StorageConfig>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print every path in the filesystem
    Tree,
    /// List a directory
    Ls {
        #[arg(default_value = "/")]
        path: DfsPath,
    },
    /// Print the contents of a file
    Cat { path: DfsPath },
    /// Create an empty file
    Touch { path: DfsPath },
    /// Create a directory
    Mkdir { path: DfsPath },
    /// Remove a file or directory
    Rm { path: DfsPath },
}

fn print_line(line: String) {
    let _ = writeln!(std::io::stdout(), "{}", line);
}

async fn run(cluster: &Cluster, command: Commands) -> Result<()> {
    let service = cluster.naming().as_ref();
    match command {
        Commands::Tree => commands::tree_command(service, print_line).await,
        Commands::Ls { path } => commands::ls_command(service, &path, print_line).await,
        Commands::Cat { path } => {
            let _ = commands::cat_command(service, &path, &mut std::io::stdout()).await?;
            Ok(())
        }
        Commands::Touch { path } => commands::touch_command(service, &path).await,
        Commands::Mkdir { path } => commands::mkdir_command(service, &path).await,
        Commands::Rm { path } => commands::rm_command(service, &path).await,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    diagnostics::init_diagnostics();
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref(), &cli.storage).await?;
    let cluster = Cluster::start(&config).await?;
    let result = run(&cluster, cli.command).await;
    cluster.stop().await;
    result
}
