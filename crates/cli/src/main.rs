use std::{
    path::{Path, PathBuf},
    process,
};

use clap::{Parser, Subcommand};

mod catalog;
mod generate;
mod preview;
mod price;

#[derive(Clone, Debug)]
pub struct Context {
    pub catalog_dir: PathBuf,
}

#[derive(Parser, Debug)]
#[clap(author, version, about = "ForgeKit - Starter-kit studio CLI", long_about = None)]
struct Opts {
    /// Path to the catalog directory (default: ./catalog)
    #[arg(
        long = "catalog-dir",
        short = 'c',
        global = true,
        default_value = "./catalog"
    )]
    catalog_dir: PathBuf,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate the archive for a paid order
    Generate(generate::GenerateCommand),
    /// Quote a tier + feature selection
    Price(price::PriceCommand),
    /// Preview backend management commands
    Preview {
        #[clap(subcommand)]
        command: PreviewCommand,
    },
    /// Catalog management commands
    Catalog {
        #[clap(subcommand)]
        command: CatalogCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum PreviewCommand {
    /// Provision an ephemeral preview schema for a session
    Provision(preview::ProvisionCommand),
    /// Invalidate a preview session
    Invalidate(preview::InvalidateCommand),
    /// Drop a provisioned preview schema
    Drop(preview::DropCommand),
}

#[derive(Subcommand, Debug)]
pub enum CatalogCommand {
    /// Validate the catalog directory
    Validate(catalog::ValidateCommand),
    /// List the catalog contents
    List(catalog::ListCommand),
}

#[tokio::main]
async fn main() {
    let opts: Opts = match Opts::try_parse() {
        Ok(opts) => opts,
        Err(e) => {
            let _ = e.print();
            process::exit(e.exit_code());
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    // Load environment variables from a .env file beside the catalog
    let catalog_parent = opts
        .catalog_dir
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();
    load_env_file(&catalog_parent);

    let ctx = Context {
        catalog_dir: opts.catalog_dir.clone(),
    };

    let outcome = match opts.command {
        Command::Generate(cmd) => cmd.execute(&ctx).map_err(|e| e.to_string()),
        Command::Price(cmd) => cmd.execute(&ctx).map_err(|e| e.to_string()),
        Command::Preview { command } => match command {
            PreviewCommand::Provision(cmd) => cmd.execute().await.map_err(|e| e.to_string()),
            PreviewCommand::Invalidate(cmd) => cmd.execute().await.map_err(|e| e.to_string()),
            PreviewCommand::Drop(cmd) => cmd.execute().await.map_err(|e| e.to_string()),
        },
        Command::Catalog { command } => match command {
            CatalogCommand::Validate(cmd) => cmd.execute(&ctx).map_err(|e| e.to_string()),
            CatalogCommand::List(cmd) => cmd.execute(&ctx).map_err(|e| e.to_string()),
        },
    };

    if let Err(message) = outcome {
        eprintln!("{} {}", console::style("Error:").red().bold(), message);
        process::exit(1);
    }
}

/// Load a .env file from the given directory, if present.
fn load_env_file(dir: &Path) {
    let env_path = dir.join(".env");
    if env_path.exists() {
        match dotenvy::from_path(&env_path) {
            Ok(_) => eprintln!("✓ Loaded environment from {}", env_path.display()),
            Err(e) => eprintln!("Warning: Failed to load {}: {}", env_path.display(), e),
        }
    }
}
