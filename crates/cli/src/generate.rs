use std::fs::{self, File};
use std::io::BufWriter;
use std::path::PathBuf;

use console::style;
use forgekit_core::assembly::AssemblyEngine;
use forgekit_core::catalog::load_catalog_from_directory;
use forgekit_core::{CatalogError, GenerateError};
use forgekit_types::Order;

use crate::Context;

#[derive(Debug, Clone, clap::Args)]
pub struct GenerateCommand {
    /// Path to the order JSON file
    #[arg(long)]
    pub order: PathBuf,

    /// Where to write the generated archive
    #[arg(long, short = 'o')]
    pub out: PathBuf,

    /// Root of the template store
    #[arg(long, env = "PROJECT_ROOT")]
    pub project_root: PathBuf,

    /// Base project tree (default: <project-root>/core)
    #[arg(long, env = "CORE_BASE")]
    pub core_base: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum GenerateCommandError {
    #[error("Failed to read order file {0}: {1}")]
    ReadOrder(PathBuf, std::io::Error),

    #[error("Failed to parse order file {0}: {1}")]
    ParseOrder(PathBuf, serde_json::Error),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("Failed to create {0}: {1}")]
    CreateArchive(PathBuf, std::io::Error),

    #[error(transparent)]
    Generate(#[from] GenerateError),
}

impl GenerateCommand {
    pub fn execute(&self, ctx: &Context) -> Result<(), GenerateCommandError> {
        let raw = fs::read_to_string(&self.order)
            .map_err(|e| GenerateCommandError::ReadOrder(self.order.clone(), e))?;
        let order: Order = serde_json::from_str(&raw)
            .map_err(|e| GenerateCommandError::ParseOrder(self.order.clone(), e))?;

        let catalog = load_catalog_from_directory(&ctx.catalog_dir)?;
        let core_base = self
            .core_base
            .clone()
            .unwrap_or_else(|| self.project_root.join("core"));
        let engine = AssemblyEngine::new(&catalog, self.project_root.clone(), core_base);

        let file = File::create(&self.out)
            .map_err(|e| GenerateCommandError::CreateArchive(self.out.clone(), e))?;
        let report = engine.generate(&order, BufWriter::new(file))?;

        for warning in &report.warnings {
            eprintln!("{} {}", style("Warning:").yellow(), warning);
        }
        eprintln!(
            "{} Generated {} for order {} ({} warnings)",
            style("✓").green(),
            self.out.display(),
            order.order_number,
            report.warnings.len()
        );
        Ok(())
    }
}
