use chrono::Utc;
use console::style;
use forgekit_core::catalog::load_catalog_from_directory;
use forgekit_core::pricing;
use forgekit_core::{CatalogError, PricingError};

use crate::Context;

#[derive(Debug, Clone, clap::Args)]
pub struct PriceCommand {
    /// Tier slug to quote
    #[arg(long)]
    pub tier: String,

    /// Comma-separated add-on feature slugs
    #[arg(long, value_delimiter = ',')]
    pub features: Vec<String>,

    /// Coupon code to apply
    #[arg(long)]
    pub coupon: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum PriceCommandError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Pricing(#[from] PricingError),

    #[error("Failed to serialize quote: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl PriceCommand {
    pub fn execute(&self, ctx: &Context) -> Result<(), PriceCommandError> {
        let catalog = load_catalog_from_directory(&ctx.catalog_dir)?;
        let quote = pricing::calculate(
            &catalog,
            &self.tier,
            &self.features,
            self.coupon.as_deref(),
            Utc::now(),
        )?;

        println!("{}", serde_json::to_string_pretty(&quote)?);
        eprintln!(
            "{} Total: {} {} (subtotal {}, discount {})",
            style("✓").green(),
            quote.total,
            quote.currency.as_str(),
            quote.subtotal,
            quote.total_discount
        );
        Ok(())
    }
}
