use console::style;
use forgekit_core::CatalogError;
use forgekit_core::catalog::{load_catalog_from_directory, validate_catalog};
use forgekit_types::DiagnosticSeverity;

use crate::Context;

#[derive(Debug, Clone, clap::Args)]
pub struct ValidateCommand {}

#[derive(Debug, thiserror::Error)]
pub enum CatalogCommandError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("Catalog has {0} validation error(s)")]
    Invalid(usize),
}

impl ValidateCommand {
    pub fn execute(&self, ctx: &Context) -> Result<(), CatalogCommandError> {
        let catalog = load_catalog_from_directory(&ctx.catalog_dir)?;
        let result = validate_catalog(&catalog);

        for diagnostic in &result.diagnostics {
            let prefix = match diagnostic.severity {
                DiagnosticSeverity::Error => style("error:").red().bold(),
                DiagnosticSeverity::Warning => style("warning:").yellow(),
                DiagnosticSeverity::Info => style("info:").dim(),
            };
            match &diagnostic.field {
                Some(field) => eprintln!("{} [{}] {} ({})", prefix, diagnostic.rule, diagnostic.message, field),
                None => eprintln!("{} [{}] {}", prefix, diagnostic.rule, diagnostic.message),
            }
        }

        if !result.is_valid {
            return Err(CatalogCommandError::Invalid(result.error_count));
        }
        eprintln!(
            "{} Catalog is valid ({} warnings)",
            style("✓").green(),
            result.warning_count
        );
        Ok(())
    }
}

#[derive(Debug, Clone, clap::Args)]
pub struct ListCommand {}

impl ListCommand {
    pub fn execute(&self, ctx: &Context) -> Result<(), CatalogCommandError> {
        let catalog = load_catalog_from_directory(&ctx.catalog_dir)?;

        println!("{}", style("Tiers").bold());
        for tier in catalog.all_tiers() {
            println!(
                "  {}  {} ({} minor units, {} included features)",
                tier.slug,
                tier.name,
                tier.price,
                tier.included_features.len()
            );
        }

        println!("{}", style("Templates").bold());
        for template in catalog.all_templates() {
            println!(
                "  {}  {} ({} included features)",
                template.slug,
                template.name,
                template.included_features.len()
            );
        }

        println!("{}", style("Features").bold());
        for feature in catalog.all_features() {
            println!(
                "  {}  {} [{}] ({} minor units)",
                feature.slug, feature.name, feature.category, feature.price
            );
        }

        println!("{}", style("Bundles").bold());
        for bundle in catalog.all_bundles() {
            println!(
                "  #{}  {} ({} {})",
                bundle.id,
                bundle.name,
                bundle.value,
                bundle.discount_type.as_str()
            );
        }

        println!("{}", style("Coupons").bold());
        for coupon in catalog.all_coupons() {
            println!(
                "  {}  ({} {})",
                coupon.code,
                coupon.value,
                coupon.discount_type.as_str()
            );
        }

        Ok(())
    }
}
