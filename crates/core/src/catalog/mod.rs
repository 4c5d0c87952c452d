//! Read-only access to the studio catalog.
//!
//! The storefront persists the catalog in a relational store; the
//! assembly pipeline only ever sees it through the [`CatalogReader`]
//! trait. Every lookup returns a snapshot: the engine must not assume a
//! re-read returns the same data. [`StaticCatalog`] is the in-memory
//! implementation built by the YAML directory loader and by tests.

use forgekit_types::{BundleDiscount, Coupon, Feature, PricingTier, Template};
use indexmap::IndexMap;

mod loader;
mod validate;

pub use loader::load_catalog_from_directory;
pub use validate::validate_catalog;

/// Error types for catalog access.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Catalog directory not found: {0}")]
    DirectoryNotFound(String),

    #[error("Failed to read {0}: {1}")]
    ReadFileError(String, std::io::Error),

    #[error("Failed to parse {0}: {1}")]
    ParseError(String, String),
}

/// Read-only catalog lookups used by the pipeline.
pub trait CatalogReader: Send + Sync {
    /// Fetch the features with the given slugs. Unknown slugs are simply
    /// absent from the result; callers decide whether that matters.
    fn features(&self, slugs: &[String]) -> Result<Vec<Feature>, CatalogError>;

    fn tier(&self, slug: &str) -> Result<Option<PricingTier>, CatalogError>;

    fn template(&self, slug: &str) -> Result<Option<Template>, CatalogError>;

    /// Active bundle discounts, in ascending id order.
    fn active_bundles(&self) -> Result<Vec<BundleDiscount>, CatalogError>;

    /// Coupon lookup; codes are matched case-insensitively.
    fn coupon_by_code(&self, code: &str) -> Result<Option<Coupon>, CatalogError>;
}

/// An immutable in-memory catalog snapshot.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    features: IndexMap<String, Feature>,
    tiers: IndexMap<String, PricingTier>,
    templates: IndexMap<String, Template>,
    bundles: Vec<BundleDiscount>,
    coupons: IndexMap<String, Coupon>,
}

impl StaticCatalog {
    pub fn new(
        features: Vec<Feature>,
        tiers: Vec<PricingTier>,
        templates: Vec<Template>,
        mut bundles: Vec<BundleDiscount>,
        coupons: Vec<Coupon>,
    ) -> Self {
        bundles.sort_by_key(|b| b.id);
        Self {
            features: features.into_iter().map(|f| (f.slug.clone(), f)).collect(),
            tiers: tiers.into_iter().map(|t| (t.slug.clone(), t)).collect(),
            templates: templates.into_iter().map(|t| (t.slug.clone(), t)).collect(),
            bundles,
            coupons: coupons
                .into_iter()
                .map(|c| (c.code.to_uppercase(), c))
                .collect(),
        }
    }

    pub fn all_features(&self) -> impl Iterator<Item = &Feature> {
        self.features.values()
    }

    pub fn all_tiers(&self) -> impl Iterator<Item = &PricingTier> {
        self.tiers.values()
    }

    pub fn all_templates(&self) -> impl Iterator<Item = &Template> {
        self.templates.values()
    }

    pub fn all_bundles(&self) -> &[BundleDiscount] {
        &self.bundles
    }

    pub fn all_coupons(&self) -> impl Iterator<Item = &Coupon> {
        self.coupons.values()
    }
}

impl CatalogReader for StaticCatalog {
    fn features(&self, slugs: &[String]) -> Result<Vec<Feature>, CatalogError> {
        Ok(slugs
            .iter()
            .filter_map(|slug| self.features.get(slug).cloned())
            .collect())
    }

    fn tier(&self, slug: &str) -> Result<Option<PricingTier>, CatalogError> {
        Ok(self.tiers.get(slug).cloned())
    }

    fn template(&self, slug: &str) -> Result<Option<Template>, CatalogError> {
        Ok(self.templates.get(slug).cloned())
    }

    fn active_bundles(&self) -> Result<Vec<BundleDiscount>, CatalogError> {
        Ok(self
            .bundles
            .iter()
            .filter(|b| b.is_active)
            .cloned()
            .collect())
    }

    fn coupon_by_code(&self, code: &str) -> Result<Option<Coupon>, CatalogError> {
        Ok(self.coupons.get(&code.to_uppercase()).cloned())
    }
}


#[cfg(test)]
mod tests {
    use super::test_fixtures::*;
    use super::*;
    use forgekit_types::DiscountType;

    #[test]
    fn test_coupon_lookup_is_case_insensitive() {
        let catalog = StaticCatalog::new(
            vec![],
            vec![],
            vec![],
            vec![],
            vec![Coupon {
                code: "Save5".to_string(),
                discount_type: DiscountType::Fixed,
                value: 500,
                max_uses: None,
                used_count: 0,
                min_purchase: None,
                expires_at: None,
                is_active: true,
            }],
        );

        assert!(catalog.coupon_by_code("save5").unwrap().is_some());
        assert!(catalog.coupon_by_code("SAVE5").unwrap().is_some());
        assert!(catalog.coupon_by_code("OTHER").unwrap().is_none());
    }

    #[test]
    fn test_bundles_are_sorted_by_id() {
        let bundle = |id| BundleDiscount {
            id,
            name: format!("bundle-{id}"),
            discount_type: DiscountType::Fixed,
            value: 100,
            min_items: 0,
            applicable_tiers: vec![],
            applicable_features: vec![],
            active_window: None,
            is_active: true,
        };
        let catalog =
            StaticCatalog::new(vec![], vec![], vec![], vec![bundle(3), bundle(1)], vec![]);

        let ids: Vec<i64> = catalog
            .active_bundles()
            .unwrap()
            .iter()
            .map(|b| b.id)
            .collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn test_unknown_feature_slugs_are_absent() {
        let catalog = StaticCatalog::new(
            vec![feature("auth", "core", 0, &[])],
            vec![tier("basic", 1900, &["auth"])],
            vec![template("saas", &[])],
            vec![],
            vec![],
        );

        let found = catalog
            .features(&["auth".to_string(), "ghost".to_string()])
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].slug, "auth");
    }
}
