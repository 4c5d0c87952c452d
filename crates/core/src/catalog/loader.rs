//! Catalog loader for directory-based catalog snapshots.
//!
//! Operator workflows and tests load the catalog from a directory of
//! YAML documents instead of the storefront database:
//!
//! ```text
//! catalog/
//!   features/<slug>.yaml      one feature per file
//!   tiers/<slug>.yaml         one pricing tier per file
//!   templates/<slug>.yaml     one template per file
//!   bundles.yaml              list of bundle discounts
//!   coupons.yaml              list of coupons
//! ```
//!
//! Per-file parse failures degrade to warnings and the load continues;
//! decoding is strict, so a record with unknown keys is rejected here
//! rather than at generation time.

use std::{fs, path::Path};

use forgekit_types::{BundleDiscount, Coupon, Feature, PricingTier, Template};
use serde::de::DeserializeOwned;
use tracing::warn;

use super::{CatalogError, StaticCatalog};

/// Load a full catalog snapshot from a directory.
pub fn load_catalog_from_directory(catalog_dir: &Path) -> Result<StaticCatalog, CatalogError> {
    if !catalog_dir.exists() {
        return Err(CatalogError::DirectoryNotFound(
            catalog_dir.display().to_string(),
        ));
    }

    let features: Vec<Feature> = load_record_dir(&catalog_dir.join("features"))?;
    let tiers: Vec<PricingTier> = load_record_dir(&catalog_dir.join("tiers"))?;
    let templates: Vec<Template> = load_record_dir(&catalog_dir.join("templates"))?;
    let bundles: Vec<BundleDiscount> = load_record_list(&catalog_dir.join("bundles.yaml"))?;
    let coupons: Vec<Coupon> = load_record_list(&catalog_dir.join("coupons.yaml"))?;

    Ok(StaticCatalog::new(
        features, tiers, templates, bundles, coupons,
    ))
}

/// Load every `*.yaml` record in a directory, in file-name order.
fn load_record_dir<T: DeserializeOwned>(dir: &Path) -> Result<Vec<T>, CatalogError> {
    let mut records = Vec::new();

    if !dir.exists() {
        return Ok(records);
    }

    let entries = fs::read_dir(dir)
        .map_err(|e| CatalogError::ReadFileError(dir.display().to_string(), e))?;

    let mut paths: Vec<_> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().and_then(|s| s.to_str()) == Some("yaml"))
        .collect();
    paths.sort();

    for path in paths {
        let content = fs::read_to_string(&path)
            .map_err(|e| CatalogError::ReadFileError(path.display().to_string(), e))?;

        match serde_yml::from_str::<T>(&content) {
            Ok(record) => records.push(record),
            Err(e) => {
                warn!("Failed to parse {}: {}", path.display(), e);
            }
        }
    }

    Ok(records)
}

/// Load a YAML file containing a list of records. A missing file is an
/// empty list.
fn load_record_list<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, CatalogError> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let content = fs::read_to_string(path)
        .map_err(|e| CatalogError::ReadFileError(path.display().to_string(), e))?;

    serde_yml::from_str::<Vec<T>>(&content)
        .map_err(|e| CatalogError::ParseError(path.display().to_string(), e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogReader;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_load_directory_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "features/auth.yaml",
            "slug: auth\nname: Authentication\ncategory: core\n",
        );
        write(
            dir.path(),
            "features/payments.yaml",
            concat!(
                "slug: payments\n",
                "name: Payments\n",
                "category: billing\n",
                "price: 900\n",
                "requires: [billing]\n",
            ),
        );
        write(
            dir.path(),
            "tiers/basic.yaml",
            "slug: basic\nname: Basic\nprice: 1900\nincludedFeatures: [auth]\n",
        );
        write(dir.path(), "templates/saas.yaml", "slug: saas\nname: SaaS\n");
        write(
            dir.path(),
            "bundles.yaml",
            concat!(
                "- id: 1\n",
                "  name: Spring\n",
                "  type: percentage\n",
                "  value: 10\n",
                "  minItems: 2\n",
            ),
        );
        write(
            dir.path(),
            "coupons.yaml",
            "- code: SAVE5\n  type: fixed\n  value: 500\n",
        );

        let catalog = load_catalog_from_directory(dir.path()).unwrap();
        assert_eq!(catalog.all_features().count(), 2);
        assert!(catalog.tier("basic").unwrap().is_some());
        assert!(catalog.template("saas").unwrap().is_some());
        assert_eq!(catalog.all_bundles().len(), 1);
        assert!(catalog.coupon_by_code("save5").unwrap().is_some());
    }

    #[test]
    fn test_malformed_feature_degrades_to_warning() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "features/good.yaml",
            "slug: good\nname: Good\ncategory: core\n",
        );
        write(
            dir.path(),
            "features/bad.yaml",
            "slug: bad\nname: Bad\ncategory: core\nbogusKey: true\n",
        );

        let catalog = load_catalog_from_directory(dir.path()).unwrap();
        assert_eq!(catalog.all_features().count(), 1);
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            load_catalog_from_directory(&missing),
            Err(CatalogError::DirectoryNotFound(_))
        ));
    }
}
