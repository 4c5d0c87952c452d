//! Resolution of an order's feature selection into its transitive closure.
//!
//! The customer selects features; the tier and template layer more in;
//! each feature can require others. The resolver closes the selection
//! under the `requires` relation and fixes the canonical iteration
//! order, `(category, slug)` ascending, that every downstream merge
//! step uses. That order, not the selection order, is what makes
//! generation deterministic.

use std::collections::HashSet;

use forgekit_types::{Feature, PricingTier, Template};
use indexmap::IndexMap;
use tracing::warn;

use crate::catalog::{CatalogError, CatalogReader};

/// Error types for feature resolution.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("Requirement cycle in catalog: {0}")]
    CatalogCycle(String),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// The closed, canonically ordered feature set for one order.
#[derive(Debug, Clone)]
pub struct ResolvedFeatures {
    /// All features in the closure, sorted by `(category, slug)`
    pub features: Vec<Feature>,

    /// Slugs of `features`, sorted
    pub all_slugs: Vec<String>,

    /// `slug -> requires` for every resolved feature, in `features` order
    pub dependency_tree: IndexMap<String, Vec<String>>,
}

impl ResolvedFeatures {
    pub fn contains(&self, slug: &str) -> bool {
        self.dependency_tree.contains_key(slug)
    }
}

/// Close the selection under `requires`.
///
/// The seed is the union of the explicit selection, the tier's included
/// features and the template's included features: a customer buying a
/// tier gets that tier's modules whether or not they clicked them.
/// Features referenced by `requires` but absent from the catalog are
/// logged and skipped; they cannot contribute artifacts. Cycles among
/// fetched features abort the resolution.
pub fn resolve_features(
    catalog: &dyn CatalogReader,
    selected: &[String],
    tier: Option<&PricingTier>,
    template: Option<&Template>,
) -> Result<ResolvedFeatures, ResolveError> {
    let mut seed: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for slug in selected
        .iter()
        .chain(tier.map(|t| t.included_features.iter()).into_iter().flatten())
        .chain(template.map(|t| t.included_features.iter()).into_iter().flatten())
    {
        if seen.insert(slug.clone()) {
            seed.push(slug.clone());
        }
    }

    let mut by_slug: IndexMap<String, Feature> = IndexMap::new();
    let mut missing: HashSet<String> = HashSet::new();
    let mut frontier = seed;

    // Fetch the seed, then keep batching up unfetched `requires` slugs
    // until the closure is stable.
    while !frontier.is_empty() {
        let fetched = catalog.features(&frontier)?;
        let fetched_slugs: HashSet<String> = fetched.iter().map(|f| f.slug.clone()).collect();
        for slug in &frontier {
            if !fetched_slugs.contains(slug) {
                missing.insert(slug.clone());
            }
        }
        for feature in fetched {
            by_slug.insert(feature.slug.clone(), feature);
        }

        let mut next: Vec<String> = Vec::new();
        for feature in by_slug.values() {
            for required in &feature.requires {
                if !by_slug.contains_key(required) && !missing.contains(required) {
                    if !next.contains(required) {
                        next.push(required.clone());
                    }
                }
            }
        }
        frontier = next;
    }

    for slug in &missing {
        warn!("Feature '{}' is referenced but absent from the catalog", slug);
    }

    detect_cycle(&by_slug)?;

    let mut features: Vec<Feature> = by_slug.into_values().collect();
    features.sort_by(|a, b| (a.category.as_str(), a.slug.as_str()).cmp(&(b.category.as_str(), b.slug.as_str())));

    let mut all_slugs: Vec<String> = features.iter().map(|f| f.slug.clone()).collect();
    all_slugs.sort();

    let dependency_tree: IndexMap<String, Vec<String>> = features
        .iter()
        .map(|f| (f.slug.clone(), f.requires.clone()))
        .collect();

    Ok(ResolvedFeatures {
        features,
        all_slugs,
        dependency_tree,
    })
}

/// Reject requirement cycles among the fetched features.
fn detect_cycle(by_slug: &IndexMap<String, Feature>) -> Result<(), ResolveError> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Visiting,
        Done,
    }

    fn visit(
        slug: &str,
        by_slug: &IndexMap<String, Feature>,
        marks: &mut IndexMap<String, Mark>,
        path: &mut Vec<String>,
    ) -> Result<(), ResolveError> {
        match marks.get(slug) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                let pos = path.iter().position(|s| s == slug).unwrap_or(0);
                let mut cycle = path[pos..].to_vec();
                cycle.push(slug.to_string());
                return Err(ResolveError::CatalogCycle(cycle.join(" -> ")));
            }
            None => {}
        }
        marks.insert(slug.to_string(), Mark::Visiting);
        path.push(slug.to_string());
        if let Some(feature) = by_slug.get(slug) {
            for required in &feature.requires {
                if by_slug.contains_key(required) {
                    visit(required, by_slug, marks, path)?;
                }
            }
        }
        path.pop();
        marks.insert(slug.to_string(), Mark::Done);
        Ok(())
    }

    let mut marks = IndexMap::new();
    let mut path = Vec::new();
    let slugs: Vec<String> = by_slug.keys().cloned().collect();
    for slug in slugs {
        visit(&slug, by_slug, &mut marks, &mut path)?;
    }
    Ok(())
}
