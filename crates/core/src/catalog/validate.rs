//! Admin-time validation of a catalog snapshot.
//!
//! Catches the catalog mistakes that would otherwise surface during a
//! paying customer's generation: dangling feature references, duplicate
//! env keys, requirement cycles.

use std::collections::{BTreeSet, HashMap, HashSet};

use forgekit_types::{Feature, ValidationDiagnostic, ValidationResult};

use super::StaticCatalog;

/// Validate a catalog snapshot and report diagnostics.
pub fn validate_catalog(catalog: &StaticCatalog) -> ValidationResult {
    let mut diagnostics = Vec::new();

    let known: HashSet<&str> = catalog.all_features().map(|f| f.slug.as_str()).collect();

    for feature in catalog.all_features() {
        for required in &feature.requires {
            if !known.contains(required.as_str()) {
                diagnostics.push(
                    ValidationDiagnostic::error(
                        "dangling-requires",
                        format!(
                            "Feature '{}' requires unknown feature '{}'",
                            feature.slug, required
                        ),
                    )
                    .with_field(format!("features.{}.requires", feature.slug)),
                );
            }
        }

        let mut seen_keys = BTreeSet::new();
        for env_var in &feature.env_vars {
            if !seen_keys.insert(env_var.key.as_str()) {
                diagnostics.push(
                    ValidationDiagnostic::warning(
                        "duplicate-env-key",
                        format!(
                            "Feature '{}' declares env var '{}' more than once",
                            feature.slug, env_var.key
                        ),
                    )
                    .with_field(format!("features.{}.envVars", feature.slug)),
                );
            }
        }
    }

    for tier in catalog.all_tiers() {
        if !tier.is_active {
            diagnostics.push(
                ValidationDiagnostic::warning(
                    "inactive-tier",
                    format!("Tier '{}' is inactive and cannot be ordered", tier.slug),
                )
                .with_field(format!("tiers.{}", tier.slug)),
            );
        }
        for included in &tier.included_features {
            if !known.contains(included.as_str()) {
                diagnostics.push(
                    ValidationDiagnostic::error(
                        "dangling-included-feature",
                        format!(
                            "Tier '{}' includes unknown feature '{}'",
                            tier.slug, included
                        ),
                    )
                    .with_field(format!("tiers.{}.includedFeatures", tier.slug)),
                );
            }
        }
    }

    for template in catalog.all_templates() {
        for included in &template.included_features {
            if !known.contains(included.as_str()) {
                diagnostics.push(
                    ValidationDiagnostic::error(
                        "dangling-included-feature",
                        format!(
                            "Template '{}' includes unknown feature '{}'",
                            template.slug, included
                        ),
                    )
                    .with_field(format!("templates.{}.includedFeatures", template.slug)),
                );
            }
        }
    }

    for cycle in find_requirement_cycles(catalog) {
        diagnostics.push(
            ValidationDiagnostic::error(
                "requires-cycle",
                format!("Requirement cycle: {}", cycle.join(" -> ")),
            )
            .with_suggestion("Break the cycle by removing one of the requires edges"),
        );
    }

    ValidationResult::from_diagnostics(diagnostics)
}

/// Find one representative cycle per strongly-connected requirement loop.
fn find_requirement_cycles(catalog: &StaticCatalog) -> Vec<Vec<String>> {
    let features: HashMap<&str, &Feature> =
        catalog.all_features().map(|f| (f.slug.as_str(), f)).collect();

    fn visit<'a>(
        slug: &'a str,
        features: &HashMap<&'a str, &'a Feature>,
        path: &mut Vec<&'a str>,
        on_path: &mut HashSet<&'a str>,
        done: &mut HashSet<&'a str>,
        cycles: &mut Vec<Vec<String>>,
    ) {
        if done.contains(slug) {
            return;
        }
        if !on_path.insert(slug) {
            let pos = path.iter().position(|s| *s == slug).unwrap_or(0);
            let mut cycle: Vec<String> = path[pos..].iter().map(|s| s.to_string()).collect();
            cycle.push(slug.to_string());
            cycles.push(cycle);
            return;
        }
        path.push(slug);
        if let Some(feature) = features.get(slug) {
            for required in &feature.requires {
                if features.contains_key(required.as_str()) {
                    visit(required, features, path, on_path, done, cycles);
                }
            }
        }
        path.pop();
        on_path.remove(slug);
        done.insert(slug);
    }

    let mut cycles = Vec::new();
    let mut done: HashSet<&str> = HashSet::new();

    let mut slugs: Vec<&str> = features.keys().copied().collect();
    slugs.sort();

    for start in slugs {
        let mut path = Vec::new();
        let mut on_path = HashSet::new();
        visit(start, &features, &mut path, &mut on_path, &mut done, &mut cycles);
    }

    cycles
}
