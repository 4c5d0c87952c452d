//! Dependency manifest merging for the generated project.
//!
//! Each target (`server`, `web`) gets the union of its base
//! `package.json` and the per-feature package additions. Version
//! conflicts resolve to the first writer (base first, then features in
//! canonical order) and the loser is recorded as a warning. Output is
//! canonical: fixed top-level key order, every map sorted by key.

use forgekit_types::{Feature, ManifestTarget, PackageKind};
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};

use super::report::{GenerationReport, GenerationWarning};

/// Error types for manifest merging.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("Failed to parse base {0} manifest: {1}")]
    ParseError(&'static str, serde_json::Error),
}

/// The subset of `package.json` the merger carries through. Everything
/// else is dropped by canonicalization.
#[derive(Debug, Default, Deserialize)]
struct BaseManifest {
    #[serde(default)]
    name: Option<String>,

    #[serde(default)]
    version: Option<String>,

    #[serde(default)]
    scripts: IndexMap<String, String>,

    #[serde(default)]
    dependencies: IndexMap<String, String>,

    #[serde(default, rename = "devDependencies")]
    dev_dependencies: IndexMap<String, String>,

    #[serde(default, rename = "peerDependencies")]
    peer_dependencies: IndexMap<String, String>,
}

/// Merge the manifest for one target.
///
/// Returns `None` when there is no base manifest for the `web` target:
/// server-only projects are legal and simply omit `web/package.json`.
/// A missing server base degrades to an empty manifest skeleton.
pub fn merge_manifest(
    target: ManifestTarget,
    base: Option<&str>,
    features: &[Feature],
    report: &mut GenerationReport,
) -> Result<Option<String>, ManifestError> {
    let base = match (target, base) {
        (ManifestTarget::Web, None) => return Ok(None),
        (_, Some(text)) => serde_json::from_str::<BaseManifest>(text)
            .map_err(|e| ManifestError::ParseError(target.as_str(), e))?,
        (ManifestTarget::Server, None) => BaseManifest::default(),
    };

    let mut runtime = base.dependencies;
    let mut dev = base.dev_dependencies;
    let mut peer = base.peer_dependencies;

    for feature in features {
        for package in &feature.npm_packages {
            if package.target != target {
                continue;
            }
            let section = match package.kind {
                PackageKind::Runtime => &mut runtime,
                PackageKind::Dev => &mut dev,
                PackageKind::Peer => &mut peer,
            };
            match section.get(&package.name) {
                None => {
                    section.insert(package.name.clone(), package.version.clone());
                }
                Some(kept) if kept == &package.version => {}
                Some(kept) => {
                    report.warn(GenerationWarning::DependencyConflict {
                        name: package.name.clone(),
                        kind: package.kind,
                        kept: kept.clone(),
                        ignored: package.version.clone(),
                    });
                }
            }
        }
    }

    let mut scripts = base.scripts;
    for slug in sorted_feature_slugs(features) {
        scripts.insert(
            format!("codegen:{}", slug),
            format!("node tools/codegen/{}.mjs", slug),
        );
    }

    let default_name = match target {
        ManifestTarget::Server => "backend",
        ManifestTarget::Web => "web",
    };

    // Fixed top-level key order; every map sorted by key.
    let mut manifest: IndexMap<&str, JsonValue> = IndexMap::new();
    manifest.insert("name", json!(base.name.as_deref().unwrap_or(default_name)));
    manifest.insert("version", json!(base.version.as_deref().unwrap_or("0.1.0")));
    insert_sorted(&mut manifest, "scripts", scripts);
    insert_sorted(&mut manifest, "dependencies", runtime);
    insert_sorted(&mut manifest, "devDependencies", dev);
    insert_sorted(&mut manifest, "peerDependencies", peer);

    let mut text = serde_json::to_string_pretty(&manifest).expect("manifest is valid JSON");
    text.push('\n');
    Ok(Some(text))
}

fn sorted_feature_slugs(features: &[Feature]) -> Vec<&str> {
    let mut slugs: Vec<&str> = features.iter().map(|f| f.slug.as_str()).collect();
    slugs.sort();
    slugs
}

fn insert_sorted(
    manifest: &mut IndexMap<&str, JsonValue>,
    key: &'static str,
    map: IndexMap<String, String>,
) {
    if map.is_empty() {
        return;
    }
    let mut entries: Vec<(String, String)> = map.into_iter().collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    let sorted: IndexMap<String, String> = entries.into_iter().collect();
    manifest.insert(key, serde_json::to_value(sorted).expect("string map"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use forgekit_types::PackageSpec;

    const BASE: &str = r#"{
        "name": "acme-backend",
        "version": "1.2.0",
        "description": "dropped by canonicalization",
        "scripts": { "dev": "nest start --watch" },
        "dependencies": { "express": "^4.19.0" },
        "devDependencies": { "typescript": "^5.4.0" }
    }"#;

    fn feature_with_packages(slug: &str, packages: Vec<PackageSpec>) -> Feature {
        Feature {
            slug: slug.to_string(),
            name: slug.to_string(),
            description: String::new(),
            category: "core".to_string(),
            price: 0,
            requires: vec![],
            file_mappings: vec![],
            schema_mappings: vec![],
            env_vars: vec![],
            npm_packages: packages,
        }
    }

    fn package(name: &str, version: &str, kind: PackageKind) -> PackageSpec {
        PackageSpec {
            name: name.to_string(),
            version: version.to_string(),
            kind,
            target: ManifestTarget::Server,
        }
    }

    #[test]
    fn test_base_version_wins_over_feature() {
        let mut report = GenerationReport::default();
        let features = vec![feature_with_packages(
            "api",
            vec![package("express", "^5.0.0", PackageKind::Runtime)],
        )];

        let text = merge_manifest(ManifestTarget::Server, Some(BASE), &features, &mut report)
            .unwrap()
            .unwrap();

        assert!(text.contains(r#""express": "^4.19.0""#));
        assert!(!text.contains("^5.0.0"));
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn test_first_feature_wins_and_conflict_warns() {
        let mut report = GenerationReport::default();
        let features = vec![
            feature_with_packages("a", vec![package("zod", "^3.22.0", PackageKind::Runtime)]),
            feature_with_packages("b", vec![package("zod", "^3.23.0", PackageKind::Runtime)]),
        ];

        let text = merge_manifest(ManifestTarget::Server, Some(BASE), &features, &mut report)
            .unwrap()
            .unwrap();

        assert!(text.contains(r#""zod": "^3.22.0""#));
        assert!(matches!(
            report.warnings.as_slice(),
            [GenerationWarning::DependencyConflict { name, kept, ignored, .. }]
                if name == "zod" && kept == "^3.22.0" && ignored == "^3.23.0"
        ));
    }

    #[test]
    fn test_identical_duplicates_merge_silently() {
        let mut report = GenerationReport::default();
        let features = vec![
            feature_with_packages("a", vec![package("zod", "^3.22.0", PackageKind::Runtime)]),
            feature_with_packages("b", vec![package("zod", "^3.22.0", PackageKind::Runtime)]),
        ];

        let text = merge_manifest(ManifestTarget::Server, Some(BASE), &features, &mut report)
            .unwrap()
            .unwrap();

        assert_eq!(text.matches(r#""zod""#).count(), 1);
        assert!(report.is_clean());
    }

    #[test]
    fn test_kinds_partition_into_sections() {
        let mut report = GenerationReport::default();
        let features = vec![feature_with_packages(
            "quality",
            vec![
                package("eslint", "^9.0.0", PackageKind::Dev),
                package("react", "^18.3.0", PackageKind::Peer),
            ],
        )];

        let text = merge_manifest(ManifestTarget::Server, Some(BASE), &features, &mut report)
            .unwrap()
            .unwrap();

        let dev = text.find("devDependencies").unwrap();
        let peer = text.find("peerDependencies").unwrap();
        assert!(text.find("\"dependencies\"").unwrap() < dev);
        assert!(dev < peer);
        assert!(text.contains(r#""eslint": "^9.0.0""#));
        assert!(text.contains(r#""react": "^18.3.0""#));
    }

    #[test]
    fn test_codegen_scripts_are_sorted_and_overwrite_base() {
        let mut report = GenerationReport::default();
        let base = r#"{ "name": "x", "scripts": { "codegen:billing": "echo stale" } }"#;
        let features = vec![
            feature_with_packages("billing", vec![]),
            feature_with_packages("auth", vec![]),
        ];

        let text = merge_manifest(ManifestTarget::Server, Some(base), &features, &mut report)
            .unwrap()
            .unwrap();

        let auth = text.find("codegen:auth").unwrap();
        let billing = text.find("codegen:billing").unwrap();
        assert!(auth < billing);
        assert!(text.contains("node tools/codegen/billing.mjs"));
        assert!(!text.contains("echo stale"));
    }

    #[test]
    fn test_missing_web_base_is_omitted() {
        let mut report = GenerationReport::default();
        let merged = merge_manifest(ManifestTarget::Web, None, &[], &mut report).unwrap();
        assert!(merged.is_none());
    }

    #[test]
    fn test_missing_server_base_synthesizes_skeleton() {
        let mut report = GenerationReport::default();
        let text = merge_manifest(ManifestTarget::Server, None, &[], &mut report)
            .unwrap()
            .unwrap();
        assert!(text.contains(r#""name": "backend""#));
        assert!(text.contains(r#""version": "0.1.0""#));
    }

    #[test]
    fn test_web_target_packages_stay_out_of_server_manifest() {
        let mut report = GenerationReport::default();
        let mut web_package = package("recharts", "^2.12.0", PackageKind::Runtime);
        web_package.target = ManifestTarget::Web;
        let features = vec![feature_with_packages("charts", vec![web_package])];

        let server = merge_manifest(ManifestTarget::Server, Some(BASE), &features, &mut report)
            .unwrap()
            .unwrap();
        assert!(!server.contains("recharts"));

        let web_base = r#"{ "name": "acme-web", "version": "1.0.0" }"#;
        let web = merge_manifest(ManifestTarget::Web, Some(web_base), &features, &mut report)
            .unwrap()
            .unwrap();
        assert!(web.contains(r#""recharts": "^2.12.0""#));
    }

    #[test]
    fn test_output_is_canonical_and_stable() {
        let mut report = GenerationReport::default();
        let features = vec![feature_with_packages(
            "api",
            vec![
                package("axios", "^1.7.0", PackageKind::Runtime),
                package("nestjs", "^10.0.0", PackageKind::Runtime),
            ],
        )];

        let first = merge_manifest(ManifestTarget::Server, Some(BASE), &features, &mut report)
            .unwrap()
            .unwrap();
        let second = merge_manifest(ManifestTarget::Server, Some(BASE), &features, &mut report)
            .unwrap()
            .unwrap();

        assert_eq!(first, second);
        assert!(!first.contains("description"));
        let axios = first.find(r#""axios""#).unwrap();
        let express = first.find(r#""express""#).unwrap();
        let nestjs = first.find(r#""nestjs""#).unwrap();
        assert!(axios < express && express < nestjs);
        assert!(first.ends_with('\n'));
    }
}
