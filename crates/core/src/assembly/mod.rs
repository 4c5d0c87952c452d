//! The assembly engine: order in, reproducible ZIP out.
//!
//! `generate` runs a strictly ordered pipeline: resolve the feature set,
//! copy the base project tree, apply per-feature file mappings, merge
//! schema fragments and dependency manifests, render the bundled text
//! artifacts, finalize the archive. Every iteration uses a total order
//! and every entry carries a fixed timestamp, so the same order against
//! the same catalog and filesystem produces byte-identical output.
//!
//! Back-pressure and cancellation both propagate through the caller's
//! sink: when the sink stops accepting bytes the engine stops issuing
//! filesystem reads and surfaces the sink error.

use std::fs;
use std::io::{self, Seek, Write};
use std::path::{Path, PathBuf};

use forgekit_types::{Feature, ManifestTarget, Order};
use tracing::{debug, info};

mod archive;
mod emit;
mod manifest;
mod paths;
mod report;
mod schema;

pub use archive::{ArchiveError, ArchiveWriter};
pub use manifest::{ManifestError, merge_manifest};
pub use paths::{PathError, PathResolver};
pub use report::{GenerationReport, GenerationWarning};
pub use schema::{MergedSchema, SchemaFragment, SchemaValidation, merge_schema, validate};

use crate::catalog::{CatalogError, CatalogReader};
use crate::resolver::{ResolveError, resolve_features};

/// Directory basenames never copied from the base tree.
const EXCLUDED_DIRS: &[&str] = &[".git", "node_modules", "dist", "build", ".preview"];

/// File basenames never copied from the base tree.
const EXCLUDED_FILES: &[&str] = &[".env", ".DS_Store", "Thumbs.db", "preview.config.json"];

/// Archive paths the engine generates itself; the base tree copy leaves
/// these slots free and their base versions feed the merges instead.
const GENERATED_PATHS: &[&str] = &[
    "backend/prisma/schema.prisma",
    "backend/package.json",
    "web/package.json",
    "backend/.env.example",
    "LICENSE.md",
    "README.md",
    "starter-config.json",
];

/// Error types for generation.
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    PathEscape(#[from] PathError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("Failed to read {0}: {1}")]
    ReadSource(PathBuf, io::Error),

    #[error(transparent)]
    Archive(#[from] ArchiveError),
}

/// One pre-validated file mapping, ready for I/O.
struct CopyStep {
    feature: String,
    logical_source: String,
    source: PathBuf,
    destination: String,
}

/// The deterministic order-to-archive pipeline.
pub struct AssemblyEngine<'a> {
    catalog: &'a dyn CatalogReader,
    paths: PathResolver,
}

impl<'a> AssemblyEngine<'a> {
    pub fn new(
        catalog: &'a dyn CatalogReader,
        project_root: impl Into<PathBuf>,
        core_base: impl Into<PathBuf>,
    ) -> Self {
        Self {
            catalog,
            paths: PathResolver::new(project_root, core_base),
        }
    }

    /// Stream the archive for `order` into `out` and return the warning
    /// side channel.
    pub fn generate<W: Write + Seek>(
        &self,
        order: &Order,
        out: W,
    ) -> Result<GenerationReport, GenerateError> {
        let mut report = GenerationReport::default();
        let generated_at = order.created_at;

        let tier = self.catalog.tier(&order.tier)?;
        let template = match &order.template {
            Some(slug) => self.catalog.template(slug)?,
            None => None,
        };
        let resolved = resolve_features(
            self.catalog,
            &order.selected_features,
            tier.as_ref(),
            template.as_ref(),
        )?;
        info!(
            "Resolved {} features for order {}",
            resolved.features.len(),
            order.order_number
        );

        let project_name = order.project_name();

        // Validate every mapping before any byte is written; a hostile
        // path aborts the generation with nothing emitted.
        let copy_steps = self.plan_feature_copies(&project_name, &resolved.features)?;
        let fragment_sources = self.plan_schema_fragments(&resolved.features)?;

        let mut writer = ArchiveWriter::new(out, generated_at);

        self.copy_base_tree(&mut writer, &project_name)?;

        for step in &copy_steps {
            self.apply_copy_step(&mut writer, step, &mut report)?;
        }

        // Fixed tail order: schema, manifests, env template, documents.
        let merged = self.merge_schema_fragments(&fragment_sources, &mut report)?;
        writer.add_bytes(
            &format!("{}/backend/prisma/schema.prisma", project_name),
            merged.text.as_bytes(),
        )?;

        let server_manifest = merge_manifest(
            ManifestTarget::Server,
            self.read_base_file("backend/package.json")?.as_deref(),
            &resolved.features,
            &mut report,
        )?;
        if let Some(text) = server_manifest {
            writer.add_bytes(
                &format!("{}/backend/package.json", project_name),
                text.as_bytes(),
            )?;
        }

        let web_manifest = merge_manifest(
            ManifestTarget::Web,
            self.read_base_file("web/package.json")?.as_deref(),
            &resolved.features,
            &mut report,
        )?;
        if let Some(text) = web_manifest {
            writer.add_bytes(&format!("{}/web/package.json", project_name), text.as_bytes())?;
        }

        writer.add_bytes(
            &format!("{}/backend/.env.example", project_name),
            emit::render_env_example(&resolved.features).as_bytes(),
        )?;

        let tier_name = tier
            .as_ref()
            .map(|t| t.name.clone())
            .unwrap_or_else(|| order.tier.clone());
        let template_name = template
            .as_ref()
            .map(|t| t.name.clone())
            .unwrap_or_else(|| "Starter".to_string());

        writer.add_bytes(
            &format!("{}/LICENSE.md", project_name),
            emit::render_license(order, &tier_name, generated_at).as_bytes(),
        )?;
        writer.add_bytes(
            &format!("{}/README.md", project_name),
            emit::render_readme(order, &template_name, &tier_name, &resolved.features, generated_at)
                .as_bytes(),
        )?;
        // starter-config.json lists features in canonical (category, slug)
        // order, matching the README, not the sorted slug index.
        let feature_slugs: Vec<String> =
            resolved.features.iter().map(|f| f.slug.clone()).collect();
        writer.add_bytes(
            &format!("{}/starter-config.json", project_name),
            emit::render_config(order, &feature_slugs, generated_at).as_bytes(),
        )?;

        writer.finish()?;
        info!(
            "Generated archive for order {} ({} warnings)",
            order.order_number,
            report.warnings.len()
        );
        Ok(report)
    }

    /// Resolve every file mapping up front, in canonical order.
    fn plan_feature_copies(
        &self,
        project_name: &str,
        features: &[Feature],
    ) -> Result<Vec<CopyStep>, GenerateError> {
        let mut steps = Vec::new();
        for feature in features {
            for mapping in &feature.file_mappings {
                let source = self.paths.resolve_source(&mapping.source)?;
                let destination = self
                    .paths
                    .resolve_destination(project_name, &mapping.destination)?;
                steps.push(CopyStep {
                    feature: feature.slug.clone(),
                    logical_source: mapping.source.clone(),
                    source,
                    destination,
                });
            }
        }
        Ok(steps)
    }

    /// Resolve every schema fragment path up front, in canonical order.
    fn plan_schema_fragments(
        &self,
        features: &[Feature],
    ) -> Result<Vec<(String, PathBuf)>, GenerateError> {
        let mut sources = Vec::new();
        for feature in features {
            for mapping in &feature.schema_mappings {
                let path = self.paths.resolve_source(&mapping.source)?;
                sources.push((feature.slug.clone(), path));
            }
        }
        Ok(sources)
    }

    /// Copy the base tree into the archive, applying the exclusion rules
    /// and leaving the generated slots free.
    fn copy_base_tree<W: Write + Seek>(
        &self,
        writer: &mut ArchiveWriter<W>,
        project_name: &str,
    ) -> Result<(), GenerateError> {
        self.copy_tree_recursive(
            writer,
            self.paths.core_base().to_path_buf(),
            String::new(),
            project_name,
        )
    }

    fn copy_tree_recursive<W: Write + Seek>(
        &self,
        writer: &mut ArchiveWriter<W>,
        dir: PathBuf,
        rel_prefix: String,
        project_name: &str,
    ) -> Result<(), GenerateError> {
        let entries =
            fs::read_dir(&dir).map_err(|e| GenerateError::ReadSource(dir.clone(), e))?;
        let mut names: Vec<(String, PathBuf, bool)> = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| GenerateError::ReadSource(dir.clone(), e))?;
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()).map(String::from) else {
                continue;
            };
            names.push((name, path.clone(), path.is_dir()));
        }
        // Lexicographic traversal keeps the archive reproducible.
        names.sort_by(|a, b| a.0.cmp(&b.0));

        for (name, path, is_dir) in names {
            if is_dir {
                if EXCLUDED_DIRS.contains(&name.as_str()) {
                    debug!("Excluding directory {}", path.display());
                    continue;
                }
                let child_prefix = if rel_prefix.is_empty() {
                    name
                } else {
                    format!("{}/{}", rel_prefix, name)
                };
                self.copy_tree_recursive(writer, path, child_prefix, project_name)?;
            } else {
                if is_excluded_file(&name) {
                    debug!("Excluding file {}", path.display());
                    continue;
                }
                let rel = if rel_prefix.is_empty() {
                    name
                } else {
                    format!("{}/{}", rel_prefix, name)
                };
                if GENERATED_PATHS.contains(&rel.as_str()) {
                    continue;
                }
                writer.add_file(&format!("{}/{}", project_name, rel), &path)?;
            }
        }
        Ok(())
    }

    /// Copy one validated mapping. A missing source degrades to a warning.
    fn apply_copy_step<W: Write + Seek>(
        &self,
        writer: &mut ArchiveWriter<W>,
        step: &CopyStep,
        report: &mut GenerationReport,
    ) -> Result<(), GenerateError> {
        if step.source.is_dir() {
            self.copy_mapped_dir(writer, &step.source, &step.destination)
        } else if step.source.is_file() {
            writer.add_file(&step.destination, &step.source)?;
            Ok(())
        } else {
            report.warn(GenerationWarning::MissingSource {
                feature: step.feature.clone(),
                source_path: step.logical_source.clone(),
            });
            Ok(())
        }
    }

    /// Recursive copy for directory mappings, in lexicographic order.
    fn copy_mapped_dir<W: Write + Seek>(
        &self,
        writer: &mut ArchiveWriter<W>,
        dir: &Path,
        dest_prefix: &str,
    ) -> Result<(), GenerateError> {
        let entries = fs::read_dir(dir).map_err(|e| GenerateError::ReadSource(dir.to_path_buf(), e))?;
        let mut names: Vec<(String, PathBuf, bool)> = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| GenerateError::ReadSource(dir.to_path_buf(), e))?;
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()).map(String::from) else {
                continue;
            };
            names.push((name, path.clone(), path.is_dir()));
        }
        names.sort_by(|a, b| a.0.cmp(&b.0));

        for (name, path, is_dir) in names {
            let dest = format!("{}/{}", dest_prefix, name);
            if is_dir {
                self.copy_mapped_dir(writer, &path, &dest)?;
            } else {
                writer.add_file(&dest, &path)?;
            }
        }
        Ok(())
    }

    /// Read the fragments that exist and report the ones that do not.
    fn merge_schema_fragments(
        &self,
        sources: &[(String, PathBuf)],
        report: &mut GenerationReport,
    ) -> Result<MergedSchema, GenerateError> {
        let mut fragments = Vec::new();
        for (feature, path) in sources {
            match fs::read_to_string(path) {
                Ok(text) => fragments.push(SchemaFragment {
                    feature: feature.clone(),
                    text,
                }),
                Err(_) => {
                    report.warn(GenerationWarning::MissingSource {
                        feature: feature.clone(),
                        source_path: path.display().to_string(),
                    });
                }
            }
        }

        let base = self.read_base_file("backend/prisma/schema.prisma")?;
        Ok(merge_schema(base.as_deref(), &fragments, report))
    }

    /// Read a file beneath the core base, `None` when absent.
    fn read_base_file(&self, rel: &str) -> Result<Option<String>, GenerateError> {
        let path = self.paths.core_base().join(rel);
        if !path.is_file() {
            return Ok(None);
        }
        fs::read_to_string(&path)
            .map(Some)
            .map_err(|e| GenerateError::ReadSource(path, e))
    }
}

fn is_excluded_file(name: &str) -> bool {
    EXCLUDED_FILES.contains(&name) || name.ends_with(".log")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StaticCatalog;
    use crate::catalog::test_fixtures::{template, tier};
    use chrono::{TimeZone, Utc};
    use forgekit_types::{
        Currency, EnvVar, FileMapping, LicenseStatus, OrderLicense, OrderTotals, SchemaMapping,
    };
    use std::collections::HashSet;
    use std::io::{Cursor, Read};

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn order(tier: &str, template: Option<&str>, selected: &[&str]) -> Order {
        Order {
            order_number: "FK-2025-0042".to_string(),
            tier: tier.to_string(),
            selected_features: selected.iter().map(|s| s.to_string()).collect(),
            template: template.map(String::from),
            customer_email: "dev@example.com".to_string(),
            customer_name: None,
            created_at: Utc.with_ymd_and_hms(2025, 3, 10, 8, 30, 0).unwrap(),
            totals: OrderTotals {
                subtotal: 1900,
                discount: 0,
                total: 1900,
                currency: Currency::Usd,
            },
            license: OrderLicense {
                key: "FK-AAAA-BBBB".to_string(),
                download_token: "tok".to_string(),
                expires_at: None,
                max_downloads: 5,
                download_count: 0,
                status: LicenseStatus::Active,
            },
        }
    }

    fn feature(slug: &str, category: &str) -> Feature {
        Feature {
            slug: slug.to_string(),
            name: slug.to_string(),
            description: String::new(),
            category: category.to_string(),
            price: 0,
            requires: vec![],
            file_mappings: vec![],
            schema_mappings: vec![],
            env_vars: vec![],
            npm_packages: vec![],
        }
    }

    /// A project root with a small core tree and one payments module.
    fn fixture_root() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();

        write(root, "core/backend/src/main.ts", "console.log('boot');\n");
        write(
            root,
            "core/backend/prisma/schema.prisma",
            "generator client {\n  provider = \"prisma-client-js\"\n}\n\n\
             datasource db {\n  provider = \"postgresql\"\n  url = env(\"DATABASE_URL\")\n}\n\n\
             model User {\n  id String @id\n}\n",
        );
        write(
            root,
            "core/backend/package.json",
            r#"{ "name": "backend", "version": "1.0.0", "dependencies": { "express": "^4.19.0" } }"#,
        );
        write(root, "core/.env", "SECRET=do-not-ship\n");
        write(root, "core/debug.log", "stale\n");
        write(root, "core/node_modules/left-pad/index.js", "x\n");
        write(
            root,
            "modules/payments/schema.prisma",
            "model Payment {\n  id String @id\n}\n",
        );
        write(root, "modules/payments/api/route.ts", "export {}\n");

        dir
    }

    fn engine_catalog() -> StaticCatalog {
        let mut payments = feature("payments", "billing");
        payments.file_mappings = vec![FileMapping {
            source: "modules/payments/api".to_string(),
            destination: "backend/src/payments".to_string(),
        }];
        payments.schema_mappings = vec![SchemaMapping {
            model: "Payment".to_string(),
            source: "modules/payments/schema.prisma".to_string(),
        }];
        payments.env_vars = vec![EnvVar {
            key: "STRIPE_SECRET_KEY".to_string(),
            description: "Stripe API key".to_string(),
            required: true,
            default: None,
        }];

        StaticCatalog::new(
            vec![feature("auth", "core"), payments],
            vec![
                tier("basic", 1900, &["auth"]),
                tier("pro", 4900, &["auth", "payments"]),
            ],
            vec![template("saas", &["payments"])],
            vec![],
            vec![],
        )
    }

    fn generate(
        order: &Order,
        root: &Path,
    ) -> Result<(Vec<u8>, GenerationReport), GenerateError> {
        let catalog = engine_catalog();
        let engine = AssemblyEngine::new(&catalog, root, root.join("core"));
        let mut sink = Cursor::new(Vec::new());
        let report = engine.generate(order, &mut sink)?;
        Ok((sink.into_inner(), report))
    }

    fn entry_names(bytes: &[u8]) -> Vec<String> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
        (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect()
    }

    fn entry_text(bytes: &[u8], name: &str) -> String {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
        let mut entry = archive.by_name(name).unwrap();
        let mut text = String::new();
        entry.read_to_string(&mut text).unwrap();
        text
    }

    #[test]
    fn test_archive_layout_and_project_name() {
        let root = fixture_root();
        let (bytes, report) = generate(&order("basic", None, &[]), root.path()).unwrap();
        assert!(report.is_clean());

        let names = entry_names(&bytes);
        assert!(names.iter().all(|n| n.starts_with("starter-basic/")));
        for expected in [
            "starter-basic/backend/src/main.ts",
            "starter-basic/backend/prisma/schema.prisma",
            "starter-basic/backend/package.json",
            "starter-basic/backend/.env.example",
            "starter-basic/LICENSE.md",
            "starter-basic/README.md",
            "starter-basic/starter-config.json",
        ] {
            assert!(names.contains(&expected.to_string()), "missing {expected}");
        }
    }

    #[test]
    fn test_exclusions_are_applied_to_base_tree() {
        let root = fixture_root();
        let (bytes, _) = generate(&order("basic", None, &[]), root.path()).unwrap();
        let names = entry_names(&bytes);

        assert!(!names.iter().any(|n| n.contains("node_modules")));
        assert!(!names.iter().any(|n| n.ends_with("/.env")));
        assert!(!names.iter().any(|n| n.ends_with(".log")));
    }

    #[test]
    fn test_feature_files_and_schema_are_merged() {
        let root = fixture_root();
        let (bytes, report) =
            generate(&order("basic", None, &["payments"]), root.path()).unwrap();
        assert!(report.is_clean());

        let names = entry_names(&bytes);
        assert!(names.contains(&"starter-basic/backend/src/payments/route.ts".to_string()));

        let schema = entry_text(&bytes, "starter-basic/backend/prisma/schema.prisma");
        assert!(schema.contains("model User {"));
        assert!(schema.contains("model Payment {"));

        let env = entry_text(&bytes, "starter-basic/backend/.env.example");
        assert!(env.contains("STRIPE_SECRET_KEY="));

        let manifest = entry_text(&bytes, "starter-basic/backend/package.json");
        assert!(manifest.contains("codegen:payments"));

        // Config features follow canonical (category, slug) order:
        // payments (billing) sorts ahead of auth (core).
        let config = entry_text(&bytes, "starter-basic/starter-config.json");
        let parsed: serde_json::Value = serde_json::from_str(&config).unwrap();
        assert_eq!(
            parsed["features"],
            serde_json::json!(["payments", "auth"])
        );
    }

    #[test]
    fn test_tier_only_order_has_no_payment_model() {
        let root = fixture_root();
        let (bytes, _) = generate(&order("basic", None, &[]), root.path()).unwrap();
        let schema = entry_text(&bytes, "starter-basic/backend/prisma/schema.prisma");
        assert!(schema.contains("model User {"));
        assert!(!schema.contains("model Payment"));
    }

    #[test]
    fn test_template_drives_project_name_and_features() {
        let root = fixture_root();
        let (bytes, _) = generate(&order("pro", Some("saas"), &[]), root.path()).unwrap();
        let names = entry_names(&bytes);
        assert!(names.iter().all(|n| n.starts_with("saas-pro/")));
        assert!(names.contains(&"saas-pro/backend/src/payments/route.ts".to_string()));
    }

    #[test]
    fn test_generation_is_byte_deterministic() {
        let root = fixture_root();
        let order = order("pro", Some("saas"), &["payments"]);
        let (first, _) = generate(&order, root.path()).unwrap();
        let (second, _) = generate(&order, root.path()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_entries_are_unique() {
        let root = fixture_root();
        let (bytes, _) = generate(&order("pro", Some("saas"), &[]), root.path()).unwrap();
        let names = entry_names(&bytes);
        let unique: HashSet<&String> = names.iter().collect();
        assert_eq!(unique.len(), names.len());
    }

    #[test]
    fn test_missing_mapping_source_degrades_to_warning() {
        let root = fixture_root();
        let catalog = {
            let mut ghost = feature("ghost", "misc");
            ghost.file_mappings = vec![FileMapping {
                source: "modules/ghost/api".to_string(),
                destination: "backend/src/ghost".to_string(),
            }];
            StaticCatalog::new(
                vec![ghost],
                vec![tier("basic", 1900, &[])],
                vec![],
                vec![],
                vec![],
            )
        };
        let engine = AssemblyEngine::new(&catalog, root.path(), root.path().join("core"));
        let mut sink = Cursor::new(Vec::new());
        let report = engine
            .generate(&order("basic", None, &["ghost"]), &mut sink)
            .unwrap();

        assert!(matches!(
            report.warnings.as_slice(),
            [GenerationWarning::MissingSource { feature, .. }] if feature == "ghost"
        ));
    }

    #[test]
    fn test_path_traversal_aborts_before_any_output() {
        let root = fixture_root();
        let catalog = {
            let mut hostile = feature("hostile", "misc");
            hostile.file_mappings = vec![FileMapping {
                source: "modules/../../etc/passwd".to_string(),
                destination: "x".to_string(),
            }];
            StaticCatalog::new(
                vec![hostile],
                vec![tier("basic", 1900, &[])],
                vec![],
                vec![],
                vec![],
            )
        };
        let engine = AssemblyEngine::new(&catalog, root.path(), root.path().join("core"));
        let mut sink = Cursor::new(Vec::new());
        let err = engine
            .generate(&order("basic", None, &["hostile"]), &mut sink)
            .unwrap_err();

        assert!(matches!(err, GenerateError::PathEscape(_)));
        assert!(sink.into_inner().is_empty());
    }

    #[test]
    fn test_duplicate_schema_fragment_warns() {
        let root = fixture_root();
        write(
            root.path(),
            "modules/profiles/schema.prisma",
            "model User {\n  id  String @id\n  bio String\n}\n",
        );
        let catalog = {
            let mut profiles = feature("profiles", "core");
            profiles.schema_mappings = vec![SchemaMapping {
                model: "User".to_string(),
                source: "modules/profiles/schema.prisma".to_string(),
            }];
            StaticCatalog::new(
                vec![profiles],
                vec![tier("basic", 1900, &[])],
                vec![],
                vec![],
                vec![],
            )
        };
        let engine = AssemblyEngine::new(&catalog, root.path(), root.path().join("core"));
        let mut sink = Cursor::new(Vec::new());
        let report = engine
            .generate(&order("basic", None, &["profiles"]), &mut sink)
            .unwrap();

        assert!(matches!(
            report.warnings.as_slice(),
            [GenerationWarning::SchemaDuplicate { name, .. }] if name == "User"
        ));
        let bytes = sink.into_inner();
        let schema = entry_text(&bytes, "starter-basic/backend/prisma/schema.prisma");
        assert!(!schema.contains("bio"));
    }
}
