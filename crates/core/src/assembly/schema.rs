//! Schema merging for per-feature datamodel fragments.
//!
//! The schema language has four block kinds: `generator`, `datasource`,
//! `model` and `enum`. The merger only needs block boundaries and the
//! declared names, so it scans line by line with brace-depth counting
//! instead of parsing the full grammar. Generator and datasource blocks
//! come exclusively from the base schema; model and enum blocks are
//! deduplicated by declared name, first occurrence wins.

use super::report::{GenerationReport, GenerationWarning};

/// Header synthesized when the base schema file is missing.
const FALLBACK_HEADER: &str = r#"generator client {
  provider = "prisma-client-js"
}

datasource db {
  provider = "postgresql"
  url      = env("DATABASE_URL")
}
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    Generator,
    Datasource,
    Model,
    Enum,
}

impl BlockKind {
    fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "generator" => Some(BlockKind::Generator),
            "datasource" => Some(BlockKind::Datasource),
            "model" => Some(BlockKind::Model),
            "enum" => Some(BlockKind::Enum),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct SchemaBlock {
    kind: BlockKind,
    name: String,
    text: String,
}

/// A schema fragment contributed by one feature, already read from disk.
#[derive(Debug, Clone)]
pub struct SchemaFragment {
    /// Slug of the contributing feature, for warning attribution
    pub feature: String,
    pub text: String,
}

/// The consolidated schema plus the names it declares, in emission order.
#[derive(Debug, Clone)]
pub struct MergedSchema {
    pub text: String,
    pub models: Vec<String>,
    pub enums: Vec<String>,
}

/// Outcome of checking a merged schema against required model names.
#[derive(Debug, Clone)]
pub struct SchemaValidation {
    pub valid: bool,
    pub missing: Vec<String>,
}

/// Merge the base schema with feature fragments, first occurrence wins.
///
/// `fragments` must already be in canonical feature order; within one
/// feature, in `schemaMappings` order.
pub fn merge_schema(
    base: Option<&str>,
    fragments: &[SchemaFragment],
    report: &mut GenerationReport,
) -> MergedSchema {
    let mut out = String::new();
    let mut models: Vec<String> = Vec::new();
    let mut enums: Vec<String> = Vec::new();

    match base {
        Some(base) => {
            for block in parse_blocks(base) {
                match block.kind {
                    BlockKind::Generator | BlockKind::Datasource => push_block(&mut out, &block),
                    BlockKind::Model => {
                        if !models.contains(&block.name) {
                            models.push(block.name.clone());
                            push_block(&mut out, &block);
                        }
                    }
                    BlockKind::Enum => {
                        if !enums.contains(&block.name) {
                            enums.push(block.name.clone());
                            push_block(&mut out, &block);
                        }
                    }
                }
            }
        }
        None => {
            out.push_str(FALLBACK_HEADER);
        }
    }

    for fragment in fragments {
        for block in parse_blocks(&fragment.text) {
            let seen = match block.kind {
                // Generator and datasource only ever come from the base.
                BlockKind::Generator | BlockKind::Datasource => continue,
                BlockKind::Model => &mut models,
                BlockKind::Enum => &mut enums,
            };
            if seen.contains(&block.name) {
                report.warn(GenerationWarning::SchemaDuplicate {
                    name: block.name,
                    feature: fragment.feature.clone(),
                });
                continue;
            }
            seen.push(block.name.clone());
            push_block(&mut out, &block);
        }
    }

    MergedSchema {
        text: out,
        models,
        enums,
    }
}

/// Check that every required model name made it into the merge.
pub fn validate(merged: &MergedSchema, required: &[String]) -> SchemaValidation {
    let missing: Vec<String> = required
        .iter()
        .filter(|name| !merged.models.contains(name))
        .cloned()
        .collect();

    SchemaValidation {
        valid: missing.is_empty(),
        missing,
    }
}

fn push_block(out: &mut String, block: &SchemaBlock) {
    if !out.is_empty() {
        out.push('\n');
    }
    out.push_str(&block.text);
}

/// Scan `source` into blocks. Lines outside any recognized block are
/// dropped; block boundaries are the outermost matched braces.
fn parse_blocks(source: &str) -> Vec<SchemaBlock> {
    let mut blocks = Vec::new();
    let mut current: Option<(BlockKind, String, String, i32)> = None;

    for line in source.lines() {
        let mut block_closed = false;
        match current.as_mut() {
            None => {
                if let Some((kind, name)) = block_opener(line) {
                    let depth = brace_delta(line);
                    if depth <= 0 {
                        // Single-line block such as `model Empty {}`
                        blocks.push(SchemaBlock {
                            kind,
                            name,
                            text: format!("{}\n", line),
                        });
                    } else {
                        current = Some((kind, name, format!("{}\n", line), depth));
                    }
                }
            }
            Some((_, _, text, depth)) => {
                text.push_str(line);
                text.push('\n');
                *depth += brace_delta(line);
                block_closed = *depth <= 0;
            }
        }
        if block_closed {
            if let Some((kind, name, text, _)) = current.take() {
                blocks.push(SchemaBlock { kind, name, text });
            }
        }
    }

    blocks
}

/// Recognize `^(generator|datasource|model|enum) <Ident> {` openers.
fn block_opener(line: &str) -> Option<(BlockKind, String)> {
    let trimmed = line.trim_start();
    let mut tokens = trimmed.split_whitespace();
    let kind = BlockKind::from_keyword(tokens.next()?)?;
    let name_token = tokens.next()?;
    let name = name_token.trim_end_matches('{');
    if name.is_empty() || !line.contains('{') {
        return None;
    }
    Some((kind, name.to_string()))
}

fn brace_delta(line: &str) -> i32 {
    let mut delta = 0;
    for ch in line.chars() {
        match ch {
            '{' => delta += 1,
            '}' => delta -= 1,
            _ => {}
        }
    }
    delta
}
