//! The staged pipeline: discover, tokenize, parse, link, generate, flush.
//!
//! Each stage runs to completion over every source before the next one
//! starts; a stage that ends with diagnostics stops the run.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::codegen::{Artifact, CodeGenerator};
use crate::config::{Config, Manifest, slashed};
use crate::error::CoreError;
use crate::file_system::{FileSystem, OsFileSystem};
use crate::lexer::tokenize;
use crate::linker::Linker;
use crate::parser::parse;
use crate::symbol::Registry;
use crate::template::{BuiltinTemplates, Render};
use crate::token::SourceOrigin;

/// One `.epi` file taking part in a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    /// Relative to the input directory, forward slashes.
    pub rel_path: String,
    /// `<module dir name>/<path inside the module>`.
    pub module_path: String,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct CompileReport {
    pub sources: usize,
    pub written: Vec<PathBuf>,
}

/// Every non-ignored `.epi` file under the input directory, sorted.
pub fn dependencies(config: &Config) -> Result<Vec<PathBuf>, CoreError> {
    let ignored = config.ignore_matchers()?;
    let mut found = Vec::new();
    for entry in WalkDir::new(&config.dir_input) {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().is_none_or(|ext| ext != "epi") {
            continue;
        }
        let rel = relative(config, path);
        if ignored.iter().any(|pattern| pattern.matches(&rel)) {
            debug!(path = %rel, "ignored");
            continue;
        }
        found.push(path.to_path_buf());
    }
    found.sort();
    Ok(found)
}

/// The four artifacts of every dependency.
pub fn outputs(config: &Config) -> Result<Vec<PathBuf>, CoreError> {
    let order = [
        Artifact::Header,
        Artifact::Source,
        Artifact::HiddenHeader,
        Artifact::HiddenSource,
    ];
    let mut paths = Vec::new();
    for dependency in dependencies(config)? {
        let rel = relative(config, &dependency);
        let basename = rel.strip_suffix(".epi").unwrap_or(&rel);
        paths.extend(order.iter().map(|artifact| artifact.path(config, basename)));
    }
    Ok(paths)
}

/// Dependencies paired with their module paths, ordered by module path.
pub fn discover_sources(config: &Config, manifest: &Manifest) -> Result<Vec<SourceFile>, CoreError> {
    let mut sources = Vec::new();
    for path in dependencies(config)? {
        let module_path = manifest
            .module_path(&config.dir_input, &path)
            .ok_or_else(|| CoreError::UnownedSource(path.clone()))?;
        sources.push(SourceFile {
            rel_path: relative(config, &path),
            module_path,
            path,
        });
    }
    sources.sort_by(|a, b| a.module_path.cmp(&b.module_path));
    Ok(sources)
}

/// Parses every source and links the result.
pub fn build_registry(sources: &[SourceFile], fs: &dyn FileSystem) -> Result<Registry, CoreError> {
    let mut batches = Vec::with_capacity(sources.len());
    let mut diagnostics = Vec::new();
    for source in sources {
        let bytes = fs.read(&source.path).map_err(|err| CoreError::io(&source.path, err))?;
        let text = String::from_utf8(bytes).map_err(|_| CoreError::Encoding(source.path.clone()))?;

        let origin = Arc::new(SourceOrigin::new(&source.rel_path, &source.module_path));
        let tokens = tokenize(&text, Some(origin));
        for token in &tokens {
            debug!(kind = ?token.kind, text = %token.text, line = token.line, column = token.column, "token");
        }

        info!(module = %source.module_path, tokens = tokens.len(), "parsing");
        let (registry, errors) = parse(tokens);
        diagnostics.extend(errors);
        batches.push(registry);
    }
    if !diagnostics.is_empty() {
        return Err(CoreError::Diagnostics(diagnostics));
    }

    let mut linker = Linker::new();
    for batch in batches {
        linker.register(batch);
    }
    let diagnostics = linker.link();
    if !diagnostics.is_empty() {
        return Err(CoreError::Diagnostics(diagnostics));
    }
    Ok(linker.into_registry())
}

/// Generates and flushes the artifacts of a linked registry.
pub fn generate(
    config: &Config,
    registry: &Registry,
    fs: &mut dyn FileSystem,
    templates: &dyn Render,
) -> Result<Vec<PathBuf>, CoreError> {
    let mut generator = CodeGenerator::new(config, fs, templates)?;
    let diagnostics = generator.generate(registry)?;
    if !diagnostics.is_empty() {
        return Err(CoreError::Diagnostics(diagnostics));
    }
    generator.dump()
}

pub fn compile(config: &Config, manifest: &Manifest) -> Result<CompileReport, CoreError> {
    let mut fs = OsFileSystem;
    let sources = discover_sources(config, manifest)?;
    let registry = build_registry(&sources, &fs)?;
    let written = generate(config, &registry, &mut fs, &BuiltinTemplates)?;
    info!(sources = sources.len(), written = written.len(), "done");
    Ok(CompileReport {
        sources: sources.len(),
        written,
    })
}

fn relative(config: &Config, path: &Path) -> String {
    slashed(path.strip_prefix(&config.dir_input).unwrap_or(path))
}
