//! Incremental generation of the C++ artifacts.
//!
//! Every source `<rel>.epi` owns four artifacts. The build pair (`.hxx`,
//! `.cxx`) is regenerated from scratch; the public pair (`.h`, `.cpp`) is
//! user-editable, so only the generated regions between anchors are
//! rewritten. An artifact is regenerated when it is dirty: missing,
//! untracked, or its digest or its source's digest differs from the cache.
//!
//! Nothing reaches disk before [`CodeGenerator::dump`].

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use tracing::{debug, info};

use crate::cache::{Cache, digest};
use crate::config::Config;
use crate::diagnostic::{CodeGenErrorCode, Diagnostic};
use crate::emitter::{self, INCLUDE_REGION, NAMESPACE_END};
use crate::error::CoreError;
use crate::file_system::FileSystem;
use crate::symbol::{Registry, Symbol};
use crate::template::Render;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Artifact {
    /// `.h`, user-editable.
    Header,
    /// `.cpp`, user-editable.
    Source,
    /// `.hxx`, generator-owned.
    HiddenHeader,
    /// `.cxx`, generator-owned.
    HiddenSource,
}

impl Artifact {
    /// Generation order within one source.
    pub const ALL: [Artifact; 4] = [
        Artifact::HiddenHeader,
        Artifact::HiddenSource,
        Artifact::Source,
        Artifact::Header,
    ];

    pub fn extension(self) -> &'static str {
        match self {
            Artifact::Header => "h",
            Artifact::Source => "cpp",
            Artifact::HiddenHeader => "hxx",
            Artifact::HiddenSource => "cxx",
        }
    }

    pub fn is_build(self) -> bool {
        matches!(self, Artifact::HiddenHeader | Artifact::HiddenSource)
    }

    /// Where the artifact of the source `<basename>.epi` lives.
    pub fn path(self, config: &Config, basename: &str) -> PathBuf {
        let dir = if self.is_build() {
            &config.dir_output_build
        } else {
            &config.dir_output
        };
        dir.join(format!("{basename}.{}", self.extension()))
    }
}

/// Where injected text goes.
#[derive(Debug, Clone, Copy)]
pub enum Placement<'s> {
    Append,
    Before(&'s str),
    Between(&'s str, &'s str),
}

/// Inserts `injection` into `content`. Errors carry a tip naming the
/// missing, duplicated or misordered anchor.
///
/// An anchor only counts when it is alone on its line, so generated text
/// that merely mentions one (a string default, say) is left alone.
pub fn inject(content: &str, injection: &str, placement: Placement<'_>) -> Result<String, String> {
    let (start, end) = match placement {
        Placement::Append => (content.len(), content.len()),
        Placement::Before(anchor) => match find_unique(content, anchor)? {
            Some(at) => (at, at),
            None => return Err(format!("Can't find `{anchor}` anchor")),
        },
        Placement::Between(begin, end) => {
            match (find_unique(content, begin)?, find_unique(content, end)?) {
                (Some(open), Some(close)) if open + begin.len() <= close => (open + begin.len(), close),
                (Some(_), Some(_)) => return Err(format!("`{end}` precedes `{begin}`")),
                (Some(_), None) => {
                    return Err(format!(
                        "`{end}` is absent while corresponding anchor `{begin}` is present"
                    ));
                }
                (None, Some(_)) => {
                    return Err(format!(
                        "`{begin}` is absent while corresponding anchor `{end}` is present"
                    ));
                }
                (None, None) => return Err(format!("Can't find `{begin}` anchor")),
            }
        }
    };
    Ok(format!("{}{injection}{}", &content[..start], &content[end..]))
}

/// Whether `anchor` occurs on a line of its own.
pub fn has_anchor(content: &str, anchor: &str) -> bool {
    anchor_positions(content, anchor).next().is_some()
}

fn find_unique(content: &str, anchor: &str) -> Result<Option<usize>, String> {
    let mut found = anchor_positions(content, anchor);
    let first = found.next();
    if found.next().is_some() {
        return Err(format!("`{anchor}` anchor occurs more than once"));
    }
    Ok(first)
}

/// Byte offsets of the lines consisting of `anchor`, surrounding blanks aside.
fn anchor_positions<'c>(content: &'c str, anchor: &'c str) -> impl Iterator<Item = usize> + 'c {
    let mut offset = 0;
    content.split_inclusive('\n').filter_map(move |line| {
        let start = offset;
        offset += line.len();
        let indent = line.len() - line.trim_start().len();
        (line.trim() == anchor).then_some(start + indent)
    })
}

/// Symbols declared by one source file.
struct Unit<'r> {
    /// Path of the source relative to the input directory, without extension.
    basename: String,
    /// Module path of the source, without extension.
    module_basename: String,
    symbols: Vec<&'r Symbol>,
}

/// Why an artifact could not be produced.
enum Failure {
    /// Tip describing a corrupted anchor.
    Anchor(String),
    Fatal(CoreError),
}

impl From<CoreError> for Failure {
    fn from(err: CoreError) -> Self {
        Failure::Fatal(err)
    }
}

impl From<String> for Failure {
    fn from(tip: String) -> Self {
        Failure::Anchor(tip)
    }
}

/// A file as found on disk when first inspected.
struct Snapshot {
    bytes: Vec<u8>,
    digest: String,
}

pub struct CodeGenerator<'a> {
    config: &'a Config,
    fs: &'a mut dyn FileSystem,
    templates: &'a dyn Render,
    loaded: Cache,
    cache: Cache,
    /// Disk state of every path inspected during this run; `None` if missing.
    disk: IndexMap<PathBuf, Option<Snapshot>>,
    /// Content of every public file read or artifact produced during this run.
    buffers: IndexMap<PathBuf, String>,
    /// Sources and artifacts of the current registry.
    live: BTreeSet<PathBuf>,
}

impl<'a> CodeGenerator<'a> {
    pub fn new(
        config: &'a Config,
        fs: &'a mut dyn FileSystem,
        templates: &'a dyn Render,
    ) -> Result<Self, CoreError> {
        let loaded = if config.caching_enabled {
            Cache::load(&*fs, &config.cache_path())?
        } else {
            Cache::new()
        };
        Ok(Self {
            config,
            fs,
            templates,
            cache: loaded.clone(),
            loaded,
            disk: IndexMap::new(),
            buffers: IndexMap::new(),
            live: BTreeSet::new(),
        })
    }

    /// Produces every dirty artifact of the symbols in `registry`.
    ///
    /// Anchor problems are returned as diagnostics; the affected source's
    /// remaining artifacts are skipped.
    pub fn generate(&mut self, registry: &Registry) -> Result<Vec<Diagnostic>, CoreError> {
        let mut diagnostics = Vec::new();
        for unit in units(registry) {
            let source = self.config.dir_input.join(format!("{}.epi", unit.basename));
            self.live.insert(source.clone());

            let reserved: Vec<Diagnostic> = unit
                .symbols
                .iter()
                .filter(|symbol| symbol.name() == INCLUDE_REGION)
                .map(|symbol| Diagnostic {
                    token: Some(symbol.token().clone()),
                    ..Diagnostic::codegen(
                        CodeGenErrorCode::ReservedName,
                        format!("{}.h", unit.basename),
                        format!("`{INCLUDE_REGION}` names the generated include region, rename the symbol"),
                    )
                })
                .collect();
            if !reserved.is_empty() {
                diagnostics.extend(reserved);
                continue;
            }

            for artifact in Artifact::ALL {
                let path = artifact.path(self.config, &unit.basename);
                self.live.insert(path.clone());
                if !self.is_dirty(&path, &source)? {
                    debug!(path = %path.display(), "up to date");
                    continue;
                }
                info!(path = %path.display(), "generating");
                match self.generate_artifact(artifact, &path, &unit) {
                    Ok(()) => {}
                    Err(Failure::Fatal(err)) => return Err(err),
                    Err(Failure::Anchor(tip)) => {
                        let subject = format!("{}.{}", unit.basename, artifact.extension());
                        diagnostics.push(Diagnostic::codegen(
                            CodeGenErrorCode::CorruptedAnchor,
                            subject,
                            tip,
                        ));
                        break;
                    }
                }
            }
            let current = self.inspect(&source)?.map(|snapshot| snapshot.digest.clone());
            if let (true, Some(current)) = (self.config.caching_enabled, current) {
                self.cache.insert(&source, current);
            }
        }
        Ok(diagnostics)
    }

    /// Writes every changed buffer, then the cache if it changed.
    /// Returns the written artifact paths.
    ///
    /// Cache entries of paths outside the generated registry are dropped.
    pub fn dump(self) -> Result<Vec<PathBuf>, CoreError> {
        let CodeGenerator {
            config,
            fs,
            loaded,
            mut cache,
            disk,
            buffers,
            live,
            ..
        } = self;

        let mut written = Vec::new();
        for (path, content) in buffers {
            let unchanged = disk
                .get(&path)
                .and_then(Option::as_ref)
                .is_some_and(|snapshot| snapshot.bytes == content.as_bytes());
            if !unchanged {
                if let Some(parent) = path.parent() {
                    fs.make_dirs(parent).map_err(|err| CoreError::io(parent, err))?;
                }
                fs.write(&path, content.as_bytes())
                    .map_err(|err| CoreError::io(&path, err))?;
                info!(path = %path.display(), "written");
                written.push(path.clone());
            }
            if config.caching_enabled {
                cache.insert(&path, digest(content.as_bytes()));
            }
        }

        if config.caching_enabled {
            let removed = cache.retain(|path| live.contains(path));
            if removed > 0 {
                debug!(removed, "stale cache entries dropped");
            }
        }

        if config.caching_enabled && cache != loaded {
            let cache_path = config.cache_path();
            fs.make_dirs(&config.dir_output_build)
                .map_err(|err| CoreError::io(&config.dir_output_build, err))?;
            fs.write(&cache_path, &cache.encode()?)
                .map_err(|err| CoreError::io(&cache_path, err))?;
            debug!(entries = cache.len(), "cache updated");
        }
        Ok(written)
    }

    /// Reads `path` once per run.
    fn inspect(&mut self, path: &Path) -> Result<Option<&Snapshot>, CoreError> {
        if !self.disk.contains_key(path) {
            let snapshot = if self.fs.exists(path) {
                let bytes = self.fs.read(path).map_err(|err| CoreError::io(path, err))?;
                let digest = digest(&bytes);
                Some(Snapshot { bytes, digest })
            } else {
                None
            };
            self.disk.insert(path.to_path_buf(), snapshot);
        }
        Ok(self.disk.get(path).and_then(Option::as_ref))
    }

    fn is_dirty(&mut self, path: &Path, source: &Path) -> Result<bool, CoreError> {
        for tracked in [path, source] {
            let Some(current) = self.inspect(tracked)?.map(|snapshot| snapshot.digest.clone()) else {
                return Ok(true);
            };
            if self.cache.get(tracked) != Some(current.as_str()) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn generate_artifact(&mut self, artifact: Artifact, path: &Path, unit: &Unit<'_>) -> Result<(), Failure> {
        let templates = self.templates;
        let classes = unit.symbols.iter().filter_map(|symbol| symbol.as_class());
        match artifact {
            Artifact::HiddenHeader => {
                let mut content = emitter::skeleton(artifact, &unit.module_basename, templates)?;
                for class in classes {
                    let hidden = emitter::class_hidden(class, templates)?;
                    content = inject(&content, &format!("\n{hidden}"), Placement::Append)?;
                }
                self.store(path, content);
            }
            Artifact::HiddenSource => {
                let mut content = emitter::skeleton(artifact, &unit.module_basename, templates)?;
                for class in classes {
                    for block in [
                        emitter::class_serialization(class, templates)?,
                        emitter::class_meta(class, templates)?,
                    ] {
                        content = inject(&content, &format!("{block}\n"), Placement::Before(NAMESPACE_END))?;
                    }
                }
                self.store(path, content);
            }
            Artifact::Source => {
                let content = self.load_or_create(artifact, path, unit)?;
                let content = refresh_includes(&content, artifact, &unit.module_basename)?;
                self.store(path, content);
            }
            Artifact::Header => {
                let content = self.load_or_create(artifact, path, unit)?;
                let mut content = refresh_includes(&content, artifact, &unit.module_basename)?;
                for symbol in &unit.symbols {
                    let begin = emitter::region_begin(symbol.name());
                    let end = emitter::region_end(symbol.name());
                    content = if has_anchor(&content, &begin) || has_anchor(&content, &end) {
                        let span = emitter::region_span(&emitter::symbol_region(symbol, templates)?);
                        inject(&content, &span, Placement::Between(&begin, &end))?
                    } else {
                        let skeleton = emitter::symbol_skeleton(symbol, templates)?;
                        inject(&content, &format!("{skeleton}\n"), Placement::Before(NAMESPACE_END))?
                    };
                }
                self.store(path, content);
            }
        }
        Ok(())
    }

    /// Current content of a public artifact, or a fresh skeleton.
    fn load_or_create(&mut self, artifact: Artifact, path: &Path, unit: &Unit<'_>) -> Result<String, CoreError> {
        if let Some(content) = self.buffers.get(path) {
            return Ok(content.clone());
        }
        let templates = self.templates;
        let content = match self.inspect(path)? {
            Some(snapshot) => String::from_utf8(snapshot.bytes.clone())
                .map_err(|_| CoreError::Encoding(path.to_path_buf()))?,
            None => emitter::skeleton(artifact, &unit.module_basename, templates)?,
        };
        self.store(path, content.clone());
        Ok(content)
    }

    fn store(&mut self, path: &Path, content: String) {
        self.buffers.insert(path.to_path_buf(), content);
    }
}

/// Rewrites the `include` region of a public artifact, when it has one.
fn refresh_includes(content: &str, artifact: Artifact, module_basename: &str) -> Result<String, String> {
    let begin = emitter::region_begin(INCLUDE_REGION);
    let end = emitter::region_end(INCLUDE_REGION);
    if !has_anchor(content, &begin) && !has_anchor(content, &end) {
        return Ok(content.to_string());
    }
    let span = emitter::region_span(&emitter::include_lines(artifact, module_basename));
    inject(content, &span, Placement::Between(&begin, &end))
}

/// Groups symbols by their source file, in registry order.
fn units(registry: &Registry) -> Vec<Unit<'_>> {
    let mut units: IndexMap<String, Unit<'_>> = IndexMap::new();
    for symbol in registry.values() {
        let Some(origin) = symbol.token().origin.as_deref() else {
            debug!(symbol = symbol.name(), "no source file, skipping");
            continue;
        };
        let unit = units.entry(origin.rel_path.clone()).or_insert_with(|| Unit {
            basename: strip_epi(&origin.rel_path),
            module_basename: strip_epi(&origin.module_path),
            symbols: Vec::new(),
        });
        unit.symbols.push(symbol);
    }
    units.into_values().collect()
}

fn strip_epi(path: &str) -> String {
    path.strip_suffix(".epi").unwrap_or(path).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_system::MemoryFileSystem;
    use crate::lexer::tokenize;
    use crate::linker::Linker;
    use crate::parser::parse;
    use crate::template::BuiltinTemplates;
    use crate::token::SourceOrigin;
    use crate::diagnostic::DiagnosticKind;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    const INPUT: &str = "/project/src";

    fn config() -> Config {
        Config::new(INPUT).with_output("/project/out")
    }

    fn linked(fs: &MemoryFileSystem, sources: &[&str]) -> Registry {
        linked_in(fs, sources, "src")
    }

    /// Links `sources` as if the input directory were the module `module`.
    fn linked_in(fs: &MemoryFileSystem, sources: &[&str], module: &str) -> Registry {
        let mut linker = Linker::new();
        for rel in sources {
            let path = Path::new(INPUT).join(rel);
            let text = fs.contents(&path).expect("source");
            let origin = Arc::new(SourceOrigin::new(*rel, format!("{module}/{rel}")));
            let (registry, diagnostics) = parse(tokenize(text, Some(origin)));
            assert!(diagnostics.is_empty(), "{diagnostics:?}");
            assert!(linker.register(registry));
        }
        let diagnostics = linker.link();
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        linker.into_registry()
    }

    fn run(fs: &mut MemoryFileSystem, config: &Config, sources: &[&str]) -> (Vec<Diagnostic>, Vec<PathBuf>) {
        let registry = linked(fs, sources);
        emit(fs, config, &registry)
    }

    fn emit(fs: &mut dyn FileSystem, config: &Config, registry: &Registry) -> (Vec<Diagnostic>, Vec<PathBuf>) {
        let mut generator = CodeGenerator::new(config, fs, &BuiltinTemplates).expect("generator");
        let diagnostics = generator.generate(registry).expect("generate");
        if !diagnostics.is_empty() {
            return (diagnostics, Vec::new());
        }
        let written = generator.dump().expect("dump");
        (diagnostics, written)
    }

    /// Counts reads per path.
    struct CountingFileSystem {
        inner: MemoryFileSystem,
        reads: RefCell<BTreeMap<PathBuf, usize>>,
    }

    impl FileSystem for CountingFileSystem {
        fn read(&self, path: &Path) -> std::io::Result<Vec<u8>> {
            *self.reads.borrow_mut().entry(path.to_path_buf()).or_default() += 1;
            self.inner.read(path)
        }

        fn write(&mut self, path: &Path, contents: &[u8]) -> std::io::Result<()> {
            self.inner.write(path, contents)
        }

        fn exists(&self, path: &Path) -> bool {
            self.inner.exists(path)
        }

        fn make_dirs(&mut self, path: &Path) -> std::io::Result<()> {
            self.inner.make_dirs(path)
        }
    }

    fn seeded(source: &str) -> MemoryFileSystem {
        let mut fs = MemoryFileSystem::new();
        fs.insert(Path::new(INPUT).join("core/A.epi"), source);
        fs
    }

    fn header(fs: &MemoryFileSystem) -> String {
        fs.contents(Path::new("/project/out/core/A.h"))
            .expect("header")
            .to_string()
    }

    #[test]
    fn injects_between_anchors() {
        let content = "a\nBEGIN\nold\nEND\nb\n";
        assert_eq!(
            inject(content, "\nnew\n", Placement::Between("BEGIN", "END")),
            Ok("a\nBEGIN\nnew\nEND\nb\n".to_string())
        );
        assert_eq!(
            inject(content, "x\n", Placement::Before("END")),
            Ok("a\nBEGIN\nold\nx\nEND\nb\n".to_string())
        );
        assert_eq!(
            inject(content, "!", Placement::Append),
            Ok("a\nBEGIN\nold\nEND\nb\n!".to_string())
        );
    }

    #[test]
    fn anchors_must_fill_their_line() {
        let content = "x = \"END\";\n    BEGIN\nEND\n";
        assert_eq!(
            inject(content, "\ny\n", Placement::Between("BEGIN", "END")),
            Ok("x = \"END\";\n    BEGIN\ny\nEND\n".to_string())
        );
        assert!(has_anchor(content, "BEGIN"));
        assert!(!has_anchor("call(BEGIN);\n", "BEGIN"));
    }

    #[test]
    fn rejects_broken_anchor_pairs() {
        let between = Placement::Between("BEGIN", "END");
        assert!(inject("BEGIN\nonly\n", "", between).is_err());
        assert!(inject("END\nonly\n", "", between).is_err());
        assert!(inject("END\nBEGIN\n", "", between).is_err());
        assert!(inject("BEGIN\nEND\nEND\n", "", between).is_err());
        assert!(inject("BEGIN inline\nEND\n", "", between).is_err());
        assert!(inject("nothing\n", "", Placement::Before("END")).is_err());
    }

    #[test]
    fn first_run_creates_all_artifacts() {
        let config = config();
        let mut fs = seeded("class A { epiS32 Value = 3; };");
        let (diagnostics, written) = run(&mut fs, &config, &["core/A.epi"]);
        assert!(diagnostics.is_empty());
        assert_eq!(
            written,
            vec![
                PathBuf::from("/project/out/core/A.hxx"),
                PathBuf::from("/project/out/core/A.cxx"),
                PathBuf::from("/project/out/core/A.cpp"),
                PathBuf::from("/project/out/core/A.h"),
            ]
        );
        assert!(fs.exists(&config.cache_path()));

        let h = header(&fs);
        assert!(h.starts_with("#pragma once\n\nGENREGION_BEGIN(include)\n#include \"src/core/A.hxx\"\nGENREGION_END(include)\n"));
        assert!(h.contains("class A : public Object\n{\nGENREGION_BEGIN(A)\n"));
        assert!(h.contains("    epiS32 m_Value{3};\n\nGENREGION_END(A)\n};\n\nNAMESPACE_END()\n"));

        let cxx = fs.contents(Path::new("/project/out/core/A.cxx")).expect("cxx");
        assert!(cxx.contains("NAMESPACE_BEGIN()\n\nvoid A::Serialization(json_t& json)\n"));
        assert!(cxx.ends_with("sizeof(A), \"A\");\n}\n\nNAMESPACE_END()\n"));
    }

    #[test]
    fn second_run_writes_nothing() {
        let config = config();
        let mut fs = seeded("class A { epiS32 Value; }; enum E { X };");
        run(&mut fs, &config, &["core/A.epi"]);
        fs.clear_writes();

        let (diagnostics, written) = run(&mut fs, &config, &["core/A.epi"]);
        assert!(diagnostics.is_empty());
        assert!(written.is_empty());
        assert!(fs.writes().is_empty());
    }

    #[test]
    fn source_changes_preserve_hand_written_code() {
        let config = config();
        let mut fs = seeded("class A { epiS32 Value; };");
        run(&mut fs, &config, &["core/A.epi"]);

        let path = PathBuf::from("/project/out/core/A.h");
        let edited = header(&fs).replace(
            "GENREGION_END(A)\n};",
            "GENREGION_END(A)\n    void Custom();\n};",
        );
        fs.insert(path.clone(), edited);
        fs.insert(Path::new(INPUT).join("core/A.epi"), "class A { epiS32 Value; epiFloat Ratio; };");

        let (diagnostics, _) = run(&mut fs, &config, &["core/A.epi"]);
        assert!(diagnostics.is_empty());
        let h = header(&fs);
        assert!(h.contains("    epiFloat m_Ratio{0.0f};"));
        assert!(h.contains("GENREGION_END(A)\n    void Custom();\n};"));
        assert_eq!(h.matches("class A : public Object").count(), 1);
    }

    #[test]
    fn new_symbols_are_appended_to_existing_headers() {
        let config = config();
        let mut fs = seeded("class A {};");
        run(&mut fs, &config, &["core/A.epi"]);

        fs.insert(Path::new(INPUT).join("core/A.epi"), "class A {}; enum Mode { On };");
        run(&mut fs, &config, &["core/A.epi"]);

        let h = header(&fs);
        let class_at = h.find("class A :").expect("class");
        let enum_at = h.find("enum Mode\n{\nGENREGION_BEGIN(Mode)\n    On,\nGENREGION_END(Mode)\n};\n\nNAMESPACE_END()").expect("enum");
        assert!(class_at < enum_at);
    }

    #[test]
    fn missing_end_anchor_is_reported() {
        let config = config();
        let mut fs = seeded("class A {};");
        run(&mut fs, &config, &["core/A.epi"]);

        let path = PathBuf::from("/project/out/core/A.h");
        fs.insert(path, header(&fs).replace("GENREGION_END(A)\n", ""));
        fs.clear_writes();

        let (diagnostics, _) = run(&mut fs, &config, &["core/A.epi"]);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].subject.as_deref(), Some("core/A.h"));
        assert!(diagnostics[0].tip.contains("`GENREGION_END(A)` is absent"));
        assert!(fs.writes().is_empty());
    }

    #[test]
    fn missing_begin_anchor_is_reported() {
        let config = config();
        let mut fs = seeded("class A {};");
        run(&mut fs, &config, &["core/A.epi"]);

        let path = PathBuf::from("/project/out/core/A.h");
        fs.insert(path, header(&fs).replace("GENREGION_BEGIN(A)\n", ""));

        let (diagnostics, _) = run(&mut fs, &config, &["core/A.epi"]);
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].tip.contains("`GENREGION_BEGIN(A)` is absent"));
    }

    #[test]
    fn disabled_cache_regenerates_without_rewriting() {
        let config = config().with_caching(false);
        let mut fs = seeded("class A {};");
        run(&mut fs, &config, &["core/A.epi"]);
        assert!(!fs.exists(&config.cache_path()));
        fs.clear_writes();

        let (_, written) = run(&mut fs, &config, &["core/A.epi"]);
        assert!(written.is_empty());
        assert!(fs.writes().is_empty());
    }

    #[test]
    fn build_artifacts_are_regenerated_when_deleted() {
        let config = config();
        let mut fs = seeded("class A {};");
        run(&mut fs, &config, &["core/A.epi"]);
        fs.remove(Path::new("/project/out/core/A.hxx"));
        fs.clear_writes();

        let (_, written) = run(&mut fs, &config, &["core/A.epi"]);
        assert_eq!(written, vec![PathBuf::from("/project/out/core/A.hxx")]);
    }

    #[test]
    fn anchor_text_inside_defaults_is_ignored() {
        let config = config();
        let mut fs = seeded(r#"class A { epiString Tag = "NAMESPACE_END()"; }; class B {};"#);
        let (diagnostics, _) = run(&mut fs, &config, &["core/A.epi"]);
        assert!(diagnostics.is_empty(), "{diagnostics:?}");

        fs.insert(
            Path::new(INPUT).join("core/A.epi"),
            r#"class A { epiString Tag = "GENREGION_END(A)"; }; class B { epiS32 X; };"#,
        );
        let (diagnostics, _) = run(&mut fs, &config, &["core/A.epi"]);
        assert!(diagnostics.is_empty(), "{diagnostics:?}");

        let h = header(&fs);
        assert!(h.contains("    epiString m_Tag{\"GENREGION_END(A)\"};"));
        assert!(!h.contains("m_Tag{\"NAMESPACE_END()\"}"));
        assert!(h.contains("class B : public Object"));
        assert!(h.contains("    epiS32 m_X{0};"));
    }

    #[test]
    fn symbols_named_like_the_include_region_are_rejected() {
        let config = config();
        let mut fs = seeded("class include { epiS32 X; };");
        let (diagnostics, _) = run(&mut fs, &config, &["core/A.epi"]);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::CodeGen(CodeGenErrorCode::ReservedName));
        assert_eq!(diagnostics[0].token.as_ref().map(|token| token.text.as_str()), Some("include"));
        assert!(fs.writes().is_empty());
    }

    #[test]
    fn source_include_region_follows_the_module_path() {
        let config = config();
        let mut fs = seeded("class A {};");
        run(&mut fs, &config, &["core/A.epi"]);

        let cpp_path = PathBuf::from("/project/out/core/A.cpp");
        let cpp = fs.contents(&cpp_path).expect("cpp").to_string();
        assert!(cpp.starts_with("GENREGION_BEGIN(include)\n#include \"src/core/A.h\"\nGENREGION_END(include)\n"));

        fs.insert(cpp_path.clone(), cpp.replace("NAMESPACE_END()", "void Custom() {}\n\nNAMESPACE_END()"));
        fs.insert(Path::new(INPUT).join("core/A.epi"), "class A { epiS32 X; };");
        let registry = linked_in(&fs, &["core/A.epi"], "engine");
        let (diagnostics, _) = emit(&mut fs, &config, &registry);
        assert!(diagnostics.is_empty(), "{diagnostics:?}");

        let cpp = fs.contents(&cpp_path).expect("cpp");
        assert!(cpp.starts_with("GENREGION_BEGIN(include)\n#include \"engine/core/A.h\"\nGENREGION_END(include)\n"));
        assert!(!cpp.contains("src/core/A.h"));
        assert!(cpp.contains("void Custom() {}\n\nNAMESPACE_END()"));
        assert!(header(&fs).contains("#include \"engine/core/A.hxx\""));
    }

    #[test]
    fn each_path_is_read_at_most_once() {
        let config = config();
        let mut fs = seeded("class A { epiS32 X; }; enum E { On };");
        run(&mut fs, &config, &["core/A.epi"]);
        fs.insert(Path::new(INPUT).join("core/A.epi"), "class A { epiS32 X; epiS32 Y; }; enum E { On };");

        let registry = linked(&fs, &["core/A.epi"]);
        let mut counting = CountingFileSystem {
            inner: fs,
            reads: RefCell::new(BTreeMap::new()),
        };
        let (diagnostics, written) = emit(&mut counting, &config, &registry);
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        assert!(!written.is_empty());

        let reads = counting.reads.borrow();
        assert!(reads.contains_key(&Path::new(INPUT).join("core/A.epi")));
        for (path, count) in reads.iter() {
            assert_eq!(*count, 1, "{} read {count} times", path.display());
        }
    }

    #[test]
    fn stale_cache_entries_are_dropped() {
        let config = config();
        let mut fs = seeded("class A {};");
        fs.insert(Path::new(INPUT).join("core/B.epi"), "class B {};");
        run(&mut fs, &config, &["core/A.epi", "core/B.epi"]);
        let cache = Cache::load(&fs, &config.cache_path()).expect("cache");
        assert_eq!(cache.len(), 10);

        fs.remove(&Path::new(INPUT).join("core/B.epi"));
        fs.clear_writes();
        run(&mut fs, &config, &["core/A.epi"]);
        assert_eq!(fs.writes(), &[config.cache_path()]);

        let cache = Cache::load(&fs, &config.cache_path()).expect("cache");
        assert_eq!(cache.len(), 5);
        assert!(cache.get(&Path::new(INPUT).join("core/B.epi")).is_none());
        assert!(cache.get(Path::new("/project/out/core/B.h")).is_none());
        assert!(cache.get(&Path::new(INPUT).join("core/A.epi")).is_some());
    }
}
