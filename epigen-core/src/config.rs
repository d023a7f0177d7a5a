//! Run configuration and the module manifest.

use std::fs;
use std::path::{Path, PathBuf};

use glob::Pattern;
use serde::Deserialize;

use crate::cache::CACHE_FILE_NAME;
use crate::error::CoreError;

/// Directories and switches of one generator run.
///
/// Output directories default to the input directory; the build output
/// directory follows `dir_output` until it is set explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub dir_input: PathBuf,
    pub dir_output: PathBuf,
    pub dir_output_build: PathBuf,
    pub caching_enabled: bool,
    pub ignore_patterns: Vec<String>,
}

impl Config {
    pub fn new(dir_input: impl Into<PathBuf>) -> Self {
        let dir_input = dir_input.into();
        Self {
            dir_output: dir_input.clone(),
            dir_output_build: dir_input.clone(),
            dir_input,
            caching_enabled: true,
            ignore_patterns: Vec::new(),
        }
    }

    pub fn with_output(mut self, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        if self.dir_output_build == self.dir_output {
            self.dir_output_build = dir.clone();
        }
        self.dir_output = dir;
        self
    }

    pub fn with_output_build(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir_output_build = dir.into();
        self
    }

    pub fn with_caching(mut self, enabled: bool) -> Self {
        self.caching_enabled = enabled;
        self
    }

    pub fn with_ignore_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore_patterns.extend(patterns.into_iter().map(Into::into));
        self
    }

    pub fn cache_path(&self) -> PathBuf {
        self.dir_output_build.join(CACHE_FILE_NAME)
    }

    pub fn ignore_matchers(&self) -> Result<Vec<Pattern>, CoreError> {
        self.ignore_patterns
            .iter()
            .map(|pattern| {
                Pattern::new(pattern).map_err(|source| CoreError::IgnorePattern {
                    pattern: pattern.clone(),
                    source,
                })
            })
            .collect()
    }
}

/// Module directories of a project, as listed in its manifest file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub modules: Vec<PathBuf>,
}

impl Manifest {
    pub fn from_json(text: &str) -> Result<Self, CoreError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let text = fs::read_to_string(path).map_err(|err| CoreError::io(path, err))?;
        Self::from_json(&text)
    }

    /// Absolute module directories, deepest first.
    pub fn module_dirs(&self, dir_input: &Path) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = if self.modules.is_empty() {
            vec![dir_input.to_path_buf()]
        } else {
            self.modules.iter().map(|module| dir_input.join(module)).collect()
        };
        dirs.sort_by(|a, b| b.components().count().cmp(&a.components().count()).then(b.cmp(a)));
        dirs
    }

    /// `<module dir name>/<path inside the module>` of the source at `path`.
    pub fn module_path(&self, dir_input: &Path, path: &Path) -> Option<String> {
        self.module_dirs(dir_input).into_iter().find_map(|module| {
            let inner = path.strip_prefix(&module).ok()?;
            let name = module.file_name()?;
            Some(slashed(&Path::new(name).join(inner)))
        })
    }
}

/// `path` with forward slashes.
pub fn slashed(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_directories_follow_input() {
        let config = Config::new("/src");
        assert_eq!(config.dir_output, PathBuf::from("/src"));
        assert_eq!(config.dir_output_build, PathBuf::from("/src"));

        let config = Config::new("/src").with_output("/out");
        assert_eq!(config.dir_output_build, PathBuf::from("/out"));
        assert_eq!(config.cache_path(), PathBuf::from("/out/epigen-cache.bin"));

        let config = Config::new("/src").with_output_build("/build").with_output("/out");
        assert_eq!(config.dir_output, PathBuf::from("/out"));
        assert_eq!(config.dir_output_build, PathBuf::from("/build"));
    }

    #[test]
    fn rejects_bad_ignore_patterns() {
        let config = Config::new("/src").with_ignore_patterns(["tests/**", "[oops"]);
        let err = config.ignore_matchers().expect_err("invalid pattern");
        assert!(matches!(err, CoreError::IgnorePattern { ref pattern, .. } if pattern == "[oops"));
    }

    #[test]
    fn parses_manifest_json() {
        let manifest = Manifest::from_json(r#"{ "modules": ["core", "core/math"] }"#).expect("parse");
        assert_eq!(manifest.modules, vec![PathBuf::from("core"), PathBuf::from("core/math")]);
        assert!(Manifest::from_json("{}").expect("parse").modules.is_empty());
        assert!(matches!(Manifest::from_json("[1]"), Err(CoreError::Manifest(_))));
    }

    #[test]
    fn sources_belong_to_the_deepest_module() {
        let input = Path::new("/project/src");
        let manifest = Manifest::from_json(r#"{ "modules": ["core", "core/math"] }"#).expect("parse");

        let vec = input.join("core/math/linear/Vec.epi");
        assert_eq!(manifest.module_path(input, &vec).as_deref(), Some("math/linear/Vec.epi"));

        let object = input.join("core/Object.epi");
        assert_eq!(manifest.module_path(input, &object).as_deref(), Some("core/Object.epi"));

        assert_eq!(manifest.module_path(input, &input.join("other/A.epi")), None);
    }

    #[test]
    fn input_directory_is_the_default_module() {
        let input = Path::new("/project/src");
        let manifest = Manifest::default();
        assert_eq!(
            manifest.module_path(input, &input.join("A.epi")).as_deref(),
            Some("src/A.epi")
        );
    }
}
