// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pattern table: TOML-shaped configuration for the pattern-driven state
//! machine, pre-compiled at load time into a [`CompiledPatternSet`].

use std::path::Path;

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

use brummer_core::Severity;

use crate::prefix;

/// Error-pattern table embedded in the binary; loaded with [`CompiledPatternSet::default`]
/// or overridden via [`CompiledPatternSet::load`].
const DEFAULT_PATTERNS_TOML: &str = include_str!("default_patterns.toml");

#[derive(Debug, Error)]
pub enum PatternError {
    #[error("failed to read pattern file {0}: {1}")]
    Read(std::path::PathBuf, std::io::Error),
    #[error("failed to parse pattern TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid regex {pattern:?} in language {language:?}: {source}")]
    Regex { language: String, pattern: String, source: regex::Error },
    #[error("language {language:?} start pattern has no sample line for sanity checking")]
    MissingSample { language: String },
    #[error("sample {sample:?} for language {language:?} does not match its own start pattern")]
    SampleMismatch { language: String, sample: String },
    #[error(
        "sanity check failed: the prefix-stripping pipeline consumed part of sample {sample:?} \
         for language {language:?}, so its start pattern no longer matches after stripping \
         (the exclusion list is not guarding this token)"
    )]
    PrefixStripperEatsSample { language: String, sample: String },
}

#[derive(Debug, Deserialize)]
struct RawPatternFile {
    language: Vec<RawLanguage>,
}

#[derive(Debug, Deserialize)]
struct RawLanguage {
    name: String,
    #[serde(default)]
    maps_to: Option<String>,
    #[serde(default)]
    start: Vec<RawStart>,
    #[serde(default)]
    stack: Vec<String>,
    #[serde(default)]
    continuation: Vec<String>,
    #[serde(default)]
    end: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawStart {
    regex: String,
    #[serde(default)]
    type_group: usize,
    #[serde(default)]
    type_name: Option<String>,
    message_group: usize,
    severity: String,
    #[serde(default)]
    multiline: bool,
    #[serde(default)]
    sample: Option<String>,
}

/// A compiled "error start" rule: recognizes the header line of an error,
/// producing its type, message, severity, and whether it opens a multi-line
/// context or stands alone.
pub struct StartRule {
    pub regex: Regex,
    pub type_group: usize,
    pub type_name: Option<String>,
    pub message_group: usize,
    pub severity: Severity,
    pub multiline: bool,
    /// A known-good sample line, used once at load time by the sanity
    /// check; not used afterward.
    sample: String,
}

impl StartRule {
    /// Derive the error type: a literal `type_name` if set, else the
    /// matched `type_group` capture.
    pub fn error_type(&self, caps: &regex::Captures<'_>) -> String {
        if let Some(name) = &self.type_name {
            return name.clone();
        }
        caps.get(self.type_group).map(|m| m.as_str().to_string()).unwrap_or_default()
    }

    pub fn message(&self, caps: &regex::Captures<'_>) -> String {
        if self.message_group == 0 {
            return caps.get(0).map(|m| m.as_str().to_string()).unwrap_or_default();
        }
        caps.get(self.message_group).map(|m| m.as_str().to_string()).unwrap_or_default()
    }
}

/// A compiled language entry: its start/stack/continuation/end rules and
/// the language tag it reports (its own name, unless `maps_to` redirects
/// framework variants onto a base language).
pub struct CompiledLanguage {
    pub name: String,
    pub reported_language: String,
    pub start: Vec<StartRule>,
    pub stack: Vec<Regex>,
    pub continuation: Vec<Regex>,
    pub end: Vec<Regex>,
}

/// The full precedence-ordered pattern table, pre-compiled at load time.
pub struct CompiledPatternSet {
    pub languages: Vec<CompiledLanguage>,
}

impl CompiledPatternSet {
    fn compile(raw: RawPatternFile) -> Result<Self, PatternError> {
        let mut languages = Vec::with_capacity(raw.language.len());
        for lang in raw.language {
            let reported_language = lang.maps_to.clone().unwrap_or_else(|| lang.name.clone());
            let mut start = Vec::with_capacity(lang.start.len());
            for s in &lang.start {
                let regex = Regex::new(&s.regex).map_err(|source| PatternError::Regex {
                    language: lang.name.clone(),
                    pattern: s.regex.clone(),
                    source,
                })?;
                let severity = match s.severity.as_str() {
                    "warning" => Severity::Warning,
                    "critical" => Severity::Critical,
                    _ => Severity::Error,
                };
                let sample =
                    s.sample.clone().ok_or_else(|| PatternError::MissingSample { language: lang.name.clone() })?;
                if !regex.is_match(&sample) {
                    return Err(PatternError::SampleMismatch { language: lang.name.clone(), sample });
                }
                start.push(StartRule {
                    regex,
                    type_group: s.type_group,
                    type_name: s.type_name.clone(),
                    message_group: s.message_group,
                    severity,
                    multiline: s.multiline,
                    sample,
                });
            }
            let compile_all = |pats: &[String], lang_name: &str| -> Result<Vec<Regex>, PatternError> {
                pats.iter()
                    .map(|p| {
                        Regex::new(p).map_err(|source| PatternError::Regex {
                            language: lang_name.to_string(),
                            pattern: p.clone(),
                            source,
                        })
                    })
                    .collect()
            };
            languages.push(CompiledLanguage {
                name: lang.name.clone(),
                reported_language,
                stack: compile_all(&lang.stack, &lang.name)?,
                continuation: compile_all(&lang.continuation, &lang.name)?,
                end: compile_all(&lang.end, &lang.name)?,
                start,
            });
        }
        let table = Self { languages };
        table.sanity_check()?;
        Ok(table)
    }

    /// Startup sanity check: run every start pattern's sample line through
    /// the prefix-stripping pipeline and confirm the pattern still matches
    /// afterward. This is what actually proves the exclusion list guards
    /// its paired include patterns (spec.md §9): if stripping ate part of
    /// `TS1234:` or `TypeError:` as if it were a bracketed process tag, the
    /// start pattern would stop matching and this check catches it here,
    /// at load time, instead of silently misclassifying lines at runtime.
    fn sanity_check(&self) -> Result<(), PatternError> {
        for lang in &self.languages {
            for rule in &lang.start {
                let stripped = prefix::strip_prefixes(&rule.sample);
                if !rule.regex.is_match(&stripped) {
                    return Err(PatternError::PrefixStripperEatsSample {
                        language: lang.name.clone(),
                        sample: rule.sample.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, PatternError> {
        let text =
            std::fs::read_to_string(path).map_err(|e| PatternError::Read(path.to_path_buf(), e))?;
        let raw: RawPatternFile = toml::from_str(&text)?;
        Self::compile(raw)
    }
}

impl Default for CompiledPatternSet {
    fn default() -> Self {
        let raw: RawPatternFile =
            toml::from_str(DEFAULT_PATTERNS_TOML).expect("embedded default_patterns.toml is valid TOML");
        Self::compile(raw).expect("embedded default pattern table passes its own sanity check")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_loads_and_compiles() {
        let table = CompiledPatternSet::default();
        assert!(table.languages.iter().any(|l| l.name == "database"));
        assert!(table.languages.iter().any(|l| l.name == "generic"));
    }

    #[test]
    fn precedence_matches_spec_order() {
        let table = CompiledPatternSet::default();
        let names: Vec<&str> = table.languages.iter().map(|l| l.name.as_str()).collect();
        let database_idx = names.iter().position(|n| *n == "database").unwrap();
        let generic_idx = names.iter().position(|n| *n == "generic").unwrap();
        assert!(database_idx < generic_idx, "database must precede generic");
    }

    #[test]
    fn framework_variants_map_onto_javascript() {
        let table = CompiledPatternSet::default();
        let react = table.languages.iter().find(|l| l.name == "react").unwrap();
        assert_eq!(react.reported_language, "javascript");
    }

    #[test]
    fn rejects_sample_that_does_not_match_its_own_pattern() {
        let raw = RawPatternFile {
            language: vec![RawLanguage {
                name: "bogus".into(),
                maps_to: None,
                start: vec![RawStart {
                    regex: "^X: (.+)$".into(),
                    type_group: 0,
                    type_name: Some("X".into()),
                    message_group: 1,
                    severity: "error".into(),
                    multiline: false,
                    sample: Some("not a match".into()),
                }],
                stack: vec![],
                continuation: vec![],
                end: vec![],
            }],
        };
        assert!(matches!(CompiledPatternSet::compile(raw), Err(PatternError::SampleMismatch { .. })));
    }
}
