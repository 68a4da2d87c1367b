//! Handler definitions: per-device file naming conventions as data.
//!
//! A handler is an ordered list of [`FilePatternRule`]s plus the file types
//! every part of an item must have. Handlers are written as serde-friendly
//! [`HandlerSpec`]s (built-in ones live in [`crate::builtin`], custom ones come
//! from the config file) and become [`HandlerDefinition`]s only after
//! validation, so a definition that exists is known to be usable.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use regex::Regex;
use regex_syntax::hir::{Class, Hir, HirKind};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;
use crate::media::{FileType, ItemType, ScannedFile};

const KEY_GROUP: &str = "key";
const PART_GROUP: &str = "part";

/// Highest part number a handler accepts unless it says otherwise.
pub const DEFAULT_MAX_PARTS: u32 = 99;
/// Upper bound for a handler's `max_parts`.
pub const PART_LIMIT: u32 = 9999;

/// Where a rule takes the grouping key from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum KeySource {
    /// The named `key` group of the rule's pattern.
    Capture,
    /// The file name without its extension.
    #[default]
    Stem,
    /// The whole file name, making every file its own item.
    FileName,
}

const fn default_true() -> bool {
    true
}

const fn default_max_parts() -> u32 {
    DEFAULT_MAX_PARTS
}

/// Serialized form of a single file pattern rule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RuleSpec {
    /// File extension, compared ASCII case-insensitively.
    pub extension: String,
    /// Regex over the card-relative parent directory (`/`-separated, empty at the card root).
    #[serde(default)]
    pub directory: Option<String>,
    /// Regex over the file stem. A `part` group makes the rule multi-part.
    #[serde(default)]
    pub pattern: Option<String>,
    /// Role of matching files.
    pub file_type: FileType,
    /// Item kind of matching files.
    pub item_type: ItemType,
    /// Grouping key extractor.
    #[serde(default)]
    pub key: KeySource,
    /// Prefix the grouping key with the relative directory.
    #[serde(default)]
    pub group_by_directory: bool,
    /// Relative fidelity, lower is lower quality.
    pub quality_rank: u32,
    /// Whether matching files embed the item's metadata.
    #[serde(default)]
    pub carries_metadata: bool,
    /// Whether matching files may represent their item in listings.
    #[serde(default = "default_true")]
    pub selectable: bool,
}

impl RuleSpec {
    /// Create a rule matching any file with `extension`.
    #[must_use]
    pub fn new(
        extension: impl Into<String>,
        file_type: FileType,
        item_type: ItemType,
        quality_rank: u32,
    ) -> Self {
        Self {
            extension: extension.into(),
            directory: None,
            pattern: None,
            file_type,
            item_type,
            key: KeySource::Stem,
            group_by_directory: false,
            quality_rank,
            carries_metadata: false,
            selectable: true,
        }
    }

    /// Restrict the rule to stems matching `pattern`, keyed by its `key` group.
    #[must_use]
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self.key = KeySource::Capture;
        self
    }

    /// Restrict the rule to parent directories matching `directory`.
    #[must_use]
    pub fn with_directory(mut self, directory: impl Into<String>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    /// Set the grouping key source.
    #[must_use]
    pub const fn with_key(mut self, key: KeySource) -> Self {
        self.key = key;
        self
    }

    /// Keep equal keys in different directories apart.
    #[must_use]
    pub const fn grouped_by_directory(mut self) -> Self {
        self.group_by_directory = true;
        self
    }

    /// Mark matching files as metadata carriers.
    #[must_use]
    pub const fn carrying_metadata(mut self) -> Self {
        self.carries_metadata = true;
        self
    }

    /// Never pick matching files as an item's representative.
    #[must_use]
    pub const fn not_selectable(mut self) -> Self {
        self.selectable = false;
        self
    }
}

/// Serialized form of a handler.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct HandlerSpec {
    /// Handler id referenced by source media entries.
    pub id: String,
    /// Rules in priority order; the first match wins.
    pub rules: Vec<RuleSpec>,
    /// File types every part of an item of the given type must have.
    #[serde(default)]
    pub required: BTreeMap<ItemType, Vec<FileType>>,
    /// Highest part number a multi-part rule accepts.
    #[serde(default = "default_max_parts")]
    pub max_parts: u32,
}

impl HandlerSpec {
    /// Create a handler with no requirements and the default part limit.
    #[must_use]
    pub fn new(id: impl Into<String>, rules: Vec<RuleSpec>) -> Self {
        Self {
            id: id.into(),
            rules,
            required: BTreeMap::new(),
            max_parts: DEFAULT_MAX_PARTS,
        }
    }

    /// Require `file_types` in every part of `item_type` items.
    #[must_use]
    pub fn with_required(mut self, item_type: ItemType, file_types: Vec<FileType>) -> Self {
        self.required.insert(item_type, file_types);
        self
    }

    /// Accept part numbers up to `max_parts`.
    #[must_use]
    pub const fn with_max_parts(mut self, max_parts: u32) -> Self {
        self.max_parts = max_parts;
        self
    }
}

/// Values a rule derives from a file it accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    /// Grouping key.
    pub grouping_key: String,
    /// Part ordinal for multi-part rules.
    pub part_num: Option<u32>,
}

/// A validated rule with compiled matchers.
#[derive(Debug, Clone)]
pub struct FilePatternRule {
    spec: RuleSpec,
    directory: Option<Regex>,
    pattern: Option<Regex>,
    multi_part: bool,
    max_parts: u32,
}

impl FilePatternRule {
    fn compile(
        handler: &str,
        index: usize,
        spec: RuleSpec,
        max_parts: u32,
    ) -> Result<Self, ConfigError> {
        let compile = |field: &'static str, source: &str| {
            Regex::new(source).map_err(|e| ConfigError::InvalidPattern {
                handler: handler.to_string(),
                rule: index,
                field,
                reason: e.to_string(),
            })
        };
        let partial = |reason: &str| ConfigError::PartialExtractor {
            handler: handler.to_string(),
            rule: index,
            reason: reason.to_string(),
        };

        let directory = spec
            .directory
            .as_deref()
            .map(|d| compile("directory", d))
            .transpose()?;
        let pattern = spec
            .pattern
            .as_deref()
            .map(|p| compile("pattern", p))
            .transpose()?;

        let has_group = |name: &str| {
            pattern
                .as_ref()
                .is_some_and(|re| re.capture_names().flatten().any(|n| n == name))
        };
        let multi_part = has_group(PART_GROUP);

        if spec.key == KeySource::Capture && !has_group(KEY_GROUP) {
            return Err(partial("key source is 'capture' but the pattern has no 'key' group"));
        }
        // Named groups used by extractors must take part in every match.
        let uses_groups = multi_part || spec.key == KeySource::Capture;
        if uses_groups
            && pattern
                .as_ref()
                .is_some_and(|re| re.static_captures_len().is_none())
        {
            return Err(partial(
                "pattern has capture groups that do not participate in every match",
            ));
        }
        if multi_part
            && let Some(source) = spec.pattern.as_deref()
            && !part_group_is_numeric(source)
        {
            return Err(partial(
                "'part' group must only match ASCII digits, use [0-9] instead of \\d",
            ));
        }

        Ok(Self {
            spec,
            directory,
            pattern,
            multi_part,
            max_parts,
        })
    }

    /// The rule as written.
    #[must_use]
    pub const fn spec(&self) -> &RuleSpec {
        &self.spec
    }

    /// Whether file names matched by this rule encode a part number.
    #[must_use]
    pub const fn is_multi_part(&self) -> bool {
        self.multi_part
    }

    /// Number of constraints beyond the extension.
    #[must_use]
    pub fn specificity(&self) -> usize {
        usize::from(self.directory.is_some()) + usize::from(self.pattern.is_some())
    }

    fn same_matcher(&self, other: &Self) -> bool {
        self.spec.extension.eq_ignore_ascii_case(&other.spec.extension)
            && self.spec.directory == other.spec.directory
            && self.spec.pattern == other.spec.pattern
    }

    /// Derive grouping key and part number, or `None` if the rule does not accept the file.
    #[must_use]
    pub fn extract(&self, file: &ScannedFile) -> Option<Extracted> {
        if !file.extension.eq_ignore_ascii_case(&self.spec.extension) {
            return None;
        }
        if let Some(dir) = &self.directory
            && !dir.is_match(&file.relative_dir)
        {
            return None;
        }

        let captures = match &self.pattern {
            Some(re) => Some(re.captures(&file.stem)?),
            None => None,
        };
        let group = |name: &str| {
            captures
                .as_ref()
                .and_then(|c| c.name(name))
                .map(|m| m.as_str())
        };

        let key = match self.spec.key {
            KeySource::Capture => group(KEY_GROUP)?.to_string(),
            KeySource::Stem => file.stem.clone(),
            KeySource::FileName => file.file_name.clone(),
        };
        let grouping_key = if self.spec.group_by_directory && !file.relative_dir.is_empty() {
            format!("{}/{key}", file.relative_dir)
        } else {
            key
        };

        let part_num = if self.multi_part {
            let raw = group(PART_GROUP)?;
            match raw.parse::<u32>() {
                Ok(n) if (1..=self.max_parts).contains(&n) => Some(n),
                _ => {
                    debug!(
                        file = %file.file_name,
                        part = raw,
                        max_parts = self.max_parts,
                        "Part number out of range, rule skipped"
                    );
                    return None;
                }
            }
        } else {
            None
        };

        Some(Extracted {
            grouping_key,
            part_num,
        })
    }
}

/// Whether the `part` group of `pattern` can only capture ASCII digits.
fn part_group_is_numeric(pattern: &str) -> bool {
    let Ok(hir) = regex_syntax::parse(pattern) else {
        return false;
    };
    find_group(&hir, PART_GROUP).is_some_and(|group| {
        group.properties().minimum_len().is_some_and(|len| len > 0) && only_digits(group)
    })
}

fn find_group<'h>(hir: &'h Hir, name: &str) -> Option<&'h Hir> {
    match hir.kind() {
        HirKind::Capture(capture) if capture.name.as_deref() == Some(name) => {
            Some(capture.sub.as_ref())
        }
        HirKind::Capture(capture) => find_group(&capture.sub, name),
        HirKind::Repetition(repetition) => find_group(&repetition.sub, name),
        HirKind::Concat(subs) | HirKind::Alternation(subs) => {
            subs.iter().find_map(|sub| find_group(sub, name))
        }
        HirKind::Empty | HirKind::Literal(_) | HirKind::Class(_) | HirKind::Look(_) => None,
    }
}

fn only_digits(hir: &Hir) -> bool {
    match hir.kind() {
        HirKind::Empty | HirKind::Look(_) => true,
        HirKind::Literal(literal) => literal.0.iter().all(u8::is_ascii_digit),
        HirKind::Class(Class::Unicode(class)) => class
            .ranges()
            .iter()
            .all(|r| r.start().is_ascii_digit() && r.end().is_ascii_digit()),
        HirKind::Class(Class::Bytes(class)) => class
            .ranges()
            .iter()
            .all(|r| r.start().is_ascii_digit() && r.end().is_ascii_digit()),
        HirKind::Repetition(repetition) => only_digits(&repetition.sub),
        HirKind::Capture(capture) => only_digits(&capture.sub),
        HirKind::Concat(subs) | HirKind::Alternation(subs) => subs.iter().all(only_digits),
    }
}

/// A validated, immutable device naming convention.
#[derive(Debug, Clone)]
pub struct HandlerDefinition {
    id: String,
    rules: Vec<FilePatternRule>,
    required: BTreeMap<ItemType, BTreeSet<FileType>>,
    max_parts: u32,
}

impl HandlerDefinition {
    /// Validate and compile a handler spec.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for an empty id, zero rules, regexes that do
    /// not compile, rules with identical matchers, extractors that are not total
    /// and requirements no rule can satisfy.
    pub fn new(spec: HandlerSpec) -> Result<Self, ConfigError> {
        let HandlerSpec {
            id,
            rules: rule_specs,
            required,
            max_parts,
        } = spec;

        if id.trim().is_empty() {
            return Err(ConfigError::EmptyHandlerId);
        }
        if rule_specs.is_empty() {
            return Err(ConfigError::NoRules { handler: id });
        }
        if !(1..=PART_LIMIT).contains(&max_parts) {
            return Err(ConfigError::InvalidPartLimit {
                handler: id,
                max_parts,
            });
        }

        let rules = rule_specs
            .into_iter()
            .enumerate()
            .map(|(index, rule)| FilePatternRule::compile(&id, index, rule, max_parts))
            .collect::<Result<Vec<_>, _>>()?;

        for (second, rule) in rules.iter().enumerate() {
            if let Some(first) = rules[..second].iter().position(|r| r.same_matcher(rule)) {
                return Err(ConfigError::DuplicateRule {
                    handler: id,
                    first,
                    second,
                });
            }
        }

        let mut required_sets = BTreeMap::new();
        for (item_type, file_types) in required {
            for &file_type in &file_types {
                let producible = rules.iter().any(|r| {
                    r.spec.item_type == item_type && r.spec.file_type == file_type
                });
                if !producible {
                    return Err(ConfigError::UnsatisfiableRequirement {
                        handler: id,
                        item_type,
                        file_type,
                    });
                }
            }
            required_sets.insert(item_type, file_types.into_iter().collect::<BTreeSet<_>>());
        }

        Ok(Self {
            id,
            rules,
            required: required_sets,
            max_parts,
        })
    }

    /// Handler id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Rules in priority order.
    #[must_use]
    pub fn rules(&self) -> &[FilePatternRule] {
        &self.rules
    }

    /// Highest part number any rule accepts.
    #[must_use]
    pub const fn max_parts(&self) -> u32 {
        self.max_parts
    }

    /// File types every part of an `item_type` item must have.
    pub fn required(&self, item_type: ItemType) -> impl Iterator<Item = FileType> + '_ {
        self.required
            .get(&item_type)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }
}

/// Lookup of validated handlers by id.
#[derive(Debug, Clone, Default)]
pub struct HandlerRegistry {
    handlers: BTreeMap<String, Arc<HandlerDefinition>>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in handlers.
    ///
    /// # Errors
    ///
    /// Returns an error if a built-in definition fails validation.
    pub fn with_builtin() -> Result<Self, ConfigError> {
        let mut registry = Self::new();
        for spec in crate::builtin::specs() {
            registry.register(spec)?;
        }
        Ok(registry)
    }

    /// Validate and add a handler.
    ///
    /// # Errors
    ///
    /// Returns an error if the handler is invalid or its id is already taken.
    pub fn register(&mut self, spec: HandlerSpec) -> Result<(), ConfigError> {
        if self.handlers.contains_key(&spec.id) {
            return Err(ConfigError::DuplicateHandler { handler: spec.id });
        }
        let definition = HandlerDefinition::new(spec)?;
        debug!(
            handler = definition.id(),
            rules = definition.rules().len(),
            "Registered handler"
        );
        self.handlers
            .insert(definition.id().to_string(), Arc::new(definition));
        Ok(())
    }

    /// Look up a handler.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<HandlerDefinition>> {
        self.handlers.get(id).cloned()
    }

    /// Registered ids in sorted order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }
}
