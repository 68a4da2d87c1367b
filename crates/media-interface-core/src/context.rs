//! Resolved source media roots.
//!
//! A [`MediaContext`] is built once from the config and passed to every query.
//! Problems that only affect one root (an unknown handler id, an unreadable
//! location, errata its handler cannot classify) are kept with that root, so
//! queries against the other roots still work.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::{Config, config_dir};
use crate::errata::{Errata, ErrataResolver};
use crate::error::{ConfigError, Error, Result};
use crate::fs::FileSystem;
use crate::handler::{HandlerDefinition, HandlerRegistry};

/// A source media location and the handler responsible for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMediaRoot {
    /// Absolute folder whose direct children are cards.
    pub location: PathBuf,
    /// Handler id.
    pub handler: String,
}

impl SourceMediaRoot {
    /// Create a root.
    #[must_use]
    pub fn new(location: impl Into<PathBuf>, handler: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            handler: handler.into(),
        }
    }
}

#[derive(Debug, Clone)]
struct RootState {
    handler: Arc<HandlerDefinition>,
    errata: Errata,
}

/// One root with its handler and errata, or the reason it is unusable.
#[derive(Debug, Clone)]
pub struct RootContext {
    root: SourceMediaRoot,
    state: std::result::Result<RootState, ConfigError>,
}

impl RootContext {
    /// Folder holding the cards.
    #[must_use]
    pub fn location(&self) -> &Path {
        &self.root.location
    }

    /// Configured handler id.
    #[must_use]
    pub fn handler_id(&self) -> &str {
        &self.root.handler
    }

    /// Handler and errata of a usable root.
    ///
    /// # Errors
    ///
    /// Returns the configuration problem recorded for this root.
    pub fn resolved(&self) -> Result<(&HandlerDefinition, &Errata)> {
        match &self.state {
            Ok(state) => Ok((state.handler.as_ref(), &state.errata)),
            Err(e) => Err(Error::Config(e.clone())),
        }
    }

    /// Whether queries against this root can run.
    #[must_use]
    pub const fn is_usable(&self) -> bool {
        self.state.is_ok()
    }

    /// Card folder a file belongs to.
    ///
    /// Files at least one folder below the location belong to the card named by
    /// that folder. Loose files directly in the location belong to the location.
    #[must_use]
    pub fn card_for_file(&self, path: &Path) -> PathBuf {
        let mut components = self.relative_components(path);
        match (components.next(), components.next()) {
            (Some(card), Some(_)) => self.root.location.join(card),
            _ => self.root.location.clone(),
        }
    }

    /// Card folder a directory lies on, `None` for the location itself.
    #[must_use]
    pub fn card_for_dir(&self, path: &Path) -> Option<PathBuf> {
        self.relative_components(path)
            .next()
            .map(|card| self.root.location.join(card))
    }

    fn relative_components<'p>(&self, path: &'p Path) -> impl Iterator<Item = &'p std::ffi::OsStr> {
        path.strip_prefix(&self.root.location)
            .into_iter()
            .flat_map(Path::components)
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part),
                _ => None,
            })
    }
}

/// Every configured root, immutable once built.
#[derive(Debug, Clone, Default)]
pub struct MediaContext {
    roots: Vec<RootContext>,
}

impl MediaContext {
    /// Build a context from roots with absolute, readable locations.
    ///
    /// Known-missing paths must be absolute.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ErrataOutsideRoots`] when a known-missing path is
    /// not under any location.
    pub fn new(
        roots: Vec<SourceMediaRoot>,
        registry: &HandlerRegistry,
        known_missing: Vec<PathBuf>,
    ) -> std::result::Result<Self, ConfigError> {
        Self::build(
            roots.into_iter().map(|root| (root, None)).collect(),
            registry,
            known_missing,
        )
    }

    /// Build a context from a parsed config file located at `config_path`.
    ///
    /// Root locations are resolved against the config file directory and
    /// canonicalized; a location that cannot be resolved makes only that root
    /// unusable.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for invalid or duplicate custom handlers and
    /// for known-missing paths outside every location.
    pub fn from_config(
        config: &Config,
        config_path: &Path,
        fs: &dyn FileSystem,
    ) -> std::result::Result<Self, ConfigError> {
        let mut registry = HandlerRegistry::with_builtin()?;
        for spec in &config.handlers {
            registry.register(spec.clone())?;
        }

        let base = config_dir(config_path);
        let base = fs.canonicalize(&base).unwrap_or(base);

        let roots = config
            .source_media
            .iter()
            .map(|entry| {
                let joined = base.join(&entry.path).join(&entry.card_subdir);
                let resolved = fs.canonicalize(&joined).and_then(|location| {
                    if fs.is_dir(&location) {
                        Ok(location)
                    } else {
                        Err(Error::NotADirectory { path: location })
                    }
                });
                match resolved {
                    Ok(location) => (SourceMediaRoot::new(location, &entry.handler), None),
                    Err(e) => {
                        warn!(path = %joined.display(), error = %e, "Source media location unusable");
                        let problem = ConfigError::UnreadableRoot {
                            path: joined.clone(),
                            reason: e.to_string(),
                        };
                        (SourceMediaRoot::new(joined, &entry.handler), Some(problem))
                    }
                }
            })
            .collect();

        let known_missing = config
            .errata
            .known_missing_files
            .iter()
            .map(|p| base.join(p))
            .collect();

        Self::build(roots, &registry, known_missing)
    }

    fn build(
        roots: Vec<(SourceMediaRoot, Option<ConfigError>)>,
        registry: &HandlerRegistry,
        known_missing: Vec<PathBuf>,
    ) -> std::result::Result<Self, ConfigError> {
        let mut roots: Vec<RootContext> = roots
            .into_iter()
            .map(|(root, problem)| {
                let state = match problem {
                    Some(e) => Err(e),
                    None => registry
                        .get(&root.handler)
                        .map(|handler| RootState {
                            handler,
                            errata: Errata::default(),
                        })
                        .ok_or_else(|| ConfigError::UnknownHandler {
                            handler: root.handler.clone(),
                        }),
                };
                if let Err(e) = &state {
                    warn!(location = %root.location.display(), error = %e, "Root disabled");
                }
                RootContext { root, state }
            })
            .collect();

        let mut per_root: BTreeMap<usize, Vec<(PathBuf, PathBuf)>> = BTreeMap::new();
        for path in known_missing {
            let index = longest_prefix(&roots, &path)
                .ok_or_else(|| ConfigError::ErrataOutsideRoots { path: path.clone() })?;
            let card = roots[index].card_for_file(&path);
            per_root.entry(index).or_default().push((path, card));
        }

        for (index, entries) in per_root {
            let root = &mut roots[index];
            let Ok(state) = &mut root.state else {
                continue;
            };
            match ErrataResolver::new(&state.handler).resolve(entries) {
                Ok(errata) => {
                    debug!(location = %root.root.location.display(), known_missing = errata.len(), "Resolved errata");
                    state.errata = errata;
                }
                Err(e) => {
                    warn!(location = %root.root.location.display(), error = %e, "Root disabled");
                    root.state = Err(e);
                }
            }
        }

        Ok(Self { roots })
    }

    /// Configured roots in config order.
    #[must_use]
    pub fn roots(&self) -> &[RootContext] {
        &self.roots
    }

    /// The root whose location is the longest prefix of `path`.
    #[must_use]
    pub fn resolve(&self, path: &Path) -> Option<&RootContext> {
        longest_prefix(&self.roots, path).map(|index| &self.roots[index])
    }
}

fn longest_prefix(roots: &[RootContext], path: &Path) -> Option<usize> {
    roots
        .iter()
        .enumerate()
        .filter(|(_, r)| path.starts_with(&r.root.location))
        .max_by_key(|(_, r)| r.root.location.components().count())
        .map(|(index, _)| index)
}
