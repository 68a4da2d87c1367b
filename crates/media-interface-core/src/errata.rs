//! Known-missing files.
//!
//! Cards sometimes lose files for good (a corrupted chapter, a proxy the camera
//! never wrote). Listing them as errata keeps the grouping honest: the slot is
//! reported as declared-absent instead of making the part incomplete, and the
//! declared part still counts towards the item's part count. Errata never add
//! paths to responses.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::classify::classify;
use crate::error::ConfigError;
use crate::handler::HandlerDefinition;
use crate::media::{Classification, FileType, ItemType, ScannedFile};

/// Slots declared absent on one card, keyed by item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeclaredAbsences {
    slots: BTreeMap<(ItemType, String), BTreeSet<(u32, FileType)>>,
}

static NO_ABSENCES: DeclaredAbsences = DeclaredAbsences {
    slots: BTreeMap::new(),
};

impl DeclaredAbsences {
    /// Create an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: BTreeMap::new(),
        }
    }

    /// Declare a slot absent.
    pub fn declare(
        &mut self,
        item_type: ItemType,
        grouping_key: impl Into<String>,
        part_num: u32,
        file_type: FileType,
    ) {
        self.slots
            .entry((item_type, grouping_key.into()))
            .or_default()
            .insert((part_num, file_type));
    }

    /// Whether a slot was declared absent.
    #[must_use]
    pub fn is_declared(
        &self,
        item_type: ItemType,
        grouping_key: &str,
        part_num: u32,
        file_type: FileType,
    ) -> bool {
        self.slots
            .get(&(item_type, grouping_key.to_string()))
            .is_some_and(|set| set.contains(&(part_num, file_type)))
    }

    /// Declared `(part_num, file_type)` slots of one item.
    pub fn slots_for(
        &self,
        item_type: ItemType,
        grouping_key: &str,
    ) -> impl Iterator<Item = (u32, FileType)> + '_ {
        self.slots
            .get(&(item_type, grouping_key.to_string()))
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    /// Highest part number any declaration implies for an item.
    #[must_use]
    pub fn max_part(&self, item_type: ItemType, grouping_key: &str) -> Option<u32> {
        self.slots_for(item_type, grouping_key)
            .map(|(part, _)| part)
            .max()
    }

    /// Whether nothing is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Resolved errata of one source media root, per card.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Errata {
    cards: BTreeMap<PathBuf, DeclaredAbsences>,
    paths: BTreeSet<PathBuf>,
}

impl Errata {
    /// Declared absences of one card; empty when the card has none.
    #[must_use]
    pub fn for_card(&self, card_dir: &Path) -> &DeclaredAbsences {
        self.cards.get(card_dir).unwrap_or(&NO_ABSENCES)
    }

    /// Whether a path was listed as known-missing.
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.paths.contains(path)
    }

    /// Number of known-missing paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Whether no paths were listed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Turns known-missing paths into declared-absent slots using a root's handler.
#[derive(Debug, Clone, Copy)]
pub struct ErrataResolver<'a> {
    handler: &'a HandlerDefinition,
}

impl<'a> ErrataResolver<'a> {
    /// Create a resolver for one root's handler.
    #[must_use]
    pub const fn new(handler: &'a HandlerDefinition) -> Self {
        Self { handler }
    }

    /// Classify every `(path, card_dir)` entry exactly like a real file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnclassifiedErrata`] for the first path that
    /// matches no rule of the handler.
    pub fn resolve<I>(&self, entries: I) -> Result<Errata, ConfigError>
    where
        I: IntoIterator<Item = (PathBuf, PathBuf)>,
    {
        let mut errata = Errata::default();
        for (path, card_dir) in entries {
            let unclassified = || ConfigError::UnclassifiedErrata {
                path: path.clone(),
                handler: self.handler.id().to_string(),
            };
            let scanned = ScannedFile::new(&path, &card_dir).ok_or_else(unclassified)?;
            let Classification::Classified(file) = classify(scanned, self.handler) else {
                return Err(unclassified());
            };

            debug!(
                path = %path.display(),
                item_type = %file.item_type,
                key = %file.grouping_key,
                part = file.effective_part(),
                file_type = %file.file_type,
                "Declared known-missing file"
            );
            errata.cards.entry(card_dir).or_default().declare(
                file.item_type,
                file.grouping_key.clone(),
                file.effective_part(),
                file.file_type,
            );
            errata.paths.insert(path);
        }
        Ok(errata)
    }
}
