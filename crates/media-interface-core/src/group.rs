//! Grouping of classified files into items and parts.
//!
//! Files of one card are bucketed by `(item_type, grouping_key)`, then by part
//! number. Every part gets one slot per file type that is present, required by
//! the handler, or declared absent by errata. A present slot holds one file per
//! handler rule that produced it.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::path::Path;

use tracing::{debug, trace};

use crate::errata::DeclaredAbsences;
use crate::error::{Error, Result};
use crate::handler::HandlerDefinition;
use crate::media::{ClassifiedFile, FileType, ItemType};

/// State of one `(part, file_type)` position of an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot {
    /// Files exist on the card, in rule order.
    Present(Vec<ClassifiedFile>),
    /// The file is absent and listed as known-missing.
    DeclaredAbsent,
    /// The file is required, absent, and not declared.
    Missing,
}

impl Slot {
    /// The files in this slot.
    #[must_use]
    pub fn files(&self) -> &[ClassifiedFile] {
        match self {
            Self::Present(files) => files,
            Self::DeclaredAbsent | Self::Missing => &[],
        }
    }
}

/// One recording segment of an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    part_num: u32,
    slots: BTreeMap<FileType, Slot>,
}

impl Part {
    /// 1-based part ordinal.
    #[must_use]
    pub const fn part_num(&self) -> u32 {
        self.part_num
    }

    /// Slots keyed by file type.
    #[must_use]
    pub const fn slots(&self) -> &BTreeMap<FileType, Slot> {
        &self.slots
    }

    /// Present files of this part in file type order.
    pub fn files(&self) -> impl Iterator<Item = &ClassifiedFile> {
        self.slots.values().flat_map(Slot::files)
    }

    /// File types that are required here but neither present nor declared absent.
    pub fn missing(&self) -> impl Iterator<Item = FileType> + '_ {
        self.slots
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::Missing))
            .map(|(file_type, _)| *file_type)
    }

    /// The present metadata carrier with the lowest `(quality_rank, file_type, rule, path)`.
    #[must_use]
    pub fn metadata_file(&self) -> Option<&ClassifiedFile> {
        self.files()
            .filter(|f| f.carries_metadata)
            .min_by(|a, b| {
                (a.quality_rank, a.file_type, a.rule, a.path())
                    .cmp(&(b.quality_rank, b.file_type, b.rule, b.path()))
            })
    }
}

/// A logical recording assembled from one or more files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    item_type: ItemType,
    grouping_key: String,
    parts: Vec<Part>,
}

impl Item {
    /// Kind of item.
    #[must_use]
    pub const fn item_type(&self) -> ItemType {
        self.item_type
    }

    /// Identifier shared by the item's files.
    #[must_use]
    pub fn grouping_key(&self) -> &str {
        &self.grouping_key
    }

    /// Parts `1..=part_count`, in order.
    #[must_use]
    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// Number of parts, counting parts only known from errata.
    #[must_use]
    pub fn part_count(&self) -> u32 {
        self.parts.last().map_or(0, Part::part_num)
    }

    /// Whether the recording was split into several files.
    #[must_use]
    pub fn is_multi_part(&self) -> bool {
        self.part_count() > 1
    }

    /// Every present file, by part then file type.
    pub fn files(&self) -> impl Iterator<Item = &ClassifiedFile> {
        self.parts.iter().flat_map(Part::files)
    }

    /// Metadata carrier of a part.
    #[must_use]
    pub fn metadata_file(&self, part_num: u32) -> Option<&ClassifiedFile> {
        self.parts
            .iter()
            .find(|p| p.part_num == part_num)
            .and_then(Part::metadata_file)
    }

    /// Whether no slot is [`Slot::Missing`].
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.parts.iter().all(|p| p.missing().next().is_none())
    }

    /// One `"part N file_type"` entry per missing slot.
    #[must_use]
    pub fn missing_slots(&self) -> Vec<String> {
        self.parts
            .iter()
            .flat_map(|p| p.missing().map(move |t| format!("part {} {t}", p.part_num)))
            .collect()
    }

    /// Short description used in logs and errors.
    #[must_use]
    pub fn describe(&self) -> String {
        format!("{} '{}'", self.item_type, self.grouping_key)
    }

    /// Whether any present file lies under `dir`.
    #[must_use]
    pub fn has_file_under(&self, dir: &Path) -> bool {
        self.files().any(|f| f.path().starts_with(dir))
    }
}

type SlotKey = (ItemType, String, u32, FileType);
type PartFiles = BTreeMap<FileType, Vec<ClassifiedFile>>;

fn describe_slot((item_type, key, part, file_type): &SlotKey) -> String {
    format!("{item_type} '{key}' part {part} {file_type}")
}

/// Groups the classified files of one card.
#[derive(Debug, Clone, Copy)]
pub struct GroupEngine<'a> {
    handler: &'a HandlerDefinition,
    absences: &'a DeclaredAbsences,
}

impl<'a> GroupEngine<'a> {
    /// Create an engine for one card's handler and declared absences.
    #[must_use]
    pub const fn new(handler: &'a HandlerDefinition, absences: &'a DeclaredAbsences) -> Self {
        Self { handler, absences }
    }

    /// Build items from the classified files of a single card.
    ///
    /// Items come back sorted by `(item_type, grouping_key)`. Input order does
    /// not matter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AmbiguousGrouping`] when one rule puts two files into
    /// the same `(item_type, grouping_key, part, file_type)` slot. No partial
    /// result is returned in that case.
    pub fn group(&self, mut files: Vec<ClassifiedFile>) -> Result<Vec<Item>> {
        files.sort_by(|a, b| a.path().cmp(b.path()));

        let mut occupied: BTreeMap<(SlotKey, usize), ClassifiedFile> = BTreeMap::new();
        for file in files {
            let key = (
                file.item_type,
                file.grouping_key.clone(),
                file.effective_part(),
                file.file_type,
            );
            match occupied.entry((key, file.rule)) {
                Entry::Vacant(slot) => {
                    slot.insert(file);
                }
                Entry::Occupied(slot) => {
                    return Err(Error::AmbiguousGrouping {
                        slot: describe_slot(&slot.key().0),
                        first: slot.get().path().to_path_buf(),
                        second: file.path().to_path_buf(),
                    });
                }
            }
        }

        let mut buckets: BTreeMap<(ItemType, String), BTreeMap<u32, PartFiles>> = BTreeMap::new();
        for (((item_type, grouping_key, part, file_type), _), file) in occupied {
            buckets
                .entry((item_type, grouping_key))
                .or_default()
                .entry(part)
                .or_default()
                .entry(file_type)
                .or_default()
                .push(file);
        }

        let items: Vec<Item> = buckets
            .into_iter()
            .map(|((item_type, grouping_key), present)| {
                self.build_item(item_type, grouping_key, present)
            })
            .collect();
        debug!(handler = self.handler.id(), items = items.len(), "Grouped card");
        Ok(items)
    }

    fn build_item(
        &self,
        item_type: ItemType,
        grouping_key: String,
        mut present: BTreeMap<u32, PartFiles>,
    ) -> Item {
        let observed = present.keys().next_back().copied().unwrap_or(1);
        let declared = self.absences.max_part(item_type, &grouping_key).unwrap_or(1);
        let part_count = observed.max(declared);

        let parts = (1..=part_count)
            .map(|part_num| {
                let mut slots: BTreeMap<FileType, Slot> = present
                    .remove(&part_num)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|(file_type, files)| (file_type, Slot::Present(files)))
                    .collect();

                for (part, file_type) in self.absences.slots_for(item_type, &grouping_key) {
                    if part != part_num {
                        continue;
                    }
                    match slots.entry(file_type) {
                        Entry::Vacant(slot) => {
                            slot.insert(Slot::DeclaredAbsent);
                        }
                        Entry::Occupied(slot) => {
                            debug!(
                                file = %slot.get().files().first().map_or_else(String::new, |f| f.path().display().to_string()),
                                "Known-missing file is present, ignoring errata entry"
                            );
                        }
                    }
                }
                for file_type in self.handler.required(item_type) {
                    slots.entry(file_type).or_insert(Slot::Missing);
                }

                trace!(key = %grouping_key, part = part_num, slots = slots.len(), "Built part");
                Part { part_num, slots }
            })
            .collect();

        Item {
            item_type,
            grouping_key,
            parts,
        }
    }
}
