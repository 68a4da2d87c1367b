//! List and get queries, and the response envelope.

use std::cmp::Reverse;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::classify::{classify, classify_all};
use crate::context::{MediaContext, RootContext};
use crate::error::{Error, ErrorKind, Result};
use crate::fs::FileSystem;
use crate::group::{GroupEngine, Item};
use crate::media::{Classification, ClassifiedFile, FileType, ItemType, ScannedFile};
use crate::scan::{CardScan, scan_card, scan_cards, scan_loose_files};

/// Value of the response envelope's `data_type` field.
pub const RESPONSE_DATA_TYPE: &str = "source_media_interface_api";

/// Which end of the quality order a listing picks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    /// Smallest files, for previews.
    Lowest,
    /// Best available files.
    Highest,
}

/// A validated query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryRequest {
    /// One representative per item at or under a directory.
    List {
        /// Card or directory inside a card.
        path: PathBuf,
        /// Representative selection.
        quality: Quality,
    },
    /// Every file of the item a file belongs to.
    Get {
        /// Any file of the item.
        path: PathBuf,
    },
}

/// One file in a response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileEntry {
    /// Absolute path.
    pub file_path: PathBuf,
    /// Role within the item.
    pub file_type: FileType,
    /// Kind of item.
    pub item_type: ItemType,
    /// Where the item's metadata lives when this file carries none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_file: Option<PathBuf>,
    /// Number of parts of the item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_count: Option<u32>,
    /// Part this file belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_num: Option<u32>,
}

impl FileEntry {
    fn new(file: &ClassifiedFile, item: &Item, with_parts: bool) -> Self {
        let part_num = file.effective_part();
        let metadata_file = if file.carries_metadata {
            None
        } else {
            item.metadata_file(part_num).map(|m| m.path().to_path_buf())
        };
        Self {
            file_path: file.path().to_path_buf(),
            file_type: file.file_type,
            item_type: file.item_type,
            metadata_file,
            part_count: with_parts.then(|| item.part_count()),
            part_num: with_parts.then_some(part_num),
        }
    }
}

/// Uniform result of every query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueryResponse {
    /// Always [`RESPONSE_DATA_TYPE`].
    pub data_type: String,
    /// Version of this tool.
    pub version: String,
    /// Whether the query succeeded.
    pub command_success: bool,
    /// Matching files; empty on failure.
    pub file_list: Vec<FileEntry>,
    /// Failure description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Category of the failure, not part of the JSON.
    #[serde(skip)]
    pub error_kind: Option<ErrorKind>,
}

impl QueryResponse {
    /// A successful response.
    #[must_use]
    pub fn success(file_list: Vec<FileEntry>) -> Self {
        Self {
            data_type: RESPONSE_DATA_TYPE.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            command_success: true,
            file_list,
            error: None,
            error_kind: None,
        }
    }

    /// A failed response.
    #[must_use]
    pub fn failure(error: impl ToString) -> Self {
        Self {
            data_type: RESPONSE_DATA_TYPE.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            command_success: false,
            file_list: Vec::new(),
            error: Some(error.to_string()),
            error_kind: None,
        }
    }

    /// A failed response for a query error.
    #[must_use]
    pub fn from_error(error: &Error) -> Self {
        Self::failure(error).with_error_kind(error.kind())
    }

    /// Record the failure category.
    #[must_use]
    pub fn with_error_kind(mut self, kind: ErrorKind) -> Self {
        self.error_kind = Some(kind);
        self
    }

    /// Serialize as a single line of JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// The selectable file under `dir` that best matches `quality`.
fn representative<'i>(item: &'i Item, quality: Quality, dir: &Path) -> Option<&'i ClassifiedFile> {
    let candidates = item
        .files()
        .filter(|f| f.selectable && f.path().starts_with(dir));
    match quality {
        Quality::Lowest => candidates.min_by_key(|f| {
            (
                f.quality_rank,
                f.file_type,
                f.effective_part(),
                f.rule,
                f.path().to_path_buf(),
            )
        }),
        Quality::Highest => candidates.min_by_key(|f| {
            (
                Reverse(f.quality_rank),
                f.file_type,
                f.effective_part(),
                f.rule,
                f.path().to_path_buf(),
            )
        }),
    }
}

/// Runs queries against a [`MediaContext`].
#[derive(Clone, Copy)]
pub struct QueryService<'a> {
    context: &'a MediaContext,
    fs: &'a dyn FileSystem,
}

impl<'a> QueryService<'a> {
    /// Create a service.
    #[must_use]
    pub const fn new(context: &'a MediaContext, fs: &'a dyn FileSystem) -> Self {
        Self { context, fs }
    }

    /// Run a request, capturing every failure in the response.
    #[must_use]
    pub fn execute(&self, request: &QueryRequest) -> QueryResponse {
        let result = match request {
            QueryRequest::List { path, quality } => self.list(path, *quality),
            QueryRequest::Get { path } => self.get(path),
        };
        match result {
            Ok(files) => {
                info!(files = files.len(), "Query succeeded");
                QueryResponse::success(files)
            }
            Err(e) => {
                warn!(error = %e, "Query failed");
                QueryResponse::from_error(&e)
            }
        }
    }

    /// One representative per item with files at or under `path`, sorted by path.
    ///
    /// `path` may be a root location, a card or a directory inside a card.
    /// Items are grouped over their whole card but only files under `path`
    /// can represent them. Unknown files are skipped and incomplete items are
    /// still listed.
    ///
    /// # Errors
    ///
    /// Fails when `path` does not exist, is not a directory, is not under a
    /// usable root, when its card cannot be read, or when two files of a
    /// scanned card occupy the same slot.
    pub fn list(&self, path: &Path, quality: Quality) -> Result<Vec<FileEntry>> {
        let dir = self.canonicalize(path)?;
        if !self.fs.metadata(&dir)?.is_dir {
            return Err(Error::NotADirectory { path: dir });
        }
        let root = self.root_for(&dir)?;
        let (handler, errata) = root.resolved()?;
        info!(path = %dir.display(), handler = handler.id(), ?quality, "Listing");

        let scans = match root.card_for_dir(&dir) {
            Some(card) => vec![scan_card(self.fs, &card)?],
            None => self.scan_location(root)?,
        };

        let mut entries = Vec::new();
        for CardScan {
            card_dir, files, ..
        } in scans
        {
            let (classified, unknown) = classify_all(files, handler);
            if !unknown.is_empty() {
                debug!(card = %card_dir.display(), unknown = unknown.len(), "Skipped unknown files");
            }
            let items =
                GroupEngine::new(handler, errata.for_card(&card_dir)).group(classified)?;

            for item in items.iter().filter(|i| i.has_file_under(&dir)) {
                if !item.is_complete() {
                    warn!(
                        item = %item.describe(),
                        missing = %item.missing_slots().join(", "),
                        "Item is incomplete"
                    );
                }
                match representative(item, quality, &dir) {
                    Some(file) => entries.push(FileEntry::new(file, item, item.is_multi_part())),
                    None => debug!(item = %item.describe(), "No selectable file"),
                }
            }
        }

        entries.sort_by(|a, b| a.file_path.cmp(&b.file_path));
        Ok(entries)
    }

    /// Every file of the item `path` belongs to, by part then quality.
    ///
    /// Files inside a card are grouped with the rest of that card. A loose
    /// file directly in a root location is only grouped with its loose siblings.
    ///
    /// # Errors
    ///
    /// Fails when `path` does not exist or is not under a usable root, when
    /// it matches no rule, when the item is ambiguous, or when a required
    /// file is absent and not declared known-missing.
    pub fn get(&self, path: &Path) -> Result<Vec<FileEntry>> {
        let file_path = self.canonicalize(path)?;
        let root = self.root_for(&file_path)?;
        let (handler, errata) = root.resolved()?;
        let unclassified = || Error::UnclassifiedFile {
            path: file_path.clone(),
            handler: handler.id().to_string(),
        };
        if !self.fs.is_file(&file_path) {
            return Err(unclassified());
        }

        let card_dir = root.card_for_file(&file_path);
        let scanned = ScannedFile::new(&file_path, &card_dir).ok_or_else(unclassified)?;
        let Classification::Classified(target) = classify(scanned, handler) else {
            return Err(unclassified());
        };
        info!(
            path = %file_path.display(),
            handler = handler.id(),
            item_type = %target.item_type,
            key = %target.grouping_key,
            "Getting item"
        );

        let scan = if card_dir == root.location() {
            scan_loose_files(self.fs, &card_dir)?
        } else {
            scan_card(self.fs, &card_dir)?
        };
        let (classified, _) = classify_all(scan.files, handler);
        let siblings: Vec<ClassifiedFile> = classified
            .into_iter()
            .filter(|f| f.item_type == target.item_type && f.grouping_key == target.grouping_key)
            .collect();

        let items = GroupEngine::new(handler, errata.for_card(&card_dir)).group(siblings)?;
        let Some(item) = items.into_iter().next() else {
            return Err(unclassified());
        };
        if !item.is_complete() {
            return Err(Error::IncompleteItem {
                item: item.describe(),
                missing: item.missing_slots(),
            });
        }

        let mut entries = Vec::new();
        for part in item.parts() {
            let mut files: Vec<&ClassifiedFile> = part.files().collect();
            files.sort_by(|a, b| {
                (a.quality_rank, a.file_type, a.rule, a.path())
                    .cmp(&(b.quality_rank, b.file_type, b.rule, b.path()))
            });
            entries.extend(files.into_iter().map(|f| FileEntry::new(f, &item, true)));
        }
        Ok(entries)
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        self.fs.canonicalize(path).map_err(|e| {
            debug!(path = %path.display(), error = %e, "Cannot resolve query path");
            Error::PathNotFound {
                path: path.to_path_buf(),
            }
        })
    }

    fn root_for(&self, path: &Path) -> Result<&'a RootContext> {
        self.context
            .resolve(path)
            .ok_or_else(|| Error::PathNotUnderKnownRoot {
                path: path.to_path_buf(),
            })
    }

    fn scan_location(&self, root: &RootContext) -> Result<Vec<CardScan>> {
        let cards: Vec<PathBuf> = self
            .fs
            .read_dir(root.location())?
            .into_iter()
            .filter(|p| self.fs.is_dir(p))
            .collect();
        debug!(location = %root.location().display(), cards = cards.len(), "Scanning cards");
        Ok(scan_cards(self.fs, &cards))
    }
}
