//! File and item vocabulary shared by the classifier, grouping and queries.

use std::cmp::Ordering;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Role a single file plays within a media item.
///
/// Ordering follows the lexical order of the serialized tag so that sorting by
/// file type is stable regardless of declaration order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum FileType {
    /// Full quality video.
    Video,
    /// Low bitrate proxy clip.
    VideoPreview,
    /// Unprocessed sensor video.
    VideoRaw,
    /// Full quality still image.
    Image,
    /// Preview thumbnail.
    ImagePreview,
    /// Raw still image.
    ImageRaw,
    /// Audio track.
    Audio,
    /// Sidecar metadata.
    Metadata,
    /// GNSS track log.
    GnssTrack,
}

impl FileType {
    /// Tag used in responses and config files.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::VideoPreview => "video-preview",
            Self::VideoRaw => "video-raw",
            Self::Image => "image",
            Self::ImagePreview => "image-preview",
            Self::ImageRaw => "image-raw",
            Self::Audio => "audio",
            Self::Metadata => "metadata",
            Self::GnssTrack => "gnss-track",
        }
    }
}

impl Ord for FileType {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl PartialOrd for FileType {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of logical recording a file belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ItemType {
    /// A video recording, possibly split into parts.
    Video,
    /// A still photo.
    Image,
    /// A standalone audio recording.
    Audio,
    /// A GNSS track.
    GnssTrack,
}

impl ItemType {
    /// Tag used in responses and config files.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Image => "image",
            Self::Audio => "audio",
            Self::GnssTrack => "gnss-track",
        }
    }
}

impl Ord for ItemType {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl PartialOrd for ItemType {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file found on a card, before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    /// Absolute path.
    pub path: PathBuf,
    /// File name including extension.
    pub file_name: String,
    /// File name without the final extension.
    pub stem: String,
    /// Final extension without the dot, empty when there is none.
    pub extension: String,
    /// Card folder the file lives under.
    pub card_dir: PathBuf,
    /// Parent directory relative to `card_dir`, `/`-separated, empty for the card root.
    pub relative_dir: String,
}

impl ScannedFile {
    /// Describe `path` as a file on the card at `card_dir`.
    ///
    /// Returns `None` when the file name is not valid UTF-8. A path outside
    /// `card_dir` gets an empty relative directory.
    #[must_use]
    pub fn new(path: &Path, card_dir: &Path) -> Option<Self> {
        let file_name = path.file_name()?.to_str()?.to_string();
        let (stem, extension) = match file_name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => (stem.to_string(), ext.to_string()),
            _ => (file_name.clone(), String::new()),
        };

        let relative_dir = path
            .parent()
            .and_then(|parent| parent.strip_prefix(card_dir).ok())
            .map(|rel| {
                rel.components()
                    .filter_map(|c| match c {
                        Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                        _ => None,
                    })
                    .collect::<Vec<_>>()
                    .join("/")
            })
            .unwrap_or_default();

        Some(Self {
            path: path.to_path_buf(),
            file_name,
            stem,
            extension,
            card_dir: card_dir.to_path_buf(),
            relative_dir,
        })
    }
}

/// A file whose role and item membership are known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedFile {
    /// The underlying scanned file.
    pub file: ScannedFile,
    /// Role within the item.
    pub file_type: FileType,
    /// Kind of item.
    pub item_type: ItemType,
    /// Identifier shared by every file of the same recording.
    pub grouping_key: String,
    /// 1-based part ordinal, `None` for single-part conventions.
    pub part_num: Option<u32>,
    /// Relative fidelity, lower is lower quality.
    pub quality_rank: u32,
    /// Whether the file embeds the item's authoritative metadata.
    pub carries_metadata: bool,
    /// Whether the file may stand for its item in listings.
    pub selectable: bool,
    /// Index of the handler rule that matched.
    pub rule: usize,
}

impl ClassifiedFile {
    /// Absolute path of the file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.file.path
    }

    /// Part ordinal with single-part files counted as part 1.
    #[must_use]
    pub fn effective_part(&self) -> u32 {
        self.part_num.unwrap_or(1)
    }
}

/// Outcome of classifying one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// A rule matched.
    Classified(ClassifiedFile),
    /// No rule matched; kept for diagnostics only.
    Unknown(ScannedFile),
}
