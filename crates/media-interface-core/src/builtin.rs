//! Built-in handlers for the devices supported out of the box.

use crate::handler::{HandlerSpec, KeySource, RuleSpec};
use crate::media::{FileType, ItemType};

/// GoPro Hero cameras with chaptered `GX`/`GH` videos in the card root.
pub const GOPRO_HERO_GENERIC_1: &str = "GoPro-Hero-Generic-1";
/// Sony ILCE-M4 style cards with `DCIM` photos and `PRIVATE/M4ROOT` clips.
pub const SONY_ILCEM4_1: &str = "Sony-ILCEM4-1";
/// Any device whose files are self-contained items.
pub const GENERIC_SINGLE_FILE_ITEMS: &str = "Generic-Single-File-Items";
/// GNSS loggers writing a track as gpx, kml and txt files sharing a stem.
pub const GNSS_TRACKER_GENERIC: &str = "GNSS-Tracker-Generic";

/// Specs of every built-in handler.
#[must_use]
pub fn specs() -> Vec<HandlerSpec> {
    vec![gopro_hero(), sony_ilcem4(), generic_single_file(), gnss_tracker()]
}

fn gopro_hero() -> HandlerSpec {
    // GX = HEVC, GH = H.264, GL = low bitrate proxy; two digit chapter then media id.
    const CHAPTERED: &str = r"^G[HX](?P<part>[0-9]{2})(?P<key>\d{4})$";
    const PROXY: &str = r"^GL(?P<part>[0-9]{2})(?P<key>\d{4})$";
    const PHOTO: &str = r"^GOPR(?P<key>\d{4})$";

    HandlerSpec::new(
        GOPRO_HERO_GENERIC_1,
        vec![
            RuleSpec::new("MP4", FileType::Video, ItemType::Video, 30)
                .with_pattern(CHAPTERED)
                .carrying_metadata(),
            RuleSpec::new("LRV", FileType::VideoPreview, ItemType::Video, 20).with_pattern(PROXY),
            RuleSpec::new("THM", FileType::ImagePreview, ItemType::Video, 10)
                .with_pattern(CHAPTERED),
            RuleSpec::new("WAV", FileType::Audio, ItemType::Video, 25)
                .with_pattern(CHAPTERED)
                .not_selectable(),
            RuleSpec::new("JPG", FileType::Image, ItemType::Image, 10)
                .with_pattern(PHOTO)
                .carrying_metadata(),
            RuleSpec::new("GPR", FileType::ImageRaw, ItemType::Image, 20)
                .with_pattern(PHOTO)
                .carrying_metadata(),
        ],
    )
    .with_required(
        ItemType::Video,
        vec![FileType::Video, FileType::VideoPreview, FileType::ImagePreview],
    )
}

fn sony_ilcem4() -> HandlerSpec {
    const PHOTO_DIR: &str = r"^DCIM/\d{3}MSDCF$";
    const CLIP_DIR: &str = r"^PRIVATE/M4ROOT/CLIP$";
    const THUMBNAIL_DIR: &str = r"^PRIVATE/M4ROOT/THMBNL$";

    HandlerSpec::new(
        SONY_ILCEM4_1,
        vec![
            RuleSpec::new("JPG", FileType::Image, ItemType::Image, 10)
                .with_directory(PHOTO_DIR)
                .grouped_by_directory()
                .carrying_metadata(),
            RuleSpec::new("ARW", FileType::ImageRaw, ItemType::Image, 20)
                .with_directory(PHOTO_DIR)
                .grouped_by_directory()
                .carrying_metadata(),
            RuleSpec::new("MP4", FileType::Video, ItemType::Video, 30)
                .with_directory(CLIP_DIR)
                .with_pattern(r"^C(?P<key>\d{4})$")
                .carrying_metadata(),
            RuleSpec::new("XML", FileType::Metadata, ItemType::Video, 0)
                .with_directory(CLIP_DIR)
                .with_pattern(r"^C(?P<key>\d{4})M01$")
                .carrying_metadata()
                .not_selectable(),
            RuleSpec::new("JPG", FileType::ImagePreview, ItemType::Video, 10)
                .with_directory(THUMBNAIL_DIR)
                .with_pattern(r"^C(?P<key>\d{4})T01$"),
        ],
    )
    .with_required(
        ItemType::Video,
        vec![FileType::Video, FileType::Metadata, FileType::ImagePreview],
    )
}

fn generic_single_file() -> HandlerSpec {
    let single = |extension: &str, file_type: FileType, item_type: ItemType| {
        RuleSpec::new(extension, file_type, item_type, 10)
            .with_key(KeySource::FileName)
            .carrying_metadata()
    };

    HandlerSpec::new(
        GENERIC_SINGLE_FILE_ITEMS,
        vec![
            single("jpg", FileType::Image, ItemType::Image),
            single("png", FileType::Image, ItemType::Image),
            single("mp4", FileType::Video, ItemType::Video),
            single("wav", FileType::Audio, ItemType::Audio),
            single("3gpp", FileType::Audio, ItemType::Audio),
        ],
    )
}

fn gnss_tracker() -> HandlerSpec {
    // Exports of one track share a stem and rank, so rule order picks the representative.
    let track = |extension: &str| {
        RuleSpec::new(extension, FileType::GnssTrack, ItemType::GnssTrack, 10).carrying_metadata()
    };

    HandlerSpec::new(
        GNSS_TRACKER_GENERIC,
        vec![track("gpx"), track("kml"), track("txt")],
    )
}
