//! Integration tests for media-interface core workflows.
//!
//! These tests build real card layouts in temporary directories, load them
//! through an `interface_config.json` like the CLI does, and check:
//! - Lowest/highest listings of GoPro and Sony cards
//! - Whole-item lookups across chapters
//! - Known-missing files and incomplete items
//! - Ambiguous groupings and invalid handler definitions

use std::fs;
use std::path::PathBuf;

use media_interface_core::error::FileSystemError;
use media_interface_core::{
    Config, ConfigError, Error, ErrorKind, FileEntry, FileType, HandlerSpec, ItemType,
    MediaContext, Quality, QueryRequest, QueryService, RealFileSystem, RuleSpec,
};
use tempfile::TempDir;

// =============================================================================
// Test Fixtures and Utilities
// =============================================================================

/// Temporary media folder with a config file at its root.
struct TestFixture {
    _dir: TempDir,
    root: PathBuf,
}

impl TestFixture {
    fn new() -> Self {
        let dir = TempDir::new().expect("temp dir");
        let root = dir.path().canonicalize().expect("canonical temp dir");
        Self { _dir: dir, root }
    }

    fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Create empty files under `relative_dir`.
    fn touch(&self, relative_dir: &str, names: &[&str]) {
        let dir = self.path(relative_dir);
        fs::create_dir_all(&dir).expect("create dir");
        for name in names {
            fs::write(dir.join(name), b"").expect("write file");
        }
    }

    fn write_config(&self, config: &Config) -> PathBuf {
        let path = self.path("interface_config.json");
        fs::write(&path, serde_json::to_string_pretty(config).expect("serialize config"))
            .expect("write config");
        path
    }

    fn context(&self, config: &Config) -> Result<MediaContext, ConfigError> {
        let path = self.write_config(config);
        let loaded = Config::load(&RealFileSystem::new(), &path).expect("config loads");
        MediaContext::from_config(&loaded, &path, &RealFileSystem::new())
    }

    fn list(&self, context: &MediaContext, relative: &str, quality: Quality) -> Vec<FileEntry> {
        QueryService::new(context, &RealFileSystem::new())
            .list(&self.path(relative), quality)
            .expect("list succeeds")
    }

    fn get(&self, context: &MediaContext, relative: &str) -> Result<Vec<FileEntry>, Error> {
        QueryService::new(context, &RealFileSystem::new()).get(&self.path(relative))
    }
}

fn gopro_config() -> Config {
    Config::default().with_source("gopro", "cards", "GoPro-Hero-Generic-1")
}

fn file_names(entries: &[FileEntry]) -> Vec<String> {
    entries
        .iter()
        .map(|e| {
            e.file_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        })
        .collect()
}

const CHAPTERED_ITEM: [&str; 6] = [
    "GX010212.MP4",
    "GL010212.LRV",
    "GX010212.THM",
    "GX020212.MP4",
    "GL020212.LRV",
    "GX020212.THM",
];

// =============================================================================
// Listings
// =============================================================================

#[test]
fn test_gopro_card_listing_lowest() {
    let fixture = TestFixture::new();
    fixture.touch(
        "gopro/cards/001",
        &["GX010212.MP4", "GL010212.LRV", "GX010212.THM", "GOPR0210.JPG"],
    );
    let context = fixture.context(&gopro_config()).expect("valid config");

    let entries = fixture.list(&context, "gopro/cards/001", Quality::Lowest);

    let card = fixture.path("gopro/cards/001");
    assert_eq!(
        entries,
        vec![
            FileEntry {
                file_path: card.join("GOPR0210.JPG"),
                file_type: FileType::Image,
                item_type: ItemType::Image,
                metadata_file: None,
                part_count: None,
                part_num: None,
            },
            FileEntry {
                file_path: card.join("GX010212.THM"),
                file_type: FileType::ImagePreview,
                item_type: ItemType::Video,
                metadata_file: Some(card.join("GX010212.MP4")),
                part_count: None,
                part_num: None,
            },
        ]
    );
}

#[test]
fn test_quality_tiers_differ_and_repeat() {
    let fixture = TestFixture::new();
    fixture.touch("gopro/cards/001", &CHAPTERED_ITEM);
    fixture.touch("gopro/cards/001", &["GOPR0210.JPG", "GOPR0210.GPR"]);
    let context = fixture.context(&gopro_config()).expect("valid config");

    let lowest = fixture.list(&context, "gopro/cards/001", Quality::Lowest);
    let highest = fixture.list(&context, "gopro/cards/001", Quality::Highest);

    assert_eq!(file_names(&lowest), vec!["GOPR0210.JPG", "GX010212.THM"]);
    assert_eq!(file_names(&highest), vec!["GOPR0210.GPR", "GX010212.MP4"]);
    for (low, high) in lowest.iter().zip(&highest) {
        assert_ne!(low.file_path, high.file_path);
    }
    assert_eq!(
        lowest,
        fixture.list(&context, "gopro/cards/001", Quality::Lowest)
    );
    assert_eq!(
        highest,
        fixture.list(&context, "gopro/cards/001", Quality::Highest)
    );
    assert_eq!(highest[1].part_count, Some(2));
    assert_eq!(highest[1].part_num, Some(1));
}

#[test]
fn test_unknown_files_do_not_fail_listing() {
    let fixture = TestFixture::new();
    fixture.touch("gopro/cards/001", &["GOPR0210.JPG", "MISC.TXT", "GX.MP4"]);
    fixture.touch("gopro/cards/001/MISC", &["SETTINGS.BIN"]);
    let context = fixture.context(&gopro_config()).expect("valid config");

    let entries = fixture.list(&context, "gopro/cards/001", Quality::Lowest);
    assert_eq!(file_names(&entries), vec!["GOPR0210.JPG"]);
}

#[test]
fn test_sony_card_listing() {
    let fixture = TestFixture::new();
    fixture.touch("sony/cards/A/DCIM/100MSDCF", &["DSC00001.JPG", "DSC00001.ARW"]);
    fixture.touch("sony/cards/A/DCIM/101MSDCF", &["DSC00001.JPG"]);
    fixture.touch("sony/cards/A/PRIVATE/M4ROOT/CLIP", &["C0001.MP4", "C0001M01.XML"]);
    fixture.touch("sony/cards/A/PRIVATE/M4ROOT/THMBNL", &["C0001T01.JPG"]);
    let config = Config::default().with_source("sony", "cards", "Sony-ILCEM4-1");
    let context = fixture.context(&config).expect("valid config");

    let highest = fixture.list(&context, "sony/cards/A", Quality::Highest);
    assert_eq!(
        file_names(&highest),
        vec!["DSC00001.ARW", "DSC00001.JPG", "C0001.MP4"]
    );

    let photos = fixture.list(&context, "sony/cards/A/DCIM/100MSDCF", Quality::Lowest);
    assert_eq!(file_names(&photos), vec!["DSC00001.JPG"]);

    // The clip's thumbnail lives outside CLIP, so the video stands in for it.
    let clips = fixture.list(&context, "sony/cards/A/PRIVATE/M4ROOT/CLIP", Quality::Lowest);
    assert_eq!(file_names(&clips), vec!["C0001.MP4"]);
    assert_eq!(clips[0].metadata_file, None);
}

#[cfg(unix)]
#[test]
fn test_unreadable_subdirectory_is_skipped() {
    use std::os::unix::fs::PermissionsExt;

    let fixture = TestFixture::new();
    fixture.touch("gopro/cards/001", &["GOPR0210.JPG"]);
    fixture.touch("gopro/cards/001/LOCKED", &["GOPR0300.JPG"]);
    let locked = fixture.path("gopro/cards/001/LOCKED");
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).expect("chmod");
    if fs::read_dir(&locked).is_ok() {
        // Running with privileges that ignore permissions.
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).expect("chmod");
        return;
    }

    let context = fixture.context(&gopro_config()).expect("valid config");
    let entries = fixture.list(&context, "gopro/cards/001", Quality::Lowest);
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).expect("chmod");

    assert_eq!(file_names(&entries), vec!["GOPR0210.JPG"]);
}

// =============================================================================
// Whole-item lookups
// =============================================================================

#[test]
fn test_get_chaptered_item() {
    let fixture = TestFixture::new();
    fixture.touch("gopro/cards/001", &CHAPTERED_ITEM);
    let context = fixture.context(&gopro_config()).expect("valid config");

    let entries = fixture
        .get(&context, "gopro/cards/001/GX010212.THM")
        .expect("complete item");

    assert_eq!(entries.len(), 6);
    let parts: Vec<u32> = entries.iter().filter_map(|e| e.part_num).collect();
    assert_eq!(parts, vec![1, 1, 1, 2, 2, 2]);
    assert!(entries.iter().all(|e| e.part_count == Some(2)));
    assert!(entries.iter().all(|e| e.item_type == ItemType::Video));
    let types: Vec<FileType> = entries.iter().take(3).map(|e| e.file_type).collect();
    assert_eq!(
        types,
        vec![FileType::ImagePreview, FileType::VideoPreview, FileType::Video]
    );
}

#[test]
fn test_get_from_any_file_returns_same_item() {
    let fixture = TestFixture::new();
    fixture.touch("gopro/cards/001", &CHAPTERED_ITEM);
    fixture.touch("gopro/cards/001", &["GX030212.MP4", "GL030212.LRV", "GX030212.THM"]);
    let context = fixture.context(&gopro_config()).expect("valid config");

    let reference = fixture
        .get(&context, "gopro/cards/001/GX010212.MP4")
        .expect("complete item");
    assert_eq!(reference.len(), 9);
    for name in ["GL020212.LRV", "GX030212.THM", "GX010212.THM"] {
        let entries = fixture
            .get(&context, &format!("gopro/cards/001/{name}"))
            .expect("complete item");
        assert_eq!(entries, reference, "lookup from {name}");
        assert!(entries.iter().all(|e| e.part_count == Some(3)));
    }
}

#[test]
fn test_get_photo_item() {
    let fixture = TestFixture::new();
    fixture.touch("gopro/cards/001", &["GOPR0210.JPG", "GOPR0210.GPR", "GOPR0211.JPG"]);
    let context = fixture.context(&gopro_config()).expect("valid config");

    let entries = fixture
        .get(&context, "gopro/cards/001/GOPR0210.GPR")
        .expect("complete item");
    assert_eq!(file_names(&entries), vec!["GOPR0210.JPG", "GOPR0210.GPR"]);
    assert!(entries.iter().all(|e| e.part_count == Some(1) && e.part_num == Some(1)));
}

#[test]
fn test_get_unclassified_file() {
    let fixture = TestFixture::new();
    fixture.touch("gopro/cards/001", &["GOPR0210.JPG", "README.TXT"]);
    let context = fixture.context(&gopro_config()).expect("valid config");

    let err = fixture
        .get(&context, "gopro/cards/001/README.TXT")
        .expect_err("unclassified");
    assert_eq!(err.kind(), ErrorKind::Unclassified);
}

#[test]
fn test_get_missing_and_foreign_paths() {
    let fixture = TestFixture::new();
    fixture.touch("gopro/cards/001", &["GOPR0210.JPG"]);
    fixture.touch("other", &["GOPR0210.JPG"]);
    let context = fixture.context(&gopro_config()).expect("valid config");

    let err = fixture
        .get(&context, "gopro/cards/001/GOPR9999.JPG")
        .expect_err("missing");
    assert!(matches!(err, Error::PathNotFound { .. }));

    let err = fixture
        .get(&context, "other/GOPR0210.JPG")
        .expect_err("outside roots");
    assert!(matches!(err, Error::PathNotUnderKnownRoot { .. }));
}

// =============================================================================
// Errata
// =============================================================================

#[test]
fn test_known_missing_part_keeps_item_complete() {
    let fixture = TestFixture::new();
    fixture.touch(
        "gopro/cards/001",
        &[
            "GX010212.MP4",
            "GL010212.LRV",
            "GX010212.THM",
            "GL020212.LRV",
            "GX020212.THM",
        ],
    );

    let incomplete = fixture.context(&gopro_config()).expect("valid config");
    let err = fixture
        .get(&incomplete, "gopro/cards/001/GX010212.MP4")
        .expect_err("part 2 video missing");
    match err {
        Error::IncompleteItem { missing, .. } => {
            assert_eq!(missing, vec!["part 2 video".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }

    let config = gopro_config().with_known_missing("gopro/cards/001/GX020212.MP4");
    let context = fixture.context(&config).expect("valid config");
    let entries = fixture
        .get(&context, "gopro/cards/001/GX010212.MP4")
        .expect("declared absent");
    assert_eq!(entries.len(), 5);
    assert!(entries.iter().all(|e| e.part_count == Some(2)));
    assert!(!file_names(&entries).contains(&"GX020212.MP4".to_string()));
}

#[test]
fn test_known_missing_trailing_part_extends_part_count() {
    let fixture = TestFixture::new();
    fixture.touch("gopro/cards/001", &CHAPTERED_ITEM);
    let config = gopro_config()
        .with_known_missing("gopro/cards/001/GX030212.MP4")
        .with_known_missing("gopro/cards/001/GL030212.LRV")
        .with_known_missing("gopro/cards/001/GX030212.THM");
    let context = fixture.context(&config).expect("valid config");

    let entries = fixture
        .get(&context, "gopro/cards/001/GX020212.MP4")
        .expect("declared absent");
    assert_eq!(entries.len(), 6);
    assert!(entries.iter().all(|e| e.part_count == Some(3)));

    let lowest = fixture.list(&context, "gopro/cards/001", Quality::Lowest);
    assert_eq!(lowest[0].part_count, Some(3));
}

#[test]
fn test_unclassifiable_errata_disables_only_its_root() {
    let fixture = TestFixture::new();
    fixture.touch("gopro/cards/001", &["GOPR0210.JPG"]);
    fixture.touch("gnss/2024", &["track.gpx"]);
    let config = gopro_config()
        .with_source("gnss", "", "GNSS-Tracker-Generic")
        .with_known_missing("gopro/cards/001/garbage.bin");
    let context = fixture.context(&config).expect("per-root failure");
    let fs = RealFileSystem::new();
    let service = QueryService::new(&context, &fs);

    let err = service
        .list(&fixture.path("gopro/cards/001"), Quality::Lowest)
        .expect_err("root disabled");
    assert!(matches!(
        err,
        Error::Config(ConfigError::UnclassifiedErrata { .. })
    ));

    let tracks = service
        .list(&fixture.path("gnss/2024"), Quality::Lowest)
        .expect("other root works");
    assert_eq!(file_names(&tracks), vec!["track.gpx"]);
    assert_eq!(tracks[0].file_type, FileType::GnssTrack);
}

#[test]
fn test_errata_outside_roots_fails_to_load() {
    let fixture = TestFixture::new();
    fixture.touch("gopro/cards/001", &["GOPR0210.JPG"]);
    let config = gopro_config().with_known_missing("elsewhere/GOPR0001.JPG");
    let err = fixture.context(&config).expect_err("outside roots");
    assert!(matches!(err, ConfigError::ErrataOutsideRoots { .. }));
}

// =============================================================================
// Ambiguity and handler validation
// =============================================================================

#[test]
fn test_ambiguous_slot_names_both_files() {
    let fixture = TestFixture::new();
    fixture.touch(
        "gopro/cards/001",
        &["GX010212.MP4", "GH010212.MP4", "GL010212.LRV", "GX010212.THM"],
    );
    let context = fixture.context(&gopro_config()).expect("valid config");

    let err = fixture
        .get(&context, "gopro/cards/001/GL010212.LRV")
        .expect_err("ambiguous");
    let card = fixture.path("gopro/cards/001");
    match err {
        Error::AmbiguousGrouping { first, second, .. } => {
            assert_eq!(first, card.join("GH010212.MP4"));
            assert_eq!(second, card.join("GX010212.MP4"));
        }
        other => panic!("unexpected error: {other}"),
    }

    let response = QueryService::new(&context, &RealFileSystem::new()).execute(
        &QueryRequest::List {
            path: card,
            quality: Quality::Lowest,
        },
    );
    assert!(!response.command_success);
    assert!(response.file_list.is_empty());
    let message = response.error.expect("error message");
    assert!(message.contains("GH010212.MP4") && message.contains("GX010212.MP4"));
}

#[test]
fn test_conflicting_rules_fail_before_any_query() {
    let fixture = TestFixture::new();
    fixture.touch("dashcam/cards/1", &["20240101_001.MP4"]);
    let handler = HandlerSpec::new(
        "Dashcam",
        vec![
            RuleSpec::new("MP4", FileType::Video, ItemType::Video, 30),
            RuleSpec::new("mp4", FileType::VideoPreview, ItemType::Video, 10),
        ],
    );
    let config = Config::default()
        .with_source("dashcam", "cards", "Dashcam")
        .with_handler(handler);

    let err = fixture.context(&config).expect_err("conflicting rules");
    assert_eq!(
        err,
        ConfigError::DuplicateRule {
            handler: "Dashcam".to_string(),
            first: 0,
            second: 1,
        }
    );
}

#[test]
fn test_custom_handler_from_config() {
    let fixture = TestFixture::new();
    fixture.touch(
        "dashcam/cards/1",
        &["20240101_0001_F.MP4", "20240101_0002_F.MP4", "20240101_0001_F.JPG"],
    );
    let handler = HandlerSpec::new(
        "Dashcam",
        vec![
            RuleSpec::new("MP4", FileType::Video, ItemType::Video, 30)
                .with_pattern(r"^(?P<key>\d{8})_(?P<part>[0-9]{4})_F$")
                .carrying_metadata(),
            RuleSpec::new("JPG", FileType::ImagePreview, ItemType::Video, 10)
                .with_pattern(r"^(?P<key>\d{8})_(?P<part>[0-9]{4})_F$"),
        ],
    )
    .with_required(ItemType::Video, vec![FileType::Video]);
    let config = Config::default()
        .with_source("dashcam", "cards", "Dashcam")
        .with_handler(handler);
    let context = fixture.context(&config).expect("valid config");

    let entries = fixture
        .get(&context, "dashcam/cards/1/20240101_0002_F.MP4")
        .expect("complete item");
    assert_eq!(
        file_names(&entries),
        vec!["20240101_0001_F.JPG", "20240101_0001_F.MP4", "20240101_0002_F.MP4"]
    );
    assert_eq!(
        entries[0].metadata_file,
        Some(fixture.path("dashcam/cards/1/20240101_0001_F.MP4"))
    );
}

fn trip_handler() -> HandlerSpec {
    HandlerSpec::new(
        "Trip-Cam",
        vec![
            RuleSpec::new("MP4", FileType::Video, ItemType::Video, 30)
                .with_pattern(r"^(?P<key>[a-z]+)_(?P<part>[0-9]+)$")
                .carrying_metadata(),
        ],
    )
}

#[test]
fn test_part_numbers_beyond_handler_limit_are_unknown() {
    let fixture = TestFixture::new();
    fixture.touch("trips/cards/1", &["trip_1.MP4", "trip_2.MP4", "trip_20000000.MP4"]);
    let config = Config::default()
        .with_source("trips", "cards", "Trip-Cam")
        .with_handler(trip_handler());
    let context = fixture.context(&config).expect("valid config");

    let entries = fixture.list(&context, "trips/cards/1", Quality::Lowest);
    assert_eq!(file_names(&entries), vec!["trip_1.MP4"]);
    assert_eq!(entries[0].part_count, Some(2));

    let err = fixture
        .get(&context, "trips/cards/1/trip_20000000.MP4")
        .expect_err("out of range part");
    assert_eq!(err.kind(), ErrorKind::Unclassified);
}

#[test]
fn test_raised_part_limit_allows_long_recordings() {
    let fixture = TestFixture::new();
    fixture.touch("trips/cards/1", &["trip_150.MP4"]);
    let config = Config::default()
        .with_source("trips", "cards", "Trip-Cam")
        .with_handler(trip_handler().with_max_parts(500))
        .with_known_missing("trips/cards/1/trip_151.MP4");
    let context = fixture.context(&config).expect("valid config");

    let entries = fixture.list(&context, "trips/cards/1", Quality::Highest);
    assert_eq!(entries[0].part_count, Some(151));
}

#[test]
fn test_non_numeric_part_group_fails_to_load() {
    let fixture = TestFixture::new();
    let handler = HandlerSpec::new(
        "Bad",
        vec![
            RuleSpec::new("MP4", FileType::Video, ItemType::Video, 30)
                .with_pattern(r"^(?P<key>\d{4})(?P<part>[A-Z]{2})$"),
        ],
    );
    let config = Config::default()
        .with_source("bad", "", "Bad")
        .with_handler(handler);
    fixture.touch("bad", &[]);

    assert!(matches!(
        fixture.context(&config),
        Err(ConfigError::PartialExtractor { .. })
    ));
}

#[test]
fn test_get_on_loose_file_stays_out_of_cards() {
    let fixture = TestFixture::new();
    fixture.touch("gopro/cards/001", &["GOPR0210.JPG"]);
    fixture.touch("gopro/cards", &["GOPR0210.GPR"]);
    let context = fixture.context(&gopro_config()).expect("valid config");

    let entries = fixture
        .get(&context, "gopro/cards/GOPR0210.GPR")
        .expect("loose item");
    assert_eq!(file_names(&entries), vec!["GOPR0210.GPR"]);
}

#[test]
fn test_missing_config_file() {
    let fixture = TestFixture::new();
    let err = Config::load(&RealFileSystem::new(), &fixture.path("nope.json"))
        .expect_err("missing file");
    assert!(matches!(
        err,
        Error::FileSystem(FileSystemError::NotFound { .. })
    ));
    assert_eq!(err.kind(), ErrorKind::FileSystem);
}
