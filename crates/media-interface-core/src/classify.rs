//! File classification: first matching handler rule wins.

use tracing::trace;

use crate::handler::HandlerDefinition;
use crate::media::{Classification, ClassifiedFile, ScannedFile};

/// Classify a scanned file against a handler's rules.
///
/// Files no rule accepts come back as [`Classification::Unknown`]; that is not
/// an error, callers decide whether an unknown file matters.
#[must_use]
pub fn classify(file: ScannedFile, handler: &HandlerDefinition) -> Classification {
    for (index, rule) in handler.rules().iter().enumerate() {
        let Some(extracted) = rule.extract(&file) else {
            continue;
        };
        trace!(
            file = %file.path.display(),
            handler = handler.id(),
            rule = index,
            key = %extracted.grouping_key,
            "Classified file"
        );
        let spec = rule.spec();
        return Classification::Classified(ClassifiedFile {
            file,
            file_type: spec.file_type,
            item_type: spec.item_type,
            grouping_key: extracted.grouping_key,
            part_num: extracted.part_num,
            quality_rank: spec.quality_rank,
            carries_metadata: spec.carries_metadata,
            selectable: spec.selectable,
            rule: index,
        });
    }

    trace!(file = %file.path.display(), handler = handler.id(), "No rule matched");
    Classification::Unknown(file)
}

/// Classify many files, splitting known from unknown ones.
#[must_use]
pub fn classify_all(
    files: Vec<ScannedFile>,
    handler: &HandlerDefinition,
) -> (Vec<ClassifiedFile>, Vec<ScannedFile>) {
    let mut classified = Vec::with_capacity(files.len());
    let mut unknown = Vec::new();
    for file in files {
        match classify(file, handler) {
            Classification::Classified(c) => classified.push(c),
            Classification::Unknown(u) => unknown.push(u),
        }
    }
    (classified, unknown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin;
    use crate::handler::HandlerRegistry;
    use crate::media::{FileType, ItemType};
    use std::path::Path;

    fn handler(id: &str) -> std::sync::Arc<HandlerDefinition> {
        HandlerRegistry::with_builtin()
            .expect("built-in handlers are valid")
            .get(id)
            .expect("handler registered")
    }

    fn classify_path(path: &str, card: &str, id: &str) -> Classification {
        let file = ScannedFile::new(Path::new(path), Path::new(card)).expect("utf-8 name");
        classify(file, &handler(id))
    }

    fn expect_classified(c: Classification) -> ClassifiedFile {
        match c {
            Classification::Classified(file) => file,
            Classification::Unknown(file) => panic!("{} was not classified", file.file_name),
        }
    }

    #[test]
    fn test_gopro_thumbnail() {
        let c = expect_classified(classify_path(
            "/m/gopro/001/GX010212.THM",
            "/m/gopro/001",
            builtin::GOPRO_HERO_GENERIC_1,
        ));
        assert_eq!(c.file_type, FileType::ImagePreview);
        assert_eq!(c.item_type, ItemType::Video);
        assert_eq!(c.grouping_key, "0212");
        assert_eq!(c.part_num, Some(1));
        assert!(!c.carries_metadata);
        assert!(c.selectable);
    }

    #[test]
    fn test_gopro_proxy_shares_key_with_video() {
        let proxy = expect_classified(classify_path(
            "/m/gopro/001/GL020212.LRV",
            "/m/gopro/001",
            builtin::GOPRO_HERO_GENERIC_1,
        ));
        let video = expect_classified(classify_path(
            "/m/gopro/001/GH020212.MP4",
            "/m/gopro/001",
            builtin::GOPRO_HERO_GENERIC_1,
        ));
        assert_eq!(proxy.grouping_key, video.grouping_key);
        assert_eq!(proxy.part_num, Some(2));
        assert_eq!(video.file_type, FileType::Video);
        assert!(video.carries_metadata);
        assert!(video.quality_rank > proxy.quality_rank);
    }

    #[test]
    fn test_gopro_photo_is_single_part() {
        let c = expect_classified(classify_path(
            "/m/gopro/001/GOPR0210.JPG",
            "/m/gopro/001",
            builtin::GOPRO_HERO_GENERIC_1,
        ));
        assert_eq!(c.file_type, FileType::Image);
        assert_eq!(c.item_type, ItemType::Image);
        assert_eq!(c.grouping_key, "0210");
        assert_eq!(c.part_num, None);
        assert_eq!(c.effective_part(), 1);
    }

    #[test]
    fn test_unknown_files() {
        for name in ["notes.txt", "GX010212", "GOPR0210.MOV", ".DS_Store"] {
            let path = format!("/m/gopro/001/{name}");
            assert!(
                matches!(
                    classify_path(&path, "/m/gopro/001", builtin::GOPRO_HERO_GENERIC_1),
                    Classification::Unknown(_)
                ),
                "{name} should be unknown"
            );
        }
    }

    #[test]
    fn test_sony_jpg_role_depends_on_directory() {
        let photo = expect_classified(classify_path(
            "/m/sony/A/DCIM/100MSDCF/DSC00042.JPG",
            "/m/sony/A",
            builtin::SONY_ILCEM4_1,
        ));
        assert_eq!(photo.file_type, FileType::Image);
        assert_eq!(photo.grouping_key, "DCIM/100MSDCF/DSC00042");

        let thumb = expect_classified(classify_path(
            "/m/sony/A/PRIVATE/M4ROOT/THMBNL/C0007T01.JPG",
            "/m/sony/A",
            builtin::SONY_ILCEM4_1,
        ));
        assert_eq!(thumb.file_type, FileType::ImagePreview);
        assert_eq!(thumb.item_type, ItemType::Video);
        assert_eq!(thumb.grouping_key, "0007");

        let stray = classify_path(
            "/m/sony/A/PRIVATE/M4ROOT/CLIP/C0007T01.JPG",
            "/m/sony/A",
            builtin::SONY_ILCEM4_1,
        );
        assert!(matches!(stray, Classification::Unknown(_)));
    }

    #[test]
    fn test_sony_metadata_sidecar() {
        let xml = expect_classified(classify_path(
            "/m/sony/A/PRIVATE/M4ROOT/CLIP/C0007M01.XML",
            "/m/sony/A",
            builtin::SONY_ILCEM4_1,
        ));
        assert_eq!(xml.file_type, FileType::Metadata);
        assert_eq!(xml.grouping_key, "0007");
        assert!(xml.carries_metadata);
        assert!(!xml.selectable);
    }

    #[test]
    fn test_generic_extension_is_case_insensitive() {
        let c = expect_classified(classify_path(
            "/m/phone/2024/VID_0001.MP4",
            "/m/phone/2024",
            builtin::GENERIC_SINGLE_FILE_ITEMS,
        ));
        assert_eq!(c.item_type, ItemType::Video);
        assert_eq!(c.grouping_key, "VID_0001.MP4");
    }

    #[test]
    fn test_classify_all_splits_unknown() {
        let handler = handler(builtin::GNSS_TRACKER_GENERIC);
        let files = ["a.gpx", "a.kml", "a.csv"]
            .iter()
            .map(|n| {
                ScannedFile::new(&Path::new("/m/gnss/1").join(n), Path::new("/m/gnss/1"))
                    .expect("utf-8 name")
            })
            .collect();
        let (classified, unknown) = classify_all(files, &handler);
        assert_eq!(classified.len(), 2);
        assert_eq!(unknown.len(), 1);
        assert_eq!(unknown[0].file_name, "a.csv");
    }
}
