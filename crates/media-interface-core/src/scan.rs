//! Card scanning.

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::error::Result;
use crate::fs::{FileSystem, ScanIssue};
use crate::media::ScannedFile;

/// Files found on one card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardScan {
    /// Card folder.
    pub card_dir: PathBuf,
    /// Files sorted by path.
    pub files: Vec<ScannedFile>,
    /// Parts of the card that were skipped.
    pub issues: Vec<ScanIssue>,
}

/// Walk one card.
///
/// # Errors
///
/// Fails only when the card folder itself cannot be read.
pub fn scan_card(fs: &dyn FileSystem, card_dir: &Path) -> Result<CardScan> {
    let walk = fs.walk_files(card_dir)?;
    let mut issues = walk.issues;
    let mut files = Vec::with_capacity(walk.files.len());

    for path in walk.files {
        if let Some(file) = ScannedFile::new(&path, card_dir) {
            files.push(file);
        } else {
            issues.push(ScanIssue {
                path,
                reason: "file name is not valid UTF-8".to_string(),
            });
        }
    }
    for issue in &issues {
        warn!(path = %issue.path.display(), reason = %issue.reason, "Skipped unreadable entry");
    }

    debug!(card = %card_dir.display(), files = files.len(), "Scanned card");
    Ok(CardScan {
        card_dir: card_dir.to_path_buf(),
        files,
        issues,
    })
}

/// Files directly inside `dir`, without descending into subdirectories.
///
/// # Errors
///
/// Fails when `dir` cannot be read.
pub fn scan_loose_files(fs: &dyn FileSystem, dir: &Path) -> Result<CardScan> {
    let mut files = Vec::new();
    let mut issues = Vec::new();
    for path in fs.read_dir(dir)?.into_iter().filter(|p| fs.is_file(p)) {
        match ScannedFile::new(&path, dir) {
            Some(file) => files.push(file),
            None => issues.push(ScanIssue {
                path,
                reason: "file name is not valid UTF-8".to_string(),
            }),
        }
    }
    debug!(dir = %dir.display(), files = files.len(), "Scanned loose files");
    Ok(CardScan {
        card_dir: dir.to_path_buf(),
        files,
        issues,
    })
}

/// Walk several cards in parallel.
///
/// Results are returned in card path order. A card that cannot be read at all
/// yields an empty scan carrying the failure as an issue.
#[must_use]
pub fn scan_cards(fs: &dyn FileSystem, card_dirs: &[PathBuf]) -> Vec<CardScan> {
    let mut scans: Vec<CardScan> = card_dirs
        .par_iter()
        .map(|card_dir| {
            scan_card(fs, card_dir).unwrap_or_else(|e| {
                warn!(card = %card_dir.display(), error = %e, "Skipped unreadable card");
                CardScan {
                    card_dir: card_dir.clone(),
                    files: Vec::new(),
                    issues: vec![ScanIssue {
                        path: card_dir.clone(),
                        reason: e.to_string(),
                    }],
                }
            })
        })
        .collect();
    scans.sort_by(|a, b| a.card_dir.cmp(&b.card_dir));
    scans
}
