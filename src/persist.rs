use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::session::AnnotationSession;

// ── CSV persistence ─────────────────────────────────────────────────────────

/// One persisted annotation row. The full five-field tuple is the uniqueness
/// key; coordinates are truncated to integers.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PointRecord {
    pub video_name: String,
    pub frame_number: usize,
    pub object_name: String,
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The session held no points at all; the filesystem was not touched.
    NoPoints,
    /// Number of rows appended. Zero means every tuple was already on disk.
    Added(usize),
}

pub fn csv_path(base: &Path, video_name: &str) -> PathBuf {
    let stem = Path::new(video_name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(video_name);
    base.join(stem).join("points.csv")
}

/// Appends the session's points for `(video_name, frame_number)` to the
/// annotation CSV, skipping every tuple already present. Safe to call
/// repeatedly on the same state: a second save appends nothing.
pub fn save_points(
    base: &Path,
    video_name: &str,
    frame_number: usize,
    session: &AnnotationSession,
) -> Result<SaveOutcome> {
    if !session.has_points() {
        return Ok(SaveOutcome::NoPoints);
    }

    let path = csv_path(base, video_name);
    let dir = path.parent().context("annotation path has no parent")?;
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;

    let exists = path.exists();
    let mut existing: HashSet<PointRecord> = HashSet::new();
    if exists {
        let mut reader = csv::Reader::from_path(&path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        for record in reader.deserialize() {
            let record: PointRecord =
                record.with_context(|| format!("malformed row in {}", path.display()))?;
            existing.insert(record);
        }
    }

    // The header is written only when the file is created; appends reuse the
    // one already on disk.
    let mut writer = if exists {
        let file = OpenOptions::new()
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open {} for append", path.display()))?;
        csv::WriterBuilder::new().has_headers(false).from_writer(file)
    } else {
        csv::WriterBuilder::new()
            .from_path(&path)
            .with_context(|| format!("failed to create {}", path.display()))?
    };

    let mut added = 0;
    for object in session.objects() {
        for &(x, y) in object.points() {
            let record = PointRecord {
                video_name: video_name.to_string(),
                frame_number,
                object_name: object.name.clone(),
                x: x as i32,
                y: y as i32,
            };
            if existing.contains(&record) {
                continue;
            }
            writer
                .serialize(&record)
                .with_context(|| format!("failed to write to {}", path.display()))?;
            // Just-written rows count as existing for the rest of this save.
            existing.insert(record);
            added += 1;
        }
    }
    writer.flush().context("failed to flush annotation csv")?;

    Ok(SaveOutcome::Added(added))
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn session_with_points() -> AnnotationSession {
        let mut session = AnnotationSession::new(640, 480);
        let cat = session.add_object();
        *session.name_mut(cat) = "cat".to_string();
        session.click(120.7, 80.2);
        session.click(200.0, 40.0);
        let dog = session.add_object();
        *session.name_mut(dog) = "dog".to_string();
        session.click(10.0, 10.0);
        session
    }

    fn read_lines(path: &Path) -> Vec<String> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn csv_path_strips_the_video_extension() {
        let path = csv_path(Path::new("annotations"), "run 01.mp4");
        assert_eq!(path, Path::new("annotations").join("run 01").join("points.csv"));
    }

    #[test]
    fn saving_twice_adds_each_tuple_exactly_once() {
        let dir = tempdir().unwrap();
        let session = session_with_points();

        let first = save_points(dir.path(), "clip.mp4", 3, &session).unwrap();
        assert_eq!(first, SaveOutcome::Added(3));

        let second = save_points(dir.path(), "clip.mp4", 3, &session).unwrap();
        assert_eq!(second, SaveOutcome::Added(0));

        let lines = read_lines(&csv_path(dir.path(), "clip.mp4"));
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "video_name,frame_number,object_name,x,y");
        assert_eq!(lines.iter().filter(|line| line.starts_with("video_name")).count(), 1);
    }

    #[test]
    fn coordinates_are_truncated_to_integers() {
        let dir = tempdir().unwrap();
        let session = session_with_points();
        save_points(dir.path(), "clip.mp4", 3, &session).unwrap();

        let lines = read_lines(&csv_path(dir.path(), "clip.mp4"));
        assert!(lines.contains(&"clip.mp4,3,cat,120,80".to_string()));
        assert!(lines.contains(&"clip.mp4,3,cat,200,40".to_string()));
        assert!(lines.contains(&"clip.mp4,3,dog,10,10".to_string()));
    }

    #[test]
    fn empty_session_touches_nothing() {
        let dir = tempdir().unwrap();
        let mut session = AnnotationSession::new(640, 480);
        session.add_object();

        let outcome = save_points(dir.path(), "clip.mp4", 0, &session).unwrap();
        assert_eq!(outcome, SaveOutcome::NoPoints);
        assert!(!csv_path(dir.path(), "clip.mp4").exists());
        assert!(!dir.path().join("clip").exists());
    }

    #[test]
    fn new_points_append_without_a_second_header() {
        let dir = tempdir().unwrap();
        let mut session = session_with_points();
        save_points(dir.path(), "clip.mp4", 3, &session).unwrap();

        session.click(50.0, 60.0);
        let outcome = save_points(dir.path(), "clip.mp4", 3, &session).unwrap();
        assert_eq!(outcome, SaveOutcome::Added(1));

        let lines = read_lines(&csv_path(dir.path(), "clip.mp4"));
        assert_eq!(lines.len(), 5);
        assert!(lines.contains(&"clip.mp4,3,dog,50,60".to_string()));
    }

    #[test]
    fn same_tuple_on_a_different_frame_is_a_new_row() {
        let dir = tempdir().unwrap();
        let session = session_with_points();
        save_points(dir.path(), "clip.mp4", 3, &session).unwrap();

        let outcome = save_points(dir.path(), "clip.mp4", 4, &session).unwrap();
        assert_eq!(outcome, SaveOutcome::Added(3));
    }

    #[test]
    fn duplicate_points_in_one_save_produce_one_row() {
        let dir = tempdir().unwrap();
        let mut session = AnnotationSession::new(640, 480);
        session.add_object();
        session.click(5.0, 5.0);
        session.click(5.2, 5.9); // truncates to the same tuple

        let outcome = save_points(dir.path(), "clip.mp4", 0, &session).unwrap();
        assert_eq!(outcome, SaveOutcome::Added(1));
    }
}
