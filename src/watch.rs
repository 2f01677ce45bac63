//! Filesystem-event adapter.
//!
//! Turns notify events into the small set of events the mover cares about and
//! decides which of them are move candidates. A create (or the
//! create-equivalent arrival half of a rename) of a regular file is a
//! candidate, and so is every file inside an arriving directory. Deletes,
//! modifications and moves are logged and dropped.

use anyhow::{Context, Result};
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Events from the watched tree, reduced to what the mover needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Created(PathBuf),
    Deleted(PathBuf),
    Modified(PathBuf),
    Moved { from: PathBuf, to: PathBuf },
}

/// Map one notify event onto zero or more `WatchEvent`s.
///
/// A rename whose destination lies under `root` also yields `Created(to)` so
/// the arrival is handled like any new file.
pub fn translate(event: &Event, root: &Path) -> Vec<WatchEvent> {
    let paths = &event.paths;
    match &event.kind {
        EventKind::Create(_) => paths.iter().cloned().map(WatchEvent::Created).collect(),
        EventKind::Remove(_) => paths.iter().cloned().map(WatchEvent::Deleted).collect(),
        EventKind::Modify(ModifyKind::Name(mode)) => translate_rename(*mode, paths, root),
        EventKind::Modify(_) => paths.iter().cloned().map(WatchEvent::Modified).collect(),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
    }
}

fn translate_rename(mode: RenameMode, paths: &[PathBuf], root: &Path) -> Vec<WatchEvent> {
    match (mode, paths) {
        (RenameMode::Both, [from, to, ..]) => {
            let mut out = vec![WatchEvent::Moved {
                from: from.clone(),
                to: to.clone(),
            }];
            if to.starts_with(root) {
                out.push(WatchEvent::Created(to.clone()));
            }
            out
        }
        (RenameMode::To, _) => paths
            .iter()
            .filter(|p| p.starts_with(root))
            .cloned()
            .map(WatchEvent::Created)
            .collect(),
        (RenameMode::From, _) => paths.iter().cloned().map(WatchEvent::Deleted).collect(),
        // Backends that can't pair the halves (e.g. FSEvents) report each side
        // separately; whichever side still exists is the arrival.
        _ => paths
            .iter()
            .map(|p| {
                if p.exists() {
                    WatchEvent::Created(p.clone())
                } else {
                    WatchEvent::Deleted(p.clone())
                }
            })
            .collect(),
    }
}

/// Return the candidate paths carried by `event`, logging the rest.
///
/// A directory that arrives in one piece (created, or moved in from outside
/// the tree) brings no per-file events, so its regular files are listed here.
pub fn candidates(event: &WatchEvent) -> Vec<PathBuf> {
    match event {
        WatchEvent::Created(p) => match fs::symlink_metadata(p) {
            Ok(meta) if meta.file_type().is_file() => vec![p.clone()],
            Ok(meta) if meta.file_type().is_dir() => {
                let files = regular_files_under(p);
                debug!(path = %p.display(), files = files.len(), "Directory arrived");
                files
            }
            _ => {
                debug!(path = %p.display(), "Created (not a regular file)");
                Vec::new()
            }
        },
        WatchEvent::Deleted(p) => {
            debug!(path = %p.display(), "Deleted");
            Vec::new()
        }
        WatchEvent::Modified(p) => {
            debug!(path = %p.display(), "Modified");
            Vec::new()
        }
        WatchEvent::Moved { from, to } => {
            debug!(from = %from.display(), to = %to.display(), "Moved");
            Vec::new()
        }
    }
}

/// Regular files already under `root`, in walk order (names sorted per directory).
pub fn scan_existing(root: &Path) -> Vec<PathBuf> {
    info!(path = %root.display(), "Scanning for existing files");
    let files = regular_files_under(root);
    info!(path = %root.display(), found = files.len(), "Scan completed");
    files
}

fn regular_files_under(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(e) => Some(e),
            Err(e) => {
                warn!(error = %e, "Skipping unreadable entry during scan");
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect()
}

/// Live recursive watch on the source root. Dropping it stops the event feed.
pub struct WatchBridge {
    root: PathBuf,
    _watcher: RecommendedWatcher,
}

impl std::fmt::Debug for WatchBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchBridge").field("root", &self.root).finish()
    }
}

impl WatchBridge {
    /// Start watching `root` recursively, forwarding translated events to `tx`.
    pub fn start(root: &Path, tx: Sender<WatchEvent>) -> Result<Self> {
        let cb_root = root.to_path_buf();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for ev in translate(&event, &cb_root) {
                    // Receiver gone means we're shutting down.
                    if tx.send(ev).is_err() {
                        return;
                    }
                }
            }
            Err(e) => warn!(error = %e, "Filesystem watch error"),
        })
        .context("create filesystem watcher")?;

        watcher
            .watch(root, RecursiveMode::Recursive)
            .with_context(|| format!("watch '{}'", root.display()))?;

        info!(path = %root.display(), "Started monitoring");
        Ok(Self {
            root: root.to_path_buf(),
            _watcher: watcher,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;
    use notify::event::{AccessKind, CreateKind, DataChange, RemoveKind};

    fn ev(kind: EventKind, paths: &[&str]) -> Event {
        paths
            .iter()
            .fold(Event::new(kind), |e, p| e.add_path(PathBuf::from(p)))
    }

    #[test]
    fn create_maps_to_created() {
        let out = translate(&ev(EventKind::Create(CreateKind::File), &["/s/a.mkv"]), Path::new("/s"));
        assert_eq!(out, vec![WatchEvent::Created("/s/a.mkv".into())]);
    }

    #[test]
    fn remove_and_data_modify_are_not_creates() {
        let root = Path::new("/s");
        assert_eq!(
            translate(&ev(EventKind::Remove(RemoveKind::File), &["/s/a"]), root),
            vec![WatchEvent::Deleted("/s/a".into())]
        );
        assert_eq!(
            translate(
                &ev(EventKind::Modify(ModifyKind::Data(DataChange::Any)), &["/s/a"]),
                root
            ),
            vec![WatchEvent::Modified("/s/a".into())]
        );
        assert!(translate(&ev(EventKind::Access(AccessKind::Any), &["/s/a"]), root).is_empty());
    }

    #[test]
    fn rename_inside_root_yields_move_and_arrival() {
        let out = translate(
            &ev(
                EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
                &["/s/a.part", "/s/a.mkv"],
            ),
            Path::new("/s"),
        );
        assert_eq!(
            out,
            vec![
                WatchEvent::Moved {
                    from: "/s/a.part".into(),
                    to: "/s/a.mkv".into()
                },
                WatchEvent::Created("/s/a.mkv".into()),
            ]
        );
    }

    #[test]
    fn rename_out_of_root_is_only_a_move() {
        let out = translate(
            &ev(
                EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
                &["/s/a.mkv", "/elsewhere/a.mkv"],
            ),
            Path::new("/s"),
        );
        assert_eq!(out.len(), 1);
        assert!(matches!(out[0], WatchEvent::Moved { .. }));
    }

    #[test]
    fn only_created_regular_files_are_candidates() {
        let dir = assert_fs::TempDir::new().unwrap();
        let f = dir.child("a.mkv");
        f.write_str("x").unwrap();
        dir.child("sub").create_dir_all().unwrap();

        assert_eq!(
            candidates(&WatchEvent::Created(f.path().to_path_buf())),
            vec![f.path().to_path_buf()]
        );
        assert!(candidates(&WatchEvent::Created(dir.child("sub").path().to_path_buf())).is_empty());
        assert!(candidates(&WatchEvent::Created(dir.path().join("gone"))).is_empty());
        assert!(candidates(&WatchEvent::Modified(f.path().to_path_buf())).is_empty());
        assert!(candidates(&WatchEvent::Deleted(f.path().to_path_buf())).is_empty());
    }

    #[test]
    fn arriving_directory_yields_its_files() {
        let dir = assert_fs::TempDir::new().unwrap();
        dir.child("Show/s01/ep2.mkv").write_str("2").unwrap();
        dir.child("Show/ep1.mkv").write_str("1").unwrap();
        dir.child("Show/extras").create_dir_all().unwrap();

        let got = candidates(&WatchEvent::Created(dir.child("Show").path().to_path_buf()));
        assert_eq!(
            got,
            vec![
                dir.child("Show/ep1.mkv").path().to_path_buf(),
                dir.child("Show/s01/ep2.mkv").path().to_path_buf(),
            ]
        );
    }

    #[test]
    fn scan_lists_files_recursively_in_walk_order() {
        let dir = assert_fs::TempDir::new().unwrap();
        dir.child("b.bin").write_str("b").unwrap();
        dir.child("a/z.bin").write_str("z").unwrap();
        dir.child("a/y.bin").write_str("y").unwrap();
        dir.child("empty").create_dir_all().unwrap();

        let found: Vec<PathBuf> = scan_existing(dir.path())
            .into_iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            found,
            vec![
                PathBuf::from("a/y.bin"),
                PathBuf::from("a/z.bin"),
                PathBuf::from("b.bin")
            ]
        );
    }
}
