//! Local directory watcher: translates filesystem events under the cache
//! root into sync-queue enqueues. A created file gets the highest priority
//! (it has no remote copy at all yet); a modification or delete is
//! lower-priority but still ahead of poller-driven downloads.

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use sbx_core::types::{VirtualPath, PRIORITY_MODIFIED, PRIORITY_NEW_FILE};
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

use crate::engine::SyncEngine;
use crate::state::METADATA_FILE_NAME;

/// Start watching `cache_root` for changes, enqueueing uploads/deletes on
/// `engine`. The returned `RecommendedWatcher` must be kept alive for the
/// duration of the watch; dropping it stops delivery.
pub fn start(cache_root: &Path, engine: Arc<SyncEngine>) -> notify::Result<RecommendedWatcher> {
    let root = cache_root.to_path_buf();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => handle_event(&root, &engine, event),
        Err(e) => warn!("filesystem watcher error: {e}"),
    })?;
    watcher.watch(cache_root, RecursiveMode::Recursive)?;
    Ok(watcher)
}

fn handle_event(root: &Path, engine: &Arc<SyncEngine>, event: Event) {
    match event.kind {
        EventKind::Create(_) => {
            for path in event.paths {
                if let Some(vpath) = to_vpath(root, &path) {
                    engine.enqueue_upload(vpath, PRIORITY_NEW_FILE);
                }
            }
        }
        EventKind::Modify(_) => {
            for path in event.paths {
                if let Some(vpath) = to_vpath(root, &path) {
                    engine.enqueue_upload(vpath, PRIORITY_MODIFIED);
                }
            }
        }
        EventKind::Remove(_) => {
            for path in event.paths {
                if let Some(vpath) = to_vpath(root, &path) {
                    engine.enqueue_delete(vpath);
                }
            }
        }
        _ => {}
    }
}

/// Map an absolute cache-relative path to a `VirtualPath`, filtering out our
/// own bookkeeping files and in-progress atomic-write temp files so they
/// never loop back into the sync queue.
fn to_vpath(root: &Path, path: &Path) -> Option<VirtualPath> {
    let rel = path.strip_prefix(root).ok()?;
    let name = rel.file_name()?.to_str()?;
    if name == METADATA_FILE_NAME || name.ends_with(".sharebox_tmp") || name.ends_with(".json.tmp") {
        return None;
    }
    let rel_str = rel.to_string_lossy().replace('\\', "/");
    Some(VirtualPath::new(format!("/{rel_str}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_sidecar_is_filtered() {
        let root = Path::new("/cache");
        let path = root.join(METADATA_FILE_NAME);
        assert!(to_vpath(root, &path).is_none());
    }

    #[test]
    fn tmp_files_are_filtered() {
        let root = Path::new("/cache");
        assert!(to_vpath(root, &root.join("report.pdf.sharebox_tmp")).is_none());
    }

    #[test]
    fn ordinary_file_maps_to_virtual_path() {
        let root = Path::new("/cache");
        let vpath = to_vpath(root, &root.join("docs/report.pdf")).unwrap();
        assert_eq!(vpath.as_str(), "/docs/report.pdf");
    }
}
