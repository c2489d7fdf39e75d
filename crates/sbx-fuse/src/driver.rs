//! FUSE filesystem driver: mounts the local cache directory as a POSIX
//! filesystem, synchronously pulling a file down on first access and
//! pushing writes back out through the sync engine's upload queue.
//!
//! Unlike a read-only hydration cache, the mounted tree *is* the cache
//! directory: every read, write, rename, and permission change lands on a
//! real file under `cache_root` first, and the sync engine reconciles that
//! directory with the remote bucket in the background. The only callback
//! that blocks on the network is `getattr`/`open` on a cache miss, and even
//! that is bounded by a timeout so a stalled connection degrades to ENOENT
//! rather than hanging the caller.

use std::collections::{HashMap, HashSet};
use std::ffi::OsStr;
use std::fs::Metadata;
use std::num::NonZeroU32;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::{FileExt, MetadataExt, OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use fuse3::path::prelude::*;
use fuse3::{Errno, FileType, MountOptions, SetAttr};
use futures_util::stream;
use sbx_core::error::FsError;
use sbx_core::types::{MountSpec, VirtualPath};
use sbx_sync::SyncEngine;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Translate a VFS-layer error into the errno handed back to the kernel.
fn errno_of(e: FsError) -> Errno {
    Errno::from(e.to_errno())
}

/// TTL for positive dentry/attr cache entries handed back to the kernel.
const ATTR_TTL: Duration = Duration::from_secs(1);

/// How long `getattr`/`open` waits for a synchronous cache-fill download
/// before giving up and reporting the path as absent.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(10);

/// An open file: the real cache-backed descriptor plus whether any write
/// has happened on it since it was opened, which gates whether `flush`/
/// `release` enqueue an upload.
struct OpenFile {
    vpath: VirtualPath,
    file: Arc<std::fs::File>,
    dirty: AtomicBool,
}

/// The FUSE filesystem driver.
pub struct ShareBoxFs {
    cache_root: PathBuf,
    engine: Arc<SyncEngine>,
    uid: u32,
    gid: u32,
    handles: Mutex<HashMap<u64, Arc<OpenFile>>>,
    next_fh: AtomicU64,
    mount_time: SystemTime,
}

impl ShareBoxFs {
    pub fn new(cache_root: PathBuf, engine: Arc<SyncEngine>) -> Self {
        let (uid, gid) = unsafe { (libc::getuid(), libc::getgid()) };
        ShareBoxFs {
            cache_root,
            engine,
            uid,
            gid,
            handles: Mutex::new(HashMap::new()),
            next_fh: AtomicU64::new(1),
            mount_time: SystemTime::now(),
        }
    }

    fn cache_path(&self, vpath_str: &str) -> PathBuf {
        self.cache_root.join(vpath_str.trim_start_matches('/'))
    }

    fn to_vpath(&self, path_str: &str) -> VirtualPath {
        VirtualPath::new(path_str)
    }

    fn attr_from_metadata(&self, meta: &Metadata) -> FileAttr {
        let kind = if meta.is_dir() {
            FileType::Directory
        } else {
            FileType::RegularFile
        };
        let perm = (meta.permissions().mode() & 0o7777) as u16;
        let ctime = UNIX_EPOCH + Duration::new(meta.ctime().max(0) as u64, meta.ctime_nsec().max(0) as u32);
        FileAttr {
            size: meta.size(),
            blocks: meta.blocks(),
            atime: meta.accessed().unwrap_or(self.mount_time),
            mtime: meta.modified().unwrap_or(self.mount_time),
            ctime,
            #[cfg(target_os = "macos")]
            crtime: meta.created().unwrap_or(self.mount_time),
            kind,
            perm,
            nlink: meta.nlink() as u32,
            uid: self.uid,
            gid: self.gid,
            rdev: 0,
            blksize: meta.blksize() as u32,
            #[cfg(target_os = "macos")]
            flags: 0,
        }
    }

    fn root_attr(&self) -> FileAttr {
        FileAttr {
            size: 0,
            blocks: 0,
            atime: self.mount_time,
            mtime: self.mount_time,
            ctime: self.mount_time,
            #[cfg(target_os = "macos")]
            crtime: self.mount_time,
            kind: FileType::Directory,
            perm: 0o755,
            nlink: 2,
            uid: self.uid,
            gid: self.gid,
            rdev: 0,
            blksize: 4096,
            #[cfg(target_os = "macos")]
            flags: 0,
        }
    }

    /// Resolve `path_str` to a `FileAttr`, synchronously pulling the file
    /// down from the remote bucket on a cache miss. If the object exists
    /// remotely but the bounded download doesn't finish in time, synthesizes
    /// a placeholder stat rather than reporting the path absent. Returns
    /// `ENOENT` only when the path exists neither locally nor remotely.
    async fn resolve_attr(&self, path_str: &str) -> fuse3::Result<FileAttr> {
        if path_str == "/" {
            return Ok(self.root_attr());
        }

        let disk_path = self.cache_path(path_str);
        if let Ok(meta) = tokio::fs::symlink_metadata(&disk_path).await {
            return Ok(self.attr_from_metadata(&meta));
        }

        let vpath = self.to_vpath(path_str);
        if self
            .engine
            .download_file_blocking(&vpath, DOWNLOAD_TIMEOUT)
            .await
        {
            if let Ok(meta) = tokio::fs::symlink_metadata(&disk_path).await {
                return Ok(self.attr_from_metadata(&meta));
            }
        }

        if self.engine.remote_object_exists(&vpath).await {
            return Ok(self.stub_attr());
        }

        Err(Errno::from(libc::ENOENT))
    }

    /// Placeholder attributes for an object known to exist remotely whose
    /// content hasn't made it into the cache yet.
    fn stub_attr(&self) -> FileAttr {
        FileAttr {
            size: 0,
            blocks: 0,
            atime: self.mount_time,
            mtime: self.mount_time,
            ctime: self.mount_time,
            #[cfg(target_os = "macos")]
            crtime: self.mount_time,
            kind: FileType::RegularFile,
            perm: 0o644,
            nlink: 1,
            uid: self.uid,
            gid: self.gid,
            rdev: 0,
            blksize: 4096,
            #[cfg(target_os = "macos")]
            flags: 0,
        }
    }

    async fn open_handle(&self, vpath: VirtualPath, file: std::fs::File, dirty: bool) -> u64 {
        let fh = self.next_fh.fetch_add(1, Ordering::Relaxed);
        let handle = Arc::new(OpenFile {
            vpath,
            file: Arc::new(file),
            dirty: AtomicBool::new(dirty),
        });
        self.handles.lock().await.insert(fh, handle);
        fh
    }

    async fn flush_handle(&self, fh: u64) {
        let handle = self.handles.lock().await.get(&fh).cloned();
        let Some(handle) = handle else { return };
        if handle.dirty.swap(false, Ordering::AcqRel) {
            if let Err(e) = handle.file.sync_all() {
                warn!(path = %handle.vpath, "fsync failed: {e}");
            }
            self.engine
                .enqueue_upload(handle.vpath.clone(), sbx_core::types::PRIORITY_MODIFIED);
        }
    }
}

impl PathFilesystem for ShareBoxFs {
    async fn init(&self, _req: Request) -> fuse3::Result<ReplyInit> {
        debug!(cache_root = %self.cache_root.display(), "sharebox-fuse init");
        Ok(ReplyInit {
            max_write: NonZeroU32::new(128 * 1024).unwrap(),
        })
    }

    async fn destroy(&self, _req: Request) {
        info!("sharebox-fuse unmounted");
    }

    async fn getattr(
        &self,
        _req: Request,
        path: Option<&OsStr>,
        _fh: Option<u64>,
        _flags: u32,
    ) -> fuse3::Result<ReplyAttr> {
        let path_str = path.and_then(|p| p.to_str()).ok_or(Errno::from(libc::ENOENT))?;
        let attr = self.resolve_attr(path_str).await?;
        Ok(ReplyAttr {
            ttl: ATTR_TTL,
            attr,
        })
    }

    async fn setattr(
        &self,
        _req: Request,
        path: Option<&OsStr>,
        _fh: Option<u64>,
        set_attr: SetAttr,
    ) -> fuse3::Result<ReplyAttr> {
        let path_str = path.and_then(|p| p.to_str()).ok_or(Errno::from(libc::ENOENT))?;
        let disk_path = self.cache_path(path_str);

        if let Some(mode) = set_attr.mode {
            let perms = std::fs::Permissions::from_mode(mode);
            std::fs::set_permissions(&disk_path, perms).map_err(|e| errno_of(e.into()))?;
        }
        if set_attr.uid.is_some() || set_attr.gid.is_some() {
            std::os::unix::fs::chown(&disk_path, set_attr.uid, set_attr.gid)
                .map_err(|e| errno_of(e.into()))?;
        }
        if set_attr.atime.is_some() || set_attr.mtime.is_some() {
            set_times(
                &disk_path,
                set_attr.atime.map(system_time_from_timestamp),
                set_attr.mtime.map(system_time_from_timestamp),
            )
            .map_err(|e| errno_of(e.into()))?;
        }
        if let Some(size) = set_attr.size {
            let file = std::fs::OpenOptions::new()
                .write(true)
                .open(&disk_path)
                .map_err(|e| errno_of(e.into()))?;
            file.set_len(size).map_err(|e| errno_of(e.into()))?;
            self.engine.enqueue_upload(
                self.to_vpath(path_str),
                sbx_core::types::PRIORITY_MODIFIED,
            );
        }

        let meta = tokio::fs::symlink_metadata(&disk_path)
            .await
            .map_err(|e| errno_of(e.into()))?;
        Ok(ReplyAttr {
            ttl: ATTR_TTL,
            attr: self.attr_from_metadata(&meta),
        })
    }

    async fn lookup(
        &self,
        _req: Request,
        parent: &OsStr,
        name: &OsStr,
    ) -> fuse3::Result<ReplyEntry> {
        let parent_str = parent.to_str().unwrap_or("/");
        let name_str = name.to_str().ok_or(Errno::from(libc::ENOENT))?;
        let full_path = join_path(parent_str, name_str);
        let attr = self.resolve_attr(&full_path).await?;
        Ok(ReplyEntry {
            ttl: ATTR_TTL,
            attr,
        })
    }

    type DirEntryStream<'a>
        = stream::Iter<std::vec::IntoIter<fuse3::Result<DirectoryEntry>>>
    where
        Self: 'a;

    type DirEntryPlusStream<'a>
        = stream::Iter<std::vec::IntoIter<fuse3::Result<DirectoryEntryPlus>>>
    where
        Self: 'a;

    async fn readdir<'a>(
        &'a self,
        _req: Request,
        path: &'a OsStr,
        _fh: u64,
        offset: i64,
    ) -> fuse3::Result<ReplyDirectory<Self::DirEntryStream<'a>>> {
        let path_str = path.to_str().unwrap_or("/");
        let names = self.list_children(path_str).await?;

        let mut entries: Vec<fuse3::Result<DirectoryEntry>> = Vec::new();
        if offset == 0 {
            entries.push(Ok(DirectoryEntry {
                kind: FileType::Directory,
                name: ".".into(),
                offset: 1,
            }));
        }
        if offset <= 1 {
            entries.push(Ok(DirectoryEntry {
                kind: FileType::Directory,
                name: "..".into(),
                offset: 2,
            }));
        }

        let mut next_offset = 3i64;
        for (name, is_dir) in names {
            if next_offset > offset {
                entries.push(Ok(DirectoryEntry {
                    kind: if is_dir {
                        FileType::Directory
                    } else {
                        FileType::RegularFile
                    },
                    name: name.into(),
                    offset: next_offset,
                }));
            }
            next_offset += 1;
        }

        Ok(ReplyDirectory {
            entries: stream::iter(entries),
        })
    }

    async fn readdirplus<'a>(
        &'a self,
        _req: Request,
        path: &'a OsStr,
        _fh: u64,
        offset: u64,
        _lock_owner: u64,
    ) -> fuse3::Result<ReplyDirectoryPlus<Self::DirEntryPlusStream<'a>>> {
        let path_str = path.to_str().unwrap_or("/");
        let names = self.list_children(path_str).await?;
        let offset = offset as i64;

        let mut entries: Vec<fuse3::Result<DirectoryEntryPlus>> = Vec::new();
        if offset == 0 {
            entries.push(Ok(DirectoryEntryPlus {
                kind: FileType::Directory,
                name: ".".into(),
                offset: 1,
                attr: self.root_attr(),
                entry_ttl: ATTR_TTL,
                attr_ttl: ATTR_TTL,
            }));
        }
        if offset <= 1 {
            entries.push(Ok(DirectoryEntryPlus {
                kind: FileType::Directory,
                name: "..".into(),
                offset: 2,
                attr: self.root_attr(),
                entry_ttl: ATTR_TTL,
                attr_ttl: ATTR_TTL,
            }));
        }

        let mut next_offset = 3i64;
        for (name, is_dir) in names {
            let child_path = join_path(path_str, &name);
            let attr = self
                .resolve_attr(&child_path)
                .await
                .unwrap_or_else(|_| self.root_attr());
            if next_offset > offset {
                entries.push(Ok(DirectoryEntryPlus {
                    kind: if is_dir {
                        FileType::Directory
                    } else {
                        FileType::RegularFile
                    },
                    name: name.into(),
                    offset: next_offset,
                    attr,
                    entry_ttl: ATTR_TTL,
                    attr_ttl: ATTR_TTL,
                }));
            }
            next_offset += 1;
        }

        Ok(ReplyDirectoryPlus {
            entries: stream::iter(entries),
        })
    }

    async fn opendir(
        &self,
        _req: Request,
        _path: &OsStr,
        _flags: u32,
    ) -> fuse3::Result<ReplyOpen> {
        Ok(ReplyOpen { fh: 0, flags: 0 })
    }

    async fn mkdir(
        &self,
        _req: Request,
        parent: &OsStr,
        name: &OsStr,
        mode: u32,
        _umask: u32,
    ) -> fuse3::Result<ReplyEntry> {
        let parent_str = parent.to_str().unwrap_or("/");
        let name_str = name.to_str().ok_or(Errno::from(libc::ENOENT))?;
        let full_path = join_path(parent_str, name_str);
        let disk_path = self.cache_path(&full_path);

        std::fs::create_dir(&disk_path).map_err(|e| match e.kind() {
            std::io::ErrorKind::AlreadyExists => Errno::from(libc::EEXIST),
            _ => Errno::from(libc::EIO),
        })?;
        let _ = std::fs::set_permissions(&disk_path, std::fs::Permissions::from_mode(mode & 0o7777));

        let attr = self.resolve_attr(&full_path).await?;
        Ok(ReplyEntry {
            ttl: ATTR_TTL,
            attr,
        })
    }

    async fn rmdir(&self, _req: Request, parent: &OsStr, name: &OsStr) -> fuse3::Result<()> {
        let parent_str = parent.to_str().unwrap_or("/");
        let name_str = name.to_str().ok_or(Errno::from(libc::ENOENT))?;
        let full_path = join_path(parent_str, name_str);
        let disk_path = self.cache_path(&full_path);

        std::fs::remove_dir(&disk_path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Errno::from(libc::ENOENT),
            _ => Errno::from(libc::ENOTEMPTY),
        })?;

        if let Ok(children) = self.engine.list_remote_children(&full_path).await {
            for child in children {
                if !child.is_dir {
                    self.engine
                        .enqueue_delete(VirtualPath::new(join_path(&full_path, &child.name)));
                }
            }
        }
        Ok(())
    }

    async fn create(
        &self,
        _req: Request,
        parent: &OsStr,
        name: &OsStr,
        mode: u32,
        _flags: u32,
    ) -> fuse3::Result<ReplyCreated> {
        let parent_str = parent.to_str().unwrap_or("/");
        let name_str = name.to_str().ok_or(Errno::from(libc::ENOENT))?;
        let full_path = join_path(parent_str, name_str);
        let disk_path = self.cache_path(&full_path);

        if let Some(dir) = disk_path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| errno_of(e.into()))?;
        }
        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .mode(mode & 0o7777)
            .open(&disk_path)
            .map_err(|e| errno_of(e.into()))?;

        let vpath = self.to_vpath(&full_path);
        let attr = self
            .resolve_attr(&full_path)
            .await
            .unwrap_or_else(|_| self.root_attr());
        let fh = self.open_handle(vpath, file, true).await;

        Ok(ReplyCreated {
            ttl: ATTR_TTL,
            attr,
            generation: 0,
            fh,
            flags: 0,
        })
    }

    async fn open(&self, _req: Request, path: &OsStr, flags: u32) -> fuse3::Result<ReplyOpen> {
        let path_str = path.to_str().ok_or(Errno::from(libc::ENOENT))?;
        let disk_path = self.cache_path(path_str);

        if tokio::fs::symlink_metadata(&disk_path).await.is_err() {
            let vpath = self.to_vpath(path_str);
            let found = self
                .engine
                .download_file_blocking(&vpath, DOWNLOAD_TIMEOUT)
                .await;
            if !found {
                let wants_write = flags & (libc::O_WRONLY | libc::O_RDWR) as u32 != 0;
                if !wants_write {
                    return Err(Errno::from(libc::ENOENT));
                }
            }
        }

        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&disk_path)
            .map_err(|e| errno_of(e.into()))?;

        let fh = self.open_handle(self.to_vpath(path_str), file, false).await;
        Ok(ReplyOpen { fh, flags: 0 })
    }

    async fn read(
        &self,
        _req: Request,
        path: Option<&OsStr>,
        fh: u64,
        offset: u64,
        size: u32,
    ) -> fuse3::Result<ReplyData> {
        let handle = self.handles.lock().await.get(&fh).cloned();

        let file = match handle {
            Some(h) => h.file.clone(),
            None => {
                let path_str = path.and_then(|p| p.to_str()).ok_or(Errno::from(libc::EBADF))?;
                let disk_path = self.cache_path(path_str);
                let f = std::fs::OpenOptions::new()
                    .read(true)
                    .open(&disk_path)
                    .map_err(|e| errno_of(e.into()))?;
                Arc::new(f)
            }
        };

        let buf = tokio::task::spawn_blocking(move || {
            let mut buf = vec![0u8; size as usize];
            let n = file.read_at(&mut buf, offset).unwrap_or(0);
            buf.truncate(n);
            buf
        })
        .await
        .map_err(|_| Errno::from(libc::EIO))?;

        Ok(ReplyData { data: buf.into() })
    }

    async fn write(
        &self,
        _req: Request,
        _path: Option<&OsStr>,
        fh: u64,
        offset: u64,
        data: &[u8],
        _write_flags: u32,
        _flags: u32,
    ) -> fuse3::Result<ReplyWrite> {
        let handle = self
            .handles
            .lock()
            .await
            .get(&fh)
            .cloned()
            .ok_or(Errno::from(libc::EBADF))?;

        let file = handle.file.clone();
        let owned = data.to_vec();
        let written = tokio::task::spawn_blocking(move || file.write_at(&owned, offset))
            .await
            .map_err(|_| Errno::from(libc::EIO))?
            .map_err(|e| errno_of(e.into()))?;

        handle.dirty.store(true, Ordering::Release);
        Ok(ReplyWrite { written: written as u32 })
    }

    async fn flush(
        &self,
        _req: Request,
        _path: Option<&OsStr>,
        fh: u64,
        _lock_owner: u64,
    ) -> fuse3::Result<()> {
        self.flush_handle(fh).await;
        Ok(())
    }

    async fn release(
        &self,
        _req: Request,
        _path: Option<&OsStr>,
        fh: u64,
        _flags: u32,
        _lock_owner: u64,
        _flush: bool,
    ) -> fuse3::Result<()> {
        self.flush_handle(fh).await;
        self.handles.lock().await.remove(&fh);
        Ok(())
    }

    async fn unlink(&self, _req: Request, parent: &OsStr, name: &OsStr) -> fuse3::Result<()> {
        let parent_str = parent.to_str().unwrap_or("/");
        let name_str = name.to_str().ok_or(Errno::from(libc::ENOENT))?;
        let full_path = join_path(parent_str, name_str);
        let disk_path = self.cache_path(&full_path);

        std::fs::remove_file(&disk_path).map_err(|e| errno_of(e.into()))?;

        self.engine.enqueue_delete(self.to_vpath(&full_path));
        Ok(())
    }

    async fn rename(
        &self,
        _req: Request,
        parent: &OsStr,
        name: &OsStr,
        new_parent: &OsStr,
        new_name: &OsStr,
    ) -> fuse3::Result<()> {
        let parent_str = parent.to_str().unwrap_or("/");
        let name_str = name.to_str().ok_or(Errno::from(libc::ENOENT))?;
        let new_parent_str = new_parent.to_str().unwrap_or("/");
        let new_name_str = new_name.to_str().ok_or(Errno::from(libc::ENOENT))?;

        let old_path = join_path(parent_str, name_str);
        let new_path = join_path(new_parent_str, new_name_str);
        let old_disk = self.cache_path(&old_path);
        let new_disk = self.cache_path(&new_path);

        if let Some(dir) = new_disk.parent() {
            let _ = std::fs::create_dir_all(dir);
        }
        std::fs::rename(&old_disk, &new_disk).map_err(|e| errno_of(e.into()))?;

        self.engine.enqueue_delete(self.to_vpath(&old_path));
        self.engine.enqueue_upload(
            self.to_vpath(&new_path),
            sbx_core::types::PRIORITY_NEW_FILE,
        );
        Ok(())
    }

    async fn statfs(&self, _req: Request, _path: &OsStr) -> fuse3::Result<ReplyStatFs> {
        Ok(ReplyStatFs {
            blocks: 1 << 30,
            bfree: 1 << 29,
            bavail: 1 << 29,
            files: 1 << 20,
            ffree: 1 << 19,
            bsize: 4096,
            namelen: 255,
            frsize: 4096,
        })
    }
}

impl ShareBoxFs {
    /// Merge the cache directory's local entries with any remote-only
    /// children that haven't been pulled down yet, deduplicated by name.
    async fn list_children(&self, path_str: &str) -> fuse3::Result<Vec<(String, bool)>> {
        let disk_dir = self.cache_path(path_str);
        let mut seen = HashSet::new();
        let mut out = Vec::new();

        if let Ok(mut read_dir) = tokio::fs::read_dir(&disk_dir).await {
            while let Ok(Some(entry)) = read_dir.next_entry().await {
                let name = entry.file_name().to_string_lossy().into_owned();
                if name == sbx_sync::state::METADATA_FILE_NAME || name.ends_with(".sharebox_tmp") {
                    continue;
                }
                let is_dir = entry
                    .file_type()
                    .await
                    .map(|t| t.is_dir())
                    .unwrap_or(false);
                if seen.insert(name.clone()) {
                    out.push((name, is_dir));
                }
            }
        }

        if let Ok(remote) = self.engine.list_remote_children(path_str).await {
            for child in remote {
                if seen.insert(child.name.clone()) {
                    out.push((child.name, child.is_dir));
                }
            }
        }

        Ok(out)
    }
}

fn join_path(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{name}")
    } else {
        format!("{}/{name}", parent.trim_end_matches('/'))
    }
}

/// Apply `utimensat` to `path`, leaving whichever of atime/mtime is `None`
/// untouched (`UTIME_OMIT`) rather than resetting it to now.
fn set_times(
    path: &Path,
    atime: Option<SystemTime>,
    mtime: Option<SystemTime>,
) -> std::io::Result<()> {
    let c_path = std::ffi::CString::new(path.as_os_str().as_bytes())?;
    let specs = [to_timespec(atime), to_timespec(mtime)];
    let rc = unsafe {
        libc::utimensat(
            libc::AT_FDCWD,
            c_path.as_ptr(),
            specs.as_ptr(),
            libc::AT_SYMLINK_NOFOLLOW,
        )
    };
    if rc != 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

fn system_time_from_timestamp(ts: fuse3::Timestamp) -> SystemTime {
    UNIX_EPOCH + Duration::new(ts.sec.max(0) as u64, ts.nsec)
}

fn to_timespec(time: Option<SystemTime>) -> libc::timespec {
    match time {
        Some(t) => {
            let dur = t.duration_since(UNIX_EPOCH).unwrap_or_default();
            libc::timespec {
                tv_sec: dur.as_secs() as libc::time_t,
                tv_nsec: dur.subsec_nanos() as i64,
            }
        }
        None => libc::timespec {
            tv_sec: 0,
            tv_nsec: libc::UTIME_OMIT,
        },
    }
}

/// Mount configuration, built from [`MountSpec`] by the CLI binary.
pub struct MountConfig {
    pub spec: MountSpec,
    pub engine: Arc<SyncEngine>,
}

/// Mount the filesystem and block until unmounted (via `fusermount3 -u` or
/// the `sbx unmount` subcommand).
pub async fn mount(cfg: MountConfig) -> std::io::Result<()> {
    let fs = ShareBoxFs::new(cfg.spec.cache_root.clone(), cfg.engine);

    let mut opts = MountOptions::default();
    opts.fs_name("sharebox");
    opts.force_readdir_plus(true);
    if cfg.spec.allow_other {
        opts.allow_other(true);
    }
    if cfg.spec.allow_root {
        opts.allow_root(true);
    }
    if cfg.spec.default_permissions {
        opts.default_permissions(true);
    }

    info!(mountpoint = %cfg.spec.mountpoint.display(), "mounting sharebox");

    let handle = Session::new(opts)
        .mount_with_unprivileged(fs, &cfg.spec.mountpoint)
        .await?;

    handle.await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_path_at_root() {
        assert_eq!(join_path("/", "a.txt"), "/a.txt");
    }

    #[test]
    fn join_path_nested() {
        assert_eq!(join_path("/docs", "a.txt"), "/docs/a.txt");
        assert_eq!(join_path("/docs/", "a.txt"), "/docs/a.txt");
    }
}
