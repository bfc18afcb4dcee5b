//! FUSE 桥适配层。
//!
//! 内核侧按 inode 号分发请求，核心按路径工作，
//! 这里维护一张 ino → 路径表做两边的翻译。
//! FUSE 的根 ino 固定为 1，对应核心的 0 号 inode，其余统一偏移 1。

use std::collections::BTreeMap;
use std::ffi::OsStr;

use fuse::{
    FileAttr, FileType, Filesystem, ReplyAttr, ReplyData, ReplyDirectory, ReplyEmpty, ReplyEntry,
    ReplyOpen, ReplyStatfs, ReplyWrite, Request, FUSE_ROOT_ID,
};
use libc::ENOENT;
use log::warn;
use time::Timespec;
use tiny_fs::{Error, FileStat, InodeKind, TinyFileSystem};

/// 内核缓存属性的时长
const TTL: Timespec = Timespec { sec: 1, nsec: 0 };

pub struct TinyFuse {
    fs: TinyFileSystem,
    /// ino → 绝对路径
    paths: BTreeMap<u64, String>,
}

impl TinyFuse {
    pub fn new(fs: TinyFileSystem) -> Self {
        let mut paths = BTreeMap::new();
        paths.insert(FUSE_ROOT_ID, String::from("/"));
        Self { fs, paths }
    }

    fn path_of(&self, ino: u64) -> Option<String> {
        self.paths.get(&ino).cloned()
    }

    fn child_path(parent: &str, name: &OsStr) -> Option<String> {
        let name = name.to_str()?;
        Some(if parent == "/" {
            format!("/{name}")
        } else {
            format!("{parent}/{name}")
        })
    }

    fn attr_of(stat: &FileStat) -> FileAttr {
        let kind = if stat.mode & 0o170000 == 0o040000 {
            FileType::Directory
        } else {
            FileType::RegularFile
        };
        FileAttr {
            ino: stat.inode as u64 + 1,
            size: stat.size,
            blocks: stat.blocks,
            atime: secs(stat.atime),
            mtime: secs(stat.mtime),
            ctime: secs(stat.ctime),
            crtime: secs(0),
            kind,
            perm: (stat.mode & 0o7777) as u16,
            nlink: stat.nlink,
            uid: stat.uid,
            gid: stat.gid,
            rdev: 0,
            flags: 0,
        }
    }

    /// 改名后修正路径表：顶替者的旧条目作废，子树整体换前缀
    fn rewrite_paths(&mut self, old: &str, new: &str) {
        let new_prefix = format!("{new}/");
        self.paths
            .retain(|_, path| path != new && !path.starts_with(&new_prefix));

        for path in self.paths.values_mut() {
            if path == old {
                *path = new.to_owned();
            } else if let Some(rest) = path.strip_prefix(old) {
                if rest.starts_with('/') {
                    let rewritten = format!("{new}{rest}");
                    *path = rewritten;
                }
            }
        }
    }
}

#[inline]
fn secs(t: u32) -> Timespec {
    Timespec {
        sec: t as i64,
        nsec: 0,
    }
}

impl Filesystem for TinyFuse {
    fn lookup(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let Some(path) = self
            .path_of(parent)
            .and_then(|p| Self::child_path(&p, name))
        else {
            return reply.error(ENOENT);
        };
        match self.fs.getattr(&path) {
            Ok(stat) => {
                let attr = Self::attr_of(&stat);
                self.paths.insert(attr.ino, path);
                reply.entry(&TTL, &attr, 0);
            }
            Err(e) => reply.error(e.errno()),
        }
    }

    fn getattr(&mut self, _req: &Request, ino: u64, reply: ReplyAttr) {
        match self
            .path_of(ino)
            .ok_or(Error::NotFound)
            .and_then(|path| self.fs.getattr(&path))
        {
            Ok(stat) => reply.attr(&TTL, &Self::attr_of(&stat)),
            Err(e) => reply.error(e.errno()),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn setattr(
        &mut self,
        _req: &Request,
        ino: u64,
        _mode: Option<u32>,
        _uid: Option<u32>,
        _gid: Option<u32>,
        size: Option<u64>,
        atime: Option<Timespec>,
        mtime: Option<Timespec>,
        _fh: Option<u64>,
        _crtime: Option<Timespec>,
        _chgtime: Option<Timespec>,
        _bkuptime: Option<Timespec>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        let Some(path) = self.path_of(ino) else {
            return reply.error(ENOENT);
        };

        if let Some(size) = size {
            if let Err(e) = self.fs.truncate(&path, size) {
                return reply.error(e.errno());
            }
        }
        if atime.is_some() || mtime.is_some() {
            let atime = atime.map(|t| t.sec.max(0) as u32);
            let mtime = mtime.map(|t| t.sec.max(0) as u32);
            if let Err(e) = self.fs.utimens(&path, atime, mtime) {
                return reply.error(e.errno());
            }
        }

        match self.fs.getattr(&path) {
            Ok(stat) => reply.attr(&TTL, &Self::attr_of(&stat)),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn mknod(
        &mut self,
        _req: &Request,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _rdev: u32,
        reply: ReplyEntry,
    ) {
        let Some(path) = self
            .path_of(parent)
            .and_then(|p| Self::child_path(&p, name))
        else {
            return reply.error(ENOENT);
        };
        match self.fs.mknod(&path).and_then(|_| self.fs.getattr(&path)) {
            Ok(stat) => {
                let attr = Self::attr_of(&stat);
                self.paths.insert(attr.ino, path);
                reply.entry(&TTL, &attr, 0);
            }
            Err(e) => reply.error(e.errno()),
        }
    }

    fn mkdir(&mut self, _req: &Request, parent: u64, name: &OsStr, _mode: u32, reply: ReplyEntry) {
        let Some(path) = self
            .path_of(parent)
            .and_then(|p| Self::child_path(&p, name))
        else {
            return reply.error(ENOENT);
        };
        match self.fs.mkdir(&path).and_then(|_| self.fs.getattr(&path)) {
            Ok(stat) => {
                let attr = Self::attr_of(&stat);
                self.paths.insert(attr.ino, path);
                reply.entry(&TTL, &attr, 0);
            }
            Err(e) => reply.error(e.errno()),
        }
    }

    fn unlink(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let Some(path) = self
            .path_of(parent)
            .and_then(|p| Self::child_path(&p, name))
        else {
            return reply.error(ENOENT);
        };
        match self.fs.unlink(&path) {
            Ok(()) => {
                self.paths.retain(|_, p| p != &path);
                reply.ok();
            }
            Err(e) => reply.error(e.errno()),
        }
    }

    fn rmdir(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let Some(path) = self
            .path_of(parent)
            .and_then(|p| Self::child_path(&p, name))
        else {
            return reply.error(ENOENT);
        };
        match self.fs.rmdir(&path) {
            Ok(()) => {
                self.paths.retain(|_, p| p != &path);
                reply.ok();
            }
            Err(e) => reply.error(e.errno()),
        }
    }

    fn rename(
        &mut self,
        _req: &Request,
        parent: u64,
        name: &OsStr,
        newparent: u64,
        newname: &OsStr,
        reply: ReplyEmpty,
    ) {
        let old = self
            .path_of(parent)
            .and_then(|p| Self::child_path(&p, name));
        let new = self
            .path_of(newparent)
            .and_then(|p| Self::child_path(&p, newname));
        let (Some(old), Some(new)) = (old, new) else {
            return reply.error(ENOENT);
        };
        match self.fs.rename(&old, &new) {
            Ok(()) => {
                self.rewrite_paths(&old, &new);
                reply.ok();
            }
            Err(e) => reply.error(e.errno()),
        }
    }

    fn open(&mut self, _req: &Request, ino: u64, flags: u32, reply: ReplyOpen) {
        match self.path_of(ino).map(|path| self.fs.open(&path)) {
            // 打开标志塞进 fh 带给后续的 write，核心不存打开文件表
            Some(Ok(())) => reply.opened(u64::from(flags), flags),
            Some(Err(e)) => reply.error(e.errno()),
            None => reply.error(ENOENT),
        }
    }

    fn read(&mut self, _req: &Request, ino: u64, _fh: u64, offset: i64, size: u32, reply: ReplyData) {
        let Some(path) = self.path_of(ino) else {
            return reply.error(ENOENT);
        };
        let mut buf = vec![0u8; size as usize];
        match self.fs.read(&path, &mut buf, offset.max(0) as u64) {
            Ok(n) => reply.data(&buf[..n]),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn write(
        &mut self,
        _req: &Request,
        ino: u64,
        fh: u64,
        offset: i64,
        data: &[u8],
        _flags: u32,
        reply: ReplyWrite,
    ) {
        let Some(path) = self.path_of(ino) else {
            return reply.error(ENOENT);
        };
        let append = fh as u32 & libc::O_APPEND as u32 != 0;
        match self.fs.write(&path, data, offset.max(0) as u64, append) {
            Ok(n) => reply.written(n as u32),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn flush(&mut self, _req: &Request, _ino: u64, _fh: u64, _lock_owner: u64, reply: ReplyEmpty) {
        // 每个操作都已当场落盘
        reply.ok();
    }

    fn release(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        _flags: u32,
        _lock_owner: u64,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        if let Some(path) = self.path_of(ino) {
            let _ = self.fs.release(&path);
        }
        reply.ok();
    }

    fn opendir(&mut self, _req: &Request, ino: u64, flags: u32, reply: ReplyOpen) {
        match self.path_of(ino).map(|path| self.fs.opendir(&path)) {
            Some(Ok(())) => reply.opened(0, flags),
            Some(Err(e)) => reply.error(e.errno()),
            None => reply.error(ENOENT),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let Some(path) = self.path_of(ino) else {
            return reply.error(ENOENT);
        };

        let mut entries: Vec<(u64, FileType, String)> = Vec::new();
        let result = self.fs.readdir(&path, |name, inode_num, kind| {
            let kind = match kind {
                InodeKind::Directory => FileType::Directory,
                InodeKind::File => FileType::RegularFile,
            };
            entries.push((inode_num as u64 + 1, kind, name.to_owned()));
            false
        });
        if let Err(e) = result {
            return reply.error(e.errno());
        }

        for (i, (ino, kind, name)) in entries.into_iter().enumerate().skip(offset.max(0) as usize) {
            // i + 1 是下一条目录项的偏移
            if reply.add(ino, (i + 1) as i64, kind, name) {
                warn!("readdir reply buffer full at entry {i}");
                break;
            }
        }
        reply.ok();
    }

    fn releasedir(&mut self, _req: &Request, ino: u64, _fh: u64, _flags: u32, reply: ReplyEmpty) {
        if let Some(path) = self.path_of(ino) {
            let _ = self.fs.releasedir(&path);
        }
        reply.ok();
    }

    fn statfs(&mut self, _req: &Request, _ino: u64, reply: ReplyStatfs) {
        match self.fs.statfs() {
            Ok(st) => reply.statfs(
                st.total_blocks,
                st.free_blocks,
                st.free_blocks,
                st.total_inodes,
                st.free_inodes,
                st.block_size,
                st.name_max,
                st.block_size,
            ),
            Err(e) => reply.error(e.errno()),
        }
    }
}
