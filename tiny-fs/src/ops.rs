//! # 操作处理层
//!
//! 桥按路径分发进来的各个操作在这里落地。时间戳遵循 POSIX 语义：
//! 读内容更新 atime；写内容更新 mtime 和 ctime；元数据变更更新 ctime；
//! 目录项增删在所属目录上同时更新 mtime 和 ctime。

use std::time::{SystemTime, UNIX_EPOCH};

use log::debug;

use crate::fs::TinyFileSystem;
use crate::index::AllocLog;
use crate::layout::{DiskInode, InodeKind, MAX_FILE_SIZE, NAME_MAX_LEN};
use crate::stat::{FileStat, FsStat};
use crate::{Error, Result, BLOCK_SIZE};

/// 当前时间，整秒。磁盘格式固定 32 位秒数，2106 年溢出是已知限制。
pub(crate) fn now() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}

impl TinyFileSystem {
    pub fn getattr(&self, path: &str) -> Result<FileStat> {
        debug!("getattr path={path:?}");
        let inode_num = self.resolve(path)?;
        let inode = self.read_inode(inode_num)?;
        Ok(self.stat_of(inode_num, &inode))
    }

    fn stat_of(&self, inode_num: u32, inode: &DiskInode) -> FileStat {
        // 占用块数以 512 字节为单位，间接索引块也占空间
        let blocks = (inode.size as u64).div_ceil(512)
            + inode.indirect_blocks_in_use() as u64 * (BLOCK_SIZE / 512) as u64;
        FileStat {
            inode: inode_num,
            mode: inode.mode,
            nlink: 1,
            uid: unsafe { libc::getuid() },
            gid: unsafe { libc::getgid() },
            size: inode.size as u64,
            atime: inode.atime,
            mtime: inode.mtime,
            ctime: inode.ctime,
            block_size: BLOCK_SIZE as u32,
            blocks,
        }
    }

    /// 逐项回调目录内容，先合成 `.` 和 `..` 再给出在用目录项。
    /// `fill` 返回 true 表示对端缓冲区已满，提前成功返回。
    pub fn readdir(
        &mut self,
        path: &str,
        mut fill: impl FnMut(&str, u32, InodeKind) -> bool,
    ) -> Result<()> {
        debug!("readdir path={path:?}");
        let inode_num = self.resolve(path)?;
        let mut dir = self.read_inode(inode_num)?;
        if !dir.is_dir() {
            return Err(Error::NotFound);
        }

        // inode 里不存父指针，`..` 现场合成
        let mut full = fill(".", inode_num, InodeKind::Directory)
            || fill("..", inode_num, InodeKind::Directory);
        if !full {
            for entry in self.dir_entries(&dir)? {
                let child = self.read_inode(entry.inode_num())?;
                if fill(entry.name(), entry.inode_num(), child.kind()) {
                    full = true;
                    break;
                }
            }
        }
        if full {
            debug!("readdir fill buffer full, stop early");
        }

        // 提前收手也算一次访问
        dir.atime = now();
        self.write_inode(inode_num, &dir)
    }

    /// 创建普通文件
    pub fn mknod(&mut self, path: &str) -> Result<()> {
        debug!("mknod path={path:?}");
        self.create(path, InodeKind::File)
    }

    /// 创建目录
    pub fn mkdir(&mut self, path: &str) -> Result<()> {
        debug!("mkdir path={path:?}");
        self.create(path, InodeKind::Directory)
    }

    fn create(&mut self, path: &str, kind: InodeKind) -> Result<()> {
        let (parent_num, name) = self.resolve_parent(path)?;
        let mut parent = self.read_inode(parent_num)?;
        if !parent.is_dir() {
            return Err(Error::NotFound);
        }
        match self.dir_lookup(&parent, name) {
            Ok(_) => return Err(Error::AlreadyExists),
            Err(Error::NotFound) => {}
            Err(e) => return Err(e),
        }

        // 先占位图位，再写初始化好的 inode，最后挂进父目录；
        // 中途失败最多泄漏一个位，不会留下从根可达的悬空结构
        let inode_num = self.alloc_inode()?;
        let mut inode = DiskInode::default();
        inode.init(kind, now());
        if let Err(e) = self
            .write_inode(inode_num, &inode)
            .and_then(|_| self.dir_insert(&mut parent, name, inode_num))
        {
            self.free_inode(inode_num)?;
            return Err(e);
        }

        let ts = now();
        parent.mtime = ts;
        parent.ctime = ts;
        self.write_inode(parent_num, &parent)
    }

    /// 删除文件：摘目录项 → 回收数据块 → 回收 inode
    pub fn unlink(&mut self, path: &str) -> Result<()> {
        debug!("unlink path={path:?}");
        self.remove_path(path)
    }

    /// 删除目录。桥保证目录已空，根目录永远不会被删；
    /// 目录自己占着的数据块同样要回收。
    pub fn rmdir(&mut self, path: &str) -> Result<()> {
        debug!("rmdir path={path:?}");
        self.remove_path(path)
    }

    fn remove_path(&mut self, path: &str) -> Result<()> {
        let (parent_num, name) = self.resolve_parent(path)?;
        let mut parent = self.read_inode(parent_num)?;
        if !parent.is_dir() {
            return Err(Error::NotFound);
        }

        let child_num = self.dir_remove(&parent, name)?;
        let mut child = self.read_inode(child_num)?;
        self.free_blocks_from(&mut child, 0)?;
        self.free_inode(child_num)?;

        let ts = now();
        parent.mtime = ts;
        parent.ctime = ts;
        self.write_inode(parent_num, &parent)
    }

    /// 移动或改名。新名字已被占用时顶替之：
    /// 非空目录报 NotEmpty，其余场景顶替者整体回收。
    pub fn rename(&mut self, old_path: &str, new_path: &str) -> Result<()> {
        debug!("rename old={old_path:?} new={new_path:?}");
        let (old_parent_num, old_name) = self.resolve_parent(old_path)?;
        let (new_parent_num, new_name) = self.resolve_parent(new_path)?;
        if old_parent_num == new_parent_num && old_name == new_name {
            return Ok(());
        }

        let old_parent = self.read_inode(old_parent_num)?;
        if !old_parent.is_dir() {
            return Err(Error::NotFound);
        }
        let child_num = self.dir_lookup(&old_parent, old_name)?;

        let mut new_parent = self.read_inode(new_parent_num)?;
        if !new_parent.is_dir() {
            return Err(Error::NotFound);
        }

        match self.dir_lookup(&new_parent, new_name) {
            Ok(victim_num) => {
                let mut victim = self.read_inode(victim_num)?;
                if victim.is_dir() && !self.dir_is_empty(&victim)? {
                    return Err(Error::NotEmpty);
                }
                self.dir_remove(&new_parent, new_name)?;
                self.free_blocks_from(&mut victim, 0)?;
                self.free_inode(victim_num)?;
            }
            Err(Error::NotFound) => {}
            Err(e) => return Err(e),
        }

        // 先挂新目录项再摘旧的，中途失败时孩子仍从旧名可达
        self.dir_insert(&mut new_parent, new_name, child_num)?;
        self.write_inode(new_parent_num, &new_parent)?;

        // 同目录改名时上面的写入已落盘，重读父目录避免覆盖
        let mut old_parent = self.read_inode(old_parent_num)?;
        self.dir_remove(&old_parent, old_name)?;

        let ts = now();
        old_parent.mtime = ts;
        old_parent.ctime = ts;
        self.write_inode(old_parent_num, &old_parent)?;

        if new_parent_num != old_parent_num {
            let mut new_parent = self.read_inode(new_parent_num)?;
            new_parent.mtime = ts;
            new_parent.ctime = ts;
            self.write_inode(new_parent_num, &new_parent)?;
        }
        Ok(())
    }

    /// 从 offset 读至多 buf.len() 字节，返回实际读到的字节数。
    /// 读不越过文件末尾；指针为 0 的洞按零字节读出。
    pub fn read(&mut self, path: &str, buf: &mut [u8], offset: u64) -> Result<usize> {
        debug!("read path={path:?} size={} offset={offset}", buf.len());
        let inode_num = self.resolve(path)?;
        let mut inode = self.read_inode(inode_num)?;

        let mut read_size = 0;
        if offset < inode.size as u64 && !buf.is_empty() {
            let end = (offset as usize + buf.len()).min(inode.size as usize);
            let mut start = offset as usize;

            while start < end {
                let block_index = start / BLOCK_SIZE;
                let block_end = ((block_index + 1) * BLOCK_SIZE).min(end);
                let in_block = block_end - start;
                let dest = &mut buf[read_size..read_size + in_block];

                let block_id = self.block_at(&inode, block_index)?;
                if block_id == 0 {
                    dest.fill(0);
                } else {
                    let block = self.read_block(block_id as usize)?;
                    dest.copy_from_slice(&block[start % BLOCK_SIZE..start % BLOCK_SIZE + in_block]);
                }

                read_size += in_block;
                start = block_end;
            }
        }

        // 越过末尾的零字节读同样算一次访问
        inode.atime = now();
        self.write_inode(inode_num, &inode)?;
        Ok(read_size)
    }

    /// 从 offset 写入 data，返回写入的字节数。
    /// `append` 置位时忽略 offset、写到文件末尾（O_APPEND 语义）。
    pub fn write(&mut self, path: &str, data: &[u8], offset: u64, append: bool) -> Result<usize> {
        debug!(
            "write path={path:?} size={} offset={offset} append={append}",
            data.len()
        );
        let inode_num = self.resolve(path)?;
        let mut inode = self.read_inode(inode_num)?;

        let offset = if append { inode.size as usize } else { offset as usize };
        if data.is_empty() {
            return Ok(0);
        }
        let end = offset + data.len();
        if end > MAX_FILE_SIZE {
            return Err(Error::FileTooLarge);
        }

        // 先把写入范围内的块全部备好，分配失败则整体回滚、
        // 文件大小保持原样
        let mut log = AllocLog::default();
        for block_index in offset / BLOCK_SIZE..=(end - 1) / BLOCK_SIZE {
            if let Err(e) = self.block_at_or_alloc(&mut inode, block_index, &mut log) {
                self.rollback_alloc(log)?;
                return Err(e);
            }
        }

        let mut written = 0;
        let mut start = offset;
        while start < end {
            let block_index = start / BLOCK_SIZE;
            let block_end = ((block_index + 1) * BLOCK_SIZE).min(end);
            let in_block = block_end - start;
            let block_id = self.block_at(&inode, block_index)?;

            // 边界块读-改-写，整块直接覆盖
            let mut block = if in_block == BLOCK_SIZE {
                [0u8; BLOCK_SIZE]
            } else {
                self.read_block(block_id as usize)?
            };
            block[start % BLOCK_SIZE..start % BLOCK_SIZE + in_block]
                .copy_from_slice(&data[written..written + in_block]);
            self.write_block(block_id as usize, &block)?;

            written += in_block;
            start = block_end;
        }

        inode.size = inode.size.max(end as u32);
        let ts = now();
        inode.mtime = ts;
        inode.ctime = ts;
        self.write_inode(inode_num, &inode)?;
        Ok(written)
    }

    /// 调整文件大小：扩大时补上新进范围的块（分配即清零），
    /// 缩小时回收尾部的块
    pub fn truncate(&mut self, path: &str, size: u64) -> Result<()> {
        debug!("truncate path={path:?} size={size}");
        if size > MAX_FILE_SIZE as u64 {
            return Err(Error::FileTooLarge);
        }
        let size = size as u32;

        let inode_num = self.resolve(path)?;
        let mut inode = self.read_inode(inode_num)?;

        if size > inode.size {
            let mut log = AllocLog::default();
            let old_blocks = DiskInode::count_data_block(inode.size);
            for block_index in old_blocks..DiskInode::count_data_block(size) {
                if let Err(e) = self.block_at_or_alloc(&mut inode, block_index, &mut log) {
                    self.rollback_alloc(log)?;
                    return Err(e);
                }
            }
        } else if size < inode.size {
            self.free_blocks_from(&mut inode, DiskInode::count_data_block(size))?;
        }

        inode.size = size;
        inode.ctime = now();
        self.write_inode(inode_num, &inode)
    }

    /// 按入参设置 atime/mtime；utimens 本身是元数据变更，ctime 取当前时间
    pub fn utimens(&mut self, path: &str, atime: Option<u32>, mtime: Option<u32>) -> Result<()> {
        debug!("utimens path={path:?} atime={atime:?} mtime={mtime:?}");
        let inode_num = self.resolve(path)?;
        let mut inode = self.read_inode(inode_num)?;
        if let Some(atime) = atime {
            inode.atime = atime;
        }
        if let Some(mtime) = mtime {
            inode.mtime = mtime;
        }
        inode.ctime = now();
        self.write_inode(inode_num, &inode)
    }

    pub fn statfs(&self) -> Result<FsStat> {
        debug!("statfs");
        let sb = self.super_block();
        Ok(FsStat {
            block_size: BLOCK_SIZE as u32,
            total_blocks: sb.num_data_blocks as u64,
            free_blocks: self.free_data_block_count()? as u64,
            total_inodes: sb.num_inodes as u64,
            free_inodes: self.free_inode_count()? as u64,
            name_max: NAME_MAX_LEN as u32,
        })
    }

    /// 没有打开文件表，open/release 族不维护任何状态，
    /// 每次操作重新解析路径即可
    pub fn open(&self, path: &str) -> Result<()> {
        debug!("open path={path:?}");
        Ok(())
    }

    pub fn release(&self, path: &str) -> Result<()> {
        debug!("release path={path:?}");
        Ok(())
    }

    pub fn opendir(&self, path: &str) -> Result<()> {
        debug!("opendir path={path:?}");
        Ok(())
    }

    pub fn releasedir(&self, path: &str) -> Result<()> {
        debug!("releasedir path={path:?}");
        Ok(())
    }
}
