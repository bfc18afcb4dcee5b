//! # 目录存储层
//!
//! 目录内容是按块排布的定长目录项数组：每块 136 项，块尾不用。
//! 目录的 `size` 是历史上用过的槽位数乘以项大小，只增不减，
//! 扫描因此总能覆盖所有可能在用的槽位；删除只把槽位清零留待复用。

use crate::fs::TinyFileSystem;
use crate::index::AllocLog;
use crate::layout::{DirEntry, DiskInode, ENTRIES_PER_BLOCK, ENTRY_SIZE};
use crate::{Error, Result};

impl TinyFileSystem {
    /// 目录当前的槽位总数
    #[inline]
    fn dir_slots(dir: &DiskInode) -> usize {
        dir.size as usize / ENTRY_SIZE
    }

    /// 逐项扫描目录，`visit` 返回 Some 时提前结束。
    /// 指针为 0 的块整块视作空槽，扫描时直接跳过。
    fn scan_dir<T>(
        &self,
        dir: &DiskInode,
        mut visit: impl FnMut(usize, &DirEntry) -> Option<T>,
    ) -> Result<Option<T>> {
        let slots = Self::dir_slots(dir);
        let mut slot = 0;
        while slot < slots {
            let block_index = slot / ENTRIES_PER_BLOCK;
            let in_block = (slots - slot).min(ENTRIES_PER_BLOCK);

            let block_id = self.block_at(dir, block_index)?;
            if block_id != 0 {
                let block = self.read_block(block_id as usize)?;
                for i in 0..in_block {
                    let entry = DirEntry::decode(&block[i * ENTRY_SIZE..(i + 1) * ENTRY_SIZE]);
                    if let Some(found) = visit(slot + i, &entry) {
                        return Ok(Some(found));
                    }
                }
            }
            slot += in_block;
        }
        Ok(None)
    }

    /// 按名字查找目录项，返回其 inode 号
    pub(crate) fn dir_lookup(&self, dir: &DiskInode, name: &str) -> Result<u32> {
        self.scan_dir(dir, |_, entry| {
            (!entry.is_free() && entry.name() == name).then(|| entry.inode_num())
        })?
        .ok_or(Error::NotFound)
    }

    /// 目录是否已空
    pub(crate) fn dir_is_empty(&self, dir: &DiskInode) -> Result<bool> {
        Ok(self
            .scan_dir(dir, |_, entry| (!entry.is_free()).then_some(()))?
            .is_none())
    }

    /// 列出所有在用目录项
    pub(crate) fn dir_entries(&self, dir: &DiskInode) -> Result<Vec<DirEntry>> {
        let mut entries = Vec::new();
        self.scan_dir(dir, |_, entry| {
            if !entry.is_free() {
                entries.push(entry.clone());
            }
            None::<()>
        })?;
        Ok(entries)
    }

    /// 写入一条新目录项：优先复用第一个空槽，没有就在尾部追加，
    /// 必要时给追加槽位分配新块。只更新内存中的 `dir`，
    /// inode 写回由调用方负责。
    pub(crate) fn dir_insert(
        &mut self,
        dir: &mut DiskInode,
        name: &str,
        inode_num: u32,
    ) -> Result<()> {
        let entry = DirEntry::new(name, inode_num)?;

        let slots = Self::dir_slots(dir);
        let mut free_slot = None;
        let mut slot = 0;
        while slot < slots {
            let block_index = slot / ENTRIES_PER_BLOCK;
            let in_block = (slots - slot).min(ENTRIES_PER_BLOCK);

            let block_id = self.block_at(dir, block_index)?;
            if block_id == 0 {
                if free_slot.is_none() {
                    free_slot = Some(slot);
                }
            } else {
                let block = self.read_block(block_id as usize)?;
                for i in 0..in_block {
                    let existing = DirEntry::decode(&block[i * ENTRY_SIZE..(i + 1) * ENTRY_SIZE]);
                    if existing.is_free() {
                        if free_slot.is_none() {
                            free_slot = Some(slot + i);
                        }
                    } else if existing.name() == name {
                        return Err(Error::AlreadyExists);
                    }
                }
            }
            slot += in_block;
        }

        let target = match free_slot {
            Some(slot) => slot,
            None => {
                dir.size += ENTRY_SIZE as u32;
                slots
            }
        };
        self.write_dir_slot(dir, target, &entry)
    }

    /// 删除名字对应的目录项并返回其 inode 号。
    /// 只清掉槽位本身，`size` 不回缩，不做目录压缩。
    pub(crate) fn dir_remove(&mut self, dir: &DiskInode, name: &str) -> Result<u32> {
        let found = self.scan_dir(dir, |slot, entry| {
            (!entry.is_free() && entry.name() == name).then(|| (slot, entry.inode_num()))
        })?;
        let Some((slot, inode_num)) = found else {
            return Err(Error::NotFound);
        };

        let block_id = self.block_at(dir, slot / ENTRIES_PER_BLOCK)?;
        let mut block = self.read_block(block_id as usize)?;
        let offset = slot % ENTRIES_PER_BLOCK * ENTRY_SIZE;
        block[offset..offset + ENTRY_SIZE].fill(0);
        self.write_block(block_id as usize, &block)?;
        Ok(inode_num)
    }

    /// 把目录项写到指定槽位，槽位所在块缺失时现场分配
    fn write_dir_slot(&mut self, dir: &mut DiskInode, slot: usize, entry: &DirEntry) -> Result<()> {
        let mut log = AllocLog::default();
        let block_id = match self.block_at_or_alloc(dir, slot / ENTRIES_PER_BLOCK, &mut log) {
            Ok(block_id) => block_id,
            Err(e) => {
                self.rollback_alloc(log)?;
                return Err(e);
            }
        };

        let mut block = self.read_block(block_id as usize)?;
        let offset = slot % ENTRIES_PER_BLOCK * ENTRY_SIZE;
        block[offset..offset + ENTRY_SIZE].copy_from_slice(&entry.encode());
        self.write_block(block_id as usize, &block)
    }
}
