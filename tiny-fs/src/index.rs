//! # 块指针索引层
//!
//! 把文件内的块索引翻译成磁盘上的绝对块号：
//! 前 12 块走直接指针，之后每 1024 块归一个一级间接索引块管。

use crate::fs::TinyFileSystem;
use crate::layout::{DiskInode, DIRECT_COUNT, INDIRECT_COUNT, POINTERS_PER_BLOCK};
use crate::{DataBlock, Error, Result};

/// 文件能索引到的数据块总数
const MAX_DATA_BLOCKS: usize = DIRECT_COUNT + INDIRECT_COUNT * POINTERS_PER_BLOCK;

/// 一次多块分配的撤销记录。
/// 整体失败时释放新块，并抹掉写进旧间接索引块的槽位。
#[derive(Default)]
pub(crate) struct AllocLog {
    /// 本次新分配的绝对块号，间接索引块也算
    fresh: Vec<u32>,
    /// 写进已有间接索引块的槽位 (间接块号, 槽位)
    patched: Vec<(u32, usize)>,
}

impl TinyFileSystem {
    /// 文件内块索引 → 绝对块号。洞返回 0，越界报 FileTooLarge。
    pub(crate) fn block_at(&self, inode: &DiskInode, index: usize) -> Result<u32> {
        if index < DIRECT_COUNT {
            return Ok(inode.direct[index]);
        }

        let index = index - DIRECT_COUNT;
        let group = index / POINTERS_PER_BLOCK;
        let slot = index % POINTERS_PER_BLOCK;
        if group >= INDIRECT_COUNT {
            return Err(Error::FileTooLarge);
        }

        let indirect = inode.indirect[group];
        if indirect == 0 {
            return Ok(0);
        }
        let table = self.read_block(indirect as usize)?;
        Ok(read_ptr(&table, slot))
    }

    /// 同上，但缺块时现场分配。inode 只改内存，写回由调用方负责；
    /// 每次分配动作记入 `log`，供整体失败时回滚。
    pub(crate) fn block_at_or_alloc(
        &mut self,
        inode: &mut DiskInode,
        index: usize,
        log: &mut AllocLog,
    ) -> Result<u32> {
        if index >= MAX_DATA_BLOCKS {
            return Err(Error::FileTooLarge);
        }

        if index < DIRECT_COUNT {
            if inode.direct[index] == 0 {
                let block_id = self.alloc_data_block()?;
                log.fresh.push(block_id);
                inode.direct[index] = block_id;
            }
            return Ok(inode.direct[index]);
        }

        let index = index - DIRECT_COUNT;
        let group = index / POINTERS_PER_BLOCK;
        let slot = index % POINTERS_PER_BLOCK;

        let mut fresh_indirect = false;
        if inode.indirect[group] == 0 {
            // 分配时已整块清零，空槽读出来就是 0
            let block_id = self.alloc_data_block()?;
            log.fresh.push(block_id);
            inode.indirect[group] = block_id;
            fresh_indirect = true;
        }
        let indirect = inode.indirect[group];

        let mut table = self.read_block(indirect as usize)?;
        let existing = read_ptr(&table, slot);
        if existing != 0 {
            return Ok(existing);
        }

        let block_id = self.alloc_data_block()?;
        log.fresh.push(block_id);
        if !fresh_indirect {
            log.patched.push((indirect, slot));
        }
        write_ptr(&mut table, slot, block_id);
        self.write_block(indirect as usize, &table)?;
        Ok(block_id)
    }

    /// 回滚一次失败的多块分配：先抹槽位，再还位图
    pub(crate) fn rollback_alloc(&mut self, log: AllocLog) -> Result<()> {
        for (indirect, slot) in &log.patched {
            let mut table = self.read_block(*indirect as usize)?;
            write_ptr(&mut table, *slot, 0);
            self.write_block(*indirect as usize, &table)?;
        }
        for block_id in log.fresh {
            self.free_data_block(block_id)?;
        }
        Ok(())
    }

    /// 释放文件内索引 ≥ keep_blocks 的所有数据块；
    /// 孩子清空的间接索引块连同自身一并释放。
    pub(crate) fn free_blocks_from(
        &mut self,
        inode: &mut DiskInode,
        keep_blocks: usize,
    ) -> Result<()> {
        for index in keep_blocks..DIRECT_COUNT {
            let ptr = inode.direct[index];
            if ptr != 0 {
                self.free_data_block(ptr)?;
                inode.direct[index] = 0;
            }
        }

        for group in 0..INDIRECT_COUNT {
            let indirect = inode.indirect[group];
            if indirect == 0 {
                continue;
            }

            // 本组管辖的第一个文件内块索引
            let first = DIRECT_COUNT + group * POINTERS_PER_BLOCK;
            let drop_from = keep_blocks
                .saturating_sub(first)
                .min(POINTERS_PER_BLOCK);

            let mut table = self.read_block(indirect as usize)?;
            let mut dirty = false;
            for slot in drop_from..POINTERS_PER_BLOCK {
                let ptr = read_ptr(&table, slot);
                if ptr != 0 {
                    self.free_data_block(ptr)?;
                    write_ptr(&mut table, slot, 0);
                    dirty = true;
                }
            }

            if (0..POINTERS_PER_BLOCK).all(|slot| read_ptr(&table, slot) == 0) {
                self.free_data_block(indirect)?;
                inode.indirect[group] = 0;
            } else if dirty {
                self.write_block(indirect as usize, &table)?;
            }
        }

        Ok(())
    }
}

#[inline]
fn read_ptr(table: &DataBlock, slot: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&table[slot * 4..slot * 4 + 4]);
    u32::from_le_bytes(bytes)
}

#[inline]
fn write_ptr(table: &mut DataBlock, slot: usize, value: u32) {
    table[slot * 4..slot * 4 + 4].copy_from_slice(&value.to_le_bytes());
}
