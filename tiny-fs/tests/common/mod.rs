//! 测试共用设施：内存块设备与全盘一致性检查

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::io;
use std::sync::{Arc, Mutex};

use tiny_fs::layout::{
    DirEntry, DiskInode, DATA_BITMAP_START_BLOCK, DIRECT_COUNT, ENTRIES_PER_BLOCK, ENTRY_SIZE,
    INODES_PER_BLOCK, INODE_BITMAP_BLOCK, INODE_SIZE, INODE_TABLE_START_BLOCK, POINTERS_PER_BLOCK,
    SUPER_BLOCK_ID,
};
use tiny_fs::{BlockDevice, TinyFileSystem, BLOCK_SIZE};

/// Vec 承载的内存磁盘
pub struct MemDisk(Mutex<Vec<u8>>);

impl MemDisk {
    pub fn new(total_blocks: usize) -> Self {
        Self(Mutex::new(vec![0; total_blocks * BLOCK_SIZE]))
    }

    /// 绕开文件系统直接读一个块，校验落盘内容用
    pub fn raw_block(&self, block_id: usize) -> Vec<u8> {
        let data = self.0.lock().unwrap();
        data[block_id * BLOCK_SIZE..(block_id + 1) * BLOCK_SIZE].to_vec()
    }
}

impl BlockDevice for MemDisk {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> io::Result<()> {
        let data = self.0.lock().unwrap();
        let start = block_id * BLOCK_SIZE;
        buf.copy_from_slice(&data[start..start + buf.len()]);
        Ok(())
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> io::Result<()> {
        let mut data = self.0.lock().unwrap();
        let start = block_id * BLOCK_SIZE;
        data[start..start + buf.len()].copy_from_slice(buf);
        Ok(())
    }
}

pub const TEST_BLOCKS: usize = 1024;

pub fn fresh_fs() -> (Arc<MemDisk>, TinyFileSystem) {
    fs_with_blocks(TEST_BLOCKS)
}

pub fn fs_with_blocks(total_blocks: usize) -> (Arc<MemDisk>, TinyFileSystem) {
    let disk = Arc::new(MemDisk::new(total_blocks));
    let fs = TinyFileSystem::format(disk.clone(), total_blocks).unwrap();
    (disk, fs)
}

/// 直接从 inode 表解出第 n 条记录
pub fn inode_at(disk: &MemDisk, inode_num: u32) -> DiskInode {
    let block = disk.raw_block(INODE_TABLE_START_BLOCK + inode_num as usize / INODES_PER_BLOCK);
    let offset = inode_num as usize % INODES_PER_BLOCK * INODE_SIZE;
    DiskInode::decode(&block[offset..offset + INODE_SIZE])
}

/// 文件内块索引 → 绝对块号，洞返回 0
pub fn block_of(disk: &MemDisk, inode: &DiskInode, index: usize) -> u32 {
    if index < DIRECT_COUNT {
        return inode.direct[index];
    }
    let index = index - DIRECT_COUNT;
    let indirect = inode.indirect[index / POINTERS_PER_BLOCK];
    if indirect == 0 {
        return 0;
    }
    read_ptr(&disk.raw_block(indirect as usize), index % POINTERS_PER_BLOCK)
}

/// 两张位图的原始字节，做前后对比用
pub fn bitmap_snapshot(disk: &MemDisk) -> Vec<u8> {
    let mut bytes = disk.raw_block(INODE_BITMAP_BLOCK);
    bytes.extend(disk.raw_block(DATA_BITMAP_START_BLOCK));
    bytes.extend(disk.raw_block(DATA_BITMAP_START_BLOCK + 1));
    bytes
}

fn read_ptr(table: &[u8], slot: usize) -> u32 {
    u32::from_le_bytes(table[slot * 4..slot * 4 + 4].try_into().unwrap())
}

/// inode 的全部指针：(数据块, 间接索引块)
fn ptrs_of(disk: &MemDisk, inode: &DiskInode) -> (Vec<u32>, Vec<u32>) {
    let mut data = Vec::new();
    let mut index_blocks = Vec::new();
    for &ptr in &inode.direct {
        if ptr != 0 {
            data.push(ptr);
        }
    }
    for &indirect in &inode.indirect {
        if indirect == 0 {
            continue;
        }
        index_blocks.push(indirect);
        let table = disk.raw_block(indirect as usize);
        for slot in 0..POINTERS_PER_BLOCK {
            let ptr = read_ptr(&table, slot);
            if ptr != 0 {
                data.push(ptr);
            }
        }
    }
    (data, index_blocks)
}

fn dir_children(disk: &MemDisk, inode: &DiskInode) -> Vec<(String, u32)> {
    let slots = inode.size as usize / ENTRY_SIZE;
    let mut children = Vec::new();
    let mut slot = 0;
    while slot < slots {
        let block_index = slot / ENTRIES_PER_BLOCK;
        let in_block = (slots - slot).min(ENTRIES_PER_BLOCK);
        let block_id = block_of(disk, inode, block_index);
        if block_id != 0 {
            let block = disk.raw_block(block_id as usize);
            for i in 0..in_block {
                let entry = DirEntry::decode(&block[i * ENTRY_SIZE..(i + 1) * ENTRY_SIZE]);
                if !entry.is_free() {
                    children.push((entry.name().to_owned(), entry.inode_num()));
                }
            }
        }
        slot += in_block;
    }
    children
}

fn bitmap_bits(bytes: &[u8], count: usize) -> BTreeSet<u32> {
    (0..count)
        .filter(|&i| bytes[i / 8] >> (i % 8) & 1 == 1)
        .map(|i| i as u32)
        .collect()
}

/// 全盘一致性检查：
/// - inode 位图的置位 ⇔ 该 inode 从根目录可达（根自身算可达）
/// - 数据块位图的置位 ⇔ 该块被恰好一个在用 inode 引用
///   （直接指针、间接槽位或间接索引块本身）
/// - 目录内名字唯一
pub fn check_consistency(disk: &MemDisk, fs: &TinyFileSystem) {
    let sb = fs.super_block();
    assert_eq!(
        SuperBlockWords::load(disk),
        SuperBlockWords::of(sb),
        "superblock drifted"
    );

    let mut reachable = BTreeSet::from([0u32]);
    let mut referenced: Vec<u32> = Vec::new();
    let mut queue = vec![0u32];
    while let Some(inode_num) = queue.pop() {
        let inode = inode_at(disk, inode_num);
        let (data, index_blocks) = ptrs_of(disk, &inode);
        referenced.extend(&data);
        referenced.extend(&index_blocks);

        if inode.is_dir() {
            let children = dir_children(disk, &inode);
            let names: BTreeSet<&str> = children.iter().map(|(name, _)| name.as_str()).collect();
            assert_eq!(
                names.len(),
                children.len(),
                "duplicate names in directory {inode_num}"
            );
            for (_, child) in children {
                assert!(reachable.insert(child), "inode {child} reachable twice");
                queue.push(child);
            }
        }
    }

    let inode_bits = bitmap_bits(&disk.raw_block(INODE_BITMAP_BLOCK), sb.num_inodes as usize);
    assert_eq!(inode_bits, reachable, "inode bitmap vs reachability");

    let mut seen = BTreeSet::new();
    for &block in &referenced {
        assert!(seen.insert(block), "block {block} referenced twice");
        assert!(
            block >= sb.data_start_block,
            "pointer {block} outside the data region"
        );
    }
    let mut data_bitmap = disk.raw_block(DATA_BITMAP_START_BLOCK);
    data_bitmap.extend(disk.raw_block(DATA_BITMAP_START_BLOCK + 1));
    let data_bits: BTreeSet<u32> = bitmap_bits(&data_bitmap, sb.num_data_blocks as usize)
        .into_iter()
        .map(|bit| bit + sb.data_start_block)
        .collect();
    assert_eq!(data_bits, seen, "data bitmap vs pointer references");
}

#[derive(Debug, PartialEq, Eq)]
struct SuperBlockWords([u32; 5]);

impl SuperBlockWords {
    fn load(disk: &MemDisk) -> Self {
        let block = disk.raw_block(SUPER_BLOCK_ID);
        Self([0, 1, 2, 3, 4].map(|i| read_ptr(&block, i)))
    }

    fn of(sb: &tiny_fs::layout::SuperBlock) -> Self {
        Self([
            sb.num_inodes,
            sb.num_data_blocks,
            sb.inode_table_blocks,
            sb.data_bitmap_blocks,
            sb.data_start_block,
        ])
    }
}
