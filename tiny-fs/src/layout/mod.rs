//! # 磁盘数据结构层
//!
//! 磁盘布局（块号从 0 起，区域连续且固定）：
//!
//! | 块 0 | 块 1 | 块 2..=3 | 块 4.. | 其余 |
//! |---|---|---|---|---|
//! | 超级块 | inode 位图 | 数据块位图 | inode 表 | 数据块区域 |
//!
//! 所有多字节整数一律小端存储；编解码显式逐字段进行，
//! 不依赖内存布局，镜像因此跨字节序可移植。

mod super_block;
pub use super_block::SuperBlock;

mod bitmap;
pub use bitmap::Bitmap;

mod inode;
pub use inode::{DiskInode, InodeKind};
pub use inode::{
    DIRECT_COUNT, INDIRECT_COUNT, INODES_PER_BLOCK, INODE_SIZE, MAX_FILE_SIZE, POINTERS_PER_BLOCK,
};

mod dir_entry;
pub use dir_entry::{DirEntry, ENTRIES_PER_BLOCK, ENTRY_SIZE, NAME_MAX_LEN};

/// 超级块所在块
pub const SUPER_BLOCK_ID: usize = 0;
/// inode 位图所在块
pub const INODE_BITMAP_BLOCK: usize = 1;
/// 数据块位图起始块
pub const DATA_BITMAP_START_BLOCK: usize = 2;
/// 数据块位图占用块数
pub const DATA_BITMAP_BLOCKS: usize = 2;
/// inode 表起始块
pub const INODE_TABLE_START_BLOCK: usize = 4;
/// inode 总数，一个位图块恰好容纳 4096*8 位
pub const INODE_COUNT: usize = 32768;
