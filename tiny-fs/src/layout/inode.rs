//! inode 表中的定长记录。
//!
//! 80 字节：size、atime、mtime、ctime、mode 各 4 字节，
//! 接 12 个直接指针和 2 个一级间接指针，各 4 字节。
//! 指针为 0 表示槽位未分配，0 号块是超级块，不可能是数据块。

use crate::BLOCK_SIZE;

/// 直接指针个数
pub const DIRECT_COUNT: usize = 12;
/// 一级间接指针个数
pub const INDIRECT_COUNT: usize = 2;
/// 一个间接索引块容纳的块号个数
pub const POINTERS_PER_BLOCK: usize = BLOCK_SIZE / 4;
/// 单文件大小上限
pub const MAX_FILE_SIZE: usize = (DIRECT_COUNT + INDIRECT_COUNT * POINTERS_PER_BLOCK) * BLOCK_SIZE;
/// inode 记录大小
pub const INODE_SIZE: usize = 80;
/// 每个表块容纳的 inode 数，块尾剩余字节不用
pub const INODES_PER_BLOCK: usize = BLOCK_SIZE / INODE_SIZE;

/// 目录的 mode 字；权限位只汇报，不做检查
const DIR_MODE: u32 = 0o040000 | 0o755;
/// 普通文件的 mode 字
const REG_MODE: u32 = 0o100000 | 0o644;
/// mode 中的类型掩码
const KIND_MASK: u32 = 0o170000;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DiskInode {
    /// 内容字节数
    pub size: u32,
    /// 最后访问时间(整秒)
    pub atime: u32,
    /// 内容最后修改时间(整秒)
    pub mtime: u32,
    /// 元数据最后修改时间(整秒)
    pub ctime: u32,
    /// 类型与权限位
    pub mode: u32,
    /// 直接指针
    pub direct: [u32; DIRECT_COUNT],
    /// 一级间接指针，每个指向一整块块号表
    pub indirect: [u32; INDIRECT_COUNT],
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InodeKind {
    #[default]
    File,
    Directory,
}

impl DiskInode {
    pub fn init(&mut self, kind: InodeKind, now: u32) {
        *self = Self {
            atime: now,
            mtime: now,
            ctime: now,
            mode: kind.mode(),
            ..Default::default()
        };
    }

    #[inline]
    pub fn kind(&self) -> InodeKind {
        if self.mode & KIND_MASK == 0o040000 {
            InodeKind::Directory
        } else {
            InodeKind::File
        }
    }

    #[inline]
    pub fn is_dir(&self) -> bool {
        self.kind() == InodeKind::Directory
    }

    pub fn encode(&self) -> [u8; INODE_SIZE] {
        let mut buf = [0u8; INODE_SIZE];
        let words = [self.size, self.atime, self.mtime, self.ctime, self.mode]
            .into_iter()
            .chain(self.direct)
            .chain(self.indirect);
        for (i, word) in words.enumerate() {
            buf[i * 4..i * 4 + 4].copy_from_slice(&word.to_le_bytes());
        }
        buf
    }

    pub fn decode(buf: &[u8]) -> Self {
        let word = |i: usize| {
            let mut bytes = [0u8; 4];
            bytes.copy_from_slice(&buf[i * 4..i * 4 + 4]);
            u32::from_le_bytes(bytes)
        };
        let mut inode = Self {
            size: word(0),
            atime: word(1),
            mtime: word(2),
            ctime: word(3),
            mode: word(4),
            ..Default::default()
        };
        for (i, ptr) in inode.direct.iter_mut().enumerate() {
            *ptr = word(5 + i);
        }
        for (i, ptr) in inode.indirect.iter_mut().enumerate() {
            *ptr = word(5 + DIRECT_COUNT + i);
        }
        inode
    }

    /// 容纳 size 字节需要的数据块数
    #[inline]
    pub fn count_data_block(size: u32) -> usize {
        (size as usize).div_ceil(BLOCK_SIZE)
    }

    /// 在用的间接索引块个数
    #[inline]
    pub fn indirect_blocks_in_use(&self) -> usize {
        self.indirect.iter().filter(|&&ptr| ptr != 0).count()
    }
}

impl InodeKind {
    #[inline]
    pub fn mode(self) -> u32 {
        match self {
            Self::File => REG_MODE,
            Self::Directory => DIR_MODE,
        }
    }
}
