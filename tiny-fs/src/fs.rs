//! # 磁盘块管理器层
//!
//! 掌管磁盘布局的构建与使用：格式化与挂载、两张位图、
//! inode 表的读写、数据块的分配与回收。
//! 所有修改当场写回设备，卸载时无需额外刷盘。

use std::sync::Arc;

use log::debug;

use crate::block_dev::BlockDevice;
use crate::layout::{
    Bitmap, DiskInode, InodeKind, SuperBlock, DATA_BITMAP_BLOCKS, DATA_BITMAP_START_BLOCK,
    INODES_PER_BLOCK, INODE_BITMAP_BLOCK, INODE_COUNT, INODE_SIZE, INODE_TABLE_START_BLOCK,
};
use crate::{DataBlock, Error, Result, BLOCK_SIZE};

pub struct TinyFileSystem {
    block_device: Arc<dyn BlockDevice>,
    super_block: SuperBlock,
    inode_bitmap: Bitmap,
    data_bitmap: Bitmap,
}

impl TinyFileSystem {
    /// 格式化整个设备并挂载：写超级块，清零位图和 inode 表，
    /// 然后建出根目录。根目录固定占用 0 号 inode。
    pub fn format(block_device: Arc<dyn BlockDevice>, total_blocks: usize) -> Result<Self> {
        let inode_table_blocks = INODE_COUNT.div_ceil(INODES_PER_BLOCK);
        let data_start_block = INODE_TABLE_START_BLOCK + inode_table_blocks;
        assert!(total_blocks > data_start_block, "device too small");
        // 位图装不下的尾部块直接不用
        let num_data_blocks =
            (total_blocks - data_start_block).min(DATA_BITMAP_BLOCKS * BLOCK_SIZE * 8);

        let super_block = SuperBlock {
            num_inodes: INODE_COUNT as u32,
            num_data_blocks: num_data_blocks as u32,
            inode_table_blocks: inode_table_blocks as u32,
            data_bitmap_blocks: DATA_BITMAP_BLOCKS as u32,
            data_start_block: data_start_block as u32,
        };
        super_block.store(&block_device)?;

        let zero = [0u8; BLOCK_SIZE];
        for block_id in INODE_BITMAP_BLOCK..data_start_block {
            block_device.write_block(block_id, &zero)?;
        }

        let mut fs = Self::assemble(block_device, super_block);

        let root = fs.alloc_inode()?;
        assert_eq!(root, 0, "root inode must be 0");
        let mut root_inode = DiskInode::default();
        root_inode.init(InodeKind::Directory, crate::ops::now());
        fs.write_inode(root, &root_inode)?;

        debug!("formatted: total_blocks={total_blocks} data_blocks={num_data_blocks}");
        Ok(fs)
    }

    /// 挂载已格式化的设备，只需读出超级块
    pub fn open(block_device: Arc<dyn BlockDevice>) -> Result<Self> {
        let super_block = SuperBlock::load(&block_device)?;
        debug!(
            "mounted: inodes={} data_blocks={}",
            super_block.num_inodes, super_block.num_data_blocks
        );
        Ok(Self::assemble(block_device, super_block))
    }

    fn assemble(block_device: Arc<dyn BlockDevice>, super_block: SuperBlock) -> Self {
        let inode_bitmap = Bitmap::new(INODE_BITMAP_BLOCK, 1, super_block.num_inodes as usize);
        let data_bitmap = Bitmap::new(
            DATA_BITMAP_START_BLOCK,
            super_block.data_bitmap_blocks as usize,
            super_block.num_data_blocks as usize,
        );
        Self {
            block_device,
            super_block,
            inode_bitmap,
            data_bitmap,
        }
    }

    #[inline]
    pub fn super_block(&self) -> &SuperBlock {
        &self.super_block
    }

    pub(crate) fn read_block(&self, block_id: usize) -> Result<DataBlock> {
        let mut buf = [0u8; BLOCK_SIZE];
        self.block_device.read_block(block_id, &mut buf)?;
        Ok(buf)
    }

    pub(crate) fn write_block(&self, block_id: usize, buf: &DataBlock) -> Result<()> {
        self.block_device.write_block(block_id, buf)?;
        Ok(())
    }

    /// 读出第 n 条 inode 记录
    pub fn read_inode(&self, inode_num: u32) -> Result<DiskInode> {
        if inode_num >= self.super_block.num_inodes {
            return Err(Error::InvalidArgument);
        }
        let (block_id, offset) = Self::inode_pos(inode_num);
        let block = self.read_block(block_id)?;
        Ok(DiskInode::decode(&block[offset..offset + INODE_SIZE]))
    }

    /// 读-改-写 inode 所在的表块
    pub fn write_inode(&mut self, inode_num: u32, inode: &DiskInode) -> Result<()> {
        if inode_num >= self.super_block.num_inodes {
            return Err(Error::InvalidArgument);
        }
        let (block_id, offset) = Self::inode_pos(inode_num);
        let mut block = self.read_block(block_id)?;
        block[offset..offset + INODE_SIZE].copy_from_slice(&inode.encode());
        self.write_block(block_id, &block)
    }

    /// inode 号对应的表块号与块内偏移
    #[inline]
    fn inode_pos(inode_num: u32) -> (usize, usize) {
        let inode_num = inode_num as usize;
        (
            INODE_TABLE_START_BLOCK + inode_num / INODES_PER_BLOCK,
            inode_num % INODES_PER_BLOCK * INODE_SIZE,
        )
    }

    pub(crate) fn alloc_inode(&mut self) -> Result<u32> {
        let inode_num = self.inode_bitmap.alloc(&self.block_device)?;
        debug!("alloc inode {inode_num}");
        Ok(inode_num)
    }

    pub(crate) fn free_inode(&mut self, inode_num: u32) -> Result<()> {
        debug!("free inode {inode_num}");
        self.inode_bitmap.dealloc(&self.block_device, inode_num)
    }

    /// 分配一个数据块并整块清零，返回绝对块号。
    /// 清零保证新间接索引块里的残留槽位读出来是 0。
    pub(crate) fn alloc_data_block(&mut self) -> Result<u32> {
        let bit = self.data_bitmap.alloc(&self.block_device)?;
        let block_id = self.super_block.data_start_block + bit;
        self.write_block(block_id as usize, &[0u8; BLOCK_SIZE])?;
        debug!("alloc data block {block_id}");
        Ok(block_id)
    }

    /// 以绝对块号回收数据块
    pub(crate) fn free_data_block(&mut self, block_id: u32) -> Result<()> {
        debug!("free data block {block_id}");
        self.data_bitmap
            .dealloc(&self.block_device, block_id - self.super_block.data_start_block)
    }

    pub(crate) fn free_inode_count(&self) -> Result<usize> {
        self.inode_bitmap.count_free(&self.block_device)
    }

    pub(crate) fn free_data_block_count(&self) -> Result<usize> {
        self.data_bitmap.count_free(&self.block_device)
    }
}
