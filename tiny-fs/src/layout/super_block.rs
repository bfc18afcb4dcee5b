use std::sync::Arc;

use crate::block_dev::BlockDevice;
use crate::layout::SUPER_BLOCK_ID;
use crate::{Result, BLOCK_SIZE};

/// 超级块：格式化时一次写定的布局参数，挂载后只读。
///
/// 五个字段按固定顺序打包成小端 32 位整数，余下部分补零。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuperBlock {
    /// inode 总数
    pub num_inodes: u32,
    /// 数据块总数
    pub num_data_blocks: u32,
    /// inode 表占用块数
    pub inode_table_blocks: u32,
    /// 数据块位图占用块数
    pub data_bitmap_blocks: u32,
    /// 第一个数据块的块号
    pub data_start_block: u32,
}

impl SuperBlock {
    pub fn encode(&self) -> [u8; BLOCK_SIZE] {
        let mut block = [0u8; BLOCK_SIZE];
        for (i, field) in [
            self.num_inodes,
            self.num_data_blocks,
            self.inode_table_blocks,
            self.data_bitmap_blocks,
            self.data_start_block,
        ]
        .into_iter()
        .enumerate()
        {
            block[i * 4..i * 4 + 4].copy_from_slice(&field.to_le_bytes());
        }
        block
    }

    pub fn decode(block: &[u8]) -> Self {
        let word = |i: usize| {
            let mut bytes = [0u8; 4];
            bytes.copy_from_slice(&block[i * 4..i * 4 + 4]);
            u32::from_le_bytes(bytes)
        };
        Self {
            num_inodes: word(0),
            num_data_blocks: word(1),
            inode_table_blocks: word(2),
            data_bitmap_blocks: word(3),
            data_start_block: word(4),
        }
    }

    /// 挂载时从 0 号块读出
    pub fn load(device: &Arc<dyn BlockDevice>) -> Result<Self> {
        let mut block = [0u8; BLOCK_SIZE];
        device.read_block(SUPER_BLOCK_ID, &mut block)?;
        Ok(Self::decode(&block))
    }

    /// 格式化时写进 0 号块
    pub fn store(&self, device: &Arc<dyn BlockDevice>) -> Result<()> {
        device.write_block(SUPER_BLOCK_ID, &self.encode())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_round_trip() {
        let sb = SuperBlock {
            num_inodes: 32768,
            num_data_blocks: 64889,
            inode_table_blocks: 643,
            data_bitmap_blocks: 2,
            data_start_block: 647,
        };
        let block = sb.encode();
        assert_eq!(&block[..4], &32768u32.to_le_bytes());
        assert_eq!(&block[16..20], &647u32.to_le_bytes());
        assert!(block[20..].iter().all(|&b| b == 0));
        assert_eq!(SuperBlock::decode(&block), sb);
    }
}
