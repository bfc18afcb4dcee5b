//! # 块设备接口层
//!
//! 块设备是按块编址的平坦数组，读写都以整块为单位。
//! [`BlockDevice`] 就是对这两条原语的抽象，设备故障原样上抛。

use std::io;

/// 块设备驱动特质
pub trait BlockDevice: Send + Sync {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> io::Result<()>;
    fn write_block(&self, block_id: usize, buf: &[u8]) -> io::Result<()>;
}
