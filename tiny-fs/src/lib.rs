//! # tiny-fs
//!
//! 挂载在 FUSE 桥之后的小型类 POSIX 文件系统核心，自上而下：

// 操作处理层：按路径实现 getattr、readdir、创建删除与读写等操作
mod ops;

// 路径解析层：从根 inode 出发逐级做目录查找
mod path;

// 目录存储层：定长目录项的扫描、插入与删除
mod dir;

// 块指针索引层：文件内块索引到磁盘块号的映射
mod index;

// 磁盘块管理器层：布局、位图与 inode 表
mod fs;
pub use fs::TinyFileSystem;

// 磁盘数据结构层：落盘格式的定义与编解码
pub mod layout;
pub use layout::{InodeKind, MAX_FILE_SIZE, NAME_MAX_LEN};

// 汇报给桥的状态结构
mod stat;
pub use stat::{FileStat, FsStat};

// 错误种类与 POSIX 错误码的对应
mod error;
pub use error::{Error, Result};

// 磁盘块设备接口层
mod block_dev;
pub use block_dev::BlockDevice;

/// 块大小(字节)
pub const BLOCK_SIZE: usize = 4096;

/// 数据块
type DataBlock = [u8; BLOCK_SIZE];
