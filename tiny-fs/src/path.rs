//! # 路径解析层
//!
//! 操作入口拿到的都是相对本文件系统根的绝对路径，
//! 解析就是从 0 号 inode 出发逐级做目录查找。

use crate::fs::TinyFileSystem;
use crate::{Error, Result};

/// 绝对路径的拆分工具
pub(crate) trait Path {
    fn is_absolute(&self) -> bool;

    /// 返回路径的 `(父目录, 基名)`，根目录返回 `None`
    fn parent_file(&self) -> Option<(&Self, &Self)>;
}

impl Path for str {
    fn is_absolute(&self) -> bool {
        self.starts_with('/')
    }

    fn parent_file(&self) -> Option<(&Self, &Self)> {
        if self == "/" {
            return None;
        }
        self.rsplit_once('/')
            .map(|(parent, file)| if parent.is_empty() { ("/", file) } else { (parent, file) })
    }
}

impl TinyFileSystem {
    /// 绝对路径 → inode 号；`/` 就是根 inode 0。
    /// 中间某级不是目录时按不存在处理。
    pub fn resolve(&self, path: &str) -> Result<u32> {
        if !path.is_absolute() {
            return Err(Error::InvalidArgument);
        }

        let mut inode_num = 0u32;
        for component in path.split('/').filter(|c| !c.is_empty()) {
            let inode = self.read_inode(inode_num)?;
            if !inode.is_dir() {
                return Err(Error::NotFound);
            }
            inode_num = self.dir_lookup(&inode, component)?;
        }
        Ok(inode_num)
    }

    /// 拆出 `(父目录 inode 号, 基名)`，创建、删除与改名用。
    /// 基名本身不要求存在。
    pub fn resolve_parent<'a>(&self, path: &'a str) -> Result<(u32, &'a str)> {
        if !path.is_absolute() {
            return Err(Error::InvalidArgument);
        }
        let Some((parent, name)) = path.parent_file() else {
            // 根目录没有父目录
            return Err(Error::InvalidArgument);
        };
        if name.is_empty() {
            return Err(Error::InvalidArgument);
        }
        Ok((self.resolve(parent)?, name))
    }
}
