//! 目录项：26 字节名字段加 4 字节 inode 号，共 30 字节。
//!
//! 名字段 NUL 填充，倒数第二字节放终止符、最后一字节保留，
//! 用户可见的名字最长 24 字节。inode 号为 0 即空槽。

use crate::{Error, Result, BLOCK_SIZE};

/// 名字段字节数
const NAME_FIELD: usize = 26;
/// 用户可见的文件名长度上限
pub const NAME_MAX_LEN: usize = 24;
/// 目录项大小
pub const ENTRY_SIZE: usize = NAME_FIELD + 4;
/// 每个目录块容纳的目录项数，块尾剩余字节不用
pub const ENTRIES_PER_BLOCK: usize = BLOCK_SIZE / ENTRY_SIZE;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DirEntry {
    name: [u8; NAME_FIELD],
    inode_num: u32,
}

impl DirEntry {
    /// 名字超长时拒绝
    pub fn new(name: &str, inode_num: u32) -> Result<Self> {
        let bytes = name.as_bytes();
        if bytes.len() > NAME_MAX_LEN {
            return Err(Error::NameTooLong);
        }
        let mut field = [0u8; NAME_FIELD];
        field[..bytes.len()].copy_from_slice(bytes);
        Ok(Self {
            name: field,
            inode_num,
        })
    }

    pub fn name(&self) -> &str {
        let len = self.name.iter().position(|&c| c == 0).unwrap_or(NAME_FIELD);
        core::str::from_utf8(&self.name[..len]).unwrap_or("")
    }

    #[inline]
    pub fn inode_num(&self) -> u32 {
        self.inode_num
    }

    #[inline]
    pub fn is_free(&self) -> bool {
        self.inode_num == 0
    }

    pub fn encode(&self) -> [u8; ENTRY_SIZE] {
        let mut buf = [0u8; ENTRY_SIZE];
        buf[..NAME_FIELD].copy_from_slice(&self.name);
        buf[NAME_FIELD..].copy_from_slice(&self.inode_num.to_le_bytes());
        buf
    }

    pub fn decode(buf: &[u8]) -> Self {
        let mut name = [0u8; NAME_FIELD];
        name.copy_from_slice(&buf[..NAME_FIELD]);
        let mut inode_num = [0u8; 4];
        inode_num.copy_from_slice(&buf[NAME_FIELD..ENTRY_SIZE]);
        Self {
            name,
            inode_num: u32::from_le_bytes(inode_num),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_length_boundary() {
        assert!(DirEntry::new(&"x".repeat(24), 1).is_ok());
        assert_eq!(
            DirEntry::new(&"x".repeat(25), 1).unwrap_err(),
            Error::NameTooLong
        );
    }

    #[test]
    fn codec_round_trip() {
        let entry = DirEntry::new("hello.txt", 42).unwrap();
        let buf = entry.encode();
        assert_eq!(&buf[..9], b"hello.txt");
        assert_eq!(buf[9], 0);
        assert_eq!(&buf[26..30], &42u32.to_le_bytes());

        let back = DirEntry::decode(&buf);
        assert_eq!(back.name(), "hello.txt");
        assert_eq!(back.inode_num(), 42);
        assert!(!back.is_free());
    }

    #[test]
    fn zeroed_slot_is_free() {
        assert!(DirEntry::decode(&[0u8; ENTRY_SIZE]).is_free());
    }
}
