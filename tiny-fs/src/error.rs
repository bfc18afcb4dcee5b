//! 错误种类。桥边界把它们换算成负的 POSIX 错误码。

use std::io;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// 路径某一级不存在，或中间一级不是目录
    NotFound,
    /// 目标名字已被占用
    AlreadyExists,
    /// inode 位图或数据块位图已满
    NoSpace,
    /// 超出单文件大小上限
    FileTooLarge,
    /// 文件名超过上限
    NameTooLong,
    /// 目录非空
    NotEmpty,
    /// 底层块设备读写失败
    Io,
    /// 路径不是绝对路径等非法参数
    InvalidArgument,
}

impl Error {
    /// 对应的 POSIX 错误码(正值)
    pub fn errno(self) -> i32 {
        match self {
            Self::NotFound => libc::ENOENT,
            Self::AlreadyExists => libc::EEXIST,
            Self::NoSpace => libc::ENOSPC,
            Self::FileTooLarge => libc::EFBIG,
            Self::NameTooLong => libc::ENAMETOOLONG,
            Self::NotEmpty => libc::ENOTEMPTY,
            Self::Io => libc::EIO,
            Self::InvalidArgument => libc::EINVAL,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        log::warn!("block device io error: {err}");
        Self::Io
    }
}
