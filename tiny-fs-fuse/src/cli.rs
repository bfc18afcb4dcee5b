use std::path::PathBuf;

use clap::Parser;

/// 把一个磁盘镜像挂载成 tiny-fs 文件系统
#[derive(Parser)]
pub struct Cli {
    /// 磁盘镜像路径
    pub image: PathBuf,

    /// 挂载点
    pub mountpoint: PathBuf,

    /// 挂载已有镜像，跳过格式化
    #[arg(long)]
    pub no_init: bool,

    /// 格式化时镜像的总块数
    #[arg(long, default_value_t = 65536)]
    pub blocks: usize,

    /// 透传给 FUSE 的挂载选项
    #[arg(short = 'o', value_name = "OPTION")]
    pub options: Vec<String>,
}
