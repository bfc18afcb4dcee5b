use std::fs::File;
use std::io;
use std::io::{Read, Seek, SeekFrom, Write};
use std::sync::Mutex;

use tiny_fs::{BlockDevice, BLOCK_SIZE};

/// 拿一个普通文件当块设备用
pub struct BlockFile(pub Mutex<File>);

impl BlockDevice for BlockFile {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> io::Result<()> {
        let mut file = self.0.lock().unwrap();
        file.seek(SeekFrom::Start((block_id * BLOCK_SIZE) as u64))?;
        file.read_exact(buf)
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> io::Result<()> {
        let mut file = self.0.lock().unwrap();
        file.seek(SeekFrom::Start((block_id * BLOCK_SIZE) as u64))?;
        file.write_all(buf)
    }
}

#[cfg(test)]
mod tests {
    use std::fs::OpenOptions;

    use super::*;

    #[test]
    fn block_round_trip() {
        let path = std::env::temp_dir().join("tiny-fs-block-file-test.img");
        let fd = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .unwrap();
        fd.set_len(4 * BLOCK_SIZE as u64).unwrap();

        let file = BlockFile(Mutex::new(fd));
        let data = [0xa5u8; BLOCK_SIZE];
        file.write_block(2, &data).unwrap();

        let mut back = [0u8; BLOCK_SIZE];
        file.read_block(2, &mut back).unwrap();
        assert_eq!(data, back);

        let _ = std::fs::remove_file(path);
    }
}
