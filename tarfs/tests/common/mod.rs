#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use block_dev::{BLOCK_SIZE, BlockDevice};

/// 内存中的块设备，越界访问直接panic
#[derive(Debug)]
pub struct RamDisk(Mutex<Vec<u8>>);

impl RamDisk {
    pub fn new(mut image: Vec<u8>) -> Arc<Self> {
        image.resize(image.len().div_ceil(BLOCK_SIZE) * BLOCK_SIZE, 0);
        Arc::new(Self(Mutex::new(image)))
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.0.lock().unwrap().clone()
    }
}

impl BlockDevice for RamDisk {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) {
        assert!(block_id < self.num_blocks(), "read past the device: {block_id}");
        let image = self.0.lock().unwrap();
        buf.copy_from_slice(&image[block_id * BLOCK_SIZE..][..BLOCK_SIZE]);
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) {
        assert!(block_id < self.num_blocks(), "write past the device: {block_id}");
        let mut image = self.0.lock().unwrap();
        image[block_id * BLOCK_SIZE..][..BLOCK_SIZE].copy_from_slice(buf);
    }

    fn num_blocks(&self) -> usize {
        self.0.lock().unwrap().len() / BLOCK_SIZE
    }
}

pub fn device(image: Vec<u8>) -> Arc<dyn BlockDevice> {
    RamDisk::new(image)
}

/// 逐字节构造ustar归档
#[derive(Debug, Default)]
pub struct Archive {
    bytes: Vec<u8>,
}

impl Archive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dir(self, path: &str) -> Self {
        self.block(header(path, b'5', 0, ""))
    }

    pub fn file(self, path: &str, data: &[u8]) -> Self {
        self.block(header(path, b'0', data.len() as u64, ""))
            .content(data)
    }

    pub fn symlink(self, path: &str, target: &str) -> Self {
        self.block(header(path, b'2', 0, target))
    }

    /// GNU长路径条目，后面必须紧跟它所描述的条目
    pub fn long_name(self, path: &str) -> Self {
        let mut name = path.as_bytes().to_vec();
        name.push(0);
        self.block(header("././@LongLink", b'L', name.len() as u64, ""))
            .content(&name)
    }

    pub fn block(mut self, block: [u8; BLOCK_SIZE]) -> Self {
        self.bytes.extend_from_slice(&block);
        self
    }

    pub fn content(mut self, data: &[u8]) -> Self {
        self.bytes.extend_from_slice(data);
        self.bytes
            .resize(self.bytes.len().div_ceil(BLOCK_SIZE) * BLOCK_SIZE, 0);
        self
    }

    /// 追加两个全零块作为结束标志
    pub fn finish(mut self) -> Vec<u8> {
        self.bytes.resize(self.bytes.len() + 2 * BLOCK_SIZE, 0);
        self.bytes
    }

    /// 不追加结束标志
    pub fn unterminated(self) -> Vec<u8> {
        self.bytes
    }
}

pub fn header(path: &str, typeflag: u8, size: u64, link: &str) -> [u8; BLOCK_SIZE] {
    let mut block = [0u8; BLOCK_SIZE];
    block[..path.len()].copy_from_slice(path.as_bytes());
    block[100..108].copy_from_slice(b"0000644\0");
    block[108..116].copy_from_slice(b"0001750\0");
    block[116..124].copy_from_slice(b"0001750\0");
    block[124..136].copy_from_slice(format!("{size:011o}\0").as_bytes());
    block[136..148].copy_from_slice(b"14723573155\0");
    block[156] = typeflag;
    block[157..157 + link.len()].copy_from_slice(link.as_bytes());
    block[257..263].copy_from_slice(b"ustar\0");
    block[263..265].copy_from_slice(b"00");
    seal(&mut block);
    block
}

/// 重新计算校验和
pub fn seal(block: &mut [u8; BLOCK_SIZE]) {
    block[148..156].fill(b' ');
    let sum: u32 = block.iter().map(|&b| u32::from(b)).sum();
    block[148..156].copy_from_slice(format!("{sum:06o}\0 ").as_bytes());
}
