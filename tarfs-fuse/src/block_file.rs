use std::cell::RefCell;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};

use block_dev::{BLOCK_SIZE, BlockDevice};
use send_wrapper::SendWrapper;

/// A host file seen as a block device. A trailing partial block is ignored.
#[derive(Debug)]
pub struct BlockFile {
    inner: SendWrapper<RefCell<File>>,
    num_blocks: usize,
}

impl BlockFile {
    pub fn new(fd: File) -> io::Result<Self> {
        let len = fd.metadata()?.len() as usize;
        if len % BLOCK_SIZE != 0 {
            log::warn!("image length {len} is not a multiple of {BLOCK_SIZE}");
        }

        Ok(Self {
            inner: SendWrapper::new(RefCell::new(fd)),
            num_blocks: len / BLOCK_SIZE,
        })
    }
}

impl BlockDevice for BlockFile {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) {
        let mut file = self.inner.borrow_mut();
        file.seek(SeekFrom::Start((block_id * BLOCK_SIZE) as u64))
            .expect("seeking error");
        file.read_exact(&mut buf[..BLOCK_SIZE])
            .expect("not a complete block!");
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) {
        let mut file = self.inner.borrow_mut();
        file.seek(SeekFrom::Start((block_id * BLOCK_SIZE) as u64))
            .expect("seeking error");
        file.write_all(&buf[..BLOCK_SIZE])
            .expect("not a complete block!");
    }

    fn num_blocks(&self) -> usize {
        self.num_blocks
    }
}
