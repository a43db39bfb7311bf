#![allow(dead_code)]

use kernel_bio::{BlockData, BlockDevice, BlockId, BlockIoError, BufferCache};
use kernel_info::param::BSIZE;
use kernel_sync::Park;
use std::collections::HashMap;
use std::sync::Mutex;
use std::thread;

/// Lets the host scheduler run the holder while a buffer is busy.
pub struct ThreadPark;

impl Park for ThreadPark {
    fn park(_channel: usize) {
        thread::yield_now();
    }

    fn unpark_all(_channel: usize) {}
}

/// Disk image in host memory, counting transfers per block.
///
/// Unwritten blocks read back as [`pattern`]. Device `bad_dev` reports
/// [`BlockIoError::NoDevice`]; block `bad_block` reports [`BlockIoError::Io`].
#[derive(Default)]
pub struct MemDisk {
    blocks: Mutex<HashMap<BlockId, BlockData>>,
    reads: Mutex<HashMap<BlockId, usize>>,
    writes: Mutex<HashMap<BlockId, usize>>,
    bad_dev: Option<u32>,
    bad_block: Option<BlockId>,
}

impl MemDisk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(dev: u32) -> Self {
        Self {
            bad_dev: Some(dev),
            ..Self::default()
        }
    }

    pub fn failing_block(dev: u32, block: u32) -> Self {
        Self {
            bad_block: Some(BlockId::new(dev, block)),
            ..Self::default()
        }
    }

    pub fn reads(&self, dev: u32, block: u32) -> usize {
        count(&self.reads, BlockId::new(dev, block))
    }

    pub fn writes(&self, dev: u32, block: u32) -> usize {
        count(&self.writes, BlockId::new(dev, block))
    }

    pub fn total_reads(&self) -> usize {
        self.reads.lock().unwrap().values().sum()
    }

    pub fn contents(&self, dev: u32, block: u32) -> BlockData {
        let id = BlockId::new(dev, block);
        self.blocks
            .lock()
            .unwrap()
            .get(&id)
            .copied()
            .unwrap_or_else(|| pattern(id))
    }

    fn check(&self, id: BlockId) -> Result<(), BlockIoError> {
        if self.bad_dev == Some(id.dev) {
            return Err(BlockIoError::NoDevice { dev: id.dev });
        }
        if self.bad_block == Some(id) {
            return Err(BlockIoError::Io {
                dev: id.dev,
                block: id.block,
            });
        }
        Ok(())
    }
}

impl BlockDevice for MemDisk {
    fn read_block(&self, id: BlockId, buf: &mut BlockData) -> Result<(), BlockIoError> {
        self.check(id)?;
        *self.reads.lock().unwrap().entry(id).or_default() += 1;
        *buf = self.contents(id.dev, id.block);
        Ok(())
    }

    fn write_block(&self, id: BlockId, buf: &BlockData) -> Result<(), BlockIoError> {
        self.check(id)?;
        *self.writes.lock().unwrap().entry(id).or_default() += 1;
        self.blocks.lock().unwrap().insert(id, *buf);
        Ok(())
    }
}

fn count(map: &Mutex<HashMap<BlockId, usize>>, id: BlockId) -> usize {
    map.lock().unwrap().get(&id).copied().unwrap_or(0)
}

/// Initial on-disk contents of `id`.
pub fn pattern(id: BlockId) -> BlockData {
    let mut data = [0; BSIZE];
    for (i, b) in data.iter_mut().enumerate() {
        *b = (id.dev as usize * 7 + id.block as usize * 13 + i) as u8;
    }
    data
}

pub type Cache<const NBUF: usize, const NBUCKET: usize> =
    BufferCache<MemDisk, ThreadPark, NBUF, NBUCKET>;

/// The default-sized cache.
pub type Bcache = BufferCache<MemDisk, ThreadPark>;
