use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::fs;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use bytes::Bytes;
use parking_lot::RwLock;

use crate::api::collab::BlockManager;
use crate::api::error::{Error, Result};
use crate::evict::reference::Addr;

const MAGIC: &[u8] = b"EVICTREE1";
const HEAD: u64 = MAGIC.len() as u64 + 4; // magic + block_bytes (u32)

fn id_of(addr: &Addr) -> Result<u32> {
    if addr.bytes.len() != 4 {
        return Err(Error::Other("malformed block address".into()));
    }
    let b = &addr.bytes;
    Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

fn addr_of(id: u32, size: u32) -> Addr {
    Addr::new(Bytes::from(id.to_be_bytes().to_vec()), size)
}

/// Opaque persistent-address allocator. Reuses the free-id min-heap pattern
/// from the whole-tree store this crate started from: ids are handed out
/// ascending and recycled through a `BinaryHeap<Reverse<u32>>` so the
/// lowest-numbered freed block is reused first.
pub struct FileBlockManager {
    file: RwLock<fs::File>,
    block_bytes: u32,
    next_id: RwLock<u32>,
    free: RwLock<BinaryHeap<Reverse<u32>>>,
}

impl FileBlockManager {
    pub fn create(path: &Path, block_bytes: u32) -> Result<Self> {
        let mut file = fs::OpenOptions::new()
            .create(true)
            .truncate(true)
            .read(true)
            .write(true)
            .open(path)?;
        file.write_all(MAGIC)?;
        file.write_all(&block_bytes.to_be_bytes())?;
        Ok(Self {
            file: RwLock::new(file),
            block_bytes,
            next_id: RwLock::new(0),
            free: RwLock::new(BinaryHeap::new()),
        })
    }

    pub fn open(path: &Path) -> Result<Self> {
        let mut file = fs::OpenOptions::new().read(true).write(true).open(path)?;
        let mut magic = vec![0u8; MAGIC.len()];
        file.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(Error::Other("not an evictree block file".into()));
        }
        let mut len_buf = [0u8; 4];
        file.read_exact(&mut len_buf)?;
        let block_bytes = u32::from_be_bytes(len_buf);
        let file_len = file.metadata()?.len();
        let next_id = ((file_len.saturating_sub(HEAD)) / block_bytes as u64) as u32;
        Ok(Self {
            file: RwLock::new(file),
            block_bytes,
            next_id: RwLock::new(next_id),
            free: RwLock::new(BinaryHeap::new()),
        })
    }

    fn alloc_id(&self) -> u32 {
        if let Some(Reverse(id)) = self.free.write().pop() {
            return id;
        }
        let mut next = self.next_id.write();
        let id = *next;
        *next += 1;
        id
    }

    fn offset(&self, id: u32) -> u64 {
        HEAD + id as u64 * self.block_bytes as u64
    }
}

impl BlockManager for FileBlockManager {
    fn alloc(&self, bytes: Bytes) -> Result<Addr> {
        if bytes.len() as u32 > self.block_bytes {
            return Err(Error::Other("block image larger than block_bytes".into()));
        }
        let id = self.alloc_id();
        let mut buf = vec![0u8; self.block_bytes as usize];
        buf[..bytes.len()].copy_from_slice(&bytes);

        let mut file = self.file.write();
        file.seek(SeekFrom::Start(self.offset(id)))?;
        file.write_all(&buf)?;
        Ok(addr_of(id, bytes.len() as u32))
    }

    fn free(&self, addr: &Addr) -> Result<()> {
        let id = id_of(addr)?;
        self.free.write().push(Reverse(id));
        Ok(())
    }
}

/// In-memory stand-in for the block manager, used by tests and the demo
/// binary so they don't need a scratch file on disk.
pub struct InMemoryBlockManager {
    blocks: RwLock<HashMap<u32, Bytes>>,
    next_id: RwLock<u32>,
    free: RwLock<BinaryHeap<Reverse<u32>>>,
}

impl InMemoryBlockManager {
    pub fn new() -> Self {
        Self {
            blocks: RwLock::new(HashMap::new()),
            next_id: RwLock::new(0),
            free: RwLock::new(BinaryHeap::new()),
        }
    }

    fn alloc_id(&self) -> u32 {
        if let Some(Reverse(id)) = self.free.write().pop() {
            return id;
        }
        let mut next = self.next_id.write();
        let id = *next;
        *next += 1;
        id
    }

    pub fn len(&self) -> usize {
        self.blocks.read().len()
    }
}

impl Default for InMemoryBlockManager {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockManager for InMemoryBlockManager {
    fn alloc(&self, bytes: Bytes) -> Result<Addr> {
        let id = self.alloc_id();
        let size = bytes.len() as u32;
        self.blocks.write().insert(id, bytes);
        Ok(addr_of(id, size))
    }

    fn free(&self, addr: &Addr) -> Result<()> {
        let id = id_of(addr)?;
        self.blocks.write().remove(&id);
        self.free.write().push(Reverse(id));
        Ok(())
    }
}
