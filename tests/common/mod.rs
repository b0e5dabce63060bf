#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use sector_nor_flash_rs::{AsyncFlashDevice, FlashDevice, ERASED_BYTE, SECTOR_SIZE};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MockError {
    ReadFault,
    ProgramFault,
    EraseFault,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op {
    Read,
    Program,
    Erase,
}

#[derive(Clone, Copy, Debug)]
pub struct OpRecord {
    pub op: Op,
    pub address: u32,
    pub start: Instant,
    pub end: Instant,
}

/// RAM-backed flash with real NOR semantics: erase sets a whole sector to
/// 0xFF, program can only clear bits. Records every device operation with
/// start/end timestamps and supports fault injection.
pub struct MockFlash {
    mem: Arc<Mutex<Vec<u8>>>,
    log: Arc<Mutex<Vec<OpRecord>>>,
    /// Erasing the sector at this address fails.
    pub fail_erase_at: Option<u32>,
    /// Programming at this address fails.
    pub fail_program_at: Option<u32>,
    /// Every read returns this many bytes fewer than requested.
    pub short_read_by: usize,
    /// Added to every operation, to widen the race window in lock tests.
    pub op_delay: Duration,
}

impl MockFlash {
    pub fn new(sectors: usize) -> Self {
        Self {
            mem: Arc::new(Mutex::new(vec![ERASED_BYTE; sectors * SECTOR_SIZE as usize])),
            log: Arc::new(Mutex::new(Vec::new())),
            fail_erase_at: None,
            fail_program_at: None,
            short_read_by: 0,
            op_delay: Duration::ZERO,
        }
    }

    /// Backdoor handle to the device content, usable after the device has
    /// been handed to a writer.
    pub fn mem_handle(&self) -> Arc<Mutex<Vec<u8>>> {
        self.mem.clone()
    }

    /// Backdoor handle to the operation log.
    pub fn log_handle(&self) -> Arc<Mutex<Vec<OpRecord>>> {
        self.log.clone()
    }

    /// Seeds device content directly, bypassing NOR program semantics.
    pub fn load(&self, address: u32, data: &[u8]) {
        let mut mem = self.mem.lock().unwrap();
        mem[address as usize..address as usize + data.len()].copy_from_slice(data);
    }

    pub fn snapshot(&self) -> Vec<u8> {
        self.mem.lock().unwrap().clone()
    }

    fn record(&self, op: Op, address: u32) -> OpRecord {
        let start = Instant::now();
        if !self.op_delay.is_zero() {
            std::thread::sleep(self.op_delay);
        }
        OpRecord {
            op,
            address,
            start,
            end: start, // patched on completion
        }
    }

    fn commit(&self, mut rec: OpRecord) {
        rec.end = Instant::now();
        self.log.lock().unwrap().push(rec);
    }
}

impl FlashDevice for MockFlash {
    type Error = MockError;

    fn capacity(&self) -> usize {
        self.mem.lock().unwrap().len()
    }

    fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<usize, Self::Error> {
        assert_eq!(address % 4, 0, "raw read must be 4-byte aligned");
        let rec = self.record(Op::Read, address);
        let mem = self.mem.lock().unwrap();
        let got = buf.len().saturating_sub(self.short_read_by);
        let at = address as usize;
        assert!(at + buf.len() <= mem.len(), "read past end of device");
        buf[..got].copy_from_slice(&mem[at..at + got]);
        drop(mem);
        self.commit(rec);
        Ok(got)
    }

    fn program(&mut self, address: u32, data: &[u8]) -> Result<usize, Self::Error> {
        if self.fail_program_at == Some(address) {
            return Err(MockError::ProgramFault);
        }
        let rec = self.record(Op::Program, address);
        let mut mem = self.mem.lock().unwrap();
        let at = address as usize;
        assert!(at + data.len() <= mem.len(), "program past end of device");
        for (cell, byte) in mem[at..at + data.len()].iter_mut().zip(data) {
            // NOR programming can only clear bits.
            *cell &= *byte;
        }
        drop(mem);
        self.commit(rec);
        Ok(data.len())
    }

    fn erase_sector(&mut self, address: u32) -> Result<usize, Self::Error> {
        assert_eq!(address % SECTOR_SIZE, 0, "erase must be sector-aligned");
        if self.fail_erase_at == Some(address) {
            return Err(MockError::EraseFault);
        }
        let rec = self.record(Op::Erase, address);
        let mut mem = self.mem.lock().unwrap();
        let at = address as usize;
        mem[at..at + SECTOR_SIZE as usize].fill(ERASED_BYTE);
        drop(mem);
        self.commit(rec);
        Ok(SECTOR_SIZE as usize)
    }
}

/// Async wrapper delegating to the blocking mock.
pub struct AsyncMockFlash(pub MockFlash);

impl AsyncFlashDevice for AsyncMockFlash {
    type Error = MockError;

    fn capacity(&self) -> usize {
        FlashDevice::capacity(&self.0)
    }

    async fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<usize, Self::Error> {
        FlashDevice::read(&mut self.0, address, buf)
    }

    async fn program(&mut self, address: u32, data: &[u8]) -> Result<usize, Self::Error> {
        FlashDevice::program(&mut self.0, address, data)
    }

    async fn erase_sector(&mut self, address: u32) -> Result<usize, Self::Error> {
        FlashDevice::erase_sector(&mut self.0, address)
    }
}

/// Byte pattern that differs between neighbouring addresses and sectors.
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 + i / 256) as u8).collect()
}
