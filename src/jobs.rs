//! Non-blocking area operations.
//!
//! A job runs one request (an area transfer, a whole data block, a memory
//! maintenance command or a directory query) on a worker thread that shares
//! the client's session. The client holds a single job slot: starting a job while the
//! previous one is still running fails with `CLI_JOB_PENDING`, and every
//! blocking call is refused with the same code until the job has finished.
//!
//! A job whose [`wait`](Client::wait) deadline expires becomes
//! [`JobState::TimedOut`] for good. The request itself cannot be cancelled;
//! its eventual result is dropped, and the slot stays busy until the worker
//! has returned.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use s7_client::{Client, ClientConfig, JobState};
//!
//! let mut client = Client::new(ClientConfig::new("192.168.0.1", 0, 2));
//! client.connect()?;
//!
//! let job = client.as_db_read(1, 0, 64)?;
//! while client.poll(&job) == JobState::Pending {
//!     // do something useful
//!     std::thread::sleep(Duration::from_millis(5));
//! }
//! let data = client.wait(&job, Duration::from_secs(1))?;
//! assert_eq!(data.len(), 64);
//! # Ok::<(), s7_client::S7Error>(())
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::debug;

use crate::client::{byte_count, run_control, Client};
use crate::command::{ControlCommand, UserDataCommand};
use crate::error::{Result, S7Error};
use crate::memory::{Area, BlockType, MemoryAddress};
use crate::session::{check_write_size, Session};
use crate::status::CLI_FUNCTION_REFUSED;
use crate::szl::{block_directory, block_info, SzlList, SZL_ID_LIST};
use crate::transport::Transport;

static NEXT_JOB_ID: AtomicU64 = AtomicU64::new(1);

/// Lifecycle of an asynchronous job.
///
/// `Pending` moves to exactly one of the other states and never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// The request has not completed yet.
    Pending,
    /// The request succeeded; the data is available through `wait`.
    Completed,
    /// The request failed.
    Failed,
    /// A `wait` deadline expired first.
    TimedOut,
}

/// Operation run by a job.
///
/// Every request completes with bytes: the data read, the data written, the
/// raw SZL answer or the raw block directory. Memory commands complete with
/// no bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobRequest {
    /// Read an area.
    Read(MemoryAddress),
    /// Write bytes to an area.
    Write(MemoryAddress, Vec<u8>),
    /// Read a whole data block, sized from its block info.
    DbGet(u16),
    /// Fill a whole data block with one byte.
    DbFill(u16, u8),
    /// Compress the user memory.
    Compress,
    /// Copy the RAM program into ROM.
    CopyRamToRom,
    /// Read one SZL list; the result is the reassembled answer that
    /// [`SzlList::parse`](crate::SzlList::parse) accepts.
    ReadSzl {
        /// SZL id.
        id: u16,
        /// SZL index.
        index: u16,
    },
    /// List the blocks of one type; 4 bytes per block, number first.
    ListBlocksOfType(BlockType),
}

impl JobRequest {
    fn name(&self) -> &'static str {
        match self {
            JobRequest::Read(_) => "read",
            JobRequest::Write(..) => "write",
            JobRequest::DbGet(_) => "db_get",
            JobRequest::DbFill(..) => "db_fill",
            JobRequest::Compress => "compress",
            JobRequest::CopyRamToRom => "copy_ram_to_rom",
            JobRequest::ReadSzl { .. } => "read_szl",
            JobRequest::ListBlocksOfType(_) => "list_blocks_of_type",
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            JobRequest::Read(address) => address.validate(),
            JobRequest::Write(address, data) => {
                address.validate()?;
                check_write_size(address, data)
            }
            _ => Ok(()),
        }
    }

    /// Runs the request on the worker's session.
    pub(crate) fn run<T: Transport>(self, session: &mut Session<T>) -> Result<Vec<u8>> {
        match self {
            JobRequest::Read(address) => session.read_area(&address),
            JobRequest::Write(address, data) => session.write_area(&address, &data).map(|()| data),
            JobRequest::DbGet(db_number) => {
                let size = block_info(session, BlockType::DB, db_number)?.mc7_size;
                session.read_area(&MemoryAddress::db(db_number, 0, size))
            }
            JobRequest::DbFill(db_number, filler) => {
                let size = block_info(session, BlockType::DB, db_number)?.mc7_size;
                let data = vec![filler; usize::from(size)];
                session.write_area(&MemoryAddress::db(db_number, 0, size), &data)?;
                Ok(data)
            }
            JobRequest::Compress => {
                run_control(session, ControlCommand::Compress)?;
                Ok(Vec::new())
            }
            JobRequest::CopyRamToRom => {
                run_control(session, ControlCommand::CopyRamToRom)?;
                Ok(Vec::new())
            }
            JobRequest::ReadSzl { id, index } => {
                let payload = session.user_data(&UserDataCommand::read_szl(id, index))?;
                SzlList::parse(&payload)?;
                Ok(payload)
            }
            JobRequest::ListBlocksOfType(block_type) => block_directory(session, block_type),
        }
    }
}

#[derive(Debug)]
struct Slot {
    state: JobState,
    running: bool,
    outcome: Option<Result<Vec<u8>>>,
}

#[derive(Debug)]
struct Shared {
    id: u64,
    slot: Mutex<Slot>,
    finished: Condvar,
}

/// Handle to one asynchronous job.
///
/// Handles are cheap to clone; all clones observe the same job.
#[derive(Debug, Clone)]
pub struct AsyncJob {
    shared: Arc<Shared>,
}

impl AsyncJob {
    fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                id: NEXT_JOB_ID.fetch_add(1, Ordering::Relaxed),
                slot: Mutex::new(Slot {
                    state: JobState::Pending,
                    running: true,
                    outcome: None,
                }),
                finished: Condvar::new(),
            }),
        }
    }

    /// Process-wide unique job number, used in log records.
    pub fn id(&self) -> u64 {
        self.shared.id
    }

    /// Current state.
    pub fn state(&self) -> JobState {
        self.shared.slot.lock().state
    }

    /// Returns true while the worker still owns the connection.
    ///
    /// This stays true for a `TimedOut` job until its request returns.
    pub fn is_running(&self) -> bool {
        self.shared.slot.lock().running
    }

    /// Error of a `Failed` job.
    pub fn failure(&self) -> Option<S7Error> {
        match &self.shared.slot.lock().outcome {
            Some(Err(err)) => Some(err.clone()),
            _ => None,
        }
    }

    fn same(&self, other: &AsyncJob) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    fn finish(&self, result: Result<Vec<u8>>) {
        let mut slot = self.shared.slot.lock();
        slot.running = false;
        if slot.state == JobState::TimedOut {
            debug!(job = self.shared.id, ok = result.is_ok(), "late job result discarded");
        } else {
            slot.state = if result.is_ok() {
                JobState::Completed
            } else {
                JobState::Failed
            };
            debug!(job = self.shared.id, state = ?slot.state, "job finished");
            slot.outcome = Some(result);
        }
        self.shared.finished.notify_all();
    }

    /// Blocks until the job leaves `Pending` or the deadline passes.
    fn wait_until(&self, deadline: Instant) -> Result<Vec<u8>> {
        let mut slot = self.shared.slot.lock();
        while slot.state == JobState::Pending {
            if self.shared.finished.wait_until(&mut slot, deadline).timed_out() {
                if slot.state == JobState::Pending {
                    slot.state = JobState::TimedOut;
                    debug!(job = self.shared.id, "job wait timed out");
                }
                break;
            }
        }
        match (&slot.state, &slot.outcome) {
            (JobState::Completed, Some(Ok(data))) => Ok(data.clone()),
            (JobState::Failed, Some(Err(err))) => Err(err.clone()),
            _ => Err(S7Error::Timeout),
        }
    }
}

impl<T: Transport> Client<T> {
    /// Starts a job and returns its handle without waiting for the answer.
    ///
    /// # Errors
    ///
    /// - `Validation` with `CLI_JOB_PENDING` if the previous job is still running
    /// - `Validation` if the address is invalid or the write size does not match
    /// - `Connection` if the client is not connected
    pub fn start(&mut self, request: JobRequest) -> Result<AsyncJob> {
        let idle = self.ensure_idle();
        self.record(idle)?;
        self.record(request.validate())?;
        if !self.get_connected() {
            return self.record(Err(S7Error::not_connected()));
        }

        let kind = request.name();
        let job = AsyncJob::new();
        let worker_job = job.clone();
        let session = Arc::clone(&self.session);
        let spawned = thread::Builder::new()
            .name(format!("s7-job-{}", job.id()))
            .spawn(move || {
                let result = request.run(&mut *session.lock());
                worker_job.finish(result);
            });
        if let Err(err) = spawned {
            return self.record(Err(S7Error::validation(
                CLI_FUNCTION_REFUSED,
                format!("cannot start job worker: {err}"),
            )));
        }

        debug!(job = job.id(), kind, "job started");
        self.job = Some(job.clone());
        Ok(job)
    }

    /// Starts an asynchronous area read.
    pub fn as_read_area(&mut self, address: MemoryAddress) -> Result<AsyncJob> {
        self.start(JobRequest::Read(address))
    }

    /// Starts an asynchronous area write.
    pub fn as_write_area(&mut self, address: MemoryAddress, data: &[u8]) -> Result<AsyncJob> {
        self.start(JobRequest::Write(address, data.to_vec()))
    }

    /// Starts an asynchronous data block read.
    pub fn as_db_read(&mut self, db_number: u16, start: u32, size: u16) -> Result<AsyncJob> {
        self.as_read_area(MemoryAddress::db(db_number, start, size))
    }

    /// Starts an asynchronous data block write.
    pub fn as_db_write(&mut self, db_number: u16, start: u32, data: &[u8]) -> Result<AsyncJob> {
        let size = self.record(byte_count(data))?;
        self.as_write_area(MemoryAddress::db(db_number, start, size), data)
    }

    /// Starts an asynchronous process output read.
    pub fn as_ab_read(&mut self, start: u32, size: u16) -> Result<AsyncJob> {
        self.as_read_area(MemoryAddress::new(Area::ProcessOutputs, 0, start, size))
    }

    /// Starts an asynchronous process output write.
    pub fn as_ab_write(&mut self, start: u32, data: &[u8]) -> Result<AsyncJob> {
        self.as_write_bytes(Area::ProcessOutputs, start, data)
    }

    /// Starts an asynchronous process input read.
    pub fn as_eb_read(&mut self, start: u32, size: u16) -> Result<AsyncJob> {
        self.as_read_area(MemoryAddress::new(Area::ProcessInputs, 0, start, size))
    }

    /// Starts an asynchronous process input write.
    pub fn as_eb_write(&mut self, start: u32, data: &[u8]) -> Result<AsyncJob> {
        self.as_write_bytes(Area::ProcessInputs, start, data)
    }

    /// Starts an asynchronous merker read.
    pub fn as_mb_read(&mut self, start: u32, size: u16) -> Result<AsyncJob> {
        self.as_read_area(MemoryAddress::new(Area::Merkers, 0, start, size))
    }

    /// Starts an asynchronous merker write.
    pub fn as_mb_write(&mut self, start: u32, data: &[u8]) -> Result<AsyncJob> {
        self.as_write_bytes(Area::Merkers, start, data)
    }

    /// Starts an asynchronous read of `amount` timers.
    pub fn as_tm_read(&mut self, start: u32, amount: u16) -> Result<AsyncJob> {
        self.as_read_area(MemoryAddress::new(Area::Timers, 0, start, amount))
    }

    /// Starts an asynchronous write of `amount` timers.
    pub fn as_tm_write(&mut self, start: u32, amount: u16, data: &[u8]) -> Result<AsyncJob> {
        self.as_write_area(MemoryAddress::new(Area::Timers, 0, start, amount), data)
    }

    /// Starts an asynchronous read of `amount` counters.
    pub fn as_ct_read(&mut self, start: u32, amount: u16) -> Result<AsyncJob> {
        self.as_read_area(MemoryAddress::new(Area::Counters, 0, start, amount))
    }

    /// Starts an asynchronous write of `amount` counters.
    pub fn as_ct_write(&mut self, start: u32, amount: u16, data: &[u8]) -> Result<AsyncJob> {
        self.as_write_area(MemoryAddress::new(Area::Counters, 0, start, amount), data)
    }

    /// Starts reading a whole data block.
    pub fn as_db_get(&mut self, db_number: u16) -> Result<AsyncJob> {
        self.start(JobRequest::DbGet(db_number))
    }

    /// Starts filling a whole data block with `filler`.
    pub fn as_db_fill(&mut self, db_number: u16, filler: u8) -> Result<AsyncJob> {
        self.start(JobRequest::DbFill(db_number, filler))
    }

    /// Starts compressing the user memory.
    pub fn as_compress(&mut self) -> Result<AsyncJob> {
        self.start(JobRequest::Compress)
    }

    /// Starts copying the RAM program into ROM.
    pub fn as_copy_ram_to_rom(&mut self) -> Result<AsyncJob> {
        self.start(JobRequest::CopyRamToRom)
    }

    /// Starts reading one SZL list.
    pub fn as_read_szl(&mut self, id: u16, index: u16) -> Result<AsyncJob> {
        self.start(JobRequest::ReadSzl { id, index })
    }

    /// Starts reading the list of SZL ids; the ids are the 2-byte records of
    /// the parsed answer.
    pub fn as_read_szl_list(&mut self) -> Result<AsyncJob> {
        self.as_read_szl(SZL_ID_LIST, 0)
    }

    /// Starts listing the blocks of one type.
    pub fn as_list_blocks_of_type(&mut self, block_type: BlockType) -> Result<AsyncJob> {
        self.start(JobRequest::ListBlocksOfType(block_type))
    }

    /// Block upload is not supported.
    pub fn as_upload(&mut self, _block_type: BlockType, _number: u16) -> Result<AsyncJob> {
        self.unsupported("as_upload")
    }

    /// Full block upload is not supported.
    pub fn as_full_upload(&mut self, _block_type: BlockType, _number: u16) -> Result<AsyncJob> {
        self.unsupported("as_full_upload")
    }

    /// Block download is not supported.
    pub fn as_download(&mut self, _number: u16, _data: &[u8]) -> Result<AsyncJob> {
        self.unsupported("as_download")
    }

    fn as_write_bytes(&mut self, area: Area, start: u32, data: &[u8]) -> Result<AsyncJob> {
        let size = self.record(byte_count(data))?;
        self.as_write_area(MemoryAddress::new(area, 0, start, size), data)
    }

    /// Returns the state of `job` without blocking.
    pub fn poll(&self, job: &AsyncJob) -> JobState {
        job.state()
    }

    /// Waits up to `timeout` for `job` and returns its data.
    ///
    /// A write job returns the bytes it wrote.
    ///
    /// # Errors
    ///
    /// - [`S7Error::Timeout`] if the deadline expires (the job becomes
    ///   `TimedOut`) or the job had already timed out
    /// - the job's own error if it failed
    pub fn wait(&mut self, job: &AsyncJob, timeout: Duration) -> Result<Vec<u8>> {
        let result = job.wait_until(Instant::now() + timeout);
        if !job.is_running() && self.job.as_ref().is_some_and(|current| current.same(job)) {
            self.job = None;
        }
        self.record(result)
    }
}
