use crate::{FsError, Result, StreamKind, SyncOptions, SyncReport, SyncWarning};
use fedfs_addr::MountPoint;
use log::{debug, trace};
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::Duration;

const DEFAULT_POLL: Duration = Duration::from_millis(50);

/// Tracks open entry streams per thread so synchronization can wait for or
/// forcibly sever them.
///
/// Each controller shares one accountant between its streams and its sync
/// path. Forced closing bumps a per-kind generation; streams carry the
/// generation they were opened under and fail with a closed error once it
/// moves on.
pub struct StreamAccountant {
    state: Mutex<AccountantState>,
    cond: Condvar,
    interrupted: AtomicBool,
    poll: Duration,
}

#[derive(Default)]
struct AccountantState {
    input: HashMap<ThreadId, usize>,
    output: HashMap<ThreadId, usize>,
    input_generation: u64,
    output_generation: u64,
}

impl AccountantState {
    fn counts(&self, kind: StreamKind) -> &HashMap<ThreadId, usize> {
        match kind {
            StreamKind::Input => &self.input,
            StreamKind::Output => &self.output,
        }
    }

    fn counts_mut(&mut self, kind: StreamKind) -> &mut HashMap<ThreadId, usize> {
        match kind {
            StreamKind::Input => &mut self.input,
            StreamKind::Output => &mut self.output,
        }
    }

    fn generation(&self, kind: StreamKind) -> u64 {
        match kind {
            StreamKind::Input => self.input_generation,
            StreamKind::Output => self.output_generation,
        }
    }

    fn total(&self, kind: StreamKind) -> usize {
        self.counts(kind).values().sum()
    }

    fn others(&self, kind: StreamKind) -> usize {
        let me = thread::current().id();
        self.counts(kind)
            .iter()
            .filter(|(thread, _)| **thread != me)
            .map(|(_, count)| count)
            .sum()
    }
}

impl Default for StreamAccountant {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamAccountant {
    pub fn new() -> Self {
        Self::with_poll(DEFAULT_POLL)
    }

    /// Use a custom poll interval for the cancellable wait loop.
    pub fn with_poll(poll: Duration) -> Self {
        Self {
            state: Mutex::new(AccountantState::default()),
            cond: Condvar::new(),
            interrupted: AtomicBool::new(false),
            poll,
        }
    }

    /// Register an open stream on the current thread.
    pub fn open(self: &Arc<Self>, kind: StreamKind) -> StreamTicket {
        let thread = thread::current().id();
        let mut state = self.state.lock();
        *state.counts_mut(kind).entry(thread).or_insert(0) += 1;
        let generation = state.generation(kind);
        trace!("accountant: opened {} stream on {:?}", kind, thread);
        StreamTicket {
            accountant: self.clone(),
            kind,
            thread,
            generation,
        }
    }

    /// Total open streams of the given kind, all threads.
    pub fn open_streams(&self, kind: StreamKind) -> usize {
        self.state.lock().total(kind)
    }

    /// Open streams of the given kind held by *other* threads.
    pub fn other_streams(&self, kind: StreamKind) -> usize {
        self.state.lock().others(kind)
    }

    /// Block until all other threads' streams of the given kind close.
    ///
    /// The current thread's own streams are ignored. Returns `false` if the
    /// wait was interrupted, which is not an error: the caller falls
    /// through to its busy/force decision.
    pub fn wait_other_streams(&self, kind: StreamKind) -> bool {
        let mut state = self.state.lock();
        loop {
            if state.others(kind) == 0 {
                return true;
            }
            if self.interrupted.swap(false, Ordering::SeqCst) {
                return false;
            }
            self.cond.wait_for(&mut state, self.poll);
        }
    }

    /// Abort in-progress waits without error.
    pub fn interrupt(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
        self.cond.notify_all();
    }

    /// Sever every open stream of the given kind.
    ///
    /// Subsequent I/O on the severed streams fails with a closed error.
    /// Returns how many streams were severed.
    pub fn force_close(&self, kind: StreamKind) -> usize {
        let mut state = self.state.lock();
        let severed = state.total(kind);
        state.counts_mut(kind).clear();
        match kind {
            StreamKind::Input => state.input_generation += 1,
            StreamKind::Output => state.output_generation += 1,
        }
        drop(state);
        self.cond.notify_all();
        if severed > 0 {
            debug!("accountant: forcibly closed {} {} stream(s)", severed, kind);
        }
        severed
    }

    fn release(&self, ticket: &StreamTicket) {
        let mut state = self.state.lock();
        // A stale generation means the stream was already severed by a
        // forced close; its count is gone.
        if state.generation(ticket.kind) != ticket.generation {
            return;
        }
        if let Some(count) = state.counts_mut(ticket.kind).get_mut(&ticket.thread) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                state.counts_mut(ticket.kind).remove(&ticket.thread);
            }
        }
        drop(state);
        self.cond.notify_all();
    }

    fn is_current(&self, ticket: &StreamTicket) -> bool {
        self.state.lock().generation(ticket.kind) == ticket.generation
    }
}

/// Releases its stream slot on drop; invalidated by forced closes.
pub struct StreamTicket {
    accountant: Arc<StreamAccountant>,
    kind: StreamKind,
    thread: ThreadId,
    generation: u64,
}

impl StreamTicket {
    /// Fail with a closed error if the stream was forcibly severed.
    pub fn ensure_valid(&self) -> io::Result<()> {
        if self.accountant.is_current(self) {
            Ok(())
        } else {
            Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "stream forcibly closed by sync",
            ))
        }
    }
}

impl Drop for StreamTicket {
    fn drop(&mut self) {
        self.accountant.release(self);
    }
}

/// An entry input stream registered with an accountant.
pub struct AccountedRead {
    inner: Box<dyn Read + Send>,
    ticket: StreamTicket,
}

impl AccountedRead {
    pub fn new(inner: Box<dyn Read + Send>, ticket: StreamTicket) -> Self {
        Self { inner, ticket }
    }
}

impl Read for AccountedRead {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.ticket.ensure_valid()?;
        self.inner.read(buf)
    }
}

/// An entry output stream registered with an accountant.
pub struct AccountedWrite {
    inner: Box<dyn Write + Send>,
    ticket: StreamTicket,
}

impl AccountedWrite {
    pub fn new(inner: Box<dyn Write + Send>, ticket: StreamTicket) -> Self {
        Self { inner, ticket }
    }
}

impl Write for AccountedWrite {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.ticket.ensure_valid()?;
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.ticket.ensure_valid()?;
        self.inner.flush()
    }
}

/// Apply the WAIT/FORCE stream options at the start of a controller's sync.
///
/// Waits for other threads where requested, then either severs remaining
/// streams (reporting a warning per kind) or fails busy. Called before any
/// write-back I/O so illegal option combinations are rejected first.
pub fn prepare_sync(
    accountant: &StreamAccountant,
    options: SyncOptions,
    mount_point: &MountPoint,
    report: &mut SyncReport,
) -> Result<()> {
    options.validate()?;
    let plan = [
        (
            StreamKind::Input,
            SyncOptions::WAIT_CLOSE_INPUT,
            SyncOptions::FORCE_CLOSE_INPUT,
        ),
        (
            StreamKind::Output,
            SyncOptions::WAIT_CLOSE_OUTPUT,
            SyncOptions::FORCE_CLOSE_OUTPUT,
        ),
    ];
    for (kind, wait, force) in plan {
        if options.contains(wait) && accountant.other_streams(kind) > 0 {
            accountant.wait_other_streams(kind);
        }
        let open = accountant.open_streams(kind);
        if open > 0 {
            if options.contains(force) {
                let severed = accountant.force_close(kind);
                report.warn(SyncWarning::ForcedClose {
                    mount_point: mount_point.clone(),
                    kind,
                    count: severed,
                });
            } else {
                return Err(FsError::Sync(crate::SyncError::Busy));
            }
        }
    }
    Ok(())
}
