//! Simulated machine for integration tests: page-granular user memory, an
//! in-memory file system, a recording console and a thread-per-process
//! loader.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, OnceLock, Weak};
use std::thread::{self, JoinHandle};

use pantheros_userprog::config::PHYS_BASE;
use pantheros_userprog::mm::{Access, UserAddr, UserMemory, PAGE_SIZE};
use pantheros_userprog::services::{
    Console, File, FileSystem, Machine, ProcessManager, Scheduler, Services, SpawnError,
};
use pantheros_userprog::syscall::Sysno;
use pantheros_userprog::{Config, Kernel, Pid, Process, ProcessTable, TrapFrame, TrapOutcome};

/// Top of the user stack, right below the split.
pub const STACK_TOP: usize = PHYS_BASE;
/// Stack pointer used for every simulated trap.
pub const USER_SP: usize = STACK_TOP - 64;
/// Start of the read-write data region.
pub const DATA: usize = 0x0804_8000;
/// Pages in the data region.
pub const DATA_PAGES: usize = 4;
/// Read-only page right after the data region.
pub const RODATA: usize = DATA + DATA_PAGES * PAGE_SIZE;
/// Return register contents before a call, to detect untouched frames.
pub const SENTINEL: u64 = 0xDEAD_BEEF;

// ---------------------------------------------------------------------------
// User memory
// ---------------------------------------------------------------------------

struct Page {
    access: Access,
    bytes: Box<[u8; PAGE_SIZE]>,
}

#[derive(Default)]
struct SimInner {
    pages: Mutex<BTreeMap<usize, Page>>,
    probes: AtomicUsize,
}

/// Page-granular user address space. Clones share the same pages.
#[derive(Clone, Default)]
pub struct SimMemory {
    inner: Arc<SimInner>,
}

impl SimMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map every page touched by `[addr, addr + len)` with `access`.
    pub fn map(&self, addr: usize, len: usize, access: Access) {
        let mut pages = self.inner.pages.lock().unwrap();
        for page in addr / PAGE_SIZE..=(addr + len - 1) / PAGE_SIZE {
            pages
                .entry(page)
                .or_insert_with(|| Page {
                    access,
                    bytes: Box::new([0; PAGE_SIZE]),
                })
                .access = access;
        }
    }

    /// Change the rights of the page containing `addr`.
    pub fn protect(&self, addr: usize, access: Access) {
        let mut pages = self.inner.pages.lock().unwrap();
        pages.get_mut(&(addr / PAGE_SIZE)).unwrap().access = access;
    }

    /// Store bytes regardless of access rights.
    pub fn write(&self, addr: usize, data: &[u8]) {
        let mut pages = self.inner.pages.lock().unwrap();
        for (i, &byte) in data.iter().enumerate() {
            let a = addr + i;
            let page = pages.get_mut(&(a / PAGE_SIZE)).expect("write to unmapped page");
            page.bytes[a % PAGE_SIZE] = byte;
        }
    }

    /// Load bytes regardless of access rights.
    pub fn read(&self, addr: usize, len: usize) -> Vec<u8> {
        let pages = self.inner.pages.lock().unwrap();
        (addr..addr + len)
            .map(|a| pages.get(&(a / PAGE_SIZE)).expect("read of unmapped page").bytes[a % PAGE_SIZE])
            .collect()
    }

    /// Probes issued so far.
    pub fn probes(&self) -> usize {
        self.inner.probes.load(Ordering::SeqCst)
    }

    fn access(&self, addr: UserAddr, needed: Access) -> Option<(usize, usize)> {
        self.inner.probes.fetch_add(1, Ordering::SeqCst);
        let pages = self.inner.pages.lock().unwrap();
        let page = pages.get(&addr.page_number())?;
        page.access
            .contains(needed)
            .then_some((addr.page_number(), addr.page_offset()))
    }
}

impl UserMemory for SimMemory {
    fn get_user(&self, addr: UserAddr) -> Option<u8> {
        let (page, offset) = self.access(addr, Access::READ)?;
        Some(self.inner.pages.lock().unwrap()[&page].bytes[offset])
    }

    fn put_user(&self, addr: UserAddr, byte: u8) -> bool {
        match self.access(addr, Access::WRITE) {
            Some((page, offset)) => {
                self.inner.pages.lock().unwrap().get_mut(&page).unwrap().bytes[offset] = byte;
                true
            }
            None => false,
        }
    }
}

// ---------------------------------------------------------------------------
// File system
// ---------------------------------------------------------------------------

#[derive(Default)]
struct FsInner {
    files: Mutex<HashMap<String, Arc<Mutex<Vec<u8>>>>>,
    open: AtomicUsize,
}

/// In-memory file system. Files never grow past their created size.
#[derive(Clone, Default)]
pub struct MemFs {
    inner: Arc<FsInner>,
}

impl MemFs {
    pub fn add(&self, name: &str, data: &[u8]) {
        self.inner
            .files
            .lock()
            .unwrap()
            .insert(name.to_string(), Arc::new(Mutex::new(data.to_vec())));
    }

    pub fn contents(&self, name: &str) -> Option<Vec<u8>> {
        let files = self.inner.files.lock().unwrap();
        files.get(name).map(|data| data.lock().unwrap().clone())
    }

    /// Handles opened and not yet closed.
    pub fn open_handles(&self) -> usize {
        self.inner.open.load(Ordering::SeqCst)
    }
}

impl FileSystem for MemFs {
    fn create(&self, name: &str, initial_size: u32) -> bool {
        let mut files = self.inner.files.lock().unwrap();
        if name.is_empty() || files.contains_key(name) {
            return false;
        }
        files.insert(
            name.to_string(),
            Arc::new(Mutex::new(vec![0; initial_size as usize])),
        );
        true
    }

    fn remove(&self, name: &str) -> bool {
        self.inner.files.lock().unwrap().remove(name).is_some()
    }

    fn open(&self, name: &str) -> Option<Box<dyn File>> {
        let data = self.inner.files.lock().unwrap().get(name)?.clone();
        self.inner.open.fetch_add(1, Ordering::SeqCst);
        Some(Box::new(MemFile {
            data,
            pos: 0,
            fs: self.inner.clone(),
        }))
    }
}

struct MemFile {
    data: Arc<Mutex<Vec<u8>>>,
    pos: u32,
    fs: Arc<FsInner>,
}

impl File for MemFile {
    fn read(&mut self, buf: &mut [u8]) -> usize {
        let data = self.data.lock().unwrap();
        let start = (self.pos as usize).min(data.len());
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        self.pos += n as u32;
        n
    }

    fn write(&mut self, buf: &[u8]) -> usize {
        let mut data = self.data.lock().unwrap();
        let start = (self.pos as usize).min(data.len());
        let n = buf.len().min(data.len() - start);
        data[start..start + n].copy_from_slice(&buf[..n]);
        self.pos += n as u32;
        n
    }

    fn seek(&mut self, pos: u32) {
        self.pos = pos;
    }

    fn tell(&self) -> u32 {
        self.pos
    }

    fn size(&self) -> u32 {
        self.data.lock().unwrap().len() as u32
    }
}

impl Drop for MemFile {
    fn drop(&mut self) {
        self.fs.open.fetch_sub(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Console and machine
// ---------------------------------------------------------------------------

#[derive(Default)]
struct ConsoleInner {
    output: Mutex<Vec<u8>>,
    writes: Mutex<Vec<usize>>,
    input: Mutex<VecDeque<u8>>,
}

/// Console that records output and replays queued input.
#[derive(Clone, Default)]
pub struct ConsoleLog {
    inner: Arc<ConsoleInner>,
}

impl ConsoleLog {
    pub fn output(&self) -> Vec<u8> {
        self.inner.output.lock().unwrap().clone()
    }

    /// Length of every `putbuf` call, in order.
    pub fn writes(&self) -> Vec<usize> {
        self.inner.writes.lock().unwrap().clone()
    }

    pub fn type_input(&self, data: &[u8]) {
        self.inner.input.lock().unwrap().extend(data);
    }
}

impl Console for ConsoleLog {
    fn getc(&self) -> u8 {
        self.inner.input.lock().unwrap().pop_front().unwrap_or(0)
    }

    fn putbuf(&self, buf: &[u8]) {
        self.inner.output.lock().unwrap().extend_from_slice(buf);
        self.inner.writes.lock().unwrap().push(buf.len());
    }
}

#[derive(Clone, Default)]
pub struct PowerSwitch {
    off: Arc<AtomicBool>,
}

impl PowerSwitch {
    pub fn is_off(&self) -> bool {
        self.off.load(Ordering::SeqCst)
    }
}

impl Machine for PowerSwitch {
    fn power_off(&self) {
        self.off.store(true, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Scheduler and loader
// ---------------------------------------------------------------------------

/// Blocks host threads on a condition variable.
#[derive(Default)]
pub struct CondvarScheduler {
    lock: Mutex<()>,
    cv: Condvar,
}

impl Scheduler for CondvarScheduler {
    fn block_until(&self, ready: &mut dyn FnMut() -> bool) {
        let mut guard = self.lock.lock().unwrap();
        while !ready() {
            guard = self.cv.wait(guard).unwrap();
        }
    }

    fn wake_all(&self) {
        let _guard = self.lock.lock().unwrap();
        self.cv.notify_all();
    }
}

/// Body of a simulated user program.
pub type Program = Arc<dyn Fn(&Kernel, &UserProc) + Send + Sync>;

#[derive(Default)]
struct LoaderInner {
    kernel: OnceLock<Weak<Kernel>>,
    programs: Mutex<HashMap<String, Program>>,
    spawned: Mutex<Vec<(Pid, String, String)>>,
    released: Mutex<Vec<Pid>>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

/// Runs each spawned process on its own host thread.
#[derive(Clone, Default)]
pub struct Loader {
    inner: Arc<LoaderInner>,
}

impl Loader {
    /// `(pid, executable, cmdline)` of every spawn request.
    pub fn spawned(&self) -> Vec<(Pid, String, String)> {
        self.inner.spawned.lock().unwrap().clone()
    }

    pub fn released(&self) -> Vec<Pid> {
        self.inner.released.lock().unwrap().clone()
    }

    /// Wait for every process thread started so far.
    pub fn join(&self) {
        let threads: Vec<_> = self.inner.threads.lock().unwrap().drain(..).collect();
        for thread in threads {
            thread.join().expect("process thread panicked");
        }
    }
}

impl ProcessManager for Loader {
    fn spawn(&self, pid: Pid, executable: &str, cmdline: &str) -> Result<(), SpawnError> {
        self.inner
            .spawned
            .lock()
            .unwrap()
            .push((pid, executable.to_string(), cmdline.to_string()));

        let kernel = self
            .inner
            .kernel
            .get()
            .and_then(Weak::upgrade)
            .ok_or(SpawnError::OutOfMemory)?;
        let program = self.inner.programs.lock().unwrap().get(executable).cloned();
        let name = executable.to_string();

        let thread = thread::spawn(move || {
            let table = kernel.process_table().clone();
            let Some(program) = program else {
                table.finish_load(pid, false);
                return;
            };
            let user = UserProc::new(pid, &name);
            table.finish_load(pid, true);
            program(kernel.as_ref(), &user);
            if user.process.is_running() {
                user.exit(&kernel, 0);
            }
        });
        self.inner.threads.lock().unwrap().push(thread);
        Ok(())
    }

    fn release(&self, pid: Pid) {
        self.inner.released.lock().unwrap().push(pid);
    }
}

// ---------------------------------------------------------------------------
// Processes and the machine
// ---------------------------------------------------------------------------

/// A process with a mapped stack and data region.
pub struct UserProc {
    pub process: Process,
    pub memory: SimMemory,
}

impl UserProc {
    pub fn new(pid: Pid, name: &str) -> Self {
        let memory = SimMemory::new();
        memory.map(STACK_TOP - PAGE_SIZE, PAGE_SIZE, Access::READ | Access::WRITE);
        memory.map(DATA, DATA_PAGES * PAGE_SIZE, Access::READ | Access::WRITE);
        memory.map(RODATA, PAGE_SIZE, Access::READ);
        let process = Process::new(pid, name, Box::new(memory.clone()));
        Self { process, memory }
    }

    pub fn pid(&self) -> Pid {
        self.process.pid()
    }

    /// Trap with `words` (call number first) on the stack at `sp`.
    pub fn trap_at(&self, kernel: &Kernel, sp: usize, words: &[u32]) -> (TrapOutcome, TrapFrame) {
        for (i, word) in words.iter().enumerate() {
            self.memory.write(sp + 4 * i, &word.to_le_bytes());
        }
        let mut frame = TrapFrame::for_syscall(sp);
        frame.gpr[0] = SENTINEL;
        let outcome = kernel.handle_syscall(&self.process, &mut frame);
        (outcome, frame)
    }

    pub fn trap(&self, kernel: &Kernel, words: &[u32]) -> (TrapOutcome, TrapFrame) {
        self.trap_at(kernel, USER_SP, words)
    }

    /// Issue a call expected to return, and give back its result.
    pub fn call(&self, kernel: &Kernel, sysno: Sysno, args: &[u32]) -> i32 {
        let mut words = vec![sysno.number()];
        words.extend_from_slice(args);
        let (outcome, frame) = self.trap(kernel, &words);
        assert_eq!(outcome, TrapOutcome::Resume, "{:?} did not return", sysno);
        frame.return_value()
    }

    pub fn exit(&self, kernel: &Kernel, status: i32) -> TrapOutcome {
        self.trap(kernel, &[Sysno::Exit.number(), status as u32]).0
    }

    /// Place a NUL-terminated string at `addr`, returning its user pointer.
    pub fn put_str(&self, addr: usize, s: &str) -> u32 {
        self.memory.write(addr, s.as_bytes());
        self.memory.write(addr + s.len(), &[0]);
        addr as u32
    }
}

/// A kernel wired to simulated services.
pub struct Sim {
    pub kernel: Arc<Kernel>,
    pub fs: MemFs,
    pub console: ConsoleLog,
    pub power: PowerSwitch,
    pub loader: Loader,
}

impl Sim {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let fs = MemFs::default();
        let console = ConsoleLog::default();
        let power = PowerSwitch::default();
        let loader = Loader::default();
        let table = Arc::new(ProcessTable::new(Arc::new(CondvarScheduler::default())));
        let services = Services {
            processes: Box::new(loader.clone()),
            fs: Box::new(fs.clone()),
            console: Box::new(console.clone()),
            machine: Box::new(power.clone()),
        };
        let kernel = Arc::new(Kernel::new(config, table, services));
        let _ = loader.inner.kernel.set(Arc::downgrade(&kernel));
        Self {
            kernel,
            fs,
            console,
            power,
            loader,
        }
    }

    /// Start a parentless process.
    pub fn initial(&self, name: &str) -> UserProc {
        let pid = self.kernel.process_table().register_initial();
        UserProc::new(pid, name)
    }

    /// Register a program the loader can exec.
    pub fn program(&self, name: &str, body: impl Fn(&Kernel, &UserProc) + Send + Sync + 'static) {
        self.loader
            .inner
            .programs
            .lock()
            .unwrap()
            .insert(name.to_string(), Arc::new(body));
    }
}
