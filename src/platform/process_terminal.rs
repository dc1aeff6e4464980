//! Process-backed terminal on `/dev/tty` file descriptors.
//!
//! Raw mode via termios, a reader thread feeding the input handler through
//! [`StdinBuffer`], SIGWINCH delivery via `signal-hook`, and non-blocking
//! writes that park on `poll(POLLOUT)` instead of spinning.

#![cfg(unix)]

use std::env;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use libc::c_int;
use signal_hook::iterator::Signals;

use crate::core::terminal::Terminal;
use crate::platform::stdin_buffer::{StdinBuffer, StdinEvent};

#[derive(Default)]
struct InputState {
    handler: Option<Box<dyn FnMut(String) + Send>>,
}

type ResizeHandlerFn = dyn FnMut() + Send;
type ResizeHandler = Arc<Mutex<Option<Box<ResizeHandlerFn>>>>;

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0))
        .as_millis() as u64
}

fn wait_writable(fd: c_int) -> std::io::Result<()> {
    let mut fds = libc::pollfd {
        fd,
        events: libc::POLLOUT,
        revents: 0,
    };
    loop {
        let result = unsafe { libc::poll(&mut fds, 1, -1) };
        if result < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err);
        }
        if result == 0 {
            continue;
        }
        if (fds.revents & libc::POLLOUT) != 0 {
            return Ok(());
        }

        return Err(std::io::Error::other(format!(
            "poll(POLLOUT) returned revents=0x{:x}",
            fds.revents
        )));
    }
}

fn write_all_fd(fd: c_int, bytes: &[u8]) -> std::io::Result<()> {
    let mut written = 0;
    while written < bytes.len() {
        let result = unsafe {
            libc::write(
                fd,
                bytes[written..].as_ptr() as *const libc::c_void,
                bytes.len() - written,
            )
        };
        if result < 0 {
            let err = std::io::Error::last_os_error();
            match err.kind() {
                std::io::ErrorKind::Interrupted => continue,
                std::io::ErrorKind::WouldBlock => {
                    wait_writable(fd)?;
                    continue;
                }
                _ => return Err(err),
            }
        }
        if result == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "write returned 0",
            ));
        }
        written += result as usize;
    }
    Ok(())
}

fn write_fd(fd: c_int, data: &str) {
    if data.is_empty() {
        return;
    }
    // Output is fire-and-forget; a dead fd at teardown must not take the
    // process down with it.
    let _ = write_all_fd(fd, data.as_bytes());
}

fn read_winsize(fd: c_int) -> Option<(u16, u16)> {
    let mut size = libc::winsize {
        ws_row: 0,
        ws_col: 0,
        ws_xpixel: 0,
        ws_ypixel: 0,
    };
    let result = unsafe { libc::ioctl(fd, libc::TIOCGWINSZ, &mut size) };
    if result == 0 && size.ws_col > 0 && size.ws_row > 0 {
        Some((size.ws_col, size.ws_row))
    } else {
        None
    }
}

fn poll_readable(fd: c_int, timeout_ms: i32) -> bool {
    let mut fds = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };
    let result = unsafe { libc::poll(&mut fds, 1, timeout_ms) };
    result > 0 && (fds.revents & libc::POLLIN) != 0
}

fn get_termios(fd: c_int) -> std::io::Result<libc::termios> {
    let mut termios = unsafe { std::mem::zeroed::<libc::termios>() };
    let result = unsafe { libc::tcgetattr(fd, &mut termios) };
    if result != 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(termios)
}

fn set_termios(fd: c_int, termios: &libc::termios) -> std::io::Result<()> {
    let result = unsafe { libc::tcsetattr(fd, libc::TCSANOW, termios) };
    if result != 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

pub struct ProcessTerminal {
    stdin_fd: c_int,
    stdout_fd: c_int,
    original_termios: Option<libc::termios>,
    input_state: Arc<Mutex<InputState>>,
    resize_handler: ResizeHandler,
    input_thread: Option<JoinHandle<()>>,
    stop_flag: Arc<AtomicBool>,
    drain_mode: Arc<AtomicBool>,
    last_input_time: Arc<AtomicU64>,
    write_log_path: Option<PathBuf>,
    write_log_failed: bool,
    resize_signal_handle: Option<signal_hook::iterator::Handle>,
    resize_thread: Option<JoinHandle<()>>,
}

impl ProcessTerminal {
    pub fn new() -> Self {
        let write_log_path = match env::var_os("LOOM_WRITE_LOG") {
            Some(value) if !value.is_empty() => Some(PathBuf::from(value)),
            _ => None,
        };

        Self {
            stdin_fd: libc::STDIN_FILENO,
            stdout_fd: libc::STDOUT_FILENO,
            original_termios: None,
            input_state: Arc::new(Mutex::new(InputState::default())),
            resize_handler: Arc::new(Mutex::new(None)),
            input_thread: None,
            stop_flag: Arc::new(AtomicBool::new(false)),
            drain_mode: Arc::new(AtomicBool::new(false)),
            last_input_time: Arc::new(AtomicU64::new(now_ms())),
            write_log_path,
            write_log_failed: false,
            resize_signal_handle: None,
            resize_thread: None,
        }
    }

    fn enable_raw_mode(&mut self) -> std::io::Result<()> {
        if self.original_termios.is_none() {
            self.original_termios = Some(get_termios(self.stdin_fd)?);
        }
        let Some(original) = self.original_termios.as_ref() else {
            return Ok(());
        };
        let mut raw = *original;
        unsafe {
            libc::cfmakeraw(&mut raw);
        }
        set_termios(self.stdin_fd, &raw)
    }

    fn restore_raw_mode(&mut self) -> std::io::Result<()> {
        if let Some(original) = self.original_termios.as_ref() {
            set_termios(self.stdin_fd, original)?;
        }
        Ok(())
    }

    fn start_input_thread(&mut self) {
        let stdin_fd = self.stdin_fd;
        let input_state = Arc::clone(&self.input_state);
        let stop_flag = Arc::clone(&self.stop_flag);
        let drain_mode = Arc::clone(&self.drain_mode);
        let last_input_time = Arc::clone(&self.last_input_time);

        self.input_thread = Some(thread::spawn(move || {
            let mut buffer = [0u8; 4096];
            let mut stdin_buffer = StdinBuffer::new(10);

            while !stop_flag.load(Ordering::SeqCst) {
                let now = Instant::now();
                let timeout_ms = stdin_buffer.next_timeout_ms(now, 50);
                let readable = poll_readable(stdin_fd, timeout_ms);
                let events = if readable {
                    let read_len = unsafe {
                        libc::read(stdin_fd, buffer.as_mut_ptr() as *mut _, buffer.len())
                    };
                    if read_len <= 0 {
                        Vec::new()
                    } else {
                        last_input_time.store(now_ms(), Ordering::SeqCst);
                        stdin_buffer.process(&buffer[..read_len as usize])
                    }
                } else {
                    stdin_buffer.flush_due(now)
                };

                if events.is_empty() {
                    continue;
                }

                for event in events {
                    if drain_mode.load(Ordering::SeqCst) {
                        continue;
                    }
                    let data = match event {
                        StdinEvent::Data(sequence) => sequence,
                        StdinEvent::Paste(content) => {
                            format!("\x1b[200~{}\x1b[201~", content)
                        }
                    };
                    let mut state = input_state
                        .lock()
                        .unwrap_or_else(|poisoned| poisoned.into_inner());
                    if let Some(handler) = state.handler.as_mut() {
                        handler(data);
                    }
                }
            }
        }));
    }

    fn stop_input_thread(&mut self) {
        self.stop_flag.store(true, Ordering::SeqCst);
        if let Some(handle) = self.input_thread.take() {
            let _ = handle.join();
        }
    }

    fn start_resize_thread(&mut self) -> std::io::Result<()> {
        let mut signals = Signals::new([libc::SIGWINCH])?;
        let handle = signals.handle();
        let resize_handler = Arc::clone(&self.resize_handler);

        let thread = thread::spawn(move || {
            for _ in signals.forever() {
                let mut handler = resize_handler
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                if let Some(handler) = handler.as_mut() {
                    handler();
                }
            }
        });

        self.resize_signal_handle = Some(handle);
        self.resize_thread = Some(thread);
        Ok(())
    }

    fn stop_resize_thread(&mut self) {
        if let Some(handle) = self.resize_signal_handle.take() {
            handle.close();
        }
        if let Some(thread) = self.resize_thread.take() {
            let _ = thread.join();
        }
    }

    fn clear_handlers(&mut self) {
        let mut state = self
            .input_state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        state.handler = None;
        drop(state);
        let mut handler = self
            .resize_handler
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *handler = None;
    }
}

impl Default for ProcessTerminal {
    fn default() -> Self {
        Self::new()
    }
}

impl Terminal for ProcessTerminal {
    fn start(
        &mut self,
        on_input: Box<dyn FnMut(String) + Send>,
        on_resize: Box<dyn FnMut() + Send>,
    ) -> std::io::Result<()> {
        {
            let mut state = self
                .input_state
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            state.handler = Some(on_input);
        }
        {
            let mut handler = self
                .resize_handler
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            *handler = Some(on_resize);
        }

        self.stop_flag.store(false, Ordering::SeqCst);
        self.drain_mode.store(false, Ordering::SeqCst);
        self.last_input_time.store(now_ms(), Ordering::SeqCst);

        if let Err(err) = self.enable_raw_mode() {
            self.clear_handlers();
            return Err(err);
        }

        if let Err(err) = self.start_resize_thread() {
            let _ = self.restore_raw_mode();
            self.clear_handlers();
            return Err(err);
        }
        // Deliver the initial size through the same path as real resizes.
        unsafe {
            libc::raise(libc::SIGWINCH);
        }

        self.start_input_thread();

        Ok(())
    }

    fn stop(&mut self) -> std::io::Result<()> {
        self.stop_input_thread();
        self.stop_resize_thread();
        self.clear_handlers();

        // Flush input before leaving raw mode so buffered bytes don't leak to
        // the shell.
        let _ = unsafe { libc::tcflush(self.stdin_fd, libc::TCIFLUSH) };

        self.restore_raw_mode()
    }

    fn drain_input(&mut self, max_ms: u64, idle_ms: u64) {
        self.drain_mode.store(true, Ordering::SeqCst);
        self.last_input_time.store(now_ms(), Ordering::SeqCst);

        let end_time = now_ms().saturating_add(max_ms);
        loop {
            let now = now_ms();
            if now >= end_time {
                break;
            }
            let last_input = self.last_input_time.load(Ordering::SeqCst);
            if now.saturating_sub(last_input) >= idle_ms {
                break;
            }

            let remaining = end_time.saturating_sub(now);
            let sleep_for = idle_ms.min(remaining).max(1);
            thread::sleep(Duration::from_millis(sleep_for));
        }

        self.drain_mode.store(false, Ordering::SeqCst);
    }

    fn write(&mut self, data: &str) {
        write_fd(self.stdout_fd, data);
        if self.write_log_failed {
            return;
        }
        if let Some(path) = self.write_log_path.as_ref() {
            let result = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .and_then(|mut file| file.write_all(data.as_bytes()));
            if result.is_err() {
                self.write_log_failed = true;
            }
        }
    }

    fn columns(&self) -> u16 {
        read_winsize(self.stdout_fd)
            .map(|(cols, _)| cols)
            .unwrap_or(80)
    }

    fn rows(&self) -> u16 {
        read_winsize(self.stdout_fd)
            .map(|(_, rows)| rows)
            .unwrap_or(24)
    }
}

/// Bare-bones terminal used from crash/panic hooks: writes straight to the
/// stdout fd, no raw-mode management, no threads.
pub struct HookTerminal {
    stdout_fd: c_int,
}

impl HookTerminal {
    pub fn new() -> Self {
        Self {
            stdout_fd: libc::STDOUT_FILENO,
        }
    }
}

impl Default for HookTerminal {
    fn default() -> Self {
        Self::new()
    }
}

impl Terminal for HookTerminal {
    fn start(
        &mut self,
        _on_input: Box<dyn FnMut(String) + Send>,
        _on_resize: Box<dyn FnMut() + Send>,
    ) -> std::io::Result<()> {
        Ok(())
    }

    fn stop(&mut self) -> std::io::Result<()> {
        Ok(())
    }

    fn drain_input(&mut self, _max_ms: u64, _idle_ms: u64) {}

    fn write(&mut self, data: &str) {
        write_fd(self.stdout_fd, data);
    }

    fn columns(&self) -> u16 {
        read_winsize(self.stdout_fd)
            .map(|(cols, _)| cols)
            .unwrap_or(80)
    }

    fn rows(&self) -> u16 {
        read_winsize(self.stdout_fd)
            .map(|(_, rows)| rows)
            .unwrap_or(24)
    }
}

type CleanupFn = Arc<dyn Fn() + Send + Sync + 'static>;

struct CleanupEntry {
    id: u64,
    cleanup: CleanupFn,
}

/// Registered cleanup callbacks, shared by the panic hook wrapper and the
/// fatal-signal thread. Guards remove their entry on drop.
static CLEANUPS: Mutex<Vec<CleanupEntry>> = Mutex::new(Vec::new());
static NEXT_CLEANUP_ID: AtomicU64 = AtomicU64::new(1);
static PANIC_WRAPPER_INSTALLED: AtomicBool = AtomicBool::new(false);

fn cleanup_registry() -> std::sync::MutexGuard<'static, Vec<CleanupEntry>> {
    CLEANUPS
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn run_registered_cleanups() {
    let cleanups: Vec<CleanupFn> = cleanup_registry()
        .iter()
        .map(|entry| Arc::clone(&entry.cleanup))
        .collect();
    for cleanup in cleanups {
        cleanup();
    }
}

fn register_cleanup(cleanup: CleanupFn) -> u64 {
    let id = NEXT_CLEANUP_ID.fetch_add(1, Ordering::SeqCst);
    cleanup_registry().push(CleanupEntry { id, cleanup });
    id
}

fn unregister_cleanup(id: u64) {
    cleanup_registry().retain(|entry| entry.id != id);
}

/// Guard for a terminal-restore callback run on fatal signals
/// (INT/TERM/HUP/QUIT). Dropping the guard deactivates the callback.
pub struct SignalHookGuard {
    id: u64,
    handle: signal_hook::iterator::Handle,
    thread: Option<JoinHandle<()>>,
}

impl Drop for SignalHookGuard {
    fn drop(&mut self) {
        unregister_cleanup(self.id);
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Run `cleanup` when a fatal signal arrives, then re-raise the signal with
/// its default disposition so the process still dies with the right status.
pub fn install_signal_handlers<F>(cleanup: F) -> SignalHookGuard
where
    F: Fn() + Send + Sync + 'static,
{
    let cleanup: CleanupFn = Arc::new(cleanup);
    let id = register_cleanup(Arc::clone(&cleanup));

    const FATAL_SIGNALS: [c_int; 4] = [libc::SIGINT, libc::SIGTERM, libc::SIGHUP, libc::SIGQUIT];
    let mut signals = Signals::new(FATAL_SIGNALS).expect("failed to register fatal signal set");
    let handle = signals.handle();

    let thread = thread::spawn(move || {
        if let Some(signal) = signals.forever().next() {
            cleanup();
            unsafe {
                libc::signal(signal, libc::SIG_DFL);
                libc::raise(signal);
            }
        }
    });

    SignalHookGuard {
        id,
        handle,
        thread: Some(thread),
    }
}

/// Guard for a terminal-restore callback run from the process panic hook.
pub struct PanicHookGuard {
    id: u64,
}

impl Drop for PanicHookGuard {
    fn drop(&mut self) {
        unregister_cleanup(self.id);
    }
}

/// Run `cleanup` before the default panic output so the terminal is sane when
/// the backtrace prints. The wrapper hook is installed once per process and
/// dispatches to whatever guards are currently registered.
pub fn install_panic_hook<F>(cleanup: F) -> PanicHookGuard
where
    F: Fn() + Send + Sync + 'static,
{
    let id = register_cleanup(Arc::new(cleanup));

    if !PANIC_WRAPPER_INSTALLED.swap(true, Ordering::SeqCst) {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            run_registered_cleanups();
            previous(info);
        }));
    }

    PanicHookGuard { id }
}

#[cfg(test)]
mod tests {
    use super::{install_panic_hook, register_cleanup, unregister_cleanup};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn cleanup_registry_add_remove() {
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_hook = Arc::clone(&counter);
        let id = register_cleanup(Arc::new(move || {
            counter_hook.fetch_add(1, Ordering::SeqCst);
        }));
        super::run_registered_cleanups();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        unregister_cleanup(id);
        super::run_registered_cleanups();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panic_hook_guard_unregisters_on_drop() {
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_hook = Arc::clone(&counter);
        let guard = install_panic_hook(move || {
            counter_hook.fetch_add(1, Ordering::SeqCst);
        });
        super::run_registered_cleanups();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        drop(guard);
        super::run_registered_cleanups();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
