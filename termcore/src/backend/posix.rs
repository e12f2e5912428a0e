// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! POSIX backend: `/dev/tty`, rustix termios raw mode, and a mio poll over
//! the tty fd and the SIGWINCH self-pipe.
//!
//! ## Event pump
//!
//! Each [`poll_event`](PosixBackend::poll_event) invocation:
//!
//! 1. returns a previously peeked event, if any;
//! 2. drains a pending resize notification and returns `Resize`;
//! 3. feeds already-buffered bytes to the decoder;
//! 4. otherwise waits on the poll with the remaining timeout, feeding the
//!    decoder as bytes arrive;
//! 5. when the decoder is mid-sequence and no bytes arrive within
//!    `escape_timeout_ms`, resets it, which turns a held-back bare ESC into
//!    the Escape key;
//! 6. returns `None` on timeout.
//!
//! Mouse motion floods are delivered in order; applications should drain with
//! timeout 0 before rendering.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd};
use std::time::{Duration, Instant};

use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Token};
use rustix::pipe::{PipeFlags, pipe_with};
use rustix::termios::{
    self, ControlModes, InputModes, LocalModes, OptionalActions, OutputModes,
    SpecialCodeIndex, Termios,
};

use super::sequences::{self, ActiveModes};
use super::sigwinch;
use super::{Backend, Capabilities, InitOptions, detect_capabilities};
use crate::error::{TermCoreError, TermCoreResult};
use crate::input::{Decoder, Event, KeyEvent, MouseEvent, RawEvent};
use crate::units::Size;

const TTY_TOKEN: Token = Token(0);
const RESIZE_TOKEN: Token = Token(1);
const READ_BUF_SIZE: usize = 1024;

/// Where terminal I/O goes: `/dev/tty` when it opens, else stdin/stdout.
#[derive(Debug)]
enum TtyHandles {
    /// One read+write handle on the controlling terminal.
    Dev(File),
    /// stdin (reads) and stdout (writes); used when `/dev/tty` is
    /// unavailable but stdin is a terminal.
    Stdio,
}

impl TtyHandles {
    fn input_fd(&self) -> BorrowedFd<'_> {
        match self {
            TtyHandles::Dev(file) => file.as_fd(),
            // SAFETY: fd 0 is open for the lifetime of the process.
            TtyHandles::Stdio => unsafe { BorrowedFd::borrow_raw(0) },
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            TtyHandles::Dev(file) => file.read(buf),
            TtyHandles::Stdio => io::stdin().lock().read(buf),
        }
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            TtyHandles::Dev(file) => file.write(buf),
            TtyHandles::Stdio => io::stdout().lock().write(buf),
        }
    }
}

/// The self-pipe whose write end lives in the SIGWINCH registry.
#[derive(Debug)]
struct ResizePipe {
    read_fd: OwnedFd,
    // Kept alive so the registered raw fd stays valid; the handler writes to
    // it. Closed (dropped) only after the slot is unregistered.
    _write_fd: OwnedFd,
    slot: usize,
}

/// A peeked event parked until the next `poll_event`.
#[derive(Debug)]
enum Pending {
    Key(KeyEvent),
    Mouse(MouseEvent),
    Resize(Size),
    Focus(bool),
    Paste(Vec<u8>),
}

/// POSIX terminal backend. See the module docs for the pump contract.
#[derive(Debug)]
pub struct PosixBackend {
    tty: TtyHandles,
    saved_termios: Termios,
    raw_mode_installed: bool,
    caps: Capabilities,
    options: InitOptions,
    active: ActiveModes,
    decoder: Decoder,
    read_buf: [u8; READ_BUF_SIZE],
    read_pos: usize,
    read_len: usize,
    out_buf: Vec<u8>,
    poll: Poll,
    events: Events,
    resize: Option<ResizePipe>,
    pending: Option<Pending>,
    paste_stash: Vec<u8>,
    cleaned_up: bool,
}

impl PosixBackend {
    /// Acquire the terminal, install raw mode, set up resize notification,
    /// and emit the enter sequences.
    ///
    /// # Errors
    ///
    /// [`TermCoreError::NotATerminal`] when neither `/dev/tty` nor stdin is a
    /// terminal; [`TermCoreError::SetModeFailed`] when termios installation
    /// is denied; [`TermCoreError::PipeSetupFailed`] /
    /// [`TermCoreError::TooManyBackends`] for resize-pipe problems. On any
    /// failure everything already changed is rolled back.
    pub fn init(options: InitOptions) -> TermCoreResult<Self> {
        let tty = Self::acquire_tty()?;
        let saved_termios = termios::tcgetattr(tty.input_fd())
            .map_err(|e| TermCoreError::SetModeFailed(e.into()))?;
        let poll = Poll::new().map_err(TermCoreError::PipeSetupFailed)?;
        let caps = detect_capabilities();

        let mut backend = PosixBackend {
            tty,
            saved_termios,
            raw_mode_installed: false,
            caps,
            options,
            active: ActiveModes::default(),
            decoder: Decoder::new(),
            read_buf: [0; READ_BUF_SIZE],
            read_pos: 0,
            read_len: 0,
            out_buf: Vec::with_capacity(8 * 1024),
            poll,
            events: Events::with_capacity(16),
            resize: None,
            pending: None,
            paste_stash: Vec::new(),
            cleaned_up: false,
        };

        if let Err(e) = backend.setup() {
            let _ = backend.deinit();
            return Err(e);
        }
        tracing::debug!(caps = ?backend.caps, "POSIX backend initialized");
        Ok(backend)
    }

    fn acquire_tty() -> TermCoreResult<TtyHandles> {
        match OpenOptions::new().read(true).write(true).open("/dev/tty") {
            Ok(file) => Ok(TtyHandles::Dev(file)),
            Err(_) => {
                // SAFETY: fd 0 is open for the lifetime of the process.
                let stdin_fd = unsafe { BorrowedFd::borrow_raw(0) };
                if termios::isatty(stdin_fd) {
                    Ok(TtyHandles::Stdio)
                } else {
                    Err(TermCoreError::NotATerminal)
                }
            }
        }
    }

    fn setup(&mut self) -> TermCoreResult<()> {
        self.install_raw_mode()?;

        let tty_raw = self.tty.input_fd().as_raw_fd();
        self.poll
            .registry()
            .register(&mut SourceFd(&tty_raw), TTY_TOKEN, Interest::READABLE)
            .map_err(TermCoreError::PipeSetupFailed)?;

        if self.options.install_sigwinch {
            let (read_fd, write_fd) =
                pipe_with(PipeFlags::NONBLOCK | PipeFlags::CLOEXEC)
                    .map_err(|e| TermCoreError::PipeSetupFailed(e.into()))?;
            let pipe_raw = read_fd.as_raw_fd();
            self.poll
                .registry()
                .register(&mut SourceFd(&pipe_raw), RESIZE_TOKEN, Interest::READABLE)
                .map_err(TermCoreError::PipeSetupFailed)?;
            let slot = sigwinch::register(write_fd.as_raw_fd())?;
            self.resize = Some(ResizePipe {
                read_fd,
                _write_fd: write_fd,
                slot,
            });
        }

        self.active = ActiveModes::plan(self.caps, self.options);
        let enter = sequences::enter_sequences(self.active);
        self.write_bytes(&enter)?;
        self.flush_output()
    }

    /// Install raw termios: no line discipline, no echo, no signals, no
    /// output post-processing; `VMIN=0 VTIME=0` so reads never block (the
    /// poll gates them).
    fn install_raw_mode(&mut self) -> TermCoreResult<()> {
        let mut raw = self.saved_termios.clone();
        raw.input_modes.remove(
            InputModes::BRKINT
                | InputModes::ICRNL
                | InputModes::INPCK
                | InputModes::ISTRIP
                | InputModes::IXON,
        );
        raw.output_modes.remove(OutputModes::OPOST);
        raw.local_modes.remove(
            LocalModes::ECHO | LocalModes::ICANON | LocalModes::ISIG | LocalModes::IEXTEN,
        );
        raw.control_modes.remove(ControlModes::CSIZE | ControlModes::PARENB);
        raw.control_modes.insert(ControlModes::CS8);
        raw.special_codes[SpecialCodeIndex::VMIN] = 0;
        raw.special_codes[SpecialCodeIndex::VTIME] = 0;

        termios::tcsetattr(self.tty.input_fd(), OptionalActions::Now, &raw)
            .map_err(|e| TermCoreError::SetModeFailed(e.into()))?;
        self.raw_mode_installed = true;
        Ok(())
    }

    /// Drain the self-pipe. True when at least one notification was pending
    /// (however many SIGWINCHes arrived, they coalesce to one).
    fn drain_resize_pipe(&mut self) -> bool {
        let Some(resize) = &self.resize else {
            return false;
        };
        let mut drained = false;
        let mut buf = [0u8; 64];
        loop {
            match rustix::io::read(&resize.read_fd, &mut buf) {
                Ok(0) => break,
                Ok(_) => drained = true,
                Err(e) if e == rustix::io::Errno::INTR => {}
                // AGAIN means empty; anything else we treat the same.
                Err(_) => break,
            }
        }
        drained
    }

    /// Feed buffered bytes to the decoder until it produces an event or the
    /// buffer runs dry. Remaining bytes stay buffered for the next call.
    fn feed_buffered(&mut self) -> TermCoreResult<Option<RawEvent>> {
        while self.read_pos < self.read_len {
            let byte = self.read_buf[self.read_pos];
            self.read_pos += 1;
            if let Some(raw) = self.decoder.feed_raw(byte)? {
                return Ok(Some(raw));
            }
        }
        Ok(None)
    }

    /// One read syscall into the (drained) buffer. `VMIN=0` keeps this
    /// non-blocking; the poll decided readability.
    fn fill_read_buf(&mut self) -> TermCoreResult<usize> {
        if self.read_pos < self.read_len {
            return Ok(0);
        }
        self.read_pos = 0;
        self.read_len = 0;
        match self.tty.read(&mut self.read_buf) {
            Ok(n) => {
                self.read_len = n;
                Ok(n)
            }
            Err(e)
                if e.kind() == io::ErrorKind::Interrupted
                    || e.kind() == io::ErrorKind::WouldBlock =>
            {
                Ok(0)
            }
            Err(e) => Err(TermCoreError::ReadFailed(e)),
        }
    }

    /// The pump core; see the module docs for the step ordering.
    fn poll_raw(&mut self, timeout_ms: u64) -> TermCoreResult<Option<RawEvent>> {
        if self.drain_resize_pipe() {
            return Ok(Some(RawEvent::Resize(self.size()?)));
        }
        if let Some(raw) = self.feed_buffered()? {
            return Ok(Some(raw));
        }

        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        let escape_wait = Duration::from_millis(self.options.escape_timeout_ms);

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let wait = if self.decoder.is_pending() {
                remaining.min(escape_wait)
            } else {
                remaining
            };

            match self.poll.poll(&mut self.events, Some(wait)) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(TermCoreError::ReadFailed(e)),
            }

            let mut tty_ready = false;
            let mut resize_ready = false;
            for event in &self.events {
                match event.token() {
                    TTY_TOKEN => tty_ready = true,
                    RESIZE_TOKEN => resize_ready = true,
                    _ => {}
                }
            }

            if resize_ready && self.drain_resize_pipe() {
                return Ok(Some(RawEvent::Resize(self.size()?)));
            }
            if tty_ready {
                if self.fill_read_buf()? > 0
                    && let Some(raw) = self.feed_buffered()?
                {
                    return Ok(Some(raw));
                }
            } else if !resize_ready {
                // This wait timed out. If the decoder is holding a partial
                // sequence, the escape timeout has expired: flush it.
                if self.decoder.is_pending()
                    && let Some(Event::Key(key)) = self.decoder.reset()
                {
                    return Ok(Some(RawEvent::Key(key)));
                }
                if Instant::now() >= deadline {
                    return Ok(None);
                }
            }

            if Instant::now() >= deadline && !self.decoder.is_pending() {
                return Ok(None);
            }
        }
    }

    /// Resolve a pump-level [`RawEvent`] into the caller-facing event.
    fn materialize(&self, raw: RawEvent) -> Event<'_> {
        match raw {
            RawEvent::Key(k) => Event::Key(k),
            RawEvent::Mouse(m) => Event::Mouse(m),
            RawEvent::Resize(s) => Event::Resize(s),
            RawEvent::Focus(f) => Event::Focus(f),
            RawEvent::Paste => Event::Paste(self.decoder.paste_bytes()),
        }
    }
}

impl Backend for PosixBackend {
    fn capabilities(&self) -> Capabilities { self.caps }

    fn size(&self) -> TermCoreResult<Size> {
        let winsize = termios::tcgetwinsize(self.tty.input_fd())
            .map_err(|e| TermCoreError::ReadFailed(e.into()))?;
        Ok(Size::new(winsize.ws_col, winsize.ws_row))
    }

    fn poll_event(&mut self, timeout_ms: u64) -> TermCoreResult<Option<Event<'_>>> {
        if let Some(pending) = self.pending.take() {
            let event = match pending {
                Pending::Key(k) => Event::Key(k),
                Pending::Mouse(m) => Event::Mouse(m),
                Pending::Resize(s) => Event::Resize(s),
                Pending::Focus(f) => Event::Focus(f),
                Pending::Paste(bytes) => {
                    self.paste_stash = bytes;
                    Event::Paste(&self.paste_stash)
                }
            };
            return Ok(Some(event));
        }
        match self.poll_raw(timeout_ms)? {
            Some(raw) => Ok(Some(self.materialize(raw))),
            None => Ok(None),
        }
    }

    fn peek_event(&mut self) -> TermCoreResult<Option<Event<'_>>> {
        if self.pending.is_none()
            && let Some(raw) = self.poll_raw(0)?
        {
            self.pending = Some(match raw {
                RawEvent::Key(k) => Pending::Key(k),
                RawEvent::Mouse(m) => Pending::Mouse(m),
                RawEvent::Resize(s) => Pending::Resize(s),
                RawEvent::Focus(f) => Pending::Focus(f),
                RawEvent::Paste => Pending::Paste(self.decoder.paste_bytes().to_vec()),
            });
        }
        Ok(self.pending.as_ref().map(|pending| match pending {
            Pending::Key(k) => Event::Key(*k),
            Pending::Mouse(m) => Event::Mouse(*m),
            Pending::Resize(s) => Event::Resize(*s),
            Pending::Focus(f) => Event::Focus(*f),
            Pending::Paste(bytes) => Event::Paste(bytes),
        }))
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> TermCoreResult<()> {
        self.out_buf.extend_from_slice(bytes);
        Ok(())
    }

    fn flush_output(&mut self) -> TermCoreResult<()> {
        if self.out_buf.is_empty() {
            return Ok(());
        }
        let expected = self.out_buf.len();
        let mut written = 0usize;
        while written < expected {
            match self.tty.write(&self.out_buf[written..]) {
                Ok(0) => {
                    self.out_buf.drain(..written);
                    return Err(TermCoreError::PartialWrite { written, expected });
                }
                Ok(n) => written += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    self.out_buf.drain(..written);
                    return Err(TermCoreError::WriteFailed(e));
                }
            }
        }
        self.out_buf.clear();
        Ok(())
    }

    /// Cleanup order: reverse escape sequences, restore termios, unregister
    /// the SIGWINCH slot, close the pipe. Idempotent; continues past
    /// individual failures and reports the first one.
    fn deinit(&mut self) -> TermCoreResult<()> {
        if self.cleaned_up {
            return Ok(());
        }
        self.cleaned_up = true;
        let mut first_error: Option<TermCoreError> = None;

        let exit = sequences::exit_sequences(self.active);
        let _ = self.write_bytes(&exit);
        if let Err(e) = self.flush_output()
            && first_error.is_none()
        {
            first_error = Some(e);
        }

        if self.raw_mode_installed
            && let Err(e) = termios::tcsetattr(
                self.tty.input_fd(),
                OptionalActions::Now,
                &self.saved_termios,
            )
            && first_error.is_none()
        {
            first_error = Some(TermCoreError::SetModeFailed(e.into()));
        }

        if let Some(resize) = self.resize.take() {
            sigwinch::unregister(resize.slot);
            // Pipe fds close on drop, after the slot is already clear.
            drop(resize);
        }

        tracing::debug!("POSIX backend cleaned up");
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for PosixBackend {
    fn drop(&mut self) {
        let _ = self.deinit();
    }
}
