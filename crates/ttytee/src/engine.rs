//! The tee loop
//!
//! One thread polls the TTY and every PTY master, gathers what each side
//! produced into the buffer for its direction, then fans each buffer out
//! to the other side. A PTY whose consumer hung up is recreated in its
//! slot without touching the others.

use std::io;
use std::os::unix::io::AsFd;
use std::sync::atomic::{AtomicBool, Ordering};

use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use tracing::{debug, error, info, warn};
use ttytee_pty::{Endpoint, EndpointSet};
use ttytee_time::Interval;

use crate::{DirectionBuffer, TeeConfig, TeeError};

/// Engine lifecycle. There is no way back from `Terminating`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Running,
    Terminating,
}

/// What one loop iteration did
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StepReport {
    /// The wait ended without any readiness
    pub timed_out: bool,
    /// The pacing floor made this iteration sleep
    pub paced: bool,
    /// Bytes read from the TTY
    pub tty_read: usize,
    /// Bytes gathered from all PTYs together
    pub ptys_read: usize,
    /// Write calls issued to the TTY (0 or 1)
    pub tty_writes: usize,
    pub tty_written: usize,
    /// Write calls issued to PTYs
    pub pty_writes: usize,
    /// Slots whose PTY was recreated
    pub recreated: Vec<usize>,
    /// Failed syscalls and short writes
    pub io_errors: usize,
}

/// The running tee: endpoints, direction buffers and pacing clock
pub struct Tee {
    endpoints: EndpointSet,
    to_ptys: DirectionBuffer,
    to_tty: DirectionBuffer,
    pacing_floor: Interval,
    poll_timeout_ms: u16,
    last_iteration: Interval,
    state: State,
    iterations: u64,
}

impl Tee {
    /// Open the TTY and publish every PTY.
    ///
    /// Any failure here is fatal; PTY paths published before the failure
    /// are removed again.
    pub fn new(config: &TeeConfig) -> Result<Self, TeeError> {
        config.validate()?;
        let poll_timeout_ms = config.poll_timeout_ms()?;

        let endpoints = EndpointSet::open(&config.tty_path, &config.pty_paths, config.overwrite)?;
        for (slot, mirror) in endpoints.mirrors().iter().enumerate() {
            info!("pty {}: {}", slot, mirror.path().display());
        }

        let mut tee = Self {
            endpoints,
            to_ptys: DirectionBuffer::new(config.buffer_size),
            to_tty: DirectionBuffer::new(config.buffer_size),
            pacing_floor: Interval::from(config.pacing_floor),
            poll_timeout_ms,
            last_iteration: Interval::ZERO,
            state: State::Running,
            iterations: 0,
        };
        tee.last_iteration = tee.clock();
        Ok(tee)
    }

    pub fn endpoints(&self) -> &EndpointSet {
        &self.endpoints
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// Step until `stop` is raised, then enter `Terminating`.
    ///
    /// Only a PTY that cannot be recreated ends the loop early.
    pub fn run_until(&mut self, stop: &AtomicBool) -> Result<(), TeeError> {
        while self.state == State::Running {
            if stop.load(Ordering::SeqCst) {
                info!("Termination requested");
                self.state = State::Terminating;
                break;
            }
            if let Err(e) = self.step() {
                error!("{}", e);
                self.state = State::Terminating;
                return Err(e);
            }
        }
        Ok(())
    }

    /// Remove every published PTY path, leaving the loop in `Terminating`.
    ///
    /// Buffered bytes are not flushed. Returns how many removals failed.
    pub fn cleanup(&mut self) -> usize {
        self.state = State::Terminating;
        self.endpoints.cleanup()
    }

    /// Run one iteration: wait, pace, read, recreate, fan out, reset.
    pub fn step(&mut self) -> Result<StepReport, TeeError> {
        let mut report = StepReport::default();

        let (polled, revents) = self.wait();
        report.paced = self.pace();

        match polled {
            Ok(0) => {
                debug!("poll timed out");
                report.timed_out = true;
            }
            Ok(_) => {
                self.read_tty(revents[0], &mut report);
                self.service_ptys(&revents[1..], &mut report)?;
                self.flush(&mut report);
            }
            Err(Errno::EINTR) => {
                debug!("poll interrupted");
                report.timed_out = true;
            }
            Err(e) => {
                error!("poll failed: {}", e);
                report.io_errors += 1;
            }
        }

        self.to_ptys.clear();
        self.to_tty.clear();
        self.iterations += 1;
        Ok(report)
    }

    /// Block until the TTY or any PTY is ready, or the timeout passes.
    ///
    /// Index 0 of the returned events is the TTY, index `i + 1` is PTY
    /// slot `i`.
    fn wait(&self) -> (nix::Result<i32>, Vec<PollFlags>) {
        let mut fds: Vec<PollFd> = std::iter::once(self.endpoints.source())
            .chain(self.endpoints.mirrors())
            .map(|endpoint| PollFd::new(endpoint.as_fd(), PollFlags::POLLIN))
            .collect();

        let polled = poll(&mut fds, PollTimeout::from(self.poll_timeout_ms));
        let revents = fds
            .iter()
            .map(|fd| fd.revents().unwrap_or(PollFlags::empty()))
            .collect();
        (polled, revents)
    }

    /// Sleep out whatever is left of the pacing floor since the previous
    /// iteration. Returns whether it slept.
    fn pace(&mut self) -> bool {
        let now = self.clock();
        let next = self.last_iteration + self.pacing_floor;

        if !next.is_after(&now) {
            self.last_iteration = now;
            return false;
        }

        if let Some(remaining) = (next - now).to_duration() {
            std::thread::sleep(remaining);
        }
        self.last_iteration = self.clock();
        true
    }

    fn clock(&self) -> Interval {
        Interval::now().unwrap_or_else(|e| {
            warn!("Could not read the monotonic clock: {}", e);
            self.last_iteration + self.pacing_floor
        })
    }

    /// Replace the outbound buffer with whatever the TTY has
    fn read_tty(&mut self, revents: PollFlags, report: &mut StepReport) {
        if !revents.contains(PollFlags::POLLIN) {
            if revents.intersects(PollFlags::POLLHUP | PollFlags::POLLERR) {
                debug!("tty reports {:?}", revents);
            }
            return;
        }

        let source = self.endpoints.source();
        match self.to_ptys.replace_with(|buf| source.read(buf)) {
            Ok(n) => report.tty_read = n,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
            Err(e) => {
                error!("Could not read tty: {}", e);
                report.io_errors += 1;
            }
        }
        debug!("tty_readout_count = {}", report.tty_read);
    }

    /// Recreate hung-up PTYs and gather what the others wrote
    fn service_ptys(&mut self, revents: &[PollFlags], report: &mut StepReport) -> Result<(), TeeError> {
        let (_, mirrors) = self.endpoints.split_mut();

        for (slot, (mirror, &events)) in mirrors.iter_mut().zip(revents).enumerate() {
            if events.intersects(PollFlags::POLLHUP | PollFlags::POLLERR | PollFlags::POLLNVAL) {
                info!("pty {} was closed, reopening...", mirror.path().display());
                mirror.recreate().map_err(|source| TeeError::Recreate {
                    slot,
                    path: mirror.path().to_path_buf(),
                    source,
                })?;
                report.recreated.push(slot);
                continue;
            }

            if !events.contains(PollFlags::POLLIN) {
                continue;
            }
            if self.to_tty.is_full() {
                debug!("tty buffer full, skipping pty {} this cycle", mirror.path().display());
                continue;
            }

            match self.to_tty.append_with(|buf| mirror.read(buf)) {
                Ok(n) => report.ptys_read += n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) => {
                    error!("Could not read PTY {}: {}", mirror.path().display(), e);
                    report.io_errors += 1;
                }
            }
        }
        Ok(())
    }

    /// One write of each buffer to each destination; short writes are
    /// reported and the rest dropped
    fn flush(&mut self, report: &mut StepReport) {
        if !self.to_tty.is_empty() {
            let source = self.endpoints.source();
            report.tty_writes += 1;
            match write_once(source, self.to_tty.as_slice(), "TTY") {
                Some(n) => {
                    report.tty_written = n;
                    if n != self.to_tty.len() {
                        report.io_errors += 1;
                    }
                }
                None => report.io_errors += 1,
            }
        }

        if self.to_ptys.is_empty() {
            return;
        }
        for mirror in self.endpoints.mirrors() {
            report.pty_writes += 1;
            let written = write_once(mirror, self.to_ptys.as_slice(), "PTY");
            debug!("written {:?} into {}", written, mirror.path().display());
            if written != Some(self.to_ptys.len()) {
                report.io_errors += 1;
            }
        }
    }
}

/// Write `data` once. Returns the bytes accepted, or `None` on error.
fn write_once(endpoint: &Endpoint, data: &[u8], kind: &str) -> Option<usize> {
    match endpoint.write(data) {
        Ok(n) if n == data.len() => Some(n),
        Ok(n) => {
            warn!(
                "Could not write everything to {} {}: {} of {} bytes",
                kind,
                endpoint.path().display(),
                n,
                data.len()
            );
            Some(n)
        }
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
            warn!(
                "{} {} is not accepting data, dropped {} bytes",
                kind,
                endpoint.path().display(),
                data.len()
            );
            Some(0)
        }
        Err(e) => {
            error!("Could not write in {} {}: {}", kind, endpoint.path().display(), e);
            None
        }
    }
}
