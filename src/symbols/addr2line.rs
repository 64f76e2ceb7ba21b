//! `addr2line` subprocess resolver.
//!
//! Runs `addr2line -f [-C] [-s] -e <binary>` once for the whole address set
//! and feeds the addresses on stdin, one per line, so the batch size is not
//! bounded by the argument list limit. GNU binutils and llvm-addr2line both
//! print the function name followed by `file:line` for every address.

use crate::Result;
use crate::sample::Address;
use crate::symbols::BatchSymbolResolver;

use anyhow::{Context, anyhow, bail};
use regex::Regex;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone)]
pub struct Addr2Line {
    tool: PathBuf,
    demangle: bool,
    basenames: bool,
    timeout: Option<Duration>,
    // Matches the " (discriminator 3)" suffix GNU addr2line appends.
    discriminator: Regex,
}

impl Addr2Line {
    pub fn new(tool: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            tool: tool.into(),
            demangle: true,
            basenames: false,
            timeout: None,
            discriminator: Regex::new(r"\s+\(discriminator \d+\)\s*$")?,
        })
    }

    pub fn demangle(mut self, on: bool) -> Self {
        self.demangle = on;
        self
    }

    pub fn basenames(mut self, on: bool) -> Self {
        self.basenames = on;
        self
    }

    /// Give up on the tool if it has not finished after `timeout`, counting
    /// both its exit and the close of its output pipes. `None` waits forever.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn command(&self, binary: &Path) -> Command {
        let mut cmd = Command::new(&self.tool);
        cmd.arg("-f");
        if self.demangle {
            cmd.arg("-C");
        }
        if self.basenames {
            cmd.arg("-s");
        }
        cmd.arg("-e").arg(binary);
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }

    fn wait(&self, child: &mut Child, deadline: Option<Instant>) -> Result<ExitStatus> {
        let Some(deadline) = deadline else {
            return Ok(child.wait()?);
        };

        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }
            if Instant::now() >= deadline {
                // The child may have exited between try_wait and kill.
                let _ = child.kill();
                let _ = child.wait();
                bail!(
                    "{} timed out after {:?}",
                    self.tool.display(),
                    self.timeout.unwrap_or_default()
                );
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Wait for a pipe helper, bounded by whatever is left of the deadline.
    ///
    /// A grandchild that inherited a pipe can keep it open after the tool
    /// itself has exited.
    fn collect<T>(&self, rx: &Receiver<io::Result<T>>, deadline: Option<Instant>) -> Result<T> {
        let received = match deadline {
            Some(deadline) => {
                let left = deadline.saturating_duration_since(Instant::now());
                rx.recv_timeout(left).map_err(|e| match e {
                    RecvTimeoutError::Timeout => anyhow!(
                        "{} timed out after {:?} with its output still open",
                        self.tool.display(),
                        self.timeout.unwrap_or_default()
                    ),
                    RecvTimeoutError::Disconnected => anyhow!("resolver pipe helper panicked"),
                })?
            }
            None => rx
                .recv()
                .map_err(|_| anyhow!("resolver pipe helper panicked"))?,
        };
        Ok(received?)
    }

    fn normalize(&self, line: &str) -> String {
        self.discriminator.replace(line.trim(), "").into_owned()
    }
}

impl BatchSymbolResolver for Addr2Line {
    fn resolve(&self, binary: &Path, addresses: &[Address]) -> Result<Vec<String>> {
        debug!(tool = %self.tool.display(), addresses = addresses.len(), "spawning resolver");

        let deadline = self.timeout.map(|t| Instant::now() + t);
        let mut child = self
            .command(binary)
            .spawn()
            .with_context(|| format!("failed to run `{}`", self.tool.display()))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("resolver stdin was not captured"))?;
        let feeder = feed(stdin, addresses.iter().map(|a| a.as_str().to_string()).collect());
        let stdout = drain(child.stdout.take())?;
        let stderr = drain(child.stderr.take())?;

        let status = self.wait(&mut child, deadline)?;
        let stdout = self
            .collect(&stdout, deadline)
            .context("read resolver output")?;
        let stderr = self
            .collect(&stderr, deadline)
            .context("read resolver output")?;
        self.collect(&feeder, deadline)
            .context("write addresses to resolver")?;

        if !status.success() {
            bail!(
                "{} exited with {}: {}",
                self.tool.display(),
                status,
                String::from_utf8_lossy(&stderr).trim()
            );
        }

        let text = String::from_utf8(stdout)
            .with_context(|| format!("non-UTF-8 output from {}", self.tool.display()))?;
        Ok(text.lines().map(|l| self.normalize(l)).collect())
    }
}

// Addresses go in on a helper thread so the child can stream answers while it reads.
fn feed(stdin: ChildStdin, addresses: Vec<String>) -> Receiver<io::Result<()>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut out = BufWriter::new(stdin);
        let written = match addresses
            .iter()
            .try_for_each(|a| writeln!(out, "{}", a))
            .and_then(|()| out.flush())
        {
            // A tool that stops reading early is judged by its exit status and output.
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
            other => other,
        };
        let _ = tx.send(written);
    });
    rx
}

// Pipes are read on helper threads so a chatty child never blocks on a full pipe.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Result<Receiver<io::Result<Vec<u8>>>> {
    let mut pipe = pipe.ok_or_else(|| anyhow!("resolver pipe was not captured"))?;
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        let read = pipe.read_to_end(&mut buf).map(|_| buf);
        // The receiver is gone once the caller has given up on the deadline.
        let _ = tx.send(read);
    });
    Ok(rx)
}
