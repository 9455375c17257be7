//! The oracle client (§4.13, §5, §6): a blocking `accepts(bytes) -> bool`
//! predicate backed by a sibling worker process that owns the physical SUT
//! connection. The worker itself is an external collaborator; this module
//! only implements the client side of its length-prefixed protocol.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::Duration;

use grammarminer_core::CompatibilityCache;

use crate::error::OracleError;

/// The blocking acceptance predicate every generalization pass queries.
pub trait Oracle {
    fn accepts(&mut self, bytes: &[u8]) -> Result<bool, OracleError>;
}

struct Worker {
    child: Child,
    stdin: ChildStdin,
    responses: Receiver<std::io::Result<u8>>,
}

fn spawn_worker(binary: &Path) -> Result<Worker, OracleError> {
    let mut child = Command::new(binary)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .map_err(|source| OracleError::Spawn { binary: binary.display().to_string(), source })?;
    let stdin = child.stdin.take().expect("stdin was piped");
    let mut stdout = child.stdout.take().expect("stdout was piped");

    let (tx, rx) = mpsc::channel();
    thread::spawn(move || loop {
        let mut byte = [0u8; 1];
        match stdout.read_exact(&mut byte) {
            Ok(()) => {
                if tx.send(Ok(byte[0])).is_err() {
                    break;
                }
            }
            Err(err) => {
                let _ = tx.send(Err(err));
                break;
            }
        }
    });

    Ok(Worker { child, stdin, responses: rx })
}

impl Worker {
    fn kill(mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Spawns the configured worker binary and speaks the length-prefixed
/// request / single-byte response protocol from §6 over its stdin/stdout.
pub struct ProcessOracle {
    binary: PathBuf,
    timeout: Duration,
    max_restarts: u32,
    worker: Option<Worker>,
}

impl ProcessOracle {
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration, max_restarts: u32) -> Self {
        ProcessOracle { binary: binary.into(), timeout, max_restarts, worker: None }
    }

    fn ensure_worker(&mut self) -> Result<(), OracleError> {
        if self.worker.is_none() {
            self.worker = Some(spawn_worker(&self.binary)?);
        }
        Ok(())
    }

    fn restart(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.kill();
        }
    }
}

impl Oracle for ProcessOracle {
    fn accepts(&mut self, bytes: &[u8]) -> Result<bool, OracleError> {
        let mut restarts = 0u32;
        loop {
            self.ensure_worker()?;
            let worker = self.worker.as_mut().expect("just ensured");

            let sent = (|| -> std::io::Result<()> {
                let len = u32::try_from(bytes.len()).unwrap_or(u32::MAX);
                worker.stdin.write_all(&len.to_le_bytes())?;
                worker.stdin.write_all(bytes)?;
                worker.stdin.flush()
            })();

            if sent.is_err() {
                self.restart();
                restarts += 1;
                if restarts > self.max_restarts {
                    return Err(OracleError::WorkerUnavailable(restarts));
                }
                continue;
            }

            match worker.responses.recv_timeout(self.timeout) {
                Ok(Ok(0x00)) => return Ok(true),
                Ok(Ok(0xFF)) => return Ok(false),
                Ok(Ok(other)) => {
                    log::warn!("oracle worker returned unexpected byte 0x{other:02x}; treating as accepted");
                    return Ok(true);
                }
                Ok(Err(_)) | Err(_) => {
                    self.restart();
                    restarts += 1;
                    if restarts > self.max_restarts {
                        return Err(OracleError::WorkerUnavailable(restarts));
                    }
                    continue;
                }
            }
        }
    }
}

impl Drop for ProcessOracle {
    fn drop(&mut self) {
        self.restart();
    }
}

/// Wraps any [`Oracle`] with the process-wide compatibility cache (§3), so
/// every caller automatically gets "first-seen wins" memoization without
/// threading the cache through every call site by hand.
pub struct CachingOracle<O> {
    inner: O,
    cache: CompatibilityCache,
}

impl<O: Oracle> CachingOracle<O> {
    pub fn new(inner: O) -> Self {
        CachingOracle { inner, cache: CompatibilityCache::new() }
    }

    /// `number_of_tested_inputs` for the phase this oracle served (§5, §6).
    pub fn tested(&self) -> u64 {
        self.cache.tested()
    }
}

impl<O: Oracle> Oracle for CachingOracle<O> {
    fn accepts(&mut self, bytes: &[u8]) -> Result<bool, OracleError> {
        let key = cache_key(bytes);
        let inner = &mut self.inner;
        self.cache.get_or_try_insert_with(key, || inner.accepts(bytes))
    }
}

fn cache_key(bytes: &[u8]) -> String {
    format!("{bytes:?}")
}

/// An in-memory oracle over a fixed acceptance predicate, for tests.
#[cfg(test)]
pub struct FakeOracle<F>(pub F);

#[cfg(test)]
impl<F: FnMut(&[u8]) -> bool> Oracle for FakeOracle<F> {
    fn accepts(&mut self, bytes: &[u8]) -> Result<bool, OracleError> {
        Ok((self.0)(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caching_oracle_calls_inner_once_per_distinct_input() {
        let mut calls = 0;
        let fake = FakeOracle(|bytes: &[u8]| {
            calls += 1;
            bytes == b"ok"
        });
        let mut oracle = CachingOracle::new(fake);
        assert!(oracle.accepts(b"ok").unwrap());
        assert!(oracle.accepts(b"ok").unwrap());
        assert!(!oracle.accepts(b"no").unwrap());
        assert_eq!(oracle.tested(), 2);
    }
}
