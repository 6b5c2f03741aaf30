use std::process::Stdio;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command};

use super::{AudioCapture, Microphone};

/// 4096 samples of 16-bit audio.
const CHUNK_BYTES: usize = 4096 * 2;

/// Microphone backed by an external recorder writing raw PCM to stdout.
#[derive(Debug, Clone)]
pub struct Recorder {
    program: String,
    args: Vec<String>,
}

impl Recorder {
    /// sox `rec` capturing 16 kHz mono signed 16-bit little-endian PCM.
    pub fn sox(program: &str) -> Self {
        Self::new(
            program,
            "-q -t raw -r 16000 -e signed-integer -b 16 -c 1 -L -",
        )
    }

    pub fn new(program: &str, args: &str) -> Self {
        Self {
            program: program.to_string(),
            args: args.split_whitespace().map(String::from).collect(),
        }
    }
}

#[async_trait]
impl Microphone for Recorder {
    async fn open(&self) -> Result<Box<dyn AudioCapture>> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Starting recorder {}", self.program))?;
        let stdout = child.stdout.take().context("Recorder has no stdout")?;
        tracing::debug!("Recorder {} started", self.program);
        Ok(Box::new(RecorderCapture {
            child,
            stdout,
            buffer: vec![0; CHUNK_BYTES],
            carry: 0,
        }))
    }
}

struct RecorderCapture {
    child: Child,
    stdout: ChildStdout,
    buffer: Vec<u8>,
    /// Bytes of an unfinished sample kept at the start of `buffer`.
    carry: usize,
}

#[async_trait]
impl AudioCapture for RecorderCapture {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        loop {
            let n = self.stdout.read(&mut self.buffer[self.carry..]).await?;
            if n == 0 {
                return Ok(None);
            }
            let total = self.carry + n;
            let whole = total - total % 2;
            let chunk = self.buffer[..whole].to_vec();
            self.carry = total % 2;
            if self.carry == 1 {
                self.buffer[0] = self.buffer[whole];
            }
            if !chunk.is_empty() {
                return Ok(Some(chunk));
            }
        }
    }

    async fn stop(&mut self) -> Result<()> {
        if self.child.try_wait()?.is_none() {
            self.child.kill().await?;
        }
        tracing::debug!("Recorder stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn chunks_hold_whole_samples() {
        let recorder = Recorder {
            program: "sh".into(),
            args: vec!["-c".into(), "printf abcde".into()],
        };
        let mut capture = recorder.open().await.unwrap();
        let mut audio = vec![];
        while let Some(chunk) = capture.next_chunk().await.unwrap() {
            assert_eq!(chunk.len() % 2, 0);
            audio.extend(chunk);
        }
        assert_eq!(audio, b"abcd");
        capture.stop().await.unwrap();
    }
}
