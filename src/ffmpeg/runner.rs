//! FFmpeg process spawning and line streaming.
//!
//! Spawns FFmpeg as a child process with stdout and stderr piped. One reader
//! thread per pipe splits the bytes into lines and feeds a single channel, so
//! the caller sees one combined, ordered line stream and can observe progress
//! live. FFmpeg rewrites its status line with `\r`, so both `\r` and `\n` end a line.

use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

#[cfg(windows)]
use std::os::windows::process::CommandExt;

use super::builder::PlannedCommand;
use crate::error::AppError;

/// Lines of output kept for the failure log entry.
const ERROR_TAIL_LINES: usize = 3;

fn pump_lines<R: Read>(reader: R, tx: Sender<String>) {
    let mut reader = BufReader::new(reader);
    let mut line_buf: Vec<u8> = Vec::with_capacity(256);
    let flush = |buf: &mut Vec<u8>| -> bool {
        if buf.is_empty() {
            return true;
        }
        let line = String::from_utf8_lossy(buf).into_owned();
        buf.clear();
        tx.send(line).is_ok()
    };
    loop {
        let available = match reader.fill_buf() {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(_) => break,
        };
        if available.is_empty() {
            break;
        }
        let len = available.len();
        for &b in available {
            if b == b'\n' || b == b'\r' {
                if !flush(&mut line_buf) {
                    return;
                }
            } else {
                line_buf.push(b);
            }
        }
        reader.consume(len);
    }
    flush(&mut line_buf);
}

/// A running FFmpeg child. `lines()` is lazy, finite and non-restartable: it ends
/// once both pipes close. `wait()` then yields the exit code.
pub struct EngineProcess {
    child: Child,
    lines: Receiver<String>,
    readers: Vec<thread::JoinHandle<()>>,
}

impl EngineProcess {
    pub fn spawn(program: &Path, args: &[String]) -> Result<Self, AppError> {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(windows)]
        cmd.creation_flags(0x08000000); // CREATE_NO_WINDOW
        let mut child = cmd
            .spawn()
            .map_err(|e| AppError::from(format!("Failed to spawn FFmpeg: {}", e)))?;

        let (tx, rx) = mpsc::channel();
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            let tx = tx.clone();
            readers.push(thread::spawn(move || pump_lines(stdout, tx)));
        }
        if let Some(stderr) = child.stderr.take() {
            let tx = tx.clone();
            readers.push(thread::spawn(move || pump_lines(stderr, tx)));
        }
        drop(tx);
        if readers.is_empty() {
            let _ = child.kill();
            let _ = child.wait();
            return Err(AppError::from("Failed to capture FFmpeg output"));
        }

        Ok(Self {
            child,
            lines: rx,
            readers,
        })
    }

    pub fn lines(&mut self) -> impl Iterator<Item = String> + '_ {
        self.lines.iter()
    }

    /// Blocks until the child exits. Signal termination maps to -1.
    pub fn wait(mut self) -> Result<i32, AppError> {
        // Readers stop at their next send once the receiver is gone.
        drop(self.lines);
        for handle in self.readers.drain(..) {
            let _ = handle.join();
        }
        let status = self.child.wait()?;
        Ok(status.code().unwrap_or(-1))
    }
}

/// Oldest first, as FFmpeg printed them.
fn join_tail(tail: &VecDeque<String>) -> String {
    tail.iter().map(String::as_str).collect::<Vec<_>>().join("; ")
}

/// Run a planned command to completion, handing every output line to `on_line`
/// as it arrives. The first line delivered is the shell-quoted command itself.
/// A non-zero exit is returned as-is; only spawn/wait failures are errors.
pub fn run_ffmpeg_blocking(
    program: &Path,
    command: PlannedCommand,
    on_line: &mut dyn FnMut(&str),
) -> Result<i32, AppError> {
    on_line(&format!("$ {}", command.display_with_program(program)));
    log::debug!(
        target: "vidtools::ffmpeg::runner",
        "Spawning FFmpeg: path={}, input={:?}, output={:?}",
        program.display(),
        command.input_arg(),
        command.output_arg()
    );

    let mut process = EngineProcess::spawn(program, command.args())?;
    let mut tail: VecDeque<String> = VecDeque::with_capacity(ERROR_TAIL_LINES);
    for line in process.lines() {
        on_line(&line);
        if tail.len() == ERROR_TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(line);
    }
    let code = process.wait()?;

    if code == 0 {
        log::info!(
            target: "vidtools::ffmpeg::runner",
            "FFmpeg completed successfully"
        );
    } else {
        log::error!(
            target: "vidtools::ffmpeg::runner",
            "{} (code={}): {}",
            super::error::exit_code_summary(code),
            code,
            join_tail(&tail)
        );
    }
    Ok(code)
}
