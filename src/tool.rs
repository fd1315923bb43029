use std::io::{self, BufRead, BufReader};
use std::process::{Child, ChildStdout, Command, Stdio};

/// The stdout of one tool invocation, one line at a time (no trailing
/// newline). `Ok(None)` means the stream is exhausted.
pub trait LineStream {
    fn next_line(&mut self) -> io::Result<Option<String>>;
}

/// The "command -> line stream" contract `nm` and `objdump` are consumed
/// through. Production code uses [`ShellLauncher`]; tests supply canned
/// output, and an in-process ELF reader could be slotted in later.
pub trait ToolLauncher {
    fn launch(&self, command: &str) -> io::Result<Box<dyn LineStream>>;
}

/// Runs commands under `/bin/sh -c` with stderr suppressed, as the perf
/// wrapper tooling historically has. Dropping the returned stream kills
/// and reaps the child, so at most one child per reader is ever live.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellLauncher;

impl ToolLauncher for ShellLauncher {
    fn launch(&self, command: &str) -> io::Result<Box<dyn LineStream>> {
        let mut child = Command::new("/bin/sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("child has no stdout pipe"))?;
        Ok(Box::new(ChildLines {
            child,
            reader: BufReader::new(stdout),
        }))
    }
}

struct ChildLines {
    child: Child,
    reader: BufReader<ChildStdout>,
}

impl LineStream for ChildLines {
    fn next_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(Some(line))
    }
}

impl Drop for ChildLines {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
