use log::warn;

use crate::maps::Map;
use crate::tool::{LineStream, ToolLauncher};

/// Streams `(address, text)` instruction lines from `objdump -d` over one
/// address range at a time.
///
/// Exactly one child is live per reader: `reset` drops (kills and reaps)
/// the previous child before spawning the next. Once the stream runs
/// dry, `next` keeps returning the saved stop address with empty text,
/// the sentinel the emission loop terminates on.
pub struct Disassembly<'a> {
    objdump: &'a str,
    binary_cache_root: &'a str,
    launcher: &'a dyn ToolLauncher,
    stream: Option<Box<dyn LineStream>>,
    stop: u64,
    text: String,
}

impl<'a> Disassembly<'a> {
    pub fn new(objdump: &'a str, binary_cache_root: &'a str, launcher: &'a dyn ToolLauncher) -> Self {
        Self {
            objdump,
            binary_cache_root,
            launcher,
            stream: None,
            stop: 0,
            text: String::new(),
        }
    }

    /// Start disassembling `map`'s object over `[start, stop]`. The stop
    /// address handed to `objdump` is `stop + 4`: `stop` is inclusive of
    /// the last instruction, and four bytes covers it on fixed-width ISAs
    /// while the caller's `addr >= stop` check absorbs any overshoot.
    pub fn reset(&mut self, map: &Map, start: u64, stop: u64) {
        self.stream = None;
        self.stop = stop;
        self.text.clear();

        let command = format!(
            "{} -d --no-show-raw-insn --start-address={:#x} --stop-address={:#x} {}{}",
            self.objdump,
            start,
            stop + 4,
            self.binary_cache_root,
            map.filename
        );
        match self.launcher.launch(&command) {
            Ok(stream) => self.stream = Some(stream),
            Err(error) => warn!("failed to launch `{command}`: {error}"),
        }
    }

    /// The next instruction address; its text is available from `text`.
    pub fn next(&mut self) -> u64 {
        let Some(stream) = self.stream.as_mut() else {
            self.text.clear();
            return self.stop;
        };
        loop {
            let line = match stream.next_line() {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(error) => {
                    warn!("failed to read objdump output: {error}");
                    break;
                }
            };
            // Instruction lines look like "  401000:\tmov %eax,%ebx".
            let Some((address_part, text)) = line.split_once(':') else {
                continue;
            };
            let Ok(address) = u64::from_str_radix(address_part.trim(), 16) else {
                continue;
            };
            self.text.clear();
            self.text.push_str(text);
            return address;
        }
        // Stream exhausted.
        self.stream = None;
        self.text.clear();
        self.stop
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}
