//! Output transformers for streamed build commands
//!
//! A transformer sees each line a command writes to stdout and decides what,
//! if anything, reaches the terminal.

/// Default terminal width for progress lines
const PROGRESS_WIDTH: usize = 120;

/// Erase from cursor to end of line
const CLEAR_TO_EOL: &str = "\x1b[K";

/// Filters streamed command output line by line
pub trait OutputTransformer {
    /// Text to emit for `line` (which has no trailing newline), or `None` to drop it
    fn process_line(&mut self, line: &str) -> Option<String>;

    /// Text to emit once the stream ends
    fn finish(&mut self) -> Option<String> {
        None
    }
}

/// Built-in transformers a command can request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    Identity,
    Ninja,
}

impl Transform {
    pub fn transformer(&self) -> Box<dyn OutputTransformer> {
        match self {
            Self::Identity => Box::new(Identity),
            Self::Ninja => Box::new(NinjaTransformer::new()),
        }
    }
}

/// Passes every line through unchanged
#[derive(Debug, Default)]
pub struct Identity;

impl OutputTransformer for Identity {
    fn process_line(&mut self, line: &str) -> Option<String> {
        Some(format!("{}\n", line))
    }
}

/// Condenses ninja output.
///
/// Progress lines (`[12/3400] CXX obj/foo.o`) overwrite each other on a single
/// terminal line; ordinary lines are printed in full, except that a line
/// identical to the previous ordinary line is dropped.
#[derive(Debug)]
pub struct NinjaTransformer {
    width: usize,
    in_progress: bool,
    last_line: Option<String>,
}

impl NinjaTransformer {
    pub fn new() -> Self {
        Self::with_width(PROGRESS_WIDTH)
    }

    pub fn with_width(width: usize) -> Self {
        Self {
            width,
            in_progress: false,
            last_line: None,
        }
    }
}

impl Default for NinjaTransformer {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputTransformer for NinjaTransformer {
    fn process_line(&mut self, line: &str) -> Option<String> {
        if is_progress_line(line) {
            self.in_progress = true;
            self.last_line = None;
            let shown: String = line.chars().take(self.width).collect();
            return Some(format!("\r{}{}", shown, CLEAR_TO_EOL));
        }

        if self.last_line.as_deref() == Some(line) {
            return None;
        }

        let prefix = if self.in_progress { "\n" } else { "" };
        self.in_progress = false;
        self.last_line = Some(line.to_string());
        Some(format!("{}{}\n", prefix, line))
    }

    fn finish(&mut self) -> Option<String> {
        if self.in_progress {
            self.in_progress = false;
            Some("\n".to_string())
        } else {
            None
        }
    }
}

/// Whether `line` starts with a ninja `[done/total]` counter
fn is_progress_line(line: &str) -> bool {
    let Some(rest) = line.strip_prefix('[') else {
        return false;
    };
    let Some((counter, _)) = rest.split_once(']') else {
        return false;
    };
    let Some((done, total)) = counter.split_once('/') else {
        return false;
    };
    let is_number = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    is_number(done) && is_number(total)
}
