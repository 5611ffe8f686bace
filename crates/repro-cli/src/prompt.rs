//! Interactive collaborators: the checkout prompt and the args.gn editor

use colored::Colorize;
use repro_build::{ArgsEditor, BuildError, BuildResult, Confirmer};
use std::env;
use std::fs;
use std::io::{self, BufRead, Write};
use std::process::Command;
use tracing::info;

const DEFAULT_EDITOR: &str = "vi";

const EDIT_COMMENT: &str = "# Edit args.gn before building. Lines starting with # are ignored.";

/// Asks on the terminal, or assumes yes
pub struct TerminalConfirmer {
    assume_yes: bool,
}

impl TerminalConfirmer {
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }
}

impl Confirmer for TerminalConfirmer {
    fn confirm(&self, message: &str) -> BuildResult<bool> {
        if self.assume_yes {
            info!("{}", message);
            info!("proceeding (--yes)");
            return Ok(true);
        }

        let mut stderr = io::stderr().lock();
        write!(stderr, "{} [Y/n]: ", message.yellow())
            .and_then(|_| stderr.flush())
            .map_err(|e| BuildError::io("<stderr>", e))?;

        let mut answer = String::new();
        io::stdin()
            .lock()
            .read_line(&mut answer)
            .map_err(|e| BuildError::io("<stdin>", e))?;
        Ok(is_yes(&answer))
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "" | "y" | "yes")
}

/// Opens args.gn text in `$EDITOR`
pub struct EditorArgsEditor {
    editor: String,
}

impl EditorArgsEditor {
    pub fn from_env() -> Self {
        let editor = env::var("EDITOR")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_EDITOR.to_string());
        Self { editor }
    }
}

impl ArgsEditor for EditorArgsEditor {
    fn edit(&self, text: &str, should_edit: bool) -> BuildResult<String> {
        if !should_edit {
            return Ok(text.to_string());
        }

        let file = tempfile::Builder::new()
            .prefix("edit-args-gn-")
            .tempfile()
            .map_err(|e| BuildError::io(env::temp_dir(), e))?;
        let path = file.path().to_path_buf();
        fs::write(&path, format!("{}\n{}\n", EDIT_COMMENT, text))
            .map_err(|e| BuildError::io(&path, e))?;

        let mut words = self.editor.split_whitespace();
        let program = words.next().unwrap_or(DEFAULT_EDITOR);
        let status = Command::new(program)
            .args(words)
            .arg(&path)
            .status()
            .map_err(|e| {
                if e.kind() == io::ErrorKind::NotFound {
                    BuildError::ToolNotInstalled {
                        binary: program.to_string(),
                    }
                } else {
                    BuildError::io(&path, e)
                }
            })?;
        if !status.success() {
            return Err(BuildError::ToolInvocation {
                command: format!("{} {}", self.editor, path.display()),
                cwd: env::current_dir().unwrap_or_default(),
                exit_code: status.code().unwrap_or(1),
                stderr: String::new(),
            });
        }

        let edited = fs::read_to_string(&path).map_err(|e| BuildError::io(&path, e))?;
        Ok(strip_comments(&edited))
    }
}

fn strip_comments(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
