//! Recording fakes for the build layer's external collaborators
#![allow(dead_code)]

use repro_build::{
    ArgsEditor, BuildError, BuildResult, CommandOutput, CommandRunner, CommandSpec, Confirmer,
    Fetcher, Services,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

type Hook = Box<dyn Fn(&CommandSpec)>;

/// Records every command and answers from a script keyed by command-line prefix.
/// Unscripted commands succeed with empty output.
#[derive(Default)]
pub struct FakeRunner {
    responses: Mutex<Vec<(String, CommandOutput)>>,
    hooks: Mutex<Vec<(String, Hook)>>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl FakeRunner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Answer commands starting with `prefix` with `output`
    pub fn respond(&self, prefix: &str, output: CommandOutput) {
        self.responses
            .lock()
            .unwrap()
            .push((prefix.to_string(), output));
    }

    /// Answer commands starting with `prefix` with `stdout`
    pub fn respond_stdout(&self, prefix: &str, stdout: &str) {
        self.respond(prefix, CommandOutput::with_stdout(stdout));
    }

    /// Run `hook` whenever a command starting with `prefix` executes
    pub fn on(&self, prefix: &str, hook: impl Fn(&CommandSpec) + 'static) {
        self.hooks
            .lock()
            .unwrap()
            .push((prefix.to_string(), Box::new(hook)));
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    pub fn command_lines(&self) -> Vec<String> {
        self.calls().iter().map(CommandSpec::command_line).collect()
    }

    /// Commands whose line starts with `prefix`
    pub fn count(&self, prefix: &str) -> usize {
        self.command_lines()
            .iter()
            .filter(|line| line.starts_with(prefix))
            .count()
    }
}

impl CommandRunner for FakeRunner {
    fn execute(&self, spec: &CommandSpec) -> BuildResult<CommandOutput> {
        let line = spec.command_line();
        self.calls.lock().unwrap().push(spec.clone());
        for (prefix, hook) in self.hooks.lock().unwrap().iter() {
            if line.starts_with(prefix.as_str()) {
                hook(spec);
            }
        }
        let responses = self.responses.lock().unwrap();
        Ok(responses
            .iter()
            .rev()
            .find(|(prefix, _)| line.starts_with(prefix.as_str()))
            .map(|(_, output)| output.clone())
            .unwrap_or_default())
    }
}

/// Serves canned bodies and counts requests
#[derive(Default)]
pub struct FakeFetcher {
    bodies: Mutex<HashMap<String, String>>,
    calls: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn serve(&self, url: impl Into<String>, body: &str) {
        self.bodies
            .lock()
            .unwrap()
            .insert(url.into(), body.to_string());
    }

    /// Replace the body served for `url`
    pub fn change(&self, url: impl Into<String>, body: &str) {
        self.serve(url, body);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Fetcher for FakeFetcher {
    fn fetch(&self, url: &str) -> BuildResult<String> {
        self.calls.lock().unwrap().push(url.to_string());
        self.bodies
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| BuildError::resolution(url, "HTTP 404 Not Found"))
    }
}

/// Answers every prompt the same way and keeps the messages
pub struct FakeConfirmer {
    answer: bool,
    messages: Mutex<Vec<String>>,
}

impl FakeConfirmer {
    pub fn answering(answer: bool) -> Arc<Self> {
        Arc::new(Self {
            answer,
            messages: Mutex::new(Vec::new()),
        })
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

impl Confirmer for FakeConfirmer {
    fn confirm(&self, message: &str) -> BuildResult<bool> {
        self.messages.lock().unwrap().push(message.to_string());
        Ok(self.answer)
    }
}

/// Records edit requests; optionally replaces the text when editing
#[derive(Default)]
pub struct RecordingEditor {
    replacement: Option<String>,
    calls: Mutex<Vec<(String, bool)>>,
}

impl RecordingEditor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn replacing_with(text: &str) -> Arc<Self> {
        Arc::new(Self {
            replacement: Some(text.to_string()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<(String, bool)> {
        self.calls.lock().unwrap().clone()
    }
}

impl ArgsEditor for RecordingEditor {
    fn edit(&self, text: &str, should_edit: bool) -> BuildResult<String> {
        self.calls
            .lock()
            .unwrap()
            .push((text.to_string(), should_edit));
        match (&self.replacement, should_edit) {
            (Some(replacement), true) => Ok(replacement.clone()),
            _ => Ok(text.to_string()),
        }
    }
}

/// All four fakes wired into [`Services`]
pub struct Fakes {
    pub runner: Arc<FakeRunner>,
    pub fetcher: Arc<FakeFetcher>,
    pub confirmer: Arc<FakeConfirmer>,
    pub editor: Arc<RecordingEditor>,
}

impl Fakes {
    pub fn new() -> Self {
        Self::with_confirmer(FakeConfirmer::answering(true))
    }

    pub fn with_confirmer(confirmer: Arc<FakeConfirmer>) -> Self {
        Self {
            runner: FakeRunner::new(),
            fetcher: FakeFetcher::new(),
            confirmer,
            editor: RecordingEditor::new(),
        }
    }

    pub fn with_editor(mut self, editor: Arc<RecordingEditor>) -> Self {
        self.editor = editor;
        self
    }

    pub fn services(&self) -> Services {
        Services::new(
            self.runner.clone(),
            self.fetcher.clone(),
            self.confirmer.clone(),
            self.editor.clone(),
        )
    }
}
