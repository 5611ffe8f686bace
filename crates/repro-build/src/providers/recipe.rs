//! Per-job build recipes
//!
//! A [`Recipe`] is the set of project and variant specific steps a
//! [`SourceBuilder`](super::SourceBuilder) runs. Variants wrap the project's
//! base steps instead of replacing them, so a 32-bit CFI job still performs
//! every step a plain build of its project does.

use crate::command::{CommandRunner, CommandSpec};
use crate::error::BuildResult;
use crate::gn_args::GnArgs;
use crate::revision::RevisionStrategy;
use crate::transform::Transform;
use repro_config::{Arch, Definition, Project, Sanitizer};
use std::fmt;
use std::path::Path;

/// Origin-tracking level used when the args do not set one
pub const DEFAULT_MSAN_TRACK_ORIGINS: &str = "2";

/// What a step needs to run inside a checkout
pub struct StepContext<'a> {
    pub runner: &'a dyn CommandRunner,
    pub source_dir: &'a Path,
    pub gn_args: &'a GnArgs,
}

impl StepContext<'_> {
    fn command(&self, program: &str) -> CommandSpec {
        CommandSpec::new(program, self.source_dir)
    }
}

/// One-off toolchain installation
pub trait DepsInstaller: fmt::Debug {
    fn install(&self, ctx: &StepContext<'_>) -> BuildResult<()>;
}

/// `gclient runhooks` flavour
pub trait HooksRunner: fmt::Debug {
    fn run_hooks(&self, ctx: &StepContext<'_>) -> BuildResult<()>;
}

#[derive(Debug)]
pub struct NoDeps;

impl DepsInstaller for NoDeps {
    fn install(&self, _ctx: &StepContext<'_>) -> BuildResult<()> {
        Ok(())
    }
}

/// Updates the bundled clang
#[derive(Debug)]
pub struct ClangToolchain;

impl DepsInstaller for ClangToolchain {
    fn install(&self, ctx: &StepContext<'_>) -> BuildResult<()> {
        ctx.runner
            .run(&ctx.command("python").arg("tools/clang/scripts/update.py"))?;
        Ok(())
    }
}

/// Installs 32-bit system libraries, then the base toolchain
#[derive(Debug)]
pub struct Lib32Toolchain {
    pub base: Box<dyn DepsInstaller>,
}

impl DepsInstaller for Lib32Toolchain {
    fn install(&self, ctx: &StepContext<'_>) -> BuildResult<()> {
        let spec = ctx
            .command("build/install-build-deps.sh")
            .args(["--lib32", "--syms", "--no-prompt"])
            .streamed(Transform::Identity);
        ctx.runner.run(&spec)?;
        self.base.install(ctx)
    }
}

/// Fetches the gold linker plugin CFI links with, then the base toolchain
#[derive(Debug)]
pub struct GoldPlugin {
    pub base: Box<dyn DepsInstaller>,
}

impl DepsInstaller for GoldPlugin {
    fn install(&self, ctx: &StepContext<'_>) -> BuildResult<()> {
        ctx.runner
            .run(&ctx.command("build/download_gold_plugin.py"))?;
        self.base.install(ctx)
    }
}

#[derive(Debug)]
pub struct NoHooks;

impl HooksRunner for NoHooks {
    fn run_hooks(&self, _ctx: &StepContext<'_>) -> BuildResult<()> {
        Ok(())
    }
}

#[derive(Debug)]
pub struct PlainHooks;

impl HooksRunner for PlainHooks {
    fn run_hooks(&self, ctx: &StepContext<'_>) -> BuildResult<()> {
        ctx.runner.run(&ctx.command("gclient").arg("runhooks"))?;
        Ok(())
    }
}

/// Runs hooks with the prebuilt instrumented libraries MSan links against
#[derive(Debug)]
pub struct MsanHooks;

impl MsanHooks {
    pub fn gyp_defines(gn_args: &GnArgs) -> String {
        let origins = gn_args
            .get("msan_track_origins")
            .unwrap_or(DEFAULT_MSAN_TRACK_ORIGINS);
        format!(
            "msan=1 msan_track_origins={} use_prebuilt_instrumented_libraries=1",
            origins
        )
    }
}

impl HooksRunner for MsanHooks {
    fn run_hooks(&self, ctx: &StepContext<'_>) -> BuildResult<()> {
        let spec = ctx
            .command("gclient")
            .arg("runhooks")
            .env("GYP_DEFINES", Self::gyp_defines(ctx.gn_args));
        ctx.runner.run(&spec)?;
        Ok(())
    }
}

/// How `gn gen` is invoked for a project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GnProfile {
    /// Args layered over the base set
    pub extra_args: GnArgs,
    /// Pass `--check`
    pub check: bool,
}

/// Everything project and variant specific about a source build
#[derive(Debug)]
pub struct Recipe {
    pub project: Project,
    pub revision: RevisionStrategy,
    pub installer: Box<dyn DepsInstaller>,
    pub hooks: Box<dyn HooksRunner>,
    pub gn: GnProfile,
}

impl Recipe {
    /// Plain build of `project`
    pub fn base(project: Project) -> Self {
        match project {
            Project::V8 => Self {
                project,
                revision: RevisionStrategy::direct("v8/v8"),
                installer: Box::new(ClangToolchain),
                hooks: Box::new(PlainHooks),
                gn: GnProfile {
                    extra_args: GnArgs::new(),
                    check: true,
                },
            },
            Project::Chromium => Self {
                project,
                revision: RevisionStrategy::direct("chromium/src"),
                installer: Box::new(ClangToolchain),
                hooks: Box::new(PlainHooks),
                gn: GnProfile {
                    extra_args: GnArgs::new(),
                    check: true,
                },
            },
            Project::Pdfium => Self {
                project,
                revision: RevisionStrategy::pinned("chromium/src", "pdfium"),
                installer: Box::new(NoDeps),
                hooks: Box::new(NoHooks),
                gn: GnProfile {
                    extra_args: [("pdf_is_standalone", "true")].into_iter().collect(),
                    check: false,
                },
            },
        }
    }

    /// Recipe for a job definition: the project's base steps with the
    /// sanitizer and architecture variants layered on top
    pub fn for_definition(definition: &Definition) -> Self {
        let mut recipe = Self::base(definition.project);
        // PDFium has no hooks or toolchain step to refine.
        if recipe.project == Project::Pdfium {
            return recipe;
        }

        match definition.sanitizer {
            Some(Sanitizer::Msan) => recipe.hooks = Box::new(MsanHooks),
            Some(Sanitizer::Cfi) => {
                let base = std::mem::replace(&mut recipe.installer, Box::new(NoDeps));
                recipe.installer = Box::new(GoldPlugin { base });
            }
            _ => {}
        }
        if definition.arch == Arch::X86 {
            let base = std::mem::replace(&mut recipe.installer, Box::new(NoDeps));
            recipe.installer = Box::new(Lib32Toolchain { base });
        }
        recipe
    }

    /// `gn gen [--check] <build_dir>` run in `source_dir`
    pub fn gn_gen(&self, source_dir: &Path, build_dir: &Path) -> CommandSpec {
        let spec = CommandSpec::new("gn", source_dir).arg("gen");
        let spec = if self.gn.check { spec.arg("--check") } else { spec };
        spec.arg(build_dir.display().to_string())
    }
}
