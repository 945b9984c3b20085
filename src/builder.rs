use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use walkdir::WalkDir;

use crate::binary_store::{BinaryKey, BinaryObject, BinaryStore};
use crate::source::{GeneratedFile, GeneratedSource};

/// Directory below a build's work dir that receives every binary of the build.
pub const BIN_DIR: &str = "bin";

/// Outcome of compiling one generated program.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildResult {
    pub success: bool,

    /// Top-level type names declared by each source file. Empty on failure.
    pub fqns: BTreeMap<PathBuf, BTreeSet<String>>,

    pub diagnostics: String,
}

impl BuildResult {
    pub fn success(fqns: BTreeMap<PathBuf, BTreeSet<String>>) -> Self {
        Self {
            success: true,
            fqns,
            diagnostics: String::new(),
        }
    }

    pub fn failure(diagnostics: impl Into<String>) -> Self {
        Self {
            success: false,
            fqns: BTreeMap::new(),
            diagnostics: diagnostics.into(),
        }
    }

    pub fn fqns_of(&self, path: &Path) -> impl Iterator<Item = &str> {
        self.fqns.get(path).into_iter().flatten().map(String::as_str)
    }

    /// Source file declaring `fqn`. Nested names (`a.B$1`) map to their
    /// enclosing top-level type.
    pub fn path_of_fqn(&self, fqn: &str) -> Option<&Path> {
        let top = fqn.split('$').next().unwrap_or(fqn);
        self.fqns
            .iter()
            .find(|(_, names)| names.contains(top))
            .map(|(path, _)| path.as_path())
    }
}

/// What to compile and where the output goes.
#[derive(Debug)]
pub struct CompileRequest<'a> {
    /// Source files on disk.
    pub sources: &'a [PathBuf],
    pub out_dir: &'a Path,
    pub classpath: &'a [PathBuf],
    pub workdir: &'a Path,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOutcome {
    pub success: bool,
    pub diagnostics: String,
}

/// A source-to-binary compiler.
pub trait Compiler: Send + Sync {
    /// `Err` only when the compiler could not be run at all.
    fn compile(&self, request: &CompileRequest<'_>) -> Result<CompileOutcome>;
}

/// A javac-compatible compiler invoked as a child process.
#[derive(Debug, Clone)]
pub struct CommandCompiler {
    program: String,
}

impl CommandCompiler {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Compiler for CommandCompiler {
    fn compile(&self, request: &CompileRequest<'_>) -> Result<CompileOutcome> {
        let classpath = std::env::join_paths(request.classpath)
            .context("classpath entry contains a path separator")?;

        let output = Command::new(&self.program)
            .arg("-d")
            .arg(request.out_dir)
            .arg("-cp")
            .arg(classpath)
            .args(request.sources)
            .current_dir(request.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .with_context(|| format!("failed to run `{}`", self.program))?;

        let mut diagnostics = String::from_utf8_lossy(&output.stderr).to_string();
        diagnostics.push_str(&String::from_utf8_lossy(&output.stdout));

        Ok(CompileOutcome {
            success: output.status.success(),
            diagnostics,
        })
    }
}

/// Builds generated programs, recompiling only files whose content has not
/// been compiled successfully before.
pub struct ProjectBuilder {
    compiler: Box<dyn Compiler>,
    classpath: Vec<PathBuf>,
    store: BinaryStore,
}

impl ProjectBuilder {
    pub fn new(compiler: Box<dyn Compiler>, classpath: Vec<PathBuf>) -> Self {
        Self {
            compiler,
            classpath,
            store: BinaryStore::new(),
        }
    }

    pub fn store(&self) -> &BinaryStore {
        &self.store
    }

    /// Compile `source` into `<workdir>/bin`. Never fails: any problem is
    /// reported as a failed build.
    pub fn build(&self, source: &GeneratedSource, workdir: &Path) -> BuildResult {
        match self.try_build(source, workdir) {
            Ok(result) => result,
            Err(e) => BuildResult::failure(format!("{e:#}")),
        }
    }

    fn try_build(&self, source: &GeneratedSource, workdir: &Path) -> Result<BuildResult> {
        let bin = workdir.join(BIN_DIR);
        fs::create_dir_all(&bin).with_context(|| format!("failed to create dir {:?}", bin))?;

        let mut objects: Vec<Arc<BinaryObject>> = Vec::new();
        let mut stale: Vec<&GeneratedFile> = Vec::new();
        for file in source.files() {
            match self.store.get(&BinaryKey::of(file)) {
                Some(cached) => objects.extend(cached),
                None => stale.push(file),
            }
        }
        for obj in &objects {
            obj.write_to(&bin)?;
        }

        if !stale.is_empty() {
            tracing::debug!(stage = "build", files = stale.len(), "compiling changed files");

            let src_dir = workdir.join("src");
            let mut paths = Vec::with_capacity(stale.len());
            for file in &stale {
                let target = src_dir.join(&file.path);
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)
                        .with_context(|| format!("failed to create dir {:?}", parent))?;
                }
                fs::write(&target, file.text())
                    .with_context(|| format!("failed to write source {:?}", target))?;
                paths.push(target);
            }

            let fresh = workdir.join("fresh");
            fs::create_dir_all(&fresh)
                .with_context(|| format!("failed to create dir {:?}", fresh))?;

            let classpath: Vec<PathBuf> = std::iter::once(bin.clone())
                .chain(self.classpath.iter().cloned())
                .collect();

            let outcome = self.compiler.compile(&CompileRequest {
                sources: &paths,
                out_dir: &fresh,
                classpath: &classpath,
                workdir,
            })?;
            if !outcome.success {
                return Ok(BuildResult::failure(outcome.diagnostics));
            }

            for (key, compiled) in attribute_outputs(&fresh, &stale)? {
                for obj in self.store.add(key, compiled) {
                    obj.write_to(&bin)?;
                    objects.push(obj);
                }
            }
        }

        let mut fqns: BTreeMap<PathBuf, BTreeSet<String>> = BTreeMap::new();
        for obj in objects.iter().filter(|o| !o.fqn.contains('$')) {
            fqns.entry(obj.source.clone())
                .or_default()
                .insert(obj.fqn.clone());
        }
        Ok(BuildResult::success(fqns))
    }
}

/// Assign every file below `out_dir` to the source it was compiled from.
///
/// An output belongs to the source in the same package whose file stem equals
/// the output's top-level type name, or else to the first source of that
/// package.
fn attribute_outputs(
    out_dir: &Path,
    sources: &[&GeneratedFile],
) -> Result<Vec<(BinaryKey, Vec<BinaryObject>)>> {
    let packages: Vec<PathBuf> = sources.iter().map(|f| package_dir(f.text())).collect();
    let mut compiled: Vec<(BinaryKey, Vec<BinaryObject>)> = sources
        .iter()
        .map(|f| (BinaryKey::of(f), Vec::new()))
        .collect();

    for entry in WalkDir::new(out_dir).sort_by_file_name() {
        let entry = entry.with_context(|| format!("failed to read dir {:?}", out_dir))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(out_dir)
            .with_context(|| format!("{:?} is outside {:?}", entry.path(), out_dir))?
            .to_path_buf();
        let Some(stem) = rel.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let top = stem.split('$').next().unwrap_or(stem);
        let package = rel.parent().map(Path::to_path_buf).unwrap_or_default();

        let owner = (0..sources.len())
            .find(|&i| {
                packages[i] == package
                    && sources[i].path.file_stem().and_then(|s| s.to_str()) == Some(top)
            })
            .or_else(|| (0..sources.len()).find(|&i| packages[i] == package));
        let Some(owner) = owner else {
            tracing::warn!(stage = "build", output = ?rel, "compiled output matches no source");
            continue;
        };

        let bytes = fs::read(entry.path())
            .with_context(|| format!("failed to read binary {:?}", entry.path()))?;
        let fqn = fqn_of(&rel);
        let (key, objects) = &mut compiled[owner];
        objects.push(BinaryObject {
            fqn,
            source: key.path.clone(),
            digest: key.digest.clone(),
            relative_path: rel,
            bytes: Arc::from(bytes),
        });
    }
    Ok(compiled)
}

/// `a/b/C$1.class` -> `a.b.C$1`
fn fqn_of(rel: &Path) -> String {
    let mut parts: Vec<String> = rel
        .parent()
        .into_iter()
        .flat_map(|p| p.components())
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    if let Some(stem) = rel.file_stem() {
        parts.push(stem.to_string_lossy().to_string());
    }
    parts.join(".")
}

/// Package directory declared by a source (`package a.b;` -> `a/b`).
fn package_dir(text: &str) -> PathBuf {
    text.lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix("package "))
        .and_then(|rest| rest.split(';').next())
        .map(|name| name.trim().split('.').collect())
        .unwrap_or_default()
}
