//! External C preprocessor
//!
//! Macro expansion is delegated to a system compiler (`gcc -E`). A session
//! owns everything one build needs for that:
//! - a private staging directory, removed when the session is dropped
//! - the include directories passed as `-I`
//! - a cache of preprocessed outputs keyed by source hash
//! - a wall-clock timeout; a compiler that hangs is killed
//!
//! The compiler runs with `-nostdinc`, so `#include <...>` lines are held
//! back from it and put in front of the expanded output.

use ahash::{AHashMap, RandomState};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tracing::debug;

use crate::config::PreprocessorConfig;
use crate::shared::models::{CodegraphError, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(5);

pub struct PreprocessorSession {
    dir: TempDir,
    include_dirs: Vec<PathBuf>,
    candidates: Vec<String>,
    timeout: Duration,
    cache: AHashMap<u64, String>,
    hasher: RandomState,
    counter: usize,
}

impl PreprocessorSession {
    pub fn new(config: &PreprocessorConfig) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("codegraph-cpp-")
            .tempdir()
            .map_err(|e| {
                CodegraphError::preprocess(format!("cannot create staging directory: {}", e))
                    .with_source(e)
            })?;
        Ok(Self {
            dir,
            include_dirs: config.include_dirs.clone(),
            candidates: config.candidates.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
            cache: AHashMap::new(),
            hasher: RandomState::new(),
            counter: 0,
        })
    }

    /// Staging directory (exists as long as the session does)
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn add_include_dir(&mut self, dir: impl Into<PathBuf>) {
        let dir = dir.into();
        if !self.include_dirs.contains(&dir) {
            self.include_dirs.push(dir);
        }
    }

    pub fn cached_outputs(&self) -> usize {
        self.cache.len()
    }

    /// First candidate that resolves to an executable file
    pub fn find_compiler(&self) -> Result<PathBuf> {
        self.candidates
            .iter()
            .find_map(|c| resolve_executable(c))
            .ok_or_else(|| {
                CodegraphError::preprocess(format!(
                    "no C compiler found (tried {})",
                    self.candidates.join(", ")
                ))
            })
    }

    /// Expand macros in `source`. The output is filtered with
    /// [`filter_preprocessed`].
    pub fn preprocess(&mut self, source: &str) -> Result<String> {
        let key = self.cache_key(source);
        if let Some(hit) = self.cache.get(&key) {
            debug!(key, "preprocessor cache hit");
            return Ok(hit.clone());
        }

        let compiler = self.find_compiler()?;
        let (system_includes, body) = split_system_includes(source);
        self.counter += 1;
        let input = self.dir.path().join(format!("unit{}.c", self.counter));
        std::fs::write(&input, body)?;

        let mut command = Command::new(&compiler);
        command.args(["-E", "-P", "-nostdinc", "-undef", "-Wno-everything"]);
        for dir in &self.include_dirs {
            command.arg(format!("-I{}", dir.display()));
        }
        command
            .arg(&input)
            .current_dir(self.dir.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!(compiler = %compiler.display(), input = %input.display(), "running preprocessor");
        let child = command.spawn().map_err(|e| {
            CodegraphError::preprocess(format!("cannot run {}: {}", compiler.display(), e))
                .with_source(e)
        })?;
        let (success, stdout, stderr) = wait_with_timeout(child, self.timeout)?;
        let _ = std::fs::remove_file(&input);

        if !success {
            let first_line = stderr.lines().next().unwrap_or("no diagnostics");
            return Err(CodegraphError::preprocess(format!(
                "{} exited with an error: {}",
                compiler.display(),
                first_line
            )));
        }

        let filtered = system_includes + &filter_preprocessed(&stdout);
        self.cache.insert(key, filtered.clone());
        Ok(filtered)
    }

    fn cache_key(&self, source: &str) -> u64 {
        self.hasher.hash_one((source, &self.include_dirs))
    }
}

/// Drop blank lines and leftover directives; `#include` lines are kept so
/// the front-end can still see which headers a unit used
pub fn filter_preprocessed(output: &str) -> String {
    let mut result = String::with_capacity(output.len());
    for line in output.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.starts_with('#') && !trimmed.starts_with("#include") {
            continue;
        }
        result.push_str(line);
        result.push('\n');
    }
    result
}

fn split_system_includes(source: &str) -> (String, String) {
    let mut includes = String::new();
    let mut body = String::with_capacity(source.len());
    for line in source.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("#include") && trimmed.contains('<') {
            includes.push_str(trimmed);
            includes.push('\n');
            body.push('\n');
        } else {
            body.push_str(line);
            body.push('\n');
        }
    }
    (includes, body)
}

fn resolve_executable(name: &str) -> Option<PathBuf> {
    let candidate = Path::new(name);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(name))
        .find(|path| path.is_file())
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = String::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_string(&mut buf);
        }
        buf
    })
}

fn wait_with_timeout(mut child: Child, timeout: Duration) -> Result<(bool, String, String)> {
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());
    let started = Instant::now();

    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if started.elapsed() >= timeout {
            let _ = child.kill();
            let _ = child.wait();
            return Err(CodegraphError::preprocess(format!(
                "preprocessor timed out after {}ms",
                timeout.as_millis()
            )));
        }
        thread::sleep(POLL_INTERVAL);
    };

    let join = |handle: thread::JoinHandle<String>| {
        handle
            .join()
            .map_err(|_| CodegraphError::internal("preprocessor output reader panicked"))
    };
    Ok((status.success(), join(stdout)?, join(stderr)?))
}
