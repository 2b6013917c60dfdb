//! Stack capture and frame resolution.
//!
//! Capture records raw instruction pointers only. Symbolization happens
//! later, when someone actually asks for the frames.

use std::ffi::c_void;
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use super::{Error, MAX_STACK_DEPTH};

/// Placeholder returned when a frame's source line cannot be located.
pub(crate) const UNKNOWN_SOURCE: &str = "???";

/// Frames belonging to the capture machinery or to the error module's own
/// constructors are dropped from the front of a resolved stack. The module
/// is recognised by source directory: with line tables only, inlined frames
/// resolve to bare function names.
const TRACER_PREFIX: &str = "backtrace::";
const ERRORS_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/src/errors");
const ERRORS_DIR_RELATIVE: &str = concat!(env!("CARGO_PKG_NAME"), "/src/errors");

/// Extra raw frames recorded so the tracer's own frames can be cut off
/// without eating into `MAX_STACK_DEPTH`.
const TRACE_SLACK: usize = 16;

static WORKING_DIR: LazyLock<Option<PathBuf>> = LazyLock::new(|| std::env::current_dir().ok());

/// Process working directory, computed once on first use.
pub fn working_dir() -> Option<&'static Path> {
    WORKING_DIR.as_deref()
}

/// Opaque stack capture token: an instruction pointer.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CaptureToken(usize);

impl CaptureToken {
    /// Wrap a raw address.
    pub const fn from_addr(addr: usize) -> Self {
        Self(addr)
    }

    /// Raw address.
    pub const fn addr(self) -> usize {
        self.0
    }

    fn as_ptr(self) -> *mut c_void {
        self.0 as *mut c_void
    }
}

impl fmt::Debug for CaptureToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Record the current call stack, starting at the caller of this function.
#[inline(never)]
pub(crate) fn capture() -> Vec<CaptureToken> {
    let anchor = capture as usize;
    let mut raw: Vec<(usize, usize)> = Vec::with_capacity(MAX_STACK_DEPTH + TRACE_SLACK);

    backtrace::trace(|frame| {
        raw.push((frame.ip() as usize, frame.symbol_address() as usize));
        raw.len() < MAX_STACK_DEPTH + TRACE_SLACK
    });

    // Symbol addresses are unavailable on some unwinders; keep everything then.
    let start = raw
        .iter()
        .position(|&(_, symbol)| symbol == anchor)
        .map_or(0, |idx| idx + 1);

    raw[start..]
        .iter()
        .take(MAX_STACK_DEPTH)
        .map(|&(ip, _)| CaptureToken(ip))
        .collect()
}

/// Resolve a whole capture, expanding inlined calls and dropping the
/// leading frames that belong to the error machinery itself.
pub(crate) fn resolve_all(tokens: &[CaptureToken]) -> Vec<StackFrame> {
    let frames: Vec<StackFrame> = tokens.iter().copied().flat_map(symbolize).collect();
    let skip = frames.iter().take_while(|frame| frame.is_internal()).count();
    frames.into_iter().skip(skip).collect()
}

fn symbolize(token: CaptureToken) -> Vec<StackFrame> {
    let mut frames = Vec::with_capacity(1);
    backtrace::resolve(token.as_ptr(), |symbol| {
        frames.push(StackFrame::from_symbol(token, symbol));
    });
    if frames.is_empty() {
        frames.push(StackFrame::unresolved(token));
    }
    frames
}

/// Strip the working directory from `path` when it is a prefix of it.
fn relativize(path: &Path) -> String {
    working_dir()
        .and_then(|cwd| path.strip_prefix(cwd).ok())
        .unwrap_or(path)
        .display()
        .to_string()
}

/// Whether `path` is one of this module's own source files.
fn in_errors_module(path: &Path) -> bool {
    path.parent()
        .is_some_and(|dir| dir == Path::new(ERRORS_DIR) || dir.ends_with(ERRORS_DIR_RELATIVE))
}

/// Crate segment of a demangled function path.
fn package_of(function: &str) -> &str {
    let path = function.trim_start_matches('<');
    path.split("::").next().unwrap_or_default()
}

/// One resolved call-stack location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    file: String,
    line: u32,
    function: String,
    package: String,
    token: CaptureToken,
    internal: bool,
}

impl StackFrame {
    /// Resolve a single capture token. Unknown tokens give a frame whose
    /// descriptive fields are empty.
    pub fn resolve(token: CaptureToken) -> Self {
        symbolize(token)
            .into_iter()
            .next()
            .unwrap_or_else(|| Self::unresolved(token))
    }

    fn unresolved(token: CaptureToken) -> Self {
        Self {
            file: String::new(),
            line: 0,
            function: String::new(),
            package: String::new(),
            token,
            internal: false,
        }
    }

    fn from_symbol(token: CaptureToken, symbol: &backtrace::Symbol) -> Self {
        let function = symbol
            .name()
            .map(|name| format!("{name:#}"))
            .unwrap_or_default();
        let package = package_of(&function).to_string();
        let path = symbol.filename();
        let internal = function.starts_with(TRACER_PREFIX) || path.is_some_and(in_errors_module);

        Self {
            file: path.map(relativize).unwrap_or_default(),
            line: symbol.lineno().unwrap_or(0),
            function,
            package,
            token,
            internal,
        }
    }

    fn is_internal(&self) -> bool {
        self.internal
    }

    /// Source file, relative to the working directory when possible.
    pub fn file(&self) -> &str {
        &self.file
    }

    /// 1-based line number, `0` when unknown.
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Demangled function path without the hash suffix.
    pub fn function_name(&self) -> &str {
        &self.function
    }

    /// Crate the function belongs to.
    pub fn package(&self) -> &str {
        &self.package
    }

    /// Token this frame was resolved from.
    pub fn token(&self) -> CaptureToken {
        self.token
    }

    /// `file:line:`
    pub fn summary(&self) -> String {
        format!("{}:{}:", self.file, self.line)
    }

    /// `function\n\tfile`
    pub fn verbose(&self) -> String {
        format!("{}\n\t{}", self.function, self.file)
    }

    /// Literal source text at this frame's line, trimmed.
    ///
    /// Returns `"???"` when the line is unknown or past the end of the file.
    ///
    /// # Errors
    ///
    /// Returns an error wrapping the I/O failure when the file cannot be
    /// opened or read.
    pub fn source_line(&self) -> Result<String, Error> {
        self.read_source_line().map_err(Error::new)
    }

    fn read_source_line(&self) -> io::Result<String> {
        if self.line == 0 {
            return Ok(UNKNOWN_SOURCE.to_string());
        }

        let reader = BufReader::new(File::open(&self.file)?);
        let wanted = self.line as usize;
        for (idx, line) in reader.split(b'\n').enumerate() {
            let line = line?;
            if idx + 1 == wanted {
                return Ok(String::from_utf8_lossy(&line).trim().to_string());
            }
        }

        Ok(UNKNOWN_SOURCE.to_string())
    }
}

impl fmt::Display for StackFrame {
    /// `file:line` followed by `\tfunction: source` when the source is readable.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}:{}", self.file, self.line)?;
        match self.read_source_line() {
            Ok(source) => writeln!(f, "\t{}: {}", self.function, source),
            Err(_) => Ok(()),
        }
    }
}
