//! The stack-carrying [`Error`] type and chain utilities.

use std::error::Error as StdError;
use std::fmt;
use std::ptr;
use std::sync::OnceLock;

use super::frame::{self, CaptureToken, StackFrame};
use super::metadata::Metadata;
use super::sentinel::Sentinel;
use super::CHAIN_SEPARATOR;

type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Wrap input, classified once at the call boundary.
pub enum WrapInput {
    /// Already an [`Error`]; wrapping annotates it in place.
    Structured(Error),
    /// Any other error value.
    Plain(BoxError),
    /// A non-error value, carried as its rendered text.
    Opaque(String),
}

impl WrapInput {
    /// Classify a non-error value by rendering it.
    pub fn opaque(value: impl fmt::Display) -> Self {
        Self::Opaque(value.to_string())
    }

    /// Classify a boxed error, recovering an [`Error`] hidden behind the box.
    pub fn boxed(err: BoxError) -> Self {
        match err.downcast::<Error>() {
            Ok(structured) => Self::Structured(*structured),
            Err(plain) => Self::Plain(plain),
        }
    }
}

impl<E: StdError + Send + Sync + 'static> From<E> for WrapInput {
    fn from(err: E) -> Self {
        Self::boxed(Box::new(err))
    }
}

/// Cause created from an opaque value.
#[derive(Debug)]
struct MessageError(String);

impl fmt::Display for MessageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl StdError for MessageError {}

struct ErrorImpl {
    cause: BoxError,
    message: String,
    chain_message: String,
    stack: Vec<CaptureToken>,
    frames: OnceLock<Vec<StackFrame>>,
    metadata: Option<Metadata>,
}

/// A wrapped failure with a one-time stack capture and an annotation chain.
///
/// `Display` shows only the latest annotation; [`Error::chain_message`] has
/// the whole trail, root cause first.
pub struct Error {
    inner: Box<ErrorImpl>,
}

impl Error {
    /// Wrap a cause, capturing the stack. An [`Error`] is returned unchanged.
    pub fn new(cause: impl Into<WrapInput>) -> Self {
        match cause.into() {
            WrapInput::Structured(err) => err,
            WrapInput::Plain(cause) => Self::capture(cause, None),
            WrapInput::Opaque(text) => Self::capture(Box::new(MessageError(text)), None),
        }
    }

    /// Create an error from any displayable value.
    pub fn msg(value: impl fmt::Display) -> Self {
        Self::new(WrapInput::opaque(value))
    }

    /// Annotate a cause.
    ///
    /// An [`Error`] cause is extended in place and returned: its chain grows
    /// by `" -- " + msg`, its message becomes `msg`, and its stack is left
    /// alone. Any other cause is captured fresh.
    pub fn wrap(cause: impl Into<WrapInput>, msg: impl Into<String>) -> Self {
        let msg = msg.into();
        match cause.into() {
            WrapInput::Structured(mut err) => {
                err.annotate(msg);
                err
            }
            WrapInput::Plain(cause) => Self::capture(cause, Some(msg)),
            WrapInput::Opaque(text) => Self::capture(Box::new(MessageError(text)), Some(msg)),
        }
    }

    fn capture(cause: BoxError, annotation: Option<String>) -> Self {
        let stack = frame::capture();
        let root = cause.to_string();
        let (message, chain_message) = match annotation {
            Some(msg) => {
                let chain = format!("{root}{CHAIN_SEPARATOR}{msg}");
                (msg, chain)
            }
            None => (root.clone(), root),
        };

        Self {
            inner: Box::new(ErrorImpl {
                cause,
                message,
                chain_message,
                stack,
                frames: OnceLock::new(),
                metadata: None,
            }),
        }
    }

    fn annotate(&mut self, msg: String) {
        let inner = &mut *self.inner;
        inner.chain_message.push_str(CHAIN_SEPARATOR);
        inner.chain_message.push_str(&msg);
        inner.message = msg;
    }

    /// Latest annotation.
    pub fn message(&self) -> &str {
        &self.inner.message
    }

    /// Every annotation, root cause first, joined by `" -- "`.
    pub fn chain_message(&self) -> &str {
        &self.inner.chain_message
    }

    /// The wrapped cause.
    pub fn inner(&self) -> &(dyn StdError + Send + Sync + 'static) {
        &*self.inner.cause
    }

    /// Give back the wrapped cause.
    pub fn into_inner(self) -> BoxError {
        self.inner.cause
    }

    /// Raw capture tokens, innermost call site first.
    pub fn stack(&self) -> &[CaptureToken] {
        &self.inner.stack
    }

    /// Resolved frames, computed on first call. Frame 0 is the wrap site.
    pub fn frames(&self) -> &[StackFrame] {
        self.inner
            .frames
            .get_or_init(|| frame::resolve_all(&self.inner.stack))
    }

    /// Full multi-line dump of every frame.
    pub fn stack_trace(&self) -> String {
        self.frames().iter().map(ToString::to_string).collect()
    }

    /// Whether `target` appears in this error's chain. See [`is`].
    pub fn is(&self, target: &(dyn StdError + 'static)) -> bool {
        is(self, target)
    }

    /// Attached metadata, if any was set.
    pub fn metadata(&self) -> Option<&Metadata> {
        self.inner.metadata.as_ref()
    }

    /// Attach an HTTP status, allocating the metadata on first use.
    pub fn set_http_metadata(&mut self, code: u16) -> &mut Self {
        self.inner
            .metadata
            .get_or_insert_with(Metadata::default)
            .set_http(code);
        self
    }

    /// HTTP status code, `0` when none is attached.
    pub fn http_code(&self) -> u16 {
        self.metadata().map_or(0, Metadata::http_code)
    }

    /// HTTP reason phrase, `""` when none is attached.
    pub fn http_status(&self) -> &str {
        self.metadata().map_or("", Metadata::http_status)
    }

    pub(crate) fn heap_addr(&self) -> *const () {
        &*self.inner as *const ErrorImpl as *const ()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner.message)
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Error")
            .field("message", &self.inner.message)
            .field("chain", &self.inner.chain_message)
            .field("cause", &self.inner.cause)
            .field("metadata", &self.inner.metadata)
            .field("stack_depth", &self.inner.stack.len())
            .finish()
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&*self.inner.cause)
    }
}

/// Annotate an optional cause. No cause, no error.
pub fn wrap<C: Into<WrapInput>>(cause: Option<C>, msg: impl Into<String>) -> Option<Error> {
    match cause {
        Some(cause) => Some(Error::wrap(cause, msg)),
        None => None,
    }
}

/// Extension trait for annotating the error side of a `Result`.
///
/// ```rust
/// use bridge_common::errors::ResultExt;
///
/// let parsed: Result<u16, _> = "98x".parse::<u16>().wrap_err("parsing baud rate");
/// assert_eq!(parsed.unwrap_err().chain_message(), "invalid digit found in string -- parsing baud rate");
/// ```
pub trait ResultExt<T> {
    /// Wrap the error with `msg`; `Ok` passes through untouched.
    fn wrap_err(self, msg: impl Into<String>) -> Result<T, Error>;

    /// Like [`ResultExt::wrap_err`], building the message only on failure.
    fn wrap_err_with<M: Into<String>>(self, msg: impl FnOnce() -> M) -> Result<T, Error>;
}

impl<T, E: Into<WrapInput>> ResultExt<T> for Result<T, E> {
    fn wrap_err(self, msg: impl Into<String>) -> Result<T, Error> {
        match self {
            Ok(value) => Ok(value),
            Err(err) => Err(Error::wrap(err, msg)),
        }
    }

    fn wrap_err_with<M: Into<String>>(self, msg: impl FnOnce() -> M) -> Result<T, Error> {
        match self {
            Ok(value) => Ok(value),
            Err(err) => Err(Error::wrap(err, msg())),
        }
    }
}

/// Walk `err` and its `source()` chain, `err` first.
pub fn chain<'a>(
    err: &'a (dyn StdError + 'static),
) -> impl Iterator<Item = &'a (dyn StdError + 'static)> {
    std::iter::successors(Some(err), |&current| current.source())
}

/// Identity of a chain link.
///
/// Sentinels compare by the sentinel item, whether the link is the sentinel
/// itself or a boxed `&'static Sentinel`. [`Error`] values compare by their
/// heap allocation. Anything else must be the same object of the same type,
/// so a wrapper never matches the field it shares an address with.
enum Identity {
    Sentinel(*const Sentinel),
    Structured(*const ()),
    Plain(*const dyn StdError),
}

impl Identity {
    fn of(err: &(dyn StdError + 'static)) -> Self {
        if let Some(sentinel) = err.downcast_ref::<&'static Sentinel>() {
            return Self::Sentinel(*sentinel);
        }
        if let Some(sentinel) = err.downcast_ref::<Sentinel>() {
            return Self::Sentinel(sentinel);
        }
        if let Some(structured) = err.downcast_ref::<Error>() {
            return Self::Structured(structured.heap_addr());
        }
        Self::Plain(err)
    }

    fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Sentinel(a), Self::Sentinel(b)) => ptr::eq(*a, *b),
            (Self::Structured(a), Self::Structured(b)) => ptr::eq(*a, *b),
            // Address and vtable: distinct types never match, even when
            // zero-sized or sharing an address.
            (Self::Plain(a), Self::Plain(b)) => ptr::eq(*a, *b),
            _ => false,
        }
    }
}

/// Whether `target` appears anywhere in `err`'s chain, by identity.
///
/// When `target` is itself an [`Error`], its cause is looked for as well.
pub fn is(err: &(dyn StdError + 'static), target: &(dyn StdError + 'static)) -> bool {
    let wanted = Identity::of(target);
    if chain(err).any(|link| Identity::of(link).same(&wanted)) {
        return true;
    }

    match target.downcast_ref::<Error>() {
        Some(structured) => is(err, structured.inner()),
        None => false,
    }
}

/// First link of type `E` in `err`'s chain.
pub fn find<'a, E: StdError + 'static>(err: &'a (dyn StdError + 'static)) -> Option<&'a E> {
    chain(err).find_map(|link| link.downcast_ref::<E>())
}
