/*!
The [`Logger`] and [`Span`] facade.

A logger owns a writer chain behind a mutex, a clock, and an id source.
Cloning is cheap and every clone feeds the same writer, so a logger can
be handed around freely. Spans mint a fresh non-zero id on start and
stamp their messages with span-relative time.

The free functions at the bottom target the process-wide default logger,
which starts unset: install one explicitly with [`set_default`]. Until
then they are no-ops, as are all operations on an absent
`Option<Span>`.

```
use spanlog::{ConsoleWriter, Flags, Logger};

let logger = Logger::new(ConsoleWriter::new(std::io::stderr(), Flags::STD));
spanlog::printf!(logger, "listening on %s:%d", "0.0.0.0", 8080);

let span = logger.start(spanlog::callsite!());
spanlog::printf!(span, "handled in %dus", 132);
span.finish();
```
*/

use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::clock::{Clock, SystemClock};
use crate::event::{Arg, Message, Metric};
use crate::id::SpanId;
use crate::labels::Labels;
use crate::location::Location;
use crate::rng::{RandRng, Rng};
use crate::writer::Writer;

/**
Verbosity levels, most severe first.
*/
pub mod level {
    pub const CRITICAL: i32 = 0;
    pub const ERROR: i32 = 1;
    pub const INFO: i32 = 2;
    pub const DEBUG: i32 = 3;
    pub const TRACE: i32 = 4;
}

/**
A cheaply cloneable logging and tracing handle.
*/
#[derive(Clone)]
pub struct Logger {
    inner: Arc<Inner>,
}

struct Inner {
    writer: Mutex<Box<dyn Writer + Send>>,
    clock: Box<dyn Clock + Send + Sync>,
    rng: Box<dyn Rng + Send + Sync>,
    level: AtomicI32,
}

impl Logger {
    /**
    A logger emitting to `w`, with the system clock and the default id
    source, at [`level::INFO`].
    */
    pub fn new(w: impl Writer + Send + 'static) -> Logger {
        Logger::with_collaborators(w, SystemClock::new(), RandRng::new())
    }

    /**
    A logger with explicit clock and id-source collaborators.
    */
    pub fn with_collaborators(
        w: impl Writer + Send + 'static,
        clock: impl Clock + Send + Sync + 'static,
        rng: impl Rng + Send + Sync + 'static,
    ) -> Logger {
        Logger {
            inner: Arc::new(Inner {
                writer: Mutex::new(Box::new(w)),
                clock: Box::new(clock),
                rng: Box::new(rng),
                level: AtomicI32::new(level::INFO),
            }),
        }
    }

    fn with_writer<T>(&self, op: impl FnOnce(&mut Box<dyn Writer + Send>) -> T) -> T {
        let mut guard = self
            .inner
            .writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        op(&mut guard)
    }

    /**
    Log a printf-style message. Prefer the [`crate::printf!`] macro,
    which fills in the call site.
    */
    pub fn printf(&self, format: &str, args: &[Arg]) {
        self.printf_at(Location::ZERO, format, args);
    }

    /**
    Log a printf-style message attributed to `loc`.
    */
    pub fn printf_at(&self, loc: Location, format: &str, args: &[Arg]) {
        let m = Message {
            location: loc,
            time: self.inner.clock.now_ns(),
            format,
            args: Some(args),
        };

        self.with_writer(|w| {
            let _ = w.message(&m, SpanId::ZERO);
        });
    }

    /**
    Record the labels attached to this stream.
    */
    pub fn set_labels(&self, ls: &Labels) {
        self.with_writer(|w| {
            let _ = w.labels(ls, SpanId::ZERO);
        });
    }

    /**
    Record a metric sample.
    */
    pub fn metric(&self, name: &str, value: f64, labels: &Labels) {
        let m = Metric {
            name,
            value,
            labels,
        };

        self.with_writer(|w| {
            let _ = w.metric(&m, SpanId::ZERO);
        });
    }

    /**
    Start a root span located at `loc`.
    */
    pub fn start(&self, loc: Location) -> Span {
        self.new_span(SpanId::ZERO, loc)
    }

    /**
    Start a span spawned from `parent`.
    */
    pub fn spawn(&self, parent: SpanId, loc: Location) -> Span {
        self.new_span(parent, loc)
    }

    fn new_span(&self, parent: SpanId, loc: Location) -> Span {
        let id = SpanId::random(&self.inner.rng);
        let started_ns = self.inner.clock.now_ns();

        self.with_writer(|w| {
            let _ = w.span_started(id, parent, started_ns, loc);
        });

        Span {
            logger: self.clone(),
            id,
            parent,
            started_ns,
        }
    }

    /**
    This logger if `lv` is within its verbosity, `None` otherwise.

    Composes with `Option`'s combinators for cheap conditional logging:

    ```
    # let logger = spanlog::Logger::new(spanlog::DiscardWriter);
    if let Some(debug) = logger.v(spanlog::level::DEBUG) {
        debug.printf("cache miss", &[]);
    }
    ```
    */
    pub fn v(&self, lv: i32) -> Option<&Logger> {
        if lv > self.inner.level.load(Ordering::Relaxed) {
            None
        } else {
            Some(self)
        }
    }

    pub fn set_level(&self, lv: i32) {
        self.inner.level.store(lv, Ordering::Relaxed);
    }

    pub fn level(&self) -> i32 {
        self.inner.level.load(Ordering::Relaxed)
    }
}

/**
A named, timed unit of work.
*/
pub struct Span {
    logger: Logger,
    pub id: SpanId,
    pub parent: SpanId,
    pub started_ns: i64,
}

impl Span {
    /**
    Log a message inside this span, stamped with span-relative time.
    */
    pub fn printf(&self, format: &str, args: &[Arg]) {
        self.printf_at(Location::ZERO, format, args);
    }

    /**
    Log a message inside this span, attributed to `loc`.
    */
    pub fn printf_at(&self, loc: Location, format: &str, args: &[Arg]) {
        let m = Message {
            location: loc,
            time: self.logger.inner.clock.now_ns() - self.started_ns,
            format,
            args: Some(args),
        };

        self.logger.with_writer(|w| {
            let _ = w.message(&m, self.id);
        });
    }

    /**
    Record the completion of this span.
    */
    pub fn finish(self) {
        let elapsed = self.logger.inner.clock.now_ns() - self.started_ns;

        self.logger.with_writer(|w| {
            let _ = w.span_finished(self.id, elapsed);
        });
    }
}

/**
No-op span operations for `Option<Span>`.

The free [`start`]/[`spawn`] functions return `None` when no default
logger is installed; this trait lets callers use the result without
caring.
*/
pub trait OptionalSpan {
    fn printf(&self, format: &str, args: &[Arg]);
    fn printf_at(&self, loc: Location, format: &str, args: &[Arg]);
    fn finish(self);
    fn span_id(&self) -> SpanId;
}

impl OptionalSpan for Option<Span> {
    fn printf(&self, format: &str, args: &[Arg]) {
        if let Some(span) = self {
            span.printf(format, args);
        }
    }

    fn printf_at(&self, loc: Location, format: &str, args: &[Arg]) {
        if let Some(span) = self {
            span.printf_at(loc, format, args);
        }
    }

    fn finish(self) {
        if let Some(span) = self {
            span.finish();
        }
    }

    fn span_id(&self) -> SpanId {
        match self {
            Some(span) => span.id,
            None => SpanId::ZERO,
        }
    }
}

static DEFAULT: Lazy<RwLock<Option<Logger>>> = Lazy::new(|| RwLock::new(None));

/**
Install `logger` as the process-wide default, returning the previous one.
*/
pub fn set_default(logger: Logger) -> Option<Logger> {
    DEFAULT
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .replace(logger)
}

/**
The current default logger, if one is installed.
*/
pub fn default_logger() -> Option<Logger> {
    DEFAULT
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/**
Log a message on the default logger; a no-op when none is installed.
*/
pub fn printf(format: &str, args: &[Arg]) {
    printf_at(Location::ZERO, format, args);
}

/**
Log a message at `loc` on the default logger.
*/
pub fn printf_at(loc: Location, format: &str, args: &[Arg]) {
    if let Some(logger) = default_logger() {
        logger.printf_at(loc, format, args);
    }
}

/**
Start a root span on the default logger.
*/
pub fn start(loc: Location) -> Option<Span> {
    default_logger().map(|logger| logger.start(loc))
}

/**
Start a span spawned from `parent` on the default logger. A zero parent
yields no span.
*/
pub fn spawn(parent: SpanId, loc: Location) -> Option<Span> {
    if parent.is_zero() {
        return None;
    }

    default_logger().map(|logger| logger.spawn(parent, loc))
}

/**
Record stream labels on the default logger.
*/
pub fn set_labels(ls: &Labels) {
    if let Some(logger) = default_logger() {
        logger.set_labels(ls);
    }
}

/**
Log a printf-style message on a [`Logger`], a [`Span`], or an
`Option<Span>`, attributing it to the expansion site.
*/
#[macro_export]
macro_rules! printf {
    ($target:expr, $format:expr $(, $arg:expr)* $(,)?) => {
        $target.printf_at($crate::callsite!(), $format, &$crate::args![$($arg),*])
    };
}
