/*!
The [`Writer`] trait and its combinators.

A writer is the sink boundary: five operations, one per event kind.
Encoders implement it by serializing to a byte sink; the combinators in
this module implement it by delegating to inner writers with added
behavior: fan-out ([`TeeWriter`]), mutual exclusion ([`LockedWriter`]),
failover ([`FallbackWriter`]), or nothing at all ([`DiscardWriter`]).

Operations take `&mut self`: a writer is single-caller unless wrapped in
[`LockedWriter`], which is what restores the one-complete-record-per-write
guarantee for concurrent producers.
*/

use std::sync::{Mutex, PoisonError};

use crate::error::Result;
use crate::event::{Message, Metric};
use crate::id::SpanId;
use crate::labels::Labels;
use crate::location::Location;

/**
A sink for typed events.
*/
pub trait Writer {
    /**
    Record the labels attached to the stream (or to `sid`).
    */
    fn labels(&mut self, ls: &Labels, sid: SpanId) -> Result<()>;

    /**
    Record a log message.
    */
    fn message(&mut self, m: &Message, sid: SpanId) -> Result<()>;

    /**
    Record a metric sample.
    */
    fn metric(&mut self, m: &Metric, sid: SpanId) -> Result<()>;

    /**
    Record the start of span `sid`, spawned from `parent` when non-zero.
    */
    fn span_started(
        &mut self,
        sid: SpanId,
        parent: SpanId,
        started_ns: i64,
        loc: Location,
    ) -> Result<()>;

    /**
    Record the completion of span `sid`.
    */
    fn span_finished(&mut self, sid: SpanId, elapsed_ns: i64) -> Result<()>;
}

impl<'a, W: Writer + ?Sized> Writer for &'a mut W {
    fn labels(&mut self, ls: &Labels, sid: SpanId) -> Result<()> {
        (**self).labels(ls, sid)
    }

    fn message(&mut self, m: &Message, sid: SpanId) -> Result<()> {
        (**self).message(m, sid)
    }

    fn metric(&mut self, m: &Metric, sid: SpanId) -> Result<()> {
        (**self).metric(m, sid)
    }

    fn span_started(
        &mut self,
        sid: SpanId,
        parent: SpanId,
        started_ns: i64,
        loc: Location,
    ) -> Result<()> {
        (**self).span_started(sid, parent, started_ns, loc)
    }

    fn span_finished(&mut self, sid: SpanId, elapsed_ns: i64) -> Result<()> {
        (**self).span_finished(sid, elapsed_ns)
    }
}

impl<W: Writer + ?Sized> Writer for Box<W> {
    fn labels(&mut self, ls: &Labels, sid: SpanId) -> Result<()> {
        (**self).labels(ls, sid)
    }

    fn message(&mut self, m: &Message, sid: SpanId) -> Result<()> {
        (**self).message(m, sid)
    }

    fn metric(&mut self, m: &Metric, sid: SpanId) -> Result<()> {
        (**self).metric(m, sid)
    }

    fn span_started(
        &mut self,
        sid: SpanId,
        parent: SpanId,
        started_ns: i64,
        loc: Location,
    ) -> Result<()> {
        (**self).span_started(sid, parent, started_ns, loc)
    }

    fn span_finished(&mut self, sid: SpanId, elapsed_ns: i64) -> Result<()> {
        (**self).span_finished(sid, elapsed_ns)
    }
}

impl<W: Writer> Writer for Option<W> {
    fn labels(&mut self, ls: &Labels, sid: SpanId) -> Result<()> {
        match self {
            Some(w) => w.labels(ls, sid),
            None => Ok(()),
        }
    }

    fn message(&mut self, m: &Message, sid: SpanId) -> Result<()> {
        match self {
            Some(w) => w.message(m, sid),
            None => Ok(()),
        }
    }

    fn metric(&mut self, m: &Metric, sid: SpanId) -> Result<()> {
        match self {
            Some(w) => w.metric(m, sid),
            None => Ok(()),
        }
    }

    fn span_started(
        &mut self,
        sid: SpanId,
        parent: SpanId,
        started_ns: i64,
        loc: Location,
    ) -> Result<()> {
        match self {
            Some(w) => w.span_started(sid, parent, started_ns, loc),
            None => Ok(()),
        }
    }

    fn span_finished(&mut self, sid: SpanId, elapsed_ns: i64) -> Result<()> {
        match self {
            Some(w) => w.span_finished(sid, elapsed_ns),
            None => Ok(()),
        }
    }
}

/**
A [`Writer`] that drops every event and reports success.
*/
#[derive(Default, Debug, Clone, Copy)]
pub struct DiscardWriter;

impl Writer for DiscardWriter {
    fn labels(&mut self, _: &Labels, _: SpanId) -> Result<()> {
        Ok(())
    }

    fn message(&mut self, _: &Message, _: SpanId) -> Result<()> {
        Ok(())
    }

    fn metric(&mut self, _: &Metric, _: SpanId) -> Result<()> {
        Ok(())
    }

    fn span_started(&mut self, _: SpanId, _: SpanId, _: i64, _: Location) -> Result<()> {
        Ok(())
    }

    fn span_finished(&mut self, _: SpanId, _: i64) -> Result<()> {
        Ok(())
    }
}

/**
A [`Writer`] that forwards every event to an ordered list of writers.

All inner writers are always invoked; the first error encountered is the
one returned. Joining another tee splices its writers in flat, so a tee
never nests.
*/
#[derive(Default)]
pub struct TeeWriter {
    writers: Vec<Box<dyn Writer + Send>>,
}

impl TeeWriter {
    pub fn new() -> TeeWriter {
        TeeWriter::default()
    }

    /**
    Add a writer to the end of the list.
    */
    pub fn with(mut self, w: impl Writer + Send + 'static) -> TeeWriter {
        self.writers.push(Box::new(w));
        self
    }

    /**
    Splice another tee's writers onto the end of the list.
    */
    pub fn join(mut self, other: TeeWriter) -> TeeWriter {
        self.writers.extend(other.writers);
        self
    }

    pub fn len(&self) -> usize {
        self.writers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writers.is_empty()
    }

    fn each(
        &mut self,
        mut op: impl FnMut(&mut Box<dyn Writer + Send>) -> Result<()>,
    ) -> Result<()> {
        let mut first_err = None;

        for w in &mut self.writers {
            if let Err(err) = op(w) {
                first_err.get_or_insert(err);
            }
        }

        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Writer for TeeWriter {
    fn labels(&mut self, ls: &Labels, sid: SpanId) -> Result<()> {
        self.each(|w| w.labels(ls, sid))
    }

    fn message(&mut self, m: &Message, sid: SpanId) -> Result<()> {
        self.each(|w| w.message(m, sid))
    }

    fn metric(&mut self, m: &Metric, sid: SpanId) -> Result<()> {
        self.each(|w| w.metric(m, sid))
    }

    fn span_started(
        &mut self,
        sid: SpanId,
        parent: SpanId,
        started_ns: i64,
        loc: Location,
    ) -> Result<()> {
        self.each(|w| w.span_started(sid, parent, started_ns, loc))
    }

    fn span_finished(&mut self, sid: SpanId, elapsed_ns: i64) -> Result<()> {
        self.each(|w| w.span_finished(sid, elapsed_ns))
    }
}

/**
A [`Writer`] under a mutex.

`Writer` is implemented for `&LockedWriter` as well, so a shared
reference (for example through an `Arc`) can be written from several
threads while each event still reaches the inner writer whole.
*/
pub struct LockedWriter<W> {
    inner: Mutex<W>,
}

impl<W: Writer> LockedWriter<W> {
    pub fn new(w: W) -> LockedWriter<W> {
        LockedWriter {
            inner: Mutex::new(w),
        }
    }

    pub fn into_inner(self) -> W {
        self.inner
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn with_inner<T>(&self, op: impl FnOnce(&mut W) -> T) -> T {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        op(&mut guard)
    }
}

impl<W: Writer> Writer for LockedWriter<W> {
    fn labels(&mut self, ls: &Labels, sid: SpanId) -> Result<()> {
        self.with_inner(|w| w.labels(ls, sid))
    }

    fn message(&mut self, m: &Message, sid: SpanId) -> Result<()> {
        self.with_inner(|w| w.message(m, sid))
    }

    fn metric(&mut self, m: &Metric, sid: SpanId) -> Result<()> {
        self.with_inner(|w| w.metric(m, sid))
    }

    fn span_started(
        &mut self,
        sid: SpanId,
        parent: SpanId,
        started_ns: i64,
        loc: Location,
    ) -> Result<()> {
        self.with_inner(|w| w.span_started(sid, parent, started_ns, loc))
    }

    fn span_finished(&mut self, sid: SpanId, elapsed_ns: i64) -> Result<()> {
        self.with_inner(|w| w.span_finished(sid, elapsed_ns))
    }
}

impl<'a, W: Writer> Writer for &'a LockedWriter<W> {
    fn labels(&mut self, ls: &Labels, sid: SpanId) -> Result<()> {
        self.with_inner(|w| w.labels(ls, sid))
    }

    fn message(&mut self, m: &Message, sid: SpanId) -> Result<()> {
        self.with_inner(|w| w.message(m, sid))
    }

    fn metric(&mut self, m: &Metric, sid: SpanId) -> Result<()> {
        self.with_inner(|w| w.metric(m, sid))
    }

    fn span_started(
        &mut self,
        sid: SpanId,
        parent: SpanId,
        started_ns: i64,
        loc: Location,
    ) -> Result<()> {
        self.with_inner(|w| w.span_started(sid, parent, started_ns, loc))
    }

    fn span_finished(&mut self, sid: SpanId, elapsed_ns: i64) -> Result<()> {
        self.with_inner(|w| w.span_finished(sid, elapsed_ns))
    }
}

/**
A [`Writer`] with a failover path.

Every operation goes to the primary writer. When the primary errors, the
same event is replayed on the fallback; the primary's error is returned
either way and the fallback's error is suppressed.
*/
pub struct FallbackWriter<W, F> {
    pub writer: W,
    pub fallback: F,
}

impl<W: Writer, F: Writer> FallbackWriter<W, F> {
    pub fn new(writer: W, fallback: F) -> FallbackWriter<W, F> {
        FallbackWriter { writer, fallback }
    }
}

impl<W: Writer, F: Writer> Writer for FallbackWriter<W, F> {
    fn labels(&mut self, ls: &Labels, sid: SpanId) -> Result<()> {
        let res = self.writer.labels(ls, sid);
        if res.is_err() {
            let _ = self.fallback.labels(ls, sid);
        }
        res
    }

    fn message(&mut self, m: &Message, sid: SpanId) -> Result<()> {
        let res = self.writer.message(m, sid);
        if res.is_err() {
            let _ = self.fallback.message(m, sid);
        }
        res
    }

    fn metric(&mut self, m: &Metric, sid: SpanId) -> Result<()> {
        let res = self.writer.metric(m, sid);
        if res.is_err() {
            let _ = self.fallback.metric(m, sid);
        }
        res
    }

    fn span_started(
        &mut self,
        sid: SpanId,
        parent: SpanId,
        started_ns: i64,
        loc: Location,
    ) -> Result<()> {
        let res = self.writer.span_started(sid, parent, started_ns, loc);
        if res.is_err() {
            let _ = self.fallback.span_started(sid, parent, started_ns, loc);
        }
        res
    }

    fn span_finished(&mut self, sid: SpanId, elapsed_ns: i64) -> Result<()> {
        let res = self.writer.span_finished(sid, elapsed_ns);
        if res.is_err() {
            let _ = self.fallback.span_finished(sid, elapsed_ns);
        }
        res
    }
}
