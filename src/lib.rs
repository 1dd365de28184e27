/*!
`spanlog` is a logger and a tracer in one library.

Producers hand typed events (messages, span lifecycle events, metric
samples, label sets) to a [`Writer`], a five-operation sink. Encoders
implement `Writer` by serializing each event into an owned scratch buffer
and handing the complete record to a byte sink in a single write, so
concurrent log shippers never see a torn record. Combinators implement
`Writer` by composing other writers.

# Getting started

```
use spanlog::{ConsoleWriter, Flags, Logger};

let logger = Logger::new(ConsoleWriter::new(std::io::stderr(), Flags::DETAIL));

spanlog::printf!(logger, "listening on %s:%d", "0.0.0.0", 8080);

let span = logger.start(spanlog::callsite!());
spanlog::printf!(span, "request handled");
span.finish();
```

# Encoders

- [`ConsoleWriter`] renders fixed-column human-readable lines.
- [`JsonWriter`] renders one JSON object per line.
- [`ProtoWriter`] renders compact varint-length-delimited binary frames.

The JSON and binary encoders describe each referenced call site on the
wire exactly once, ahead of the first event that mentions it, and refer
to it by its [`Location`] token afterwards.

# Composition

Writers nest. A typical production chain tees a locked console encoder
with a binary encoder over a size-rotated file, falling back to stderr
when the file sink degrades:

```no_run
use spanlog::{
    ConsoleWriter, FallbackWriter, Flags, LockedWriter, Logger, ProtoWriter, RotatedFile,
    TeeWriter,
};

let file = RotatedFile::create("/var/log/app_#.bin");

let writer = LockedWriter::new(
    TeeWriter::new()
        .with(ConsoleWriter::new(std::io::stderr(), Flags::DETAIL))
        .with(FallbackWriter::new(
            ProtoWriter::new(file),
            ConsoleWriter::new(std::io::stderr(), Flags::NONE),
        )),
);

let logger = Logger::new(writer);
# drop(logger);
```

Encoders themselves never lock: a producer that can prove it is the only
caller pays no synchronization cost, and everyone else wraps the chain in
a [`LockedWriter`].
*/

pub mod buf;
pub mod clock;
pub mod console;
pub mod error;
pub mod event;
pub mod fmt;
pub mod id;
pub mod json;
pub mod labels;
pub mod location;
pub mod logger;
pub mod proto;
pub mod rng;
pub mod rotate;
pub mod timestamp;
pub mod varint;
pub mod writer;

pub use crate::buf::CountingSink;
pub use crate::clock::{Clock, ManualClock, SystemClock};
pub use crate::console::{ConsoleWriter, Flags};
pub use crate::error::{Error, Result};
pub use crate::event::{Arg, Message, Metric};
pub use crate::fmt::append_printf;
pub use crate::id::SpanId;
pub use crate::json::JsonWriter;
pub use crate::labels::Labels;
pub use crate::location::{Callsite, Location};
pub use crate::logger::{
    default_logger, level, printf, printf_at, set_default, set_labels, spawn, start, Logger,
    OptionalSpan, Span,
};
pub use crate::proto::ProtoWriter;
pub use crate::rng::{RandRng, Rng, SeqRng};
pub use crate::rotate::RotatedFile;
pub use crate::timestamp::{Parts, Timestamp};
pub use crate::writer::{DiscardWriter, FallbackWriter, LockedWriter, TeeWriter, Writer};
