/*!
The [`ConsoleWriter`] encoder.

Produces fixed-column human-readable records, one line per event, in the
spirit of the standard library logger output:

```text
2024/05/11_14:02:07.361023  main.rs:40            starting up
```

Header columns are selected by [`Flags`] and separated by two spaces.
Each event ends up in a single write to the underlying sink. Writing
events from several threads requires wrapping the encoder in a
[`crate::writer::LockedWriter`].
*/

use core::ops::{BitAnd, BitOr};
use std::io;

use crate::buf::{append_newline, write_once};
use crate::clock::{Clock, SystemClock};
use crate::error::Result;
use crate::event::{Arg, Message, Metric};
use crate::fmt::append_printf;
use crate::id::SpanId;
use crate::labels::Labels;
use crate::location::Location;
use crate::timestamp::Timestamp;
use crate::writer::Writer;

/**
Console header configuration bits.
*/
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct Flags(u32);

impl Flags {
    pub const NONE: Flags = Flags(0);

    /// `YYYY/MM/DD`.
    pub const DATE: Flags = Flags(1 << 0);
    /// `HH:MM:SS`, separated from the date by `_`.
    pub const TIME: Flags = Flags(1 << 1);
    /// Three fractional-second digits appended to the time.
    pub const MILLIS: Flags = Flags(1 << 2);
    /// Six fractional-second digits appended to the time.
    pub const MICROS: Flags = Flags(1 << 3);
    /// Times are rendered in UTC. This is also the behavior without the
    /// flag: the crate carries no timezone database.
    pub const UTC: Flags = Flags(1 << 4);
    /// `basename:line`, padded or truncated to the `shortfile` width.
    pub const SHORT_FILE: Flags = Flags(1 << 5);
    /// Full `file:line`.
    pub const LONG_FILE: Flags = Flags(1 << 6);
    /// The full function path.
    pub const TYPE_FUNC: Flags = Flags(1 << 7);
    /// The trailing function name, padded or truncated to the
    /// `funcname` width.
    pub const FUNC_NAME: Flags = Flags(1 << 8);
    /// Emit span start and finish events (dropped silently otherwise).
    pub const SPANS: Flags = Flags(1 << 9);
    /// Prefix messages with their span id column.
    pub const MESSAGE_SPAN: Flags = Flags(1 << 10);

    /// Date and time.
    pub const STD: Flags = Flags(Flags::DATE.0 | Flags::TIME.0);
    /// Date, time with microseconds, and short file.
    pub const DETAIL: Flags =
        Flags(Flags::DATE.0 | Flags::TIME.0 | Flags::MICROS.0 | Flags::SHORT_FILE.0);

    pub fn intersects(self, other: Flags) -> bool {
        self.0 & other.0 != 0
    }

    pub fn contains(self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Flags {
    type Output = Flags;

    fn bitor(self, rhs: Flags) -> Flags {
        Flags(self.0 | rhs.0)
    }
}

impl BitAnd for Flags {
    type Output = Flags;

    fn bitand(self, rhs: Flags) -> Flags {
        Flags(self.0 & rhs.0)
    }
}

/**
A [`Writer`] encoding events as fixed-column text.
*/
pub struct ConsoleWriter<W> {
    w: W,
    flags: Flags,
    /**
    Width of the `SHORT_FILE` column. Defaults to 20.
    */
    pub shortfile: usize,
    /**
    Width of the `FUNC_NAME` column. Defaults to 18.
    */
    pub funcname: usize,
    /**
    Width of span-id columns. Defaults to 16.
    */
    pub id_width: usize,
    clock: Box<dyn Clock + Send>,
    buf: Vec<u8>,
}

impl<W: io::Write> ConsoleWriter<W> {
    pub fn new(w: W, flags: Flags) -> ConsoleWriter<W> {
        ConsoleWriter {
            w,
            flags,
            shortfile: 20,
            funcname: 18,
            id_width: 16,
            clock: Box::new(SystemClock::new()),
            buf: Vec::new(),
        }
    }

    /**
    Replace the clock used for span-finish and synthesized events.
    */
    pub fn with_clock(mut self, clock: impl Clock + Send + 'static) -> ConsoleWriter<W> {
        self.clock = Box::new(clock);
        self
    }

    pub fn into_inner(self) -> W {
        self.w
    }

    fn build_header(&mut self, loc: Location, ts: i64) {
        let b = &mut self.buf;
        b.clear();

        if self
            .flags
            .intersects(Flags::DATE | Flags::TIME | Flags::MILLIS | Flags::MICROS)
        {
            let parts = Timestamp::from_ns(ts).to_parts();

            if self.flags.contains(Flags::DATE) {
                push_digits(b, parts.years as u32, 4);
                b.push(b'/');
                push_digits(b, parts.months as u32, 2);
                b.push(b'/');
                push_digits(b, parts.days as u32, 2);
            }
            if self.flags.contains(Flags::TIME) {
                if !b.is_empty() {
                    b.push(b'_');
                }
                push_digits(b, parts.hours as u32, 2);
                b.push(b':');
                push_digits(b, parts.minutes as u32, 2);
                b.push(b':');
                push_digits(b, parts.seconds as u32, 2);
            }
            if self.flags.intersects(Flags::MILLIS | Flags::MICROS) {
                if !b.is_empty() {
                    b.push(b'.');
                }
                if self.flags.contains(Flags::MILLIS) {
                    push_digits(b, parts.nanos / 1_000_000, 3);
                } else {
                    push_digits(b, parts.nanos / 1_000, 6);
                }
            }

            b.extend_from_slice(b"  ");
        }

        let mut site = None;

        if self.flags.intersects(Flags::SHORT_FILE | Flags::LONG_FILE) {
            let (_, file, line) = *site.get_or_insert_with(|| loc.name_file_line());

            if self.flags.contains(Flags::SHORT_FILE) {
                let file = basename(file);

                // Column width, stretched if an absurd line number would
                // not fit at all.
                let n = 1 + decimal_digits(line);
                let wid = self.shortfile.max(n + 1);

                let i = b.len();
                append_segments(b, wid, file, b'/');
                let e = b.len();
                b.resize(i + wid, b' ');

                let pos = if (e - i) + n > wid { i + wid - n } else { e };
                b[pos] = b':';
                put_digits(b, pos + 1, line, n - 1);
            } else {
                b.extend_from_slice(file.as_bytes());
                b.push(b':');
                let n = decimal_digits(line);
                let i = b.len();
                b.resize(i + n, b'0');
                put_digits(b, i, line, n);
            }

            b.extend_from_slice(b"  ");
        }

        if self.flags.intersects(Flags::TYPE_FUNC | Flags::FUNC_NAME) {
            let (name, _, _) = *site.get_or_insert_with(|| loc.name_file_line());

            if self.flags.contains(Flags::FUNC_NAME) {
                let func = name.rsplit("::").next().unwrap_or(name);

                if func.len() <= self.funcname {
                    let i = b.len();
                    b.extend_from_slice(func.as_bytes());
                    b.resize(i + self.funcname, b' ');
                } else {
                    // Keep the trailing digit run visible so numbered
                    // functions stay distinguishable after truncation.
                    b.extend_from_slice(&func.as_bytes()[..self.funcname]);
                    let bytes = func.as_bytes();
                    let end = b.len();
                    let mut j = 1;
                    while j <= self.funcname {
                        let q = bytes[bytes.len() - j];
                        if !q.is_ascii_digit() {
                            break;
                        }
                        b[end - j] = q;
                        j += 1;
                    }
                }
            } else {
                b.extend_from_slice(name.as_bytes());
            }

            b.extend_from_slice(b"  ");
        }
    }

    fn append_id(&mut self, id: SpanId) {
        let i = self.buf.len();
        self.buf.resize(i + self.id_width, 0);
        id.format_to(&mut self.buf[i..]);
    }

    fn span_header(&mut self, sid: SpanId, ts: i64, loc: Location) {
        self.build_header(loc, ts);
        self.append_id(sid);
        self.buf.extend_from_slice(b"  ");
    }

    fn write_buf(&mut self) -> Result<()> {
        let res = write_once(&mut self.w, &self.buf);
        self.buf.clear();
        res
    }
}

impl<W: io::Write> Writer for ConsoleWriter<W> {
    fn labels(&mut self, ls: &Labels, sid: SpanId) -> Result<()> {
        let args = [Arg::Labels(ls.clone())];

        self.message(
            &Message {
                location: Location::ZERO,
                time: self.clock.now_ns(),
                format: "Labels: %q",
                args: Some(&args),
            },
            sid,
        )
    }

    fn message(&mut self, m: &Message, sid: SpanId) -> Result<()> {
        self.build_header(m.location, m.time);

        if self.flags.contains(Flags::MESSAGE_SPAN) {
            self.append_id(sid);
            self.buf.extend_from_slice(b"  ");
        }

        match m.args {
            Some(args) => append_printf(&mut self.buf, m.format, args),
            None => self.buf.extend_from_slice(m.format.as_bytes()),
        }

        append_newline(&mut self.buf);

        self.write_buf()
    }

    fn metric(&mut self, m: &Metric, sid: SpanId) -> Result<()> {
        let args = [
            Arg::from(m.name),
            Arg::Float(m.value),
            Arg::Labels(m.labels.clone()),
        ];

        self.message(
            &Message {
                location: Location::ZERO,
                time: self.clock.now_ns(),
                format: "%v %15.5f %v",
                args: Some(&args),
            },
            sid,
        )
    }

    fn span_started(
        &mut self,
        sid: SpanId,
        parent: SpanId,
        started_ns: i64,
        loc: Location,
    ) -> Result<()> {
        if !self.flags.contains(Flags::SPANS) {
            return Ok(());
        }

        self.span_header(sid, started_ns, loc);

        if parent.is_zero() {
            self.buf.extend_from_slice(b"Span started\n");
        } else {
            self.buf.extend_from_slice(b"Span spawned from ");
            self.append_id(parent);
            self.buf.push(b'\n');
        }

        self.write_buf()
    }

    fn span_finished(&mut self, sid: SpanId, elapsed_ns: i64) -> Result<()> {
        if !self.flags.contains(Flags::SPANS) {
            return Ok(());
        }

        let now = self.clock.now_ns();
        self.span_header(sid, now, Location::ZERO);

        self.buf.extend_from_slice(b"Span finished - elapsed ");
        let ms = [Arg::Float(elapsed_ns as f64 / 1e6)];
        append_printf(&mut self.buf, "%.2f", &ms);
        self.buf.extend_from_slice(b"ms\n");

        self.write_buf()
    }
}

/**
Append up to `wid` bytes of `name`, compressing leading path segments
that would not fit down to their first character plus the separator, so
the suffix keeps its context.
*/
fn append_segments(b: &mut Vec<u8>, wid: usize, name: &str, sep: u8) {
    let end = b.len() + wid;
    let mut name = name.as_bytes();

    while b.len() < end {
        if name.len() <= end - b.len() {
            b.extend_from_slice(name);
            break;
        }

        match name.iter().position(|&c| c == sep) {
            None => {
                let take = end - b.len();
                b.extend_from_slice(&name[..take]);
                break;
            }
            Some(p) => {
                b.push(name[0]);
                b.push(sep);
                name = &name[p + 1..];
            }
        }
    }
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn decimal_digits(mut v: u32) -> usize {
    let mut n = 1;
    while v >= 10 {
        v /= 10;
        n += 1;
    }
    n
}

// Write `v` right-aligned into the `n` bytes at `b[at..at + n]`.
fn put_digits(b: &mut [u8], at: usize, mut v: u32, n: usize) {
    for j in (0..n).rev() {
        b[at + j] = b'0' + (v % 10) as u8;
        v /= 10;
    }
}

fn push_digits(b: &mut Vec<u8>, v: u32, n: usize) {
    let i = b.len();
    b.resize(i + n, b'0');
    put_digits(b, i, v, n);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::timestamp::Parts;

    fn ts(parts: Parts) -> i64 {
        Timestamp::from_parts(parts)
            .unwrap()
            .to_unix()
            .as_nanos() as i64
    }

    fn scenario_time() -> i64 {
        ts(Parts {
            years: 2020,
            months: 1,
            days: 2,
            hours: 3,
            minutes: 4,
            seconds: 5,
            ..Default::default()
        })
    }

    fn render<F>(flags: Flags, configure: F, m: &Message, sid: SpanId) -> String
    where
        F: FnOnce(&mut ConsoleWriter<Vec<u8>>),
    {
        let mut w = ConsoleWriter::new(Vec::new(), flags);
        configure(&mut w);
        w.message(m, sid).unwrap();
        String::from_utf8(w.into_inner()).unwrap()
    }

    #[test]
    fn date_time_shortfile_header() {
        let loc = Location::register("app::run", "/a/b/c/main.go", 17);
        let args = crate::args![5];

        let line = render(
            Flags::DATE | Flags::TIME | Flags::SHORT_FILE,
            |_| {},
            &Message {
                location: loc,
                time: scenario_time(),
                format: "hi %d",
                args: Some(&args),
            },
            SpanId::ZERO,
        );

        assert_eq!(line, "2020/01/02_03:04:05  main.go:17            hi 5\n");
    }

    #[test]
    fn micros_and_millis() {
        let loc = Location::ZERO;
        let time = scenario_time() + 123_456_789;

        let msg = Message {
            location: loc,
            time,
            format: "x",
            args: None,
        };

        let micros = render(Flags::TIME | Flags::MICROS, |_| {}, &msg, SpanId::ZERO);
        assert_eq!(micros, "03:04:05.123456  x\n");

        let millis = render(Flags::TIME | Flags::MILLIS, |_| {}, &msg, SpanId::ZERO);
        assert_eq!(millis, "03:04:05.123  x\n");
    }

    #[test]
    fn longfile_renders_full_path() {
        let loc = Location::register("app::run", "/a/b/c/main.go", 17);

        let line = render(
            Flags::LONG_FILE,
            |_| {},
            &Message {
                location: loc,
                time: 0,
                format: "m",
                args: None,
            },
            SpanId::ZERO,
        );

        assert_eq!(line, "/a/b/c/main.go:17  m\n");
    }

    #[test]
    fn shortfile_overflow_keeps_line_number() {
        let loc = Location::register("x", "averylongfilename_indeed.rs", 1234);

        let line = render(
            Flags::SHORT_FILE,
            |_| {},
            &Message {
                location: loc,
                time: 0,
                format: "m",
                args: None,
            },
            SpanId::ZERO,
        );

        // 20 columns: 15 of the name, then `:1234`.
        assert_eq!(line, "averylongfilena:1234  m\n");
    }

    #[test]
    fn funcname_keeps_trailing_digits() {
        let loc = Location::register("app::deeply::nested::request_handler_routine7", "f.rs", 1);

        let line = render(
            Flags::FUNC_NAME,
            |_| {},
            &Message {
                location: loc,
                time: 0,
                format: "m",
                args: None,
            },
            SpanId::ZERO,
        );

        // `request_handler_routine7` is 24 chars; 18 columns keep the
        // prefix with the trailing `7` overwriting the last one.
        assert_eq!(line, "request_handler_r7  m\n");
    }

    #[test]
    fn message_span_column() {
        let line = render(
            Flags::MESSAGE_SPAN,
            |_| {},
            &Message {
                location: Location::ZERO,
                time: 0,
                format: "payload",
                args: None,
            },
            SpanId::from_u64(0xabcd),
        );

        assert_eq!(line, "000000000000abcd  payload\n");
    }

    #[test]
    fn span_events_without_flag_are_dropped() {
        let mut w = ConsoleWriter::new(Vec::new(), Flags::STD);

        w.span_started(SpanId::from_u64(1), SpanId::ZERO, 0, Location::ZERO)
            .unwrap();
        w.span_finished(SpanId::from_u64(1), 100).unwrap();

        assert!(w.into_inner().is_empty());
    }

    #[test]
    fn span_start_and_finish_lines() {
        let mut w = ConsoleWriter::new(Vec::new(), Flags::SPANS)
            .with_clock(ManualClock::new(scenario_time()));

        w.span_started(SpanId::from_u64(1), SpanId::ZERO, 0, Location::ZERO)
            .unwrap();
        w.span_started(SpanId::from_u64(2), SpanId::from_u64(1), 0, Location::ZERO)
            .unwrap();
        w.span_finished(SpanId::from_u64(2), 250_000).unwrap();

        let out = String::from_utf8(w.into_inner()).unwrap();
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(lines[0], "0000000000000001  Span started");
        assert_eq!(
            lines[1],
            "0000000000000002  Span spawned from 0000000000000001"
        );
        assert_eq!(lines[2], "0000000000000002  Span finished - elapsed 0.25ms");
    }

    #[test]
    fn labels_and_metric_are_messages() {
        let clock = ManualClock::new(scenario_time());
        let mut w = ConsoleWriter::new(Vec::new(), Flags::NONE).with_clock(clock);

        let mut ls = Labels::new();
        ls.set("a", "1");

        w.labels(&ls, SpanId::ZERO).unwrap();
        w.metric(
            &Metric {
                name: "queue_depth",
                value: 0.125,
                labels: &ls,
            },
            SpanId::ZERO,
        )
        .unwrap();

        let out = String::from_utf8(w.into_inner()).unwrap();

        assert_eq!(
            out,
            "Labels: [\"a=1\"]\nqueue_depth         0.12500 [a=1]\n"
        );
    }

    #[test]
    fn segment_compression_preserves_suffix_context() {
        let mut b = Vec::new();
        append_segments(&mut b, 9, "alpha/beta/main.rs", b'/');

        assert_eq!(String::from_utf8(b).unwrap(), "a/b/main.");
    }
}
