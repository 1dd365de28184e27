/*!
The [`JsonWriter`] encoder.

One JSON object per event, newline-terminated, readable by both machines
and humans. The outer object has a single key naming the event kind:

```text
{"l":{"p":1,"e":1,"f":"src/app.rs","l":17,"n":"app::run"}}
{"m":{"s":"0000000000000001","t":1000000000,"l":1,"m":"hi 5"}}
```

The first event referencing an unseen location is preceded by a `"l"`
record describing it; both records travel in the same write, so the sink
still sees one complete, self-delimiting chunk per operation. The set of
described locations grows for the lifetime of the encoder.

Like the other encoders this type is single-caller; wrap it in a
[`crate::writer::LockedWriter`] to share it.
*/

use std::collections::HashSet;
use std::io;

use crate::buf::{append_display, append_safe, write_once};
use crate::error::Result;
use crate::event::{Message, Metric};
use crate::fmt::append_printf;
use crate::id::SpanId;
use crate::labels::Labels;
use crate::location::Location;
use crate::writer::Writer;

/**
A [`Writer`] encoding events as newline-delimited JSON.
*/
pub struct JsonWriter<W> {
    w: W,
    seen: HashSet<Location>,
    buf: Vec<u8>,
    scratch: Vec<u8>,
}

impl<W: io::Write> JsonWriter<W> {
    pub fn new(w: W) -> JsonWriter<W> {
        JsonWriter {
            w,
            seen: HashSet::new(),
            buf: Vec::new(),
            scratch: Vec::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.w
    }

    fn append_id(&mut self, id: SpanId) {
        let i = self.buf.len();
        self.buf.resize(i + 16, 0);
        id.format_to(&mut self.buf[i..]);
    }

    // Describe `loc` if this encoder hasn't yet. The record lands in the
    // scratch ahead of the event so both leave in one write.
    fn location(&mut self, loc: Location) {
        if loc.is_zero() || self.seen.contains(&loc) {
            return;
        }

        let (name, file, line) = loc.name_file_line();

        self.buf.extend_from_slice(b"{\"l\":{\"p\":");
        append_display(&mut self.buf, loc.token());

        self.buf.extend_from_slice(b",\"e\":");
        append_display(&mut self.buf, loc.entry().token());

        self.buf.extend_from_slice(b",\"f\":\"");
        append_safe(&mut self.buf, file.as_bytes());

        self.buf.extend_from_slice(b"\",\"l\":");
        append_display(&mut self.buf, line);

        self.buf.extend_from_slice(b",\"n\":\"");
        append_safe(&mut self.buf, name.as_bytes());

        self.buf.extend_from_slice(b"\"}}\n");

        self.seen.insert(loc);
    }

    fn write_buf(&mut self) -> Result<()> {
        let res = write_once(&mut self.w, &self.buf);
        self.buf.clear();
        self.scratch.clear();
        res
    }
}

impl<W: io::Write> Writer for JsonWriter<W> {
    fn labels(&mut self, ls: &Labels, sid: SpanId) -> Result<()> {
        self.buf.extend_from_slice(b"{\"L\":{");

        if !sid.is_zero() {
            self.buf.extend_from_slice(b"\"s\":\"");
            self.append_id(sid);
            self.buf.extend_from_slice(b"\",");
        }

        self.buf.extend_from_slice(b"\"L\":[");
        for (i, l) in ls.iter().enumerate() {
            if i != 0 {
                self.buf.push(b',');
            }
            self.buf.push(b'"');
            append_safe(&mut self.buf, l.as_bytes());
            self.buf.push(b'"');
        }
        self.buf.extend_from_slice(b"]}}\n");

        self.write_buf()
    }

    fn message(&mut self, m: &Message, sid: SpanId) -> Result<()> {
        self.location(m.location);

        self.buf.extend_from_slice(b"{\"m\":{");

        if !sid.is_zero() {
            self.buf.extend_from_slice(b"\"s\":\"");
            self.append_id(sid);
            self.buf.extend_from_slice(b"\",");
        }

        self.buf.extend_from_slice(b"\"t\":");
        append_display(&mut self.buf, m.time);

        if !m.location.is_zero() {
            self.buf.extend_from_slice(b",\"l\":");
            append_display(&mut self.buf, m.location.token());
        }

        self.buf.extend_from_slice(b",\"m\":\"");
        match m.args {
            Some(args) => {
                self.scratch.clear();
                append_printf(&mut self.scratch, m.format, args);
                append_safe(&mut self.buf, &self.scratch);
            }
            None => append_safe(&mut self.buf, m.format.as_bytes()),
        }

        self.buf.extend_from_slice(b"\"}}\n");

        self.write_buf()
    }

    fn metric(&mut self, m: &Metric, sid: SpanId) -> Result<()> {
        self.buf.extend_from_slice(b"{\"v\":{");

        if !sid.is_zero() {
            self.buf.extend_from_slice(b"\"s\":\"");
            self.append_id(sid);
            self.buf.extend_from_slice(b"\",");
        }

        self.buf.extend_from_slice(b"\"n\":\"");
        append_safe(&mut self.buf, m.name.as_bytes());

        self.buf.extend_from_slice(b"\",\"v\":");
        append_display(&mut self.buf, m.value);

        if !m.labels.is_empty() {
            self.buf.extend_from_slice(b",\"L\":[");
            for (i, l) in m.labels.iter().enumerate() {
                if i != 0 {
                    self.buf.push(b',');
                }
                self.buf.push(b'"');
                append_safe(&mut self.buf, l.as_bytes());
                self.buf.push(b'"');
            }
            self.buf.push(b']');
        }

        self.buf.extend_from_slice(b"}}\n");

        self.write_buf()
    }

    fn span_started(
        &mut self,
        sid: SpanId,
        parent: SpanId,
        started_ns: i64,
        loc: Location,
    ) -> Result<()> {
        self.location(loc);

        self.buf.extend_from_slice(b"{\"s\":{\"i\":\"");
        self.append_id(sid);
        self.buf.push(b'"');

        self.buf.extend_from_slice(b",\"s\":");
        append_display(&mut self.buf, started_ns);

        self.buf.extend_from_slice(b",\"l\":");
        append_display(&mut self.buf, loc.token());

        if !parent.is_zero() {
            self.buf.extend_from_slice(b",\"p\":\"");
            self.append_id(parent);
            self.buf.push(b'"');
        }

        self.buf.extend_from_slice(b"}}\n");

        self.write_buf()
    }

    fn span_finished(&mut self, sid: SpanId, elapsed_ns: i64) -> Result<()> {
        self.buf.extend_from_slice(b"{\"f\":{\"i\":\"");
        self.append_id(sid);
        self.buf.push(b'"');

        self.buf.extend_from_slice(b",\"e\":");
        append_display(&mut self.buf, elapsed_ns);

        self.buf.extend_from_slice(b"}}\n");

        self.write_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buf::CountingSink;

    fn message<'a>(loc: Location, time: i64, format: &'a str) -> Message<'a> {
        Message {
            location: loc,
            time,
            format,
            args: None,
        }
    }

    #[test]
    fn message_with_location_and_span() {
        let loc = Location::register("app::run", "src/app.rs", 17);
        let mut w = JsonWriter::new(Vec::new());

        w.message(&message(loc, 1_000_000_000, "x"), SpanId::from_u64(1))
            .unwrap();

        let out = String::from_utf8(w.into_inner()).unwrap();
        let tok = loc.token();

        assert_eq!(
            out,
            format!(
                "{{\"l\":{{\"p\":{tok},\"e\":{tok},\"f\":\"src/app.rs\",\"l\":17,\"n\":\"app::run\"}}}}\n\
                 {{\"m\":{{\"s\":\"0000000000000001\",\"t\":1000000000,\"l\":{tok},\"m\":\"x\"}}}}\n"
            )
        );
    }

    #[test]
    fn location_is_described_once_and_in_one_write() {
        let loc = Location::register("app::poll", "src/poll.rs", 3);
        let sink = CountingSink::new();
        let mut w = JsonWriter::new(&sink);

        w.message(&message(loc, 1, "a"), SpanId::ZERO).unwrap();
        w.message(&message(loc, 2, "b"), SpanId::ZERO).unwrap();

        // Two operations, two writes: the location record rides with the
        // first event.
        assert_eq!(sink.writes(), 2);
    }

    #[test]
    fn zero_location_is_never_described() {
        let mut w = JsonWriter::new(Vec::new());

        w.message(&message(Location::ZERO, 5, "x"), SpanId::ZERO)
            .unwrap();

        assert_eq!(
            String::from_utf8(w.into_inner()).unwrap(),
            "{\"m\":{\"t\":5,\"m\":\"x\"}}\n"
        );
    }

    #[test]
    fn formatted_message_is_escaped() {
        let args = crate::args!["say \"hi\"\n"];
        let mut w = JsonWriter::new(Vec::new());

        w.message(
            &Message {
                location: Location::ZERO,
                time: 0,
                format: "%s",
                args: Some(&args),
            },
            SpanId::ZERO,
        )
        .unwrap();

        assert_eq!(
            String::from_utf8(w.into_inner()).unwrap(),
            "{\"m\":{\"t\":0,\"m\":\"say \\\"hi\\\"\\u000a\"}}\n"
        );
    }

    #[test]
    fn labels_with_span() {
        let mut ls = Labels::new();
        ls.set("a", "1");
        ls.del("a");
        ls.set("b", "2");

        let mut w = JsonWriter::new(Vec::new());
        w.labels(&ls, SpanId::from_u64(0xfe)).unwrap();

        assert_eq!(
            String::from_utf8(w.into_inner()).unwrap(),
            "{\"L\":{\"s\":\"00000000000000fe\",\"L\":[\"=a\",\"b=2\"]}}\n"
        );
    }

    #[test]
    fn metric_shape() {
        let ls: Labels = ["host=h1"].into_iter().collect();
        let mut w = JsonWriter::new(Vec::new());

        w.metric(
            &Metric {
                name: "queue_depth",
                value: 3.5,
                labels: &ls,
            },
            SpanId::ZERO,
        )
        .unwrap();

        assert_eq!(
            String::from_utf8(w.into_inner()).unwrap(),
            "{\"v\":{\"n\":\"queue_depth\",\"v\":3.5,\"L\":[\"host=h1\"]}}\n"
        );
    }

    #[test]
    fn span_lifecycle_shapes() {
        let loc = Location::register("app::job", "src/job.rs", 9);
        let mut w = JsonWriter::new(Vec::new());

        w.span_started(SpanId::from_u64(2), SpanId::from_u64(1), 77, loc)
            .unwrap();
        w.span_finished(SpanId::from_u64(2), 250_000).unwrap();

        let out = String::from_utf8(w.into_inner()).unwrap();
        let tok = loc.token();
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(
            lines[1],
            format!(
                "{{\"s\":{{\"i\":\"0000000000000002\",\"s\":77,\"l\":{tok},\"p\":\"0000000000000001\"}}}}"
            )
        );
        assert_eq!(lines[2], "{\"f\":{\"i\":\"0000000000000002\",\"e\":250000}}");
    }
}
