/*!
The [`ProtoWriter`] encoder.

Length-delimited binary frames, more compact than JSON. Each frame is an
unsigned varint byte length followed by a single protobuf sub-message
whose field number names the event kind:

| Field | Event |
|---|---|
| 1 | labels |
| 2 | location |
| 3 | message |
| 4 | span started |
| 5 | span finished |
| 6 | metric |

Span ids travel as 16-byte blobs, times and metric values as fixed64,
everything else as varints or length-delimited bytes. Location records
precede the first frame referencing them, inside the same write.

Message text is formatted straight into the scratch buffer, then the
frame header is written in front of it and the text relocated past the
metadata with a single byte copy, so the payload is never buffered twice.

Single-caller, like the other encoders; wrap in a
[`crate::writer::LockedWriter`] to share.
*/

use std::collections::HashSet;
use std::io;

use crate::buf::write_once;
use crate::error::Result;
use crate::event::{Message, Metric};
use crate::fmt::append_printf;
use crate::id::SpanId;
use crate::labels::Labels;
use crate::location::Location;
use crate::varint::{append_tag_varint, append_varint, put_varint, varint_size};
use crate::writer::Writer;

const ID_LEN: usize = 16;

/**
A [`Writer`] encoding events as varint-length-delimited binary frames.
*/
pub struct ProtoWriter<W> {
    w: W,
    seen: HashSet<Location>,
    buf: Vec<u8>,
}

impl<W: io::Write> ProtoWriter<W> {
    pub fn new(w: W) -> ProtoWriter<W> {
        ProtoWriter {
            w,
            seen: HashSet::new(),
            buf: Vec::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.w
    }

    fn location(&mut self, loc: Location) {
        if loc.is_zero() || self.seen.contains(&loc) {
            return;
        }

        let (name, file, line) = loc.name_file_line();
        let entry = loc.entry().token();

        let mut sz = 0;
        sz += 1 + varint_size(loc.token());
        sz += 1 + varint_size(entry);
        sz += 1 + varint_size(name.len() as u64) + name.len();
        sz += 1 + varint_size(file.len() as u64) + file.len();
        sz += 1 + varint_size(line as u64);

        let b = &mut self.buf;
        append_varint(b, (1 + varint_size(sz as u64) + sz) as u64);

        append_tag_varint(b, 2 << 3 | 2, sz as u64);

        append_tag_varint(b, 1 << 3, loc.token());
        append_tag_varint(b, 2 << 3, entry);

        append_tag_varint(b, 3 << 3 | 2, name.len() as u64);
        b.extend_from_slice(name.as_bytes());

        append_tag_varint(b, 4 << 3 | 2, file.len() as u64);
        b.extend_from_slice(file.as_bytes());

        append_tag_varint(b, 5 << 3, line as u64);

        self.seen.insert(loc);
    }

    fn append_id_field(&mut self, field: u8, id: SpanId) {
        append_tag_varint(&mut self.buf, field << 3 | 2, ID_LEN as u64);
        self.buf.extend_from_slice(&id.to_bytes());
    }

    fn append_fixed64(&mut self, field: u8, v: u64) {
        self.buf.push(field << 3 | 1);
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_buf(&mut self) -> Result<()> {
        let res = write_once(&mut self.w, &self.buf);
        self.buf.clear();
        res
    }
}

fn id_field_size(id: SpanId) -> usize {
    if id.is_zero() {
        0
    } else {
        1 + varint_size(ID_LEN as u64) + ID_LEN
    }
}

impl<W: io::Write> Writer for ProtoWriter<W> {
    fn labels(&mut self, ls: &Labels, sid: SpanId) -> Result<()> {
        let mut sz = id_field_size(sid);
        for l in ls.iter() {
            sz += 1 + varint_size(l.len() as u64) + l.len();
        }

        append_varint(&mut self.buf, (1 + varint_size(sz as u64) + sz) as u64);
        append_tag_varint(&mut self.buf, 1 << 3 | 2, sz as u64);

        if !sid.is_zero() {
            self.append_id_field(1, sid);
        }

        for l in ls.iter() {
            append_tag_varint(&mut self.buf, 2 << 3 | 2, l.len() as u64);
            self.buf.extend_from_slice(l.as_bytes());
        }

        self.write_buf()
    }

    fn message(&mut self, m: &Message, sid: SpanId) -> Result<()> {
        self.location(m.location);

        // Format the text first; the frame is assembled in front of it
        // and the text moved into place afterwards.
        let st = self.buf.len();
        match m.args {
            Some(args) => append_printf(&mut self.buf, m.format, args),
            None => self.buf.extend_from_slice(m.format.as_bytes()),
        }
        let l = self.buf.len() - st;

        let mut sz = id_field_size(sid);
        if !m.location.is_zero() {
            sz += 1 + varint_size(m.location.token());
        }
        sz += 1 + 8; // time
        sz += 1 + varint_size(l as u64) + l;

        let szs = varint_size(sz as u64);
        let szss = varint_size((1 + szs + sz) as u64);
        let total = szss + 1 + szs + sz;

        self.buf.resize(st + total, 0);
        self.buf.copy_within(st..st + l, st + total - l);

        let b = &mut self.buf;
        let mut o = st;
        o = put_varint(b, o, (1 + szs + sz) as u64);

        b[o] = 3 << 3 | 2;
        o = put_varint(b, o + 1, sz as u64);

        if !sid.is_zero() {
            b[o] = 1 << 3 | 2;
            o = put_varint(b, o + 1, ID_LEN as u64);
            b[o..o + ID_LEN].copy_from_slice(&sid.to_bytes());
            o += ID_LEN;
        }

        if !m.location.is_zero() {
            b[o] = 2 << 3;
            o = put_varint(b, o + 1, m.location.token());
        }

        b[o] = 3 << 3 | 1;
        b[o + 1..o + 9].copy_from_slice(&(m.time as u64).to_le_bytes());
        o += 9;

        b[o] = 4 << 3 | 2;
        o = put_varint(b, o + 1, l as u64);

        debug_assert_eq!(o, st + total - l);

        self.write_buf()
    }

    fn metric(&mut self, m: &Metric, sid: SpanId) -> Result<()> {
        let mut sz = id_field_size(sid);
        sz += 1 + varint_size(m.name.len() as u64) + m.name.len();
        sz += 1 + 8; // value
        for l in m.labels.iter() {
            sz += 1 + varint_size(l.len() as u64) + l.len();
        }

        append_varint(&mut self.buf, (1 + varint_size(sz as u64) + sz) as u64);
        append_tag_varint(&mut self.buf, 6 << 3 | 2, sz as u64);

        if !sid.is_zero() {
            self.append_id_field(1, sid);
        }

        append_tag_varint(&mut self.buf, 2 << 3 | 2, m.name.len() as u64);
        self.buf.extend_from_slice(m.name.as_bytes());

        self.append_fixed64(3, m.value.to_bits());

        for l in m.labels.iter() {
            append_tag_varint(&mut self.buf, 4 << 3 | 2, l.len() as u64);
            self.buf.extend_from_slice(l.as_bytes());
        }

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

        let mut sz = 1 + varint_size(ID_LEN as u64) + ID_LEN;
        sz += id_field_size(parent);
        if !loc.is_zero() {
            sz += 1 + varint_size(loc.token());
        }
        sz += 1 + 8; // start time

        append_varint(&mut self.buf, (1 + varint_size(sz as u64) + sz) as u64);
        append_tag_varint(&mut self.buf, 4 << 3 | 2, sz as u64);

        self.append_id_field(1, sid);

        if !parent.is_zero() {
            self.append_id_field(2, parent);
        }

        if !loc.is_zero() {
            append_tag_varint(&mut self.buf, 3 << 3, loc.token());
        }

        self.append_fixed64(4, started_ns as u64);

        self.write_buf()
    }

    fn span_finished(&mut self, sid: SpanId, elapsed_ns: i64) -> Result<()> {
        let mut sz = 1 + varint_size(ID_LEN as u64) + ID_LEN;
        sz += 1 + varint_size(elapsed_ns as u64);

        append_varint(&mut self.buf, (1 + varint_size(sz as u64) + sz) as u64);
        append_tag_varint(&mut self.buf, 5 << 3 | 2, sz as u64);

        self.append_id_field(1, sid);
        append_tag_varint(&mut self.buf, 2 << 3, elapsed_ns as u64);

        self.write_buf()
    }
}
