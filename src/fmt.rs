/*!
Printf-style formatting into a byte buffer.

Encoders format messages directly into their scratch buffers, so the
engine targets `Vec<u8>` instead of producing intermediate strings.
Formatting is total: an argument list that does not line up with the
format string renders `%!` fault tokens in the output rather than failing
the event.

Supported verbs: `%v` (natural form), `%s`, `%q` (quoted), `%d`, `%x`,
`%f`, and `%%`. Flags `-` and `0`, a width, and a `.precision` are
accepted between the `%` and the verb, as in `%15.5f`.
*/

use core::fmt::{self, Write as _};

use crate::buf::append_safe;
use crate::event::Arg;

#[derive(Default, Clone, Copy)]
struct Spec {
    left: bool,
    zero: bool,
    width: usize,
    precision: Option<usize>,
    verb: char,
}

/**
Apply `format` to `args`, appending the result to `buf`.
*/
pub fn append_printf(buf: &mut Vec<u8>, format: &str, args: &[Arg]) {
    let mut args = args.iter();
    let mut rest = format;

    while let Some(p) = rest.find('%') {
        buf.extend_from_slice(&rest.as_bytes()[..p]);
        rest = &rest[p + 1..];

        if rest.is_empty() {
            buf.extend_from_slice(b"%!(NOVERB)");
            break;
        }

        if let Some(tail) = rest.strip_prefix('%') {
            buf.push(b'%');
            rest = tail;
            continue;
        }

        match parse_spec(rest) {
            Some((spec, tail)) => {
                match args.next() {
                    Some(arg) => append_arg(buf, spec, arg),
                    None => {
                        buf.extend_from_slice(b"%!");
                        push_char(buf, spec.verb);
                        buf.extend_from_slice(b"(MISSING)");
                    }
                }
                rest = tail;
            }
            None => {
                buf.extend_from_slice(b"%!(NOVERB)");
                rest = "";
                break;
            }
        }
    }

    buf.extend_from_slice(rest.as_bytes());

    let mut extra = args.peekable();
    if extra.peek().is_some() {
        buf.extend_from_slice(b"%!(EXTRA ");
        let mut first = true;
        for arg in extra {
            if !first {
                buf.extend_from_slice(b", ");
            }
            first = false;
            append_natural(buf, Spec::default(), arg);
        }
        buf.push(b')');
    }
}

fn parse_spec(s: &str) -> Option<(Spec, &str)> {
    let mut spec = Spec::default();
    let mut chars = s.char_indices().peekable();

    while let Some(&(_, c)) = chars.peek() {
        match c {
            '-' => spec.left = true,
            '0' => spec.zero = true,
            '+' | ' ' | '#' => {}
            _ => break,
        }
        chars.next();
    }

    let mut width = 0usize;
    while let Some(&(_, c)) = chars.peek() {
        match c.to_digit(10) {
            Some(d) => {
                width = width.saturating_mul(10).saturating_add(d as usize);
                chars.next();
            }
            None => break,
        }
    }
    spec.width = width.min(1 << 16);

    if let Some(&(_, '.')) = chars.peek() {
        chars.next();
        let mut precision = 0usize;
        while let Some(&(_, c)) = chars.peek() {
            match c.to_digit(10) {
                Some(d) => {
                    precision = precision.saturating_mul(10).saturating_add(d as usize);
                    chars.next();
                }
                None => break,
            }
        }
        spec.precision = Some(precision.min(64));
    }

    let (i, verb) = chars.next()?;
    spec.verb = verb;

    Some((spec, &s[i + verb.len_utf8()..]))
}

fn append_arg(buf: &mut Vec<u8>, spec: Spec, arg: &Arg) {
    match spec.verb {
        'v' => append_natural(buf, spec, arg),
        'd' => match arg {
            Arg::Int(v) => append_int(buf, spec, *v),
            Arg::Uint(v) => append_uint(buf, spec, *v),
            _ => append_fault(buf, spec.verb, arg),
        },
        'x' => match arg {
            Arg::Int(v) => append_padded(buf, spec, format_args!("{:x}", v)),
            Arg::Uint(v) => append_padded(buf, spec, format_args!("{:x}", v)),
            Arg::Str(s) => {
                let mut hex = String::with_capacity(s.len() * 2);
                for b in s.as_bytes() {
                    let _ = write!(hex, "{:02x}", b);
                }
                append_padded(buf, spec, format_args!("{}", hex));
            }
            Arg::Id(id) => append_padded(buf, spec, format_args!("{}", id)),
            _ => append_fault(buf, spec.verb, arg),
        },
        'f' => match arg {
            Arg::Float(v) => append_float(buf, spec, *v),
            _ => append_fault(buf, spec.verb, arg),
        },
        's' => match arg {
            Arg::Str(s) => append_str(buf, spec, s),
            Arg::Id(id) => append_padded(buf, spec, format_args!("{}", id)),
            Arg::Labels(_) => append_natural(buf, spec, arg),
            _ => append_fault(buf, spec.verb, arg),
        },
        'q' => match arg {
            Arg::Str(s) => {
                buf.push(b'"');
                append_safe(buf, s.as_bytes());
                buf.push(b'"');
            }
            Arg::Id(id) => {
                buf.push(b'"');
                let _ = write!(ByteFmt(buf), "{}", id);
                buf.push(b'"');
            }
            Arg::Labels(ls) => {
                buf.push(b'[');
                for (i, l) in ls.iter().enumerate() {
                    if i != 0 {
                        buf.push(b' ');
                    }
                    buf.push(b'"');
                    append_safe(buf, l.as_bytes());
                    buf.push(b'"');
                }
                buf.push(b']');
            }
            _ => append_fault(buf, spec.verb, arg),
        },
        verb => append_fault(buf, verb, arg),
    }
}

fn append_natural(buf: &mut Vec<u8>, spec: Spec, arg: &Arg) {
    match arg {
        Arg::Bool(v) => append_padded(buf, spec, format_args!("{}", v)),
        Arg::Int(v) => append_int(buf, spec, *v),
        Arg::Uint(v) => append_uint(buf, spec, *v),
        Arg::Float(v) => match spec.precision {
            Some(_) => append_float(buf, spec, *v),
            None => append_padded(buf, spec, format_args!("{}", v)),
        },
        Arg::Str(s) => append_str(buf, spec, s),
        Arg::Id(id) => append_padded(buf, spec, format_args!("{}", id)),
        Arg::Labels(ls) => {
            buf.push(b'[');
            for (i, l) in ls.iter().enumerate() {
                if i != 0 {
                    buf.push(b' ');
                }
                buf.extend_from_slice(l.as_bytes());
            }
            buf.push(b']');
        }
    }
}

fn append_int(buf: &mut Vec<u8>, spec: Spec, v: i64) {
    let w = spec.width;
    let mut out = ByteFmt(buf);
    let _ = match (spec.left, spec.zero) {
        (true, _) => write!(out, "{:<width$}", v, width = w),
        (false, true) => write!(out, "{:0width$}", v, width = w),
        (false, false) => write!(out, "{:>width$}", v, width = w),
    };
}

fn append_uint(buf: &mut Vec<u8>, spec: Spec, v: u64) {
    let w = spec.width;
    let mut out = ByteFmt(buf);
    let _ = match (spec.left, spec.zero) {
        (true, _) => write!(out, "{:<width$}", v, width = w),
        (false, true) => write!(out, "{:0width$}", v, width = w),
        (false, false) => write!(out, "{:>width$}", v, width = w),
    };
}

fn append_float(buf: &mut Vec<u8>, spec: Spec, v: f64) {
    let w = spec.width;
    let p = spec.precision.unwrap_or(6);
    let mut out = ByteFmt(buf);
    let _ = match (spec.left, spec.zero) {
        (true, _) => write!(out, "{:<width$.prec$}", v, width = w, prec = p),
        (false, true) => write!(out, "{:0width$.prec$}", v, width = w, prec = p),
        (false, false) => write!(out, "{:>width$.prec$}", v, width = w, prec = p),
    };
}

fn append_str(buf: &mut Vec<u8>, spec: Spec, s: &str) {
    let truncated = match spec.precision {
        Some(p) => {
            let end = s
                .char_indices()
                .nth(p)
                .map(|(i, _)| i)
                .unwrap_or(s.len());
            &s[..end]
        }
        None => s,
    };
    append_padded(buf, spec, format_args!("{}", truncated));
}

// Width and fill don't propagate through nested `format_args!`, so the
// value is materialized before padding.
fn append_padded(buf: &mut Vec<u8>, spec: Spec, value: fmt::Arguments) {
    let mut out = ByteFmt(buf);

    if spec.width == 0 {
        let _ = out.write_fmt(value);
        return;
    }

    let s = value.to_string();
    let _ = if spec.left {
        write!(out, "{:<width$}", s, width = spec.width)
    } else {
        write!(out, "{:>width$}", s, width = spec.width)
    };
}

fn append_fault(buf: &mut Vec<u8>, verb: char, arg: &Arg) {
    buf.extend_from_slice(b"%!");
    push_char(buf, verb);
    buf.push(b'(');
    append_natural(buf, Spec::default(), arg);
    buf.push(b')');
}

fn push_char(buf: &mut Vec<u8>, c: char) {
    let mut tmp = [0; 4];
    buf.extend_from_slice(c.encode_utf8(&mut tmp).as_bytes());
}

struct ByteFmt<'a>(&'a mut Vec<u8>);

impl fmt::Write for ByteFmt<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.extend_from_slice(s.as_bytes());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::Labels;

    fn printf(format: &str, args: &[Arg]) -> String {
        let mut buf = Vec::new();
        append_printf(&mut buf, format, args);
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn plain_substitution() {
        assert_eq!(printf("hi %d", &crate::args![5]), "hi 5");
        assert_eq!(printf("%s=%v", &crate::args!["k", 2u64]), "k=2");
    }

    #[test]
    fn width_and_precision() {
        assert_eq!(printf("%5d", &crate::args![42]), "   42");
        assert_eq!(printf("%-5d|", &crate::args![42]), "42   |");
        assert_eq!(printf("%05d", &crate::args![42]), "00042");
        assert_eq!(printf("%15.5f", &crate::args![0.12345]), "        0.12345");
        assert_eq!(printf("%.2f", &crate::args![2.0]), "2.00");
    }

    #[test]
    fn quoted_labels() {
        let mut ls = Labels::new();
        ls.set("a", "1");
        ls.del("a");
        ls.set("b", "2");

        assert_eq!(
            printf("Labels: %q", &[Arg::from(&ls)]),
            r#"Labels: ["=a" "b=2"]"#
        );
    }

    #[test]
    fn hex_and_percent() {
        assert_eq!(printf("%x", &crate::args![255]), "ff");
        assert_eq!(printf("100%%", &[]), "100%");
    }

    #[test]
    fn missing_and_extra_args() {
        assert_eq!(printf("a %d b", &[]), "a %!d(MISSING) b");
        assert_eq!(printf("a", &crate::args![1, "x"]), "a%!(EXTRA 1, x)");
    }

    #[test]
    fn mismatched_verb_renders_fault() {
        assert_eq!(printf("%d", &crate::args!["five"]), "%!d(five)");
    }

    #[test]
    fn trailing_percent() {
        assert_eq!(printf("oops%", &[]), "oops%!(NOVERB)");
    }
}
