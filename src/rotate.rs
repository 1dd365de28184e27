/*!
The [`RotatedFile`] sink.

A byte sink that spreads its output across files of bounded size. No file
is opened until the first write; after that a write that would push the
current file past `max_size` closes it and opens a fresh one. File names
substitute a sortable UTC timestamp into the configured template, so a
directory listing reads in chronological order.

Anything that goes wrong (rotation, the write itself, closing the old
file) is reported on a fallback byte writer (stderr by default) together
with the payload that was in flight, so a degraded machine still leaves
forensic traces. Rotate and write failures are also returned to the
caller; close failures are only reported.
*/

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use crate::clock::{Clock, SystemClock};
use crate::error::Error;
use crate::timestamp::Timestamp;

const MAX_RETRIES: u32 = 10;

/**
An [`io::Write`] sink rotating across size-bounded files.
*/
pub struct RotatedFile {
    file: Option<File>,
    written: usize,
    name: String,
    max_size: usize,
    fallback: Box<dyn Write + Send>,
    clock: Box<dyn Clock + Send>,
}

impl RotatedFile {
    /**
    A sink writing to files named after `name`.

    The last `#` in `name` is replaced by the rotation timestamp; without
    one the timestamp is inserted before the final extension with an `_`.
    The size limit defaults to 1 GiB and the fallback stream to stderr.
    */
    pub fn create(name: impl Into<String>) -> RotatedFile {
        RotatedFile {
            file: None,
            written: 0,
            name: name.into(),
            max_size: 1 << 30,
            fallback: Box::new(io::stderr()),
            clock: Box::new(SystemClock::new()),
        }
    }

    /**
    Set the per-file size limit in bytes.
    */
    pub fn with_max_size(mut self, max_size: usize) -> RotatedFile {
        self.max_size = max_size;
        self
    }

    /**
    Replace the fallback stream errors are reported on.
    */
    pub fn with_fallback(mut self, fallback: impl Write + Send + 'static) -> RotatedFile {
        self.fallback = Box::new(fallback);
        self
    }

    /**
    Replace the clock used for file-name timestamps.
    */
    pub fn with_clock(mut self, clock: impl Clock + Send + 'static) -> RotatedFile {
        self.clock = Box::new(clock);
        self
    }

    fn rotate(&mut self) -> Result<(), Error> {
        if let Some(file) = self.file.take() {
            // The write handle is dropped either way; surface flush
            // errors on the fallback without failing the rotation.
            if let Err(err) = file.sync_all() {
                report(&mut self.fallback, "CLOSE FAILED", &err, None);
            }
        }

        let now = self.clock.now_ns();
        let mut tries = 0;

        loop {
            let name = file_name(&self.name, now, tries);

            match open_exclusive(Path::new(&name)) {
                Ok(file) => {
                    self.file = Some(file);
                    self.written = 0;
                    return Ok(());
                }
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists && tries < MAX_RETRIES => {
                    tries += 1;
                }
                Err(err) => return Err(Error::Rotate { tries, source: err }),
            }
        }
    }

    /**
    Close the current file, if any. The next write rotates to a new one.
    */
    pub fn close(&mut self) -> io::Result<()> {
        match self.file.take() {
            Some(file) => file.sync_all(),
            None => Ok(()),
        }
    }
}

impl Write for RotatedFile {
    fn write(&mut self, p: &[u8]) -> io::Result<usize> {
        if self.file.is_none() || self.written + p.len() > self.max_size {
            if let Err(err) = self.rotate() {
                let err = err.into_io();
                report(&mut self.fallback, "ROTATE FAILED", &err, Some(p));
                return Err(err);
            }
        }

        // Rotation guarantees a file.
        let file = self.file.as_mut().expect("rotated file is open");

        match file.write(p) {
            Ok(n) => {
                self.written += n;
                Ok(n)
            }
            Err(err) => {
                report(&mut self.fallback, "WRITE FAILED", &err, Some(p));
                Err(err)
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

fn open_exclusive(path: &Path) -> io::Result<File> {
    let mut opts = OpenOptions::new();
    opts.write(true).append(true).create_new(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        opts.mode(0o444);
    }

    opts.open(path)
}

fn file_name(template: &str, now_ns: i64, tries: u32) -> String {
    let p = Timestamp::from_ns(now_ns).to_parts();

    let mut uniq = format!(
        "{:04}-{:02}-{:02}_{:02}-{:02}-{:02}",
        p.years, p.months, p.days, p.hours, p.minutes, p.seconds
    );
    if tries != 0 {
        uniq.push_str(&format!("_{:x}", tries));
    }

    if let Some(pos) = template.rfind('#') {
        return format!("{}{}{}", &template[..pos], uniq, &template[pos + 1..]);
    }

    match extension_start(template) {
        Some(pos) => format!("{}_{}{}", &template[..pos], uniq, &template[pos..]),
        None => format!("{}_{}", template, uniq),
    }
}

// Byte offset of the final `.ext` of the file-name component, if any.
fn extension_start(name: &str) -> Option<usize> {
    let base_start = name.rfind('/').map(|p| p + 1).unwrap_or(0);
    let base = &name[base_start..];

    match base.rfind('.') {
        Some(0) | None => None,
        Some(dot) => Some(base_start + dot),
    }
}

fn report(fallback: &mut Box<dyn Write + Send>, tag: &str, err: &io::Error, payload: Option<&[u8]>) {
    let _ = write!(fallback, "{}: {}\n", tag, err);

    if let Some(payload) = payload {
        let _ = fallback.write_all(payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::fs;
    use std::sync::{Arc, Mutex};

    const TS: i64 = 1_577_934_245_000_000_000; // 2020-01-02 03:04:05 UTC

    #[derive(Clone, Default)]
    struct SharedSink(Arc<Mutex<Vec<u8>>>);

    impl SharedSink {
        fn contents(&self) -> Vec<u8> {
            self.0.lock().unwrap().clone()
        }
    }

    impl Write for SharedSink {
        fn write(&mut self, p: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(p);
            Ok(p.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn sorted_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn timestamp_lands_in_template() {
        assert_eq!(
            file_name("logs/app_#.log", TS, 0),
            "logs/app_2020-01-02_03-04-05.log"
        );
        assert_eq!(
            file_name("app.log", TS, 0),
            "app_2020-01-02_03-04-05.log"
        );
        assert_eq!(file_name("app", TS, 0), "app_2020-01-02_03-04-05");
        assert_eq!(
            file_name("dir.d/app", TS, 0),
            "dir.d/app_2020-01-02_03-04-05"
        );
        assert_eq!(
            file_name("app.log", TS, 3),
            "app_2020-01-02_03-04-05_3.log"
        );
    }

    #[test]
    fn first_write_opens_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("out_#.log");

        let mut w = RotatedFile::create(template.to_str().unwrap().to_owned())
            .with_clock(ManualClock::new(TS));

        w.write_all(b"hello").unwrap();
        w.flush().unwrap();

        let names = sorted_names(dir.path());
        assert_eq!(names, ["out_2020-01-02_03-04-05.log"]);
        assert_eq!(
            fs::read(dir.path().join(&names[0])).unwrap(),
            b"hello"
        );
    }

    #[test]
    fn size_overflow_rotates() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("out_#.log");
        let clock = Arc::new(ManualClock::new(TS));

        let mut w = RotatedFile::create(template.to_str().unwrap().to_owned())
            .with_max_size(10)
            .with_clock(Arc::clone(&clock));

        w.write_all(b"hello").unwrap();
        clock.advance(1_000_000_000);
        w.write_all(b"world!").unwrap();

        let names = sorted_names(dir.path());
        assert_eq!(
            names,
            [
                "out_2020-01-02_03-04-05.log",
                "out_2020-01-02_03-04-06.log"
            ]
        );

        let mut all = fs::read(dir.path().join(&names[0])).unwrap();
        all.extend(fs::read(dir.path().join(&names[1])).unwrap());
        assert_eq!(all, b"helloworld!");
    }

    #[test]
    fn collisions_get_retry_suffixes() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("out_#.log");
        let template = template.to_str().unwrap().to_owned();

        let mut first = RotatedFile::create(template.clone()).with_clock(ManualClock::new(TS));
        let mut second = RotatedFile::create(template).with_clock(ManualClock::new(TS));

        first.write_all(b"a").unwrap();
        second.write_all(b"b").unwrap();

        assert_eq!(
            sorted_names(dir.path()),
            [
                "out_2020-01-02_03-04-05.log",
                "out_2020-01-02_03-04-05_1.log"
            ]
        );
    }

    #[test]
    fn rotate_failure_reports_payload_on_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("missing/out_#.log");
        let fallback = SharedSink::default();

        let mut w = RotatedFile::create(template.to_str().unwrap().to_owned())
            .with_clock(ManualClock::new(TS))
            .with_fallback(fallback.clone());

        let err = w.write(b"payload");

        assert!(err.is_err());
        let report = fallback.contents();
        let report = String::from_utf8_lossy(&report);
        assert!(report.starts_with("ROTATE FAILED: "), "{report}");
        assert!(report.ends_with("payload"), "{report}");
    }

    #[test]
    fn oversized_payload_still_lands_in_one_file() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("out_#.log");

        let mut w = RotatedFile::create(template.to_str().unwrap().to_owned())
            .with_max_size(4)
            .with_clock(ManualClock::new(TS));

        w.write_all(b"0123456789").unwrap();

        let names = sorted_names(dir.path());
        assert_eq!(names.len(), 1);
        assert_eq!(
            fs::read(dir.path().join(&names[0])).unwrap(),
            b"0123456789"
        );
    }
}
