use std::cell::RefCell;
use std::fmt::Write as FmtWrite;
use std::io;
use std::path::PathBuf;
use std::rc::Rc;

pub struct StringBuffer {
    s: String,
}

impl StringBuffer {
    pub fn new() -> StringBuffer {
        StringBuffer { s: String::new() }
    }

    pub fn as_str(&self) -> &str {
        self.s.as_str()
    }
}

// String itself only implements fmt::Write.
impl io::Write for StringBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let text = std::str::from_utf8(buf)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        self.s
            .write_str(text)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct SinkWriter;

impl io::Write for SinkWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A shared, clonable stream handle. User-facing errors and warnings are
/// written through one of these, so the caller decides whether they land on
/// stderr, in a buffer (tests), or nowhere.
#[derive(Clone)]
pub struct WriteHandle {
    w: Rc<RefCell<dyn io::Write>>,
}

impl WriteHandle {
    pub fn stderr_write_handle() -> WriteHandle {
        WriteHandle {
            w: Rc::new(RefCell::new(io::stderr())),
        }
    }

    pub fn stdout_write_handle() -> WriteHandle {
        WriteHandle {
            w: Rc::new(RefCell::new(io::stdout())),
        }
    }

    pub fn empty_write_handle() -> WriteHandle {
        WriteHandle {
            w: Rc::new(RefCell::new(SinkWriter)),
        }
    }

    pub fn string_buff_write_handle() -> (WriteHandle, Rc<RefCell<StringBuffer>>) {
        let buffer = Rc::new(RefCell::new(StringBuffer::new()));
        let h = WriteHandle { w: buffer.clone() };
        (h, buffer)
    }
}

impl io::Write for WriteHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.w.borrow_mut().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.w.borrow_mut().flush()
    }
}

#[macro_export]
macro_rules! write_errln {
    ($handle:expr, $($arg:tt)*) => {{
        use std::io::Write;
        let _ = writeln!($handle, $($arg)*);
    }};
}

/// A named source of text input. Usually an unopened file path, but may be
/// an in-memory string (summaries built in tests, stdin captures).
pub enum DescribedReader {
    Text(String, String),
    FilePath(PathBuf),
}

impl DescribedReader {
    pub fn from_string(desc: String, data: String) -> DescribedReader {
        DescribedReader::Text(desc, data)
    }

    pub fn from_file_path(path: PathBuf) -> DescribedReader {
        DescribedReader::FilePath(path)
    }

    pub fn desc(&self) -> &str {
        match self {
            DescribedReader::Text(name, _) => name,
            DescribedReader::FilePath(path) => {
                path.to_str().unwrap_or("<unknown path>")
            }
        }
    }

    pub fn reader<'a>(&'a self) -> Result<Box<dyn io::Read + 'a>, io::Error> {
        match self {
            DescribedReader::Text(_, text) => Ok(Box::new(text.as_bytes())),
            DescribedReader::FilePath(path) => {
                Ok(Box::new(std::fs::File::open(path)?))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};

    use super::{DescribedReader, StringBuffer, WriteHandle};

    #[test]
    fn test_string_buffer() {
        let mut buff = StringBuffer::new();
        let _ = write!(buff, "Some {}", "text");
        let _ = writeln!(buff, " 1");
        assert_eq!(buff.as_str(), "Some text 1\n");
    }

    #[test]
    fn test_write_handle() {
        let (mut handle, buff) = WriteHandle::string_buff_write_handle();
        write_errln!(handle, "line {}", 1);
        let mut clone = handle.clone();
        write_errln!(clone, "line 2");
        assert_eq!(buff.borrow().as_str(), "line 1\nline 2\n");
    }

    #[test]
    fn test_described_reader() {
        let r =
            DescribedReader::from_string("mem".to_string(), "abc".to_string());
        assert_eq!(r.desc(), "mem");
        let mut text = String::new();
        r.reader().unwrap().read_to_string(&mut text).unwrap();
        assert_eq!(text, "abc");
    }
}
