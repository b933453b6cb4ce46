use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

use log::warn;

/// Line oriented protocol output shared between the dispatcher and the
/// search thread. Each call writes one whole line under the lock.
#[derive(Clone)]
pub struct Printer {
    out: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl Printer {
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            out: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    pub fn line(&self, text: impl AsRef<str>) {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        let result = writeln!(out, "{}", text.as_ref()).and_then(|()| out.flush());
        if let Err(e) = result {
            warn!("failed to write protocol output: {e}");
        }
    }

    /// Free-form diagnostic to the GUI.
    pub fn info_string(&self, text: impl AsRef<str>) {
        self.line(format!("info string {}", text.as_ref()))
    }
}

/// In-memory sink for inspecting protocol output in tests.
#[cfg(test)]
#[derive(Clone, Default)]
pub struct CaptureBuffer(Arc<Mutex<Vec<u8>>>);

#[cfg(test)]
impl CaptureBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }

    pub fn take(&self) -> String {
        let bytes = std::mem::take(&mut *self.0.lock().unwrap());
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

#[cfg(test)]
impl Write for CaptureBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn lines_do_not_interleave() {
        let buffer = CaptureBuffer::default();
        let printer = Printer::new(buffer.clone());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let printer = printer.clone();
                thread::spawn(move || {
                    for _ in 0..50 {
                        printer.line(format!("thread {i} says hello"));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let text = buffer.contents();
        assert_eq!(text.lines().count(), 200);
        assert!(text.lines().all(|l| l.starts_with("thread ") && l.ends_with(" says hello")));
    }

    #[test]
    fn info_string_prefix() {
        let buffer = CaptureBuffer::default();
        Printer::new(buffer.clone()).info_string("hash cleared");
        assert_eq!(buffer.take(), "info string hash cleared\n");
        assert!(buffer.contents().is_empty());
    }
}
