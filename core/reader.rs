use crate::error::Result;
use crate::walk::CandidateFile;
use log;
use rayon::ThreadPoolBuilder;
use std::fs::File;
use std::io::{self, ErrorKind, Read};
use std::path::PathBuf;
use std::sync::mpsc;

pub const CHUNK_SIZE: usize = 8192;
pub const SEPARATOR_LINE: &str =
    "# -------------------------------------------------------------- #";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileResult {
    pub path: PathBuf,
    pub relative_path: String,
    pub block: String,
    pub error: Option<String>,
}

impl FileResult {
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

pub fn source_header(relative_path: &str) -> String {
    format!("\n\n{}\n# Source: {}\n\n", SEPARATOR_LINE, relative_path)
}

pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(8)
}

#[derive(Debug, Clone)]
pub struct ConcurrentReader {
    workers: usize,
}

impl Default for ConcurrentReader {
    fn default() -> Self {
        Self::new(default_workers())
    }
}

impl ConcurrentReader {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Results arrive in completion order; callers sort them.
    pub fn read_all(&self, candidates: &[CandidateFile]) -> Result<Vec<FileResult>> {
        log::info!(
            "Reading {} files using {} threads",
            candidates.len(),
            self.workers
        );
        let pool = ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("xcombine-reader-{}", i))
            .build()?;

        let (tx, rx) = mpsc::channel::<FileResult>();
        pool.scope(|scope| {
            for candidate in candidates {
                let tx = tx.clone();
                scope.spawn(move |_| {
                    if tx.send(read_candidate(candidate)).is_err() {
                        log::error!("Receiver dropped before {} was delivered", candidate.relative_path);
                    }
                });
            }
        });
        drop(tx);

        let results: Vec<FileResult> = rx.into_iter().collect();
        log::info!("File reading complete.");
        Ok(results)
    }
}

pub fn read_candidate(candidate: &CandidateFile) -> FileResult {
    let header = source_header(&candidate.relative_path);
    let outcome = File::open(&candidate.path).and_then(read_lossy);
    match outcome {
        Ok(content) => {
            log::trace!("Read {} ({} chars)", candidate.relative_path, content.len());
            FileResult {
                path: candidate.path.clone(),
                relative_path: candidate.relative_path.clone(),
                block: header + &content,
                error: None,
            }
        }
        Err(e) => {
            log::error!("Error reading file {}: {}", candidate.path.display(), e);
            FileResult {
                path: candidate.path.clone(),
                relative_path: candidate.relative_path.clone(),
                block: format!("{}# Error reading file: {}\n", header, e),
                error: Some(e.to_string()),
            }
        }
    }
}

/// Streams `reader` in `CHUNK_SIZE` pieces, replacing invalid UTF-8 with
/// U+FFFD. Sequences split across chunk boundaries decode intact.
pub fn read_lossy<R: Read>(mut reader: R) -> io::Result<String> {
    let mut decoded = String::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut pending: Vec<u8> = Vec::new();

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        pending.extend_from_slice(&buf[..n]);
        let consumed = decode_into(&pending, &mut decoded, false);
        pending.drain(..consumed);
    }
    if !pending.is_empty() {
        decode_into(&pending, &mut decoded, true);
    }
    Ok(decoded)
}

// Returns how many bytes were consumed; an incomplete trailing sequence is
// left for the next chunk unless `at_eof`.
fn decode_into(bytes: &[u8], out: &mut String, at_eof: bool) -> usize {
    let mut rest = bytes;
    loop {
        match std::str::from_utf8(rest) {
            Ok(valid) => {
                out.push_str(valid);
                return bytes.len();
            }
            Err(e) => {
                let valid_len = e.valid_up_to();
                if let Ok(valid) = std::str::from_utf8(&rest[..valid_len]) {
                    out.push_str(valid);
                }
                match e.error_len() {
                    Some(bad_len) => {
                        out.push(char::REPLACEMENT_CHARACTER);
                        rest = &rest[valid_len + bad_len..];
                    }
                    None if at_eof => {
                        out.push(char::REPLACEMENT_CHARACTER);
                        return bytes.len();
                    }
                    None => return bytes.len() - (rest.len() - valid_len),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Hands out one byte per read call.
    struct Trickle<'a>(&'a [u8]);

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.0.split_first() {
                Some((first, rest)) if !buf.is_empty() => {
                    buf[0] = *first;
                    self.0 = rest;
                    Ok(1)
                }
                _ => Ok(0),
            }
        }
    }

    #[test]
    fn multibyte_sequences_survive_chunk_splits() {
        let text = "héllo │ wörld ✓";
        assert_eq!(read_lossy(Trickle(text.as_bytes())).unwrap(), text);
    }

    #[test]
    fn invalid_bytes_become_placeholders() {
        let bytes = b"ok\xffstill ok";
        assert_eq!(read_lossy(&bytes[..]).unwrap(), "ok\u{FFFD}still ok");
    }

    #[test]
    fn truncated_sequence_at_eof_is_replaced() {
        let bytes = [b'a', 0xE2, 0x94];
        assert_eq!(read_lossy(Trickle(&bytes)).unwrap(), "a\u{FFFD}");
    }

    #[test]
    fn large_input_spans_many_chunks() {
        let text = "αβγ".repeat(CHUNK_SIZE);
        assert_eq!(read_lossy(text.as_bytes()).unwrap(), text);
    }

    #[test]
    fn missing_file_yields_error_banner() {
        let candidate = CandidateFile {
            path: PathBuf::from("/definitely/not/here.txt"),
            relative_path: "here.txt".to_string(),
        };
        let result = read_candidate(&candidate);
        assert!(result.is_error());
        assert!(result.block.starts_with(&source_header("here.txt")));
        assert!(result.block.contains("# Error reading file:"));
    }
}
