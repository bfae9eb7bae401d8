use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{error, info, warn};

use crate::error::AppError;
use crate::utils::preview_text;

pub const MAX_RESULTS: usize = 4;
pub const DEFAULT_CONTEXT_LINES: usize = 4;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CorpusError {
    #[error("corpus file not found: {}", .0.display())]
    NotFound(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanOptions {
    pub max_results: usize,
    pub context_lines: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            max_results: MAX_RESULTS,
            context_lines: DEFAULT_CONTEXT_LINES,
        }
    }
}

/// A matching corpus line plus the lines that follow it in the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snippet {
    pub match_line: String,
    pub context_lines: Vec<String>,
    pub source_line_index: usize,
}

impl Snippet {
    pub fn text(&self) -> String {
        let mut text = self.match_line.clone();
        for line in &self.context_lines {
            text.push('\n');
            text.push_str(line);
        }
        text
    }
}

/// Sentinel entries shown in place of (or after) real matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    NoMatch { query: String },
    CorpusMissing { path: PathBuf },
    ReadError { message: String },
    ExtractedText { text: String },
    ExtractionFailed { message: String },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoMatch { query } => write!(f, "No match found for: '{query}'"),
            Self::CorpusMissing { path } => write!(f, "Error: File {} not found", path.display()),
            Self::ReadError { message } => write!(f, "[Error reading file: {message}]"),
            Self::ExtractedText { text } => write!(f, "Extracted Text:\n\n{text}"),
            Self::ExtractionFailed { message } => write!(f, "OCR failed: {message}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Match(Snippet),
    Notice(Notice),
}

impl Entry {
    pub fn text(&self) -> String {
        match self {
            Self::Match(snippet) => snippet.text(),
            Self::Notice(notice) => notice.to_string(),
        }
    }
}

/// Ordered, never-empty list of entries for one lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    entries: Vec<Entry>,
}

impl SearchResult {
    pub fn notice(notice: Notice) -> Self {
        Self {
            entries: vec![Entry::Notice(notice)],
        }
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, index: usize) -> Option<&Entry> {
        self.entries.get(index)
    }

    pub fn has_matches(&self) -> bool {
        self.entries
            .iter()
            .any(|entry| matches!(entry, Entry::Match(_)))
    }

    pub fn texts(&self) -> Vec<String> {
        self.entries.iter().map(Entry::text).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scan {
    Results(SearchResult),
    CorpusMissing {
        result: SearchResult,
        error: CorpusError,
    },
}

pub fn search(query: &str, corpus: &Path, options: ScanOptions) -> Scan {
    info!(query = preview_text(query).as_str(), "searching corpus");

    let file = match File::open(corpus) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            error!(path = %corpus.display(), "corpus file not found");
            return Scan::CorpusMissing {
                result: SearchResult::notice(Notice::CorpusMissing {
                    path: corpus.to_path_buf(),
                }),
                error: CorpusError::NotFound(corpus.to_path_buf()),
            };
        }
        Err(err) => {
            warn!(path = %corpus.display(), "failed to open corpus: {err}");
            return Scan::Results(SearchResult::notice(Notice::ReadError {
                message: err.to_string(),
            }));
        }
    };

    Scan::Results(search_reader(query, BufReader::new(file), options))
}

pub fn search_reader<R: BufRead>(query: &str, reader: R, options: ScanOptions) -> SearchResult {
    let needle = query.to_lowercase();
    let max_results = options.max_results.max(1);
    let mut entries = Vec::new();
    let mut lines = reader.lines().enumerate();

    while entries.len() < max_results {
        let Some((index, line)) = lines.next() else {
            break;
        };
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                warn!(line = index, "{}", AppError::TransientIo(err.to_string()));
                entries.push(Entry::Notice(Notice::ReadError {
                    message: err.to_string(),
                }));
                return finish(query, entries);
            }
        };

        if !line.to_lowercase().contains(&needle) {
            continue;
        }

        let mut context_lines = Vec::with_capacity(options.context_lines);
        for _ in 0..options.context_lines {
            match lines.next() {
                Some((_, Ok(next_line))) => context_lines.push(next_line),
                Some((context_index, Err(err))) => {
                    // The half-read snippet is dropped; the marker takes its slot.
                    warn!(
                        line = context_index,
                        "{}",
                        AppError::TransientIo(err.to_string())
                    );
                    entries.push(Entry::Notice(Notice::ReadError {
                        message: err.to_string(),
                    }));
                    return finish(query, entries);
                }
                None => break,
            }
        }

        entries.push(Entry::Match(Snippet {
            match_line: line,
            context_lines,
            source_line_index: index,
        }));
    }

    finish(query, entries)
}

fn finish(query: &str, entries: Vec<Entry>) -> SearchResult {
    if entries.is_empty() {
        info!(query = preview_text(query).as_str(), "no match found");
        return SearchResult::notice(Notice::NoMatch {
            query: query.to_string(),
        });
    }

    info!(matches = entries.len(), "corpus scan finished");
    SearchResult { entries }
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};

    use super::*;

    const SAMPLE: &str = "apple pie\nis tasty\nand sweet\nserved warm\ndaily\nbanana split\n";

    fn scan(query: &str, corpus: &str) -> SearchResult {
        search_reader(query, Cursor::new(corpus.as_bytes()), ScanOptions::default())
    }

    #[test]
    fn match_includes_four_following_lines() {
        let result = scan("apple", SAMPLE);
        assert_eq!(
            result.texts(),
            vec!["apple pie\nis tasty\nand sweet\nserved warm\ndaily".to_string()]
        );
        let Some(Entry::Match(snippet)) = result.get(0) else {
            panic!("expected a match entry");
        };
        assert_eq!(snippet.source_line_index, 0);
        assert_eq!(snippet.context_lines.len(), 4);
    }

    #[test]
    fn missing_query_yields_single_no_match_notice() {
        let result = scan("kiwi", SAMPLE);
        assert_eq!(result.texts(), vec!["No match found for: 'kiwi'".to_string()]);
        assert!(!result.has_matches());
    }

    #[test]
    fn matching_is_case_insensitive() {
        let result = scan("BANANA", SAMPLE);
        assert_eq!(result.texts(), vec!["banana split".to_string()]);
    }

    #[test]
    fn scan_stops_after_four_matches_in_corpus_order() {
        let corpus = "hit 1\nhit 2\nhit 3\nhit 4\nhit 5\n";
        let options = ScanOptions {
            max_results: MAX_RESULTS,
            context_lines: 0,
        };
        let result = search_reader("hit", Cursor::new(corpus), options);
        assert_eq!(result.len(), 4);
        assert_eq!(result.texts(), vec!["hit 1", "hit 2", "hit 3", "hit 4"]);
    }

    #[test]
    fn context_lines_are_not_rescanned() {
        let corpus = "key one\nkey two\nfiller\nfiller\nfiller\nkey three\n";
        let result = scan("key", corpus);
        assert_eq!(result.len(), 2);
        let Some(Entry::Match(second)) = result.get(1) else {
            panic!("expected a second match");
        };
        assert_eq!(second.match_line, "key three");
        assert_eq!(second.source_line_index, 5);
    }

    #[test]
    fn context_is_truncated_at_end_of_file_and_keeps_blank_lines() {
        let corpus = "first\n\nmatch here\n\nlast";
        let result = scan("match", corpus);
        let Some(Entry::Match(snippet)) = result.get(0) else {
            panic!("expected a match entry");
        };
        assert_eq!(snippet.context_lines, vec!["".to_string(), "last".to_string()]);
        assert_eq!(snippet.text(), "match here\n\nlast");
    }

    #[test]
    fn read_failure_appends_sentinel_to_partial_results() {
        let mut bytes = b"word one\n".to_vec();
        bytes.extend_from_slice(&[0xff, 0xfe, b'\n']);
        bytes.extend_from_slice(b"word two\n");
        let options = ScanOptions {
            max_results: MAX_RESULTS,
            context_lines: 0,
        };

        let result = search_reader("word", Cursor::new(bytes), options);
        assert_eq!(result.len(), 2);
        assert_eq!(result.texts()[0], "word one");
        assert!(result.texts()[1].starts_with("[Error reading file:"));
    }

    #[test]
    fn context_read_failure_replaces_the_snippet_being_built() {
        let mut bytes = b"hit 1\nctx\n".to_vec();
        bytes.extend_from_slice(&[0xff, 0xfe, b'\n']);
        let options = ScanOptions {
            max_results: MAX_RESULTS,
            context_lines: 2,
        };

        let result = search_reader("hit", Cursor::new(bytes), options);
        assert_eq!(result.len(), 1);
        assert!(!result.has_matches());
        assert!(result.texts()[0].starts_with("[Error reading file:"));
    }

    #[test]
    fn context_read_failure_on_last_slot_still_reports_error() {
        let mut bytes = b"hit 1\nx\nhit 2\nx\nhit 3\nx\nhit 4\n".to_vec();
        bytes.extend_from_slice(&[0xff, 0xfe, b'\n']);
        bytes.extend_from_slice(b"tail\n");
        let options = ScanOptions {
            max_results: MAX_RESULTS,
            context_lines: 1,
        };

        let result = search_reader("hit", Cursor::new(bytes), options);
        let texts = result.texts();
        assert_eq!(texts.len(), MAX_RESULTS);
        assert_eq!(&texts[..3], &["hit 1\nx", "hit 2\nx", "hit 3\nx"]);
        assert!(texts[3].starts_with("[Error reading file:"));
    }

    #[test]
    fn missing_corpus_is_reported_as_configuration_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("absent.txt");

        let scan = search("apple", &path, ScanOptions::default());
        let Scan::CorpusMissing { result, error } = scan else {
            panic!("expected corpus missing outcome");
        };
        assert_eq!(error, CorpusError::NotFound(path.clone()));
        assert_eq!(
            result.texts(),
            vec![format!("Error: File {} not found", path.display())]
        );
    }

    #[test]
    fn search_reads_corpus_from_disk() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(SAMPLE.as_bytes()).expect("write corpus");

        let scan = search("served", file.path(), ScanOptions::default());
        let Scan::Results(result) = scan else {
            panic!("expected results");
        };
        assert_eq!(result.texts(), vec!["served warm\ndaily\nbanana split".to_string()]);
    }
}
