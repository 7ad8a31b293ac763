//! Reader and writer for the tab-separated token stream.
//!
//! The stream starts with a header line naming the fields. After it, every
//! non-empty line is one token with tab-delimited values, and a blank line
//! closes a sentence. Lines starting with `# ` in front of a sentence are
//! comments and travel with that sentence untouched.

use std::collections::HashSet;
use std::io::{BufRead, Lines, Write};

use thiserror::Error;

use crate::stage::{Sentence, Token};

const COMMENT_PREFIX: &str = "# ";

/// Error type for reading the token stream
#[derive(Debug, Error)]
pub enum TsvError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("input has no header line")]
    MissingHeader,

    #[error("duplicate field '{0}' in header")]
    DuplicateField(String),

    #[error("line {line}: expected {expected} fields, found {actual}")]
    FieldCount {
        line: usize,
        expected: usize,
        actual: usize,
    },
}

/// A sentence together with the comment lines that preceded it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SentenceBlock {
    pub comments: Vec<String>,
    pub sentence: Sentence,
}

impl SentenceBlock {
    pub fn new(sentence: Sentence) -> Self {
        Self {
            comments: Vec::new(),
            sentence,
        }
    }
}

/// Streaming reader yielding one [`SentenceBlock`] at a time.
pub struct TsvReader<R> {
    lines: Lines<R>,
    header: Vec<String>,
    line_no: usize,
}

impl<R: BufRead> TsvReader<R> {
    /// Consume the header line and prepare to read sentences.
    ///
    /// Leading blank lines are skipped.
    pub fn new(reader: R) -> Result<Self, TsvError> {
        let mut lines = reader.lines();
        let mut line_no = 0;

        let header = loop {
            let line = lines.next().ok_or(TsvError::MissingHeader)??;
            line_no += 1;
            let line = trim_line_end(&line);
            if !line.is_empty() {
                break split_fields(line);
            }
        };

        let mut seen = HashSet::new();
        for field in &header {
            if !seen.insert(field.as_str()) {
                return Err(TsvError::DuplicateField(field.clone()));
            }
        }

        Ok(Self {
            lines,
            header,
            line_no,
        })
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    fn next_block(&mut self) -> Result<Option<SentenceBlock>, TsvError> {
        let mut block = SentenceBlock::default();

        for line in self.lines.by_ref() {
            let line = line?;
            self.line_no += 1;
            let line = trim_line_end(&line);

            if line.is_empty() {
                if block.sentence.is_empty() {
                    continue;
                }
                return Ok(Some(block));
            }

            if block.sentence.is_empty() && line.starts_with(COMMENT_PREFIX) {
                block.comments.push(line.to_string());
                continue;
            }

            let token: Token = split_fields(line);
            if token.len() != self.header.len() {
                return Err(TsvError::FieldCount {
                    line: self.line_no,
                    expected: self.header.len(),
                    actual: token.len(),
                });
            }
            block.sentence.push(token);
        }

        // End of input: flush an unterminated sentence or trailing comments
        if block.sentence.is_empty() && block.comments.is_empty() {
            Ok(None)
        } else {
            Ok(Some(block))
        }
    }
}

impl<R: BufRead> Iterator for TsvReader<R> {
    type Item = Result<SentenceBlock, TsvError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_block().transpose()
    }
}

/// Writer for the token stream.
pub struct TsvWriter<W: Write> {
    writer: W,
}

impl<W: Write> TsvWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn write_header<I, S>(&mut self, fields: I) -> std::io::Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let fields: Vec<S> = fields.into_iter().collect();
        let line: Vec<&str> = fields.iter().map(|field| field.as_ref()).collect();
        writeln!(self.writer, "{}", line.join("\t"))
    }

    /// Write comments, tokens and the closing blank line of one sentence.
    pub fn write_block(&mut self, block: &SentenceBlock) -> std::io::Result<()> {
        for comment in &block.comments {
            writeln!(self.writer, "{}", comment)?;
        }
        for token in &block.sentence {
            writeln!(self.writer, "{}", token.join("\t"))?;
        }
        writeln!(self.writer)
    }

    /// Write comment lines that have no sentence after them.
    pub fn write_comments(&mut self, comments: &[String]) -> std::io::Result<()> {
        for comment in comments {
            writeln!(self.writer, "{}", comment)?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

fn trim_line_end(line: &str) -> &str {
    line.strip_suffix('\r').unwrap_or(line)
}

fn split_fields(line: &str) -> Vec<String> {
    line.split('\t').map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn read_all(input: &str) -> (Vec<String>, Vec<SentenceBlock>) {
        let reader = TsvReader::new(Cursor::new(input)).unwrap();
        let header = reader.header().to_vec();
        let blocks = reader.collect::<Result<Vec<_>, _>>().unwrap();
        (header, blocks)
    }

    #[test]
    fn test_read_two_sentences() {
        let (header, blocks) = read_all("id\tform\n1\tHello\n2\tworld\n\n1\tBye\n\n");

        assert_eq!(header, vec!["id", "form"]);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].sentence.len(), 2);
        assert_eq!(blocks[0].sentence[1], vec!["2", "world"]);
        assert_eq!(blocks[1].sentence, vec![vec!["1".to_string(), "Bye".to_string()]]);
    }

    #[test]
    fn test_unterminated_last_sentence() {
        let (_, blocks) = read_all("form\nHello\nworld");

        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].sentence.len(), 2);
    }

    #[test]
    fn test_extra_blank_lines_collapse() {
        let (_, blocks) = read_all("\n\nform\n\n\nA\n\n\n\nB\n\n");

        assert_eq!(blocks.len(), 2);
    }

    #[test]
    fn test_crlf_line_endings() {
        let (header, blocks) = read_all("id\tform\r\n1\tHello\r\n\r\n");

        assert_eq!(header, vec!["id", "form"]);
        assert_eq!(blocks[0].sentence[0], vec!["1", "Hello"]);
    }

    #[test]
    fn test_comments_attach_to_next_sentence() {
        let (_, blocks) = read_all("form\n# sent_id = 1\n# text = Hello\nHello\n\n# sent_id = 2\nBye\n");

        assert_eq!(blocks[0].comments, vec!["# sent_id = 1", "# text = Hello"]);
        assert_eq!(blocks[1].comments, vec!["# sent_id = 2"]);
        assert_eq!(blocks[1].sentence.len(), 1);
    }

    #[test]
    fn test_hash_inside_sentence_is_a_token() {
        let (_, blocks) = read_all("form\nHello\n# \n\n");

        assert_eq!(blocks[0].sentence.len(), 2);
        assert_eq!(blocks[0].sentence[1], vec!["# "]);
    }

    #[test]
    fn test_missing_header() {
        let result = TsvReader::new(Cursor::new("\n\n"));
        assert!(matches!(result, Err(TsvError::MissingHeader)));
    }

    #[test]
    fn test_duplicate_header_field() {
        let result = TsvReader::new(Cursor::new("form\tform\n"));
        assert!(matches!(result, Err(TsvError::DuplicateField(f)) if f == "form"));
    }

    #[test]
    fn test_field_count_mismatch_reports_line() {
        let reader = TsvReader::new(Cursor::new("id\tform\n1\tHello\n2\n")).unwrap();
        let err = reader.collect::<Result<Vec<_>, _>>().unwrap_err();

        match err {
            TsvError::FieldCount { line, expected, actual } => {
                assert_eq!(line, 3);
                assert_eq!(expected, 2);
                assert_eq!(actual, 1);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_writer_layout() {
        let mut writer = TsvWriter::new(Vec::new());
        writer.write_header(["id", "form"]).unwrap();
        writer
            .write_block(&SentenceBlock {
                comments: vec!["# text = Hello world".to_string()],
                sentence: vec![
                    vec!["1".to_string(), "Hello".to_string()],
                    vec!["2".to_string(), "world".to_string()],
                ],
            })
            .unwrap();

        let out = String::from_utf8(writer.into_inner()).unwrap();
        assert_eq!(out, "id\tform\n# text = Hello world\n1\tHello\n2\tworld\n\n");
    }

    #[test]
    fn test_trailing_comments_read_as_empty_block() {
        let (_, blocks) = read_all("form\nA\n\n# trailing\n");

        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1].comments, ["# trailing"]);
        assert!(blocks[1].sentence.is_empty());
    }

    #[test]
    fn test_write_comments_has_no_separator() {
        let mut writer = TsvWriter::new(Vec::new());
        writer.write_comments(&["# end".to_string()]).unwrap();

        assert_eq!(String::from_utf8(writer.into_inner()).unwrap(), "# end\n");
    }
}
