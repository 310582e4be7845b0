//! Line-oriented reader for comma-separated feed files.
//!
//! A small parser: a `"` toggles an in-quotes state in
//! which commas are literal, and the quote characters themselves are dropped.
//! Doubled quotes are not treated as an escape and a record cannot span
//! lines. Feeds that rely on either will be read incorrectly.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Lines};
use std::path::Path;

const DELIMITER: char = ',';
const QUOTE: char = '"';
const BOM: char = '\u{feff}';

/// Split one line into its fields.
pub fn parse_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in line.chars() {
        match c {
            QUOTE => in_quotes = !in_quotes,
            DELIMITER if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);

    fields
}

/// Header name → field position.
#[derive(Clone, Debug, Default)]
pub struct ColumnMap {
    positions: HashMap<String, usize>,
}

impl ColumnMap {
    pub fn from_header(header: &str) -> Self {
        let positions = parse_line(header.trim_start_matches(BOM))
            .into_iter()
            .enumerate()
            .map(|(i, name)| (name.trim().to_string(), i))
            .collect();
        Self { positions }
    }

    pub fn position(&self, column: &str) -> Option<usize> {
        self.positions.get(column).copied()
    }

    /// Resolve a fixed set of columns at once, in the order given.
    pub fn resolve<const N: usize>(&self, columns: [&str; N]) -> [Option<usize>; N] {
        columns.map(|c| self.position(c))
    }
}

/// One data row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeedRow {
    fields: Vec<String>,
}

impl FeedRow {
    pub fn parse(line: &str) -> Self {
        Self {
            fields: parse_line(line),
        }
    }

    /// Trimmed value at `position`. Missing columns and empty values are both
    /// `None`.
    pub fn get(&self, position: Option<usize>) -> Option<&str> {
        let value = self.fields.get(position?)?.trim();
        (!value.is_empty()).then_some(value)
    }
}

/// Streams the data rows of a feed file. The first line is the header; blank
/// lines are skipped.
pub struct FeedReader<R> {
    columns: ColumnMap,
    lines: Lines<R>,
}

impl FeedReader<BufReader<File>> {
    /// Open a feed file. Returns `Ok(None)` when the file does not exist.
    pub fn open(path: &Path) -> io::Result<Option<Self>> {
        match File::open(path) {
            Ok(file) => Self::new(BufReader::new(file)).map(Some),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl<R: BufRead> FeedReader<R> {
    pub fn new(reader: R) -> io::Result<Self> {
        let mut lines = reader.lines();
        let columns = match lines.next() {
            Some(header) => ColumnMap::from_header(header?.trim_end_matches('\r')),
            None => ColumnMap::default(),
        };
        Ok(Self { columns, lines })
    }

    pub fn columns(&self) -> &ColumnMap {
        &self.columns
    }
}

impl<R: BufRead> Iterator for FeedReader<R> {
    type Item = io::Result<FeedRow>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e)),
            };
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                return Some(Ok(FeedRow::parse(trimmed)));
            }
        }
    }
}
