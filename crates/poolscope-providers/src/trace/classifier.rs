use super::matcher::{EventMatcher, MatchedEvent, MatcherDefinition, builtin_matchers};
use super::timestamp::{LineStamp, Prefix, split_prefix};
use crate::Result;
use crate::reader::{LineReader, RawLine};
use poolscope_types::{LineTally, LogEvent, find_date_in_path};
use chrono::Datelike;
use std::path::Path;

/// Longest logical entry, in physical lines; longer runs are cut
pub const DEFAULT_MAX_ENTRY_LINES: usize = 256;

#[derive(Debug, Clone)]
pub struct ClassifierOptions {
    /// Year for terminal-format lines when the file path has no date
    pub default_year: Option<i32>,
    pub max_entry_lines: usize,
    pub lossy_utf8: bool,
}

impl Default for ClassifierOptions {
    fn default() -> Self {
        Self {
            default_year: None,
            max_entry_lines: DEFAULT_MAX_ENTRY_LINES,
            lossy_utf8: false,
        }
    }
}

/// How one logical entry was classified
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryOutcome {
    Classified(LogEvent),
    Unclassified,
    /// Matched, but a field needed for the event was corrupt
    Malformed(String),
}

/// Ordered set of tagged matchers; the first match wins
#[derive(Debug, Clone)]
pub struct TraceClassifier {
    matchers: Vec<EventMatcher>,
    options: ClassifierOptions,
}

impl TraceClassifier {
    pub fn new(options: ClassifierOptions) -> Self {
        Self {
            matchers: builtin_matchers().to_vec(),
            options,
        }
    }

    /// Built-in matchers preceded by the given config-defined ones
    pub fn with_definitions(definitions: &[MatcherDefinition], options: ClassifierOptions) -> Result<Self> {
        let mut matchers = definitions
            .iter()
            .map(EventMatcher::from_definition)
            .collect::<Result<Vec<_>>>()?;
        matchers.extend(builtin_matchers().iter().cloned());
        Ok(Self { matchers, options })
    }

    pub fn matcher_names(&self) -> Vec<&str> {
        self.matchers.iter().map(|m| m.name()).collect()
    }

    /// Year used for terminal-format stamps of `path`
    pub fn year_for(&self, path: &Path) -> Option<i32> {
        find_date_in_path(path)
            .map(|d| d.year())
            .or(self.options.default_year)
    }

    /// Classify one logical entry (head payload plus merged continuations)
    pub fn classify_entry(
        &self,
        stamp: &LineStamp,
        text: &str,
        line_number: u64,
        year: Option<i32>,
    ) -> EntryOutcome {
        let Some(outcome) = self.matchers.iter().find_map(|m| m.apply(text)) else {
            return EntryOutcome::Unclassified;
        };
        let matched: MatchedEvent = match outcome {
            Ok(matched) => matched,
            Err(reason) => return EntryOutcome::Malformed(reason),
        };

        EntryOutcome::Classified(LogEvent {
            timestamp: stamp.resolve(year).ok(),
            raw_timestamp: stamp.raw().to_string(),
            category: matched.category,
            metric_name: matched.metric_name,
            count: matched.count,
            matched_fields: matched.fields,
            line_number,
            matcher: matched.matcher,
        })
    }

    /// Stream a trace file, calling `on_event` for every classified entry in
    /// line order, and return the line accounting.
    pub fn classify_file<F>(&self, path: &Path, mut on_event: F) -> Result<LineTally>
    where
        F: FnMut(LogEvent),
    {
        let year = self.year_for(path);
        let reader = LineReader::open(path)?.lossy(self.options.lossy_utf8);
        let mut assembler = EntryAssembler::new(self, year, self.options.max_entry_lines);

        for line in reader {
            let line = line?;
            assembler.push(&line, &mut on_event);
        }
        assembler.close(&mut on_event);

        let tally = assembler.tally;
        if tally.malformed > 0 {
            log::debug!("{}: {} malformed entries", path.display(), tally.malformed);
        }
        if tally.unknown_date > 0 {
            log::warn!(
                "{}: {} events have no resolvable date; counted under unknown-date",
                path.display(),
                tally.unknown_date
            );
        }
        Ok(tally)
    }
}

struct OpenEntry {
    stamp: LineStamp,
    line_number: u64,
    text: String,
    lines: usize,
}

/// Groups physical lines into logical entries.
///
/// A stamped line opens an entry. A bare line that starts with whitespace
/// continues the open entry; any other bare line, a blank line, or a line
/// with a corrupt stamp closes it and is unclassified.
struct EntryAssembler<'c> {
    classifier: &'c TraceClassifier,
    year: Option<i32>,
    max_lines: usize,
    open: Option<OpenEntry>,
    tally: LineTally,
}

impl<'c> EntryAssembler<'c> {
    fn new(classifier: &'c TraceClassifier, year: Option<i32>, max_lines: usize) -> Self {
        Self {
            classifier,
            year,
            max_lines: max_lines.max(1),
            open: None,
            tally: LineTally::default(),
        }
    }

    fn push<F: FnMut(LogEvent)>(&mut self, line: &RawLine, on_event: &mut F) {
        self.tally.total_lines += 1;

        if line.text.trim().is_empty() {
            self.close(on_event);
            self.tally.unclassified += 1;
            return;
        }

        match split_prefix(&line.text) {
            Prefix::Stamped { stamp, payload } => {
                self.close(on_event);
                self.open = Some(OpenEntry {
                    stamp,
                    line_number: line.number,
                    text: payload.to_string(),
                    lines: 1,
                });
            }
            Prefix::Corrupt { raw } => {
                self.close(on_event);
                log::debug!("line {}: corrupt timestamp '{}'", line.number, raw);
                self.tally.unclassified += 1;
                self.tally.malformed += 1;
            }
            Prefix::Bare => {
                let max_lines = self.max_lines;
                let owner = self
                    .open
                    .as_mut()
                    .filter(|entry| entry.lines < max_lines)
                    .filter(|_| line.text.starts_with(char::is_whitespace));
                if let Some(entry) = owner {
                    entry.text.push('\n');
                    entry.text.push_str(line.text.trim());
                    entry.lines += 1;
                    self.tally.continuation += 1;
                } else {
                    self.close(on_event);
                    self.tally.unclassified += 1;
                }
            }
        }
    }

    fn close<F: FnMut(LogEvent)>(&mut self, on_event: &mut F) {
        let Some(entry) = self.open.take() else {
            return;
        };

        match self
            .classifier
            .classify_entry(&entry.stamp, &entry.text, entry.line_number, self.year)
        {
            EntryOutcome::Classified(event) => {
                self.tally.classified += 1;
                if event.timestamp.is_none() {
                    self.tally.unknown_date += 1;
                }
                on_event(event);
            }
            EntryOutcome::Unclassified => {
                self.tally.unclassified += 1;
            }
            EntryOutcome::Malformed(reason) => {
                log::debug!("line {}: {}", entry.line_number, reason);
                self.tally.unclassified += 1;
                self.tally.malformed += 1;
            }
        }
    }
}
