// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Output naming — pull receipt tokens out of recognised text and substitute
// them into the destination file name.
//
// Every extractor is best-effort and returns `None` when nothing matches; the
// template pairs each token with an explicit fallback string.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::{Captures, Regex};
use tracing::{debug, instrument, warn};

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

/// `m/d/y`, `m-d-y` or `m.d.y`. Both delimiters must agree, checked after matching.
static NUMERIC_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,2})([/.-])(\d{1,2})([/.-])(\d{4}|\d{2})\b").expect("numeric date pattern")
});

/// `Jan 5, 2024`, `January 05 24`.
static NAMED_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:tember)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)\.? (\d{1,2}),? ?(\d{4}|\d{2})\b",
    )
    .expect("named date pattern")
});

static STORE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bst(?:ore)?\s*[#:]?\s*[#:]?\s*(\d+)").expect("store pattern")
});

static TRANSACTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:tr(?:ans(?:action)?|an|n)?(?:\s*number)?|invoice)\s*[:#]+\s*[:#]?\s*([a-z\d-]+)")
        .expect("transaction pattern")
});

static TOTAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:\btotal\b(?:\s\bsale\b)?|\bbalance\sdue\b|\bpurchase\b|\bamount\b)\s*:?\s*\$?\s*(\d+\.?\d*)",
    )
    .expect("total pattern")
});

fn full_year(raw: &str) -> Option<i32> {
    let year: i32 = raw.parse().ok()?;
    Some(if year < 100 { year + 2000 } else { year })
}

fn numeric_date(caps: &Captures<'_>) -> Option<NaiveDate> {
    if caps[2] != caps[4] {
        return None;
    }
    NaiveDate::from_ymd_opt(full_year(&caps[5])?, caps[1].parse().ok()?, caps[3].parse().ok()?)
}

fn named_date(caps: &Captures<'_>) -> Option<NaiveDate> {
    let prefix = caps[1].get(..3)?.to_ascii_lowercase();
    let month = MONTHS.iter().position(|m| *m == prefix)? as u32 + 1;
    NaiveDate::from_ymd_opt(full_year(&caps[3])?, month, caps[2].parse().ok()?)
}

/// Earliest real calendar date in `text`, formatted `YYYY-MM-DD`.
pub fn extract_date(text: &str) -> Option<String> {
    let numeric = NUMERIC_DATE
        .captures_iter(text)
        .find_map(|caps| Some((caps.get(0)?.start(), numeric_date(&caps)?)));
    let named = NAMED_DATE
        .captures_iter(text)
        .find_map(|caps| Some((caps.get(0)?.start(), named_date(&caps)?)));

    let (_, date) = match (numeric, named) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }?;
    Some(date.format("%Y-%m-%d").to_string())
}

/// Store number, e.g. `store #123` or `st: 45`.
pub fn extract_store(text: &str) -> Option<String> {
    STORE.captures(text).map(|caps| caps[1].to_string())
}

/// Transaction or invoice identifier, e.g. `trans #A1-2`.
pub fn extract_transaction(text: &str) -> Option<String> {
    TRANSACTION.captures(text).map(|caps| caps[1].to_string())
}

/// Total amount, e.g. `total sale $12.30`.
pub fn extract_total(text: &str) -> Option<String> {
    TOTAL.captures(text).map(|caps| caps[1].to_string())
}

/// Guesses which organization issued a document from its text.
pub trait OrganizationGuesser {
    fn guess(&self, text: &str) -> Option<String>;
}

/// Lowercase and join words with `-`. Path separators and `%` also become
/// `-`, so a guess can neither leave the output directory nor inject tokens.
/// Blank input yields `None`.
pub fn normalize_organization(raw: &str) -> Option<String> {
    let joined = raw
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-");
    let cleaned = file_safe(&joined);
    (!cleaned.is_empty()).then_some(cleaned)
}

/// Make `value` usable inside a single file name component.
fn file_safe(value: &str) -> String {
    if !value.is_empty() && value.chars().all(|c| c == '.') {
        return "-".repeat(value.len());
    }
    value
        .chars()
        .map(|c| match c {
            '/' | '\\' | '%' | '\0' => '-',
            c => c,
        })
        .collect()
}

/// Runs an external program with the text on stdin; its stdout is the guess.
pub struct CommandGuesser {
    program: String,
    args: Vec<String>,
}

impl CommandGuesser {
    /// `argv[0]` is the program. An empty argv yields `None`.
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    fn run(&self, text: &str) -> std::io::Result<String> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(text.as_bytes())?;
        }
        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(std::io::Error::other(format!("exited with {}", output.status)));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl OrganizationGuesser for CommandGuesser {
    fn guess(&self, text: &str) -> Option<String> {
        match self.run(text) {
            Ok(raw) => normalize_organization(&raw),
            Err(err) => {
                warn!(program = %self.program, %err, "Organization guesser unavailable");
                None
            }
        }
    }
}

/// A file name with `%o %d %s %t %a` tokens.
#[derive(Debug, Clone)]
pub struct FilenameTemplate {
    pattern: String,
}

impl FilenameTemplate {
    pub const ORG_FALLBACK: &'static str = "<org>";
    pub const STORE_FALLBACK: &'static str = "<store>";
    pub const TRANSACTION_FALLBACK: &'static str = "<transaction>";
    pub const TOTAL_FALLBACK: &'static str = "<total>";

    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }

    /// Substitute every token in one left-to-right pass, so substituted text
    /// is never scanned again. Extractors only run for tokens the pattern
    /// uses; an unknown `%x` is kept as written.
    pub fn render(
        &self,
        text: &str,
        guesser: Option<&dyn OrganizationGuesser>,
        today: NaiveDate,
    ) -> String {
        let mut organization: Option<String> = None;
        let mut name = String::with_capacity(self.pattern.len());
        let mut chars = self.pattern.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '%' {
                name.push(c);
                continue;
            }
            let value = match chars.peek() {
                Some('o') => organization
                    .get_or_insert_with(|| {
                        guesser
                            .and_then(|g| g.guess(text))
                            .unwrap_or_else(|| Self::ORG_FALLBACK.to_string())
                    })
                    .clone(),
                Some('d') => extract_date(text).unwrap_or_else(|| today.format("%Y-%m-%d").to_string()),
                Some('s') => extract_store(text).unwrap_or_else(|| Self::STORE_FALLBACK.to_string()),
                Some('t') => {
                    extract_transaction(text).unwrap_or_else(|| Self::TRANSACTION_FALLBACK.to_string())
                }
                Some('a') => extract_total(text).unwrap_or_else(|| Self::TOTAL_FALLBACK.to_string()),
                _ => {
                    name.push('%');
                    continue;
                }
            };
            chars.next();
            name.push_str(&file_safe(&value));
        }
        name
    }
}

/// Replace the file name of `destination` by its rendered template.
#[instrument(skip(text, guesser))]
pub fn resolve_destination(
    destination: &Path,
    text: &str,
    guesser: Option<&dyn OrganizationGuesser>,
    today: NaiveDate,
) -> PathBuf {
    let Some(file_name) = destination.file_name() else {
        return destination.to_path_buf();
    };
    let rendered =
        FilenameTemplate::new(file_name.to_string_lossy()).render(text, guesser, today);
    debug!(file_name = %rendered, "Resolved output name");
    destination.with_file_name(rendered)
}
