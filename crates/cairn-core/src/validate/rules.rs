//! The built-in rules.
//!
//! Length checks count characters of the trimmed text. Pattern checks use
//! lazily compiled regexes shared across calls.

use regex::Regex;
use std::sync::LazyLock;

use super::{Content, Rule, TaskContent, ValidationOptions, Violation, ViolationCode};

/// A file path such as `src/foo.py`, `./lib/mod.rs`, `Makefile.toml`, or
/// `main.c`. A bare name needs a stem or an extension of two or more
/// characters, which keeps `e.g` and `i.e` out.
static FILE_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:[\w.-]+/)+[\w.-]+|\b(?:[\w-]{2,}\.[A-Za-z][A-Za-z0-9]{0,5}|[\w-]\.[A-Za-z][A-Za-z0-9]{1,5})\b",
    )
    .expect("file reference regex is valid")
});

/// `line 12`, `lines 10-20`, `foo.rs:42`, `L42`, `#L42`.
static LINE_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\blines?\s+\d+|\w:\d+\b|\bL\d+\b").expect("line reference regex is valid")
});

/// Words that mark a task as creating something rather than changing it.
static CREATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:create[sd]?|creating|new file|add new|scaffold(?:s|ed|ing)?)\b")
        .expect("creation regex is valid")
});

/// Acceptance phrasing that cannot be checked by anyone.
static VAGUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:works?|working|correctly|properly|as expected|looks? (?:good|right|fine)|should work|is done|is complete|no (?:bugs|issues))\b",
    )
    .expect("vague acceptance regex is valid")
});

/// Something a verifier can run or observe.
static MEASURABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)`[^`]+`|\b(?:pytest|cargo|npm|npx|yarn|pnpm|go (?:test|build|vet)|make|python3?|node|deno|bun|ruff|mypy|eslint|jest|vitest|tsc|curl|grep|diff|bash|sh)\b|\b(?:exit (?:code|status)|returns?|outputs?|prints?|responds? with|passes|pass|fails?|compiles?|http \d{3})\b",
    )
    .expect("measurable acceptance regex is valid")
});

fn chars(text: &str) -> usize {
    text.trim().chars().count()
}

fn task<'c>(content: &'c Content<'_>) -> Option<&'c TaskContent<'c>> {
    match content {
        Content::Task(t) => Some(t),
        Content::Issue(_) => None,
    }
}

fn description<'c>(content: &'c Content<'_>) -> Option<&'c str> {
    match content {
        Content::Issue(i) => Some(i.description),
        Content::Task(_) => None,
    }
}

fn one(field: &str, code: ViolationCode, message: String) -> Vec<Violation> {
    vec![Violation::new(field, code, message)]
}

/// Whether a task creates something new, judged from its name and notes.
#[must_use]
pub fn is_creation_task(name: &str, notes: &str) -> bool {
    CREATION.is_match(name) || CREATION.is_match(notes)
}

/// Whether `text` points at a file.
#[must_use]
pub fn has_file_reference(text: &str) -> bool {
    FILE_REFERENCE.is_match(text)
}

/// Whether `text` points at a line or line range.
#[must_use]
pub fn has_line_reference(text: &str) -> bool {
    LINE_REFERENCE.is_match(text)
}

/// Task name of at least `min_name_len` characters.
#[derive(Debug, Clone, Copy)]
pub struct NameLength;

impl Rule for NameLength {
    fn name(&self) -> &'static str {
        "name-length"
    }

    fn check(&self, content: &Content<'_>, opts: &ValidationOptions) -> Vec<Violation> {
        match task(content) {
            Some(t) if opts.strict && chars(t.name) < opts.min_name_len => one(
                "name",
                ViolationCode::NameTooShort,
                format!("name must be at least {} characters", opts.min_name_len),
            ),
            _ => vec![],
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct NotesPresent;

impl Rule for NotesPresent {
    fn name(&self) -> &'static str {
        "notes-present"
    }

    fn check(&self, content: &Content<'_>, _opts: &ValidationOptions) -> Vec<Violation> {
        match task(content) {
            Some(t) if t.notes.trim().is_empty() => one(
                "notes",
                ViolationCode::NotesMissing,
                "notes are required: say where to look and what to change".to_string(),
            ),
            _ => vec![],
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct NotesLength;

impl Rule for NotesLength {
    fn name(&self) -> &'static str {
        "notes-length"
    }

    fn check(&self, content: &Content<'_>, opts: &ValidationOptions) -> Vec<Violation> {
        match task(content) {
            Some(t) if opts.strict && !t.notes.trim().is_empty() => {
                let len = chars(t.notes);
                if len < opts.min_notes_len {
                    one(
                        "notes",
                        ViolationCode::NotesTooShort,
                        format!(
                            "notes are {len} characters; at least {} are needed to locate the work",
                            opts.min_notes_len
                        ),
                    )
                } else {
                    vec![]
                }
            }
            _ => vec![],
        }
    }
}

/// Notes must name a file or line.
#[derive(Debug, Clone, Copy)]
pub struct NotesReference;

impl Rule for NotesReference {
    fn name(&self) -> &'static str {
        "notes-reference"
    }

    fn check(&self, content: &Content<'_>, opts: &ValidationOptions) -> Vec<Violation> {
        match task(content) {
            Some(t)
                if opts.strict
                    && !t.notes.trim().is_empty()
                    && !has_file_reference(t.notes)
                    && !has_line_reference(t.notes) =>
            {
                one(
                    "notes",
                    ViolationCode::NotesNoReference,
                    "notes should reference a file path such as src/foo.py".to_string(),
                )
            }
            _ => vec![],
        }
    }
}

/// Notes for a change to existing code must point at lines.
#[derive(Debug, Clone, Copy)]
pub struct NotesLineNumber;

impl Rule for NotesLineNumber {
    fn name(&self) -> &'static str {
        "notes-line-number"
    }

    fn check(&self, content: &Content<'_>, opts: &ValidationOptions) -> Vec<Violation> {
        match task(content) {
            Some(t)
                if opts.strict
                    && !t.notes.trim().is_empty()
                    && !is_creation_task(t.name, t.notes)
                    && !has_line_reference(t.notes) =>
            {
                one(
                    "notes",
                    ViolationCode::NotesNoLineNumber,
                    "notes for a modification should give line numbers, e.g. \"lines 10-20\""
                        .to_string(),
                )
            }
            _ => vec![],
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AcceptPresent;

impl Rule for AcceptPresent {
    fn name(&self) -> &'static str {
        "accept-present"
    }

    fn check(&self, content: &Content<'_>, _opts: &ValidationOptions) -> Vec<Violation> {
        match task(content) {
            Some(t) if t.accept.trim().is_empty() => one(
                "accept",
                ViolationCode::AcceptMissing,
                "acceptance criteria are required".to_string(),
            ),
            _ => vec![],
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AcceptLength;

impl Rule for AcceptLength {
    fn name(&self) -> &'static str {
        "accept-length"
    }

    fn check(&self, content: &Content<'_>, opts: &ValidationOptions) -> Vec<Violation> {
        match task(content) {
            Some(t)
                if opts.strict
                    && !t.accept.trim().is_empty()
                    && chars(t.accept) < opts.min_accept_len =>
            {
                one(
                    "accept",
                    ViolationCode::AcceptTooShort,
                    format!(
                        "acceptance criteria must be at least {} characters",
                        opts.min_accept_len
                    ),
                )
            }
            _ => vec![],
        }
    }
}

/// "It works" with nothing to run.
#[derive(Debug, Clone, Copy)]
pub struct AcceptVague;

impl Rule for AcceptVague {
    fn name(&self) -> &'static str {
        "accept-vague"
    }

    fn check(&self, content: &Content<'_>, opts: &ValidationOptions) -> Vec<Violation> {
        match task(content) {
            Some(t)
                if opts.strict
                    && !t.accept.trim().is_empty()
                    && VAGUE.is_match(t.accept)
                    && !MEASURABLE.is_match(t.accept) =>
            {
                one(
                    "accept",
                    ViolationCode::AcceptVague,
                    "acceptance criteria are vague; name a command and its expected result"
                        .to_string(),
                )
            }
            _ => vec![],
        }
    }
}

/// Acceptance must name a command or an observable outcome.
///
/// Vague phrasing is left to [`AcceptVague`] so the two never fire together.
#[derive(Debug, Clone, Copy)]
pub struct AcceptMeasurable;

impl Rule for AcceptMeasurable {
    fn name(&self) -> &'static str {
        "accept-measurable"
    }

    fn check(&self, content: &Content<'_>, opts: &ValidationOptions) -> Vec<Violation> {
        match task(content) {
            Some(t)
                if opts.strict
                    && !t.accept.trim().is_empty()
                    && !VAGUE.is_match(t.accept)
                    && !MEASURABLE.is_match(t.accept) =>
            {
                one(
                    "accept",
                    ViolationCode::AcceptNotMeasurable,
                    "acceptance criteria should name a command to run, e.g. `cargo test parser`"
                        .to_string(),
                )
            }
            _ => vec![],
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DescriptionPresent;

impl Rule for DescriptionPresent {
    fn name(&self) -> &'static str {
        "description-present"
    }

    fn check(&self, content: &Content<'_>, _opts: &ValidationOptions) -> Vec<Violation> {
        match description(content) {
            Some(desc) if desc.trim().is_empty() => one(
                "description",
                ViolationCode::DescriptionMissing,
                "issue description is required".to_string(),
            ),
            _ => vec![],
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DescriptionLength;

impl Rule for DescriptionLength {
    fn name(&self) -> &'static str {
        "description-length"
    }

    fn check(&self, content: &Content<'_>, opts: &ValidationOptions) -> Vec<Violation> {
        match description(content) {
            Some(desc)
                if opts.strict
                    && !desc.trim().is_empty()
                    && chars(desc) < opts.min_description_len =>
            {
                one(
                    "description",
                    ViolationCode::DescriptionTooShort,
                    format!(
                        "issue description must be at least {} characters",
                        opts.min_description_len
                    ),
                )
            }
            _ => vec![],
        }
    }
}
