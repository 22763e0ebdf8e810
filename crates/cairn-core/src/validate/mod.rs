//! Content validation for proposed tasks and issues.
//!
//! Validation runs before anything is encoded: a proposal that fails never
//! becomes an event. Each check is a [`Rule`]; a [`RuleSet`] runs every rule
//! and collects all violations, so the caller sees every problem at once
//! instead of fixing them one resubmission at a time.
//!
//! Codes are stable `SCREAMING_SNAKE` strings that agents match on.

pub mod rules;

use serde::{Serialize, Serializer};
use std::fmt;

use crate::config::ValidationConfig;

/// Thresholds and strictness for one validation run.
pub type ValidationOptions = ValidationConfig;

/// Stable machine-readable violation codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViolationCode {
    NameTooShort,
    NotesMissing,
    NotesTooShort,
    NotesNoReference,
    NotesNoLineNumber,
    AcceptMissing,
    AcceptTooShort,
    AcceptVague,
    AcceptNotMeasurable,
    DescriptionMissing,
    DescriptionTooShort,
}

impl ViolationCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NameTooShort => "NAME_TOO_SHORT",
            Self::NotesMissing => "NOTES_MISSING",
            Self::NotesTooShort => "NOTES_TOO_SHORT",
            Self::NotesNoReference => "NOTES_NO_REFERENCE",
            Self::NotesNoLineNumber => "NOTES_NO_LINE_NUMBER",
            Self::AcceptMissing => "ACCEPT_MISSING",
            Self::AcceptTooShort => "ACCEPT_TOO_SHORT",
            Self::AcceptVague => "ACCEPT_VAGUE",
            Self::AcceptNotMeasurable => "ACCEPT_NOT_MEASURABLE",
            Self::DescriptionMissing => "DESCRIPTION_MISSING",
            Self::DescriptionTooShort => "DESCRIPTION_TOO_SHORT",
        }
    }

    /// Whether the rule behind this code still applies with `strict = false`.
    #[must_use]
    pub const fn survives_relaxed(self) -> bool {
        matches!(
            self,
            Self::NotesMissing | Self::AcceptMissing | Self::DescriptionMissing
        )
    }
}

impl fmt::Display for ViolationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ViolationCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// One failed check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub field: String,
    pub code: ViolationCode,
    pub message: String,
}

impl Violation {
    pub fn new(field: impl Into<String>, code: ViolationCode, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.code, self.field, self.message)
    }
}

/// The text fields of a proposed task.
#[derive(Debug, Clone, Copy)]
pub struct TaskContent<'a> {
    pub name: &'a str,
    pub notes: &'a str,
    pub accept: &'a str,
}

/// The text fields of a proposed issue.
#[derive(Debug, Clone, Copy)]
pub struct IssueContent<'a> {
    pub description: &'a str,
}

/// Anything a rule can inspect.
#[derive(Debug, Clone, Copy)]
pub enum Content<'a> {
    Task(TaskContent<'a>),
    Issue(IssueContent<'a>),
}

/// A single validation check.
///
/// Rules that do not apply to the given content kind return no violations.
pub trait Rule: Send + Sync {
    /// Short identifier used in debug logs.
    fn name(&self) -> &'static str;

    fn check(&self, content: &Content<'_>, opts: &ValidationOptions) -> Vec<Violation>;
}

/// An ordered collection of rules.
pub struct RuleSet {
    rules: Vec<Box<dyn Rule>>,
}

impl fmt::Debug for RuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.rules.iter().map(|r| r.name()))
            .finish()
    }
}

impl RuleSet {
    #[must_use]
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// The default checks for task proposals.
    #[must_use]
    pub fn task_defaults() -> Self {
        Self::empty()
            .with(rules::NameLength)
            .with(rules::NotesPresent)
            .with(rules::NotesLength)
            .with(rules::NotesReference)
            .with(rules::NotesLineNumber)
            .with(rules::AcceptPresent)
            .with(rules::AcceptLength)
            .with(rules::AcceptVague)
            .with(rules::AcceptMeasurable)
    }

    /// The default checks for issue proposals.
    #[must_use]
    pub fn issue_defaults() -> Self {
        Self::empty()
            .with(rules::DescriptionPresent)
            .with(rules::DescriptionLength)
    }

    #[must_use]
    pub fn with(mut self, rule: impl Rule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Run every rule and collect all violations in rule order.
    #[must_use]
    pub fn check(&self, content: &Content<'_>, opts: &ValidationOptions) -> Vec<Violation> {
        let mut violations = Vec::new();
        for rule in &self.rules {
            let found = rule.check(content, opts);
            if !found.is_empty() {
                tracing::debug!(rule = rule.name(), count = found.len(), "validation rule failed");
            }
            violations.extend(found);
        }
        violations
    }
}

/// Validate a task proposal with the default rules.
#[must_use]
pub fn check_task(content: TaskContent<'_>, opts: &ValidationOptions) -> Vec<Violation> {
    RuleSet::task_defaults().check(&Content::Task(content), opts)
}

/// Validate an issue proposal with the default rules.
#[must_use]
pub fn check_issue(content: IssueContent<'_>, opts: &ValidationOptions) -> Vec<Violation> {
    RuleSet::issue_defaults().check(&Content::Issue(content), opts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes(violations: &[Violation]) -> Vec<ViolationCode> {
        violations.iter().map(|v| v.code).collect()
    }

    #[test]
    fn short_notes_are_flagged() {
        let found = check_task(
            TaskContent {
                name: "Fix loop bound",
                notes: "fix bug",
                accept: "pytest tests/test_foo.py passes",
            },
            &ValidationOptions::default(),
        );
        assert!(codes(&found).contains(&ViolationCode::NotesTooShort));
        assert!(found.iter().all(|v| v.field == "notes"));
    }

    #[test]
    fn well_specified_task_is_clean() {
        let found = check_task(
            TaskContent {
                name: "Fix loop bound",
                notes: "see src/foo.py lines 10-20, change the loop bound",
                accept: "pytest tests/test_foo.py passes",
            },
            &ValidationOptions::default(),
        );
        assert!(found.is_empty(), "unexpected violations: {found:?}");
    }

    #[test]
    fn every_violation_is_reported_at_once() {
        let found = check_task(
            TaskContent {
                name: "Fix",
                notes: "",
                accept: "",
            },
            &ValidationOptions::default(),
        );
        assert_eq!(
            codes(&found),
            vec![
                ViolationCode::NameTooShort,
                ViolationCode::NotesMissing,
                ViolationCode::AcceptMissing,
            ]
        );
    }

    #[test]
    fn relaxed_mode_keeps_only_presence_checks() {
        let opts = ValidationOptions {
            strict: false,
            ..ValidationOptions::default()
        };
        let vague = check_task(
            TaskContent {
                name: "Fix",
                notes: "tidy",
                accept: "works",
            },
            &opts,
        );
        assert!(vague.is_empty(), "unexpected violations: {vague:?}");

        let empty = check_task(
            TaskContent {
                name: "Fix",
                notes: "",
                accept: "",
            },
            &opts,
        );
        assert!(codes(&empty).iter().all(|c| c.survives_relaxed()));
        assert_eq!(empty.len(), 2);
    }

    #[test]
    fn issue_descriptions_are_checked() {
        let opts = ValidationOptions::default();
        let missing = check_issue(IssueContent { description: "  " }, &opts);
        assert_eq!(codes(&missing), vec![ViolationCode::DescriptionMissing]);

        let short = check_issue(IssueContent { description: "flaky" }, &opts);
        assert_eq!(codes(&short), vec![ViolationCode::DescriptionTooShort]);

        let fine = check_issue(
            IssueContent {
                description: "cargo test fails on main after the parser change",
            },
            &opts,
        );
        assert!(fine.is_empty());
    }

    #[test]
    fn task_rules_ignore_issue_content() {
        let found = RuleSet::task_defaults().check(
            &Content::Issue(IssueContent { description: "" }),
            &ValidationOptions::default(),
        );
        assert!(found.is_empty());
    }

    #[test]
    fn codes_render_screaming_snake() {
        assert_eq!(ViolationCode::AcceptNotMeasurable.to_string(), "ACCEPT_NOT_MEASURABLE");
        let json = serde_json::to_string(&Violation::new(
            "accept",
            ViolationCode::AcceptVague,
            "say how to check it",
        ))
        .unwrap();
        assert!(json.contains("\"code\":\"ACCEPT_VAGUE\""));
    }

    #[test]
    fn custom_rules_can_be_added() {
        struct NoTodo;
        impl Rule for NoTodo {
            fn name(&self) -> &'static str {
                "no-todo"
            }
            fn check(&self, content: &Content<'_>, _opts: &ValidationOptions) -> Vec<Violation> {
                match content {
                    Content::Task(t) if t.notes.contains("TODO") => vec![Violation::new(
                        "notes",
                        ViolationCode::NotesNoReference,
                        "notes still contain TODO",
                    )],
                    _ => vec![],
                }
            }
        }

        let set = RuleSet::empty().with(NoTodo);
        assert_eq!(set.len(), 1);
        let found = set.check(
            &Content::Task(TaskContent {
                name: "Write docs",
                notes: "TODO",
                accept: "x",
            }),
            &ValidationOptions::default(),
        );
        assert_eq!(found.len(), 1);
    }
}
