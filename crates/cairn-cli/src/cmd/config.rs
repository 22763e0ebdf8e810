use anyhow::Result;
use clap::Args;
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use super::open_ledger;
use crate::output::{OutputMode, render, render_success};

#[derive(Args, Debug)]
pub struct SetArgs {
    /// Key, bare (`max_rejections`) or sectioned (`validation.strict`).
    pub key: String,
    /// Value; parsed as JSON when possible, otherwise kept as a string.
    pub value: String,
}

/// Parse a command-line value the way a person would type it.
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

pub fn run_set(args: &SetArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let ledger = open_ledger(project_root)?;
    let value = parse_value(&args.value);
    let mut values = BTreeMap::new();
    values.insert(args.key.clone(), value.clone());
    ledger.set_config(values)?;
    render_success(output, &format!("{} = {value}", args.key))
}

/// Print file configuration with the ledger's overrides applied.
pub fn run_show(output: OutputMode, project_root: &Path) -> Result<()> {
    let ledger = open_ledger(project_root)?;
    let state = ledger.state()?;
    let effective = ledger.effective_config(&state);
    let rendered = toml::to_string_pretty(&effective)?;
    render(output, &effective, |_, w| {
        write!(w, "{rendered}")?;
        if !state.config.is_empty() {
            writeln!(w, "\n# ledger overrides")?;
            for (key, value) in &state.config {
                writeln!(w, "# {key} = {value}")?;
            }
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_parse_as_json_first() {
        assert_eq!(parse_value("5"), Value::from(5));
        assert_eq!(parse_value("false"), Value::Bool(false));
        assert_eq!(parse_value("fast"), Value::String("fast".into()));
        assert_eq!(parse_value("\"5\""), Value::String("5".into()));
    }
}
