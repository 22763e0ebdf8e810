use anyhow::{Context as _, Result};
use cairn_core::{CAIRN_DIR, Ledger, load_config};
use clap::Args;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

use crate::output::{OutputMode, render};

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Select the active spec file right away.
    #[arg(long)]
    pub spec: Option<String>,
}

const CONFIG_TOML: &str = "# cairn configuration. Values recorded with `cairn config set`\n\
    # override these for the ledger they are recorded in.\n\
    \n\
    lock_timeout_ms = 5000\n\
    durable = true\n\
    max_decompose_depth = 3\n\
    max_rejections = 3\n\
    \n\
    [validation]\n\
    strict = true\n\
    min_name_len = 5\n\
    min_notes_len = 40\n\
    min_accept_len = 10\n\
    min_description_len = 10\n";

#[derive(Debug, Serialize)]
struct InitReport {
    created: bool,
    ledger: String,
    config: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    spec: Option<String>,
}

/// Execute `cairn init`. Creates the project skeleton:
///
/// ```text
/// .cairn/
///   ledger.jsonl   (empty append-only log)
///   config.toml    (default configuration, only if absent)
/// ```
///
/// Running it again is harmless: nothing existing is rewritten.
pub fn run_init(args: &InitArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let config_path = project_root.join(CAIRN_DIR).join("config.toml");
    let (ledger, created) = Ledger::init(project_root, load_config(project_root)?)?;

    if !config_path.exists() {
        std::fs::write(&config_path, CONFIG_TOML)
            .with_context(|| format!("Failed to write config: {}", config_path.display()))?;
    }
    if let Some(spec) = &args.spec {
        ledger.set_spec(spec)?;
    }

    let report = InitReport {
        created,
        ledger: ledger.log().path().display().to_string(),
        config: config_path.display().to_string(),
        spec: args.spec.clone(),
    };
    render(output, &report, |r, w| {
        if r.created {
            writeln!(w, "✓ Initialized {}", r.ledger)?;
        } else {
            writeln!(w, "✓ Ledger already exists at {}", r.ledger)?;
        }
        writeln!(w, "  Config: {}", r.config)?;
        match &r.spec {
            Some(spec) => writeln!(w, "  Spec:   {spec}"),
            None => writeln!(w, "\nNext: select a spec with `cairn spec <file>`."),
        }
    })
}
