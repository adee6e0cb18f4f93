//! `validate`: have a rack's daemon check a snippet or the current config.

use rackdhcp_core::{DhcpConfigError, DhcpSnippet};
use tabled::Tabled;

use crate::cli::{GlobalOpts, ValidateArgs};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct ErrorRow {
    #[tabled(rename = "Line")]
    line_num: String,
    #[tabled(rename = "Error")]
    error: String,
    #[tabled(rename = "Source")]
    line: String,
}

impl From<&DhcpConfigError> for ErrorRow {
    fn from(e: &DhcpConfigError) -> Self {
        let mut line = e.line.clone().unwrap_or_default();
        if let Some(ref pos) = e.position {
            line.push('\n');
            line.push_str(pos);
        }
        Self {
            line_num: e.line_num.map(|n| n.to_string()).unwrap_or_default(),
            error: e.error.clone(),
            line,
        }
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: ValidateArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let store = util::load_store(global)?;
    let cfg = util::load_config()?;
    let settings = util::engine_settings(&cfg, global)?;
    let snap = store.snapshot();

    let errors = match (args.snippet, args.rack) {
        (Some(path), _) => {
            let snippet: DhcpSnippet = util::read_document(&path)?;
            let pool = util::connect_racks(&cfg, &snap, global, None).await?;
            let engine = util::engine(store, pool, settings);
            engine.validate_dhcp_config(snippet).await?
        }
        (None, Some(ident)) => {
            let rack = util::resolve_rack(&snap, &ident)?;
            let pool = util::connect_racks(&cfg, &snap, global, Some(rack.id)).await?;
            let engine = util::engine(store, pool, settings);
            engine.validate_configuration(rack.id).await?
        }
        (None, None) => {
            return Err(CliError::Validation {
                field: "validate".into(),
                reason: "pass --snippet <FILE> or --rack <RACK>".into(),
            });
        }
    };

    if errors.is_empty() {
        if !global.quiet {
            eprintln!("Configuration is valid");
        }
        return Ok(());
    }

    let out = output::render_list(
        &global.output,
        &errors,
        ErrorRow::from,
        |e| e.error.clone(),
    )?;
    output::print_output(&out, global.quiet);
    Err(CliError::ConfigRejected {
        count: errors.len(),
    })
}
