//! Config subcommand handlers.

use dialoguer::Password;
use rackdhcp_config::{self as config, Config, KEYRING_SERVICE};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Helpers ─────────────────────────────────────────────────────────

const MASK: &str = "****";

/// Replace plaintext tokens so the config can be shown or serialized.
fn redact(mut cfg: Config) -> Config {
    for rack in cfg.racks.values_mut() {
        if rack.token.is_some() {
            rack.token = Some(MASK.into());
        }
    }
    cfg
}

/// TOML-like view of the config for table output.
fn format_config(cfg: &Config) -> String {
    use std::fmt::Write;
    let mut out = String::new();

    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", cfg.defaults.output);
    let _ = writeln!(out, "color = \"{}\"", cfg.defaults.color);
    let _ = writeln!(out, "insecure = {}", cfg.defaults.insecure);
    let _ = writeln!(out, "timeout = {}", cfg.defaults.timeout);

    let d = &cfg.dhcp;
    let _ = writeln!(out);
    let _ = writeln!(out, "[dhcp]");
    let _ = writeln!(out, "default_domain = \"{}\"", d.default_domain);
    let _ = writeln!(out, "ntp_servers = {:?}", d.ntp_servers);
    let _ = writeln!(out, "ntp_external_only = {}", d.ntp_external_only);
    let _ = writeln!(out, "search_domains = {:?}", d.search_domains);
    let region_dns: Vec<String> = d.region_dns.iter().map(ToString::to_string).collect();
    let _ = writeln!(out, "region_dns = {region_dns:?}");
    let _ = writeln!(out, "use_rack_proxy = {}", d.use_rack_proxy);

    for (name, rack) in &cfg.racks {
        let _ = writeln!(out);
        let _ = writeln!(out, "[racks.{name}]");
        let _ = writeln!(out, "url = \"{}\"", rack.url);
        if let Some(ref token) = rack.token {
            let _ = writeln!(out, "token = \"{token}\"");
        }
        if let Some(ref env) = rack.token_env {
            let _ = writeln!(out, "token_env = \"{env}\"");
        }
        if let Some(ref ca) = rack.ca_cert {
            let _ = writeln!(out, "ca_cert = \"{}\"", ca.display());
        }
        if let Some(insecure) = rack.insecure {
            let _ = writeln!(out, "insecure = {insecure}");
        }
        if let Some(timeout) = rack.timeout {
            let _ = writeln!(out, "timeout = {timeout}");
        }
    }

    out.trim_end().to_owned()
}

fn keyring_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "keyring".into(),
        reason: format!("failed to access keyring: {e}"),
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Show => {
            let cfg = redact(util::load_config()?);
            let out = output::render_single(&global.output, &cfg, format_config, |c| {
                c.racks.keys().cloned().collect::<Vec<_>>().join("\n")
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            println!("{}", config::config_path().display());
            Ok(())
        }

        ConfigCommand::Init => {
            let path = config::config_path();
            if path.exists()
                && !util::confirm(
                    &format!("Overwrite existing config at {}?", path.display()),
                    global.yes,
                )?
            {
                return Ok(());
            }
            let written = config::save_config(&Config::default())?;
            if !global.quiet {
                eprintln!("Configuration written to {}", written.display());
                eprintln!("Add a [racks.<hostname>] section with the rack's url to begin.");
            }
            Ok(())
        }

        ConfigCommand::SetToken { rack } => {
            let token = Password::new()
                .with_prompt(format!("Token for {rack}"))
                .interact()
                .map_err(|e| CliError::Io(std::io::Error::other(e)))?;
            if token.is_empty() {
                return Err(CliError::Validation {
                    field: "token".into(),
                    reason: "token cannot be empty".into(),
                });
            }
            keyring::Entry::new(KEYRING_SERVICE, &format!("{rack}/token"))
                .map_err(keyring_err)?
                .set_password(&token)
                .map_err(keyring_err)?;
            if !global.quiet {
                eprintln!("Token for '{rack}' stored in system keyring");
            }
            Ok(())
        }
    }
}
