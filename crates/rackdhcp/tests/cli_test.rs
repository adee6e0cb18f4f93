//! Integration tests for the `rackdhcp` CLI binary.
//!
//! These run against an inventory file and never contact a rack.
#![allow(clippy::unwrap_used)]

use std::io::Write;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `rackdhcp` binary with env isolation.
///
/// Clears `RACKDHCP_*` env vars and points config directories at a
/// nonexistent path so tests never touch the user's real configuration.
fn rackdhcp_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("rackdhcp");
    cmd.env("HOME", "/tmp/rackdhcp-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/rackdhcp-cli-test-nonexistent")
        .env_remove("RACKDHCP_INVENTORY")
        .env_remove("RACKDHCP_OUTPUT")
        .env_remove("RACKDHCP_TIMEOUT")
        .env_remove("RUST_LOG");
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

const INVENTORY: &str = r"
nodes:
  - { id: 1, hostname: rack-1, node_type: rack_controller }
  - { id: 2, hostname: rack-2, node_type: rack_controller }
  - { id: 3, hostname: node-1, boot_interface_id: 42 }
vlans:
  - { id: 10, name: lab, fabric_id: 1, dhcp_on: true, primary_rack: 1, secondary_rack: 2 }
subnets:
  - { id: 20, cidr: 10.0.0.0/24, gateway_ip: 10.0.0.1, vlan_id: 10 }
ip_ranges:
  - { id: 30, subnet_id: 20, start_ip: 10.0.0.100, end_ip: 10.0.0.200, type: dynamic }
interfaces:
  - { id: 40, name: eth0, mac: '52:54:00:00:00:01', vlan_id: 10, node_id: 1 }
  - { id: 41, name: eth0, mac: '52:54:00:00:00:02', vlan_id: 10, node_id: 2 }
  - { id: 42, name: eth0, mac: '52:54:00:00:00:03', vlan_id: 10, node_id: 3 }
addresses:
  - { id: 50, ip: 10.0.0.2, alloc_type: sticky, subnet_id: 20, interface_id: 40 }
  - { id: 51, ip: 10.0.0.3, alloc_type: sticky, subnet_id: 20, interface_id: 41 }
  - { id: 52, ip: 10.0.0.50, alloc_type: sticky, subnet_id: 20, interface_id: 42 }
";

fn inventory_file() -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    file.write_all(INVENTORY.as_bytes()).unwrap();
    file
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = rackdhcp_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    rackdhcp_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("render")
            .and(predicate::str::contains("apply"))
            .and(predicate::str::contains("validate"))
            .and(predicate::str::contains("ipset")),
    );
}

#[test]
fn test_version_flag() {
    rackdhcp_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("rackdhcp"));
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    rackdhcp_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_completions_invalid_shell() {
    rackdhcp_cmd()
        .args(["completions", "tcsh"])
        .assert()
        .failure()
        .code(2);
}

// ── Ipset ───────────────────────────────────────────────────────────

#[test]
fn test_ipset_unused_json() {
    let output = rackdhcp_cmd()
        .args([
            "ipset",
            "unused",
            "--bound",
            "10.0.0.1-10.0.0.10",
            "10.0.0.3-10.0.0.5",
            "-o",
            "json-compact",
        ])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));

    let ranges: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let ranges = ranges.as_array().unwrap();
    assert_eq!(ranges.len(), 2);
    assert_eq!(ranges[0]["start"], "10.0.0.1");
    assert_eq!(ranges[0]["end"], "10.0.0.2");
    assert_eq!(ranges[1]["start"], "10.0.0.6");
    assert_eq!(ranges[1]["num_addresses"], 5);
    assert_eq!(ranges[1]["purpose"][0], "unused");
}

#[test]
fn test_ipset_full_plain() {
    rackdhcp_cmd()
        .args([
            "ipset",
            "full",
            "-b",
            "10.0.0.1-10.0.0.10",
            "10.0.0.3-10.0.0.5@dynamic",
            "-o",
            "plain",
        ])
        .assert()
        .success()
        .stdout("10.0.0.1-10.0.0.2\n10.0.0.3-10.0.0.5\n10.0.0.6-10.0.0.10\n");
}

#[test]
fn test_ipset_stats_json() {
    let output = rackdhcp_cmd()
        .args([
            "ipset",
            "stats",
            "--bound",
            "10.0.0.1-10.0.0.10",
            "10.0.0.1-10.0.0.5",
            "-o",
            "json",
        ])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));

    let stats: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(stats["total_addresses"], 10);
    assert_eq!(stats["num_available"], 5);
    assert_eq!(stats["usage_string"], "50%");
    assert!(stats.get("ranges").is_none());
}

#[test]
fn test_ipset_rejects_bad_address() {
    let output = rackdhcp_cmd()
        .args(["ipset", "unused", "--bound", "10.0.0.0/24", "10.0.0.300"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let text = combined_output(&output);
    assert!(text.contains("10.0.0.300"), "Expected bad input echoed:\n{text}");
}

#[test]
fn test_ipset_rejects_mixed_families() {
    rackdhcp_cmd()
        .args(["ipset", "unused", "--bound", "10.0.0.0/24", "2001:db8::1"])
        .assert()
        .failure();
}

// ── Render ──────────────────────────────────────────────────────────

#[test]
fn test_render_json() {
    let inventory = inventory_file();
    let output = rackdhcp_cmd()
        .arg("--inventory")
        .arg(inventory.path())
        .args(["render", "--rack", "rack-1", "-o", "json"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));

    let text = String::from_utf8_lossy(&output.stdout);
    assert!(text.contains("10.0.0.0/24"), "missing subnet:\n{text}");
    assert!(text.contains("node-1-eth0"), "missing host:\n{text}");
}

#[test]
fn test_render_table_by_id() {
    let inventory = inventory_file();
    rackdhcp_cmd()
        .arg("-i")
        .arg(inventory.path())
        .args(["render", "--rack", "1", "--color", "never"])
        .assert()
        .success()
        .stdout(predicate::str::contains("10.0.0.0/24"));
}

#[test]
fn test_render_without_inventory() {
    let output = rackdhcp_cmd()
        .args(["render", "--rack", "rack-1"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    let text = combined_output(&output);
    assert!(text.contains("inventory"), "Expected hint:\n{text}");
}

#[test]
fn test_render_unknown_rack() {
    let inventory = inventory_file();
    rackdhcp_cmd()
        .arg("-i")
        .arg(inventory.path())
        .args(["render", "--rack", "nope"])
        .assert()
        .failure()
        .code(4);
}

#[test]
fn test_render_machine_is_not_a_rack() {
    let inventory = inventory_file();
    rackdhcp_cmd()
        .arg("-i")
        .arg(inventory.path())
        .args(["render", "--rack", "node-1"])
        .assert()
        .failure()
        .code(4);
}

// ── Topology ────────────────────────────────────────────────────────

#[test]
fn test_topology_vlans() {
    let inventory = inventory_file();
    let output = rackdhcp_cmd()
        .arg("-i")
        .arg(inventory.path())
        .args(["topology", "vlans", "--rack", "rack-2", "-o", "json"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));

    let vlans: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(vlans[0]["id"], 10);
    assert_eq!(vlans[0]["role"], "secondary");
    assert_eq!(vlans[0]["subnets"][0], "10.0.0.0/24");
}

#[test]
fn test_topology_interfaces_plain() {
    let inventory = inventory_file();
    rackdhcp_cmd()
        .arg("-i")
        .arg(inventory.path())
        .args([
            "topology", "interfaces", "--rack", "rack-1", "--vlan", "10", "-o", "plain",
        ])
        .assert()
        .success()
        .stdout("eth0\n");
}

#[test]
fn test_topology_unknown_vlan() {
    let inventory = inventory_file();
    rackdhcp_cmd()
        .arg("-i")
        .arg(inventory.path())
        .args(["topology", "interfaces", "--rack", "rack-1", "--vlan", "99"])
        .assert()
        .failure()
        .code(4);
}

// ── Apply / Validate ────────────────────────────────────────────────

#[test]
fn test_apply_unconfigured_rack() {
    let inventory = inventory_file();
    let output = rackdhcp_cmd()
        .arg("-i")
        .arg(inventory.path())
        .args(["apply", "--rack", "rack-1", "--yes"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    let text = combined_output(&output);
    assert!(text.contains("[racks.rack-1]"), "Expected hint:\n{text}");
}

#[test]
fn test_validate_needs_a_target() {
    let inventory = inventory_file();
    rackdhcp_cmd()
        .arg("-i")
        .arg(inventory.path())
        .arg("validate")
        .assert()
        .failure()
        .code(2);
}

#[test]
fn test_validate_snippet_and_rack_conflict() {
    rackdhcp_cmd()
        .args(["validate", "--snippet", "s.yaml", "--rack", "rack-1"])
        .assert()
        .failure()
        .code(2);
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_path() {
    rackdhcp_cmd()
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_config_show_defaults() {
    rackdhcp_cmd()
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[dhcp]").and(predicate::str::contains("timeout = 30")));
}
