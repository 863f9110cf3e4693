//! Build script for flipdot-server
//!
//! Validates the embedded flipdot.toml at compile time so a broken default
//! configuration never reaches a binary.

use std::fs;
use std::path::Path;

const SECTIONS: [&str; 4] = ["display", "network", "serial", "pacing"];

const FRAMING: [(&str, &[&str]); 4] = [
    ("data_bits", &["seven", "eight"]),
    ("parity", &["none", "even", "odd"]),
    ("stop_bits", &["one", "two"]),
    ("flow_control", &["none", "software", "hardware"]),
];

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    validate_config();
}

/// Validate flipdot.toml
fn validate_config() {
    println!("cargo:rerun-if-changed=flipdot.toml");

    let config_path = Path::new("flipdot.toml");

    if !config_path.exists() {
        fail(
            "flipdot.toml not found!",
            &["The server embeds flipdot.toml as its default configuration.".to_string()],
        );
    }

    let config_content = match fs::read_to_string(config_path) {
        Ok(content) => content,
        Err(e) => fail("Failed to read flipdot.toml", &[e.to_string()]),
    };

    let config: toml::Value = match toml::from_str(&config_content) {
        Ok(value) => value,
        Err(e) => fail(
            "Invalid TOML syntax in flipdot.toml",
            &e.to_string().lines().map(str::to_string).collect::<Vec<_>>(),
        ),
    };

    let mut errors = Vec::new();
    validate_sections(&config, &mut errors);
    validate_display(&config, &mut errors);
    validate_network(&config, &mut errors);
    validate_serial(&config, &mut errors);

    if !errors.is_empty() {
        fail("Invalid configuration in flipdot.toml", &errors);
    }
}

/// Abort the build with a boxed error message
fn fail(title: &str, lines: &[String]) -> ! {
    let body = lines
        .iter()
        .map(|line| format!("║  • {:<62} ║", truncate(line, 62)))
        .collect::<Vec<_>>()
        .join("\n");

    panic!(
        "\n\
        ╔══════════════════════════════════════════════════════════════════╗\n\
        ║  ERROR: {:<56} ║\n\
        ╠══════════════════════════════════════════════════════════════════╣\n\
        {}\n\
        ╚══════════════════════════════════════════════════════════════════╝\n",
        title, body
    );
}

/// Shorten `line` to at most `width` characters, marking the cut with "..."
fn truncate(line: &str, width: usize) -> String {
    if line.chars().count() <= width {
        return line.to_string();
    }
    let mut out: String = line.chars().take(width.saturating_sub(3)).collect();
    out.push_str("...");
    out
}

/// Only known sections, each a table
fn validate_sections(config: &toml::Value, errors: &mut Vec<String>) {
    let Some(table) = config.as_table() else {
        errors.push("top level must be a table".to_string());
        return;
    };

    for (name, value) in table {
        if !SECTIONS.contains(&name.as_str()) {
            errors.push(format!("unknown section [{}]", name));
        } else if !value.is_table() {
            errors.push(format!("[{}] must be a table", name));
        }
    }
}

fn integer(config: &toml::Value, section: &str, key: &str) -> Option<i64> {
    config.get(section)?.get(key)?.as_integer()
}

fn validate_display(config: &toml::Value, errors: &mut Vec<String>) {
    if let Some(width) = integer(config, "display", "width") {
        if !(1..=128).contains(&width) {
            errors.push("[display] width must be 1-128".to_string());
        }
    }

    if let Some(height) = integer(config, "display", "height") {
        if !(1..=16).contains(&height) {
            errors.push("[display] height must be 1-16".to_string());
        }
    }

    if let Some(baseline) = config.get("display").and_then(|d| d.get("baseline")) {
        if !matches!(baseline.as_str(), Some("on") | Some("off")) {
            errors.push("[display] baseline must be 'on' or 'off'".to_string());
        }
    }
}

fn validate_network(config: &toml::Value, errors: &mut Vec<String>) {
    if let Some(port) = integer(config, "network", "port") {
        if !(0..=65535).contains(&port) {
            errors.push("[network] port must be 0-65535".to_string());
        }
    }

    if let Some(bind) = config.get("network").and_then(|n| n.get("bind")) {
        let valid = bind
            .as_str()
            .map(|addr| addr.parse::<std::net::IpAddr>().is_ok())
            .unwrap_or(false);
        if !valid {
            errors.push("[network] bind must be an IP address".to_string());
        }
    }

    if let Some(timeout) = integer(config, "network", "recv_timeout_ms") {
        if timeout <= 0 {
            errors.push("[network] recv_timeout_ms must be positive".to_string());
        }
    }
}

fn validate_serial(config: &toml::Value, errors: &mut Vec<String>) {
    let enabled = config
        .get("serial")
        .and_then(|s| s.get("enabled"))
        .and_then(toml::Value::as_bool)
        .unwrap_or(true);
    if !enabled {
        return;
    }

    if let Some(baud) = integer(config, "serial", "baud_rate") {
        if baud <= 0 || baud > i64::from(u32::MAX) {
            errors.push("[serial] baud_rate must be positive".to_string());
        }
    }

    if let Some(device) = config.get("serial").and_then(|s| s.get("device")) {
        if device.as_str().map(str::trim).unwrap_or("").is_empty() {
            errors.push("[serial] device must be a non-empty path".to_string());
        }
    }

    for (key, allowed) in FRAMING {
        let Some(value) = config.get("serial").and_then(|s| s.get(key)) else {
            continue;
        };
        if !value.as_str().is_some_and(|v| allowed.contains(&v)) {
            errors.push(format!("[serial] {} must be one of {}", key, allowed.join("/")));
        }
    }
}
