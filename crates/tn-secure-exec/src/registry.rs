//! The static command allowlist table (spec §4.1, §6; design note §9:
//! "Replace dynamic dispatch... by a static allowlist table keyed by
//! command name with per-command validator function pointers").

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::Duration;

/// A command-specific validator run over the *whole* argument vector, after
/// per-token classification has passed. Returns `Err(reason)` on failure.
pub type ArgsValidator = fn(&[String]) -> Result<(), String>;

pub struct CommandSpec {
    pub name: &'static str,
    pub allowed_flags: &'static [&'static str],
    pub patterns: Vec<Regex>,
    pub max_args: usize,
    pub max_wall_clock: Duration,
    pub validator: Option<ArgsValidator>,
    pub allow_empty_tokens: bool,
}

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static pattern must compile")
}

/// Loose IPv4/IPv6 shape. Dangerous shell metacharacters are already
/// rejected before pattern matching runs, so this only needs to bound the
/// character set and rough structure.
fn ip_pattern() -> Regex {
    re(r"^[0-9a-fA-F:.]+(/[0-9]{1,3})?$")
}

fn iface_pattern() -> Regex {
    re(r"^[A-Za-z][A-Za-z0-9._-]{0,63}$")
}

fn integer_pattern() -> Regex {
    re(r"^[0-9]+$")
}

fn rate_pattern() -> Regex {
    re(r"^[0-9]+(\.[0-9]+)?(kbit|mbit|gbit|kbps|mbps|gbps)$")
}

fn size_pattern() -> Regex {
    re(r"^[0-9]+(k|kb|m|mb)?$")
}

fn time_pattern() -> Regex {
    re(r"^[0-9]+(\.[0-9]+)?(ms|s)?$")
}

fn percent_pattern() -> Regex {
    re(r"^[0-9]+(\.[0-9]+)?%?$")
}

fn classid_pattern() -> Regex {
    re(r"^[0-9a-fA-F]+:[0-9a-fA-F]*$")
}

fn mac_pattern() -> Regex {
    re(r"^([0-9a-fA-F]{2}:){5}[0-9a-fA-F]{2}$")
}

fn path_pattern() -> Regex {
    re(r"^/[A-Za-z0-9._/-]+$")
}

fn process_name_pattern() -> Regex {
    re(r"^[A-Za-z0-9_./-]+$")
}

fn validate_iperf3(args: &[String]) -> Result<(), String> {
    let has_server = args.iter().any(|a| a == "-s");
    let has_client = args.iter().any(|a| a == "-c");
    match (has_server, has_client) {
        (true, true) => {
            Err("cannot specify both server mode (-s) and client mode (-c)".into())
        }
        (false, false) => {
            Err("must specify either server mode (-s) or client mode (-c <peer>)".into())
        }
        _ => Ok(()),
    }
}

fn validate_bridge(args: &[String]) -> Result<(), String> {
    if args.first().map(String::as_str) != Some("fdb") {
        return Err("bridge invocations must start with the fdb subcommand".into());
    }
    Ok(())
}

fn build_registry() -> HashMap<&'static str, CommandSpec> {
    let mut m = HashMap::new();

    m.insert(
        "iperf3",
        CommandSpec {
            name: "iperf3",
            allowed_flags: &[
                "-s", "-c", "-D", "-J", "-u", "-R", "-p", "-t", "-P", "-w", "-i", "-b", "--bidir",
            ],
            patterns: vec![ip_pattern(), integer_pattern(), rate_pattern(), size_pattern(), time_pattern()],
            max_args: 20,
            max_wall_clock: Duration::from_secs(3660),
            validator: Some(validate_iperf3),
            allow_empty_tokens: false,
        },
    );

    m.insert(
        "tc",
        CommandSpec {
            name: "tc",
            allowed_flags: &[
                "qdisc", "class", "filter", "add", "del", "replace", "show", "dev", "root",
                "ingress", "handle", "default", "parent", "htb", "tbf", "netem", "u32", "match",
                "ip", "flowid", "rate", "burst", "latency", "loss", "delay", "jitter", "prio",
                "protocol", "ceil", "dst",
            ],
            patterns: vec![iface_pattern(), integer_pattern(), rate_pattern(), size_pattern(), time_pattern(), percent_pattern(), classid_pattern(), ip_pattern()],
            max_args: 28,
            max_wall_clock: Duration::from_secs(10),
            validator: None,
            allow_empty_tokens: false,
        },
    );

    m.insert(
        "ip",
        CommandSpec {
            name: "ip",
            allowed_flags: &[
                "link", "add", "del", "set", "show", "type", "vxlan", "up", "down", "dev", "id",
                "local", "remote", "dstport", "learning", "nolearning", "mtu", "addr",
            ],
            patterns: vec![iface_pattern(), integer_pattern(), ip_pattern()],
            max_args: 20,
            max_wall_clock: Duration::from_secs(10),
            validator: None,
            allow_empty_tokens: false,
        },
    );

    m.insert(
        "bridge",
        CommandSpec {
            name: "bridge",
            allowed_flags: &["fdb", "add", "append", "del", "show", "dev", "dst", "to"],
            patterns: vec![iface_pattern(), ip_pattern(), mac_pattern()],
            max_args: 12,
            max_wall_clock: Duration::from_secs(10),
            validator: Some(validate_bridge),
            allow_empty_tokens: false,
        },
    );

    m.insert(
        "ping",
        CommandSpec {
            name: "ping",
            allowed_flags: &["-c", "-W", "-i", "-q"],
            patterns: vec![integer_pattern(), ip_pattern(), time_pattern()],
            max_args: 8,
            max_wall_clock: Duration::from_secs(60),
            validator: None,
            allow_empty_tokens: false,
        },
    );

    m.insert(
        "pkill",
        CommandSpec {
            name: "pkill",
            allowed_flags: &["-f", "-9"],
            patterns: vec![process_name_pattern()],
            max_args: 4,
            max_wall_clock: Duration::from_secs(5),
            validator: None,
            allow_empty_tokens: false,
        },
    );

    m.insert(
        "pgrep",
        CommandSpec {
            name: "pgrep",
            allowed_flags: &["-f"],
            patterns: vec![process_name_pattern()],
            max_args: 4,
            max_wall_clock: Duration::from_secs(5),
            validator: None,
            allow_empty_tokens: false,
        },
    );

    m.insert(
        "cat",
        CommandSpec {
            name: "cat",
            allowed_flags: &[],
            patterns: vec![path_pattern()],
            max_args: 4,
            max_wall_clock: Duration::from_secs(5),
            validator: None,
            allow_empty_tokens: false,
        },
    );

    m
}

pub fn registry() -> &'static HashMap<&'static str, CommandSpec> {
    static REGISTRY: OnceLock<HashMap<&'static str, CommandSpec>> = OnceLock::new();
    REGISTRY.get_or_init(build_registry)
}

pub fn lookup(name: &str) -> Option<&'static CommandSpec> {
    registry().get(name)
}
