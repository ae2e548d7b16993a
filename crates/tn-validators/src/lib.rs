//! Stateless, total input validators (spec §4.2). Every function here
//! returns a classified [`ValidationError`] rather than a plain boolean, and
//! none of them may panic on any input — spec §8's "Validator totality".

pub mod sanitize;

pub use sanitize::{sanitize_for_log, sanitize_for_log_with_limit};

use regex::Regex;
use std::net::IpAddr;
use std::sync::OnceLock;
use tn_types::error::ValidationError;
use tn_types::slice::{VNI_MAX, VNI_RESERVED_START};

const IFACE_PREFIXES: &[&str] = &[
    "eth", "ens", "enp", "wlan", "vlan", "br", "docker", "veth", "tun", "tap", "lo", "vxlan",
];

/// Ports below 1024 that may be used without the caller holding a
/// privileged-bind capability (e.g. the iperf3/probe default).
const LOW_PORT_ALLOWLIST: &[u16] = &[123, 179, 443, 500, 853];

fn bandwidth_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+(\.\d+)?[KMG]?$").expect("static regex"))
}

/// Interface name: non-empty, ≤ 64 chars, one of the known prefixes followed
/// by digits and optional `.`/`-`/`_`/alnum.
pub fn validate_interface_name(name: &str) -> Result<(), ValidationError> {
    let err = |reason: &str| ValidationError::InterfaceName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.is_empty() {
        return Err(err("must not be empty"));
    }
    if name.chars().count() > 64 {
        return Err(err("must be at most 64 characters"));
    }

    let prefix = IFACE_PREFIXES
        .iter()
        .find(|p| name.starts_with(**p))
        .ok_or_else(|| err("does not start with a known interface prefix"))?;

    let rest = &name[prefix.len()..];
    if rest.is_empty() {
        return Err(err("prefix must be followed by digits"));
    }
    let mut chars = rest.chars();
    let first = chars.next().unwrap();
    if !first.is_ascii_digit() {
        return Err(err("prefix must be followed by a digit"));
    }
    if !rest
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
    {
        return Err(err("contains characters outside [A-Za-z0-9._-]"));
    }
    Ok(())
}

/// IP address: syntactically valid v4/v6; rejects multicast; allows
/// loopback and broadcast.
pub fn validate_ip_address(value: &str) -> Result<IpAddr, ValidationError> {
    let err = |reason: &str| ValidationError::IpAddress {
        value: value.to_string(),
        reason: reason.to_string(),
    };
    let ip: IpAddr = value.parse().map_err(|_| err("not a valid IPv4/IPv6 address"))?;
    if ip.is_multicast() {
        return Err(err("multicast addresses are not allowed"));
    }
    Ok(ip)
}

/// Port: integer in [1, 65535]; ports < 1024 allowed only via an explicit
/// small allowlist.
pub fn validate_port(value: i64) -> Result<u16, ValidationError> {
    let err = |reason: String| ValidationError::Port { value, reason };
    if !(1..=65535).contains(&value) {
        return Err(err("must be in [1, 65535]".into()));
    }
    let port = value as u16;
    if port < 1024 && !LOW_PORT_ALLOWLIST.contains(&port) {
        return Err(err(format!(
            "privileged port {port} is not on the low-port allowlist"
        )));
    }
    Ok(port)
}

/// VNI: 24-bit unsigned, non-zero, not in the reserved top-16 range.
pub fn validate_vni(value: u32) -> Result<(), ValidationError> {
    if value == 0 || value > VNI_MAX || value >= VNI_RESERVED_START {
        return Err(ValidationError::Vni {
            value,
            reason: "vni must be a non-zero 24-bit value outside the reserved top 16".into(),
        });
    }
    Ok(())
}

/// Bandwidth string: `^\d+(\.\d+)?[KMG]?$`, decoded value in [1 bps, 100 Gbps].
pub fn validate_bandwidth_string(value: &str) -> Result<f64, ValidationError> {
    let err = |reason: &str| ValidationError::Bandwidth {
        value: value.to_string(),
        reason: reason.to_string(),
    };
    if !bandwidth_re().is_match(value) {
        return Err(err("does not match ^\\d+(\\.\\d+)?[KMG]?$"));
    }
    let (num_part, mult) = match value.chars().last() {
        Some('K') => (&value[..value.len() - 1], 1_000.0),
        Some('M') => (&value[..value.len() - 1], 1_000_000.0),
        Some('G') => (&value[..value.len() - 1], 1_000_000_000.0),
        _ => (value, 1.0),
    };
    let base: f64 = num_part.parse().map_err(|_| err("unparseable numeric part"))?;
    let bps = base * mult;
    if !(1.0..=100_000_000_000.0).contains(&bps) {
        return Err(err("decoded value out of range [1 bps, 100 Gbps]"));
    }
    Ok(bps)
}

/// Path: non-empty; no `..`; no NUL; length ≤ 4096; absolute paths allowed
/// only when prefixed by an explicitly configured allowlist of base
/// directories.
pub fn validate_path(value: &str, allowed_bases: &[&str]) -> Result<(), ValidationError> {
    let err = |reason: &str| ValidationError::Path {
        value: value.to_string(),
        reason: reason.to_string(),
    };
    if value.is_empty() {
        return Err(err("must not be empty"));
    }
    if value.len() > 4096 {
        return Err(err("must be at most 4096 bytes"));
    }
    if value.contains('\0') {
        return Err(err("must not contain a NUL byte"));
    }
    if value.split('/').any(|segment| segment == "..") {
        return Err(err("must not contain a .. segment"));
    }
    if value.starts_with('/') && !allowed_bases.iter().any(|base| value.starts_with(base)) {
        return Err(err("absolute path not under an allowlisted base directory"));
    }
    Ok(())
}

fn is_rfc1123_label(s: &str) -> bool {
    if s.is_empty() || s.len() > 63 {
        return false;
    }
    let bytes = s.as_bytes();
    let first_ok = bytes[0].is_ascii_lowercase() || bytes[0].is_ascii_digit();
    let last_ok = {
        let last = bytes[bytes.len() - 1];
        last.is_ascii_lowercase() || last.is_ascii_digit()
    };
    first_ok
        && last_ok
        && s.chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// RFC 1123 subdomain: one or more `.`-separated labels, each a valid label.
pub fn validate_k8s_name(value: &str) -> Result<(), ValidationError> {
    let err = |reason: &str| ValidationError::KubernetesName {
        value: value.to_string(),
        reason: reason.to_string(),
    };
    if value.len() > 253 {
        return Err(err("subdomain must be at most 253 characters"));
    }
    if !value.split('.').all(is_rfc1123_label) {
        return Err(err("must be a dot-separated sequence of RFC 1123 labels"));
    }
    Ok(())
}

const RESERVED_NAMESPACES: &[&str] = &["kube-system", "kube-public", "kube-node-lease"];

/// Kubernetes namespace: a single RFC 1123 label, rejecting the reserved
/// system set.
pub fn validate_k8s_namespace(value: &str) -> Result<(), ValidationError> {
    if !is_rfc1123_label(value) {
        return Err(ValidationError::KubernetesName {
            value: value.to_string(),
            reason: "must be a single RFC 1123 label".into(),
        });
    }
    if RESERVED_NAMESPACES.contains(&value) {
        return Err(ValidationError::KubernetesName {
            value: value.to_string(),
            reason: "reserved system namespace".into(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interface_name_accepts_known_prefixes() {
        assert!(validate_interface_name("eth0").is_ok());
        assert!(validate_interface_name("vxlan100").is_ok());
        assert!(validate_interface_name("veth0.100").is_ok());
    }

    #[test]
    fn interface_name_rejects_unknown_prefix() {
        assert!(validate_interface_name("rm -rf /").is_err());
        assert!(validate_interface_name("").is_err());
    }

    #[test]
    fn ip_rejects_multicast() {
        assert!(validate_ip_address("224.0.0.1").is_err());
        assert!(validate_ip_address("10.0.0.1").is_ok());
        assert!(validate_ip_address("127.0.0.1").is_ok());
    }

    #[test]
    fn port_rejects_privileged_unlisted() {
        assert!(validate_port(22).is_err());
        assert!(validate_port(443).is_ok());
        assert!(validate_port(8080).is_ok());
        assert!(validate_port(0).is_err());
        assert!(validate_port(70000).is_err());
    }

    #[test]
    fn vni_rejects_zero_and_reserved() {
        assert!(validate_vni(0).is_err());
        assert!(validate_vni(100).is_ok());
        assert!(validate_vni(VNI_RESERVED_START).is_err());
    }

    #[test]
    fn bandwidth_string_parses_suffixes() {
        assert!((validate_bandwidth_string("1M").unwrap() - 1_000_000.0).abs() < 1e-6);
        assert!(validate_bandwidth_string("abc").is_err());
        assert!(validate_bandwidth_string("0.5K").is_ok());
    }

    #[test]
    fn path_rejects_traversal() {
        assert!(validate_path("/etc/../etc/passwd", &["/etc"]).is_err());
        assert!(validate_path("/sys/class/net/eth0/statistics/rx_bytes", &["/sys/class/net"]).is_ok());
        assert!(validate_path("/sys/class/net/eth0", &["/proc"]).is_err());
    }

    #[test]
    fn k8s_names() {
        assert!(validate_k8s_name("my-slice-1").is_ok());
        assert!(validate_k8s_name("My_Slice").is_err());
        assert!(validate_k8s_namespace("kube-system").is_err());
        assert!(validate_k8s_namespace("tenant-a").is_ok());
    }

    #[test]
    fn totality_no_panic_on_arbitrary_input() {
        let s = "\u{0}".repeat(1000) + &"x".repeat(70000);
        let _ = validate_interface_name(&s);
        let _ = validate_ip_address(&s);
        let _ = validate_bandwidth_string(&s);
        let _ = validate_path(&s, &[]);
        let _ = validate_k8s_name(&s);
        let _ = validate_k8s_namespace(&s);
    }
}
