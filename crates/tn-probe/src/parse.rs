//! Result parsing (spec §4.5): parse structured (JSON) output when the
//! underlying tool emits it, otherwise fall back to locating the textual
//! sender/receiver summary lines. Missing fields default to zero and are
//! flagged in the result's warning list — parsing never aborts the test.

use std::sync::OnceLock;

use chrono::Utc;
use regex::Regex;
use serde_json::Value;

use crate::types::{LatencyResult, StreamResult, ThroughputResult};

fn time_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"time[=<]([0-9]+(?:\.[0-9]+)?)\s*ms").expect("static regex"))
}

fn rtt_summary_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"=\s*([0-9.]+)/([0-9.]+)/([0-9.]+)/([0-9.]+)\s*ms").expect("static regex")
    })
}

fn sender_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"([0-9.]+)\s*([KMG]?)bits/sec\s*(?:[0-9]+\s*)?(sender|receiver)")
            .expect("static regex")
    })
}

fn to_bps(value: f64, unit: &str) -> f64 {
    match unit {
        "K" => value * 1_000.0,
        "M" => value * 1_000_000.0,
        "G" => value * 1_000_000_000.0,
        _ => value,
    }
}

/// Parse an `iperf3 -J` document. Never fails: any missing field is
/// defaulted to zero and recorded in `warnings`.
pub fn parse_iperf3_json(test_id: String, peer: String, text: &str) -> ThroughputResult {
    let mut warnings = Vec::new();
    let root: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(_) => {
            return parse_iperf3_text(test_id, peer, text);
        }
    };

    let end = &root["end"];
    let get_f64 = |v: &Value, key: &str, warnings: &mut Vec<String>| -> f64 {
        v[key].as_f64().unwrap_or_else(|| {
            warnings.push(format!("missing field {key:?}, defaulted to 0"));
            0.0
        })
    };

    let sent_bps = get_f64(&end["sum_sent"], "bits_per_second", &mut warnings);
    let received_bps = get_f64(&end["sum_received"], "bits_per_second", &mut warnings);

    let mut sent_streams = Vec::new();
    let mut received_streams = Vec::new();
    if let Some(streams) = end["streams"].as_array() {
        for s in streams {
            sent_streams.push(StreamResult {
                bytes: s["sender"]["bytes"].as_u64().unwrap_or(0),
                rate_bps: s["sender"]["bits_per_second"].as_f64().unwrap_or(0.0),
            });
            received_streams.push(StreamResult {
                bytes: s["receiver"]["bytes"].as_u64().unwrap_or(0),
                rate_bps: s["receiver"]["bits_per_second"].as_f64().unwrap_or(0.0),
            });
        }
    } else {
        warnings.push("no per-stream results present".into());
    }

    let cpu = root["end"]["cpu_utilization_percent"]["host_total"].as_f64();
    let retransmits = end["sum_sent"]["retransmits"].as_u64();
    let lost_packets = end["sum"]["lost_packets"].as_u64();
    let jitter_ms = end["sum"]["jitter_ms"].as_f64();

    ThroughputResult {
        test_id,
        timestamp: Utc::now(),
        sent_streams,
        received_streams,
        sent_bps,
        received_bps,
        cpu_utilization_pct: cpu,
        retransmits,
        lost_packets,
        jitter_ms,
        peer,
        warnings,
    }
}

/// Fallback: locate `sender`/`receiver` summary lines in textual iperf3
/// output.
pub fn parse_iperf3_text(test_id: String, peer: String, text: &str) -> ThroughputResult {
    let mut warnings = vec!["falling back to textual summary-line parsing".to_string()];
    let mut sent_bps = 0.0;
    let mut received_bps = 0.0;
    let mut found_sender = false;
    let mut found_receiver = false;

    for cap in sender_line_re().captures_iter(text) {
        let value: f64 = cap[1].parse().unwrap_or(0.0);
        let bps = to_bps(value, &cap[2]);
        match &cap[3] {
            "sender" => {
                sent_bps = bps;
                found_sender = true;
            }
            "receiver" => {
                received_bps = bps;
                found_receiver = true;
            }
            _ => {}
        }
    }
    if !found_sender {
        warnings.push("sender summary line not found, defaulted to 0".into());
    }
    if !found_receiver {
        warnings.push("receiver summary line not found, defaulted to 0".into());
    }

    ThroughputResult {
        test_id,
        timestamp: Utc::now(),
        sent_streams: Vec::new(),
        received_streams: Vec::new(),
        sent_bps,
        received_bps,
        cpu_utilization_pct: None,
        retransmits: None,
        lost_packets: None,
        jitter_ms: None,
        peer,
        warnings,
    }
}

fn percentile(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (pct / 100.0 * sorted.len() as f64).ceil() as usize;
    let idx = rank.saturating_sub(1).min(sorted.len() - 1);
    sorted[idx]
}

/// Parse `ping` textual output: per-probe round-trip times plus (if
/// present) the kernel-computed rtt summary line. Percentiles are always
/// computed over the observed sample vector, per spec §4.5.
pub fn parse_ping_output(test_id: String, text: &str) -> LatencyResult {
    let mut warnings = Vec::new();

    let mut samples: Vec<f64> = time_re()
        .captures_iter(text)
        .filter_map(|c| c[1].parse::<f64>().ok())
        .collect();
    samples.sort_by(|a, b| a.partial_cmp(b).unwrap());

    let (min_ms, avg_ms, max_ms, stddev_ms) = if let Some(cap) = rtt_summary_re().captures(text) {
        (
            cap[1].parse().unwrap_or(0.0),
            cap[2].parse().unwrap_or(0.0),
            cap[3].parse().unwrap_or(0.0),
            cap[4].parse().unwrap_or(0.0),
        )
    } else {
        warnings.push("rtt summary line not found, derived from samples".into());
        if samples.is_empty() {
            warnings.push("no round-trip samples found, all latency fields defaulted to 0".into());
            (0.0, 0.0, 0.0, 0.0)
        } else {
            let n = samples.len() as f64;
            let avg = samples.iter().sum::<f64>() / n;
            let var = samples.iter().map(|s| (s - avg).powi(2)).sum::<f64>() / n;
            (samples[0], avg, samples[samples.len() - 1], var.sqrt())
        }
    };

    LatencyResult {
        test_id,
        timestamp: Utc::now(),
        min_ms,
        avg_ms,
        max_ms,
        stddev_ms,
        p50_ms: percentile(&samples, 50.0),
        p95_ms: percentile(&samples, 95.0),
        p99_ms: percentile(&samples, 99.0),
        samples: samples.len(),
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_PING: &str = "PING 10.0.0.2 (10.0.0.2) 56(84) bytes of data.\n\
64 bytes from 10.0.0.2: icmp_seq=1 ttl=64 time=10.0 ms\n\
64 bytes from 10.0.0.2: icmp_seq=2 ttl=64 time=12.0 ms\n\
64 bytes from 10.0.0.2: icmp_seq=3 ttl=64 time=11.0 ms\n\
\n\
--- 10.0.0.2 ping statistics ---\n\
3 packets transmitted, 3 received, 0% packet loss, time 2003ms\n\
rtt min/avg/max/mdev = 10.0/11.0/12.0/0.816 ms\n";

    #[test]
    fn parses_ping_summary_and_percentiles() {
        let result = parse_ping_output("t1".into(), SAMPLE_PING);
        assert_eq!(result.min_ms, 10.0);
        assert_eq!(result.avg_ms, 11.0);
        assert_eq!(result.max_ms, 12.0);
        assert_eq!(result.samples, 3);
        assert!(result.p50_ms >= 10.0 && result.p50_ms <= 12.0);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn ping_parse_never_aborts_on_garbage() {
        let result = parse_ping_output("t2".into(), "not ping output at all");
        assert_eq!(result.samples, 0);
        assert!(!result.warnings.is_empty());
    }

    #[test]
    fn parses_iperf3_text_fallback() {
        let text = "[  5]   0.00-10.00  sec  1.10 GBytes   945 Mbits/sec  123             sender\n\
[  5]   0.00-10.00  sec  1.09 GBytes   938 Mbits/sec                  receiver\n";
        let result = parse_iperf3_text("t3".into(), "10.0.0.2".into(), text);
        assert!((result.sent_bps - 945_000_000.0).abs() < 1.0);
        assert!((result.received_bps - 938_000_000.0).abs() < 1.0);
    }

    #[test]
    fn parses_iperf3_json_missing_fields_default_to_zero() {
        let json = r#"{"end": {"sum_sent": {"bits_per_second": 1000.0}}}"#;
        let result = parse_iperf3_json("t4".into(), "10.0.0.2".into(), json);
        assert_eq!(result.sent_bps, 1000.0);
        assert_eq!(result.received_bps, 0.0);
        assert!(!result.warnings.is_empty());
    }
}
