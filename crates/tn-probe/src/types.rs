use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Upload,
    Download,
    Bidirectional,
}

#[derive(Debug, Clone)]
pub struct ThroughputOptions {
    pub server_ip: String,
    pub server_port: u16,
    pub protocol: Protocol,
    pub direction: Direction,
    pub parallel_streams: u32,
    pub window_size_kb: Option<u64>,
    pub duration_secs: u64,
    pub interval_secs: Option<u64>,
    /// Bandwidth cap string, validated per spec §4.2, UDP only.
    pub bandwidth_cap: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LatencyOptions {
    pub target_ip: String,
    pub count: u32,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamResult {
    pub bytes: u64,
    pub rate_bps: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThroughputResult {
    pub test_id: String,
    pub timestamp: DateTime<Utc>,
    pub sent_streams: Vec<StreamResult>,
    pub received_streams: Vec<StreamResult>,
    pub sent_bps: f64,
    pub received_bps: f64,
    pub cpu_utilization_pct: Option<f64>,
    pub retransmits: Option<u64>,
    pub lost_packets: Option<u64>,
    pub jitter_ms: Option<f64>,
    pub peer: String,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatencyResult {
    pub test_id: String,
    pub timestamp: DateTime<Utc>,
    pub min_ms: f64,
    pub avg_ms: f64,
    pub max_ms: f64,
    pub stddev_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub samples: usize,
    pub warnings: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throughput_result_round_trips_through_json() {
        let result = ThroughputResult {
            test_id: "t-1".into(),
            timestamp: Utc::now(),
            sent_streams: vec![StreamResult { bytes: 1_000_000, rate_bps: 8_000_000.0 }],
            received_streams: vec![StreamResult { bytes: 990_000, rate_bps: 7_920_000.0 }],
            sent_bps: 8_000_000.0,
            received_bps: 7_920_000.0,
            cpu_utilization_pct: Some(12.5),
            retransmits: Some(3),
            lost_packets: None,
            jitter_ms: Some(0.8),
            peer: "10.0.0.2".into(),
            warnings: vec!["window clamped".into()],
        };

        let encoded = serde_json::to_string(&result).expect("serialize");
        let decoded: ThroughputResult = serde_json::from_str(&encoded).expect("deserialize");

        assert_eq!(decoded.test_id, result.test_id);
        assert_eq!(decoded.sent_streams.len(), result.sent_streams.len());
        assert_eq!(decoded.sent_streams[0].bytes, result.sent_streams[0].bytes);
        assert_eq!(decoded.sent_bps, result.sent_bps);
        assert_eq!(decoded.retransmits, result.retransmits);
        assert_eq!(decoded.lost_packets, result.lost_packets);
        assert_eq!(decoded.peer, result.peer);
        assert_eq!(decoded.warnings, result.warnings);
    }

    #[test]
    fn latency_result_round_trips_through_json() {
        let result = LatencyResult {
            test_id: "l-1".into(),
            timestamp: Utc::now(),
            min_ms: 1.2,
            avg_ms: 2.4,
            max_ms: 5.1,
            stddev_ms: 0.6,
            p50_ms: 2.1,
            p95_ms: 4.0,
            p99_ms: 4.8,
            samples: 50,
            warnings: vec![],
        };

        let encoded = serde_json::to_string(&result).expect("serialize");
        let decoded: LatencyResult = serde_json::from_str(&encoded).expect("deserialize");

        assert_eq!(decoded.test_id, result.test_id);
        assert_eq!(decoded.min_ms, result.min_ms);
        assert_eq!(decoded.max_ms, result.max_ms);
        assert_eq!(decoded.samples, result.samples);
        assert_eq!(decoded.warnings, result.warnings);
    }

    #[test]
    fn protocol_and_direction_use_expected_wire_casing() {
        assert_eq!(serde_json::to_string(&Protocol::Tcp).unwrap(), "\"tcp\"");
        assert_eq!(serde_json::to_string(&Direction::Bidirectional).unwrap(), "\"bidirectional\"");
    }
}
