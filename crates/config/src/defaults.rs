pub fn default_commitment() -> super::Commitment {
    super::Commitment::Confirmed
}

pub fn default_drain_interval_ms() -> u64 {
    250
}

pub fn default_log_format() -> String {
    "pretty".to_string()
}

pub fn default_log_filter() -> String {
    "info".to_string()
}

pub fn default_metrics_enabled() -> bool {
    false
}

pub fn default_metrics_port() -> u16 {
    9090
}

pub fn default_snapshot_path() -> String {
    "data/open_orders.json".to_string()
}
