pub fn default_token_symbol() -> String {
    "USDC".to_string()
}

pub fn default_token_decimals() -> u32 {
    common::AMOUNT_DECIMALS
}

pub fn default_trip_name() -> String {
    "My Trip".to_string()
}

pub fn default_log_format() -> String {
    "pretty".to_string()
}

pub fn default_receipt_poll_interval_ms() -> u64 {
    1000
}

pub fn default_rpc_url() -> String {
    "http://127.0.0.1:8545".to_string()
}

pub fn default_chain_id() -> u64 {
    31337
}
