pub mod http_client;
pub mod rate_limiter_adapter;
pub mod station_output_adapter;
