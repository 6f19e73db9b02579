mod upstream_client_reqwest;

pub use upstream_client_reqwest::*;
