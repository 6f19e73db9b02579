mod response_cache_redis;

pub use response_cache_redis::*;
