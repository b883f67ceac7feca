use chapayev_shared::config::ConfigError;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Seed for colour assignment; fixed seeds make pairings reproducible
    pub rng_seed: u64,
    /// Largest accepted WebSocket frame (bytes)
    pub max_message_bytes: usize,
    /// Consecutive unparsable messages before the connection is dropped
    pub max_parse_errors: u32,
    pub max_nick_len: usize,
    /// Capacity of the channel feeding the relay task
    pub outbound_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:9001".to_string(),
            rng_seed: 42,
            max_message_bytes: 16 * 1024,
            max_parse_errors: 5,
            max_nick_len: 32,
            outbound_buffer: 256,
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by `CHAPAYEV_LISTEN_ADDR` and `CHAPAYEV_RNG_SEED`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(addr) = lookup("CHAPAYEV_LISTEN_ADDR") {
            config.listen_addr = addr;
        }
        if let Some(seed) = lookup("CHAPAYEV_RNG_SEED") {
            config.rng_seed = seed.trim().parse().map_err(|_| ConfigError::Invalid {
                field: "CHAPAYEV_RNG_SEED",
                value: seed.clone(),
            })?;
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::Invalid {
                field: "listen_addr",
                value: self.listen_addr.clone(),
            });
        }
        for (field, value) in [
            ("max_message_bytes", self.max_message_bytes),
            ("max_parse_errors", self.max_parse_errors as usize),
            ("max_nick_len", self.max_nick_len),
            ("outbound_buffer", self.outbound_buffer),
        ] {
            if value == 0 {
                return Err(ConfigError::NotPositive { field });
            }
        }
        Ok(())
    }
}
