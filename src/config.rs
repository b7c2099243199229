//! TOML-backed server configuration.
//!
//! Loaded once at startup via [`Config::load`], following the teacher's
//! `serde`+`toml` config layer. A missing or unparsable file is not a fatal
//! configuration error here (the same robustness this crate gives the MOTD
//! file applies to the config file itself): the server falls back to the
//! built-in defaults below so it is runnable with zero configuration.

use std::path::Path;

use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub network: NetworkConfig,
    pub limits: LimitsConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub name: String,
    pub version: String,
    pub motd_path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct NetworkConfig {
    pub bind_address: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_message_length: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig::default(),
            network: NetworkConfig::default(),
            limits: LimitsConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            name: "irc.example.org".to_string(),
            version: "relaird-1.0.0".to_string(),
            motd_path: "motd.txt".to_string(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkConfig {
            bind_address: "0.0.0.0".to_string(),
            port: 6667,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        LimitsConfig {
            max_message_length: 512,
        }
    }
}

impl Config {
    /// Reads and parses the TOML file at `path`. Any failure (missing file,
    /// unreadable, malformed TOML) logs a warning and falls back to
    /// [`Config::default`] rather than aborting startup.
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).unwrap_or_else(|err| {
                log::warn!(
                    "failed to parse config at {}: {err}; using built-in defaults",
                    path.display()
                );
                Config::default()
            }),
            Err(err) => {
                log::warn!(
                    "no config file at {} ({err}); using built-in defaults",
                    path.display()
                );
                Config::default()
            }
        }
    }

    /// `host:port` formed from `network.bind_address`/`network.port`.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.network.bind_address, self.network.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_zero_configuration_table() {
        let config = Config::default();
        assert_eq!(config.server.name, "irc.example.org");
        assert_eq!(config.bind_addr(), "0.0.0.0:6667");
        assert_eq!(config.limits.max_message_length, 512);
    }

    #[test]
    fn load_falls_back_to_defaults_when_file_missing() {
        let config = Config::load("/nonexistent/path/to/config.toml");
        assert_eq!(config.server.name, "irc.example.org");
    }

    #[test]
    fn load_parses_a_minimal_file() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("relaird-test-config-{}.toml", std::process::id()));
        std::fs::write(
            &path,
            "[server]\nname = \"chat.test\"\nversion = \"x\"\nmotd_path = \"m.txt\"\n\n[network]\nbind_address = \"127.0.0.1\"\nport = 7000\n\n[limits]\nmax_message_length = 256\n",
        )
        .unwrap();

        let config = Config::load(&path);
        assert_eq!(config.server.name, "chat.test");
        assert_eq!(config.bind_addr(), "127.0.0.1:7000");
        assert_eq!(config.limits.max_message_length, 256);

        let _ = std::fs::remove_file(&path);
    }
}
