use crate::core::{DbError, Result};
use std::time::Duration;

const SCHEME: &str = "memdb://";
const DEFAULT_PORT: u16 = 7878;

/// Settings of one connection pool
///
/// Written as a URL, `memdb://host[:port]/database`, optionally followed by
/// pool settings in the query string:
///
/// ```
/// use hifella::ConnectionConfig;
///
/// let config = ConnectionConfig::from_url("memdb://db.local/hifella?max_connections=4&connect_timeout=5").unwrap();
/// assert_eq!(config.database, "hifella");
/// assert_eq!(config.max_connections, 4);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Informational for the in-memory engine
    pub host: String,
    pub port: u16,
    pub database: String,
    /// Longest wait in `get_connection` before `PoolTimeout`
    pub connect_timeout: Duration,
    pub max_connections: usize,
    /// Sessions opened eagerly when the pool is built
    pub min_connections: usize,
    pub idle_timeout: Option<Duration>,
    pub max_lifetime: Option<Duration>,
}

impl ConnectionConfig {
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            host: "localhost".into(),
            port: DEFAULT_PORT,
            database: database.into(),
            connect_timeout: Duration::from_secs(30),
            max_connections: 10,
            min_connections: 1,
            idle_timeout: Some(Duration::from_secs(10 * 60)),
            max_lifetime: Some(Duration::from_secs(30 * 60)),
        }
    }

    pub fn host(self, host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..self
        }
    }

    pub fn port(self, port: u16) -> Self {
        Self { port, ..self }
    }

    pub fn connect_timeout(self, connect_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            ..self
        }
    }

    pub fn max_connections(self, max_connections: usize) -> Self {
        Self {
            max_connections,
            ..self
        }
    }

    pub fn min_connections(self, min_connections: usize) -> Self {
        Self {
            min_connections,
            ..self
        }
    }

    pub fn idle_timeout(self, idle_timeout: Option<Duration>) -> Self {
        Self { idle_timeout, ..self }
    }

    pub fn max_lifetime(self, max_lifetime: Option<Duration>) -> Self {
        Self { max_lifetime, ..self }
    }

    pub fn from_url(url: &str) -> Result<Self> {
        let invalid = |reason: &str| DbError::InvalidConfig(format!("{reason} in '{url}'"));

        let rest = url
            .strip_prefix(SCHEME)
            .ok_or_else(|| invalid("expected the memdb:// scheme"))?;
        let (location, query) = match rest.split_once('?') {
            Some((location, query)) => (location, Some(query)),
            None => (rest, None),
        };
        let (authority, database) = location
            .split_once('/')
            .ok_or_else(|| invalid("missing database name"))?;
        if database.is_empty() || database.contains('/') {
            return Err(invalid("bad database name"));
        }

        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port)) => (host, port.parse().map_err(|_| invalid("bad port"))?),
            None => (authority, DEFAULT_PORT),
        };
        if host.is_empty() {
            return Err(invalid("missing host"));
        }

        let mut config = Self::new(database).host(host).port(port);
        for pair in query.into_iter().flat_map(|q| q.split('&')).filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let count = || value.parse::<usize>().map_err(|_| invalid(key));
            let seconds = || value.parse::<u64>().map(Duration::from_secs).map_err(|_| invalid(key));
            config = match key {
                "max_connections" => config.max_connections(count()?),
                "min_connections" => config.min_connections(count()?),
                "connect_timeout" => config.connect_timeout(seconds()?),
                "idle_timeout" => config.idle_timeout(Some(seconds()?)),
                "max_lifetime" => config.max_lifetime(Some(seconds()?)),
                _ => return Err(invalid(&format!("unknown option '{key}'"))),
            };
        }
        Ok(config)
    }

    /// Location part of the URL; pool settings are not included
    pub fn to_url(&self) -> String {
        format!("{SCHEME}{}:{}/{}", self.host, self.port, self.database)
    }

    pub fn validate(&self) -> Result<()> {
        let problem = if self.database.is_empty() {
            "database name is empty"
        } else if self.max_connections == 0 {
            "max_connections must be at least 1"
        } else if self.min_connections > self.max_connections {
            "min_connections exceeds max_connections"
        } else {
            return Ok(());
        };
        Err(DbError::InvalidConfig(problem.to_string()))
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::new("hifella")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_with_port() {
        let config = ConnectionConfig::from_url("memdb://db.hifella.id:5544/production").unwrap();

        assert_eq!(config.host, "db.hifella.id");
        assert_eq!(config.port, 5544);
        assert_eq!(config.database, "production");
        assert_eq!(config.to_url(), "memdb://db.hifella.id:5544/production");
    }

    #[test]
    fn test_url_defaults() {
        let config = ConnectionConfig::from_url("memdb://localhost/hifella").unwrap();
        assert_eq!(config, ConnectionConfig::default());
    }

    #[test]
    fn test_url_pool_options() {
        let config =
            ConnectionConfig::from_url("memdb://localhost/events?max_connections=3&min_connections=0&idle_timeout=5")
                .unwrap();

        assert_eq!(config.max_connections, 3);
        assert_eq!(config.min_connections, 0);
        assert_eq!(config.idle_timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_rejected_urls() {
        for url in [
            "postgres://localhost/db",
            "memdb://localhost",
            "memdb://localhost:abc/db",
            "memdb:///db",
            "memdb://localhost/db?pool=9",
            "memdb://localhost/db?max_connections=many",
        ] {
            assert!(
                matches!(ConnectionConfig::from_url(url), Err(DbError::InvalidConfig(_))),
                "{url}"
            );
        }
    }

    #[test]
    fn test_validate() {
        assert!(ConnectionConfig::new("db").validate().is_ok());
        assert!(ConnectionConfig::new("").validate().is_err());
        assert!(ConnectionConfig::new("db").max_connections(0).validate().is_err());
        assert!(
            ConnectionConfig::new("db")
                .min_connections(10)
                .max_connections(5)
                .validate()
                .is_err()
        );
    }
}
