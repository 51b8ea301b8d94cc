use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub export_dir: PathBuf,
    /// Log appends between compactions; 0 disables compaction.
    pub compact_threshold: u64,
    pub metrics_port: Option<u16>,
    /// Run the console menu on stdin alongside the HTTP server.
    pub console: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid value for {}: {:?}", self.var, self.value)
    }
}

impl std::error::Error for ConfigError {}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 8080,
            data_dir: PathBuf::from("./data"),
            export_dir: PathBuf::from("."),
            compact_threshold: 1000,
            metrics_port: None,
            console: true,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from any variable source. Unset variables keep their defaults;
    /// set but unparsable ones are an error.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            bind: lookup("ROOMBOOK_BIND").unwrap_or(defaults.bind),
            port: parse_var(&lookup, "ROOMBOOK_PORT")?.unwrap_or(defaults.port),
            data_dir: lookup("ROOMBOOK_DATA_DIR").map_or(defaults.data_dir, PathBuf::from),
            export_dir: lookup("ROOMBOOK_EXPORT_DIR").map_or(defaults.export_dir, PathBuf::from),
            compact_threshold: parse_var(&lookup, "ROOMBOOK_COMPACT_THRESHOLD")?
                .unwrap_or(defaults.compact_threshold),
            metrics_port: parse_var(&lookup, "ROOMBOOK_METRICS_PORT")?,
            console: parse_var(&lookup, "ROOMBOOK_CONSOLE")?.unwrap_or(defaults.console),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("roombook.wal")
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError { var, value }),
    }
}
