//! Provides a means to read, parse and hold configuration options for scans.
use crate::output::DEFAULT_RESULTS_FILE;
use crate::scanner::{default_concurrency, ProbeConfig, ScanConfig};
use clap::Parser;
use log::warn;
use serde_derive::Deserialize;
use std::fs;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

const CONFIG_FILE_NAME: &str = ".ipsweep.toml";

/// Parses a proxy given as `host:port`, with or without an `http://` scheme.
pub fn parse_proxy(input: &str) -> Result<SocketAddr, String> {
    let address = input.trim();
    let address = address.strip_prefix("http://").unwrap_or(address);
    let address = address.trim_end_matches('/');
    address
        .parse()
        .map_err(|_| format!("Invalid proxy '{input}'. Expected IP:PORT, for example http://1.1.1.1:80"))
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "ipsweep",
    version = env!("CARGO_PKG_VERSION"),
    max_term_width = 120,
    help_template = "{bin} {version}\n{about}\n\nUSAGE:\n    {usage}\n\nOPTIONS:\n{options}",
)]
#[allow(clippy::struct_excessive_bools)]
/// Sweeps IPv4 ranges for hosts that answer a ping and records what their
/// HTTP server replies.
/// Run without a target to pick one from the interactive menu.
pub struct Opts {
    /// Start address of a manual scan, optionally with a prefix. Example: 192.168.1.1/24
    #[arg(short, long, conflicts_with_all = ["cidr", "all_cidrs"])]
    pub address: Option<String>,

    /// Last address of a manual scan. Ignored when the start address has a prefix.
    #[arg(short, long, requires = "address")]
    pub end: Option<String>,

    /// Scan one Cloudflare block, by its number in the table (1-13).
    #[arg(long, conflicts_with = "all_cidrs")]
    pub cidr: Option<usize>,

    /// Scan every Cloudflare block, one after the other.
    #[arg(long)]
    pub all_cidrs: bool,

    /// Whether to ignore the configuration file or not.
    #[arg(short, long)]
    pub no_config: bool,

    /// Hide the banner
    #[arg(long)]
    pub no_banner: bool,

    /// Custom path to config file
    #[arg(long, value_parser)]
    pub config_path: Option<PathBuf>,

    /// Greppable mode. Only output result lines, no progress bar.
    #[arg(short, long)]
    pub greppable: bool,

    /// Accessible mode. Turns off features which negatively affect screen readers.
    #[arg(long)]
    pub accessible: bool,

    /// Do not print results while scanning, only the summary.
    #[arg(short, long)]
    pub quiet: bool,

    /// Maximum number of addresses probed at the same time.
    /// Defaults to 50 per available processing unit.
    #[arg(short, long)]
    pub concurrency: Option<usize>,

    /// The timeout in milliseconds of the HTTP request sent to live hosts.
    #[arg(short, long, default_value = "30000")]
    pub timeout: u64,

    /// The timeout in milliseconds before a host that does not answer the ping is skipped.
    #[arg(long, default_value = "4000")]
    pub ping_timeout: u64,

    /// Port the HTTP request is sent to.
    #[arg(short, long, default_value = "80")]
    pub port: u16,

    /// HTTP proxy every request goes through. Example: http://1.1.1.1:80
    #[arg(long, value_parser = parse_proxy)]
    pub proxy: Option<SocketAddr>,

    /// File results are appended to.
    #[arg(short, long, default_value = DEFAULT_RESULTS_FILE)]
    pub output: PathBuf,

    /// Automatically ups the ULIMIT with the value you provided.
    #[arg(short, long)]
    pub ulimit: Option<u64>,
}

#[cfg(not(tarpaulin_include))]
impl Opts {
    /// Parses the command line.
    pub fn read() -> Self {
        Self::parse()
    }

    /// Merges values found within the user configuration file into the
    /// command line options.
    pub fn merge(&mut self, config: &Config) {
        if !self.no_config {
            self.merge_required(config);
            self.merge_optional(config);
        }
    }

    fn merge_required(&mut self, config: &Config) {
        macro_rules! merge_required {
            ($($field: ident),+) => {
                $(
                    if let Some(e) = &config.$field {
                        self.$field = e.clone();
                    }
                )+
            }
        }

        merge_required!(greppable, accessible, quiet, timeout, ping_timeout, port, output);
    }

    fn merge_optional(&mut self, config: &Config) {
        macro_rules! merge_optional {
            ($($field: ident),+) => {
                $(
                    if config.$field.is_some() {
                        self.$field = config.$field.clone();
                    }
                )+
            }
        }

        if let Some(proxy) = &config.proxy {
            match parse_proxy(proxy) {
                Ok(proxy) => self.proxy = Some(proxy),
                Err(e) => warn!("Ignoring proxy from configuration file. {e}"),
            }
        }

        merge_optional!(concurrency, ulimit);
    }

    /// Runner settings derived from the options.
    pub fn scan_config(&self) -> ScanConfig {
        ScanConfig {
            concurrency: self.concurrency.unwrap_or_else(default_concurrency),
            verbose: !self.quiet,
            greppable: self.greppable,
            accessible: self.accessible,
        }
    }

    /// Probe settings derived from the options.
    pub fn probe_config(&self) -> ProbeConfig {
        ProbeConfig {
            ping_timeout: Duration::from_millis(self.ping_timeout),
            http_timeout: Duration::from_millis(self.timeout),
            port: self.port,
            proxy: self.proxy,
        }
    }
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            address: None,
            end: None,
            cidr: None,
            all_cidrs: false,
            no_config: true,
            no_banner: false,
            config_path: None,
            greppable: true,
            accessible: false,
            quiet: false,
            concurrency: None,
            timeout: 0,
            ping_timeout: 0,
            port: 80,
            proxy: None,
            output: PathBuf::from(DEFAULT_RESULTS_FILE),
            ulimit: None,
        }
    }
}

/// Struct used to deserialize the options specified within our config file.
/// These will be further merged with our command line arguments in order to
/// generate the final Opts struct.
#[cfg(not(tarpaulin_include))]
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    greppable: Option<bool>,
    accessible: Option<bool>,
    quiet: Option<bool>,
    concurrency: Option<usize>,
    timeout: Option<u64>,
    ping_timeout: Option<u64>,
    port: Option<u16>,
    proxy: Option<String>,
    output: Option<PathBuf>,
    ulimit: Option<u64>,
}

/// Reasons the configuration file could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("Could not read configuration file {path}: {source}")]
    Read {
        /// Location of the file.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },

    /// The file is not valid TOML for this tool.
    #[error("Found {0} in configuration file.")]
    Parse(#[from] toml::de::Error),
}

#[cfg(not(tarpaulin_include))]
impl Config {
    /// Reads the configuration file with TOML format and parses it into a
    /// Config struct. A missing file gives an empty configuration.
    ///
    /// # Format
    ///
    /// concurrency = 400
    /// timeout = 30000
    /// ping_timeout = 4000
    /// port = 80
    /// proxy = "http://1.1.1.1:80"
    /// output = "results.txt"
    /// quiet = false
    ///
    pub fn read(custom_config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let Some(config_path) = custom_config_path.or_else(default_config_path) else {
            return Ok(Self::default());
        };
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path).map_err(|source| ConfigError::Read {
            path: config_path.clone(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parses configuration file content.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}

/// Constructs default path to config toml
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(CONFIG_FILE_NAME))
}
