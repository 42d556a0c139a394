//! Configuration for the mirror process.
//!
//! Loaded from `config.json` under the base directory, then overridden by
//! `MIRROR_*` environment variables, then by CLI flags in the binary.
//! [`Config::validate`] must pass before the supervisor is allowed to start.

use crate::{CoreError, CoreResult, Paths};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use url::{Host, Url};

/// Public XRPL testnet websocket.
pub const DEFAULT_WEBSOCKET_URL: &str = "wss://s.altnet.rippletest.net:51233";

/// Admin websocket of a node on the operator's own machine.
pub const LOCAL_SUBMIT_URL: &str = "ws://127.0.0.1:6006";

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Hosts the mirror may connect to. A leading dot matches any subdomain.
pub const ALLOWED_ENDPOINTS: &[&str] = &[
    ".rippletest.net",
    "xrpl.org",
    "ripple.com",
    "xrplcluster.com",
    "localhost",
    "127.0.0.1",
];

/// XRPL base58 alphabet.
const XRPL_ALPHABET: &str = "rpshnaf39wBUDNEGHJKLM4PQRST7VWXYZ2bcdeCg65jkm8oFqi1tuvAxyz";

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Simulate ledger submissions instead of sending them.
    #[serde(default)]
    pub test_mode: bool,
    /// Verbose diagnostics. No behavioural effect.
    #[serde(default)]
    pub debug_mode: bool,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub wallets: WalletConfig,
    #[serde(default)]
    pub trading: TradingConfig,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            test_mode: false,
            debug_mode: false,
            network: NetworkConfig::default(),
            wallets: WalletConfig::default(),
            trading: TradingConfig::default(),
        }
    }
}

/// Ledger connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Subscription websocket.
    pub websocket_url: String,
    /// Node used for sign-and-submit. It receives the operator seed, so it
    /// must be a loopback node; required outside test mode.
    pub submit_url: Option<String>,
    pub connect_timeout_secs: u64,
    /// How long to wait for the subscribe acknowledgement.
    pub subscribe_timeout_secs: u64,
    /// Interval between keepalive pings on the subscription socket.
    pub keepalive_interval_secs: u64,
    /// Silence longer than this forces a reconnect.
    pub heartbeat_deadline_secs: u64,
    pub reconnect_base_delay_secs: u64,
    pub reconnect_max_delay_secs: u64,
    pub max_reconnect_attempts: u32,
    /// Upper bound for one submission, including validation polling.
    pub submit_timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            websocket_url: DEFAULT_WEBSOCKET_URL.to_string(),
            submit_url: None,
            connect_timeout_secs: 10,
            subscribe_timeout_secs: 10,
            keepalive_interval_secs: 15,
            heartbeat_deadline_secs: 30,
            reconnect_base_delay_secs: 1,
            reconnect_max_delay_secs: 30,
            max_reconnect_attempts: 5,
            submit_timeout_secs: 30,
        }
    }
}

impl NetworkConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn subscribe_timeout(&self) -> Duration {
        Duration::from_secs(self.subscribe_timeout_secs)
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_interval_secs)
    }

    pub fn heartbeat_deadline(&self) -> Duration {
        Duration::from_secs(self.heartbeat_deadline_secs)
    }

    pub fn reconnect_base_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_base_delay_secs)
    }

    pub fn reconnect_max_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_max_delay_secs)
    }

    pub fn submit_timeout(&self) -> Duration {
        Duration::from_secs(self.submit_timeout_secs)
    }

    /// Endpoint used for transaction submission, if configured.
    pub fn submit_endpoint(&self) -> Option<&str> {
        self.submit_url.as_deref()
    }
}

/// Watched and operator accounts.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    /// Account whose trust lines are mirrored.
    pub target_account: String,
    /// Account that performs the mirrored actions.
    pub operator_address: String,
    /// Operator signing seed. Accepted from the file but never written back.
    #[serde(skip_serializing)]
    pub operator_seed: Option<String>,
}

impl fmt::Debug for WalletConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletConfig")
            .field("target_account", &self.target_account)
            .field("operator_address", &self.operator_address)
            .field(
                "operator_seed",
                &self.operator_seed.as_ref().map(|_| "[redacted]"),
            )
            .finish()
    }
}

/// Mirroring and purchase limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TradingConfig {
    /// Token amount requested by the follow-up purchase.
    pub initial_purchase_amount: Decimal,
    pub min_trust_line_amount: Decimal,
    pub max_trust_line_amount: Decimal,
    /// Most XRP one purchase may spend.
    pub send_max_xrp: Decimal,
    /// Accepted shortfall of the delivered amount, in percent.
    pub slippage_percent: Decimal,
    /// Observe and log decisions without acting on them.
    pub watch_only: bool,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            initial_purchase_amount: Decimal::ONE,
            min_trust_line_amount: Decimal::from(1000),
            max_trust_line_amount: Decimal::from(10000),
            send_max_xrp: Decimal::from(85),
            slippage_percent: Decimal::from(5),
            watch_only: false,
        }
    }
}

impl Config {
    /// Load configuration from the base directory, falling back to
    /// defaults, then apply environment overrides.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| CoreError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Save configuration to the base directory. The operator seed is omitted.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    fn load_from_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply `MIRROR_*` overrides from `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(level) = get("MIRROR_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(url) = get("MIRROR_WEBSOCKET_URL") {
            self.network.websocket_url = url;
        }
        if let Some(url) = get("MIRROR_SUBMIT_URL") {
            self.network.submit_url = Some(url);
        }
        if let Some(account) = get("MIRROR_TARGET_ACCOUNT") {
            self.wallets.target_account = account;
        }
        if let Some(address) = get("MIRROR_OPERATOR_ADDRESS") {
            self.wallets.operator_address = address;
        }
        if let Some(seed) = get("MIRROR_OPERATOR_SEED") {
            self.wallets.operator_seed = Some(seed);
        }
        if let Some(flag) = get("MIRROR_TEST_MODE") {
            self.test_mode = parse_flag(&flag);
        }
        if let Some(flag) = get("MIRROR_DEBUG") {
            self.debug_mode = parse_flag(&flag);
        }
    }

    /// Parsed subscription endpoint, checked against [`ALLOWED_ENDPOINTS`].
    pub fn websocket_endpoint(&self) -> CoreResult<Url> {
        checked_endpoint(&self.network.websocket_url)
    }

    /// Check everything the supervisor relies on. Any problem is fatal.
    pub fn validate(&self) -> CoreResult<()> {
        let mut problems = Vec::new();

        if !is_classic_address(&self.wallets.target_account) {
            problems.push("wallets.target_account must be a classic address".to_string());
        }
        if !is_classic_address(&self.wallets.operator_address) {
            problems.push("wallets.operator_address must be a classic address".to_string());
        }
        if self.wallets.target_account == self.wallets.operator_address {
            problems.push("target and operator accounts must differ".to_string());
        }
        match self.wallets.operator_seed.as_deref() {
            None | Some("") => problems.push("operator seed is missing".to_string()),
            Some(seed) if !is_seed(seed) => {
                problems.push("operator seed is not a valid family seed".to_string())
            }
            Some(_) => {}
        }

        if let Err(e) = checked_endpoint(&self.network.websocket_url) {
            problems.push(format!("network.websocket_url: {}", e));
        }
        match self.network.submit_url.as_deref() {
            Some(url) => {
                if let Err(e) = checked_submit_endpoint(url) {
                    problems.push(format!("network.submit_url: {}", e));
                }
            }
            None if !self.test_mode => problems.push(
                "network.submit_url is required outside test mode (a local node that signs with the operator seed)"
                    .to_string(),
            ),
            None => {}
        }

        let net = &self.network;
        for (name, secs) in [
            ("connect_timeout_secs", net.connect_timeout_secs),
            ("subscribe_timeout_secs", net.subscribe_timeout_secs),
            ("keepalive_interval_secs", net.keepalive_interval_secs),
            ("heartbeat_deadline_secs", net.heartbeat_deadline_secs),
            ("reconnect_base_delay_secs", net.reconnect_base_delay_secs),
            ("reconnect_max_delay_secs", net.reconnect_max_delay_secs),
            ("submit_timeout_secs", net.submit_timeout_secs),
        ] {
            if secs == 0 {
                problems.push(format!("network.{} must be greater than zero", name));
            }
        }
        if net.reconnect_max_delay_secs < net.reconnect_base_delay_secs {
            problems.push("network.reconnect_max_delay_secs is below the base delay".to_string());
        }

        let trading = &self.trading;
        if trading.min_trust_line_amount <= Decimal::ZERO {
            problems.push("trading.min_trust_line_amount must be positive".to_string());
        }
        if trading.max_trust_line_amount < trading.min_trust_line_amount {
            problems.push("trading.max_trust_line_amount is below the minimum".to_string());
        }
        if trading.initial_purchase_amount <= Decimal::ZERO {
            problems.push("trading.initial_purchase_amount must be positive".to_string());
        }
        if trading.send_max_xrp <= Decimal::ZERO {
            problems.push("trading.send_max_xrp must be positive".to_string());
        }
        if trading.slippage_percent < Decimal::ZERO || trading.slippage_percent >= Decimal::ONE_HUNDRED
        {
            problems.push("trading.slippage_percent must be in [0, 100)".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(CoreError::Validation(problems.join("; ")))
        }
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn checked_endpoint(raw: &str) -> CoreResult<Url> {
    let url = Url::parse(raw)?;
    if !matches!(url.scheme(), "ws" | "wss") {
        return Err(CoreError::Validation(format!(
            "unsupported scheme '{}', expected ws or wss",
            url.scheme()
        )));
    }
    let host = url
        .host_str()
        .ok_or_else(|| CoreError::Validation("endpoint has no host".to_string()))?;
    if !is_allowed_host(host) {
        return Err(CoreError::Validation(format!(
            "host '{}' is not an allowed XRPL endpoint",
            host
        )));
    }
    Ok(url)
}

/// The submit node receives the operator seed; only loopback hosts qualify.
fn checked_submit_endpoint(raw: &str) -> CoreResult<Url> {
    let url = Url::parse(raw)?;
    if !matches!(url.scheme(), "ws" | "wss") {
        return Err(CoreError::Validation(format!(
            "unsupported scheme '{}', expected ws or wss",
            url.scheme()
        )));
    }
    let loopback = match url.host() {
        Some(Host::Domain(domain)) => domain == "localhost",
        Some(Host::Ipv4(ip)) => ip.is_loopback(),
        Some(Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    };
    if !loopback {
        return Err(CoreError::Validation(format!(
            "host '{}' is not a loopback node; the operator seed is never sent off this machine",
            url.host_str().unwrap_or_default()
        )));
    }
    Ok(url)
}

fn is_allowed_host(host: &str) -> bool {
    ALLOWED_ENDPOINTS.iter().any(|allowed| match allowed.strip_prefix('.') {
        Some(domain) => host.ends_with(allowed) || host == domain,
        None => host == *allowed || host.ends_with(&format!(".{}", allowed)),
    })
}

fn is_base58(s: &str) -> bool {
    s.chars().all(|c| XRPL_ALPHABET.contains(c))
}

/// Classic `r...` account address.
pub(crate) fn is_classic_address(s: &str) -> bool {
    s.starts_with('r') && (25..=35).contains(&s.len()) && is_base58(s)
}

fn is_seed(s: &str) -> bool {
    s.starts_with('s') && s.len() >= 20 && is_base58(s)
}
