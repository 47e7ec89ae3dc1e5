#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas and profile table parsing for the torque bench.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - Profile CSV loader enforces headers and reports the offending line.
//! - `default_profiles()` carries the bench's stock tolerance table.
use serde::Deserialize;

/// Baud rates a bench serial adapter is expected to support.
pub const STANDARD_BAUD_RATES: [u32; 8] = [1200, 2400, 4800, 9600, 19200, 38400, 57600, 115200];

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ToolKind {
    #[default]
    #[serde(alias = "Wrench")]
    Wrench,
    #[serde(alias = "Torque Multiplier", alias = "torque_multiplier")]
    TorqueMultiplier,
}

impl ToolKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ToolKind::Wrench => "Wrench",
            ToolKind::TorqueMultiplier => "Torque Multiplier",
        }
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ToolKind {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(|c: char| c == '_' || c == ' ', "-").as_str() {
            "wrench" => Ok(ToolKind::Wrench),
            "torque-multiplier" => Ok(ToolKind::TorqueMultiplier),
            other => eyre::bail!("unknown tool kind {other:?} (expected wrench|torque-multiplier)"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SessionCfg {
    /// Samples kept per tolerance range before further matches are rejected.
    pub capacity_per_range: usize,
    /// Fractional half-width used when deriving ranges from targets (0.04 = ±4%).
    pub tolerance: f64,
}

impl Default for SessionCfg {
    fn default() -> Self {
        Self {
            capacity_per_range: 5,
            tolerance: 0.04,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FeedCfg {
    /// Port path, or "-" for stdin.
    pub connection: String,
    pub baud: u32,
    /// Poll interval for the consumer loop; bounds stop latency.
    pub poll_ms: u64,
    /// Transport read timeout per line (serial only).
    pub read_timeout_ms: u64,
}

impl Default for FeedCfg {
    fn default() -> Self {
        Self {
            connection: "-".to_string(),
            baud: 9600,
            poll_ms: 10,
            read_timeout_ms: 1000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ForwardingCfg {
    /// Persistence queue bound; 0 means unbounded.
    pub queue_capacity: usize,
    /// How long the producer may wait on a full queue before dropping the oldest event.
    pub enqueue_timeout_ms: u64,
}

impl Default for ForwardingCfg {
    fn default() -> Self {
        Self {
            queue_capacity: 0,
            enqueue_timeout_ms: 5,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DisplayCfg {
    pub refresh_ms: u64,
}

impl Default for DisplayCfg {
    fn default() -> Self {
        Self { refresh_ms: 100 }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

/// Explicit range override for a profile row.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RangeCfg {
    pub target: f64,
    pub low: f64,
    pub high: f64,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ProfileCfg {
    pub max_rating: f64,
    #[serde(default)]
    pub kind: ToolKind,
    pub unit: String,
    /// Applied torques; ranges are derived from these with `session.tolerance`.
    #[serde(default)]
    pub targets: Vec<f64>,
    /// When present, used verbatim instead of deriving from `targets`.
    #[serde(default)]
    pub ranges: Vec<RangeCfg>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Config {
    pub session: SessionCfg,
    pub feed: FeedCfg,
    pub forwarding: ForwardingCfg,
    pub display: DisplayCfg,
    pub logging: Logging,
    pub profiles: Vec<ProfileCfg>,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Parse an allowance label such as `"67.2 - 72.8"` into `(low, high)`.
pub fn parse_range(label: &str) -> eyre::Result<(f64, f64)> {
    let (low, high) = label
        .split_once('-')
        .ok_or_else(|| eyre::eyre!("range {label:?} must look like 'low - high'"))?;
    let low: f64 = low
        .trim()
        .parse()
        .map_err(|e| eyre::eyre!("range {label:?}: bad low bound: {e}"))?;
    let high: f64 = high
        .trim()
        .parse()
        .map_err(|e| eyre::eyre!("range {label:?}: bad high bound: {e}"))?;
    Ok((low, high))
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

/// Suggested applied torques for a tool of the given rating.
///
/// Wrenches are tested near the top of their scale (95/65/40 %), multipliers in the
/// low band (30/20/10 %). Values are rounded to one decimal.
pub fn suggest_targets(max_rating: f64, kind: ToolKind) -> [f64; 3] {
    let fractions = match kind {
        ToolKind::TorqueMultiplier => [0.3, 0.2, 0.1],
        ToolKind::Wrench => [0.95, 0.65, 0.40],
    };
    fractions.map(|f| round1(max_rating * f))
}

/// The stock tolerance table shipped with the bench.
pub fn default_profiles() -> Vec<ProfileCfg> {
    let table: [(f64, ToolKind, &str, [f64; 3], [&str; 3]); 6] = [
        (
            75.0,
            ToolKind::Wrench,
            "ft/lbs",
            [70.0, 50.0, 30.0],
            ["67.2 - 72.8", "48.0 - 52.0", "28.8 - 31.2"],
        ),
        (
            80.0,
            ToolKind::Wrench,
            "ft/lbs",
            [80.0, 40.0, 20.0],
            ["76.8 - 83.2", "38.4 - 41.6", "19.2 - 20.8"],
        ),
        (
            100.0,
            ToolKind::Wrench,
            "ft/lbs",
            [100.0, 60.0, 30.0],
            ["96.0 - 104.0", "57.6 - 62.4", "28.8 - 31.2"],
        ),
        (
            500.0,
            ToolKind::TorqueMultiplier,
            "ft/lbs",
            [150.0, 100.0, 50.0],
            ["144.0 - 156.0", "96.0 - 104.0", "48.0 - 52.0"],
        ),
        (
            320.0,
            ToolKind::Wrench,
            "NM",
            [300.0, 200.0, 100.0],
            ["288.0 - 312.0", "192.0 - 208.0", "96.0 - 104.0"],
        ),
        (
            240.0,
            ToolKind::Wrench,
            "in/lbs",
            [230.0, 150.0, 80.0],
            ["220.8 - 239.2", "144.0 - 156.0", "76.8 - 83.2"],
        ),
    ];

    table
        .iter()
        .map(|(max_rating, kind, unit, targets, allowances)| {
            let ranges = targets
                .iter()
                .zip(allowances.iter())
                .filter_map(|(target, label)| {
                    parse_range(label).ok().map(|(low, high)| RangeCfg {
                        target: *target,
                        low,
                        high,
                        label: Some((*label).to_string()),
                    })
                })
                .collect();
            ProfileCfg {
                max_rating: *max_rating,
                kind: *kind,
                unit: (*unit).to_string(),
                targets: targets.to_vec(),
                ranges,
            }
        })
        .collect()
}

/// Profile CSV schema.
///
/// Expected headers:
/// max_rating,kind,unit,targets
///
/// Example:
/// max_rating,kind,unit,targets
/// 75,wrench,ft/lbs,70;50;30
#[derive(Debug, Deserialize)]
struct ProfileCsvRow {
    max_rating: f64,
    kind: ToolKind,
    unit: String,
    targets: String,
}

pub fn load_profiles_csv(path: &std::path::Path) -> eyre::Result<Vec<ProfileCfg>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open profile CSV {:?}: {}", path, e))?;

    // Enforce exact headers
    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = ["max_rating", "kind", "unit", "targets"];
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != expected {
        eyre::bail!(
            "profile CSV must have headers 'max_rating,kind,unit,targets', got: {}",
            actual.join(",")
        );
    }

    let mut profiles = Vec::new();
    for (idx, rec) in rdr.deserialize::<ProfileCsvRow>().enumerate() {
        let line = idx + 2;
        let row = rec.map_err(|e| eyre::eyre!("invalid CSV row {line}: {e}"))?;
        let targets = row
            .targets
            .split(';')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| {
                t.parse::<f64>()
                    .map_err(|e| eyre::eyre!("invalid CSV row {line}: target {t:?}: {e}"))
            })
            .collect::<eyre::Result<Vec<f64>>>()?;
        if targets.is_empty() {
            eyre::bail!("invalid CSV row {line}: at least one target is required");
        }
        profiles.push(ProfileCfg {
            max_rating: row.max_rating,
            kind: row.kind,
            unit: row.unit,
            targets,
            ranges: Vec::new(),
        });
    }

    Ok(profiles)
}

impl ProfileCfg {
    pub fn validate(&self, idx: usize) -> eyre::Result<()> {
        if !(self.max_rating.is_finite() && self.max_rating > 0.0) {
            eyre::bail!("profiles[{idx}].max_rating must be > 0");
        }
        if self.unit.trim().is_empty() {
            eyre::bail!("profiles[{idx}].unit must not be empty");
        }
        if self.targets.is_empty() && self.ranges.is_empty() {
            eyre::bail!("profiles[{idx}] needs at least one target or range");
        }
        if let Some(t) = self
            .targets
            .iter()
            .find(|t| !(t.is_finite() && **t > 0.0))
        {
            eyre::bail!("profiles[{idx}].targets must be > 0, got {t}");
        }
        for (j, r) in self.ranges.iter().enumerate() {
            if !(r.low.is_finite() && r.high.is_finite() && r.target.is_finite()) {
                eyre::bail!("profiles[{idx}].ranges[{j}] must be finite");
            }
            if r.low > r.high {
                eyre::bail!("profiles[{idx}].ranges[{j}] low must be <= high");
            }
        }
        Ok(())
    }
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Session
        if self.session.capacity_per_range == 0 {
            eyre::bail!("session.capacity_per_range must be >= 1");
        }
        if self.session.capacity_per_range > 100 {
            eyre::bail!("session.capacity_per_range is unreasonably large (>100)");
        }
        if !(self.session.tolerance > 0.0 && self.session.tolerance <= 0.5) {
            eyre::bail!("session.tolerance must be in (0.0, 0.5]");
        }

        // Feed
        if self.feed.connection.trim().is_empty() {
            eyre::bail!("feed.connection must not be empty");
        }
        if !STANDARD_BAUD_RATES.contains(&self.feed.baud) {
            eyre::bail!(
                "feed.baud must be one of {:?}, got {}",
                STANDARD_BAUD_RATES,
                self.feed.baud
            );
        }
        if self.feed.poll_ms == 0 || self.feed.poll_ms > 1000 {
            eyre::bail!("feed.poll_ms must be in [1, 1000]");
        }
        if self.feed.read_timeout_ms == 0 {
            eyre::bail!("feed.read_timeout_ms must be >= 1");
        }

        // Forwarding
        if self.forwarding.queue_capacity > 0 && self.forwarding.enqueue_timeout_ms == 0 {
            eyre::bail!("forwarding.enqueue_timeout_ms must be >= 1 when the queue is bounded");
        }

        // Display
        if self.display.refresh_ms < 10 {
            eyre::bail!("display.refresh_ms must be >= 10");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        for (idx, p) in self.profiles.iter().enumerate() {
            p.validate(idx)?;
        }

        Ok(())
    }

    /// Configured profiles, or the stock table when none are configured.
    pub fn profiles_or_default(&self) -> Vec<ProfileCfg> {
        if self.profiles.is_empty() {
            default_profiles()
        } else {
            self.profiles.clone()
        }
    }
}
