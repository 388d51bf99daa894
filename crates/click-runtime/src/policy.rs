use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::dom::{Document, NodeId};
use crate::error::ConfigError;
use crate::gate::ActivationPatterns;
use crate::selector::Selector;

/// Whether the selector lists name what may be clicked or what may not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Mode {
    /// Only elements matching a whitelist selector are interactive.
    Whitelist,
    /// Everything except elements matching a blacklist selector is interactive.
    Blacklist,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Whitelist => "WHITELIST",
            Self::Blacklist => "BLACKLIST",
        }
    }

    /// Exact, case-sensitive match on `WHITELIST` or `BLACKLIST`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "WHITELIST" => Some(Self::Whitelist),
            "BLACKLIST" => Some(Self::Blacklist),
            _ => None,
        }
    }
}

impl FromStr for Mode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value).ok_or_else(|| ConfigError::InvalidMode(value.to_string()))
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How aggressively click-family event delivery is restricted. Reconciliation
/// of pointer interactivity runs at every level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum EnforcementLevel {
    /// Reconciliation only.
    None,
    /// Capture-phase listeners halt unauthorized click-family events.
    PropagationBlock,
    /// Click-family listener registrations are dropped.
    #[default]
    RegistrationBlock,
}

impl EnforcementLevel {
    pub fn as_u8(self) -> u8 {
        match self {
            Self::None => 0,
            Self::PropagationBlock => 1,
            Self::RegistrationBlock => 2,
        }
    }
}

impl TryFrom<i64> for EnforcementLevel {
    type Error = ConfigError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::PropagationBlock),
            2 => Ok(Self::RegistrationBlock),
            other => Err(ConfigError::InvalidEnforcementLevel(other)),
        }
    }
}

impl fmt::Display for EnforcementLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::PropagationBlock => "propagation-block",
            Self::RegistrationBlock => "registration-block",
        };
        write!(f, "{} ({})", self.as_u8(), name)
    }
}

/// Injected configuration as written by the host, before validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClickPolicyConfig {
    pub mode: String,
    pub whitelist: Vec<String>,
    pub blacklist: Vec<String>,
    #[serde(alias = "blockWindowClickListeners")]
    pub enforcement_level: i64,
    pub stop_click_propagation: bool,
    pub block_window_open_method: bool,
    pub allow_debugger: bool,
    #[serde(alias = "enableOnPagesIncluding")]
    pub activation_patterns: Vec<String>,
}

impl Default for ClickPolicyConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Whitelist.as_str().to_string(),
            whitelist: Vec::new(),
            blacklist: Vec::new(),
            enforcement_level: i64::from(EnforcementLevel::default().as_u8()),
            stop_click_propagation: false,
            block_window_open_method: false,
            allow_debugger: true,
            activation_patterns: Vec::new(),
        }
    }
}

/// Validated, immutable click policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickPolicy {
    mode: Mode,
    whitelist: Vec<Selector>,
    blacklist: Vec<Selector>,
    enforcement_level: EnforcementLevel,
    stop_click_propagation: bool,
    block_window_open: bool,
    allow_debugger: bool,
    activation: ActivationPatterns,
}

impl ClickPolicy {
    pub fn builder() -> ClickPolicyBuilder {
        ClickPolicyBuilder::default()
    }

    pub fn from_config(config: &ClickPolicyConfig) -> Result<Self, ConfigError> {
        let mode = config.mode.parse::<Mode>()?;
        let enforcement_level = EnforcementLevel::try_from(config.enforcement_level)?;
        let whitelist = Selector::parse_all(&config.whitelist).map_err(|source| {
            ConfigError::InvalidSelector {
                list: "whitelist",
                source,
            }
        })?;
        let blacklist = Selector::parse_all(&config.blacklist).map_err(|source| {
            ConfigError::InvalidSelector {
                list: "blacklist",
                source,
            }
        })?;

        Ok(Self {
            mode,
            whitelist,
            blacklist,
            enforcement_level,
            stop_click_propagation: config.stop_click_propagation,
            block_window_open: config.block_window_open_method,
            allow_debugger: config.allow_debugger,
            activation: ActivationPatterns::new(config.activation_patterns.iter().cloned()),
        })
    }

    pub fn to_config(&self) -> ClickPolicyConfig {
        ClickPolicyConfig {
            mode: self.mode.as_str().to_string(),
            whitelist: selector_sources(&self.whitelist),
            blacklist: selector_sources(&self.blacklist),
            enforcement_level: i64::from(self.enforcement_level.as_u8()),
            stop_click_propagation: self.stop_click_propagation,
            block_window_open_method: self.block_window_open,
            allow_debugger: self.allow_debugger,
            activation_patterns: self.activation.patterns().to_vec(),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn whitelist(&self) -> &[Selector] {
        &self.whitelist
    }

    pub fn blacklist(&self) -> &[Selector] {
        &self.blacklist
    }

    pub fn enforcement_level(&self) -> EnforcementLevel {
        self.enforcement_level
    }

    pub fn stop_click_propagation(&self) -> bool {
        self.stop_click_propagation
    }

    pub fn block_window_open(&self) -> bool {
        self.block_window_open
    }

    pub fn allow_debugger(&self) -> bool {
        self.allow_debugger
    }

    pub fn activation(&self) -> &ActivationPatterns {
        &self.activation
    }

    /// Fresh page state captured by value from this policy.
    pub fn initial_state(&self) -> PolicyState {
        PolicyState {
            mode: self.mode,
            whitelist: self.whitelist.clone(),
            blacklist: self.blacklist.clone(),
            stop_click_propagation: self.stop_click_propagation,
        }
    }
}

impl TryFrom<ClickPolicyConfig> for ClickPolicy {
    type Error = ConfigError;

    fn try_from(config: ClickPolicyConfig) -> Result<Self, Self::Error> {
        Self::from_config(&config)
    }
}

impl Default for ClickPolicy {
    fn default() -> Self {
        Self {
            mode: Mode::Whitelist,
            whitelist: Vec::new(),
            blacklist: Vec::new(),
            enforcement_level: EnforcementLevel::default(),
            stop_click_propagation: false,
            block_window_open: false,
            allow_debugger: true,
            activation: ActivationPatterns::default(),
        }
    }
}

/// Builder for [`ClickPolicy`]; validation happens in [`build`](Self::build).
#[derive(Debug, Clone, Default)]
pub struct ClickPolicyBuilder {
    config: ClickPolicyConfig,
}

impl ClickPolicyBuilder {
    pub fn mode(mut self, mode: Mode) -> Self {
        self.config.mode = mode.as_str().to_string();
        self
    }

    pub fn whitelist<I, S>(mut self, selectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.whitelist = selectors.into_iter().map(Into::into).collect();
        self
    }

    pub fn blacklist<I, S>(mut self, selectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.blacklist = selectors.into_iter().map(Into::into).collect();
        self
    }

    pub fn enforcement_level(mut self, level: i64) -> Self {
        self.config.enforcement_level = level;
        self
    }

    pub fn stop_click_propagation(mut self, enabled: bool) -> Self {
        self.config.stop_click_propagation = enabled;
        self
    }

    pub fn block_window_open(mut self, enabled: bool) -> Self {
        self.config.block_window_open_method = enabled;
        self
    }

    pub fn allow_debugger(mut self, enabled: bool) -> Self {
        self.config.allow_debugger = enabled;
        self
    }

    pub fn activation_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.activation_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn build(self) -> Result<ClickPolicy, ConfigError> {
        ClickPolicy::from_config(&self.config)
    }
}

/// Page-scoped live policy. Enforcement reads it on every check; the host
/// mutates it through the page channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyState {
    mode: Mode,
    whitelist: Vec<Selector>,
    blacklist: Vec<Selector>,
    stop_click_propagation: bool,
}

impl PolicyState {
    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    pub fn whitelist(&self) -> &[Selector] {
        &self.whitelist
    }

    pub fn blacklist(&self) -> &[Selector] {
        &self.blacklist
    }

    pub fn stop_click_propagation(&self) -> bool {
        self.stop_click_propagation
    }

    pub fn set_stop_click_propagation(&mut self, enabled: bool) {
        self.stop_click_propagation = enabled;
    }

    /// Appends to the whitelist in a single assignment. Returns the new length.
    pub fn extend_whitelist(&mut self, selectors: Vec<Selector>) -> usize {
        self.whitelist = [std::mem::take(&mut self.whitelist), selectors].concat();
        self.whitelist.len()
    }

    /// Appends to the blacklist in a single assignment. Returns the new length.
    pub fn extend_blacklist(&mut self, selectors: Vec<Selector>) -> usize {
        self.blacklist = [std::mem::take(&mut self.blacklist), selectors].concat();
        self.blacklist.len()
    }

    pub fn whitelisted_by(&self, document: &Document, node: NodeId) -> Option<&Selector> {
        self.whitelist
            .iter()
            .find(|selector| selector.matches(document, node))
    }

    pub fn blacklisted_by(&self, document: &Document, node: NodeId) -> Option<&Selector> {
        self.blacklist
            .iter()
            .find(|selector| selector.matches(document, node))
    }

    /// Whether `node` may receive pointer interaction under the current mode.
    /// Only the active mode's list is consulted.
    pub fn permits(&self, document: &Document, node: NodeId) -> bool {
        match self.mode {
            Mode::Whitelist => self.whitelisted_by(document, node).is_some(),
            Mode::Blacklist => self.blacklisted_by(document, node).is_none(),
        }
    }

    pub fn active_list(&self) -> ActiveList {
        match self.mode {
            Mode::Whitelist => ActiveList::Whitelist(selector_sources(&self.whitelist)),
            Mode::Blacklist => ActiveList::Blacklist(selector_sources(&self.blacklist)),
        }
    }
}

/// The list consulted under the current mode, as read from a live page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActiveList {
    Whitelist(Vec<String>),
    Blacklist(Vec<String>),
}

impl ActiveList {
    pub fn mode(&self) -> Mode {
        match self {
            Self::Whitelist(_) => Mode::Whitelist,
            Self::Blacklist(_) => Mode::Blacklist,
        }
    }

    pub fn selectors(&self) -> &[String] {
        match self {
            Self::Whitelist(selectors) | Self::Blacklist(selectors) => selectors,
        }
    }
}

fn selector_sources(selectors: &[Selector]) -> Vec<String> {
    selectors
        .iter()
        .map(|selector| selector.as_str().to_string())
        .collect()
}
