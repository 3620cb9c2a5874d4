//! Client agent grammar and allow-lists.
//!
//! Every first-party client identifies itself with an `x-client-agent` header
//! of the form
//!
//! ```text
//! Product/Version (Platform[; extra])
//! ```
//!
//! where `Product` and `Platform` come from closed allow-lists and `Version`
//! is one or more dot-separated numeric groups. Matching is case-insensitive.
//! The lists only grow by adding a variant here; unknown tokens are rejected
//! even when the string is otherwise well formed.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

/// Caller identities allowed to talk to the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Product {
    /// Public SDK.
    Gsdk,
    /// Clinician web portal.
    Portal,
    /// Internal admin console.
    Admin,
    /// Mobile dictation app.
    Mobile,
    /// Marketing site.
    Site,
    /// Command-line tooling.
    Cli,
    /// GraphQL backend.
    Graph,
    /// Operations tooling.
    Ops,
    /// Background workers.
    Worker,
    /// Edge functions.
    Edge,
}

impl Product {
    /// Every allowed product.
    pub const ALL: [Self; 10] = [
        Self::Gsdk,
        Self::Portal,
        Self::Admin,
        Self::Mobile,
        Self::Site,
        Self::Cli,
        Self::Graph,
        Self::Ops,
        Self::Worker,
        Self::Edge,
    ];

    /// Canonical spelling of the token.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gsdk => "GSDK",
            Self::Portal => "Portal",
            Self::Admin => "Admin",
            Self::Mobile => "Mobile",
            Self::Site => "Site",
            Self::Cli => "CLI",
            Self::Graph => "Graph",
            Self::Ops => "Ops",
            Self::Worker => "Worker",
            Self::Edge => "Edge",
        }
    }
}

impl FromStr for Product {
    type Err = AgentParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or(AgentParseError)
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runtime platforms a client may run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    /// Browser.
    Web,
    /// Node.js.
    Node,
    /// React Native.
    ReactNative,
    /// Next.js server runtime.
    Next,
    /// Terminal.
    Cli,
}

impl Platform {
    /// Every allowed platform.
    pub const ALL: [Self; 5] = [Self::Web, Self::Node, Self::ReactNative, Self::Next, Self::Cli];

    /// Canonical spelling of the token.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Web => "web",
            Self::Node => "node",
            Self::ReactNative => "rn",
            Self::Next => "next",
            Self::Cli => "cli",
        }
    }
}

impl FromStr for Platform {
    type Err = AgentParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or(AgentParseError)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The agent string did not match the grammar or the allow-lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("client agent does not match Product/Version (Platform[; extra])")]
pub struct AgentParseError;

static AGENT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    let products = Product::ALL.map(|p| p.as_str()).join("|");
    let platforms = Platform::ALL.map(|p| p.as_str()).join("|");
    Regex::new(&format!(
        r"(?i)^({products})/([0-9]+(?:\.[0-9]+)*)\s+\(({platforms})(?:;([^)]*))?\)$"
    ))
    .expect("client agent pattern is valid")
});

/// A parsed client agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientAgent {
    /// Calling product.
    pub product: Product,
    /// Dot-separated numeric version.
    pub version: String,
    /// Runtime platform.
    pub platform: Platform,
    /// Free-form detail after the platform, trimmed.
    pub extra: Option<String>,
}

impl ClientAgent {
    /// Build an agent without extra detail.
    pub fn new(product: Product, version: impl Into<String>, platform: Platform) -> Self {
        Self {
            product,
            version: version.into(),
            platform,
            extra: None,
        }
    }

    /// Attach free-form detail, e.g. an OS or build identifier.
    #[must_use]
    pub fn with_extra(mut self, extra: impl Into<String>) -> Self {
        self.extra = Some(extra.into());
        self
    }
}

impl FromStr for ClientAgent {
    type Err = AgentParseError;

    /// Parse an agent header value.
    ///
    /// # Examples
    ///
    /// ```
    /// use medscribe_auth::user_agent::{ClientAgent, Platform, Product};
    ///
    /// let agent: ClientAgent = "portal/2.14.0 (WEB; macOS)".parse().unwrap();
    /// assert_eq!(agent.product, Product::Portal);
    /// assert_eq!(agent.platform, Platform::Web);
    /// assert_eq!(agent.extra.as_deref(), Some("macOS"));
    ///
    /// assert!("Evil/1.0 (web)".parse::<ClientAgent>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = AGENT_PATTERN.captures(s).ok_or(AgentParseError)?;
        let product = caps[1].parse()?;
        let platform = caps[3].parse()?;
        let extra = caps
            .get(4)
            .map(|m| m.as_str().trim().to_owned())
            .filter(|e| !e.is_empty());

        Ok(Self {
            product,
            version: caps[2].to_owned(),
            platform,
            extra,
        })
    }
}

impl fmt::Display for ClientAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} ({}", self.product, self.version, self.platform)?;
        if let Some(extra) = &self.extra {
            write!(f, "; {extra}")?;
        }
        f.write_str(")")
    }
}
