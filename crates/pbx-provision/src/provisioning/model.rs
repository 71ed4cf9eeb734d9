use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of one customer organization whose telephony configuration is
/// independent of all others.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TenantId(pub String);

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Inclusive numbering span reserved for a tenant's internal extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionRange {
    pub start: u32,
    pub end: u32,
}

impl ExtensionRange {
    pub fn contains(&self, number: u32) -> bool {
        number >= self.start && number <= self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: TenantId,
    pub name: String,
    /// Signaling domain, unique across all tenants.
    pub domain: String,
    /// Dial-plan context name, unique across all tenants.
    pub context: String,
    /// Signaling-profile name, unique across all tenants.
    pub profile: String,
    /// Preferred media codecs in negotiation order.
    pub codecs: Vec<String>,
    pub extension_range: ExtensionRange,
}

impl Tenant {
    /// Codec preference string as the engine consumes it.
    pub fn codec_string(&self) -> String {
        self.codecs.join(",")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extension {
    pub id: String,
    pub number: u32,
    pub display_name: String,
    /// Registration credential consumed by the engine's directory.
    pub secret: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transport {
    Udp,
    Tcp,
    Tls,
}

impl Transport {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Udp => "udp",
            Self::Tcp => "tcp",
            Self::Tls => "tls",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trunk {
    pub id: String,
    pub name: String,
    pub host: String,
    pub port: u16,
    pub transport: Transport,
    pub codecs: Vec<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RingStrategy {
    Simultaneous,
    Sequential,
    RoundRobin,
}

impl RingStrategy {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Simultaneous => "simultaneous",
            Self::Sequential => "sequential",
            Self::RoundRobin => "round-robin",
        }
    }
}

/// What a ring group does when no member answers within the ring timeout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutAction {
    None,
    /// Route to another extension's voicemail-style destination.
    Extension(String),
    /// Literal engine destination string.
    Destination(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RingGroup {
    pub id: String,
    pub number: u32,
    pub strategy: RingStrategy,
    /// Extension ids, in hunt order for ordered strategies.
    pub members: Vec<String>,
    pub ring_timeout_secs: u16,
    pub timeout_action: TimeoutAction,
}

/// Match pattern for dialed numbers.
///
/// Prefix patterns use the numbering wildcards `X` (0-9), `N` (2-9), `Z`
/// (1-9) and a trailing `.` (one or more further digits) over the literals
/// `0-9 * #`. Regex patterns are taken verbatim and anchored when compiled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialPattern {
    Prefix(String),
    Regex(String),
}

impl fmt::Display for DialPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prefix(raw) => write!(f, "prefix:{raw}"),
            Self::Regex(raw) => write!(f, "regex:{raw}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundRule {
    pub id: String,
    pub pattern: DialPattern,
    pub trunk_id: String,
    /// Lower value wins when several rules match the same dialed number;
    /// equal priorities fall back to creation order, first wins.
    pub priority: u16,
    /// Optional `$n` capture template rewriting the dialed number before it
    /// is handed to the trunk.
    pub rewrite: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteTarget {
    Extension(String),
    RingGroup(String),
    IvrFlow(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundRoute {
    pub id: String,
    /// Externally dialed number, unique system-wide.
    pub did: String,
    pub target: RouteTarget,
    pub caller_id_override: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuBranch {
    /// Caller input labeling the edge, unique among the node's branches.
    pub key: String,
    pub next: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IvrNodeKind {
    Start {
        next: String,
    },
    Menu {
        prompt: String,
        branches: Vec<MenuBranch>,
    },
    Transfer {
        target: RouteTarget,
    },
    Action {
        application: String,
        data: String,
        next: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IvrNode {
    pub id: String,
    pub kind: IvrNodeKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IvrFlow {
    pub id: String,
    pub name: String,
    pub nodes: Vec<IvrNode>,
}

impl IvrFlow {
    pub fn node(&self, id: &str) -> Option<&IvrNode> {
        self.nodes.iter().find(|node| node.id == id)
    }
}

/// One tenant's full routing snapshot, assembled fresh per compilation pass.
///
/// Entity vectors are in creation order; the compiler never mutates a
/// snapshot, it only reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantRecords {
    pub tenant: Tenant,
    pub extensions: Vec<Extension>,
    pub trunks: Vec<Trunk>,
    pub ring_groups: Vec<RingGroup>,
    pub outbound_rules: Vec<OutboundRule>,
    pub inbound_routes: Vec<InboundRoute>,
    pub ivr_flows: Vec<IvrFlow>,
}

impl TenantRecords {
    pub fn new(tenant: Tenant) -> Self {
        Self {
            tenant,
            extensions: Vec::new(),
            trunks: Vec::new(),
            ring_groups: Vec::new(),
            outbound_rules: Vec::new(),
            inbound_routes: Vec::new(),
            ivr_flows: Vec::new(),
        }
    }

    pub fn extension(&self, id: &str) -> Option<&Extension> {
        self.extensions.iter().find(|ext| ext.id == id)
    }

    pub fn extension_by_number(&self, number: u32) -> Option<&Extension> {
        self.extensions.iter().find(|ext| ext.number == number)
    }

    pub fn trunk(&self, id: &str) -> Option<&Trunk> {
        self.trunks.iter().find(|trunk| trunk.id == id)
    }

    pub fn ring_group(&self, id: &str) -> Option<&RingGroup> {
        self.ring_groups.iter().find(|group| group.id == id)
    }

    pub fn ivr_flow(&self, id: &str) -> Option<&IvrFlow> {
        self.ivr_flows.iter().find(|flow| flow.id == id)
    }
}
