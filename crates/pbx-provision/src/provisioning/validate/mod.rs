//! Single checkpoint for every routing invariant.
//!
//! The entity screens upstream of the record store each used to carry their
//! own ad-hoc checks; everything is enforced here instead, once, against a
//! full tenant snapshot. Validation is all-or-nothing: a snapshot either
//! comes back wrapped as [`ValidatedRecords`] or as the complete violation
//! list, never a partially accepted model.

pub(crate) mod patterns;

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use serde::Serialize;

use super::model::{
    IvrFlow, IvrNodeKind, RouteTarget, TenantRecords, TimeoutAction,
};
use super::supplier::ForeignIndex;

pub use patterns::PatternError;

/// Entity kinds a violation can point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Tenant,
    Extension,
    RingGroup,
    Trunk,
    OutboundRule,
    InboundRoute,
    IvrFlow,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: String,
}

impl EntityRef {
    fn new(kind: EntityKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    InvalidExtensionRange,
    ExtensionOutOfRange,
    DuplicateExtensionNumber,
    DuplicateGroupNumber,
    GroupCollidesWithExtension,
    EmptyGroup,
    UnknownGroupMember,
    UnknownTimeoutExtension,
    ZeroRingTimeout,
    InvalidPattern,
    InvalidRewrite,
    UnknownTrunk,
    EmptyDid,
    MalformedDid,
    DuplicateDid,
    UnknownRouteTarget,
    DomainCollision,
    ContextCollision,
    ProfileCollision,
    IvrMissingStart,
    IvrMultipleStart,
    IvrDanglingEdge,
    IvrUnreachableNode,
    IvrDuplicateBranchKey,
}

/// One rejected invariant, tagged with the offending entity and enough
/// detail for the operator to act on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub entity: EntityRef,
    pub code: ReasonCode,
    pub detail: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:?}/{}: {:?}: {}",
            self.entity.kind, self.entity.id, self.code, self.detail
        )
    }
}

/// A snapshot every check has accepted. The renderer only takes this type,
/// so an unvalidated model cannot reach the engine.
#[derive(Debug, Clone)]
pub struct ValidatedRecords {
    records: TenantRecords,
}

impl ValidatedRecords {
    pub fn records(&self) -> &TenantRecords {
        &self.records
    }

    pub fn into_inner(self) -> TenantRecords {
        self.records
    }
}

/// Run every invariant check against one tenant snapshot.
///
/// `foreign` carries the names other tenants already own; DID, domain,
/// context, and profile uniqueness is system-wide, not per tenant.
pub fn validate(
    records: TenantRecords,
    foreign: &ForeignIndex,
) -> Result<ValidatedRecords, Vec<Violation>> {
    let mut violations = Vec::new();

    check_tenant_names(&records, foreign, &mut violations);
    check_extensions(&records, &mut violations);
    check_ring_groups(&records, &mut violations);
    check_outbound_rules(&records, &mut violations);
    check_inbound_routes(&records, foreign, &mut violations);
    for flow in &records.ivr_flows {
        check_ivr_flow(flow, &mut violations);
    }

    if violations.is_empty() {
        Ok(ValidatedRecords { records })
    } else {
        Err(violations)
    }
}

fn check_tenant_names(
    records: &TenantRecords,
    foreign: &ForeignIndex,
    violations: &mut Vec<Violation>,
) {
    let tenant = &records.tenant;
    let entity = || EntityRef::new(EntityKind::Tenant, tenant.id.0.clone());

    if tenant.extension_range.start > tenant.extension_range.end {
        violations.push(Violation {
            entity: entity(),
            code: ReasonCode::InvalidExtensionRange,
            detail: format!(
                "extension range {}-{} is inverted",
                tenant.extension_range.start, tenant.extension_range.end
            ),
        });
    }

    let collisions = [
        (&tenant.domain, &foreign.domains, ReasonCode::DomainCollision, "domain"),
        (&tenant.context, &foreign.contexts, ReasonCode::ContextCollision, "context"),
        (&tenant.profile, &foreign.profiles, ReasonCode::ProfileCollision, "profile"),
    ];
    for (name, owners, code, what) in collisions {
        if let Some(owner) = owners.get(name.as_str()) {
            violations.push(Violation {
                entity: entity(),
                code,
                detail: format!(
                    "{what} '{name}' is already owned by tenant {owner} (requested by tenant {})",
                    tenant.id
                ),
            });
        }
    }
}

fn check_extensions(records: &TenantRecords, violations: &mut Vec<Violation>) {
    let range = records.tenant.extension_range;
    let mut seen: HashMap<u32, &str> = HashMap::new();

    for extension in &records.extensions {
        let entity = EntityRef::new(EntityKind::Extension, extension.id.clone());
        if !range.contains(extension.number) {
            violations.push(Violation {
                entity: entity.clone(),
                code: ReasonCode::ExtensionOutOfRange,
                detail: format!(
                    "number {} outside tenant range {}-{}",
                    extension.number, range.start, range.end
                ),
            });
        }
        if let Some(existing) = seen.insert(extension.number, extension.id.as_str()) {
            violations.push(Violation {
                entity,
                code: ReasonCode::DuplicateExtensionNumber,
                detail: format!(
                    "number {} already used by extension {existing}",
                    extension.number
                ),
            });
        }
    }
}

fn check_ring_groups(records: &TenantRecords, violations: &mut Vec<Violation>) {
    let extension_numbers: HashSet<u32> =
        records.extensions.iter().map(|ext| ext.number).collect();
    let mut seen: HashMap<u32, &str> = HashMap::new();

    for group in &records.ring_groups {
        let entity = EntityRef::new(EntityKind::RingGroup, group.id.clone());

        if let Some(existing) = seen.insert(group.number, group.id.as_str()) {
            violations.push(Violation {
                entity: entity.clone(),
                code: ReasonCode::DuplicateGroupNumber,
                detail: format!("number {} already used by ring group {existing}", group.number),
            });
        }
        if extension_numbers.contains(&group.number) {
            violations.push(Violation {
                entity: entity.clone(),
                code: ReasonCode::GroupCollidesWithExtension,
                detail: format!("number {} collides with an extension", group.number),
            });
        }
        if group.members.is_empty() {
            violations.push(Violation {
                entity: entity.clone(),
                code: ReasonCode::EmptyGroup,
                detail: "ring group has no members".to_string(),
            });
        }
        for member in &group.members {
            if records.extension(member).is_none() {
                violations.push(Violation {
                    entity: entity.clone(),
                    code: ReasonCode::UnknownGroupMember,
                    detail: format!("member '{member}' is not an extension of this tenant"),
                });
            }
        }
        if group.ring_timeout_secs == 0 {
            violations.push(Violation {
                entity: entity.clone(),
                code: ReasonCode::ZeroRingTimeout,
                detail: "ring timeout must be at least one second".to_string(),
            });
        }
        if let TimeoutAction::Extension(target) = &group.timeout_action {
            if records.extension(target).is_none() {
                violations.push(Violation {
                    entity,
                    code: ReasonCode::UnknownTimeoutExtension,
                    detail: format!("timeout action names unknown extension '{target}'"),
                });
            }
        }
    }
}

fn check_outbound_rules(records: &TenantRecords, violations: &mut Vec<Violation>) {
    for rule in &records.outbound_rules {
        let entity = EntityRef::new(EntityKind::OutboundRule, rule.id.clone());

        match patterns::compile_pattern(&rule.pattern) {
            Ok(_) => {
                if let Some(template) = &rule.rewrite {
                    if let Err(err) = patterns::check_rewrite(&rule.pattern, template) {
                        violations.push(Violation {
                            entity: entity.clone(),
                            code: ReasonCode::InvalidRewrite,
                            detail: err.to_string(),
                        });
                    }
                }
            }
            Err(err) => violations.push(Violation {
                entity: entity.clone(),
                code: ReasonCode::InvalidPattern,
                detail: format!("{}: {err}", rule.pattern),
            }),
        }

        if records.trunk(&rule.trunk_id).is_none() {
            violations.push(Violation {
                entity,
                code: ReasonCode::UnknownTrunk,
                detail: format!("rule targets unknown trunk '{}'", rule.trunk_id),
            });
        }
    }
}

fn check_inbound_routes(
    records: &TenantRecords,
    foreign: &ForeignIndex,
    violations: &mut Vec<Violation>,
) {
    let mut seen: HashMap<&str, &str> = HashMap::new();

    for route in &records.inbound_routes {
        let entity = EntityRef::new(EntityKind::InboundRoute, route.id.clone());

        if route.did.is_empty() {
            violations.push(Violation {
                entity: entity.clone(),
                code: ReasonCode::EmptyDid,
                detail: "route has no DID".to_string(),
            });
        } else if !route.did.chars().all(|c| c.is_ascii_digit() || c == '+') {
            violations.push(Violation {
                entity: entity.clone(),
                code: ReasonCode::MalformedDid,
                detail: format!("DID '{}' contains non-numbering characters", route.did),
            });
        }

        if let Some(existing) = seen.insert(route.did.as_str(), route.id.as_str()) {
            violations.push(Violation {
                entity: entity.clone(),
                code: ReasonCode::DuplicateDid,
                detail: format!("DID {} already routed by inbound route {existing}", route.did),
            });
        }
        // DIDs arrive without a tenant context until resolved, so uniqueness
        // is system-wide; a collision names both owners.
        if let Some(owner) = foreign.dids.get(&route.did) {
            violations.push(Violation {
                entity: entity.clone(),
                code: ReasonCode::DuplicateDid,
                detail: format!(
                    "DID {} is already owned by tenant {owner} (requested by tenant {})",
                    route.did, records.tenant.id
                ),
            });
        }

        if !target_resolves(records, &route.target) {
            violations.push(Violation {
                entity,
                code: ReasonCode::UnknownRouteTarget,
                detail: format!("destination {:?} does not resolve", route.target),
            });
        }
    }
}

fn target_resolves(records: &TenantRecords, target: &RouteTarget) -> bool {
    match target {
        RouteTarget::Extension(id) => records.extension(id).is_some(),
        RouteTarget::RingGroup(id) => records.ring_group(id).is_some(),
        RouteTarget::IvrFlow(id) => records.ivr_flow(id).is_some(),
    }
}

fn check_ivr_flow(flow: &IvrFlow, violations: &mut Vec<Violation>) {
    let entity = EntityRef::new(EntityKind::IvrFlow, flow.id.clone());

    let start_nodes: Vec<&str> = flow
        .nodes
        .iter()
        .filter(|node| matches!(node.kind, IvrNodeKind::Start { .. }))
        .map(|node| node.id.as_str())
        .collect();
    match start_nodes.len() {
        0 => {
            violations.push(Violation {
                entity,
                code: ReasonCode::IvrMissingStart,
                detail: "flow has no start node".to_string(),
            });
            return;
        }
        1 => {}
        extra => {
            violations.push(Violation {
                entity: entity.clone(),
                code: ReasonCode::IvrMultipleStart,
                detail: format!("flow declares {extra} start nodes: {}", start_nodes.join(", ")),
            });
        }
    }

    // Branch keys and edge targets per node.
    for node in &flow.nodes {
        for next in node_edges(&node.kind) {
            if flow.node(next).is_none() {
                violations.push(Violation {
                    entity: entity.clone(),
                    code: ReasonCode::IvrDanglingEdge,
                    detail: format!("node '{}' links to unknown node '{next}'", node.id),
                });
            }
        }
        if let IvrNodeKind::Menu { branches, .. } = &node.kind {
            let mut keys = BTreeSet::new();
            for branch in branches {
                if !keys.insert(branch.key.as_str()) {
                    violations.push(Violation {
                        entity: entity.clone(),
                        code: ReasonCode::IvrDuplicateBranchKey,
                        detail: format!(
                            "menu '{}' maps input '{}' more than once",
                            node.id, branch.key
                        ),
                    });
                }
            }
        }
    }

    // Reachability from the start node.
    let mut reached: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<&str> = VecDeque::new();
    queue.push_back(start_nodes[0]);
    reached.insert(start_nodes[0]);
    while let Some(current) = queue.pop_front() {
        let Some(node) = flow.node(current) else {
            continue;
        };
        for next in node_edges(&node.kind) {
            if flow.node(next).is_some() && reached.insert(next) {
                queue.push_back(next);
            }
        }
    }
    for node in &flow.nodes {
        if !reached.contains(node.id.as_str()) {
            violations.push(Violation {
                entity: entity.clone(),
                code: ReasonCode::IvrUnreachableNode,
                detail: format!("node '{}' is unreachable from the start node", node.id),
            });
        }
    }
}

/// Outgoing edge targets of a node, in declaration order.
pub(crate) fn node_edges(kind: &IvrNodeKind) -> Vec<&str> {
    match kind {
        IvrNodeKind::Start { next } => vec![next.as_str()],
        IvrNodeKind::Menu { branches, .. } => {
            branches.iter().map(|branch| branch.next.as_str()).collect()
        }
        IvrNodeKind::Transfer { .. } => Vec::new(),
        IvrNodeKind::Action { next, .. } => next.iter().map(String::as_str).collect(),
    }
}
