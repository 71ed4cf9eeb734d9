use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::provisioning::model::{
    DialPattern, Extension, ExtensionRange, InboundRoute, IvrFlow, IvrNode, IvrNodeKind,
    MenuBranch, OutboundRule, RingGroup, RingStrategy, RouteTarget, Tenant, TenantId,
    TenantRecords, TimeoutAction, Transport, Trunk,
};
use crate::provisioning::reload::{EngineControl, EngineControlError, ReloadStrategy};
use crate::provisioning::supplier::{ForeignIndex, RecordSupplier, SupplierError};
use async_trait::async_trait;

pub(super) fn acme_tenant() -> Tenant {
    Tenant {
        id: TenantId("acme".to_string()),
        name: "Acme Corporation".to_string(),
        domain: "acme.example.com".to_string(),
        context: "acme".to_string(),
        profile: "acme-internal".to_string(),
        codecs: vec!["PCMU".to_string(), "PCMA".to_string()],
        extension_range: ExtensionRange {
            start: 1000,
            end: 1999,
        },
    }
}

pub(super) fn extension(id: &str, number: u32, name: &str) -> Extension {
    Extension {
        id: id.to_string(),
        number,
        display_name: name.to_string(),
        secret: format!("secret-{number}"),
    }
}

pub(super) fn trunk(id: &str, name: &str) -> Trunk {
    Trunk {
        id: id.to_string(),
        name: name.to_string(),
        host: "sip.carrier.example.net".to_string(),
        port: 5060,
        transport: Transport::Udp,
        codecs: vec!["PCMU".to_string()],
        username: Some("acme-trunk".to_string()),
        password: Some("trunk-secret".to_string()),
    }
}

/// The "Acme" reference tenant: Alice on 1001, a simultaneous ring group on
/// 2000 with Alice as the only member, one outbound rule, one DID, and a
/// two-level IVR.
pub(super) fn acme_records() -> TenantRecords {
    TenantRecords {
        tenant: acme_tenant(),
        extensions: vec![extension("ext-alice", 1001, "Alice"), extension("ext-bob", 1002, "Bob")],
        trunks: vec![trunk("trunk-t1", "metro-one")],
        ring_groups: vec![RingGroup {
            id: "grp-support".to_string(),
            number: 2000,
            strategy: RingStrategy::Simultaneous,
            members: vec!["ext-alice".to_string()],
            ring_timeout_secs: 20,
            timeout_action: TimeoutAction::Extension("ext-alice".to_string()),
        }],
        outbound_rules: vec![OutboundRule {
            id: "out-national".to_string(),
            pattern: DialPattern::Prefix("9XXXXXXXXX".to_string()),
            trunk_id: "trunk-t1".to_string(),
            priority: 1,
            rewrite: None,
        }],
        inbound_routes: vec![InboundRoute {
            id: "did-main".to_string(),
            did: "15155550100".to_string(),
            target: RouteTarget::RingGroup("grp-support".to_string()),
            caller_id_override: Some("Acme Main".to_string()),
        }],
        ivr_flows: vec![main_ivr()],
    }
}

pub(super) fn main_ivr() -> IvrFlow {
    IvrFlow {
        id: "main".to_string(),
        name: "Main menu".to_string(),
        nodes: vec![
            IvrNode {
                id: "start".to_string(),
                kind: IvrNodeKind::Start {
                    next: "welcome".to_string(),
                },
            },
            IvrNode {
                id: "welcome".to_string(),
                kind: IvrNodeKind::Menu {
                    prompt: "prompts/welcome.wav".to_string(),
                    branches: vec![
                        MenuBranch {
                            key: "1".to_string(),
                            next: "sales".to_string(),
                        },
                        MenuBranch {
                            key: "2".to_string(),
                            next: "night".to_string(),
                        },
                    ],
                },
            },
            IvrNode {
                id: "sales".to_string(),
                kind: IvrNodeKind::Transfer {
                    target: RouteTarget::Extension("ext-alice".to_string()),
                },
            },
            IvrNode {
                id: "night".to_string(),
                kind: IvrNodeKind::Action {
                    application: "playback".to_string(),
                    data: "prompts/closed.wav".to_string(),
                    next: None,
                },
            },
        ],
    }
}

pub(super) fn no_foreign() -> ForeignIndex {
    ForeignIndex::default()
}

/// Supplier over a fixed map of snapshots, like the service's in-memory one.
pub(super) struct MemorySupplier {
    records: BTreeMap<TenantId, TenantRecords>,
}

impl MemorySupplier {
    pub(super) fn single(records: TenantRecords) -> Self {
        let mut map = BTreeMap::new();
        map.insert(records.tenant.id.clone(), records);
        Self { records: map }
    }
}

impl RecordSupplier for MemorySupplier {
    fn records(&self, tenant: &TenantId) -> Result<TenantRecords, SupplierError> {
        self.records
            .get(tenant)
            .cloned()
            .ok_or_else(|| SupplierError::TenantNotFound(tenant.clone()))
    }

    fn foreign_index(&self, tenant: &TenantId) -> Result<ForeignIndex, SupplierError> {
        let mut foreign = ForeignIndex::default();
        for (owner, records) in &self.records {
            if owner == tenant {
                continue;
            }
            for route in &records.inbound_routes {
                foreign.dids.insert(route.did.clone(), owner.clone());
            }
            foreign.domains.insert(records.tenant.domain.clone(), owner.clone());
            foreign.contexts.insert(records.tenant.context.clone(), owner.clone());
            foreign.profiles.insert(records.tenant.profile.clone(), owner.clone());
        }
        Ok(foreign)
    }

    fn pending_tenants(&self) -> Result<Vec<TenantId>, SupplierError> {
        Ok(self.records.keys().cloned().collect())
    }
}

/// Engine double with scripted probe/reload behavior and a call log.
pub(super) struct ScriptedEngine {
    pub(super) running: Result<bool, ()>,
    /// Strategy names that should succeed; all others fail.
    pub(super) succeeding: Vec<String>,
    pub(super) reload_calls: Mutex<Vec<String>>,
}

impl ScriptedEngine {
    pub(super) fn running_and_accepting(strategy: &str) -> Self {
        Self {
            running: Ok(true),
            succeeding: vec![strategy.to_string()],
            reload_calls: Mutex::new(Vec::new()),
        }
    }

    pub(super) fn not_running() -> Self {
        Self {
            running: Ok(false),
            succeeding: Vec::new(),
            reload_calls: Mutex::new(Vec::new()),
        }
    }

    pub(super) fn unreachable() -> Self {
        Self {
            running: Err(()),
            succeeding: Vec::new(),
            reload_calls: Mutex::new(Vec::new()),
        }
    }

    pub(super) fn rejecting() -> Self {
        Self {
            running: Ok(true),
            succeeding: Vec::new(),
            reload_calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl EngineControl for ScriptedEngine {
    async fn is_running(&self) -> Result<bool, EngineControlError> {
        self.running
            .map_err(|_| EngineControlError::Misconfigured("probe unreachable".to_string()))
    }

    async fn reload(&self, strategy: &ReloadStrategy) -> Result<(), EngineControlError> {
        self.reload_calls
            .lock()
            .expect("call log mutex poisoned")
            .push(strategy.name.clone());
        if self.succeeding.contains(&strategy.name) {
            Ok(())
        } else {
            Err(EngineControlError::CommandFailed {
                command: strategy.command.join(" "),
                status: "exit status: 1".to_string(),
                stderr: "rejected".to_string(),
            })
        }
    }
}

pub(super) fn strategies() -> Vec<ReloadStrategy> {
    vec![
        ReloadStrategy::new("reload-xml", vec!["fs_cli".to_string(), "-x".to_string(), "reloadxml".to_string()]),
        ReloadStrategy::new("rescan-profiles", vec!["fs_cli".to_string(), "-x".to_string(), "rescan".to_string()]),
    ]
}
