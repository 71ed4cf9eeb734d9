use std::collections::BTreeMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use metrics_exporter_prometheus::PrometheusHandle;
use pbx_provision::provisioning::{
    DialPattern, Extension, ExtensionRange, ForeignIndex, InboundRoute, IvrFlow, IvrNode,
    IvrNodeKind, MenuBranch, OutboundRule, Provisioner, RecordSupplier, RingGroup, RingStrategy,
    RouteTarget, SupplierError, Tenant, TenantId, TenantRecords, TimeoutAction, Transport, Trunk,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) provisioner: Arc<Provisioner<InMemoryRecordSupplier>>,
}

/// Record store backing the service until the tenant database is wired in.
/// Snapshots are keyed by tenant and handed out as clones, so a compilation
/// pass never observes a half-applied mutation.
#[derive(Default)]
pub(crate) struct InMemoryRecordSupplier {
    records: Mutex<BTreeMap<TenantId, TenantRecords>>,
}

impl InMemoryRecordSupplier {
    pub(crate) fn insert(&self, records: TenantRecords) {
        let mut guard = self.records.lock().expect("record mutex poisoned");
        guard.insert(records.tenant.id.clone(), records);
    }
}

impl RecordSupplier for InMemoryRecordSupplier {
    fn records(&self, tenant: &TenantId) -> Result<TenantRecords, SupplierError> {
        let guard = self.records.lock().expect("record mutex poisoned");
        guard
            .get(tenant)
            .cloned()
            .ok_or_else(|| SupplierError::TenantNotFound(tenant.clone()))
    }

    fn foreign_index(&self, tenant: &TenantId) -> Result<ForeignIndex, SupplierError> {
        let guard = self.records.lock().expect("record mutex poisoned");
        let mut foreign = ForeignIndex::default();
        for (owner, records) in guard.iter() {
            if owner == tenant {
                continue;
            }
            for route in &records.inbound_routes {
                foreign.dids.insert(route.did.clone(), owner.clone());
            }
            foreign
                .domains
                .insert(records.tenant.domain.clone(), owner.clone());
            foreign
                .contexts
                .insert(records.tenant.context.clone(), owner.clone());
            foreign
                .profiles
                .insert(records.tenant.profile.clone(), owner.clone());
        }
        Ok(foreign)
    }

    fn pending_tenants(&self) -> Result<Vec<TenantId>, SupplierError> {
        let guard = self.records.lock().expect("record mutex poisoned");
        Ok(guard.keys().cloned().collect())
    }
}

/// Two seed tenants so cross-tenant uniqueness checks have something real to
/// collide with.
pub(crate) fn seeded_supplier() -> InMemoryRecordSupplier {
    let supplier = InMemoryRecordSupplier::default();
    supplier.insert(acme_records());
    supplier.insert(globex_records());
    supplier
}

pub(crate) fn acme_records() -> TenantRecords {
    TenantRecords {
        tenant: Tenant {
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
        },
        extensions: vec![
            Extension {
                id: "ext-alice".to_string(),
                number: 1001,
                display_name: "Alice".to_string(),
                secret: "demo-secret-1001".to_string(),
            },
            Extension {
                id: "ext-bob".to_string(),
                number: 1002,
                display_name: "Bob".to_string(),
                secret: "demo-secret-1002".to_string(),
            },
        ],
        trunks: vec![Trunk {
            id: "trunk-metro".to_string(),
            name: "metro-one".to_string(),
            host: "sip.carrier.example.net".to_string(),
            port: 5060,
            transport: Transport::Udp,
            codecs: vec!["PCMU".to_string()],
            username: Some("acme-trunk".to_string()),
            password: Some("demo-trunk-secret".to_string()),
        }],
        ring_groups: vec![RingGroup {
            id: "grp-support".to_string(),
            number: 2000,
            strategy: RingStrategy::Simultaneous,
            members: vec!["ext-alice".to_string(), "ext-bob".to_string()],
            ring_timeout_secs: 20,
            timeout_action: TimeoutAction::Extension("ext-alice".to_string()),
        }],
        outbound_rules: vec![OutboundRule {
            id: "out-national".to_string(),
            pattern: DialPattern::Prefix("9XXXXXXXXX".to_string()),
            trunk_id: "trunk-metro".to_string(),
            priority: 1,
            rewrite: Some("$1".to_string()),
        }],
        inbound_routes: vec![InboundRoute {
            id: "did-main".to_string(),
            did: "15155550100".to_string(),
            target: RouteTarget::IvrFlow("main".to_string()),
            caller_id_override: Some("Acme Main".to_string()),
        }],
        ivr_flows: vec![IvrFlow {
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
                        prompt: "prompts/acme-welcome.wav".to_string(),
                        branches: vec![
                            MenuBranch {
                                key: "1".to_string(),
                                next: "support".to_string(),
                            },
                            MenuBranch {
                                key: "2".to_string(),
                                next: "closed".to_string(),
                            },
                        ],
                    },
                },
                IvrNode {
                    id: "support".to_string(),
                    kind: IvrNodeKind::Transfer {
                        target: RouteTarget::RingGroup("grp-support".to_string()),
                    },
                },
                IvrNode {
                    id: "closed".to_string(),
                    kind: IvrNodeKind::Action {
                        application: "playback".to_string(),
                        data: "prompts/acme-closed.wav".to_string(),
                        next: None,
                    },
                },
            ],
        }],
    }
}

fn globex_records() -> TenantRecords {
    let mut records = TenantRecords::new(Tenant {
        id: TenantId("globex".to_string()),
        name: "Globex Industries".to_string(),
        domain: "globex.example.net".to_string(),
        context: "globex".to_string(),
        profile: "globex-internal".to_string(),
        codecs: vec!["OPUS".to_string(), "PCMU".to_string()],
        extension_range: ExtensionRange {
            start: 3000,
            end: 3499,
        },
    });
    records.extensions.push(Extension {
        id: "ext-hank".to_string(),
        number: 3001,
        display_name: "Hank".to_string(),
        secret: "demo-secret-3001".to_string(),
    });
    records.inbound_routes.push(InboundRoute {
        id: "did-globex".to_string(),
        did: "15155550199".to_string(),
        target: RouteTarget::Extension("ext-hank".to_string()),
        caller_id_override: None,
    });
    records
}
