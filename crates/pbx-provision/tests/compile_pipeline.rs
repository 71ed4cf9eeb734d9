use std::collections::BTreeMap;
use std::fs;
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;

use pbx_provision::provisioning::{
    ArtifactPublisher, DialPattern, EngineControl, EngineControlError, Extension, ExtensionRange,
    ForeignIndex, InboundRoute, OutboundRule, Provisioner, ReasonCode, RecordSupplier,
    ReloadController, ReloadStrategy, RingGroup, RingStrategy, RouteTarget, Stage, SupplierError,
    Tenant, TenantId, TenantRecords, TimeoutAction, Transport, Trunk,
};

fn tenant(id: &str, domain: &str, context: &str, profile: &str, start: u32, end: u32) -> Tenant {
    Tenant {
        id: TenantId(id.to_string()),
        name: format!("{id} inc"),
        domain: domain.to_string(),
        context: context.to_string(),
        profile: profile.to_string(),
        codecs: vec!["PCMU".to_string()],
        extension_range: ExtensionRange { start, end },
    }
}

fn acme() -> TenantRecords {
    let mut records = TenantRecords::new(tenant(
        "acme",
        "acme.example.com",
        "acme",
        "acme-internal",
        1000,
        1999,
    ));
    records.extensions.push(Extension {
        id: "ext-alice".to_string(),
        number: 1001,
        display_name: "Alice".to_string(),
        secret: "s3cret".to_string(),
    });
    records.trunks.push(Trunk {
        id: "trunk-t1".to_string(),
        name: "metro-one".to_string(),
        host: "sip.carrier.example.net".to_string(),
        port: 5060,
        transport: Transport::Udp,
        codecs: vec!["PCMU".to_string()],
        username: None,
        password: None,
    });
    records.ring_groups.push(RingGroup {
        id: "grp-support".to_string(),
        number: 2000,
        strategy: RingStrategy::Simultaneous,
        members: vec!["ext-alice".to_string()],
        ring_timeout_secs: 20,
        timeout_action: TimeoutAction::Extension("ext-alice".to_string()),
    });
    records.outbound_rules.push(OutboundRule {
        id: "out-national".to_string(),
        pattern: DialPattern::Prefix("9XXXXXXXXX".to_string()),
        trunk_id: "trunk-t1".to_string(),
        priority: 1,
        rewrite: None,
    });
    records.inbound_routes.push(InboundRoute {
        id: "did-main".to_string(),
        did: "15155550100".to_string(),
        target: RouteTarget::RingGroup("grp-support".to_string()),
        caller_id_override: None,
    });
    records
}

struct MapSupplier {
    tenants: BTreeMap<TenantId, TenantRecords>,
}

impl MapSupplier {
    fn new(all: Vec<TenantRecords>) -> Self {
        let tenants = all
            .into_iter()
            .map(|records| (records.tenant.id.clone(), records))
            .collect();
        Self { tenants }
    }
}

impl RecordSupplier for MapSupplier {
    fn records(&self, tenant: &TenantId) -> Result<TenantRecords, SupplierError> {
        self.tenants
            .get(tenant)
            .cloned()
            .ok_or_else(|| SupplierError::TenantNotFound(tenant.clone()))
    }

    fn foreign_index(&self, tenant: &TenantId) -> Result<ForeignIndex, SupplierError> {
        let mut foreign = ForeignIndex::default();
        for (owner, records) in &self.tenants {
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
        Ok(self.tenants.keys().cloned().collect())
    }
}

struct StubEngine {
    accept: bool,
}

#[async_trait]
impl EngineControl for StubEngine {
    async fn is_running(&self) -> Result<bool, EngineControlError> {
        Ok(true)
    }

    async fn reload(&self, strategy: &ReloadStrategy) -> Result<(), EngineControlError> {
        if self.accept {
            Ok(())
        } else {
            Err(EngineControlError::CommandFailed {
                command: strategy.command.join(" "),
                status: "exit status: 1".to_string(),
                stderr: "busy".to_string(),
            })
        }
    }
}

fn provisioner(
    root: &TempDir,
    supplier: MapSupplier,
    accept_reloads: bool,
) -> Provisioner<MapSupplier> {
    Provisioner::new(
        Arc::new(supplier),
        ArtifactPublisher::new(root.path()),
        ReloadController::new(
            Arc::new(StubEngine {
                accept: accept_reloads,
            }),
            vec![ReloadStrategy::new(
                "reload-xml",
                vec!["fs_cli".to_string(), "-x".to_string(), "reloadxml".to_string()],
            )],
        ),
    )
}

#[tokio::test]
async fn compiles_a_tenant_end_to_end() {
    let root = TempDir::new().expect("temp root");
    let provisioner = provisioner(&root, MapSupplier::new(vec![acme()]), true);

    let outcome = provisioner.provision(&TenantId("acme".to_string())).await;
    assert!(outcome.success, "{}", outcome.detail);
    assert!(outcome.warning.is_none());

    let dialplan =
        fs::read_to_string(root.path().join("dialplan/acme.xml")).expect("dialplan published");
    assert!(dialplan.contains("expression=\"^(1[0-9]{3})$\""));
    assert!(dialplan.contains("sofia/gateway/metro-one/$1"));

    let directory = fs::read_to_string(root.path().join("directory/acme.example.com.xml"))
        .expect("directory published");
    assert!(directory.contains("<user id=\"1001\">"));

    let profile = fs::read_to_string(root.path().join("sip_profiles/acme-internal.xml"))
        .expect("profile published");
    assert!(profile.contains("<gateway name=\"metro-one\">"));
}

#[tokio::test]
async fn repeated_passes_produce_identical_bytes() {
    let root = TempDir::new().expect("temp root");
    let provisioner = provisioner(&root, MapSupplier::new(vec![acme()]), true);
    let tenant = TenantId("acme".to_string());

    provisioner.provision(&tenant).await;
    let first = fs::read(root.path().join("dialplan/acme.xml")).expect("first pass");
    provisioner.provision(&tenant).await;
    let second = fs::read(root.path().join("dialplan/acme.xml")).expect("second pass");
    assert_eq!(first, second);
}

#[tokio::test]
async fn cross_tenant_did_conflicts_block_compilation() {
    let root = TempDir::new().expect("temp root");

    let mut globex = TenantRecords::new(tenant(
        "globex",
        "globex.example.net",
        "globex",
        "globex-internal",
        3000,
        3999,
    ));
    globex.inbound_routes.push(InboundRoute {
        id: "did-clash".to_string(),
        // Same DID the acme fixture claims.
        did: "15155550100".to_string(),
        target: RouteTarget::Extension("ext-missing".to_string()),
        caller_id_override: None,
    });

    let provisioner = provisioner(&root, MapSupplier::new(vec![acme(), globex]), true);
    let outcome = provisioner.provision(&TenantId("acme".to_string())).await;

    assert!(!outcome.success);
    assert_eq!(outcome.stage, Stage::Validate);
    let collision = outcome
        .violations
        .iter()
        .find(|violation| violation.code == ReasonCode::DuplicateDid)
        .expect("DID collision reported");
    assert!(collision.detail.contains("globex"), "{}", collision.detail);
    assert!(
        !root.path().join("dialplan/acme.xml").exists(),
        "invalid snapshots publish nothing"
    );
}

#[tokio::test]
async fn failed_publish_retains_the_previous_documents() {
    let root = TempDir::new().expect("temp root");
    let provisioner = provisioner(&root, MapSupplier::new(vec![acme()]), true);
    let tenant = TenantId("acme".to_string());

    let first = provisioner.provision(&tenant).await;
    assert!(first.success, "{}", first.detail);
    let published = fs::read(root.path().join("dialplan/acme.xml")).expect("published");

    // Make the profile target unwritable so the second pass fails after the
    // directory and dialplan documents were already replaced.
    fs::remove_dir_all(root.path().join("sip_profiles")).expect("clear profiles");
    fs::write(root.path().join("sip_profiles"), b"in the way").expect("block the path");

    let second = provisioner.provision(&tenant).await;
    assert!(!second.success);
    assert_eq!(second.stage, Stage::Publish);
    assert!(second.detail.contains("safe to retry"), "{}", second.detail);

    let retained = fs::read(root.path().join("dialplan/acme.xml")).expect("still present");
    assert_eq!(published, retained, "rollback restored the previous tree");
}

#[tokio::test]
async fn rejected_reload_still_counts_as_published() {
    let root = TempDir::new().expect("temp root");
    let provisioner = provisioner(&root, MapSupplier::new(vec![acme()]), false);

    let outcome = provisioner.provision(&TenantId("acme".to_string())).await;
    assert!(outcome.success);
    let warning = outcome.warning.expect("reload warning");
    assert!(warning.detail.contains("reload-xml"), "{}", warning.detail);
    assert!(root.path().join("dialplan/acme.xml").exists());
}
