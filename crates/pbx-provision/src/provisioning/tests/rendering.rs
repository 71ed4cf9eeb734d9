use super::common::*;
use crate::provisioning::model::{DialPattern, OutboundRule, RingStrategy};
use crate::provisioning::render::render;
use crate::provisioning::validate::validate;
use std::path::PathBuf;

fn rendered(records: crate::provisioning::model::TenantRecords) -> Vec<crate::provisioning::render::RenderedDocument> {
    let validated = validate(records, &no_foreign()).expect("snapshot valid");
    render(&validated).expect("render succeeds")
}

#[test]
fn renders_three_documents_with_stable_paths() {
    let documents = rendered(acme_records());
    let paths: Vec<PathBuf> = documents.iter().map(|doc| doc.relative_path.clone()).collect();
    assert_eq!(
        paths,
        vec![
            PathBuf::from("directory/acme.example.com.xml"),
            PathBuf::from("dialplan/acme.xml"),
            PathBuf::from("sip_profiles/acme-internal.xml"),
        ]
    );
}

#[test]
fn rendering_is_byte_identical_across_passes() {
    let first = rendered(acme_records());
    let second = rendered(acme_records());
    assert_eq!(first, second);
}

#[test]
fn directory_lists_registrations_sorted_by_number() {
    let documents = rendered(acme_records());
    let directory = &documents[0].contents;
    assert!(directory.contains("<domain name=\"acme.example.com\">"));
    assert!(directory.contains("<user id=\"1001\">"));
    assert!(directory.contains("value=\"secret-1001\""));
    let alice = directory.find("<user id=\"1001\">").expect("alice present");
    let bob = directory.find("<user id=\"1002\">").expect("bob present");
    assert!(alice < bob, "users ordered by number");
}

// Acme with range 1000-1999, Alice on 1001, ring group 2000 (simultaneous,
// members [1001], 20s, voicemail fallback).
#[test]
fn dialplan_covers_internal_range_and_ring_group() {
    let documents = rendered(acme_records());
    let dialplan = &documents[1].contents;

    assert!(dialplan.contains("expression=\"^(1[0-9]{3})$\""), "{dialplan}");
    assert!(dialplan.contains("expression=\"^(2000)$\""));

    let bridge = dialplan
        .lines()
        .find(|line| line.contains("user/1001@acme.example.com") && line.contains("bridge"))
        .expect("ring group bridges to alice");
    assert!(!bridge.contains(','), "single member fan-out: {bridge}");
    assert!(!bridge.contains('|'), "single member fan-out: {bridge}");
    assert!(dialplan.contains("call_timeout=20"));
    assert!(dialplan.contains("default acme.example.com 1001"), "voicemail fallback");
}

#[test]
fn ordered_strategies_use_pipe_fanout_with_leg_timeout() {
    let mut records = acme_records();
    records.ring_groups[0].strategy = RingStrategy::Sequential;
    records.ring_groups[0].members.push("ext-bob".to_string());
    let documents = rendered(records);
    let dialplan = &documents[1].contents;
    assert!(dialplan
        .contains("user/1001@acme.example.com|user/1002@acme.example.com"));
    assert!(dialplan.contains("leg_timeout=20"));
}

#[test]
fn round_robin_marks_the_hunt_strategy() {
    let mut records = acme_records();
    records.ring_groups[0].strategy = RingStrategy::RoundRobin;
    let documents = rendered(records);
    assert!(documents[1].contents.contains("hunt_strategy=round-robin"));
}

// The rule for trunk T1 at priority 1 must precede the 0800 rule for trunk
// T2 at priority 2.
#[test]
fn outbound_rules_order_by_priority() {
    let mut records = acme_records();
    records.trunks.push(trunk("trunk-t2", "freephone"));
    records.outbound_rules = vec![
        OutboundRule {
            id: "out-freephone".to_string(),
            pattern: DialPattern::Prefix("0800XXXXXXX".to_string()),
            trunk_id: "trunk-t2".to_string(),
            priority: 2,
            rewrite: None,
        },
        OutboundRule {
            id: "out-national".to_string(),
            pattern: DialPattern::Prefix("9XXXXXXXXX".to_string()),
            trunk_id: "trunk-t1".to_string(),
            priority: 1,
            rewrite: None,
        },
    ];

    let dialplan = rendered(records)[1].contents.clone();
    let national = dialplan.find("sofia/gateway/metro-one/").expect("t1 rule");
    let freephone = dialplan.find("sofia/gateway/freephone/").expect("t2 rule");
    assert!(national < freephone, "priority 1 renders before priority 2");
}

#[test]
fn equal_priorities_keep_creation_order() {
    let mut records = acme_records();
    records.trunks.push(trunk("trunk-t2", "freephone"));
    records.outbound_rules = vec![
        OutboundRule {
            id: "out-first".to_string(),
            pattern: DialPattern::Prefix("00.".to_string()),
            trunk_id: "trunk-t1".to_string(),
            priority: 5,
            rewrite: None,
        },
        OutboundRule {
            id: "out-second".to_string(),
            pattern: DialPattern::Prefix("01.".to_string()),
            trunk_id: "trunk-t2".to_string(),
            priority: 5,
            rewrite: None,
        },
    ];

    let dialplan = rendered(records)[1].contents.clone();
    let first = dialplan.find("outbound-out-first").expect("first rule");
    let second = dialplan.find("outbound-out-second").expect("second rule");
    assert!(first < second, "creation order breaks the tie, first wins");
}

#[test]
fn rewrites_flow_into_the_bridge_target() {
    let mut records = acme_records();
    records.outbound_rules[0].pattern = DialPattern::Regex("^9(\\d{9})$".to_string());
    records.outbound_rules[0].rewrite = Some("+1$1".to_string());
    let dialplan = rendered(records)[1].contents.clone();
    assert!(dialplan.contains("sofia/gateway/metro-one/+1$1"));
}

#[test]
fn inbound_route_applies_caller_id_override() {
    let documents = rendered(acme_records());
    let dialplan = &documents[1].contents;
    assert!(dialplan.contains("expression=\"^(15155550100)$\""));
    assert!(dialplan.contains("effective_caller_id_name=Acme Main"));
    // Routed to ring group 2000 in the tenant's context.
    assert!(dialplan.contains("data=\"2000 XML acme\""));
}

#[test]
fn ivr_nodes_render_in_breadth_first_order() {
    let documents = rendered(acme_records());
    let dialplan = &documents[1].contents;

    let entry = dialplan.find("name=\"ivr-main\"").expect("entry extension");
    let menu = dialplan.find("name=\"ivr-main-welcome\"").expect("menu extension");
    let sales = dialplan.find("name=\"ivr-main-sales\"").expect("sales extension");
    assert!(entry < menu && menu < sales);

    assert!(dialplan.contains("play_and_get_digits"));
    assert!(dialplan.contains("${ivr_selection_main_welcome}"));
    // Terminal action node hangs up.
    assert!(dialplan.contains("prompts/closed.wav"));
    assert!(dialplan.contains("normal_clearing"));
}

#[test]
fn feature_codes_are_always_present() {
    let documents = rendered(acme_records());
    let dialplan = &documents[1].contents;
    assert!(dialplan.contains("feature-voicemail-recall"));
    assert!(dialplan.contains("feature-echo-test"));
}

#[test]
fn profile_associates_domain_context_and_gateways() {
    let documents = rendered(acme_records());
    let profile = &documents[2].contents;
    assert!(profile.contains("<profile name=\"acme-internal\">"));
    assert!(profile.contains("name=\"domain\" value=\"acme.example.com\""));
    assert!(profile.contains("name=\"context\" value=\"acme\""));
    assert!(profile.contains("name=\"codec-prefs\" value=\"PCMU,PCMA\""));
    assert!(profile.contains("<gateway name=\"metro-one\">"));
    assert!(profile.contains("name=\"proxy\" value=\"sip.carrier.example.net:5060\""));
    assert!(profile.contains("name=\"register\" value=\"true\""));
}

#[test]
fn display_names_are_xml_escaped() {
    let mut records = acme_records();
    records.extensions[0].display_name = "Alice & \"Ops\" <night>".to_string();
    let directory = rendered(records)[0].contents.clone();
    assert!(directory.contains("Alice &amp; &quot;Ops&quot; &lt;night&gt;"));
}
