//! Dial-plan document: one context per tenant, rules in evaluation order.
//!
//! Order is load-bearing: internal extensions, ring groups, inbound DID
//! routes, outbound rules, IVR flows, then the tenant-invariant feature
//! codes. Outbound rules sort by priority ascending with creation order
//! breaking ties (first created wins); the stable sort over the
//! creation-ordered vector is what makes overlapping patterns
//! deterministic.

use std::collections::{HashSet, VecDeque};
use std::fmt::Write as _;

use super::escape_xml;
use super::RenderError;
use crate::provisioning::model::{
    IvrFlow, IvrNodeKind, RingGroup, RingStrategy, RouteTarget, TenantRecords, TimeoutAction,
};
use crate::provisioning::validate::patterns;

pub(super) fn render(records: &TenantRecords) -> Result<String, RenderError> {
    let tenant = &records.tenant;
    let mut xml = String::new();

    writeln!(xml, "<context name=\"{}\">", escape_xml(&tenant.context)).expect("write context");

    render_internal_rule(records, &mut xml);

    let mut groups: Vec<_> = records.ring_groups.iter().collect();
    groups.sort_by_key(|group| group.number);
    for group in groups {
        render_ring_group(records, group, &mut xml)?;
    }

    let mut routes: Vec<_> = records.inbound_routes.iter().collect();
    routes.sort_by(|a, b| a.did.cmp(&b.did));
    for route in routes {
        render_inbound_route(records, route, &mut xml)?;
    }

    let mut rules: Vec<_> = records.outbound_rules.iter().collect();
    rules.sort_by_key(|rule| rule.priority);
    for rule in rules {
        render_outbound_rule(records, rule, &mut xml)?;
    }

    for flow in &records.ivr_flows {
        render_ivr_flow(records, flow, &mut xml)?;
    }

    render_feature_codes(records, &mut xml);

    xml.push_str("</context>\n");
    Ok(xml)
}

/// Rule (1): numbers inside the tenant's range bridge to the registered
/// extension, falling back to voicemail when the leg is not answered.
fn render_internal_rule(records: &TenantRecords, xml: &mut String) {
    let tenant = &records.tenant;
    let expression = patterns::range_expression(&tenant.extension_range);

    open_extension(xml, "internal-extensions", &expression);
    action(xml, "set", "hangup_after_bridge=true");
    action(xml, "bridge", &format!("user/$1@{}", escape_xml(&tenant.domain)));
    action(
        xml,
        "voicemail",
        &format!("default {} $1", escape_xml(&tenant.domain)),
    );
    close_extension(xml);
}

fn render_ring_group(
    records: &TenantRecords,
    group: &RingGroup,
    xml: &mut String,
) -> Result<(), RenderError> {
    let tenant = &records.tenant;
    let mut legs = Vec::with_capacity(group.members.len());
    for member in &group.members {
        let extension = records.extension(member).ok_or_else(|| {
            RenderError::Inconsistent(format!(
                "ring group {} references unknown member '{member}'",
                group.id
            ))
        })?;
        legs.push(format!("user/{}@{}", extension.number, escape_xml(&tenant.domain)));
    }

    let name = format!("ring-group-{}", group.number);
    open_extension(xml, &name, &format!("^({})$", group.number));
    action(xml, "set", "continue_on_fail=true");
    match group.strategy {
        RingStrategy::Simultaneous => {
            action(
                xml,
                "set",
                &format!("call_timeout={}", group.ring_timeout_secs),
            );
            // Comma fan-out rings every member in parallel.
            action(xml, "bridge", &legs.join(","));
        }
        RingStrategy::Sequential | RingStrategy::RoundRobin => {
            action(
                xml,
                "set",
                &format!("leg_timeout={}", group.ring_timeout_secs),
            );
            if group.strategy == RingStrategy::RoundRobin {
                // Rendered order stays creation order so documents are
                // reproducible; the engine rotates the starting member.
                action(xml, "set", "hunt_strategy=round-robin");
            }
            // Pipe fan-out attempts members one at a time, in order.
            action(xml, "bridge", &legs.join("|"));
        }
    }
    match &group.timeout_action {
        TimeoutAction::None => {}
        TimeoutAction::Extension(member) => {
            let extension = records.extension(member).ok_or_else(|| {
                RenderError::Inconsistent(format!(
                    "ring group {} timeout action references unknown extension '{member}'",
                    group.id
                ))
            })?;
            action(
                xml,
                "voicemail",
                &format!("default {} {}", escape_xml(&tenant.domain), extension.number),
            );
        }
        TimeoutAction::Destination(destination) => {
            action(xml, "transfer", &escape_xml(destination));
        }
    }
    close_extension(xml);
    Ok(())
}

fn render_inbound_route(
    records: &TenantRecords,
    route: &crate::provisioning::model::InboundRoute,
    xml: &mut String,
) -> Result<(), RenderError> {
    let name = format!("did-{}", route.did);
    let expression = format!("^({})$", regex::escape(&route.did));

    open_extension(xml, &name, &expression);
    if let Some(caller_id) = &route.caller_id_override {
        action(
            xml,
            "set",
            &format!("effective_caller_id_name={}", escape_xml(caller_id)),
        );
    }
    route_target_actions(records, &route.target, xml).map_err(|target| {
        RenderError::Inconsistent(format!(
            "inbound route {} destination {target} does not resolve",
            route.id
        ))
    })?;
    close_extension(xml);
    Ok(())
}

/// Emit the transfer for a route target. Returns the missing reference on
/// failure so callers can name the offending entity.
fn route_target_actions(
    records: &TenantRecords,
    target: &RouteTarget,
    xml: &mut String,
) -> Result<(), String> {
    let context = escape_xml(&records.tenant.context);
    match target {
        RouteTarget::Extension(id) => {
            let extension = records.extension(id).ok_or_else(|| format!("extension '{id}'"))?;
            action(xml, "transfer", &format!("{} XML {context}", extension.number));
        }
        RouteTarget::RingGroup(id) => {
            let group = records.ring_group(id).ok_or_else(|| format!("ring group '{id}'"))?;
            action(xml, "transfer", &format!("{} XML {context}", group.number));
        }
        RouteTarget::IvrFlow(id) => {
            let flow = records.ivr_flow(id).ok_or_else(|| format!("ivr flow '{id}'"))?;
            action(xml, "transfer", &format!("ivr-{} XML {context}", escape_xml(&flow.id)));
        }
    }
    Ok(())
}

fn render_outbound_rule(
    records: &TenantRecords,
    rule: &crate::provisioning::model::OutboundRule,
    xml: &mut String,
) -> Result<(), RenderError> {
    let trunk = records.trunk(&rule.trunk_id).ok_or_else(|| {
        RenderError::Inconsistent(format!(
            "outbound rule {} references unknown trunk '{}'",
            rule.id, rule.trunk_id
        ))
    })?;
    let expression = patterns::pattern_expression(&rule.pattern)
        .map_err(|err| RenderError::Inconsistent(format!("outbound rule {}: {err}", rule.id)))?;

    // The rewrite template is evaluated by the engine against the
    // condition's capture groups; without one the full match goes out.
    // Prefix expansion always wraps the number in group one; a raw regex
    // may define no groups at all, so it falls back to the whole match.
    let default_template = match rule.pattern {
        crate::provisioning::model::DialPattern::Prefix(_) => "$1",
        crate::provisioning::model::DialPattern::Regex(_) => "$0",
    };
    let dialed = rule.rewrite.as_deref().unwrap_or(default_template);

    open_extension(xml, &format!("outbound-{}", rule.id), &expression);
    action(xml, "set", "hangup_after_bridge=true");
    action(
        xml,
        "bridge",
        &format!("sofia/gateway/{}/{}", escape_xml(&trunk.name), escape_xml(dialed)),
    );
    close_extension(xml);
    Ok(())
}

/// Rules for every node reachable from the flow's start node, emitted in
/// breadth-first order so the document layout follows the caller's path.
fn render_ivr_flow(
    records: &TenantRecords,
    flow: &IvrFlow,
    xml: &mut String,
) -> Result<(), RenderError> {
    let context = escape_xml(&records.tenant.context);
    let start = flow
        .nodes
        .iter()
        .find(|node| matches!(node.kind, IvrNodeKind::Start { .. }))
        .ok_or_else(|| {
            RenderError::Inconsistent(format!("ivr flow {} has no start node", flow.id))
        })?;

    let mut order = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<&str> = VecDeque::new();
    seen.insert(start.id.as_str());
    queue.push_back(start.id.as_str());
    while let Some(current) = queue.pop_front() {
        let node = flow.node(current).ok_or_else(|| {
            RenderError::Inconsistent(format!(
                "ivr flow {} links to unknown node '{current}'",
                flow.id
            ))
        })?;
        order.push(node);
        for next in crate::provisioning::validate::node_edges(&node.kind) {
            if seen.insert(next) {
                queue.push_back(next);
            }
        }
    }

    for node in order {
        let stop = node_stop(flow, &node.id);
        match &node.kind {
            IvrNodeKind::Start { next } => {
                // Entry point reached by inbound routes; hands off to the
                // first real node.
                open_extension(xml, &format!("ivr-{}", flow.id), &format!("^(ivr-{})$", regex::escape(&flow.id)));
                action(xml, "answer", "");
                action(
                    xml,
                    "transfer",
                    &format!("ivr-{}-{} XML {context}", escape_xml(&flow.id), escape_xml(next)),
                );
                close_extension(xml);
            }
            IvrNodeKind::Menu { prompt, branches } => {
                let selection = format!("ivr_selection_{}_{}", flow.id, node.id);
                open_extension(xml, &stop, &format!("^({})$", regex::escape(&stop)));
                action(
                    xml,
                    "play_and_get_digits",
                    &format!(
                        "1 1 3 5000 # {} silence_stream://250 {selection} \\d+",
                        escape_xml(prompt)
                    ),
                );
                xml.push_str("    </condition>\n");
                for branch in branches {
                    writeln!(
                        xml,
                        "    <condition field=\"${{{selection}}}\" expression=\"^{}$\" break=\"on-true\">",
                        escape_xml(&regex::escape(&branch.key))
                    )
                    .expect("write branch condition");
                    action(
                        xml,
                        "transfer",
                        &format!(
                            "ivr-{}-{} XML {context}",
                            escape_xml(&flow.id),
                            escape_xml(&branch.next)
                        ),
                    );
                    xml.push_str("    </condition>\n");
                }
                // No branch matched: replay the menu.
                xml.push_str("    <condition>\n");
                action(xml, "transfer", &format!("{} XML {context}", escape_xml(&stop)));
                xml.push_str("    </condition>\n");
                xml.push_str("  </extension>\n");
            }
            IvrNodeKind::Transfer { target } => {
                open_extension(xml, &stop, &format!("^({})$", regex::escape(&stop)));
                route_target_actions(records, target, xml).map_err(|missing| {
                    RenderError::Inconsistent(format!(
                        "ivr flow {} node {} transfers to unresolved {missing}",
                        flow.id, node.id
                    ))
                })?;
                close_extension(xml);
            }
            IvrNodeKind::Action {
                application,
                data,
                next,
            } => {
                open_extension(xml, &stop, &format!("^({})$", regex::escape(&stop)));
                action(xml, application, &escape_xml(data));
                match next {
                    Some(next) => action(
                        xml,
                        "transfer",
                        &format!(
                            "ivr-{}-{} XML {context}",
                            escape_xml(&flow.id),
                            escape_xml(next)
                        ),
                    ),
                    None => action(xml, "hangup", "normal_clearing"),
                }
                close_extension(xml);
            }
        }
    }
    Ok(())
}

fn node_stop(flow: &IvrFlow, node_id: &str) -> String {
    format!("ivr-{}-{}", flow.id, node_id)
}

/// Rule (5): tenant-invariant feature codes.
fn render_feature_codes(records: &TenantRecords, xml: &mut String) {
    let domain = escape_xml(&records.tenant.domain);

    open_extension(xml, "feature-voicemail-recall", "^(\\*98)$");
    action(xml, "answer", "");
    action(xml, "voicemail", &format!("check default {domain} ${{caller_id_number}}"));
    close_extension(xml);

    open_extension(xml, "feature-echo-test", "^(\\*9196)$");
    action(xml, "answer", "");
    action(xml, "echo", "");
    close_extension(xml);
}

fn open_extension(xml: &mut String, name: &str, expression: &str) {
    writeln!(xml, "  <extension name=\"{}\">", escape_xml(name)).expect("write extension");
    writeln!(
        xml,
        "    <condition field=\"destination_number\" expression=\"{}\">",
        escape_xml(expression)
    )
    .expect("write condition");
}

fn action(xml: &mut String, application: &str, data: &str) {
    if data.is_empty() {
        writeln!(xml, "      <action application=\"{}\"/>", escape_xml(application))
            .expect("write action");
    } else {
        writeln!(
            xml,
            "      <action application=\"{}\" data=\"{data}\"/>",
            escape_xml(application)
        )
        .expect("write action");
    }
}

fn close_extension(xml: &mut String) {
    xml.push_str("    </condition>\n");
    xml.push_str("  </extension>\n");
}
