//! Signaling-profile document: per-tenant transport/codec/timer settings,
//! the domain and dial-plan context association, and one gateway entry per
//! trunk.

use std::fmt::Write as _;

use super::escape_xml;
use crate::provisioning::model::TenantRecords;

pub(super) fn render(records: &TenantRecords) -> String {
    let tenant = &records.tenant;
    let mut xml = String::new();

    writeln!(xml, "<profile name=\"{}\">", escape_xml(&tenant.profile)).expect("write profile");
    xml.push_str("  <settings>\n");
    param(&mut xml, "domain", &tenant.domain);
    param(&mut xml, "context", &tenant.context);
    param(&mut xml, "codec-prefs", &tenant.codec_string());
    param(&mut xml, "rtp-timeout-sec", "300");
    param(&mut xml, "session-timeout", "1800");
    param(&mut xml, "dtmf-duration", "2000");
    xml.push_str("  </settings>\n");

    let mut trunks: Vec<_> = records.trunks.iter().collect();
    trunks.sort_by(|a, b| a.name.cmp(&b.name));

    xml.push_str("  <gateways>\n");
    for trunk in trunks {
        writeln!(xml, "    <gateway name=\"{}\">", escape_xml(&trunk.name)).expect("write gateway");
        gateway_param(&mut xml, "proxy", &format!("{}:{}", trunk.host, trunk.port));
        gateway_param(&mut xml, "transport", trunk.transport.as_str());
        if !trunk.codecs.is_empty() {
            gateway_param(&mut xml, "codec-prefs", &trunk.codecs.join(","));
        }
        match (&trunk.username, &trunk.password) {
            (Some(username), Some(password)) => {
                gateway_param(&mut xml, "username", username);
                gateway_param(&mut xml, "password", password);
                gateway_param(&mut xml, "register", "true");
            }
            (Some(username), None) => {
                gateway_param(&mut xml, "username", username);
                gateway_param(&mut xml, "register", "false");
            }
            _ => gateway_param(&mut xml, "register", "false"),
        }
        xml.push_str("    </gateway>\n");
    }
    xml.push_str("  </gateways>\n");
    xml.push_str("</profile>\n");

    xml
}

fn param(xml: &mut String, name: &str, value: &str) {
    writeln!(
        xml,
        "    <param name=\"{}\" value=\"{}\"/>",
        escape_xml(name),
        escape_xml(value)
    )
    .expect("write param");
}

fn gateway_param(xml: &mut String, name: &str, value: &str) {
    writeln!(
        xml,
        "      <param name=\"{}\" value=\"{}\"/>",
        escape_xml(name),
        escape_xml(value)
    )
    .expect("write gateway param");
}
