//! Directory document: the tenant's signaling domain, one registration
//! entry per extension, and the tenant-scoped variables the dial plan reads
//! at call time.

use std::fmt::Write as _;

use super::escape_xml;
use crate::provisioning::model::TenantRecords;

pub(super) fn render(records: &TenantRecords) -> String {
    let tenant = &records.tenant;
    let mut xml = String::new();

    writeln!(xml, "<domain name=\"{}\">", escape_xml(&tenant.domain)).expect("write domain");
    xml.push_str("  <variables>\n");
    writeln!(
        xml,
        "    <variable name=\"tenant_id\" value=\"{}\"/>",
        escape_xml(&tenant.id.0)
    )
    .expect("write tenant id");
    writeln!(
        xml,
        "    <variable name=\"codec_prefs\" value=\"{}\"/>",
        escape_xml(&tenant.codec_string())
    )
    .expect("write codec prefs");
    writeln!(
        xml,
        "    <variable name=\"user_context\" value=\"{}\"/>",
        escape_xml(&tenant.context)
    )
    .expect("write context");
    xml.push_str("  </variables>\n");

    // Registration entries sorted by number; uniqueness is already enforced,
    // sorting only pins the byte order.
    let mut extensions: Vec<_> = records.extensions.iter().collect();
    extensions.sort_by_key(|extension| extension.number);

    xml.push_str("  <users>\n");
    for extension in extensions {
        writeln!(xml, "    <user id=\"{}\">", extension.number).expect("write user");
        xml.push_str("      <params>\n");
        writeln!(
            xml,
            "        <param name=\"password\" value=\"{}\"/>",
            escape_xml(&extension.secret)
        )
        .expect("write secret");
        xml.push_str("      </params>\n");
        xml.push_str("      <variables>\n");
        writeln!(
            xml,
            "        <variable name=\"effective_caller_id_name\" value=\"{}\"/>",
            escape_xml(&extension.display_name)
        )
        .expect("write caller id name");
        writeln!(
            xml,
            "        <variable name=\"effective_caller_id_number\" value=\"{}\"/>",
            extension.number
        )
        .expect("write caller id number");
        xml.push_str("      </variables>\n");
        xml.push_str("    </user>\n");
    }
    xml.push_str("  </users>\n");
    xml.push_str("</domain>\n");

    xml
}
