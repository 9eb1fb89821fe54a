// Copyright (c) 2025 - Cowboy AI, Inc.
//! Domain-XML scanning and surgical rewriting
//!
//! The only structurally significant path in a libvirt domain document is
//! `devices/interface/mac`, one holder per network interface, carrying the
//! link-layer address in its `address` attribute.
//!
//! Rewriting streams the document event-by-event through a writer, so every
//! node and attribute outside the single rewritten holder passes through
//! verbatim. Exactly one attribute value changes; no structural nodes are
//! added or removed.

use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};

use crate::domain::MacAddress;
use crate::errors::{ResolverError, ResolverResult};

/// True when the element stack sits at `devices/interface`, i.e. the current
/// element is a link-layer address holder.
fn at_interface(stack: &[Vec<u8>]) -> bool {
    stack.len() >= 2
        && stack[stack.len() - 1] == b"interface"
        && stack[stack.len() - 2] == b"devices"
}

/// Extract every interface MAC address in document order.
///
/// Holders without an `address` attribute are ignored.
pub fn interface_macs(xml: &str) -> ResolverResult<Vec<MacAddress>> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut macs = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                stack.push(e.name().as_ref().to_vec());
            }
            Event::Empty(e) => {
                if e.name().as_ref() == b"mac" && at_interface(&stack) {
                    if let Some(attr) = e.try_get_attribute("address")? {
                        macs.push(MacAddress::new(attr.unescape_value()?.as_ref())?);
                    }
                }
            }
            Event::End(_) => {
                stack.pop();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(macs)
}

/// Extract the domain name (the text of the root-level `name` element).
pub fn domain_name(xml: &str) -> ResolverResult<String> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<Vec<u8>> = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                stack.push(e.name().as_ref().to_vec());
            }
            Event::Text(t) => {
                if stack.len() == 2 && stack[0] == b"domain" && stack[1] == b"name" {
                    return Ok(t.unescape()?.into_owned());
                }
            }
            Event::End(_) => {
                stack.pop();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Err(ResolverError::Xml(
        "domain document has no name element".to_string(),
    ))
}

/// Rewrite the first interface MAC holder whose address equals `old`.
///
/// Returns `Ok(None)` when no holder carries `old` — the caller's signal
/// that the document changed out from under it.
pub fn rewrite_interface_mac(
    xml: &str,
    old: &MacAddress,
    new: &MacAddress,
) -> ResolverResult<Option<String>> {
    rewrite_matching_mac(xml, new, |current| current == old)
}

/// Rewrite the first interface MAC holder unconditionally.
pub fn rewrite_first_interface_mac(
    xml: &str,
    new: &MacAddress,
) -> ResolverResult<Option<String>> {
    rewrite_matching_mac(xml, new, |_| true)
}

fn rewrite_matching_mac<F>(
    xml: &str,
    new: &MacAddress,
    mut matches: F,
) -> ResolverResult<Option<String>>
where
    F: FnMut(&MacAddress) -> bool,
{
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Vec::new());
    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut replaced = false;

    loop {
        let event = reader.read_event()?;
        match event {
            Event::Start(ref e) => {
                stack.push(e.name().as_ref().to_vec());
                writer
                    .write_event(event.clone())
                    .map_err(|e| ResolverError::Xml(e.to_string()))?;
            }
            Event::End(_) => {
                stack.pop();
                writer
                    .write_event(event)
                    .map_err(|e| ResolverError::Xml(e.to_string()))?;
            }
            Event::Empty(ref e) => {
                if !replaced && e.name().as_ref() == b"mac" && at_interface(&stack) {
                    if let Some(attr) = e.try_get_attribute("address")? {
                        let current = MacAddress::new(attr.unescape_value()?.as_ref())?;
                        if matches(&current) {
                            writer
                                .write_event(Event::Empty(replace_address(e, new)?))
                                .map_err(|e| ResolverError::Xml(e.to_string()))?;
                            replaced = true;
                            continue;
                        }
                    }
                }
                writer
                    .write_event(event.clone())
                    .map_err(|e| ResolverError::Xml(e.to_string()))?;
            }
            Event::Eof => break,
            other => {
                writer
                    .write_event(other)
                    .map_err(|e| ResolverError::Xml(e.to_string()))?;
            }
        }
    }

    if !replaced {
        return Ok(None);
    }

    let output =
        String::from_utf8(writer.into_inner()).map_err(|e| ResolverError::Xml(e.to_string()))?;
    Ok(Some(output))
}

/// Rebuild a `mac` holder with its `address` attribute replaced and every
/// other attribute carried over unchanged.
fn replace_address(holder: &BytesStart<'_>, new: &MacAddress) -> ResolverResult<BytesStart<'static>> {
    let mut rebuilt = BytesStart::new("mac");
    for attr in holder.attributes() {
        let attr = attr.map_err(|e| ResolverError::Xml(e.to_string()))?;
        if attr.key.as_ref() == b"address" {
            rebuilt.push_attribute(("address", new.to_string().as_str()));
        } else {
            rebuilt.push_attribute(attr);
        }
    }
    Ok(rebuilt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const DOMAIN_XML: &str = r#"<domain type='kvm'>
  <name>base</name>
  <memory unit='KiB'>1048576</memory>
  <devices>
    <interface type='network'>
      <mac address="52:54:00:aa:aa:aa"/>
      <source network='default'/>
      <model type='virtio'/>
    </interface>
    <interface type='bridge'>
      <mac address="52:54:00:bb:bb:bb"/>
      <source bridge='br0'/>
    </interface>
    <disk type='file' device='disk'/>
  </devices>
</domain>"#;

    fn mac(s: &str) -> MacAddress {
        MacAddress::new(s).unwrap()
    }

    #[test]
    fn test_interface_macs_in_document_order() {
        let macs = interface_macs(DOMAIN_XML).unwrap();
        assert_eq!(
            macs,
            vec![mac("52:54:00:aa:aa:aa"), mac("52:54:00:bb:bb:bb")]
        );
    }

    #[test]
    fn test_mac_outside_interface_is_ignored() {
        let xml = r#"<domain type='kvm'>
  <name>odd</name>
  <mac address="52:54:00:01:02:03"/>
  <devices><interface type='network'><mac address="52:54:00:cc:cc:cc"/></interface></devices>
</domain>"#;
        let macs = interface_macs(xml).unwrap();
        assert_eq!(macs, vec![mac("52:54:00:cc:cc:cc")]);
    }

    #[test]
    fn test_domain_name() {
        assert_eq!(domain_name(DOMAIN_XML).unwrap(), "base");
    }

    #[test]
    fn test_rewrite_is_surgical() {
        let new = mac("52:54:00:12:34:56");
        let rewritten = rewrite_interface_mac(DOMAIN_XML, &mac("52:54:00:aa:aa:aa"), &new)
            .unwrap()
            .unwrap();
        // Exactly one attribute value changes; every other byte is untouched.
        let expected = DOMAIN_XML.replace("52:54:00:aa:aa:aa", "52:54:00:12:34:56");
        assert_eq!(rewritten, expected);
    }

    #[test]
    fn test_rewrite_second_interface() {
        let new = mac("52:54:00:12:34:56");
        let rewritten = rewrite_interface_mac(DOMAIN_XML, &mac("52:54:00:bb:bb:bb"), &new)
            .unwrap()
            .unwrap();
        let expected = DOMAIN_XML.replace("52:54:00:bb:bb:bb", "52:54:00:12:34:56");
        assert_eq!(rewritten, expected);
    }

    #[test]
    fn test_rewrite_missing_address_reports_no_match() {
        let result =
            rewrite_interface_mac(DOMAIN_XML, &mac("52:54:00:99:99:99"), &mac("52:54:00:12:34:56"))
                .unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn test_rewrite_replaces_only_first_duplicate_holder() {
        let xml = DOMAIN_XML.replace("52:54:00:bb:bb:bb", "52:54:00:aa:aa:aa");
        let new = mac("52:54:00:12:34:56");
        let rewritten = rewrite_interface_mac(&xml, &mac("52:54:00:aa:aa:aa"), &new)
            .unwrap()
            .unwrap();
        assert_eq!(
            interface_macs(&rewritten).unwrap(),
            vec![new, mac("52:54:00:aa:aa:aa")]
        );
    }

    #[test]
    fn test_rewrite_first_interface_mac() {
        let new = mac("52:54:00:12:34:56");
        let rewritten = rewrite_first_interface_mac(DOMAIN_XML, &new).unwrap().unwrap();
        assert_eq!(
            interface_macs(&rewritten).unwrap(),
            vec![new, mac("52:54:00:bb:bb:bb")]
        );
    }

    #[test]
    fn test_rewrite_matches_non_canonical_form() {
        let xml = DOMAIN_XML.replace("52:54:00:aa:aa:aa", "52:54:00:AA:AA:AA");
        let new = mac("52:54:00:12:34:56");
        let rewritten = rewrite_interface_mac(&xml, &mac("52:54:00:aa:aa:aa"), &new)
            .unwrap()
            .unwrap();
        assert!(rewritten.contains("52:54:00:12:34:56"));
    }
}
