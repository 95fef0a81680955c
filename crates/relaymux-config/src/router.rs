//! The `router` map: virtual model name to route-entry string.

use indexmap::IndexMap;
use serde::Deserialize;

use relaymux_core::RouteEntry;

/// Raw `router` table as written in config: `virtualModel -> "p1,m1;p2,m2;…"`
///
/// Deserialized as plain strings; parsing into `RouteEntry` happens at
/// table-build time so entries naming unknown providers can be skipped
/// with a warning rather than failing deserialization.
pub type RawRouterTable = IndexMap<String, String>;

/// Parse the raw router table into `RouteEntry` values, skipping entries
/// whose key starts with `//` (comment convention, spec.md §6)
pub fn parse_router_table(raw: &RawRouterTable) -> IndexMap<String, RouteEntry> {
    raw.iter()
        .filter(|(virtual_model, _)| !virtual_model.trim_start().starts_with("//"))
        .map(|(virtual_model, entry)| (virtual_model.clone(), RouteEntry::parse(entry)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comment_entries_are_skipped() {
        let mut raw = RawRouterTable::new();
        raw.insert("default".to_owned(), "p1,m1".to_owned());
        raw.insert("// disabled".to_owned(), "p2,m2".to_owned());
        let parsed = parse_router_table(&raw);
        assert_eq!(parsed.len(), 1);
        assert!(parsed.contains_key("default"));
    }
}
