//! Fuzz target: portal routing and subsection replacement
//!
//! The first line of the input is the request path, the rest the body.
//! Routing must never panic, and a body the portal would accept must
//! leave the tree readable by `NodeConfig::from_tree` (pass or fail).
//!
//! cargo fuzz run fuzz_portal_route

#![no_main]

use hivemon::adapters::web::{Route, route};
use hivemon::config::{ConfigTree, NodeConfig};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let (path, body) = text.split_once('\n').unwrap_or((text, ""));

    let Route::Subsection { section, subsection } = route(path) else {
        return;
    };
    assert!(!section.is_empty() && !subsection.is_empty());
    assert!(!subsection.contains('/'));

    let Ok(value) = serde_json::from_str(body) else {
        return;
    };
    let mut tree = ConfigTree::default();
    if tree.set_subsection(section, subsection, value).is_ok() {
        assert!(tree.get_subsection(section, subsection).is_some());
        let _ = NodeConfig::from_tree(&tree);
    }
});
