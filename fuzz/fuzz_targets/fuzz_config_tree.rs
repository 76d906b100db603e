//! Fuzz target: `ConfigTree::from_json` -> `NodeConfig::from_tree`
//!
//! The config file lives on a user-writable partition and can be edited
//! through the portal, so any text must either parse into a config or be
//! rejected with an error. Never a panic.
//!
//! cargo fuzz run fuzz_config_tree

#![no_main]

use hivemon::config::{ConfigTree, NodeConfig};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(tree) = ConfigTree::from_json(text) else {
        return;
    };
    if let Ok(config) = NodeConfig::from_tree(&tree) {
        assert!(config.measurement_interval.as_secs_f64() > 0.0);
    }
});
