use std::collections::HashMap;
use std::fmt::Write;
use std::path::PathBuf;
use std::{env, fs};

static CONFIGS: &[(&str, usize)] = &[
    // BEGIN AUTOGENERATED CONFIG FEATURES
    ("IFACE_MAX_ADDR_COUNT", 4),
    ("IFACE_MAX_ROUTE_COUNT", 4),
    ("IFACE_NEIGHBOR_CACHE_COUNT", 16),
    ("RPL_NEIGHBOR_TABLE_SIZE", 16),
    ("RPL_LINK_STATS_TABLE_SIZE", 16),
    ("RPL_SOURCE_ROUTE_TABLE_SIZE", 32),
    ("RPL_MAX_SOURCE_ROUTE_HOPS", 16),
    ("RPL_OUTBOX_SIZE", 16),
    // END AUTOGENERATED CONFIG FEATURES
];

fn main() {
    // Values are set from the environment, e.g. `SMOLRPL_RPL_NEIGHBOR_TABLE_SIZE=32`.
    let mut configs: HashMap<&str, usize> = CONFIGS.iter().copied().collect();

    for (name, value) in configs.iter_mut() {
        let var = format!("SMOLRPL_{name}");
        println!("cargo:rerun-if-env-changed={var}");

        if let Ok(raw) = env::var(&var) {
            *value = match raw.parse() {
                Ok(v) => v,
                Err(_) => panic!("{var} must be an unsigned integer, got {raw:?}"),
            };
        }
    }

    let mut data = String::new();
    let mut names: Vec<_> = configs.keys().copied().collect();
    names.sort_unstable();
    for name in names {
        writeln!(data, "pub const {}: usize = {};", name, configs[name]).unwrap();
    }

    let out_dir = PathBuf::from(env::var_os("OUT_DIR").unwrap());
    fs::write(out_dir.join("config.rs"), data).unwrap();
    println!("cargo:rerun-if-changed=build.rs");
}
