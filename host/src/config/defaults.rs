//! All setting definitions with their default values.

use std::collections::HashMap;
use std::sync::LazyLock;

type DefTuple = (&'static str, &'static str, &'static str);

const DEFS: &[DefTuple] = &[
    ("TAB_COUNT", "3", "Number of simulated tabs"),
    (
        "LIVENESS_INTERVAL_MS",
        "3000",
        "Period of the leader liveness re-check",
    ),
    (
        "STALE_LEADER_AFTER_MS",
        "0",
        "Leader record age after which a visible tab takes over (0 = never)",
    ),
    (
        "DEFAULT_CLIP_MS",
        "1500",
        "Playback length used when a sound's duration is unknown",
    ),
    (
        "SOUNDS_DIR",
        "",
        "Directory that resource ids resolve against (empty = <data dir>/sounds)",
    ),
    ("BUS_CAPACITY", "256", "Messages buffered per tab on the bus"),
];

/// A single setting definition.
#[derive(Debug, Clone)]
pub struct SettingDef {
    pub key: &'static str,
    pub default: &'static str,
    pub description: &'static str,
}

/// Global setting definitions indexed by key.
pub static DEFAULT_SETTINGS: LazyLock<HashMap<&'static str, SettingDef>> = LazyLock::new(|| {
    DEFS.iter()
        .map(|&(key, default, description)| {
            (
                key,
                SettingDef {
                    key,
                    default,
                    description,
                },
            )
        })
        .collect()
});

