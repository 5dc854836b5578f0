//! Builtin rule data, embedded into the binary as defaults.
//!
//! Users can run against their own rule files instead (see
//! `KnowledgeBase::from_paths`); the embedded set covers the known AS4
//! deprecations at the time this crate was built.

use crate::kb::loader::{KnowledgeBase, KnowledgeBaseError};

const LIBRARIES: &str = include_str!("../../rules/libraries.json");
const HARDWARE: &str = include_str!("../../rules/hardware.json");
const FUNCTIONS: &str = include_str!("../../rules/functions.json");
const OPCUA: &str = include_str!("../../rules/opcua.json");
const MOTION: &str = include_str!("../../rules/motion.json");
const LICENSES: &str = include_str!("../../rules/licenses.json");
const LINKS: &str = include_str!("../../rules/links.json");

/// Named builtin sources, one per rule category.
pub fn builtin_sources() -> [(&'static str, &'static str); 7] {
    [
        ("libraries.json", LIBRARIES),
        ("hardware.json", HARDWARE),
        ("functions.json", FUNCTIONS),
        ("opcua.json", OPCUA),
        ("motion.json", MOTION),
        ("licenses.json", LICENSES),
        ("links.json", LINKS),
    ]
}

/// Load the embedded rule set.
pub fn load_builtin() -> Result<KnowledgeBase, KnowledgeBaseError> {
    KnowledgeBase::from_sources(&builtin_sources())
}
