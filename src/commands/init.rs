use crate::io;
use anyhow::Result;
use std::path::PathBuf;

pub fn run(force: bool) -> Result<()> {
    let config_path = PathBuf::from(".encap.toml");

    if config_path.exists() && !force {
        anyhow::bail!("Configuration file already exists. Use --force to overwrite.");
    }

    let default_config = r#"# encap configuration

[catalog]
# Kinds the classifier may report; remove entries to narrow the catalog.
enabled = [
    "guard-once",
    "memoized-cache",
    "timer-debounce-throttle",
    "mutable-state-bag",
    "resource-lifecycle",
    "request-context",
    "unstable-callback-identity",
    "retry-backoff",
    "lazy-init",
    "serialized-queue",
]

[exemptions]
single_call_site = true
frozen_constant = true
correctly_scoped = true
trivial_logic = true
comment_suppression = true

[analyzer]
parse_timeout_ms = 2000
max_unit_bytes = 2097152

[rewrite]
factory_prefix = "create"
release_name = "release"
"#;

    io::write_file(&config_path, default_config)?;
    println!("Created .encap.toml configuration file");

    Ok(())
}
