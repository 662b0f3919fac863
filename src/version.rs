use std::sync::LazyLock;

/// Version of the software: the Cargo package version, plus the git commit
/// when one was provided at build time through `FASTSORT_GIT_HASH`.
pub static VERSION: LazyLock<String> = LazyLock::new(|| {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("FASTSORT_GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{version}-{hash}"),
        _ => version.to_string(),
    }
});
