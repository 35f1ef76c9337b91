use serde::Serialize;

/// Build metadata baked in by `build.rs`.
#[derive(Debug, Clone, Serialize)]
pub struct BuildInfo {
    pub version: &'static str,
    pub build_profile: &'static str,
    pub repo_version: &'static str,
    pub rust_version: &'static str,
    pub target: &'static str,
}

impl std::fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "sealnote {} ({}, {}) built with {} for {}",
            self.version, self.repo_version, self.build_profile, self.rust_version, self.target
        )
    }
}

pub fn build_info() -> BuildInfo {
    BuildInfo {
        version: env!("CARGO_PKG_VERSION"),
        build_profile: option_env!("BUILD_PROFILE").unwrap_or("unknown"),
        repo_version: option_env!("REPO_VERSION").unwrap_or(env!("CARGO_PKG_VERSION")),
        rust_version: option_env!("RUST_VERSION").unwrap_or("unknown"),
        target: option_env!("BUILD_TARGET").unwrap_or("unknown"),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_build_info_display() {
        let info = build_info();
        assert_eq!(info.version, env!("CARGO_PKG_VERSION"));
        assert!(info.to_string().starts_with("sealnote "));
    }
}
