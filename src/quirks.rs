//! Per-architecture compiler and linker workarounds applied when building
//! against a cross toolchain.

use crate::exec::EnvOverlay;

/// A closed set of known workarounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchQuirk {
    /// No native atomics; link against libatomic.
    LinkLibatomic,
    /// Calls may exceed the direct-call range; compile with `-mlongcalls`.
    LongCalls,
}

impl ArchQuirk {
    pub const ALL: [ArchQuirk; 2] = [ArchQuirk::LinkLibatomic, ArchQuirk::LongCalls];

    /// `(variable, flag)` pairs this quirk appends.
    pub fn flags(self) -> &'static [(&'static str, &'static str)] {
        match self {
            ArchQuirk::LinkLibatomic => &[("LDFLAGS", "-latomic")],
            ArchQuirk::LongCalls => &[("CFLAGS", "-mlongcalls"), ("CXXFLAGS", "-mlongcalls")],
        }
    }
}

const QUIRK_TABLE: &[(&str, &[ArchQuirk])] = &[
    ("microblaze", &[ArchQuirk::LinkLibatomic]),
    ("sparc", &[ArchQuirk::LinkLibatomic]),
    ("xtensa", &[ArchQuirk::LongCalls]),
];

/// Flags every cross build gets: link-time optimisation is disabled.
pub const LTO_WORKAROUND: &[(&str, &str)] = &[
    ("CFLAGS", "-fno-lto"),
    ("CXXFLAGS", "-fno-lto"),
    ("LDFLAGS", "-fno-lto"),
];

/// Quirks registered for `arch`. Unknown architectures have none.
pub fn quirks_for(arch: &str) -> &'static [ArchQuirk] {
    QUIRK_TABLE
        .iter()
        .find(|(name, _)| *name == arch)
        .map(|(_, quirks)| *quirks)
        .unwrap_or(&[])
}

/// Append the quirk flags and the LTO workaround to `env`, seeding each
/// variable from `inherited` when the overlay does not set it yet.
pub fn apply_flags<'a>(
    mut env: EnvOverlay,
    quirks: &[ArchQuirk],
    inherited: impl Fn(&str) -> Option<&'a str>,
) -> EnvOverlay {
    for quirk in quirks {
        for (key, flag) in quirk.flags() {
            env = env.with_flag(key, flag, inherited(*key));
        }
    }
    for (key, flag) in LTO_WORKAROUND {
        env = env.with_flag(key, flag, inherited(*key));
    }
    env
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_exhaustive() {
        let expected: &[(&str, &[ArchQuirk])] = &[
            ("microblaze", &[ArchQuirk::LinkLibatomic]),
            ("sparc", &[ArchQuirk::LinkLibatomic]),
            ("xtensa", &[ArchQuirk::LongCalls]),
        ];
        assert_eq!(QUIRK_TABLE, expected);

        // Every quirk variant is used by at least one architecture.
        for quirk in ArchQuirk::ALL {
            assert!(
                QUIRK_TABLE.iter().any(|(_, qs)| qs.contains(&quirk)),
                "{:?} has no architecture",
                quirk
            );
        }
    }

    #[test]
    fn test_unknown_arch_has_no_quirks() {
        assert!(quirks_for("arm").is_empty());
        assert!(quirks_for("").is_empty());
        assert_eq!(quirks_for("xtensa"), &[ArchQuirk::LongCalls]);
    }

    #[test]
    fn test_flags_per_quirk() {
        assert_eq!(ArchQuirk::LinkLibatomic.flags(), &[("LDFLAGS", "-latomic")]);
        assert_eq!(
            ArchQuirk::LongCalls.flags(),
            &[("CFLAGS", "-mlongcalls"), ("CXXFLAGS", "-mlongcalls")]
        );
    }

    #[test]
    fn test_apply_flags_adds_lto_workaround_everywhere() {
        let env = apply_flags(EnvOverlay::new(), &[], |_| None);
        assert_eq!(env.get("CFLAGS"), Some("-fno-lto"));
        assert_eq!(env.get("CXXFLAGS"), Some("-fno-lto"));
        assert_eq!(env.get("LDFLAGS"), Some("-fno-lto"));
    }

    #[test]
    fn test_apply_flags_is_idempotent() {
        let once = apply_flags(EnvOverlay::new(), quirks_for("xtensa"), |_| Some("-O2"));
        let twice = apply_flags(once.clone(), quirks_for("xtensa"), |_| Some("-O2"));
        assert_eq!(once, twice);
        assert_eq!(once.get("CFLAGS"), Some("-O2 -mlongcalls -fno-lto"));
        assert_eq!(once.get("LDFLAGS"), Some("-O2 -fno-lto"));
    }
}
