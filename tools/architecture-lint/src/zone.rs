//! Zones of the desk crate and what each may not name.

use std::fmt;

use camino::Utf8Path;

/// Part of the `divedesk` crate a source file belongs to.
///
/// Root files (`lib.rs`, `main.rs`, `config.rs`) wire adapters to the
/// domain and belong to no zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Zone {
    /// `domain/`: entities, services and ports.
    Domain,
    /// `inbound/`: the CLI adapter.
    Inbound,
    /// `outbound/rows.rs` and `outbound/mod.rs`: row shapes both storage
    /// adapters share.
    SharedRows,
    /// `outbound/memory/`: the in-process tables.
    MemoryAdapter,
    /// `outbound/postgrest/`: the HTTP storage adapter.
    PostgrestAdapter,
}

impl Zone {
    /// Zone of a path relative to `backend/src`.
    #[must_use]
    pub fn of(relative: &Utf8Path) -> Option<Self> {
        let mut parts = relative.components().map(|part| part.as_str());
        let top = parts.next()?;
        let below = parts.next()?;
        match (top, below) {
            ("domain", _) => Some(Self::Domain),
            ("inbound", _) => Some(Self::Inbound),
            ("outbound", "memory") => Some(Self::MemoryAdapter),
            ("outbound", "postgrest") => Some(Self::PostgrestAdapter),
            ("outbound", _) => Some(Self::SharedRows),
            _ => None,
        }
    }

    /// Crate modules this zone must not name, as segments below `crate`.
    #[must_use]
    pub const fn forbidden_modules(self) -> &'static [&'static [&'static str]] {
        match self {
            Self::Domain => &[&["inbound"], &["outbound"], &["config"]],
            Self::Inbound => &[&["outbound"], &["config"]],
            Self::SharedRows => &[
                &["inbound"],
                &["config"],
                &["outbound", "memory"],
                &["outbound", "postgrest"],
            ],
            Self::MemoryAdapter => &[&["inbound"], &["config"], &["outbound", "postgrest"]],
            Self::PostgrestAdapter => &[&["inbound"], &["config"], &["outbound", "memory"]],
        }
    }

    /// External crates this zone must not name.
    #[must_use]
    pub const fn forbidden_crates(self) -> &'static [&'static str] {
        match self {
            Self::Domain => &[
                "clap",
                "color_eyre",
                "mockable",
                "ortho_config",
                "reqwest",
                "tracing_subscriber",
                "url",
            ],
            Self::Inbound => &["mockable", "ortho_config", "reqwest", "tracing_subscriber", "url"],
            Self::SharedRows => &["clap", "color_eyre", "mockable", "reqwest"],
            Self::MemoryAdapter => &["clap", "color_eyre", "reqwest", "url"],
            Self::PostgrestAdapter => &["clap", "color_eyre", "mockable"],
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Domain => "domain",
            Self::Inbound => "CLI adapter",
            Self::SharedRows => "shared row module",
            Self::MemoryAdapter => "in-memory adapter",
            Self::PostgrestAdapter => "PostgREST adapter",
        })
    }
}
