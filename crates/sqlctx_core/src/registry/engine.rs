/// A storage engine known to the server.
#[derive(Debug, PartialEq, Eq)]
pub struct Engine {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub supports_temporary: bool,
}

static ENGINES: &[Engine] = &[
    Engine {
        name: "InnoDB",
        aliases: &["INNOBASE"],
        supports_temporary: true,
    },
    Engine {
        name: "MyISAM",
        aliases: &[],
        supports_temporary: true,
    },
    Engine {
        name: "MEMORY",
        aliases: &["HEAP"],
        supports_temporary: true,
    },
    Engine {
        name: "CSV",
        aliases: &[],
        supports_temporary: false,
    },
    Engine {
        name: "ARCHIVE",
        aliases: &[],
        supports_temporary: true,
    },
    Engine {
        name: "BLACKHOLE",
        aliases: &[],
        supports_temporary: true,
    },
    Engine {
        name: "MRG_MYISAM",
        aliases: &["MERGE", "MRG_MYISAM"],
        supports_temporary: true,
    },
    Engine {
        name: "TempTable",
        aliases: &[],
        supports_temporary: false,
    },
];

/// Find an engine by name or alias, case-insensitively.
///
/// When `is_temporary` is set, engines that cannot hold temporary tables are
/// not returned.
pub fn find_engine(name: &str, is_temporary: bool) -> Option<&'static Engine> {
    ENGINES
        .iter()
        .find(|e| {
            e.name.eq_ignore_ascii_case(name)
                || e.aliases.iter().any(|a| a.eq_ignore_ascii_case(name))
        })
        .filter(|e| !is_temporary || e.supports_temporary)
}
