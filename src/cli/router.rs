use crate::daemon::DAEMON_VERB;
use crate::error::{Result, RsuvError};
use crate::logging::log_debug;
use crate::plugin::Plugin;

/// Commands implemented inside the binary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Version,
    Status,
    Add,
    Start,
    Stop,
    Shutdown,
    Serv,
}

struct BuiltinEntry {
    name: &'static str,
    aliases: &'static [&'static str],
    builtin: Builtin,
    requires_daemon: bool,
}

const BUILTINS: &[BuiltinEntry] = &[
    BuiltinEntry {
        name: "version",
        aliases: &[],
        builtin: Builtin::Version,
        requires_daemon: true,
    },
    BuiltinEntry {
        name: "status",
        aliases: &["st"],
        builtin: Builtin::Status,
        requires_daemon: true,
    },
    BuiltinEntry {
        name: "add",
        aliases: &[],
        builtin: Builtin::Add,
        requires_daemon: true,
    },
    BuiltinEntry {
        name: "start",
        aliases: &[],
        builtin: Builtin::Start,
        requires_daemon: true,
    },
    BuiltinEntry {
        name: "stop",
        aliases: &[],
        builtin: Builtin::Stop,
        requires_daemon: true,
    },
    BuiltinEntry {
        name: "shutdown",
        aliases: &[],
        builtin: Builtin::Shutdown,
        requires_daemon: true,
    },
    BuiltinEntry {
        name: DAEMON_VERB,
        aliases: &[],
        builtin: Builtin::Serv,
        requires_daemon: false,
    },
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Builtin(Builtin),
    Plugin(Plugin),
}

/// One entry of the command table, built-in or plugin alike
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub name: String,
    pub aliases: Vec<String>,
    pub requires_daemon: bool,
    pub target: Target,
}

impl CommandSpec {
    fn matches(&self, verb: &str) -> bool {
        self.name == verb || self.aliases.iter().any(|alias| alias == verb)
    }
}

/// Maps a verb to what should handle it
pub struct CommandRouter {
    builtins: Vec<CommandSpec>,
    plugins: Vec<CommandSpec>,
}

impl CommandRouter {
    pub fn new(plugins: Vec<Plugin>) -> Self {
        let builtins: Vec<CommandSpec> = BUILTINS
            .iter()
            .map(|entry| CommandSpec {
                name: entry.name.to_string(),
                aliases: entry.aliases.iter().map(|a| a.to_string()).collect(),
                requires_daemon: entry.requires_daemon,
                target: Target::Builtin(entry.builtin),
            })
            .collect();

        let plugins = plugins
            .into_iter()
            .filter(|plugin| {
                let shadowed = builtins.iter().any(|b| b.matches(&plugin.name));
                if shadowed {
                    log_debug(
                        "router",
                        &format!("Plugin '{}' is shadowed by a built-in command", plugin.name),
                        None,
                    );
                }
                !shadowed
            })
            .map(|plugin| CommandSpec {
                name: plugin.name.clone(),
                aliases: Vec::new(),
                requires_daemon: false,
                target: Target::Plugin(plugin),
            })
            .collect();

        Self { builtins, plugins }
    }

    /// Built-ins first, then plugins; anything else is a usage error
    pub fn resolve(&self, verb: &str) -> Result<&CommandSpec> {
        self.builtins
            .iter()
            .chain(self.plugins.iter())
            .find(|spec| spec.matches(verb))
            .ok_or_else(|| RsuvError::Usage(format!("unrecognized command '{verb}'")))
    }

    pub fn plugins(&self) -> impl Iterator<Item = &CommandSpec> {
        self.plugins.iter()
    }
}
