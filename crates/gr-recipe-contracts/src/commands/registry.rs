#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub action: &'static str,
}

/// Commands whose whole remainder is one raw string (keys, URLs, names).
pub(crate) const RAW_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "api_key",
        action: "set_api_key",
    },
    CommandSpec {
        command: "base_url",
        action: "set_base_url",
    },
    CommandSpec {
        command: "model",
        action: "set_model",
    },
    CommandSpec {
        command: "tab",
        action: "switch_tab",
    },
    CommandSpec {
        command: "date",
        action: "select_date",
    },
    CommandSpec {
        command: "entry",
        action: "select_entry",
    },
    CommandSpec {
        command: "demo",
        action: "select_demo",
    },
];

pub(crate) const SINGLE_PATH_COMMANDS: &[CommandSpec] = &[CommandSpec {
    command: "import",
    action: "import",
}];

pub(crate) const MULTI_PATH_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "add",
        action: "add_files",
    },
    CommandSpec {
        command: "paste",
        action: "paste",
    },
];

pub(crate) const INDEX_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "remove",
        action: "remove_asset",
    },
    CommandSpec {
        command: "select",
        action: "select_personal",
    },
    CommandSpec {
        command: "unpin",
        action: "unpin",
    },
    CommandSpec {
        command: "compare",
        action: "compare",
    },
];

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "clear",
        action: "clear_assets",
    },
    CommandSpec {
        command: "assets",
        action: "list_assets",
    },
    CommandSpec {
        command: "pin",
        action: "pin",
    },
    CommandSpec {
        command: "export",
        action: "export",
    },
    CommandSpec {
        command: "show",
        action: "show",
    },
    CommandSpec {
        command: "refresh",
        action: "refresh",
    },
    CommandSpec {
        command: "help",
        action: "help",
    },
    CommandSpec {
        command: "quit",
        action: "quit",
    },
];

pub const SESSION_HELP_COMMANDS: &[&str] = &[
    "/tab",
    "/add",
    "/paste",
    "/assets",
    "/remove",
    "/clear",
    "/date",
    "/entry",
    "/select",
    "/demo",
    "/show",
    "/refresh",
    "/pin",
    "/unpin",
    "/compare",
    "/export",
    "/import",
    "/api_key",
    "/base_url",
    "/model",
    "/help",
    "/quit",
];
