//! Script naming conventions and header directives

use tether_core::ScriptContext;
use tracing::{error, warn};

/// Script file extensions, in init-lookup priority order
pub const SCRIPT_EXTENSIONS: [&str; 2] = [".lua", ".luau"];

/// Run-context suffixes, in init-lookup priority order
pub const CONTEXT_SUFFIXES: [&str; 3] = ["", ".client", ".server"];

const PRAGMA_PREFIX: &str = "--!";
const DIRECTIVE_PREFIX: &str = "--@";

/// Directives found at the top of a script
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Directives {
    pub context: Option<ScriptContext>,
    pub disabled: bool,
}

pub fn is_script_extension(ext: &str) -> bool {
    SCRIPT_EXTENSIONS.contains(&ext)
}

/// Split a script stem into its logical name and file-name context
///
/// `Main.server` -> (`Main`, Server); `util` -> (`util`, ModuleScript)
pub fn split_context(stem: &str) -> (&str, ScriptContext) {
    if let Some(title) = stem.strip_suffix(".server") {
        (title, ScriptContext::Server)
    } else if let Some(title) = stem.strip_suffix(".client") {
        (title, ScriptContext::Client)
    } else {
        (stem, ScriptContext::ModuleScript)
    }
}

/// Every init script file name a folder named `folder` may carry, highest priority first
pub fn init_candidates(folder: &str) -> Vec<String> {
    let stems = [format!("{folder}.init"), "init".to_string()];
    let mut names = Vec::with_capacity(12);
    for stem in &stems {
        for ext in SCRIPT_EXTENSIONS {
            for suffix in CONTEXT_SUFFIXES {
                names.push(format!("{stem}{suffix}{ext}"));
            }
        }
    }
    names
}

/// Whether a file name follows either init convention
pub fn is_init_name(name: &str) -> bool {
    let Some(stem) = SCRIPT_EXTENSIONS.iter().find_map(|ext| name.strip_suffix(ext)) else {
        return false;
    };
    let (title, _) = split_context(stem);
    title == "init" || title.ends_with(".init")
}

/// Scan leading `--!` pragmas and `--@` directives
pub fn scan_directives(source: &str, origin: &str) -> Directives {
    let mut directives = Directives::default();

    for line in source.lines() {
        let line = line.trim_end();
        if line.starts_with(PRAGMA_PREFIX) {
            continue;
        }
        let Some(directive) = line.strip_prefix(DIRECTIVE_PREFIX) else {
            break;
        };
        match directive.trim() {
            "script:server" => directives.context = Some(ScriptContext::Server),
            "script:client" => directives.context = Some(ScriptContext::Client),
            "script:legacy" => directives.context = Some(ScriptContext::LegacyScript),
            "script:module" => directives.context = Some(ScriptContext::ModuleScript),
            "disabled" => directives.disabled = true,
            other => warn!("{}: unknown directive --@{}", origin, other),
        }
    }

    directives
}

/// Final context and disabled flag for a script
pub fn resolve_context(file_context: ScriptContext, directives: Directives, origin: &str) -> (ScriptContext, bool) {
    let context = directives.context.unwrap_or(file_context);
    if directives.disabled && context == ScriptContext::ModuleScript {
        error!("{}: a ModuleScript cannot be disabled", origin);
        return (context, false);
    }
    (context, directives.disabled)
}
