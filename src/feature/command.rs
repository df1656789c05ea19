// src/feature/command.rs

//! Building the runner invocation for a feature file.

/// Static parts of every runner invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandTemplate {
    /// Path to the runner binary, e.g. `./bin/behat`.
    pub bin: String,
    /// Optional runner config, rendered as `-c <config>`.
    pub config: Option<String>,
    /// Free-form flags appended verbatim.
    pub flags: String,
    /// Prefix prepended to every file path (plain concatenation).
    pub base_dir: String,
}

impl CommandTemplate {
    /// Render the command line for `file`.
    ///
    /// The four parts are always joined with single spaces, so empty parts
    /// still leave their separator behind. Nothing is quoted or escaped.
    pub fn file_to_command(&self, file: &str) -> String {
        let config_opt = match self.config {
            Some(ref c) if !c.is_empty() => format!("-c {c}"),
            _ => String::new(),
        };
        let file_path = format!("{}{}", self.base_dir, file);

        [self.bin.as_str(), config_opt.as_str(), self.flags.as_str(), file_path.as_str()].join(" ")
    }
}
