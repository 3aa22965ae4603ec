use std::fmt;

use serde::Serialize;

/// One call of an engine module, e.g.
/// `r.watershed -am elevation=hydem threshold=5000 drainage=dirs --overwrite`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Invocation {
    module: String,
    flags: String,
    params: Vec<(String, String)>,
    overwrite: bool,
}

impl Invocation {
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            flags: String::new(),
            params: Vec::new(),
            overwrite: false,
        }
    }

    /// Raster algebra through `r.mapcalc`; `expression` is the full
    /// `target = ...` statement.
    pub fn mapcalc(expression: impl Into<String>) -> Self {
        Self::new("r.mapcalc")
            .param("expression", expression.into())
            .overwrite()
    }

    /// Single-letter module flags, e.g. `"am"` for `-am`.
    pub fn flags(mut self, flags: &str) -> Self {
        self.flags.push_str(flags);
        self
    }

    pub fn param(mut self, key: &str, value: impl ToString) -> Self {
        self.params.push((key.to_string(), value.to_string()));
        self
    }

    pub fn overwrite(mut self) -> Self {
        self.overwrite = true;
        self
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn has_flag(&self, flag: char) -> bool {
        self.flags.contains(flag)
    }

    pub fn is_overwrite(&self) -> bool {
        self.overwrite
    }

    /// Argument vector passed to the module executable.
    pub fn args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(self.params.len() + 2);
        if !self.flags.is_empty() {
            args.push(format!("-{}", self.flags));
        }
        args.extend(self.params.iter().map(|(key, value)| format!("{key}={value}")));
        if self.overwrite {
            args.push("--overwrite".to_string());
        }
        args
    }

    /// Shell-style rendering used in logs and dry-run plans.
    pub fn command_line(&self) -> String {
        let mut line = self.module.clone();
        for arg in self.args() {
            line.push(' ');
            line.push_str(&quote(&arg));
        }
        line
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command_line())
    }
}

fn quote(arg: &str) -> String {
    if arg.contains(char::is_whitespace) || arg.contains('"') {
        format!("\"{}\"", arg.replace('"', "\\\""))
    } else {
        arg.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_place_flags_first_and_overwrite_last() {
        let inv = Invocation::new("r.watershed")
            .flags("am")
            .param("elevation", "hydem")
            .param("threshold", 5000)
            .param("drainage", "dirs")
            .overwrite();

        assert_eq!(
            inv.args(),
            vec![
                "-am",
                "elevation=hydem",
                "threshold=5000",
                "drainage=dirs",
                "--overwrite"
            ]
        );
    }

    #[test]
    fn bare_invocation_has_no_flags() {
        let inv = Invocation::new("r.to.vect").param("input", "sink_target");
        assert_eq!(inv.args(), vec!["input=sink_target"]);
        assert!(!inv.is_overwrite());
        assert_eq!(inv.get("input"), Some("sink_target"));
        assert_eq!(inv.get("output"), None);
    }

    #[test]
    fn mapcalc_quotes_expression_in_command_line() {
        let inv = Invocation::mapcalc("diff = fill_pass_0 - dem");
        assert_eq!(inv.module(), "r.mapcalc");
        assert_eq!(inv.get("expression"), Some("diff = fill_pass_0 - dem"));
        assert_eq!(
            inv.command_line(),
            "r.mapcalc \"expression=diff = fill_pass_0 - dem\" --overwrite"
        );
    }
}
