use regex::{Captures, Regex};
use std::env;
use std::sync::OnceLock;
use tracing::{debug, warn};

fn placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{(\w+)\}|\$(\w+)").expect("placeholder pattern is valid"))
}

fn var_name<'a>(caps: &Captures<'a>) -> &'a str {
    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str())
        .unwrap_or_default()
}

/// Substitute environment variables in the format ${VAR_NAME} or $VAR_NAME
///
/// Unset variables keep their placeholder so validation can report them.
pub fn substitute_env_vars(content: &str) -> String {
    let mut missing_vars = Vec::new();

    let result = placeholder().replace_all(content, |caps: &Captures| {
        let name = var_name(caps);
        match env::var(name) {
            Ok(value) => {
                debug!("Substituting environment variable: {}", name);
                value
            }
            Err(_) => {
                warn!("Environment variable '{}' not set", name);
                missing_vars.push(name.to_string());
                caps[0].to_string()
            }
        }
    });

    if !missing_vars.is_empty() {
        debug!("Environment variables not set: {:?}", missing_vars);
    }

    result.into_owned()
}

/// Names of environment placeholders left in `content`
pub fn unresolved_env_vars(content: &str) -> Vec<String> {
    placeholder()
        .captures_iter(content)
        .map(|caps| var_name(&caps).to_string())
        .collect()
}

/// Check if a string contains unresolved environment variable placeholders
pub fn has_unresolved_env_vars(content: &str) -> bool {
    placeholder().is_match(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitutes_set_variables() {
        env::set_var("KITTY_TEST_RPC", "https://rpc.example.org");
        let out = substitute_env_vars("rpc_url: ${KITTY_TEST_RPC}\nother: $KITTY_TEST_RPC");
        assert_eq!(out, "rpc_url: https://rpc.example.org\nother: https://rpc.example.org");
    }

    #[test]
    fn test_keeps_unset_placeholders() {
        let out = substitute_env_vars("account: ${KITTY_TEST_SURELY_UNSET}");
        assert_eq!(out, "account: ${KITTY_TEST_SURELY_UNSET}");
        assert!(has_unresolved_env_vars(&out));
        assert_eq!(unresolved_env_vars(&out), vec!["KITTY_TEST_SURELY_UNSET".to_string()]);
    }

    #[test]
    fn test_plain_text_untouched() {
        assert!(!has_unresolved_env_vars("0x1111111111111111111111111111111111111111"));
        assert!(unresolved_env_vars("no placeholders").is_empty());
    }
}
