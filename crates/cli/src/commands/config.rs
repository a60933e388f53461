//! `polylogue config` — validate and show the resolved configuration.

use pl_domain::config::Config;

/// Check the parsed config for problems.  Returns `true` when clean.
pub fn validate(config: &Config, config_path: &str) -> bool {
    let mut ok = true;

    if !config.backend.base_url.starts_with("http://")
        && !config.backend.base_url.starts_with("https://")
    {
        eprintln!(
            "error: backend.base_url must start with http:// or https:// (got {})",
            config.backend.base_url
        );
        ok = false;
    }

    if config.backend.timeout_ms == 0 {
        eprintln!("error: backend.timeout_ms must be greater than zero");
        ok = false;
    }

    if let Some(temp) = config.chat.temperature {
        if !(0.0..=2.0).contains(&temp) {
            eprintln!("error: chat.temperature must be within 0.0–2.0 (got {temp})");
            ok = false;
        }
    }

    if ok {
        println!("{config_path}: OK");
    }
    ok
}

/// Dump the resolved configuration (defaults applied) as TOML.
pub fn show(config: &Config) {
    match toml::to_string_pretty(config) {
        Ok(rendered) => println!("{rendered}"),
        Err(e) => eprintln!("error: rendering config: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(validate(&Config::default(), "test.toml"));
    }

    #[test]
    fn bad_base_url_fails_validation() {
        let mut config = Config::default();
        config.backend.base_url = "not-a-url".into();
        assert!(!validate(&config, "test.toml"));
    }

    #[test]
    fn out_of_range_temperature_fails_validation() {
        let mut config = Config::default();
        config.chat.temperature = Some(3.5);
        assert!(!validate(&config, "test.toml"));
    }
}
