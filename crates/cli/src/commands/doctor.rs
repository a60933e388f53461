//! `polylogue doctor` — diagnostic checks.

use pl_api::BackendClient;
use pl_domain::config::Config;

/// Run all diagnostic checks and print a summary.
///
/// Returns `Ok(true)` when every check passes, `Ok(false)` when at least
/// one check failed.
pub async fn run(config: &Config, config_path: &str) -> anyhow::Result<bool> {
    println!("polylogue doctor");
    println!("================\n");

    let mut all_passed = true;

    // 1. Config file
    check_config_file(config_path, &mut all_passed);

    // 2. Config validation
    let valid = super::config::validate(config, config_path);
    print_check("Config validation", valid, String::new());
    if !valid {
        all_passed = false;
    }

    // 3. Backend connectivity + entity catalog
    check_backend(config, &mut all_passed).await;

    println!();
    if all_passed {
        println!("All checks passed.");
    } else {
        println!("Some checks failed. Review the output above.");
    }

    Ok(all_passed)
}

// ── Individual checks ─────────────────────────────────────────────────

fn check_config_file(config_path: &str, all_passed: &mut bool) {
    let exists = std::path::Path::new(config_path).exists();
    print_check(
        "Config file exists",
        exists,
        if exists {
            config_path.to_owned()
        } else {
            format!("{config_path} not found (using defaults)")
        },
    );
    if !exists {
        *all_passed = false;
    }
}

async fn check_backend(config: &Config, all_passed: &mut bool) {
    let client = match BackendClient::new(&config.backend) {
        Ok(c) => c,
        Err(e) => {
            print_check("Backend client", false, e.to_string());
            *all_passed = false;
            return;
        }
    };

    match client.health().await {
        Ok(_) => print_check("Backend reachable", true, config.backend.base_url.clone()),
        Err(e) => {
            print_check("Backend reachable", false, e.to_string());
            *all_passed = false;
            return;
        }
    }

    match client.list_entities().await {
        Ok(entities) => {
            let ok = !entities.is_empty();
            print_check(
                "Entity catalog",
                ok,
                format!("{} entities", entities.len()),
            );
            if !ok {
                *all_passed = false;
            }
        }
        Err(e) => {
            print_check("Entity catalog", false, e.to_string());
            *all_passed = false;
        }
    }
}

fn print_check(name: &str, passed: bool, detail: String) {
    let mark = if passed { "ok " } else { "FAIL" };
    if detail.is_empty() {
        println!("[{mark}] {name}");
    } else {
        println!("[{mark}] {name}: {detail}");
    }
}
