// tests/config_load.rs
use pulse_portal::config::PulseConfig;
use std::{env, fs};

const ENV_VARS: [&str; 5] = [
    "PULSE_CONFIG_PATH",
    "PULSE_TEST_MODE",
    "PULSE_POLL_INTERVAL_SECS",
    "API_KEY",
    "GEMINI_API_KEY",
];

fn clear_env() {
    for k in ENV_VARS {
        env::remove_var(k);
    }
}

#[serial_test::serial]
#[test]
fn toml_and_json_files_load() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();

    let p_toml = dir.path().join("pulse.toml");
    fs::write(
        &p_toml,
        r#"
[intel]
provider = " Gemini "
api_key = "literal-key"
api_base = "http://localhost:9999/"

[feed]
poll_interval_secs = 0
capacity = 10
"#,
    )
    .unwrap();
    let cfg = PulseConfig::load_from_file(&p_toml).unwrap();
    assert_eq!(cfg.intel.provider, "gemini");
    assert_eq!(cfg.intel.api_key, "literal-key");
    assert_eq!(cfg.intel.api_base, "http://localhost:9999");
    assert_eq!(cfg.feed.poll_interval_secs, 1);
    assert_eq!(cfg.feed.capacity, 10);

    let p_json = dir.path().join("pulse.json");
    fs::write(&p_json, r#"{"feed": {"capacity": 5}}"#).unwrap();
    let cj = PulseConfig::load_from_file(&p_json).unwrap();
    assert_eq!(cj.feed.capacity, 5);
    assert_eq!(cj.feed.poll_interval_secs, 60);

    fs::write(&p_json, "{ not json").unwrap();
    assert!(PulseConfig::load_from_file(&p_json).is_err());
}

#[serial_test::serial]
#[test]
fn default_uses_env_then_fallbacks() {
    clear_env();
    // Isolate CWD so the repo's own config/ is not read
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();

    // 1) nothing → defaults
    let d = PulseConfig::load_default().unwrap();
    assert_eq!(d.feed.capacity, 24);

    // 2) ./config/pulse.toml fallback
    fs::create_dir_all(tmp.path().join("config")).unwrap();
    fs::write(
        tmp.path().join("config/pulse.toml"),
        "[feed]\ncapacity = 7\n",
    )
    .unwrap();
    assert_eq!(PulseConfig::load_default().unwrap().feed.capacity, 7);

    // 3) env path wins
    let p_env = tmp.path().join("other.json");
    fs::write(&p_env, r#"{"feed": {"capacity": 3}}"#).unwrap();
    env::set_var("PULSE_CONFIG_PATH", p_env.display().to_string());
    assert_eq!(PulseConfig::load_default().unwrap().feed.capacity, 3);

    // 4) env path to a missing file is an error
    env::set_var("PULSE_CONFIG_PATH", tmp.path().join("missing.toml"));
    assert!(PulseConfig::load_default().is_err());

    clear_env();
    env::set_current_dir(&old).unwrap();
}

#[serial_test::serial]
#[test]
fn api_key_and_overrides_come_from_env() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("pulse.toml");
    fs::write(&p, "[intel]\napi_key = \"ENV\"\n").unwrap();

    let none = PulseConfig::load_from_file(&p).unwrap();
    assert!(!none.has_api_key());

    env::set_var("GEMINI_API_KEY", "from-gemini");
    assert_eq!(
        PulseConfig::load_from_file(&p).unwrap().intel.api_key,
        "from-gemini"
    );

    // API_KEY is preferred over GEMINI_API_KEY
    env::set_var("API_KEY", "from-api");
    assert_eq!(
        PulseConfig::load_from_file(&p).unwrap().intel.api_key,
        "from-api"
    );

    env::set_var("PULSE_TEST_MODE", "mock");
    env::set_var("PULSE_POLL_INTERVAL_SECS", "15");
    let cfg = PulseConfig::load_from_file(&p).unwrap();
    assert_eq!(cfg.intel.provider, "mock");
    assert_eq!(cfg.feed.poll_interval_secs, 15);

    clear_env();
}
