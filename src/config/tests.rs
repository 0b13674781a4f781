use super::*;
use tempfile::{NamedTempFile, TempDir};

#[test]
fn test_default_config() {
    let config = Config::default();
    assert_eq!(config.embedding.provider, "hf");
    assert_eq!(config.embedding.model, "BAAI/bge-small-en-v1.5");
    assert_eq!(config.embedding.batch_size, 32);
    assert_eq!(config.embedding.api_key_env, "OPENAI_API_KEY");
    assert_eq!(config.search.limit, 5);
    assert_eq!(config.summarizer.provider, "openai");
    assert_eq!(config.summarizer.model, "gpt-4.1-nano");
}

#[test]
fn test_validate_valid_config() {
    let config = Config::default();
    assert!(config.validate().is_ok());
}

#[test]
fn test_validate_unknown_provider() {
    let mut config = Config::default();
    config.embedding.provider = "cohere".to_string();
    let err = config.validate().unwrap_err();
    assert!(matches!(
        err,
        GitSearchError::Config(ConfigError::InvalidValue { ref key, .. }) if key == "embedding.provider"
    ));
}

#[test]
fn test_validate_invalid_batch_size() {
    let mut config = Config::default();
    config.embedding.batch_size = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_validate_invalid_limit() {
    let mut config = Config::default();
    config.search.limit = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_validate_unknown_llm_provider() {
    let mut config = Config::default();
    config.summarizer.provider = "mystery".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn test_validate_zero_retries() {
    let mut config = Config::default();
    config.summarizer.max_retries = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_serialized_config_loads_back() {
    let temp_file = NamedTempFile::new().unwrap();
    let path = temp_file.path();

    let mut config = Config::default();
    config.embedding.provider = "openai".to_string();
    config.embedding.model = "text-embedding-3-small".to_string();
    config.search.limit = 12;

    std::fs::write(path, toml::to_string_pretty(&config).unwrap()).unwrap();
    let loaded = Config::from_file(path).unwrap();

    assert_eq!(loaded.embedding.provider, "openai");
    assert_eq!(loaded.embedding.model, "text-embedding-3-small");
    assert_eq!(loaded.search.limit, 12);
}

#[test]
fn test_load_partial_file_uses_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(&path, "[search]\nlimit = 9\n").unwrap();

    let loaded = Config::from_file(&path).unwrap();
    assert_eq!(loaded.search.limit, 9);
    assert_eq!(loaded.embedding.provider, "hf");
    assert_eq!(loaded.summarizer.model, "gpt-4.1-nano");
}

#[test]
fn test_load_invalid_toml() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(&path, "this is = = not toml").unwrap();

    let result = Config::from_file(&path);
    assert!(matches!(
        result.unwrap_err(),
        GitSearchError::Config(ConfigError::ParseFailed(_))
    ));
}

#[test]
fn test_load_nonexistent_file() {
    let result = Config::from_file(Path::new("/nonexistent/config.toml"));
    assert!(matches!(
        result.unwrap_err(),
        GitSearchError::Config(ConfigError::FileNotFound(_))
    ));
}

#[test]
fn test_toml_serialization() {
    let config = Config::default();
    let toml_str = toml::to_string(&config).unwrap();
    assert!(toml_str.contains("root_dir"));
    assert!(toml_str.contains("batch_size"));
    assert!(toml_str.contains("gpt-4.1-nano"));
}

#[test]
fn test_apply_env_overrides() {
    // Safety: these variables are only read by this test
    unsafe {
        std::env::set_var("GIT_GPT_SEARCH_STORE", "/tmp/ggs-env-store");
        std::env::set_var("GIT_GPT_SEARCH_BATCH_SIZE", "7");
        std::env::set_var("GIT_GPT_SEARCH_LLM_MODEL", "gpt-4o-mini");
    }

    let mut config = Config::default();
    config.apply_env_overrides();

    assert_eq!(config.storage.root_dir, PathBuf::from("/tmp/ggs-env-store"));
    assert_eq!(config.embedding.batch_size, 7);
    assert_eq!(config.summarizer.model, "gpt-4o-mini");

    // Safety: cleaning up the variables set above
    unsafe {
        std::env::remove_var("GIT_GPT_SEARCH_STORE");
        std::env::remove_var("GIT_GPT_SEARCH_BATCH_SIZE");
        std::env::remove_var("GIT_GPT_SEARCH_LLM_MODEL");
    }
}

#[test]
fn test_parse_batch_size() {
    assert_eq!(parse_batch_size("7"), Some(7));
    assert_eq!(parse_batch_size(" 16\n"), Some(16));
    assert_eq!(parse_batch_size("lots"), None);
    assert_eq!(parse_batch_size("-3"), None);
    assert_eq!(parse_batch_size(""), None);
}

#[test]
fn test_with_store_root() {
    let config = Config::with_store_root("/var/lib/ggs");
    assert_eq!(config.storage.root_dir, PathBuf::from("/var/lib/ggs"));
    assert!(config.validate().is_ok());
}
