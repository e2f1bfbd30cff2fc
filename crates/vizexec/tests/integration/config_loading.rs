use std::io::Write;

use vizexec::{Config, ConfigError};

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("failed to create temp file");
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_partial_config_keeps_defaults() {
    let file = write_config(
        r#"
public_url = "https://viz.example.com"
timeout = 5.0

[languages.python]
command = ["python3", "-u"]
extension = "py"
"#,
    );

    let config = Config::from_file(file.path()).expect("failed to load config");
    assert_eq!(config.public_url, "https://viz.example.com");
    assert_eq!(config.timeout, Some(5.0));
    assert_eq!(config.languages.python.command, vec!["python3", "-u"]);
    assert_eq!(config.languages.r.command, vec!["Rscript"]);
    assert_eq!(config.url_prefix, "/visuals");
    assert_eq!(config.outputs.document.as_str(), "html");
}

#[test]
fn test_load_missing_file_fails() {
    let result = Config::from_file("/nonexistent/vizexec.toml");
    assert!(matches!(result, Err(ConfigError::Parse(_))));
}

#[test]
fn test_load_invalid_empty_command() {
    let file = write_config(
        r#"
[languages.r]
command = [""]
extension = "R"
"#,
    );
    assert!(matches!(
        Config::from_file(file.path()),
        Err(ConfigError::Invalid(_))
    ));
}

#[test]
fn test_load_invalid_extension_with_dot() {
    let file = write_config(
        r#"
[outputs]
image = ".png"
document = "html"
"#,
    );
    assert!(Config::from_file(file.path()).is_err());
}

#[test]
fn test_load_invalid_negative_timeout() {
    let file = write_config("timeout = -1.0\n");
    assert!(matches!(
        Config::from_file(file.path()),
        Err(ConfigError::Invalid(_))
    ));
}

#[test]
fn test_load_invalid_url_prefix() {
    let file = write_config("url_prefix = \"visuals\"\n");
    assert!(Config::from_file(file.path()).is_err());
}

#[test]
fn test_load_none_uses_embedded_defaults() {
    let config = Config::load(None).expect("failed to load defaults");
    assert_eq!(config.languages.python.extension.as_str(), "py");
    assert_eq!(config.outputs.image.as_str(), "png");
}
