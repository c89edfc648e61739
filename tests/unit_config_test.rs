// tests/unit_config_test.rs

//! Tests for the flat `key value` configuration loader.

use pyropedb::config::Config;
use std::io::Write;

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_missing_file_yields_defaults() {
    let config = Config::from_file("/definitely/not/here/pyrope.conf").unwrap();
    assert_eq!(config.bind, "0.0.0.0");
    assert_eq!(config.port, 6379);
    assert_eq!(config.databases, 16);
    assert!(!config.appendonly);
    assert_eq!(config.appendfilename, "appendonly.aof");
    assert!(!config.cluster_mode());
}

#[test]
fn test_parses_all_known_keys() {
    let file = write_config(
        "# a comment\n\
         bind 127.0.0.1\n\
         port 7000\n\
         databases 4\n\
         appendonly yes\n\
         appendfilename pyrope.aof\n\
         self 10.0.0.1:7000\n\
         peers 10.0.0.2:7000, 10.0.0.3:7000\n",
    );
    let config = Config::from_file(file.path().to_str().unwrap()).unwrap();

    assert_eq!(config.bind, "127.0.0.1");
    assert_eq!(config.port, 7000);
    assert_eq!(config.databases, 4);
    assert!(config.appendonly);
    assert_eq!(config.appendfilename, "pyrope.aof");
    assert_eq!(config.self_addr.as_deref(), Some("10.0.0.1:7000"));
    assert_eq!(config.peers, vec!["10.0.0.2:7000", "10.0.0.3:7000"]);
    assert!(config.cluster_mode());
    assert_eq!(config.addr(), "127.0.0.1:7000");
}

#[test]
fn test_unknown_keys_and_blank_lines_are_skipped() {
    let file = write_config("\n# only comments\nnosuchkey whatever\nport 6380\n");
    let config = Config::from_file(file.path().to_str().unwrap()).unwrap();
    assert_eq!(config.port, 6380);
}

#[test]
fn test_invalid_values_are_rejected() {
    let file = write_config("port notaport\n");
    assert!(Config::from_file(file.path().to_str().unwrap()).is_err());

    let file = write_config("appendonly maybe\n");
    assert!(Config::from_file(file.path().to_str().unwrap()).is_err());
}

#[test]
fn test_self_without_peers_is_not_cluster_mode() {
    let file = write_config("self 10.0.0.1:6379\n");
    let config = Config::from_file(file.path().to_str().unwrap()).unwrap();
    assert!(!config.cluster_mode());
}

#[test]
fn test_zero_databases_falls_back_to_default() {
    let file = write_config("databases 0\n");
    let config = Config::from_file(file.path().to_str().unwrap()).unwrap();
    assert_eq!(config.databases, 16);
}
