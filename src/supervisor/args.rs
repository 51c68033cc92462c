//! Command-line construction for the proxy server.

use crate::config::{ConfigStore, ProxyConfig};

/// Build the server's argument vector from configuration.
///
/// File paths are resolved through `store`, so relative entries land under
/// the root directory. `--blacklist` is omitted whenever the blacklist is
/// disabled or generated automatically.
pub fn build_args(config: &ProxyConfig, store: &ConfigStore) -> Vec<String> {
    let mut args = vec![
        "--host".to_string(),
        config.host.clone(),
        "--port".to_string(),
        config.port.to_string(),
        "--fragment-method".to_string(),
        config.fragment_method.to_string(),
        "--domain-matching".to_string(),
        config.domain_matching.to_string(),
    ];

    if !config.no_blacklist && !config.auto_blacklist {
        let path = store.resolve_path(&config.blacklist_file);
        args.push("--blacklist".to_string());
        args.push(path.display().to_string());
    }
    if let Some(out_host) = &config.out_host {
        args.push("--out-host".to_string());
        args.push(out_host.clone());
    }
    if let Some(file) = &config.log_access_file {
        args.push("--log-access".to_string());
        args.push(store.resolve_path(file).display().to_string());
    }
    if let Some(file) = &config.log_error_file {
        args.push("--log-error".to_string());
        args.push(store.resolve_path(file).display().to_string());
    }
    if config.no_blacklist {
        args.push("--no-blacklist".to_string());
    }
    if config.auto_blacklist {
        args.push("--autoblacklist".to_string());
    }
    if config.quiet {
        args.push("--quiet".to_string());
    }

    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DomainMatching, FragmentMethod};

    fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn test_default_args() {
        let store = ConfigStore::new("/srv/nodpi");
        let args = build_args(&ProxyConfig::default(), &store);

        assert_eq!(
            args,
            vec![
                "--host",
                "0.0.0.0",
                "--port",
                "8881",
                "--fragment-method",
                "random",
                "--domain-matching",
                "strict",
                "--blacklist",
                "/srv/nodpi/blacklist.txt",
            ]
        );
    }

    #[test]
    fn test_auto_blacklist_omits_blacklist_path() {
        let store = ConfigStore::new("/srv/nodpi");
        let config = ProxyConfig {
            auto_blacklist: true,
            ..ProxyConfig::default()
        };
        let args = build_args(&config, &store);

        assert!(args.iter().any(|a| a == "--autoblacklist"));
        assert!(!args.iter().any(|a| a == "--blacklist"));
    }

    #[test]
    fn test_no_blacklist_omits_blacklist_path() {
        let store = ConfigStore::new("/srv/nodpi");
        let config = ProxyConfig {
            no_blacklist: true,
            ..ProxyConfig::default()
        };
        let args = build_args(&config, &store);

        assert!(args.iter().any(|a| a == "--no-blacklist"));
        assert!(!args.iter().any(|a| a == "--blacklist"));
    }

    #[test]
    fn test_optional_flags_and_paths() {
        let store = ConfigStore::new("/srv/nodpi");
        let config = ProxyConfig {
            host: "127.0.0.1".to_string(),
            port: 1080,
            fragment_method: FragmentMethod::Sni,
            domain_matching: DomainMatching::Loose,
            out_host: Some("192.168.1.10".to_string()),
            log_access_file: Some("logs/access.log".to_string()),
            log_error_file: Some("/var/log/nodpi/error.log".to_string()),
            quiet: true,
            ..ProxyConfig::default()
        };
        let args = build_args(&config, &store);

        assert_eq!(value_after(&args, "--port"), Some("1080"));
        assert_eq!(value_after(&args, "--fragment-method"), Some("sni"));
        assert_eq!(value_after(&args, "--domain-matching"), Some("loose"));
        assert_eq!(value_after(&args, "--out-host"), Some("192.168.1.10"));
        assert_eq!(
            value_after(&args, "--log-access"),
            Some("/srv/nodpi/logs/access.log")
        );
        assert_eq!(
            value_after(&args, "--log-error"),
            Some("/var/log/nodpi/error.log")
        );
        assert_eq!(args.last().map(String::as_str), Some("--quiet"));
    }
}
