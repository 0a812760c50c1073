//! File configuration and flag overrides.
//!
//! The TOML file is the base; any flag or environment variable given on the
//! command line replaces the corresponding file value.

use anyhow::{bail, Context};
use serde::Deserialize;
use std::path::Path;

use stakeflow_ledger::RpcConfig;
use stakeflow_types::{Account, Contracts};
use stakeflow_utils::LogFormat;
use stakeflow_wallet_core::SessionConfig;

/// Layout of `stakeflow.toml`.
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub log_level: Option<String>,
    #[serde(default)]
    pub log_format: Option<LogFormat>,
    #[serde(default)]
    pub session: Option<SessionConfig>,
    #[serde(default)]
    pub rpc: Option<RpcConfig>,
}

impl FileConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        if let Some(session) = &config.session {
            session.validate()?;
        }
        Ok(config)
    }
}

/// Values supplied by flags or environment variables.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub rpc_url: Option<String>,
    pub account: Option<Account>,
    pub token: Option<Account>,
    pub staking: Option<Account>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
}

/// Fully resolved settings for one CLI invocation.
#[derive(Debug)]
pub struct Resolved {
    pub session: SessionConfig,
    pub rpc: RpcConfig,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Resolved {
    pub fn merge(overrides: Overrides, file: Option<FileConfig>) -> anyhow::Result<Self> {
        let file = file.unwrap_or_default();

        let session = match file.session {
            Some(mut session) => {
                if let Some(token) = overrides.token {
                    session.contracts.token = token;
                }
                if let Some(staking) = overrides.staking {
                    session.contracts.staking = staking;
                }
                session
            }
            None => match (overrides.token, overrides.staking) {
                (Some(token), Some(staking)) => SessionConfig::new(Contracts { token, staking }),
                _ => bail!(
                    "contract addresses missing: pass --token and --staking or set [session.contracts] in the config file"
                ),
            },
        };

        let rpc = match file.rpc {
            Some(mut rpc) => {
                if let Some(url) = overrides.rpc_url {
                    rpc.url = url;
                }
                if let Some(account) = overrides.account {
                    rpc.signer = account;
                }
                rpc
            }
            None => match (overrides.rpc_url, overrides.account) {
                (Some(url), Some(account)) => RpcConfig::new(url, account),
                _ => bail!("ledger endpoint missing: pass --rpc-url and --account or set [rpc] in the config file"),
            },
        };

        Ok(Self {
            session,
            rpc,
            log_level: overrides
                .log_level
                .or(file.log_level)
                .unwrap_or_else(|| "info".to_string()),
            log_format: overrides.log_format.or(file.log_format).unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const FILE: &str = r#"
log_level = "debug"
log_format = "json"

[session]
rewards_poll_interval_ms = 2000

[session.contracts]
token = "0x00000000000000000000000000000000000000bb"
staking = "0x00000000000000000000000000000000000000cc"

[rpc]
url = "http://127.0.0.1:8545"
signer = "0x00000000000000000000000000000000000000aa"
"#;

    fn account(byte: u8) -> Account {
        Account::parse(&format!("0x{}", format!("{byte:02x}").repeat(20))).unwrap()
    }

    fn file() -> FileConfig {
        toml::from_str(FILE).unwrap()
    }

    #[test]
    fn file_alone_is_enough() {
        let resolved = Resolved::merge(Overrides::default(), Some(file())).unwrap();
        assert_eq!(resolved.log_level, "debug");
        assert_eq!(resolved.log_format, LogFormat::Json);
        assert_eq!(resolved.session.rewards_poll_interval_ms, 2_000);
        assert_eq!(resolved.session.balance_poll_interval_ms, 5_000);
        assert_eq!(resolved.rpc.url, "http://127.0.0.1:8545");
        assert_eq!(resolved.rpc.receipt_timeout_secs, 120);
    }

    #[test]
    fn flags_override_file() {
        let overrides = Overrides {
            rpc_url: Some("http://ledger:9000".into()),
            account: Some(account(0x11)),
            staking: Some(account(0x22)),
            log_level: Some("warn".into()),
            ..Overrides::default()
        };
        let resolved = Resolved::merge(overrides, Some(file())).unwrap();
        assert_eq!(resolved.rpc.url, "http://ledger:9000");
        assert_eq!(resolved.rpc.signer, account(0x11));
        assert_eq!(resolved.session.contracts.staking, account(0x22));
        assert_eq!(
            resolved.session.contracts.token.as_str(),
            "0x00000000000000000000000000000000000000bb"
        );
        assert_eq!(resolved.log_level, "warn");
        assert_eq!(resolved.log_format, LogFormat::Json);
    }

    #[test]
    fn flags_alone_need_every_address() {
        let partial = Overrides {
            rpc_url: Some("http://ledger:9000".into()),
            account: Some(account(0x11)),
            token: Some(account(0x33)),
            ..Overrides::default()
        };
        assert!(Resolved::merge(partial.clone(), None).is_err());

        let full = Overrides {
            staking: Some(account(0x44)),
            ..partial
        };
        let resolved = Resolved::merge(full, None).unwrap();
        assert_eq!(resolved.log_level, "info");
        assert_eq!(resolved.log_format, LogFormat::Human);
        assert_eq!(resolved.session.annual_rate_bps, 1_000);
    }

    #[test]
    fn loads_and_validates_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(FILE.as_bytes()).unwrap();
        assert!(FileConfig::load(f.path()).unwrap().rpc.is_some());

        let mut bad = tempfile::NamedTempFile::new().unwrap();
        bad.write_all(FILE.replace("2000", "0").as_bytes()).unwrap();
        assert!(FileConfig::load(bad.path()).is_err());
    }
}
