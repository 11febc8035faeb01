use std::path::PathBuf;

pub const CREDENTIALS_ENV: &str = "PEKTIN_CREDENTIALS";
const DEFAULT_CREDENTIALS_PATH: &str = "/etc/letsencrypt/pektin.ini";
const DEFAULT_PROPAGATION_SECONDS: u64 = 10;

pub const USAGE: &str = "usage: pektin-hook <auth|cleanup> [--credentials PATH] [--propagation-seconds N]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Auth,
    Cleanup,
}

#[derive(Debug, PartialEq, Eq)]
pub struct HookArgs {
    pub action: Action,
    pub credentials: PathBuf,
    pub propagation_seconds: u64,
}

impl HookArgs {
    /// Parse arguments (without the program name). `env_credentials` is the
    /// value of `PEKTIN_CREDENTIALS`, used when `--credentials` is absent.
    pub fn parse(args: &[String], env_credentials: Option<String>) -> Result<Self, String> {
        let mut action = None;
        let mut credentials = None;
        let mut propagation_seconds = DEFAULT_PROPAGATION_SECONDS;

        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            let (flag, inline) = match arg.split_once('=') {
                Some((flag, value)) if flag.starts_with("--") => (flag, Some(value.to_string())),
                _ => (arg.as_str(), None),
            };

            match flag {
                "auth" if action.is_none() => action = Some(Action::Auth),
                "cleanup" if action.is_none() => action = Some(Action::Cleanup),
                "--credentials" => {
                    let value = inline
                        .or_else(|| iter.next().cloned())
                        .ok_or("--credentials needs a path")?;
                    credentials = Some(PathBuf::from(value));
                }
                "--propagation-seconds" => {
                    let value = inline
                        .or_else(|| iter.next().cloned())
                        .ok_or("--propagation-seconds needs a value")?;
                    propagation_seconds = value
                        .parse()
                        .map_err(|_| format!("invalid propagation seconds: {}", value))?;
                }
                other => return Err(format!("unexpected argument: {}", other)),
            }
        }

        Ok(Self {
            action: action.ok_or("missing action (auth or cleanup)")?,
            credentials: credentials
                .or_else(|| env_credentials.filter(|p| !p.is_empty()).map(PathBuf::from))
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CREDENTIALS_PATH)),
            propagation_seconds,
        })
    }
}
