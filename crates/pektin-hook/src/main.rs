//! Certbot manual hook for Pektin
//!
//! `certbot certonly --manual --preferred-challenges dns
//!   --manual-auth-hook "pektin-hook auth" --manual-cleanup-hook "pektin-hook cleanup"`
//!
//! Each hook invocation is its own process, so values published under the same
//! name by separate invocations replace each other. Certificates covering both
//! a wildcard and its apex need the library embedded in a single process.

mod args;

use anyhow::Context;
use args::{Action, CREDENTIALS_ENV, HookArgs, USAGE};
use pektin_acme::{AuthenticatorConfig, PektinAuthenticator, validation_name};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,pektin_hook=debug,pektin_acme=debug".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let argv: Vec<String> = std::env::args().skip(1).collect();
    let hook = match HookArgs::parse(&argv, std::env::var(CREDENTIALS_ENV).ok()) {
        Ok(h) => h,
        Err(e) => {
            eprintln!("{}\n{}", e, USAGE);
            std::process::exit(2);
        }
    };

    let domain = certbot_env("CERTBOT_DOMAIN")?;
    let validation = certbot_env("CERTBOT_VALIDATION")?;
    let record_name = validation_name(&domain);

    let config = AuthenticatorConfig {
        credentials_path: hook.credentials,
        propagation_seconds: hook.propagation_seconds,
    };
    let authenticator = PektinAuthenticator::setup(&config)
        .await
        .context("Pektin setup failed")?;

    match hook.action {
        Action::Auth => {
            authenticator
                .perform(&domain, &record_name, &validation)
                .await
                .with_context(|| format!("Could not publish challenge for {}", domain))?;

            info!(
                secs = authenticator.propagation_seconds(),
                "Waiting for DNS propagation"
            );
            tokio::time::sleep(authenticator.propagation_delay()).await;
        }
        Action::Cleanup => {
            authenticator
                .cleanup(&domain, &record_name, &validation)
                .await;
        }
    }

    Ok(())
}

fn certbot_env(name: &str) -> anyhow::Result<String> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .with_context(|| format!("{} is not set; run pektin-hook from certbot", name))
}
