use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::state::ensure_cadence_home;

/// Credentials a provider call may need.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Secret {
    OpenAiApiKey,
    AnthropicToken,
}

impl Secret {
    fn env_var(self) -> &'static str {
        match self {
            Secret::OpenAiApiKey => "OPENAI_API_KEY",
            Secret::AnthropicToken => "ANTHROPIC_API_KEY",
        }
    }

    fn paste_hint(self) -> &'static str {
        match self {
            Secret::OpenAiApiKey => "cadence auth paste-openai-api-key",
            Secret::AnthropicToken => "cadence auth paste-anthropic-token",
        }
    }
}

/// Source of API credentials handed to the advisor.
pub trait SecretProvider {
    fn secret(&self, which: Secret) -> Result<Option<String>>;

    fn require(&self, which: Secret) -> Result<String> {
        self.secret(which)?.with_context(|| {
            format!(
                "missing {:?}; run: {} (or set {})",
                which,
                which.paste_hint(),
                which.env_var()
            )
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AuthState {
    pub anthropic_token: Option<String>,
    pub openai_api_key: Option<String>,
}

/// Reads `auth.json` in the cadence home.
#[derive(Debug, Clone)]
pub struct AuthFileSecrets {
    path: PathBuf,
}

impl AuthFileSecrets {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn default_location() -> Result<Self> {
        Ok(Self::new(auth_path()?))
    }
}

impl SecretProvider for AuthFileSecrets {
    fn secret(&self, which: Secret) -> Result<Option<String>> {
        let auth = load_auth(&self.path)?;
        Ok(match which {
            Secret::OpenAiApiKey => auth.openai_api_key,
            Secret::AnthropicToken => auth.anthropic_token,
        })
    }
}

/// Reads `OPENAI_API_KEY` / `ANTHROPIC_API_KEY`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSecrets;

impl SecretProvider for EnvSecrets {
    fn secret(&self, which: Secret) -> Result<Option<String>> {
        Ok(std::env::var(which.env_var())
            .ok()
            .filter(|v| !v.trim().is_empty()))
    }
}

/// First provider with a value wins.
pub struct ChainedSecrets {
    providers: Vec<Box<dyn SecretProvider + Send + Sync>>,
}

impl ChainedSecrets {
    pub fn new(providers: Vec<Box<dyn SecretProvider + Send + Sync>>) -> Self {
        Self { providers }
    }
}

impl SecretProvider for ChainedSecrets {
    fn secret(&self, which: Secret) -> Result<Option<String>> {
        for p in &self.providers {
            if let Some(v) = p.secret(which)? {
                return Ok(Some(v));
            }
        }
        Ok(None)
    }
}

fn auth_path() -> Result<PathBuf> {
    Ok(ensure_cadence_home()?.join("auth.json"))
}

pub fn load_auth(p: &Path) -> Result<AuthState> {
    if !p.exists() {
        return Ok(AuthState::default());
    }
    let s = fs::read_to_string(p).with_context(|| format!("read {}", p.display()))?;
    serde_json::from_str(&s).with_context(|| format!("parse {}", p.display()))
}

pub fn save_auth(p: &Path, auth: &AuthState) -> Result<()> {
    let s = serde_json::to_string_pretty(auth)?;
    fs::write(p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(())
}

fn prompt_secret(label: &str) -> Result<String> {
    print!("{}: ", label);
    io::stdout().flush().ok();
    let mut s = String::new();
    io::stdin().read_line(&mut s)?;
    Ok(s.trim().to_string())
}

pub fn anthropic_paste_token() -> Result<()> {
    let p = auth_path()?;
    let mut auth = load_auth(&p)?;
    let token = prompt_secret("Paste Anthropic token (starts with sk-ant-)")?;
    if !token.starts_with("sk-ant-") {
        bail!("token didn't look like an Anthropic token (expected prefix sk-ant-)");
    }
    auth.anthropic_token = Some(token);
    save_auth(&p, &auth)?;
    println!("Saved Anthropic token to {}", p.display());
    Ok(())
}

pub fn openai_paste_api_key() -> Result<()> {
    let p = auth_path()?;
    let mut auth = load_auth(&p)?;
    let key = prompt_secret("Paste OpenAI API key (starts with sk-)")?;
    if !key.starts_with("sk-") {
        bail!("key didn't look like an OpenAI API key (expected prefix sk-)");
    }
    auth.openai_api_key = Some(key);
    save_auth(&p, &auth)?;
    println!("Saved OpenAI API key to {}", p.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Option<&'static str>);

    impl SecretProvider for Fixed {
        fn secret(&self, _which: Secret) -> Result<Option<String>> {
            Ok(self.0.map(str::to_string))
        }
    }

    #[test]
    fn auth_file_provider_reads_saved_keys() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("auth.json");
        save_auth(
            &p,
            &AuthState {
                anthropic_token: None,
                openai_api_key: Some("sk-test".into()),
            },
        )
        .unwrap();

        let secrets = AuthFileSecrets::new(&p);
        assert_eq!(secrets.secret(Secret::OpenAiApiKey).unwrap().as_deref(), Some("sk-test"));
        assert_eq!(secrets.secret(Secret::AnthropicToken).unwrap(), None);
        let err = secrets.require(Secret::AnthropicToken).unwrap_err().to_string();
        assert!(err.contains("paste-anthropic-token"));
    }

    #[test]
    fn missing_auth_file_means_no_secrets() {
        let dir = tempfile::tempdir().unwrap();
        let secrets = AuthFileSecrets::new(dir.path().join("auth.json"));
        assert_eq!(secrets.secret(Secret::OpenAiApiKey).unwrap(), None);
    }

    #[test]
    fn chain_takes_first_hit() {
        let providers: Vec<Box<dyn SecretProvider + Send + Sync>> = vec![
            Box::new(Fixed(None)),
            Box::new(Fixed(Some("second"))),
            Box::new(Fixed(Some("third"))),
        ];
        let chain = ChainedSecrets::new(providers);
        assert_eq!(chain.require(Secret::OpenAiApiKey).unwrap(), "second");
    }
}
