use crate::collector::strava::TokenGrant;
use crate::config::set_mode_600;
use anyhow::{Context, Result};
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Persists the token response exactly as Strava returned it.
pub fn save_token_grant(path: &Path, grant: &TokenGrant) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create token directory: {}", parent.display()))?;
    }

    let content =
        serde_json::to_string_pretty(&grant.raw).context("Failed to serialize token response")?;
    fs::write(path, content)
        .with_context(|| format!("Failed to write token file: {}", path.display()))?;
    set_mode_600(path)?;

    Ok(())
}

pub fn load_saved_access_token(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read token file: {}", path.display()))?;
    let parsed: Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse token file: {}", path.display()))?;

    Ok(parsed
        .get("access_token")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(ToOwned::to_owned))
}

#[cfg(test)]
mod tests {
    use super::{load_saved_access_token, save_token_grant};
    use crate::collector::strava::parse_token_grant;

    #[test]
    fn saved_grant_is_reused_as_access_token() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("keys").join("strava_tokens.json");
        let grant = parse_token_grant(
            r#"{"access_token":"fresh","refresh_token":"forever","athlete":{"id":7}}"#,
        )
        .expect("grant parsed");

        save_token_grant(&path, &grant).expect("grant saved");

        let saved: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).expect("token file read"))
                .expect("token file is JSON");
        assert_eq!(saved["athlete"]["id"], 7);
        assert_eq!(
            load_saved_access_token(&path).expect("token loaded").as_deref(),
            Some("fresh")
        );
    }

    #[test]
    fn missing_token_file_is_not_an_error() {
        let dir = tempfile::tempdir().expect("temp dir");

        assert!(
            load_saved_access_token(&dir.path().join("absent.json"))
                .expect("lookup succeeds")
                .is_none()
        );
    }
}
