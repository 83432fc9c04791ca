use anyhow::{Context, Result};
use zeroize::Zeroizing;

/// Pick the password for an operation.
///
/// An explicit value wins over one carried by a shared link. With neither,
/// the user is prompted when `prompt` is set; otherwise the password is empty.
pub fn resolve(
    explicit: Option<String>,
    from_link: Option<String>,
    prompt: bool,
) -> Result<Zeroizing<String>> {
    if let Some(password) = explicit.or(from_link) {
        return Ok(Zeroizing::new(password));
    }
    if prompt {
        let password =
            rpassword::prompt_password("Password: ").context("failed to read password")?;
        return Ok(Zeroizing::new(password));
    }
    Ok(Zeroizing::new(String::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_beats_link() {
        let pw = resolve(Some("typed".into()), Some("linked".into()), false).unwrap();
        assert_eq!(pw.as_str(), "typed");
    }

    #[test]
    fn test_link_used_when_no_explicit() {
        let pw = resolve(None, Some("linked".into()), false).unwrap();
        assert_eq!(pw.as_str(), "linked");
    }

    #[test]
    fn test_nothing_means_empty() {
        assert!(resolve(None, None, false).unwrap().is_empty());
    }
}
