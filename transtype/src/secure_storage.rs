const SERVICE_NAME: &str = "com.transtype.app";
const API_KEY_ACCOUNT: &str = "deepseek_api_key";

fn api_key_entry() -> Result<keyring::Entry, String> {
    keyring::Entry::new(SERVICE_NAME, API_KEY_ACCOUNT).map_err(|err| err.to_string())
}

pub fn read_api_key() -> Result<Option<String>, String> {
    let entry = api_key_entry()?;

    match entry.get_password() {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => Ok(Some(value)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(err) => Err(format!("failed to read API key from secure storage: {err}")),
    }
}

pub fn write_api_key(api_key: &str) -> Result<(), String> {
    let entry = api_key_entry()?;
    let trimmed = api_key.trim();

    if trimmed.is_empty() {
        return match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(err) => Err(format!("failed to clear API key in secure storage: {err}")),
        };
    }

    entry
        .set_password(trimmed)
        .map_err(|err| format!("failed to save API key in secure storage: {err}"))
}

/// Writes the key and reads it back; `false` means callers must persist the
/// key some other way.
pub fn store_verified(api_key: &str) -> Result<bool, String> {
    write_api_key(api_key)?;
    if api_key.trim().is_empty() {
        return Ok(true);
    }
    Ok(matches!(read_api_key()?, Some(saved) if saved.trim() == api_key.trim()))
}
