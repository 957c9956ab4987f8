use anyhow::{bail, Result};
use zeroize::Zeroizing;

/// Read a secret from the terminal without echo. Surrounding whitespace is dropped.
pub fn secret(prompt: &str) -> Result<Zeroizing<String>> {
    let value = Zeroizing::new(rpassword::read_password_from_tty(Some(prompt))?);
    Ok(Zeroizing::new(value.trim().to_string()))
}

pub fn password(prompt: &str) -> Result<Zeroizing<String>> {
    Ok(Zeroizing::new(rpassword::read_password_from_tty(Some(prompt))?))
}

/// Ask twice and insist on a match.
pub fn new_password() -> Result<Zeroizing<String>> {
    let first = password("New password: ")?;
    if first.is_empty() {
        bail!("Password must not be empty");
    }

    let second = password("Repeat password: ")?;
    if *first != *second {
        bail!("Passwords do not match");
    }
    Ok(first)
}
