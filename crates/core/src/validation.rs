use thiserror::Error;

pub const JOIN_CODE_LENGTH: usize = 6;

const JOIN_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("title is required")]
    EmptyTitle,
    #[error("group name is required")]
    EmptyGroupName,
    #[error("join code is required")]
    EmptyJoinCode,
    #[error("join code must be 6 uppercase letters or digits")]
    InvalidJoinCode,
    #[error("file name is required")]
    EmptyFileName,
}

pub fn validate_title(title: &str) -> Result<(), ValidationError> {
    if title.trim().is_empty() {
        Err(ValidationError::EmptyTitle)
    } else {
        Ok(())
    }
}

pub fn validate_group_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        Err(ValidationError::EmptyGroupName)
    } else {
        Ok(())
    }
}

pub fn validate_file_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        Err(ValidationError::EmptyFileName)
    } else {
        Ok(())
    }
}

/// Trims and uppercases user join-code input, then checks the shape.
pub fn normalize_join_code(input: &str) -> Result<String, ValidationError> {
    let code = input.trim().to_ascii_uppercase();
    if code.is_empty() {
        return Err(ValidationError::EmptyJoinCode);
    }
    if code.len() != JOIN_CODE_LENGTH
        || !code.bytes().all(|b| JOIN_CODE_ALPHABET.contains(&b))
    {
        return Err(ValidationError::InvalidJoinCode);
    }
    Ok(code)
}

/// Random 6-character A-Z/0-9 join code.
#[must_use]
pub fn generate_join_code() -> String {
    let raw = uuid::Uuid::new_v4();
    raw.as_bytes()
        .iter()
        .take(JOIN_CODE_LENGTH)
        .map(|byte| JOIN_CODE_ALPHABET[usize::from(*byte) % JOIN_CODE_ALPHABET.len()] as char)
        .collect()
}
