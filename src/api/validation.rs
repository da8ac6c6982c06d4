use regex::Regex;
use std::sync::OnceLock;

use super::ApiError;
use crate::models::{AnalysisInput, NewUser};

fn check_length(field: &str, value: &str, min: usize, max: usize) -> Result<(), ApiError> {
    let len = value.chars().count();
    if !(min..=max).contains(&len) {
        return Err(ApiError::validation(format!(
            "{field} must be between {min} and {max} characters"
        )));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<&str, ApiError> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("Invalid regex"));

    if !re.is_match(email) {
        return Err(ApiError::validation("Invalid email address"));
    }
    Ok(email)
}

pub fn validate_new_user(new_user: NewUser) -> Result<NewUser, ApiError> {
    validate_email(&new_user.email)?;
    check_length("Username", &new_user.username, 3, 50)?;

    if new_user.password.chars().count() < 6 {
        return Err(ApiError::validation(
            "Password must be at least 6 characters",
        ));
    }

    Ok(new_user)
}

pub fn validate_analysis_input(input: AnalysisInput) -> Result<AnalysisInput, ApiError> {
    check_length("Title", &input.title, 1, 200)?;
    check_length("Code", &input.code_content, 1, 50_000)?;
    check_length("Language", &input.language, 1, 50)?;
    Ok(input)
}

pub fn validate_id(id: i32) -> Result<i32, ApiError> {
    if id <= 0 {
        return Err(ApiError::validation(format!(
            "Invalid ID: {id}. ID must be a positive integer"
        )));
    }
    Ok(id)
}

pub fn validate_limit(limit: u64) -> Result<u64, ApiError> {
    const MAX_LIMIT: u64 = 100;
    const MIN_LIMIT: u64 = 1;

    if !(MIN_LIMIT..=MAX_LIMIT).contains(&limit) {
        return Err(ApiError::validation(format!(
            "Invalid limit: {limit}. Limit must be between {MIN_LIMIT} and {MAX_LIMIT}"
        )));
    }
    Ok(limit)
}

/// Offsets are bound as signed 64-bit integers by the database driver.
pub fn validate_skip(skip: u64) -> Result<u64, ApiError> {
    if i64::try_from(skip).is_err() {
        return Err(ApiError::validation(format!(
            "Invalid skip: {skip}. Skip must be at most {}",
            i64::MAX
        )));
    }
    Ok(skip)
}
