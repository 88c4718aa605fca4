//! Input checks run before any store access.
//!
//! Registration checks run in a fixed order and the first failure wins.
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};
use time::Date;

use super::{
    dto::{LoginRequest, RegisterRequest},
    repo_types::{parse_calendar_date, Gender, UserPatch},
};
use crate::error::AppError;

/// A registration that passed every check.
#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub gender: Gender,
    pub date_of_birth: Date,
    pub country: String,
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// At least 8 characters with an ASCII letter and an ASCII digit.
pub(crate) fn is_valid_password(password: &str) -> bool {
    password.chars().count() >= 8
        && password.chars().any(|c| c.is_ascii_alphabetic())
        && password.chars().any(|c| c.is_ascii_digit())
}

fn invalid(field: &'static str, message: &'static str) -> AppError {
    AppError::Validation { field, message }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn min_chars(value: &Option<String>, min: usize) -> bool {
    value.as_deref().is_some_and(|v| v.chars().count() >= min)
}

pub fn validate_registration(req: RegisterRequest) -> Result<Registration, AppError> {
    let email = non_empty(req.email)
        .filter(|e| is_valid_email(e))
        .ok_or(invalid("email", "Invalid email format"))?;

    let password = non_empty(req.password)
        .filter(|p| is_valid_password(p))
        .ok_or(invalid(
            "password",
            "Password must be at least 8 characters long and contain at least one letter and one number",
        ))?;

    let username = req.username.map(|u| u.trim().to_string());
    if !min_chars(&username, 3) {
        return Err(invalid("username", "Username must be at least 3 characters long"));
    }

    if !min_chars(&req.full_name, 2) {
        return Err(invalid("fullName", "Full name is required"));
    }

    let gender = req
        .gender
        .as_deref()
        .and_then(|g| g.parse::<Gender>().ok())
        .ok_or(invalid("gender", "Invalid gender value"))?;

    let date_of_birth = req
        .date_of_birth
        .as_deref()
        .and_then(parse_calendar_date)
        .ok_or(invalid("dateOfBirth", "Invalid date of birth"))?;

    if !min_chars(&req.country, 2) {
        return Err(invalid("country", "Country is required"));
    }

    Ok(Registration {
        username: username.unwrap_or_default(),
        email: email.trim().to_string(),
        password,
        full_name: req.full_name.unwrap_or_default(),
        gender,
        date_of_birth,
        country: req.country.unwrap_or_default(),
    })
}

pub fn validate_login(req: LoginRequest) -> Result<Credentials, AppError> {
    match (non_empty(req.username), non_empty(req.password)) {
        (Some(username), Some(password)) => Ok(Credentials {
            username: username.trim().to_string(),
            password,
        }),
        (None, _) => Err(invalid("username", "Username and password are required")),
        (Some(_), None) => Err(invalid("password", "Username and password are required")),
    }
}

fn string_field(
    fields: &mut Map<String, Value>,
    key: &'static str,
    message: &'static str,
) -> Result<Option<String>, AppError> {
    match fields.remove(key) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(_) => Err(invalid(key, message)),
    }
}

/// Turns an arbitrary update body into a patch.
///
/// `password` is dropped before anything else. Unknown keys are ignored; known
/// keys only have to carry a value of the right type.
pub fn patch_from_fields(mut fields: Map<String, Value>) -> Result<UserPatch, AppError> {
    fields.remove("password");

    let username = string_field(&mut fields, "username", "Username must be a string")?
        .map(|u| u.trim().to_string());
    let email = string_field(&mut fields, "email", "Email must be a string")?
        .map(|e| e.trim().to_string());
    let full_name = string_field(&mut fields, "fullName", "Full name must be a string")?;
    let gender = string_field(&mut fields, "gender", "Invalid gender value")?
        .map(|g| g.parse::<Gender>())
        .transpose()
        .map_err(|_| invalid("gender", "Invalid gender value"))?;
    let date_of_birth = string_field(&mut fields, "dateOfBirth", "Invalid date of birth")?
        .map(|d| parse_calendar_date(&d).ok_or(invalid("dateOfBirth", "Invalid date of birth")))
        .transpose()?;
    let country = string_field(&mut fields, "country", "Country must be a string")?;

    Ok(UserPatch {
        username,
        email,
        full_name,
        gender,
        date_of_birth,
        country,
    })
}
