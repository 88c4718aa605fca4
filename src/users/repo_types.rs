use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{format_description::well_known::Rfc3339, macros::format_description, Date, OffsetDateTime};
use uuid::Uuid;

time::serde::format_description!(calendar_date, Date, "[year]-[month]-[day]");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "gender", rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl std::str::FromStr for Gender {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            "other" => Ok(Gender::Other),
            _ => Err(()),
        }
    }
}

/// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp; keeps the date part.
pub fn parse_calendar_date(raw: &str) -> Option<Date> {
    let raw = raw.trim();
    Date::parse(raw, format_description!("[year]-[month]-[day]"))
        .ok()
        .or_else(|| OffsetDateTime::parse(raw, &Rfc3339).ok().map(|dt| dt.date()))
}

/// User record in the credential store.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,                   // primary key, immutable
    pub username: String,           // unique
    pub email: String,              // unique
    pub password_hash: String,      // Argon2 PHC string, never leaves the service
    pub full_name: String,
    pub gender: Gender,
    pub date_of_birth: Date,
    pub country: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Everything needed to insert a user; timestamps are set by the store.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub gender: Gender,
    pub date_of_birth: Date,
    pub country: String,
}

/// Field-wise merge applied by an update. `None` leaves the stored value alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserPatch {
    pub username: Option<String>,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub gender: Option<Gender>,
    pub date_of_birth: Option<Date>,
    pub country: Option<String>,
}

impl UserPatch {
    pub fn apply(self, user: &mut User) {
        if let Some(v) = self.username {
            user.username = v;
        }
        if let Some(v) = self.email {
            user.email = v;
        }
        if let Some(v) = self.full_name {
            user.full_name = v;
        }
        if let Some(v) = self.gender {
            user.gender = v;
        }
        if let Some(v) = self.date_of_birth {
            user.date_of_birth = v;
        }
        if let Some(v) = self.country {
            user.country = v;
        }
    }
}

/// Public part of the user returned to the client. Has no password field at all.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub gender: Gender,
    #[serde(with = "calendar_date")]
    pub date_of_birth: Date,
    pub country: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            username: u.username,
            email: u.email,
            full_name: u.full_name,
            gender: u.gender,
            date_of_birth: u.date_of_birth,
            country: u.country,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_user(username: &str, email: &str) -> User {
    let now = OffsetDateTime::now_utc();
    User {
        id: Uuid::new_v4(),
        username: username.into(),
        email: email.into(),
        password_hash: "$argon2id$placeholder".into(),
        full_name: "Sample Person".into(),
        gender: Gender::Other,
        date_of_birth: time::macros::date!(1990 - 05 - 17),
        country: "Italy".into(),
        created_at: now,
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn parses_plain_and_timestamped_dates() {
        assert_eq!(parse_calendar_date("1990-05-17"), Some(date!(1990 - 05 - 17)));
        assert_eq!(
            parse_calendar_date("1990-05-17T10:00:00Z"),
            Some(date!(1990 - 05 - 17))
        );
        assert_eq!(parse_calendar_date("1990-02-30"), None);
        assert_eq!(parse_calendar_date("yesterday"), None);
        assert_eq!(parse_calendar_date(""), None);
    }

    #[test]
    fn gender_is_a_closed_set() {
        assert_eq!("female".parse::<Gender>(), Ok(Gender::Female));
        assert!("Female".parse::<Gender>().is_err());
        assert!("unknown".parse::<Gender>().is_err());
    }

    #[test]
    fn public_user_omits_password_hash() {
        let json = serde_json::to_value(PublicUser::from(sample_user("erin", "erin@example.com")))
            .unwrap();
        let obj = json.as_object().unwrap();
        assert!(!obj.contains_key("passwordHash"));
        assert!(!obj.contains_key("password_hash"));
        assert_eq!(obj["dateOfBirth"], "1990-05-17");
        assert_eq!(obj["fullName"], "Sample Person");
        assert_eq!(obj["gender"], "other");
    }

    #[test]
    fn patch_only_touches_supplied_fields() {
        let mut user = sample_user("frank", "frank@example.com");
        let before = user.clone();
        UserPatch {
            country: Some("Spain".into()),
            ..Default::default()
        }
        .apply(&mut user);
        assert_eq!(user.country, "Spain");
        assert_eq!(user.username, before.username);
        assert_eq!(user.password_hash, before.password_hash);
    }
}
