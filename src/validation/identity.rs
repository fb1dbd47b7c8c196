use once_cell::sync::Lazy;
use regex::Regex;

use super::{
    codes, opt_within, ordered, present, within, RuleSet, Validatable, ValidationContext,
    Violations,
};
use crate::models::{Role, User, UserRole};

pub const USERNAME_MIN: usize = 3;
pub const USERNAME_MAX: usize = 50;
pub const EMAIL_MAX: usize = 100;
pub const PERSON_NAME_MAX: usize = 50;
pub const ROLE_NAME_MAX: usize = 50;
pub const ROLE_DESCRIPTION_MAX: usize = 250;

static USERNAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9._-]+$").expect("username pattern is valid"));

static USER_RULES: Lazy<RuleSet<User>> = Lazy::new(|| {
    RuleSet::new()
        .rule("username", codes::REQUIRED, "Username is required", |u: &User, _| {
            present(&u.username)
        })
        .rule(
            "username",
            codes::MIN_LENGTH,
            format!("Username must be at least {} characters", USERNAME_MIN),
            |u: &User, _| u.username.chars().count() >= USERNAME_MIN,
        )
        .rule(
            "username",
            codes::MAX_LENGTH,
            format!("Username cannot exceed {} characters", USERNAME_MAX),
            |u: &User, _| within(&u.username, USERNAME_MAX),
        )
        .rule(
            "username",
            codes::INVALID_FORMAT,
            "Username may only contain letters, digits, '.', '_' and '-'",
            |u: &User, _| USERNAME_PATTERN.is_match(&u.username),
        )
        .rule("email", codes::REQUIRED, "Email is required", |u: &User, _| {
            present(&u.email)
        })
        .rule(
            "email",
            codes::MAX_LENGTH,
            format!("Email cannot exceed {} characters", EMAIL_MAX),
            |u: &User, _| within(&u.email, EMAIL_MAX),
        )
        .rule(
            "email",
            codes::INVALID_FORMAT,
            "Email is not a valid address",
            |u: &User, _| validator::validate_email(u.email.as_str()),
        )
        .rule(
            "first_name",
            codes::MAX_LENGTH,
            format!("First name cannot exceed {} characters", PERSON_NAME_MAX),
            |u: &User, _| opt_within(&u.first_name, PERSON_NAME_MAX),
        )
        .rule(
            "last_name",
            codes::MAX_LENGTH,
            format!("Last name cannot exceed {} characters", PERSON_NAME_MAX),
            |u: &User, _| opt_within(&u.last_name, PERSON_NAME_MAX),
        )
});

static ROLE_RULES: Lazy<RuleSet<Role>> = Lazy::new(|| {
    RuleSet::new()
        .rule("name", codes::REQUIRED, "Role name is required", |r: &Role, _| {
            present(&r.name)
        })
        .rule(
            "name",
            codes::MAX_LENGTH,
            format!("Role name cannot exceed {} characters", ROLE_NAME_MAX),
            |r: &Role, _| within(&r.name, ROLE_NAME_MAX),
        )
        .rule(
            "description",
            codes::MAX_LENGTH,
            format!("Description cannot exceed {} characters", ROLE_DESCRIPTION_MAX),
            |r: &Role, _| opt_within(&r.description, ROLE_DESCRIPTION_MAX),
        )
});

static USER_ROLE_RULES: Lazy<RuleSet<UserRole>> = Lazy::new(|| {
    RuleSet::new()
        .rule("user_id", codes::REQUIRED, "User is required", |a: &UserRole, _| {
            !a.user_id.is_nil()
        })
        .rule("role_id", codes::REQUIRED, "Role is required", |a: &UserRole, _| {
            !a.role_id.is_nil()
        })
        .rule(
            "expires_at",
            codes::END_BEFORE_START,
            "Expiry must be after the assigned date",
            |a: &UserRole, _| ordered(Some(&a.assigned_date), a.expires_at.as_ref(), true),
        )
});

impl Validatable for User {
    fn validate_with(&self, ctx: &ValidationContext) -> Violations {
        USER_RULES.evaluate(self, ctx)
    }
}

impl Validatable for Role {
    fn validate_with(&self, ctx: &ValidationContext) -> Violations {
        ROLE_RULES.evaluate(self, ctx)
    }
}

impl Validatable for UserRole {
    fn validate_with(&self, ctx: &ValidationContext) -> Violations {
        USER_ROLE_RULES.evaluate(self, ctx)
    }
}
