//! Field-level validation.
//!
//! Each entity owns an ordered [`RuleSet`]: a flat list of field rules, each a
//! predicate plus a stable rule code and message. Evaluation never stops at
//! the first failure; every applicable rule runs and failures are reported in
//! declaration order.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::RulesConfig;

pub mod bill_of_material;
pub mod category;
pub mod confirmation;
pub mod identity;
pub mod material;
pub mod work_order;

/// Rule codes shared by several entities.
pub mod codes {
    pub const REQUIRED: &str = "Required";
    pub const MAX_LENGTH: &str = "MaxLength";
    pub const MIN_LENGTH: &str = "MinLength";
    pub const INVALID_FORMAT: &str = "InvalidFormat";
    pub const MUST_BE_POSITIVE: &str = "MustBeGreaterThanZero";
    pub const MUST_NOT_BE_NEGATIVE: &str = "MustNotBeNegative";
    pub const OUT_OF_RANGE: &str = "OutOfRange";
    pub const END_BEFORE_START: &str = "EndDateMustBeAfterStartDate";
    pub const INVALID_STATUS_TRANSITION: &str = "InvalidStatusTransition";
}

/// A single failed rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub field: String,
    pub rule: String,
    pub message: String,
}

impl Violation {
    pub fn new(field: impl Into<String>, rule: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            rule: rule.to_string(),
            message: message.into(),
        }
    }

    fn prefixed(mut self, prefix: &str) -> Self {
        self.field = format!("{}{}", prefix, self.field);
        self
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({})", self.field, self.message, self.rule)
    }
}

/// Ordered list of violations. Empty means valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Violations(Vec<Violation>);

impl Violations {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, violation: Violation) {
        self.0.push(violation);
    }

    /// Appends `other`, prefixing each field path (e.g. `items[0].`).
    pub fn extend_prefixed(&mut self, prefix: &str, other: Violations) {
        self.0
            .extend(other.0.into_iter().map(|v| v.prefixed(prefix)));
    }

    pub fn extend(&mut self, other: Violations) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Violation> {
        self.0.iter()
    }

    pub fn has_rule(&self, rule: &str) -> bool {
        self.0.iter().any(|v| v.rule == rule)
    }

    pub fn for_field<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a Violation> + 'a {
        self.0.iter().filter(move |v| v.field == field)
    }

    pub fn rules(&self) -> Vec<&str> {
        self.0.iter().map(|v| v.rule.as_str()).collect()
    }

    pub fn into_inner(self) -> Vec<Violation> {
        self.0
    }

    /// `Ok(())` when empty, otherwise the violations as the error.
    pub fn into_result(self) -> Result<(), Violations> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl From<Vec<Violation>> for Violations {
    fn from(violations: Vec<Violation>) -> Self {
        Self(violations)
    }
}

impl IntoIterator for Violations {
    type Item = Violation;
    type IntoIter = std::vec::IntoIter<Violation>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl fmt::Display for Violations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .0
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        f.write_str(&joined)
    }
}

impl From<validator::ValidationErrors> for Violations {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
        fields.sort_by(|a, b| a.0.cmp(b.0));

        let mut violations = Violations::new();
        for (field, errs) in fields {
            for err in errs {
                let message = err
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| err.code.to_string());
                violations.push(Violation::new(field, &err.code, message));
            }
        }
        violations
    }
}

/// Inputs a rule may read besides the record itself.
#[derive(Debug, Clone, Copy)]
pub struct ValidationContext {
    pub now: DateTime<Utc>,
    /// How far in the future a confirmation date may lie (clock skew).
    pub confirmation_date_tolerance: Duration,
}

impl ValidationContext {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now,
            ..Self::default()
        }
    }

    pub fn from_rules(rules: &RulesConfig) -> Self {
        Self {
            now: Utc::now(),
            confirmation_date_tolerance: Duration::seconds(rules.confirmation_date_tolerance_secs),
        }
    }
}

impl Default for ValidationContext {
    fn default() -> Self {
        Self::from_rules(&RulesConfig::default())
    }
}

type Predicate<T> = Box<dyn Fn(&T, &ValidationContext) -> bool + Send + Sync>;

struct Rule<T> {
    field: &'static str,
    code: &'static str,
    message: String,
    when: Option<Predicate<T>>,
    check: Predicate<T>,
}

/// Ordered rules for one record type.
pub struct RuleSet<T> {
    rules: Vec<Rule<T>>,
}

impl<T> Default for RuleSet<T> {
    fn default() -> Self {
        Self { rules: Vec::new() }
    }
}

impl<T> RuleSet<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a rule that always applies. `check` returns true when valid.
    pub fn rule<F>(
        mut self,
        field: &'static str,
        code: &'static str,
        message: impl Into<String>,
        check: F,
    ) -> Self
    where
        F: Fn(&T, &ValidationContext) -> bool + Send + Sync + 'static,
    {
        self.rules.push(Rule {
            field,
            code,
            message: message.into(),
            when: None,
            check: Box::new(check),
        });
        self
    }

    /// Adds a rule that only applies while `when` holds.
    pub fn rule_when<W, F>(
        mut self,
        field: &'static str,
        code: &'static str,
        message: impl Into<String>,
        when: W,
        check: F,
    ) -> Self
    where
        W: Fn(&T, &ValidationContext) -> bool + Send + Sync + 'static,
        F: Fn(&T, &ValidationContext) -> bool + Send + Sync + 'static,
    {
        self.rules.push(Rule {
            field,
            code,
            message: message.into(),
            when: Some(Box::new(when)),
            check: Box::new(check),
        });
        self
    }

    pub fn evaluate(&self, target: &T, ctx: &ValidationContext) -> Violations {
        let mut violations = Violations::new();
        for rule in &self.rules {
            if let Some(when) = &rule.when {
                if !when(target, ctx) {
                    continue;
                }
            }
            if !(rule.check)(target, ctx) {
                violations.push(Violation::new(rule.field, rule.code, rule.message.clone()));
            }
        }
        violations
    }

    /// Distinct field names in declaration order.
    pub fn fields(&self) -> Vec<&'static str> {
        let mut fields: Vec<&'static str> = Vec::new();
        for rule in &self.rules {
            if !fields.contains(&rule.field) {
                fields.push(rule.field);
            }
        }
        fields
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Records with a rule set.
pub trait Validatable {
    fn validate_with(&self, ctx: &ValidationContext) -> Violations;

    fn is_valid(&self, ctx: &ValidationContext) -> bool {
        self.validate_with(ctx).is_empty()
    }
}

/// Validates against the current clock and default rule settings.
pub fn validate<T: Validatable>(entity: &T) -> Violations {
    entity.validate_with(&ValidationContext::default())
}

pub(crate) fn present(value: &str) -> bool {
    !value.trim().is_empty()
}

pub(crate) fn within(value: &str, max: usize) -> bool {
    value.chars().count() <= max
}

pub(crate) fn opt_within(value: &Option<String>, max: usize) -> bool {
    value.as_deref().map_or(true, |v| within(v, max))
}

pub(crate) fn opt_non_negative(value: Option<Decimal>) -> bool {
    value.map_or(true, |v| v >= Decimal::ZERO)
}

/// `start <= end` (or `<` when `strict`) whenever both are present.
pub(crate) fn ordered<T: PartialOrd>(start: Option<&T>, end: Option<&T>, strict: bool) -> bool {
    match (start, end) {
        (Some(start), Some(end)) if strict => end > start,
        (Some(start), Some(end)) => end >= start,
        _ => true,
    }
}
