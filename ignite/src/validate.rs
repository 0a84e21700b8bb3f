use std::fmt;

/// One broken rule on one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub field: String,
    pub message: String,
}

impl Violation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Violation {
        Violation {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

///
/// Hook run by `Context::bind_valid` after decoding. An empty list means the value
/// is acceptable.
///
pub trait Validate {
    fn validate(&self) -> Vec<Violation>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    /// Present and not empty.
    Required,
    /// At least this many characters.
    MinLen(usize),
    /// At most this many characters.
    MaxLen(usize),
    /// One of the listed values.
    OneOf(Vec<String>),
}

impl Rule {
    fn check(&self, value: Option<&str>) -> Option<String> {
        let value = match (self, value) {
            (Rule::Required, None) => return Some("is required".to_string()),
            (_, None) => return None,
            (_, Some(value)) => value,
        };

        let length = value.chars().count();

        match self {
            Rule::Required if value.is_empty() => Some("is required".to_string()),
            Rule::MinLen(min) if length < *min => {
                Some(format!("must be at least {} characters", min))
            }
            Rule::MaxLen(max) if length > *max => {
                Some(format!("must be at most {} characters", max))
            }
            Rule::OneOf(allowed) if !allowed.iter().any(|a| a == value) => {
                Some(format!("must be one of [{}]", allowed.join(", ")))
            }
            _ => None,
        }
    }
}

struct FieldRules<T> {
    name: &'static str,
    getter: fn(&T) -> Option<&str>,
    rules: Vec<Rule>,
}

///
/// Declarative rules for the string fields of `T`.
///
/// ```rust, ignore
/// RuleSet::new()
///     .field("name", |u: &User| Some(u.name.as_str()), vec![Rule::Required, Rule::MaxLen(32)])
///     .field("role", |u: &User| u.role.as_deref(), vec![Rule::OneOf(roles)])
///     .check(&user)
/// ```
///
pub struct RuleSet<T> {
    fields: Vec<FieldRules<T>>,
}

impl<T> Default for RuleSet<T> {
    fn default() -> Self {
        RuleSet { fields: Vec::new() }
    }
}

impl<T> RuleSet<T> {
    pub fn new() -> RuleSet<T> {
        RuleSet::default()
    }

    pub fn field(
        mut self,
        name: &'static str,
        getter: fn(&T) -> Option<&str>,
        rules: Vec<Rule>,
    ) -> RuleSet<T> {
        self.fields.push(FieldRules {
            name,
            getter,
            rules,
        });
        self
    }

    pub fn check(&self, value: &T) -> Vec<Violation> {
        let mut violations = Vec::new();

        for field in &self.fields {
            let current = (field.getter)(value);

            for rule in &field.rules {
                if let Some(message) = rule.check(current) {
                    violations.push(Violation::new(field.name, message));
                }
            }
        }

        violations
    }
}
