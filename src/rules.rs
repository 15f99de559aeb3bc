//! Ordered rewrite rules turning raw asset references into Django template tags.
//!
//! A [`RuleTable`] holds two passes. The primary pass runs over each template
//! in memory right after includes are expanded; the corrective pass runs over
//! the written templates tree once every template exists. Inside a pass the
//! rules run in table order and each one sees the output of the ones before
//! it, so the order below is part of the behaviour:
//!
//! | # | rule                     | effect                                              |
//! |---|--------------------------|-----------------------------------------------------|
//! | 1 | `load-static-header`     | `{% load static %}` after the first `<html>` tag    |
//! | 2 | `node-modules`           | `.../node_modules/x` → `{% static 'libs/x' %}`      |
//! | 3 | `asset-root`             | `/assets/x`, `assets/x` → `{% static 'x' %}`        |
//! | 4 | `bare-category`          | `images/x` (js, css, fonts) → `{% static '...' %}`  |
//! | 5 | `page-link`              | `href="dir/about.html"` → `{% url 'about' %}`       |
//! | 6 | `collapse-double-static` | nested static tags → one tag                        |
//!
//! Attribute values may use either quote style; rewritten attributes are
//! always written back double-quoted.
//!
//! Rule 4 only matches a value that *starts* with a category name, while every
//! value produced by rules 2 and 3 starts with `{`. The two can never both
//! apply to the same reference.

use crate::config::{Config, RulePass};
use crate::error::{PipelineError, Result};
use regex::Regex;
use std::borrow::Cow;
use std::fmt;
use std::sync::LazyLock;

/// Guard that keeps the header rule from firing twice
pub const LOAD_STATIC: &str = "{% load static %}";

/// Matches `$$`, `${name}` and `$name` inside a replacement template
static GROUP_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\$|\$\{([^}]*)\}|\$([_0-9A-Za-z]+)").expect("group reference pattern is valid")
});

/// Which pass a rule belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    Primary,
    Corrective,
}

impl From<RulePass> for Pass {
    fn from(pass: RulePass) -> Self {
        match pass {
            RulePass::Primary => Pass::Primary,
            RulePass::Corrective => Pass::Corrective,
        }
    }
}

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pass::Primary => f.pad("primary"),
            Pass::Corrective => f.pad("corrective"),
        }
    }
}

/// How many matches a rule replaces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    First,
    All,
}

/// A single pattern → replacement substitution
#[derive(Debug, Clone)]
pub struct RewriteRule {
    name: String,
    pattern: Regex,
    replacement: String,
    scope: Scope,
    unless_contains: Option<String>,
}

impl RewriteRule {
    /// Creates a global rule
    ///
    /// # Errors
    ///
    /// - `PipelineError::Regex` if the pattern does not compile.
    /// - `PipelineError::MalformedRule` if the replacement refers to a group
    ///   the pattern does not capture.
    pub fn new(name: &str, pattern: &str, replacement: &str) -> Result<Self> {
        let pattern = Regex::new(pattern)?;
        validate_replacement(name, &pattern, replacement)?;
        Ok(Self {
            name: name.to_string(),
            pattern,
            replacement: replacement.to_string(),
            scope: Scope::All,
            unless_contains: None,
        })
    }

    /// Restricts the rule to its first match
    pub fn first_only(mut self) -> Self {
        self.scope = Scope::First;
        self
    }

    /// Skips the rule entirely when the text already contains `guard`
    pub fn unless_contains(mut self, guard: &str) -> Self {
        self.unless_contains = Some(guard.to_string());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn replacement(&self) -> &str {
        &self.replacement
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Applies the rule; borrows the input when nothing matched
    pub fn apply<'t>(&self, text: &'t str) -> Cow<'t, str> {
        if let Some(guard) = &self.unless_contains
            && text.contains(guard.as_str())
        {
            return Cow::Borrowed(text);
        }
        match self.scope {
            Scope::All => self.pattern.replace_all(text, self.replacement.as_str()),
            Scope::First => self.pattern.replace(text, self.replacement.as_str()),
        }
    }
}

/// Checks every group reference of `replacement` against the pattern's captures
fn validate_replacement(rule: &str, pattern: &Regex, replacement: &str) -> Result<()> {
    let malformed = |reason: String| PipelineError::MalformedRule {
        rule: rule.to_string(),
        reason,
    };

    for capture in GROUP_REF.captures_iter(replacement) {
        let Some(reference) = capture.get(1).or_else(|| capture.get(2)) else {
            continue; // `$$`
        };
        let reference = reference.as_str();
        if reference.is_empty() {
            return Err(malformed("empty group reference '${}'".to_string()));
        }
        let exists = match reference.parse::<usize>() {
            Ok(index) => index < pattern.captures_len(),
            Err(_) => pattern.capture_names().flatten().any(|n| n == reference),
        };
        if !exists {
            return Err(malformed(format!(
                "replacement refers to group '{reference}' but the pattern has {} group(s)",
                pattern.captures_len() - 1
            )));
        }
    }

    // `${` without a closing brace would silently be copied verbatim
    let stripped = GROUP_REF.replace_all(replacement, "");
    if stripped.contains("${") {
        return Err(malformed("unterminated '${' in replacement".to_string()));
    }

    Ok(())
}

/// Primary and corrective rules, in application order
#[derive(Debug, Clone)]
pub struct RuleTable {
    primary: Vec<RewriteRule>,
    corrective: Vec<RewriteRule>,
}

impl RuleTable {
    /// The built-in Django rules for the given asset-root marker
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::MalformedRule` if `asset_marker` is empty.
    pub fn django(asset_marker: &str) -> Result<Self> {
        let marker = asset_marker.trim_matches('/');
        if marker.is_empty() {
            return Err(PipelineError::MalformedRule {
                rule: "asset-root".to_string(),
                reason: "asset marker must not be empty".to_string(),
            });
        }
        let marker = regex::escape(marker);

        let primary = vec![
            RewriteRule::new(
                "load-static-header",
                r"(?i)<html(?:\s[^>]*)?>",
                "${0}\n{% load static %}",
            )?
            .first_only()
            .unless_contains(LOAD_STATIC),
            RewriteRule::new(
                "node-modules",
                r#"\b(src|href)=(?:"[^"]*?node_modules/([^"]*)"|'[^']*?node_modules/([^']*)')"#,
                r#"${1}="{% static 'libs/${2}${3}' %}""#,
            )?,
            RewriteRule::new(
                "asset-root",
                &format!(r#"\b(src|href)=(?:"/?{marker}/([^"]*)"|'/?{marker}/([^']*)')"#),
                r#"${1}="{% static '${2}${3}' %}""#,
            )?,
            RewriteRule::new(
                "bare-category",
                r#"\b(src|href)=(?:"((?:images|js|css|fonts)/[^"]*)"|'((?:images|js|css|fonts)/[^']*)')"#,
                r#"${1}="{% static '${2}${3}' %}""#,
            )?,
            RewriteRule::new(
                "page-link",
                r#"\bhref=(?:"(?:[^":{}]*/)?([^":/{}]+)\.html"|'(?:[^':{}]*/)?([^':/{}]+)\.html')"#,
                r#"href="{% url '${1}${2}' %}""#,
            )?,
            RewriteRule::new(
                "collapse-double-static",
                r"(?:\{% static ')+([^'{}]*)(?:' %\})+",
                "{% static '${1}' %}",
            )?,
        ];

        let corrective = vec![
            RewriteRule::new(
                "root-image",
                r#"\bsrc=(?:"(/[^/"{}][^"{}]*\.(?:png|jpe?g|gif|svg|webp))"|'(/[^/'{}][^'{}]*\.(?:png|jpe?g|gif|svg|webp))')"#,
                r#"src="{% static '${1}${2}' %}""#,
            )?,
            RewriteRule::new(
                "root-stylesheet",
                r#"\bhref=(?:"(/[^/"{}][^"{}]*\.(?:css|ico))"|'(/[^/'{}][^'{}]*\.(?:css|ico))')"#,
                r#"href="{% static '${1}${2}' %}""#,
            )?,
            RewriteRule::new(
                "strip-leading-slash",
                r"\{% static '/+([^']*)' %\}",
                "{% static '${1}' %}",
            )?,
        ];

        Ok(Self {
            primary,
            corrective,
        })
    }

    /// Built-in rules plus the configured extra rules appended to their pass
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Regex` or `PipelineError::MalformedRule` for a bad rule.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut table = Self::django(&config.rewrite.asset_marker)?;
        for extra in &config.rewrite.rules {
            let rule = RewriteRule::new(&extra.name, &extra.pattern, &extra.replacement)
                .map_err(|e| match e {
                    PipelineError::Regex(source) => PipelineError::MalformedRule {
                        rule: extra.name.clone(),
                        reason: source.to_string(),
                    },
                    other => other,
                })?;
            table.push(extra.pass.into(), rule);
        }
        Ok(table)
    }

    /// Appends a rule to the end of a pass
    pub fn push(&mut self, pass: Pass, rule: RewriteRule) {
        match pass {
            Pass::Primary => self.primary.push(rule),
            Pass::Corrective => self.corrective.push(rule),
        }
    }

    pub fn rules(&self, pass: Pass) -> &[RewriteRule] {
        match pass {
            Pass::Primary => &self.primary,
            Pass::Corrective => &self.corrective,
        }
    }

    /// Runs every rule of `pass` over `text`, in order
    pub fn apply(&self, pass: Pass, text: &str) -> String {
        let mut current = text.to_string();
        for rule in self.rules(pass) {
            if let Cow::Owned(changed) = rule.apply(&current) {
                tracing::trace!(rule = rule.name(), %pass, "rule matched");
                current = changed;
            }
        }
        current
    }

    /// The primary pass
    pub fn rewrite(&self, text: &str) -> String {
        self.apply(Pass::Primary, text)
    }

    /// The corrective pass
    pub fn correct(&self, text: &str) -> String {
        self.apply(Pass::Corrective, text)
    }
}
