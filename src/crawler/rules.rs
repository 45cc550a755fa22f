//! Domain-pattern dispatch rules
//!
//! A `RuleSet` maps domains to handlers (fetchers or parsers). Rules are kept
//! sorted by descending priority; the first rule whose pattern matches wins,
//! and a domain no rule matches falls back to the default handler.

use crate::crawler::fetcher::Fetcher;
use crate::crawler::parser::Parser;
use crate::url::{DomainPattern, MatchMode};
use crate::UrlError;
use std::sync::Arc;

/// A domain pattern bound to a handler
#[derive(Clone)]
pub struct Rule<H> {
    pub pattern: String,
    pub mode: MatchMode,
    pub priority: i32,
    pub handler: H,
}

impl<H> Rule<H> {
    pub fn new(pattern: impl Into<String>, mode: MatchMode, priority: i32, handler: H) -> Self {
        Self {
            pattern: pattern.into(),
            mode,
            priority,
            handler,
        }
    }

    pub fn exact(pattern: impl Into<String>, priority: i32, handler: H) -> Self {
        Self::new(pattern, MatchMode::Exact, priority, handler)
    }

    pub fn glob(pattern: impl Into<String>, priority: i32, handler: H) -> Self {
        Self::new(pattern, MatchMode::Glob, priority, handler)
    }

    pub fn regex(pattern: impl Into<String>, priority: i32, handler: H) -> Self {
        Self::new(pattern, MatchMode::Regex, priority, handler)
    }
}

pub type FetcherRule = Rule<Arc<dyn Fetcher>>;
pub type ParserRule = Rule<Arc<dyn Parser>>;

#[derive(Clone)]
struct CompiledRule<H> {
    pattern: DomainPattern,
    priority: i32,
    handler: H,
}

/// Ordered rules plus an optional default handler
#[derive(Clone)]
pub struct RuleSet<H> {
    rules: Vec<CompiledRule<H>>,
    default: Option<H>,
}

impl<H> Default for RuleSet<H> {
    fn default() -> Self {
        Self {
            rules: Vec::new(),
            default: None,
        }
    }
}

impl<H> RuleSet<H> {
    pub fn new(default: Option<H>) -> Self {
        Self {
            rules: Vec::new(),
            default,
        }
    }

    /// Appends rules and re-sorts by descending priority
    ///
    /// Stops at the first pattern that fails to compile. Rules appended before
    /// the failure stay in the set. Ties keep insertion order.
    pub fn add<I>(&mut self, rules: I) -> Result<usize, UrlError>
    where
        I: IntoIterator<Item = Rule<H>>,
    {
        let mut added = 0;
        let mut failure = None;

        for rule in rules {
            match DomainPattern::compile(&rule.pattern, rule.mode) {
                Ok(pattern) => {
                    self.rules.push(CompiledRule {
                        pattern,
                        priority: rule.priority,
                        handler: rule.handler,
                    });
                    added += 1;
                }
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        self.rules.sort_by(|a, b| b.priority.cmp(&a.priority));

        match failure {
            Some(e) => Err(e),
            None => Ok(added),
        }
    }

    /// Finds the handler for a domain
    pub fn resolve(&self, domain: &str) -> Option<&H> {
        self.rules
            .iter()
            .find(|rule| rule.pattern.matches(domain))
            .map(|rule| &rule.handler)
            .or(self.default.as_ref())
    }

    /// Patterns in dispatch order, with their priorities
    pub fn patterns(&self) -> Vec<(&str, i32)> {
        self.rules
            .iter()
            .map(|rule| (rule.pattern.as_str(), rule.priority))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
