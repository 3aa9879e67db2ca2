use ::log::LevelFilter;
use log4rs::config::Logger;
use std::{collections::BTreeMap, env};

/// Per-target level override, e.g. `utxopool_utxomanager=debug`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(super) struct Directive {
    pub target: String,
    pub level: LevelFilter,
}

impl Directive {
    pub fn logger(&self) -> Logger {
        // No appenders of its own: records flow up to the root appenders.
        Logger::builder().build(self.target.clone(), self.level)
    }
}

pub(super) struct Filters {
    pub directives: Vec<Directive>,
    pub root_level: LevelFilter,
    /// Specs which could not be parsed and were skipped
    pub rejected: Vec<String>,
}

impl Filters {
    pub fn loggers(&self) -> impl Iterator<Item = Logger> + '_ {
        self.directives.iter().map(|x| x.logger())
    }
}

/// Collects a root level and per-target levels from `RUST_LOG`-style expressions
/// (`"info,utxopool_utxomanager=debug"`). Later specs override earlier ones.
pub(super) struct Builder {
    directives: BTreeMap<String, LevelFilter>,
    root_level: Option<LevelFilter>,
    rejected: Vec<String>,
}

impl Builder {
    pub fn new() -> Builder {
        Builder { directives: BTreeMap::new(), root_level: None, rejected: vec![] }
    }

    pub fn parse_env(&mut self, env: &str) -> &mut Self {
        self.parse_expression(&env::var(env).unwrap_or_default())
    }

    pub fn parse_expression(&mut self, expression: &str) -> &mut Self {
        for spec in expression.split(',').map(|x| x.trim()).filter(|x| !x.is_empty()) {
            let mut parts = spec.split('=');
            match (parts.next(), parts.next().map(|x| x.trim()), parts.next()) {
                // a lone level sets the root, a lone name enables everything for that target
                (Some(part0), None, None) => match part0.parse() {
                    Ok(level) => {
                        self.root_level.replace(level);
                    }
                    Err(_) => {
                        self.directives.insert(part0.to_string(), LevelFilter::max());
                    }
                },
                (Some(part0), Some(""), None) => {
                    self.directives.insert(part0.to_string(), LevelFilter::max());
                }
                (Some(part0), Some(part1), None) => match part1.parse() {
                    Ok(level) => {
                        self.directives.insert(part0.to_string(), level);
                    }
                    Err(_) => self.rejected.push(spec.to_string()),
                },
                _ => self.rejected.push(spec.to_string()),
            }
        }
        self
    }

    pub fn root_level(&mut self, root_level: LevelFilter) -> &mut Self {
        self.root_level.replace(root_level);
        self
    }

    pub fn build(&mut self) -> Filters {
        let directives = std::mem::take(&mut self.directives).into_iter().map(|(target, level)| Directive { target, level }).collect();
        Filters {
            directives,
            root_level: self.root_level.take().unwrap_or(LevelFilter::Error),
            rejected: std::mem::take(&mut self.rejected),
        }
    }
}
