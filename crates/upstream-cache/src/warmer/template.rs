//! Key and URL templates for warm targets.
//!
//! Supported placeholders:
//!
//! - `{entity}`: the entity id the template is expanded for (team abbreviation, id, ...)
//! - `{entity_lower}`: the same id in lowercase
//! - `{date}`: the cycle's date, `YYYY-MM-DD`
//! - `{season}`: the season in progress, e.g. `20252026`; seasons start on 1 September UTC
//!
//! `{{` and `}}` produce literal braces.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Datelike, Local, NaiveDate, Utc};
use tracing::debug;
use url::Url;

use crate::error::{ConfigError, WarmError};
use crate::fetch::{FetchTarget, HttpFetcher};
use crate::key::CacheKey;
use crate::warmer::source::{WarmKeySource, WarmTarget};

/// Values substituted into templates for one cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemplateContext {
    pub date: NaiveDate,
    /// Date the season is derived from, taken in UTC
    pub season_date: NaiveDate,
}

impl TemplateContext {
    pub fn today() -> Self {
        Self {
            date: Local::now().date_naive(),
            season_date: Utc::now().date_naive(),
        }
    }

    pub fn on(date: NaiveDate) -> Self {
        Self {
            date,
            season_date: date,
        }
    }

    pub fn season(&self) -> String {
        let year = self.season_date.year();
        if self.season_date.month() >= 9 {
            format!("{}{}", year, year + 1)
        } else {
            format!("{}{}", year - 1, year)
        }
    }
}

/// Expand `template` for `entity` on the context's date
pub fn expand_template(
    template: &str,
    entity: Option<&str>,
    ctx: &TemplateContext,
) -> Result<String, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidTemplate {
        template: template.to_owned(),
        reason: reason.to_owned(),
    };

    let mut result = String::with_capacity(template.len() * 2);
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                result.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                result.push('}');
            }
            '{' => {
                let mut name = String::new();
                let mut closed = false;
                for n in chars.by_ref() {
                    if n == '}' {
                        closed = true;
                        break;
                    }
                    name.push(n);
                }
                if !closed {
                    return Err(invalid("unclosed placeholder"));
                }

                match name.as_str() {
                    "entity" => match entity {
                        Some(entity) => result.push_str(entity),
                        None => return Err(invalid("{entity} used without entities")),
                    },
                    "entity_lower" => match entity {
                        Some(entity) => result.push_str(&entity.to_lowercase()),
                        None => return Err(invalid("{entity_lower} used without entities")),
                    },
                    "date" => result.push_str(&ctx.date.format("%Y-%m-%d").to_string()),
                    "season" => result.push_str(&ctx.season()),
                    other => return Err(invalid(&format!("unknown placeholder {{{other}}}"))),
                }
            }
            '}' => return Err(invalid("unmatched '}'")),
            _ => result.push(c),
        }
    }

    Ok(result)
}

/// Declares one family of warm targets: a key template, the upstream URL
/// template, and the entities to expand them for. No entities means a single
/// target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyTemplate {
    pub key: String,
    pub url: String,
    pub entities: Vec<String>,
    pub expect_json: bool,
}

impl KeyTemplate {
    pub fn new(key: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            url: url.into(),
            entities: Vec::new(),
            expect_json: true,
        }
    }

    pub fn with_entities<I, S>(mut self, entities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entities = entities.into_iter().map(Into::into).collect();
        self
    }

    /// Expand into `(key, target)` pairs
    pub fn expand(&self, ctx: &TemplateContext) -> Result<Vec<(CacheKey, FetchTarget)>, ConfigError> {
        if self.entities.is_empty() {
            Ok(vec![self.expand_for(None, ctx)?])
        } else {
            self.entities
                .iter()
                .map(|e| self.expand_for(Some(e.as_str()), ctx))
                .collect()
        }
    }

    fn expand_for(
        &self,
        entity: Option<&str>,
        ctx: &TemplateContext,
    ) -> Result<(CacheKey, FetchTarget), ConfigError> {
        let key = expand_template(&self.key, entity, ctx)?;
        let raw_url = expand_template(&self.url, entity, ctx)?;
        let url = Url::parse(&raw_url).map_err(|e| ConfigError::InvalidTemplate {
            template: self.url.clone(),
            reason: format!("expands to invalid URL '{raw_url}': {e}"),
        })?;
        let target = if self.expect_json {
            FetchTarget::json(url)
        } else {
            FetchTarget::raw(url)
        };
        Ok((CacheKey::from(key), target))
    }
}

/// Key source that expands [`KeyTemplate`]s against today's date each cycle
#[derive(Debug, Clone)]
pub struct TemplateKeySource {
    fetcher: HttpFetcher,
    templates: Vec<KeyTemplate>,
}

impl TemplateKeySource {
    /// Templates are expanded once here so mistakes surface at startup
    pub fn new(fetcher: HttpFetcher, templates: Vec<KeyTemplate>) -> Result<Self, ConfigError> {
        let ctx = TemplateContext::today();
        for template in &templates {
            template.expand(&ctx)?;
        }
        Ok(Self { fetcher, templates })
    }

    /// Entity-less targets first, then every entity's targets grouped together
    pub fn targets_on(&self, ctx: &TemplateContext) -> Result<Vec<WarmTarget>, ConfigError> {
        let mut targets = Vec::new();
        for template in self.templates.iter().filter(|t| t.entities.is_empty()) {
            for (key, target) in template.expand(ctx)? {
                targets.push(WarmTarget::new(key, Arc::new(self.fetcher.request(target))));
            }
        }

        let mut entities: Vec<&str> = Vec::new();
        for entity in self.templates.iter().flat_map(|t| t.entities.iter()) {
            if !entities.contains(&entity.as_str()) {
                entities.push(entity);
            }
        }

        for entity in entities {
            for template in &self.templates {
                if !template.entities.iter().any(|e| e == entity) {
                    continue;
                }
                let (key, target) = template.expand_for(Some(entity), ctx)?;
                targets.push(
                    WarmTarget::new(key, Arc::new(self.fetcher.request(target)))
                        .with_entity(entity),
                );
            }
        }
        Ok(targets)
    }
}

#[async_trait]
impl WarmKeySource for TemplateKeySource {
    async fn warm_targets(&self) -> Result<Vec<WarmTarget>, WarmError> {
        let ctx = TemplateContext::today();
        let targets = self.targets_on(&ctx)?;
        debug!(date = %ctx.date, count = targets.len(), "Expanded warm targets");
        Ok(targets)
    }
}
