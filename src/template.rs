//! HTML body template.
//!
//! Templates use Jinja syntax and see two variables: `UnsubscribeUrl` and
//! `Host`. Output is not escaped, and referencing any other variable is a
//! render error.

use std::path::Path;

use minijinja::{AutoEscape, Environment, UndefinedBehavior};
use serde::Serialize;

use crate::error::{Error, MailerResult};

const TEMPLATE_NAME: &str = "body";

/// Values available to the template for one recipient
#[derive(Serialize, Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    #[serde(rename = "UnsubscribeUrl")]
    pub unsubscribe_url: &'a str,
    #[serde(rename = "Host")]
    pub host: &'a str,
}

impl<'a> RenderContext<'a> {
    pub fn new(unsubscribe_url: &'a str, host: &'a str) -> Self {
        RenderContext {
            unsubscribe_url,
            host,
        }
    }
}

/// A parsed template, reused for every recipient
#[derive(Debug)]
pub struct Template {
    env: Environment<'static>,
}

impl Template {
    /// Parses template source
    pub fn from_source(source: String) -> Result<Template, minijinja::Error> {
        let mut env = Environment::new();
        env.set_auto_escape_callback(|_| AutoEscape::None);
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.add_template_owned(TEMPLATE_NAME, source)?;
        Ok(Template { env })
    }

    /// Reads and parses the template file at `path`
    pub async fn load(path: &Path) -> MailerResult<Template> {
        let source = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| Error::ReadTemplate {
                path: path.to_path_buf(),
                source,
            })?;
        Template::from_source(source).map_err(Error::Template)
    }

    /// Renders the HTML body for one recipient
    pub fn render(&self, context: &RenderContext<'_>) -> Result<String, minijinja::Error> {
        self.env.get_template(TEMPLATE_NAME)?.render(context)
    }
}
