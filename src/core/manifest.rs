//! Stack manifest loading.
//!
//! A manifest is an ordered `functions:` mapping. Order matters: the build
//! and push pipelines dispatch functions in the order they appear in the file.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};
use crate::utils::io;

/// Language tag that selects a user-supplied Dockerfile instead of a template.
pub const DOCKERFILE_LANGUAGE: &str = "dockerfile";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionSpec {
    pub name: String,
    pub handler: String,
    pub image: String,
    pub language: String,
    pub skip_build: bool,
    pub constraints: Vec<String>,
}

/// How a function's build context is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguageKind<'a> {
    Missing,
    Dockerfile,
    Template(&'a str),
}

impl FunctionSpec {
    pub fn language_kind(&self) -> LanguageKind<'_> {
        let language = self.language.trim();
        if language.is_empty() {
            LanguageKind::Missing
        } else if language.eq_ignore_ascii_case(DOCKERFILE_LANGUAGE) {
            LanguageKind::Dockerfile
        } else {
            LanguageKind::Template(language)
        }
    }

    /// Function assembled from CLI flags rather than a manifest.
    /// Image, handler and name are all required.
    pub fn standalone(
        name: Option<String>,
        handler: Option<String>,
        image: Option<String>,
        language: Option<String>,
    ) -> Result<Self> {
        let image = require_flag(image, "image", "please provide a valid --image name for your Docker image")?;
        let handler = require_flag(
            handler,
            "handler",
            "please provide the full path to your function's handler",
        )?;
        let name = require_flag(name, "name", "please provide the deployed --name of your function")?;

        Ok(Self {
            name,
            handler,
            image,
            language: language.unwrap_or_default(),
            skip_build: false,
            constraints: Vec::new(),
        })
    }
}

fn require_flag(value: Option<String>, key: &str, hint: &str) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(Error::config_missing_key(key, None).with_hint(hint)),
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Provider {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub gateway: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FunctionDef {
    #[serde(default)]
    lang: String,
    #[serde(default)]
    handler: String,
    #[serde(default)]
    image: String,
    #[serde(default)]
    skip_build: bool,
    #[serde(default)]
    constraints: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Manifest {
    pub provider: Option<Provider>,
    pub functions: Vec<FunctionSpec>,
}

impl Manifest {
    pub fn names(&self) -> Vec<&str> {
        self.functions.iter().map(|f| f.name.as_str()).collect()
    }
}

/// Name selection applied after parsing. Both filters must match when set.
#[derive(Debug, Clone, Default)]
pub struct Selection<'a> {
    pub regex: Option<&'a str>,
    pub filter: Option<&'a str>,
}

pub fn load(path: &Path, selection: &Selection) -> Result<Manifest> {
    if !path.exists() {
        return Err(Error::config_missing_key("yaml", Some(path.display().to_string()))
            .with_hint("Pass a stack file with -f <stack.yml>"));
    }

    let content = io::read_file(path, &format!("read {}", path.display()))?;

    parse(&content, selection)
}

pub fn parse(content: &str, selection: &Selection) -> Result<Manifest> {
    let root: serde_yml::Value = serde_yml::from_str(content)
        .map_err(|e| Error::config_invalid_value("yaml", None, e.to_string()))?;

    let provider = match root.get("provider") {
        Some(value) => Some(
            serde_yml::from_value::<Provider>(value.clone())
                .map_err(|e| Error::config_invalid_value("provider", None, e.to_string()))?,
        ),
        None => None,
    };

    let regex = selection
        .regex
        .filter(|r| !r.is_empty())
        .map(|r| {
            Regex::new(r).map_err(|e| {
                Error::validation_invalid_argument("regex", e.to_string(), Some(r.to_string()), None)
            })
        })
        .transpose()?;
    let filter = selection.filter.filter(|f| !f.is_empty());

    let mut functions = Vec::new();
    if let Some(mapping) = root.get("functions").and_then(|f| f.as_mapping()) {
        for (key, value) in mapping {
            let name = key
                .as_str()
                .ok_or_else(|| {
                    Error::config_invalid_value("functions", None, "function names must be strings")
                })?
                .to_string();

            if let Some(re) = &regex {
                if !re.is_match(&name) {
                    continue;
                }
            }
            if let Some(glob) = filter {
                if !glob_match::glob_match(glob, &name) {
                    continue;
                }
            }

            let def: FunctionDef = serde_yml::from_value(value.clone()).map_err(|e| {
                Error::config_invalid_value(format!("functions.{}", name), None, e.to_string())
            })?;

            functions.push(FunctionSpec {
                name,
                handler: def.handler,
                image: def.image,
                language: def.lang,
                skip_build: def.skip_build,
                constraints: def.constraints,
            });
        }
    }

    Ok(Manifest { provider, functions })
}

#[cfg(test)]
mod tests {
    use super::*;

    const STACK: &str = r#"
provider:
  name: faas
  gateway: http://127.0.0.1:8080
functions:
  url-ping:
    lang: python
    handler: ./sample/url-ping
    image: alexellis/faas-url-ping
  nodejs-echo:
    lang: node
    handler: ./sample/nodejs-echo
    image: alexellis/faas-nodejs-echo
    skip_build: true
  imagemagick:
    lang: Dockerfile
    handler: ./sample/imagemagick
    image: functions/resizer
    constraints:
      - "node.platform.os == linux"
"#;

    #[test]
    fn parse_keeps_file_order() {
        let manifest = parse(STACK, &Selection::default()).unwrap();
        assert_eq!(manifest.names(), vec!["url-ping", "nodejs-echo", "imagemagick"]);
        assert_eq!(manifest.provider.unwrap().gateway, "http://127.0.0.1:8080");
    }

    #[test]
    fn parse_reads_function_fields() {
        let manifest = parse(STACK, &Selection::default()).unwrap();
        let echo = &manifest.functions[1];
        assert_eq!(echo.language, "node");
        assert!(echo.skip_build);
        let magick = &manifest.functions[2];
        assert_eq!(magick.language_kind(), LanguageKind::Dockerfile);
        assert_eq!(magick.constraints, vec!["node.platform.os == linux"]);
    }

    #[test]
    fn regex_selection_filters_names() {
        let selection = Selection {
            regex: Some("^url"),
            filter: None,
        };
        let manifest = parse(STACK, &selection).unwrap();
        assert_eq!(manifest.names(), vec!["url-ping"]);
    }

    #[test]
    fn glob_selection_filters_names() {
        let selection = Selection {
            regex: None,
            filter: Some("*echo*"),
        };
        let manifest = parse(STACK, &selection).unwrap();
        assert_eq!(manifest.names(), vec!["nodejs-echo"]);
    }

    #[test]
    fn invalid_regex_is_rejected() {
        let selection = Selection {
            regex: Some("("),
            filter: None,
        };
        let err = parse(STACK, &selection).unwrap_err();
        assert_eq!(err.code.as_str(), "validation.invalid_argument");
    }

    #[test]
    fn invalid_yaml_is_config_error() {
        let err = parse("functions: [unclosed", &Selection::default()).unwrap_err();
        assert_eq!(err.code.as_str(), "config.invalid_value");
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = load(Path::new("/nonexistent/stack.yml"), &Selection::default()).unwrap_err();
        assert_eq!(err.code.as_str(), "config.missing_key");
    }

    #[test]
    fn language_kind_classifies_tags() {
        let mut spec = FunctionSpec::standalone(
            Some("fn".into()),
            Some("./fn".into()),
            Some("img".into()),
            None,
        )
        .unwrap();
        assert_eq!(spec.language_kind(), LanguageKind::Missing);
        spec.language = "DOCKERFILE".into();
        assert_eq!(spec.language_kind(), LanguageKind::Dockerfile);
        spec.language = "python3".into();
        assert_eq!(spec.language_kind(), LanguageKind::Template("python3"));
    }

    #[test]
    fn standalone_requires_image_handler_and_name() {
        let err = FunctionSpec::standalone(Some("fn".into()), Some("./fn".into()), None, None)
            .unwrap_err();
        assert_eq!(err.code.as_str(), "config.missing_key");
        assert_eq!(err.details["key"], "image");

        let err = FunctionSpec::standalone(None, Some("./fn".into()), Some("img".into()), None)
            .unwrap_err();
        assert_eq!(err.details["key"], "name");
    }
}
