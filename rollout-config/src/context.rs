//! Context construction: turns a validated [`UserConfig`] into a [`Context`].

use rollout_core::{identity::digest_bytes, Api, ApiName, ApiSpec, AppName, Context};

use crate::error::ConfigError;
use crate::schema::UserConfig;

/// Build the [`Context`] described by `config`.
///
/// Pure: the same document and archive always produce the same IDs.
/// Assumes `config` already passed [`UserConfig::validate`].
pub fn build_context(config: &UserConfig, project: Option<&[u8]>) -> Context {
    let project_id = project.filter(|bytes| !bytes.is_empty()).map(digest_bytes);
    let apis = config.apis.iter().map(|api| {
        Api::from_spec(
            ApiSpec {
                name: ApiName::from(api.name.as_str()),
                endpoint: api.resolved_endpoint(&config.app.name),
                model: api.model.clone(),
                request_handler: api.request_handler.clone(),
                compute: api.compute.resolve(),
            },
            project_id.as_deref(),
        )
    });
    Context::new(AppName::from(config.app.name.as_str()), project_id.clone(), apis)
}

/// Parse, validate, and build in one step.
pub fn load_context(
    file: &str,
    bytes: &[u8],
    project: Option<&[u8]>,
) -> Result<Context, ConfigError> {
    let config = UserConfig::parse(file, bytes)?;
    config.validate(project)?;
    Ok(build_context(&config, project))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CONFIG_FILE_NAME;

    const IRIS: &str = "\
app:
  name: iris
apis:
  - name: classifier
    model: s3://models/iris.onnx
  - name: explainer
    model: s3://models/explain.onnx
    compute:
      max_replicas: 3
";

    #[test]
    fn builds_one_api_per_declaration() {
        let ctx = load_context(CONFIG_FILE_NAME, IRIS.as_bytes(), None).expect("load");
        assert_eq!(ctx.app.name.as_str(), "iris");
        let names: Vec<_> = ctx.apis.keys().map(|n| n.as_str()).collect();
        assert_eq!(names, vec!["classifier", "explainer"]);
        assert_eq!(ctx.apis[&ApiName::from("explainer")].compute.max_replicas, 3);
        assert_eq!(ctx.apis[&ApiName::from("classifier")].endpoint, "/iris/classifier");
    }

    #[test]
    fn identical_documents_share_an_id() {
        let a = load_context(CONFIG_FILE_NAME, IRIS.as_bytes(), None).expect("a");
        let b = load_context(CONFIG_FILE_NAME, IRIS.as_bytes(), None).expect("b");
        assert_eq!(a.id, b.id);
    }

    #[test]
    fn empty_archive_is_treated_as_absent() {
        let config = UserConfig::parse(CONFIG_FILE_NAME, IRIS.as_bytes()).expect("parse");
        let none = build_context(&config, None);
        let empty = build_context(&config, Some(&[]));
        assert_eq!(none.id, empty.id);
        assert!(empty.project_id.is_none());
    }
}
