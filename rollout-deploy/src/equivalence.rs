//! Context equivalence: is a new submission the same logical deployment?

use rollout_core::Context;

/// `true` iff `previous` exists, shares `current`'s ID, and every API in
/// either context matches in both definition and compute identity.
///
/// The per-API check backs up the snapshot ID against collisions or a
/// partially populated context.
pub fn is_equivalent(current: &Context, previous: Option<&Context>) -> bool {
    let Some(previous) = previous else {
        return false;
    };
    current.id == previous.id && apis_and_computes_match(current, previous)
}

/// Same API names on both sides, each pair matching on `id` and `compute.id()`.
pub fn apis_and_computes_match(a: &Context, b: &Context) -> bool {
    a.apis.len() == b.apis.len()
        && a.apis
            .iter()
            .all(|(name, api)| b.apis.get(name).is_some_and(|other| api.matches(other)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollout_core::{Api, ApiName, ApiSpec, AppName, Compute};

    fn api(name: &str, model: &str) -> Api {
        Api::from_spec(
            ApiSpec {
                name: ApiName::from(name),
                endpoint: format!("/iris/{name}"),
                model: Some(model.to_string()),
                request_handler: None,
                compute: Compute::default(),
            },
            None,
        )
    }

    fn ctx(apis: Vec<Api>) -> Context {
        Context::new(AppName::from("iris"), None, apis)
    }

    #[test]
    fn reflexive() {
        let c = ctx(vec![api("a", "v1"), api("b", "v1")]);
        assert!(is_equivalent(&c, Some(&c)));
    }

    #[test]
    fn absent_previous_is_never_equivalent() {
        assert!(!is_equivalent(&ctx(vec![api("a", "v1")]), None));
        assert!(!is_equivalent(&ctx(vec![]), None));
    }

    #[test]
    fn different_model_is_not_equivalent() {
        let a = ctx(vec![api("a", "v1")]);
        let b = ctx(vec![api("a", "v2")]);
        assert!(!is_equivalent(&a, Some(&b)));
    }

    #[test]
    fn matching_id_with_divergent_apis_is_not_equivalent() {
        let previous = ctx(vec![api("a", "v1")]);
        let mut forged = ctx(vec![api("a", "v1"), api("b", "v1")]);
        forged.id = previous.id.clone();
        assert!(!is_equivalent(&forged, Some(&previous)));

        let mut rescaled = previous.clone();
        if let Some(a) = rescaled.apis.get_mut(&ApiName::from("a")) {
            a.compute.max_replicas = 2;
        }
        assert!(!is_equivalent(&rescaled, Some(&previous)));
    }
}
