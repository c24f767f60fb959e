//! Context store error-message, atomic-write-safety, and layout integration tests.
//! Layout: ~/.rollout/store/<key> and ~/.rollout/apps/<app>/current.json

use std::fs;

use rollout_core::{
    store, Api, ApiName, ApiSpec, AppName, Compute, Context, StoreError,
};

fn app() -> AppName {
    AppName::from("iris")
}

fn context_with(models: &[(&str, &str)]) -> Context {
    let apis = models.iter().map(|(name, model)| {
        Api::from_spec(
            ApiSpec {
                name: ApiName::from(*name),
                endpoint: format!("/iris/{name}"),
                model: Some(model.to_string()),
                request_handler: None,
                compute: Compute::default(),
            },
            None,
        )
    });
    Context::new(app(), None, apis)
}

// ---------------------------------------------------------------------------
// 1. Load error messages
// ---------------------------------------------------------------------------

#[test]
fn load_corrupt_current_returns_parse_error_with_path() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let dir = home.path().join(".rollout").join("apps").join("iris");
    fs::create_dir_all(&dir).expect("mkdir");
    fs::write(dir.join("current.json"), b"{ not json").expect("write");

    let err = store::load_current_at(home.path(), &app()).unwrap_err();
    assert!(matches!(err, StoreError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("current.json"), "must contain file path, got: {err}");
}

#[test]
fn load_missing_upload_returns_io_error_with_path() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let err = store::load_uploaded_at(home.path(), "apps/iris/contexts/nope.json").unwrap_err();
    assert!(matches!(err, StoreError::Io { .. }), "got: {err}");
    assert!(err.to_string().contains("nope.json"));
}

// ---------------------------------------------------------------------------
// 2. Atomic write safety and permissions
// ---------------------------------------------------------------------------

#[test]
fn upload_lands_under_store_key() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let ctx = context_with(&[("classifier", "s3://m/v1")]);
    let path = store::upload_at(home.path(), &ctx, &ctx.key).expect("upload");

    assert!(path.starts_with(home.path().join(".rollout").join("store")));
    assert!(path.ends_with(format!("{}.json", ctx.id)));
    let tmp = path.with_file_name(format!("{}.json.tmp", ctx.id));
    assert!(!tmp.exists(), ".tmp must be removed after successful upload");
}

#[cfg(unix)]
#[test]
fn stored_files_are_private() {
    use std::os::unix::fs::PermissionsExt;

    let home = assert_fs::TempDir::new().expect("tempdir");
    let ctx = context_with(&[("classifier", "s3://m/v1")]);
    store::save_current_at(home.path(), &ctx).expect("save");

    let path = store::current_path_at(home.path(), &app()).expect("path");
    let mode = fs::metadata(&path).expect("meta").permissions().mode() & 0o777;
    assert_eq!(mode, 0o600);
    let dir_mode = fs::metadata(path.parent().expect("parent"))
        .expect("meta")
        .permissions()
        .mode()
        & 0o777;
    assert_eq!(dir_mode, 0o700);
}

// ---------------------------------------------------------------------------
// 3. Current context replacement
// ---------------------------------------------------------------------------

#[test]
fn save_current_replaces_previous_context() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let first = context_with(&[("classifier", "s3://m/v1")]);
    let second = context_with(&[("classifier", "s3://m/v2")]);
    assert_ne!(first.id, second.id);

    store::save_current_at(home.path(), &first).expect("save first");
    store::save_current_at(home.path(), &second).expect("save second");

    let record = store::load_current_at(home.path(), &app())
        .expect("load")
        .expect("present");
    assert_eq!(record.context.id, second.id);
}

#[test]
fn list_apps_skips_directories_without_current_context() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    fs::create_dir_all(home.path().join(".rollout").join("apps").join("ghost")).expect("mkdir");
    store::save_current_at(home.path(), &context_with(&[("a", "s3://m/a")])).expect("save");

    let apps = store::list_apps_at(home.path()).expect("list");
    assert_eq!(apps, vec![app()]);
}

#[test]
fn load_current_refuses_names_outside_apps_dir() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    store::save_current_at(home.path(), &context_with(&[("a", "s3://m/a")])).expect("save");
    let outside = home.path().join("outside");
    fs::create_dir_all(&outside).expect("mkdir");
    fs::copy(
        store::current_path_at(home.path(), &app()).expect("path"),
        outside.join("current.json"),
    )
    .expect("copy record");

    let err = store::load_current_at(home.path(), &AppName::from("../../outside")).unwrap_err();
    assert!(matches!(err, StoreError::InvalidAppName { .. }), "got: {err}");
}
