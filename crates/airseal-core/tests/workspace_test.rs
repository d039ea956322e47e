use airseal_core::{ImageTag, RunId, RunWorkspace, SourceFile};
use tempfile::TempDir;

fn source(name: &str) -> SourceFile {
    SourceFile::from_bytes(name, b"import requests\n".to_vec()).unwrap()
}

#[test]
fn creates_missing_build_root() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("nested/runs");
    let run_id = RunId::generate();

    let ws = RunWorkspace::create(&root, &source("app.py"), &run_id).unwrap();

    assert!(ws.path().is_dir());
    assert_eq!(ws.path().parent().unwrap(), root);
    assert_eq!(
        ws.path().file_name().unwrap().to_string_lossy(),
        format!("app-{run_id}")
    );
}

#[test]
fn runs_with_different_sources_do_not_collide() {
    let tmp = TempDir::new().unwrap();
    let a_src = source("fetch.py");
    let b_src = source("train.py");
    let a_id = RunId::generate();
    let b_id = RunId::generate();

    let a = RunWorkspace::create(tmp.path(), &a_src, &a_id).unwrap();
    let b = RunWorkspace::create(tmp.path(), &b_src, &b_id).unwrap();

    assert_ne!(a.path(), b.path());
    assert_ne!(
        ImageTag::for_run(&a_src, &a_id),
        ImageTag::for_run(&b_src, &b_id)
    );
}

#[test]
fn same_source_twice_gets_separate_directories() {
    let tmp = TempDir::new().unwrap();
    let src = source("app.py");

    let a = RunWorkspace::create(tmp.path(), &src, &RunId::generate()).unwrap();
    let b = RunWorkspace::create(tmp.path(), &src, &RunId::generate()).unwrap();

    assert_ne!(a.path(), b.path());
}

#[test]
fn reusing_a_run_id_fails() {
    let tmp = TempDir::new().unwrap();
    let src = source("app.py");
    let run_id = RunId::generate();

    let _first = RunWorkspace::create(tmp.path(), &src, &run_id).unwrap();
    let err = RunWorkspace::create(tmp.path(), &src, &run_id).unwrap_err();

    assert!(err.to_string().contains("failed to create run directory"));
}

#[test]
fn remove_deletes_directory() {
    let tmp = TempDir::new().unwrap();
    let ws = RunWorkspace::create(tmp.path(), &source("app.py"), &RunId::generate()).unwrap();
    let dir = ws.path().to_path_buf();
    std::fs::write(dir.join("Dockerfile"), "FROM scratch\n").unwrap();

    ws.remove().unwrap();

    assert!(!dir.exists());
}

#[test]
fn read_source_from_disk() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("job.py");
    std::fs::write(&path, "import pandas as pd\n").unwrap();

    let src = SourceFile::read(&path).unwrap();

    assert_eq!(src.filename(), "job.py");
    assert_eq!(src.text(), "import pandas as pd\n");
}

#[test]
fn read_missing_source_fails() {
    let tmp = TempDir::new().unwrap();
    let err = SourceFile::read(&tmp.path().join("missing.py")).unwrap_err();
    assert!(err.to_string().contains("failed to read source file"));
}
