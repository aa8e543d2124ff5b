use assert_cmd::Command;

fn bookshelf() -> Command {
    let mut cmd = Command::cargo_bin("bookshelf-cli").unwrap();
    cmd.env("BOOKSHELF_CONFIG_DIR", std::env::temp_dir().join("bookshelf-cli-no-config"));
    cmd
}

#[test]
fn shelves_lists_backing_collections() {
    let output = bookshelf().arg("shelves").output().unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("to-read\tbooks_to_read\tto_read_id"));
    assert!(stdout.contains("reading\tbooks_being_read\tbeing_read_id"));
    assert!(stdout.contains("read\tbooks_read\tread_id"));
}

#[test]
fn config_hides_store_api_key() {
    let output = bookshelf()
        .arg("config")
        .env("BOOKSHELF_STORE__API_KEY", "service-role-secret")
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("\"backend\": \"memory\""));
    assert!(!stdout.contains("service-role-secret"));
}

#[test]
fn unknown_environment_fails() {
    bookshelf().arg("shelves").env("BOOKSHELF_ENV", "qa").assert().failure();
}
