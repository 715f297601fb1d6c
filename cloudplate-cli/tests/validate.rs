use predicates::prelude::*;

mod common;

#[test]
fn test_validate_accepts_image_url() {
    let mut ctx = common::cloudplate();
    ctx.cmd
        .args([
            "validate",
            "https://cloud-images.ubuntu.com/focal/current/focal-server-cloudimg-amd64.img",
        ])
        .assert()
        .success()
        .stdout("focal-server-cloudimg-amd64.img\n");
}

#[test]
fn test_validate_case_insensitive_extension() {
    let mut ctx = common::cloudplate();
    ctx.cmd
        .args(["validate", "http://mirror.local/images/Debian-12.QCOW2"])
        .assert()
        .success();
}

#[test]
fn test_validate_rejects_with_exit_code_2() {
    let mut ctx = common::cloudplate();
    ctx.cmd
        .args(["validate", "https://example.com/readme.txt"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("invalid source locator"));
}

#[test]
fn test_validate_rejects_garbage() {
    let mut ctx = common::cloudplate();
    ctx.cmd.args(["validate", "not a url"]).assert().code(2);
}

#[test]
fn test_validate_does_not_create_home() {
    let mut ctx = common::cloudplate();
    ctx.cmd
        .args(["validate", "https://example.com/disk.raw"])
        .assert()
        .success();
    assert!(!ctx.home.exists());
}
