use assert_cmd::cargo::cargo_bin_cmd;
use std::{error::Error, fs};
use tempfile::tempdir;

#[test]
fn renders_trace_png() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let out = dir.path().join("trace.png");

    let mut cmd = cargo_bin_cmd!("pulse");
    cmd.args([
        "plot",
        "--patient",
        "2",
        "--index",
        "40",
        "--width",
        "420",
        "--height",
        "160",
        "--no-labels",
        "--out",
        out.to_str().expect("utf8 path"),
    ]);
    cmd.assert().success();

    let bytes = fs::read(&out)?;
    assert!(bytes.len() > 8);
    assert_eq!(&bytes[..4], b"\x89PNG");
    Ok(())
}

#[test]
fn plot_has_no_speed_flag() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let out = dir.path().join("trace.png");

    let mut cmd = cargo_bin_cmd!("pulse");
    cmd.args([
        "plot",
        "--speed",
        "0.5",
        "--out",
        out.to_str().expect("utf8 path"),
    ]);
    cmd.assert().failure();
    assert!(!out.exists());
    Ok(())
}
