use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::tempdir;

fn noa_pack() -> Command {
    let mut cmd = Command::cargo_bin("noa-pack").unwrap();
    cmd.env_remove("NOA_PACK_PASSWORD").env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_cli_packs_tree() -> Result<(), Box<dyn std::error::Error>> {
    let source_dir = tempdir()?;
    fs::write(source_dir.path().join("a.txt"), "alpha")?;
    fs::create_dir(source_dir.path().join("sub"))?;
    fs::write(source_dir.path().join("sub").join("b.png"), "png")?;

    let archive_dir = tempdir()?;
    let archive_path = archive_dir.path().join("out.noa");

    noa_pack()
        .arg(&archive_path)
        .arg(format!("{}/*.*", source_dir.path().display()))
        .assert()
        .success()
        .stdout(
            predicate::str::contains("a.txt...5 [bytes] done.")
                .and(predicate::str::contains("sub/b.png..."))
                .and(predicate::str::contains("archived 2 files, 1 directories")),
        );

    assert!(archive_path.exists());
    Ok(())
}

#[test]
fn test_cli_quiet_suppresses_progress() -> Result<(), Box<dyn std::error::Error>> {
    let source_dir = tempdir()?;
    fs::write(source_dir.path().join("a.txt"), "alpha")?;
    let archive_path = source_dir.path().join("out.noa");

    noa_pack()
        .arg("-q")
        .arg("--codec")
        .arg("lz4")
        .arg(&archive_path)
        .arg(format!("{}/", source_dir.path().display()))
        .assert()
        .success()
        .stdout(
            predicate::str::contains("done.")
                .not()
                .and(predicate::str::contains("archived 1 files, 0 directories")),
        );
    Ok(())
}

#[test]
fn test_cli_missing_arguments_is_usage_error() {
    noa_pack().assert().code(255);
    noa_pack().arg("only-dest.noa").assert().code(255);
}

#[test]
fn test_cli_help() {
    noa_pack()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Pack a directory tree"));
}

#[test]
fn test_cli_unwritable_destination_exits_one() -> Result<(), Box<dyn std::error::Error>> {
    let source_dir = tempdir()?;
    fs::write(source_dir.path().join("a.txt"), "alpha")?;
    let archive_path = source_dir.path().join("missing").join("out.noa");

    noa_pack()
        .arg(&archive_path)
        .arg(format!("{}/*.*", source_dir.path().display()))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Cannot open destination archive"));
    Ok(())
}

#[test]
fn test_cli_bad_config_exits_one() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let config_path = dir.path().join("pack.toml");
    fs::write(&config_path, "[compression]\nlevel = 99\n")?;

    noa_pack()
        .arg("--config")
        .arg(&config_path)
        .arg(dir.path().join("out.noa"))
        .arg(format!("{}/*.*", dir.path().display()))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Failed to load config"));

    assert!(!dir.path().join("out.noa").exists());
    Ok(())
}

#[test]
fn test_cli_config_file_is_applied() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let config_path = dir.path().join("pack.toml");
    fs::write(&config_path, "[compression]\ncodec = \"lz4\"\n")?;
    fs::write(dir.path().join("data.txt"), "x".repeat(4096))?;
    let archive_path = dir.path().join("out.noa");

    noa_pack()
        .arg("-q")
        .arg("--config")
        .arg(&config_path)
        .arg(&archive_path)
        .arg(format!("{}/*.txt", dir.path().display()))
        .assert()
        .success();

    let archive = fs::read(&archive_path)?;
    assert_eq!(&archive[..4], b"\x89NOA");
    Ok(())
}

#[test]
fn test_cli_debug_log_hides_password() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    fs::write(dir.path().join("a.txt"), "alpha")?;

    noa_pack()
        .arg("-vv")
        .arg("-q")
        .arg("--password")
        .arg("hunter2")
        .arg(dir.path().join("out.noa"))
        .arg(format!("{}/*.txt", dir.path().display()))
        .assert()
        .success()
        .stderr(
            predicate::str::contains("Parsed CLI arguments")
                .and(predicate::str::contains("<redacted>"))
                .and(predicate::str::contains("hunter2").not()),
        );
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_cli_exit_status_is_error_count() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let source = dir.path().join("src");
    fs::create_dir(&source)?;
    fs::write(source.join("ok.txt"), "fine")?;
    // Archive names may not contain a backslash
    fs::write(source.join("one\\bad.txt"), "x")?;
    fs::write(source.join("two\\bad.txt"), "y")?;
    fs::create_dir(source.join("bad\\dir"))?;
    fs::write(source.join("bad\\dir").join("child.txt"), "z")?;

    noa_pack()
        .arg("-q")
        .arg(dir.path().join("out.noa"))
        .arg(format!("{}/", source.display()))
        .assert()
        .code(3)
        .stdout(predicate::str::contains("out.noa: 3 errors"));
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_cli_exit_status_is_clamped() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let source = dir.path().join("src");
    fs::create_dir(&source)?;
    for i in 0..300 {
        fs::write(source.join(format!("bad\\{}.txt", i)), "x")?;
    }

    noa_pack()
        .arg("-q")
        .arg(dir.path().join("out.noa"))
        .arg(format!("{}/", source.display()))
        .assert()
        .code(254)
        .stdout(predicate::str::contains("out.noa: 300 errors"));
    Ok(())
}
