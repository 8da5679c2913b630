// Tests for the permutation linker
//
//  Copyright (C) 2014-2023 Ryan Specialty, LLC.
//
//  This file is part of permlink.
//
//  This program is free software: you can redistribute it and/or modify
//  it under the terms of the GNU General Public License as published by
//  the Free Software Foundation, either version 3 of the License, or
//  (at your option) any later version.
//
//  This program is distributed in the hope that it will be useful,
//  but WITHOUT ANY WARRANTY; without even the implied warranty of
//  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
//  GNU General Public License for more details.
//
//  You should have received a copy of the GNU General Public License
//  along with this program.  If not, see <http://www.gnu.org/licenses/>.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::error::Error;
use std::fs;
use std::path::Path;
use std::process::Command;

type TestResult = Result<(), Box<dyn Error>>;

const HELLO: &str = "tests/data/hello/link.xml";
const NOCACHE: &str = "com.example.Hello.nocache.js";

/// Names of files directly within `dir` ending in `suffix`.
fn files_ending(dir: &Path, suffix: &str) -> Result<Vec<String>, Box<dyn Error>> {
    let mut names = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;

        if entry.file_type()?.is_file() {
            let name = entry.file_name().to_string_lossy().into_owned();

            if name.ends_with(suffix) && name != NOCACHE {
                names.push(name);
            }
        }
    }

    names.sort();
    Ok(names)
}

#[test]
fn link_invalid_argument() -> TestResult {
    let mut cmd = Command::cargo_bin("permld")?;
    cmd.arg("-q");
    cmd.assert()
        .failure()
        .code(exitcode::USAGE)
        .stderr(predicate::str::contains("Unrecognized option:"));

    Ok(())
}

#[test]
fn link_missing_manifest() -> TestResult {
    let mut cmd = Command::cargo_bin("permld")?;
    cmd.assert()
        .failure()
        .code(exitcode::USAGE)
        .stderr(predicate::str::contains("MANIFEST"));

    Ok(())
}

#[test]
fn link_missing_output_dir() -> TestResult {
    let mut cmd = Command::cargo_bin("permld")?;
    cmd.arg(HELLO);
    cmd.assert()
        .failure()
        .code(exitcode::USAGE)
        .stderr(predicate::str::contains("-o OUTDIR"));

    Ok(())
}

#[test]
fn link_help() -> TestResult {
    let mut cmd = Command::cargo_bin("permld")?;
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("--output-mode"));

    Ok(())
}

#[test]
fn link_manifest_does_not_exist() -> TestResult {
    let out = tempfile::tempdir()?;

    let mut cmd = Command::cargo_bin("permld")?;
    cmd.arg("tests/data/hello/nope.xml");
    cmd.arg("-o").arg(out.path());
    cmd.assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("unable to read"))
        .stderr(predicate::str::contains("No such file or directory"));

    Ok(())
}

#[test]
fn link_unknown_linker() -> TestResult {
    let out = tempfile::tempdir()?;

    let mut cmd = Command::cargo_bin("permld")?;
    cmd.arg("tests/data/hello/unknown-linker.xml");
    cmd.arg("-o").arg(out.path());
    cmd.assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("unknown linker `std`"));

    Ok(())
}

#[test]
fn link_module() -> TestResult {
    let out = tempfile::tempdir()?;
    let extra = tempfile::tempdir()?;

    let mut cmd = Command::cargo_bin("permld")?;
    cmd.arg(HELLO);
    cmd.arg("-o").arg(out.path());
    cmd.arg("--extra").arg(extra.path());
    cmd.assert().success();

    let nocache = fs::read_to_string(out.path().join(NOCACHE))?;
    assert!(nocache.starts_with("function hello() {\n"));
    assert!(nocache.contains("base + 'Hello.css'"));
    assert_eq!(2, nocache.matches("unflattenKeylistIntoAnswers([").count());

    let programs = files_ending(out.path(), ".cache.js")?;
    assert_eq!(2, programs.len());

    for program in &programs {
        let strong = program.trim_end_matches(".cache.js");
        assert!(nocache.contains(&format!("'{}'", strong)));
    }

    let mappings =
        fs::read_to_string(out.path().join("compilation-mappings.txt"))?;
    assert_eq!(2, mappings.matches("user.agent ").count());

    // Only the safari permutation has a deferred fragment and symbols.
    let deferred: Vec<_> = fs::read_dir(out.path().join("deferredjs"))?
        .map(|entry| entry.map(|e| e.file_name().to_string_lossy().into_owned()))
        .collect::<Result<_, _>>()?;
    assert_eq!(1, deferred.len());

    let strong = &deferred[0];
    assert!(out
        .path()
        .join("deferredjs")
        .join(strong)
        .join("1.cache.js")
        .is_file());

    let symbols = fs::read_to_string(
        extra
            .path()
            .join("symbol-maps")
            .join(format!("{}.symbolMap", strong)),
    )?;
    assert_eq!("# jsName, className\ngreet,com.example.Hello\n", symbols);

    Ok(())
}

#[test]
fn link_without_extra_discards_private_output() -> TestResult {
    let out = tempfile::tempdir()?;

    let mut cmd = Command::cargo_bin("permld")?;
    cmd.arg(HELLO);
    cmd.arg("-o").arg(out.path());
    cmd.assert().success();

    assert!(files_ending(out.path(), ".symbolMap")?.is_empty());
    assert!(!out.path().join("symbol-maps").exists());

    Ok(())
}

#[test]
fn link_output_mode_override() -> TestResult {
    let out = tempfile::tempdir()?;

    let mut cmd = Command::cargo_bin("permld")?;
    cmd.arg(HELLO);
    cmd.arg("-o").arg(out.path());
    cmd.arg("--output-mode").arg("obfuscated");
    cmd.assert().success();

    let nocache = fs::read_to_string(out.path().join(NOCACHE))?;
    assert!(!nocache.contains("// "));
    assert!(!nocache.contains("\n\n"));

    Ok(())
}

#[test]
fn link_disk_cache_same_output() -> TestResult {
    let memory = tempfile::tempdir()?;
    let disk = tempfile::tempdir()?;

    Command::cargo_bin("permld")?
        .arg(HELLO)
        .arg("-o")
        .arg(memory.path())
        .assert()
        .success();

    Command::cargo_bin("permld")?
        .arg(HELLO)
        .arg("-o")
        .arg(disk.path())
        .arg("--disk-cache")
        .assert()
        .success();

    assert_eq!(
        files_ending(memory.path(), ".cache.js")?,
        files_ending(disk.path(), ".cache.js")?,
    );
    assert_eq!(
        fs::read_to_string(memory.path().join(NOCACHE))?,
        fs::read_to_string(disk.path().join(NOCACHE))?,
    );

    Ok(())
}

#[test]
fn link_template_from_resources() -> TestResult {
    let out = tempfile::tempdir()?;

    let mut cmd = Command::cargo_bin("permld")?;
    cmd.arg(HELLO);
    cmd.arg("-o").arg(out.path());
    cmd.arg("--resources").arg("tests/data/resources");
    cmd.assert().success();

    let nocache = fs::read_to_string(out.path().join(NOCACHE))?;
    assert!(nocache.starts_with("function hello() {\n  var strongName;\n"));
    assert!(nocache.contains("strongName = answers[computePropValue('user.agent')];"));
    assert!(!nocache.contains("getInstallLocationDoc"));

    Ok(())
}

#[test]
fn link_refuses_to_overwrite() -> TestResult {
    let out = tempfile::tempdir()?;

    Command::cargo_bin("permld")?
        .arg(HELLO)
        .arg("-o")
        .arg(out.path())
        .assert()
        .success();

    Command::cargo_bin("permld")?
        .arg(HELLO)
        .arg("-o")
        .arg(out.path())
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("already exists"));

    Ok(())
}

#[test]
fn link_verbose_logs_to_stderr() -> TestResult {
    let out = tempfile::tempdir()?;

    let mut cmd = Command::cargo_bin("permld")?;
    cmd.arg(HELLO);
    cmd.arg("-o").arg(out.path());
    cmd.arg("-v");
    cmd.env_remove("RUST_LOG");
    cmd.assert()
        .success()
        .stderr(predicate::str::contains("output written"));

    Ok(())
}
