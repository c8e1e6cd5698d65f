use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

#[test]
fn compiles_input_file_to_output_file() {
    let dir = tempdir().expect("tempdir");
    let input_path = dir.path().join("input.kal");
    fs::write(&input_path, "def sq(x) x * x;\nsq(4);\n").expect("write input");
    let output_path = dir.path().join("out/module.ll");

    Command::cargo_bin("kaleido")
        .expect("binary exists")
        .arg("--input")
        .arg(&input_path)
        .arg("--output")
        .arg(&output_path)
        .assert()
        .success()
        .stderr(predicate::str::contains("Read function definition:"))
        .stderr(predicate::str::contains("Read top-level expression:"));

    let ir = fs::read_to_string(&output_path).expect("read ir");
    assert!(ir.contains("define double @sq(double %x)"));
    assert!(ir.contains("%multmp = fmul double %x, %x"));
    assert!(ir.contains("define double @0()"));
}

#[test]
fn reads_stdin_and_prints_module_to_stdout() {
    Command::cargo_bin("kaleido")
        .expect("binary exists")
        .write_stdin("extern sin(a);\nsin(1) + 2;\n")
        .assert()
        .success()
        .stderr(predicate::str::contains("Read extern:"))
        .stdout(predicate::str::contains("declare double @sin(double)"))
        .stdout(predicate::str::contains("%addtmp = fadd double %calltmp, 2.000000e+00"));
}

#[test]
fn reports_errors_and_keeps_going() {
    Command::cargo_bin("kaleido")
        .expect("binary exists")
        .write_stdin("def f(x) y;\nf(1);\ndef g(a) a;\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error: lowering error: unknown variable name 'y'"))
        .stderr(predicate::str::contains(
            "Error: lowering error: unknown function referenced 'f'",
        ))
        .stdout(predicate::str::contains("define double @g(double %a)"))
        .stdout(predicate::str::contains("@f").not());
}

#[test]
fn reports_parse_errors() {
    Command::cargo_bin("kaleido")
        .expect("binary exists")
        .write_stdin("def (x) x\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "Error: parse error: expected function name in prototype",
        ));
}

#[test]
fn strict_numbers_flag_rejects_malformed_literals() {
    Command::cargo_bin("kaleido")
        .expect("binary exists")
        .write_stdin("1.2.3\n")
        .assert()
        .success();

    Command::cargo_bin("kaleido")
        .expect("binary exists")
        .arg("--strict-numbers")
        .write_stdin("1.2.3\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("malformed numeric literal '1.2.3'"));
}

#[test]
fn quiet_suppresses_construct_echo() {
    Command::cargo_bin("kaleido")
        .expect("binary exists")
        .arg("--quiet")
        .arg("--module-name")
        .arg("demo")
        .write_stdin("def id(x) x\n")
        .assert()
        .success()
        .stderr(predicate::str::contains("Read").not())
        .stdout(predicate::str::starts_with("; ModuleID = 'demo'"));
}

#[test]
fn deeply_nested_input_is_an_error_not_a_crash() {
    let source = format!("{}1{};\ndef ok(x) x;\n", "(".repeat(5000), ")".repeat(5000));

    Command::cargo_bin("kaleido")
        .expect("binary exists")
        .arg("--quiet")
        .write_stdin(source)
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "Error: parse error: expression nested more than 256 levels deep",
        ))
        .stdout(predicate::str::contains("define double @ok(double %x)"));
}

#[test]
fn long_operator_chains_compile() {
    let source = format!("def f(x) x{};\n", " + x".repeat(100_000));

    Command::cargo_bin("kaleido")
        .expect("binary exists")
        .arg("--quiet")
        .write_stdin(source)
        .assert()
        .success()
        .stdout(predicate::str::contains("ret double %addtmp99999"));
}

#[test]
fn reports_missing_input_file() {
    let dir = tempdir().expect("tempdir");

    Command::cargo_bin("kaleido")
        .expect("binary exists")
        .arg("--input")
        .arg(dir.path().join("missing.kal"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read input file"));
}
