// SPDX-License-Identifier: GPL-3.0-or-later

use crate::fixtures::infrastructure::TestEnvironment;
use anyhow::Result;
use covdata::data::CoverageData;
use std::collections::BTreeSet;

/// Lines executed by `b_or_c.py` when it runs the `b` branch.
const B_LINES: &[i32] = &[1, 2, 3, 4, 8, 9];
/// Lines executed by `b_or_c.py` when it runs the `c` branch.
const C_LINES: &[i32] = &[1, 2, 3, 6, 7, 8, 9];

#[test]
fn combine_parallel_data() -> Result<()> {
    let env = TestEnvironment::new("combine_parallel_data")?;
    env.record_lines(".coverage.host.101.X000001", "b_or_c.py", B_LINES)?;
    env.record_lines(".coverage.host.102.X000002", "b_or_c.py", C_LINES)?;

    let output = env.run_covdata_success(&["combine"])?;

    assert!(output.stdout().contains("Combined 2 data file(s)"));
    assert!(output.stderr().lines().all(|line| !line.starts_with("covdata: warning")));
    assert!(env.parallel_files(".coverage")?.is_empty());
    env.load_data(".coverage")?.assert_line_count("b_or_c.py", 8)?;
    Ok(())
}

#[test]
fn combine_with_bad_file() -> Result<()> {
    let env = TestEnvironment::new("combine_with_bad_file")?;
    env.record_lines(".coverage.1", "b_or_c.py", B_LINES)?;
    env.create_files(&[(".coverage.foo", "This isn't a coverage data file.")])?;

    let output = env.run_covdata_success(&["combine"])?;

    let warnings = output.warnings("couldnt-use-data-file");
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains(".coverage.foo"));
    assert!(warnings[0].contains("not a valid coverage data file"));

    assert_eq!(env.parallel_files(".coverage")?, vec![".coverage.foo"]);
    env.load_data(".coverage")?.assert_line_count("b_or_c.py", 6)?;
    Ok(())
}

#[test]
fn combine_only_bad_files() -> Result<()> {
    let env = TestEnvironment::new("combine_only_bad_files")?;
    env.create_files(&[
        (".coverage.bad1", "This isn't a coverage data file."),
        (".coverage.bad2", "This isn't a coverage data file either."),
    ])?;

    let output = env.run_covdata_failure(&["combine"])?;

    assert_eq!(output.exit_code(), Some(1));
    let warnings = output.warnings("couldnt-use-data-file");
    assert_eq!(warnings.len(), 2);
    assert!(warnings[0].contains(".coverage.bad1"));
    assert!(warnings[1].contains(".coverage.bad2"));
    assert_eq!(output.warnings("no-usable-data-files").len(), 1);
    assert!(output.stderr().contains("covdata: No usable data files"));

    assert_eq!(env.parallel_files(".coverage")?, vec![".coverage.bad1", ".coverage.bad2"]);
    assert!(!env.file_exists(".coverage"));
    Ok(())
}

#[test]
fn combine_twice() -> Result<()> {
    let env = TestEnvironment::new("combine_twice")?;
    env.record_lines(".coverage.1", "b_or_c.py", B_LINES)?;

    env.run_covdata_success(&["combine"])?;
    let output = env.run_covdata_failure(&["combine"])?;

    assert_eq!(output.exit_code(), Some(1));
    assert!(output.stderr().contains("covdata: No data to combine"));
    env.load_data(".coverage")?.assert_line_count("b_or_c.py", 6)?;
    Ok(())
}

#[test]
fn combine_append() -> Result<()> {
    let env = TestEnvironment::new("combine_append")?;
    env.record_lines(".coverage", "previous.py", &[1, 2])?;
    env.record_lines(".coverage.1", "b_or_c.py", B_LINES)?;

    env.run_covdata_success(&["combine", "--append"])?;

    let content = env.load_data(".coverage")?;
    content.assert_line_count("previous.py", 2)?;
    content.assert_line_count("b_or_c.py", 6)?;
    Ok(())
}

#[test]
fn combine_append_from_configuration() -> Result<()> {
    let env = TestEnvironment::new("combine_append_from_configuration")?;
    env.create_config(
        r#"
schema: 1.0

combine:
  append: true
"#,
    )?;
    env.record_lines(".coverage", "previous.py", &[1])?;
    env.record_lines(".coverage.1", "b_or_c.py", C_LINES)?;

    env.run_covdata_success(&["combine"])?;

    let content = env.load_data(".coverage")?;
    content.assert_line_count("previous.py", 1)?;
    content.assert_line_count("b_or_c.py", 7)?;
    Ok(())
}

#[test]
fn combine_append_without_primary() -> Result<()> {
    let env = TestEnvironment::new("combine_append_without_primary")?;
    env.record_lines(".coverage.1", "b_or_c.py", B_LINES)?;

    let output = env.run_covdata_success(&["combine", "-a"])?;

    assert_eq!(output.warnings("no-data-to-append").len(), 1);
    env.load_data(".coverage")?.assert_line_count("b_or_c.py", 6)?;
    Ok(())
}

#[test]
fn combine_no_append() -> Result<()> {
    let env = TestEnvironment::new("combine_no_append")?;
    env.record_lines(".coverage", "previous.py", &[1, 2])?;
    env.record_lines(".coverage.1", "b_or_c.py", B_LINES)?;

    env.run_covdata_success(&["combine"])?;

    let content = env.load_data(".coverage")?;
    content.assert_not_measured("previous.py")?;
    content.assert_line_count("b_or_c.py", 6)?;
    Ok(())
}

#[test]
fn combine_keep() -> Result<()> {
    let env = TestEnvironment::new("combine_keep")?;
    env.record_lines(".coverage.1", "b_or_c.py", B_LINES)?;
    env.record_lines(".coverage.2", "b_or_c.py", C_LINES)?;

    env.run_covdata_success(&["combine", "--keep"])?;

    assert_eq!(env.parallel_files(".coverage")?, vec![".coverage.1", ".coverage.2"]);
    env.load_data(".coverage")?.assert_line_count("b_or_c.py", 8)?;
    Ok(())
}

#[test]
fn combine_append_and_keep() -> Result<()> {
    let env = TestEnvironment::new("combine_append_and_keep")?;
    env.record_lines(".coverage", "previous.py", &[3])?;
    env.record_lines(".coverage.1", "b_or_c.py", B_LINES)?;

    env.run_covdata_success(&["combine", "--append", "--keep"])?;

    assert_eq!(env.parallel_files(".coverage")?, vec![".coverage.1"]);
    let content = env.load_data(".coverage")?;
    content.assert_line_count("previous.py", 1)?;
    content.assert_line_count("b_or_c.py", 6)?;
    Ok(())
}

#[test]
fn combine_with_aliases() -> Result<()> {
    let env = TestEnvironment::new("combine_with_aliases")?;
    env.create_config(
        r#"
schema: 1.0

paths:
  - canonical: src
    patterns:
      - "*/machine1/src"
      - "*/machine2/src"
"#,
    )?;

    let mut first = CoverageData::with_working_directory("/ci/machine1");
    first.add_lines([("/ci/machine1/src/x.py", vec![1, 2])])?;
    env.write_data(".coverage.m1", &first)?;

    let mut second = CoverageData::with_working_directory("/ci/machine2");
    second.add_lines([("src/x.py", vec![2, 5])])?;
    env.write_data(".coverage.m2", &second)?;

    env.run_covdata_success(&["combine"])?;

    let content = env.load_data(".coverage")?;
    assert_eq!(content.measured_file_count(), 1);
    content.assert_line_count("src/x.py", 3)?;
    let lines = content.data().lines(&env.path("src/x.py"));
    assert_eq!(lines, Some(BTreeSet::from([1, 2, 5])));
    Ok(())
}

#[test]
fn combine_explicit_paths() -> Result<()> {
    let env = TestEnvironment::new("combine_explicit_paths")?;
    env.record_lines("run1/.coverage.1", "b_or_c.py", B_LINES)?;
    env.record_lines("run2/collected.data", "b_or_c.py", C_LINES)?;
    env.record_lines(".coverage.local", "local.py", &[1])?;

    let output = env.run_covdata_success(&["combine", "run1", "run2/collected.data", "run3"])?;

    assert_eq!(output.warnings("couldnt-combine-from-nonexistent-path").len(), 1);
    assert!(!env.file_exists("run1/.coverage.1"));
    assert!(!env.file_exists("run2/collected.data"));
    assert!(env.file_exists(".coverage.local"));

    let content = env.load_data(".coverage")?;
    content.assert_not_measured("local.py")?;
    assert_eq!(content.measured_file_count(), 1);
    Ok(())
}

#[test]
fn combine_quiet() -> Result<()> {
    let env = TestEnvironment::new("combine_quiet")?;
    env.record_lines(".coverage.1", "b_or_c.py", B_LINES)?;
    env.create_files(&[(".coverage.foo", "This isn't a coverage data file.")])?;

    let output = env.run_covdata_success(&["combine", "--quiet"])?;

    assert!(output.stdout().is_empty());
    assert!(output.warnings("couldnt-use-data-file").is_empty());
    Ok(())
}

#[test]
fn combine_with_disabled_warning() -> Result<()> {
    let env = TestEnvironment::new("combine_with_disabled_warning")?;
    env.create_config(
        r#"
schema: 1.0

warnings:
  disabled: [couldnt-use-data-file]
"#,
    )?;
    env.record_lines(".coverage.1", "b_or_c.py", B_LINES)?;
    env.create_files(&[(".coverage.foo", "This isn't a coverage data file.")])?;

    let output = env.run_covdata_success(&["combine"])?;

    assert!(output.warnings("couldnt-use-data-file").is_empty());
    assert!(env.file_exists(".coverage.foo"));
    Ok(())
}

#[test]
fn combine_mixed_measurements_fails() -> Result<()> {
    let env = TestEnvironment::new("combine_mixed_measurements_fails")?;
    env.record_lines(".coverage.1", "b_or_c.py", B_LINES)?;
    let mut arcs = CoverageData::with_working_directory(env.root());
    arcs.add_arcs([("b_or_c.py", covdata::codec::decode(".1 12 23 38 89 9.")?)])?;
    env.write_data(".coverage.2", &arcs)?;

    let output = env.run_covdata_failure(&["combine"])?;

    assert!(output.stderr().contains("Can't add arc data to a store holding line data"));
    assert_eq!(env.parallel_files(".coverage")?, vec![".coverage.1", ".coverage.2"]);
    assert!(!env.file_exists(".coverage"));
    Ok(())
}

#[test]
fn combine_arc_data() -> Result<()> {
    let env = TestEnvironment::new("combine_arc_data")?;
    for (name, tokens) in
        [(".coverage.b", ".1 12 23 34 48 89 9."), (".coverage.c", ".1 12 23 36 67 78 89 9.")]
    {
        let mut data = CoverageData::with_working_directory(env.root());
        data.add_arcs([("b_or_c.py", covdata::codec::decode(tokens)?)])?;
        env.write_data(name, &data)?;
    }

    let output = env.run_covdata_success(&["combine"])?;

    assert!(output.stdout().contains("Combined 2 data file(s)"));
    assert!(env.parallel_files(".coverage")?.is_empty());
    let content = env.load_data(".coverage")?;
    content.assert_line_count("b_or_c.py", 8)?;
    let arcs = content.data().arcs(&env.path("b_or_c.py")).unwrap_or_default();
    assert_eq!(arcs.len(), 10);
    Ok(())
}
