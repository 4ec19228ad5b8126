use anyhow::Result;
use batchline::io::csv;
use batchline::io::glob::expand_glob;
use batchline::{Table, Value};
use std::fs;

fn sample_table() -> Table {
    let mut table = Table::new();
    table
        .push_column("city", vec![Value::from("oslo"), Value::from("lima")])
        .unwrap();
    table
        .push_column("pop", vec![Value::from("709037"), Value::from("8852000")])
        .unwrap();
    table
}

#[test]
fn parse_builds_named_columns() -> Result<()> {
    let bytes = b"k,v\nfoo,1\nbar,2\n";
    let table = csv::parse(bytes)?;

    assert_eq!(table.num_columns(), 2);
    assert_eq!(table.num_rows(), 2);
    assert_eq!(table.cell(1, "k"), Some(&Value::Str("bar".to_string())));
    assert_eq!(table.cell(0, "v"), Some(&Value::Str("1".to_string())));
    Ok(())
}

#[test]
fn serialize_parse_round_trip_is_exact_for_canonical_bytes() -> Result<()> {
    let bytes = b"city,pop\noslo,709037\nlima,8852000\n".to_vec();
    let table = csv::parse(&bytes)?;
    assert_eq!(csv::serialize(&table)?, bytes);
    Ok(())
}

#[test]
fn ragged_records_are_a_parse_error() {
    let err = csv::parse(b"a,b\n1,2\n3\n").unwrap_err();
    assert!(format!("{err:#}").contains("record"));
}

#[test]
fn serialize_rejects_non_scalar_cells() {
    let mut table = Table::new();
    table.push_column("blob", vec![Value::Bytes(vec![1, 2, 3])]).unwrap();
    assert!(csv::serialize(&table).is_err());
}

/// A column shortened through `column_mut` leaves the table ragged; the
/// writer must report that, not index past the short column.
#[test]
fn serialize_rejects_ragged_table() {
    let mut table = sample_table();
    table.column_mut("pop").unwrap().cells.pop();

    let err = csv::serialize(&table).unwrap_err();
    assert!(format!("{err}").contains("ragged"), "unexpected error: {err:#}");
}

#[test]
fn write_table_creates_parent_dirs_and_reads_back() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("nested/dir/out.csv");

    let table = sample_table();
    let rows = csv::write_table(&path, &table)?;
    assert_eq!(rows, 2);

    let back = csv::read_table(&path)?;
    assert_eq!(back, table);
    Ok(())
}

#[test]
fn expand_glob_returns_sorted_files_only() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    fs::write(tmp.path().join("b.csv"), "k\n1\n")?;
    fs::write(tmp.path().join("a.csv"), "k\n2\n")?;
    fs::create_dir(tmp.path().join("c.csv"))?;

    let pattern = format!("{}/*.csv", tmp.path().display());
    let files = expand_glob(&pattern)?;
    let names: Vec<String> = files
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
        .collect();
    assert_eq!(names, vec!["a.csv", "b.csv"]);
    Ok(())
}

#[test]
fn table_rename_and_mutation() -> Result<()> {
    let mut table = sample_table();
    table.rename_column("pop", "population")?;
    assert!(table.column("population").is_some());
    assert!(table.rename_column("missing", "x").is_err());

    // Mismatched row count is rejected.
    assert!(table.push_column("extra", vec![Value::from("only-one")]).is_err());
    Ok(())
}
