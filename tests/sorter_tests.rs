// External sorter integration tests

use mtable::{
    Error, KeepFirst, MergeResolver, Sorter, SorterOptions, TableReader, TableWriter,
    WriterOptions,
};
use rand::seq::SliceRandom;
use std::collections::BTreeMap;
use std::path::Path;
use tempfile::TempDir;

type Entry = (Vec<u8>, Vec<u8>);

fn pair(k: &str, v: &str) -> Entry {
    (k.as_bytes().to_vec(), v.as_bytes().to_vec())
}

/// Write the sorter's output to `name` under `dir` and read it back
fn finish(sorter: &mut Sorter, dir: &Path, name: &str) -> Vec<Entry> {
    let path = dir.join(name);
    let mut writer = TableWriter::new(&path, WriterOptions::default()).unwrap();
    sorter.write(&mut writer).unwrap();
    sorter.close().unwrap();
    writer.finalize().unwrap();
    let reader = TableReader::open(&path).unwrap();
    reader.scan().map(|e| e.unwrap()).collect()
}

/// Later values win under the default resolver
#[test]
fn test_default_resolver_keeps_latest() {
    env_logger::try_init().ok();
    let dir = TempDir::new().unwrap();
    let mut sorter = Sorter::new(SorterOptions::new().temp_dir(dir.path())).unwrap();
    for (k, v) in [("c", "3"), ("a", "1"), ("b", "2"), ("a", "9")] {
        sorter.add(k.as_bytes(), v.as_bytes()).unwrap();
    }

    let table = finish(&mut sorter, dir.path(), "out.mtbl");
    assert_eq!(table, vec![pair("a", "9"), pair("b", "2"), pair("c", "3")]);
}

/// Three rounds of overrides for three keys
#[test]
fn test_repeated_overrides() {
    let dir = TempDir::new().unwrap();
    let mut sorter = Sorter::new(SorterOptions::new().temp_dir(dir.path())).unwrap();
    for (k, v) in [
        ("bbb", "2"),
        ("aaa", "1"),
        ("ccc", "3"),
        ("bbb", "22"),
        ("aaa", "11"),
        ("ccc", "33"),
        ("bbb", "222"),
        ("aaa", "111"),
        ("ccc", "333"),
    ] {
        sorter.add(k.as_bytes(), v.as_bytes()).unwrap();
    }
    assert_eq!(sorter.num_entries(), 9);

    let table = finish(&mut sorter, dir.path(), "out.mtbl");
    assert_eq!(table, vec![pair("aaa", "111"), pair("bbb", "222"), pair("ccc", "333")]);
}

/// Results are the same whether everything fits in memory or spills to many runs
#[test]
fn test_spilling_matches_in_memory() {
    env_logger::try_init().ok();
    let dir = TempDir::new().unwrap();

    let mut entries: Vec<Entry> = (0..2000)
        .map(|i| (format!("key{:05}", i % 700).into_bytes(), format!("v{}", i).into_bytes()))
        .collect();
    entries.shuffle(&mut rand::rng());

    let mut expected = BTreeMap::new();
    for (k, v) in &entries {
        expected.insert(k.clone(), v.clone());
    }
    let expected: Vec<Entry> = expected.into_iter().collect();

    for (name, budget) in [("memory.mtbl", usize::MAX), ("small.mtbl", 16 * 1024), ("tiny.mtbl", 512)] {
        let options = SorterOptions::new().temp_dir(dir.path()).max_memory(budget);
        let mut sorter = Sorter::new(options).unwrap();
        for (k, v) in &entries {
            sorter.add(k, v).unwrap();
        }
        if budget == 512 {
            assert!(sorter.num_runs() > 100);
        }
        assert_eq!(finish(&mut sorter, dir.path(), name), expected, "budget {}", budget);
    }
}

/// A resolver sees colliding values in the order they were added
#[test]
fn test_custom_resolver_across_runs() {
    let dir = TempDir::new().unwrap();
    let join = |_key: &[u8], left: &[u8], right: &[u8]| [left, b"|".as_slice(), right].concat();
    let options = SorterOptions::new().temp_dir(dir.path()).max_memory(200).merge(join);
    let mut sorter = Sorter::new(options).unwrap();

    for i in 0..10 {
        sorter.add(b"dup", i.to_string().as_bytes()).unwrap();
        sorter.add(format!("solo{}", i).as_bytes(), b"x").unwrap();
    }
    assert!(sorter.num_runs() > 1);

    let table = finish(&mut sorter, dir.path(), "joined.mtbl");
    assert_eq!(table.len(), 11);
    assert_eq!(table[0], pair("dup", "0|1|2|3|4|5|6|7|8|9"));
}

/// A resolver implemented as a type
#[test]
fn test_resolver_trait_impl() {
    struct Max;
    impl MergeResolver for Max {
        fn merge(&self, _key: &[u8], left: &[u8], right: &[u8]) -> Vec<u8> {
            left.max(right).to_vec()
        }
        fn name(&self) -> &str {
            "Max"
        }
    }

    let dir = TempDir::new().unwrap();
    let mut sorter = Sorter::new(SorterOptions::new().temp_dir(dir.path()).merge(Max)).unwrap();
    for v in ["3", "7", "5"] {
        sorter.add(b"k", v.as_bytes()).unwrap();
    }
    assert_eq!(finish(&mut sorter, dir.path(), "max.mtbl"), vec![pair("k", "7")]);

    let mut sorter = Sorter::new(SorterOptions::new().temp_dir(dir.path()).merge(KeepFirst)).unwrap();
    for v in ["3", "7", "5"] {
        sorter.add(b"k", v.as_bytes()).unwrap();
    }
    assert_eq!(finish(&mut sorter, dir.path(), "first.mtbl"), vec![pair("k", "3")]);
}

/// Invalid temporary directories are rejected at construction
#[test]
fn test_sorter_options_errors() {
    let dir = TempDir::new().unwrap();
    let missing = SorterOptions::new().temp_dir(dir.path().join("missing"));
    assert!(matches!(Sorter::new(missing), Err(Error::NotFound(_))));

    let file = dir.path().join("file");
    std::fs::write(&file, b"x").unwrap();
    assert!(matches!(Sorter::new(SorterOptions::new().temp_dir(&file)), Err(Error::InvalidArgument(_))));
}

/// Lifecycle: no adds after write, close once
#[test]
fn test_sorter_lifecycle() {
    let dir = TempDir::new().unwrap();
    let mut sorter = Sorter::new(SorterOptions::new().temp_dir(dir.path())).unwrap();
    sorter.add(b"a", b"1").unwrap();

    let path = dir.path().join("out.mtbl");
    let mut writer = TableWriter::new(&path, WriterOptions::default()).unwrap();
    sorter.write(&mut writer).unwrap();
    assert!(matches!(sorter.add(b"b", b"2"), Err(Error::SorterClosed(_))));
    assert!(matches!(sorter.write(&mut writer), Err(Error::SorterClosed(_))));
    sorter.close().unwrap();
    assert!(matches!(sorter.close(), Err(Error::SorterClosed(_))));
    writer.finalize().unwrap();

    let mut closed = Sorter::new(SorterOptions::new().temp_dir(dir.path())).unwrap();
    closed.close().unwrap();
    assert!(matches!(closed.add(b"a", b"1"), Err(Error::SorterClosed(_))));
}

/// Run files disappear when the sorter is closed
#[test]
fn test_run_files_removed_on_close() {
    let dir = TempDir::new().unwrap();
    let runs = dir.path().join("runs");
    std::fs::create_dir(&runs).unwrap();

    let mut sorter = Sorter::new(SorterOptions::new().temp_dir(&runs).max_memory(100)).unwrap();
    for i in 0..50 {
        sorter.add(format!("{}", 50 - i).as_bytes(), b"value").unwrap();
    }
    assert!(sorter.num_runs() > 0);
    assert_eq!(std::fs::read_dir(&runs).unwrap().count(), sorter.num_runs());

    sorter.close().unwrap();
    assert_eq!(std::fs::read_dir(&runs).unwrap().count(), 0);
}

/// Failures during the merge surface as SortFailed
#[test]
fn test_write_failures_are_sort_failed() {
    let dir = TempDir::new().unwrap();

    // Target writer already past the sorter's first key
    let mut sorter = Sorter::new(SorterOptions::new().temp_dir(dir.path())).unwrap();
    sorter.add(b"m", b"1").unwrap();
    let path = dir.path().join("ahead.mtbl");
    let mut writer = TableWriter::new(&path, WriterOptions::default()).unwrap();
    writer.add(b"z", b"1").unwrap();
    assert!(matches!(sorter.write(&mut writer), Err(Error::SortFailed(_))));

    // Target writer already finalized
    let mut sorter = Sorter::new(SorterOptions::new().temp_dir(dir.path())).unwrap();
    sorter.add(b"a", b"1").unwrap();
    let path = dir.path().join("finished.mtbl");
    let mut writer = TableWriter::new(&path, WriterOptions::default()).unwrap();
    writer.finalize().unwrap();
    assert!(matches!(sorter.write(&mut writer), Err(Error::SortFailed(_))));
}

/// An empty sorter writes nothing and leaves the writer usable
#[test]
fn test_empty_sorter() {
    let dir = TempDir::new().unwrap();
    let mut sorter = Sorter::new(SorterOptions::new().temp_dir(dir.path())).unwrap();
    assert!(finish(&mut sorter, dir.path(), "empty.mtbl").is_empty());
}
