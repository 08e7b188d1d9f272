//! Example demonstrating the external sorter.
//!
//! Entries are added in random order with duplicates, spilled to run files
//! under a small memory budget, and merged into a table with a resolver
//! that sums the colliding counts.

use mtable::{Result, Sorter, SorterOptions, TableReader, TableWriter, WriterOptions};
use std::fs;

fn sum_counts(_key: &[u8], left: &[u8], right: &[u8]) -> Vec<u8> {
    let parse = |v: &[u8]| -> u64 { std::str::from_utf8(v).ok().and_then(|s| s.parse().ok()).unwrap_or(0) };
    (parse(left) + parse(right)).to_string().into_bytes()
}

fn main() -> Result<()> {
    env_logger::init();
    println!("=== Sorter Example ===\n");

    let temp_dir = std::env::temp_dir().join("mtable_sorter_example");
    if temp_dir.exists() {
        fs::remove_dir_all(&temp_dir)?;
    }
    fs::create_dir_all(&temp_dir)?;
    let table_path = temp_dir.join("words.mtbl");

    let text = "the quick brown fox jumps over the lazy dog and the dog sleeps while the fox runs";

    println!("1. Counting words...");
    let options = SorterOptions::new().temp_dir(&temp_dir).max_memory(256).merge(sum_counts);
    let mut sorter = Sorter::new(options)?;
    for word in text.split_whitespace() {
        sorter.add(word.as_bytes(), b"1")?;
    }
    println!("   ✓ {} words added, {} runs spilled\n", sorter.num_entries(), sorter.num_runs());

    println!("2. Merging into a table...");
    let mut writer = TableWriter::new(&table_path, WriterOptions::default())?;
    sorter.write(&mut writer)?;
    sorter.close()?;
    let metadata = writer.finalize()?;
    println!("   ✓ {} distinct words\n", metadata.count_entries);

    println!("3. Word counts:");
    let reader = TableReader::open(&table_path)?;
    for entry in reader.scan() {
        let (word, count) = entry?;
        println!("   {:>8} {}", String::from_utf8_lossy(&word), String::from_utf8_lossy(&count));
    }

    println!("\n✓ Example completed successfully!");
    Ok(())
}
