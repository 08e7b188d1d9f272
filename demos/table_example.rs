//! Example demonstrating table usage.
//!
//! This example shows how to:
//! - Write a table from presorted key-value pairs
//! - Look up keys, prefixes and ranges
//! - Inspect file statistics

use mtable::{inspect, CompressionType, Result, TableReader, TableWriter, WriterOptions};
use std::fs;

fn show(entry: Result<(Vec<u8>, Vec<u8>)>) -> Result<()> {
    let (key, value) = entry?;
    println!(
        "     '{}' -> '{}'",
        String::from_utf8_lossy(&key),
        String::from_utf8_lossy(&value)
    );
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    println!("=== Table Example ===\n");

    // Writers refuse to overwrite, so start from a clean directory
    let temp_dir = std::env::temp_dir().join("mtable_table_example");
    if temp_dir.exists() {
        fs::remove_dir_all(&temp_dir)?;
    }
    fs::create_dir_all(&temp_dir)?;
    let table_path = temp_dir.join("fruit.mtbl");

    // === Part 1: Writing a table ===
    println!("1. Writing a table...");
    {
        let options = WriterOptions::new().block_size(4096).compression(CompressionType::Snappy);
        let mut writer = TableWriter::new(&table_path, options)?;

        // Keys must be strictly increasing
        let entries: Vec<(&[u8], &[u8])> = vec![
            (b"apple", b"A red or green fruit"),
            (b"apricot", b"A small orange stone fruit"),
            (b"banana", b"A yellow tropical fruit"),
            (b"cherry", b"A small red stone fruit"),
            (b"date", b"A sweet brown fruit from palm trees"),
            (b"fig", b"A soft sweet fruit with many seeds"),
            (b"grape", b"A small round fruit that grows in clusters"),
        ];
        for (key, value) in &entries {
            writer.add(key, value)?;
        }

        let metadata = writer.finalize()?;
        println!("   ✓ {} entries in {} blocks\n", metadata.count_entries, metadata.count_data_blocks);
    }

    // === Part 2: Lookups ===
    println!("2. Reading the table...");
    {
        let reader = TableReader::open(&table_path)?;

        println!("   Exact lookups:");
        for key in [b"banana".as_slice(), b"mango".as_slice()] {
            let mut found = false;
            for entry in reader.get(key) {
                show(entry)?;
                found = true;
            }
            if !found {
                println!("     '{}' -> NOT FOUND", String::from_utf8_lossy(key));
            }
        }

        println!("   Prefix 'ap':");
        for entry in reader.get_prefix(b"ap") {
            show(entry)?;
        }

        println!("   Range ['c', 'g'):");
        for entry in reader.get_range(b"c", b"g") {
            show(entry)?;
        }
        println!();
    }

    // === Part 3: A larger table ===
    println!("3. Writing a larger table...");
    {
        let large_path = temp_dir.join("large.mtbl");
        // Smaller blocks to demonstrate multiple blocks
        let mut writer = TableWriter::new(&large_path, WriterOptions::new().block_size(1024))?;
        for i in 0..10000 {
            let key = format!("key{:08}", i);
            let value = format!("value_{:08}_with_some_extra_data", i);
            writer.add(key.as_bytes(), value.as_bytes())?;
        }
        writer.finalize()?;

        let reader = TableReader::open(&large_path)?;
        println!("   ✓ Number of blocks: {}", reader.num_blocks());
        println!("   ✓ Entries in full scan: {}", reader.scan().count());

        let info = inspect(&large_path)?;
        println!(
            "   ✓ {} bytes, {} compression, compactness {:.3}",
            info.filesize, info.compression, info.compactness
        );
    }

    println!("\n✓ Example completed successfully!");
    println!("  (Temporary files at: {})", temp_dir.display());

    Ok(())
}
