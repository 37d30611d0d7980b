/// Basic example demonstrating archive creation and reading
///
/// Run with: cargo run --example basic
use combine_archive::{CombineArchive, Creator};
use std::error::Error;
use std::io::{Read, Write};

const ARCHIVE: &str = "example_basic.cmb";

fn main() -> Result<(), Box<dyn Error>> {
    println!("=== combine-archive Basic Example ===\n");

    // Start from a clean slate
    let _ = std::fs::remove_file(ARCHIVE);

    println!("1. Creating archive...");
    create_archive()?;

    println!("\n2. Reading from archive...");
    read_archive()?;

    std::fs::remove_file(ARCHIVE)?;
    println!("\n✓ Example complete!");
    Ok(())
}

fn create_archive() -> Result<(), Box<dyn Error>> {
    let mut archive = CombineArchive::create(ARCHIVE)?;

    archive.create_artifact_from(
        "/models/model1.xml",
        "application/xml",
        &br#"<sbml level="3" version="2"/>"#[..],
    )?;
    archive.create_artifact_from(
        "/data/timecourse.csv",
        "text/csv",
        &b"time,x\n0,1.0\n1,0.5\n"[..],
    )?;

    // Empty artifact filled in afterwards
    let readme = archive.create_artifact("/README.md", "text/markdown")?;
    archive
        .write_artifact(&readme)?
        .write_all(b"# Notes\n\nA simple oscillator.")?;

    let metadata = archive.metadata_mut();
    metadata.set_description("Basic example bundle");
    metadata.add_creator(Creator::new("Example Author"));

    archive.close()?;
    println!("   ✓ Archive created: {}", ARCHIVE);
    Ok(())
}

fn read_archive() -> Result<(), Box<dyn Error>> {
    let mut archive = CombineArchive::open(ARCHIVE)?;

    println!("   Artifacts in archive:");
    for info in archive.artifacts()? {
        println!("     - {}", info);
    }

    if let Some(info) = archive.get_artifact("/README.md")? {
        let mut text = String::new();
        archive.read_artifact(&info)?.read_to_string(&mut text)?;
        println!("\n   Reading {}:\n{}", info.path(), text);
        println!("\n   SHA-256: {}", archive.digest_artifact(&info)?);
    }

    let record = archive.metadata().record();
    println!(
        "\n   Created {} by {} creator(s)",
        record.created,
        record.creators.len()
    );

    archive.close()?;
    Ok(())
}
