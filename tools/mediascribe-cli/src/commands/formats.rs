//! List supported input formats.

use mediascribe_media::{FileType, FileTypeDetector};

pub fn run() -> anyhow::Result<()> {
    let video: Vec<_> = FileType::ALL
        .iter()
        .filter(|t| t.is_video())
        .map(|t| t.extension())
        .collect();
    let audio: Vec<_> = FileType::ALL
        .iter()
        .filter(|t| t.is_audio())
        .map(|t| t.extension())
        .collect();

    println!("Supported input formats:");
    println!("  Video (converted to audio first): {}", video.join(", "));
    println!("  Audio: {}", audio.join(", "));
    println!();
    println!(
        "{} extensions in total.",
        FileTypeDetector::supported_extensions().len()
    );
    Ok(())
}
