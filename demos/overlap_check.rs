//! Dry-run the layout and report overlapping image placements before
//! committing to a full render.
//!
//! ```sh
//! cargo run --example overlap_check -- a.jpg b.jpg c.png
//! ```

use collage_client::{CollageClient, CollageConfig, LayoutStyle, UploadLimits, UploadSet};

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let client = CollageClient::new("http://127.0.0.1:8000");

    let mut uploads = UploadSet::new(UploadLimits::default());
    for path in std::env::args().skip(1) {
        uploads.add_from_path(&path)?;
    }

    let config = CollageConfig::new().layout(LayoutStyle::Random).spacing(0);
    let analysis = client.analyze_overlaps(&config, &uploads).await?;

    if !analysis.has_overlaps {
        println!("No overlaps, layout is clean");
        return Ok(());
    }

    println!("{} overlap(s) detected:", analysis.overlap_count);
    for pair in &analysis.overlapping_pairs {
        println!(
            "  images {} and {} overlap by {:.1}%",
            pair.image_a, pair.image_b, pair.overlap_percentage
        );
    }
    if let Some(recommendation) = &analysis.recommendation {
        println!("Recommendation: {}", recommendation);
    }
    for removal in &analysis.suggested_removals {
        println!("  consider removing [{}] {}", removal.index, removal.filename);
    }

    Ok(())
}
