//! Submit a collage job and poll it to completion.
//!
//! Requires a running collage service at http://127.0.0.1:8000 and at
//! least two image paths on the command line.
//!
//! ```sh
//! cargo run --example submit_and_wait -- a.jpg b.jpg c.png
//! ```

use collage_client::{
    CollageClient, CollageConfig, CollageSession, LayoutStyle, OutputFormat, PollConfig,
    UploadLimits,
};
use std::time::Duration;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let client = CollageClient::new("http://127.0.0.1:8000");

    // Check connection
    if !client.health().await? {
        eprintln!("Collage service is not responding");
        return Ok(());
    }
    println!("Collage service is online");

    let mut session = CollageSession::new(client, UploadLimits::default())
        .with_poll_config(
            PollConfig::builder()
                .with_interval(Duration::from_secs(2))
                .with_timeout(Duration::from_secs(300))
                .build(),
        );

    // Stage the images
    for path in std::env::args().skip(1) {
        let id = session.uploads_mut().add_from_path(&path)?;
        println!("Staged {} as {}", path, id);
    }

    let config = CollageConfig::new()
        .layout(LayoutStyle::Masonry)
        .spacing(6)
        .shadows(true)
        .output_format(OutputFormat::Jpeg);

    let job_id = session.submit(&config).await?;
    println!("Created job: {}", job_id);

    let outcome = session
        .watch(|s| println!("  {} ({}%)", s.status.as_str(), s.progress))
        .await?;

    if outcome.is_completed() {
        let artifact = session.download().await?;
        std::fs::write(&artifact.filename, &artifact.bytes)?;
        println!("Saved: {}", artifact.filename);
    } else {
        eprintln!("Job did not complete: {:?}", outcome);
    }

    Ok(())
}
