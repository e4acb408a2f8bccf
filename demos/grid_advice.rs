//! Ask the service how the staged image count fits a rectangular grid,
//! and apply a remove suggestion when one is offered.
//!
//! ```sh
//! cargo run --example grid_advice -- a.jpg b.jpg c.png d.png e.jpg
//! ```

use collage_client::{
    advisor, CanvasSize, CollageClient, GridAction, GridRequest, SizeUnit, UploadLimits,
    UploadSet,
};

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let client = CollageClient::new("http://127.0.0.1:8000");

    let mut uploads = UploadSet::new(UploadLimits::default());
    for path in std::env::args().skip(1) {
        uploads.add_from_path(&path)?;
    }
    println!("Staged {} images", uploads.len());

    let request = GridRequest::new(
        uploads.len() as u32,
        CanvasSize::Physical {
            width: 12.0,
            height: 18.0,
            unit: SizeUnit::Inches,
            dpi: 300,
        },
    )
    .spacing(4);

    let advice = client.optimize_grid(&request).await?;
    println!(
        "Current grid: {}x{} with {} images (perfect: {})",
        advice.current_grid.columns,
        advice.current_grid.rows,
        advice.current_grid.total_images,
        advice.current_grid.is_perfect
    );

    let Some(best) = advice.closest_perfect_grid else {
        println!("Already a perfect grid, nothing to do");
        return Ok(());
    };

    match best.action {
        GridAction::RemoveImages => {
            let removed = advisor::apply_remove_option(&mut uploads, &best)?;
            println!(
                "Removed {} image(s) for a {}x{} grid, {} remain",
                removed,
                best.columns,
                best.rows,
                uploads.len()
            );
        }
        GridAction::AddImages => {
            // The client never fabricates images, only advises
            match advisor::check_add_option(&uploads, &best) {
                Ok(needed) => println!(
                    "Add {} image(s) to reach a {}x{} grid",
                    needed, best.columns, best.rows
                ),
                Err(refused) => println!("Suggestion refused: {}", refused),
            }
        }
    }

    Ok(())
}
