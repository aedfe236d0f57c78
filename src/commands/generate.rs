//! Generate static files

use anyhow::Result;

use crate::content::ContentClient;
use crate::generator::Generator;
use crate::Blog;

/// Generate the site from the configured content API
pub async fn run(blog: &Blog) -> Result<()> {
    let start = std::time::Instant::now();

    let client = ContentClient::new(blog.config.api.clone())?;
    let generator = Generator::new(blog, client)?;
    let report = generator.generate().await?;

    tracing::info!(
        "Generated {} listing pages and {} posts",
        report.listing_pages,
        report.posts.len()
    );
    for (uid, reason) in &report.failed {
        tracing::warn!("Skipped post {}: {}", uid, reason);
    }

    let duration = start.elapsed();
    tracing::info!("Completed in {:.2}s", duration.as_secs_f64());

    Ok(())
}
