//! List site content

use anyhow::Result;

use crate::content::{ContentClient, PostFormatter};
use crate::helpers::DateFormatter;
use crate::listing::Listing;
use crate::Blog;

/// List site content by type
pub async fn run(blog: &Blog, content_type: &str) -> Result<()> {
    match content_type {
        "post" | "posts" => {
            let client = ContentClient::new(blog.config.api.clone())?;
            let formatter = PostFormatter::new(DateFormatter::from_config(&blog.config)?);

            let mut listing = Listing::first_page(&client, &formatter, &blog.config).await?;
            while listing.has_more() {
                if listing.load_more(&client, &formatter).await?.is_empty() {
                    break;
                }
            }

            println!("Posts ({}):", listing.posts().len());
            for post in listing.posts() {
                println!(
                    "  {} - {} [{}]",
                    post.first_publication_date.as_deref().unwrap_or("unpublished"),
                    post.title,
                    post.uid
                );
            }
        }
        _ => {
            anyhow::bail!("Unknown type: {}. Available: post", content_type);
        }
    }

    Ok(())
}
