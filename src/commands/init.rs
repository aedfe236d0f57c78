//! Initialize a new site

use anyhow::Result;
use std::fs;
use std::path::Path;

const DEFAULT_CONFIG: &str = r#"# spacetraveling configuration

# Site
title: spacetraveling
description: ''
language: pt-BR
logo: /images/logo.svg

# URL
url: http://localhost:4000
root: /

# Directory
public_dir: public
static_dir: static
i18n_dir: languages

# Content API
## The access token can also be set with SPACETRAVELING_ACCESS_TOKEN
api:
  endpoint: https://spacetraveling.cdn.prismic.io/api/v2
  document_type: posts
  # access_token:
  # ref_id:

# Home page
listing:
  page_size: 4
  fetch: [title, subtitle, author]
  pagination_dir: posts
  # orderings: "[document.first_publication_date desc]"

# Post pages
## Posts generated by `generate`; the rest are generated when first requested
static_paths: 2
revalidate_secs: 86400

# Date / Time format
date_format: dd MMM yyyy
locale: pt_BR
timezone: America/Sao_Paulo
"#;

/// Initialize a new site in the given directory
pub fn init_site(target_dir: &Path) -> Result<()> {
    fs::create_dir_all(target_dir.join("static/images"))?;
    fs::create_dir_all(target_dir.join("languages"))?;

    let config_path = target_dir.join("_config.yml");
    if config_path.exists() {
        anyhow::bail!("{:?} already exists", config_path);
    }
    fs::write(config_path, DEFAULT_CONFIG)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;

    #[test]
    fn test_default_config_matches_defaults() {
        let parsed: SiteConfig = serde_yaml::from_str(DEFAULT_CONFIG).unwrap();
        let defaults = SiteConfig::default();
        assert_eq!(parsed.title, defaults.title);
        assert_eq!(parsed.api.endpoint, defaults.api.endpoint);
        assert_eq!(parsed.api.access_token, None);
        assert_eq!(parsed.listing.page_size, 4);
        assert_eq!(parsed.listing.fetch, defaults.listing.fetch);
        assert_eq!(parsed.static_paths, 2);
        assert_eq!(parsed.revalidate_secs, 86400);
        assert_eq!(parsed.date_format, "dd MMM yyyy");
    }

    #[test]
    fn test_init_site() {
        let dir = tempfile::tempdir().unwrap();
        init_site(dir.path()).unwrap();
        assert!(dir.path().join("_config.yml").exists());
        assert!(dir.path().join("static/images").is_dir());

        // Never overwrite an existing configuration
        assert!(init_site(dir.path()).is_err());
    }
}
